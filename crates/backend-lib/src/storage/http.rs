//! Remote document fetched and posted over HTTP.
use async_trait::async_trait;
use coedit_common::FileMeta;

use super::{file_meta, DocumentIo};
use crate::error::AppError;

/// Document served at a URL: `GET` reads it, `POST` replaces it
#[derive(Debug, Clone)]
pub struct HttpIo {
    url: String,
    client: reqwest::Client,
}

impl HttpIo {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl DocumentIo for HttpIo {
    async fn read(&self) -> Result<(String, FileMeta), AppError> {
        let meta = file_meta(&self.url)?;

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(AppError::transport)?;

        let status = response.status();
        let body = response.text().await.map_err(AppError::transport)?;

        if status != reqwest::StatusCode::OK {
            return Err(AppError::transport(std::io::Error::other(format!(
                "status code not equal 200: {status}"
            ))));
        }

        Ok((body, meta))
    }

    async fn write(&self, _name: &str, contents: &str) -> Result<(), AppError> {
        post_contents(&self.client, &self.url, contents).await
    }
}

/// `POST` the contents as the request body, expecting `200 OK`
pub(crate) async fn post_contents(
    client: &reqwest::Client,
    url: &str,
    contents: &str,
) -> Result<(), AppError> {
    let response = client
        .post(url)
        .body(contents.to_string())
        .send()
        .await
        .map_err(AppError::transport)?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(AppError::transport(std::io::Error::other(format!(
            "status code not equal 200: {status}"
        ))));
    }

    Ok(())
}
