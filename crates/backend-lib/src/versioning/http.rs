use async_trait::async_trait;

use super::Versioning;
use crate::error::AppError;
use crate::storage::post_contents;

/// Snapshots posted to a remote endpoint; the endpoint names them
#[derive(Debug, Clone)]
pub struct HttpVersioning {
    url: String,
    client: reqwest::Client,
}

impl HttpVersioning {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl Versioning for HttpVersioning {
    async fn save(&self, _filename: &str, contents: &str) -> Result<(), AppError> {
        post_contents(&self.client, &self.url, contents).await
    }
}
