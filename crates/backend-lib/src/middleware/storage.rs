use std::sync::Arc;

use async_trait::async_trait;
use coedit_common::FileMeta;

use super::{log_request, log_response};
use crate::error::AppError;
use crate::storage::DocumentIo;

const SERVICE: &str = "io";
const LAYER: &str = "io";

pub struct LogStorage {
    next: Arc<dyn DocumentIo>,
}

impl LogStorage {
    pub fn new(next: Arc<dyn DocumentIo>) -> Self {
        Self { next }
    }
}

#[async_trait]
impl DocumentIo for LogStorage {
    async fn read(&self) -> Result<(String, FileMeta), AppError> {
        log_request(SERVICE, "read", LAYER);
        let result = self.next.read().await;
        match &result {
            Ok((contents, meta)) => tracing::info!(
                service = SERVICE,
                method = "read",
                layer = LAYER,
                name = %meta.name,
                bytes = contents.len(),
                "service-response"
            ),
            Err(_) => log_response(SERVICE, "read", LAYER, &result),
        }
        result
    }

    async fn write(&self, name: &str, contents: &str) -> Result<(), AppError> {
        tracing::info!(
            service = SERVICE,
            method = "write",
            layer = LAYER,
            name,
            bytes = contents.len(),
            "service-request"
        );
        let result = self.next.write(name, contents).await;
        log_response(SERVICE, "write", LAYER, &result);
        result
    }
}
