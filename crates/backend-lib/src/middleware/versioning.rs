use std::sync::Arc;

use async_trait::async_trait;

use super::log_response;
use crate::error::AppError;
use crate::versioning::Versioning;

const SERVICE: &str = "versioning";
const LAYER: &str = "versioning";

pub struct LogVersioning {
    next: Arc<dyn Versioning>,
}

impl LogVersioning {
    pub fn new(next: Arc<dyn Versioning>) -> Self {
        Self { next }
    }
}

#[async_trait]
impl Versioning for LogVersioning {
    async fn save(&self, filename: &str, contents: &str) -> Result<(), AppError> {
        tracing::info!(
            service = SERVICE,
            method = "save",
            layer = LAYER,
            filename,
            bytes = contents.len(),
            "service-request"
        );
        let result = self.next.save(filename, contents).await;
        log_response(SERVICE, "save", LAYER, &result);
        result
    }
}
