use std::sync::Arc;

use async_trait::async_trait;
use coedit_common::FileMeta;

use super::DocumentIo;
use crate::error::AppError;
use crate::versioning::Versioning;

/// Forwards to the wrapped backend and snapshots every successful read or write
pub struct VersionedIo {
    next: Arc<dyn DocumentIo>,
    versioning: Arc<dyn Versioning>,
}

impl VersionedIo {
    pub fn new(next: Arc<dyn DocumentIo>, versioning: Arc<dyn Versioning>) -> Self {
        Self { next, versioning }
    }

    async fn snapshot(&self, filename: &str, contents: &str) {
        if let Err(e) = self.versioning.save(filename, contents).await {
            tracing::error!(filename, error = %e, "error while saving version");
        }
    }
}

#[async_trait]
impl DocumentIo for VersionedIo {
    async fn read(&self) -> Result<(String, FileMeta), AppError> {
        let (contents, meta) = self.next.read().await?;
        self.snapshot(&meta.name, &contents).await;
        Ok((contents, meta))
    }

    async fn write(&self, name: &str, contents: &str) -> Result<(), AppError> {
        self.next.write(name, contents).await?;
        self.snapshot(name, contents).await;
        Ok(())
    }
}
