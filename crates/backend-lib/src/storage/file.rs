//! Local file backend.
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use coedit_common::FileMeta;
use tokio::fs as tokio_fs;

use super::{file_meta, DocumentIo};
use crate::error::AppError;

/// Document kept in a single local file
#[derive(Debug, Clone)]
pub struct FileIo {
    path: PathBuf,
}

impl FileIo {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl DocumentIo for FileIo {
    async fn read(&self) -> Result<(String, FileMeta), AppError> {
        let meta = file_meta(&self.path.to_string_lossy())?;
        let contents = tokio_fs::read_to_string(&self.path).await?;
        Ok((contents, meta))
    }

    /// Overwrite the whole file; the name is implied by the path
    async fn write(&self, _name: &str, contents: &str) -> Result<(), AppError> {
        tokio_fs::write(&self.path, contents).await?;
        Ok(())
    }
}
