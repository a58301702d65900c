// ============================
// coedit-backend-lib/src/storage/mod.rs
// ============================
//! Document storage backends.
use std::path::Path;

use async_trait::async_trait;
use coedit_common::{FileMeta, FileType};

use crate::error::AppError;

mod file;
mod http;
mod versioned;

pub use file::FileIo;
pub use http::HttpIo;
pub use versioned::VersionedIo;
pub(crate) use http::post_contents;

/// Trait for document storage backends
#[async_trait]
pub trait DocumentIo: Send + Sync {
    /// Fetch the raw document together with its metadata
    async fn read(&self) -> Result<(String, FileMeta), AppError>;

    /// Replace the stored document
    async fn write(&self, name: &str, contents: &str) -> Result<(), AppError>;
}

/// Derive document metadata from a file path or URL path
pub fn file_meta(location: &str) -> Result<FileMeta, AppError> {
    let path = Path::new(location);

    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    let extension = FileType::from_extension(&ext)
        .ok_or_else(|| AppError::Validation(format!("invalid file type '{ext}'")))?;

    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| AppError::Validation(format!("no file name in '{location}'")))?
        .to_string();

    Ok(FileMeta { name, extension })
}
