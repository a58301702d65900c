//! Version history sinks, fed with every document read or written.
use async_trait::async_trait;

use crate::error::AppError;

mod file;
mod http;

pub use file::{Clock, FileVersioning};
pub use http::HttpVersioning;

/// Destination for document snapshots
#[async_trait]
pub trait Versioning: Send + Sync {
    /// Store one snapshot of `filename`
    async fn save(&self, filename: &str, contents: &str) -> Result<(), AppError>;
}
