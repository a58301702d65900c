use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs as tokio_fs;

use super::Versioning;
use crate::error::AppError;

/// Source of the snapshot timestamp
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Snapshots stored as `<dir>/<unix-seconds>_<filename>`
#[derive(Clone)]
pub struct FileVersioning {
    dir: PathBuf,
    clock: Clock,
}

impl FileVersioning {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self::with_clock(dir, Arc::new(Utc::now))
    }

    pub fn with_clock<P: AsRef<Path>>(dir: P, clock: Clock) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            clock,
        }
    }

    fn snapshot_path(&self, filename: &str) -> PathBuf {
        let stamp = (self.clock)().timestamp();
        self.dir.join(format!("{stamp}_{filename}"))
    }
}

#[async_trait]
impl Versioning for FileVersioning {
    async fn save(&self, filename: &str, contents: &str) -> Result<(), AppError> {
        let path = self.snapshot_path(filename);
        tokio_fs::write(&path, contents).await?;

        tracing::info!(filename, path = %path.display(), "version saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_names_snapshot_by_timestamp() {
        let temp_dir = TempDir::new().unwrap();
        let clock: Clock = Arc::new(|| Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        let versioning = FileVersioning::with_clock(temp_dir.path(), clock);

        versioning.save("style.css", "a { color: red; }").await.unwrap();

        let stored = tokio_fs::read_to_string(temp_dir.path().join("1700000000_style.css"))
            .await
            .unwrap();
        assert_eq!(stored, "a { color: red; }");
    }

    #[tokio::test]
    async fn test_missing_dir_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let versioning = FileVersioning::new(temp_dir.path().join("missing"));

        let result = versioning.save("style.css", "a {}").await;
        assert!(matches!(result, Err(AppError::Io(_))));
    }
}
