// ============================
// coedit-backend-lib/src/editor/mod.rs
// ============================
//! Document engine: the single authoritative copy of the edited document.
use std::sync::Arc;

use async_trait::async_trait;
use coedit_common::{ChangeAction, ChangeMsg, FileMeta};
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::storage::DocumentIo;

pub mod change;

/// Tab characters are stored as this many spaces
const TAB_WIDTH: usize = 4;

/// Trait for the document engine
#[async_trait]
pub trait Editor: Send + Sync {
    /// Metadata of the loaded document, `None` before the first load
    async fn file_meta(&self) -> Option<FileMeta>;

    /// Fetch the document from storage unless it is already loaded
    async fn load(&self) -> Result<(), AppError>;

    /// Drop the contents, keeping the metadata
    async fn unload(&self);

    /// Current contents, empty while unloaded
    async fn read(&self) -> String;

    /// Flush the contents to storage; an empty document is not written
    async fn write(&self) -> Result<(), AppError>;

    /// Apply one edit operation
    async fn change(&self, msg: &ChangeMsg) -> Result<(), AppError>;
}

#[derive(Debug, Default)]
struct DocumentFile {
    meta: Option<FileMeta>,
    contents: String,
}

/// In-memory document backed by a storage backend.
///
/// Every operation takes the document lock for its whole duration, storage
/// calls included, so loads, writes and edits form one linear history.
pub struct DocumentEditor {
    io: Arc<dyn DocumentIo>,
    file: Mutex<DocumentFile>,
}

impl DocumentEditor {
    pub fn new(io: Arc<dyn DocumentIo>) -> Self {
        Self {
            io,
            file: Mutex::new(DocumentFile::default()),
        }
    }
}

#[async_trait]
impl Editor for DocumentEditor {
    async fn file_meta(&self) -> Option<FileMeta> {
        self.file.lock().await.meta.clone()
    }

    async fn load(&self) -> Result<(), AppError> {
        let mut file = self.file.lock().await;
        if !file.contents.is_empty() {
            return Ok(());
        }

        let (contents, meta) = self.io.read().await?;
        file.contents = contents.replace('\t', &" ".repeat(TAB_WIDTH));
        file.meta = Some(meta);

        Ok(())
    }

    async fn unload(&self) {
        self.file.lock().await.contents.clear();
    }

    async fn read(&self) -> String {
        self.file.lock().await.contents.clone()
    }

    async fn write(&self) -> Result<(), AppError> {
        let file = self.file.lock().await;
        if file.contents.is_empty() {
            tracing::error!("contents empty");
            return Ok(());
        }

        let name = file
            .meta
            .as_ref()
            .map(|meta| meta.name.as_str())
            .ok_or_else(|| AppError::Internal("document was never loaded".to_string()))?;

        self.io.write(name, &file.contents).await
    }

    async fn change(&self, msg: &ChangeMsg) -> Result<(), AppError> {
        let mut file = self.file.lock().await;

        let updated = match msg.action {
            ChangeAction::Insert => change::insert(&file.contents, msg)?,
            ChangeAction::Remove => change::remove(&file.contents, msg)?,
        };
        file.contents = updated;

        Ok(())
    }
}
