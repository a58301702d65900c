//! In-memory collaborators for unit tests.
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use coedit_common::{FileMeta, FileType};
use parking_lot::Mutex;

use crate::error::AppError;
use crate::storage::{file_meta, DocumentIo};
use crate::versioning::Versioning;

/// Document backend holding one document in memory
pub struct MemoryIo {
    meta: FileMeta,
    contents: Mutex<String>,
    written: Mutex<Vec<String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
}

impl MemoryIo {
    pub fn new(name: &str, contents: &str) -> Self {
        let meta = file_meta(name).unwrap_or(FileMeta {
            name: name.to_string(),
            extension: FileType::Html,
        });

        Self {
            meta,
            contents: Mutex::new(contents.to_string()),
            written: Mutex::new(Vec::new()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            write_delay: Mutex::new(None),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every write sleep for `delay` before it completes
    pub fn delay_writes(&self, delay: Duration) {
        *self.write_delay.lock() = Some(delay);
    }

    /// Every successfully written document, oldest first
    pub fn written(&self) -> Vec<String> {
        self.written.lock().clone()
    }
}

#[async_trait]
impl DocumentIo for MemoryIo {
    async fn read(&self) -> Result<(String, FileMeta), AppError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Io(std::io::Error::other("read refused")));
        }
        Ok((self.contents.lock().clone(), self.meta.clone()))
    }

    async fn write(&self, _name: &str, contents: &str) -> Result<(), AppError> {
        let delay = *self.write_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Io(std::io::Error::other("write refused")));
        }
        *self.contents.lock() = contents.to_string();
        self.written.lock().push(contents.to_string());
        Ok(())
    }
}

/// Version sink recording every snapshot
#[derive(Default)]
pub struct MemoryVersioning {
    saved: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl MemoryVersioning {
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn saved(&self) -> Vec<(String, String)> {
        self.saved.lock().clone()
    }
}

#[async_trait]
impl Versioning for MemoryVersioning {
    async fn save(&self, filename: &str, contents: &str) -> Result<(), AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Io(std::io::Error::other("sink refused")));
        }
        self.saved
            .lock()
            .push((filename.to_string(), contents.to_string()));
        Ok(())
    }
}
