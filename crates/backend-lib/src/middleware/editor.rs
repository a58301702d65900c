use std::sync::Arc;

use async_trait::async_trait;
use coedit_common::{ChangeMsg, FileMeta};

use super::{log_request, log_response};
use crate::editor::Editor;
use crate::error::AppError;

const SERVICE: &str = "editor";
const LAYER: &str = "service";

pub struct LogEditor {
    next: Arc<dyn Editor>,
}

impl LogEditor {
    pub fn new(next: Arc<dyn Editor>) -> Self {
        Self { next }
    }
}

#[async_trait]
impl Editor for LogEditor {
    async fn file_meta(&self) -> Option<FileMeta> {
        self.next.file_meta().await
    }

    async fn load(&self) -> Result<(), AppError> {
        log_request(SERVICE, "load", LAYER);
        let result = self.next.load().await;
        log_response(SERVICE, "load", LAYER, &result);
        result
    }

    async fn unload(&self) {
        log_request(SERVICE, "unload", LAYER);
        self.next.unload().await;
        tracing::info!(service = SERVICE, method = "unload", layer = LAYER, "service-response");
    }

    async fn read(&self) -> String {
        self.next.read().await
    }

    async fn write(&self) -> Result<(), AppError> {
        log_request(SERVICE, "write", LAYER);
        let result = self.next.write().await;
        log_response(SERVICE, "write", LAYER, &result);
        result
    }

    async fn change(&self, msg: &ChangeMsg) -> Result<(), AppError> {
        tracing::info!(
            service = SERVICE,
            method = "change",
            layer = LAYER,
            action = ?msg.action,
            start_row = msg.start.row,
            start_column = msg.start.column,
            end_row = msg.end.row,
            end_column = msg.end.column,
            lines = msg.lines.len(),
            "service-request"
        );
        let result = self.next.change(msg).await;
        log_response(SERVICE, "change", LAYER, &result);
        result
    }
}
