// ============================
// coedit-backend-lib/src/lib.rs
// ============================
//! Core backend-lib functionality for the `coedit` collaborative editing server.

pub mod config;
pub mod editor;
pub mod error;
pub mod hub;
pub mod metrics;
pub mod middleware;
pub mod session;
pub mod storage;
pub mod validator;
pub mod versioning;
pub mod ws_router;

#[cfg(test)]
mod test_support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{BackendKind, Settings};
use crate::editor::DocumentEditor;
use crate::hub::ClientHub;
use crate::middleware::{LogEditor, LogHub, LogSession, LogStorage, LogValidator, LogVersioning};
use crate::session::{Session, SessionService};
use crate::storage::{DocumentIo, FileIo, HttpIo, VersionedIo};
use crate::validator::ReadyConsensus;
use crate::versioning::{FileVersioning, HttpVersioning, Versioning};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Session entry points
    pub session: Arc<dyn Session>,
    /// Settings
    pub settings: Arc<Settings>,
    /// Set once graceful shutdown has begun
    shutting_down: Arc<AtomicBool>,
}

impl AppState {
    /// Create a new application state around an existing session service
    pub fn new(session: Arc<dyn Session>, settings: Settings) -> Self {
        Self {
            session,
            settings: Arc::new(settings),
            shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Wire every collaborator selected by `settings`, each behind its logging adapter
    pub fn from_settings(settings: Settings) -> Self {
        let session = build_session(&settings);
        Self::new(session, settings)
    }

    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}

/// Compose storage, versioning, editor, hub and validator into a session service
pub fn build_session(settings: &Settings) -> Arc<dyn Session> {
    let client = reqwest::Client::new();

    let io: Arc<dyn DocumentIo> = match settings.storage.kind {
        BackendKind::File => Arc::new(FileIo::new(&settings.storage.path)),
        BackendKind::Http => Arc::new(HttpIo::new(&settings.storage.path, client.clone())),
    };
    let mut io: Arc<dyn DocumentIo> = Arc::new(LogStorage::new(io));

    if let Some(versions) = &settings.versions {
        let sink: Arc<dyn Versioning> = match versions.kind {
            BackendKind::File => Arc::new(FileVersioning::new(&versions.path)),
            BackendKind::Http => Arc::new(HttpVersioning::new(&versions.path, client)),
        };
        io = Arc::new(VersionedIo::new(io, Arc::new(LogVersioning::new(sink))));
    }

    let editor = Arc::new(LogEditor::new(Arc::new(DocumentEditor::new(io))));
    let hub = Arc::new(LogHub::new(Arc::new(ClientHub::new())));
    let validator = Arc::new(LogValidator::new(Arc::new(ReadyConsensus::new())));

    let service = SessionService::new(editor, hub, validator, settings.conn_ttl());
    Arc::new(LogSession::new(Arc::new(service)))
}
