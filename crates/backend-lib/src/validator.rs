// ============================
// coedit-backend-lib/src/validator.rs
// ============================
//! Save-readiness consensus between the active editors.
use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::AppError;

/// Trait gating document writes on the agreement of every active client
pub trait WriteValidator: Send + Sync {
    /// Track `id`, not ready; tracking it again is a no-op
    fn add_client(&self, id: &str);

    fn remove_client(&self, id: &str) -> Result<(), AppError>;

    fn ready_client(&self, id: &str) -> Result<(), AppError>;

    fn unready_client(&self, id: &str) -> Result<(), AppError>;

    /// Reset every tracked flag to not ready
    fn clear(&self);

    /// True when a lone client is tracked, or when every tracked client is ready
    fn is_ready(&self) -> bool;
}

/// Ready flags keyed by client id
#[derive(Debug, Default)]
pub struct ReadyConsensus {
    clients: Mutex<HashMap<String, bool>>,
}

impl ReadyConsensus {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, id: &str, ready: bool) -> Result<(), AppError> {
        match self.clients.lock().get_mut(id) {
            Some(flag) => {
                *flag = ready;
                Ok(())
            },
            None => Err(client_not_found(id)),
        }
    }
}

fn client_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("client '{id}'"))
}

impl WriteValidator for ReadyConsensus {
    fn add_client(&self, id: &str) {
        self.clients.lock().entry(id.to_string()).or_insert(false);
    }

    fn remove_client(&self, id: &str) -> Result<(), AppError> {
        self.clients
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| client_not_found(id))
    }

    fn ready_client(&self, id: &str) -> Result<(), AppError> {
        self.set(id, true)
    }

    fn unready_client(&self, id: &str) -> Result<(), AppError> {
        self.set(id, false)
    }

    fn clear(&self) {
        for flag in self.clients.lock().values_mut() {
            *flag = false;
        }
    }

    fn is_ready(&self) -> bool {
        let clients = self.clients.lock();
        match clients.len() {
            0 => false,
            1 => true,
            _ => clients.values().all(|ready| *ready),
        }
    }
}
