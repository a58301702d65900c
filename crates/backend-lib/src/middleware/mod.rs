// crates/backend-lib/src/middleware/mod.rs

//! Logging adapters, each wrapping a collaborator behind the trait it implements.

mod editor;
mod hub;
mod session;
mod storage;
mod validator;
mod versioning;

pub use editor::LogEditor;
pub use hub::LogHub;
pub use session::LogSession;
pub use storage::LogStorage;
pub use validator::LogValidator;
pub use versioning::LogVersioning;

use crate::error::AppError;

fn log_request(service: &'static str, method: &'static str, layer: &'static str) {
    tracing::info!(service, method, layer, "service-request");
}

fn log_response<T>(
    service: &'static str,
    method: &'static str,
    layer: &'static str,
    result: &Result<T, AppError>,
) {
    match result {
        Ok(_) => tracing::info!(service, method, layer, "service-response"),
        Err(e) => tracing::error!(service, method, layer, error = %e, "service-response"),
    }
}
