use std::sync::Arc;

use super::log_response;
use crate::error::AppError;
use crate::validator::WriteValidator;

const SERVICE: &str = "write-validator";
const LAYER: &str = "service";

pub struct LogValidator {
    next: Arc<dyn WriteValidator>,
}

impl LogValidator {
    pub fn new(next: Arc<dyn WriteValidator>) -> Self {
        Self { next }
    }
}

impl WriteValidator for LogValidator {
    fn add_client(&self, id: &str) {
        tracing::info!(
            service = SERVICE,
            method = "add_client",
            layer = LAYER,
            client_id = %id,
            "service-request"
        );
        self.next.add_client(id);
    }

    fn remove_client(&self, id: &str) -> Result<(), AppError> {
        tracing::info!(
            service = SERVICE,
            method = "remove_client",
            layer = LAYER,
            client_id = %id,
            "service-request"
        );
        let result = self.next.remove_client(id);
        log_response(SERVICE, "remove_client", LAYER, &result);
        result
    }

    fn ready_client(&self, id: &str) -> Result<(), AppError> {
        tracing::info!(
            service = SERVICE,
            method = "ready_client",
            layer = LAYER,
            client_id = %id,
            "service-request"
        );
        let result = self.next.ready_client(id);
        log_response(SERVICE, "ready_client", LAYER, &result);
        result
    }

    fn unready_client(&self, id: &str) -> Result<(), AppError> {
        tracing::info!(
            service = SERVICE,
            method = "unready_client",
            layer = LAYER,
            client_id = %id,
            "service-request"
        );
        let result = self.next.unready_client(id);
        log_response(SERVICE, "unready_client", LAYER, &result);
        result
    }

    fn clear(&self) {
        tracing::info!(service = SERVICE, method = "clear", layer = LAYER, "service-request");
        self.next.clear();
    }

    fn is_ready(&self) -> bool {
        let ready = self.next.is_ready();
        tracing::info!(
            service = SERVICE,
            method = "is_ready",
            layer = LAYER,
            ready,
            "service-response"
        );
        ready
    }
}
