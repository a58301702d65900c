use std::sync::Arc;

use async_trait::async_trait;

use super::log_response;
use crate::error::AppError;
use crate::hub::ClientConn;
use crate::session::{Disconnect, FrameStream, Session};

const SERVICE: &str = "session";
const LAYER: &str = "web";

pub struct LogSession {
    next: Arc<dyn Session>,
}

impl LogSession {
    pub fn new(next: Arc<dyn Session>) -> Self {
        Self { next }
    }
}

#[async_trait]
impl Session for LogSession {
    async fn login(&self, username: &str) -> Result<String, AppError> {
        tracing::info!(
            service = SERVICE,
            method = "login",
            layer = LAYER,
            username,
            "service-request"
        );
        let result = self.next.login(username).await;
        log_response(SERVICE, "login", LAYER, &result);
        result
    }

    async fn validate_session(&self, id: &str) -> Result<(), AppError> {
        tracing::info!(
            service = SERVICE,
            method = "validate_session",
            layer = LAYER,
            client_id = id,
            "service-request"
        );
        let result = self.next.validate_session(id).await;
        log_response(SERVICE, "validate_session", LAYER, &result);
        result
    }

    async fn handle_connection(
        &self,
        id: &str,
        conn: Arc<dyn ClientConn>,
        frames: FrameStream,
    ) -> Result<Disconnect, AppError> {
        tracing::info!(
            service = SERVICE,
            method = "handle_connection",
            layer = LAYER,
            client_id = id,
            "service-request"
        );
        let result = self.next.handle_connection(id, conn, frames).await;
        log_response(SERVICE, "handle_connection", LAYER, &result);
        result
    }
}
