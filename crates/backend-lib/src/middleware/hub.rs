use std::sync::Arc;

use async_trait::async_trait;
use coedit_common::CursorChange;

use super::log_response;
use crate::error::AppError;
use crate::hub::{Client, Hub, Outgoing};

const SERVICE: &str = "hub";
const LAYER: &str = "service";

pub struct LogHub {
    next: Arc<dyn Hub>,
}

impl LogHub {
    pub fn new(next: Arc<dyn Hub>) -> Self {
        Self { next }
    }
}

#[async_trait]
impl Hub for LogHub {
    async fn get(&self, id: &str) -> Option<Client> {
        self.next.get(id).await
    }

    async fn get_by_username(&self, username: &str) -> Option<Client> {
        self.next.get_by_username(username).await
    }

    async fn set_position(&self, id: &str, position: CursorChange) {
        self.next.set_position(id, position).await;
    }

    async fn set_ready(&self, id: &str, ready: bool) {
        self.next.set_ready(id, ready).await;
    }

    async fn set_ready_all(&self, ready: bool) {
        self.next.set_ready_all(ready).await;
    }

    async fn create(&self, client: Client) {
        self.next.create(client).await;
    }

    async fn register(&self, client: Client) -> Client {
        let client = self.next.register(client).await;
        tracing::info!(
            service = SERVICE,
            method = "register",
            layer = LAYER,
            client_id = %client.id,
            color = %client.color,
            "service-response"
        );
        client
    }

    async fn unregister(&self, id: &str) {
        self.next.unregister(id).await;
        tracing::info!(
            service = SERVICE,
            method = "unregister",
            layer = LAYER,
            client_id = %id,
            "service-response"
        );
    }

    async fn count_registered(&self) -> usize {
        self.next.count_registered().await
    }

    async fn broadcast(&self, msg: Outgoing) -> Result<(), AppError> {
        tracing::info!(
            service = SERVICE,
            method = "broadcast",
            layer = LAYER,
            msg_type = %msg.msg_type,
            client_id = %msg.sender_id,
            username = %msg.sender,
            "service-request"
        );
        let result = self.next.broadcast(msg).await;
        log_response(SERVICE, "broadcast", LAYER, &result);
        result
    }
}
