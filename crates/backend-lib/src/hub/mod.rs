// ============================
// coedit-backend-lib/src/hub/mod.rs
// ============================
//! Client registry and broadcast routing.
use std::collections::HashMap;

use async_trait::async_trait;
use coedit_common::{BroadcastMsg, ClientView, CursorChange};
use tokio::sync::Mutex;

use crate::error::AppError;

pub mod broadcast;
pub mod colors;
pub mod conn;

pub use broadcast::{delivery, Delivery, Outgoing, DELIVERY_POLICY};
pub use colors::ColorPool;
pub use conn::{ChannelConn, Client, ClientConn};

/// Trait for the client registry
#[async_trait]
pub trait Hub: Send + Sync {
    async fn get(&self, id: &str) -> Option<Client>;

    async fn get_by_username(&self, username: &str) -> Option<Client>;

    /// Store the cursor of a client; unknown ids are ignored
    async fn set_position(&self, id: &str, position: CursorChange);

    /// Store the ready mark of a client; unknown ids are ignored
    async fn set_ready(&self, id: &str, ready: bool);

    async fn set_ready_all(&self, ready: bool);

    /// Reserve a client that has no socket yet
    async fn create(&self, client: Client);

    /// Assign a color, mark the client registered and store it
    async fn register(&self, client: Client) -> Client;

    /// Release the client's color and forget it
    async fn unregister(&self, id: &str);

    async fn count_registered(&self) -> usize;

    /// Deliver a message to the clients its type targets
    async fn broadcast(&self, msg: Outgoing) -> Result<(), AppError>;
}

#[derive(Default)]
struct Registry {
    clients: HashMap<String, Client>,
    colors: ColorPool,
}

impl Registry {
    /// Every known client ordered by color; reserved clients have no color yet and come first
    fn ordered(&self) -> Vec<&Client> {
        let mut clients: Vec<&Client> = self.clients.values().collect();
        clients.sort_by(|a, b| {
            a.color
                .cmp(&b.color)
                .then_with(|| a.username.cmp(&b.username))
        });
        clients
    }

    fn roster(&self) -> Vec<ClientView> {
        self.ordered().into_iter().map(Client::view).collect()
    }
}

/// In-memory hub. The registry lock is held while a broadcast writes to every target,
/// in roster order.
#[derive(Default)]
pub struct ClientHub {
    registry: Mutex<Registry>,
}

impl ClientHub {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Hub for ClientHub {
    async fn get(&self, id: &str) -> Option<Client> {
        self.registry.lock().await.clients.get(id).cloned()
    }

    async fn get_by_username(&self, username: &str) -> Option<Client> {
        self.registry
            .lock()
            .await
            .clients
            .values()
            .find(|c| c.username == username)
            .cloned()
    }

    async fn set_position(&self, id: &str, position: CursorChange) {
        if let Some(client) = self.registry.lock().await.clients.get_mut(id) {
            client.position = Some(position);
        }
    }

    async fn set_ready(&self, id: &str, ready: bool) {
        if let Some(client) = self.registry.lock().await.clients.get_mut(id) {
            client.ready = ready;
        }
    }

    async fn set_ready_all(&self, ready: bool) {
        for client in self.registry.lock().await.clients.values_mut() {
            client.ready = ready;
        }
    }

    async fn create(&self, client: Client) {
        self.registry
            .lock()
            .await
            .clients
            .insert(client.id.clone(), client);
    }

    async fn register(&self, mut client: Client) -> Client {
        let mut registry = self.registry.lock().await;

        // re-registering the same id must not leak its previous color
        let previous_color = registry
            .clients
            .get(&client.id)
            .filter(|c| c.registered)
            .map(|c| c.color.clone());
        if let Some(color) = previous_color {
            registry.colors.release(&color);
        }

        client.color = registry.colors.acquire();
        client.registered = true;
        registry.clients.insert(client.id.clone(), client.clone());

        client
    }

    async fn unregister(&self, id: &str) {
        let mut registry = self.registry.lock().await;
        if let Some(client) = registry.clients.remove(id) {
            registry.colors.release(&client.color);
        }
    }

    async fn count_registered(&self) -> usize {
        self.registry
            .lock()
            .await
            .clients
            .values()
            .filter(|c| c.registered)
            .count()
    }

    async fn broadcast(&self, msg: Outgoing) -> Result<(), AppError> {
        let registry = self.registry.lock().await;
        if registry.clients.is_empty() {
            return Ok(());
        }

        let delivery = delivery(msg.msg_type);
        if delivery == Delivery::Drop {
            return Ok(());
        }

        let frame = serde_json::to_string(&BroadcastMsg {
            data: msg.data,
            file_meta: msg.file_meta,
            msg_type: msg.msg_type,
            client: msg.sender,
            clients: registry.roster(),
        })?;

        for client in registry.ordered() {
            if !client.registered || !delivery.reaches(&client.id, &msg.sender_id) {
                continue;
            }
            let Some(conn) = client.conn.as_ref() else {
                continue;
            };

            conn.send(frame.clone()).await.map_err(|e| {
                AppError::Internal(format!("writing message to client '{}': {e}", client.id))
            })?;
        }

        Ok(())
    }
}
