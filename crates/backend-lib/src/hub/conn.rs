//! Connection handles and client records.
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use coedit_common::{ClientView, CursorChange};
use tokio::sync::mpsc;

use crate::error::AppError;

/// Capability to push one serialized frame to a client
#[async_trait]
pub trait ClientConn: Send + Sync {
    async fn send(&self, frame: String) -> Result<(), AppError>;
}

/// Connection handle backed by the client's outbound queue; a writer task drains it into the socket
#[derive(Debug, Clone)]
pub struct ChannelConn {
    tx: mpsc::Sender<String>,
}

impl ChannelConn {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ClientConn for ChannelConn {
    async fn send(&self, frame: String) -> Result<(), AppError> {
        self.tx.send(frame).await?;
        Ok(())
    }
}

/// A client known to the hub, either reserved at login or registered with a socket
#[derive(Clone)]
pub struct Client {
    pub id: String,
    pub username: String,
    pub color: String,
    pub ready: bool,
    pub registered: bool,
    pub position: Option<CursorChange>,
    pub conn: Option<Arc<dyn ClientConn>>,
}

impl Client {
    /// New, not yet registered client
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            color: String::new(),
            ready: false,
            registered: false,
            position: None,
            conn: None,
        }
    }

    /// Roster entry of this client
    pub fn view(&self) -> ClientView {
        ClientView {
            username: self.username.clone(),
            color: self.color.clone(),
            ready: self.ready,
            position: self.position,
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("color", &self.color)
            .field("ready", &self.ready)
            .field("registered", &self.registered)
            .field("position", &self.position)
            .field("connected", &self.conn.is_some())
            .finish()
    }
}
