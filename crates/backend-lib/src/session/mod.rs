// ============================
// coedit-backend-lib/src/session/mod.rs
// ============================
//! Per-connection session protocol: login, registration, the message loop and teardown.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coedit_common::MsgType;
use futures_util::stream::{BoxStream, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tracing::Instrument;
use uuid::Uuid;

use crate::editor::Editor;
use crate::error::AppError;
use crate::hub::{Client, ClientConn, Hub, Outgoing};
use crate::validator::WriteValidator;

mod incoming;
mod timer;

pub use incoming::{Handled, Inbound};
pub use timer::IdleTimer;

/// Depth of the queue between the socket reader and the message loop
pub const INBOUND_QUEUE: usize = 10;

/// Text frames read from a client socket; the stream ends when the socket closes
pub type FrameStream = BoxStream<'static, String>;

/// Why a message loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// The client sent `conn-disconnect`
    ClientRequested,
    /// No message arrived within the idle timeout
    IdleTimeout,
    /// The socket closed or failed
    SocketClosed,
    /// The client sent a frame that could not be decoded or is not accepted
    ProtocolViolation,
}

impl fmt::Display for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Disconnect::ClientRequested => "client requested",
            Disconnect::IdleTimeout => "idle timeout",
            Disconnect::SocketClosed => "socket closed",
            Disconnect::ProtocolViolation => "protocol violation",
        };
        f.write_str(reason)
    }
}

/// Trait for the session entry points used by the HTTP layer
#[async_trait]
pub trait Session: Send + Sync {
    /// Reserve a client id for `username`
    async fn login(&self, username: &str) -> Result<String, AppError>;

    /// Check that `id` is well formed and known
    async fn validate_session(&self, id: &str) -> Result<(), AppError>;

    /// Run a registered connection to completion
    async fn handle_connection(
        &self,
        id: &str,
        conn: Arc<dyn ClientConn>,
        frames: FrameStream,
    ) -> Result<Disconnect, AppError>;
}

/// Session service binding the document, the hub and the ready consensus
pub struct SessionService {
    editor: Arc<dyn Editor>,
    hub: Arc<dyn Hub>,
    validator: Arc<dyn WriteValidator>,
    conn_ttl: Option<Duration>,
    /// Serializes the first-client load against the last-client flush
    lifecycle: Mutex<()>,
}

impl SessionService {
    pub fn new(
        editor: Arc<dyn Editor>,
        hub: Arc<dyn Hub>,
        validator: Arc<dyn WriteValidator>,
        conn_ttl: Option<Duration>,
    ) -> Self {
        Self {
            editor,
            hub,
            validator,
            conn_ttl,
            lifecycle: Mutex::new(()),
        }
    }

    async fn register(&self, id: &str, conn: Arc<dyn ClientConn>) -> Result<Client, AppError> {
        parse_id(id)?;

        let mut client = self
            .hub
            .get(id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("id '{id}' does not exist")))?;
        client.conn = Some(conn);

        let _lifecycle = self.lifecycle.lock().await;

        // first client in, load the document
        if self.hub.count_registered().await == 0 {
            self.editor.load().await?;
        }

        let client = self.hub.register(client).await;
        self.validator.add_client(&client.id);

        Ok(client)
    }

    async fn announce(&self, client: &Client) -> Result<(), AppError> {
        let contents = self.editor.read().await;
        let file_meta = self.editor.file_meta().await;

        self.hub
            .broadcast(
                Outgoing::new(MsgType::Connected, client)
                    .with_data(contents)
                    .with_file_meta(file_meta),
            )
            .await?;

        self.hub
            .broadcast(Outgoing::new(MsgType::ClientsConnected, client))
            .await
    }

    async fn message_loop(&self, client: &Client, frames: FrameStream) -> Disconnect {
        let (disconnect_tx, mut disconnect_rx) = mpsc::channel::<Disconnect>(1);
        let (inbound_tx, mut inbound_rx) =
            mpsc::channel::<Result<Inbound, AppError>>(INBOUND_QUEUE);

        let timer = self
            .conn_ttl
            .map(|ttl| IdleTimer::spawn(ttl, disconnect_tx.clone()));

        let reader = tokio::spawn(read_frames(frames, inbound_tx).in_current_span());

        let reason = loop {
            tokio::select! {
                Some(reason) = disconnect_rx.recv() => break reason,
                inbound = inbound_rx.recv() => {
                    let msg = match inbound {
                        None => break Disconnect::SocketClosed,
                        Some(Err(e)) => {
                            tracing::error!(error = %e, "undecodable message");
                            break Disconnect::ProtocolViolation;
                        },
                        Some(Ok(msg)) => msg,
                    };

                    if let Some(timer) = &timer {
                        timer.reset();
                    }

                    tracing::info!(msg_type = %msg.msg_type, "websocket message received");

                    let handled = self.incoming(client, msg).await;
                    if let Some(e) = &handled.error {
                        tracing::error!(error = %e, "handle message");
                    }
                    if let Some(reason) = handled.close {
                        break reason;
                    }

                    if let Some(msg_type) = handled.reply {
                        let reply = Outgoing::new(msg_type, client).with_data(handled.data);
                        if let Err(e) = self.hub.broadcast(reply).await {
                            tracing::error!(%msg_type, error = %e, "broadcast");
                        }
                    }
                },
            }
        };

        reader.abort();
        drop(disconnect_tx);

        reason
    }

    /// Tear the client down. Every step runs; the first failure is returned.
    async fn unregister(&self, client: &Client) -> Result<(), AppError> {
        let mut first_error: Option<AppError> = None;
        let mut check = |step: &'static str, result: Result<(), AppError>| {
            if let Err(e) = result {
                tracing::error!(step, error = %e, "teardown");
                first_error.get_or_insert(e);
            }
        };

        check(
            "broadcast conn-disconnect",
            self.hub
                .broadcast(Outgoing::new(MsgType::ConnDisconnect, client))
                .await,
        );

        let lifecycle = self.lifecycle.lock().await;
        self.hub.unregister(&client.id).await;

        check(
            "broadcast clients-disconnected",
            self.hub
                .broadcast(Outgoing::new(MsgType::ClientsDisconnected, client))
                .await,
        );

        check("validator remove client", self.validator.remove_client(&client.id));

        // last client out, flush the document; unsaved edits stay loaded if the write fails
        if self.hub.count_registered().await == 0 {
            let written = self.editor.write().await;
            if written.is_ok() {
                self.editor.unload().await;
            }
            check("editor write", written);
        }
        drop(lifecycle);

        first_error.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl Session for SessionService {
    async fn login(&self, username: &str) -> Result<String, AppError> {
        if username.trim().is_empty() {
            return Err(AppError::Validation("username is empty".to_string()));
        }

        if self.hub.get_by_username(username).await.is_some() {
            return Err(AppError::UsernameTaken(username.to_string()));
        }

        let id = Uuid::new_v4().to_string();
        self.hub.create(Client::new(id.clone(), username)).await;

        Ok(id)
    }

    async fn validate_session(&self, id: &str) -> Result<(), AppError> {
        parse_id(id)?;

        if self.hub.get(id).await.is_none() {
            return Err(AppError::NotFound(format!("id '{id}' does not exist")));
        }

        Ok(())
    }

    async fn handle_connection(
        &self,
        id: &str,
        conn: Arc<dyn ClientConn>,
        frames: FrameStream,
    ) -> Result<Disconnect, AppError> {
        let span = tracing::info_span!("session", client_id = %id);

        async move {
            let client = self.register(id, conn).await?;
            tracing::info!(username = %client.username, color = %client.color, "client registered");

            let reason = match self.announce(&client).await {
                Ok(()) => self.message_loop(&client, frames).await,
                Err(e) => {
                    tracing::error!(error = %e, "announce connection");
                    self.unregister(&client).await?;
                    return Err(e);
                },
            };

            tracing::info!(%reason, "connection closed");
            self.unregister(&client).await?;

            Ok(reason)
        }
        .instrument(span)
        .await
    }
}

fn parse_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::Validation("id not valid".to_string()))
}

async fn read_frames(mut frames: FrameStream, queue: mpsc::Sender<Result<Inbound, AppError>>) {
    while let Some(raw) = frames.next().await {
        let decoded = Inbound::decode(raw);
        let fatal = decoded.is_err();

        if queue.send(decoded).await.is_err() || fatal {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::DocumentEditor;
    use crate::hub::{ChannelConn, ClientHub};
    use crate::test_support::MemoryIo;
    use crate::validator::ReadyConsensus;
    use coedit_common::BroadcastMsg;
    use futures_util::stream;

    struct Fixture {
        io: Arc<MemoryIo>,
        editor: Arc<DocumentEditor>,
        hub: Arc<ClientHub>,
        validator: Arc<ReadyConsensus>,
        service: Arc<SessionService>,
    }

    fn fixture(conn_ttl: Option<Duration>) -> Fixture {
        let io = Arc::new(MemoryIo::new("index.html", "<p>\n\thi\n</p>\n"));
        let editor = Arc::new(DocumentEditor::new(io.clone()));
        let hub = Arc::new(ClientHub::new());
        let validator = Arc::new(ReadyConsensus::new());
        let service = Arc::new(SessionService::new(
            editor.clone(),
            hub.clone(),
            validator.clone(),
            conn_ttl,
        ));

        Fixture { io, editor, hub, validator, service }
    }

    fn channel_conn() -> (Arc<dyn ClientConn>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(32);
        (Arc::new(ChannelConn::new(tx)), rx)
    }

    fn frames(raw: &[&str]) -> FrameStream {
        let raw: Vec<String> = raw.iter().map(|r| r.to_string()).collect();
        stream::iter(raw).boxed()
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<BroadcastMsg> {
        let mut msgs = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            msgs.push(serde_json::from_str(&frame).unwrap());
        }
        msgs
    }

    fn types(msgs: &[BroadcastMsg]) -> Vec<MsgType> {
        msgs.iter().map(|m| m.msg_type).collect()
    }

    #[tokio::test]
    async fn test_login() {
        let f = fixture(None);

        let id = f.service.login("ana").await.unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
        let client = f.hub.get(&id).await.unwrap();
        assert_eq!(client.username, "ana");
        assert!(!client.registered);

        assert!(matches!(f.service.login("ana").await, Err(AppError::UsernameTaken(_))));
        assert!(matches!(f.service.login("  ").await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_validate_session() {
        let f = fixture(None);
        let id = f.service.login("ana").await.unwrap();

        f.service.validate_session(&id).await.unwrap();
        assert!(matches!(
            f.service.validate_session("not-a-uuid").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            f.service.validate_session(&Uuid::new_v4().to_string()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_id_is_rejected() {
        let f = fixture(None);
        let (conn, _rx) = channel_conn();

        let result = f
            .service
            .handle_connection(&Uuid::new_v4().to_string(), conn, frames(&[]))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(f.editor.read().await, "");
    }

    #[tokio::test]
    async fn test_load_failure_aborts_registration() {
        let f = fixture(None);
        f.io.fail_reads(true);
        let id = f.service.login("ana").await.unwrap();
        let (conn, _rx) = channel_conn();

        let result = f.service.handle_connection(&id, conn, frames(&[])).await;
        assert!(matches!(result, Err(AppError::Io(_))));
        assert_eq!(f.hub.count_registered().await, 0);
    }

    #[tokio::test]
    async fn test_solo_session_lifecycle() {
        let f = fixture(None);
        let id = f.service.login("ana").await.unwrap();
        let (conn, mut rx) = channel_conn();

        let reason = f
            .service
            .handle_connection(&id, conn, frames(&[r#"{"type":"conn-disconnect"}"#]))
            .await
            .unwrap();
        assert_eq!(reason, Disconnect::ClientRequested);

        let msgs = drain(&mut rx);
        assert_eq!(types(&msgs), vec![MsgType::Connected, MsgType::ConnDisconnect]);

        let connected = &msgs[0];
        assert_eq!(connected.data, "<p>\n    hi\n</p>\n");
        assert_eq!(connected.file_meta.as_ref().unwrap().name, "index.html");
        assert_eq!(connected.client, "ana");
        assert_eq!(connected.clients.len(), 1);
        assert_eq!(connected.clients[0].color, "blue");

        // last client out: flushed, unloaded, forgotten
        assert_eq!(f.io.written(), vec!["<p>\n    hi\n</p>\n".to_string()]);
        assert_eq!(f.editor.read().await, "");
        assert!(f.hub.get(&id).await.is_none());
        assert!(f.validator.remove_client(&id).is_err());
    }

    #[tokio::test]
    async fn test_socket_close_ends_session() {
        let f = fixture(None);
        let id = f.service.login("ana").await.unwrap();
        let (conn, _rx) = channel_conn();

        let reason = f
            .service
            .handle_connection(
                &id,
                conn,
                frames(&[r#"{"type":"conn-cursor-change","data":{"index":1,"length":0}}"#]),
            )
            .await
            .unwrap();
        assert_eq!(reason, Disconnect::SocketClosed);
    }

    #[tokio::test]
    async fn test_undecodable_frame_ends_session() {
        let f = fixture(None);
        let id = f.service.login("ana").await.unwrap();
        let (conn, _rx) = channel_conn();

        let reason = f
            .service
            .handle_connection(&id, conn, frames(&["{", r#"{"type":"conn-save"}"#]))
            .await
            .unwrap();
        assert_eq!(reason, Disconnect::ProtocolViolation);
        // only the teardown flush, the save after the bad frame is never read
        assert_eq!(f.io.written().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_ends_session() {
        let f = fixture(Some(Duration::from_secs(5)));
        let id = f.service.login("ana").await.unwrap();
        let (conn, _rx) = channel_conn();

        // a socket that stays open without sending anything
        let reason = f
            .service
            .handle_connection(&id, conn, stream::pending::<String>().boxed())
            .await
            .unwrap();
        assert_eq!(reason, Disconnect::IdleTimeout);
        assert!(f.hub.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_two_clients() {
        let f = fixture(None);
        let ana_id = f.service.login("ana").await.unwrap();
        let bo_id = f.service.login("bo").await.unwrap();

        let (ana_conn, mut ana_rx) = channel_conn();
        let (ana_frames_tx, ana_frames_rx) = mpsc::channel::<String>(8);
        let ana_frames = channel_frames(ana_frames_rx);
        let ana_session = {
            let service = f.service.clone();
            let id = ana_id.clone();
            tokio::spawn(async move { service.handle_connection(&id, ana_conn, ana_frames).await })
        };

        // wait for ana's registration
        recv_type(&mut ana_rx, MsgType::Connected).await;

        let (bo_conn, mut bo_rx) = channel_conn();
        let (bo_frames_tx, bo_frames_rx) = mpsc::channel::<String>(8);
        let bo_session = {
            let service = f.service.clone();
            let id = bo_id.clone();
            let frames = channel_frames(bo_frames_rx);
            tokio::spawn(async move { service.handle_connection(&id, bo_conn, frames).await })
        };

        let bo_connected = recv_type(&mut bo_rx, MsgType::Connected).await;
        assert_eq!(bo_connected.clients.len(), 2);

        let notice = recv_type(&mut ana_rx, MsgType::ClientsConnected).await;
        assert_eq!(notice.client, "bo");

        // ana is ready, bo is not: no write yet
        ana_frames_tx.send(r#"{"type":"conn-ready"}"#.to_string()).await.unwrap();
        let ready = recv_type(&mut bo_rx, MsgType::ClientsReady).await;
        assert_eq!(ready.client, "ana");
        assert!(f.io.written().is_empty());

        // bo leaves; ana stays, so the document is not flushed
        bo_frames_tx.send(r#"{"type":"conn-disconnect"}"#.to_string()).await.unwrap();
        assert_eq!(bo_session.await.unwrap().unwrap(), Disconnect::ClientRequested);

        let left = recv_type(&mut ana_rx, MsgType::ClientsDisconnected).await;
        assert_eq!(left.client, "bo");
        assert_eq!(left.clients.len(), 1);
        assert!(f.io.written().is_empty());
        assert_eq!(f.hub.count_registered().await, 1);

        // closing ana's socket flushes the document
        drop(ana_frames_tx);
        assert_eq!(ana_session.await.unwrap().unwrap(), Disconnect::SocketClosed);
        assert_eq!(f.io.written().len(), 1);
        assert_eq!(f.editor.read().await, "");
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_document_loaded() {
        let f = fixture(None);
        let id = f.service.login("ana").await.unwrap();
        let (conn, mut rx) = channel_conn();

        let edit = r#"{"type":"conn-text-change","data":{"action":"insert",
            "start":{"row":0,"column":3},"end":{"row":0,"column":4},"lines":["!"]}}"#;
        f.io.fail_writes(true);

        let result = f
            .service
            .handle_connection(&id, conn, frames(&[edit, r#"{"type":"conn-disconnect"}"#]))
            .await;
        assert!(matches!(result, Err(AppError::Io(_))));

        // the socket is still told to go away and the client is forgotten
        assert_eq!(types(&drain(&mut rx)), vec![MsgType::Connected, MsgType::ConnDisconnect]);
        assert_eq!(f.hub.count_registered().await, 0);

        // the edit survives for the next client to save
        assert_eq!(f.editor.read().await, "<p>!\n    hi\n</p>\n");
        assert!(f.io.written().is_empty());

        f.io.fail_writes(false);
        let id = f.service.login("bo").await.unwrap();
        let (conn, mut rx) = channel_conn();
        f.service
            .handle_connection(&id, conn, frames(&[]))
            .await
            .unwrap();
        assert_eq!(drain(&mut rx)[0].data, "<p>!\n    hi\n</p>\n");
        assert_eq!(f.io.written(), vec!["<p>!\n    hi\n</p>\n".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_during_last_flush_sees_document() {
        let f = fixture(None);
        f.io.delay_writes(Duration::from_secs(1));
        let ana_id = f.service.login("ana").await.unwrap();
        let bo_id = f.service.login("bo").await.unwrap();

        let (ana_conn, mut ana_rx) = channel_conn();
        let (ana_frames_tx, ana_frames_rx) = mpsc::channel::<String>(8);
        let ana_session = {
            let service = f.service.clone();
            let frames = channel_frames(ana_frames_rx);
            tokio::spawn(async move { service.handle_connection(&ana_id, ana_conn, frames).await })
        };
        recv_type(&mut ana_rx, MsgType::Connected).await;

        // ana leaves and parks inside the slow flush
        drop(ana_frames_tx);
        recv_type(&mut ana_rx, MsgType::ConnDisconnect).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let (bo_conn, mut bo_rx) = channel_conn();
        let (bo_frames_tx, bo_frames_rx) = mpsc::channel::<String>(8);
        let bo_session = {
            let service = f.service.clone();
            let frames = channel_frames(bo_frames_rx);
            tokio::spawn(async move { service.handle_connection(&bo_id, bo_conn, frames).await })
        };

        let bo_connected = recv_type(&mut bo_rx, MsgType::Connected).await;
        assert_eq!(ana_session.await.unwrap().unwrap(), Disconnect::SocketClosed);

        assert_eq!(bo_connected.data, "<p>\n    hi\n</p>\n");
        assert_eq!(f.editor.read().await, "<p>\n    hi\n</p>\n");

        drop(bo_frames_tx);
        assert_eq!(bo_session.await.unwrap().unwrap(), Disconnect::SocketClosed);
        assert_eq!(f.io.written().len(), 2);
    }

    /// Next message of type `msg_type`, skipping anything before it
    async fn recv_type(rx: &mut mpsc::Receiver<String>, msg_type: MsgType) -> BroadcastMsg {
        loop {
            let msg: BroadcastMsg = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
            if msg.msg_type == msg_type {
                return msg;
            }
        }
    }

    fn channel_frames(mut rx: mpsc::Receiver<String>) -> FrameStream {
        stream::poll_fn(move |cx| rx.poll_recv(cx)).boxed()
    }
}
