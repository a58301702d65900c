//! Decoding and dispatch of inbound frames.
use coedit_common::{CursorChangeMsg, InboundEnvelope, MsgType, TextChangeMsg};

use super::{Disconnect, SessionService};
use crate::error::AppError;
use crate::hub::Client;

/// An inbound frame with its validated type tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub msg_type: MsgType,
    pub raw: String,
}

impl Inbound {
    pub fn decode(raw: String) -> Result<Self, AppError> {
        let envelope: InboundEnvelope = serde_json::from_str(&raw)?;
        let msg_type = envelope
            .msg_type
            .parse::<MsgType>()
            .map_err(|e| AppError::Protocol(e.to_string()))?;

        Ok(Self { msg_type, raw })
    }
}

/// Result of one dispatched message
#[derive(Debug, Default)]
pub struct Handled {
    /// Message to broadcast on behalf of the sender
    pub reply: Option<MsgType>,
    /// Payload of the reply
    pub data: String,
    /// End the session
    pub close: Option<Disconnect>,
    /// Failure to log
    pub error: Option<AppError>,
}

impl Handled {
    fn reply(msg_type: MsgType) -> Self {
        Self {
            reply: Some(msg_type),
            ..Self::default()
        }
    }

    fn failed(msg_type: MsgType, error: AppError) -> Self {
        Self {
            reply: Some(msg_type),
            error: Some(error),
            ..Self::default()
        }
    }

    fn close(reason: Disconnect, error: Option<AppError>) -> Self {
        Self {
            close: Some(reason),
            error,
            ..Self::default()
        }
    }
}

impl SessionService {
    pub(crate) async fn incoming(&self, client: &Client, msg: Inbound) -> Handled {
        match msg.msg_type {
            MsgType::ConnDisconnect => Handled::close(Disconnect::ClientRequested, None),

            MsgType::ConnSave => {
                if !self.validator.is_ready() {
                    return Handled::failed(
                        MsgType::ServerFileNotReady,
                        AppError::Validation("validator not ready".to_string()),
                    );
                }

                match self.editor.write().await {
                    Ok(()) => Handled::reply(MsgType::ServerFileSaved),
                    Err(e) => Handled::failed(MsgType::ServerFileNotSaved, e),
                }
            },

            MsgType::ConnTextChange => {
                let change = match serde_json::from_str::<TextChangeMsg>(&msg.raw) {
                    Ok(change) => change,
                    Err(e) => return Handled::close(Disconnect::ProtocolViolation, Some(e.into())),
                };

                match self.editor.change(&change.data).await {
                    Ok(()) => Handled {
                        data: msg.raw,
                        ..Handled::reply(MsgType::ClientsTextChange)
                    },
                    Err(e) => Handled::failed(MsgType::ServerFileNotSaved, e),
                }
            },

            MsgType::ConnCursorChange => {
                let cursor = match serde_json::from_str::<CursorChangeMsg>(&msg.raw) {
                    Ok(cursor) => cursor,
                    Err(e) => return Handled::close(Disconnect::ProtocolViolation, Some(e.into())),
                };

                self.hub.set_position(&client.id, cursor.data).await;
                Handled::reply(MsgType::ClientsCursorChange)
            },

            MsgType::ConnReady => {
                if let Err(e) = self.validator.ready_client(&client.id) {
                    return Handled::failed(MsgType::ConnNotReady, e);
                }
                self.hub.set_ready(&client.id, true).await;

                if !self.validator.is_ready() {
                    return Handled::reply(MsgType::ClientsReady);
                }

                // everyone agreed, persist and start a new round
                if let Err(e) = self.editor.write().await {
                    return Handled::failed(MsgType::ServerFileNotSaved, e);
                }
                self.validator.clear();
                self.hub.set_ready_all(false).await;

                Handled::reply(MsgType::ServerFileSaved)
            },

            MsgType::ConnUnready => {
                if let Err(e) = self.validator.unready_client(&client.id) {
                    return Handled::failed(MsgType::ConnNotUnready, e);
                }
                self.hub.set_ready(&client.id, false).await;

                Handled::reply(MsgType::ClientsUnready)
            },

            other => Handled::close(
                Disconnect::ProtocolViolation,
                Some(AppError::Protocol(format!("unknown message type '{other}'"))),
            ),
        }
    }
}
