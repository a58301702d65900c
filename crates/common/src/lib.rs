// ================
// crates/common/src/lib.rs
// ================
//! Common types and structures
//! used for communication between the `coedit` editor client and server.
//! This module defines the WebSocket protocol messages and supporting types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Message type tag carried in the `type` field of every envelope.
///
/// `conn-*` types flow from a connection to the server (plus the self-directed
/// acknowledgements), `clients-*` and `server-*` types flow from the server to clients.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgType {
    /// Connection asks the server to persist the document
    #[serde(rename = "conn-save")]
    ConnSave,
    /// Connection sends a text change operation
    #[serde(rename = "conn-text-change")]
    ConnTextChange,
    /// Connection moved its cursor or selection
    #[serde(rename = "conn-cursor-change")]
    ConnCursorChange,
    /// Connection marks its content as ready for writing
    #[serde(rename = "conn-ready")]
    ConnReady,
    /// Connection withdraws its ready mark
    #[serde(rename = "conn-unready")]
    ConnUnready,
    /// Connection asks to be disconnected (also sent back to it on teardown)
    #[serde(rename = "conn-disconnect")]
    ConnDisconnect,

    /// Acknowledgement of a registered connection, carries the document
    #[serde(rename = "conn-connected")]
    Connected,
    /// Another client connected
    #[serde(rename = "clients-connected")]
    ClientsConnected,
    /// Another client marked itself ready
    #[serde(rename = "clients-ready")]
    ClientsReady,
    /// Another client withdrew its ready mark
    #[serde(rename = "clients-unready")]
    ClientsUnready,
    /// Another client changed the text
    #[serde(rename = "clients-text-change")]
    ClientsTextChange,
    /// Another client moved its cursor
    #[serde(rename = "clients-cursor-change")]
    ClientsCursorChange,
    /// Another client disconnected
    #[serde(rename = "clients-disconnected")]
    ClientsDisconnected,
    /// The document was persisted
    #[serde(rename = "server-file-saved")]
    ServerFileSaved,

    /// Ready request rejected
    #[serde(rename = "conn-not-ready")]
    ConnNotReady,
    /// Unready request rejected
    #[serde(rename = "conn-not-unready")]
    ConnNotUnready,
    /// Save requested while not every editor is ready
    #[serde(rename = "server-file-not-ready")]
    ServerFileNotReady,
    /// Persisting or changing the document failed
    #[serde(rename = "server-file-not-saved")]
    ServerFileNotSaved,
}

impl MsgType {
    /// Every known message type, in declaration order.
    pub const ALL: [MsgType; 18] = [
        MsgType::ConnSave,
        MsgType::ConnTextChange,
        MsgType::ConnCursorChange,
        MsgType::ConnReady,
        MsgType::ConnUnready,
        MsgType::ConnDisconnect,
        MsgType::Connected,
        MsgType::ClientsConnected,
        MsgType::ClientsReady,
        MsgType::ClientsUnready,
        MsgType::ClientsTextChange,
        MsgType::ClientsCursorChange,
        MsgType::ClientsDisconnected,
        MsgType::ServerFileSaved,
        MsgType::ConnNotReady,
        MsgType::ConnNotUnready,
        MsgType::ServerFileNotReady,
        MsgType::ServerFileNotSaved,
    ];

    /// Wire token of this type
    pub fn as_str(self) -> &'static str {
        match self {
            MsgType::ConnSave => "conn-save",
            MsgType::ConnTextChange => "conn-text-change",
            MsgType::ConnCursorChange => "conn-cursor-change",
            MsgType::ConnReady => "conn-ready",
            MsgType::ConnUnready => "conn-unready",
            MsgType::ConnDisconnect => "conn-disconnect",
            MsgType::Connected => "conn-connected",
            MsgType::ClientsConnected => "clients-connected",
            MsgType::ClientsReady => "clients-ready",
            MsgType::ClientsUnready => "clients-unready",
            MsgType::ClientsTextChange => "clients-text-change",
            MsgType::ClientsCursorChange => "clients-cursor-change",
            MsgType::ClientsDisconnected => "clients-disconnected",
            MsgType::ServerFileSaved => "server-file-saved",
            MsgType::ConnNotReady => "conn-not-ready",
            MsgType::ConnNotUnready => "conn-not-unready",
            MsgType::ServerFileNotReady => "server-file-not-ready",
            MsgType::ServerFileNotSaved => "server-file-not-saved",
        }
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a wire token does not name a known message type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMsgType(pub String);

impl fmt::Display for UnknownMsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid msg type '{}'", self.0)
    }
}

impl std::error::Error for UnknownMsgType {}

impl FromStr for MsgType {
    type Err = UnknownMsgType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MsgType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownMsgType(s.to_string()))
    }
}

/// Inbound envelope `{type, data}`.
///
/// Only the type tag is decoded here; the payload is decoded per type from the raw frame.
#[derive(Deserialize, Debug, Clone)]
pub struct InboundEnvelope {
    /// Raw type token, validated with [`MsgType::from_str`]
    #[serde(rename = "type")]
    pub msg_type: String,
}

/// Edit action of a [`ChangeMsg`]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Insert,
    Remove,
}

/// Row/column position inside the document
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeRow {
    /// 0-indexed line number
    pub row: usize,
    /// 0-indexed offset within the line
    pub column: usize,
}

/// A single edit operation, addressed against the document as it is before the edit
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChangeMsg {
    /// Insert or remove
    pub action: ChangeAction,
    /// Start position of the edited span
    pub start: ChangeRow,
    /// End position of the edited span
    pub end: ChangeRow,
    /// Inserted lines, or the removed lines for a removal
    pub lines: Vec<String>,
}

/// `conn-text-change` payload
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TextChangeMsg {
    pub data: ChangeMsg,
}

/// Cursor or selection of a client
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorChange {
    pub index: usize,
    pub length: usize,
}

/// `conn-cursor-change` payload
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CursorChangeMsg {
    pub data: CursorChange,
}

/// Kind of document being edited
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Html,
    Css,
    Javascript,
}

impl FileType {
    /// Map a file extension (with its leading dot, e.g. `.css`) to a file type
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            ".html" => Some(FileType::Html),
            ".css" => Some(FileType::Css),
            ".js" => Some(FileType::Javascript),
            _ => None,
        }
    }
}

/// Document metadata
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Base name of the document
    pub name: String,
    /// Kind of document
    pub extension: FileType,
}

/// Roster entry for a registered client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClientView {
    pub username: String,
    pub color: String,
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<CursorChange>,
}

/// Outbound envelope written to each targeted client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BroadcastMsg {
    /// Payload; document contents or the raw originating frame
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
    /// Document metadata, only on `conn-connected`
    #[serde(rename = "fileMeta", default, skip_serializing_if = "Option::is_none")]
    pub file_meta: Option<FileMeta>,
    /// Message type
    #[serde(rename = "type")]
    pub msg_type: MsgType,
    /// Username of the client that caused the message
    pub client: String,
    /// Registered clients ordered by color
    pub clients: Vec<ClientView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msg_type_tokens() {
        for msg_type in MsgType::ALL {
            let json = serde_json::to_string(&msg_type).unwrap();
            assert_eq!(json, format!("\"{}\"", msg_type.as_str()));
            assert_eq!(msg_type.as_str().parse::<MsgType>().unwrap(), msg_type);
        }

        let err = "conn-shout".parse::<MsgType>().unwrap_err();
        assert_eq!(err.to_string(), "invalid msg type 'conn-shout'");
    }

    #[test]
    fn test_text_change_decoding() {
        let raw = r#"{"type":"conn-text-change","data":{"action":"insert",
            "start":{"row":3,"column":13},"end":{"row":3,"column":14},"lines":["2"]}}"#;

        let envelope: InboundEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.msg_type, "conn-text-change");

        let msg: TextChangeMsg = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.data.action, ChangeAction::Insert);
        assert_eq!(msg.data.start, ChangeRow { row: 3, column: 13 });
        assert_eq!(msg.data.lines, vec!["2".to_string()]);
    }

    #[test]
    fn test_broadcast_msg_omits_empty_fields() {
        let msg = BroadcastMsg {
            data: String::new(),
            file_meta: None,
            msg_type: MsgType::ClientsConnected,
            client: "ana".to_string(),
            clients: vec![ClientView {
                username: "ana".to_string(),
                color: "blue".to_string(),
                ready: false,
                position: None,
            }],
        };

        let value: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "clients-connected",
                "client": "ana",
                "clients": [{"username": "ana", "color": "blue", "ready": false}],
            })
        );
    }

    #[test]
    fn test_file_type_from_extension() {
        assert_eq!(FileType::from_extension(".css"), Some(FileType::Css));
        assert_eq!(FileType::from_extension(".js"), Some(FileType::Javascript));
        assert_eq!(FileType::from_extension(".txt"), None);
        assert_eq!(
            serde_json::to_string(&FileType::Javascript).unwrap(),
            "\"javascript\""
        );
    }
}
