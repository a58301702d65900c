//! Delivery policy and outbound message description.
use coedit_common::{FileMeta, MsgType};

use super::Client;

/// Which clients receive a message of a given type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Only the client that caused the message
    Sender,
    /// Everyone except the client that caused the message
    Others,
    /// Everyone, the sender included
    All,
    /// Nobody
    Drop,
}

impl Delivery {
    pub fn reaches(self, client_id: &str, sender_id: &str) -> bool {
        match self {
            Delivery::Sender => client_id == sender_id,
            Delivery::Others => client_id != sender_id,
            Delivery::All => true,
            Delivery::Drop => false,
        }
    }
}

/// Outbound types and their audience; types not listed are dropped
pub const DELIVERY_POLICY: [(MsgType, Delivery); 13] = [
    (MsgType::Connected, Delivery::Sender),
    (MsgType::ConnDisconnect, Delivery::Sender),
    (MsgType::ConnNotReady, Delivery::Sender),
    (MsgType::ConnNotUnready, Delivery::Sender),
    (MsgType::ServerFileNotReady, Delivery::Sender),
    (MsgType::ClientsConnected, Delivery::Others),
    (MsgType::ClientsTextChange, Delivery::Others),
    (MsgType::ClientsDisconnected, Delivery::Others),
    (MsgType::ClientsCursorChange, Delivery::Others),
    (MsgType::ServerFileNotSaved, Delivery::All),
    (MsgType::ServerFileSaved, Delivery::All),
    (MsgType::ClientsReady, Delivery::All),
    (MsgType::ClientsUnready, Delivery::All),
];

pub fn delivery(msg_type: MsgType) -> Delivery {
    DELIVERY_POLICY
        .iter()
        .find(|(t, _)| *t == msg_type)
        .map_or(Delivery::Drop, |(_, delivery)| *delivery)
}

/// A message to fan out, attributed to the client that caused it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub msg_type: MsgType,
    pub sender_id: String,
    pub sender: String,
    pub data: String,
    pub file_meta: Option<FileMeta>,
}

impl Outgoing {
    pub fn new(msg_type: MsgType, client: &Client) -> Self {
        Self {
            msg_type,
            sender_id: client.id.clone(),
            sender: client.username.clone(),
            data: String::new(),
            file_meta: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_file_meta(mut self, file_meta: Option<FileMeta>) -> Self {
        self.file_meta = file_meta;
        self
    }
}
