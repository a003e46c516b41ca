use std::collections::HashMap;
use std::fmt;

/// Store-assigned identifier of a persisted message record.
///
/// Wraps the underlying rowid; opaque to callers and stable for the
/// record's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "messages/{}", self.0)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Direction {
    Outbound = 0,
    Inbound = 1,
}

impl Direction {
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Direction::Outbound),
            1 => Some(Direction::Inbound),
            _ => None,
        }
    }
}

/// Outbound delivery lifecycle of a message record.
///
/// A record starts in `Sending` and moves to exactly one terminal state.
/// Inbound records follow a separate lifecycle not covered here.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MessageStatus {
    Sending = 1,     // Persisted, delivery outcome not yet known
    Sent = 2,        // Accepted by the server, remote id assigned
    NotAccepted = 3, // Refused by the server
    Error = 4,       // Could not be delivered at all
}

impl MessageStatus {
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(MessageStatus::Sending),
            2 => Some(MessageStatus::Sent),
            3 => Some(MessageStatus::NotAccepted),
            4 => Some(MessageStatus::Error),
            _ => None,
        }
    }

    /// True once no further transition may occur.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MessageStatus::Sending)
    }
}

/// A persisted message record, one per composed or received message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub id: RecordId,
    /// Locally generated placeholder id, distinct per draft.
    pub msg_id: String,
    /// Assigned by the server once the message is accepted.
    pub remote_msg_id: Option<String>,
    pub peer: String,
    pub thread_id: i64,
    pub mime: String,
    pub content: String,
    pub direction: Direction,
    pub status: MessageStatus,
    pub unread: bool,
    /// Creation time in milliseconds since the epoch, never mutated.
    pub timestamp: i64,
}

/// Field set required to persist a freshly composed message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub msg_id: String,
    pub peer: String,
    pub mime: String,
    pub content: String,
    pub direction: Direction,
    pub status: MessageStatus,
    pub unread: bool,
    pub timestamp: i64,
}

/// Extra-data key carrying the server-assigned message id.
pub const EXTRA_MESSAGE_ID: &str = "i";

/// Result code of a status response from the message center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success,
    /// Any non-success code reported by the server.
    Failure(u32),
}

/// One outcome entry returned by the message center for a submitted job.
#[derive(Debug, Clone)]
pub struct StatusResponse {
    pub code: ResponseCode,
    pub extra: Option<HashMap<String, String>>,
}

impl StatusResponse {
    pub fn success(remote_msg_id: &str) -> Self {
        let mut extra = HashMap::new();
        extra.insert(EXTRA_MESSAGE_ID.to_string(), remote_msg_id.to_string());
        StatusResponse {
            code: ResponseCode::Success,
            extra: Some(extra),
        }
    }

    pub fn failure(code: u32) -> Self {
        StatusResponse {
            code: ResponseCode::Failure(code),
            extra: None,
        }
    }

    /// The server-assigned message id, if the response carries a usable one.
    pub fn remote_msg_id(&self) -> Option<&str> {
        self.extra
            .as_ref()
            .and_then(|extra| extra.get(EXTRA_MESSAGE_ID))
            .map(|id| id.as_str())
            .filter(|id| !id.is_empty())
    }
}
