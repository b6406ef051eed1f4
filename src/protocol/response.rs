//! Response definitions
//!
//! Represents replies sent back to peers.

use bytes::Bytes;

/// Response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
    Error,
}

/// A reply to a peer request
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Status tag
    pub status: Status,

    /// Value for GET, error message for ERROR
    pub payload: Option<Bytes>,
}

impl Response {
    /// An OK reply without payload
    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            payload: None,
        }
    }

    /// An OK reply carrying a payload
    pub fn ok_with(payload: Bytes) -> Self {
        Self {
            status: Status::Ok,
            payload: Some(payload),
        }
    }

    /// A NOT_FOUND reply
    pub fn not_found() -> Self {
        Self {
            status: Status::NotFound,
            payload: None,
        }
    }

    /// An ERROR reply with a message
    pub fn error(message: impl AsRef<str>) -> Self {
        Self {
            status: Status::Error,
            payload: Some(Bytes::copy_from_slice(message.as_ref().as_bytes())),
        }
    }

    /// Encode as a single newline-terminated wire line
    pub fn to_line(&self) -> Vec<u8> {
        let mut line = Vec::new();
        match self.status {
            Status::Ok => {
                line.extend_from_slice(b"OK");
                if let Some(payload) = &self.payload {
                    line.extend_from_slice(b" {");
                    line.extend_from_slice(payload);
                    line.push(b'}');
                }
            }
            Status::NotFound => line.extend_from_slice(b"NOT_FOUND"),
            Status::Error => {
                line.extend_from_slice(b"ERROR {");
                if let Some(message) = &self.payload {
                    line.extend_from_slice(message);
                }
                line.push(b'}');
            }
        }
        line.push(b'\n');
        line
    }
}
