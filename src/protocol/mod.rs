//! Protocol Module
//!
//! The textual line grammar spoken over the local socket.
//!
//! ## Request Grammar
//!
//! ```text
//! PUT {key} {value}
//! GET {key}
//! POST {key} {value}
//! DELETE {key}
//! ```
//!
//! Braces are mandatory delimiters around the key and value byte sequences
//! (which therefore must not contain `}`). A missing brace, an empty key,
//! or a missing value for PUT/POST is a decode failure; the transport turns
//! it into an ERROR-tagged task instead of invoking the engine.
//!
//! ## Handshake
//!
//! The first line of every connection is `HELLO {pid}`; the server assigns
//! an integer handle and replies `HANDLE {n}`.
//!
//! ## Control Lines
//!
//! `PAUSE {handle}`, `RESUME {handle}`, `TERMINATE {handle}` steer another
//! peer's lifecycle. They ride the same channel as data requests but are
//! handled at the connection, never enqueued.
//!
//! ## Responses
//!
//! Single lines: `OK`, `OK {payload}`, `NOT_FOUND`, `ERROR {message}`.

mod command;
mod response;
mod text;

pub use command::{Command, Control, Request};
pub use response::{Response, Status};
pub use text::{
    encode_handle, parse_command, parse_handle, parse_handshake, parse_request, parse_response,
};
