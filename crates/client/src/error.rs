//! Error types for the roomcall client.
//!
//! The taxonomy distinguishes failures that end the session (transport
//! connect/close, malformed frames) from failures that abort a single
//! negotiation round (missing fields, rejected requests, description
//! apply failures) and leave prior session state intact. A remote codec
//! without a local match is not an error at all; negotiation simply
//! excludes it.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for roomcall client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the roomcall client.
#[derive(Debug, Error)]
pub enum Error {
    /// Signaling transport failure: resolve, connect, handshake or
    /// socket error. Fatal to the session; there is no reconnect.
    #[error("transport error: {0}")]
    Transport(String),

    /// The signaling connection closed.
    #[error("signaling connection closed")]
    ConnectionClosed,

    /// An inbound frame was not valid JSON, or a payload did not match
    /// its declared shape.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A request saw no response within the configured timeout.
    #[error("request timed out after {0:?}")]
    RequestTimeout(Duration),

    /// The server answered a request with `ok: false`.
    #[error("server rejected `{method}`: {reason}")]
    ServerRejected {
        method: &'static str,
        reason: String,
    },

    /// A server payload is missing a field the sequence requires.
    /// Aborts the current negotiation round only.
    #[error("missing field `{0}` in server payload")]
    MissingField(&'static str),

    /// The media engine failed to create or apply a session
    /// description. Aborts the current negotiation round only.
    #[error("negotiation error: {0}")]
    Negotiation(String),

    /// Internal channel plumbing is gone (the session was torn down
    /// while an operation was in flight).
    #[error("signaling channel closed")]
    ChannelClosed,

    /// Capability-core failure (malformed capability document).
    #[error(transparent)]
    Core(#[from] roomcall_core::Error),
}

impl Error {
    /// Whether this failure only aborts one negotiation round, leaving
    /// the session (consumer table, transport caches) usable.
    pub fn is_round_local(&self) -> bool {
        matches!(
            self,
            Error::MissingField(_) | Error::Negotiation(_) | Error::ServerRejected { .. }
        )
    }
}
