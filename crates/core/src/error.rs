//! Error types for the roomcall capability core.

use thiserror::Error;

/// Result type alias for capability-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while interpreting capability documents.
#[derive(Debug, Error)]
pub enum Error {
    /// A parsed session description is structurally unusable
    /// (e.g. a media section the extraction cannot interpret).
    #[error("invalid session description: {0}")]
    InvalidSdp(String),

    /// A document is missing a field the transform requires.
    #[error("missing field `{0}`")]
    MissingField(&'static str),
}
