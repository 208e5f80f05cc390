//! Shared error taxonomy and result alias.
//!
//! Remote failures are recoverable: progress callers catch them and fall
//! back to the local store. Local sqlite failures are not; if the profile's
//! storage is gone the whole page is in trouble, so they propagate.

use thiserror::Error;

/// Error types for the progress core
#[derive(Debug, Error)]
pub enum LamadError {
    /// Caller supplied invalid input (empty identifier, missing secret).
    /// Surfaced to the UI as a user-visible message; no state mutation.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Delegated sign-in/sign-up rejected by the identity provider,
    /// or attempted without a configured remote backend.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// Remote read/write failed (network, backend down). Never surfaced as
    /// a hard failure for progress operations.
    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// Local database failure.
    #[error("local store failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failure: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LamadError>;
