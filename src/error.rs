//! Typed error taxonomy for the engine (see spec §7).
//!
//! Scanner-internal and CLI-adapter code uses `anyhow::Result`; anything
//! that crosses the engine's public boundary (and therefore needs to be
//! matched on by callers) uses one of these types instead.

use thiserror::Error;

/// A single scanner returned an error during `ScanAll` or `Run`.
///
/// During `ScanAll` this never aborts the scan — it is surfaced as a
/// `scanner_error` event and the scan continues with the next scanner.
#[derive(Debug, Error)]
#[error("scanner '{scanner_id}' failed: {inner}")]
pub struct ScanError {
    pub scanner_id: String,
    #[source]
    pub inner: anyhow::Error,
}

/// A `ScanAll` or `Cleanup` stream was cancelled before it completed.
#[derive(Debug, Error)]
#[error("operation '{operation}' was cancelled")]
pub struct CancelledError {
    pub operation: String,
}

/// A `Cleanup` call presented a token that did not match the engine's
/// single stored token slot (missing, stale, or already consumed).
#[derive(Debug, Error)]
#[error("token error ({reason}): {token}")]
pub struct TokenError {
    pub token: String,
    pub reason: String,
}

impl TokenError {
    pub fn new(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            reason: reason.into(),
        }
    }
}

/// Fatal engine-construction/lookup failures. Per spec §7 these are the
/// only two conditions allowed to abort an operation outright rather
/// than being reported as data.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("scanner '{0}' not found")]
    ScannerNotFound(String),

    #[error("cannot determine the user's home directory")]
    NoHomeDirectory,
}

/// Error returned by `Engine::run`.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Cancelled(#[from] CancelledError),
}
