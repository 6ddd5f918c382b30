//! Session core error types

use thiserror::Error;

/// Errors that can occur while managing the session worker
#[derive(Error, Debug)]
pub enum SessionError {
    /// Failed to spawn the poll-loop worker thread
    #[error("Failed to spawn session worker thread: {0}")]
    Spawn(String),

    /// The worker is already running
    #[error("Session worker already running")]
    AlreadyRunning,
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
