use thiserror::Error;

/// Error type for sync runtime operations.
///
/// Delivered exactly once per pending result, as the operation's failure
/// outcome. A local-cache miss during a local-only read is a normal success
/// value, never an error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// The remote boundary could not be reached
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// The remote processed the request and rejected it
    #[error("Remote rejected: {0}")]
    RemoteRejected(String),

    /// The operation was abandoned before reaching a natural outcome
    #[error("Operation cancelled")]
    Cancelled,

    /// The local cache engine failed
    #[error("Cache error: {0}")]
    Cache(String),
}

/// Result type alias for operations that can result in a SyncError
pub type SyncResult<T> = Result<T, SyncError>;
