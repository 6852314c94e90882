//! Error types for the playground engine

use thiserror::Error;

/// Result type alias for playground operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the playground engine
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open or write the backing store
    #[error("Store error: {0}")]
    StoreError(String),

    /// Failed to execute a script inside the sandbox
    #[error("Script execution failed: {0}")]
    ScriptError(String),

    /// Script execution timed out
    #[error("Script timed out after {0}ms")]
    Timeout(u64),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
