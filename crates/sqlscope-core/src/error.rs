//! Error types for sqlscope

use thiserror::Error;

/// Core error type for sqlscope operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SqlscopeError {
    /// The opaque analysis engine rejected a call and returned a decoded message.
    #[error("Engine call failed: {0}")]
    Engine(String),

    /// An operation was attempted on a released or never-created handle.
    /// This indicates a lifecycle bug in the caller, not an engine problem.
    #[error("Null handle access: {0}")]
    NullHandle(&'static str),

    /// An external text source could not be loaded into a script slot.
    #[error("Script source load failed: {0}")]
    LoadSource(String),
}

impl SqlscopeError {
    /// Wrap a decoded engine message
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine(message.into())
    }
}

/// Result type alias for sqlscope operations
pub type Result<T> = std::result::Result<T, SqlscopeError>;
