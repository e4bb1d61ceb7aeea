//! Error types for the plugboard core library.

/// Top-level error enum for the plugboard core library.
#[derive(Debug, thiserror::Error)]
pub enum PlugboardError {
    /// Sequence-sheet configuration problem; fatal for the whole pass.
    #[error("Sheet error: {0}")]
    Sheet(String),

    /// A candidate function, class, or module could not be resolved or
    /// instantiated.
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// A value could not be converted to the requested type kind.
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// A candidate callable failed during invocation.
    #[error("Invocation error: {0}")]
    Invocation(String),

    /// Invariant violation inside the core.
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PlugboardResult<T> = Result<T, PlugboardError>;
