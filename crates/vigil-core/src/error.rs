//! Engine error types.

use thiserror::Error;

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A collaborator behind a persistence boundary failed.
    ///
    /// In-memory state already applied before the failure is kept; retrying
    /// the persistence call is the caller's responsibility.
    #[error("Persistence error: {0}")]
    Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// An inbound event was missing required identifiers.
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Failed to compile the keyword automaton.
    #[error("Matcher build error: {0}")]
    MatcherBuild(String),

    /// A programming invariant was violated. Indicates a bug, not a
    /// recoverable runtime condition.
    #[error("Invariant violation: {0}")]
    Invariant(String),
}

impl EngineError {
    /// Wraps an arbitrary collaborator error as a persistence failure.
    pub fn persistence<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        EngineError::Persistence(Box::new(err))
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
