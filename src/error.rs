//! Error taxonomy for the retrieval core.
//!
//! Adapters never surface missing permissions or missing data as errors;
//! those become empty document lists with a stderr warning. The variants
//! here are the failures that cross the public API boundary. Everything
//! else is recovered locally (rerank falls back to lexical order, store
//! I/O falls back to an in-process map, malformed persisted entries are
//! treated as cache misses).

use thiserror::Error;

/// Failures surfaced by the engine and its collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// The adapter yielded no documents for this context. Callers show an
    /// empty state; see [`crate::engine::Engine::ask_whole_corpus`].
    #[error("no documents available from source '{0}'")]
    NoDocuments(String),

    /// A cancellation token fired at a suspension point. Never wrapped
    /// into a partial [`crate::models::Answer`].
    #[error("operation aborted")]
    Aborted,

    /// The prompt capability failed or was not provided where required.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// Rejected configuration, raised by [`crate::config::load_config`].
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unclassified failure bubbling up from an adapter or backend.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True when the error is the cooperative-cancellation signal.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Aborted)
    }
}
