//! On-device retrieval-augmented answering over host-provided sources.
//!
//! The pipeline: a [`adapter::SourceAdapter`] projects a source (active
//! page, notes, history, downloads, context pills) into documents; the
//! chunker splits them deterministically; the indexer builds a compact,
//! token-budgeted [`models::Index`] of summaries; the retriever scores
//! summaries lexically (with an optional model rerank); and the
//! progressive reader loads the cited chunks and asks the model once for
//! a grounded [`models::Answer`] with citations and a confidence label.
//!
//! Indexes are cached in an [`store::IndexStore`] keyed by adapter index
//! key plus content hash, with LRU eviction and a TTL. The whole flow is
//! driven by [`engine::Engine`] and is cancellable at every suspension
//! point through a `CancellationToken`.

pub mod adapter;
pub mod adapter_context;
pub mod adapter_downloads;
pub mod adapter_history;
pub mod adapter_notes;
pub mod adapter_page;
pub mod budget;
pub mod chunk;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod expand;
pub mod indexer;
pub mod model;
pub mod models;
pub mod progress;
pub mod reader;
pub mod retrieve;
pub mod store;
mod text;

pub use adapter::{RetrievalContext, SourceAdapter};
pub use config::{load_config, CoreConfig};
pub use engine::{BuildOutcome, Engine, RefsOutcome};
pub use error::{Error, Result};
pub use model::{ModelProvider, PromptCapability};
pub use models::{Answer, Confidence, Index, UsedRef};
pub use progress::{ProgressMode, ProgressReporter, RetrievalEvent, RetrievalPhase};
pub use store::{IndexStore, MemoryBackend, StorageBackend};
