//! Core data models for the retrieval pipeline.
//!
//! Documents are ephemeral projections produced by adapters on demand and
//! never persisted. Chunks are deterministic functions of a document and
//! the chunking config. Only the [`Index`] tree is serialized, by the
//! index store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which adapter family produced a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Page,
    Note,
    History,
    Download,
    Bookmark,
    Context,
}

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Page => "page",
            SourceKind::Note => "note",
            SourceKind::History => "history",
            SourceKind::Download => "download",
            SourceKind::Bookmark => "bookmark",
            SourceKind::Context => "context",
        }
    }
}

/// A document projected out of a source by an adapter.
///
/// Identity (`id`) is stable for a given source. The text may be absent
/// until [`crate::adapter::SourceAdapter::fetch_full_text`] runs.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub language: Option<String>,
    pub headings: Vec<String>,
    pub text: Option<String>,
    pub size_bytes: Option<u64>,
    pub source_kind: SourceKind,
    pub extra: Option<serde_json::Value>,
}

impl Document {
    /// Minimal constructor; optional fields start empty.
    pub fn new(id: impl Into<String>, title: impl Into<String>, source_kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: None,
            created_at: None,
            updated_at: None,
            language: None,
            headings: Vec::new(),
            text: None,
            size_bytes: None,
            source_kind,
            extra: None,
        }
    }
}

/// An ordered, size-bounded slice of a document's text.
///
/// `index` is 1-based within a document. The id is `chunk-<index>`
/// (corpus adapters prefix it with `<doc_id>::`) and is stable across
/// rebuilds for identical input and config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub doc_id: String,
    pub heading: Option<String>,
    pub content: String,
    pub size_chars: usize,
    pub index: usize,
}

/// Summary granularity, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryKind {
    Global,
    Section,
    Chunk,
}

impl SummaryKind {
    /// Priority rank used when pruning to the token budget: global
    /// summaries are kept before sections, sections before chunks.
    pub fn rank(&self) -> u8 {
        match self {
            SummaryKind::Global => 0,
            SummaryKind::Section => 1,
            SummaryKind::Chunk => 2,
        }
    }
}

/// A token-capped summary of a document, section, or chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub id: String,
    /// The document, section, or chunk this summarizes.
    pub ref_id: String,
    pub kind: SummaryKind,
    /// Already token-capped by the indexer.
    pub text: String,
    pub key_terms: Vec<String>,
    pub entities: Vec<String>,
}

/// A run of consecutive chunks sharing a heading. `chunk_ids` preserves
/// chunk order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub heading: String,
    pub chunk_ids: Vec<String>,
}

/// Presentational mirror of [`Section`] for host UIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    pub heading: String,
    pub level: u8,
    pub chunk_ids: Vec<String>,
}

/// Index metadata, including the content hash that keys the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub url: Option<String>,
    pub title: Option<String>,
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub content_hash: String,
}

/// The compact, token-budgeted index built over one corpus snapshot.
///
/// `key` is the store key `"<adapter index key>:<content hash>"`. The
/// summaries hold exactly one global entry followed by section and chunk
/// entries, and their summed token estimate fits the configured budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub key: String,
    pub meta: IndexMeta,
    pub toc: Vec<TocEntry>,
    pub summaries: Vec<Summary>,
    pub sections: Vec<Section>,
}

impl Index {
    /// Look up a section by id.
    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Look up a summary by the id of the thing it summarizes.
    pub fn summary_for(&self, ref_id: &str) -> Option<&Summary> {
        self.summaries.iter().find(|s| s.ref_id == ref_id)
    }
}

/// A scored retrieval candidate. `ref_id` names a section or chunk
/// contained in the index.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalCandidate {
    pub ref_id: String,
    pub score: f64,
    pub summary: Summary,
}

/// Confidence label attached to an answer.
///
/// Derived from a length heuristic; good enough to trigger a "thorough
/// mode" UI, not a factual calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Citation for one chunk the answer was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsedRef {
    pub doc_id: String,
    pub chunk_id: String,
    pub heading: Option<String>,
}

/// A grounded answer with citations.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub confidence: Confidence,
    pub used_refs: Vec<UsedRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub disclaimers: Vec<String>,
}
