//! Source adapter contract and content hashing.
//!
//! An adapter projects one source family (active page, notes, history,
//! downloads, context pills) into [`Document`]s with a uniform contract.
//! Adapters are pure with respect to their inputs and permission grants:
//! a missing permission yields an empty document list with a stderr
//! warning, never an error. The engine is parametric in the adapter.

use anyhow::Result;
use async_trait::async_trait;

use crate::chunk::{self, ChunkOptions};
use crate::classify::QueryTraits;
use crate::models::{Chunk, Document, SourceKind};

/// Per-invocation inputs supplied by the host: the page url for the page
/// adapter, the raw query for query-scoped index keys, the selected pill
/// ids, and advisory classifier traits for time filtering.
#[derive(Debug, Clone, Default)]
pub struct RetrievalContext {
    pub url: Option<String>,
    pub query: Option<String>,
    pub pill_ids: Vec<String>,
    pub traits: Option<QueryTraits>,
}

impl RetrievalContext {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn for_query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Default::default()
        }
    }
}

/// Uniform contract for enumerating documents, hashing content, chunking,
/// and producing a cache key for a retrieval context.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// The source family this adapter projects.
    fn source_kind(&self) -> SourceKind;

    /// Deterministic key for the logical corpus, e.g. `page:<url>`,
    /// `ctx:<hashed-pill-set>`, `downloads:q=<qlower[0..31]>`.
    fn index_key(&self, ctx: &RetrievalContext) -> String;

    /// True when this adapter enumerates more than one document per
    /// context; corpus adapters namespace chunk ids with `<doc_id>::`.
    fn corpus(&self) -> bool {
        false
    }

    /// Lazily enumerate documents for the context. Side-effect free apart
    /// from platform permission checks; may return an empty list.
    async fn list_documents(&self, ctx: &RetrievalContext) -> Result<Vec<Document>>;

    /// 32-bit non-cryptographic fingerprint of the document content.
    fn content_hash(&self, doc: &Document) -> String {
        content_hash_of(&doc.title, doc.text.as_deref().unwrap_or(""))
    }

    /// Materialize the full text of a document.
    async fn fetch_full_text(&self, doc: &Document) -> Result<String> {
        Ok(doc.text.clone().unwrap_or_default())
    }

    /// Chunk a document. The default fetches the full text, runs the
    /// shared chunker, and namespaces ids for corpus adapters.
    async fn chunk_document(&self, doc: &Document, opts: &ChunkOptions) -> Result<Vec<Chunk>> {
        let text = self.fetch_full_text(doc).await?;
        let chunks = chunk::chunk_text(&doc.id, &text, &doc.headings, opts);
        if self.corpus() {
            Ok(chunk::namespace_chunks(&doc.id, chunks))
        } else {
            Ok(chunks)
        }
    }

    /// Per-document caveats to surface alongside answers citing it.
    fn capture_disclaimers(&self, _doc: &Document) -> Vec<String> {
        Vec::new()
    }
}

/// djb2-variant hash over `(title, prefix(text, 16KB), text.len)`,
/// formatted as 8 hex digits. The basis for cache invalidation.
pub fn content_hash_of(title: &str, text: &str) -> String {
    let mut h = djb2_feed(5381, title.as_bytes());
    let cut = crate::text::snap_to_char_boundary(text, text.len().min(16 * 1024));
    h = djb2_feed(h, text[..cut].as_bytes());
    h = djb2_feed(h, text.len().to_string().as_bytes());
    format!("{:08x}", h)
}

/// Reduce per-document hashes into one corpus hash via the same djb2
/// combiner. Order-dependent on purpose: adapters enumerate snapshots in
/// stable host order, and sorting here would re-key every existing
/// multi-document cache entry.
pub fn combine_content_hashes<S: AsRef<str>>(hashes: &[S]) -> String {
    let mut h: u32 = 5381;
    for item in hashes {
        h = djb2_feed(h, item.as_ref().as_bytes());
    }
    format!("{:08x}", h)
}

fn djb2_feed(mut h: u32, bytes: &[u8]) -> u32 {
    for &b in bytes {
        h = h.wrapping_mul(33) ^ u32::from(b);
    }
    h
}
