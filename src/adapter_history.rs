//! Browser-history adapter. Permission-gated: without the grant it
//! yields an empty list with a warning rather than an error, so
//! retrieval degrades to "no documents available".
//!
//! Classifier traits on the context narrow the enumeration: a time
//! window keeps only entries visited inside it, and `searches_only`
//! keeps only entries that carry a search query.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::adapter::{RetrievalContext, SourceAdapter};
use crate::classify::TimeWindow;
use crate::models::{Document, SourceKind};

/// One history entry as exported by the host.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub url: String,
    pub title: String,
    pub visited_at: DateTime<Utc>,
    /// Set when the visit was a search-engine query.
    pub search_query: Option<String>,
}

pub struct HistoryAdapter {
    entries: Vec<HistoryEntry>,
    permitted: bool,
}

impl HistoryAdapter {
    pub fn new(entries: Vec<HistoryEntry>, permitted: bool) -> Self {
        Self { entries, permitted }
    }

    fn in_window(entry: &HistoryEntry, window: TimeWindow, now: DateTime<Utc>) -> bool {
        match window {
            TimeWindow::Today => entry.visited_at.date_naive() == now.date_naive(),
            TimeWindow::Yesterday => {
                entry.visited_at.date_naive() == (now - Duration::days(1)).date_naive()
            }
            TimeWindow::LastDays(n) => entry.visited_at >= now - Duration::days(i64::from(n)),
        }
    }
}

#[async_trait]
impl SourceAdapter for HistoryAdapter {
    fn source_kind(&self) -> SourceKind {
        SourceKind::History
    }

    fn index_key(&self, _ctx: &RetrievalContext) -> String {
        "history:all".to_string()
    }

    fn corpus(&self) -> bool {
        true
    }

    async fn list_documents(&self, ctx: &RetrievalContext) -> Result<Vec<Document>> {
        if !self.permitted {
            eprintln!("Warning: history permission not granted; returning no documents");
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let traits = ctx.traits.clone().unwrap_or_default();

        Ok(self
            .entries
            .iter()
            .filter(|e| {
                traits
                    .time_window
                    .map_or(true, |w| Self::in_window(e, w, now))
            })
            .filter(|e| !traits.searches_only || e.search_query.is_some())
            .map(|e| {
                let mut doc = Document::new(&e.url, &e.title, SourceKind::History);
                doc.url = Some(e.url.clone());
                doc.created_at = Some(e.visited_at);
                let mut text = format!("{}\n{}", e.title, e.url);
                if let Some(q) = &e.search_query {
                    text.push_str(&format!("\nsearched for: {}", q));
                }
                doc.text = Some(text);
                doc
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::QueryTraits;

    fn entries() -> Vec<HistoryEntry> {
        vec![
            HistoryEntry {
                url: "https://docs.rs/tokio".into(),
                title: "tokio - Rust".into(),
                visited_at: Utc::now(),
                search_query: None,
            },
            HistoryEntry {
                url: "https://search.example/?q=async+rust".into(),
                title: "async rust - search".into(),
                visited_at: Utc::now() - Duration::days(10),
                search_query: Some("async rust".into()),
            },
        ]
    }

    #[tokio::test]
    async fn no_permission_returns_empty_without_error() {
        let adapter = HistoryAdapter::new(entries(), false);
        let docs = adapter
            .list_documents(&RetrievalContext::default())
            .await
            .unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn time_window_filters_entries() {
        let adapter = HistoryAdapter::new(entries(), true);
        let ctx = RetrievalContext {
            traits: Some(QueryTraits {
                time_window: Some(TimeWindow::LastDays(2)),
                ..Default::default()
            }),
            ..Default::default()
        };
        let docs = adapter.list_documents(&ctx).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "https://docs.rs/tokio");
    }

    #[tokio::test]
    async fn searches_only_keeps_search_visits() {
        let adapter = HistoryAdapter::new(entries(), true);
        let ctx = RetrievalContext {
            traits: Some(QueryTraits {
                searches_only: true,
                ..Default::default()
            }),
            ..Default::default()
        };
        let docs = adapter.list_documents(&ctx).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].text.as_deref().unwrap().contains("async rust"));
    }
}
