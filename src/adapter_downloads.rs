//! Downloads adapter. Permission-gated like history. The index key is
//! scoped by the query (`downloads:q=<qlower[0..31]>`) because the
//! enumeration itself is query-dependent.
//!
//! Only file names and metadata are projected; download contents are
//! never read, and a disclaimer says so on every document.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::adapter::{RetrievalContext, SourceAdapter};
use crate::models::{Document, SourceKind};

/// One download record as exported by the host.
#[derive(Debug, Clone)]
pub struct DownloadItem {
    pub id: String,
    pub filename: String,
    pub url: String,
    pub mime: Option<String>,
    pub size_bytes: Option<u64>,
    pub downloaded_at: DateTime<Utc>,
}

pub struct DownloadsAdapter {
    items: Vec<DownloadItem>,
    permitted: bool,
}

impl DownloadsAdapter {
    pub fn new(items: Vec<DownloadItem>, permitted: bool) -> Self {
        Self { items, permitted }
    }
}

#[async_trait]
impl SourceAdapter for DownloadsAdapter {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Download
    }

    fn index_key(&self, ctx: &RetrievalContext) -> String {
        let q = ctx.query.as_deref().unwrap_or("").to_lowercase();
        let scoped: String = q.chars().take(32).collect();
        format!("downloads:q={}", scoped)
    }

    fn corpus(&self) -> bool {
        true
    }

    async fn list_documents(&self, _ctx: &RetrievalContext) -> Result<Vec<Document>> {
        if !self.permitted {
            eprintln!("Warning: downloads permission not granted; returning no documents");
            return Ok(Vec::new());
        }

        Ok(self
            .items
            .iter()
            .map(|item| {
                let mut doc = Document::new(&item.id, &item.filename, SourceKind::Download);
                doc.url = Some(item.url.clone());
                doc.created_at = Some(item.downloaded_at);
                doc.size_bytes = item.size_bytes;
                let mut text = format!("{}\n{}", item.filename, item.url);
                if let Some(mime) = &item.mime {
                    text.push_str(&format!("\ntype: {}", mime));
                }
                doc.text = Some(text);
                doc
            })
            .collect())
    }

    fn capture_disclaimers(&self, _doc: &Document) -> Vec<String> {
        vec![
            "Download contents were not read; answers rely on file names and metadata only."
                .to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<DownloadItem> {
        vec![DownloadItem {
            id: "dl1".into(),
            filename: "quarterly-report.pdf".into(),
            url: "https://files.example/quarterly-report.pdf".into(),
            mime: Some("application/pdf".into()),
            size_bytes: Some(1024),
            downloaded_at: Utc::now(),
        }]
    }

    #[test]
    fn index_key_scopes_by_lowercased_query_prefix() {
        let adapter = DownloadsAdapter::new(items(), true);
        let ctx = RetrievalContext::for_query("Quarterly REPORT with a long trailing tail beyond thirty-two chars");
        let key = adapter.index_key(&ctx);
        assert!(key.starts_with("downloads:q=quarterly report"));
        assert!(key.len() <= "downloads:q=".len() + 32);
    }

    #[tokio::test]
    async fn no_permission_returns_empty_without_error() {
        let adapter = DownloadsAdapter::new(items(), false);
        let docs = adapter
            .list_documents(&RetrievalContext::default())
            .await
            .unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn every_document_carries_the_metadata_disclaimer() {
        let adapter = DownloadsAdapter::new(items(), true);
        let docs = adapter
            .list_documents(&RetrievalContext::default())
            .await
            .unwrap();
        assert_eq!(adapter.capture_disclaimers(&docs[0]).len(), 1);
    }
}
