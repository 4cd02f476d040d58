//! Active-page adapter: projects the page the user is looking at into a
//! single document. The host captures the page snapshot (readability
//! extraction, heading outline) and hands it to the constructor; the
//! core never touches the DOM.

use anyhow::Result;
use async_trait::async_trait;

use crate::adapter::{RetrievalContext, SourceAdapter};
use crate::models::{Document, SourceKind};

/// Host-captured snapshot of the active page.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub id: String,
    pub url: String,
    pub title: String,
    pub text: String,
    pub headings: Vec<String>,
    pub language: Option<String>,
}

pub struct PageAdapter {
    page: PageSnapshot,
}

impl PageAdapter {
    pub fn new(page: PageSnapshot) -> Self {
        Self { page }
    }
}

#[async_trait]
impl SourceAdapter for PageAdapter {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Page
    }

    fn index_key(&self, ctx: &RetrievalContext) -> String {
        let url = ctx.url.as_deref().unwrap_or(&self.page.url);
        format!("page:{}", url)
    }

    async fn list_documents(&self, _ctx: &RetrievalContext) -> Result<Vec<Document>> {
        let mut doc = Document::new(&self.page.id, &self.page.title, SourceKind::Page);
        doc.url = Some(self.page.url.clone());
        doc.language = self.page.language.clone();
        doc.headings = self.page.headings.clone();
        doc.text = Some(self.page.text.clone());
        doc.size_bytes = Some(self.page.text.len() as u64);
        Ok(vec![doc])
    }
}
