//! Context-pill adapter: user-selected snippets acting as ad-hoc
//! documents. The index key hashes the selected pill set so two
//! different selections never share a cache entry.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::adapter::{RetrievalContext, SourceAdapter};
use crate::models::{Document, SourceKind};

/// One pill: a snippet or list the user attached to the conversation.
#[derive(Debug, Clone)]
pub struct ContextPill {
    pub id: String,
    pub label: String,
    pub text: String,
}

pub struct ContextPillAdapter {
    pills: Vec<ContextPill>,
}

impl ContextPillAdapter {
    pub fn new(pills: Vec<ContextPill>) -> Self {
        Self { pills }
    }

    /// Pills selected by the context; an empty selection means all.
    fn selected<'a>(&'a self, ctx: &RetrievalContext) -> Vec<&'a ContextPill> {
        if ctx.pill_ids.is_empty() {
            self.pills.iter().collect()
        } else {
            self.pills
                .iter()
                .filter(|p| ctx.pill_ids.contains(&p.id))
                .collect()
        }
    }
}

#[async_trait]
impl SourceAdapter for ContextPillAdapter {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Context
    }

    fn index_key(&self, ctx: &RetrievalContext) -> String {
        let mut hasher = Sha256::new();
        for pill in self.selected(ctx) {
            hasher.update(pill.id.as_bytes());
            hasher.update(b"\n");
        }
        let digest = format!("{:x}", hasher.finalize());
        format!("ctx:{}", &digest[..16])
    }

    fn corpus(&self) -> bool {
        true
    }

    async fn list_documents(&self, ctx: &RetrievalContext) -> Result<Vec<Document>> {
        Ok(self
            .selected(ctx)
            .into_iter()
            .map(|pill| {
                let mut doc = Document::new(&pill.id, &pill.label, SourceKind::Context);
                doc.text = Some(pill.text.clone());
                doc
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pills() -> Vec<ContextPill> {
        vec![
            ContextPill {
                id: "pill-a".into(),
                label: "Meeting notes".into(),
                text: "Discussed roadmap and hiring.".into(),
            },
            ContextPill {
                id: "pill-b".into(),
                label: "Quote".into(),
                text: "Premature optimization is the root of all evil.".into(),
            },
        ]
    }

    #[test]
    fn key_depends_on_selection() {
        let adapter = ContextPillAdapter::new(pills());
        let all = adapter.index_key(&RetrievalContext::default());
        let one = adapter.index_key(&RetrievalContext {
            pill_ids: vec!["pill-a".into()],
            ..Default::default()
        });
        assert_ne!(all, one);
        assert!(all.starts_with("ctx:"));
        assert_eq!(all.len(), "ctx:".len() + 16);
    }

    #[tokio::test]
    async fn selection_narrows_documents() {
        let adapter = ContextPillAdapter::new(pills());
        let ctx = RetrievalContext {
            pill_ids: vec!["pill-b".into()],
            ..Default::default()
        };
        let docs = adapter.list_documents(&ctx).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "pill-b");
    }
}
