//! User-notes adapter: projects the note collection into a corpus of
//! documents, one per note. Chunk ids are namespaced with the note id so
//! citations route back to the right note.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::adapter::{RetrievalContext, SourceAdapter};
use crate::models::{Document, SourceKind};

/// One note as stored by the host's note editor.
#[derive(Debug, Clone)]
pub struct NoteRecord {
    pub id: String,
    pub title: String,
    pub body: String,
    pub updated_at: Option<DateTime<Utc>>,
}

pub struct NotesAdapter {
    notes: Vec<NoteRecord>,
}

impl NotesAdapter {
    pub fn new(notes: Vec<NoteRecord>) -> Self {
        Self { notes }
    }
}

#[async_trait]
impl SourceAdapter for NotesAdapter {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Note
    }

    fn index_key(&self, _ctx: &RetrievalContext) -> String {
        "notes:all".to_string()
    }

    fn corpus(&self) -> bool {
        true
    }

    async fn list_documents(&self, _ctx: &RetrievalContext) -> Result<Vec<Document>> {
        Ok(self
            .notes
            .iter()
            .map(|note| {
                let mut doc = Document::new(&note.id, &note.title, SourceKind::Note);
                doc.updated_at = note.updated_at;
                doc.text = Some(note.body.clone());
                doc.size_bytes = Some(note.body.len() as u64);
                doc
            })
            .collect())
    }
}
