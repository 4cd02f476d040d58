//! Progressive reading: resolve retrieval refs to full chunk texts,
//! budget them, and ask the model once for an answer grounded in those
//! texts only.
//!
//! The cancellation token is checked at every suspension point. On
//! cancellation the call fails with the aborted error and never returns
//! a partial answer.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use crate::adapter::{RetrievalContext, SourceAdapter};
use crate::budget::{hard_cap, CHARS_PER_TOKEN};
use crate::chunk::{split_chunk_id, ChunkOptions};
use crate::config::{ChunkingConfig, ReadingConfig};
use crate::error::{Error, Result};
use crate::model::ModelProvider;
use crate::models::{Answer, Chunk, Confidence, Document, Index, UsedRef};

pub struct ReadRequest<'a> {
    pub adapter: &'a dyn SourceAdapter,
    pub ctx: &'a RetrievalContext,
    pub query: &'a str,
    pub index: &'a Index,
    pub ref_ids: &'a [String],
}

struct SelectedChunk {
    doc_id: String,
    chunk_id: String,
    heading: Option<String>,
    text: String,
}

/// Read the refs' chunks and compose an answer. Model unavailability is
/// a degrade path, not an error: the answer reports insufficient
/// evidence at low confidence.
pub async fn read_and_answer(
    req: &ReadRequest<'_>,
    reading: &ReadingConfig,
    chunking: &ChunkingConfig,
    provider: &dyn ModelProvider,
    cancel: &CancellationToken,
) -> Result<Answer> {
    ensure_live(cancel)?;

    let chunk_ids = expand_refs(req.index, req.ref_ids);

    let docs = req.adapter.list_documents(req.ctx).await?;
    ensure_live(cancel)?;

    let selected = resolve_chunks(req, &docs, &chunk_ids, reading, chunking, cancel).await?;

    if selected.is_empty() {
        return Ok(Answer {
            text: "insufficient evidence (no readable sections)".to_string(),
            confidence: Confidence::Low,
            used_refs: Vec::new(),
            disclaimers: Vec::new(),
        });
    }

    let prompt = build_prompt(req, &selected, reading);
    let reply = match prompt_once(provider, &prompt, cancel).await {
        Ok(reply) => reply,
        Err(Error::Aborted) => return Err(Error::Aborted),
        Err(_) => {
            return Ok(Answer {
                text: "insufficient evidence (model unavailable)".to_string(),
                confidence: Confidence::Low,
                used_refs: Vec::new(),
                disclaimers: Vec::new(),
            });
        }
    };
    ensure_live(cancel)?;

    let used_refs = selected
        .iter()
        .map(|c| UsedRef {
            doc_id: c.doc_id.clone(),
            chunk_id: c.chunk_id.clone(),
            heading: c.heading.clone(),
        })
        .collect();

    Ok(Answer {
        confidence: grade_confidence(&reply),
        text: reply,
        used_refs,
        disclaimers: Vec::new(),
    })
}

fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Aborted);
    }
    Ok(())
}

/// Section refs expand to their child chunk ids; everything else passes
/// through as a chunk id. Duplicates drop, first occurrence wins.
fn expand_refs(index: &Index, ref_ids: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for ref_id in ref_ids {
        match index.section(ref_id) {
            Some(section) => {
                for id in &section.chunk_ids {
                    if !out.contains(id) {
                        out.push(id.clone());
                    }
                }
            }
            None => {
                if !out.contains(ref_id) {
                    out.push(ref_id.clone());
                }
            }
        }
    }
    out
}

async fn resolve_chunks(
    req: &ReadRequest<'_>,
    docs: &[Document],
    chunk_ids: &[String],
    reading: &ReadingConfig,
    chunking: &ChunkingConfig,
    cancel: &CancellationToken,
) -> Result<Vec<SelectedChunk>> {
    let opts = ChunkOptions {
        max_chunk_chars: chunking.max_chunk_chars,
        overlap_chars: chunking.overlap_chars,
        min_chunk_chars: chunking.min_chunk_chars,
    };

    // chunks are materialized once per document within this call
    let mut cache: HashMap<String, Vec<Chunk>> = HashMap::new();
    let mut selected = Vec::new();

    for chunk_id in chunk_ids {
        if selected.len() == reading.k_max {
            break;
        }

        let (doc_prefix, _local) = split_chunk_id(chunk_id);
        let doc = match doc_prefix {
            Some(prefix) => docs.iter().find(|d| d.id == prefix),
            None => docs.first(),
        };
        let Some(doc) = doc else { continue };

        if !cache.contains_key(&doc.id) {
            let chunks = req.adapter.chunk_document(doc, &opts).await?;
            ensure_live(cancel)?;
            cache.insert(doc.id.clone(), chunks);
        }
        let chunks = &cache[&doc.id];

        let found = chunks.iter().find(|c| &c.id == chunk_id);
        let Some(chunk) = found else { continue };

        selected.push(SelectedChunk {
            doc_id: doc.id.clone(),
            chunk_id: chunk.id.clone(),
            heading: chunk.heading.clone(),
            text: hard_cap(&chunk.content, reading.per_chunk_token_cap),
        });
    }

    Ok(selected)
}

fn build_prompt(req: &ReadRequest<'_>, selected: &[SelectedChunk], reading: &ReadingConfig) -> String {
    let title = req.index.meta.title.as_deref().unwrap_or("(untitled)");
    let url = req.index.meta.url.as_deref().unwrap_or("");

    let mut prompt = format!(
        "You are answering a question using only the sections below.\nTitle: {}\n",
        title
    );
    if !url.is_empty() {
        prompt.push_str(&format!("URL: {}\n", url));
    }
    prompt.push_str(&format!("Question: {}\n\n", req.query));
    for chunk in selected {
        let heading = chunk.heading.as_deref().unwrap_or(chunk.chunk_id.as_str());
        prompt.push_str(&format!("## {}\n{}\n\n", heading, chunk.text));
    }
    prompt.push_str(&format!(
        "Answer only from the sections above in at most {} characters. \
         If they do not contain the answer, say so. \
         End with a line listing the section headings you used.",
        reading.reserve_answer_tokens * CHARS_PER_TOKEN
    ));
    prompt
}

async fn prompt_once(
    provider: &dyn ModelProvider,
    prompt: &str,
    cancel: &CancellationToken,
) -> Result<String> {
    ensure_live(cancel)?;
    // a fresh session per call; dropped as soon as the reply lands
    let session = provider
        .acquire()
        .await
        .map_err(|e| Error::ModelUnavailable(e.to_string()))?;
    let reply = session
        .send_prompt(prompt)
        .await
        .map_err(|e| Error::ModelUnavailable(e.to_string()))?;
    ensure_live(cancel)?;
    Ok(reply)
}

fn grade_confidence(text: &str) -> Confidence {
    let chars = text.chars().count();
    let sentences = crate::text::split_sentences(text).len();
    if chars > 600 && sentences >= 3 {
        Confidence::High
    } else if chars > 200 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}
