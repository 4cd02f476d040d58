//! Index construction: sections, token-capped summaries, key terms, and
//! the global synopsis, all pruned to a total token budget.
//!
//! Building is fully deterministic: identical documents, chunks, and
//! config always produce identical ids, order, and texts. No model call
//! happens here; summaries are leading-sentence extracts.

use std::collections::HashMap;

use chrono::Utc;

use crate::budget::{estimate_tokens, hard_cap, prune_to_budget};
use crate::config::IndexConfig;
use crate::models::{Chunk, Document, Index, IndexMeta, Section, Summary, SummaryKind, TocEntry};
use crate::text::tokenize_terms;

/// Key-term counts per summary kind.
const CHUNK_KEY_TERMS: usize = 10;
const SECTION_KEY_TERMS: usize = 12;
const GLOBAL_KEY_TERMS: usize = 20;

/// Maximum document titles folded into a corpus synopsis.
const SYNOPSIS_TITLE_CAP: usize = 12;

const ENTITY_CAP: usize = 8;

/// Build an [`Index`] over one or more documents with their chunks.
///
/// With a single document, section ids are `section-<n>`; for a corpus
/// every section id is prefixed `<doc_id>::` and the synopsis
/// concatenates document titles. Chunk ids are used exactly as the
/// adapter emitted them.
pub fn build_index(
    store_key: &str,
    content_hash: &str,
    corpus: &[(Document, Vec<Chunk>)],
    cfg: &IndexConfig,
) -> Index {
    let is_corpus = corpus.len() > 1;

    let mut sections = Vec::new();
    let mut chunk_summaries = Vec::new();
    for (doc, chunks) in corpus {
        sections.extend(group_sections(doc, chunks, is_corpus));
        for chunk in chunks {
            chunk_summaries.push(summarize_chunk(chunk, cfg));
        }
    }

    let section_summaries: Vec<Summary> = sections
        .iter()
        .map(|section| summarize_section(section, &chunk_summaries, cfg))
        .collect();

    let global = global_summary(corpus, &section_summaries, cfg, is_corpus);

    let mut summaries = Vec::with_capacity(1 + section_summaries.len() + chunk_summaries.len());
    summaries.push(global);
    summaries.extend(section_summaries.into_iter().take(cfg.max_sections));
    summaries.extend(chunk_summaries.into_iter().take(cfg.max_chunk_summaries));

    // Keep by (kind priority, cheapest first) so drops come off the tail
    // of the lowest-priority rank.
    let summaries = prune_to_budget(
        summaries,
        |s| s.text.as_str(),
        |a, b| {
            a.kind
                .rank()
                .cmp(&b.kind.rank())
                .then(estimate_tokens(&a.text).cmp(&estimate_tokens(&b.text)))
        },
        cfg.max_tokens,
    );

    let toc = sections
        .iter()
        .map(|s| TocEntry {
            heading: display_heading(&s.heading).to_string(),
            level: heading_level(&s.heading),
            chunk_ids: s.chunk_ids.clone(),
        })
        .collect();

    let first = corpus.first().map(|(doc, _)| doc);
    Index {
        key: store_key.to_string(),
        meta: IndexMeta {
            url: first.and_then(|d| d.url.clone()),
            title: first.map(|d| d.title.clone()),
            language: first.and_then(|d| d.language.clone()),
            created_at: Utc::now(),
            content_hash: content_hash.to_string(),
        },
        toc,
        summaries,
        sections,
    }
}

/// Group consecutive chunks sharing a heading into sections, in chunk
/// order.
fn group_sections(doc: &Document, chunks: &[Chunk], is_corpus: bool) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    for chunk in chunks {
        let heading = chunk.heading.clone().unwrap_or_default();
        match sections.last_mut() {
            Some(last) if last.heading == heading => last.chunk_ids.push(chunk.id.clone()),
            _ => {
                let n = sections.len() + 1;
                let id = if is_corpus {
                    format!("{}::section-{}", doc.id, n)
                } else {
                    format!("section-{}", n)
                };
                sections.push(Section {
                    id,
                    heading,
                    chunk_ids: vec![chunk.id.clone()],
                });
            }
        }
    }
    sections
}

fn summarize_chunk(chunk: &Chunk, cfg: &IndexConfig) -> Summary {
    let text = leading_sentences(&chunk.content, cfg.per_chunk_summary_tokens);
    Summary {
        id: format!("sum-{}", chunk.id),
        ref_id: chunk.id.clone(),
        kind: SummaryKind::Chunk,
        key_terms: key_terms(&text, CHUNK_KEY_TERMS),
        entities: entities(&text, ENTITY_CAP),
        text,
    }
}

/// Section rollup: concatenate child chunk summaries, then apply the same
/// leading-sentence selection at the section cap.
fn summarize_section(section: &Section, chunk_summaries: &[Summary], cfg: &IndexConfig) -> Summary {
    let joined = section
        .chunk_ids
        .iter()
        .filter_map(|id| chunk_summaries.iter().find(|s| &s.ref_id == id))
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let text = leading_sentences(&joined, cfg.per_section_tokens);
    Summary {
        id: format!("sum-{}", section.id),
        ref_id: section.id.clone(),
        kind: SummaryKind::Section,
        key_terms: key_terms(&text, SECTION_KEY_TERMS),
        entities: entities(&text, ENTITY_CAP),
        text,
    }
}

fn global_summary(
    corpus: &[(Document, Vec<Chunk>)],
    section_summaries: &[Summary],
    cfg: &IndexConfig,
    is_corpus: bool,
) -> Summary {
    let title = if is_corpus {
        corpus
            .iter()
            .take(SYNOPSIS_TITLE_CAP)
            .map(|(doc, _)| doc.title.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    } else {
        corpus
            .first()
            .map(|(doc, _)| doc.title.clone())
            .unwrap_or_default()
    };

    let topics = top_terms_across(section_summaries, GLOBAL_KEY_TERMS);
    let synopsis = format!("{} — Topics: {}", title, topics.join(", "));
    let text = hard_cap(&synopsis, cfg.global_synopsis_tokens);

    let ref_id = if is_corpus {
        "corpus".to_string()
    } else {
        corpus
            .first()
            .map(|(doc, _)| doc.id.clone())
            .unwrap_or_default()
    };

    Summary {
        id: format!("sum-global-{}", ref_id),
        ref_id,
        kind: SummaryKind::Global,
        key_terms: topics,
        entities: entities(&title, ENTITY_CAP),
        text,
    }
}

/// Accumulate leading sentences up to `max_tokens`, then hard-cap.
fn leading_sentences(text: &str, max_tokens: usize) -> String {
    let mut kept = String::new();
    for sentence in crate::text::split_sentences(text) {
        if !kept.is_empty() && estimate_tokens(&format!("{}{}", kept, sentence)) > max_tokens {
            break;
        }
        kept.push_str(sentence);
        if estimate_tokens(&kept) >= max_tokens {
            break;
        }
    }
    if kept.trim().is_empty() {
        kept = text.to_string();
    }
    hard_cap(kept.trim(), max_tokens)
}

/// Frequency-ranked key terms; ties broken alphabetically for
/// deterministic output.
fn key_terms(text: &str, n: usize) -> Vec<String> {
    let mut freq: HashMap<String, usize> = HashMap::new();
    for term in tokenize_terms(text) {
        *freq.entry(term).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = freq.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().take(n).map(|(t, _)| t).collect()
}

/// Union of key terms across summaries, ranked by how many summaries
/// mention each term.
fn top_terms_across(summaries: &[Summary], n: usize) -> Vec<String> {
    let mut freq: HashMap<&str, usize> = HashMap::new();
    for summary in summaries {
        for term in &summary.key_terms {
            *freq.entry(term.as_str()).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(&str, usize)> = freq.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked.into_iter().take(n).map(|(t, _)| t.to_string()).collect()
}

/// Capitalized tokens, first-seen order. A crude stand-in for named
/// entity extraction.
fn entities(text: &str, n: usize) -> Vec<String> {
    let mut seen = Vec::new();
    for token in text.split(|c: char| !c.is_alphanumeric()) {
        if token.chars().count() <= 2 {
            continue;
        }
        let mut chars = token.chars();
        let first_upper = chars.next().is_some_and(|c| c.is_uppercase());
        if first_upper && !seen.iter().any(|s: &String| s == token) {
            seen.push(token.to_string());
            if seen.len() == n {
                break;
            }
        }
    }
    seen
}

fn heading_level(heading: &str) -> u8 {
    let hashes = heading.chars().take_while(|&c| c == '#').count();
    if hashes == 0 {
        1
    } else {
        hashes.min(6) as u8
    }
}

fn display_heading(heading: &str) -> &str {
    heading.trim_start_matches('#').trim()
}
