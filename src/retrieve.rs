//! Lexical retrieval over index summaries, with an optional model
//! rerank of the candidate pool.
//!
//! Scoring is plain tf.idf with small bonuses for key-term and section
//! heading matches. Given the same index and query the candidate list is
//! deterministic; only the rerank step depends on a model, and a rerank
//! failure falls back to the lexical order.

use std::collections::HashMap;

use crate::model::ModelProvider;
use crate::models::{Index, RetrievalCandidate, SummaryKind};
use crate::text::{tokenize_raw, tokenize_terms};

const KEY_TERM_BONUS: f64 = 0.5;
const HEADING_BONUS: f64 = 0.3;

/// Score every summary against the query and return the top `top_m`
/// matches, best first. Ties break on `ref_id` ascending so the order is
/// reproducible.
pub fn lexical_candidates(
    query: &str,
    extra_terms: &[String],
    index: &Index,
    top_m: usize,
) -> Vec<RetrievalCandidate> {
    let mut terms = tokenize_terms(query);
    for extra in extra_terms {
        let extra = extra.to_lowercase();
        if !terms.contains(&extra) {
            terms.push(extra);
        }
    }
    if terms.is_empty() {
        return Vec::new();
    }

    let n = index.summaries.len();
    let mut df: HashMap<&str, usize> = HashMap::new();
    let token_lists: Vec<Vec<String>> = index
        .summaries
        .iter()
        .map(|s| tokenize_raw(&s.text))
        .collect();
    for term in &terms {
        let count = token_lists
            .iter()
            .filter(|tokens| tokens.iter().any(|t| t == term))
            .count();
        df.insert(term.as_str(), count);
    }

    let mut scored: Vec<RetrievalCandidate> = Vec::new();
    for (summary, tokens) in index.summaries.iter().zip(&token_lists) {
        let mut score = 0.0;
        for term in &terms {
            let tf = tokens.iter().filter(|t| *t == term).count();
            if tf > 0 {
                let idf = (1.0 + n as f64 / df[term.as_str()] as f64).ln();
                score += tf as f64 * idf;
            }
            if summary.key_terms.iter().any(|k| k == term) {
                score += KEY_TERM_BONUS;
            }
            if summary.kind == SummaryKind::Section {
                let heading_match = index
                    .section(&summary.ref_id)
                    .map(|s| tokenize_raw(&s.heading).iter().any(|t| t == term))
                    .unwrap_or(false);
                if heading_match {
                    score += HEADING_BONUS;
                }
            }
        }
        if score > 0.0 {
            scored.push(RetrievalCandidate {
                ref_id: summary.ref_id.clone(),
                score,
                summary: summary.clone(),
            });
        }
    }

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.ref_id.cmp(&b.ref_id))
    });
    scored.truncate(top_m);
    scored
}

/// Choose the final refs from a candidate pool. The model rerank runs
/// only when enabled and the pool is larger than `rerank_k`; otherwise,
/// or when the rerank fails, the lexical order stands.
pub async fn pick_refs(
    query: &str,
    candidates: &[RetrievalCandidate],
    rerank_k: usize,
    use_llm: bool,
    provider: Option<&dyn ModelProvider>,
) -> (Vec<String>, Option<String>) {
    let lexical_refs: Vec<String> = candidates
        .iter()
        .take(rerank_k)
        .map(|c| c.ref_id.clone())
        .collect();

    if !use_llm || candidates.len() <= rerank_k {
        return (lexical_refs, None);
    }

    let reranked = match provider {
        Some(provider) => rerank_candidates(query, candidates, rerank_k, provider).await,
        None => None,
    };
    match reranked {
        Some((refs, rationale)) if !refs.is_empty() => (refs, rationale),
        _ => (lexical_refs, None),
    }
}

/// Ask the model to pick the best `rerank_k` refs. The reply is parsed
/// leniently: any known ref id appearing in the text counts, in order of
/// first appearance. Unknown ids are ignored. Ids only count at token
/// boundaries so `chunk-1` never matches inside `chunk-12`.
pub async fn rerank_candidates(
    query: &str,
    candidates: &[RetrievalCandidate],
    rerank_k: usize,
    provider: &dyn ModelProvider,
) -> Option<(Vec<String>, Option<String>)> {
    let mut listing = String::new();
    for candidate in candidates {
        listing.push_str(&format!("[{}] {}\n", candidate.ref_id, candidate.summary.text));
    }
    let prompt = format!(
        "Question: {}\n\nCandidate sections:\n{}\nPick the {} most relevant section ids \
         for answering the question, best first, then one line explaining why. \
         Reply with the ids in brackets.",
        query, listing, rerank_k
    );

    let session = match provider.acquire().await {
        Ok(session) => session,
        Err(err) => {
            eprintln!("Warning: rerank model unavailable ({err}); keeping lexical order");
            return None;
        }
    };
    let reply = match session.send_prompt(&prompt).await {
        Ok(reply) => reply,
        Err(err) => {
            eprintln!("Warning: rerank prompt failed ({err}); keeping lexical order");
            return None;
        }
    };

    let mut picked: Vec<(usize, String)> = Vec::new();
    for candidate in candidates {
        if let Some(pos) = find_ref_mention(&reply, &candidate.ref_id) {
            if !picked.iter().any(|(_, id)| id == &candidate.ref_id) {
                picked.push((pos, candidate.ref_id.clone()));
            }
        }
    }
    picked.sort_by_key(|(pos, _)| *pos);
    let refs: Vec<String> = picked
        .into_iter()
        .map(|(_, id)| id)
        .take(rerank_k)
        .collect();

    let rationale = reply
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('['))
        .map(str::to_string);

    Some((refs, rationale))
}

/// First occurrence of `ref_id` in `reply` where neither neighbor is an
/// id character, so a short id cannot match inside a longer one.
fn find_ref_mention(reply: &str, ref_id: &str) -> Option<usize> {
    fn is_id_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':')
    }

    let mut start = 0;
    while let Some(offset) = reply[start..].find(ref_id) {
        let pos = start + offset;
        let before_clear = reply[..pos]
            .chars()
            .next_back()
            .map_or(true, |c| !is_id_char(c));
        let after_clear = reply[pos + ref_id.len()..]
            .chars()
            .next()
            .map_or(true, |c| !is_id_char(c));
        if before_clear && after_clear {
            return Some(pos);
        }
        start = pos + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing::ScriptedProvider;
    use crate::models::{IndexMeta, Section, Summary};
    use chrono::Utc;

    fn summary(ref_id: &str, kind: SummaryKind, text: &str, key_terms: &[&str]) -> Summary {
        Summary {
            id: format!("sum-{}", ref_id),
            ref_id: ref_id.to_string(),
            kind,
            text: text.to_string(),
            key_terms: key_terms.iter().map(|t| t.to_string()).collect(),
            entities: Vec::new(),
        }
    }

    fn index() -> Index {
        Index {
            key: "k".into(),
            meta: IndexMeta {
                url: None,
                title: None,
                language: None,
                created_at: Utc::now(),
                content_hash: "0".into(),
            },
            toc: Vec::new(),
            summaries: vec![
                summary(
                    "doc",
                    SummaryKind::Global,
                    "Networking guide covering sockets and routing.",
                    &["networking", "sockets"],
                ),
                summary(
                    "section-1",
                    SummaryKind::Section,
                    "Sockets bind to addresses. A socket pairs an address with a port.",
                    &["sockets", "addresses"],
                ),
                summary(
                    "chunk-1",
                    SummaryKind::Chunk,
                    "Routing tables decide the next hop for a packet.",
                    &["routing", "packet"],
                ),
            ],
            sections: vec![Section {
                id: "section-1".into(),
                heading: "Sockets".into(),
                chunk_ids: vec!["chunk-1".into()],
            }],
        }
    }

    #[test]
    fn scores_rank_matching_summaries_first() {
        let candidates = lexical_candidates("how do sockets work", &[], &index(), 12);
        assert!(!candidates.is_empty());
        assert_eq!(candidates[0].ref_id, "section-1");
        assert!(candidates[0].score > candidates.last().unwrap().score);
    }

    #[test]
    fn no_matching_terms_yields_no_candidates() {
        let candidates = lexical_candidates("quantum entanglement", &[], &index(), 12);
        assert!(candidates.is_empty());
    }

    #[test]
    fn expanded_terms_participate_in_scoring() {
        let bare = lexical_candidates("hop decision", &[], &index(), 12);
        let expanded =
            lexical_candidates("hop decision", &["routing".to_string()], &index(), 12);
        assert!(expanded[0].score > bare[0].score);
        assert_eq!(expanded[0].ref_id, "chunk-1");
    }

    #[tokio::test]
    async fn rerank_orders_by_model_reply() {
        let provider = ScriptedProvider::new(vec![vec![
            "[chunk-1] [section-1]\nRouting is the core of the question.".to_string(),
        ]]);
        let candidates =
            lexical_candidates("sockets routing packet addresses", &[], &index(), 12);
        let (refs, rationale) =
            pick_refs("sockets routing packet addresses", &candidates, 2, true, Some(&provider))
                .await;
        assert_eq!(refs, vec!["chunk-1", "section-1"]);
        assert!(rationale.is_some());
    }

    #[tokio::test]
    async fn rerank_failure_falls_back_to_lexical_order() {
        // provider with no sessions: acquire fails
        let provider = ScriptedProvider::new(Vec::new());
        let candidates =
            lexical_candidates("sockets routing packet addresses", &[], &index(), 12);
        let (refs, rationale) =
            pick_refs("sockets routing packet addresses", &candidates, 1, true, Some(&provider))
                .await;
        assert_eq!(refs, vec![candidates[0].ref_id.clone()]);
        assert!(rationale.is_none());
    }

    #[tokio::test]
    async fn rerank_ignores_unknown_ids() {
        let provider = ScriptedProvider::new(vec![vec![
            "[section-99] [chunk-1]\nbecause routing.".to_string(),
        ]]);
        let candidates =
            lexical_candidates("sockets routing packet addresses", &[], &index(), 12);
        let (refs, _) =
            pick_refs("sockets routing packet addresses", &candidates, 2, true, Some(&provider))
                .await;
        assert_eq!(refs, vec!["chunk-1".to_string()]);
    }

    #[tokio::test]
    async fn rerank_does_not_match_id_prefixes() {
        let candidates: Vec<RetrievalCandidate> = (1..=12)
            .map(|n| {
                let ref_id = format!("chunk-{n}");
                RetrievalCandidate {
                    ref_id: ref_id.clone(),
                    score: 1.0 / n as f64,
                    summary: summary(&ref_id, SummaryKind::Chunk, "section text", &[]),
                }
            })
            .collect();
        let provider = ScriptedProvider::new(vec![vec![
            "[chunk-12]\nThe last section answers the question.".to_string(),
        ]]);
        let out = rerank_candidates("which section", &candidates, 1, &provider).await;
        let (refs, _) = out.unwrap();
        assert_eq!(refs, vec!["chunk-12".to_string()]);
    }

    #[tokio::test]
    async fn small_pools_skip_the_rerank() {
        let candidates =
            lexical_candidates("sockets routing packet addresses", &[], &index(), 12);
        let k = candidates.len();
        let (refs, rationale) =
            pick_refs("sockets routing packet addresses", &candidates, k, true, None).await;
        let lexical: Vec<String> = candidates.iter().map(|c| c.ref_id.clone()).collect();
        assert_eq!(refs, lexical);
        assert!(rationale.is_none());
    }
}
