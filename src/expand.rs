//! Query-term expansion from index key terms, with an optional model
//! assist. Output is always a flat, lowercased, deduplicated list and
//! never includes terms already present in the query.

use std::collections::BTreeSet;

use crate::model::ModelProvider;
use crate::models::Index;
use crate::text::tokenize_terms;

/// Minimum shared substring length for a key term to count as related.
const MIN_SHARED: usize = 3;

pub struct ExpandOptions<'a> {
    pub use_llm: bool,
    pub limit: usize,
    pub provider: Option<&'a dyn ModelProvider>,
}

/// Pick extra terms from the index's key terms that look related to the
/// query. With `use_llm` set and a provider available, the model may add
/// more; a model failure silently yields the lexical list.
pub async fn expand_query_terms(
    query: &str,
    index: &Index,
    opts: &ExpandOptions<'_>,
) -> Vec<String> {
    let query_tokens = tokenize_terms(query);
    if query_tokens.is_empty() || opts.limit == 0 {
        return Vec::new();
    }

    let mut out: Vec<String> = Vec::new();
    let mut seen: BTreeSet<String> = query_tokens.iter().cloned().collect();

    // key terms in summary order, global first, keeps expansion stable
    for summary in &index.summaries {
        for term in &summary.key_terms {
            let term = term.to_lowercase();
            if seen.contains(&term) {
                continue;
            }
            if query_tokens.iter().any(|q| shares_substring(q, &term)) {
                seen.insert(term.clone());
                out.push(term);
                if out.len() == opts.limit {
                    return out;
                }
            }
        }
    }

    if opts.use_llm {
        if let Some(provider) = opts.provider {
            if let Some(extra) = model_terms(query, index, provider).await {
                for term in extra {
                    let term = term.to_lowercase();
                    if seen.insert(term.clone()) {
                        out.push(term);
                        if out.len() == opts.limit {
                            break;
                        }
                    }
                }
            }
        }
    }

    out
}

async fn model_terms(query: &str, index: &Index, provider: &dyn ModelProvider) -> Option<Vec<String>> {
    let topics = index
        .summaries
        .first()
        .map(|s| s.key_terms.join(", "))
        .unwrap_or_default();
    let prompt = format!(
        "Suggest up to 5 single-word search terms related to the question below, \
         one per line, no numbering.\nQuestion: {}\nDocument topics: {}",
        query, topics
    );
    let session = provider.acquire().await.ok()?;
    let reply = session.send_prompt(&prompt).await.ok()?;
    Some(
        reply
            .lines()
            .flat_map(tokenize_terms)
            .collect(),
    )
}

/// True when the two terms share any substring of at least `MIN_SHARED`
/// characters. Works on char boundaries so multi-byte input is safe.
fn shares_substring(a: &str, b: &str) -> bool {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.len() < MIN_SHARED || b_chars.len() < MIN_SHARED {
        return false;
    }
    for window in a_chars.windows(MIN_SHARED) {
        if b_chars.windows(MIN_SHARED).any(|w| w == window) {
            return true;
        }
    }
    false
}
