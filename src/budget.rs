//! Token budget arithmetic.
//!
//! Everything downstream of the indexer is expressed in tokens, estimated
//! with a cheap character heuristic (4 chars ≈ 1 token). The estimator is
//! a wire contract: persisted indexes were pruned against it, so a precise
//! tokenizer can only be swapped in together with a cache-key bump.

use std::cmp::Ordering;

use crate::text::{snap_to_char_boundary, split_sentences};

/// Approximate characters-per-token ratio.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token cost of a string.
///
/// Monotone in character length and independent of content; surrounding
/// whitespace is ignored so padding never changes a budget decision.
pub fn estimate_tokens(text: &str) -> usize {
    let chars = text.trim().chars().count();
    if chars == 0 {
        return 0;
    }
    chars.div_ceil(CHARS_PER_TOKEN)
}

/// Return a prefix of `text` whose estimate fits in `max_tokens`.
///
/// Prefers to cut at a sentence boundary, then a word boundary, and only
/// then mid-word. Guaranteed non-empty for non-empty input when
/// `max_tokens > 0`.
pub fn hard_cap(text: &str, max_tokens: usize) -> String {
    if max_tokens == 0 || text.is_empty() {
        return String::new();
    }
    if estimate_tokens(text) <= max_tokens {
        return text.to_string();
    }

    // Accumulate whole sentences while they fit.
    let mut kept = String::new();
    for sentence in split_sentences(text) {
        if estimate_tokens(&format!("{}{}", kept, sentence)) > max_tokens {
            break;
        }
        kept.push_str(sentence);
    }
    if !kept.trim().is_empty() {
        return kept.trim().to_string();
    }

    // No whole sentence fits: cut at the last word boundary inside the
    // character window, falling back to a raw character cut.
    let max_chars = max_tokens * CHARS_PER_TOKEN;
    let byte_end = text
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let byte_end = snap_to_char_boundary(text, byte_end);
    let window = &text[..byte_end];
    let cut = window.rfind(char::is_whitespace).unwrap_or(byte_end);
    let cut = snap_to_char_boundary(text, cut);
    let capped = text[..cut].trim();
    if capped.is_empty() {
        window.trim().to_string()
    } else {
        capped.to_string()
    }
}

/// Greedily keep items in `compare_keep` order (ascending keeps first)
/// until the summed token estimate fits `max_tokens`, then drop the rest.
///
/// Kept items come back in their original input order. Deterministic for
/// identical inputs: the keep ranking is a stable sort.
pub fn prune_to_budget<T, F, C>(
    items: Vec<T>,
    get_text: F,
    compare_keep: C,
    max_tokens: usize,
) -> Vec<T>
where
    F: Fn(&T) -> &str,
    C: Fn(&T, &T) -> Ordering,
{
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| compare_keep(&items[a], &items[b]));

    let mut spent = 0usize;
    let mut keep = vec![false; items.len()];
    for idx in order {
        let cost = estimate_tokens(get_text(&items[idx]));
        if spent + cost > max_tokens {
            continue;
        }
        spent += cost;
        keep[idx] = true;
    }

    items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, kept)| kept.then_some(item))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_is_monotone() {
        let mut prev = 0;
        for n in 0..64 {
            let est = estimate_tokens(&"a".repeat(n));
            assert!(est >= prev);
            prev = est;
        }
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn estimate_ignores_surrounding_whitespace() {
        assert_eq!(estimate_tokens("  abcd  "), estimate_tokens("abcd"));
    }

    #[test]
    fn hard_cap_keeps_short_text_intact() {
        assert_eq!(hard_cap("short", 10), "short");
    }

    #[test]
    fn hard_cap_prefers_sentence_boundary() {
        let text = "First sentence here. Second sentence is much longer than the first one.";
        let capped = hard_cap(text, 6);
        assert_eq!(capped, "First sentence here.");
    }

    #[test]
    fn hard_cap_never_empty_for_nonempty_input() {
        let capped = hard_cap("supercalifragilisticexpialidocious", 1);
        assert!(!capped.is_empty());
        assert!(estimate_tokens(&capped) <= 1);
    }

    #[test]
    fn hard_cap_respects_budget() {
        let text = "word ".repeat(100);
        for cap in 1..20 {
            assert!(estimate_tokens(&hard_cap(&text, cap)) <= cap);
        }
    }

    #[test]
    fn prune_keeps_in_original_order() {
        let items = vec![("b", "xxxxxxxx"), ("a", "xxxxxxxx"), ("c", "xxxxxxxx")];
        // keep order favors the label, budget fits two items of 2 tokens each
        let kept = prune_to_budget(items, |i| i.1, |x, y| x.0.cmp(y.0), 4);
        let labels: Vec<&str> = kept.iter().map(|i| i.0).collect();
        assert_eq!(labels, vec!["b", "a"]);
    }

    #[test]
    fn prune_is_deterministic() {
        let make = || vec![("a", "1234"), ("b", "12345678"), ("c", "1234")];
        let keep = |x: &(&str, &str), y: &(&str, &str)| x.0.cmp(y.0);
        let a = prune_to_budget(make(), |i| i.1, keep, 2);
        let b = prune_to_budget(make(), |i| i.1, keep, 2);
        assert_eq!(a, b);
    }
}
