//! Shared text utilities: tokenization, stop words, sentence splitting.
//!
//! The indexer and the retriever must agree on what a "term" is, so the
//! tokenizer lives here rather than in either module.

/// Common English stop words removed from key-term extraction and query
/// scoring. Deliberately small; anything fancier belongs to a future
/// tokenizer phase.
pub const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "her", "was", "one", "our",
    "out", "day", "get", "has", "him", "his", "how", "its", "may", "new", "now", "old", "see",
    "two", "way", "who", "did", "your", "about", "after", "also", "been", "before", "being",
    "between", "both", "does", "each", "from", "have", "here", "into", "just", "like", "more",
    "most", "only", "other", "over", "same", "some", "such", "than", "that", "their", "them",
    "then", "there", "these", "they", "this", "those", "through", "under", "very", "were",
    "what", "when", "where", "which", "while", "will", "with", "would", "should", "could",
];

/// True when `term` is a stop word (expects lowercase input).
pub fn is_stop_word(term: &str) -> bool {
    STOP_WORDS.contains(&term)
}

/// Split text into lowercase terms on whitespace and punctuation,
/// dropping stop words and tokens of length two or less.
pub fn tokenize_terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|t| t.to_lowercase())
        .filter(|t| t.len() > 2 && !is_stop_word(t))
        .collect()
}

/// Like [`tokenize_terms`] but keeps stop words and short tokens.
/// Used where raw word positions matter (hard caps, limits).
pub fn tokenize_raw(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Split text into sentences, keeping terminators attached.
///
/// A sentence ends at `.`, `!`, `?`, or a newline. Degenerate input with
/// no terminators comes back as a single sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut last_end = 0usize;
    for (i, c) in text.char_indices() {
        let end = i + c.len_utf8();
        if c == '.' || c == '!' || c == '?' || c == '\n' {
            let piece = &text[start..end];
            if !piece.trim().is_empty() {
                sentences.push(piece);
            }
            start = end;
        }
        last_end = end;
    }
    if start < last_end {
        let piece = &text[start..];
        if !piece.trim().is_empty() {
            sentences.push(piece);
        }
    }
    sentences
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
pub fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
