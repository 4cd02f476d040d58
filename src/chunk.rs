//! Deterministic, heading-aware text chunker.
//!
//! Splits a document's text into fixed-size character windows with a
//! configurable trailing/leading overlap. Window arithmetic runs over
//! char offsets, so multi-byte input never splits inside a code point.
//!
//! Guarantees, for identical input and options:
//! - chunk ids are `chunk-<1-based-index>` and stable across rebuilds;
//! - every chunk except the last has exactly `max_chunk_chars` chars;
//! - consecutive chunks share exactly `overlap_chars` of content whenever
//!   a split was forced;
//! - concatenating chunk contents minus the overlap reproduces the input;
//! - only the last chunk may fall below `min_chunk_chars`.

use crate::models::Chunk;

/// Chunking configuration. Defaults match the engine's config table.
#[derive(Debug, Clone, Copy)]
pub struct ChunkOptions {
    /// Hard size cap per chunk, in chars.
    pub max_chunk_chars: usize,
    /// Overlap between consecutive chunks when a split is forced.
    pub overlap_chars: usize,
    /// Minimum chunk size; only the last chunk may be smaller.
    pub min_chunk_chars: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            max_chunk_chars: 12_000,
            overlap_chars: 500,
            min_chunk_chars: 1_000,
        }
    }
}

/// Split `text` into ordered chunks, assigning each the nearest preceding
/// heading from `headings` (first occurrence in the text decides the
/// heading's position) or a synthetic `Section <index>` when none
/// precedes it.
///
/// Empty or whitespace-only text yields no chunks; the caller surfaces
/// that as an unindexable document.
pub fn chunk_text(doc_id: &str, text: &str, headings: &[String], opts: &ChunkOptions) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    // Byte offset of every char boundary, plus the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = bounds.len() - 1;

    let max = opts.max_chunk_chars.max(1);
    // An overlap as large as the window would never advance.
    let overlap = opts.overlap_chars.min(max - 1);

    let heading_positions = locate_headings(text, headings, &bounds);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;
    loop {
        index += 1;
        let remaining = total_chars - start;
        let end = if remaining <= max { total_chars } else { start + max };
        let content = &text[bounds[start]..bounds[end]];

        let heading = heading_positions
            .iter()
            .rev()
            .find(|(pos, _)| *pos <= start)
            .map(|(_, h)| h.clone())
            .unwrap_or_else(|| format!("Section {}", index));

        chunks.push(Chunk {
            id: format!("chunk-{}", index),
            doc_id: doc_id.to_string(),
            heading: Some(heading),
            content: content.to_string(),
            size_chars: end - start,
            index,
        });

        if end == total_chars {
            break;
        }
        start = end - overlap;
    }

    chunks
}

/// Prefix chunk ids with `<doc_id>::` for corpus adapters, so the
/// progressive reader can route a ref back to its owning document
/// without an inverted index.
pub fn namespace_chunks(doc_id: &str, chunks: Vec<Chunk>) -> Vec<Chunk> {
    chunks
        .into_iter()
        .map(|mut c| {
            c.id = format!("{}::{}", doc_id, c.id);
            c
        })
        .collect()
}

/// Split a namespaced chunk id into `(doc selector, bare id)`.
pub fn split_chunk_id(id: &str) -> (Option<&str>, &str) {
    match id.split_once("::") {
        Some((doc, bare)) => (Some(doc), bare),
        None => (None, id),
    }
}

/// Char positions of the first occurrence of each heading, sorted.
fn locate_headings(text: &str, headings: &[String], bounds: &[usize]) -> Vec<(usize, String)> {
    let mut found: Vec<(usize, String)> = headings
        .iter()
        .filter_map(|h| {
            let needle = h.trim_start_matches('#').trim();
            if needle.is_empty() {
                return None;
            }
            text.find(needle).map(|byte_pos| {
                let char_pos = bounds.partition_point(|&b| b < byte_pos);
                (char_pos, h.clone())
            })
        })
        .collect();
    found.sort_by_key(|(pos, _)| *pos);
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(max: usize, overlap: usize, min: usize) -> ChunkOptions {
        ChunkOptions {
            max_chunk_chars: max,
            overlap_chars: overlap,
            min_chunk_chars: min,
        }
    }

    #[test]
    fn short_text_single_chunk() {
        let chunks = chunk_text("d1", "Hello, world!", &[], &opts(200, 20, 50));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "chunk-1");
        assert_eq!(chunks[0].content, "Hello, world!");
        assert_eq!(chunks[0].index, 1);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("d1", "   ", &[], &opts(200, 20, 50)).is_empty());
    }

    #[test]
    fn forced_splits_have_exact_overlap() {
        let text: String = ('a'..='z').cycle().take(450).collect();
        let chunks = chunk_text("d1", &text, &[], &opts(200, 20, 50));
        assert_eq!(chunks.len(), 3);
        for c in &chunks[..2] {
            assert_eq!(c.size_chars, 200);
        }
        for pair in chunks.windows(2) {
            let tail: String = pair[0].content.chars().rev().take(20).collect::<Vec<_>>()
                .into_iter().rev().collect();
            assert!(pair[1].content.starts_with(&tail));
        }
    }

    #[test]
    fn concat_minus_overlap_reproduces_input() {
        let text: String = "The quick brown fox jumps over the lazy dog. ".repeat(30);
        let o = opts(200, 20, 50);
        let chunks = chunk_text("d1", &text, &[], &o);
        let mut rebuilt = chunks[0].content.clone();
        for c in &chunks[1..] {
            let skip_bytes: usize = c.content.chars().take(20).map(|ch| ch.len_utf8()).sum();
            rebuilt.push_str(&c.content[skip_bytes..]);
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn headings_assigned_by_position() {
        let text = "Overview\nHTTP is a protocol used everywhere on the web today.\nMethods\nMethods include GET, POST, PUT and they map onto resources.";
        let headings = vec!["Overview".to_string(), "Methods".to_string()];
        let chunks = chunk_text("d1", text, &headings, &opts(80, 10, 20));
        assert!(chunks.len() >= 2);
        assert_eq!(chunks[0].heading.as_deref(), Some("Overview"));
        assert_eq!(
            chunks.last().unwrap().heading.as_deref(),
            Some("Methods")
        );
    }

    #[test]
    fn synthetic_heading_when_none_precedes() {
        let chunks = chunk_text("d1", "plain text with no headings at all", &[], &opts(200, 20, 50));
        assert_eq!(chunks[0].heading.as_deref(), Some("Section 1"));
    }

    #[test]
    fn deterministic_across_rebuilds() {
        let text = "Stable text body. ".repeat(40);
        let o = opts(100, 10, 30);
        let a = chunk_text("d1", &text, &[], &o);
        let b = chunk_text("d1", &text, &[], &o);
        assert_eq!(a, b);
    }

    #[test]
    fn multibyte_text_never_panics() {
        let text = "héllo wörld ünïcode ".repeat(30);
        let chunks = chunk_text("d1", &text, &[], &opts(50, 5, 10));
        assert!(chunks.len() > 1);
        let total: usize = chunks.iter().map(|c| c.size_chars).sum();
        assert!(total >= text.chars().count());
    }

    #[test]
    fn namespaced_ids_round_trip() {
        let chunks = namespace_chunks(
            "n2",
            chunk_text("n2", "some note body text", &[], &opts(200, 20, 50)),
        );
        assert_eq!(chunks[0].id, "n2::chunk-1");
        assert_eq!(split_chunk_id(&chunks[0].id), (Some("n2"), "chunk-1"));
        assert_eq!(split_chunk_id("chunk-3"), (None, "chunk-3"));
    }
}
