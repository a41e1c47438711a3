//! Chunking, normalization, and content hashing for ingested files.
//!
//! Chunk sizes are a character-based approximation of tokens: ~1600 chars is
//! roughly 400 tokens, with a ~320 char (~80 token) overlap so context
//! survives the split.

use sha2::{Digest, Sha256};

pub const DEFAULT_CHUNK_SIZE: usize = 1600;
pub const DEFAULT_CHUNK_OVERLAP: usize = 320;

/// SHA-256 hex digest of raw file bytes. Used to detect whether a mutable
/// source changed since its last sync.
pub fn content_hash(content: &[u8]) -> String {
    Sha256::digest(content)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Split text into overlapping chunks of approximately `size` bytes.
///
/// Prefers splitting at a paragraph boundary (blank line), then at a
/// sentence end, then at a single newline, and hard-splits only when the
/// window has no natural break. Split positions are snapped to UTF-8
/// character boundaries.
pub fn chunk(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.len() <= size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < text.len() {
        let prev_start = start;
        let end = start + size;
        if end >= text.len() {
            let tail = text[start..].trim();
            if !tail.is_empty() {
                chunks.push(tail.to_string());
            }
            break;
        }
        let end = floor_char_boundary(text, end);

        let split_at = find_split(text, start, end, "\n\n")
            .or_else(|| find_sentence_split(text, start, end))
            .or_else(|| find_split(text, start, end, "\n"))
            .unwrap_or(end);

        let piece = text[start..split_at].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        // Rewind by the overlap so the next chunk shares a margin with this
        // one, then force forward progress so the loop cannot stall.
        start = floor_char_boundary(text, split_at.saturating_sub(overlap));
        if start <= prev_start {
            start = ceil_char_boundary(text, prev_start + size);
        }
    }

    chunks
}

/// Last occurrence of `sep` in the final quarter of the window, returning
/// the position just past the separator. Searching only the tail keeps
/// chunks close to full size.
fn find_split(text: &str, start: usize, end: usize, sep: &str) -> Option<usize> {
    let search_from = ceil_char_boundary(text, start + (end - start) * 3 / 4);
    if search_from >= end {
        return None;
    }
    text[search_from..end]
        .rfind(sep)
        .map(|idx| search_from + idx + sep.len())
}

/// Last sentence-ending punctuation followed by a space or newline in the
/// final quarter of the window, returning the position just past the
/// punctuation.
fn find_sentence_split(text: &str, start: usize, end: usize) -> Option<usize> {
    let search_from = ceil_char_boundary(text, start + (end - start) * 3 / 4);
    if search_from >= end {
        return None;
    }
    let window = text[search_from..end].as_bytes();
    for i in (0..window.len().saturating_sub(1)).rev() {
        if matches!(window[i], b'.' | b'!' | b'?') && matches!(window[i + 1], b' ' | b'\n') {
            return Some(search_from + i + 1);
        }
    }
    None
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Normalize text for storage and comparison: trim the outside, collapse
/// runs of 3+ newlines to a paragraph break, collapse runs of spaces and
/// tabs on the same line to a single space. Newlines are otherwise kept so
/// markdown structure survives; that matters for embedding quality.
pub fn normalize_text(input: &str) -> String {
    let input = input.trim();
    if input.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(input.len());
    let mut newline_run = 0u32;
    let mut in_space_run = false;
    for c in input.chars() {
        match c {
            '\n' => {
                newline_run += 1;
                in_space_run = false;
                if newline_run <= 2 {
                    out.push('\n');
                }
            }
            ' ' | '\t' => {
                newline_run = 0;
                if !in_space_run {
                    out.push(' ');
                    in_space_run = true;
                }
            }
            _ => {
                newline_run = 0;
                in_space_run = false;
                out.push(c);
            }
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_text_is_one_chunk() {
        let chunks = chunk("short note", 1600, 320);
        assert_eq!(chunks, vec!["short note".to_string()]);
    }

    #[test]
    fn empty_and_whitespace_yield_nothing() {
        assert!(chunk("", 1600, 320).is_empty());
        assert!(chunk("   \n\t  \n ", 1600, 320).is_empty());
    }

    #[test]
    fn exact_size_is_one_chunk() {
        let text = "a".repeat(1600);
        assert_eq!(chunk(&text, 1600, 320), vec![text.clone()]);
    }

    #[test]
    fn large_text_splits_at_paragraphs() {
        // Paragraphs sized so the blank line falls in the search window.
        let paragraph = "The quick brown fox jumps over the lazy dog. ".repeat(10);
        let text = format!("{p}\n\n{p}\n\n{p}", p = paragraph.trim());
        let chunks = chunk(&text, 600, 100);
        assert!(chunks.len() >= 2, "expected a split, got {}", chunks.len());
        for piece in &chunks {
            assert!(!piece.is_empty());
            assert!(piece.len() <= 2 * 600, "chunk too large: {}", piece.len());
        }
    }

    #[test]
    fn chunks_cover_the_text() {
        let text = "Sentence number one is here. ".repeat(100);
        let chunks = chunk(&text, 500, 100);
        let trimmed = text.trim();
        assert!(trimmed.starts_with(chunks.first().unwrap().as_str()));
        assert!(trimmed.ends_with(chunks.last().unwrap().as_str()));
        for piece in &chunks {
            assert!(trimmed.contains(piece.as_str()));
        }
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = "All work and no play makes for dull agents. ".repeat(60);
        let chunks = chunk(&text, 500, 100);
        assert!(chunks.len() >= 2);
        for pair in chunks.windows(2) {
            // The tail of one chunk reappears at the head of the next.
            let tail: String = pair[0].chars().rev().take(30).collect::<Vec<_>>()
                .into_iter().rev().collect();
            assert!(
                pair[1].contains(tail.trim()),
                "no shared overlap between consecutive chunks"
            );
        }
    }

    #[test]
    fn multibyte_text_never_splits_mid_character() {
        let text = "日本語のテキストです。これは長い文章になります。".repeat(80);
        let chunks = chunk(&text, 500, 100);
        assert!(!chunks.is_empty());
        for piece in &chunks {
            assert!(!piece.is_empty());
        }
    }

    #[test]
    fn hard_split_when_no_natural_break() {
        let text = "x".repeat(5000);
        let chunks = chunk(&text, 1000, 200);
        assert!(chunks.len() >= 4);
        for piece in &chunks {
            assert!(piece.len() <= 1000);
        }
    }

    #[test]
    fn normalize_collapses_runs() {
        assert_eq!(normalize_text("  hello   world  "), "hello world");
        assert_eq!(normalize_text("a\t\tb"), "a b");
        assert_eq!(normalize_text("one\n\n\n\ntwo"), "one\n\ntwo");
        assert_eq!(normalize_text("one\ntwo"), "one\ntwo");
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("  \n \n  "), "");
    }

    #[test]
    fn normalize_preserves_paragraph_structure() {
        let input = "# Heading\n\nFirst   paragraph here.\n\n\n\nSecond paragraph.";
        assert_eq!(
            normalize_text(input),
            "# Heading\n\nFirst paragraph here.\n\nSecond paragraph."
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = [
            "  hello   world  ",
            "one\n\n\n\ntwo\t\tthree",
            "# Title\n\n\nBody  text\nmore",
        ];
        for input in inputs {
            let once = normalize_text(input);
            assert_eq!(normalize_text(&once), once);
        }
    }

    #[test]
    fn content_hash_is_deterministic_and_discriminating() {
        assert_eq!(content_hash(b"hello"), content_hash(b"hello"));
        assert_ne!(content_hash(b"hello"), content_hash(b"hello!"));
        // Known SHA-256 of "hello".
        assert_eq!(
            content_hash(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
