//! Chunking strategies (C2, §4.2).
//!
//! [`MarkdownChunker`] is the default: front-matter-aware, heading-split,
//! section-context-prefixed, per §4.2's exact cascade. The remaining
//! strategies are carried as selectable alternates for plain-text input
//! that has no heading structure to key sections on.

pub mod fixed;
pub mod frontmatter;
pub mod markdown;
pub mod paragraph;
pub mod sentence;

pub use fixed::FixedSizeChunker;
pub use markdown::MarkdownChunker;
pub use paragraph::ParagraphChunker;
pub use sentence::SentenceChunker;

use crate::config::IndexingOptions;
use crate::error::Result;

/// One emitted chunk, its section-context prefix already folded into
/// `text` per §4.2 step 4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Chunk text, first line is `"{document_title} | {heading_path}"`.
    pub text: String,
    /// The section-context prefix alone, stored separately for display.
    pub section_context: String,
}

/// A chunking strategy turning one file's body text into an ordered list
/// of bounded, context-prefixed spans.
pub trait Chunker: Send + Sync {
    /// Splits `body` into chunks. `title` seeds the section-context
    /// prefix when the strategy has no heading structure of its own.
    fn chunk(&self, title: &str, body: &str, options: &IndexingOptions) -> Result<Vec<ChunkSpan>>;

    /// Name of this chunking strategy, used in diagnostics.
    fn name(&self) -> &'static str;
}

/// Splits `text` on sentence boundaries, inserting `overlap` characters of
/// trailing context from the previous fragment into the next one.
///
/// Shared by [`markdown`] (oversized paragraphs) and [`sentence`] (whole
/// documents).
pub(crate) fn split_oversized(text: &str, budget: usize, overlap: usize) -> Vec<String> {
    let sentences = split_into_sentences(text);
    let mut fragments = Vec::new();
    let mut current = String::new();

    for sentence in sentences {
        if !current.is_empty() && current.len() + sentence.len() > budget {
            fragments.push(std::mem::take(&mut current));
            if let Some(last) = fragments.last() {
                let tail_start = floor_char_boundary(last, last.len().saturating_sub(overlap));
                current.push_str(&last[tail_start..]);
            }
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(sentence.trim());
    }
    if !current.is_empty() {
        fragments.push(current);
    }
    if fragments.is_empty() {
        fragments.push(text.to_string());
    }
    fragments
}

/// Steps `index` back to the nearest preceding UTF-8 char boundary, so a
/// byte-offset overlap slice on multi-byte text never panics.
fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

pub(crate) fn split_into_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if matches!(b, b'.' | b'!' | b'?') {
            let next_is_boundary = bytes
                .get(i + 1)
                .map(|b| b.is_ascii_whitespace())
                .unwrap_or(true);
            if next_is_boundary {
                sentences.push(text[start..=i].trim());
                start = i + 1;
            }
        }
    }
    if start < text.len() {
        let rest = text[start..].trim();
        if !rest.is_empty() {
            sentences.push(rest);
        }
    }
    sentences.into_iter().filter(|s| !s.is_empty()).collect()
}
