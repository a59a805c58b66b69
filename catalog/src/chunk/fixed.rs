//! Fixed-size chunking, word-boundary aware, carried as a selectable
//! alternate for plain-text files with no heading structure.

use crate::config::IndexingOptions;
use crate::error::Result;

use super::{ChunkSpan, Chunker};

/// Splits body text into fixed-size windows with overlap, breaking on
/// word boundaries so no chunk starts or ends mid-word.
#[derive(Debug, Clone, Copy)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for FixedSizeChunker {
    fn default() -> Self {
        Self {
            chunk_size: 2_000,
            overlap: 64,
        }
    }
}

impl FixedSizeChunker {
    /// Builds a chunker with an explicit size and overlap.
    #[must_use]
    pub const fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, title: &str, body: &str, _options: &IndexingOptions) -> Result<Vec<ChunkSpan>> {
        let words: Vec<&str> = body.split_whitespace().collect();
        if words.is_empty() {
            return Ok(Vec::new());
        }

        let mut spans = Vec::new();
        let mut start_word = 0;
        while start_word < words.len() {
            let mut text = String::new();
            let mut word_idx = start_word;
            while word_idx < words.len() && text.len() < self.chunk_size {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(words[word_idx]);
                word_idx += 1;
            }

            let section_context = title.to_string();
            spans.push(ChunkSpan {
                text: format!("{section_context}\n{text}"),
                section_context,
            });

            if word_idx >= words.len() {
                break;
            }
            // Step back by roughly `overlap` characters worth of words.
            let mut back_chars = 0;
            let mut back_words = 0;
            while back_words < word_idx - start_word && back_chars < self.overlap {
                back_words += 1;
                back_chars += words[word_idx - back_words].len() + 1;
            }
            start_word = word_idx - back_words.max(1);
        }
        Ok(spans)
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_long_text_into_multiple_chunks() {
        let chunker = FixedSizeChunker::new(50, 10);
        let body = "word ".repeat(50);
        let spans = chunker.chunk("doc", &body, &IndexingOptions::default()).unwrap();
        assert!(spans.len() > 1);
    }

    #[test]
    fn empty_body_yields_no_chunks() {
        let chunker = FixedSizeChunker::default();
        let spans = chunker.chunk("doc", "", &IndexingOptions::default()).unwrap();
        assert!(spans.is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = FixedSizeChunker::new(2_000, 64);
        let spans = chunker
            .chunk("doc", "a short sentence", &IndexingOptions::default())
            .unwrap();
        assert_eq!(spans.len(), 1);
    }
}
