//! Paragraph-boundary chunking, carried as a selectable alternate.

use crate::config::IndexingOptions;
use crate::error::Result;

use super::{split_oversized, ChunkSpan, Chunker};

/// Splits on blank-line paragraph boundaries, greedily merging paragraphs
/// up to `max_chunk_size`, splitting any oversized paragraph on sentence
/// boundaries.
#[derive(Debug, Clone, Copy)]
pub struct ParagraphChunker {
    max_chunk_size: usize,
}

impl Default for ParagraphChunker {
    fn default() -> Self {
        Self {
            max_chunk_size: 2_000,
        }
    }
}

impl ParagraphChunker {
    /// Builds a chunker with an explicit maximum chunk size.
    #[must_use]
    pub const fn new(max_chunk_size: usize) -> Self {
        Self { max_chunk_size }
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, title: &str, body: &str, options: &IndexingOptions) -> Result<Vec<ChunkSpan>> {
        let paragraphs: Vec<&str> = body
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let mut spans = Vec::new();
        let mut current = String::new();

        let mut flush = |current: &mut String, spans: &mut Vec<ChunkSpan>| {
            if current.is_empty() {
                return;
            }
            let section_context = title.to_string();
            spans.push(ChunkSpan {
                text: format!("{section_context}\n{current}"),
                section_context,
            });
            current.clear();
        };

        for paragraph in paragraphs {
            if paragraph.len() > self.max_chunk_size {
                flush(&mut current, &mut spans);
                for fragment in split_oversized(paragraph, self.max_chunk_size, options.chunk_overlap) {
                    spans.push(ChunkSpan {
                        text: format!("{title}\n{fragment}"),
                        section_context: title.to_string(),
                    });
                }
                continue;
            }

            if !current.is_empty() && current.len() + paragraph.len() + 2 > self.max_chunk_size {
                flush(&mut current, &mut spans);
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(paragraph);
        }
        flush(&mut current, &mut spans);

        Ok(spans)
    }

    fn name(&self) -> &'static str {
        "paragraph"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_small_paragraphs_up_to_budget() {
        let chunker = ParagraphChunker::new(1_000);
        let body = "Para one.\n\nPara two.\n\nPara three.";
        let spans = chunker.chunk("doc", body, &IndexingOptions::default()).unwrap();
        assert_eq!(spans.len(), 1);
    }

    #[test]
    fn splits_oversized_paragraph() {
        let chunker = ParagraphChunker::new(50);
        let body = "Sentence one here. Sentence two here. Sentence three here.";
        let spans = chunker.chunk("doc", body, &IndexingOptions::default()).unwrap();
        assert!(spans.len() > 1);
    }
}
