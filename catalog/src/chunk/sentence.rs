//! Sentence-boundary chunking, carried as a selectable alternate.

use crate::config::IndexingOptions;
use crate::error::Result;

use super::{split_into_sentences, ChunkSpan, Chunker};

/// Greedily packs whole sentences into chunks up to `target_size`
/// characters, never splitting a sentence mid-way.
#[derive(Debug, Clone, Copy)]
pub struct SentenceChunker {
    target_size: usize,
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self { target_size: 1_024 }
    }
}

impl SentenceChunker {
    /// Builds a chunker targeting `target_size` characters per chunk.
    #[must_use]
    pub const fn new(target_size: usize) -> Self {
        Self { target_size }
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, title: &str, body: &str, _options: &IndexingOptions) -> Result<Vec<ChunkSpan>> {
        let sentences = split_into_sentences(body);
        let mut spans = Vec::new();
        let mut current = String::new();

        for sentence in sentences {
            if !current.is_empty() && current.len() + sentence.len() + 1 > self.target_size {
                spans.push(span_for(title, &current));
                current.clear();
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
        }
        if !current.is_empty() {
            spans.push(span_for(title, &current));
        }

        Ok(spans)
    }

    fn name(&self) -> &'static str {
        "sentence"
    }
}

fn span_for(title: &str, text: &str) -> ChunkSpan {
    ChunkSpan {
        text: format!("{title}\n{text}"),
        section_context: title.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_sentences_up_to_target() {
        let chunker = SentenceChunker::new(30);
        let body = "One sentence. Two sentence. Three sentence. Four sentence.";
        let spans = chunker.chunk("doc", body, &IndexingOptions::default()).unwrap();
        assert!(spans.len() > 1);
        for span in &spans {
            assert!(!span.text.is_empty());
        }
    }

    #[test]
    fn never_splits_a_sentence_mid_way() {
        let chunker = SentenceChunker::new(5);
        let body = "A longer single sentence than the target size.";
        let spans = chunker.chunk("doc", body, &IndexingOptions::default()).unwrap();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].text.contains("A longer single sentence than the target size."));
    }
}
