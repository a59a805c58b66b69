//! The primary chunking strategy: front-matter strip, heading split,
//! paragraph-budget merge, oversized-paragraph sentence split (§4.2).

use crate::config::IndexingOptions;
use crate::error::Result;

use super::frontmatter::{split_front_matter, FrontMatter};
use super::{split_oversized, ChunkSpan, Chunker};

/// Parses front-matter, splits on level 2/3 headings, and produces
/// section-context-prefixed, budget-bounded chunks.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownChunker;

struct Section {
    heading_path: String,
    body: String,
}

impl MarkdownChunker {
    /// Chunks a complete Markdown file, returning its parsed front-matter
    /// alongside the chunk spans (the indexer needs the front-matter for
    /// §4.3's timestamp extraction and for the persisted metadata bag).
    pub fn chunk_file(
        &self,
        filename_stem: &str,
        raw_text: &str,
        options: &IndexingOptions,
    ) -> Result<(FrontMatter, Vec<ChunkSpan>)> {
        let (front_matter, body) = split_front_matter(raw_text)?;
        let document_title = front_matter
            .get("title")
            .cloned()
            .unwrap_or_else(|| filename_stem.to_string());

        let sections = split_into_sections(body, &document_title);
        let mut spans = Vec::new();
        for section in sections {
            let budgeted = budget_paragraphs(&section.body, options.chunk_char_budget, options.chunk_overlap);
            for text in budgeted {
                let prefixed = format!("{document_title} | {}\n{text}", section.heading_path);
                spans.push(ChunkSpan {
                    text: prefixed,
                    section_context: format!("{document_title} | {}", section.heading_path),
                });
            }
        }
        Ok((front_matter, spans))
    }
}

impl Chunker for MarkdownChunker {
    fn chunk(&self, title: &str, body: &str, options: &IndexingOptions) -> Result<Vec<ChunkSpan>> {
        let (_, spans) = self.chunk_file(title, body, options)?;
        Ok(spans)
    }

    fn name(&self) -> &'static str {
        "markdown"
    }
}

fn split_into_sections(body: &str, document_title: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current_heading = document_title.to_string();
    let mut current_h2: Option<String> = None;
    let mut current_body = String::new();

    for line in body.lines() {
        if let Some(h2) = line.strip_prefix("## ") {
            flush(&mut sections, &current_heading, &mut current_body);
            current_h2 = Some(h2.trim().to_string());
            current_heading = current_h2.clone().unwrap_or_default();
        } else if let Some(h3) = line.strip_prefix("### ") {
            flush(&mut sections, &current_heading, &mut current_body);
            current_heading = current_h2.as_ref().map_or_else(
                || h3.trim().to_string(),
                |h2| format!("{h2} > {}", h3.trim()),
            );
        } else {
            current_body.push_str(line);
            current_body.push('\n');
        }
    }
    flush(&mut sections, &current_heading, &mut current_body);

    sections.retain(|s| !s.body.trim().is_empty());
    if sections.is_empty() {
        sections.push(Section {
            heading_path: document_title.to_string(),
            body: String::new(),
        });
    }
    sections
}

fn flush(sections: &mut Vec<Section>, heading: &str, body: &mut String) {
    if !body.trim().is_empty() {
        sections.push(Section {
            heading_path: heading.to_string(),
            body: std::mem::take(body),
        });
    } else {
        body.clear();
    }
}

/// Splits `body` into paragraphs, greedily merges consecutive paragraphs
/// up to `budget` characters, and splits any single oversized paragraph
/// on sentence boundaries with `overlap` characters of context.
fn budget_paragraphs(body: &str, budget: usize, overlap: usize) -> Vec<String> {
    let paragraphs: Vec<&str> = body
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in paragraphs {
        if paragraph.len() > budget {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.extend(split_oversized(paragraph, budget, overlap));
            continue;
        }

        if !current.is_empty() && current.len() + paragraph.len() + 2 > budget {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> IndexingOptions {
        IndexingOptions::default()
    }

    #[test]
    fn lead_section_is_titled_by_document_title() {
        let chunker = MarkdownChunker;
        let text = "Intro paragraph before any heading.\n\n## First Heading\n\nBody one.";
        let (_, spans) = chunker.chunk_file("notes", text, &opts()).unwrap();
        assert!(spans[0].section_context.starts_with("notes | notes"));
    }

    #[test]
    fn front_matter_title_overrides_filename_stem() {
        let chunker = MarkdownChunker;
        let text = "---\ntitle: My Doc\n---\n## Heading\n\nBody.";
        let (fm, spans) = chunker.chunk_file("fallback-stem", text, &opts()).unwrap();
        assert_eq!(fm.get("title"), Some(&"My Doc".to_string()));
        assert!(spans[0].section_context.starts_with("My Doc | Heading"));
    }

    #[test]
    fn nested_heading_path_joins_h2_and_h3() {
        let chunker = MarkdownChunker;
        let text = "## Parent\n\nlead.\n\n### Child\n\nbody.";
        let (_, spans) = chunker.chunk_file("doc", text, &opts()).unwrap();
        let contexts: Vec<_> = spans.iter().map(|s| s.section_context.clone()).collect();
        assert!(contexts.iter().any(|c| c.ends_with("Parent > Child")));
    }

    #[test]
    fn oversized_paragraph_is_split_with_overlap() {
        let chunker = MarkdownChunker;
        let long_sentence_block = "Sentence one is here. ".repeat(200);
        let text = format!("## Heading\n\n{long_sentence_block}");
        let (_, spans) = chunker.chunk_file("doc", &text, &opts()).unwrap();
        assert!(spans.len() > 1);
    }

    #[test]
    fn section_context_is_first_line_of_chunk_text() {
        let chunker = MarkdownChunker;
        let text = "## Heading\n\nbody text";
        let (_, spans) = chunker.chunk_file("doc", text, &opts()).unwrap();
        assert!(spans[0].text.starts_with(&spans[0].section_context));
    }
}
