//! Front-matter stripping and parsing (§4.2 step 1).

use std::collections::BTreeMap;

use serde_yaml::Value;

use crate::error::{CatalogError, Result};

/// A front-matter scalar, accepted in string, number, boolean, or
/// list-of-strings shape and normalized to strings for storage.
pub type FrontMatter = BTreeMap<String, String>;

/// Strips a leading `---`-fenced front-matter block, if present, and
/// returns `(front_matter, body)`. A file with no front-matter fence
/// returns an empty map and the original text unchanged.
pub fn split_front_matter(text: &str) -> Result<(FrontMatter, &str)> {
    let Some(rest) = text.strip_prefix("---") else {
        return Ok((FrontMatter::new(), text));
    };
    // Allow an optional newline right after the opening fence.
    let rest = rest.strip_prefix('\n').unwrap_or(rest);

    let Some(end) = find_closing_fence(rest) else {
        return Ok((FrontMatter::new(), text));
    };

    let yaml_block = &rest[..end];
    let body = &rest[end..];
    let body = body
        .strip_prefix("---")
        .map_or(body, |b| b.strip_prefix('\n').unwrap_or(b));

    let front_matter = parse_front_matter(yaml_block)?;
    Ok((front_matter, body))
}

fn find_closing_fence(rest: &str) -> Option<usize> {
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches('\n');
        if trimmed == "---" {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

/// Parses a YAML mapping into string-normalized front-matter, accepting
/// string, number, boolean, and list-of-strings values (joined with `, `).
fn parse_front_matter(yaml: &str) -> Result<FrontMatter> {
    if yaml.trim().is_empty() {
        return Ok(FrontMatter::new());
    }
    let value: Value = serde_yaml::from_str(yaml)
        .map_err(|e| CatalogError::Format(format!("front-matter parse error: {e}")))?;

    let Value::Mapping(mapping) = value else {
        return Ok(FrontMatter::new());
    };

    let mut out = FrontMatter::new();
    for (key, value) in mapping {
        let Value::String(key) = key else { continue };
        if let Some(rendered) = render_scalar(&value) {
            out.insert(key, rendered);
        }
    }
    Ok(out)
}

fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Sequence(items) => {
            let rendered: Vec<String> = items.iter().filter_map(render_scalar).collect();
            if rendered.is_empty() {
                None
            } else {
                Some(rendered.join(", "))
            }
        }
        Value::Null | Value::Mapping(_) | Value::Tagged(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_front_matter_returns_text_unchanged() {
        let (fm, body) = split_front_matter("# Title\n\nbody").unwrap();
        assert!(fm.is_empty());
        assert_eq!(body, "# Title\n\nbody");
    }

    #[test]
    fn parses_scalar_fields() {
        let text = "---\ntitle: Hello\ncount: 3\ndraft: false\n---\nbody text";
        let (fm, body) = split_front_matter(text).unwrap();
        assert_eq!(fm.get("title"), Some(&"Hello".to_string()));
        assert_eq!(fm.get("count"), Some(&"3".to_string()));
        assert_eq!(fm.get("draft"), Some(&"false".to_string()));
        assert_eq!(body, "body text");
    }

    #[test]
    fn parses_list_of_strings() {
        let text = "---\ntags:\n  - rust\n  - search\n---\nbody";
        let (fm, _) = split_front_matter(text).unwrap();
        assert_eq!(fm.get("tags"), Some(&"rust, search".to_string()));
    }

    #[test]
    fn unterminated_fence_is_treated_as_no_front_matter() {
        let text = "---\ntitle: Hello\nno closing fence";
        let (fm, body) = split_front_matter(text).unwrap();
        assert!(fm.is_empty());
        assert_eq!(body, text);
    }
}
