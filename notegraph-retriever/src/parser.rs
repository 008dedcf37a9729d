//! Markdown structural parsing: frontmatter, title, tags, wikilinks

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::warn;

use crate::model::{NoteMetadata, WikiLink};
use crate::path_table::PathTable;

static FRONTMATTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A---[ \t]*\n(.*?)\n---[ \t]*\n").unwrap());
static WIKILINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[([^\]]+)\]\]").unwrap());
static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)#([a-zA-Z][a-zA-Z0-9_/-]*)\b").unwrap());
static CODE_BLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static INLINE_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`]+`").unwrap());
static BOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static ITALIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.+?)\*").unwrap());

/// Parse one note's raw text into metadata plus its outgoing wikilinks.
///
/// Pure function of (path, text, mtime) and the current [`PathTable`] used to
/// resolve link targets. Malformed frontmatter is treated as empty, never an
/// error.
pub fn parse(
    path: &str,
    text: &str,
    last_modified: Option<DateTime<Utc>>,
    table: &PathTable,
) -> (NoteMetadata, Vec<WikiLink>) {
    let (frontmatter, body) = extract_frontmatter(text);
    let title = extract_title(path, &frontmatter, body);
    let tags = extract_tags(&frontmatter, body);
    let links = extract_wikilinks(path, body, table);
    let word_count = strip_formatting(body).split_whitespace().count();

    let metadata = NoteMetadata {
        path: path.to_string(),
        title,
        last_modified: last_modified.unwrap_or_else(Utc::now),
        frontmatter,
        tags,
        word_count,
    };
    (metadata, links)
}

/// Return the markdown body: everything after a leading frontmatter block.
pub fn body_of(text: &str) -> &str {
    match FRONTMATTER_RE.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

fn extract_frontmatter(text: &str) -> (BTreeMap<String, serde_json::Value>, &str) {
    let Some(captures) = FRONTMATTER_RE.captures(text) else {
        return (BTreeMap::new(), text);
    };
    let body = &text[captures.get(0).unwrap().end()..];
    let raw = captures.get(1).unwrap().as_str();

    match serde_yaml::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => (map.into_iter().collect(), body),
        Ok(_) => (BTreeMap::new(), body),
        Err(_) => {
            warn!("Failed to parse frontmatter in note");
            (BTreeMap::new(), body)
        }
    }
}

fn extract_title(path: &str, frontmatter: &BTreeMap<String, serde_json::Value>, body: &str) -> String {
    if let Some(value) = frontmatter.get("title") {
        return match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    }

    // First level-1 heading: exactly one '#' followed by a space
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("# ") && !trimmed.starts_with("## ") {
            return trimmed.trim_start_matches('#').trim().to_string();
        }
    }

    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

fn extract_tags(frontmatter: &BTreeMap<String, serde_json::Value>, body: &str) -> Vec<String> {
    let mut tags: BTreeSet<String> = BTreeSet::new();

    // Frontmatter tags: accept a single string or a list
    match frontmatter.get("tags") {
        Some(serde_json::Value::String(tag)) => {
            tags.insert(tag.clone());
        }
        Some(serde_json::Value::Array(items)) => {
            for item in items {
                match item {
                    serde_json::Value::String(s) => tags.insert(s.clone()),
                    other => tags.insert(other.to_string()),
                };
            }
        }
        _ => {}
    }

    // Inline #tags, scanned with code spans removed
    let clean = without_code_spans(body);
    for captures in TAG_RE.captures_iter(&clean) {
        tags.insert(captures[1].to_string());
    }

    tags.into_iter().collect()
}

fn extract_wikilinks(source_path: &str, body: &str, table: &PathTable) -> Vec<WikiLink> {
    let clean = without_code_spans(body);
    let mut links: Vec<WikiLink> = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();

    for captures in WIKILINK_RE.captures_iter(&clean) {
        let raw = &captures[1];
        // For [[target|alias]] the link text is the part before the first '|'
        let link_text = raw.split('|').next().unwrap_or("").trim();
        if link_text.is_empty() || !seen.insert(link_text.to_string()) {
            continue;
        }
        let resolved = table.resolve(link_text).map(str::to_string);
        links.push(WikiLink::new(source_path, link_text, resolved));
    }
    links
}

fn without_code_spans(text: &str) -> String {
    let clean = CODE_BLOCK_RE.replace_all(text, "");
    INLINE_CODE_RE.replace_all(&clean, "").into_owned()
}

fn strip_formatting(text: &str) -> String {
    let text = without_code_spans(text);
    let text = BOLD_RE.replace_all(&text, "$1");
    let text = ITALIC_RE.replace_all(&text, "$1");
    WIKILINK_RE.replace_all(&text, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn empty_table() -> PathTable {
        let dir = tempdir().unwrap();
        PathTable::new(dir.path(), vec![".md".to_string()])
    }

    fn table_with(paths: &[&str]) -> PathTable {
        let mut table = empty_table();
        for path in paths {
            table.update(None, path);
        }
        table
    }

    #[test]
    fn frontmatter_title_wins_over_heading() {
        let text = "---\ntitle: From Frontmatter\n---\n# From Heading\n\nBody.\n";
        let (metadata, _) = parse("note.md", text, None, &empty_table());
        assert_eq!(metadata.title, "From Frontmatter");
        assert_eq!(
            metadata.frontmatter.get("title").and_then(|v| v.as_str()),
            Some("From Frontmatter")
        );
    }

    #[test]
    fn first_h1_wins_over_filename() {
        let text = "## Not this\n# The Title\n# Not this either\n";
        let (metadata, _) = parse("notes/file.md", text, None, &empty_table());
        assert_eq!(metadata.title, "The Title");
    }

    #[test]
    fn filename_stem_is_the_fallback_title() {
        let (metadata, _) = parse("dir/My Note.md", "plain body", None, &empty_table());
        assert_eq!(metadata.title, "My Note");
    }

    #[test]
    fn malformed_frontmatter_is_treated_as_empty() {
        let text = "---\ntitle: [unclosed\n  bad: : :\n---\n# Heading\n";
        let (metadata, _) = parse("note.md", text, None, &empty_table());
        assert!(metadata.frontmatter.is_empty());
        assert_eq!(metadata.title, "Heading");
    }

    #[test]
    fn non_mapping_frontmatter_is_treated_as_empty() {
        let text = "---\n- just\n- a list\n---\nBody\n";
        let (metadata, _) = parse("note.md", text, None, &empty_table());
        assert!(metadata.frontmatter.is_empty());
    }

    #[test]
    fn tags_merge_frontmatter_and_inline_sorted_deduped() {
        let text = "---\ntags:\n  - project\n  - zeta\n---\nBody with #alpha and #project tags.\n";
        let (metadata, _) = parse("note.md", text, None, &empty_table());
        assert_eq!(metadata.tags, vec!["alpha", "project", "zeta"]);
    }

    #[test]
    fn frontmatter_tags_accept_a_single_string() {
        let text = "---\ntags: solo\n---\nBody.\n";
        let (metadata, _) = parse("note.md", text, None, &empty_table());
        assert_eq!(metadata.tags, vec!["solo"]);
    }

    #[test]
    fn inline_tags_inside_code_spans_are_ignored() {
        let text = "Real #tag here.\n```\n#not-a-tag\n```\nAnd `#inline` code.\n";
        let (metadata, _) = parse("note.md", text, None, &empty_table());
        assert_eq!(metadata.tags, vec!["tag"]);
    }

    #[test]
    fn wikilinks_resolve_and_dedupe_in_first_occurrence_order() {
        let table = table_with(&["target.md", "other.md"]);
        let text = "See [[Target]] then [[Missing]] then [[Target]] again and [[other|an alias]].";
        let (_, links) = parse("source.md", text, None, &table);

        assert_eq!(links.len(), 3);
        assert_eq!(links[0].link_text, "Target");
        assert_eq!(links[0].resolved_target_path.as_deref(), Some("target.md"));
        assert_eq!(links[1].link_text, "Missing");
        assert_eq!(links[1].resolved_target_path, None);
        assert_eq!(links[2].link_text, "other");
        assert_eq!(links[2].resolved_target_path.as_deref(), Some("other.md"));
        assert!(links.iter().all(|l| l.source_path == "source.md"));
    }

    #[test]
    fn wikilinks_in_code_spans_are_ignored() {
        let table = table_with(&["real.md"]);
        let text = "[[Real]]\n```\n[[fenced]]\n```\n`[[inline]]`\n";
        let (_, links) = parse("note.md", text, None, &table);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].link_text, "Real");
    }

    #[test]
    fn word_count_strips_formatting_but_keeps_link_text() {
        let text = "Some **bold** and *italic* plus [[a link]].\n```\nignored code\n```\n";
        let (metadata, _) = parse("note.md", text, None, &empty_table());
        // "Some bold and italic plus a link." -> 7 words
        assert_eq!(metadata.word_count, 7);
    }

    #[test]
    fn body_of_strips_only_leading_frontmatter() {
        let text = "---\ntitle: T\n---\nThe body.\n";
        assert_eq!(body_of(text), "The body.\n");
        assert_eq!(body_of("No frontmatter here."), "No frontmatter here.");
        let not_leading = "Intro\n---\ntitle: T\n---\n";
        assert_eq!(body_of(not_leading), not_leading);
    }
}
