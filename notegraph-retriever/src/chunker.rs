//! Heading-aware splitting of note bodies into retrieval chunks

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::model::NoteChunk;

static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").unwrap());

/// Splits a note body into heading-scoped, size-bounded chunks.
///
/// Deterministic given identical inputs. Chunk ids and indices run
/// sequentially across the whole document, not per section.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    /// `chunk_overlap` must be strictly less than `chunk_size`; the window
    /// split would never advance otherwise. Callers validate via
    /// [`crate::config::VaultConfig::validate`]; this is the second line of
    /// defense.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        assert!(
            chunk_overlap < chunk_size,
            "chunk_overlap must be strictly less than chunk_size"
        );
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Split `body` into ordered chunks for `note_path`.
    pub fn chunk(&self, note_path: &str, body: &str) -> Vec<NoteChunk> {
        let mut chunks: Vec<NoteChunk> = Vec::new();

        for (heading_context, section_text) in split_by_headings(body) {
            let section_text = section_text.trim();
            if section_text.is_empty() {
                continue;
            }

            if section_text.chars().count() <= self.chunk_size {
                chunks.push(NoteChunk::new(
                    note_path,
                    section_text.to_string(),
                    chunks.len(),
                    heading_context.clone(),
                ));
            } else {
                for window in self.split_fixed_size(section_text) {
                    chunks.push(NoteChunk::new(
                        note_path,
                        window,
                        chunks.len(),
                        heading_context.clone(),
                    ));
                }
            }
        }

        chunks
    }

    /// Fixed-size windows advancing by `chunk_size - chunk_overlap` characters.
    fn split_fixed_size(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = self.chunk_size - self.chunk_overlap;
        let mut windows: Vec<String> = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            let trimmed = window.trim();
            if !trimmed.is_empty() {
                windows.push(trimmed.to_string());
            }
            start += step;
        }
        windows
    }
}

/// Segment `body` by heading lines, pairing each segment with the
/// ` > `-joined chain of headings active before it.
///
/// Setting a heading at level L overwrites level L and discards every deeper
/// recorded level, so a new H2 clears any active H3+. Text preceding the
/// first heading carries no context. Level gaps (an H3 with no prior H1/H2)
/// are not validated; whatever levels are set join the context in ascending
/// level order.
fn split_by_headings(body: &str) -> Vec<(Option<String>, String)> {
    let mut heading_by_level: BTreeMap<usize, String> = BTreeMap::new();
    let mut sections: Vec<(Option<String>, String)> = Vec::new();
    let mut current_lines: Vec<&str> = Vec::new();

    for line in body.split('\n') {
        if let Some(captures) = HEADING_RE.captures(line) {
            if !current_lines.is_empty() {
                sections.push((build_context(&heading_by_level), current_lines.join("\n")));
                current_lines.clear();
            }

            let level = captures[1].len();
            let heading_text = captures[2].trim().to_string();
            heading_by_level.insert(level, heading_text);
            heading_by_level.retain(|&l, _| l <= level);
        } else {
            current_lines.push(line);
        }
    }

    if !current_lines.is_empty() {
        sections.push((build_context(&heading_by_level), current_lines.join("\n")));
    }

    sections
}

fn build_context(heading_by_level: &BTreeMap<usize, String>) -> Option<String> {
    if heading_by_level.is_empty() {
        return None;
    }
    // BTreeMap iterates in ascending level order
    Some(
        heading_by_level
            .values()
            .cloned()
            .collect::<Vec<_>>()
            .join(" > "),
    )
}
