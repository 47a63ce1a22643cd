//! Header-driven section chunking for Markdown documents.
//!
//! Each header opens a section that runs until its first direct child header, or until the
//! next header of the same or shallower level. Lines inside ```` ``` ```` fences are never
//! headers.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::chunk::{Chunk, ChunkId, ChunkKind, Section};

static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#+)\s+(.+)$").expect("header regex is valid"));

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W+").expect("non-word regex is valid"));

/// Default deepest header level treated as a section boundary.
pub const DEFAULT_MAX_HEADER_DEPTH: usize = 6;

fn parse_header(line: &str) -> Option<(usize, &str)> {
    let caps = HEADER.captures(line)?;
    let level = caps.get(1)?.as_str().len();
    let text = caps.get(2)?.as_str().trim();
    Some((level, text))
}

fn is_fence(line: &str) -> bool {
    line.trim().starts_with("```")
}

fn sanitize(header: &str) -> String {
    NON_WORD
        .replace_all(&header.to_lowercase(), "_")
        .trim_matches('_')
        .to_owned()
}

struct SectionWalk<'a> {
    lines: Vec<&'a str>,
    file_path: &'a str,
    base_id: String,
    max_depth: usize,
    counter: usize,
    chunks: Vec<Chunk>,
}

impl<'a> SectionWalk<'a> {
    /// Emit the section headed at `start` and its descendants. Returns the index of the
    /// first line past the section's subtree.
    fn section(&mut self, start: usize, parent: Option<&str>) -> usize {
        let Some(&header_line) = self.lines.get(start) else {
            return start + 1;
        };
        let Some((level, header)) = parse_header(header_line) else {
            return start + 1;
        };

        let mut stop = self.lines.len();
        let mut children = Vec::new();
        let mut in_fence = false;
        for (i, line) in self.lines.iter().enumerate().skip(start + 1) {
            if is_fence(line) {
                in_fence = !in_fence;
            }
            if in_fence {
                continue;
            }
            let Some((child_level, _)) = parse_header(line) else {
                continue;
            };
            if child_level <= level {
                stop = i;
                break;
            }
            if child_level == level + 1 && child_level <= self.max_depth {
                children.push(i);
            }
        }

        let content_end = children.first().copied().unwrap_or(stop);
        let content = self.lines[start..content_end].join("\n").trim().to_owned();
        let own_id = if content.is_empty() || content == header_line.trim() {
            None
        } else {
            self.counter += 1;
            let id = format!(
                "{}::{}_{}",
                parent.unwrap_or(self.base_id.as_str()),
                self.counter,
                sanitize(header)
            );
            self.chunks.push(Chunk {
                chunk_id: ChunkId::Slug(id.clone()),
                file_path: self.file_path.to_owned(),
                start_line: start + 1,
                end_line: content_end,
                content,
                kind: ChunkKind::Section(Section {
                    header: header.to_owned(),
                    level,
                    parent_chunk_id: parent.map(str::to_owned),
                }),
            });
            Some(id)
        };

        // children of a section with no body of its own attach to the nearest emitted ancestor
        let child_parent = own_id.as_deref().or(parent).map(str::to_owned);
        for child in children {
            self.section(child, child_parent.as_deref());
        }
        stop
    }
}

/// Split a Markdown document into nested section chunks.
///
/// Headers deeper than `max_header_depth` are treated as body text. Text before the first
/// header is not chunked.
#[must_use]
pub fn chunk_markdown(text: &str, file_path: &str, max_header_depth: usize) -> Vec<Chunk> {
    let base_id = Path::new(file_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut walk = SectionWalk {
        lines: text.lines().collect(),
        file_path,
        base_id,
        max_depth: max_header_depth,
        counter: 0,
        chunks: Vec::new(),
    };

    let mut processed_until = 0;
    let mut in_fence = false;
    for i in 0..walk.lines.len() {
        let line = walk.lines[i];
        if is_fence(line) {
            in_fence = !in_fence;
        }
        if in_fence || i < processed_until {
            continue;
        }
        if let Some((level, _)) = parse_header(line)
            && level <= max_header_depth
        {
            processed_until = walk.section(i, None);
        }
    }

    walk.chunks
}
