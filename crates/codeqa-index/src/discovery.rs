//! Repository walk that partitions candidate files into source code and documents.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;

use crate::error::{IndexError, Result};
use crate::languages::{FileKind, Lang, detect_kind};

/// Paths skipped by default: VCS metadata, virtualenvs, dependency and build output.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "__pycache__",
    "*.pyc",
    "*.egg-info",
    ".venv",
    "venv",
    "env",
    "node_modules",
    "build",
    "dist",
    "target",
];

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Gitignore-style globs; a match on a directory prunes the whole subtree.
    pub ignore_patterns: Vec<String>,
    /// Also honor `.gitignore`/`.ignore` files found in the tree.
    pub respect_gitignore: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|p| (*p).to_owned())
                .collect(),
            respect_gitignore: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// Root-relative, `/`-separated.
    pub rel_path: String,
}

/// Candidate files, each list sorted by relative path.
#[derive(Debug, Default)]
pub struct DiscoveredFiles {
    pub code: Vec<(DiscoveredFile, Lang)>,
    pub documents: Vec<DiscoveredFile>,
}

impl DiscoveredFiles {
    #[must_use]
    pub fn len(&self) -> usize {
        self.code.len() + self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Walk `root` and collect chunkable files.
///
/// # Errors
///
/// Returns [`IndexError::InvalidRoot`] if `root` is not a directory and
/// [`IndexError::Validation`] for a malformed ignore pattern.
pub fn discover(root: &Path, config: &DiscoveryConfig) -> Result<DiscoveredFiles> {
    if !root.is_dir() {
        return Err(IndexError::InvalidRoot(root.to_path_buf()));
    }

    let mut overrides = OverrideBuilder::new(root);
    for pattern in &config.ignore_patterns {
        overrides
            .add(&format!("!{pattern}"))
            .map_err(|e| IndexError::Validation(format!("ignore pattern {pattern:?}: {e}")))?;
    }
    let overrides = overrides
        .build()
        .map_err(|e| IndexError::Validation(format!("ignore patterns: {e}")))?;

    let mut found = DiscoveredFiles::default();
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(config.respect_gitignore)
        .git_exclude(config.respect_gitignore)
        .ignore(config.respect_gitignore)
        .require_git(false)
        .overrides(overrides)
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("walk error: {e}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let Some(kind) = detect_kind(entry.path()) else {
            continue;
        };
        let rel_path = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        let file = DiscoveredFile {
            path: entry.into_path(),
            rel_path,
        };
        match kind {
            FileKind::Code(lang) => found.code.push((file, lang)),
            FileKind::Document => found.documents.push(file),
        }
    }

    found.code.sort_by(|a, b| a.0.rel_path.cmp(&b.0.rel_path));
    found.documents.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    tracing::debug!(
        code = found.code.len(),
        documents = found.documents.len(),
        "discovery finished"
    );
    Ok(found)
}
