//! Language detection and tree-sitter grammar registry.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Source language with a tree-sitter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Python,
    Rust,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
}

/// Structural role of a definition node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Function,
    Class,
}

/// How a discovered file is chunked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Code(Lang),
    Document,
}

impl Lang {
    /// Identifier stored in record metadata.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Rust => "rust",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::Go => "go",
        }
    }

    /// Get the tree-sitter grammar. Returns `None` if the
    /// corresponding feature is not enabled.
    #[must_use]
    pub fn grammar(self) -> Option<tree_sitter::Language> {
        match self {
            #[cfg(feature = "lang-python")]
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            #[cfg(feature = "lang-rust")]
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            #[cfg(feature = "lang-js")]
            Self::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            #[cfg(feature = "lang-go")]
            Self::Go => Some(tree_sitter_go::LANGUAGE.into()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Classify a syntax node kind as a function or class definition.
    ///
    /// Rust items that group behavior (`struct`, `enum`, `trait`, `impl`) count as classes.
    #[must_use]
    pub fn unit_kind(self, node_kind: &str) -> Option<UnitKind> {
        let (functions, classes): (&[&str], &[&str]) = match self {
            Self::Python => (&["function_definition"], &["class_definition"]),
            Self::Rust => (
                &["function_item"],
                &["struct_item", "enum_item", "trait_item", "impl_item"],
            ),
            Self::JavaScript | Self::TypeScript | Self::Tsx => (
                &[
                    "function_declaration",
                    "generator_function_declaration",
                    "method_definition",
                ],
                &["class_declaration", "abstract_class_declaration"],
            ),
            Self::Go => (
                &["function_declaration", "method_declaration"],
                &["type_declaration"],
            ),
        };
        if functions.contains(&node_kind) {
            Some(UnitKind::Function)
        } else if classes.contains(&node_kind) {
            Some(UnitKind::Class)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Detect language from file extension.
#[must_use]
pub fn detect_language(path: &Path) -> Option<Lang> {
    let ext = path.extension()?.to_str()?;
    match ext {
        "py" | "pyi" => Some(Lang::Python),
        "rs" => Some(Lang::Rust),
        "js" | "jsx" | "mjs" | "cjs" => Some(Lang::JavaScript),
        "ts" | "mts" | "cts" => Some(Lang::TypeScript),
        "tsx" => Some(Lang::Tsx),
        "go" => Some(Lang::Go),
        _ => None,
    }
}

/// Classify a path as chunkable code (with a compiled-in grammar) or a Markdown document.
#[must_use]
pub fn detect_kind(path: &Path) -> Option<FileKind> {
    if let Some(ext) = path.extension().and_then(|e| e.to_str())
        && matches!(ext, "md" | "markdown")
    {
        return Some(FileKind::Document);
    }
    let lang = detect_language(path)?;
    lang.grammar().map(|_| FileKind::Code(lang))
}
