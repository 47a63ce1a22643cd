//! Function and class chunking over tree-sitter syntax trees.
//!
//! Every definition node becomes its own chunk, nested ones included. The end line
//! reported by the tree is re-checked by reparsing the candidate line range and taking the
//! last line that carries a token.

use tree_sitter::{Node, Parser, Point};

use crate::chunk::{Chunk, ChunkId, ChunkKind, CodeUnit};
use crate::error::{IndexError, Result};
use crate::languages::{Lang, UnitKind};

/// Chunker configuration.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Units spanning fewer lines are skipped (default: 5).
    pub min_lines: usize,
    /// Units longer than this many characters are skipped, not split (default: 50 000).
    pub max_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_lines: 5,
            max_chars: 50_000,
        }
    }
}

struct Candidate {
    kind: UnitKind,
    is_async: bool,
    name: String,
    start_row: usize,
    end_row: usize,
}

/// Parse `source` and emit one chunk per function, async function and class definition.
///
/// # Errors
///
/// Returns [`IndexError::UnsupportedLanguage`] if no grammar is compiled in and
/// [`IndexError::Parse`] if the source contains syntax errors.
pub fn chunk_code(
    source: &str,
    file_path: &str,
    lang: Lang,
    config: &ChunkerConfig,
) -> Result<Vec<Chunk>> {
    let grammar = lang.grammar().ok_or(IndexError::UnsupportedLanguage)?;

    let mut parser = Parser::new();
    parser
        .set_language(&grammar)
        .map_err(|e| IndexError::Parse(format!("set_language failed: {e}")))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| IndexError::Parse(format!("parse failed for {file_path}")))?;
    let root = tree.root_node();
    if root.has_error() {
        return Err(IndexError::Parse(format!("syntax errors in {file_path}")));
    }

    let lines: Vec<&str> = source.lines().collect();
    if lines.is_empty() {
        return Ok(Vec::new());
    }
    let last_row = lines.len() - 1;

    let mut chunks = Vec::new();
    for candidate in collect_candidates(root, source, lang) {
        let end_row = relex_end_row(&mut parser, &lines, candidate.start_row, candidate.end_row)
            .unwrap_or(candidate.end_row)
            .clamp(candidate.start_row, last_row);
        let Some(slice) = lines.get(candidate.start_row..=end_row) else {
            continue;
        };
        let content = slice.join("\n");
        if content.trim().is_empty() {
            continue;
        }

        let line_count = end_row - candidate.start_row + 1;
        let char_count = content.chars().count();
        if char_count > config.max_chars {
            tracing::warn!(
                file = %file_path,
                name = %candidate.name,
                chars = char_count,
                max_chars = config.max_chars,
                "unit exceeds max_chars, skipping"
            );
            continue;
        }
        if line_count < config.min_lines {
            tracing::debug!(
                file = %file_path,
                name = %candidate.name,
                lines = line_count,
                min_lines = config.min_lines,
                "unit below min_lines, skipping"
            );
            continue;
        }

        let unit = CodeUnit {
            name: candidate.name,
            language: lang,
        };
        let kind = match (candidate.kind, candidate.is_async) {
            (UnitKind::Class, _) => ChunkKind::Class(unit),
            (UnitKind::Function, true) => ChunkKind::AsyncFunction(unit),
            (UnitKind::Function, false) => ChunkKind::Function(unit),
        };
        chunks.push(Chunk {
            chunk_id: ChunkId::Seq(chunks.len() + 1),
            file_path: file_path.to_owned(),
            start_line: candidate.start_row + 1,
            end_line: end_row + 1,
            content,
            kind,
        });
    }

    Ok(chunks)
}

/// Pre-order walk with an explicit stack; output follows source order.
fn collect_candidates(root: Node<'_>, source: &str, lang: Lang) -> Vec<Candidate> {
    let mut out = Vec::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if let Some(kind) = lang.unit_kind(node.kind()) {
            out.push(Candidate {
                kind,
                is_async: kind == UnitKind::Function && is_async(&node, source),
                name: unit_name(&node, source),
                start_row: node.start_position().row,
                end_row: end_row(node.start_position(), node.end_position()),
            });
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    out
}

/// Last row holding node text; a node ending at column 0 ends on the previous row.
fn end_row(start: Point, end: Point) -> usize {
    if end.column == 0 && end.row > start.row {
        end.row - 1
    } else {
        end.row
    }
}

fn node_text<'a>(node: &Node<'_>, source: &'a str) -> &'a str {
    source.get(node.byte_range()).unwrap_or_default()
}

fn unit_name(node: &Node<'_>, source: &str) -> String {
    // impl_item names its subject with a "type" field; Go type_declaration nests a type_spec
    let direct = node
        .child_by_field_name("name")
        .or_else(|| node.child_by_field_name("type"));
    let nested = || {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .find_map(|c| c.child_by_field_name("name"))
    };
    direct
        .or_else(nested)
        .map(|n| node_text(&n, source).to_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "<anonymous>".to_owned())
}

fn is_async(node: &Node<'_>, source: &str) -> bool {
    let header_end = node
        .child_by_field_name("name")
        .map_or(node.end_byte(), |n| n.start_byte());
    source
        .get(node.start_byte()..header_end)
        .unwrap_or_default()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .any(|word| word == "async")
}

/// Reparse `lines[start..=end]` (dedented) and return the last row with a token.
///
/// `None` when the slice does not parse cleanly on its own.
fn relex_end_row(parser: &mut Parser, lines: &[&str], start: usize, end: usize) -> Option<usize> {
    let slice = lines.get(start..=end)?;
    let first = slice.first()?;
    let indent = &first[..first.len() - first.trim_start().len()];
    let text = slice
        .iter()
        .map(|l| l.strip_prefix(indent).unwrap_or_else(|| l.trim_start()))
        .collect::<Vec<_>>()
        .join("\n");

    let tree = parser.parse(&text, None)?;
    let root = tree.root_node();
    if root.has_error() {
        return None;
    }

    let mut last: Option<usize> = None;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.child_count() == 0 {
            if node.start_byte() < node.end_byte() {
                let row = end_row(node.start_position(), node.end_position());
                last = Some(last.map_or(row, |l| l.max(row)));
            }
            continue;
        }
        let mut cursor = node.walk();
        stack.extend(node.children(&mut cursor));
    }
    last.map(|row| start + row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn min_lines(min_lines: usize) -> ChunkerConfig {
        ChunkerConfig {
            min_lines,
            ..ChunkerConfig::default()
        }
    }

    fn by_name<'a>(chunks: &'a [Chunk], name: &str) -> &'a Chunk {
        chunks
            .iter()
            .find(|c| c.name() == name)
            .unwrap_or_else(|| panic!("no chunk named {name}"))
    }

    #[cfg(feature = "lang-python")]
    mod python {
        use super::*;

        const BASIC: &str = "
import os

class SimpleClass:
    def method_one(self, x):
        # A comment inside method
        return x * 2

async def async_function():
    pass

def standalone_function(a, b):
    # A comment
    return a + b
";

        const NESTED: &str = "
class OuterClass:
    y = 10
    def outer_method(self):
        z = 5
        class InnerClass:
            def inner_method(self):
                return self.y # scoped lookup

        def nested_function(p):
            # Nested comment
            return p + z
        return nested_function(3)

def top_level_func_with_nested():
    def inner_func(n):
        return n + 1
    return inner_func(5)
";

        const DECORATORS: &str = "
def my_decorator(func):
    def wrapper(*args, **kwargs):
        print(\"before\")
        result = func(*args, **kwargs)
        print(\"after\")
        return result
    return wrapper

@my_decorator
def say_whee():
    print(\"Whee!\")

class DecoratedClass:
    @my_decorator
    def decorated_method(self):
        print(\"Method whee!\")
";

        const SMALL_FUNCS: &str = "
def small_one():
    return 1

def small_two(a):
    b = a + 1
    return b
";

        // class (6 lines) holding a 5-line method, a 6-line function and a one-liner: 14 lines
        const FOURTEEN_LINES: &str = "class Greeter:
    def greet(self, name):
        prefix = \"Hello\"
        message = f\"{prefix}, {name}\"
        print(message)
        return message

def add(a, b):
    total = a + b
    if total > 10:
        print(\"big\")
    result = total * 2
    return result
def noop(): pass
";

        fn chunk(source: &str, config: &ChunkerConfig) -> Vec<Chunk> {
            chunk_code(source, "sample.py", Lang::Python, config).unwrap()
        }

        #[test]
        fn basic_units_with_min_one_line() {
            let chunks = chunk(BASIC, &min_lines(1));
            assert_eq!(chunks.len(), 4);

            let class = by_name(&chunks, "SimpleClass");
            assert_eq!(class.start_line, 4);
            assert_eq!(class.end_line, 7);
            assert!(matches!(class.kind, ChunkKind::Class(_)));
            assert!(class.content.contains("method_one"));

            let method = by_name(&chunks, "method_one");
            assert_eq!((method.start_line, method.end_line), (5, 7));
            assert!(matches!(method.kind, ChunkKind::Function(_)));

            let async_fn = by_name(&chunks, "async_function");
            assert_eq!((async_fn.start_line, async_fn.end_line), (9, 10));
            assert!(matches!(async_fn.kind, ChunkKind::AsyncFunction(_)));
            assert!(async_fn.content.starts_with("async def async_function():"));

            let func = by_name(&chunks, "standalone_function");
            assert_eq!((func.start_line, func.end_line), (12, 14));
        }

        #[test]
        fn chunk_ids_are_sequential_in_source_order() {
            let chunks = chunk(BASIC, &min_lines(1));
            let ids: Vec<_> = chunks.iter().map(|c| c.chunk_id.clone()).collect();
            assert_eq!(
                ids,
                vec![
                    ChunkId::Seq(1),
                    ChunkId::Seq(2),
                    ChunkId::Seq(3),
                    ChunkId::Seq(4)
                ]
            );
            assert_eq!(chunks[0].name(), "SimpleClass");
            assert_eq!(chunks[1].name(), "method_one");
        }

        #[test]
        fn nested_definitions_each_get_a_chunk() {
            let chunks = chunk(NESTED, &min_lines(1));
            assert_eq!(chunks.len(), 7);
            let expected_starts = [
                ("OuterClass", 2),
                ("outer_method", 4),
                ("InnerClass", 6),
                ("inner_method", 7),
                ("nested_function", 10),
                ("top_level_func_with_nested", 15),
                ("inner_func", 16),
            ];
            for (name, start) in expected_starts {
                assert_eq!(by_name(&chunks, name).start_line, start, "{name}");
            }
            let outer = by_name(&chunks, "OuterClass");
            assert!(outer.content.contains("def nested_function(p):"));
            assert_eq!(outer.end_line, 13);
        }

        #[test]
        fn decorator_line_is_not_part_of_the_unit() {
            let chunks = chunk(DECORATORS, &min_lines(1));
            assert_eq!(chunks.len(), 5);
            let whee = by_name(&chunks, "say_whee");
            assert_eq!(whee.start_line, 11);
            assert!(whee.content.starts_with("def say_whee():"));
            assert!(!whee.content.contains("@my_decorator"));
            assert_eq!(by_name(&chunks, "wrapper").start_line, 3);
            assert_eq!(by_name(&chunks, "decorated_method").start_line, 16);
        }

        #[test]
        fn small_units_dropped_at_default_minimum() {
            assert!(chunk(SMALL_FUNCS, &ChunkerConfig::default()).is_empty());
        }

        #[test]
        fn small_units_kept_with_min_one_line() {
            let chunks = chunk(SMALL_FUNCS, &min_lines(1));
            assert_eq!(chunks.len(), 2);
            assert_eq!(chunks[0].name(), "small_one");
            assert_eq!((chunks[0].start_line, chunks[0].end_line), (2, 3));
            assert_eq!(chunks[1].name(), "small_two");
            assert_eq!((chunks[1].start_line, chunks[1].end_line), (5, 7));
        }

        #[test]
        fn fourteen_line_file_respects_line_threshold() {
            assert_eq!(FOURTEEN_LINES.lines().count(), 14);

            let chunks = chunk(FOURTEEN_LINES, &ChunkerConfig::default());
            let names: Vec<&str> = chunks.iter().map(Chunk::name).collect();
            assert_eq!(names, vec!["Greeter", "greet", "add"]);

            let chunks = chunk(FOURTEEN_LINES, &min_lines(1));
            assert_eq!(chunks.len(), 4);
            let class = by_name(&chunks, "Greeter");
            let method = by_name(&chunks, "greet");
            assert!(class.content.contains(&method.content));
            assert_eq!(by_name(&chunks, "noop").start_line, 14);
        }

        #[test]
        fn oversized_unit_is_skipped() {
            let long = format!(
                "def long_function():\n    return {:?}\n",
                "very long ".repeat(20)
            );
            let config = ChunkerConfig {
                min_lines: 1,
                max_chars: 100,
            };
            assert!(chunk(&long, &config).is_empty());
        }

        #[test]
        fn empty_and_definition_free_files_yield_nothing() {
            assert!(chunk("", &min_lines(1)).is_empty());
            assert!(chunk("x = 1\ny = 2\nprint(x + y)\n", &min_lines(1)).is_empty());
        }

        #[test]
        fn syntax_error_is_a_parse_error() {
            let err = chunk_code(
                "def func(\n    print('hello')\n",
                "bad.py",
                Lang::Python,
                &min_lines(1),
            )
            .unwrap_err();
            assert!(matches!(err, IndexError::Parse(_)));
        }

        #[test]
        fn trailing_blank_lines_are_not_included() {
            let chunks = chunk("def f():\n    return 1\n\n\n\nx = 2\n", &min_lines(1));
            assert_eq!(chunks.len(), 1);
            assert_eq!(chunks[0].end_line, 2);
            assert_eq!(chunks[0].content, "def f():\n    return 1");
        }

        mod proptest_chunker {
            use super::*;
            use proptest::prelude::*;

            proptest! {
                #![proptest_config(ProptestConfig::with_cases(64))]

                #[test]
                fn chunks_are_verbatim_line_slices(
                    bodies in proptest::collection::vec((1usize..6, proptest::bool::ANY), 1..6)
                ) {
                    let mut source = String::new();
                    for (i, (body_lines, nested)) in bodies.iter().enumerate() {
                        source.push_str(&format!("def f{i}(x):\n"));
                        if *nested {
                            source.push_str("    def inner(y):\n        return y\n");
                        }
                        for j in 0..*body_lines {
                            source.push_str(&format!("    v{j} = x + {j}\n"));
                        }
                        source.push_str("    return x\n\n");
                    }
                    let lines: Vec<&str> = source.lines().collect();
                    let chunks = chunk_code(&source, "gen.py", Lang::Python, &min_lines(1)).unwrap();
                    prop_assert!(!chunks.is_empty());
                    for c in &chunks {
                        prop_assert!(c.start_line >= 1);
                        prop_assert!(c.start_line <= c.end_line);
                        let slice = lines[c.start_line - 1..c.end_line].join("\n");
                        prop_assert_eq!(&c.content, &slice);
                    }
                }
            }
        }
    }

    #[cfg(feature = "lang-rust")]
    #[test]
    fn rust_items_and_async_fn() {
        let source = "pub struct Point {
    x: i32,
}

impl Point {
    pub async fn norm(&self) -> i32 {
        self.x.abs()
    }
}

fn helper() {}
";
        let chunks = chunk_code(source, "src/point.rs", Lang::Rust, &min_lines(1)).unwrap();
        let tags: Vec<(&str, &str)> = chunks.iter().map(|c| (c.name(), c.kind.tag())).collect();
        assert_eq!(
            tags,
            vec![
                ("Point", "class"),
                ("Point", "class"),
                ("norm", "async_function"),
                ("helper", "function"),
            ]
        );
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (5, 9));
    }

    #[cfg(feature = "lang-js")]
    #[test]
    fn javascript_class_methods_and_async_function() {
        let source = "class Counter {
  constructor() {
    this.n = 0;
  }
  increment() {
    this.n += 1;
    return this.n;
  }
}

async function load(url) {
  const res = await fetch(url);
  return res.json();
}
";
        let chunks = chunk_code(source, "web/counter.js", Lang::JavaScript, &min_lines(1)).unwrap();
        assert_eq!(chunks.len(), 4);
        assert!(matches!(by_name(&chunks, "Counter").kind, ChunkKind::Class(_)));
        let increment = by_name(&chunks, "increment");
        assert_eq!((increment.start_line, increment.end_line), (5, 8));
        assert!(matches!(
            by_name(&chunks, "load").kind,
            ChunkKind::AsyncFunction(_)
        ));
    }

    #[cfg(feature = "lang-go")]
    #[test]
    fn go_types_and_methods() {
        let source = "package main

type Server struct {
\taddr string
}

func (s *Server) Start() error {
\treturn nil
}

func main() {
}
";
        let chunks = chunk_code(source, "cmd/main.go", Lang::Go, &min_lines(1)).unwrap();
        let names: Vec<&str> = chunks.iter().map(Chunk::name).collect();
        assert_eq!(names, vec!["Server", "Start", "main"]);
        assert!(matches!(chunks[0].kind, ChunkKind::Class(_)));
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (7, 9));
    }

    #[test]
    fn end_row_steps_back_from_column_zero() {
        let start = Point { row: 2, column: 0 };
        assert_eq!(end_row(start, Point { row: 5, column: 0 }), 4);
        assert_eq!(end_row(start, Point { row: 5, column: 3 }), 5);
        assert_eq!(end_row(start, Point { row: 2, column: 0 }), 2);
    }
}
