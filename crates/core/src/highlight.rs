//! Per-line syntax highlighting
//!
//! The editor view asks a [`Highlighter`] for spans once per distinct text
//! and caches the result keyed by that exact text.

use std::rc::Rc;

/// Highlight category of a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanKind {
    Keyword,
    Number,
    Comment,
}

/// Highlighted byte range within one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub kind: SpanKind,
}

impl Span {
    pub fn new(start: usize, end: usize, kind: SpanKind) -> Self {
        Self { start, end, kind }
    }
}

/// Spans of every line of a text, indexed by line number
pub type HighlightedText = Rc<Vec<Vec<Span>>>;

/// Syntax highlighter
pub trait Highlighter {
    /// Spans of a single line, in order
    fn highlight_line(&self, line: &str) -> Vec<Span>;

    /// Spans of every line of `text`
    fn highlight(&self, text: &str) -> HighlightedText {
        Rc::new(text.lines().map(|line| self.highlight_line(line)).collect())
    }
}

const KEYWORDS: &[&str] = &[
    "as", "break", "class", "const", "continue", "def", "else", "enum", "false", "fn", "for",
    "from", "if", "impl", "import", "in", "let", "loop", "match", "mod", "mut", "pub", "return",
    "self", "static", "struct", "trait", "true", "type", "use", "where", "while",
];

/// Language-agnostic highlighter for keywords, numbers and line comments
///
/// Comments start at `//` or `#` and run to the end of the line.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainHighlighter;

impl Highlighter for PlainHighlighter {
    fn highlight_line(&self, line: &str) -> Vec<Span> {
        let bytes = line.as_bytes();
        let mut spans = Vec::new();
        let mut i = 0;

        while i < bytes.len() {
            let byte = bytes[i];
            if byte == b'#' || bytes[i..].starts_with(b"//") {
                spans.push(Span::new(i, bytes.len(), SpanKind::Comment));
                break;
            }

            if byte.is_ascii_alphabetic() || byte == b'_' {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                if KEYWORDS.contains(&&line[start..i]) {
                    spans.push(Span::new(start, i, SpanKind::Keyword));
                }
                continue;
            }

            if byte.is_ascii_digit() {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.' || bytes[i] == b'_')
                {
                    i += 1;
                }
                spans.push(Span::new(start, i, SpanKind::Number));
                continue;
            }

            i += 1;
        }

        spans
    }
}
