//! Syntax error types and diagnostic rendering.
//!
//! [`LexError`] and [`ParseError`] are always fatal: they happen before any
//! rule has executed, so a run that hits one must end as `Errored` rather
//! than pretend the checks completed.

use std::fmt;

/// A half-open region of source text with its line/column start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub col: usize,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(line: usize, col: usize, start: usize, end: usize) -> Self {
        Self {
            line,
            col,
            start,
            end,
        }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn merge(&self, other: &Span) -> Self {
        Self {
            line: self.line.min(other.line),
            col: if self.line <= other.line {
                self.col
            } else {
                other.col
            },
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[derive(Debug, Clone)]
pub enum LexError {
    UnexpectedChar {
        ch: char,
        span: Span,
        suggestion: Option<String>,
    },
    UnterminatedString {
        span: Span,
    },
    InvalidNumber {
        text: String,
        span: Span,
    },
    UnknownSizeUnit {
        unit: String,
        span: Span,
    },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedChar { span, .. } => *span,
            LexError::UnterminatedString { span } => *span,
            LexError::InvalidNumber { span, .. } => *span,
            LexError::UnknownSizeUnit { span, .. } => *span,
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::UnexpectedChar { ch, suggestion, .. } => {
                write!(f, "unexpected character '{}'", ch)?;
                if let Some(s) = suggestion {
                    write!(f, " ({})", s)?;
                }
                Ok(())
            }
            LexError::UnterminatedString { .. } => write!(f, "unterminated string literal"),
            LexError::InvalidNumber { text, .. } => write!(f, "invalid number: '{}'", text),
            LexError::UnknownSizeUnit { unit, .. } => {
                write!(f, "unknown size unit '{}' (use KB, MB, GB, or TB)", unit)
            }
        }
    }
}

impl std::error::Error for LexError {}

/// Classification of a grammar violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedToken,
    UnexpectedEof,
    InvalidSyntax,
}

/// A grammar violation with the first offending position.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// What the parser was looking for, e.g. `"'{'"` or `"an expression"`.
    pub expected: String,
    /// What it actually saw, e.g. `"keyword 'else'"` or `"end of file"`.
    pub found: String,
    pub span: Option<Span>,
}

impl ParseError {
    pub fn unexpected(expected: impl Into<String>, found: impl Into<String>, span: Span) -> Self {
        Self {
            kind: ParseErrorKind::UnexpectedToken,
            expected: expected.into(),
            found: found.into(),
            span: Some(span),
        }
    }

    pub fn eof(expected: impl Into<String>) -> Self {
        Self {
            kind: ParseErrorKind::UnexpectedEof,
            expected: expected.into(),
            found: "end of file".to_string(),
            span: None,
        }
    }

    pub fn invalid(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: ParseErrorKind::InvalidSyntax,
            expected: message.into(),
            found: String::new(),
            span: Some(span),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ParseErrorKind::UnexpectedToken => {
                write!(f, "expected {}, found {}", self.expected, self.found)
            }
            ParseErrorKind::UnexpectedEof => {
                write!(f, "unexpected end of file, expected {}", self.expected)
            }
            ParseErrorKind::InvalidSyntax => write!(f, "{}", self.expected),
        }
    }
}

impl std::error::Error for ParseError {}

/// Renders a lex or parse error against its source text with a caret line,
/// in the usual compiler style:
///
/// ```text
/// error: expected '{', found keyword 'else'
///   --> line 3:14
/// ```
pub struct Diagnostic<'a> {
    source: &'a str,
    message: String,
    label: &'static str,
    span: Option<Span>,
}

impl<'a> Diagnostic<'a> {
    pub fn lex(source: &'a str, error: &LexError) -> Self {
        Self {
            source,
            message: error.to_string(),
            label: "lexical error",
            span: Some(error.span()),
        }
    }

    pub fn parse(source: &'a str, error: &ParseError) -> Self {
        Self {
            source,
            message: error.to_string(),
            label: "parse error",
            span: error.span,
        }
    }

    pub fn format_error(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("\x1b[1;31merror\x1b[0m: {}\n", self.message));

        let Some(span) = self.span else {
            out.push_str(&format!("   \x1b[1;34m|\x1b[0m {}\n", self.label));
            return out;
        };

        out.push_str(&format!(
            "  \x1b[1;34m-->\x1b[0m line {}:{}\n",
            span.line, span.col
        ));
        out.push_str("   \x1b[1;34m|\x1b[0m\n");

        let lines: Vec<&str> = self.source.lines().collect();
        if span.line > 0 && span.line <= lines.len() {
            let line_content = lines[span.line - 1];
            let width = span.line.to_string().len().max(2);
            out.push_str(&format!(
                " {: >width$} \x1b[1;34m|\x1b[0m {}\n",
                span.line,
                line_content,
                width = width
            ));

            let caret_len = span.end.saturating_sub(span.start).max(1);
            out.push_str(&format!(
                " {: >width$} \x1b[1;34m|\x1b[0m {}\x1b[1;31m{}\x1b[0m {}\n",
                "",
                " ".repeat(span.col.saturating_sub(1)),
                "^".repeat(caret_len),
                self.label,
                width = width
            ));
        }

        out.push_str("   \x1b[1;34m|\x1b[0m\n");
        out
    }
}

impl fmt::Display for Diagnostic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_error())
    }
}
