use crate::ast::SourcePosition;
use serde::Serialize;
use thiserror::Error;

/// Kind of compile error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    IndentationMismatch,
    UnexpectedToken,
    MisplacedAttribute,
    ConditionalAttribute,
    MultipleExtends,
    DuplicateBlock,
    DuplicateElse,
    MissingPath,
    CyclicInclude,
    InvalidExpression,
    UnsupportedExpression,
    InvalidDoctype,
    Io,
}

/// Broad failure category, used for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Lexical,
    Grammar,
    Expression,
    Resource,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::IndentationMismatch => "Indentation mismatch",
            ErrorKind::UnexpectedToken => "Unexpected token",
            ErrorKind::MisplacedAttribute => "Misplaced attribute",
            ErrorKind::ConditionalAttribute => "Conditional attribute",
            ErrorKind::MultipleExtends => "Multiple extends",
            ErrorKind::DuplicateBlock => "Duplicate block",
            ErrorKind::DuplicateElse => "Duplicate else",
            ErrorKind::MissingPath => "Missing path",
            ErrorKind::CyclicInclude => "Cyclic include",
            ErrorKind::InvalidExpression => "Invalid expression",
            ErrorKind::UnsupportedExpression => "Unsupported expression",
            ErrorKind::InvalidDoctype => "Invalid doctype",
            ErrorKind::Io => "I/O error",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            ErrorKind::IndentationMismatch => Category::Lexical,
            ErrorKind::UnexpectedToken
            | ErrorKind::MisplacedAttribute
            | ErrorKind::ConditionalAttribute
            | ErrorKind::MultipleExtends
            | ErrorKind::DuplicateBlock
            | ErrorKind::DuplicateElse
            | ErrorKind::InvalidDoctype => Category::Grammar,
            ErrorKind::InvalidExpression | ErrorKind::UnsupportedExpression => Category::Expression,
            ErrorKind::MissingPath | ErrorKind::CyclicInclude | ErrorKind::Io => Category::Resource,
        }
    }
}

/// A fatal compile failure, carrying the position of the offending token.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{message} ({position})")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub position: SourcePosition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, position: SourcePosition) -> Self {
        Self {
            kind,
            message: message.into(),
            position,
            help: None,
        }
    }

    /// Add help text
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Attach a position when the failure site did not know one (e.g. expression errors)
    pub fn at(mut self, position: &SourcePosition) -> Self {
        if self.position.line == 0 {
            self.position = position.clone();
        }
        self
    }

    pub fn category(&self) -> Category {
        self.kind.category()
    }

    /// Render the error with source context
    pub fn render(&self, source: &str) -> String {
        self.render_inner(source, false)
    }

    /// Render the error with ANSI color codes
    pub fn render_color(&self, source: &str) -> String {
        self.render_inner(source, true)
    }

    fn render_inner(&self, source: &str, color: bool) -> String {
        let red = if color { "\x1b[1;31m" } else { "" };
        let dim = if color { "\x1b[2m" } else { "" };
        let cyan = if color { "\x1b[1;38;5;73m" } else { "" };
        let reset = if color { "\x1b[0m" } else { "" };

        let mut output = String::new();
        output.push('\n');
        output.push_str(&format!(" {}file:{} {}\n", dim, reset, self.position));
        output.push_str(&format!(
            "{}error:{} {} {}[{}]{}\n",
            red,
            reset,
            self.message,
            dim,
            self.kind.as_str(),
            reset
        ));

        let line = self.position.line;
        if let Some(source_line) = line.checked_sub(1).and_then(|index| source.lines().nth(index)) {
            let width = line.to_string().len().max(2);
            output.push_str(&format!("{}{:>width$} |{}\n", dim, "", reset, width = width));
            output.push_str(&format!(
                "{}{:>width$} |{} {}\n",
                dim, line, reset, source_line,
                width = width
            ));

            let start = self.position.column.saturating_sub(1).min(source_line.len());
            let carets = self
                .position
                .length
                .min(source_line.len().saturating_sub(start))
                .max(1);
            output.push_str(&format!(
                "{}{:>width$} |{} {}{}{}{}\n",
                dim, "", reset,
                " ".repeat(start), red, "^".repeat(carets), reset,
                width = width
            ));
        }

        if let Some(ref help) = self.help {
            output.push('\n');
            for (i, help_line) in help.lines().enumerate() {
                if i == 0 {
                    output.push_str(&format!(" {}help:{} {}\n", cyan, reset, help_line));
                } else {
                    output.push_str(&format!("       {}\n", help_line));
                }
            }
        }

        output.push('\n');
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn position(line: usize, column: usize, length: usize) -> SourcePosition {
        SourcePosition {
            filename: Some(Arc::from("page.slim")),
            line,
            column,
            length,
        }
    }

    #[test]
    fn test_display_includes_location() {
        let err = CompileError::new(ErrorKind::DuplicateBlock, "Block redefined", position(3, 1, 13));
        assert_eq!(err.to_string(), "Block redefined (page.slim:3:1)");
    }

    #[test]
    fn test_render_points_at_token() {
        let source = "div\n  p.note\n\tspan";
        let err = CompileError::new(
            ErrorKind::IndentationMismatch,
            "Mismatching indentation",
            position(3, 1, 1),
        )
        .with_help("Use the same whitespace for every line at one depth");

        let rendered = err.render(source);
        assert!(rendered.contains("file: page.slim:3:1"));
        assert!(rendered.contains("error: Mismatching indentation [Indentation mismatch]"));
        assert!(rendered.contains(" 3 | \tspan"));
        assert!(rendered.contains("   | ^\n"));
        assert!(rendered.contains("help: Use the same whitespace"));
    }

    #[test]
    fn test_render_without_source_line() {
        let err = CompileError::new(ErrorKind::Io, "Unable to read layout.slim", SourcePosition::default());
        let rendered = err.render("");
        assert!(rendered.contains("error: Unable to read layout.slim"));
        assert!(!rendered.contains('^'));
    }

    #[test]
    fn test_at_keeps_known_position() {
        let err = CompileError::new(ErrorKind::InvalidExpression, "bad", position(2, 4, 1))
            .at(&position(9, 9, 9));
        assert_eq!(err.position.line, 2);

        let err = CompileError::new(ErrorKind::InvalidExpression, "bad", SourcePosition::default())
            .at(&position(9, 9, 9));
        assert_eq!(err.position.line, 9);
    }

    #[test]
    fn test_categories() {
        assert_eq!(ErrorKind::IndentationMismatch.category(), Category::Lexical);
        assert_eq!(ErrorKind::MultipleExtends.category(), Category::Grammar);
        assert_eq!(ErrorKind::UnsupportedExpression.category(), Category::Expression);
        assert_eq!(ErrorKind::Io.category(), Category::Resource);
    }
}
