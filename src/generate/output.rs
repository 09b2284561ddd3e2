use crate::ast::SourcePosition;
use serde::Serialize;

/// Generated position (1-based) paired with the source construct that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mapping {
    pub gen_line: usize,
    pub gen_col: usize,
    pub src_line: usize,
    pub src_col: usize,
}

/// Output buffer that accumulates generated script text with mappings
pub struct Output {
    buffer: String,
    line: usize,
    column: usize,
    /// Current tab depth
    level: usize,
    pretty: bool,
    mappings: Vec<Mapping>,
}

impl Output {
    pub fn new(pretty: bool) -> Self {
        Self {
            buffer: String::new(),
            line: 1,
            column: 1,
            level: 0,
            pretty,
            mappings: Vec::new(),
        }
    }

    /// Add text without mapping
    pub fn push(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.buffer.push_str(text);
    }

    /// Add text with source mapping
    pub fn push_mapped(&mut self, text: &str, source: &SourcePosition) {
        self.mappings.push(Mapping {
            gen_line: self.line,
            gen_col: self.column,
            src_line: source.line,
            src_col: source.column,
        });
        self.push(text);
    }

    /// Start a line at the current depth. Without `newline` only the tabs are
    /// written. Compact output writes nothing.
    pub fn indent(&mut self, newline: bool) {
        if !self.pretty {
            return;
        }

        if newline && !self.buffer.is_empty() {
            self.push("\n");
        }

        for _ in 0..self.level {
            self.push("\t");
        }
    }

    pub fn nest(&mut self) {
        self.level += 1;
    }

    pub fn unnest(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    /// Finish and return the generated code; non-empty output ends with a newline
    pub fn finish(mut self) -> (String, Vec<Mapping>) {
        if !self.buffer.is_empty() {
            self.push("\n");
        }
        (self.buffer, self.mappings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indent_skips_leading_newline() {
        let mut out = Output::new(true);
        out.indent(true);
        out.push("<a>");
        out.nest();
        out.indent(true);
        out.push("<b></b>");
        out.unnest();
        out.indent(true);
        out.push("</a>");
        let (code, _) = out.finish();
        assert_eq!(code, "<a>\n\t<b></b>\n</a>\n");
    }

    #[test]
    fn test_compact_output_ignores_indent() {
        let mut out = Output::new(false);
        out.push("<a>");
        out.nest();
        out.indent(true);
        out.push("<b></b>");
        let (code, _) = out.finish();
        assert_eq!(code, "<a><b></b>\n");
    }

    #[test]
    fn test_empty_output_has_no_newline() {
        let (code, mappings) = Output::new(true).finish();
        assert!(code.is_empty());
        assert!(mappings.is_empty());
    }

    #[test]
    fn test_mappings_track_generated_position() {
        let mut out = Output::new(true);
        let source = SourcePosition {
            filename: None,
            line: 3,
            column: 5,
            length: 1,
        };
        out.push("<a>\n\t");
        out.push_mapped("<b>", &source);
        let (_, mappings) = out.finish();
        assert_eq!(
            mappings,
            vec![Mapping {
                gen_line: 2,
                gen_col: 2,
                src_line: 3,
                src_col: 5,
            }]
        );
    }
}
