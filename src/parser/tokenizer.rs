use crate::ast::BlockModifier;
use crate::error::{CompileError, ErrorKind};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Position in a source unit, used for diagnostics only
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourcePosition {
    pub filename: Option<Arc<str>>,
    /// Line number (1-indexed, 0 when unknown)
    pub line: usize,
    /// Column number (1-indexed, in bytes)
    pub column: usize,
    /// Byte length of the token
    pub length: usize,
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filename = self.filename.as_deref().unwrap_or("<input>");
        write!(f, "{}:{}:{}", filename, self.line, self.column)
    }
}

/// How a text token was written in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    /// Text following a tag on the same line
    Inline,
    /// Text introduced by `|`
    Piped,
    /// Text captured verbatim from a raw block
    Raw,
}

/// Tokens produced by the tokenizer, one per `next_token()` call
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Structural ===
    Eof { position: SourcePosition },
    Blank { position: SourcePosition },
    Indent { prefix: String, position: SourcePosition },
    Outdent { position: SourcePosition },

    // === Markup ===
    Doctype { value: String, position: SourcePosition },
    Comment { text: String, silent: bool, condition: Option<String>, position: SourcePosition },
    Text { value: String, mode: TextMode, position: SourcePosition },
    Tag { name: String, raw: bool, position: SourcePosition },
    Id { name: String, guard: Option<String>, position: SourcePosition },
    Class { name: String, guard: Option<String>, position: SourcePosition },
    /// `[name]`, `[name="literal"]` or `[name=expression]`
    Attribute {
        name: String,
        value: String,
        quoted: bool,
        guard: Option<String>,
        position: SourcePosition,
    },

    // === Control ===
    /// `$var = expr`, or `= expr` when `variable` is `None`
    Assignment { variable: Option<String>, expression: String, position: SourcePosition },
    If { expression: String, position: SourcePosition },
    ElseIf { expression: String, position: SourcePosition },
    Else { position: SourcePosition },
    Each { key: String, value: Option<String>, expression: String, position: SourcePosition },

    // === Composition ===
    NamedBlock { name: String, modifier: BlockModifier, position: SourcePosition },
    Import { path: String, position: SourcePosition },
    Extend { path: String, position: SourcePosition },
}

impl Token {
    pub fn position(&self) -> &SourcePosition {
        match self {
            Token::Eof { position }
            | Token::Blank { position }
            | Token::Indent { position, .. }
            | Token::Outdent { position }
            | Token::Doctype { position, .. }
            | Token::Comment { position, .. }
            | Token::Text { position, .. }
            | Token::Tag { position, .. }
            | Token::Id { position, .. }
            | Token::Class { position, .. }
            | Token::Attribute { position, .. }
            | Token::Assignment { position, .. }
            | Token::If { position, .. }
            | Token::ElseIf { position, .. }
            | Token::Else { position }
            | Token::Each { position, .. }
            | Token::NamedBlock { position, .. }
            | Token::Import { position, .. }
            | Token::Extend { position, .. } => position,
        }
    }

    /// Short human-readable name, used in error messages
    pub fn describe(&self) -> &'static str {
        match self {
            Token::Eof { .. } => "end of input",
            Token::Blank { .. } => "blank line",
            Token::Indent { .. } => "indentation",
            Token::Outdent { .. } => "outdent",
            Token::Doctype { .. } => "doctype",
            Token::Comment { .. } => "comment",
            Token::Text { .. } => "text",
            Token::Tag { .. } => "tag",
            Token::Id { .. } => "id shorthand",
            Token::Class { .. } => "class shorthand",
            Token::Attribute { .. } => "attribute",
            Token::Assignment { .. } => "assignment",
            Token::If { .. } => "if",
            Token::ElseIf { .. } => "else if",
            Token::Else { .. } => "else",
            Token::Each { .. } => "each",
            Token::NamedBlock { .. } => "block",
            Token::Import { .. } => "import",
            Token::Extend { .. } => "extend",
        }
    }
}

lazy_static! {
    static ref INDENT: Regex = Regex::new(r"^[ \t]*").unwrap();
    static ref DOCTYPE: Regex = Regex::new(r"^(?:!|doctype)(?:\s+(.*))?$").unwrap();
    static ref IF: Regex = Regex::new(r"^if\b\s*(.+)$").unwrap();
    static ref ELSE_IF: Regex = Regex::new(r"^elsif\b\s*(.+)$").unwrap();
    static ref ELSE: Regex = Regex::new(r"^else\b\s*").unwrap();
    static ref EACH: Regex = Regex::new(r"^each\s+(\$\w*)(?:\s*,\s*(\$\w*))?\s+in\s+(.+)$").unwrap();
    static ref IMPORT: Regex = Regex::new(r"^import\s+([0-9a-zA-Z_\-\./ ]+)$").unwrap();
    static ref EXTEND: Regex = Regex::new(r"^extend\s+([0-9a-zA-Z_\-\./ ]+)$").unwrap();
    static ref NAMED_BLOCK: Regex =
        Regex::new(r"^block\s+(?:(append|prepend)\s+)?([0-9a-zA-Z_\-\./ ]+)$").unwrap();
    static ref ASSIGNMENT: Regex = Regex::new(r"^(\$\w*)?\s*=\s*(.+)$").unwrap();
    static ref TAG: Regex = Regex::new(r"^(\w[-:\w]*)(!)?").unwrap();
    static ref ID: Regex = Regex::new(r"^#([\w-]+)(?:\s*\?\s*(.*)$)?").unwrap();
    static ref CLASS: Regex = Regex::new(r"^\.([\w-]+)(?:\s*\?\s*(.*)$)?").unwrap();
    static ref ATTRIBUTE: Regex =
        Regex::new(r#"^\[([\w-]+)\s*(?:=\s*(?:"([^"\\]*)"|([^\]]+)))?\](?:\s*\?\s*(.*)$)?"#).unwrap();
    static ref COMMENT: Regex = Regex::new(r"^//(-)?(?:\s*\[if\s+([^\]]+?)\s*\])?\s*(.*)$").unwrap();
    static ref TEXT: Regex = Regex::new(r"^(\|)? ?(.*)$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    NewLine,
    Line,
    Eof,
}

/// Pull-based tokenizer that turns indentation into Indent/Outdent tokens.
///
/// Lines are read one at a time into `buffer`; each call to `next_token()`
/// consumes one construct from the buffer. Pending outdents produced by a
/// multi-level dedent are queued and drained before any new scanning.
pub struct Tokenizer {
    source: String,
    cursor: usize,
    buffer: String,
    state: ScanState,
    line: usize,
    column: usize,
    /// Incremental indentation prefixes, outermost first
    indents: Vec<String>,
    pending: VecDeque<Token>,
    raw_requested: bool,
    filename: Option<Arc<str>>,
    last: SourcePosition,
}

impl Tokenizer {
    pub fn new(source: impl Into<String>, filename: Option<Arc<str>>) -> Self {
        Self {
            source: source.into(),
            cursor: 0,
            buffer: String::new(),
            state: ScanState::NewLine,
            line: 0,
            column: 0,
            indents: Vec::new(),
            pending: VecDeque::new(),
            raw_requested: false,
            last: SourcePosition {
                filename: filename.clone(),
                ..SourcePosition::default()
            },
            filename,
        }
    }

    /// Capture the block opened by the current Indent token as literal text
    pub fn request_raw(&mut self) {
        self.raw_requested = true;
    }

    /// Position of the most recently consumed token
    pub fn position(&self) -> SourcePosition {
        self.last.clone()
    }

    pub fn next_token(&mut self) -> Result<Token, CompileError> {
        if std::mem::take(&mut self.raw_requested) {
            return self.scan_raw();
        }

        self.read_line();

        if let Some(token) = self.pending.pop_front() {
            return Ok(token);
        }

        loop {
            match self.state {
                ScanState::Eof => {
                    let position = self.position();
                    return Ok(if self.indents.pop().is_some() {
                        Token::Outdent { position }
                    } else {
                        Token::Eof { position }
                    });
                }
                ScanState::NewLine => {
                    self.state = ScanState::Line;
                    if let Some(token) = self.scan_indent()? {
                        return Ok(token);
                    }
                }
                ScanState::Line => return Ok(self.scan_line()),
            }
        }
    }

    fn read_line(&mut self) {
        if !self.buffer.is_empty() {
            return;
        }

        if self.cursor >= self.source.len() {
            self.state = ScanState::Eof;
            return;
        }

        let rest = &self.source[self.cursor..];
        let line = match rest.find('\n') {
            Some(end) => {
                self.cursor += end + 1;
                &rest[..end]
            }
            None => {
                self.cursor = self.source.len();
                rest
            }
        };

        self.buffer = line.trim_end().to_string();
        self.line += 1;
        self.column = 0;
        self.state = ScanState::NewLine;
    }

    fn consume(&mut self, length: usize) {
        self.last = SourcePosition {
            filename: self.filename.clone(),
            line: self.line,
            column: self.column + 1,
            length,
        };
        self.buffer.drain(..length);
        self.column += length;
    }

    fn scan_indent(&mut self) -> Result<Option<Token>, CompileError> {
        if self.buffer.is_empty() {
            return Ok(Some(Token::Blank { position: self.position() }));
        }

        let mut matched = 0;
        while matched < self.indents.len() && self.buffer.starts_with(self.indents[matched].as_str()) {
            let length = self.indents[matched].len();
            self.consume(length);
            matched += 1;
        }

        let prefix = INDENT
            .find(&self.buffer)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let fully_matched = matched == self.indents.len();

        match (prefix.is_empty(), fully_matched) {
            (false, true) => {
                self.consume(prefix.len());
                self.indents.push(prefix.clone());
                Ok(Some(Token::Indent { prefix, position: self.position() }))
            }
            (true, false) => {
                let popped = self.indents.len() - matched;
                self.indents.truncate(matched);
                let position = self.position();
                for _ in 1..popped {
                    self.pending.push_back(Token::Outdent { position: position.clone() });
                }
                Ok(Some(Token::Outdent { position }))
            }
            (false, false) => {
                let position = SourcePosition {
                    filename: self.filename.clone(),
                    line: self.line,
                    column: self.column + 1,
                    length: prefix.len(),
                };
                Err(CompileError::new(
                    ErrorKind::IndentationMismatch,
                    "Mismatching indentation. Please use a coherent indent schema.",
                    position,
                )
                .with_help("Every line at the same depth must start with the same spaces or tabs"))
            }
            (true, true) => Ok(None),
        }
    }

    /// Capture every line nested under the current indentation level verbatim.
    ///
    /// Nesting below the capture's starting depth is re-expressed as tabs. The
    /// region ends at the first line indented less than the starting depth, whose
    /// outdents are queued for the parser.
    fn scan_raw(&mut self) -> Result<Token, CompileError> {
        let depth = self.indents.len();
        let position = self.position();
        let mut captured = String::new();

        loop {
            self.read_line();

            match self.state {
                ScanState::Eof => {
                    // Levels opened inside the raw region were never seen by the parser
                    self.indents.truncate(depth);
                    break;
                }
                ScanState::NewLine => {
                    self.state = ScanState::Line;
                    let queued = self.pending.len();

                    match self.scan_indent()? {
                        Some(Token::Blank { .. }) => captured.push('\n'),
                        Some(_) => {
                            self.pending.truncate(queued);
                            if self.indents.len() < depth {
                                let position = self.position();
                                for _ in self.indents.len()..depth {
                                    self.pending.push_back(Token::Outdent { position: position.clone() });
                                }
                                break;
                            }
                        }
                        None => {}
                    }
                }
                ScanState::Line => {
                    if !captured.is_empty() {
                        captured.push('\n');
                    }
                    for _ in depth..self.indents.len() {
                        captured.push('\t');
                    }
                    captured.push_str(&self.buffer);
                    let length = self.buffer.len();
                    self.consume(length);
                }
            }
        }

        let value = captured.trim_end().to_string();
        log::debug!("captured {} bytes of raw text at {}", value.len(), position);

        Ok(Token::Text { value, mode: TextMode::Raw, position })
    }

    /// Recognize one construct at the front of the buffer, first match wins
    fn scan_line(&mut self) -> Token {
        self.scan_doctype()
            .or_else(|| self.scan_condition())
            .or_else(|| self.scan_each())
            .or_else(|| self.scan_import())
            .or_else(|| self.scan_extend())
            .or_else(|| self.scan_named_block())
            .or_else(|| self.scan_assignment())
            .or_else(|| self.scan_tag())
            .or_else(|| self.scan_id())
            .or_else(|| self.scan_class())
            .or_else(|| self.scan_attribute())
            .or_else(|| self.scan_comment())
            .unwrap_or_else(|| self.scan_text())
    }

    fn scan_doctype(&mut self) -> Option<Token> {
        let caps = DOCTYPE.captures(&self.buffer)?;
        let length = caps[0].len();
        let value = group(&caps, 1).unwrap_or_else(|| "html".to_string());
        self.consume(length);
        Some(Token::Doctype { value, position: self.position() })
    }

    fn scan_condition(&mut self) -> Option<Token> {
        if let Some(caps) = IF.captures(&self.buffer) {
            let length = caps[0].len();
            let expression = caps[1].trim().to_string();
            self.consume(length);
            return Some(Token::If { expression, position: self.position() });
        }

        if let Some(caps) = ELSE_IF.captures(&self.buffer) {
            let length = caps[0].len();
            let expression = caps[1].trim().to_string();
            self.consume(length);
            return Some(Token::ElseIf { expression, position: self.position() });
        }

        let length = ELSE.find(&self.buffer)?.end();
        self.consume(length);
        Some(Token::Else { position: self.position() })
    }

    fn scan_each(&mut self) -> Option<Token> {
        let caps = EACH.captures(&self.buffer)?;
        let length = caps[0].len();
        let key = caps[1].to_string();
        let value = group(&caps, 2);
        let expression = caps[3].trim().to_string();
        self.consume(length);
        Some(Token::Each { key, value, expression, position: self.position() })
    }

    fn scan_import(&mut self) -> Option<Token> {
        let caps = IMPORT.captures(&self.buffer)?;
        let length = caps[0].len();
        let path = caps[1].trim().to_string();
        self.consume(length);
        Some(Token::Import { path, position: self.position() })
    }

    fn scan_extend(&mut self) -> Option<Token> {
        let caps = EXTEND.captures(&self.buffer)?;
        let length = caps[0].len();
        let path = caps[1].trim().to_string();
        self.consume(length);
        Some(Token::Extend { path, position: self.position() })
    }

    fn scan_named_block(&mut self) -> Option<Token> {
        let caps = NAMED_BLOCK.captures(&self.buffer)?;
        let length = caps[0].len();
        let modifier = match caps.get(1).map(|m| m.as_str()) {
            Some("append") => BlockModifier::Append,
            Some("prepend") => BlockModifier::Prepend,
            _ => BlockModifier::Default,
        };
        let name = caps[2].trim().to_string();
        self.consume(length);
        Some(Token::NamedBlock { name, modifier, position: self.position() })
    }

    fn scan_assignment(&mut self) -> Option<Token> {
        let caps = ASSIGNMENT.captures(&self.buffer)?;
        let length = caps[0].len();
        let variable = group(&caps, 1);
        let expression = caps[2].trim().to_string();
        self.consume(length);
        Some(Token::Assignment { variable, expression, position: self.position() })
    }

    fn scan_tag(&mut self) -> Option<Token> {
        let caps = TAG.captures(&self.buffer)?;
        let length = caps[0].len();
        let name = caps[1].to_string();
        let raw = caps.get(2).is_some();
        self.consume(length);
        Some(Token::Tag { name, raw, position: self.position() })
    }

    fn scan_id(&mut self) -> Option<Token> {
        let caps = ID.captures(&self.buffer)?;
        let length = caps[0].len();
        let name = caps[1].to_string();
        let guard = group(&caps, 2);
        self.consume(length);
        Some(Token::Id { name, guard, position: self.position() })
    }

    fn scan_class(&mut self) -> Option<Token> {
        let caps = CLASS.captures(&self.buffer)?;
        let length = caps[0].len();
        let name = caps[1].to_string();
        let guard = group(&caps, 2);
        self.consume(length);
        Some(Token::Class { name, guard, position: self.position() })
    }

    fn scan_attribute(&mut self) -> Option<Token> {
        let caps = ATTRIBUTE.captures(&self.buffer)?;
        let length = caps[0].len();
        let name = caps[1].to_string();
        let (value, quoted) = match (caps.get(2), caps.get(3)) {
            (Some(literal), _) => (literal.as_str().to_string(), true),
            (None, Some(expression)) => (expression.as_str().trim().to_string(), false),
            (None, None) => (String::new(), true),
        };
        let guard = group(&caps, 4);
        self.consume(length);
        Some(Token::Attribute { name, value, quoted, guard, position: self.position() })
    }

    fn scan_comment(&mut self) -> Option<Token> {
        let caps = COMMENT.captures(&self.buffer)?;
        let length = caps[0].len();
        let silent = caps.get(1).is_some();
        let condition = group(&caps, 2);
        let text = caps[3].to_string();
        self.consume(length);
        Some(Token::Comment { text, silent, condition, position: self.position() })
    }

    fn scan_text(&mut self) -> Token {
        let (length, value, piped) = match TEXT.captures(&self.buffer) {
            Some(caps) => (caps[0].len(), caps[2].to_string(), caps.get(1).is_some()),
            None => (self.buffer.len(), self.buffer.clone(), false),
        };
        self.consume(length);
        let mode = if piped { TextMode::Piped } else { TextMode::Inline };
        Token::Text { value, mode, position: self.position() }
    }
}

/// Non-empty capture group as an owned string
fn group(caps: &Captures, index: usize) -> Option<String> {
    caps.get(index)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Tokenize a whole source string, up to and including the Eof token
pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    let mut tokenizer = Tokenizer::new(source, None);
    let mut tokens = Vec::new();

    loop {
        let token = tokenizer.next_token()?;
        let done = matches!(token, Token::Eof { .. });
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}
