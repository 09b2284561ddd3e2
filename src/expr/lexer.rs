use crate::ast::SourcePosition;
use crate::error::{CompileError, ErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Number, string, raw string or character literal, verbatim
    Literal(String),
    Ident(String),
    /// `$name`; an empty name is the bare `$`
    Var(String),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Bang,

    LParen,
    RParen,
    Comma,
    Dot,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprToken {
    pub kind: TokenKind,
    /// Byte offset into the expression text
    pub offset: usize,
}

/// Splits expression text into tokens, ending with `Eof`
pub fn lex(source: &str) -> Result<Vec<ExprToken>, CompileError> {
    let mut lexer = Lexer {
        source,
        chars: source.char_indices().peekable(),
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    tokens: Vec<ExprToken>,
}

impl<'a> Lexer<'a> {
    fn run(&mut self) -> Result<(), CompileError> {
        while let Some((offset, c)) = self.chars.next() {
            let kind = match c {
                c if c.is_whitespace() => continue,
                '0'..='9' => TokenKind::Literal(self.number(offset)),
                '"' => TokenKind::Literal(self.quoted(offset, '"')?),
                '\'' => TokenKind::Literal(self.quoted(offset, '\'')?),
                '`' => TokenKind::Literal(self.raw_string(offset)?),
                '$' => TokenKind::Var(self.word(offset + 1)),
                c if is_ident_start(c) => TokenKind::Ident(self.word(offset)),
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Star,
                '/' => TokenKind::Slash,
                '%' => TokenKind::Percent,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                ',' => TokenKind::Comma,
                '.' => TokenKind::Dot,
                '&' if self.eat('&') => TokenKind::AndAnd,
                '|' if self.eat('|') => TokenKind::OrOr,
                '=' if self.eat('=') => TokenKind::EqEq,
                '!' if self.eat('=') => TokenKind::NotEq,
                '!' => TokenKind::Bang,
                '<' if self.eat('=') => TokenKind::LtEq,
                '<' if self.peek_is('<') => return Err(unsupported("shift operator", offset)),
                '<' => TokenKind::Lt,
                '>' if self.eat('=') => TokenKind::GtEq,
                '>' if self.peek_is('>') => return Err(unsupported("shift operator", offset)),
                '>' => TokenKind::Gt,
                '&' | '|' | '^' => return Err(unsupported("bitwise operator", offset)),
                '[' | ']' => return Err(unsupported("index expression", offset)),
                '{' | '}' => return Err(unsupported("composite literal", offset)),
                ':' => return Err(unsupported("slice expression", offset)),
                '=' => return Err(unsupported("assignment inside an expression", offset)),
                other => {
                    return Err(invalid(format!("Unexpected character '{}' at offset {}", other, offset)));
                }
            };
            self.tokens.push(ExprToken { kind, offset });
        }

        self.tokens.push(ExprToken {
            kind: TokenKind::Eof,
            offset: self.source.len(),
        });
        Ok(())
    }

    fn peek_is(&mut self, expected: char) -> bool {
        matches!(self.chars.peek(), Some(&(_, c)) if c == expected)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek_is(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn end_of_current(&mut self) -> usize {
        self.chars.peek().map_or(self.source.len(), |&(offset, _)| offset)
    }

    fn word(&mut self, start: usize) -> String {
        while matches!(self.chars.peek(), Some(&(_, c)) if is_ident_continue(c)) {
            self.chars.next();
        }
        let end = self.end_of_current();
        self.source[start..end].to_string()
    }

    /// Decimal, hex or float literal
    fn number(&mut self, start: usize) -> String {
        let hex = self.source[start..].starts_with("0x") || self.source[start..].starts_with("0X");
        if hex {
            self.chars.next();
        }

        let mut previous = ' ';
        while let Some(&(offset, c)) = self.chars.peek() {
            let exponent_sign = !hex && (c == '+' || c == '-') && matches!(previous, 'e' | 'E');
            let fraction = c == '.'
                && !hex
                && self.source[offset + 1..].starts_with(|next: char| next.is_ascii_digit());
            if c.is_ascii_alphanumeric() || c == '_' || exponent_sign || fraction {
                previous = c;
                self.chars.next();
            } else {
                break;
            }
        }

        let end = self.end_of_current();
        self.source[start..end].to_string()
    }

    fn quoted(&mut self, start: usize, quote: char) -> Result<String, CompileError> {
        while let Some((offset, c)) = self.chars.next() {
            match c {
                '\\' => {
                    self.chars.next();
                }
                c if c == quote => return Ok(self.source[start..offset + 1].to_string()),
                _ => {}
            }
        }
        Err(invalid(format!("Unterminated literal starting at offset {}", start)))
    }

    fn raw_string(&mut self, start: usize) -> Result<String, CompileError> {
        for (offset, c) in self.chars.by_ref() {
            if c == '`' {
                return Ok(self.source[start..offset + 1].to_string());
            }
        }
        Err(invalid(format!("Unterminated raw string starting at offset {}", start)))
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn invalid(message: String) -> CompileError {
    CompileError::new(ErrorKind::InvalidExpression, message, SourcePosition::default())
}

fn unsupported(construct: &str, offset: usize) -> CompileError {
    CompileError::new(
        ErrorKind::UnsupportedExpression,
        format!("Unsupported {} at offset {}", construct, offset),
        SourcePosition::default(),
    )
}
