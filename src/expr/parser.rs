use super::lexer::{ExprToken, TokenKind, lex};
use super::{BinaryOp, Expr, UnaryOp};
use crate::ast::SourcePosition;
use crate::error::{CompileError, ErrorKind};

type ParseResult<T> = Result<T, CompileError>;

/// Parses one complete expression; trailing input is an error
pub fn parse(source: &str) -> ParseResult<Expr> {
    let tokens = lex(source)?;
    let mut parser = ExprParser { tokens, index: 0 };

    if parser.check(&TokenKind::Eof) {
        return Err(CompileError::new(
            ErrorKind::InvalidExpression,
            "Expected an expression",
            SourcePosition::default(),
        ));
    }

    let expr = parser.parse_or()?;
    if !parser.check(&TokenKind::Eof) {
        return Err(parser.error("Unexpected trailing input"));
    }
    Ok(expr)
}

struct ExprParser {
    tokens: Vec<ExprToken>,
    index: usize,
}

impl ExprParser {
    fn current(&self) -> &ExprToken {
        // The token list always ends with Eof and the index never passes it
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.current().kind.clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        kind
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: &str) -> CompileError {
        let token = self.current();
        let found = match &token.kind {
            TokenKind::Eof => "end of expression".to_string(),
            TokenKind::Literal(text) | TokenKind::Ident(text) => format!("'{}'", text),
            TokenKind::Var(name) => format!("'${}'", name),
            other => format!("{:?}", other),
        };
        CompileError::new(
            ErrorKind::InvalidExpression,
            format!("{}: found {} at offset {}", message, found, token.offset),
            SourcePosition::default(),
        )
    }

    /// Left-associative binary level over `next`
    fn binary_level(
        &mut self,
        operator: fn(&TokenKind) -> Option<BinaryOp>,
        next: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let mut expr = next(self)?;

        while let Some(op) = operator(&self.current().kind) {
            self.advance();
            let right = next(self)?;
            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            |kind| matches!(kind, TokenKind::OrOr).then_some(BinaryOp::Or),
            Self::parse_and,
        )
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            |kind| matches!(kind, TokenKind::AndAnd).then_some(BinaryOp::And),
            Self::parse_comparison,
        )
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            |kind| match kind {
                TokenKind::EqEq => Some(BinaryOp::Eq),
                TokenKind::NotEq => Some(BinaryOp::Ne),
                TokenKind::Lt => Some(BinaryOp::Lt),
                TokenKind::LtEq => Some(BinaryOp::Le),
                TokenKind::Gt => Some(BinaryOp::Gt),
                TokenKind::GtEq => Some(BinaryOp::Ge),
                _ => None,
            },
            Self::parse_term,
        )
    }

    fn parse_term(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            |kind| match kind {
                TokenKind::Plus => Some(BinaryOp::Add),
                TokenKind::Minus => Some(BinaryOp::Sub),
                _ => None,
            },
            Self::parse_factor,
        )
    }

    fn parse_factor(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            |kind| match kind {
                TokenKind::Star => Some(BinaryOp::Mul),
                TokenKind::Slash => Some(BinaryOp::Quo),
                TokenKind::Percent => Some(BinaryOp::Rem),
                _ => None,
            },
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = match &self.current().kind {
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Ident(name) if name == "not" => Some(UnaryOp::Not),
            _ => None,
        };

        match op {
            Some(op) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            None => self.parse_postfix(),
        }
    }

    /// Field selection and calls bind tighter than any operator
    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.consume(&TokenKind::Dot) {
                let TokenKind::Ident(name) = self.current().kind.clone() else {
                    return Err(self.error("Expected a field name after '.'"));
                };
                self.advance();
                expr = Expr::Field {
                    base: Box::new(expr),
                    name,
                };
            } else if self.consume(&TokenKind::LParen) {
                let args = self.parse_arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.consume(&TokenKind::RParen) {
            return Ok(args);
        }

        loop {
            args.push(self.parse_or()?);
            if self.consume(&TokenKind::RParen) {
                return Ok(args);
            }
            if !self.consume(&TokenKind::Comma) {
                return Err(self.error("Expected ',' or ')' in argument list"));
            }
            // Trailing comma
            if self.consume(&TokenKind::RParen) {
                return Ok(args);
            }
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        match self.current().kind.clone() {
            TokenKind::Literal(text) => {
                self.advance();
                Ok(Expr::Literal(text))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(match name.as_str() {
                    "true" | "false" | "nil" => Expr::Literal(name),
                    _ => Expr::Ident(name),
                })
            }
            TokenKind::Var(name) => {
                self.advance();
                Ok(Expr::Var(name))
            }
            // `.Name` reads a field of the current data
            TokenKind::Dot => {
                self.advance();
                match self.advance() {
                    TokenKind::Ident(name) => Ok(Expr::Ident(name)),
                    _ => Err(self.error("Expected a field name after '.'")),
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_or()?;
                if !self.consume(&TokenKind::RParen) {
                    return Err(self.error("Expected ')'"));
                }
                Ok(Expr::Paren(Box::new(inner)))
            }
            _ => Err(self.error("Expected an operand")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.to_string()))
    }

    #[test]
    fn test_precedence() {
        let expr = parse("a + b * c").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Add,
                left: ident("a"),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    left: ident("b"),
                    right: ident("c"),
                }),
            }
        );
    }

    #[test]
    fn test_left_associativity() {
        let expr = parse("a - b - c").unwrap();
        assert!(matches!(
            expr,
            Expr::Binary { op: BinaryOp::Sub, left, .. } if matches!(*left, Expr::Binary { op: BinaryOp::Sub, .. })
        ));
    }

    #[test]
    fn test_logical_below_comparison() {
        let expr = parse("a < b || c == d && e").unwrap();
        let Expr::Binary { op: BinaryOp::Or, left, right } = expr else { panic!("expected ||") };
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::Lt, .. }));
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn test_unary_binds_tighter_than_binary() {
        let expr = parse("-a * b").unwrap();
        assert!(matches!(
            expr,
            Expr::Binary { op: BinaryOp::Mul, left, .. } if matches!(*left, Expr::Unary { op: UnaryOp::Minus, .. })
        ));
        assert!(matches!(parse("not $ok").unwrap(), Expr::Unary { op: UnaryOp::Not, .. }));
    }

    #[test]
    fn test_selector_chain_and_call() {
        let expr = parse("$user.Profile.Name").unwrap();
        let Expr::Field { base, name } = expr else { panic!("expected field") };
        assert_eq!(name, "Name");
        assert!(matches!(*base, Expr::Field { ref name, .. } if name == "Profile"));

        let expr = parse("printf(\"%d items\", len(items))").unwrap();
        let Expr::Call { callee, args } = expr else { panic!("expected call") };
        assert_eq!(*callee, Expr::Ident("printf".to_string()));
        assert_eq!(args.len(), 2);
        assert!(matches!(&args[1], Expr::Call { .. }));
    }

    #[test]
    fn test_keyword_literals() {
        assert_eq!(parse("true").unwrap(), Expr::Literal("true".to_string()));
        assert_eq!(parse("nil").unwrap(), Expr::Literal("nil".to_string()));
    }

    #[test]
    fn test_leading_dot_field() {
        assert_eq!(parse(".Title").unwrap(), Expr::Ident("Title".to_string()));
    }

    #[test]
    fn test_invalid_expressions() {
        for source in ["", "a +", "(a", "a b", "f(a b)", "a.", "*"] {
            let err = parse(source).unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidExpression, "{:?}", source);
        }
    }
}
