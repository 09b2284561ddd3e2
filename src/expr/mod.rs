//! Expression grammar for interpolations, conditions, loop sources and
//! attribute values.
//!
//! Covers literals, identifiers, `$variables`, field selection, unary and
//! binary operators, calls and parentheses. Operator precedence follows Go:
//! `||` < `&&` < comparisons < `+ -` < `* / %` < unary < selectors and calls.

mod lexer;
mod parser;

pub use parser::parse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Quo,
    Rem,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    Plus,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Number, string, character, `true`, `false` or `nil`
    Literal(String),
    /// Field of the current data (`name`)
    Ident(String),
    /// Template variable (`$name`); empty for the bare `$`
    Var(String),
    Field {
        base: Box<Expr>,
        name: String,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Paren(Box<Expr>),
}
