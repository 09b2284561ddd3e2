//! Expression linearization.
//!
//! Go templates cannot nest operator or selector expressions, so every
//! expression is flattened into single-action temporaries:
//!
//! ```text
//! a + b * c  =>  {{$__slim_1 := __slim_mul .b .c}}{{$__slim_2 := __slim_add .a $__slim_1}}
//! ```
//!
//! Operands travel on an explicit stack. Binary operators and call arguments
//! are walked right to left, so the left operand sits on top when the action
//! is written.

use crate::ast::SourcePosition;
use crate::error::{CompileError, ErrorKind};
use crate::expr::{BinaryOp, Expr, UnaryOp};
use std::collections::BTreeSet;

/// Functions called by name instead of through `call`
pub const BUILTIN_FUNCTIONS: &[&str] = &[
    "len", "print", "printf", "println", "urlquery", "js", "json", "index", "html", "unescaped",
];

/// Prefix of every generated temporary
pub const TEMP_PREFIX: &str = "$__slim_";

/// Counter and bookkeeping shared by every expression in one compile
#[derive(Debug, Default)]
pub struct Temporaries {
    counter: usize,
    /// Runtime helpers referenced so far
    pub helpers: BTreeSet<String>,
}

impl Temporaries {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> String {
        self.counter += 1;
        format!("{}{}", TEMP_PREFIX, self.counter)
    }

    pub fn use_helper(&mut self, name: &str) {
        self.helpers.insert(name.to_string());
    }
}

/// A linearized expression: the bindings to emit first and the final operand
#[derive(Debug, Clone, PartialEq)]
pub struct Lowered {
    pub actions: String,
    pub value: String,
}

/// Parse and linearize expression text
pub fn lower(source: &str, temps: &mut Temporaries) -> Result<Lowered, CompileError> {
    let expr = crate::expr::parse(source)?;
    Ok(lower_expr(&expr, temps))
}

pub fn lower_expr(expr: &Expr, temps: &mut Temporaries) -> Lowered {
    let mut linearizer = Linearizer {
        temps,
        stack: Vec::new(),
        actions: String::new(),
    };
    linearizer.exec(expr);

    Lowered {
        value: linearizer.pop(),
        actions: linearizer.actions,
    }
}

struct Linearizer<'a> {
    temps: &'a mut Temporaries,
    stack: Vec<String>,
    actions: String,
}

impl Linearizer<'_> {
    fn pop(&mut self) -> String {
        self.stack.pop().unwrap_or_default()
    }

    fn bind(&mut self, name: &str, body: &str) {
        self.actions.push_str(&format!("{{{{{} := {}}}}}", name, body));
    }

    fn exec(&mut self, expr: &Expr) {
        match expr {
            Expr::Binary { op, left, right } => {
                self.exec(right);
                self.exec(left);

                let (function, negate) = binary_function(*op);
                if function.starts_with("__slim_") {
                    self.temps.use_helper(function);
                }

                let name = self.temps.next();
                let left = self.pop();
                let right = self.pop();
                self.bind(&name, &format!("{} {} {}", function, left, right));

                if negate {
                    let negated = self.temps.next();
                    self.bind(&negated, &format!("not {}", name));
                    self.stack.push(negated);
                } else {
                    self.stack.push(name);
                }
            }
            Expr::Unary { op, operand } => {
                self.exec(operand);

                let function = match op {
                    UnaryOp::Minus => "__slim_minus",
                    UnaryOp::Plus => "__slim_plus",
                    UnaryOp::Not => "not",
                };
                if *op != UnaryOp::Not {
                    self.temps.use_helper(function);
                }

                let name = self.temps.next();
                let operand = self.pop();
                self.bind(&name, &format!("{} {}", function, operand));
                self.stack.push(name);
            }
            Expr::Paren(inner) => self.exec(inner),
            Expr::Literal(text) => self.stack.push(text.clone()),
            Expr::Ident(name) => self.stack.push(format!(".{}", name)),
            Expr::Var(name) if name.is_empty() => self.stack.push(".".to_string()),
            Expr::Var(name) => self.stack.push(format!("${}", name)),
            Expr::Field { base, name } => {
                self.exec(base);
                let mut base = self.pop();
                if base == "." {
                    base.clear();
                }

                let temp = self.temps.next();
                self.bind(&temp, &format!("{}.{}", base, name));
                self.stack.push(temp);
            }
            Expr::Call { callee, args } => {
                for arg in args.iter().rev() {
                    self.exec(arg);
                }

                let name = self.temps.next();
                let mut body = match builtin_name(callee) {
                    Some(builtin) => {
                        self.temps.use_helper(builtin);
                        builtin.to_string()
                    }
                    None => {
                        self.exec(callee);
                        format!("call {}", self.pop())
                    }
                };

                for _ in args {
                    body.push(' ');
                    body.push_str(&self.pop());
                }

                self.bind(&name, &body);
                self.stack.push(name);
            }
        }
    }
}

/// Target function for a binary operator, and whether its result is negated
fn binary_function(op: BinaryOp) -> (&'static str, bool) {
    match op {
        BinaryOp::Add => ("__slim_add", false),
        BinaryOp::Sub => ("__slim_sub", false),
        BinaryOp::Mul => ("__slim_mul", false),
        BinaryOp::Quo => ("__slim_quo", false),
        BinaryOp::Rem => ("__slim_rem", false),
        BinaryOp::And => ("and", false),
        BinaryOp::Or => ("or", false),
        BinaryOp::Eq => ("__slim_eql", false),
        BinaryOp::Ne => ("__slim_eql", true),
        BinaryOp::Lt => ("__slim_lss", false),
        BinaryOp::Gt => ("__slim_gtr", false),
        BinaryOp::Le => ("__slim_gtr", true),
        BinaryOp::Ge => ("__slim_lss", true),
    }
}

fn builtin_name(callee: &Expr) -> Option<&'static str> {
    match callee {
        Expr::Ident(name) => BUILTIN_FUNCTIONS.iter().copied().find(|builtin| *builtin == name.as_str()),
        _ => None,
    }
}

/// Position-less expression failures are reported at the node that owns the text
pub fn lower_at(
    source: &str,
    temps: &mut Temporaries,
    position: &SourcePosition,
) -> Result<Lowered, CompileError> {
    lower(source, temps).map_err(|err| {
        let kind = err.kind;
        let err = err.at(position);
        if kind == ErrorKind::InvalidExpression {
            err.with_help(format!("while parsing `{}`", source))
        } else {
            err
        }
    })
}
