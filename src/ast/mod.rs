use serde::{Deserialize, Serialize};
use std::fmt;

/// A complete program is a sequence of statements.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrefixOp {
    Not,
    Neg,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    NotEq,
    And,
    Or,
    In,
}

/// Expression nodes. Every node records the byte position of the token that
/// introduced it, used in error messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Ident {
        name: String,
        pos: usize,
    },
    Int {
        value: i64,
        /// Source spelling, preserved for printing (`010` stays `010`).
        literal: String,
        pos: usize,
    },
    Str {
        value: String,
        pos: usize,
    },
    Bool {
        value: bool,
        pos: usize,
    },
    List {
        elems: Vec<Expr>,
        pos: usize,
    },
    Prefix {
        op: PrefixOp,
        right: Box<Expr>,
        pos: usize,
    },
    Infix {
        op: InfixOp,
        left: Box<Expr>,
        right: Box<Expr>,
        pos: usize,
    },
    Index {
        left: Box<Expr>,
        index: Box<Expr>,
        pos: usize,
    },
    Slice {
        left: Box<Expr>,
        lo: Option<Box<Expr>>,
        hi: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
        pos: usize,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        pos: usize,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        pos: usize,
    },
    Function {
        name: Option<String>,
        params: Vec<String>,
        body: Program,
        pos: usize,
    },
}

impl fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrefixOp::Not => "!",
            PrefixOp::Neg => "-",
            PrefixOp::Pos => "+",
        })
    }
}

impl fmt::Display for InfixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InfixOp::Add => "+",
            InfixOp::Sub => "-",
            InfixOp::Mul => "*",
            InfixOp::Div => "/",
            InfixOp::Mod => "%",
            InfixOp::Lt => "<",
            InfixOp::Le => "<=",
            InfixOp::Gt => ">",
            InfixOp::Ge => ">=",
            InfixOp::Eq => "==",
            InfixOp::NotEq => "!=",
            InfixOp::And => "and",
            InfixOp::Or => "or",
            InfixOp::In => "in",
        })
    }
}

// The printed form is re-parseable: compound expressions are parenthesized so
// the reprint builds the same tree shape.

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stmt) in self.stmts.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{stmt}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Expr(e) => write!(f, "{e}"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Ident { name, .. } => f.write_str(name),
            Expr::Int { literal, .. } => f.write_str(literal),
            Expr::Str { value, .. } => f.write_str(value),
            Expr::Bool { value, .. } => write!(f, "{value}"),
            Expr::List { elems, .. } => {
                f.write_str("[")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{e}")?;
                }
                f.write_str("]")
            }
            Expr::Prefix { op, right, .. } => write!(f, "({op}{right})"),
            Expr::Infix { op, left, right, .. } => write!(f, "({left} {op} {right})"),
            Expr::Index { left, index, .. } => write!(f, "{left}[{index}]"),
            Expr::Slice { left, lo, hi, step, .. } => {
                write!(f, "{left}[")?;
                if let Some(lo) = lo {
                    write!(f, "{lo}")?;
                }
                f.write_str(":")?;
                if let Some(hi) = hi {
                    write!(f, "{hi}")?;
                }
                if let Some(step) = step {
                    write!(f, ":{step}")?;
                }
                f.write_str("]")
            }
            Expr::Call { callee, args, .. } => {
                write!(f, "{callee}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{a}")?;
                }
                f.write_str(")")
            }
            Expr::Assign { target, value, .. } => write!(f, "({target} = {value})"),
            Expr::Function { name, params, body, .. } => {
                f.write_str("fn")?;
                if let Some(name) = name {
                    write!(f, " {name}")?;
                }
                f.write_str("(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(p)?;
                }
                if body.stmts.is_empty() {
                    f.write_str(") {}")
                } else {
                    write!(f, ") {{ {body} }}")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_nested_infix_is_parenthesized() {
        let e = Expr::Infix {
            op: InfixOp::Add,
            left: Box::new(Expr::Int { value: 1, literal: "1".into(), pos: 0 }),
            right: Box::new(Expr::Infix {
                op: InfixOp::Mul,
                left: Box::new(Expr::Int { value: 2, literal: "2".into(), pos: 4 }),
                right: Box::new(Expr::Int { value: 3, literal: "3".into(), pos: 8 }),
                pos: 6,
            }),
            pos: 2,
        };
        assert_eq!(e.to_string(), "(1 + (2 * 3))");
    }

    #[test]
    fn display_slice_omits_absent_parts() {
        let left = Box::new(Expr::Ident { name: "xs".into(), pos: 0 });
        let step = Expr::Slice {
            left: left.clone(),
            lo: None,
            hi: None,
            step: Some(Box::new(Expr::Int { value: 2, literal: "2".into(), pos: 5 })),
            pos: 2,
        };
        assert_eq!(step.to_string(), "xs[::2]");
        let full = Expr::Slice { left, lo: None, hi: None, step: None, pos: 2 };
        assert_eq!(full.to_string(), "xs[:]");
    }

    #[test]
    fn display_function_literal() {
        let body = Program {
            stmts: vec![Stmt::Expr(Expr::Ident { name: "x".into(), pos: 10 })],
        };
        let e = Expr::Function {
            name: Some("id".into()),
            params: vec!["x".into()],
            body,
            pos: 0,
        };
        assert_eq!(e.to_string(), "fn id(x) { x }");
    }

    #[test]
    fn ast_serializes_to_json() {
        let prog = Program {
            stmts: vec![Stmt::Expr(Expr::Bool { value: true, pos: 0 })],
        };
        let json = serde_json::to_string(&prog).expect("serialize");
        assert!(json.contains("Bool"), "got: {json}");
    }
}
