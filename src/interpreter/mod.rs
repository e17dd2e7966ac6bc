use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::{Expr, InfixOp, PrefixOp, Program, Stmt};

// ── Values ───────────────────────────────────────────────────────────

/// The runtime value model shared by the evaluator and the VM. Runtime
/// failures of the language itself are `Error` values, not Rust errors.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
    Error(String),
    /// AST closure, used only by the evaluator.
    Function(Rc<Function>),
    /// Bytecode function, used only by the VM.
    Compiled(Rc<CompiledFunction>),
    Builtin(&'static Builtin),
}

#[derive(Debug)]
pub struct Function {
    pub params: Vec<String>,
    pub body: Program,
    pub env: Env,
}

#[derive(Debug, PartialEq)]
pub struct CompiledFunction {
    pub code: Vec<u8>,
    pub num_params: i8,
    pub num_locals: usize,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Error(_) => "error",
            Value::Function(_) => "function",
            Value::Compiled(_) => "compiled function",
            Value::Builtin(_) => "builtin",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    fn error(message: impl Into<String>) -> Value {
        Value::Error(message.into())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    // String elements are quoted; a bare string prints raw.
                    match item {
                        Value::Str(s) => write!(f, "{s:?}")?,
                        other => write!(f, "{other}")?,
                    }
                }
                f.write_str("]")
            }
            Value::Error(msg) => write!(f, "error: {msg}"),
            Value::Function(func) => {
                write!(f, "fn({})", func.params.join(", "))?;
                if func.body.stmts.is_empty() {
                    f.write_str(" {}")
                } else {
                    write!(f, " {{ {} }}", func.body)
                }
            }
            Value::Compiled(_) => f.write_str("<compiled function>"),
            Value::Builtin(_) => f.write_str("<builtin function>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Compiled(a), Value::Compiled(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => std::ptr::eq(*a, *b),
            _ => false,
        }
    }
}

// ── Environment ──────────────────────────────────────────────────────

/// A chain of mutable name→value frames. The handle is cheap to clone;
/// closures keep the frame they captured alive through it.
#[derive(Debug, Clone)]
pub struct Env(Rc<RefCell<EnvFrame>>);

#[derive(Debug)]
struct EnvFrame {
    store: HashMap<String, Value>,
    outer: Option<Env>,
}

impl Env {
    pub fn new() -> Env {
        Env(Rc::new(RefCell::new(EnvFrame { store: HashMap::new(), outer: None })))
    }

    /// A fresh innermost frame whose lookups fall back to `outer`.
    pub fn wrap(outer: &Env) -> Env {
        Env(Rc::new(RefCell::new(EnvFrame {
            store: HashMap::new(),
            outer: Some(outer.clone()),
        })))
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let mut current = self.clone();
        loop {
            let next = {
                let frame = current.0.borrow();
                if let Some(value) = frame.store.get(name) {
                    return Some(value.clone());
                }
                frame.outer.clone()
            };
            current = next?;
        }
    }

    /// Bind in the current frame, shadowing any outer binding.
    pub fn set(&self, name: &str, value: Value) -> Value {
        self.0.borrow_mut().store.insert(name.to_string(), value.clone());
        value
    }

    /// Rebind in the nearest frame already holding `name`; bind in the
    /// current frame when no frame does.
    pub fn upsert(&self, name: &str, value: Value) -> Value {
        let mut current = self.clone();
        loop {
            let next = {
                let mut frame = current.0.borrow_mut();
                if let Some(slot) = frame.store.get_mut(name) {
                    *slot = value.clone();
                    return value;
                }
                frame.outer.clone()
            };
            match next {
                Some(outer) => current = outer,
                None => return self.set(name, value),
            }
        }
    }
}

impl Default for Env {
    fn default() -> Self {
        Env::new()
    }
}

// ── Builtins ─────────────────────────────────────────────────────────

/// A host-implemented callable, shared by both backends. The compiler refers
/// to builtins by their position in `BUILTINS`.
pub struct Builtin {
    pub name: &'static str,
    pub func: fn(&[Value]) -> Value,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

pub static BUILTINS: &[Builtin] = &[Builtin { name: "len", func: builtin_len }];

pub fn resolve_builtin(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

pub fn builtin_index(name: &str) -> Option<usize> {
    BUILTINS.iter().position(|b| b.name == name)
}

fn builtin_len(args: &[Value]) -> Value {
    if args.len() != 1 {
        return Value::error(format!(
            "len: wrong number of arguments, expected 1, got {}",
            args.len()
        ));
    }
    match &args[0] {
        Value::List(items) => Value::Int(items.len() as i64),
        Value::Str(s) => Value::Int(s.len() as i64),
        other => Value::error(format!(
            "len: object of type {:?} has no length",
            other.type_name()
        )),
    }
}

// ── Evaluation ───────────────────────────────────────────────────────

/// Evaluate statements in order. An error value short-circuits the rest of
/// the program; otherwise the result is the last statement's value.
pub fn eval_program(program: &Program, env: &Env) -> Value {
    let mut result = Value::Null;
    for stmt in &program.stmts {
        let Stmt::Expr(expr) = stmt;
        result = eval_expr(expr, env);
        if result.is_error() {
            return result;
        }
    }
    result
}

pub fn eval_expr(expr: &Expr, env: &Env) -> Value {
    match expr {
        Expr::Ident { name, pos } => {
            if let Some(value) = env.get(name) {
                return value;
            }
            if let Some(builtin) = resolve_builtin(name) {
                return Value::Builtin(builtin);
            }
            Value::error(format!("{}: name {:?} is not defined", pos + 1, name))
        }
        Expr::Int { value, .. } => Value::Int(*value),
        Expr::Str { value, .. } => Value::Str(value.clone()),
        Expr::Bool { value, .. } => Value::Bool(*value),
        // No error short-circuit between elements: an error simply becomes
        // an element of the list.
        Expr::List { elems, .. } => {
            Value::List(elems.iter().map(|e| eval_expr(e, env)).collect())
        }
        Expr::Prefix { op, right, .. } => {
            let right = eval_expr(right, env);
            eval_prefix(*op, right)
        }
        Expr::Infix { op, left, right, pos } => {
            let left = eval_expr(left, env);
            if left.is_error() {
                return left;
            }
            let right = eval_expr(right, env);
            if right.is_error() {
                return right;
            }
            eval_infix(*op, left, right, *pos)
        }
        Expr::Index { left, index, .. } => {
            let left = eval_expr(left, env);
            if left.is_error() {
                return left;
            }
            let index = eval_expr(index, env);
            if index.is_error() {
                return index;
            }
            eval_index(&left, &index)
        }
        Expr::Slice { left, lo, hi, step, .. } => {
            let left = eval_expr(left, env);
            if left.is_error() {
                return left;
            }
            let mut bounds = [Value::Null, Value::Null, Value::Null];
            for (slot, part) in bounds.iter_mut().zip([lo, hi, step]) {
                if let Some(part) = part {
                    *slot = eval_expr(part, env);
                    if slot.is_error() {
                        return slot.clone();
                    }
                }
            }
            let [lo, hi, step] = bounds;
            eval_slice(&left, &lo, &hi, &step)
        }
        Expr::Call { callee, args, .. } => eval_call(callee, args, env),
        Expr::Assign { target, value, .. } => {
            let value = eval_expr(value, env);
            env.set(&target.to_string(), value)
        }
        Expr::Function { name, params, body, .. } => {
            let function = Value::Function(Rc::new(Function {
                params: params.clone(),
                body: body.clone(),
                env: env.clone(),
            }));
            if let Some(name) = name {
                env.set(name, function.clone());
            }
            function
        }
    }
}

fn eval_prefix(op: PrefixOp, right: Value) -> Value {
    match op {
        // `!x` is true exactly for `false` and `null` — including errors,
        // which are "truthy" here.
        PrefixOp::Not => Value::Bool(matches!(right, Value::Bool(false) | Value::Null)),
        PrefixOp::Neg => match right {
            Value::Int(n) => Value::Int(n.wrapping_neg()),
            other => Value::error(format!(
                "runtime error: unknown operator: -{}",
                other.type_name()
            )),
        },
        PrefixOp::Pos => right,
    }
}

fn eval_infix(op: InfixOp, left: Value, right: Value, pos: usize) -> Value {
    match (&left, &right) {
        (Value::Bool(l), Value::Bool(r)) => match op {
            InfixOp::And => Value::Bool(*l && *r),
            InfixOp::Or => Value::Bool(*l || *r),
            InfixOp::Eq => Value::Bool(l == r),
            InfixOp::NotEq => Value::Bool(l != r),
            _ => unknown_operator(op, &left, &right, pos),
        },
        (Value::Int(l), Value::Int(r)) => match op {
            InfixOp::Add => Value::Int(l.wrapping_add(*r)),
            InfixOp::Sub => Value::Int(l.wrapping_sub(*r)),
            InfixOp::Mul => Value::Int(l.wrapping_mul(*r)),
            InfixOp::Div => {
                if *r == 0 {
                    Value::error("division by zero")
                } else {
                    Value::Int(l.wrapping_div(*r))
                }
            }
            InfixOp::Mod => {
                if *r == 0 {
                    Value::error("modulo by zero")
                } else {
                    Value::Int(l.wrapping_rem(*r))
                }
            }
            InfixOp::Lt => Value::Bool(l < r),
            InfixOp::Le => Value::Bool(l <= r),
            InfixOp::Gt => Value::Bool(l > r),
            InfixOp::Ge => Value::Bool(l >= r),
            InfixOp::Eq => Value::Bool(l == r),
            InfixOp::NotEq => Value::Bool(l != r),
            _ => unknown_operator(op, &left, &right, pos),
        },
        (Value::Str(l), Value::Str(r)) => match op {
            InfixOp::Add => Value::Str(format!("{l}{r}")),
            InfixOp::Lt => Value::Bool(l < r),
            InfixOp::Le => Value::Bool(l <= r),
            InfixOp::Gt => Value::Bool(l > r),
            InfixOp::Ge => Value::Bool(l >= r),
            InfixOp::Eq => Value::Bool(l == r),
            InfixOp::NotEq => Value::Bool(l != r),
            _ => unknown_operator(op, &left, &right, pos),
        },
        _ => unknown_operator(op, &left, &right, pos),
    }
}

fn unknown_operator(op: InfixOp, left: &Value, right: &Value, pos: usize) -> Value {
    Value::error(format!(
        "{pos}: runtime error: unknown operator: {left} {op} {right}"
    ))
}

fn eval_index(left: &Value, index: &Value) -> Value {
    match (left, index) {
        (Value::List(items), Value::Int(i)) => {
            // Negative indices are not normalized; the bounds check rejects
            // them along with everything past the end.
            if *i < 0 || *i as usize >= items.len() {
                return Value::error("index out of range");
            }
            items[*i as usize].clone()
        }
        (Value::Str(s), Value::Int(i)) => {
            let bytes = s.as_bytes();
            if *i < 0 || *i as usize >= bytes.len() {
                return Value::error("index out of range");
            }
            Value::Str(String::from_utf8_lossy(&bytes[*i as usize..=*i as usize]).into_owned())
        }
        _ => Value::error(format!(
            "invalid index operator for types {} and {}",
            left.type_name(),
            index.type_name()
        )),
    }
}

fn eval_slice(left: &Value, lo: &Value, hi: &Value, step: &Value) -> Value {
    if !matches!(left, Value::List(_) | Value::Str(_)) {
        return Value::error(format!(
            "runtime error: invalid slice operator for type {}",
            left.type_name()
        ));
    }
    for (part, what) in [(lo, "lo"), (hi, "hi"), (step, "step")] {
        if !matches!(part, Value::Int(_) | Value::Null) {
            return Value::error(format!(
                "TypeError: slice {} index must be an integer or absent, not {}",
                what,
                part.type_name()
            ));
        }
    }
    let step = match step {
        Value::Int(n) => *n,
        _ => 1,
    };
    if step == 0 {
        return Value::error("ValueError: slice step cannot be zero");
    }
    match left {
        Value::List(items) => {
            let indices = slice_indices(items.len(), lo, hi, step);
            Value::List(indices.into_iter().map(|i| items[i].clone()).collect())
        }
        Value::Str(s) => {
            let bytes = s.as_bytes();
            let indices = slice_indices(bytes.len(), lo, hi, step);
            let selected: Vec<u8> = indices.into_iter().map(|i| bytes[i]).collect();
            Value::Str(String::from_utf8_lossy(&selected).into_owned())
        }
        other => Value::error(format!(
            "runtime error: invalid slice operator for type {}",
            other.type_name()
        )),
    }
}

/// Offsets are interpreted from the end when negative, then clamped into
/// `[0, len]`. Absent `lo` is 0, absent `hi` is the length.
fn slice_indices(len: usize, lo: &Value, hi: &Value, step: i64) -> Vec<usize> {
    let len = len as i64;
    let lo = match lo {
        Value::Int(n) => clamp_offset(len, *n),
        _ => 0,
    };
    let hi = match hi {
        Value::Int(n) => clamp_offset(len, *n),
        _ => len,
    };
    let mut indices = Vec::new();
    if step > 0 && hi >= lo {
        let mut i = lo;
        while i < hi {
            indices.push(i as usize);
            i += step;
        }
    } else if step < 0 && hi <= lo {
        let mut i = lo - 1;
        while i > hi {
            indices.push(i as usize);
            i += step;
        }
    }
    indices
}

fn clamp_offset(len: i64, offset: i64) -> i64 {
    let fixed = if offset < 0 { len + offset } else { offset };
    fixed.clamp(0, len)
}

fn eval_call(callee: &Expr, args: &[Expr], env: &Env) -> Value {
    let callee = eval_expr(callee, env);
    match callee {
        Value::Builtin(builtin) => {
            let args: Vec<Value> = args.iter().map(|a| eval_expr(a, env)).collect();
            (builtin.func)(&args)
        }
        Value::Function(function) => {
            if args.len() != function.params.len() {
                return Value::error(format!(
                    "wrong number of arguments: expected {}, got {}",
                    function.params.len(),
                    args.len()
                ));
            }
            let call_env = Env::wrap(&function.env);
            for (param, arg) in function.params.iter().zip(args) {
                call_env.set(param, eval_expr(arg, env));
            }
            eval_program(&function.body, &call_env)
        }
        other => Value::error(format!("{:?} object is not callable", other.type_name())),
    }
}
