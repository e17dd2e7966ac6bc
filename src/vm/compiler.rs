use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Expr, InfixOp, PrefixOp, Program, Stmt};
use crate::interpreter::{builtin_index, CompiledFunction, Value};

use super::{
    OP_ADD, OP_AND, OP_BANG, OP_CALL, OP_CMP_EQ, OP_CMP_GE, OP_CMP_GT, OP_CMP_LE, OP_CMP_LT,
    OP_CMP_NE, OP_CONSTANT, OP_CURRENT_CLOSURE, OP_DIV, OP_FALSE, OP_GET_BUILTIN, OP_GET_FREE,
    OP_GET_GLOBAL, OP_GET_LOCAL, OP_INDEX, OP_LIST, OP_MINUS, OP_MOD, OP_MUL, OP_OR,
    OP_RETURN_VALUE, OP_SET_GLOBAL, OP_SET_LOCAL, OP_SUB, OP_TRUE,
};

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("undefined variable {name}")]
    UndefinedVariable { name: String },
    #[error("slice expressions are not supported by the bytecode backend")]
    SliceUnsupported,
    #[error("operator {op} is not supported by the bytecode backend")]
    UnsupportedOperator { op: &'static str },
}

type Result<T> = std::result::Result<T, CompileError>;

// ── Symbol table ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Local,
    Builtin,
    Free,
    /// The current function's own name (self-reference).
    Function,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub scope: Scope,
    pub index: u32,
}

#[derive(Debug, Default)]
struct SymbolScope {
    symbols: HashMap<String, Symbol>,
    num_definitions: u32,
    /// Names captured from enclosing functions, one slot each. Classified
    /// but never materialized: the VM rejects OP_GET_FREE.
    free: Vec<String>,
}

/// Name resolution: the root scope defines globals, each function scope its
/// own locals with indices restarting at zero. A name found in an enclosing
/// function scope classifies as free; builtins resolve last, by registry
/// position.
#[derive(Debug)]
pub struct SymbolTable {
    global: SymbolScope,
    locals: Vec<SymbolScope>,
}

impl SymbolTable {
    fn new() -> Self {
        SymbolTable { global: SymbolScope::default(), locals: Vec::new() }
    }

    fn current_mut(&mut self) -> &mut SymbolScope {
        match self.locals.last_mut() {
            Some(scope) => scope,
            None => &mut self.global,
        }
    }

    fn enter_function(&mut self) {
        self.locals.push(SymbolScope::default());
    }

    fn leave_function(&mut self) {
        self.locals.pop();
    }

    /// Defining an already-bound name returns the existing symbol instead of
    /// burning a fresh slot, so `x = x + 1` reads the slot it writes.
    fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.locals.is_empty() { Scope::Global } else { Scope::Local };
        let current = self.current_mut();
        if let Some(existing) = current.symbols.get(name) {
            return *existing;
        }
        let symbol = Symbol { scope, index: current.num_definitions };
        current.symbols.insert(name.to_string(), symbol);
        current.num_definitions += 1;
        symbol
    }

    /// Bind the name of the function being compiled as its self-reference.
    /// Does not consume a local slot.
    fn define_function_name(&mut self, name: &str) {
        let symbol = Symbol { scope: Scope::Function, index: 0 };
        self.current_mut().symbols.insert(name.to_string(), symbol);
    }

    fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(depth) = self
            .locals
            .iter()
            .rposition(|scope| scope.symbols.contains_key(name))
        {
            let symbol = self.locals[depth].symbols[name];
            if depth + 1 == self.locals.len() {
                return Some(symbol);
            }
            // Bound by an enclosing function: capture.
            if let Some(current) = self.locals.last_mut() {
                let index = current.free.len() as u32;
                current.free.push(name.to_string());
                return Some(Symbol { scope: Scope::Free, index });
            }
            return Some(symbol);
        }
        if let Some(symbol) = self.global.symbols.get(name) {
            return Some(*symbol);
        }
        builtin_index(name).map(|index| Symbol { scope: Scope::Builtin, index: index as u32 })
    }

    fn num_definitions(&self) -> u32 {
        match self.locals.last() {
            Some(scope) => scope.num_definitions,
            None => self.global.num_definitions,
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}

// ── Compiler ─────────────────────────────────────────────────────────

/// Walks the AST once, appending instructions to a flat byte stream and
/// constants to a shared pool. State survives across REPL turns: the driver
/// drains code and constants after a successful hand-off while the symbol
/// table keeps accumulating.
pub struct Compiler {
    constants: Vec<Value>,
    code: Vec<u8>,
    function_code: Vec<Vec<u8>>,
    symbols: SymbolTable,
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            constants: Vec::new(),
            code: Vec::new(),
            function_code: Vec::new(),
            symbols: SymbolTable::new(),
        }
    }

    pub fn compile(&mut self, program: &Program) -> Result<()> {
        for stmt in &program.stmts {
            let Stmt::Expr(expr) = stmt;
            self.compile_expr(expr)?;
        }
        Ok(())
    }

    /// Drain the instruction stream accumulated since the last drain.
    pub fn take_code(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.code)
    }

    /// Drain the constant pool. The caller takes ownership; indices embedded
    /// in already-drained code stay valid against the handed-over pool.
    pub fn take_constants(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.constants)
    }

    // ---- Emission ----

    fn current_code(&mut self) -> &mut Vec<u8> {
        match self.function_code.last_mut() {
            Some(code) => code,
            None => &mut self.code,
        }
    }

    fn emit(&mut self, op: u8) {
        self.current_code().push(op);
    }

    fn emit_arg(&mut self, op: u8, arg: u32) {
        let code = self.current_code();
        code.push(op);
        code.extend_from_slice(&arg.to_be_bytes());
    }

    /// Intern a constant. Scalars are deduplicated by type and printed form;
    /// lists and functions always get a fresh pool entry.
    fn add_constant(&mut self, value: Value) -> u32 {
        let dedup = !matches!(
            value,
            Value::List(_) | Value::Function(_) | Value::Compiled(_)
        );
        if dedup {
            let repr = value.to_string();
            for (i, existing) in self.constants.iter().enumerate() {
                if existing.type_name() == value.type_name() && existing.to_string() == repr {
                    return i as u32;
                }
            }
        }
        self.constants.push(value);
        (self.constants.len() - 1) as u32
    }

    fn load_symbol(&mut self, symbol: Symbol) {
        match symbol.scope {
            Scope::Global => self.emit_arg(OP_GET_GLOBAL, symbol.index),
            Scope::Local => self.emit_arg(OP_GET_LOCAL, symbol.index),
            Scope::Builtin => self.emit_arg(OP_GET_BUILTIN, symbol.index),
            Scope::Free => self.emit_arg(OP_GET_FREE, symbol.index),
            Scope::Function => self.emit(OP_CURRENT_CLOSURE),
        }
    }

    fn store_symbol(&mut self, symbol: Symbol) {
        if symbol.scope == Scope::Global {
            self.emit_arg(OP_SET_GLOBAL, symbol.index);
        } else {
            self.emit_arg(OP_SET_LOCAL, symbol.index);
        }
    }

    // ---- Lowering ----

    fn compile_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Int { value, .. } => {
                let idx = self.add_constant(Value::Int(*value));
                self.emit_arg(OP_CONSTANT, idx);
            }
            Expr::Str { value, .. } => {
                let idx = self.add_constant(Value::Str(value.clone()));
                self.emit_arg(OP_CONSTANT, idx);
            }
            Expr::Bool { value, .. } => {
                self.emit(if *value { OP_TRUE } else { OP_FALSE });
            }
            Expr::Ident { name, .. } => match self.symbols.resolve(name) {
                Some(symbol) => self.load_symbol(symbol),
                None => return Err(CompileError::UndefinedVariable { name: name.clone() }),
            },
            Expr::Prefix { op, right, .. } => {
                self.compile_expr(right)?;
                match op {
                    PrefixOp::Not => self.emit(OP_BANG),
                    PrefixOp::Neg => self.emit(OP_MINUS),
                    PrefixOp::Pos => {}
                }
            }
            Expr::Infix { op, left, right, .. } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                let opcode = match op {
                    InfixOp::Add => OP_ADD,
                    InfixOp::Sub => OP_SUB,
                    InfixOp::Mul => OP_MUL,
                    InfixOp::Div => OP_DIV,
                    InfixOp::Mod => OP_MOD,
                    InfixOp::Lt => OP_CMP_LT,
                    InfixOp::Le => OP_CMP_LE,
                    InfixOp::Gt => OP_CMP_GT,
                    InfixOp::Ge => OP_CMP_GE,
                    InfixOp::Eq => OP_CMP_EQ,
                    InfixOp::NotEq => OP_CMP_NE,
                    InfixOp::And => OP_AND,
                    InfixOp::Or => OP_OR,
                    InfixOp::In => {
                        return Err(CompileError::UnsupportedOperator { op: "in" })
                    }
                };
                self.emit(opcode);
            }
            Expr::List { elems, .. } => {
                for elem in elems {
                    self.compile_expr(elem)?;
                }
                self.emit_arg(OP_LIST, elems.len() as u32);
            }
            Expr::Index { left, index, .. } => {
                self.compile_expr(left)?;
                self.compile_expr(index)?;
                self.emit(OP_INDEX);
            }
            Expr::Slice { .. } => return Err(CompileError::SliceUnsupported),
            Expr::Call { callee, args, .. } => {
                for arg in args {
                    self.compile_expr(arg)?;
                }
                self.compile_expr(callee)?;
                self.emit_arg(OP_CALL, args.len() as u32);
            }
            Expr::Assign { target, value, .. } => {
                let symbol = self.symbols.define(&target.to_string());
                self.compile_expr(value)?;
                self.store_symbol(symbol);
            }
            Expr::Function { name, params, body, .. } => {
                self.compile_function(name.as_deref(), params, body)?;
            }
        }
        Ok(())
    }

    fn compile_function(
        &mut self,
        name: Option<&str>,
        params: &[String],
        body: &Program,
    ) -> Result<()> {
        self.function_code.push(Vec::new());
        self.symbols.enter_function();
        if let Some(name) = name {
            self.symbols.define_function_name(name);
        }
        for param in params {
            self.symbols.define(param);
        }
        let compiled = self.compile(body);
        // Function bodies always return explicitly; an empty body yields null.
        self.emit(OP_RETURN_VALUE);
        let num_locals = self.symbols.num_definitions() as usize;
        self.symbols.leave_function();
        let code = self.function_code.pop().unwrap_or_default();
        compiled?;

        let function = CompiledFunction {
            code,
            num_params: params.len() as i8,
            num_locals,
        };
        let idx = self.add_constant(Value::Compiled(Rc::new(function)));
        self.emit_arg(OP_CONSTANT, idx);

        if let Some(name) = name {
            let symbol = self.symbols.define(name);
            self.store_symbol(symbol);
        }
        Ok(())
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}
