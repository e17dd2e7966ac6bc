//! The backend-agnostic REPL core. A [`Session`] consumes one line at a
//! time, accumulating continuation lines until the buffered text parses as a
//! complete program, then executes it on its backend. The line editor and
//! all printing stay in the binary.

use crate::interpreter::{self, Env, Value};
use crate::parser;
use crate::vm::compiler::Compiler;
use crate::vm::Vm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Tree-walking evaluation over the AST.
    Eval,
    /// Compile to bytecode and run on the stack VM.
    Vm,
}

/// What a fed line resulted in.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// The buffered input is incomplete; feed another line.
    Incomplete,
    /// The input was consumed; print these lines (possibly none).
    Done(Vec<String>),
}

enum Engine {
    Eval { env: Env },
    Vm { compiler: Compiler, machine: Vm },
}

pub struct Session {
    engine: Engine,
    pending: Vec<String>,
    dump_ast: bool,
}

impl Session {
    pub fn new(backend: Backend) -> Self {
        let engine = match backend {
            Backend::Eval => Engine::Eval { env: Env::new() },
            Backend::Vm => Engine::Vm { compiler: Compiler::new(), machine: Vm::new() },
        };
        Session { engine, pending: Vec::new(), dump_ast: false }
    }

    /// True while the session is waiting for continuation lines.
    pub fn is_continuing(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Toggle printing each parsed program as JSON before execution;
    /// returns the new state.
    pub fn toggle_dump_ast(&mut self) -> bool {
        self.dump_ast = !self.dump_ast;
        self.dump_ast
    }

    pub fn feed(&mut self, line: &str) -> Outcome {
        self.pending.push(line.to_string());
        let source = self.pending.join("\n");

        let (program, errors) = parser::parse(&source);
        if let Some(last) = errors.last() {
            if last.eof {
                return Outcome::Incomplete;
            }
            self.pending.clear();
            return Outcome::Done(errors.iter().map(|e| e.to_string()).collect());
        }
        self.pending.clear();

        let mut lines = Vec::new();
        if self.dump_ast {
            match serde_json::to_string_pretty(&program) {
                Ok(json) => lines.push(json),
                Err(err) => lines.push(format!("ast error: {err}")),
            }
        }

        match &mut self.engine {
            Engine::Eval { env } => {
                let value = interpreter::eval_program(&program, env);
                if !matches!(value, Value::Null) {
                    lines.push(value.to_string());
                }
            }
            Engine::Vm { compiler, machine } => {
                if let Err(err) = compiler.compile(&program) {
                    // Drop this turn's partial emissions; constants and the
                    // symbol table stay consumable for the next turn.
                    compiler.take_code();
                    lines.push(format!("compile error: {err}"));
                    return Outcome::Done(lines);
                }
                machine.next(compiler.take_constants(), compiler.take_code());
                if let Err(err) = machine.run() {
                    lines.push(format!("runtime error: {err}"));
                    return Outcome::Done(lines);
                }
                if let Some(value) = machine.last_value() {
                    if !matches!(value, Value::Null) {
                        lines.push(value.to_string());
                    }
                }
            }
        }
        Outcome::Done(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn done(outcome: Outcome) -> Vec<String> {
        match outcome {
            Outcome::Done(lines) => lines,
            Outcome::Incomplete => panic!("expected Done, got Incomplete"),
        }
    }

    #[test]
    fn eval_session_prints_values() {
        let mut session = Session::new(Backend::Eval);
        assert_eq!(done(session.feed("1 + 2 * 3")), vec!["7"]);
    }

    #[test]
    fn vm_session_prints_values() {
        let mut session = Session::new(Backend::Vm);
        assert_eq!(done(session.feed("1 + 2 * 3")), vec!["7"]);
    }

    #[test]
    fn continuation_across_lines_eval() {
        let mut session = Session::new(Backend::Eval);
        assert_eq!(session.feed("fn add(a, b) {"), Outcome::Incomplete);
        assert!(session.is_continuing());
        assert_eq!(session.feed("a + b"), Outcome::Incomplete);
        let lines = done(session.feed("}"));
        assert_eq!(lines, vec!["fn(a, b) { (a + b) }"]);
        assert!(!session.is_continuing());
        assert_eq!(done(session.feed("add(2, 3)")), vec!["5"]);
    }

    #[test]
    fn continuation_across_lines_vm() {
        let mut session = Session::new(Backend::Vm);
        assert_eq!(session.feed("fn add(a, b) {"), Outcome::Incomplete);
        assert_eq!(session.feed("a + b"), Outcome::Incomplete);
        // Defining a function leaves nothing on the VM stack.
        assert_eq!(done(session.feed("}")), Vec::<String>::new());
        assert_eq!(done(session.feed("add(2, 3)")), vec!["5"]);
    }

    #[test]
    fn truncated_expression_continues() {
        let mut session = Session::new(Backend::Eval);
        assert_eq!(session.feed("1 +"), Outcome::Incomplete);
        assert_eq!(done(session.feed("2")), vec!["3"]);
    }

    #[test]
    fn parse_errors_reset_the_buffer() {
        let mut session = Session::new(Backend::Eval);
        let lines = done(session.feed("1 + @"));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("parse error"), "got: {}", lines[0]);
        assert!(!session.is_continuing());
        assert_eq!(done(session.feed("1")), vec!["1"]);
    }

    #[test]
    fn state_persists_across_turns() {
        for backend in [Backend::Eval, Backend::Vm] {
            let mut session = Session::new(backend);
            session.feed("a = 20");
            session.feed("b = 22");
            assert_eq!(done(session.feed("a + b")), vec!["42"]);
        }
    }

    #[test]
    fn null_results_are_suppressed() {
        let mut session = Session::new(Backend::Eval);
        assert_eq!(done(session.feed("fn f() {} f()")), Vec::<String>::new());
        assert_eq!(done(session.feed("")), Vec::<String>::new());
    }

    #[test]
    fn evaluator_errors_print_as_values() {
        let mut session = Session::new(Backend::Eval);
        assert_eq!(
            done(session.feed("[1][5]")),
            vec!["error: index out of range"]
        );
    }

    #[test]
    fn vm_runtime_errors_are_reported() {
        let mut session = Session::new(Backend::Vm);
        let lines = done(session.feed("[1][5]"));
        assert_eq!(lines, vec!["runtime error: index out of range"]);
        // The session keeps working afterwards.
        assert_eq!(done(session.feed("1 + 1")), vec!["2"]);
    }

    #[test]
    fn vm_compile_errors_keep_the_session_consumable() {
        let mut session = Session::new(Backend::Vm);
        let lines = done(session.feed("nope"));
        assert_eq!(lines, vec!["compile error: undefined variable nope"]);
        assert_eq!(done(session.feed("a = 1; a")), vec!["1"]);
    }

    #[test]
    fn slice_is_an_error_only_on_the_vm_backend() {
        let mut eval = Session::new(Backend::Eval);
        assert_eq!(done(eval.feed("'hello'[1:4]")), vec!["ell"]);
        let mut vm = Session::new(Backend::Vm);
        let lines = done(vm.feed("'hello'[1:4]"));
        assert!(lines[0].starts_with("compile error"), "got: {}", lines[0]);
    }

    #[test]
    fn ast_dump_precedes_the_value() {
        let mut session = Session::new(Backend::Eval);
        assert!(session.toggle_dump_ast());
        let lines = done(session.feed("1"));
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Int"), "got: {}", lines[0]);
        assert_eq!(lines[1], "1");
        assert!(!session.toggle_dump_ast());
    }
}
