#![warn(clippy::all)]

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use parrot::repl::{Backend, Outcome, Session};

fn main() {
    let mut backend = Backend::Eval;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--vm" => backend = Backend::Vm,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("parrot {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            other => {
                eprintln!("unknown option: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
    }

    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("could not initialize the line editor: {err}");
            std::process::exit(1);
        }
    };

    println!(
        "parrot {} ({} backend)",
        env!("CARGO_PKG_VERSION"),
        match backend {
            Backend::Eval => "evaluator",
            Backend::Vm => "vm",
        }
    );
    println!("Type :help for commands, Ctrl-D to exit.");

    let mut session = Session::new(backend);

    loop {
        let prompt = if session.is_continuing() { "... " } else { ">>> " };
        match editor.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    let _ = editor.add_history_entry(trimmed);
                }
                if !session.is_continuing() {
                    if trimmed.is_empty() {
                        continue;
                    }
                    match trimmed {
                        ":quit" | ":exit" => break,
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":ast" => {
                            if session.toggle_dump_ast() {
                                println!("AST dump enabled");
                            } else {
                                println!("AST dump disabled");
                            }
                            continue;
                        }
                        _ => {}
                    }
                }
                match session.feed(&line) {
                    Outcome::Incomplete => {}
                    Outcome::Done(lines) => {
                        for line in lines {
                            println!("{line}");
                        }
                    }
                }
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
            Err(err) => {
                eprintln!("{err}");
                break;
            }
        }
    }
}

fn print_usage() {
    println!("Usage: parrot [--vm]");
    println!();
    println!("Options:");
    println!("  --vm             Run input on the bytecode VM instead of the evaluator");
    println!("  -h, --help       Show this help");
    println!("  -V, --version    Show the version");
}

fn print_help() {
    println!("Commands:");
    println!("  :help    Show this help message");
    println!("  :ast     Toggle printing each parsed program as JSON");
    println!("  :quit    Exit (also :exit, Ctrl-C or Ctrl-D)");
    println!();
    println!("Expressions evaluate as you enter them; unfinished constructs");
    println!("continue on the next line under the ... prompt.");
}
