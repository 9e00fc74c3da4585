//! Interactive read-eval-print loop
//!
//! Session state persists across lines: the macro environment, the compiler's
//! symbol table and constant pool, and the VM's globals array (or the
//! evaluator's environment), so that definitions remain visible.

use anyhow::Result;
use cinder_core::builtins::BUILTINS;
use cinder_core::environment::Environment;
use cinder_core::macro_expansion::{define_macros, expand_macros};
use cinder_core::object::Object;
use cinder_core::symbol_table::{shared, SymbolTable};
use cinder_core::vm::GLOBALS_SIZE;
use cinder_core::{Compiler, Parser, VM};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::Engine;

const PROMPT: &str = ">> ";

pub fn start(engine: Engine) -> Result<()> {
    println!("Cinder v{} ({:?} engine)", cinder_core::VERSION, engine);
    println!("Type expressions, or Ctrl-D to exit.");

    let mut editor = DefaultEditor::new()?;

    // Session-long state
    let macro_env = Environment::new();
    let eval_env = Environment::new();
    let mut constants: Vec<Object> = Vec::new();
    let mut globals = vec![Object::Null; GLOBALS_SIZE];
    let symbol_table = {
        let mut table = SymbolTable::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            table.define_builtin(index, builtin.name);
        }
        shared(table)
    };

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        };
        if line.trim().is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(&line);

        let mut parser = Parser::from_source(&line);
        let mut program = parser.parse_program();
        if !parser.errors().is_empty() {
            print_parser_errors(parser.errors());
            continue;
        }

        define_macros(&mut program, &macro_env);
        let expanded = match expand_macros(program, &macro_env) {
            Ok(expanded) => expanded,
            Err(err) => {
                println!("macro expansion failure:\n {}", err);
                continue;
            }
        };

        match engine {
            Engine::Vm => {
                let mut compiler = Compiler::new_with_state(symbol_table.clone(), constants);
                constants = match compiler.compile(&expanded) {
                    Ok(()) => {
                        let bytecode = compiler.bytecode();
                        let pool = bytecode.constants.clone();

                        let mut vm = VM::new_with_globals_store(bytecode, globals);
                        match vm.run() {
                            Ok(()) => println!("{}", vm.last_popped_stack_elem()),
                            Err(err) => println!("execution failure:\n {}", err),
                        }
                        globals = vm.into_globals();
                        pool
                    }
                    Err(err) => {
                        println!("compilation failure:\n {}", err);
                        compiler.bytecode().constants
                    }
                };
            }
            Engine::Eval => {
                let result = cinder_core::evaluator::eval_program(&expanded, &eval_env);
                println!("{}", result);
            }
        }
    }

    Ok(())
}

fn print_parser_errors(errors: &[String]) {
    println!("parser errors:");
    for error in errors {
        println!("\t{}", error);
    }
}
