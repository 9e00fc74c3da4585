//! Cinder CLI entry point
//!
//! Command-line driver for the Cinder language: runs a script file through
//! the selected engine, or starts the interactive REPL when no script is
//! given.

mod repl;

use anyhow::{bail, Context, Result};
use clap::{Parser as ArgParser, ValueEnum};
use cinder_core::environment::Environment;
use cinder_core::macro_expansion::{define_macros, expand_macros};
use cinder_core::object::Object;
use cinder_core::{Compiler, Parser, VM};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Engine {
    /// Bytecode compiler + stack VM
    Vm,
    /// Tree-walking evaluator
    Eval,
}

#[derive(ArgParser, Debug)]
#[command(name = "cinder", version, about = "The Cinder programming language")]
pub struct Args {
    /// Script to execute; omit to start the REPL
    pub script: Option<PathBuf>,

    /// Execution engine
    #[arg(long, value_enum, default_value_t = Engine::Vm)]
    pub engine: Engine,

    /// Log what the driver is doing
    #[arg(short, long)]
    pub verbose: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let args = Args::parse();

    if args.verbose {
        info!("Cinder v{}", cinder_core::VERSION);
        info!("Engine: {:?}", args.engine);
    }

    match &args.script {
        Some(path) => run_script(&args, path),
        None => repl::start(args.engine),
    }
}

fn run_script(args: &Args, path: &PathBuf) -> Result<()> {
    debug!("Loading script: {}", path.display());
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut parser = Parser::from_source(&source);
    let mut program = parser.parse_program();
    if !parser.errors().is_empty() {
        bail!(
            "{} parser error(s):\n  {}",
            parser.errors().len(),
            parser.errors().join("\n  ")
        );
    }

    let macro_env = Environment::new();
    define_macros(&mut program, &macro_env);
    let expanded = expand_macros(program, &macro_env).context("macro expansion failed")?;

    let result = match args.engine {
        Engine::Vm => {
            let mut compiler = Compiler::new();
            compiler
                .compile(&expanded)
                .context("compilation failure")?;
            let mut vm = VM::new(compiler.bytecode());
            vm.run().context("execution failure")?;
            vm.last_popped_stack_elem()
        }
        Engine::Eval => {
            let env = Environment::new();
            let result = cinder_core::evaluator::eval_program(&expanded, &env);
            if let Object::Error(message) = &result {
                bail!("execution failure: {}", message);
            }
            result
        }
    };

    debug!("Result: {}", result);
    Ok(())
}
