//! # Cinder Core
//!
//! The Cinder language: a small expression language executed two ways that
//! must agree — a tree-walking evaluator with macro expansion, and a bytecode
//! compiler paired with a stack VM for throughput.
//!
//! ## Pipeline
//!
//! Strictly linear, leaves first:
//!
//! 1. `lexer` — source text to a lazy token stream
//! 2. `parser` — tokens to an AST (Pratt expression parsing)
//! 3. `macro_expansion` — collect `macro` definitions, splice call sites
//! 4. `compiler` — expanded AST to bytecode + constant pool
//! 5. `vm` — bytecode against a value stack, frame stack and globals array
//!
//! The `evaluator` interprets the expanded AST directly and doubles as the
//! macro engine's execution back end.
//!
//! ## Architecture
//!
//! - `token`, `lexer`: lexical layer
//! - `ast`: node variants, re-parseable `Display`, rewrite walker
//! - `object`, `environment`, `builtins`: runtime value model
//! - `evaluator`, `macro_expansion`: tree-walking execution
//! - `code`, `symbol_table`, `compiler`, `vm`: bytecode execution

pub mod ast;
pub mod builtins;
pub mod code;
pub mod compiler;
pub mod environment;
pub mod evaluator;
pub mod lexer;
pub mod macro_expansion;
pub mod object;
pub mod parser;
pub mod symbol_table;
pub mod token;
pub mod vm;

// Re-export the types a driver needs for the full pipeline
pub use compiler::{Bytecode, CompileError, Compiler};
pub use environment::Environment;
pub use lexer::Lexer;
pub use macro_expansion::{define_macros, expand_macros, MacroError};
pub use object::Object;
pub use parser::Parser;
pub use vm::{VmError, VM};

/// Cinder version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
