//! Runtime value model
//!
//! One tagged union serves both execution engines. Composite payloads sit
//! behind `gc::Gc` so that values are cheap to copy on the VM stack and so
//! that tree-walking closures may participate in environment cycles (see
//! `environment`). The `Trace` impls are written by hand with
//! `custom_trace!`: only environments and values can hold GC pointers, plain
//! data and AST payloads are inert.
//!
//! `Display` is the stable inspect format consumed by `puts` and the tests.

use crate::ast::{BlockStatement, Expression, Identifier};
use crate::code::Instructions;
use crate::environment::Environment;
use gc::{custom_trace, unsafe_empty_trace, Finalize, Gc, GcCell, Trace};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Type tag of a runtime value, used in error messages and hash keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Integer,
    Boolean,
    String,
    Null,
    ReturnValue,
    Error,
    Function,
    CompiledFunction,
    Closure,
    Builtin,
    Array,
    Hash,
    Quote,
    Macro,
}

impl Finalize for ObjectType {}
unsafe impl Trace for ObjectType {
    unsafe_empty_trace!();
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectType::Integer => "INTEGER",
            ObjectType::Boolean => "BOOLEAN",
            ObjectType::String => "STRING",
            ObjectType::Null => "NULL",
            ObjectType::ReturnValue => "RETURN_VALUE",
            ObjectType::Error => "ERROR",
            ObjectType::Function => "FUNCTION",
            ObjectType::CompiledFunction => "COMPILED_FUNCTION",
            ObjectType::Closure => "CLOSURE",
            ObjectType::Builtin => "BUILTIN",
            ObjectType::Array => "ARRAY",
            ObjectType::Hash => "HASH",
            ObjectType::Quote => "QUOTE",
            ObjectType::Macro => "MACRO",
        };
        f.write_str(s)
    }
}

/// Signature shared by every builtin function
pub type BuiltinFunction = fn(&[Object]) -> Object;

/// A native function reference
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFunction,
}

impl Finalize for Builtin {}
unsafe impl Trace for Builtin {
    unsafe_empty_trace!();
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin").field("name", &self.name).finish()
    }
}

/// Tree-walking closure: parameters, body, captured environment
#[derive(Clone)]
pub struct Function {
    pub parameters: Vec<Identifier>,
    pub body: BlockStatement,
    pub env: Gc<GcCell<Environment>>,
}

impl Finalize for Function {}
unsafe impl Trace for Function {
    custom_trace!(this, {
        mark(&this.env);
    });
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The environment may be cyclic through this very function.
        f.debug_struct("Function")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Macro definition captured by the macro engine
#[derive(Clone)]
pub struct MacroObject {
    pub parameters: Vec<Identifier>,
    pub body: BlockStatement,
    pub env: Gc<GcCell<Environment>>,
}

impl Finalize for MacroObject {}
unsafe impl Trace for MacroObject {
    custom_trace!(this, {
        mark(&this.env);
    });
}

impl fmt::Debug for MacroObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacroObject")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Bytecode function emitted by the compiler
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub num_locals: usize,
    pub num_parameters: usize,
}

impl Finalize for CompiledFunction {}
unsafe impl Trace for CompiledFunction {
    unsafe_empty_trace!();
}

/// A compiled function paired with its captured free-variable values
#[derive(Debug, Clone)]
pub struct Closure {
    pub func: Gc<CompiledFunction>,
    pub free: Vec<Object>,
}

impl Finalize for Closure {}
unsafe impl Trace for Closure {
    custom_trace!(this, {
        mark(&this.func);
        mark(&this.free);
    });
}

/// Hash key: type tag plus a 64-bit value
///
/// Equal values always produce equal keys; strings hash with FNV-1a over the
/// byte content and collisions are not chained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashKey {
    pub object_type: ObjectType,
    pub value: u64,
}

impl Finalize for HashKey {}
unsafe impl Trace for HashKey {
    unsafe_empty_trace!();
}

/// Original key/value pair stored under a `HashKey`
#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: Object,
    pub value: Object,
}

impl Finalize for HashPair {}
unsafe impl Trace for HashPair {
    custom_trace!(this, {
        mark(&this.key);
        mark(&this.value);
    });
}

#[derive(Debug, Clone)]
pub enum Object {
    Integer(i64),
    Boolean(bool),
    String(Gc<String>),
    Null,
    ReturnValue(Box<Object>),
    Error(String),
    Array(Gc<Vec<Object>>),
    Hash(Gc<HashMap<HashKey, HashPair>>),
    Function(Gc<Function>),
    CompiledFunction(Gc<CompiledFunction>),
    Closure(Gc<Closure>),
    Builtin(Builtin),
    Quote(Rc<Expression>),
    Macro(Gc<MacroObject>),
}

impl Finalize for Object {}
unsafe impl Trace for Object {
    custom_trace!(this, {
        match this {
            Object::String(s) => mark(s),
            Object::ReturnValue(value) => mark(value),
            Object::Array(elements) => mark(elements),
            Object::Hash(pairs) => mark(pairs),
            Object::Function(func) => mark(func),
            Object::CompiledFunction(func) => mark(func),
            Object::Closure(closure) => mark(closure),
            Object::Macro(macro_obj) => mark(macro_obj),
            // Plain data and AST payloads hold no GC pointers
            Object::Integer(_)
            | Object::Boolean(_)
            | Object::Null
            | Object::Error(_)
            | Object::Builtin(_)
            | Object::Quote(_) => {}
        }
    });
}

impl Object {
    pub fn string(s: impl Into<String>) -> Object {
        Object::String(Gc::new(s.into()))
    }

    pub fn array(elements: Vec<Object>) -> Object {
        Object::Array(Gc::new(elements))
    }

    pub fn error(message: impl Into<String>) -> Object {
        Object::Error(message.into())
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Object::Integer(_) => ObjectType::Integer,
            Object::Boolean(_) => ObjectType::Boolean,
            Object::String(_) => ObjectType::String,
            Object::Null => ObjectType::Null,
            Object::ReturnValue(_) => ObjectType::ReturnValue,
            Object::Error(_) => ObjectType::Error,
            Object::Array(_) => ObjectType::Array,
            Object::Hash(_) => ObjectType::Hash,
            Object::Function(_) => ObjectType::Function,
            Object::CompiledFunction(_) => ObjectType::CompiledFunction,
            Object::Closure(_) => ObjectType::Closure,
            Object::Builtin(_) => ObjectType::Builtin,
            Object::Quote(_) => ObjectType::Quote,
            Object::Macro(_) => ObjectType::Macro,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Object::Error(_))
    }

    /// Truthiness shared by both engines: false and null are falsy,
    /// everything else is truthy
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Boolean(false) | Object::Null)
    }

    /// Hash key for Integer, Boolean and String; None for everything else
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Object::Integer(value) => Some(HashKey {
                object_type: ObjectType::Integer,
                value: *value as u64,
            }),
            Object::Boolean(value) => Some(HashKey {
                object_type: ObjectType::Boolean,
                value: u64::from(*value),
            }),
            Object::String(value) => Some(HashKey {
                object_type: ObjectType::String,
                value: fnv1a(value.as_bytes()),
            }),
            _ => None,
        }
    }

    /// Tagged-value equality used by `==`/`!=` in both engines
    ///
    /// Integers, booleans and strings compare by content, nulls are equal,
    /// every cross-type or non-comparable pairing is unequal.
    pub fn equals(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Integer(a), Object::Integer(b)) => a == b,
            (Object::Boolean(a), Object::Boolean(b)) => a == b,
            (Object::String(a), Object::String(b)) => a == b,
            (Object::Null, Object::Null) => true,
            _ => false,
        }
    }
}

/// Structural equality for tests and tooling: data compares by content,
/// functions and closures by identity. The language's own `==` is `equals`.
impl PartialEq for Object {
    fn eq(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Integer(a), Object::Integer(b)) => a == b,
            (Object::Boolean(a), Object::Boolean(b)) => a == b,
            (Object::String(a), Object::String(b)) => a == b,
            (Object::Null, Object::Null) => true,
            (Object::ReturnValue(a), Object::ReturnValue(b)) => a == b,
            (Object::Error(a), Object::Error(b)) => a == b,
            (Object::Array(a), Object::Array(b)) => a == b,
            (Object::Hash(a), Object::Hash(b)) => a == b,
            (Object::Function(a), Object::Function(b)) => Gc::ptr_eq(a, b),
            (Object::CompiledFunction(a), Object::CompiledFunction(b)) => Gc::ptr_eq(a, b),
            (Object::Closure(a), Object::Closure(b)) => Gc::ptr_eq(a, b),
            (Object::Builtin(a), Object::Builtin(b)) => a.name == b.name,
            (Object::Quote(a), Object::Quote(b)) => a == b,
            (Object::Macro(a), Object::Macro(b)) => Gc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Integer(value) => write!(f, "{}", value),
            Object::Boolean(value) => write!(f, "{}", value),
            Object::String(value) => f.write_str(value),
            Object::Null => f.write_str("null"),
            Object::ReturnValue(value) => value.fmt(f),
            Object::Error(message) => write!(f, "ERROR: {}", message),
            Object::Array(elements) => {
                let parts: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Object::Hash(pairs) => {
                let mut parts: Vec<String> = pairs
                    .values()
                    .map(|pair| format!("{}: {}", pair.key, pair.value))
                    .collect();
                parts.sort();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Object::Function(func) => {
                let params: Vec<String> =
                    func.parameters.iter().map(|p| p.value.clone()).collect();
                write!(f, "fn({}) {{\n{}\n}}", params.join(", "), func.body)
            }
            Object::CompiledFunction(func) => {
                write!(
                    f,
                    "CompiledFunction[{} instructions]",
                    func.instructions.len()
                )
            }
            Object::Closure(closure) => {
                write!(
                    f,
                    "Closure[{} free, {} instructions]",
                    closure.free.len(),
                    closure.func.instructions.len()
                )
            }
            Object::Builtin(_) => f.write_str("built-in function"),
            Object::Quote(node) => write!(f, "QUOTE({})", node),
            Object::Macro(m) => {
                let params: Vec<String> = m.parameters.iter().map(|p| p.value.clone()).collect();
                write!(f, "macro({}) {{\n{}\n}}", params.join(", "), m.body)
            }
        }
    }
}

/// 64-bit FNV-1a over a byte slice
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
