//! Built-in functions
//!
//! The table is ordered: a builtin's position is its `OpGetBuiltin` operand,
//! so reordering entries changes compiled programs. The tree-walking
//! evaluator looks builtins up by name instead and shares the same functions.
//!
//! Every builtin validates its own arity and argument types; violations come
//! back as `Object::Error` values for the caller to surface.

use crate::object::{Builtin, Object};

/// The builtin table, in `OpGetBuiltin` index order
pub const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "len",
        func: builtin_len,
    },
    Builtin {
        name: "puts",
        func: builtin_puts,
    },
    Builtin {
        name: "first",
        func: builtin_first,
    },
    Builtin {
        name: "last",
        func: builtin_last,
    },
    Builtin {
        name: "rest",
        func: builtin_rest,
    },
    Builtin {
        name: "push",
        func: builtin_push,
    },
];

pub fn get_builtin_by_name(name: &str) -> Option<Builtin> {
    BUILTINS.iter().find(|b| b.name == name).copied()
}

fn wrong_arg_count(got: usize, want: usize) -> Object {
    Object::error(format!(
        "wrong number of arguments. got {}. want {}",
        got, want
    ))
}

/// `len(x)`: element count of an array, byte length of a string
fn builtin_len(args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_arg_count(args.len(), 1);
    }

    match &args[0] {
        Object::String(s) => Object::Integer(s.len() as i64),
        Object::Array(elements) => Object::Integer(elements.len() as i64),
        other => Object::error(format!(
            "argument to `len` not supported. got {}",
            other.object_type()
        )),
    }
}

/// `puts(...)`: print each argument's inspect form on its own line
fn builtin_puts(args: &[Object]) -> Object {
    for arg in args {
        println!("{}", arg);
    }
    Object::Null
}

fn builtin_first(args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_arg_count(args.len(), 1);
    }

    match &args[0] {
        Object::Array(elements) => match elements.first() {
            Some(first) => first.clone(),
            None => Object::Null,
        },
        other => Object::error(format!(
            "argument to `first` not supported. got {}",
            other.object_type()
        )),
    }
}

fn builtin_last(args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_arg_count(args.len(), 1);
    }

    match &args[0] {
        Object::Array(elements) => match elements.last() {
            Some(last) => last.clone(),
            None => Object::Null,
        },
        other => Object::error(format!(
            "argument to `last` not supported. got {}",
            other.object_type()
        )),
    }
}

/// `rest(arr)`: a new array without the first element, Null when empty
fn builtin_rest(args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_arg_count(args.len(), 1);
    }

    match &args[0] {
        Object::Array(elements) => {
            if elements.is_empty() {
                Object::Null
            } else {
                Object::array(elements[1..].to_vec())
            }
        }
        other => Object::error(format!(
            "argument to `rest` not supported. got {}",
            other.object_type()
        )),
    }
}

/// `push(arr, x)`: a new array with `x` appended
fn builtin_push(args: &[Object]) -> Object {
    if args.len() != 2 {
        return wrong_arg_count(args.len(), 2);
    }

    match &args[0] {
        Object::Array(elements) => {
            let mut result = elements.as_ref().clone();
            result.push(args[1].clone());
            Object::array(result)
        }
        other => Object::error(format!(
            "argument to `push` not supported. got {}",
            other.object_type()
        )),
    }
}
