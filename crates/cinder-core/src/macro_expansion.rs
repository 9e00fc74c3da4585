//! Macro definition collection and expansion
//!
//! Two passes over a freshly parsed program. The first removes every
//! top-level `let <name> = macro(...) {...};` statement and binds the macro
//! in a dedicated environment. The second rewrites the remaining tree: any
//! call whose callee names a defined macro is replaced by the macro body's
//! evaluation result, with each argument bound unevaluated as a Quote value.

use crate::ast::{self, Expression, Program, Statement};
use crate::environment::Environment;
use crate::evaluator::eval_block_statement;
use crate::object::{MacroObject, Object};
use gc::{Gc, GcCell};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MacroError {
    #[error("we only support returning AST-nodes from macros")]
    NonQuoteResult,
    #[error("wrong number of macro arguments. got {got}. want {want}")]
    WrongArgumentCount { got: usize, want: usize },
    #[error("{0}")]
    Eval(String),
}

/// Strip macro definitions out of the program and bind them in `env`
pub fn define_macros(program: &mut Program, env: &Gc<GcCell<Environment>>) {
    let statements = std::mem::take(&mut program.statements);

    program.statements = statements
        .into_iter()
        .filter(|stmt| {
            if let Some((name, macro_lit)) = as_macro_definition(stmt) {
                let macro_obj = Object::Macro(Gc::new(MacroObject {
                    parameters: macro_lit.parameters.clone(),
                    body: macro_lit.body.clone(),
                    env: env.clone(),
                }));
                env.borrow_mut().set(name.to_string(), macro_obj);
                false
            } else {
                true
            }
        })
        .collect();
}

fn as_macro_definition(stmt: &Statement) -> Option<(&str, &ast::MacroLiteral)> {
    match stmt {
        Statement::Let(let_stmt) => match &let_stmt.value {
            Expression::Macro(macro_lit) => Some((&let_stmt.name.value, macro_lit)),
            _ => None,
        },
        _ => None,
    }
}

/// Replace every macro call site with the expansion the macro body produces
pub fn expand_macros(
    program: Program,
    env: &Gc<GcCell<Environment>>,
) -> Result<Program, MacroError> {
    let mut error = None;

    let expanded = ast::modify_program(program, &mut |expr| {
        if error.is_some() {
            return expr;
        }

        let Some(macro_obj) = as_macro_call(&expr, env) else {
            return expr;
        };
        let Expression::Call(call) = expr else {
            unreachable!("as_macro_call only matches call expressions");
        };

        if call.arguments.len() != macro_obj.parameters.len() {
            error = Some(MacroError::WrongArgumentCount {
                got: call.arguments.len(),
                want: macro_obj.parameters.len(),
            });
            return Expression::Call(call);
        }

        // Arguments are handed to the macro unevaluated, as Quote values.
        let eval_env = Environment::new_enclosed(macro_obj.env.clone());
        for (param, arg) in macro_obj.parameters.iter().zip(&call.arguments) {
            eval_env
                .borrow_mut()
                .set(param.value.clone(), Object::Quote(Rc::new(arg.clone())));
        }

        match eval_block_statement(&macro_obj.body, &eval_env) {
            Object::Quote(node) => (*node).clone(),
            Object::Error(message) => {
                error = Some(MacroError::Eval(message));
                Expression::Call(call)
            }
            _ => {
                error = Some(MacroError::NonQuoteResult);
                Expression::Call(call)
            }
        }
    });

    match error {
        Some(err) => Err(err),
        None => Ok(expanded),
    }
}

fn as_macro_call(expr: &Expression, env: &Gc<GcCell<Environment>>) -> Option<Gc<MacroObject>> {
    let Expression::Call(call) = expr else {
        return None;
    };
    let Expression::Identifier(ident) = call.function.as_ref() else {
        return None;
    };

    match env.borrow().get(&ident.value) {
        Some(Object::Macro(macro_obj)) => Some(macro_obj),
        _ => None,
    }
}
