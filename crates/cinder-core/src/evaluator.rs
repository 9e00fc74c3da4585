//! Tree-walking evaluator
//!
//! Direct interpretation of the AST against a chain of environments. The
//! observable semantics (arithmetic, truthiness, equality, builtin behavior)
//! must stay aligned with the bytecode VM; the integration tests hold the two
//! engines to the same outputs.
//!
//! Runtime failures are `Object::Error` values that bubble up through every
//! evaluation rule; nothing in here panics on user input.

use crate::ast::{
    self, BlockStatement, BooleanLiteral, Expression, HashLiteral, Identifier, IfExpression,
    IntegerLiteral, Program, Statement, StringLiteral,
};
use crate::builtins::get_builtin_by_name;
use crate::environment::Environment;
use crate::object::{Function, HashPair, Object};
use crate::token::{Token, TokenType};
use gc::{Gc, GcCell};
use std::collections::HashMap;
use std::rc::Rc;

type Env = Gc<GcCell<Environment>>;

pub fn eval_program(program: &Program, env: &Env) -> Object {
    let mut result = Object::Null;

    for stmt in &program.statements {
        result = eval_statement(stmt, env);

        match result {
            Object::ReturnValue(value) => return *value,
            Object::Error(_) => return result,
            _ => {}
        }
    }

    result
}

fn eval_statement(stmt: &Statement, env: &Env) -> Object {
    match stmt {
        Statement::Expression(s) => eval_expression(&s.expression, env),
        Statement::Return(s) => {
            let value = match &s.return_value {
                Some(expr) => eval_expression(expr, env),
                None => Object::Null,
            };
            if value.is_error() {
                return value;
            }
            Object::ReturnValue(Box::new(value))
        }
        Statement::Let(s) => {
            let value = eval_expression(&s.value, env);
            if value.is_error() {
                return value;
            }
            env.borrow_mut().set(s.name.value.clone(), value);
            Object::Null
        }
    }
}

pub fn eval_block_statement(block: &BlockStatement, env: &Env) -> Object {
    let mut result = Object::Null;

    for stmt in &block.statements {
        result = eval_statement(stmt, env);

        // ReturnValue stays wrapped so it unwinds through nested blocks
        if matches!(result, Object::ReturnValue(_) | Object::Error(_)) {
            return result;
        }
    }

    result
}

pub fn eval_expression(expr: &Expression, env: &Env) -> Object {
    match expr {
        Expression::IntegerLiteral(lit) => Object::Integer(lit.value),
        Expression::StringLiteral(lit) => Object::string(lit.value.clone()),
        Expression::Boolean(lit) => Object::Boolean(lit.value),
        Expression::Prefix(e) => {
            let right = eval_expression(&e.right, env);
            if right.is_error() {
                return right;
            }
            eval_prefix_expression(&e.operator, right)
        }
        Expression::Infix(e) => {
            let left = eval_expression(&e.left, env);
            if left.is_error() {
                return left;
            }
            let right = eval_expression(&e.right, env);
            if right.is_error() {
                return right;
            }
            eval_infix_expression(&e.operator, left, right)
        }
        Expression::If(e) => eval_if_expression(e, env),
        Expression::Identifier(ident) => eval_identifier(ident, env),
        Expression::Function(func) => Object::Function(Gc::new(Function {
            parameters: func.parameters.clone(),
            body: func.body.clone(),
            env: env.clone(),
        })),
        Expression::Call(call) => {
            // quote leaves its single argument unevaluated
            if call.function.token_literal() == "quote" && call.arguments.len() == 1 {
                return quote(call.arguments[0].clone(), env);
            }

            let function = eval_expression(&call.function, env);
            if function.is_error() {
                return function;
            }
            let args = match eval_expressions(&call.arguments, env) {
                Ok(args) => args,
                Err(err) => return err,
            };
            apply_function(function, &args)
        }
        Expression::Array(array) => match eval_expressions(&array.elements, env) {
            Ok(elements) => Object::array(elements),
            Err(err) => err,
        },
        Expression::Index(e) => {
            let left = eval_expression(&e.left, env);
            if left.is_error() {
                return left;
            }
            let index = eval_expression(&e.index, env);
            if index.is_error() {
                return index;
            }
            eval_index_expression(left, index)
        }
        Expression::Hash(hash) => eval_hash_literal(hash, env),
        Expression::Macro(_) => {
            // Macro literals only survive past macro expansion in positions
            // the define pass does not collect; they have no runtime value.
            Object::error("macro literal outside of macro definition")
        }
    }
}

fn eval_expressions(exprs: &[Expression], env: &Env) -> Result<Vec<Object>, Object> {
    let mut results = Vec::with_capacity(exprs.len());
    for expr in exprs {
        let value = eval_expression(expr, env);
        if value.is_error() {
            return Err(value);
        }
        results.push(value);
    }
    Ok(results)
}

fn eval_prefix_expression(operator: &str, right: Object) -> Object {
    match operator {
        "!" => Object::Boolean(!right.is_truthy()),
        "-" => match right {
            Object::Integer(value) => Object::Integer(-value),
            other => Object::error(format!("unknown operator: -{}", other.object_type())),
        },
        _ => Object::error(format!(
            "unknown operator: {}{}",
            operator,
            right.object_type()
        )),
    }
}

fn eval_infix_expression(operator: &str, left: Object, right: Object) -> Object {
    match (&left, &right) {
        (Object::Integer(l), Object::Integer(r)) => {
            eval_integer_infix_expression(operator, *l, *r)
        }
        (Object::String(l), Object::String(r)) if operator == "+" => {
            Object::string(format!("{}{}", l, r))
        }
        _ if operator == "==" => Object::Boolean(left.equals(&right)),
        _ if operator == "!=" => Object::Boolean(!left.equals(&right)),
        _ if left.object_type() != right.object_type() => Object::error(format!(
            "type mismatch: {} {} {}",
            left.object_type(),
            operator,
            right.object_type()
        )),
        _ => Object::error(format!(
            "unknown operator: {} {} {}",
            left.object_type(),
            operator,
            right.object_type()
        )),
    }
}

fn eval_integer_infix_expression(operator: &str, left: i64, right: i64) -> Object {
    match operator {
        "+" => Object::Integer(left + right),
        "-" => Object::Integer(left - right),
        "*" => Object::Integer(left * right),
        "/" => {
            if right == 0 {
                Object::error("division by zero")
            } else {
                Object::Integer(left / right)
            }
        }
        "<" => Object::Boolean(left < right),
        ">" => Object::Boolean(left > right),
        "==" => Object::Boolean(left == right),
        "!=" => Object::Boolean(left != right),
        _ => Object::error(format!("unknown operator: INTEGER {} INTEGER", operator)),
    }
}

fn eval_if_expression(expr: &IfExpression, env: &Env) -> Object {
    let condition = eval_expression(&expr.condition, env);
    if condition.is_error() {
        return condition;
    }

    if condition.is_truthy() {
        eval_block_statement(&expr.consequence, env)
    } else {
        match &expr.alternative {
            Some(alternative) => eval_block_statement(alternative, env),
            None => Object::Null,
        }
    }
}

fn eval_identifier(ident: &Identifier, env: &Env) -> Object {
    if let Some(value) = env.borrow().get(&ident.value) {
        return value;
    }
    if let Some(builtin) = get_builtin_by_name(&ident.value) {
        return Object::Builtin(builtin);
    }
    Object::error(format!("identifier not found: {}", ident.value))
}

fn apply_function(function: Object, args: &[Object]) -> Object {
    match function {
        Object::Function(func) => {
            let extended = Environment::new_enclosed(func.env.clone());
            for (param, arg) in func.parameters.iter().zip(args) {
                extended.borrow_mut().set(param.value.clone(), arg.clone());
            }

            let evaluated = eval_block_statement(&func.body, &extended);
            match evaluated {
                Object::ReturnValue(value) => *value,
                other => other,
            }
        }
        Object::Builtin(builtin) => (builtin.func)(args),
        other => Object::error(format!("not a function: {}", other.object_type())),
    }
}

fn eval_index_expression(left: Object, index: Object) -> Object {
    match (&left, &index) {
        (Object::Array(elements), Object::Integer(i)) => {
            if *i < 0 || *i as usize >= elements.len() {
                Object::Null
            } else {
                elements[*i as usize].clone()
            }
        }
        (Object::Hash(pairs), _) => match index.hash_key() {
            Some(key) => match pairs.get(&key) {
                Some(pair) => pair.value.clone(),
                None => Object::Null,
            },
            None => Object::error(format!("unusable as hash key: {}", index.object_type())),
        },
        _ => Object::error(format!(
            "index operator not supported: {}",
            left.object_type()
        )),
    }
}

fn eval_hash_literal(hash: &HashLiteral, env: &Env) -> Object {
    let mut pairs = HashMap::with_capacity(hash.pairs.len());

    for (key_expr, value_expr) in &hash.pairs {
        let key = eval_expression(key_expr, env);
        if key.is_error() {
            return key;
        }

        let Some(hash_key) = key.hash_key() else {
            return Object::error(format!("unusable as hash key: {}", key.object_type()));
        };

        let value = eval_expression(value_expr, env);
        if value.is_error() {
            return value;
        }

        pairs.insert(hash_key, HashPair { key, value });
    }

    Object::Hash(Gc::new(pairs))
}

/// `quote(x)`: splice unquote results, then freeze the node as a value
pub(crate) fn quote(expr: Expression, env: &Env) -> Object {
    let processed = eval_unquote_calls(expr, env);
    Object::Quote(Rc::new(processed))
}

fn eval_unquote_calls(quoted: Expression, env: &Env) -> Expression {
    ast::modify_expression(quoted, &mut |expr| {
        if !is_unquote_call(&expr) {
            return expr;
        }

        let Expression::Call(call) = &expr else {
            return expr;
        };
        if call.arguments.len() != 1 {
            return expr;
        }

        let value = eval_expression(&call.arguments[0], env);
        // A result that has no AST form leaves the call site untouched.
        convert_object_to_ast_node(&value).unwrap_or(expr)
    })
}

fn is_unquote_call(expr: &Expression) -> bool {
    matches!(expr, Expression::Call(call) if call.function.token_literal() == "unquote")
}

fn convert_object_to_ast_node(obj: &Object) -> Option<Expression> {
    match obj {
        Object::Integer(value) => Some(Expression::IntegerLiteral(IntegerLiteral {
            token: Token::new(TokenType::Int, value.to_string()),
            value: *value,
        })),
        Object::Boolean(value) => {
            let token = if *value {
                Token::new(TokenType::True, "true")
            } else {
                Token::new(TokenType::False, "false")
            };
            Some(Expression::Boolean(BooleanLiteral {
                token,
                value: *value,
            }))
        }
        Object::String(value) => Some(Expression::StringLiteral(StringLiteral {
            token: Token::new(TokenType::String, value.as_str()),
            value: value.as_str().to_string(),
        })),
        Object::Quote(node) => Some((**node).clone()),
        _ => None,
    }
}
