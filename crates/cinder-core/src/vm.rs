//! Stack virtual machine
//!
//! A classic dispatch loop over byte-encoded instructions. Execution state is
//! a value stack (`sp` points at the next free slot), a frame stack holding
//! one activation record per live call, and a flat globals array indexed by
//! `u16`. The value stack never shrinks below the running frame's base
//! pointer, and `pop` only moves `sp` — which is what lets
//! `last_popped_stack_elem` observe the value the outermost statement left
//! behind.
//!
//! Every failure is a `VmError` that halts `run`; the machine never panics on
//! well-formed bytecode.

use crate::builtins::BUILTINS;
use crate::code::{read_u16, Opcode};
use crate::compiler::Bytecode;
use crate::object::{Closure, HashPair, Object, ObjectType};
use gc::Gc;
use std::collections::HashMap;
use thiserror::Error;

pub const STACK_SIZE: usize = 2048;
pub const GLOBALS_SIZE: usize = 65536;
pub const MAX_FRAMES: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    #[error("stack overflow")]
    StackOverflow,
    #[error("exceeded maximum frame depth")]
    FrameOverflow,
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
    #[error("unsupported types for binary operation: {0} {1}")]
    UnsupportedBinaryTypes(ObjectType, ObjectType),
    #[error("unknown integer operator: {0}")]
    UnknownIntegerOperator(&'static str),
    #[error("unknown string operator: {0}")]
    UnknownStringOperator(&'static str),
    #[error("unknown operator: {0} ({1} {2})")]
    UnknownOperator(&'static str, ObjectType, ObjectType),
    #[error("unsupported type for negation: {0}")]
    UnsupportedNegation(ObjectType),
    #[error("division by zero")]
    DivisionByZero,
    #[error("calling non-function")]
    CallingNonFunction,
    #[error("wrong number of arguments: want={want}, got={got}")]
    WrongArgumentCount { want: usize, got: usize },
    #[error("index operator not supported: {0}")]
    IndexNotSupported(ObjectType),
    #[error("unusable as hash key: {0}")]
    UnusableHashKey(ObjectType),
    #[error("{0}")]
    Builtin(String),
}

/// Activation record: the running closure, its instruction pointer and the
/// stack slot its locals start at
struct Frame {
    closure: Gc<Closure>,
    ip: usize,
    base_pointer: usize,
}

pub struct VM {
    constants: Vec<Object>,
    stack: Vec<Object>,
    /// Next free stack slot; `stack[sp - 1]` is the top
    sp: usize,
    globals: Vec<Object>,
    frames: Vec<Frame>,
}

impl VM {
    pub fn new(bytecode: Bytecode) -> Self {
        VM::new_with_globals_store(bytecode, vec![Object::Null; GLOBALS_SIZE])
    }

    /// Reuse a globals array from an earlier run so definitions persist (REPL)
    pub fn new_with_globals_store(bytecode: Bytecode, globals: Vec<Object>) -> Self {
        let main_fn = Gc::new(crate::object::CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_parameters: 0,
        });
        let main_closure = Gc::new(Closure {
            func: main_fn,
            free: Vec::new(),
        });
        let mut frames = Vec::with_capacity(MAX_FRAMES);
        frames.push(Frame {
            closure: main_closure,
            ip: 0,
            base_pointer: 0,
        });

        VM {
            constants: bytecode.constants,
            stack: vec![Object::Null; STACK_SIZE],
            sp: 0,
            globals,
            frames,
        }
    }

    /// Hand the globals array back for the next session line
    pub fn into_globals(self) -> Vec<Object> {
        self.globals
    }

    /// The value most recently popped off the stack
    pub fn last_popped_stack_elem(&self) -> Object {
        self.stack[self.sp].clone()
    }

    pub fn run(&mut self) -> Result<(), VmError> {
        loop {
            let (closure, ip) = {
                let frame = self.frames.last().expect("no running frame");
                (frame.closure.clone(), frame.ip)
            };
            let ins = &closure.func.instructions.0;

            if ip >= ins.len() {
                // Only the main frame runs off the end of its instructions;
                // function bodies always end in a return opcode.
                break;
            }

            let op = Opcode::from_byte(ins[ip]).ok_or(VmError::UnknownOpcode(ins[ip]))?;

            match op {
                Opcode::Constant => {
                    let index = read_u16(&ins[ip + 1..]) as usize;
                    self.set_ip(ip + 3);
                    let constant = self.constants[index].clone();
                    self.push(constant)?;
                }
                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    self.set_ip(ip + 1);
                    self.execute_binary_operation(op)?;
                }
                Opcode::Pop => {
                    self.set_ip(ip + 1);
                    self.pop();
                }
                Opcode::True => {
                    self.set_ip(ip + 1);
                    self.push(Object::Boolean(true))?;
                }
                Opcode::False => {
                    self.set_ip(ip + 1);
                    self.push(Object::Boolean(false))?;
                }
                Opcode::Equal | Opcode::NotEqual | Opcode::GreaterThan => {
                    self.set_ip(ip + 1);
                    self.execute_comparison(op)?;
                }
                Opcode::Bang => {
                    self.set_ip(ip + 1);
                    let operand = self.pop();
                    self.push(Object::Boolean(!operand.is_truthy()))?;
                }
                Opcode::Minus => {
                    self.set_ip(ip + 1);
                    match self.pop() {
                        Object::Integer(value) => self.push(Object::Integer(-value))?,
                        other => {
                            return Err(VmError::UnsupportedNegation(other.object_type()))
                        }
                    }
                }
                Opcode::JumpNotTruthy => {
                    let target = read_u16(&ins[ip + 1..]) as usize;
                    let condition = self.pop();
                    if condition.is_truthy() {
                        self.set_ip(ip + 3);
                    } else {
                        self.set_ip(target);
                    }
                }
                Opcode::Jump => {
                    let target = read_u16(&ins[ip + 1..]) as usize;
                    self.set_ip(target);
                }
                Opcode::Null => {
                    self.set_ip(ip + 1);
                    self.push(Object::Null)?;
                }
                Opcode::SetGlobal => {
                    let index = read_u16(&ins[ip + 1..]) as usize;
                    self.set_ip(ip + 3);
                    self.globals[index] = self.pop();
                }
                Opcode::GetGlobal => {
                    let index = read_u16(&ins[ip + 1..]) as usize;
                    self.set_ip(ip + 3);
                    let value = self.globals[index].clone();
                    self.push(value)?;
                }
                Opcode::Array => {
                    let count = read_u16(&ins[ip + 1..]) as usize;
                    self.set_ip(ip + 3);
                    let elements = self.stack[self.sp - count..self.sp].to_vec();
                    self.sp -= count;
                    self.push(Object::array(elements))?;
                }
                Opcode::Hash => {
                    let count = read_u16(&ins[ip + 1..]) as usize;
                    self.set_ip(ip + 3);
                    let hash = self.build_hash(self.sp - count, self.sp)?;
                    self.sp -= count;
                    self.push(hash)?;
                }
                Opcode::Index => {
                    self.set_ip(ip + 1);
                    let index = self.pop();
                    let left = self.pop();
                    self.execute_index_expression(left, index)?;
                }
                Opcode::Call => {
                    let num_args = ins[ip + 1] as usize;
                    self.set_ip(ip + 2);
                    self.execute_call(num_args)?;
                }
                Opcode::ReturnValue => {
                    let return_value = self.pop();
                    if self.finish_frame(return_value)? {
                        break;
                    }
                }
                Opcode::Return => {
                    if self.finish_frame(Object::Null)? {
                        break;
                    }
                }
                Opcode::SetLocal => {
                    let index = ins[ip + 1] as usize;
                    self.set_ip(ip + 2);
                    let base_pointer = self.current_base_pointer();
                    self.stack[base_pointer + index] = self.pop();
                }
                Opcode::GetLocal => {
                    let index = ins[ip + 1] as usize;
                    self.set_ip(ip + 2);
                    let base_pointer = self.current_base_pointer();
                    let value = self.stack[base_pointer + index].clone();
                    self.push(value)?;
                }
                Opcode::GetBuiltin => {
                    let index = ins[ip + 1] as usize;
                    self.set_ip(ip + 2);
                    self.push(Object::Builtin(BUILTINS[index]))?;
                }
                Opcode::Closure => {
                    let const_index = read_u16(&ins[ip + 1..]) as usize;
                    let num_free = ins[ip + 3] as usize;
                    self.set_ip(ip + 4);
                    self.push_closure(const_index, num_free)?;
                }
                Opcode::GetFree => {
                    let index = ins[ip + 1] as usize;
                    self.set_ip(ip + 2);
                    let value = closure.free[index].clone();
                    self.push(value)?;
                }
                Opcode::CurrentClosure => {
                    self.set_ip(ip + 1);
                    self.push(Object::Closure(closure.clone()))?;
                }
            }
        }

        Ok(())
    }

    fn set_ip(&mut self, ip: usize) {
        self.frames.last_mut().expect("no running frame").ip = ip;
    }

    fn current_base_pointer(&self) -> usize {
        self.frames.last().expect("no running frame").base_pointer
    }

    fn push(&mut self, obj: Object) -> Result<(), VmError> {
        if self.sp >= STACK_SIZE {
            return Err(VmError::StackOverflow);
        }
        self.stack[self.sp] = obj;
        self.sp += 1;
        Ok(())
    }

    /// Moves `sp` without clearing the slot
    fn pop(&mut self) -> Object {
        let obj = self.stack[self.sp - 1].clone();
        self.sp -= 1;
        obj
    }

    /// Pop the current frame and leave `value` where the callee stood.
    /// Returns true when the popped frame was the outermost one.
    fn finish_frame(&mut self, value: Object) -> Result<bool, VmError> {
        let frame = self.frames.pop().expect("no frame to pop");
        if self.frames.is_empty() {
            // Top-level return: the program is done. The value goes into the
            // just-vacated slot so last_popped_stack_elem can observe it.
            self.stack[self.sp] = value;
            return Ok(true);
        }
        self.sp = frame.base_pointer - 1;
        self.push(value)?;
        Ok(false)
    }

    fn execute_binary_operation(&mut self, op: Opcode) -> Result<(), VmError> {
        let right = self.pop();
        let left = self.pop();

        match (&left, &right) {
            (Object::Integer(l), Object::Integer(r)) => {
                let result = match op {
                    Opcode::Add => l + r,
                    Opcode::Sub => l - r,
                    Opcode::Mul => l * r,
                    Opcode::Div => {
                        if *r == 0 {
                            return Err(VmError::DivisionByZero);
                        }
                        l / r
                    }
                    other => {
                        return Err(VmError::UnknownIntegerOperator(other.definition().name))
                    }
                };
                self.push(Object::Integer(result))
            }
            (Object::String(l), Object::String(r)) => match op {
                Opcode::Add => self.push(Object::string(format!("{}{}", l, r))),
                other => Err(VmError::UnknownStringOperator(other.definition().name)),
            },
            _ => Err(VmError::UnsupportedBinaryTypes(
                left.object_type(),
                right.object_type(),
            )),
        }
    }

    fn execute_comparison(&mut self, op: Opcode) -> Result<(), VmError> {
        let right = self.pop();
        let left = self.pop();

        if let (Object::Integer(l), Object::Integer(r)) = (&left, &right) {
            let result = match op {
                Opcode::Equal => l == r,
                Opcode::NotEqual => l != r,
                Opcode::GreaterThan => l > r,
                other => {
                    return Err(VmError::UnknownOperator(
                        other.definition().name,
                        left.object_type(),
                        right.object_type(),
                    ))
                }
            };
            return self.push(Object::Boolean(result));
        }

        match op {
            Opcode::Equal => self.push(Object::Boolean(left.equals(&right))),
            Opcode::NotEqual => self.push(Object::Boolean(!left.equals(&right))),
            other => Err(VmError::UnknownOperator(
                other.definition().name,
                left.object_type(),
                right.object_type(),
            )),
        }
    }

    fn build_hash(&self, start: usize, end: usize) -> Result<Object, VmError> {
        let mut pairs = HashMap::with_capacity((end - start) / 2);

        for i in (start..end).step_by(2) {
            let key = self.stack[i].clone();
            let value = self.stack[i + 1].clone();

            let hash_key = key
                .hash_key()
                .ok_or_else(|| VmError::UnusableHashKey(key.object_type()))?;
            pairs.insert(hash_key, HashPair { key, value });
        }

        Ok(Object::Hash(Gc::new(pairs)))
    }

    fn execute_index_expression(&mut self, left: Object, index: Object) -> Result<(), VmError> {
        match (&left, &index) {
            (Object::Array(elements), Object::Integer(i)) => {
                if *i < 0 || *i as usize >= elements.len() {
                    self.push(Object::Null)
                } else {
                    self.push(elements[*i as usize].clone())
                }
            }
            (Object::Hash(pairs), _) => {
                let key = index
                    .hash_key()
                    .ok_or_else(|| VmError::UnusableHashKey(index.object_type()))?;
                match pairs.get(&key) {
                    Some(pair) => self.push(pair.value.clone()),
                    None => self.push(Object::Null),
                }
            }
            _ => Err(VmError::IndexNotSupported(left.object_type())),
        }
    }

    fn execute_call(&mut self, num_args: usize) -> Result<(), VmError> {
        let callee = self.stack[self.sp - 1 - num_args].clone();
        match callee {
            Object::Closure(closure) => self.call_closure(closure, num_args),
            Object::Builtin(builtin) => {
                let args = self.stack[self.sp - num_args..self.sp].to_vec();
                let result = (builtin.func)(&args);
                self.sp = self.sp - num_args - 1;

                // A builtin-reported violation halts the machine
                if let Object::Error(message) = result {
                    return Err(VmError::Builtin(message));
                }
                self.push(result)
            }
            _ => Err(VmError::CallingNonFunction),
        }
    }

    fn call_closure(&mut self, closure: Gc<Closure>, num_args: usize) -> Result<(), VmError> {
        if num_args != closure.func.num_parameters {
            return Err(VmError::WrongArgumentCount {
                want: closure.func.num_parameters,
                got: num_args,
            });
        }
        if self.frames.len() >= MAX_FRAMES {
            return Err(VmError::FrameOverflow);
        }

        let base_pointer = self.sp - num_args;
        let new_sp = base_pointer + closure.func.num_locals;
        if new_sp > STACK_SIZE {
            return Err(VmError::StackOverflow);
        }

        self.frames.push(Frame {
            closure,
            ip: 0,
            base_pointer,
        });
        // Reserve the local slots above the arguments
        self.sp = new_sp;
        Ok(())
    }

    fn push_closure(&mut self, const_index: usize, num_free: usize) -> Result<(), VmError> {
        let Object::CompiledFunction(func) = self.constants[const_index].clone() else {
            return Err(VmError::CallingNonFunction);
        };

        let free = self.stack[self.sp - num_free..self.sp].to_vec();
        self.sp -= num_free;

        self.push(Object::Closure(Gc::new(Closure { func, free })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use crate::parser::Parser;

    fn run(input: &str) -> Result<(Object, usize), VmError> {
        let mut parser = Parser::from_source(input);
        let program = parser.parse_program();
        assert!(
            parser.errors().is_empty(),
            "parser errors: {:?}",
            parser.errors()
        );

        let mut compiler = Compiler::new();
        compiler
            .compile(&program)
            .unwrap_or_else(|err| panic!("compiler error for {:?}: {}", input, err));

        let mut vm = VM::new(compiler.bytecode());
        vm.run()?;
        Ok((vm.last_popped_stack_elem(), vm.sp))
    }

    fn run_ok(input: &str) -> Object {
        let (result, _) = run(input).unwrap_or_else(|err| {
            panic!("vm error for {:?}: {}", input, err);
        });
        result
    }

    fn assert_integer(input: &str, expected: i64) {
        match run_ok(input) {
            Object::Integer(value) => assert_eq!(value, expected, "input: {}", input),
            other => panic!("expected Integer for {:?}, got {:?}", input, other),
        }
    }

    fn assert_boolean(input: &str, expected: bool) {
        match run_ok(input) {
            Object::Boolean(value) => assert_eq!(value, expected, "input: {}", input),
            other => panic!("expected Boolean for {:?}, got {:?}", input, other),
        }
    }

    fn assert_null(input: &str) {
        match run_ok(input) {
            Object::Null => {}
            other => panic!("expected Null for {:?}, got {:?}", input, other),
        }
    }

    #[test]
    fn test_integer_arithmetic() {
        let tests = [
            ("1", 1),
            ("2", 2),
            ("1 + 2", 3),
            ("1 - 2", -1),
            ("1 * 2", 2),
            ("4 / 2", 2),
            ("50 / 2 * 2 + 10 - 5", 55),
            ("5 * (2 + 10)", 60),
            ("5 + 5 + 5 + 5 - 10", 10),
            ("2 * 2 * 2 * 2 * 2", 32),
            ("5 * 2 + 10", 20),
            ("5 + 2 * 10", 25),
            ("-5", -5),
            ("-10", -10),
            ("-50 + 100 + -50", 0),
            ("(5 + 10 * 2 + 15 / 3) * 2 + -10", 50),
        ];
        for (input, expected) in tests {
            assert_integer(input, expected);
        }
    }

    #[test]
    fn test_boolean_expressions() {
        let tests = [
            ("true", true),
            ("false", false),
            ("1 < 2", true),
            ("1 > 2", false),
            ("1 < 1", false),
            ("1 > 1", false),
            ("1 == 1", true),
            ("1 != 1", false),
            ("1 == 2", false),
            ("1 != 2", true),
            ("true == true", true),
            ("false == false", true),
            ("true == false", false),
            ("true != false", true),
            ("(1 < 2) == true", true),
            ("(1 > 2) == true", false),
            ("!true", false),
            ("!false", true),
            ("!5", false),
            ("!!true", true),
            ("!!5", true),
            ("!(if (false) { 5; })", true),
            // Strings compare by content, cross-type comparisons are unequal
            ("\"a\" == \"a\"", true),
            ("\"a\" != \"a\"", false),
            ("\"a\" == \"b\"", false),
            ("1 == true", false),
            ("1 != true", true),
        ];
        for (input, expected) in tests {
            assert_boolean(input, expected);
        }
    }

    #[test]
    fn test_conditionals() {
        assert_integer("if (true) { 10 }", 10);
        assert_integer("if (true) { 10 } else { 20 }", 10);
        assert_integer("if (false) { 10 } else { 20 }", 20);
        assert_integer("if (1) { 10 }", 10);
        assert_integer("if (1 < 2) { 10 }", 10);
        assert_integer("if (1 < 2) { 10 } else { 20 }", 10);
        assert_integer("if (1 > 2) { 10 } else { 20 }", 20);
        assert_null("if (1 > 2) { 10 }");
        assert_null("if (false) { 10 }");
        assert_integer("if ((if (false) { 10 })) { 10 } else { 20 }", 20);
    }

    #[test]
    fn test_global_let_statements() {
        assert_integer("let one = 1; one", 1);
        assert_integer("let one = 1; let two = 2; one + two", 3);
        assert_integer("let one = 1; let two = one + one; one + two", 3);
    }

    #[test]
    fn test_string_expressions() {
        assert_eq!(run_ok("\"cinder\"").to_string(), "cinder");
        assert_eq!(run_ok("\"cin\" + \"der\"").to_string(), "cinder");
        assert_eq!(
            run_ok("\"cin\" + \"der\" + \"banana\"").to_string(),
            "cinderbanana"
        );
    }

    #[test]
    fn test_array_literals() {
        assert_eq!(run_ok("[]").to_string(), "[]");
        assert_eq!(run_ok("[1, 2, 3]").to_string(), "[1, 2, 3]");
        assert_eq!(run_ok("[1 + 2, 3 * 4, 5 + 6]").to_string(), "[3, 12, 11]");
    }

    #[test]
    fn test_hash_literals() {
        assert_eq!(run_ok("{}").to_string(), "{}");
        assert_eq!(run_ok("{1: 2, 2: 3}").to_string(), "{1: 2, 2: 3}");
        assert_eq!(
            run_ok("{1 + 1: 2 * 2, 3 + 3: 4 * 4}").to_string(),
            "{2: 4, 6: 16}"
        );
    }

    #[test]
    fn test_index_expressions() {
        assert_integer("[1, 2, 3][1]", 2);
        assert_integer("[1, 2, 3][0 + 2]", 3);
        assert_integer("[[1, 1, 1]][0][0]", 1);
        assert_null("[][0]");
        assert_null("[1, 2, 3][99]");
        assert_null("[1][-1]");
        assert_integer("{1: 1, 2: 2}[1]", 1);
        assert_integer("{1: 1, 2: 2}[2]", 2);
        assert_null("{1: 1}[0]");
        assert_null("{}[0]");
    }

    #[test]
    fn test_calling_functions_without_arguments() {
        assert_integer("let fivePlusTen = fn() { 5 + 10; }; fivePlusTen();", 15);
        assert_integer(
            "let one = fn() { 1; }; let two = fn() { 2; }; one() + two()",
            3,
        );
        assert_integer(
            "let a = fn() { 1 }; let b = fn() { a() + 1 }; let c = fn() { b() + 1 }; c();",
            3,
        );
    }

    #[test]
    fn test_functions_with_return_statements() {
        assert_integer("let earlyExit = fn() { return 99; 100; }; earlyExit();", 99);
        assert_integer(
            "let earlyExit = fn() { return 99; return 100; }; earlyExit();",
            99,
        );
    }

    #[test]
    fn test_functions_without_return_value() {
        assert_null("let noReturn = fn() { }; noReturn();");
        assert_null(
            "let noReturn = fn() { }; let noReturnTwo = fn() { noReturn(); }; noReturn(); noReturnTwo();",
        );
        assert_null("let bare = fn() { return; }; bare();");
    }

    #[test]
    fn test_first_class_functions() {
        assert_integer(
            "let returnsOne = fn() { 1; };
             let returnsOneReturner = fn() { returnsOne; };
             returnsOneReturner()();",
            1,
        );
    }

    #[test]
    fn test_calling_functions_with_bindings() {
        assert_integer("let one = fn() { let one = 1; one }; one();", 1);
        assert_integer(
            "let oneAndTwo = fn() { let one = 1; let two = 2; one + two; }; oneAndTwo();",
            3,
        );
        assert_integer(
            "let oneAndTwo = fn() { let one = 1; let two = 2; one + two; };
             let threeAndFour = fn() { let three = 3; let four = 4; three + four; };
             oneAndTwo() + threeAndFour();",
            10,
        );
        assert_integer(
            "let firstFoobar = fn() { let foobar = 50; foobar; };
             let secondFoobar = fn() { let foobar = 100; foobar; };
             firstFoobar() + secondFoobar();",
            150,
        );
        assert_integer(
            "let globalSeed = 50;
             let minusOne = fn() { let num = 1; globalSeed - num; };
             let minusTwo = fn() { let num = 2; globalSeed - num; };
             minusOne() + minusTwo();",
            97,
        );
    }

    #[test]
    fn test_calling_functions_with_arguments_and_bindings() {
        assert_integer("let identity = fn(a) { a; }; identity(4);", 4);
        assert_integer("let sum = fn(a, b) { a + b; }; sum(1, 2);", 3);
        assert_integer(
            "let sum = fn(a, b) { let c = a + b; c; }; sum(1, 2);",
            3,
        );
        assert_integer(
            "let sum = fn(a, b) { let c = a + b; c; }; sum(1, 2) + sum(3, 4);",
            10,
        );
        assert_integer(
            "let sum = fn(a, b) { let c = a + b; c; };
             let outer = fn() { sum(1, 2) + sum(3, 4); };
             outer();",
            10,
        );
        assert_integer(
            "let globalNum = 10;
             let sum = fn(a, b) { let c = a + b; c + globalNum; };
             let outer = fn() { sum(1, 2) + sum(3, 4) + globalNum; };
             outer() + globalNum;",
            50,
        );
    }

    #[test]
    fn test_calling_functions_with_wrong_arguments() {
        let tests = [
            ("fn() { 1; }(1);", (0usize, 1usize)),
            ("fn(a) { a; }();", (1, 0)),
            ("fn(a, b) { a + b; }(1);", (2, 1)),
        ];
        for (input, (want, got)) in tests {
            assert_eq!(
                run(input),
                Err(VmError::WrongArgumentCount { want, got }),
                "input: {}",
                input
            );
        }
    }

    #[test]
    fn test_builtin_functions() {
        assert_integer("len(\"\")", 0);
        assert_integer("len(\"four\")", 4);
        assert_integer("len(\"hello world\")", 11);
        assert_integer("len([1, 2, 3])", 3);
        assert_integer("len([])", 0);
        assert_integer("first([1, 2, 3])", 1);
        assert_null("first([])");
        assert_integer("last([1, 2, 3])", 3);
        assert_null("last([])");
        assert_eq!(run_ok("rest([1, 2, 3])").to_string(), "[2, 3]");
        assert_null("rest([])");
        assert_eq!(run_ok("push([], 1)").to_string(), "[1]");

        assert_eq!(
            run("len(1)"),
            Err(VmError::Builtin(
                "argument to `len` not supported. got INTEGER".to_string()
            ))
        );
        assert_eq!(
            run("len(\"one\", \"two\")"),
            Err(VmError::Builtin(
                "wrong number of arguments. got 2. want 1".to_string()
            ))
        );
        assert_eq!(
            run("push(1, 1)"),
            Err(VmError::Builtin(
                "argument to `push` not supported. got INTEGER".to_string()
            ))
        );
    }

    #[test]
    fn test_closures() {
        assert_integer(
            "let newClosure = fn(a) { fn() { a; }; }; let closure = newClosure(99); closure();",
            99,
        );
        assert_integer(
            "let newAdder = fn(a, b) { fn(c) { a + b + c }; };
             let adder = newAdder(1, 2);
             adder(8);",
            11,
        );
        assert_integer(
            "let newAdder = fn(a, b) { let c = a + b; fn(d) { c + d }; };
             let adder = newAdder(1, 2);
             adder(8);",
            11,
        );
        assert_integer(
            "let newAdderOuter = fn(a, b) {
                 let c = a + b;
                 fn(d) { let e = d + c; fn(f) { e + f; }; };
             };
             let newAdderInner = newAdderOuter(1, 2);
             let adder = newAdderInner(3);
             adder(8);",
            14,
        );
        assert_integer(
            "let a = 1;
             let newAdderOuter = fn(b) { fn(c) { fn(d) { a + b + c + d }; }; };
             let newAdderInner = newAdderOuter(2);
             let adder = newAdderInner(3);
             adder(8);",
            14,
        );
        assert_integer(
            "let newClosure = fn(a, b) {
                 let one = fn() { a; };
                 let two = fn() { b; };
                 fn() { one() + two(); };
             };
             let closure = newClosure(9, 90);
             closure();",
            99,
        );
        // The canonical closure shape
        assert_integer(
            "let n = fn(x) { fn(y) { x + y } }; n(2)(3)",
            5,
        );
    }

    #[test]
    fn test_recursive_functions() {
        assert_integer(
            "let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };
             countDown(1);",
            0,
        );
        assert_integer(
            "let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };
             let wrapper = fn() { countDown(1); };
             wrapper();",
            0,
        );
        assert_integer(
            "let wrapper = fn() {
                 let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };
                 countDown(1);
             };
             wrapper();",
            0,
        );
        assert_integer(
            "let c = fn(x) { if (x == 0) { 0 } else { c(x - 1) + 1 } }; c(5)",
            5,
        );
    }

    #[test]
    fn test_fibonacci() {
        assert_integer(
            "let fibonacci = fn(x) {
                 if (x == 0) { return 0; }
                 else {
                     if (x == 1) { return 1; }
                     else { fibonacci(x - 1) + fibonacci(x - 2); }
                 }
             };
             fibonacci(15);",
            610,
        );
    }

    #[test]
    fn test_error_cases() {
        assert_eq!(
            run("5 + true;"),
            Err(VmError::UnsupportedBinaryTypes(
                ObjectType::Integer,
                ObjectType::Boolean
            ))
        );
        assert_eq!(
            run("5 + true;").unwrap_err().to_string(),
            "unsupported types for binary operation: INTEGER BOOLEAN"
        );
        assert_eq!(run("-true"), Err(VmError::UnsupportedNegation(ObjectType::Boolean)));
        assert_eq!(run("5(1)"), Err(VmError::CallingNonFunction));
        assert_eq!(
            run("\"str\" > \"str\""),
            Err(VmError::UnknownOperator(
                "OpGreaterThan",
                ObjectType::String,
                ObjectType::String
            ))
        );
        assert_eq!(
            run("{[1]: 2}"),
            Err(VmError::UnusableHashKey(ObjectType::Array))
        );
        assert_eq!(
            run("{1: 2}[fn(x) { x }]"),
            Err(VmError::UnusableHashKey(ObjectType::Closure))
        );
        assert_eq!(
            run("\"s\"[0]"),
            Err(VmError::IndexNotSupported(ObjectType::String))
        );
        assert_eq!(run("1 / 0"), Err(VmError::DivisionByZero));
    }

    #[test]
    fn test_stack_discipline() {
        // sp returns to its pre-statement value after every expression
        // statement; the popped value stays observable above the top.
        let (result, sp) = run("1; 2; 3;").unwrap();
        assert_eq!(sp, 0);
        assert!(matches!(result, Object::Integer(3)));

        let (result, sp) = run("let x = 5; x * 2;").unwrap();
        assert_eq!(sp, 0);
        assert!(matches!(result, Object::Integer(10)));
    }

    #[test]
    fn test_top_level_return_halts_cleanly() {
        let (result, _) = run("return 42;").unwrap();
        assert!(matches!(result, Object::Integer(42)));
    }
}
