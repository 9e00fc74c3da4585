//! Single-pass bytecode compiler
//!
//! Walks the expanded AST once, emitting into the current compilation scope.
//! Function literals push a fresh scope (instruction buffer + enclosed symbol
//! table); leaving a scope freezes its buffer into a `CompiledFunction`
//! constant. Jumps are emitted with placeholder operands and back-patched
//! once the target offset is known, the same placeholder-then-patch scheme
//! the reference VM uses for its `Test`/`Jump` instructions.
//!
//! The only reordering transformation: `a < b` compiles as `b a OpGreaterThan`.

use crate::ast::{Expression, Program, Statement};
use crate::builtins::BUILTINS;
use crate::code::{make, Instructions, Opcode};
use crate::object::{CompiledFunction, Object};
use crate::symbol_table::{shared, Symbol, SymbolScope, SymbolTable, SymbolTableRef};
use gc::Gc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("undefined variable {0}")]
    UndefinedVariable(String),
    #[error("unknown operator {0}")]
    UnknownOperator(String),
    #[error("malformed AST: {0}")]
    MalformedAst(String),
}

/// The compiler's output: a flat instruction stream plus its constant pool
#[derive(Debug, Clone)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Object>,
}

#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

/// Per-function emission state; the last two emitted opcodes feed the
/// peephole fixups (removing a trailing pop, rewriting it into a return)
#[derive(Default)]
struct CompilationScope {
    instructions: Instructions,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

pub struct Compiler {
    constants: Vec<Object>,
    symbol_table: SymbolTableRef,
    scopes: Vec<CompilationScope>,
}

impl Compiler {
    pub fn new() -> Self {
        let mut table = SymbolTable::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            table.define_builtin(index, builtin.name);
        }

        Compiler {
            constants: Vec::new(),
            symbol_table: shared(table),
            scopes: vec![CompilationScope::default()],
        }
    }

    /// Continue a session: reuse a symbol table and constant pool from an
    /// earlier compile so definitions stay visible (REPL)
    pub fn new_with_state(symbol_table: SymbolTableRef, constants: Vec<Object>) -> Self {
        Compiler {
            constants,
            symbol_table,
            scopes: vec![CompilationScope::default()],
        }
    }

    pub fn compile(&mut self, program: &Program) -> Result<(), CompileError> {
        for stmt in &program.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.scopes[self.scopes.len() - 1].instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    fn compile_statement(&mut self, stmt: &Statement) -> Result<(), CompileError> {
        match stmt {
            Statement::Expression(s) => {
                self.compile_expression(&s.expression)?;
                self.emit(Opcode::Pop, &[]);
            }
            Statement::Let(s) => {
                // Function values get their name first so the body can refer
                // to itself; everything else is compiled before the name
                // exists.
                if matches!(s.value, Expression::Function(_)) {
                    let symbol = self.symbol_table.borrow_mut().define(&s.name.value);
                    self.compile_expression(&s.value)?;
                    self.emit_set(&symbol);
                } else {
                    self.compile_expression(&s.value)?;
                    let symbol = self.symbol_table.borrow_mut().define(&s.name.value);
                    self.emit_set(&symbol);
                }
            }
            Statement::Return(s) => {
                match &s.return_value {
                    Some(value) => {
                        self.compile_expression(value)?;
                        self.emit(Opcode::ReturnValue, &[]);
                    }
                    None => {
                        self.emit(Opcode::Return, &[]);
                    }
                };
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &crate::ast::BlockStatement) -> Result<(), CompileError> {
        for stmt in &block.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    fn compile_expression(&mut self, expr: &Expression) -> Result<(), CompileError> {
        match expr {
            Expression::IntegerLiteral(lit) => {
                let constant = self.add_constant(Object::Integer(lit.value));
                self.emit(Opcode::Constant, &[constant]);
            }
            Expression::StringLiteral(lit) => {
                let constant = self.add_constant(Object::string(lit.value.clone()));
                self.emit(Opcode::Constant, &[constant]);
            }
            Expression::Boolean(lit) => {
                if lit.value {
                    self.emit(Opcode::True, &[]);
                } else {
                    self.emit(Opcode::False, &[]);
                }
            }
            Expression::Prefix(e) => {
                self.compile_expression(&e.right)?;
                match e.operator.as_str() {
                    "!" => self.emit(Opcode::Bang, &[]),
                    "-" => self.emit(Opcode::Minus, &[]),
                    op => return Err(CompileError::UnknownOperator(op.to_string())),
                };
            }
            Expression::Infix(e) => {
                // `<` has no opcode: swap the operands and compare greater
                if e.operator == "<" {
                    self.compile_expression(&e.right)?;
                    self.compile_expression(&e.left)?;
                    self.emit(Opcode::GreaterThan, &[]);
                    return Ok(());
                }

                self.compile_expression(&e.left)?;
                self.compile_expression(&e.right)?;
                match e.operator.as_str() {
                    "+" => self.emit(Opcode::Add, &[]),
                    "-" => self.emit(Opcode::Sub, &[]),
                    "*" => self.emit(Opcode::Mul, &[]),
                    "/" => self.emit(Opcode::Div, &[]),
                    ">" => self.emit(Opcode::GreaterThan, &[]),
                    "==" => self.emit(Opcode::Equal, &[]),
                    "!=" => self.emit(Opcode::NotEqual, &[]),
                    op => return Err(CompileError::UnknownOperator(op.to_string())),
                };
            }
            Expression::If(e) => {
                self.compile_expression(&e.condition)?;

                // Placeholder operand, patched once the else target is known
                let jump_not_truthy_pos = self.emit(Opcode::JumpNotTruthy, &[9999]);

                self.compile_block(&e.consequence)?;
                // An if is an expression: the consequence must leave its value
                if self.last_instruction_is(Opcode::Pop) {
                    self.remove_last_instruction();
                }

                let jump_pos = self.emit(Opcode::Jump, &[9999]);

                let after_consequence = self.current_instructions().len();
                self.change_operand(jump_not_truthy_pos, after_consequence);

                match &e.alternative {
                    Some(alternative) => {
                        self.compile_block(alternative)?;
                        if self.last_instruction_is(Opcode::Pop) {
                            self.remove_last_instruction();
                        }
                    }
                    None => {
                        self.emit(Opcode::Null, &[]);
                    }
                }

                let after_alternative = self.current_instructions().len();
                self.change_operand(jump_pos, after_alternative);
            }
            Expression::Identifier(ident) => {
                let symbol = self
                    .symbol_table
                    .borrow_mut()
                    .resolve(&ident.value)
                    .ok_or_else(|| CompileError::UndefinedVariable(ident.value.clone()))?;
                self.load_symbol(&symbol);
            }
            Expression::Function(func) => {
                self.enter_scope();

                if !func.name.is_empty() {
                    self.symbol_table
                        .borrow_mut()
                        .define_function_name(&func.name);
                }
                for param in &func.parameters {
                    self.symbol_table.borrow_mut().define(&param.value);
                }

                self.compile_block(&func.body)?;

                if self.last_instruction_is(Opcode::Pop) {
                    self.replace_last_pop_with_return();
                }
                if !self.last_instruction_is(Opcode::ReturnValue) {
                    self.emit(Opcode::Return, &[]);
                }

                let (free_symbols, num_locals) = {
                    let table = self.symbol_table.borrow();
                    (table.free_symbols.clone(), table.num_definitions)
                };
                let instructions = self.leave_scope();

                // Load each free variable in the enclosing scope; OpClosure
                // pops them into the closure's free vector.
                for free in &free_symbols {
                    self.load_symbol(free);
                }

                let compiled = Object::CompiledFunction(Gc::new(CompiledFunction {
                    instructions,
                    num_locals,
                    num_parameters: func.parameters.len(),
                }));
                let constant = self.add_constant(compiled);
                self.emit(Opcode::Closure, &[constant, free_symbols.len()]);
            }
            Expression::Call(call) => {
                self.compile_expression(&call.function)?;
                for arg in &call.arguments {
                    self.compile_expression(arg)?;
                }
                self.emit(Opcode::Call, &[call.arguments.len()]);
            }
            Expression::Array(array) => {
                for element in &array.elements {
                    self.compile_expression(element)?;
                }
                self.emit(Opcode::Array, &[array.elements.len()]);
            }
            Expression::Hash(hash) => {
                // Deterministic constant order regardless of source order
                let mut pairs: Vec<_> = hash.pairs.iter().collect();
                pairs.sort_by_key(|(key, _)| key.to_string());

                for (key, value) in &pairs {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Opcode::Hash, &[pairs.len() * 2]);
            }
            Expression::Index(e) => {
                self.compile_expression(&e.left)?;
                self.compile_expression(&e.index)?;
                self.emit(Opcode::Index, &[]);
            }
            Expression::Macro(_) => {
                // Macro literals must be consumed by macro expansion first.
                return Err(CompileError::MalformedAst(
                    "macro literal reached the compiler".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn emit_set(&mut self, symbol: &Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::SetGlobal, &[symbol.index]),
            _ => self.emit(Opcode::SetLocal, &[symbol.index]),
        };
    }

    fn load_symbol(&mut self, symbol: &Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(Opcode::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(Opcode::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(Opcode::GetFree, &[symbol.index]),
            SymbolScope::Function => self.emit(Opcode::CurrentClosure, &[]),
        };
    }

    fn add_constant(&mut self, obj: Object) -> usize {
        self.constants.push(obj);
        self.constants.len() - 1
    }

    fn emit(&mut self, op: Opcode, operands: &[usize]) -> usize {
        let instruction = make(op, operands);
        let position = self.add_instruction(instruction);
        self.set_last_instruction(op, position);
        position
    }

    fn add_instruction(&mut self, instruction: Vec<u8>) -> usize {
        let scope = self.current_scope_mut();
        let position = scope.instructions.len();
        scope.instructions.0.extend(instruction);
        position
    }

    fn set_last_instruction(&mut self, opcode: Opcode, position: usize) {
        let scope = self.current_scope_mut();
        scope.previous_instruction = scope.last_instruction;
        scope.last_instruction = Some(EmittedInstruction { opcode, position });
    }

    fn last_instruction_is(&self, opcode: Opcode) -> bool {
        matches!(
            self.current_scope().last_instruction,
            Some(last) if last.opcode == opcode
        )
    }

    fn remove_last_instruction(&mut self) {
        let scope = self.current_scope_mut();
        if let Some(last) = scope.last_instruction {
            scope.instructions.0.truncate(last.position);
            scope.last_instruction = scope.previous_instruction;
            scope.previous_instruction = None;
        }
    }

    /// Overwrite an instruction in place; only valid for same-width rewrites
    fn replace_instruction(&mut self, position: usize, new_instruction: Vec<u8>) {
        let instructions = &mut self.current_scope_mut().instructions.0;
        instructions[position..position + new_instruction.len()]
            .copy_from_slice(&new_instruction);
    }

    /// Back-patch the operand of a previously emitted jump
    fn change_operand(&mut self, position: usize, operand: usize) {
        let opcode = Opcode::from_byte(self.current_instructions().0[position])
            .expect("patching an unemitted opcode");
        self.replace_instruction(position, make(opcode, &[operand]));
    }

    fn replace_last_pop_with_return(&mut self) {
        let position = self
            .current_scope()
            .last_instruction
            .expect("no instruction to replace")
            .position;
        self.replace_instruction(position, make(Opcode::ReturnValue, &[]));
        if let Some(last) = &mut self.current_scope_mut().last_instruction {
            last.opcode = Opcode::ReturnValue;
        }
    }

    fn current_instructions(&self) -> &Instructions {
        &self.current_scope().instructions
    }

    fn current_scope(&self) -> &CompilationScope {
        self.scopes.last().expect("compiler scope stack is empty")
    }

    fn current_scope_mut(&mut self) -> &mut CompilationScope {
        self.scopes.last_mut().expect("compiler scope stack is empty")
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        let enclosed = SymbolTable::new_enclosed(self.symbol_table.clone());
        self.symbol_table = shared(enclosed);
    }

    fn leave_scope(&mut self) -> Instructions {
        let scope = self.scopes.pop().expect("leaving the outermost scope");
        let outer = self
            .symbol_table
            .borrow()
            .outer
            .clone()
            .expect("scope table without an outer table");
        self.symbol_table = outer;
        scope.instructions
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
