// Quill single-pass compiler
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
//
// Changelog:
// 2026-02-22: Scanner, Pratt expression parser, and recursive-descent
//            statement parser fused into one left-to-right walk that
//            emits straight into the current function's chunk. The
//            enclosing-compiler chain is reformulated as a `Vec` stack
//            (`frames`) rather than an owned linked list: resolving an
//            upvalue walks the stack by index instead of recursing through
//            borrowed references, which Rust's aliasing rules don't allow
//            for a structure that needs simultaneous mutable access to an
//            inner and an outer frame.

use crate::chunk::Chunk;
use crate::object::{GcBox, ObjFunction, ObjKind};
use crate::opcode::OpCode;
use crate::scanner::Scanner;
use crate::token::{Token, TokenType};
use crate::value::{Obj, Value};
use crate::vm::Vm;

const MAX_LOCALS: usize = 256;
const MAX_UPVALUES: usize = 256;
const MAX_ARGS: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    fn next(self) -> Precedence {
        use Precedence::*;
        match self {
            None => Assignment,
            Assignment => Or,
            Or => And,
            And => Equality,
            Equality => Comparison,
            Comparison => Term,
            Term => Factor,
            Factor => Unary,
            Unary => Call,
            Call => Primary,
            Primary => Primary,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FunctionType {
    Script,
    Function,
    Method,
    Initializer,
}

struct Local<'src> {
    name: Token<'src>,
    depth: i32,
    is_captured: bool,
}

#[derive(Clone, Copy)]
struct UpvalueDesc {
    index: u8,
    is_local: bool,
}

struct FunctionFrame<'src> {
    function: *mut GcBox<ObjFunction>,
    fn_type: FunctionType,
    locals: Vec<Local<'src>>,
    upvalues: Vec<UpvalueDesc>,
    scope_depth: i32,
}

struct ClassFrame {
    has_superclass: bool,
}

pub struct Compiler<'src> {
    scanner: Scanner<'src>,
    current: Token<'src>,
    previous: Token<'src>,
    had_error: bool,
    panic_mode: bool,
    vm: &'src mut Vm,
    frames: Vec<FunctionFrame<'src>>,
    classes: Vec<ClassFrame>,
}

/// Drives the fused scan/parse/codegen walk over `source` and returns the
/// top-level script function, or `None` if any compile error occurred.
pub fn compile(source: &str, vm: &mut Vm) -> Option<*mut GcBox<ObjFunction>> {
    let mut compiler = Compiler::new(source, vm);
    compiler.advance();
    while !compiler.check(TokenType::Eof) {
        compiler.declaration();
    }
    compiler.consume(TokenType::Eof, "Expect end of expression.");
    let had_error = compiler.had_error;
    let function = compiler.end_compiler();
    if had_error {
        None
    } else {
        Some(function)
    }
}

impl<'src> Compiler<'src> {
    fn new(source: &'src str, vm: &'src mut Vm) -> Self {
        let scanner = Scanner::new(source);
        let function = vm.heap.alloc(ObjKind::Function, ObjFunction::new(None));
        vm.heap.compiler_roots.push(function);
        let top = FunctionFrame {
            function,
            fn_type: FunctionType::Script,
            locals: vec![Local {
                name: Token::synthetic(""),
                depth: 0,
                is_captured: false,
            }],
            upvalues: Vec::new(),
            scope_depth: 0,
        };
        Compiler {
            scanner,
            current: Token::synthetic(""),
            previous: Token::synthetic(""),
            had_error: false,
            panic_mode: false,
            vm,
            frames: vec![top],
            classes: Vec::new(),
        }
    }

    // ---- token stream -------------------------------------------------

    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.next_token();
            if self.current.kind != TokenType::Error {
                break;
            }
            let msg = self.current.lexeme.to_string();
            self.error_at_current(&msg);
        }
    }

    fn consume(&mut self, kind: TokenType, message: &str) {
        if self.current.kind == kind {
            self.advance();
        } else {
            self.error_at_current(message);
        }
    }

    fn check(&self, kind: TokenType) -> bool {
        self.current.kind == kind
    }

    fn match_token(&mut self, kind: TokenType) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    fn error_at_current(&mut self, message: &str) {
        let token = self.current;
        self.error_at(token, message);
    }

    fn error(&mut self, message: &str) {
        let token = self.previous;
        self.error_at(token, message);
    }

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        eprint!("[line {}] Error", token.line);
        if token.kind == TokenType::Eof {
            eprint!(" at end");
        } else if token.kind != TokenType::Error {
            eprint!(" at '{}'", token.lexeme);
        }
        eprintln!(": {message}");
        self.had_error = true;
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.kind != TokenType::Eof {
            if self.previous.kind == TokenType::Semicolon {
                return;
            }
            match self.current.kind {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => self.advance(),
            }
        }
    }

    // ---- emission -------------------------------------------------------

    fn frame(&self) -> &FunctionFrame<'src> {
        self.frames.last().unwrap()
    }

    fn frame_mut(&mut self) -> &mut FunctionFrame<'src> {
        self.frames.last_mut().unwrap()
    }

    fn current_chunk(&mut self) -> &mut Chunk {
        let function = self.frame().function;
        unsafe { &mut (*function).data.chunk }
    }

    fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.current_chunk().write_byte(byte, line);
    }

    fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op.as_u8());
    }

    fn emit_bytes(&mut self, op: OpCode, byte: u8) {
        self.emit_op(op);
        self.emit_byte(byte);
    }

    fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(OpCode::Loop);
        let offset = self.current_chunk().code.len() - loop_start + 2;
        if offset > u16::MAX as usize {
            self.error("Loop body too large.");
        }
        self.emit_byte(((offset >> 8) & 0xff) as u8);
        self.emit_byte((offset & 0xff) as u8);
    }

    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        self.emit_byte(0xff);
        self.emit_byte(0xff);
        self.current_chunk().code.len() - 2
    }

    fn patch_jump(&mut self, offset: usize) {
        let jump = self.current_chunk().code.len() - offset - 2;
        if jump > u16::MAX as usize {
            self.error("Too much code to jump over.");
        }
        self.current_chunk().code[offset] = ((jump >> 8) & 0xff) as u8;
        self.current_chunk().code[offset + 1] = (jump & 0xff) as u8;
    }

    fn emit_return(&mut self) {
        if self.frame().fn_type == FunctionType::Initializer {
            self.emit_bytes(OpCode::GetLocal, 0);
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.emit_op(OpCode::Return);
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        match self.current_chunk().add_constant(value) {
            Some(idx) => idx,
            None => {
                self.error("Too many constants in one chunk.");
                0
            }
        }
    }

    fn emit_constant(&mut self, value: Value) {
        let idx = self.make_constant(value);
        self.emit_bytes(OpCode::Constant, idx);
    }

    fn end_compiler(&mut self) -> *mut GcBox<ObjFunction> {
        self.emit_return();
        let frame = self.frames.pop().unwrap();
        self.vm.heap.compiler_roots.pop();
        frame.function
    }

    fn begin_scope(&mut self) {
        self.frame_mut().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.frame_mut().scope_depth -= 1;
        let depth = self.frame().scope_depth;
        loop {
            let top = match self.frame().locals.last() {
                Some(local) if local.depth > depth => local.is_captured,
                _ => break,
            };
            if top {
                self.emit_op(OpCode::CloseUpvalue);
            } else {
                self.emit_op(OpCode::Pop);
            }
            self.frame_mut().locals.pop();
        }
    }

    // ---- variables --------------------------------------------------

    fn identifier_constant(&mut self, name: Token<'src>) -> u8 {
        let interned = self.vm.heap.intern(name.lexeme);
        self.make_constant(Value::Obj(Obj::String(interned)))
    }

    fn identifiers_equal(a: &Token<'src>, b: &Token<'src>) -> bool {
        a.lexeme == b.lexeme
    }

    fn resolve_local(&mut self, frame_idx: usize, name: Token<'src>) -> Option<u8> {
        let mut found: Option<(u8, bool)> = None;
        for (i, local) in self.frames[frame_idx].locals.iter().enumerate().rev() {
            if Self::identifiers_equal(&local.name, &name) {
                found = Some((i as u8, local.depth == -1));
                break;
            }
        }
        match found {
            Some((slot, uninitialized)) => {
                if uninitialized {
                    self.error("Can't read local variable in its own initializer.");
                }
                Some(slot)
            }
            None => None,
        }
    }

    fn resolve_upvalue(&mut self, frame_idx: usize, name: Token<'src>) -> Option<u8> {
        if frame_idx == 0 {
            return None;
        }
        let outer = frame_idx - 1;
        if let Some(local) = self.resolve_local(outer, name) {
            self.frames[outer].locals[local as usize].is_captured = true;
            return Some(self.add_upvalue(frame_idx, local, true));
        }
        if let Some(upvalue) = self.resolve_upvalue(outer, name) {
            return Some(self.add_upvalue(frame_idx, upvalue, false));
        }
        None
    }

    fn add_upvalue(&mut self, frame_idx: usize, index: u8, is_local: bool) -> u8 {
        let existing = self.frames[frame_idx]
            .upvalues
            .iter()
            .position(|uv| uv.index == index && uv.is_local == is_local);
        if let Some(i) = existing {
            return i as u8;
        }
        if self.frames[frame_idx].upvalues.len() >= MAX_UPVALUES {
            self.error("Too many closure variables in function.");
            return 0;
        }
        self.frames[frame_idx].upvalues.push(UpvalueDesc { index, is_local });
        let count = self.frames[frame_idx].upvalues.len();
        unsafe {
            (*self.frames[frame_idx].function).data.upvalue_count = count;
        }
        (count - 1) as u8
    }

    fn add_local(&mut self, name: Token<'src>) {
        if self.frame().locals.len() >= MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.frame_mut().locals.push(Local {
            name,
            depth: -1,
            is_captured: false,
        });
    }

    fn declare_variable(&mut self) {
        if self.frame().scope_depth == 0 {
            return;
        }
        let name = self.previous;
        let depth = self.frame().scope_depth;
        let mut duplicate = false;
        for local in self.frame().locals.iter().rev() {
            if local.depth != -1 && local.depth < depth {
                break;
            }
            if Self::identifiers_equal(&local.name, &name) {
                duplicate = true;
                break;
            }
        }
        if duplicate {
            self.error("Already a variable with this name in this scope.");
        }
        self.add_local(name);
    }

    fn parse_variable(&mut self, message: &str) -> u8 {
        self.consume(TokenType::Identifier, message);
        self.declare_variable();
        if self.frame().scope_depth > 0 {
            return 0;
        }
        let name = self.previous;
        self.identifier_constant(name)
    }

    fn mark_initialized(&mut self) {
        if self.frame().scope_depth == 0 {
            return;
        }
        let depth = self.frame().scope_depth;
        if let Some(local) = self.frame_mut().locals.last_mut() {
            local.depth = depth;
        }
    }

    fn define_variable(&mut self, global: u8) {
        if self.frame().scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_bytes(OpCode::DefineGlobal, global);
    }

    fn argument_list(&mut self) -> u8 {
        let mut count: usize = 0;
        if !self.check(TokenType::RightParen) {
            loop {
                self.expression();
                if count == MAX_ARGS {
                    self.error("Can't have more than 255 arguments.");
                }
                count += 1;
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after arguments.");
        count as u8
    }

    fn named_variable(&mut self, name: Token<'src>, can_assign: bool) {
        let frame_idx = self.frames.len() - 1;
        let (get_op, set_op, arg) = if let Some(slot) = self.resolve_local(frame_idx, name) {
            (OpCode::GetLocal, OpCode::SetLocal, slot)
        } else if let Some(slot) = self.resolve_upvalue(frame_idx, name) {
            (OpCode::GetUpvalue, OpCode::SetUpvalue, slot)
        } else {
            let idx = self.identifier_constant(name);
            (OpCode::GetGlobal, OpCode::SetGlobal, idx)
        };

        if can_assign && self.match_token(TokenType::Equal) {
            self.expression();
            self.emit_bytes(set_op, arg);
        } else {
            self.emit_bytes(get_op, arg);
        }
    }

    // ---- statements -----------------------------------------------------

    fn declaration(&mut self) {
        if self.match_token(TokenType::Class) {
            self.class_declaration();
        } else if self.match_token(TokenType::Fun) {
            self.fun_declaration();
        } else if self.match_token(TokenType::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
    }

    fn statement(&mut self) {
        if self.match_token(TokenType::Print) {
            self.print_statement();
        } else if self.match_token(TokenType::If) {
            self.if_statement();
        } else if self.match_token(TokenType::Return) {
            self.return_statement();
        } else if self.match_token(TokenType::While) {
            self.while_statement();
        } else if self.match_token(TokenType::For) {
            self.for_statement();
        } else if self.match_token(TokenType::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenType::Semicolon, "Expect ';' after value.");
        self.emit_op(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenType::Semicolon, "Expect ';' after expression.");
        self.emit_op(OpCode::Pop);
    }

    fn block(&mut self) {
        while !self.check(TokenType::RightBrace) && !self.check(TokenType::Eof) {
            self.declaration();
        }
        self.consume(TokenType::RightBrace, "Expect '}' after block.");
    }

    fn if_statement(&mut self) {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenType::RightParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();
        let else_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(then_jump);
        self.emit_op(OpCode::Pop);
        if self.match_token(TokenType::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.current_chunk().code.len();
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(TokenType::RightParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_op(OpCode::Pop);
    }

    fn for_statement(&mut self) {
        self.begin_scope();
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.");
        if self.match_token(TokenType::Semicolon) {
            // no initializer
        } else if self.match_token(TokenType::Var) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.current_chunk().code.len();
        let mut exit_jump: Option<usize> = None;
        if !self.match_token(TokenType::Semicolon) {
            self.expression();
            self.consume(TokenType::Semicolon, "Expect ';' after loop condition.");
            exit_jump = Some(self.emit_jump(OpCode::JumpIfFalse));
            self.emit_op(OpCode::Pop);
        }

        if !self.match_token(TokenType::RightParen) {
            let body_jump = self.emit_jump(OpCode::Jump);
            let increment_start = self.current_chunk().code.len();
            self.expression();
            self.emit_op(OpCode::Pop);
            self.consume(TokenType::RightParen, "Expect ')' after for clauses.");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        }

        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.emit_op(OpCode::Pop);
        }
        self.end_scope();
    }

    fn return_statement(&mut self) {
        if self.frame().fn_type == FunctionType::Script {
            self.error("Can't return from top-level code.");
        }
        if self.match_token(TokenType::Semicolon) {
            self.emit_return();
        } else {
            if self.frame().fn_type == FunctionType::Initializer {
                self.error("Can't return a value from an initializer.");
            }
            self.expression();
            self.consume(TokenType::Semicolon, "Expect ';' after return value.");
            self.emit_op(OpCode::Return);
        }
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("Expect variable name.");
        if self.match_token(TokenType::Equal) {
            self.expression();
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.consume(TokenType::Semicolon, "Expect ';' after variable declaration.");
        self.define_variable(global);
    }

    fn fun_declaration(&mut self) {
        let global = self.parse_variable("Expect function name.");
        self.mark_initialized();
        self.function(FunctionType::Function);
        self.define_variable(global);
    }

    fn function(&mut self, fn_type: FunctionType) {
        let name_token = self.previous;
        let name = self.vm.heap.intern(name_token.lexeme);
        let function = self.vm.heap.alloc(ObjKind::Function, ObjFunction::new(Some(name)));
        self.vm.heap.compiler_roots.push(function);

        let slot0_name = if fn_type == FunctionType::Method || fn_type == FunctionType::Initializer {
            "ego"
        } else {
            ""
        };
        self.frames.push(FunctionFrame {
            function,
            fn_type,
            locals: vec![Local {
                name: Token::synthetic(slot0_name),
                depth: 0,
                is_captured: false,
            }],
            upvalues: Vec::new(),
            scope_depth: 0,
        });

        self.begin_scope();
        self.consume(TokenType::LeftParen, "Expect '(' after function name.");
        if !self.check(TokenType::RightParen) {
            loop {
                unsafe {
                    (*self.frame().function).data.arity += 1;
                    if (*self.frame().function).data.arity as usize > MAX_ARGS {
                        self.error_at_current("Can't have more than 255 parameters.");
                    }
                }
                let constant = self.parse_variable("Expect parameter name.");
                self.define_variable(constant);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.");
        self.consume(TokenType::LeftBrace, "Expect '{' before function body.");
        self.block();

        let upvalues: Vec<UpvalueDesc> = self.frame().upvalues.clone();
        let compiled = self.end_compiler();
        self.vm.heap.compiler_roots.pop();

        let idx = self.make_constant(Value::Obj(Obj::Function(compiled)));
        self.emit_bytes(OpCode::Closure, idx);
        for desc in upvalues {
            self.emit_byte(desc.is_local as u8);
            self.emit_byte(desc.index);
        }
    }

    // ---- classes ----------------------------------------------------

    fn class_declaration(&mut self) {
        self.consume(TokenType::Identifier, "Expect class name.");
        let name_token = self.previous;
        let name_constant = self.identifier_constant(name_token);
        self.declare_variable();

        self.emit_bytes(OpCode::Class, name_constant);
        self.define_variable(name_constant);

        self.classes.push(ClassFrame { has_superclass: false });

        if self.match_token(TokenType::Less) {
            self.consume(TokenType::Identifier, "Expect superclass name.");
            let super_name = self.previous;
            self.named_variable(super_name, false);

            if Self::identifiers_equal(&super_name, &name_token) {
                self.error("A class can't inherit from itself.");
            }

            self.begin_scope();
            self.add_local(Token::synthetic("super"));
            self.define_variable(0);

            self.named_variable(name_token, false);
            self.emit_op(OpCode::Inherit);
            self.classes.last_mut().unwrap().has_superclass = true;
        }

        self.named_variable(name_token, false);
        self.consume(TokenType::LeftBrace, "Expect '{' before class body.");
        while !self.check(TokenType::RightBrace) && !self.check(TokenType::Eof) {
            self.method();
        }
        self.consume(TokenType::RightBrace, "Expect '}' after class body.");
        self.emit_op(OpCode::Pop);

        if self.classes.last().unwrap().has_superclass {
            self.end_scope();
        }
        self.classes.pop();
    }

    fn method(&mut self) {
        self.consume(TokenType::Identifier, "Expect method name.");
        let name_token = self.previous;
        let constant = self.identifier_constant(name_token);
        let fn_type = if name_token.lexeme == "init" {
            FunctionType::Initializer
        } else {
            FunctionType::Method
        };
        self.function(fn_type);
        self.emit_bytes(OpCode::Method, constant);
    }

    // ---- expressions ----------------------------------------------------

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let can_assign = precedence <= Precedence::Assignment;
        match self.prefix_rule(self.previous.kind) {
            Some(rule) => rule(self, can_assign),
            None => {
                self.error("Expect expression.");
                return;
            }
        }

        while precedence <= Self::rule_precedence(self.current.kind) {
            self.advance();
            if let Some(rule) = self.infix_rule(self.previous.kind) {
                rule(self, can_assign);
            }
        }

        if can_assign && self.match_token(TokenType::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    fn rule_precedence(kind: TokenType) -> Precedence {
        use TokenType::*;
        match kind {
            Minus | Plus => Precedence::Term,
            Slash | Star => Precedence::Factor,
            BangEqual | EqualEqual => Precedence::Equality,
            Greater | GreaterEqual | Less | LessEqual => Precedence::Comparison,
            And => Precedence::And,
            Or => Precedence::Or,
            LeftParen | Dot => Precedence::Call,
            _ => Precedence::None,
        }
    }

    fn prefix_rule(&self, kind: TokenType) -> Option<fn(&mut Compiler<'src>, bool)> {
        use TokenType::*;
        match kind {
            LeftParen => Some(Compiler::grouping),
            Minus | Bang => Some(Compiler::unary),
            Number => Some(Compiler::number),
            StringLit => Some(Compiler::string),
            False | True | Nil => Some(Compiler::literal),
            Identifier => Some(Compiler::variable),
            Super => Some(Compiler::super_),
            Ego => Some(Compiler::ego),
            _ => None,
        }
    }

    fn infix_rule(&self, kind: TokenType) -> Option<fn(&mut Compiler<'src>, bool)> {
        use TokenType::*;
        match kind {
            Minus | Plus | Slash | Star | BangEqual | EqualEqual | Greater | GreaterEqual | Less
            | LessEqual => Some(Compiler::binary),
            And => Some(Compiler::and_),
            Or => Some(Compiler::or_),
            LeftParen => Some(Compiler::call),
            Dot => Some(Compiler::dot),
            _ => None,
        }
    }

    fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenType::RightParen, "Expect ')' after expression.");
    }

    fn unary(&mut self, _can_assign: bool) {
        let kind = self.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match kind {
            TokenType::Minus => self.emit_op(OpCode::Negate),
            TokenType::Bang => self.emit_op(OpCode::Not),
            _ => unreachable!(),
        }
    }

    fn binary(&mut self, _can_assign: bool) {
        let kind = self.previous.kind;
        let precedence = Self::rule_precedence(kind);
        self.parse_precedence(precedence.next());
        match kind {
            TokenType::BangEqual => {
                self.emit_op(OpCode::Equal);
                self.emit_op(OpCode::Not);
            }
            TokenType::EqualEqual => self.emit_op(OpCode::Equal),
            TokenType::Greater => self.emit_op(OpCode::Greater),
            TokenType::GreaterEqual => {
                self.emit_op(OpCode::Less);
                self.emit_op(OpCode::Not);
            }
            TokenType::Less => self.emit_op(OpCode::Less),
            TokenType::LessEqual => {
                self.emit_op(OpCode::Greater);
                self.emit_op(OpCode::Not);
            }
            TokenType::Plus => self.emit_op(OpCode::Add),
            TokenType::Minus => self.emit_op(OpCode::Subtract),
            TokenType::Star => self.emit_op(OpCode::Multiply),
            TokenType::Slash => self.emit_op(OpCode::Divide),
            _ => unreachable!(),
        }
    }

    fn call(&mut self, _can_assign: bool) {
        let arg_count = self.argument_list();
        self.emit_bytes(OpCode::Call, arg_count);
    }

    fn dot(&mut self, can_assign: bool) {
        self.consume(TokenType::Identifier, "Expect property name after '.'.");
        let name = self.previous;
        let constant = self.identifier_constant(name);

        if can_assign && self.match_token(TokenType::Equal) {
            self.expression();
            self.emit_bytes(OpCode::SetProperty, constant);
        } else if self.match_token(TokenType::LeftParen) {
            let arg_count = self.argument_list();
            self.emit_bytes(OpCode::Invoke, constant);
            self.emit_byte(arg_count);
        } else {
            self.emit_bytes(OpCode::GetProperty, constant);
        }
    }

    fn and_(&mut self, _can_assign: bool) {
        let end_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    fn or_(&mut self, _can_assign: bool) {
        let else_jump = self.emit_jump(OpCode::JumpIfFalse);
        let end_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(else_jump);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn number(&mut self, _can_assign: bool) {
        let value: f64 = self.previous.lexeme.parse().expect("scanner only produces valid numbers");
        self.emit_constant(Value::Number(value));
    }

    fn string(&mut self, _can_assign: bool) {
        let lexeme = self.previous.lexeme;
        let text = &lexeme[1..lexeme.len() - 1];
        let interned = self.vm.heap.intern(text);
        self.emit_constant(Value::Obj(Obj::String(interned)));
    }

    fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenType::False => self.emit_op(OpCode::False),
            TokenType::True => self.emit_op(OpCode::True),
            TokenType::Nil => self.emit_op(OpCode::Nil),
            _ => unreachable!(),
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous;
        self.named_variable(name, can_assign);
    }

    fn ego(&mut self, _can_assign: bool) {
        if self.classes.is_empty() {
            self.error("Can't use 'ego' outside of a class.");
            return;
        }
        let name = self.previous;
        self.named_variable(name, false);
    }

    fn super_(&mut self, _can_assign: bool) {
        if self.classes.is_empty() {
            self.error("Can't use 'super' outside of a class.");
        } else if !self.classes.last().unwrap().has_superclass {
            self.error("Can't use 'super' in a class with no superclass.");
        }

        self.consume(TokenType::Dot, "Expect '.' after 'super'.");
        self.consume(TokenType::Identifier, "Expect superclass method name.");
        let method_name = self.previous;
        let constant = self.identifier_constant(method_name);

        self.named_variable(Token::synthetic("ego"), false);
        if self.match_token(TokenType::LeftParen) {
            let arg_count = self.argument_list();
            self.named_variable(Token::synthetic("super"), false);
            self.emit_bytes(OpCode::SuperInvoke, constant);
            self.emit_byte(arg_count);
        } else {
            self.named_variable(Token::synthetic("super"), false);
            self.emit_bytes(OpCode::GetSuper, constant);
        }
    }
}
