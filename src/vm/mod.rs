// Quill stack-based virtual machine
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
//
// Changelog:
// 2026-02-20: Dispatch loop reads straight out of the current chunk's byte
//            stream; call mechanics, property/method resolution, and the
//            mark-sweep collector all live in this one file since the
//            opcode set is small enough not to earn a submodule split.
// 2026-02-21: Added --mode trace support: every dispatched instruction is
//            disassembled to stdout when LogLevel::Trace is active.

pub mod error;
pub mod frame;
pub mod heap;
pub mod natives;

use clap::ValueEnum;

use crate::chunk::Chunk;
use crate::debug::disassemble_instruction;
use crate::object::{
    as_header, GcBox, ObjBoundMethod, ObjClass, ObjClosure, ObjFunction, ObjInstance, ObjKind,
    ObjNative, ObjString, ObjUpvalue, UpvalueLocation,
};
use crate::opcode::OpCode;
use crate::table::Table;
use crate::value::{Obj, Value};
use error::{RuntimeError, RuntimeErrorKind, TraceFrame};
use frame::{CallFrame, FRAMES_MAX};
use heap::Heap;

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Release,
    Debug,
    Trace,
}

pub struct Vm {
    pub heap: Heap,
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    pub globals: Table,
    open_upvalues: *mut GcBox<ObjUpvalue>,
    init_string: *mut GcBox<ObjString>,
    gray: Vec<*mut crate::object::Header>,
    pub log_level: LogLevel,
    pub stress_gc: bool,
}

impl Vm {
    pub fn new(log_level: LogLevel) -> Self {
        let mut heap = Heap::new();
        let init_string = heap.intern("init");
        let mut vm = Vm {
            heap,
            stack: Vec::with_capacity(frame::STACK_MAX),
            frames: Vec::with_capacity(FRAMES_MAX),
            globals: Table::new(),
            open_upvalues: std::ptr::null_mut(),
            init_string,
            gray: Vec::new(),
            log_level,
            stress_gc: false,
        };
        vm.define_native("clock", natives::clock);
        vm.define_native("type", natives::type_of);
        vm
    }

    fn define_native(&mut self, name: &str, function: crate::object::NativeFn) {
        let native = self.heap.alloc(ObjKind::Native, ObjNative { name, function });
        self.push(Value::Obj(Obj::Native(native)));
        self.maybe_collect();
        let key = self.heap.intern(name);
        self.globals.set(key, self.peek(0));
        self.pop();
    }

    pub fn init_string(&self) -> *mut GcBox<ObjString> {
        self.init_string
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("value stack underflow")
    }

    fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    /// Top-level entry: wraps a freshly-compiled script function in a
    /// closure, seats it at stack slot zero, and runs the dispatch loop.
    pub fn interpret_function(&mut self, function: *mut GcBox<ObjFunction>) -> Result<(), RuntimeError> {
        let upvalue_count = unsafe { (*function).data.upvalue_count };
        self.push(Value::Obj(Obj::Function(function)));
        self.maybe_collect();
        self.pop();
        let closure = self.heap.alloc(
            ObjKind::Closure,
            ObjClosure {
                function,
                upvalues: Vec::with_capacity(upvalue_count),
            },
        );
        self.push(Value::Obj(Obj::Closure(closure)));
        self.frames.push(CallFrame {
            closure,
            ip: 0,
            slots_base: 0,
        });
        self.run()
    }

    fn current_chunk(&self) -> &Chunk {
        let closure = self.frames.last().unwrap().closure;
        unsafe { &(*(*closure).data.function).data.chunk }
    }

    fn read_byte(&mut self) -> u8 {
        let frame = self.frames.last_mut().unwrap();
        let chunk = unsafe { &(*(*frame.closure).data.function).data.chunk };
        let byte = chunk.code[frame.ip];
        frame.ip += 1;
        byte
    }

    fn read_short(&mut self) -> u16 {
        let hi = self.read_byte() as u16;
        let lo = self.read_byte() as u16;
        (hi << 8) | lo
    }

    fn read_constant(&mut self) -> Value {
        let idx = self.read_byte();
        self.current_chunk().constants[idx as usize]
    }

    fn read_string(&mut self) -> *mut GcBox<ObjString> {
        self.read_constant().as_string().expect("constant must be a string")
    }

    fn current_line(&self) -> u32 {
        let frame = self.frames.last().unwrap();
        self.current_chunk().line_at(frame.ip.saturating_sub(1))
    }

    fn runtime_error(&mut self, kind: RuntimeErrorKind) -> RuntimeError {
        let mut trace = Vec::new();
        for frame in self.frames.iter().rev() {
            let function = unsafe { (*frame.closure).data.function };
            let line = unsafe { (*function).data.chunk.line_at(frame.ip.saturating_sub(1)) };
            let name = unsafe { (*function).data.name }.map(|n| unsafe { (*n).data.bytes.clone() });
            trace.push(TraceFrame { line, name });
        }
        self.stack.clear();
        self.frames.clear();
        RuntimeError { kind, trace }
    }

    fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            if self.log_level == LogLevel::Trace {
                let frame = self.frames.last().unwrap();
                disassemble_instruction(self.current_chunk(), frame.ip);
            }
            let byte = self.read_byte();
            let op = OpCode::from_u8(byte).expect("corrupt bytecode: unknown opcode");
            match op {
                OpCode::Constant => {
                    let value = self.read_constant();
                    self.push(value);
                }
                OpCode::Nil => self.push(Value::Nil),
                OpCode::True => self.push(Value::Bool(true)),
                OpCode::False => self.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frames.last().unwrap().slots_base;
                    self.push(self.stack[base + slot]);
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frames.last().unwrap().slots_base;
                    self.stack[base + slot] = self.peek(0);
                }
                OpCode::GetGlobal => {
                    let key = self.read_string();
                    let name = unsafe { (*key).data.bytes.clone() };
                    match self.globals.get(key) {
                        Some(value) => self.push(value),
                        None => return Err(self.runtime_error(RuntimeErrorKind::UndefinedVariable(name))),
                    }
                }
                OpCode::DefineGlobal => {
                    let key = self.read_string();
                    let value = self.peek(0);
                    self.globals.set(key, value);
                    self.pop();
                }
                OpCode::SetGlobal => {
                    let key = self.read_string();
                    let name = unsafe { (*key).data.bytes.clone() };
                    if self.globals.set(key, self.peek(0)) {
                        self.globals.delete(key);
                        return Err(self.runtime_error(RuntimeErrorKind::UndefinedVariable(name)));
                    }
                }
                OpCode::GetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let closure = self.frames.last().unwrap().closure;
                    let upvalue = unsafe { (*closure).data.upvalues[slot] };
                    let value = match unsafe { &(*upvalue).data.location } {
                        UpvalueLocation::Open(idx) => self.stack[*idx],
                        UpvalueLocation::Closed(v) => *v,
                    };
                    self.push(value);
                }
                OpCode::SetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let closure = self.frames.last().unwrap().closure;
                    let upvalue = unsafe { (*closure).data.upvalues[slot] };
                    let value = self.peek(0);
                    match unsafe { &mut (*upvalue).data.location } {
                        UpvalueLocation::Open(idx) => self.stack[*idx] = value,
                        loc @ UpvalueLocation::Closed(_) => *loc = UpvalueLocation::Closed(value),
                    }
                }
                OpCode::GetProperty => self.op_get_property()?,
                OpCode::SetProperty => self.op_set_property()?,
                OpCode::GetSuper => self.op_get_super()?,
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a == b));
                }
                OpCode::Greater => self.op_compare(|a, b| a > b)?,
                OpCode::Less => self.op_compare(|a, b| a < b)?,
                OpCode::Add => self.op_add()?,
                OpCode::Subtract => self.op_binary_numeric(|a, b| a - b)?,
                OpCode::Multiply => self.op_binary_numeric(|a, b| a * b)?,
                OpCode::Divide => self.op_binary_numeric(|a, b| a / b)?,
                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::Bool(value.is_falsey()));
                }
                OpCode::Negate => {
                    match self.peek(0).as_number() {
                        Some(n) => {
                            self.pop();
                            self.push(Value::Number(-n));
                        }
                        None => return Err(self.runtime_error(RuntimeErrorKind::OperandMustBeANumber)),
                    }
                }
                OpCode::Print => {
                    let value = self.pop();
                    println!("{value}");
                }
                OpCode::Jump => {
                    let offset = self.read_short();
                    self.frames.last_mut().unwrap().ip += offset as usize;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_short();
                    if self.peek(0).is_falsey() {
                        self.frames.last_mut().unwrap().ip += offset as usize;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_short();
                    self.frames.last_mut().unwrap().ip -= offset as usize;
                }
                OpCode::Call => {
                    let arg_count = self.read_byte();
                    self.call_value(arg_count)?;
                }
                OpCode::Invoke => {
                    let name = self.read_string();
                    let arg_count = self.read_byte();
                    self.invoke(name, arg_count)?;
                }
                OpCode::SuperInvoke => {
                    let name = self.read_string();
                    let arg_count = self.read_byte();
                    let superclass = self.pop();
                    let Value::Obj(Obj::Class(class)) = superclass else {
                        unreachable!("compiler only emits SuperInvoke inside a subclass");
                    };
                    self.invoke_from_class(class, name, arg_count)?;
                }
                OpCode::Closure => self.op_closure(),
                OpCode::CloseUpvalue => {
                    let top = self.stack.len() - 1;
                    self.close_upvalues(top);
                    self.pop();
                }
                OpCode::Return => {
                    let result = self.pop();
                    let frame = self.frames.pop().unwrap();
                    self.close_upvalues(frame.slots_base);
                    if self.frames.is_empty() {
                        self.pop();
                        return Ok(());
                    }
                    self.stack.truncate(frame.slots_base);
                    self.push(result);
                }
                OpCode::Class => {
                    let name = self.read_string();
                    self.maybe_collect();
                    let class = self.heap.alloc(ObjKind::Class, ObjClass::new(name));
                    self.push(Value::Obj(Obj::Class(class)));
                }
                OpCode::Inherit => self.op_inherit()?,
                OpCode::Method => self.op_method(),
            }
        }
    }

    fn op_compare(&mut self, cmp: impl Fn(f64, f64) -> bool) -> Result<(), RuntimeError> {
        let b = self.peek(0).as_number();
        let a = self.peek(1).as_number();
        match (a, b) {
            (Some(a), Some(b)) => {
                self.pop();
                self.pop();
                self.push(Value::Bool(cmp(a, b)));
                Ok(())
            }
            _ => Err(self.runtime_error(RuntimeErrorKind::OperandsMustBeNumbers)),
        }
    }

    fn op_binary_numeric(&mut self, op: impl Fn(f64, f64) -> f64) -> Result<(), RuntimeError> {
        let b = self.peek(0).as_number();
        let a = self.peek(1).as_number();
        match (a, b) {
            (Some(a), Some(b)) => {
                self.pop();
                self.pop();
                self.push(Value::Number(op(a, b)));
                Ok(())
            }
            _ => Err(self.runtime_error(RuntimeErrorKind::OperandsMustBeNumbers)),
        }
    }

    fn op_add(&mut self) -> Result<(), RuntimeError> {
        match (self.peek(1), self.peek(0)) {
            (Value::Number(a), Value::Number(b)) => {
                self.pop();
                self.pop();
                self.push(Value::Number(a + b));
                Ok(())
            }
            (Value::Obj(Obj::String(_)), Value::Obj(Obj::String(_))) => {
                // Operands stay on the stack (rooted) through maybe_collect, since
                // intern below may allocate and trigger a collection.
                let (Value::Obj(Obj::String(a)), Value::Obj(Obj::String(b))) =
                    (self.peek(1), self.peek(0))
                else {
                    unreachable!()
                };
                let concatenated = format!(
                    "{}{}",
                    unsafe { &(*a).data.bytes },
                    unsafe { &(*b).data.bytes }
                );
                self.maybe_collect();
                let interned = self.heap.intern(&concatenated);
                self.pop();
                self.pop();
                self.push(Value::Obj(Obj::String(interned)));
                Ok(())
            }
            _ => Err(self.runtime_error(RuntimeErrorKind::OperandsMustBeNumbersOrStrings)),
        }
    }

    fn op_closure(&mut self) {
        let function = self.read_constant().as_function_ptr();
        let upvalue_count = unsafe { (*function).data.upvalue_count };
        let mut upvalues = Vec::with_capacity(upvalue_count);
        for _ in 0..upvalue_count {
            let is_local = self.read_byte() != 0;
            let index = self.read_byte() as usize;
            if is_local {
                let base = self.frames.last().unwrap().slots_base;
                upvalues.push(self.capture_upvalue(base + index));
            } else {
                let closure = self.frames.last().unwrap().closure;
                upvalues.push(unsafe { (*closure).data.upvalues[index] });
            }
        }
        self.maybe_collect();
        let closure = self.heap.alloc(ObjKind::Closure, ObjClosure { function, upvalues });
        self.push(Value::Obj(Obj::Closure(closure)));
    }

    fn capture_upvalue(&mut self, stack_index: usize) -> *mut GcBox<ObjUpvalue> {
        let mut prev: *mut GcBox<ObjUpvalue> = std::ptr::null_mut();
        let mut cur = self.open_upvalues;
        while !cur.is_null() {
            let idx = match unsafe { &(*cur).data.location } {
                UpvalueLocation::Open(i) => *i,
                UpvalueLocation::Closed(_) => unreachable!("open list holds only open upvalues"),
            };
            if idx == stack_index {
                return cur;
            }
            if idx < stack_index {
                break;
            }
            prev = cur;
            cur = unsafe { (*cur).data.next_open };
        }
        // stack_index names a live slot in the current frame, so it's already
        // rooted by the stack scan; safe to probe before allocating.
        self.maybe_collect();
        let created = self.heap.alloc(
            ObjKind::Upvalue,
            ObjUpvalue {
                location: UpvalueLocation::Open(stack_index),
                next_open: cur,
            },
        );
        if prev.is_null() {
            self.open_upvalues = created;
        } else {
            unsafe {
                (*prev).data.next_open = created;
            }
        }
        created
    }

    fn close_upvalues(&mut self, last: usize) {
        while !self.open_upvalues.is_null() {
            let idx = match unsafe { &(*self.open_upvalues).data.location } {
                UpvalueLocation::Open(i) => *i,
                UpvalueLocation::Closed(_) => break,
            };
            if idx < last {
                break;
            }
            let value = self.stack[idx];
            unsafe {
                let data = &mut (*self.open_upvalues).data;
                data.location = UpvalueLocation::Closed(value);
                self.open_upvalues = data.next_open;
            }
        }
    }

    fn call_value(&mut self, arg_count: u8) -> Result<(), RuntimeError> {
        let callee = self.peek(arg_count as usize);
        match callee {
            Value::Obj(Obj::BoundMethod(bound)) => {
                let data = unsafe { &(*bound).data };
                let receiver = data.receiver;
                let method = data.method;
                let slot = self.stack.len() - 1 - arg_count as usize;
                self.stack[slot] = receiver;
                self.call_closure(method, arg_count)
            }
            Value::Obj(Obj::Class(class)) => {
                self.maybe_collect();
                let instance = self.heap.alloc(ObjKind::Instance, ObjInstance::new(class));
                let slot = self.stack.len() - 1 - arg_count as usize;
                self.stack[slot] = Value::Obj(Obj::Instance(instance));
                let init = unsafe { (*class).data.methods.get(self.init_string) };
                match init {
                    Some(Value::Obj(Obj::Closure(initializer))) => self.call_closure(initializer, arg_count),
                    Some(_) => unreachable!("init is always stored as a closure"),
                    None => {
                        if arg_count != 0 {
                            Err(self.runtime_error(RuntimeErrorKind::WrongArity { expected: 0, got: arg_count }))
                        } else {
                            Ok(())
                        }
                    }
                }
            }
            Value::Obj(Obj::Closure(closure)) => self.call_closure(closure, arg_count),
            Value::Obj(Obj::Native(native)) => {
                let func = unsafe { (*native).data.function };
                let start = self.stack.len() - arg_count as usize;
                let result = {
                    let args = self.stack[start..].to_vec();
                    func(&mut self.heap, &args)
                };
                self.stack.truncate(start - 1);
                match result {
                    Ok(value) => {
                        self.push(value);
                        Ok(())
                    }
                    Err(message) => Err(self.runtime_error(RuntimeErrorKind::NativeError(message))),
                }
            }
            _ => Err(self.runtime_error(RuntimeErrorKind::NotCallable)),
        }
    }

    fn call_closure(&mut self, closure: *mut GcBox<ObjClosure>, arg_count: u8) -> Result<(), RuntimeError> {
        let function = unsafe { (*closure).data.function };
        let arity = unsafe { (*function).data.arity };
        if arg_count != arity {
            return Err(self.runtime_error(RuntimeErrorKind::WrongArity { expected: arity, got: arg_count }));
        }
        if self.frames.len() >= FRAMES_MAX {
            return Err(self.runtime_error(RuntimeErrorKind::StackOverflow));
        }
        let slots_base = self.stack.len() - arg_count as usize - 1;
        self.frames.push(CallFrame { closure, ip: 0, slots_base });
        Ok(())
    }

    fn invoke(&mut self, name: *mut GcBox<ObjString>, arg_count: u8) -> Result<(), RuntimeError> {
        let receiver = self.peek(arg_count as usize);
        let Value::Obj(Obj::Instance(instance)) = receiver else {
            return Err(self.runtime_error(RuntimeErrorKind::OnlyInstancesHaveProperties));
        };
        if let Some(value) = unsafe { (*instance).data.fields.get(name) } {
            let slot = self.stack.len() - 1 - arg_count as usize;
            self.stack[slot] = value;
            return self.call_value(arg_count);
        }
        let class = unsafe { (*instance).data.class };
        self.invoke_from_class(class, name, arg_count)
    }

    fn invoke_from_class(
        &mut self,
        class: *mut GcBox<ObjClass>,
        name: *mut GcBox<ObjString>,
        arg_count: u8,
    ) -> Result<(), RuntimeError> {
        let method = unsafe { (*class).data.methods.get(name) };
        match method {
            Some(Value::Obj(Obj::Closure(closure))) => self.call_closure(closure, arg_count),
            _ => {
                let text = unsafe { (*name).data.bytes.clone() };
                Err(self.runtime_error(RuntimeErrorKind::UndefinedProperty(text)))
            }
        }
    }

    fn bind_method(&mut self, class: *mut GcBox<ObjClass>, name: *mut GcBox<ObjString>) -> Result<(), RuntimeError> {
        match unsafe { (*class).data.methods.get(name) } {
            Some(Value::Obj(Obj::Closure(method))) => {
                let receiver = self.peek(0);
                self.maybe_collect();
                let bound = self.heap.alloc(ObjKind::BoundMethod, ObjBoundMethod { receiver, method });
                self.pop();
                self.push(Value::Obj(Obj::BoundMethod(bound)));
                Ok(())
            }
            _ => {
                let text = unsafe { (*name).data.bytes.clone() };
                Err(self.runtime_error(RuntimeErrorKind::UndefinedProperty(text)))
            }
        }
    }

    fn op_inherit(&mut self) -> Result<(), RuntimeError> {
        let superclass = self.peek(1);
        let Value::Obj(Obj::Class(super_class)) = superclass else {
            return Err(self.runtime_error(RuntimeErrorKind::SuperclassMustBeAClass));
        };
        let Value::Obj(Obj::Class(sub_class)) = self.peek(0) else {
            unreachable!("compiler only emits Inherit with a class on top");
        };
        let entries: Vec<_> = unsafe { (*super_class).data.methods.iter().collect() };
        for (key, value) in entries {
            unsafe {
                (*sub_class).data.methods.set(key, value);
            }
        }
        self.pop();
        Ok(())
    }

    fn op_method(&mut self) {
        let name = self.read_string();
        let method = self.pop();
        let Value::Obj(Obj::Class(class)) = self.peek(0) else {
            unreachable!("compiler only emits Method with a class beneath it");
        };
        unsafe {
            (*class).data.methods.set(name, method);
        }
    }

    fn op_get_property(&mut self) -> Result<(), RuntimeError> {
        let name = self.read_string();
        let Value::Obj(Obj::Instance(instance)) = self.peek(0) else {
            return Err(self.runtime_error(RuntimeErrorKind::OnlyInstancesHaveProperties));
        };
        if let Some(value) = unsafe { (*instance).data.fields.get(name) } {
            self.pop();
            self.push(value);
            return Ok(());
        }
        let class = unsafe { (*instance).data.class };
        self.bind_method(class, name)
    }

    fn op_set_property(&mut self) -> Result<(), RuntimeError> {
        let name = self.read_string();
        let Value::Obj(Obj::Instance(instance)) = self.peek(1) else {
            return Err(self.runtime_error(RuntimeErrorKind::OnlyInstancesHaveFields));
        };
        let value = self.peek(0);
        unsafe {
            (*instance).data.fields.set(name, value);
        }
        self.pop();
        self.pop();
        self.push(value);
        Ok(())
    }

    fn op_get_super(&mut self) -> Result<(), RuntimeError> {
        let name = self.read_string();
        let superclass = self.pop();
        let Value::Obj(Obj::Class(class)) = superclass else {
            unreachable!("compiler only emits GetSuper inside a subclass");
        };
        self.bind_method(class, name)
    }

    fn maybe_collect(&mut self) {
        if self.heap.should_collect(self.stress_gc) {
            self.collect_garbage();
        }
    }

    pub fn collect_garbage(&mut self) {
        self.mark_roots();
        self.trace_references();
        self.heap.strings.remove_unmarked_keys();
        self.sweep();
        self.heap.rearm();
        self.heap.collections += 1;
        if self.log_level != LogLevel::Release {
            println!(
                "-- gc complete, {} bytes allocated, next at {}",
                self.heap.bytes_allocated, self.heap.next_gc
            );
        }
    }

    fn mark_roots(&mut self) {
        for i in 0..self.stack.len() {
            let v = self.stack[i];
            self.mark_value(v);
        }
        for frame in &self.frames {
            self.mark_object(as_header(frame.closure));
        }
        let mut upvalue = self.open_upvalues;
        while !upvalue.is_null() {
            self.mark_object(as_header(upvalue));
            upvalue = unsafe { (*upvalue).data.next_open };
        }
        let globals: Vec<_> = self.globals.iter().collect();
        for (key, value) in globals {
            self.mark_object(as_header(key));
            self.mark_value(value);
        }
        for &root in &self.heap.compiler_roots.clone() {
            self.mark_object(as_header(root));
        }
        if !self.init_string.is_null() {
            self.mark_object(as_header(self.init_string));
        }
    }

    fn mark_value(&mut self, value: Value) {
        if let Value::Obj(obj) = value {
            let header = match obj {
                Obj::String(p) => as_header(p),
                Obj::Function(p) => as_header(p),
                Obj::Native(p) => as_header(p),
                Obj::Closure(p) => as_header(p),
                Obj::Class(p) => as_header(p),
                Obj::Instance(p) => as_header(p),
                Obj::BoundMethod(p) => as_header(p),
            };
            self.mark_object(header);
        }
    }

    /// Idempotent: returns without effect on an already-marked object, so
    /// cycles can't recurse forever.
    fn mark_object(&mut self, header: *mut crate::object::Header) {
        if header.is_null() || unsafe { (*header).mark } {
            return;
        }
        unsafe {
            (*header).mark = true;
        }
        self.gray.push(header);
    }

    fn trace_references(&mut self) {
        while let Some(header) = self.gray.pop() {
            self.blacken(header);
        }
    }

    fn blacken(&mut self, header: *mut crate::object::Header) {
        let kind = unsafe { (*header).kind };
        match kind {
            ObjKind::String | ObjKind::Native => {}
            ObjKind::Function => {
                let ptr = header as *mut GcBox<ObjFunction>;
                let data = unsafe { &(*ptr).data };
                if let Some(name) = data.name {
                    self.mark_object(as_header(name));
                }
                let constants: Vec<_> = data.chunk.constants.clone();
                for c in constants {
                    self.mark_value(c);
                }
            }
            ObjKind::Closure => {
                let ptr = header as *mut GcBox<ObjClosure>;
                let data = unsafe { &(*ptr).data };
                self.mark_object(as_header(data.function));
                for &uv in &data.upvalues {
                    self.mark_object(as_header(uv));
                }
            }
            ObjKind::Upvalue => {
                let ptr = header as *mut GcBox<ObjUpvalue>;
                if let UpvalueLocation::Closed(v) = unsafe { (*ptr).data.location } {
                    self.mark_value(v);
                }
            }
            ObjKind::Class => {
                let ptr = header as *mut GcBox<ObjClass>;
                let data = unsafe { &(*ptr).data };
                self.mark_object(as_header(data.name));
                let entries: Vec<_> = data.methods.iter().collect();
                for (key, value) in entries {
                    self.mark_object(as_header(key));
                    self.mark_value(value);
                }
            }
            ObjKind::Instance => {
                let ptr = header as *mut GcBox<ObjInstance>;
                let data = unsafe { &(*ptr).data };
                self.mark_object(as_header(data.class));
                let entries: Vec<_> = data.fields.iter().collect();
                for (key, value) in entries {
                    self.mark_object(as_header(key));
                    self.mark_value(value);
                }
            }
            ObjKind::BoundMethod => {
                let ptr = header as *mut GcBox<ObjBoundMethod>;
                let data = unsafe { &(*ptr).data };
                self.mark_value(data.receiver);
                self.mark_object(as_header(data.method));
            }
        }
    }

    fn sweep(&mut self) {
        let mut prev: *mut crate::object::Header = std::ptr::null_mut();
        let mut cur = self.heap.objects_head();
        while !cur.is_null() {
            if unsafe { (*cur).mark } {
                unsafe {
                    (*cur).mark = false;
                }
                prev = cur;
                cur = unsafe { (*cur).next };
            } else {
                let next = unsafe { (*cur).next };
                if prev.is_null() {
                    self.heap.set_objects_head(next);
                } else {
                    unsafe {
                        (*prev).next = next;
                    }
                }
                self.free_object(cur);
                cur = next;
            }
        }
    }

    fn free_object(&mut self, header: *mut crate::object::Header) {
        let kind = unsafe { (*header).kind };
        match kind {
            ObjKind::String => {
                let ptr = header as *mut GcBox<ObjString>;
                let size = std::mem::size_of::<GcBox<ObjString>>() + unsafe { (*ptr).data.bytes.len() };
                self.heap.free_bytes(size);
                unsafe {
                    drop(Box::from_raw(ptr));
                }
            }
            ObjKind::Function => {
                let ptr = header as *mut GcBox<ObjFunction>;
                self.heap.free_bytes(std::mem::size_of::<GcBox<ObjFunction>>());
                unsafe {
                    drop(Box::from_raw(ptr));
                }
            }
            ObjKind::Native => {
                let ptr = header as *mut GcBox<ObjNative>;
                self.heap.free_bytes(std::mem::size_of::<GcBox<ObjNative>>());
                unsafe {
                    drop(Box::from_raw(ptr));
                }
            }
            ObjKind::Closure => {
                let ptr = header as *mut GcBox<ObjClosure>;
                self.heap.free_bytes(std::mem::size_of::<GcBox<ObjClosure>>());
                unsafe {
                    drop(Box::from_raw(ptr));
                }
            }
            ObjKind::Upvalue => {
                let ptr = header as *mut GcBox<ObjUpvalue>;
                self.heap.free_bytes(std::mem::size_of::<GcBox<ObjUpvalue>>());
                unsafe {
                    drop(Box::from_raw(ptr));
                }
            }
            ObjKind::Class => {
                let ptr = header as *mut GcBox<ObjClass>;
                self.heap.free_bytes(std::mem::size_of::<GcBox<ObjClass>>());
                unsafe {
                    drop(Box::from_raw(ptr));
                }
            }
            ObjKind::Instance => {
                let ptr = header as *mut GcBox<ObjInstance>;
                self.heap.free_bytes(std::mem::size_of::<GcBox<ObjInstance>>());
                unsafe {
                    drop(Box::from_raw(ptr));
                }
            }
            ObjKind::BoundMethod => {
                let ptr = header as *mut GcBox<ObjBoundMethod>;
                self.heap.free_bytes(std::mem::size_of::<GcBox<ObjBoundMethod>>());
                unsafe {
                    drop(Box::from_raw(ptr));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjKind;

    fn header_of(s: *mut GcBox<ObjString>) -> *mut crate::object::Header {
        as_header(s)
    }

    #[test]
    fn mark_object_is_idempotent() {
        let mut vm = Vm::new(LogLevel::Release);
        let s = vm.heap.intern("hello");
        vm.mark_object(header_of(s));
        assert_eq!(vm.gray.len(), 1);
        vm.mark_object(header_of(s));
        assert_eq!(vm.gray.len(), 1, "marking an already-marked object must not re-enqueue it");
    }

    #[test]
    fn unreachable_string_is_swept_after_collect() {
        let mut vm = Vm::new(LogLevel::Release);
        vm.heap.intern("throwaway");
        let before = vm.heap.bytes_allocated;
        vm.collect_garbage();
        assert!(
            vm.heap.bytes_allocated < before,
            "nothing roots 'throwaway', so sweep must reclaim it"
        );
        let hash = crate::object::fnv1a_hash(b"throwaway");
        assert!(vm.heap.strings.find_string("throwaway", hash).is_none());
    }

    #[test]
    fn repeated_collect_with_no_mutation_frees_nothing_twice() {
        let mut vm = Vm::new(LogLevel::Release);
        vm.push(Value::Nil);
        vm.frames.push(CallFrame {
            closure: {
                let function = vm.heap.alloc(ObjKind::Function, ObjFunction::new(None));
                vm.heap.alloc(ObjKind::Closure, ObjClosure { function, upvalues: Vec::new() })
            },
            ip: 0,
            slots_base: 0,
        });
        vm.collect_garbage();
        let after_first = vm.heap.bytes_allocated;
        vm.collect_garbage();
        assert_eq!(vm.heap.bytes_allocated, after_first, "a second GC with no new garbage frees nothing");
    }

    #[test]
    fn define_native_registers_a_callable_global() {
        let vm = Vm::new(LogLevel::Release);
        assert!(vm.globals.len() >= 2, "clock and type should both be registered");
    }

    #[test]
    fn stress_gc_collects_on_every_probed_allocation() {
        let mut vm = Vm::new(LogLevel::Release);
        vm.stress_gc = true;
        let before = vm.heap.collections;
        vm.heap.intern("first");
        vm.maybe_collect();
        assert_eq!(
            vm.heap.collections,
            before + 1,
            "stress mode must collect unconditionally, not just past next_gc"
        );
        let after_one = vm.heap.collections;
        vm.maybe_collect();
        assert_eq!(
            vm.heap.collections,
            after_one + 1,
            "a second probe under stress mode collects again even though nothing grew"
        );
    }
}
