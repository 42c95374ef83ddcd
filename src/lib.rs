// Quill: compiler + bytecode VM for a small dynamically-typed,
// class-based scripting language.
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>, Zimeng Li <zimengli@mail.nwpu.edu.cn>

pub mod chunk;
pub mod compiler;
pub mod debug;
pub mod object;
pub mod opcode;
pub mod scanner;
pub mod table;
pub mod token;
pub mod value;
pub mod vm;

pub use vm::{LogLevel, Vm};

#[derive(Debug, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

/// Compiles and runs `source` against `vm`. The only contract a host
/// (REPL, file runner) needs with the core: stdout carries `Print`
/// output, stderr carries diagnostics, and the return value maps to an
/// exit code by the caller.
pub fn interpret(source: &str, vm: &mut Vm) -> InterpretResult {
    match compiler::compile(source, vm) {
        None => InterpretResult::CompileError,
        Some(function) => match vm.interpret_function(function) {
            Ok(()) => InterpretResult::Ok,
            Err(err) => {
                eprint!("{err}");
                InterpretResult::RuntimeError
            }
        },
    }
}
