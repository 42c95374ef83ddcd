// Quill runtime diagnostics
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
//
// Changelog:
// 2026-02-20: RuntimeError carries structured data rather than a
//            pre-rendered string; `Display` renders the exact wire text
//            so the VM's traceback printer stays a one-liner.

use std::fmt;

#[derive(Debug, Clone)]
pub enum RuntimeErrorKind {
    OperandsMustBeNumbers,
    OperandsMustBeNumbersOrStrings,
    OperandMustBeANumber,
    UndefinedVariable(String),
    OnlyInstancesHaveProperties,
    OnlyInstancesHaveFields,
    UndefinedProperty(String),
    NotCallable,
    NativeError(String),
    WrongArity { expected: u8, got: u8 },
    StackOverflow,
    SuperclassMustBeAClass,
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeErrorKind::OperandsMustBeNumbers => write!(f, "Operands must be numbers."),
            RuntimeErrorKind::OperandsMustBeNumbersOrStrings => {
                write!(f, "Operands must be two numbers or two strings.")
            }
            RuntimeErrorKind::OperandMustBeANumber => write!(f, "Operand must be a number."),
            RuntimeErrorKind::UndefinedVariable(name) => write!(f, "Undefined variable '{name}'."),
            RuntimeErrorKind::OnlyInstancesHaveProperties => {
                write!(f, "Only instances have properties.")
            }
            RuntimeErrorKind::OnlyInstancesHaveFields => write!(f, "Only instances have fields."),
            RuntimeErrorKind::UndefinedProperty(name) => write!(f, "Undefined property '{name}'."),
            RuntimeErrorKind::NotCallable => write!(f, "Can only call functions and classes."),
            RuntimeErrorKind::NativeError(message) => write!(f, "{message}"),
            RuntimeErrorKind::WrongArity { expected, got } => {
                write!(f, "Expected {expected} arguments but got {got}.")
            }
            RuntimeErrorKind::StackOverflow => write!(f, "Stack overflow."),
            RuntimeErrorKind::SuperclassMustBeAClass => write!(f, "Superclass must be a class."),
        }
    }
}

/// One entry in a runtime traceback: the line at which a frame was
/// executing, and the frame's own display name (`script` at the top
/// level, otherwise `<name>()`).
pub struct TraceFrame {
    pub line: u32,
    pub name: Option<String>,
}

pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub trace: Vec<TraceFrame>,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind)?;
        for frame in &self.trace {
            match &frame.name {
                Some(name) => writeln!(f, "[line {}] in {}()", frame.line, name)?,
                None => writeln!(f, "[line {}] in script", frame.line)?,
            }
        }
        Ok(())
    }
}
