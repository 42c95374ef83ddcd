// Quill value model
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
//
// Changelog:
// 2026-02-15: Tagged union of {nil, boolean, double, heap reference};
//            heap references are themselves a small enum over every
//            object kind so dispatch on an object's shape never needs an
//            unsafe downcast outside of `object.rs`.

use std::fmt;

use crate::object::{GcBox, ObjBoundMethod, ObjClass, ObjClosure, ObjFunction, ObjInstance, ObjNative, ObjString};

#[derive(Debug, Clone, Copy)]
pub enum Obj {
    String(*mut GcBox<ObjString>),
    Function(*mut GcBox<ObjFunction>),
    Native(*mut GcBox<ObjNative>),
    Closure(*mut GcBox<ObjClosure>),
    Class(*mut GcBox<ObjClass>),
    Instance(*mut GcBox<ObjInstance>),
    BoundMethod(*mut GcBox<ObjBoundMethod>),
}

#[derive(Debug, Clone, Copy)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Obj(Obj),
}

impl Value {
    pub fn is_falsey(&self) -> bool {
        matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn as_string(&self) -> Option<*mut GcBox<ObjString>> {
        match self {
            Value::Obj(Obj::String(p)) => Some(*p),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Constants emitted by `OP_CLOSURE` are always function objects; the
    /// compiler never emits anything else there.
    pub fn as_function_ptr(&self) -> *mut GcBox<ObjFunction> {
        match self {
            Value::Obj(Obj::Function(p)) => *p,
            _ => panic!("Closure operand constant must be a function"),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Obj(Obj::String(_)) => "string",
            Value::Obj(Obj::Function(_))
            | Value::Obj(Obj::Closure(_))
            | Value::Obj(Obj::Native(_))
            | Value::Obj(Obj::BoundMethod(_)) => "function",
            Value::Obj(Obj::Class(_)) => "class",
            Value::Obj(Obj::Instance(_)) => "instance",
        }
    }
}

fn obj_ptr_eq(a: &Obj, b: &Obj) -> bool {
    match (a, b) {
        (Obj::String(a), Obj::String(b)) => std::ptr::eq(*a, *b),
        (Obj::Function(a), Obj::Function(b)) => std::ptr::eq(*a, *b),
        (Obj::Native(a), Obj::Native(b)) => std::ptr::eq(*a, *b),
        (Obj::Closure(a), Obj::Closure(b)) => std::ptr::eq(*a, *b),
        (Obj::Class(a), Obj::Class(b)) => std::ptr::eq(*a, *b),
        (Obj::Instance(a), Obj::Instance(b)) => std::ptr::eq(*a, *b),
        (Obj::BoundMethod(a), Obj::BoundMethod(b)) => std::ptr::eq(*a, *b),
        _ => false,
    }
}

impl PartialEq for Value {
    /// String equality reduces to pointer identity because every string
    /// is interned; no two live strings ever share byte contents.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Obj(a), Value::Obj(b)) => obj_ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Obj(Obj::String(p)) => {
                // SAFETY: a live Value::Obj(String) always points at a
                // heap object that has not yet been swept.
                write!(f, "{}", unsafe { &(**p).data.bytes })
            }
            Value::Obj(Obj::Function(p)) => {
                let name = unsafe { (**p).data.name };
                write_fn_name(f, name)
            }
            Value::Obj(Obj::Closure(p)) => {
                let name = unsafe { (*(**p).data.function).data.name };
                write_fn_name(f, name)
            }
            Value::Obj(Obj::Native(p)) => {
                write!(f, "<native fn {}>", unsafe { (**p).data.name })
            }
            Value::Obj(Obj::Class(p)) => {
                write!(f, "{}", unsafe { &(*(**p).data.name).data.bytes })
            }
            Value::Obj(Obj::Instance(p)) => {
                let class_name = unsafe { &(*(*(**p).data.class).data.name).data.bytes };
                write!(f, "{class_name} instance")
            }
            Value::Obj(Obj::BoundMethod(p)) => {
                let name = unsafe { (*(*(**p).data.method).data.function).data.name };
                write_fn_name(f, name)
            }
        }
    }
}

fn write_fn_name(f: &mut fmt::Formatter<'_>, name: Option<*mut GcBox<ObjString>>) -> fmt::Result {
    match name {
        Some(n) => write!(f, "<fn {}>", unsafe { &(*n).data.bytes }),
        None => write!(f, "<script>"),
    }
}
