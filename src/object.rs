// Quill heap object layout
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
//
// Changelog:
// 2026-02-17: Introduced the generic GcBox<T> header so every heap variant
//            (string, function, closure, upvalue, class, instance, bound
//            method) threads onto one intrusive list and carries one mark
//            bit, regardless of payload shape.
// 2026-02-18: Split the payload structs out from the header so the GC's
//            sweep destructor can downcast by ObjKind without generics
//            leaking into the mark/sweep code itself.

use crate::chunk::Chunk;
use crate::table::Table;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjKind {
    String,
    Function,
    Native,
    Closure,
    Upvalue,
    Class,
    Instance,
    BoundMethod,
}

/// Zero-sized marker payload used only to address a heap object through
/// its common header fields without knowing the concrete payload type.
/// `GcBox<HeaderOnly>` and `GcBox<T>` agree on the layout of every field
/// up to `data`, so a `*mut GcBox<T>` can always be reinterpreted as a
/// `*mut Header` to walk the intrusive object list or flip the mark bit.
pub struct HeaderOnly;

#[repr(C)]
pub struct GcBox<T> {
    pub kind: ObjKind,
    pub mark: bool,
    pub next: *mut Header,
    pub data: T,
}

pub type Header = GcBox<HeaderOnly>;

pub fn as_header<T>(ptr: *mut GcBox<T>) -> *mut Header {
    ptr as *mut Header
}

pub fn fnv1a_hash(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}

pub struct ObjString {
    pub bytes: String,
    pub hash: u32,
}

pub struct ObjFunction {
    pub arity: u8,
    pub upvalue_count: usize,
    pub chunk: Chunk,
    /// `None` for the synthetic top-level script function.
    pub name: Option<*mut GcBox<ObjString>>,
}

impl ObjFunction {
    pub fn new(name: Option<*mut GcBox<ObjString>>) -> Self {
        ObjFunction {
            arity: 0,
            upvalue_count: 0,
            chunk: Chunk::new(),
            name,
        }
    }
}

pub type NativeFn = fn(&mut crate::vm::heap::Heap, &[Value]) -> Result<Value, String>;

pub struct ObjNative {
    pub name: &'static str,
    pub function: NativeFn,
}

pub struct ObjClosure {
    pub function: *mut GcBox<ObjFunction>,
    pub upvalues: Vec<*mut GcBox<ObjUpvalue>>,
}

/// An upvalue is either open, in which case it aliases a live slot on the
/// VM's value stack by absolute index, or closed, in which case it owns
/// the value directly. Using an index rather than a raw pointer into the
/// stack keeps this safe under Rust's aliasing rules while still giving
/// each upvalue exactly these two states.
pub enum UpvalueLocation {
    Open(usize),
    Closed(Value),
}

pub struct ObjUpvalue {
    pub location: UpvalueLocation,
    /// Intrusive singly-linked list of every currently open upvalue,
    /// ordered by descending stack index (head = highest address).
    pub next_open: *mut GcBox<ObjUpvalue>,
}

pub struct ObjClass {
    pub name: *mut GcBox<ObjString>,
    pub methods: Table,
}

impl ObjClass {
    pub fn new(name: *mut GcBox<ObjString>) -> Self {
        ObjClass {
            name,
            methods: Table::new(),
        }
    }
}

pub struct ObjInstance {
    pub class: *mut GcBox<ObjClass>,
    pub fields: Table,
}

impl ObjInstance {
    pub fn new(class: *mut GcBox<ObjClass>) -> Self {
        ObjInstance {
            class,
            fields: Table::new(),
        }
    }
}

pub struct ObjBoundMethod {
    pub receiver: Value,
    pub method: *mut GcBox<ObjClosure>,
}
