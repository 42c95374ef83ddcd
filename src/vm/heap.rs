// Quill heap and garbage collector bookkeeping
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
//
// Changelog:
// 2026-02-20: Heap owns the intrusive object list, the intern set, and the
//            allocation counters; it does not know how to trace a root —
//            that needs the value stack and call frames, which live on the
//            VM. Mark/sweep itself is driven from vm/mod.rs.

use std::mem::size_of;

use crate::object::{as_header, fnv1a_hash, GcBox, Header, ObjFunction, ObjKind, ObjString};
use crate::table::Table;

const GROW_FACTOR: usize = 2;
const INITIAL_NEXT_GC: usize = 1024 * 1024;

pub struct Heap {
    objects: *mut Header,
    pub strings: Table,
    pub bytes_allocated: usize,
    pub next_gc: usize,
    /// Functions belonging to compilers still on the parser's stack; the
    /// VM marks these as roots so a closure under construction can't be
    /// collected out from under the compiler emitting its bytecode.
    pub compiler_roots: Vec<*mut GcBox<ObjFunction>>,
    pub collections: usize,
    pub high_water: usize,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            objects: std::ptr::null_mut(),
            strings: Table::new(),
            bytes_allocated: 0,
            next_gc: INITIAL_NEXT_GC,
            compiler_roots: Vec::new(),
            collections: 0,
            high_water: 0,
        }
    }

    pub fn should_collect(&self, stress: bool) -> bool {
        stress || self.bytes_allocated > self.next_gc
    }

    pub fn rearm(&mut self) {
        self.next_gc = self.bytes_allocated * GROW_FACTOR;
    }

    fn link<T>(&mut self, boxed: Box<GcBox<T>>, size: usize) -> *mut GcBox<T> {
        let ptr = Box::into_raw(boxed);
        unsafe {
            (*as_header(ptr)).next = self.objects;
        }
        self.objects = as_header(ptr);
        self.bytes_allocated += size;
        self.high_water = self.high_water.max(self.bytes_allocated);
        ptr
    }

    pub fn alloc<T>(&mut self, kind: ObjKind, data: T) -> *mut GcBox<T> {
        let size = size_of::<GcBox<T>>();
        let boxed = Box::new(GcBox {
            kind,
            mark: false,
            next: std::ptr::null_mut(),
            data,
        });
        self.link(boxed, size)
    }

    /// `copy`/`take` both funnel here: a cache hit reuses the interned
    /// string and allocates nothing.
    pub fn intern(&mut self, text: &str) -> *mut GcBox<ObjString> {
        let hash = fnv1a_hash(text.as_bytes());
        if let Some(existing) = self.strings.find_string(text, hash) {
            return existing;
        }
        let size = size_of::<GcBox<ObjString>>() + text.len();
        let boxed = Box::new(GcBox {
            kind: ObjKind::String,
            mark: false,
            next: std::ptr::null_mut(),
            data: ObjString {
                bytes: text.to_string(),
                hash,
            },
        });
        let ptr = self.link(boxed, size);
        self.strings.set(ptr, crate::value::Value::Nil);
        ptr
    }

    pub fn objects_head(&self) -> *mut Header {
        self.objects
    }

    pub fn set_objects_head(&mut self, head: *mut Header) {
        self.objects = head;
    }

    pub fn free_bytes(&mut self, size: usize) {
        self.bytes_allocated = self.bytes_allocated.saturating_sub(size);
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}
