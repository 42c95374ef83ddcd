// Quill built-in host functions
// Created by: Yuyang Feng <mu_yunaaaa@mail.nwpu.edu.cn>
//
// Changelog:
// 2026-02-20: `clock` is the one native every host needs for timing test
//            scripts. `type` is added so scripts can introspect values
//            without a debugger attached. Both take the heap so they can
//            intern result strings without threading a whole VM through.

use std::sync::OnceLock;
use std::time::Instant;

use crate::value::{Obj, Value};
use crate::vm::heap::Heap;

static START: OnceLock<Instant> = OnceLock::new();

pub fn clock(_heap: &mut Heap, _args: &[Value]) -> Result<Value, String> {
    let start = START.get_or_init(Instant::now);
    Ok(Value::Number(start.elapsed().as_secs_f64()))
}

pub fn type_of(heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    let value = args.first().ok_or("type() takes exactly one argument.")?;
    let name = heap.intern(value.type_name());
    Ok(Value::Obj(Obj::String(name)))
}
