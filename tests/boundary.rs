// Compile-time boundary behaviors, driven directly through the library
// entry point rather than the CLI, since these only need the resulting
// InterpretResult and not process plumbing.

use quill::{interpret, InterpretResult, LogLevel, Vm};

fn compiles(source: &str) -> InterpretResult {
    let mut vm = Vm::new(LogLevel::Release);
    interpret(source, &mut vm)
}

#[test]
fn exactly_256_constants_succeeds() {
    let mut source = String::new();
    for i in 0..256 {
        source.push_str(&format!("print {i};\n"));
    }
    assert_eq!(compiles(&source), InterpretResult::Ok);
}

#[test]
fn a_257th_distinct_constant_is_a_compile_error() {
    let mut source = String::new();
    for i in 0..257 {
        source.push_str(&format!("print {i};\n"));
    }
    assert_eq!(compiles(&source), InterpretResult::CompileError);
}

#[test]
fn exactly_255_parameters_and_arguments_succeed() {
    let params: Vec<String> = (0..255).map(|i| format!("p{i}")).collect();
    let args: Vec<String> = (0..255).map(|i| i.to_string()).collect();
    let source = format!(
        "fun f({}) {{ return p0; }}\nprint f({});\n",
        params.join(", "),
        args.join(", ")
    );
    assert_eq!(compiles(&source), InterpretResult::Ok);
}

#[test]
fn parameter_count_256_is_a_compile_error() {
    let params: Vec<String> = (0..256).map(|i| format!("p{i}")).collect();
    let source = format!("fun f({}) {{ return p0; }}\n", params.join(", "));
    assert_eq!(compiles(&source), InterpretResult::CompileError);
}

#[test]
fn argument_count_256_is_a_compile_error() {
    let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
    let source = format!("fun f() {{}}\nf({});\n", args.join(", "));
    assert_eq!(compiles(&source), InterpretResult::CompileError);
}

// Slot zero of every frame, including the top-level script frame, is
// reserved for the implicit receiver/script marker, so a single frame
// holds 256 local slots total: the reserved slot plus 255 user-declared
// locals. Declaring a 256th user local overflows that frame.

#[test]
fn two_hundred_fifty_five_locals_in_one_scope_succeeds() {
    let mut source = String::from("{\n");
    for i in 0..255 {
        source.push_str(&format!("var v{i} = {i};\n"));
    }
    source.push_str("}\n");
    assert_eq!(compiles(&source), InterpretResult::Ok);
}

#[test]
fn a_256th_local_in_one_scope_is_a_compile_error() {
    let mut source = String::from("{\n");
    for i in 0..256 {
        source.push_str(&format!("var v{i} = {i};\n"));
    }
    source.push_str("}\n");
    assert_eq!(compiles(&source), InterpretResult::CompileError);
}

#[test]
fn empty_source_compiles_and_runs_as_a_no_op() {
    assert_eq!(compiles(""), InterpretResult::Ok);
}

#[test]
fn self_inheriting_class_is_a_compile_error() {
    assert_eq!(compiles("class A < A {}"), InterpretResult::CompileError);
}

#[test]
fn returning_a_value_from_an_initializer_is_a_compile_error() {
    assert_eq!(
        compiles("class A { init() { return 1; } }"),
        InterpretResult::CompileError
    );
}

#[test]
fn using_super_without_a_superclass_is_a_compile_error() {
    assert_eq!(
        compiles("class A { m() { super.m(); } }"),
        InterpretResult::CompileError
    );
}

#[test]
fn using_ego_outside_a_class_is_a_compile_error() {
    assert_eq!(compiles("print ego;"), InterpretResult::CompileError);
}

#[test]
fn dividing_by_a_string_is_a_runtime_error() {
    assert_eq!(compiles("print 1 / \"x\";"), InterpretResult::RuntimeError);
}

#[test]
fn calling_an_undefined_global_is_a_runtime_error() {
    assert_eq!(compiles("nope();"), InterpretResult::RuntimeError);
}
