// Black-box scenarios run against the built `quillc` binary: write a
// script to a temp file, run it, check stdout/stderr/exit code exactly
// as a user invoking the CLI would see them.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn run_script(name: &str, source: &str) -> std::process::Output {
    let mut path = std::env::temp_dir();
    path.push(format!("quill_e2e_{name}_{}.ql", std::process::id()));
    fs::write(&path, source).expect("write temp script");
    let output = Command::new(env!("CARGO_BIN_EXE_quillc"))
        .arg(&path)
        .output()
        .expect("run quillc");
    fs::remove_file(&path).ok();
    output
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn arithmetic_print() {
    let out = run_script("arith", "print 1 + 2;");
    assert_eq!(stdout(&out), "3\n");
    assert_eq!(out.status.code(), Some(0));
}

#[test]
fn string_concatenation() {
    let out = run_script("concat", r#"var a = "he"; var b = "llo"; print a + b;"#);
    assert_eq!(stdout(&out), "hello\n");
    assert_eq!(out.status.code(), Some(0));
}

#[test]
fn closure_capture_across_calls() {
    let source = r#"
        fun outer() {
            var x = 1;
            fun inner() {
                x = x + 1;
                print x;
            }
            return inner;
        }
        var f = outer();
        f();
        f();
        f();
    "#;
    let out = run_script("closure", source);
    assert_eq!(stdout(&out), "2\n3\n4\n");
    assert_eq!(out.status.code(), Some(0));
}

#[test]
fn method_call_with_ego() {
    let source = r#"
        class C { greet() { print "hi " + ego.name; } }
        var c = C();
        c.name = "x";
        c.greet();
    "#;
    let out = run_script("method", source);
    assert_eq!(stdout(&out), "hi x\n");
    assert_eq!(out.status.code(), Some(0));
}

#[test]
fn inheritance_with_super_and_initializer() {
    let source = r#"
        class A { init(n) { ego.n = n; } say() { print ego.n; } }
        class B < A { init(n) { super.init(n + 1); } }
        B(10).say();
    "#;
    let out = run_script("super", source);
    assert_eq!(stdout(&out), "11\n");
    assert_eq!(out.status.code(), Some(0));
}

#[test]
fn runtime_error_traceback() {
    let source = "fun bad() { return 1 + \"x\"; }\nbad();\n";
    let out = run_script("trace", source);
    let err = stderr(&out);
    assert!(err.contains("Operands must be two numbers or two strings."));
    assert!(err.contains("[line 1] in bad()"));
    assert!(err.contains("[line 2] in script"));
    assert_eq!(out.status.code(), Some(70));
}

#[test]
fn compile_error_exits_65() {
    let out = run_script("compile_error", "var = 1;");
    assert_eq!(out.status.code(), Some(65));
    assert_eq!(stdout(&out), "");
}

#[test]
fn missing_file_exits_74() {
    let output = Command::new(env!("CARGO_BIN_EXE_quillc"))
        .arg(PathBuf::from("/nonexistent/path/to/nowhere.ql"))
        .output()
        .expect("run quillc");
    assert_eq!(output.status.code(), Some(74));
}

#[test]
fn extra_arguments_exit_64_with_usage_on_stderr() {
    let output = Command::new(env!("CARGO_BIN_EXE_quillc"))
        .args(["one.ql", "two.ql"])
        .output()
        .expect("run quillc");
    assert_eq!(output.status.code(), Some(64));
    assert!(stderr(&output).to_lowercase().contains("usage"));
}

#[test]
fn mode_flag_coexists_with_a_script_path() {
    let mut path = std::env::temp_dir();
    path.push(format!("quill_e2e_mode_flag_{}.ql", std::process::id()));
    fs::write(&path, "print 1 + 2;").expect("write temp script");
    let output = Command::new(env!("CARGO_BIN_EXE_quillc"))
        .args(["--mode", "trace"])
        .arg(&path)
        .output()
        .expect("run quillc");
    fs::remove_file(&path).ok();
    let out = stdout(&output);
    assert!(out.starts_with("3\n"));
    assert!(out.contains("quillc diagnostic dump"));
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn stress_gc_flag_still_runs_a_script_to_completion() {
    let mut path = std::env::temp_dir();
    path.push(format!("quill_e2e_stress_gc_{}.ql", std::process::id()));
    fs::write(&path, "print 1 + 2;").expect("write temp script");
    let output = Command::new(env!("CARGO_BIN_EXE_quillc"))
        .arg("--stress-gc")
        .arg(&path)
        .output()
        .expect("run quillc");
    fs::remove_file(&path).ok();
    assert_eq!(stdout(&output), "3\n");
    assert_eq!(output.status.code(), Some(0));
}
