mod repl;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use quill::{interpret, InterpretResult, LogLevel, Vm};

#[derive(Parser)]
#[command(name = "quillc")]
#[command(version = "1.0")]
#[command(about = "A compiler and virtual machine for a small dynamically-typed, class-based scripting language", long_about = None)]
struct Cli {
    /// Script to run; omit to start the interactive prompt.
    script: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = LogLevel::Release)]
    mode: LogLevel,

    /// Collect garbage before every allocation instead of waiting for the heap threshold.
    #[arg(long)]
    stress_gc: bool,
}

struct TraceGuard {
    mode: LogLevel,
    vm_ptr: *const Vm,
}

impl Drop for TraceGuard {
    fn drop(&mut self) {
        if self.mode == LogLevel::Trace {
            let vm = unsafe { &*self.vm_ptr };
            println!("\n{:^70}", "-- quillc diagnostic dump --");
            println!(
                "gc runs: {} | live bytes: {} | high water: {}",
                vm.heap.collections, vm.heap.bytes_allocated, vm.heap.high_water
            );
            println!("{:^70}\n", "-- end of trace data --");
        }
    }
}

/// Zero positional args starts the interactive prompt; one runs a file and
/// maps the result to an exit code (0 / 65 / 70); file I/O errors exit 74;
/// any other usage error (extra positionals, unknown flags) exits 64.
fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            eprint!("{err}");
            return if err.exit_code() == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(64)
            };
        }
    };

    let mut vm = Vm::new(cli.mode);
    vm.stress_gc = cli.stress_gc;
    let _guard = TraceGuard { mode: cli.mode, vm_ptr: &vm as *const Vm };

    match cli.script {
        None => {
            repl::run(&mut vm);
            ExitCode::SUCCESS
        }
        Some(path) => run_file(&path, &mut vm),
    }
}

fn run_file(path: &Path, vm: &mut Vm) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read file \"{}\": {err}", path.display());
            return ExitCode::from(74);
        }
    };

    match interpret(&source, vm) {
        InterpretResult::Ok => ExitCode::SUCCESS,
        InterpretResult::CompileError => ExitCode::from(65),
        InterpretResult::RuntimeError => ExitCode::from(70),
    }
}
