// Quill interactive prompt
// Created by: Zimeng Li <zimengli@mail.nwpu.edu.cn>
//
// Thin collaborator: read a line, hand it to the core `interpret` entry
// point, repeat until EOF. It never inspects `InterpretResult` beyond
// what it takes to keep the prompt alive.

use std::io::{self, Write};

use quill::{interpret, Vm};

pub fn run(vm: &mut Vm) {
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush().ok();
        line.clear();
        let bytes_read = match stdin.read_line(&mut line) {
            Ok(n) => n,
            Err(_) => break,
        };
        if bytes_read == 0 {
            println!();
            break;
        }
        interpret(line.trim_end_matches('\n'), vm);
    }
}
