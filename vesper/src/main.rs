use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::process;

use vesper::{Error, VM};

fn main() {
    let args: Vec<String> = env::args().collect();
    match args.len() {
        1 => repl(),
        2 => run_file(&args[1]),
        _ => {
            eprintln!("Usage: vesper [path]");
            process::exit(64);
        }
    }
}

fn repl() {
    println!("vesper {}", env!("CARGO_PKG_VERSION"));
    println!("press ctrl-d to exit");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut vm = VM::default();

    'repl: loop {
        let mut source = match read_line(&mut lines, ">> ") {
            None => break,
            Some(line) => line,
        };
        // a trailing '{' keeps the reader going until braces balance
        let mut depth = i32::from(source.trim_end().ends_with('{'));
        while depth > 0 {
            let line = match read_line(&mut lines, ".. ") {
                None => break 'repl,
                Some(line) => line,
            };
            if line.trim_end().ends_with('{') {
                depth += 1;
            }
            if line.trim_end().ends_with('}') {
                depth -= 1;
            }
            source.push('\n');
            source.push_str(&line);
        }
        // diagnostics were already printed, the prompt just continues
        let _ = vm.interpret(&source);
    }
}

fn read_line<I>(lines: &mut I, prompt: &str) -> Option<String>
where
    I: Iterator<Item = io::Result<String>>,
{
    print!("{}", prompt);
    let _ = io::stdout().flush();
    match lines.next() {
        Some(Ok(line)) => Some(line),
        _ => None,
    }
}

fn run_file(path: &str) {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(_) => {
            eprintln!("Could not open file \"{}\".", path);
            process::exit(74);
        }
    };
    let mut vm = VM::default();
    match vm.interpret(&source) {
        Ok(()) => {}
        Err(Error::Compile) => process::exit(65),
        Err(Error::Runtime(_)) => process::exit(70),
    }
}
