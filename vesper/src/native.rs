use std::io::{self, BufRead, Write};
use std::time::Instant;

use crate::{intern, Value};

thread_local! {
    static EPOCH: Instant = Instant::now();
}

/// Native `clock()`: seconds elapsed since the natives were first used
/// on this thread. Useful for timing scripts.
pub fn clock(_args: &[Value]) -> Value {
    Value::Number(EPOCH.with(|epoch| epoch.elapsed().as_secs_f64()))
}

/// Native `input(prompt)`: write the prompt, then block until one line
/// arrives on standard input. The trailing newline is kept.
pub fn input(args: &[Value]) -> Value {
    if let Some(prompt) = args.first() {
        print!("{}", prompt);
        let _ = io::stdout().flush();
    }
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(_) => Value::Str(intern::sym(line)),
        Err(_) => Value::Nil,
    }
}

/// Native `num(s)`: best-effort conversion to a number. Numbers pass
/// through, strings are read up to the end of their longest leading
/// numeric prefix, and everything else is 0.
pub fn num(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Number(n)) => Value::Number(*n),
        Some(Value::Str(id)) => Value::Number(leading_number(&intern::resolve(*id))),
        _ => Value::Number(0.0),
    }
}

/// The built-in natives, wired into the globals table before a script
/// runs: name, arity, implementation.
pub(crate) fn all() -> [(&'static str, u8, fn(&[Value]) -> Value); 3] {
    [("clock", 0, clock), ("input", 1, input), ("num", 1, num)]
}

fn leading_number(s: &str) -> f64 {
    let s = s.trim_start();
    let end = s.find(|c: char| !c.is_ascii()).unwrap_or(s.len());
    (1..=end)
        .rev()
        .find_map(|split| s[..split].parse::<f64>().ok())
        .unwrap_or(0.0)
}
