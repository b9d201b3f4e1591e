//! These benchmarks are taken from the test suite and modified for criterion

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vesper::VM;

pub fn fib(c: &mut Criterion) {
    let src = r#"
fun fib(n) { if (n < 2) return n; return fib(n - 2) + fib(n - 1); }
fib(20);
"#;
    c.bench_function("fib_20", |b| {
        let mut vm = VM::default();
        b.iter(|| vm.interpret(black_box(src)));
    });
}

pub fn equality(c: &mut Criterion) {
    let src = r#"
var i = 0;
while (i < 10000) {
  i = i + 1;

  1; 1; 1; 2; 1; nil; 1; "str"; 1; true;
  nil; nil; nil; 1; nil; "str"; nil; true;
  true; true; true; 1; true; false; true; "str"; true; nil;
  "str"; "str"; "str"; "stru"; "str"; 1; "str"; nil; "str"; true;
}

i = 0;
while (i < 10000) {
  i = i + 1;

  1 == 1; 1 == 2; 1 == nil; 1 == "str"; 1 == true;
  nil == nil; nil == 1; nil == "str"; nil == true;
  true == true; true == 1; true == false; true == "str"; true == nil;
  "str" == "str"; "str" == "stru"; "str" == 1; "str" == nil; "str" == true;
}
"#;
    c.bench_function("equality", |b| {
        let mut vm = VM::default();
        b.iter(|| vm.interpret(black_box(src)));
    });
}

pub fn closures(c: &mut Criterion) {
    let src = r#"
fun counter() {
  var n = 0;
  fun tick() { n = n + 1; return n; }
  return tick;
}
var tick = counter();
var i = 0;
while (i < 10000) {
  tick(); tick(); tick(); tick(); tick();
  tick(); tick(); tick(); tick(); tick();
  i = i + 1;
}
"#;
    c.bench_function("closures", |b| {
        let mut vm = VM::default();
        b.iter(|| vm.interpret(black_box(src)));
    });
}

pub fn loops(c: &mut Criterion) {
    let src = r#"
var total = 0;
for (var i = 0; i < 10000; i = i + 1) {
  total = total + i % 7 + i \ 3;
}
"#;
    c.bench_function("loops", |b| {
        let mut vm = VM::default();
        b.iter(|| vm.interpret(black_box(src)));
    });
}

pub fn strings(c: &mut Criterion) {
    let src = r#"
var i = 0;
while (i < 1000) {
  var s = "con" + "cat" + "enation";
  s == "concatenation";
  i = i + 1;
}
"#;
    c.bench_function("strings", |b| {
        let mut vm = VM::default();
        b.iter(|| vm.interpret(black_box(src)));
    });
}

criterion_group!(basics, closures, equality, fib, loops, strings);
criterion_main!(basics);
