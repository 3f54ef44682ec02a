use criterion::{criterion_group, criterion_main, Criterion};

use silt::expr::NodeIds;
use silt::interpreter::Interpreter;
use silt::parser::Parser;
use silt::resolver::Resolver;
use silt::scanner::Scanner;
use silt::stmt::Stmt;
use silt::token::Token;

const FIB: &str = "\
fun fib(n) {
  if (n < 2) return n;
  return fib(n - 2) + fib(n - 1);
}
var answer = fib(15);
";

fn prepare(source: &str, interpreter: &mut Interpreter) -> Vec<Stmt> {
    let tokens: Vec<Token> = Scanner::new(source.as_bytes().to_vec())
        .filter_map(Result::ok)
        .collect();

    let mut parser = Parser::new(tokens, NodeIds::new());
    let statements = parser.parse();

    let mut resolver = Resolver::new(interpreter);
    resolver
        .resolve(&statements)
        .expect("benchmark program must resolve");

    statements
}

fn recursive_fib(c: &mut Criterion) {
    let mut interpreter = Interpreter::new();
    let statements = prepare(FIB, &mut interpreter);

    c.bench_function("fib 15", |b| {
        b.iter(|| {
            interpreter
                .interpret(&statements)
                .expect("benchmark program must run");
        })
    });
}

criterion_group!(benches, recursive_fib);
criterion_main!(benches);
