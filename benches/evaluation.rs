//! Function Evaluation Benchmarks
//!
//! Measures the cost of walking Function graphs over batches of points.
//!
//! ## Benchmark Structure
//!
//! ### 1. Array Evaluation (`benchmark_array_evaluation`)
//! Builder-constructed expressions of increasing depth evaluated over batches of
//! 1k and 10k points, sequentially and with `evaluate_par`.
//!
//! ### 2. Branching (`benchmark_branching`)
//! Dispatch cost of `map` on integer keys and of `conditional` on boolean clauses,
//! with and without a `SafeMaths` wrapper.
//!
//! ### 3. Parsed Expressions (`benchmark_parsed`)
//! Parsing expression strings into Functions, and evaluating the parsed result
//! against an equivalent hand-built graph.
//!
//! ## Usage
//!
//! Run with: `cargo bench --bench evaluation`

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use fngraph::prelude::*;
use ndarray::Array2;

fn coords(n: usize, width: usize) -> Array2<f64> {
    Array2::from_shape_fn((n, width), |(i, j)| (i as f64 + 1.0) * 0.001 + j as f64)
}

fn benchmark_array_evaluation(c: &mut Criterion) {
    let x = input().at(0);
    let y = input().at(1);
    let test_cases = [
        ("linear", 2.2 * &x + 1.1),
        ("polynomial", x.pow(3.0) + 2.0 * x.pow(2.0) - 5.0 * &x + 1.0),
        (
            "transcendental",
            x.sin() * y.exp() + math::sqrt(&x * &x + &y * &y).unwrap(),
        ),
        ("vector", (input() * 2.0).dot(input())),
    ];

    let mut group = c.benchmark_group("Array Evaluation");

    for n in [1_000, 10_000] {
        let data = coords(n, 2);
        for (name, function) in &test_cases {
            group.bench_with_input(
                BenchmarkId::new(format!("Sequential/{name}"), n),
                &data,
                |b, data| b.iter(|| black_box(function.evaluate(black_box(data)))),
            );
            group.bench_with_input(
                BenchmarkId::new(format!("Parallel/{name}"), n),
                &data,
                |b, data| {
                    b.iter(|| black_box(Query::new(function).evaluate_par(black_box(data))))
                },
            );
        }
    }

    group.finish();
}

fn benchmark_branching(c: &mut Criterion) {
    let key = input().at(0);
    let x = input().at(1);
    let table = branching::map(
        &key,
        (0..16).map(|k| (k, &x * f64::from(k))),
        Some(Function::from(0.0)),
    )
    .unwrap();
    let step = branching::conditional([
        (x.less(0.25), Function::from(1.0)),
        (x.less(0.75), x.sin()),
        (Function::from(true), 1.0 / &x),
    ])
    .unwrap();
    let guarded = step.safe_maths();

    let keys: Vec<Vec<i64>> = (0..10_000).map(|i| vec![i % 20, 3]).collect();
    let points = coords(10_000, 2);

    let mut group = c.benchmark_group("Branching");
    group.bench_function("map", |b| {
        b.iter(|| black_box(table.evaluate(black_box(keys.clone()))))
    });
    group.bench_function("conditional", |b| {
        b.iter(|| black_box(step.evaluate(black_box(&points))))
    });
    group.bench_function("conditional/safe", |b| {
        b.iter(|| black_box(guarded.evaluate(black_box(&points))))
    });
    group.finish();
}

fn benchmark_parsed(c: &mut Criterion) {
    let expressions = [
        "a + 1.1",
        "2.2 * a + 1.1",
        "a^2 / (2 * 3.14159 / b) - a / 2.2",
        "(a^3 + 2*a^2 - 5*a + 1) / (b^2 + 3*b + 2)",
        "sqrt(1 + 2.2*a + 3.14159/b/3.3)",
    ];

    let mut group = c.benchmark_group("Parsed Expressions");

    for (i, expr) in expressions.iter().enumerate() {
        group.bench_with_input(BenchmarkId::new("Parse", format!("expr_{i}")), expr, |b, expr| {
            b.iter(|| black_box(Function::parse(expr)))
        });
    }

    let data = coords(10_000, 2);
    let a = input().at(0);
    let b = input().at(1);
    let built = (a.pow(3.0) + 2.0 * a.pow(2.0) - 5.0 * &a + 1.0)
        / (b.pow(2.0) + 3.0 * &b + 2.0);
    let parsed = match Function::parse(expressions[3]) {
        Ok(f) => f,
        Err(e) => panic!("benchmark expression failed to parse: {e}"),
    };
    group.bench_function("Evaluate/built", |bench| {
        bench.iter(|| black_box(built.evaluate(black_box(&data))))
    });
    group.bench_function("Evaluate/parsed", |bench| {
        bench.iter(|| black_box(parsed.evaluate(black_box(&data))))
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_array_evaluation,
    benchmark_branching,
    benchmark_parsed
);
criterion_main!(benches);
