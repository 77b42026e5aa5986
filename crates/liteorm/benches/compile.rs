use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use liteorm::qb::{ClauseSet, Conjunction, Dialect, OrderDirection, Statement, compile};

/// SELECT with `n` predicates on distinct columns plus `n` on the same column,
/// so suffix disambiguation is exercised.
fn build_clauses(n: usize) -> ClauseSet {
    let mut clauses = ClauseSet::new();
    clauses.set_table("users u").unwrap();
    clauses.set_projection(&["u.id", "u.name"]).unwrap();
    for i in 0..n {
        clauses
            .predicates_mut()
            .add_condition(&format!("col{i}"), "=", i as i64, Conjunction::And)
            .unwrap();
        clauses
            .predicates_mut()
            .add_condition("status", "=", "active", Conjunction::Or)
            .unwrap();
    }
    clauses.set_order("u.id", OrderDirection::Desc).unwrap();
    clauses.set_limit(50);
    clauses
}

fn bench_compile(c: &mut Criterion) {
    for dialect in [Dialect::Named, Dialect::MySql, Dialect::Postgres] {
        let mut group = c.benchmark_group(format!("compile/select/{dialect:?}"));
        for n in [1, 5, 10, 50] {
            let clauses = build_clauses(n);
            group.bench_with_input(BenchmarkId::from_parameter(n), &clauses, |b, clauses| {
                b.iter(|| black_box(compile(clauses, Statement::Select, dialect)));
            });
        }
        group.finish();
    }
}

fn bench_build_and_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/build_and_compile");
    for n in [1, 5, 10, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let clauses = build_clauses(n);
                black_box(compile(&clauses, Statement::Select, Dialect::Named))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_build_and_compile);
criterion_main!(benches);
