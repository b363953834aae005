//! Benchmarks for a single resolution pass and for match cloning.

use std::hint::black_box;

use card_battle::core::{Match, MatchBuilder, Participant, ParticipantId};
use card_battle::effects::{Condition, Formula, Op, TargetSpec, Value};
use card_battle::stack::{BoundOp, Interpreter};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn table(seats: usize) -> Match {
    let mut builder = MatchBuilder::new("bench", 42);
    for i in 1..=seats {
        builder = builder.participant(Participant::new(format!("p{i}"), 1_000, 100, 10));
    }
    builder.build()
}

fn script() -> Vec<Op> {
    vec![
        Op::ForEach {
            target: TargetSpec::AllEnemies,
            loop_var: "e".into(),
            actions: vec![
                Op::Damage {
                    amount: Value::Formula(Formula::parse("d6 + 2")),
                    target: TargetSpec::from("$e"),
                    attribute: None,
                },
                Op::If {
                    cond: Condition::parse("caster.hp > 500"),
                    then: vec![Op::Shield { amount: Value::Literal(2), target: TargetSpec::Caster }],
                    otherwise: vec![],
                },
            ],
        },
        Op::Random {
            chance: 0.5,
            then: vec![Op::Heal { amount: Value::Literal(3), target: TargetSpec::Caster, stat: Default::default() }],
            otherwise: vec![],
        },
    ]
}

/// Benchmark one pass over a branching card at several table sizes.
fn benchmark_resolve(c: &mut Criterion) {
    let interpreter = Interpreter::default();
    let caster = ParticipantId::new("p1");
    let ops = script();

    let mut group = c.benchmark_group("Resolve");
    for seats in [2, 4, 8] {
        let base = table(seats);
        group.bench_with_input(BenchmarkId::new("seats", seats), &seats, |b, _| {
            b.iter(|| {
                let mut state = base.clone();
                state.pending.enqueue_batch(BoundOp::bind_all(&ops, &caster, None, "bench"));
                black_box(interpreter.resolve(&mut state).ok());
            });
        });
    }
    group.finish();
}

/// Benchmark the copy every action starts from.
fn benchmark_clone(c: &mut Criterion) {
    let state = table(8);
    c.bench_function("match_clone", |b| b.iter(|| black_box(state.clone())));
}

criterion_group!(benches, benchmark_resolve, benchmark_clone);
criterion_main!(benches);
