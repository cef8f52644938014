//! End-to-end scenarios over the iterator algebra, built from in-memory
//! streams. Coordinates are in the engine's 1-based half-open space.

use sigtools::apply::{Apply, ApplyMode};
use sigtools::multiplexer::Multiplexer;
use sigtools::ops::unary::Coverage;
use sigtools::reducers::{Reduce, ReduceOp};
use sigtools::signal::{Cursor, MemoryIter};
use sigtools::stats::{Integrator, StatKind};
use sigtools::Interval;

fn stream(data: &[(&str, u64, u64, f64)]) -> Cursor {
    let ivs = data
        .iter()
        .map(|(c, s, f, v)| Interval::new(*c, *s, *f, *v))
        .collect();
    Cursor::from_iter(MemoryIter::new(ivs)).unwrap()
}

fn overlapping_stream(data: &[(&str, u64, u64, f64)]) -> Cursor {
    let ivs = data
        .iter()
        .map(|(c, s, f, v)| Interval::new(*c, *s, *f, *v))
        .collect();
    Cursor::from_iter(MemoryIter::new(ivs).with_overlaps(true)).unwrap()
}

fn reduce(op: ReduceOp, strict: bool, inputs: Vec<Cursor>) -> Vec<Interval> {
    let multi = Multiplexer::new(inputs, strict).unwrap();
    Cursor::from_iter(Reduce::new(multi, op))
        .unwrap()
        .drain()
        .unwrap()
}

#[test]
fn e1_sum_of_two_tracks() {
    let out = reduce(
        ReduceOp::Sum,
        false,
        vec![stream(&[("chr1", 1, 5, 2.0)]), stream(&[("chr1", 3, 7, 3.0)])],
    );
    assert_eq!(out, vec![
        Interval::new("chr1", 1, 3, 2.0),
        Interval::new("chr1", 3, 5, 5.0),
        Interval::new("chr1", 5, 7, 3.0),
    ]);
}

#[test]
fn e2_product_with_zero_defaults() {
    let inputs = || {
        vec![
            stream(&[("chr1", 1, 10, 4.0)]),
            stream(&[("chr1", 5, 8, 0.5)]),
        ]
    };

    let loose = reduce(ReduceOp::Product, false, inputs());
    assert_eq!(loose, vec![
        Interval::new("chr1", 1, 5, 0.0),
        Interval::new("chr1", 5, 8, 2.0),
        Interval::new("chr1", 8, 10, 0.0),
    ]);

    let strict = reduce(ReduceOp::Product, true, inputs());
    assert_eq!(strict, vec![Interval::new("chr1", 5, 8, 2.0)]);
}

#[test]
fn e3_mean_of_uneven_tracks() {
    let out = reduce(
        ReduceOp::Mean,
        false,
        vec![
            stream(&[("chr1", 1, 3, 2.0), ("chr1", 3, 5, 4.0)]),
            stream(&[("chr1", 1, 5, 8.0)]),
        ],
    );
    assert_eq!(out, vec![
        Interval::new("chr1", 1, 3, 5.0),
        Interval::new("chr1", 3, 5, 6.0),
    ]);
}

#[test]
fn e4_auc() {
    let mut integrator = Integrator::new(
        stream(&[("chr1", 1, 4, 2.0), ("chr1", 10, 12, 3.0)]),
        &[StatKind::Auc],
    );
    assert_eq!(integrator.run().unwrap(), vec![12.0]);
}

#[test]
fn e5_coverage_of_three_alignments() {
    let source = overlapping_stream(&[
        ("chr1", 1, 5, 1.0),
        ("chr1", 3, 8, 1.0),
        ("chr1", 6, 10, 1.0),
    ]);
    let mut coverage = Cursor::from_iter(Coverage::new(source)).unwrap();
    assert_eq!(coverage.drain().unwrap(), vec![
        Interval::new("chr1", 1, 3, 1.0),
        Interval::new("chr1", 3, 5, 2.0),
        Interval::new("chr1", 5, 6, 1.0),
        Interval::new("chr1", 6, 8, 2.0),
        Interval::new("chr1", 8, 10, 1.0),
    ]);
}

#[test]
fn e6_apply_auc_over_regions() {
    let mut apply = Apply::new(
        stream(&[("chr1", 1, 5, 0.0), ("chr1", 10, 12, 0.0)]),
        stream(&[("chr1", 1, 20, 1.0)]),
        ApplyMode::Stats {
            kinds: vec![StatKind::Auc],
            strict: true,
        },
    );
    let mut rows = Vec::new();
    while let Some(rec) = apply.next_record().unwrap() {
        rows.push((rec.start, rec.finish, rec.values[0]));
    }
    assert_eq!(rows, vec![(1, 5, 4.0), (10, 12, 2.0)]);
}
