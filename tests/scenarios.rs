//! End-to-end scenarios exercising the public API exactly as a driver would.

use histogrammar::primitives::{
    AdaptivelyBinning, Aggregated, Aggregating, Binning, Labeling, SparselyBinning, Summed,
};
use histogrammar::test_helpers::{assert_exact, assert_rel_close};
use histogrammar::{Factory, Quantity};

#[test]
fn count_accumulates_fractional_weights_and_serializes_bare() {
    let mut count: Aggregating<f64> = Aggregating::count();
    for w in [1.0, 1.0, 1.0, 0.5] {
        count.fill(&0.0, w).expect("fill");
    }
    assert_exact("entries", 3.5, count.entries());
    assert_eq!(count.to_json(), r#"{"type":"Count","data":3.5}"#);
}

#[test]
fn dense_bin_routes_values_flows_and_nan() {
    let mut bin: Aggregating<f64> = Binning::new(
        5,
        0.0,
        5.0,
        Quantity::new(|x: &f64| *x),
        Aggregating::count(),
    )
    .expect("build")
    .into();

    for q in [0.5, 0.5, 2.5, 4.999, 5.0, -1.0, f64::NAN] {
        bin.fill(&q, 1.0).expect("fill");
    }

    let Aggregated::Binned(binned) = bin.snapshot() else {
        panic!("expected a Bin snapshot");
    };
    let counts: Vec<f64> = binned.values().iter().map(|v| v.entries()).collect();
    assert_eq!(counts, vec![2.0, 0.0, 1.0, 0.0, 1.0]);
    assert_exact("entries", 7.0, binned.entries());

    let json = bin.to_json_value();
    assert_eq!(json["data"]["underflow"], serde_json::json!(1.0));
    assert_eq!(json["data"]["overflow"], serde_json::json!(1.0));
    assert_eq!(json["data"]["nanflow"], serde_json::json!(1.0));
}

#[test]
fn sparse_bin_creates_exactly_the_observed_indexes() {
    let mut sparse: Aggregating<f64> = SparselyBinning::new(
        1.0,
        Quantity::new(|x: &f64| *x),
        Aggregating::count(),
    )
    .expect("build")
    .into();

    for q in [0.2, 3.7, 3.9, -0.1] {
        sparse.fill(&q, 1.0).expect("fill");
    }

    let Aggregated::SparselyBinned(past) = sparse.snapshot() else {
        panic!("expected a SparselyBin snapshot");
    };
    assert_exact("entries", 4.0, past.entries());
    let observed: Vec<(i64, f64)> = past
        .bins()
        .iter()
        .map(|(i, v)| (*i, v.entries()))
        .collect();
    assert_eq!(observed, vec![(-1, 1.0), (0, 1.0), (3, 2.0)]);
}

#[test]
fn sums_merge_by_adding_both_fields() {
    let a: Aggregated = Summed::new(2.0, 4.0).expect("a").into();
    let b: Aggregated = Summed::new(3.0, 9.0).expect("b").into();
    let merged = a.merge(&b).expect("merge");

    let Aggregated::Summed(m) = merged else {
        panic!("expected a Sum");
    };
    assert_exact("entries", 5.0, m.entries());
    assert_exact("sum", 13.0, m.sum());
}

#[test]
fn serialized_label_tree_survives_a_cross_tense_merge_byte_for_byte() {
    let mut tree: Aggregating<(f64, f64)> = Labeling::new(vec![
        (
            "px",
            Binning::new(
                3,
                -1.0,
                1.0,
                Quantity::named("px", |d: &(f64, f64)| d.0),
                Aggregating::count(),
            )
            .expect("px bin")
            .into(),
        ),
        (
            "pt",
            Binning::new(
                2,
                0.0,
                1.0,
                Quantity::named("pt", |d: &(f64, f64)| d.1),
                Aggregating::count(),
            )
            .expect("pt bin")
            .into(),
        ),
    ])
    .expect("label")
    .into();

    tree.fill(&(0.1, 0.7), 1.0).expect("fill");

    let first = tree.to_json();
    let read_back = Factory::from_json(&first).expect("read back");
    assert_eq!(read_back, tree.snapshot());

    let merged = read_back
        .merge(&tree.zero().snapshot())
        .expect("merge with a zeroed present tree");
    assert_eq!(merged.to_json(), first);
}

#[test]
fn adaptive_bins_keep_tails_and_coalesce_the_middle() {
    let mut adaptive: Aggregating<f64> = AdaptivelyBinning::new(
        Quantity::new(|x: &f64| *x),
        3,
        0.2,
        Aggregating::count(),
    )
    .expect("build")
    .into();

    for q in [0.0, 10.0, 10.1, 10.2, 20.0] {
        adaptive.fill(&q, 1.0).expect("fill");
    }

    let Aggregated::AdaptivelyBinned(past) = adaptive.snapshot() else {
        panic!("expected an AdaptivelyBin snapshot");
    };
    assert_exact("entries", 5.0, past.entries());
    let centers = past.centers();
    assert_eq!(centers.len(), 3);
    assert_exact("low tail", 0.0, centers[0]);
    assert_rel_close("coalesced middle", 10.1, centers[1], 1e-9);
    assert_exact("high tail", 20.0, centers[2]);
}
