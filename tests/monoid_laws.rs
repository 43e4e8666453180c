//! The algebraic laws every aggregator pair must satisfy: identity,
//! commutativity, associativity, fill-merge equivalence, and entry
//! conservation.

use histogrammar::primitives::{
    Aggregating, Averaging, Binning, Categorizing, Deviating, Fractioning, Maximizing,
    Minimizing, Selecting, SparselyBinning, Stacking, Summing, UntypedLabeling,
};
use histogrammar::test_helpers::{assert_exact, assert_rel_close};
use histogrammar::{unweighted, Quantity};

type Event = (f64, String);

/// A composite tree touching most primitive kinds at once.
fn build_tree() -> Aggregating<Event> {
    let x = || Quantity::new(|d: &Event| d.0);
    let cat = Quantity::new(|d: &Event| d.1.clone());

    UntypedLabeling::new(vec![
        ("count", Aggregating::count()),
        ("sum", Summing::new(x()).into()),
        ("mean", Averaging::new(x()).into()),
        ("spread", Deviating::new(x()).into()),
        ("smallest", Minimizing::new(x()).into()),
        ("largest", Maximizing::new(x()).into()),
        (
            "hist",
            Selecting::new(
                unweighted(),
                Binning::new(8, -4.0, 4.0, x(), Aggregating::count())
                    .expect("bin")
                    .into(),
            )
            .into(),
        ),
        (
            "sparse",
            SparselyBinning::new(0.5, x(), Aggregating::count())
                .expect("sparse")
                .into(),
        ),
        ("by_kind", Categorizing::new(cat, Aggregating::count()).into()),
        (
            "positive_fraction",
            Fractioning::new(
                Quantity::new(|d: &Event| if d.0 > 0.0 { 1.0 } else { 0.0 }),
                Aggregating::count(),
            )
            .into(),
        ),
        (
            "stack",
            Stacking::new(x(), Aggregating::count(), vec![-1.0, 0.0, 1.0])
                .expect("stack")
                .into(),
        ),
    ])
    .expect("tree")
    .into()
}

fn dataset() -> Vec<(Event, f64)> {
    let kinds = ["one", "two", "three"];
    (0..120)
        .map(|i| {
            let x = ((i as f64) * 0.61).sin() * 3.0;
            let kind = kinds[i % kinds.len()].to_string();
            let weight = 1.0 + (i % 4) as f64 * 0.25;
            ((x, kind), weight)
        })
        .collect()
}

fn filled(events: &[(Event, f64)]) -> Aggregating<Event> {
    let mut tree = build_tree();
    for (event, weight) in events {
        tree.fill(event, *weight).expect("fill");
    }
    tree
}

#[test]
fn zero_is_a_two_sided_identity() {
    let tree = filled(&dataset());
    let zero = tree.zero();

    let left = tree.merge(&zero).expect("merge right identity");
    let right = zero.merge(&tree).expect("merge left identity");

    assert_eq!(left.snapshot(), tree.snapshot());
    assert_eq!(right.snapshot(), tree.snapshot());
    assert_eq!(left.to_json(), tree.to_json());
}

#[test]
fn merge_is_commutative() {
    let data = dataset();
    let a = filled(&data[..40]);
    let b = filled(&data[40..]);

    let ab = a.merge(&b).expect("a+b");
    let ba = b.merge(&a).expect("b+a");
    assert_eq!(ab.snapshot(), ba.snapshot());
}

#[test]
fn merge_is_associative() {
    let data = dataset();
    let a = filled(&data[..30]);
    let b = filled(&data[30..70]);
    let c = filled(&data[70..]);

    let left = a.merge(&b).expect("a+b").merge(&c).expect("(a+b)+c");
    let right = a.merge(&b.merge(&c).expect("b+c")).expect("a+(b+c)");

    // Discrete state is identical under regrouping; the weighted running
    // summaries agree to rounding.
    let left_json = left.to_json_value();
    let right_json = right.to_json_value();
    for key in [
        "count",
        "smallest",
        "largest",
        "hist",
        "sparse",
        "by_kind",
        "positive_fraction",
        "stack",
    ] {
        assert_eq!(
            left_json["data"]["data"][key], right_json["data"]["data"][key],
            "sub-aggregator {:?} diverged under regrouping",
            key
        );
    }
    for (key, field) in [("sum", "sum"), ("mean", "mean"), ("spread", "variance")] {
        let lv = left_json["data"]["data"][key]["data"][field]
            .as_f64()
            .expect("numeric field");
        let rv = right_json["data"]["data"][key]["data"][field]
            .as_f64()
            .expect("numeric field");
        assert_rel_close(&format!("{}.{}", key, field), lv, rv, 1e-12);
    }
}

#[test]
fn filling_shards_and_merging_matches_a_single_pass() {
    let data = dataset();
    let whole = filled(&data);
    let merged = filled(&data[..60])
        .merge(&filled(&data[60..]))
        .expect("merge");

    // Exact equality for the exactly-mergeable parts; the running-moment
    // summaries agree to rounding.
    let whole_json = whole.to_json_value();
    let merged_json = merged.to_json_value();
    for key in [
        "count",
        "smallest",
        "largest",
        "hist",
        "sparse",
        "by_kind",
        "positive_fraction",
        "stack",
    ] {
        assert_eq!(
            whole_json["data"]["data"][key], merged_json["data"]["data"][key],
            "sub-aggregator {:?} diverged",
            key
        );
    }

    assert_exact("entries", whole.entries(), merged.entries());
    let get = |v: &serde_json::Value, key: &str, field: &str| {
        v["data"]["data"][key]["data"][field]
            .as_f64()
            .expect("numeric field")
    };
    assert_rel_close(
        "mean",
        get(&whole_json, "mean", "mean"),
        get(&merged_json, "mean", "mean"),
        1e-9,
    );
    assert_rel_close(
        "variance",
        get(&whole_json, "spread", "variance"),
        get(&merged_json, "spread", "variance"),
        1e-9,
    );
    assert_rel_close(
        "sum",
        get(&whole_json, "sum", "sum"),
        get(&merged_json, "sum", "sum"),
        1e-9,
    );
}

#[test]
fn entries_are_conserved_by_fill_and_merge() {
    let mut tree = build_tree();
    tree.fill(&(0.5, "one".to_string()), 2.5).expect("fill");
    assert_exact("after one fill", 2.5, tree.entries());

    tree.fill(&(0.5, "one".to_string()), 0.0).expect("fill");
    tree.fill(&(0.5, "one".to_string()), -3.0).expect("fill");
    assert_exact("nonpositive weights are no-ops", 2.5, tree.entries());

    let other = filled(&dataset());
    let total: f64 = dataset().iter().map(|(_, w)| w).sum();
    let merged = tree.merge(&other).expect("merge");
    assert_rel_close("merged entries", 2.5 + total, merged.entries(), 1e-12);
}

#[test]
fn past_tense_trees_obey_the_same_laws() {
    let data = dataset();
    let a = filled(&data[..50]).snapshot();
    let b = filled(&data[50..]).snapshot();

    let ab = a.merge(&b).expect("a+b");
    let ba = b.merge(&a).expect("b+a");
    assert_eq!(ab, ba);

    assert_eq!(a.merge(&a.zero()).expect("identity"), a);
    assert_exact(
        "entry conservation",
        a.entries() + b.entries(),
        ab.entries(),
    );
}
