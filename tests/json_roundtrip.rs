//! The canonical JSON codec: round trips, tense equivalence, stable output,
//! non-finite literals, and reader strictness.

use histogrammar::primitives::{
    AdaptivelyBinning, Aggregated, Aggregating, Averaging, BagValue, Bagging, Binning, Branching,
    Categorizing, CentrallyBinning, Deviating, Fractioning, Indexing, Labeling, Limiting,
    Maximizing, Minimizing, Partitioning, Quantiling, Selecting, SparselyBinning, Stacking,
    Summing, UntypedLabeling,
};
use histogrammar::{unweighted, Factory, Quantity};

type Event = (f64, String);

fn x() -> Quantity<Event, f64> {
    Quantity::named("x", |d: &Event| d.0)
}

/// One tree containing every primitive kind.
fn everything_tree() -> Aggregating<Event> {
    let cat = Quantity::named("kind", |d: &Event| d.1.clone());
    let bag_key = Quantity::new(|d: &Event| BagValue::vector([d.0, d.0 * 2.0]));

    UntypedLabeling::new(vec![
        ("count", Aggregating::count()),
        ("sum", Summing::new(x()).into()),
        ("average", Averaging::new(x()).into()),
        ("deviate", Deviating::new(x()).into()),
        ("minimize", Minimizing::new(x()).into()),
        ("maximize", Maximizing::new(x()).into()),
        (
            "quantile",
            Quantiling::new(0.5, x()).expect("quantile").into(),
        ),
        ("bag", Bagging::new(bag_key).into()),
        (
            "bin",
            Binning::new(4, -2.0, 2.0, x(), Summing::new(x()).into())
                .expect("bin")
                .into(),
        ),
        (
            "sparse",
            SparselyBinning::new(0.5, x(), Aggregating::count())
                .expect("sparse")
                .into(),
        ),
        (
            "central",
            CentrallyBinning::new(vec![-1.0, 0.0, 1.0], x(), Aggregating::count())
                .expect("central")
                .into(),
        ),
        (
            "adaptive",
            AdaptivelyBinning::new(x(), 4, 0.2, Aggregating::count())
                .expect("adaptive")
                .into(),
        ),
        ("categorize", Categorizing::new(cat, Aggregating::count()).into()),
        (
            "select",
            Selecting::new(unweighted(), Aggregating::count()).into(),
        ),
        (
            "limit",
            Limiting::new(Aggregating::count(), 2.0).expect("limit").into(),
        ),
        (
            "fraction",
            Fractioning::new(
                Quantity::new(|d: &Event| if d.0 > 0.0 { 1.0 } else { 0.0 }),
                Averaging::new(x()).into(),
            )
            .into(),
        ),
        (
            "stack",
            Stacking::new(x(), Aggregating::count(), vec![0.0, 1.0])
                .expect("stack")
                .into(),
        ),
        (
            "partition",
            Partitioning::new(x(), Aggregating::count(), vec![0.0, 1.0])
                .expect("partition")
                .into(),
        ),
        (
            "label",
            Labeling::new(vec![
                ("a", Aggregating::<Event>::count()),
                ("b", Aggregating::count()),
            ])
            .expect("label")
            .into(),
        ),
        (
            "index",
            Indexing::new(vec![Aggregating::count(), Aggregating::count()])
                .expect("index")
                .into(),
        ),
        (
            "branch",
            Branching::new(vec![Aggregating::count(), Summing::new(x()).into()])
                .expect("branch")
                .into(),
        ),
    ])
    .expect("tree")
    .into()
}

fn filled_everything() -> Aggregating<Event> {
    let mut tree = everything_tree();
    let kinds = ["red", "green", "blue"];
    for i in 0..40 {
        let event = (((i as f64) * 0.77).sin() * 2.5, kinds[i % 3].to_string());
        tree.fill(&event, 1.0 + (i % 2) as f64 * 0.5).expect("fill");
    }
    tree
}

#[test]
fn every_primitive_round_trips_through_json() {
    let tree = filled_everything();
    let past = tree.snapshot();
    let text = past.to_json();

    let read_back = Factory::from_json(&text).expect("read back");
    assert_eq!(read_back, past);
    assert_eq!(read_back.to_json(), text);
}

#[test]
fn present_and_past_serialize_identically() {
    let tree = filled_everything();
    assert_eq!(tree.to_json(), tree.snapshot().to_json());
}

#[test]
fn identical_trees_serialize_byte_identically() {
    let a = filled_everything();
    let b = filled_everything();
    assert_eq!(a.to_json(), b.to_json());
}

#[test]
fn unfilled_extremes_serialize_as_nan_literals() {
    let minimize: Aggregating<Event> = Minimizing::new(x()).into();
    let json = minimize.to_json_value();
    assert_eq!(json["data"]["min"], serde_json::json!("nan"));

    let read_back = Factory::from_json(&minimize.to_json()).expect("read back");
    let Aggregated::Minimized(m) = read_back else {
        panic!("expected Minimize");
    };
    assert!(m.min().is_nan());
}

#[test]
fn stack_serializes_its_neg_inf_cut_as_a_literal() {
    let stack: Aggregating<Event> = Stacking::new(
        x(),
        Aggregating::count(),
        vec![0.0],
    )
    .expect("stack")
    .into();
    let json = stack.to_json_value();
    assert_eq!(
        json["data"]["data"][0]["atleast"],
        serde_json::json!("-inf")
    );

    let read_back = Factory::from_json(&stack.to_json()).expect("read back");
    assert_eq!(read_back, stack.snapshot());
}

#[test]
fn reader_accepts_plain_numbers_where_literals_could_appear() {
    let doc = r#"{"type":"Minimize","data":{"entries":2.0,"min":-3.5}}"#;
    let read = Factory::from_json(doc).expect("read");
    let Aggregated::Minimized(m) = read else {
        panic!("expected Minimize");
    };
    assert_eq!(m.min(), -3.5);
}

#[test]
fn parent_recorded_names_reattach_to_children() {
    let mut bin: Aggregating<Event> = Binning::new(
        2,
        0.0,
        2.0,
        Quantity::named("axis", |d: &Event| d.0),
        Summing::new(Quantity::named("weighted", |d: &Event| d.0)).into(),
    )
    .expect("bin")
    .into();
    bin.fill(&(0.5, String::new()), 1.0).expect("fill");

    let json = bin.to_json_value();
    // The shared sub-aggregator name appears once on the parent, not per bin.
    assert_eq!(json["data"]["values:name"], serde_json::json!("weighted"));
    assert!(json["data"]["values"][0].get("name").is_none());

    let read_back = Factory::from_json(&bin.to_json()).expect("read back");
    assert_eq!(read_back, bin.snapshot());
}

#[test]
fn unknown_types_and_malformed_fragments_fail_loudly() {
    use histogrammar::HgError;

    assert!(matches!(
        Factory::from_json(r#"{"type":"Mystery","data":0}"#),
        Err(HgError::UnknownType { .. })
    ));
    assert!(matches!(
        Factory::from_json(r#"{"type":"Sum","data":{"entries":1.0}}"#),
        Err(HgError::JsonFormat { .. })
    ));
    assert!(matches!(
        Factory::from_json(r#"{"type":"Sum","data":{"entries":1.0,"sum":"much"}}"#),
        Err(HgError::JsonFormat { .. })
    ));
    assert!(matches!(
        Factory::from_json(r#"{"type":"Count","data":-1.0}"#),
        Err(HgError::Validation { .. })
    ));
    assert!(matches!(
        Factory::from_json("{"),
        Err(HgError::InvalidJson { .. })
    ));
}

#[test]
fn past_trees_read_from_json_still_merge() {
    let tree = filled_everything();
    let text = tree.to_json();

    let a = Factory::from_json(&text).expect("a");
    let b = Factory::from_json(&text).expect("b");
    let merged = a.merge(&b).expect("merge");
    assert_eq!(merged.entries(), 2.0 * tree.entries());
}
