//! Convenience constructors for the most common compositions.
//!
//! A histogram is not its own primitive: it is `Select ∘ Bin(..., Count)`,
//! which keeps selection logic out of Bin and lets every other composition
//! reuse the same routing. A profile swaps the per-bin Count for Deviate.

use crate::error::HgResult;
use crate::primitives::{Aggregating, Binning, Deviating, Selecting};
use crate::quantity::{Quantity, Selection};

/// `Select(selection, Bin(num, low, high, quantity, Count))`.
pub fn histogram<D>(
    num: usize,
    low: f64,
    high: f64,
    quantity: Quantity<D, f64>,
    selection: Selection<D>,
) -> HgResult<Aggregating<D>> {
    Ok(Selecting::new(
        selection,
        Binning::new(num, low, high, quantity, Aggregating::count())?.into(),
    )
    .into())
}

/// `Select(selection, Bin(num, low, high, binned, Deviate(averaged)))`:
/// a mean-and-spread profile of one quantity against another.
pub fn profile<D>(
    num: usize,
    low: f64,
    high: f64,
    binned: Quantity<D, f64>,
    averaged: Quantity<D, f64>,
    selection: Selection<D>,
) -> HgResult<Aggregating<D>> {
    Ok(Selecting::new(
        selection,
        Binning::new(num, low, high, binned, Deviating::new(averaged).into())?.into(),
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::unweighted;
    use crate::test_helpers::{assert_exact, assert_rel_close};

    #[test]
    fn histogram_is_a_selected_dense_bin_of_counts() {
        let mut h = histogram(
            4,
            0.0,
            4.0,
            Quantity::named("x", |x: &f64| *x),
            unweighted(),
        )
        .expect("build");

        for q in [0.5, 1.5, 1.6, 3.9, 9.0] {
            h.fill(&q, 1.0).expect("fill");
        }
        assert_exact("entries", 5.0, h.entries());

        let json = h.to_json();
        assert!(json.starts_with("{\"type\":\"Select\""));
        assert!(json.contains("\"values:type\":\"Count\""));
    }

    #[test]
    fn profile_tracks_per_bin_mean_and_spread() {
        let mut p = profile(
            2,
            0.0,
            2.0,
            Quantity::new(|xy: &(f64, f64)| xy.0),
            Quantity::new(|xy: &(f64, f64)| xy.1),
            unweighted(),
        )
        .expect("build");

        p.fill(&(0.5, 10.0), 1.0).expect("fill");
        p.fill(&(0.5, 20.0), 1.0).expect("fill");
        p.fill(&(1.5, 7.0), 1.0).expect("fill");

        let json = p.to_json();
        assert!(json.contains("\"values:type\":\"Deviate\""));
        // First bin saw y = 10 and 20.
        let tree = p.snapshot();
        let crate::primitives::Aggregated::Selected(sel) = &tree else {
            panic!("expected Select at the root");
        };
        let crate::primitives::Aggregated::Binned(bin) = sel.value() else {
            panic!("expected Bin under Select");
        };
        let crate::primitives::Aggregated::Deviated(dev) = &bin.values()[0] else {
            panic!("expected Deviate in bin 0");
        };
        assert_rel_close("bin 0 mean", 15.0, dev.mean(), 1e-12);
        assert_rel_close("bin 0 variance", 25.0, dev.variance(), 1e-12);
    }
}
