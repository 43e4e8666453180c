//! The primitive library: every aggregator kind, in both tenses.
//!
//! An aggregation analysis is a tree of these primitives; containers hold
//! further aggregators as sub-values to arbitrary depth. The two sealed sum
//! types here are the trunk of the API:
//!
//! - [`Aggregating<D>`] is the *present tense*: mutable, carries the user's
//!   quantity closures, accepts `fill`.
//! - [`Aggregated`] is the *past tense*: immutable numbers only, the
//!   serializable form, produced by [`Aggregating::snapshot`] or by reading
//!   JSON through [`crate::Factory`].
//!
//! Both tenses are commutative monoids under `merge` with `zero` as the
//! neutral element, so trees filled on shards of a dataset combine into the
//! single-pass result.

use core::fmt;

use serde_json::Value;

use crate::error::{HgError, HgResult};
use crate::registry::Deserializer;

pub mod absoluteerr;
pub mod adaptivelybin;
pub mod average;
pub mod bag;
pub mod bin;
pub mod categorize;
pub mod centrallybin;
pub mod collection;
pub mod count;
pub mod deviate;
pub mod fraction;
pub mod limit;
pub mod minmax;
pub mod partition;
pub mod quantile;
pub mod select;
pub mod sparselybin;
pub mod stack;
pub mod sum;

pub use absoluteerr::{AbsoluteErred, AbsoluteErring};
pub use adaptivelybin::{AdaptivelyBinned, AdaptivelyBinning};
pub use average::{Averaged, Averaging};
pub use bag::{BagValue, Bagged, Bagging};
pub use bin::{Binned, Binning};
pub use categorize::{Categorized, Categorizing};
pub use centrallybin::{CentrallyBinned, CentrallyBinning};
pub use collection::{
    Branched, Branching, Indexed, Indexing, Labeled, Labeling, UntypedLabeled, UntypedLabeling,
};
pub use count::{Counted, Counting};
pub use deviate::{Deviated, Deviating};
pub use fraction::{Fractioned, Fractioning};
pub use limit::{Limited, Limiting};
pub use minmax::{Maximized, Maximizing, Minimized, Minimizing};
pub use partition::{Partitioned, Partitioning};
pub use quantile::{Quantiled, Quantiling};
pub use select::{Selected, Selecting};
pub use sparselybin::{SparselyBinned, SparselyBinning};
pub use stack::{Stacked, Stacking};
pub use sum::{Summed, Summing};

/// Name carried by a merge result; both sides must agree when both are named.
pub(crate) fn merged_name(
    a: Option<&str>,
    b: Option<&str>,
    what: &str,
) -> HgResult<Option<String>> {
    match (a, b) {
        (Some(x), Some(y)) if x != y => Err(HgError::name_conflict(format!(
            "cannot merge {} quantities named {:?} and {:?}",
            what, x, y
        ))),
        (Some(x), _) => Ok(Some(x.to_string())),
        (_, Some(y)) => Ok(Some(y.to_string())),
        _ => Ok(None),
    }
}

/// A present-tense aggregator over datum type `D`.
pub enum Aggregating<D> {
    Counting(Counting),
    Summing(Summing<D>),
    Averaging(Averaging<D>),
    Deviating(Deviating<D>),
    AbsoluteErring(AbsoluteErring<D>),
    Minimizing(Minimizing<D>),
    Maximizing(Maximizing<D>),
    Quantiling(Quantiling<D>),
    Bagging(Bagging<D>),
    Binning(Binning<D>),
    SparselyBinning(SparselyBinning<D>),
    CentrallyBinning(CentrallyBinning<D>),
    AdaptivelyBinning(AdaptivelyBinning<D>),
    Categorizing(Categorizing<D>),
    Selecting(Selecting<D>),
    Limiting(Limiting<D>),
    Fractioning(Fractioning<D>),
    Stacking(Stacking<D>),
    Partitioning(Partitioning<D>),
    Labeling(Labeling<D>),
    UntypedLabeling(UntypedLabeling<D>),
    Indexing(Indexing<D>),
    Branching(Branching<D>),
}

impl<D> Aggregating<D> {
    /// Shorthand for the ubiquitous Count sub-aggregator.
    pub fn count() -> Self {
        Aggregating::Counting(Counting::new())
    }

    /// The factory tag naming this primitive in JSON.
    pub fn tag(&self) -> &'static str {
        match self {
            Aggregating::Counting(_) => count::TAG,
            Aggregating::Summing(_) => sum::TAG,
            Aggregating::Averaging(_) => average::TAG,
            Aggregating::Deviating(_) => deviate::TAG,
            Aggregating::AbsoluteErring(_) => absoluteerr::TAG,
            Aggregating::Minimizing(_) => minmax::MIN_TAG,
            Aggregating::Maximizing(_) => minmax::MAX_TAG,
            Aggregating::Quantiling(_) => quantile::TAG,
            Aggregating::Bagging(_) => bag::TAG,
            Aggregating::Binning(_) => bin::TAG,
            Aggregating::SparselyBinning(_) => sparselybin::TAG,
            Aggregating::CentrallyBinning(_) => centrallybin::TAG,
            Aggregating::AdaptivelyBinning(_) => adaptivelybin::TAG,
            Aggregating::Categorizing(_) => categorize::TAG,
            Aggregating::Selecting(_) => select::TAG,
            Aggregating::Limiting(_) => limit::TAG,
            Aggregating::Fractioning(_) => fraction::TAG,
            Aggregating::Stacking(_) => stack::TAG,
            Aggregating::Partitioning(_) => partition::TAG,
            Aggregating::Labeling(_) => collection::LABEL_TAG,
            Aggregating::UntypedLabeling(_) => collection::UNTYPED_LABEL_TAG,
            Aggregating::Indexing(_) => collection::INDEX_TAG,
            Aggregating::Branching(_) => collection::BRANCH_TAG,
        }
    }

    /// The sum of weights routed into this node.
    pub fn entries(&self) -> f64 {
        match self {
            Aggregating::Counting(a) => a.entries,
            Aggregating::Summing(a) => a.entries,
            Aggregating::Averaging(a) => a.entries,
            Aggregating::Deviating(a) => a.entries,
            Aggregating::AbsoluteErring(a) => a.entries,
            Aggregating::Minimizing(a) => a.entries,
            Aggregating::Maximizing(a) => a.entries,
            Aggregating::Quantiling(a) => a.entries,
            Aggregating::Bagging(a) => a.entries,
            Aggregating::Binning(a) => a.entries,
            Aggregating::SparselyBinning(a) => a.entries,
            Aggregating::CentrallyBinning(a) => a.entries,
            Aggregating::AdaptivelyBinning(a) => a.entries,
            Aggregating::Categorizing(a) => a.entries,
            Aggregating::Selecting(a) => a.entries,
            Aggregating::Limiting(a) => a.entries,
            Aggregating::Fractioning(a) => a.entries,
            Aggregating::Stacking(a) => a.entries,
            Aggregating::Partitioning(a) => a.entries,
            Aggregating::Labeling(a) => a.entries,
            Aggregating::UntypedLabeling(a) => a.entries,
            Aggregating::Indexing(a) => a.entries,
            Aggregating::Branching(a) => a.entries,
        }
    }

    /// Route one datum with the given weight into the tree. Non-positive
    /// weights are a no-op. Only ill-formed inputs fail (mixed-length Bag
    /// vectors); `entries` is committed after every fallible sub-update.
    pub fn fill(&mut self, datum: &D, weight: f64) -> HgResult<()> {
        match self {
            Aggregating::Counting(a) => {
                a.fill(weight);
                Ok(())
            }
            Aggregating::Summing(a) => {
                a.fill(datum, weight);
                Ok(())
            }
            Aggregating::Averaging(a) => {
                a.fill(datum, weight);
                Ok(())
            }
            Aggregating::Deviating(a) => {
                a.fill(datum, weight);
                Ok(())
            }
            Aggregating::AbsoluteErring(a) => {
                a.fill(datum, weight);
                Ok(())
            }
            Aggregating::Minimizing(a) => {
                a.fill(datum, weight);
                Ok(())
            }
            Aggregating::Maximizing(a) => {
                a.fill(datum, weight);
                Ok(())
            }
            Aggregating::Quantiling(a) => {
                a.fill(datum, weight);
                Ok(())
            }
            Aggregating::Bagging(a) => a.fill(datum, weight),
            Aggregating::Binning(a) => a.fill(datum, weight),
            Aggregating::SparselyBinning(a) => a.fill(datum, weight),
            Aggregating::CentrallyBinning(a) => a.fill(datum, weight),
            Aggregating::AdaptivelyBinning(a) => a.fill(datum, weight),
            Aggregating::Categorizing(a) => a.fill(datum, weight),
            Aggregating::Selecting(a) => a.fill(datum, weight),
            Aggregating::Limiting(a) => a.fill(datum, weight),
            Aggregating::Fractioning(a) => a.fill(datum, weight),
            Aggregating::Stacking(a) => a.fill(datum, weight),
            Aggregating::Partitioning(a) => a.fill(datum, weight),
            Aggregating::Labeling(a) => a.fill(datum, weight),
            Aggregating::UntypedLabeling(a) => a.fill(datum, weight),
            Aggregating::Indexing(a) => a.fill(datum, weight),
            Aggregating::Branching(a) => a.fill(datum, weight),
        }
    }

    /// Associative, commutative combine. Both sides must have the same shape
    /// and configuration; the result shares `self`'s quantity closures.
    pub fn merge(&self, other: &Self) -> HgResult<Self> {
        match (self, other) {
            (Aggregating::Counting(a), Aggregating::Counting(b)) => {
                Ok(Aggregating::Counting(a.merge(b)))
            }
            (Aggregating::Summing(a), Aggregating::Summing(b)) => {
                Ok(Aggregating::Summing(a.merge(b)?))
            }
            (Aggregating::Averaging(a), Aggregating::Averaging(b)) => {
                Ok(Aggregating::Averaging(a.merge(b)?))
            }
            (Aggregating::Deviating(a), Aggregating::Deviating(b)) => {
                Ok(Aggregating::Deviating(a.merge(b)?))
            }
            (Aggregating::AbsoluteErring(a), Aggregating::AbsoluteErring(b)) => {
                Ok(Aggregating::AbsoluteErring(a.merge(b)?))
            }
            (Aggregating::Minimizing(a), Aggregating::Minimizing(b)) => {
                Ok(Aggregating::Minimizing(a.merge(b)?))
            }
            (Aggregating::Maximizing(a), Aggregating::Maximizing(b)) => {
                Ok(Aggregating::Maximizing(a.merge(b)?))
            }
            (Aggregating::Quantiling(a), Aggregating::Quantiling(b)) => {
                Ok(Aggregating::Quantiling(a.merge(b)?))
            }
            (Aggregating::Bagging(a), Aggregating::Bagging(b)) => {
                Ok(Aggregating::Bagging(a.merge(b)?))
            }
            (Aggregating::Binning(a), Aggregating::Binning(b)) => {
                Ok(Aggregating::Binning(a.merge(b)?))
            }
            (Aggregating::SparselyBinning(a), Aggregating::SparselyBinning(b)) => {
                Ok(Aggregating::SparselyBinning(a.merge(b)?))
            }
            (Aggregating::CentrallyBinning(a), Aggregating::CentrallyBinning(b)) => {
                Ok(Aggregating::CentrallyBinning(a.merge(b)?))
            }
            (Aggregating::AdaptivelyBinning(a), Aggregating::AdaptivelyBinning(b)) => {
                Ok(Aggregating::AdaptivelyBinning(a.merge(b)?))
            }
            (Aggregating::Categorizing(a), Aggregating::Categorizing(b)) => {
                Ok(Aggregating::Categorizing(a.merge(b)?))
            }
            (Aggregating::Selecting(a), Aggregating::Selecting(b)) => {
                Ok(Aggregating::Selecting(a.merge(b)?))
            }
            (Aggregating::Limiting(a), Aggregating::Limiting(b)) => {
                Ok(Aggregating::Limiting(a.merge(b)?))
            }
            (Aggregating::Fractioning(a), Aggregating::Fractioning(b)) => {
                Ok(Aggregating::Fractioning(a.merge(b)?))
            }
            (Aggregating::Stacking(a), Aggregating::Stacking(b)) => {
                Ok(Aggregating::Stacking(a.merge(b)?))
            }
            (Aggregating::Partitioning(a), Aggregating::Partitioning(b)) => {
                Ok(Aggregating::Partitioning(a.merge(b)?))
            }
            (Aggregating::Labeling(a), Aggregating::Labeling(b)) => {
                Ok(Aggregating::Labeling(a.merge(b)?))
            }
            (Aggregating::UntypedLabeling(a), Aggregating::UntypedLabeling(b)) => {
                Ok(Aggregating::UntypedLabeling(a.merge(b)?))
            }
            (Aggregating::Indexing(a), Aggregating::Indexing(b)) => {
                Ok(Aggregating::Indexing(a.merge(b)?))
            }
            (Aggregating::Branching(a), Aggregating::Branching(b)) => {
                Ok(Aggregating::Branching(a.merge(b)?))
            }
            (a, b) => Err(HgError::mismatch(format!(
                "cannot merge {} with {}",
                a.tag(),
                b.tag()
            ))),
        }
    }

    /// A neutral element of the same shape: zero entries, zeroed subs,
    /// shared quantity closures.
    pub fn zero(&self) -> Self {
        match self {
            Aggregating::Counting(a) => Aggregating::Counting(a.zero()),
            Aggregating::Summing(a) => Aggregating::Summing(a.zero()),
            Aggregating::Averaging(a) => Aggregating::Averaging(a.zero()),
            Aggregating::Deviating(a) => Aggregating::Deviating(a.zero()),
            Aggregating::AbsoluteErring(a) => Aggregating::AbsoluteErring(a.zero()),
            Aggregating::Minimizing(a) => Aggregating::Minimizing(a.zero()),
            Aggregating::Maximizing(a) => Aggregating::Maximizing(a.zero()),
            Aggregating::Quantiling(a) => Aggregating::Quantiling(a.zero()),
            Aggregating::Bagging(a) => Aggregating::Bagging(a.zero()),
            Aggregating::Binning(a) => Aggregating::Binning(a.zero()),
            Aggregating::SparselyBinning(a) => Aggregating::SparselyBinning(a.zero()),
            Aggregating::CentrallyBinning(a) => Aggregating::CentrallyBinning(a.zero()),
            Aggregating::AdaptivelyBinning(a) => Aggregating::AdaptivelyBinning(a.zero()),
            Aggregating::Categorizing(a) => Aggregating::Categorizing(a.zero()),
            Aggregating::Selecting(a) => Aggregating::Selecting(a.zero()),
            Aggregating::Limiting(a) => Aggregating::Limiting(a.zero()),
            Aggregating::Fractioning(a) => Aggregating::Fractioning(a.zero()),
            Aggregating::Stacking(a) => Aggregating::Stacking(a.zero()),
            Aggregating::Partitioning(a) => Aggregating::Partitioning(a.zero()),
            Aggregating::Labeling(a) => Aggregating::Labeling(a.zero()),
            Aggregating::UntypedLabeling(a) => Aggregating::UntypedLabeling(a.zero()),
            Aggregating::Indexing(a) => Aggregating::Indexing(a.zero()),
            Aggregating::Branching(a) => Aggregating::Branching(a.zero()),
        }
    }

    /// Freeze into the past tense: the aggregated numbers plus quantity
    /// names, without the closures. This is the only path to JSON.
    pub fn snapshot(&self) -> Aggregated {
        match self {
            Aggregating::Counting(a) => Aggregated::Counted(a.snapshot()),
            Aggregating::Summing(a) => Aggregated::Summed(a.snapshot()),
            Aggregating::Averaging(a) => Aggregated::Averaged(a.snapshot()),
            Aggregating::Deviating(a) => Aggregated::Deviated(a.snapshot()),
            Aggregating::AbsoluteErring(a) => Aggregated::AbsoluteErred(a.snapshot()),
            Aggregating::Minimizing(a) => Aggregated::Minimized(a.snapshot()),
            Aggregating::Maximizing(a) => Aggregated::Maximized(a.snapshot()),
            Aggregating::Quantiling(a) => Aggregated::Quantiled(a.snapshot()),
            Aggregating::Bagging(a) => Aggregated::Bagged(a.snapshot()),
            Aggregating::Binning(a) => Aggregated::Binned(a.snapshot()),
            Aggregating::SparselyBinning(a) => Aggregated::SparselyBinned(a.snapshot()),
            Aggregating::CentrallyBinning(a) => Aggregated::CentrallyBinned(a.snapshot()),
            Aggregating::AdaptivelyBinning(a) => Aggregated::AdaptivelyBinned(a.snapshot()),
            Aggregating::Categorizing(a) => Aggregated::Categorized(a.snapshot()),
            Aggregating::Selecting(a) => Aggregated::Selected(a.snapshot()),
            Aggregating::Limiting(a) => Aggregated::Limited(a.snapshot()),
            Aggregating::Fractioning(a) => Aggregated::Fractioned(a.snapshot()),
            Aggregating::Stacking(a) => Aggregated::Stacked(a.snapshot()),
            Aggregating::Partitioning(a) => Aggregated::Partitioned(a.snapshot()),
            Aggregating::Labeling(a) => Aggregated::Labeled(a.snapshot()),
            Aggregating::UntypedLabeling(a) => Aggregated::UntypedLabeled(a.snapshot()),
            Aggregating::Indexing(a) => Aggregated::Indexed(a.snapshot()),
            Aggregating::Branching(a) => Aggregated::Branched(a.snapshot()),
        }
    }

    /// Immediate sub-aggregators, for cross-cutting tree walks.
    pub fn children(&self) -> Vec<&Aggregating<D>> {
        match self {
            Aggregating::Counting(_)
            | Aggregating::Summing(_)
            | Aggregating::Averaging(_)
            | Aggregating::Deviating(_)
            | Aggregating::AbsoluteErring(_)
            | Aggregating::Minimizing(_)
            | Aggregating::Maximizing(_)
            | Aggregating::Quantiling(_)
            | Aggregating::Bagging(_) => Vec::new(),
            Aggregating::Binning(a) => a.children(),
            Aggregating::SparselyBinning(a) => a.children(),
            Aggregating::CentrallyBinning(a) => a.children(),
            Aggregating::AdaptivelyBinning(a) => a.children(),
            Aggregating::Categorizing(a) => a.children(),
            Aggregating::Selecting(a) => a.children(),
            Aggregating::Limiting(a) => a.children(),
            Aggregating::Fractioning(a) => a.children(),
            Aggregating::Stacking(a) => a.children(),
            Aggregating::Partitioning(a) => a.children(),
            Aggregating::Labeling(a) => a.children(),
            Aggregating::UntypedLabeling(a) => a.children(),
            Aggregating::Indexing(a) => a.children(),
            Aggregating::Branching(a) => a.children(),
        }
    }

    /// The snapshot's primitive-specific JSON body, without the `"type"`
    /// wrapper.
    pub fn to_json_fragment(&self, suppress_name: bool) -> Value {
        self.snapshot().to_json_fragment(suppress_name)
    }

    /// Canonical JSON of the snapshot; identical to serializing the
    /// past-tense form.
    pub fn to_json_value(&self) -> Value {
        self.snapshot().to_json_value()
    }

    /// Canonical JSON text of the snapshot.
    pub fn to_json(&self) -> String {
        self.snapshot().to_json()
    }
}

impl<D> Clone for Aggregating<D> {
    fn clone(&self) -> Self {
        match self {
            Aggregating::Counting(a) => Aggregating::Counting(a.clone()),
            Aggregating::Summing(a) => Aggregating::Summing(a.clone()),
            Aggregating::Averaging(a) => Aggregating::Averaging(a.clone()),
            Aggregating::Deviating(a) => Aggregating::Deviating(a.clone()),
            Aggregating::AbsoluteErring(a) => Aggregating::AbsoluteErring(a.clone()),
            Aggregating::Minimizing(a) => Aggregating::Minimizing(a.clone()),
            Aggregating::Maximizing(a) => Aggregating::Maximizing(a.clone()),
            Aggregating::Quantiling(a) => Aggregating::Quantiling(a.clone()),
            Aggregating::Bagging(a) => Aggregating::Bagging(a.clone()),
            Aggregating::Binning(a) => Aggregating::Binning(a.clone()),
            Aggregating::SparselyBinning(a) => Aggregating::SparselyBinning(a.clone()),
            Aggregating::CentrallyBinning(a) => Aggregating::CentrallyBinning(a.clone()),
            Aggregating::AdaptivelyBinning(a) => Aggregating::AdaptivelyBinning(a.clone()),
            Aggregating::Categorizing(a) => Aggregating::Categorizing(a.clone()),
            Aggregating::Selecting(a) => Aggregating::Selecting(a.clone()),
            Aggregating::Limiting(a) => Aggregating::Limiting(a.clone()),
            Aggregating::Fractioning(a) => Aggregating::Fractioning(a.clone()),
            Aggregating::Stacking(a) => Aggregating::Stacking(a.clone()),
            Aggregating::Partitioning(a) => Aggregating::Partitioning(a.clone()),
            Aggregating::Labeling(a) => Aggregating::Labeling(a.clone()),
            Aggregating::UntypedLabeling(a) => Aggregating::UntypedLabeling(a.clone()),
            Aggregating::Indexing(a) => Aggregating::Indexing(a.clone()),
            Aggregating::Branching(a) => Aggregating::Branching(a.clone()),
        }
    }
}

impl<D> fmt::Debug for Aggregating<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[entries={}]", self.tag(), self.entries())
    }
}

/// A past-tense aggregator: immutable, serializable, comparable.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregated {
    Counted(Counted),
    Summed(Summed),
    Averaged(Averaged),
    Deviated(Deviated),
    AbsoluteErred(AbsoluteErred),
    Minimized(Minimized),
    Maximized(Maximized),
    Quantiled(Quantiled),
    Bagged(Bagged),
    Binned(Binned),
    SparselyBinned(SparselyBinned),
    CentrallyBinned(CentrallyBinned),
    AdaptivelyBinned(AdaptivelyBinned),
    Categorized(Categorized),
    Selected(Selected),
    Limited(Limited),
    Fractioned(Fractioned),
    Stacked(Stacked),
    Partitioned(Partitioned),
    Labeled(Labeled),
    UntypedLabeled(UntypedLabeled),
    Indexed(Indexed),
    Branched(Branched),
}

impl Aggregated {
    /// The factory tag naming this primitive in JSON.
    pub fn tag(&self) -> &'static str {
        match self {
            Aggregated::Counted(_) => count::TAG,
            Aggregated::Summed(_) => sum::TAG,
            Aggregated::Averaged(_) => average::TAG,
            Aggregated::Deviated(_) => deviate::TAG,
            Aggregated::AbsoluteErred(_) => absoluteerr::TAG,
            Aggregated::Minimized(_) => minmax::MIN_TAG,
            Aggregated::Maximized(_) => minmax::MAX_TAG,
            Aggregated::Quantiled(_) => quantile::TAG,
            Aggregated::Bagged(_) => bag::TAG,
            Aggregated::Binned(_) => bin::TAG,
            Aggregated::SparselyBinned(_) => sparselybin::TAG,
            Aggregated::CentrallyBinned(_) => centrallybin::TAG,
            Aggregated::AdaptivelyBinned(_) => adaptivelybin::TAG,
            Aggregated::Categorized(_) => categorize::TAG,
            Aggregated::Selected(_) => select::TAG,
            Aggregated::Limited(_) => limit::TAG,
            Aggregated::Fractioned(_) => fraction::TAG,
            Aggregated::Stacked(_) => stack::TAG,
            Aggregated::Partitioned(_) => partition::TAG,
            Aggregated::Labeled(_) => collection::LABEL_TAG,
            Aggregated::UntypedLabeled(_) => collection::UNTYPED_LABEL_TAG,
            Aggregated::Indexed(_) => collection::INDEX_TAG,
            Aggregated::Branched(_) => collection::BRANCH_TAG,
        }
    }

    /// The sum of weights routed into this node.
    pub fn entries(&self) -> f64 {
        match self {
            Aggregated::Counted(a) => a.entries(),
            Aggregated::Summed(a) => a.entries(),
            Aggregated::Averaged(a) => a.entries(),
            Aggregated::Deviated(a) => a.entries(),
            Aggregated::AbsoluteErred(a) => a.entries(),
            Aggregated::Minimized(a) => a.entries(),
            Aggregated::Maximized(a) => a.entries(),
            Aggregated::Quantiled(a) => a.entries(),
            Aggregated::Bagged(a) => a.entries(),
            Aggregated::Binned(a) => a.entries(),
            Aggregated::SparselyBinned(a) => a.entries(),
            Aggregated::CentrallyBinned(a) => a.entries(),
            Aggregated::AdaptivelyBinned(a) => a.entries(),
            Aggregated::Categorized(a) => a.entries(),
            Aggregated::Selected(a) => a.entries(),
            Aggregated::Limited(a) => a.entries(),
            Aggregated::Fractioned(a) => a.entries(),
            Aggregated::Stacked(a) => a.entries(),
            Aggregated::Partitioned(a) => a.entries(),
            Aggregated::Labeled(a) => a.entries(),
            Aggregated::UntypedLabeled(a) => a.entries(),
            Aggregated::Indexed(a) => a.entries(),
            Aggregated::Branched(a) => a.entries(),
        }
    }

    /// Associative, commutative combine of two past-tense trees.
    pub fn merge(&self, other: &Self) -> HgResult<Self> {
        match (self, other) {
            (Aggregated::Counted(a), Aggregated::Counted(b)) => Ok(Aggregated::Counted(a.merge(b))),
            (Aggregated::Summed(a), Aggregated::Summed(b)) => Ok(Aggregated::Summed(a.merge(b)?)),
            (Aggregated::Averaged(a), Aggregated::Averaged(b)) => {
                Ok(Aggregated::Averaged(a.merge(b)?))
            }
            (Aggregated::Deviated(a), Aggregated::Deviated(b)) => {
                Ok(Aggregated::Deviated(a.merge(b)?))
            }
            (Aggregated::AbsoluteErred(a), Aggregated::AbsoluteErred(b)) => {
                Ok(Aggregated::AbsoluteErred(a.merge(b)?))
            }
            (Aggregated::Minimized(a), Aggregated::Minimized(b)) => {
                Ok(Aggregated::Minimized(a.merge(b)?))
            }
            (Aggregated::Maximized(a), Aggregated::Maximized(b)) => {
                Ok(Aggregated::Maximized(a.merge(b)?))
            }
            (Aggregated::Quantiled(a), Aggregated::Quantiled(b)) => {
                Ok(Aggregated::Quantiled(a.merge(b)?))
            }
            (Aggregated::Bagged(a), Aggregated::Bagged(b)) => Ok(Aggregated::Bagged(a.merge(b)?)),
            (Aggregated::Binned(a), Aggregated::Binned(b)) => Ok(Aggregated::Binned(a.merge(b)?)),
            (Aggregated::SparselyBinned(a), Aggregated::SparselyBinned(b)) => {
                Ok(Aggregated::SparselyBinned(a.merge(b)?))
            }
            (Aggregated::CentrallyBinned(a), Aggregated::CentrallyBinned(b)) => {
                Ok(Aggregated::CentrallyBinned(a.merge(b)?))
            }
            (Aggregated::AdaptivelyBinned(a), Aggregated::AdaptivelyBinned(b)) => {
                Ok(Aggregated::AdaptivelyBinned(a.merge(b)?))
            }
            (Aggregated::Categorized(a), Aggregated::Categorized(b)) => {
                Ok(Aggregated::Categorized(a.merge(b)?))
            }
            (Aggregated::Selected(a), Aggregated::Selected(b)) => {
                Ok(Aggregated::Selected(a.merge(b)?))
            }
            (Aggregated::Limited(a), Aggregated::Limited(b)) => {
                Ok(Aggregated::Limited(a.merge(b)?))
            }
            (Aggregated::Fractioned(a), Aggregated::Fractioned(b)) => {
                Ok(Aggregated::Fractioned(a.merge(b)?))
            }
            (Aggregated::Stacked(a), Aggregated::Stacked(b)) => {
                Ok(Aggregated::Stacked(a.merge(b)?))
            }
            (Aggregated::Partitioned(a), Aggregated::Partitioned(b)) => {
                Ok(Aggregated::Partitioned(a.merge(b)?))
            }
            (Aggregated::Labeled(a), Aggregated::Labeled(b)) => {
                Ok(Aggregated::Labeled(a.merge(b)?))
            }
            (Aggregated::UntypedLabeled(a), Aggregated::UntypedLabeled(b)) => {
                Ok(Aggregated::UntypedLabeled(a.merge(b)?))
            }
            (Aggregated::Indexed(a), Aggregated::Indexed(b)) => {
                Ok(Aggregated::Indexed(a.merge(b)?))
            }
            (Aggregated::Branched(a), Aggregated::Branched(b)) => {
                Ok(Aggregated::Branched(a.merge(b)?))
            }
            (a, b) => Err(HgError::mismatch(format!(
                "cannot merge {} with {}",
                a.tag(),
                b.tag()
            ))),
        }
    }

    /// A neutral element of the same shape and configuration.
    pub fn zero(&self) -> Self {
        match self {
            Aggregated::Counted(a) => Aggregated::Counted(a.zero()),
            Aggregated::Summed(a) => Aggregated::Summed(a.zero()),
            Aggregated::Averaged(a) => Aggregated::Averaged(a.zero()),
            Aggregated::Deviated(a) => Aggregated::Deviated(a.zero()),
            Aggregated::AbsoluteErred(a) => Aggregated::AbsoluteErred(a.zero()),
            Aggregated::Minimized(a) => Aggregated::Minimized(a.zero()),
            Aggregated::Maximized(a) => Aggregated::Maximized(a.zero()),
            Aggregated::Quantiled(a) => Aggregated::Quantiled(a.zero()),
            Aggregated::Bagged(a) => Aggregated::Bagged(a.zero()),
            Aggregated::Binned(a) => Aggregated::Binned(a.zero()),
            Aggregated::SparselyBinned(a) => Aggregated::SparselyBinned(a.zero()),
            Aggregated::CentrallyBinned(a) => Aggregated::CentrallyBinned(a.zero()),
            Aggregated::AdaptivelyBinned(a) => Aggregated::AdaptivelyBinned(a.zero()),
            Aggregated::Categorized(a) => Aggregated::Categorized(a.zero()),
            Aggregated::Selected(a) => Aggregated::Selected(a.zero()),
            Aggregated::Limited(a) => Aggregated::Limited(a.zero()),
            Aggregated::Fractioned(a) => Aggregated::Fractioned(a.zero()),
            Aggregated::Stacked(a) => Aggregated::Stacked(a.zero()),
            Aggregated::Partitioned(a) => Aggregated::Partitioned(a.zero()),
            Aggregated::Labeled(a) => Aggregated::Labeled(a.zero()),
            Aggregated::UntypedLabeled(a) => Aggregated::UntypedLabeled(a.zero()),
            Aggregated::Indexed(a) => Aggregated::Indexed(a.zero()),
            Aggregated::Branched(a) => Aggregated::Branched(a.zero()),
        }
    }

    /// Immediate sub-aggregators, for cross-cutting tree walks.
    pub fn children(&self) -> Vec<&Aggregated> {
        match self {
            Aggregated::Counted(_)
            | Aggregated::Summed(_)
            | Aggregated::Averaged(_)
            | Aggregated::Deviated(_)
            | Aggregated::AbsoluteErred(_)
            | Aggregated::Minimized(_)
            | Aggregated::Maximized(_)
            | Aggregated::Quantiled(_)
            | Aggregated::Bagged(_) => Vec::new(),
            Aggregated::Binned(a) => a.children(),
            Aggregated::SparselyBinned(a) => a.children(),
            Aggregated::CentrallyBinned(a) => a.children(),
            Aggregated::AdaptivelyBinned(a) => a.children(),
            Aggregated::Categorized(a) => a.children(),
            Aggregated::Selected(a) => a.children(),
            Aggregated::Limited(a) => a.children(),
            Aggregated::Fractioned(a) => a.children(),
            Aggregated::Stacked(a) => a.children(),
            Aggregated::Partitioned(a) => a.children(),
            Aggregated::Labeled(a) => a.children(),
            Aggregated::UntypedLabeled(a) => a.children(),
            Aggregated::Indexed(a) => a.children(),
            Aggregated::Branched(a) => a.children(),
        }
    }

    /// The node's own quantity name, recorded once by some parents as a
    /// `<role>:name` sibling key.
    pub fn quantity_name(&self) -> Option<&str> {
        match self {
            Aggregated::Counted(_) => None,
            Aggregated::Summed(a) => a.name(),
            Aggregated::Averaged(a) => a.name(),
            Aggregated::Deviated(a) => a.name(),
            Aggregated::AbsoluteErred(a) => a.name(),
            Aggregated::Minimized(a) => a.name(),
            Aggregated::Maximized(a) => a.name(),
            Aggregated::Quantiled(a) => a.name(),
            Aggregated::Bagged(a) => a.name(),
            Aggregated::Binned(a) => a.name(),
            Aggregated::SparselyBinned(a) => a.name(),
            Aggregated::CentrallyBinned(a) => a.name(),
            Aggregated::AdaptivelyBinned(a) => a.name(),
            Aggregated::Categorized(a) => a.name(),
            Aggregated::Selected(a) => a.name(),
            Aggregated::Limited(_) => None,
            Aggregated::Fractioned(a) => a.name(),
            Aggregated::Stacked(a) => a.name(),
            Aggregated::Partitioned(a) => a.name(),
            Aggregated::Labeled(_) => None,
            Aggregated::UntypedLabeled(_) => None,
            Aggregated::Indexed(_) => None,
            Aggregated::Branched(_) => None,
        }
    }

    /// The primitive-specific JSON body, without the `{"type": ...}`
    /// wrapper. `suppress_name` omits this node's own `"name"` key when the
    /// parent records it once for a homogeneous family.
    pub fn to_json_fragment(&self, suppress_name: bool) -> Value {
        match self {
            Aggregated::Counted(a) => a.to_json_fragment(),
            Aggregated::Summed(a) => a.to_json_fragment(suppress_name),
            Aggregated::Averaged(a) => a.to_json_fragment(suppress_name),
            Aggregated::Deviated(a) => a.to_json_fragment(suppress_name),
            Aggregated::AbsoluteErred(a) => a.to_json_fragment(suppress_name),
            Aggregated::Minimized(a) => a.to_json_fragment(suppress_name),
            Aggregated::Maximized(a) => a.to_json_fragment(suppress_name),
            Aggregated::Quantiled(a) => a.to_json_fragment(suppress_name),
            Aggregated::Bagged(a) => a.to_json_fragment(suppress_name),
            Aggregated::Binned(a) => a.to_json_fragment(suppress_name),
            Aggregated::SparselyBinned(a) => a.to_json_fragment(suppress_name),
            Aggregated::CentrallyBinned(a) => a.to_json_fragment(suppress_name),
            Aggregated::AdaptivelyBinned(a) => a.to_json_fragment(suppress_name),
            Aggregated::Categorized(a) => a.to_json_fragment(suppress_name),
            Aggregated::Selected(a) => a.to_json_fragment(suppress_name),
            Aggregated::Limited(a) => a.to_json_fragment(suppress_name),
            Aggregated::Fractioned(a) => a.to_json_fragment(suppress_name),
            Aggregated::Stacked(a) => a.to_json_fragment(suppress_name),
            Aggregated::Partitioned(a) => a.to_json_fragment(suppress_name),
            Aggregated::Labeled(a) => a.to_json_fragment(suppress_name),
            Aggregated::UntypedLabeled(a) => a.to_json_fragment(suppress_name),
            Aggregated::Indexed(a) => a.to_json_fragment(suppress_name),
            Aggregated::Branched(a) => a.to_json_fragment(suppress_name),
        }
    }

    /// The complete document: `{"type": <tag>, "data": <fragment>}`.
    pub fn to_json_value(&self) -> Value {
        let mut obj = serde_json::Map::new();
        obj.insert("type".to_string(), Value::String(self.tag().to_string()));
        obj.insert("data".to_string(), self.to_json_fragment(false));
        Value::Object(obj)
    }

    /// Canonical JSON text. Identical trees serialize byte-identically.
    pub fn to_json(&self) -> String {
        self.to_json_value().to_string()
    }
}

/// Every built-in `(tag, deserializer)` pair, used to seed the registry.
pub(crate) fn builtin_factories() -> Vec<(&'static str, Deserializer)> {
    vec![
        (count::TAG, count::factory),
        (sum::TAG, sum::factory),
        (average::TAG, average::factory),
        (deviate::TAG, deviate::factory),
        (absoluteerr::TAG, absoluteerr::factory),
        (minmax::MIN_TAG, minmax::min_factory),
        (minmax::MAX_TAG, minmax::max_factory),
        (quantile::TAG, quantile::factory),
        (bag::TAG, bag::factory),
        (bin::TAG, bin::factory),
        (sparselybin::TAG, sparselybin::factory),
        (centrallybin::TAG, centrallybin::factory),
        (adaptivelybin::TAG, adaptivelybin::factory),
        (categorize::TAG, categorize::factory),
        (select::TAG, select::factory),
        (limit::TAG, limit::factory),
        (fraction::TAG, fraction::factory),
        (stack::TAG, stack::factory),
        (partition::TAG, partition::factory),
        (collection::LABEL_TAG, collection::label_factory),
        (collection::UNTYPED_LABEL_TAG, collection::untyped_label_factory),
        (collection::INDEX_TAG, collection::index_factory),
        (collection::BRANCH_TAG, collection::branch_factory),
    ]
}

macro_rules! impl_from_present {
    ($($struct_:ident),* $(,)?) => {
        $(
            impl<D> From<$struct_<D>> for Aggregating<D> {
                fn from(value: $struct_<D>) -> Self {
                    Aggregating::$struct_(value)
                }
            }
        )*
    };
}

impl_from_present!(
    Summing,
    Averaging,
    Deviating,
    AbsoluteErring,
    Minimizing,
    Maximizing,
    Quantiling,
    Bagging,
    Binning,
    SparselyBinning,
    CentrallyBinning,
    AdaptivelyBinning,
    Categorizing,
    Selecting,
    Limiting,
    Fractioning,
    Stacking,
    Partitioning,
    Labeling,
    UntypedLabeling,
    Indexing,
    Branching,
);

impl<D> From<Counting> for Aggregating<D> {
    fn from(value: Counting) -> Self {
        Aggregating::Counting(value)
    }
}

macro_rules! impl_from_past {
    ($($struct_:ident),* $(,)?) => {
        $(
            impl From<$struct_> for Aggregated {
                fn from(value: $struct_) -> Self {
                    Aggregated::$struct_(value)
                }
            }
        )*
    };
}

impl_from_past!(
    Counted,
    Summed,
    Averaged,
    Deviated,
    AbsoluteErred,
    Minimized,
    Maximized,
    Quantiled,
    Bagged,
    Binned,
    SparselyBinned,
    CentrallyBinned,
    AdaptivelyBinned,
    Categorized,
    Selected,
    Limited,
    Fractioned,
    Stacked,
    Partitioned,
    Labeled,
    UntypedLabeled,
    Indexed,
    Branched,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::Quantity;
    use crate::test_helpers::assert_exact;

    #[test]
    fn cross_variant_merges_are_structure_mismatches() {
        let count: Aggregating<f64> = Aggregating::count();
        let sum: Aggregating<f64> = Summing::new(Quantity::new(|x: &f64| *x)).into();
        let err = count.merge(&sum).expect_err("mismatch");
        assert!(matches!(err, HgError::StructureMismatch { .. }));

        let past_err = count
            .snapshot()
            .merge(&sum.snapshot())
            .expect_err("mismatch");
        assert!(matches!(past_err, HgError::StructureMismatch { .. }));
    }

    #[test]
    fn snapshot_freezes_the_current_state() {
        let mut sum: Aggregating<f64> = Summing::new(Quantity::new(|x: &f64| *x)).into();
        sum.fill(&2.0, 1.5).expect("fill");
        let frozen = sum.snapshot();
        sum.fill(&100.0, 1.0).expect("fill");

        assert_exact("frozen entries", 1.5, frozen.entries());
        assert_exact("live entries", 2.5, sum.entries());
    }

    #[test]
    fn children_walk_reaches_every_node() {
        let bin: Aggregating<f64> = Binning::new(
            3,
            0.0,
            3.0,
            Quantity::new(|x: &f64| *x),
            Aggregating::count(),
        )
        .expect("build")
        .into();

        // 3 values + underflow + overflow + nanflow
        assert_eq!(bin.children().len(), 6);
        assert_eq!(bin.snapshot().children().len(), 6);
    }
}
