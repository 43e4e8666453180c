//! Count: the sum of weights routed into a node.
//!
//! The simplest primitive and the default sub-aggregator of every binning
//! container. Its JSON fragment is a bare number.

use ordered_float::OrderedFloat;
use serde_json::Value;

use crate::error::{HgError, HgResult};
use crate::json;
use crate::primitives::Aggregated;

pub(crate) const TAG: &str = "Count";

/// Present-tense counter.
pub struct Counting {
    pub(crate) entries: f64,
}

impl Counting {
    pub fn new() -> Self {
        Counting { entries: 0.0 }
    }

    pub(crate) fn fill(&mut self, weight: f64) {
        if weight > 0.0 {
            self.entries += weight;
        }
    }

    pub(crate) fn merge(&self, other: &Self) -> Self {
        Counting {
            entries: self.entries + other.entries,
        }
    }

    pub(crate) fn zero(&self) -> Self {
        Counting::new()
    }

    pub(crate) fn snapshot(&self) -> Counted {
        Counted {
            entries: OrderedFloat(self.entries),
        }
    }
}

impl Default for Counting {
    fn default() -> Self {
        Counting::new()
    }
}

impl Clone for Counting {
    fn clone(&self) -> Self {
        Counting {
            entries: self.entries,
        }
    }
}

/// Past-tense counter.
#[derive(Debug, Clone, PartialEq)]
pub struct Counted {
    pub(crate) entries: OrderedFloat<f64>,
}

impl Counted {
    pub fn new(entries: f64) -> HgResult<Self> {
        if entries < 0.0 {
            return Err(HgError::validation(format!(
                "Count entries ({}) cannot be negative",
                entries
            )));
        }
        Ok(Counted {
            entries: OrderedFloat(entries),
        })
    }

    #[inline]
    pub fn entries(&self) -> f64 {
        self.entries.into_inner()
    }

    pub(crate) fn merge(&self, other: &Self) -> Self {
        Counted {
            entries: OrderedFloat(self.entries() + other.entries()),
        }
    }

    pub(crate) fn zero(&self) -> Self {
        Counted {
            entries: OrderedFloat(0.0),
        }
    }

    pub(crate) fn to_json_fragment(&self) -> Value {
        json::float_to_json(self.entries())
    }

    pub(crate) fn from_json_fragment(value: &Value) -> HgResult<Self> {
        let entries = json::float_from_json(value, "Count")?;
        Counted::new(entries)
    }
}

pub(crate) fn factory(value: &Value, _name_from_parent: Option<&str>) -> HgResult<Aggregated> {
    Counted::from_json_fragment(value).map(Aggregated::Counted)
}
