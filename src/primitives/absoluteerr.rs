//! AbsoluteErr: the weighted mean of `|quantity|`.

use ordered_float::OrderedFloat;
use serde_json::{Map, Value};

use crate::error::{HgError, HgResult};
use crate::json;
use crate::primitives::average::combine_means;
use crate::primitives::{merged_name, Aggregated};
use crate::quantity::Quantity;

pub(crate) const TAG: &str = "AbsoluteErr";

/// Present-tense absolute-error accumulator.
pub struct AbsoluteErring<D> {
    pub(crate) quantity: Quantity<D, f64>,
    pub(crate) entries: f64,
    pub(crate) absolute_sum: f64,
}

impl<D> AbsoluteErring<D> {
    pub fn new(quantity: Quantity<D, f64>) -> Self {
        AbsoluteErring {
            quantity,
            entries: 0.0,
            absolute_sum: 0.0,
        }
    }

    /// Weighted mean absolute value of everything filled so far.
    pub fn mae(&self) -> f64 {
        if self.entries == 0.0 {
            self.absolute_sum
        } else {
            self.absolute_sum / self.entries
        }
    }

    pub(crate) fn fill(&mut self, datum: &D, weight: f64) {
        if weight > 0.0 {
            let q = self.quantity.eval(datum);
            self.entries += weight;
            self.absolute_sum += weight * q.abs();
        }
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        Ok(AbsoluteErring {
            quantity: self.quantity.merge_with(&other.quantity)?,
            entries: self.entries + other.entries,
            absolute_sum: self.absolute_sum + other.absolute_sum,
        })
    }

    pub(crate) fn zero(&self) -> Self {
        AbsoluteErring::new(self.quantity.clone())
    }

    pub(crate) fn snapshot(&self) -> AbsoluteErred {
        AbsoluteErred {
            name: self.quantity.name().map(str::to_string),
            entries: OrderedFloat(self.entries),
            mae: OrderedFloat(self.mae()),
        }
    }
}

impl<D> Clone for AbsoluteErring<D> {
    fn clone(&self) -> Self {
        AbsoluteErring {
            quantity: self.quantity.clone(),
            entries: self.entries,
            absolute_sum: self.absolute_sum,
        }
    }
}

/// Past-tense absolute-error summary.
#[derive(Debug, Clone, PartialEq)]
pub struct AbsoluteErred {
    pub(crate) name: Option<String>,
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) mae: OrderedFloat<f64>,
}

impl AbsoluteErred {
    pub fn new(entries: f64, mae: f64) -> HgResult<Self> {
        if entries < 0.0 {
            return Err(HgError::validation(format!(
                "AbsoluteErr entries ({}) cannot be negative",
                entries
            )));
        }
        Ok(AbsoluteErred {
            name: None,
            entries: OrderedFloat(entries),
            mae: OrderedFloat(mae),
        })
    }

    #[inline]
    pub fn entries(&self) -> f64 {
        self.entries.into_inner()
    }

    #[inline]
    pub fn mae(&self) -> f64 {
        self.mae.into_inner()
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        Ok(AbsoluteErred {
            name: merged_name(self.name(), other.name(), TAG)?,
            entries: OrderedFloat(self.entries() + other.entries()),
            mae: OrderedFloat(combine_means(
                self.entries(),
                self.mae(),
                other.entries(),
                other.mae(),
            )),
        })
    }

    pub(crate) fn zero(&self) -> Self {
        AbsoluteErred {
            name: self.name.clone(),
            entries: OrderedFloat(0.0),
            mae: OrderedFloat(0.0),
        }
    }

    pub(crate) fn to_json_fragment(&self, suppress_name: bool) -> Value {
        let mut obj = Map::new();
        obj.insert("entries".to_string(), json::float_to_json(self.entries()));
        obj.insert("mae".to_string(), json::float_to_json(self.mae()));
        if !suppress_name {
            if let Some(name) = self.name() {
                obj.insert("name".to_string(), Value::String(name.to_string()));
            }
        }
        Value::Object(obj)
    }

    pub(crate) fn from_json_fragment(
        value: &Value,
        name_from_parent: Option<&str>,
    ) -> HgResult<Self> {
        let obj = json::object(value, TAG)?;
        json::check_keys(obj, &["entries", "mae"], &["name"], TAG)?;
        let mut out = AbsoluteErred::new(
            json::get_f64(obj, "entries", TAG)?,
            json::get_f64(obj, "mae", TAG)?,
        )?;
        out.name = json::get_opt_name(obj, TAG)?
            .or_else(|| name_from_parent.map(str::to_string));
        Ok(out)
    }
}

pub(crate) fn factory(value: &Value, name_from_parent: Option<&str>) -> HgResult<Aggregated> {
    AbsoluteErred::from_json_fragment(value, name_from_parent).map(Aggregated::AbsoluteErred)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::assert_exact;

    #[test]
    fn mae_weights_absolute_values() {
        let mut a = AbsoluteErring::new(Quantity::new(|x: &f64| *x));
        a.fill(&-3.0, 1.0);
        a.fill(&1.0, 3.0);
        assert_exact("entries", 4.0, a.entries);
        assert_exact("mae", (3.0 + 3.0) / 4.0, a.mae());
    }

    #[test]
    fn merge_recovers_the_pooled_mae() {
        let a = AbsoluteErred::new(2.0, 3.0).expect("a");
        let b = AbsoluteErred::new(6.0, 1.0).expect("b");
        let m = a.merge(&b).expect("merge");
        assert_exact("mae", (2.0 * 3.0 + 6.0 * 1.0) / 8.0, m.mae());
    }
}
