//! Average: a numerically stable weighted mean.
//!
//! The running update shifts the mean by `delta * weight / entries` instead
//! of accumulating raw moments, so long fills do not lose precision.

use ordered_float::OrderedFloat;
use serde_json::{Map, Value};

use crate::error::{HgError, HgResult};
use crate::json;
use crate::primitives::{merged_name, Aggregated};
use crate::quantity::Quantity;

pub(crate) const TAG: &str = "Average";

/// Entries-weighted combination of two means.
///
/// An empty side passes the other mean through untouched, so merging with a
/// zero tree reproduces the original bit-for-bit. When both sides are empty
/// a shared value is kept and disagreement yields NaN.
pub(crate) fn combine_means(ea: f64, ma: f64, eb: f64, mb: f64) -> f64 {
    if ea > 0.0 && eb > 0.0 {
        (ea * ma + eb * mb) / (ea + eb)
    } else if ea > 0.0 {
        ma
    } else if eb > 0.0 {
        mb
    } else if ma == mb || (ma.is_nan() && mb.is_nan()) {
        ma
    } else {
        f64::NAN
    }
}

/// Present-tense averager.
pub struct Averaging<D> {
    pub(crate) quantity: Quantity<D, f64>,
    pub(crate) entries: f64,
    pub(crate) mean: f64,
}

impl<D> Averaging<D> {
    pub fn new(quantity: Quantity<D, f64>) -> Self {
        Averaging {
            quantity,
            entries: 0.0,
            mean: 0.0,
        }
    }

    pub(crate) fn fill(&mut self, datum: &D, weight: f64) {
        if weight > 0.0 {
            let q = self.quantity.eval(datum);
            self.entries += weight;
            let delta = q - self.mean;
            self.mean += delta * weight / self.entries;
        }
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        Ok(Averaging {
            quantity: self.quantity.merge_with(&other.quantity)?,
            entries: self.entries + other.entries,
            mean: combine_means(self.entries, self.mean, other.entries, other.mean),
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Averaging::new(self.quantity.clone())
    }

    pub(crate) fn snapshot(&self) -> Averaged {
        Averaged {
            name: self.quantity.name().map(str::to_string),
            entries: OrderedFloat(self.entries),
            mean: OrderedFloat(self.mean),
        }
    }
}

impl<D> Clone for Averaging<D> {
    fn clone(&self) -> Self {
        Averaging {
            quantity: self.quantity.clone(),
            entries: self.entries,
            mean: self.mean,
        }
    }
}

/// Past-tense averager.
#[derive(Debug, Clone, PartialEq)]
pub struct Averaged {
    pub(crate) name: Option<String>,
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) mean: OrderedFloat<f64>,
}

impl Averaged {
    pub fn new(entries: f64, mean: f64) -> HgResult<Self> {
        if entries < 0.0 {
            return Err(HgError::validation(format!(
                "Average entries ({}) cannot be negative",
                entries
            )));
        }
        Ok(Averaged {
            name: None,
            entries: OrderedFloat(entries),
            mean: OrderedFloat(mean),
        })
    }

    #[inline]
    pub fn entries(&self) -> f64 {
        self.entries.into_inner()
    }

    #[inline]
    pub fn mean(&self) -> f64 {
        self.mean.into_inner()
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        Ok(Averaged {
            name: merged_name(self.name(), other.name(), TAG)?,
            entries: OrderedFloat(self.entries() + other.entries()),
            mean: OrderedFloat(combine_means(
                self.entries(),
                self.mean(),
                other.entries(),
                other.mean(),
            )),
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Averaged {
            name: self.name.clone(),
            entries: OrderedFloat(0.0),
            mean: OrderedFloat(0.0),
        }
    }

    pub(crate) fn to_json_fragment(&self, suppress_name: bool) -> Value {
        let mut obj = Map::new();
        obj.insert("entries".to_string(), json::float_to_json(self.entries()));
        obj.insert("mean".to_string(), json::float_to_json(self.mean()));
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
        json::check_keys(obj, &["entries", "mean"], &["name"], TAG)?;
        let mut out = Averaged::new(
            json::get_f64(obj, "entries", TAG)?,
            json::get_f64(obj, "mean", TAG)?,
        )?;
        out.name = json::get_opt_name(obj, TAG)?
            .or_else(|| name_from_parent.map(str::to_string));
        Ok(out)
    }
}

pub(crate) fn factory(value: &Value, name_from_parent: Option<&str>) -> HgResult<Aggregated> {
    Averaged::from_json_fragment(value, name_from_parent).map(Aggregated::Averaged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{assert_exact, assert_rel_close};

    #[test]
    fn running_mean_matches_direct_weighted_mean() {
        let mut a = Averaging::new(Quantity::new(|x: &f64| *x));
        let data = [(1.0, 1.0), (2.0, 2.0), (10.0, 0.5)];
        for (q, w) in data {
            a.fill(&q, w);
        }
        let total_w: f64 = data.iter().map(|(_, w)| w).sum();
        let direct: f64 = data.iter().map(|(q, w)| q * w).sum::<f64>() / total_w;
        assert_exact("entries", total_w, a.entries);
        assert_rel_close("mean", direct, a.mean, 1e-12);
    }

    #[test]
    fn merge_weights_means_by_entries() {
        let a = Averaged::new(2.0, 1.0).expect("a");
        let b = Averaged::new(6.0, 5.0).expect("b");
        let m = a.merge(&b).expect("merge");
        assert_exact("entries", 8.0, m.entries());
        assert_exact("mean", (2.0 * 1.0 + 6.0 * 5.0) / 8.0, m.mean());
    }

    #[test]
    fn empty_merge_keeps_shared_mean_and_poisons_disagreement() {
        let zero = Averaged::new(0.0, 0.0).expect("zero");
        let m = zero.merge(&zero).expect("merge");
        assert_exact("mean", 0.0, m.mean());

        let odd = Averaged::new(0.0, 3.0).expect("odd");
        assert!(zero.merge(&odd).expect("merge").mean().is_nan());
    }
}
