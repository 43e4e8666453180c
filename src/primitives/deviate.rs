//! Deviate: weighted mean and variance in one pass.
//!
//! Filling uses the Welford update; merging uses the Chan parallel-variance
//! combine on `variance * entries`, so shard results agree with a single
//! sequential fill up to rounding.

use ordered_float::OrderedFloat;
use serde_json::{Map, Value};

use crate::error::{HgError, HgResult};
use crate::json;
use crate::primitives::average::combine_means;
use crate::primitives::{merged_name, Aggregated};
use crate::quantity::Quantity;

pub(crate) const TAG: &str = "Deviate";

/// Chan's parallel combine on `variance * entries`. The cross term is
/// symmetric in both arguments, so merges commute bit-for-bit; an empty side
/// contributes nothing.
fn combine_variance_times_entries(
    ea: f64,
    ma: f64,
    vte_a: f64,
    eb: f64,
    mb: f64,
    vte_b: f64,
) -> f64 {
    if ea > 0.0 && eb > 0.0 {
        let delta = mb - ma;
        vte_a + vte_b + delta * delta * ea * eb / (ea + eb)
    } else {
        vte_a + vte_b
    }
}

/// Present-tense mean-and-variance accumulator.
pub struct Deviating<D> {
    pub(crate) quantity: Quantity<D, f64>,
    pub(crate) entries: f64,
    pub(crate) mean: f64,
    pub(crate) variance_times_entries: f64,
}

impl<D> Deviating<D> {
    pub fn new(quantity: Quantity<D, f64>) -> Self {
        Deviating {
            quantity,
            entries: 0.0,
            mean: 0.0,
            variance_times_entries: 0.0,
        }
    }

    /// Weighted population variance of everything filled so far.
    pub fn variance(&self) -> f64 {
        if self.entries == 0.0 {
            self.variance_times_entries
        } else {
            self.variance_times_entries / self.entries
        }
    }

    pub(crate) fn fill(&mut self, datum: &D, weight: f64) {
        if weight > 0.0 {
            let q = self.quantity.eval(datum);
            self.entries += weight;
            let delta = q - self.mean;
            self.mean += delta * weight / self.entries;
            self.variance_times_entries += weight * delta * (q - self.mean);
        }
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        Ok(Deviating {
            quantity: self.quantity.merge_with(&other.quantity)?,
            entries: self.entries + other.entries,
            mean: combine_means(self.entries, self.mean, other.entries, other.mean),
            variance_times_entries: combine_variance_times_entries(
                self.entries,
                self.mean,
                self.variance_times_entries,
                other.entries,
                other.mean,
                other.variance_times_entries,
            ),
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Deviating::new(self.quantity.clone())
    }

    pub(crate) fn snapshot(&self) -> Deviated {
        Deviated {
            name: self.quantity.name().map(str::to_string),
            entries: OrderedFloat(self.entries),
            mean: OrderedFloat(self.mean),
            variance: OrderedFloat(self.variance()),
        }
    }
}

impl<D> Clone for Deviating<D> {
    fn clone(&self) -> Self {
        Deviating {
            quantity: self.quantity.clone(),
            entries: self.entries,
            mean: self.mean,
            variance_times_entries: self.variance_times_entries,
        }
    }
}

/// Past-tense mean-and-variance summary.
#[derive(Debug, Clone, PartialEq)]
pub struct Deviated {
    pub(crate) name: Option<String>,
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) mean: OrderedFloat<f64>,
    pub(crate) variance: OrderedFloat<f64>,
}

impl Deviated {
    pub fn new(entries: f64, mean: f64, variance: f64) -> HgResult<Self> {
        if entries < 0.0 {
            return Err(HgError::validation(format!(
                "Deviate entries ({}) cannot be negative",
                entries
            )));
        }
        Ok(Deviated {
            name: None,
            entries: OrderedFloat(entries),
            mean: OrderedFloat(mean),
            variance: OrderedFloat(variance),
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
    pub fn variance(&self) -> f64 {
        self.variance.into_inner()
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        let (ea, eb) = (self.entries(), other.entries());
        let mean = combine_means(ea, self.mean(), eb, other.mean());
        // An empty side must pass the other variance through untouched, or
        // merging with a zero tree would perturb the last bit.
        let variance = if ea > 0.0 && eb > 0.0 {
            combine_variance_times_entries(
                ea,
                self.mean(),
                self.variance() * ea,
                eb,
                other.mean(),
                other.variance() * eb,
            ) / (ea + eb)
        } else if ea > 0.0 {
            self.variance()
        } else if eb > 0.0 {
            other.variance()
        } else if self.variance == other.variance {
            self.variance()
        } else {
            f64::NAN
        };
        Ok(Deviated {
            name: merged_name(self.name(), other.name(), TAG)?,
            entries: OrderedFloat(ea + eb),
            mean: OrderedFloat(mean),
            variance: OrderedFloat(variance),
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Deviated {
            name: self.name.clone(),
            entries: OrderedFloat(0.0),
            mean: OrderedFloat(0.0),
            variance: OrderedFloat(0.0),
        }
    }

    pub(crate) fn to_json_fragment(&self, suppress_name: bool) -> Value {
        let mut obj = Map::new();
        obj.insert("entries".to_string(), json::float_to_json(self.entries()));
        obj.insert("mean".to_string(), json::float_to_json(self.mean()));
        obj.insert("variance".to_string(), json::float_to_json(self.variance()));
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
        json::check_keys(obj, &["entries", "mean", "variance"], &["name"], TAG)?;
        let mut out = Deviated::new(
            json::get_f64(obj, "entries", TAG)?,
            json::get_f64(obj, "mean", TAG)?,
            json::get_f64(obj, "variance", TAG)?,
        )?;
        out.name = json::get_opt_name(obj, TAG)?
            .or_else(|| name_from_parent.map(str::to_string));
        Ok(out)
    }
}

pub(crate) fn factory(value: &Value, name_from_parent: Option<&str>) -> HgResult<Aggregated> {
    Deviated::from_json_fragment(value, name_from_parent).map(Aggregated::Deviated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::assert_rel_close;

    fn filled(values: &[f64]) -> Deviating<f64> {
        let mut d = Deviating::new(Quantity::new(|x: &f64| *x));
        for v in values {
            d.fill(v, 1.0);
        }
        d
    }

    #[test]
    fn welford_matches_two_pass_variance() {
        let values = [1.0, 2.0, 3.0, 4.0, 100.0];
        let d = filled(&values);

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        assert_rel_close("mean", mean, d.mean, 1e-12);
        assert_rel_close("variance", var, d.variance(), 1e-12);
    }

    #[test]
    fn sharded_fill_then_merge_equals_sequential_fill() {
        let values: Vec<f64> = (0..100).map(|i| (i as f64).sin() * 10.0).collect();
        let whole = filled(&values);
        let left = filled(&values[..37]);
        let right = filled(&values[37..]);
        let merged = left.merge(&right).expect("merge");

        assert_rel_close("mean", whole.mean, merged.mean, 1e-9);
        assert_rel_close("variance", whole.variance(), merged.variance(), 1e-9);
    }

    #[test]
    fn variance_is_nonnegative_after_merges() {
        let a = filled(&[5.0, 5.0, 5.0]);
        let b = filled(&[5.0]);
        let m = a.merge(&b).expect("merge");
        assert!(m.variance() >= 0.0 || m.variance().abs() < 1e-12);
    }
}
