//! Quantile: a single-point adaptive quantile estimate.
//!
//! A stochastic-approximation estimator: each fill nudges the estimate by a
//! learning rate derived from the running mean absolute deviation, signed so
//! the estimate drifts toward the `target` quantile of the stream. One value
//! of state per tree, no stored samples.

use ordered_float::OrderedFloat;
use serde_json::{Map, Value};

use crate::error::{HgError, HgResult};
use crate::json;
use crate::primitives::{merged_name, Aggregated};
use crate::quantity::Quantity;

pub(crate) const TAG: &str = "Quantile";

fn check_target(target: f64) -> HgResult<()> {
    if !(0.0..=1.0).contains(&target) {
        return Err(HgError::validation(format!(
            "Quantile target ({}) must be between 0 and 1, inclusive",
            target
        )));
    }
    Ok(())
}

/// Entries-weighted combination of two estimates, where NaN means "no
/// observation yet" and defers to the other side.
fn combine_estimates(ea: f64, qa: f64, eb: f64, qb: f64) -> f64 {
    if qa.is_nan() {
        qb
    } else if qb.is_nan() {
        qa
    } else if ea > 0.0 && eb > 0.0 {
        (qa * ea + qb * eb) / (ea + eb)
    } else if ea > 0.0 {
        qa
    } else if eb > 0.0 {
        qb
    } else if qa == qb {
        qa
    } else {
        f64::NAN
    }
}

/// Present-tense quantile estimator.
pub struct Quantiling<D> {
    pub(crate) quantity: Quantity<D, f64>,
    pub(crate) target: f64,
    pub(crate) entries: f64,
    pub(crate) estimate: f64,
    cumulative_deviation: f64,
}

impl<D> Quantiling<D> {
    pub fn new(target: f64, quantity: Quantity<D, f64>) -> HgResult<Self> {
        check_target(target)?;
        Ok(Quantiling {
            quantity,
            target,
            entries: 0.0,
            estimate: f64::NAN,
            cumulative_deviation: 0.0,
        })
    }

    pub(crate) fn fill(&mut self, datum: &D, weight: f64) {
        if weight > 0.0 {
            let q = self.quantity.eval(datum);
            self.entries += weight;
            if self.estimate.is_nan() {
                self.estimate = q;
            } else {
                self.cumulative_deviation += (q - self.estimate).abs();
                let rate = 1.5 * self.cumulative_deviation / (self.entries * self.entries);
                let sgn = if q < self.estimate {
                    -1.0
                } else if q > self.estimate {
                    1.0
                } else {
                    0.0
                };
                self.estimate += weight * rate * (sgn + 2.0 * self.target - 1.0);
            }
        }
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.target != other.target {
            return Err(HgError::mismatch(format!(
                "Quantile targets do not match ({} vs {})",
                self.target, other.target
            )));
        }
        Ok(Quantiling {
            quantity: self.quantity.merge_with(&other.quantity)?,
            target: self.target,
            entries: self.entries + other.entries,
            estimate: combine_estimates(self.entries, self.estimate, other.entries, other.estimate),
            cumulative_deviation: self.cumulative_deviation + other.cumulative_deviation,
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Quantiling {
            quantity: self.quantity.clone(),
            target: self.target,
            entries: 0.0,
            estimate: f64::NAN,
            cumulative_deviation: 0.0,
        }
    }

    pub(crate) fn snapshot(&self) -> Quantiled {
        Quantiled {
            name: self.quantity.name().map(str::to_string),
            target: OrderedFloat(self.target),
            entries: OrderedFloat(self.entries),
            estimate: OrderedFloat(self.estimate),
        }
    }
}

impl<D> Clone for Quantiling<D> {
    fn clone(&self) -> Self {
        Quantiling {
            quantity: self.quantity.clone(),
            target: self.target,
            entries: self.entries,
            estimate: self.estimate,
            cumulative_deviation: self.cumulative_deviation,
        }
    }
}

/// Past-tense quantile estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantiled {
    pub(crate) name: Option<String>,
    pub(crate) target: OrderedFloat<f64>,
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) estimate: OrderedFloat<f64>,
}

impl Quantiled {
    pub fn new(entries: f64, target: f64, estimate: f64) -> HgResult<Self> {
        if entries < 0.0 {
            return Err(HgError::validation(format!(
                "Quantile entries ({}) cannot be negative",
                entries
            )));
        }
        check_target(target)?;
        Ok(Quantiled {
            name: None,
            target: OrderedFloat(target),
            entries: OrderedFloat(entries),
            estimate: OrderedFloat(estimate),
        })
    }

    #[inline]
    pub fn entries(&self) -> f64 {
        self.entries.into_inner()
    }

    #[inline]
    pub fn target(&self) -> f64 {
        self.target.into_inner()
    }

    #[inline]
    pub fn estimate(&self) -> f64 {
        self.estimate.into_inner()
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.target != other.target {
            return Err(HgError::mismatch(format!(
                "Quantile targets do not match ({} vs {})",
                self.target(),
                other.target()
            )));
        }
        Ok(Quantiled {
            name: merged_name(self.name(), other.name(), TAG)?,
            target: self.target,
            entries: OrderedFloat(self.entries() + other.entries()),
            estimate: OrderedFloat(combine_estimates(
                self.entries(),
                self.estimate(),
                other.entries(),
                other.estimate(),
            )),
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Quantiled {
            name: self.name.clone(),
            target: self.target,
            entries: OrderedFloat(0.0),
            estimate: OrderedFloat(f64::NAN),
        }
    }

    pub(crate) fn to_json_fragment(&self, suppress_name: bool) -> Value {
        let mut obj = Map::new();
        obj.insert("entries".to_string(), json::float_to_json(self.entries()));
        obj.insert("target".to_string(), json::float_to_json(self.target()));
        obj.insert("estimate".to_string(), json::float_to_json(self.estimate()));
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
        json::check_keys(obj, &["entries", "target", "estimate"], &["name"], TAG)?;
        let mut out = Quantiled::new(
            json::get_f64(obj, "entries", TAG)?,
            json::get_f64(obj, "target", TAG)?,
            json::get_f64(obj, "estimate", TAG)?,
        )?;
        out.name = json::get_opt_name(obj, TAG)?
            .or_else(|| name_from_parent.map(str::to_string));
        Ok(out)
    }
}

pub(crate) fn factory(value: &Value, name_from_parent: Option<&str>) -> HgResult<Aggregated> {
    Quantiled::from_json_fragment(value, name_from_parent).map(Aggregated::Quantiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::assert_rel_close;

    #[test]
    fn rejects_targets_outside_the_unit_interval() {
        assert!(Quantiling::new(-0.1, Quantity::new(|x: &f64| *x)).is_err());
        assert!(Quantiling::new(1.1, Quantity::new(|x: &f64| *x)).is_err());
        assert!(Quantiled::new(1.0, 2.0, 0.0).is_err());
    }

    #[test]
    fn median_estimate_lands_near_the_true_median() {
        let mut q = Quantiling::new(0.5, Quantity::new(|x: &f64| *x)).expect("build");
        // Deterministic low-discrepancy stream over (0, 100).
        for i in 0..10_000u64 {
            let x = (i as f64 * 0.618_033_988_749_895).fract() * 100.0;
            q.fill(&x, 1.0);
        }
        assert_rel_close("median", 50.0, q.estimate, 0.15);
    }

    #[test]
    fn merge_requires_matching_targets_and_averages_estimates() {
        let a = Quantiled::new(4.0, 0.5, 10.0).expect("a");
        let b = Quantiled::new(12.0, 0.5, 20.0).expect("b");
        let m = a.merge(&b).expect("merge");
        assert_rel_close("estimate", (10.0 * 4.0 + 20.0 * 12.0) / 16.0, m.estimate(), 1e-12);

        let c = Quantiled::new(1.0, 0.9, 5.0).expect("c");
        assert!(a.merge(&c).is_err());
    }

    #[test]
    fn nan_estimate_defers_to_the_filled_side() {
        let fresh = Quantiled::new(0.0, 0.5, f64::NAN).expect("fresh");
        let filled = Quantiled::new(3.0, 0.5, 42.0).expect("filled");
        let m = fresh.merge(&filled).expect("merge");
        assert_eq!(m.estimate(), 42.0);
    }
}
