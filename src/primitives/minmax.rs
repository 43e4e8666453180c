//! Minimize and Maximize: weighted extremes of a quantity.
//!
//! Both report NaN until something has been filled. The NaN-absorbing
//! combines here are also used by the center-tracked binners for their
//! observed ranges.

use ordered_float::OrderedFloat;
use serde_json::{Map, Value};

use crate::error::{HgError, HgResult};
use crate::json;
use crate::primitives::{merged_name, Aggregated};
use crate::quantity::Quantity;

pub(crate) const MIN_TAG: &str = "Minimize";
pub(crate) const MAX_TAG: &str = "Maximize";

/// Minimum of two values where NaN means "nothing observed yet".
pub(crate) fn minplus(x: f64, y: f64) -> f64 {
    if x.is_nan() {
        y
    } else if y.is_nan() {
        x
    } else if x < y {
        x
    } else {
        y
    }
}

/// Maximum of two values where NaN means "nothing observed yet".
pub(crate) fn maxplus(x: f64, y: f64) -> f64 {
    if x.is_nan() {
        y
    } else if y.is_nan() {
        x
    } else if x > y {
        x
    } else {
        y
    }
}

/// Present-tense minimizer.
pub struct Minimizing<D> {
    pub(crate) quantity: Quantity<D, f64>,
    pub(crate) entries: f64,
    pub(crate) min: f64,
}

impl<D> Minimizing<D> {
    pub fn new(quantity: Quantity<D, f64>) -> Self {
        Minimizing {
            quantity,
            entries: 0.0,
            min: f64::NAN,
        }
    }

    pub(crate) fn fill(&mut self, datum: &D, weight: f64) {
        if weight > 0.0 {
            let q = self.quantity.eval(datum);
            self.entries += weight;
            if self.min.is_nan() || q < self.min {
                self.min = q;
            }
        }
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        Ok(Minimizing {
            quantity: self.quantity.merge_with(&other.quantity)?,
            entries: self.entries + other.entries,
            min: minplus(self.min, other.min),
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Minimizing::new(self.quantity.clone())
    }

    pub(crate) fn snapshot(&self) -> Minimized {
        Minimized {
            name: self.quantity.name().map(str::to_string),
            entries: OrderedFloat(self.entries),
            min: OrderedFloat(self.min),
        }
    }
}

impl<D> Clone for Minimizing<D> {
    fn clone(&self) -> Self {
        Minimizing {
            quantity: self.quantity.clone(),
            entries: self.entries,
            min: self.min,
        }
    }
}

/// Past-tense minimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimized {
    pub(crate) name: Option<String>,
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) min: OrderedFloat<f64>,
}

impl Minimized {
    pub fn new(entries: f64, min: f64) -> HgResult<Self> {
        if entries < 0.0 {
            return Err(HgError::validation(format!(
                "Minimize entries ({}) cannot be negative",
                entries
            )));
        }
        Ok(Minimized {
            name: None,
            entries: OrderedFloat(entries),
            min: OrderedFloat(min),
        })
    }

    #[inline]
    pub fn entries(&self) -> f64 {
        self.entries.into_inner()
    }

    #[inline]
    pub fn min(&self) -> f64 {
        self.min.into_inner()
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        Ok(Minimized {
            name: merged_name(self.name(), other.name(), MIN_TAG)?,
            entries: OrderedFloat(self.entries() + other.entries()),
            min: OrderedFloat(minplus(self.min(), other.min())),
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Minimized {
            name: self.name.clone(),
            entries: OrderedFloat(0.0),
            min: OrderedFloat(f64::NAN),
        }
    }

    pub(crate) fn to_json_fragment(&self, suppress_name: bool) -> Value {
        let mut obj = Map::new();
        obj.insert("entries".to_string(), json::float_to_json(self.entries()));
        obj.insert("min".to_string(), json::float_to_json(self.min()));
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
        let obj = json::object(value, MIN_TAG)?;
        json::check_keys(obj, &["entries", "min"], &["name"], MIN_TAG)?;
        let mut out = Minimized::new(
            json::get_f64(obj, "entries", MIN_TAG)?,
            json::get_f64(obj, "min", MIN_TAG)?,
        )?;
        out.name = json::get_opt_name(obj, MIN_TAG)?
            .or_else(|| name_from_parent.map(str::to_string));
        Ok(out)
    }
}

/// Present-tense maximizer.
pub struct Maximizing<D> {
    pub(crate) quantity: Quantity<D, f64>,
    pub(crate) entries: f64,
    pub(crate) max: f64,
}

impl<D> Maximizing<D> {
    pub fn new(quantity: Quantity<D, f64>) -> Self {
        Maximizing {
            quantity,
            entries: 0.0,
            max: f64::NAN,
        }
    }

    pub(crate) fn fill(&mut self, datum: &D, weight: f64) {
        if weight > 0.0 {
            let q = self.quantity.eval(datum);
            self.entries += weight;
            if self.max.is_nan() || q > self.max {
                self.max = q;
            }
        }
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        Ok(Maximizing {
            quantity: self.quantity.merge_with(&other.quantity)?,
            entries: self.entries + other.entries,
            max: maxplus(self.max, other.max),
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Maximizing::new(self.quantity.clone())
    }

    pub(crate) fn snapshot(&self) -> Maximized {
        Maximized {
            name: self.quantity.name().map(str::to_string),
            entries: OrderedFloat(self.entries),
            max: OrderedFloat(self.max),
        }
    }
}

impl<D> Clone for Maximizing<D> {
    fn clone(&self) -> Self {
        Maximizing {
            quantity: self.quantity.clone(),
            entries: self.entries,
            max: self.max,
        }
    }
}

/// Past-tense maximizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Maximized {
    pub(crate) name: Option<String>,
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) max: OrderedFloat<f64>,
}

impl Maximized {
    pub fn new(entries: f64, max: f64) -> HgResult<Self> {
        if entries < 0.0 {
            return Err(HgError::validation(format!(
                "Maximize entries ({}) cannot be negative",
                entries
            )));
        }
        Ok(Maximized {
            name: None,
            entries: OrderedFloat(entries),
            max: OrderedFloat(max),
        })
    }

    #[inline]
    pub fn entries(&self) -> f64 {
        self.entries.into_inner()
    }

    #[inline]
    pub fn max(&self) -> f64 {
        self.max.into_inner()
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        Ok(Maximized {
            name: merged_name(self.name(), other.name(), MAX_TAG)?,
            entries: OrderedFloat(self.entries() + other.entries()),
            max: OrderedFloat(maxplus(self.max(), other.max())),
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Maximized {
            name: self.name.clone(),
            entries: OrderedFloat(0.0),
            max: OrderedFloat(f64::NAN),
        }
    }

    pub(crate) fn to_json_fragment(&self, suppress_name: bool) -> Value {
        let mut obj = Map::new();
        obj.insert("entries".to_string(), json::float_to_json(self.entries()));
        obj.insert("max".to_string(), json::float_to_json(self.max()));
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
        let obj = json::object(value, MAX_TAG)?;
        json::check_keys(obj, &["entries", "max"], &["name"], MAX_TAG)?;
        let mut out = Maximized::new(
            json::get_f64(obj, "entries", MAX_TAG)?,
            json::get_f64(obj, "max", MAX_TAG)?,
        )?;
        out.name = json::get_opt_name(obj, MAX_TAG)?
            .or_else(|| name_from_parent.map(str::to_string));
        Ok(out)
    }
}

pub(crate) fn min_factory(value: &Value, name_from_parent: Option<&str>) -> HgResult<Aggregated> {
    Minimized::from_json_fragment(value, name_from_parent).map(Aggregated::Minimized)
}

pub(crate) fn max_factory(value: &Value, name_from_parent: Option<&str>) -> HgResult<Aggregated> {
    Maximized::from_json_fragment(value, name_from_parent).map(Aggregated::Maximized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::assert_exact;

    #[test]
    fn extremes_are_nan_until_filled() {
        let min = Minimizing::new(Quantity::new(|x: &f64| *x));
        let max = Maximizing::new(Quantity::new(|x: &f64| *x));
        assert!(min.min.is_nan());
        assert!(max.max.is_nan());
    }

    #[test]
    fn fill_tracks_extremes() {
        let mut min = Minimizing::new(Quantity::new(|x: &f64| *x));
        let mut max = Maximizing::new(Quantity::new(|x: &f64| *x));
        for v in [3.0, -1.0, 7.0] {
            min.fill(&v, 1.0);
            max.fill(&v, 1.0);
        }
        assert_exact("min", -1.0, min.min);
        assert_exact("max", 7.0, max.max);
    }

    #[test]
    fn merge_absorbs_empty_sides() {
        let a = Minimized::new(3.0, -1.0).expect("a");
        let empty = a.zero();
        assert_exact("min", -1.0, a.merge(&empty).expect("merge").min());

        let b = Maximized::new(3.0, 7.0).expect("b");
        assert_exact("max", 7.0, b.zero().merge(&b).expect("merge").max());
    }
}
