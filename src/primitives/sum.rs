//! Sum: the weighted sum of a numeric quantity.

use ordered_float::OrderedFloat;
use serde_json::{Map, Value};

use crate::error::{HgError, HgResult};
use crate::json;
use crate::primitives::{merged_name, Aggregated};
use crate::quantity::Quantity;

pub(crate) const TAG: &str = "Sum";

/// Present-tense summer.
pub struct Summing<D> {
    pub(crate) quantity: Quantity<D, f64>,
    pub(crate) entries: f64,
    pub(crate) sum: f64,
}

impl<D> Summing<D> {
    pub fn new(quantity: Quantity<D, f64>) -> Self {
        Summing {
            quantity,
            entries: 0.0,
            sum: 0.0,
        }
    }

    pub(crate) fn fill(&mut self, datum: &D, weight: f64) {
        if weight > 0.0 {
            let q = self.quantity.eval(datum);
            self.entries += weight;
            self.sum += q * weight;
        }
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        Ok(Summing {
            quantity: self.quantity.merge_with(&other.quantity)?,
            entries: self.entries + other.entries,
            sum: self.sum + other.sum,
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Summing::new(self.quantity.clone())
    }

    pub(crate) fn snapshot(&self) -> Summed {
        Summed {
            name: self.quantity.name().map(str::to_string),
            entries: OrderedFloat(self.entries),
            sum: OrderedFloat(self.sum),
        }
    }
}

impl<D> Clone for Summing<D> {
    fn clone(&self) -> Self {
        Summing {
            quantity: self.quantity.clone(),
            entries: self.entries,
            sum: self.sum,
        }
    }
}

/// Past-tense summer.
#[derive(Debug, Clone, PartialEq)]
pub struct Summed {
    pub(crate) name: Option<String>,
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) sum: OrderedFloat<f64>,
}

impl Summed {
    pub fn new(entries: f64, sum: f64) -> HgResult<Self> {
        if entries < 0.0 {
            return Err(HgError::validation(format!(
                "Sum entries ({}) cannot be negative",
                entries
            )));
        }
        Ok(Summed {
            name: None,
            entries: OrderedFloat(entries),
            sum: OrderedFloat(sum),
        })
    }

    #[inline]
    pub fn entries(&self) -> f64 {
        self.entries.into_inner()
    }

    #[inline]
    pub fn sum(&self) -> f64 {
        self.sum.into_inner()
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        Ok(Summed {
            name: merged_name(self.name(), other.name(), TAG)?,
            entries: OrderedFloat(self.entries() + other.entries()),
            sum: OrderedFloat(self.sum() + other.sum()),
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Summed {
            name: self.name.clone(),
            entries: OrderedFloat(0.0),
            sum: OrderedFloat(0.0),
        }
    }

    pub(crate) fn to_json_fragment(&self, suppress_name: bool) -> Value {
        let mut obj = Map::new();
        obj.insert("entries".to_string(), json::float_to_json(self.entries()));
        obj.insert("sum".to_string(), json::float_to_json(self.sum()));
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
        json::check_keys(obj, &["entries", "sum"], &["name"], TAG)?;
        let mut out = Summed::new(
            json::get_f64(obj, "entries", TAG)?,
            json::get_f64(obj, "sum", TAG)?,
        )?;
        out.name = json::get_opt_name(obj, TAG)?
            .or_else(|| name_from_parent.map(str::to_string));
        Ok(out)
    }
}

pub(crate) fn factory(value: &Value, name_from_parent: Option<&str>) -> HgResult<Aggregated> {
    Summed::from_json_fragment(value, name_from_parent).map(Aggregated::Summed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::assert_exact;

    #[test]
    fn fill_accumulates_weighted_sum() {
        let mut s = Summing::new(Quantity::new(|x: &f64| *x));
        s.fill(&2.0, 1.0);
        s.fill(&3.0, 2.0);
        s.fill(&99.0, 0.0); // ignored
        assert_exact("entries", 3.0, s.entries);
        assert_exact("sum", 8.0, s.sum);
    }

    #[test]
    fn merge_adds_both_fields() {
        let a = Summed::new(2.0, 4.0).expect("a");
        let b = Summed::new(3.0, 9.0).expect("b");
        let m = a.merge(&b).expect("merge");
        assert_exact("entries", 5.0, m.entries());
        assert_exact("sum", 13.0, m.sum());
    }

    #[test]
    fn merge_rejects_conflicting_names() {
        let mut a = Summed::new(1.0, 1.0).expect("a");
        a.name = Some("px".to_string());
        let mut b = Summed::new(1.0, 1.0).expect("b");
        b.name = Some("py".to_string());
        assert!(matches!(
            a.merge(&b),
            Err(HgError::NameConflict { .. })
        ));
    }
}
