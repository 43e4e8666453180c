//! Select: reweight or cut the stream feeding one sub-aggregator.
//!
//! The selection is evaluated per datum and multiplied into the weight; the
//! sub-aggregator only sees the product when it is positive. `entries` counts
//! the unselected weight, so the contained fraction is recoverable.

use ordered_float::OrderedFloat;
use serde_json::{Map, Value};

use crate::error::{HgError, HgResult};
use crate::json;
use crate::primitives::{merged_name, Aggregated, Aggregating};
use crate::quantity::Selection;
use crate::registry::Factory;

pub(crate) const TAG: &str = "Select";

/// Present-tense selector.
pub struct Selecting<D> {
    pub(crate) selection: Selection<D>,
    pub(crate) entries: f64,
    pub(crate) value: Box<Aggregating<D>>,
}

impl<D> Selecting<D> {
    pub fn new(selection: Selection<D>, value: Aggregating<D>) -> Self {
        Selecting {
            selection,
            entries: 0.0,
            value: Box::new(value),
        }
    }

    #[inline]
    pub fn value(&self) -> &Aggregating<D> {
        &self.value
    }

    pub(crate) fn fill(&mut self, datum: &D, weight: f64) -> HgResult<()> {
        if weight > 0.0 {
            let selected = weight * self.selection.eval(datum);
            if selected > 0.0 {
                self.value.fill(datum, selected)?;
            }
            self.entries += weight;
        }
        Ok(())
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        Ok(Selecting {
            selection: self.selection.merge_with(&other.selection)?,
            entries: self.entries + other.entries,
            value: Box::new(self.value.merge(&other.value)?),
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Selecting {
            selection: self.selection.clone(),
            entries: 0.0,
            value: Box::new(self.value.zero()),
        }
    }

    pub(crate) fn snapshot(&self) -> Selected {
        Selected {
            name: self.selection.name().map(str::to_string),
            entries: OrderedFloat(self.entries),
            value: Box::new(self.value.snapshot()),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregating<D>> {
        vec![self.value.as_ref()]
    }
}

impl<D> Clone for Selecting<D> {
    fn clone(&self) -> Self {
        Selecting {
            selection: self.selection.clone(),
            entries: self.entries,
            value: self.value.clone(),
        }
    }
}

/// Past-tense selector.
#[derive(Debug, Clone, PartialEq)]
pub struct Selected {
    pub(crate) name: Option<String>,
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) value: Box<Aggregated>,
}

impl Selected {
    pub fn new(entries: f64, value: Aggregated) -> HgResult<Self> {
        if entries < 0.0 {
            return Err(HgError::validation(format!(
                "Select entries ({}) cannot be negative",
                entries
            )));
        }
        Ok(Selected {
            name: None,
            entries: OrderedFloat(entries),
            value: Box::new(value),
        })
    }

    #[inline]
    pub fn entries(&self) -> f64 {
        self.entries.into_inner()
    }

    #[inline]
    pub fn value(&self) -> &Aggregated {
        &self.value
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        let mut out = Selected::new(
            self.entries() + other.entries(),
            self.value.merge(&other.value)?,
        )?;
        out.name = merged_name(self.name(), other.name(), TAG)?;
        Ok(out)
    }

    pub(crate) fn zero(&self) -> Self {
        Selected {
            name: self.name.clone(),
            entries: OrderedFloat(0.0),
            value: Box::new(self.value.zero()),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregated> {
        vec![self.value.as_ref()]
    }

    pub(crate) fn to_json_fragment(&self, suppress_name: bool) -> Value {
        let mut obj = Map::new();
        obj.insert("entries".to_string(), json::float_to_json(self.entries()));
        obj.insert(
            "type".to_string(),
            Value::String(self.value.tag().to_string()),
        );
        obj.insert("data".to_string(), self.value.to_json_fragment(false));
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
        json::check_keys(obj, &["entries", "type", "data"], &["name"], TAG)?;
        let sub = Factory::fragment(
            json::get_str(obj, "type", TAG)?,
            json::get(obj, "data", TAG)?,
            None,
        )?;
        let mut out = Selected::new(json::get_f64(obj, "entries", TAG)?, sub)?;
        out.name = json::get_opt_name(obj, TAG)?
            .or_else(|| name_from_parent.map(str::to_string));
        Ok(out)
    }
}

pub(crate) fn factory(value: &Value, name_from_parent: Option<&str>) -> HgResult<Aggregated> {
    Selected::from_json_fragment(value, name_from_parent).map(Aggregated::Selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::Quantity;
    use crate::test_helpers::assert_exact;

    #[test]
    fn selection_reweights_the_sub_but_not_entries() {
        let mut s = Selecting::new(
            Quantity::new(|x: &f64| if *x > 0.0 { 1.0 } else { 0.0 }),
            Aggregating::count(),
        );
        s.fill(&1.0, 1.0).expect("fill");
        s.fill(&-1.0, 1.0).expect("fill");
        s.fill(&2.0, 0.5).expect("fill");

        assert_exact("entries", 2.5, s.entries);
        assert_exact("selected", 1.5, s.value.entries());
    }

    #[test]
    fn fractional_selections_scale_the_weight() {
        let mut s = Selecting::new(Quantity::new(|x: &f64| *x), Aggregating::count());
        s.fill(&0.25, 2.0).expect("fill");
        assert_exact("selected", 0.5, s.value.entries());
    }

    #[test]
    fn merge_adds_entries_and_sub_state() {
        let mut a = Selecting::new(Quantity::new(|_: &f64| 1.0), Aggregating::count());
        let mut b = a.zero();
        a.fill(&0.0, 1.0).expect("fill");
        b.fill(&0.0, 2.0).expect("fill");
        let m = a.merge(&b).expect("merge");
        assert_exact("entries", 3.0, m.entries);
        assert_exact("sub", 3.0, m.value.entries());
    }
}
