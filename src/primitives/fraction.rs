//! Fraction: a numerator/denominator pair over structurally identical subs.
//!
//! The denominator sees every datum at full weight; the numerator sees the
//! weight scaled by the selection. Efficiency-style ratios fall out of the
//! two sub-aggregators after the fact.

use ordered_float::OrderedFloat;
use serde_json::{Map, Value};

use crate::error::{HgError, HgResult};
use crate::json;
use crate::primitives::{merged_name, Aggregated, Aggregating};
use crate::quantity::Selection;
use crate::registry::Factory;

pub(crate) const TAG: &str = "Fraction";

/// Present-tense fraction.
pub struct Fractioning<D> {
    pub(crate) selection: Selection<D>,
    pub(crate) entries: f64,
    pub(crate) numerator: Box<Aggregating<D>>,
    pub(crate) denominator: Box<Aggregating<D>>,
}

impl<D> Fractioning<D> {
    /// Both sides start as zeroed copies of `value`.
    pub fn new(selection: Selection<D>, value: Aggregating<D>) -> Self {
        Fractioning {
            selection,
            entries: 0.0,
            numerator: Box::new(value.zero()),
            denominator: Box::new(value.zero()),
        }
    }

    #[inline]
    pub fn numerator(&self) -> &Aggregating<D> {
        &self.numerator
    }

    #[inline]
    pub fn denominator(&self) -> &Aggregating<D> {
        &self.denominator
    }

    pub(crate) fn fill(&mut self, datum: &D, weight: f64) -> HgResult<()> {
        if weight > 0.0 {
            let selected = weight * self.selection.eval(datum);
            self.denominator.fill(datum, weight)?;
            if selected > 0.0 {
                self.numerator.fill(datum, selected)?;
            }
            self.entries += weight;
        }
        Ok(())
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        Ok(Fractioning {
            selection: self.selection.merge_with(&other.selection)?,
            entries: self.entries + other.entries,
            numerator: Box::new(self.numerator.merge(&other.numerator)?),
            denominator: Box::new(self.denominator.merge(&other.denominator)?),
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Fractioning {
            selection: self.selection.clone(),
            entries: 0.0,
            numerator: Box::new(self.numerator.zero()),
            denominator: Box::new(self.denominator.zero()),
        }
    }

    pub(crate) fn snapshot(&self) -> Fractioned {
        Fractioned {
            name: self.selection.name().map(str::to_string),
            entries: OrderedFloat(self.entries),
            numerator: Box::new(self.numerator.snapshot()),
            denominator: Box::new(self.denominator.snapshot()),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregating<D>> {
        vec![self.numerator.as_ref(), self.denominator.as_ref()]
    }
}

impl<D> Clone for Fractioning<D> {
    fn clone(&self) -> Self {
        Fractioning {
            selection: self.selection.clone(),
            entries: self.entries,
            numerator: self.numerator.clone(),
            denominator: self.denominator.clone(),
        }
    }
}

/// Past-tense fraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Fractioned {
    pub(crate) name: Option<String>,
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) numerator: Box<Aggregated>,
    pub(crate) denominator: Box<Aggregated>,
}

impl Fractioned {
    pub fn new(entries: f64, numerator: Aggregated, denominator: Aggregated) -> HgResult<Self> {
        if entries < 0.0 {
            return Err(HgError::validation(format!(
                "Fraction entries ({}) cannot be negative",
                entries
            )));
        }
        if numerator.tag() != denominator.tag() {
            return Err(HgError::validation(format!(
                "Fraction numerator ({}) and denominator ({}) must have the same type",
                numerator.tag(),
                denominator.tag()
            )));
        }
        Ok(Fractioned {
            name: None,
            entries: OrderedFloat(entries),
            numerator: Box::new(numerator),
            denominator: Box::new(denominator),
        })
    }

    #[inline]
    pub fn entries(&self) -> f64 {
        self.entries.into_inner()
    }

    #[inline]
    pub fn numerator(&self) -> &Aggregated {
        &self.numerator
    }

    #[inline]
    pub fn denominator(&self) -> &Aggregated {
        &self.denominator
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        let mut out = Fractioned::new(
            self.entries() + other.entries(),
            self.numerator.merge(&other.numerator)?,
            self.denominator.merge(&other.denominator)?,
        )?;
        out.name = merged_name(self.name(), other.name(), TAG)?;
        Ok(out)
    }

    pub(crate) fn zero(&self) -> Self {
        Fractioned {
            name: self.name.clone(),
            entries: OrderedFloat(0.0),
            numerator: Box::new(self.numerator.zero()),
            denominator: Box::new(self.denominator.zero()),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregated> {
        vec![self.numerator.as_ref(), self.denominator.as_ref()]
    }

    pub(crate) fn to_json_fragment(&self, suppress_name: bool) -> Value {
        let sub_name = self.numerator.quantity_name();

        let mut obj = Map::new();
        obj.insert("entries".to_string(), json::float_to_json(self.entries()));
        obj.insert(
            "type".to_string(),
            Value::String(self.numerator.tag().to_string()),
        );
        obj.insert("numerator".to_string(), self.numerator.to_json_fragment(true));
        obj.insert(
            "denominator".to_string(),
            self.denominator.to_json_fragment(true),
        );
        if !suppress_name {
            if let Some(name) = self.name() {
                obj.insert("name".to_string(), Value::String(name.to_string()));
            }
        }
        if let Some(sub_name) = sub_name {
            obj.insert("sub:name".to_string(), Value::String(sub_name.to_string()));
        }
        Value::Object(obj)
    }

    pub(crate) fn from_json_fragment(
        value: &Value,
        name_from_parent: Option<&str>,
    ) -> HgResult<Self> {
        let obj = json::object(value, TAG)?;
        json::check_keys(
            obj,
            &["entries", "type", "numerator", "denominator"],
            &["name", "sub:name"],
            TAG,
        )?;
        let tag = json::get_str(obj, "type", TAG)?;
        let sub_name = json::get_opt_str(obj, "sub:name", TAG)?;
        let numerator =
            Factory::fragment(tag, json::get(obj, "numerator", TAG)?, sub_name.as_deref())?;
        let denominator = Factory::fragment(
            tag,
            json::get(obj, "denominator", TAG)?,
            sub_name.as_deref(),
        )?;
        let mut out = Fractioned::new(
            json::get_f64(obj, "entries", TAG)?,
            numerator,
            denominator,
        )?;
        out.name = json::get_opt_name(obj, TAG)?
            .or_else(|| name_from_parent.map(str::to_string));
        Ok(out)
    }
}

pub(crate) fn factory(value: &Value, name_from_parent: Option<&str>) -> HgResult<Aggregated> {
    Fractioned::from_json_fragment(value, name_from_parent).map(Aggregated::Fractioned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::Quantity;
    use crate::test_helpers::assert_exact;

    #[test]
    fn denominator_sees_everything_numerator_sees_the_selection() {
        let mut f = Fractioning::new(
            Quantity::new(|x: &f64| if *x > 0.0 { 1.0 } else { 0.0 }),
            Aggregating::count(),
        );
        for q in [1.0, -1.0, 2.0, -2.0, 3.0] {
            f.fill(&q, 1.0).expect("fill");
        }
        assert_exact("entries", 5.0, f.entries);
        assert_exact("denominator", 5.0, f.denominator.entries());
        assert_exact("numerator", 3.0, f.numerator.entries());
    }

    #[test]
    fn merge_combines_both_sides_pairwise() {
        let mut a = Fractioning::new(Quantity::new(|x: &f64| *x), Aggregating::count());
        let mut b = a.zero();
        a.fill(&0.5, 1.0).expect("fill");
        b.fill(&1.0, 1.0).expect("fill");

        let m = a.merge(&b).expect("merge");
        assert_exact("denominator", 2.0, m.denominator.entries());
        assert_exact("numerator", 1.5, m.numerator.entries());
    }
}
