//! Bag: an exact multiset of observed values with their weight sums.
//!
//! Keys are numbers, strings, or fixed-length numeric vectors under one total
//! order (numbers < strings < vectors; numerically, lexicographically, and
//! componentwise within each kind). All vectors observed by one Bag must
//! share a length; mixing lengths is rejected.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde_json::{Map, Value};

use crate::error::{HgError, HgResult};
use crate::json;
use crate::primitives::{merged_name, Aggregated};
use crate::quantity::Quantity;

pub(crate) const TAG: &str = "Bag";

/// A Bag key. Derived `Ord` gives numbers < strings < vectors, each kind
/// ordered naturally; `OrderedFloat` makes NaN keys well-behaved.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BagValue {
    Number(OrderedFloat<f64>),
    Text(String),
    Vector(Vec<OrderedFloat<f64>>),
}

impl BagValue {
    pub fn number(x: f64) -> Self {
        BagValue::Number(OrderedFloat(x))
    }

    pub fn text(s: impl Into<String>) -> Self {
        BagValue::Text(s.into())
    }

    pub fn vector(xs: impl IntoIterator<Item = f64>) -> Self {
        BagValue::Vector(xs.into_iter().map(OrderedFloat).collect())
    }

    fn vector_len(&self) -> Option<usize> {
        match self {
            BagValue::Vector(xs) => Some(xs.len()),
            _ => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            BagValue::Number(x) => json::float_to_json(x.into_inner()),
            BagValue::Text(s) => Value::String(s.clone()),
            BagValue::Vector(xs) => Value::Array(
                xs.iter()
                    .map(|x| json::float_to_json(x.into_inner()))
                    .collect(),
            ),
        }
    }

    fn from_json(value: &Value, context: &str) -> HgResult<Self> {
        match value {
            Value::Number(_) => Ok(BagValue::number(json::float_from_json(value, context)?)),
            Value::String(s) => match s.as_str() {
                // A bare string is ambiguous between a text key and a
                // non-finite number; the numeric reading wins, matching the
                // writer (which only emits these strings for numbers).
                "nan" | "inf" | "-inf" => {
                    Ok(BagValue::number(json::float_from_json(value, context)?))
                }
                _ => Ok(BagValue::text(s.clone())),
            },
            Value::Array(items) => {
                let mut xs = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    xs.push(OrderedFloat(json::float_from_json(
                        item,
                        &format!("{} element {}", context, i),
                    )?));
                }
                Ok(BagValue::Vector(xs))
            }
            other => Err(HgError::json_format(format!(
                "{} (expected a number, string, or array, got {:?})",
                context, other
            ))),
        }
    }
}

fn check_vector_len(expected: &mut Option<usize>, key: &BagValue) -> HgResult<()> {
    if let Some(len) = key.vector_len() {
        match expected {
            Some(l) if *l != len => {
                return Err(HgError::validation(format!(
                    "Bag vectors must share a length ({} vs {})",
                    l, len
                )))
            }
            Some(_) => {}
            None => *expected = Some(len),
        }
    }
    Ok(())
}

/// Present-tense bag.
pub struct Bagging<D> {
    pub(crate) quantity: Quantity<D, BagValue>,
    pub(crate) entries: f64,
    pub(crate) values: BTreeMap<BagValue, f64>,
    vector_len: Option<usize>,
}

impl<D> Bagging<D> {
    pub fn new(quantity: Quantity<D, BagValue>) -> Self {
        Bagging {
            quantity,
            entries: 0.0,
            values: BTreeMap::new(),
            vector_len: None,
        }
    }

    pub(crate) fn fill(&mut self, datum: &D, weight: f64) -> HgResult<()> {
        if weight > 0.0 {
            let key = self.quantity.eval(datum);
            check_vector_len(&mut self.vector_len, &key)?;
            self.entries += weight;
            *self.values.entry(key).or_insert(0.0) += weight;
        }
        Ok(())
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        let mut vector_len = self.vector_len;
        let mut values = self.values.clone();
        for (key, weight) in &other.values {
            check_vector_len(&mut vector_len, key)?;
            *values.entry(key.clone()).or_insert(0.0) += weight;
        }
        Ok(Bagging {
            quantity: self.quantity.merge_with(&other.quantity)?,
            entries: self.entries + other.entries,
            values,
            vector_len,
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Bagging::new(self.quantity.clone())
    }

    pub(crate) fn snapshot(&self) -> Bagged {
        Bagged {
            name: self.quantity.name().map(str::to_string),
            entries: OrderedFloat(self.entries),
            values: self
                .values
                .iter()
                .map(|(k, w)| (k.clone(), OrderedFloat(*w)))
                .collect(),
        }
    }
}

impl<D> Clone for Bagging<D> {
    fn clone(&self) -> Self {
        Bagging {
            quantity: self.quantity.clone(),
            entries: self.entries,
            values: self.values.clone(),
            vector_len: self.vector_len,
        }
    }
}

/// Past-tense bag.
#[derive(Debug, Clone, PartialEq)]
pub struct Bagged {
    pub(crate) name: Option<String>,
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) values: BTreeMap<BagValue, OrderedFloat<f64>>,
}

impl Bagged {
    pub fn new(entries: f64, values: BTreeMap<BagValue, OrderedFloat<f64>>) -> HgResult<Self> {
        if entries < 0.0 {
            return Err(HgError::validation(format!(
                "Bag entries ({}) cannot be negative",
                entries
            )));
        }
        let mut len = None;
        for key in values.keys() {
            check_vector_len(&mut len, key)?;
        }
        Ok(Bagged {
            name: None,
            entries: OrderedFloat(entries),
            values,
        })
    }

    #[inline]
    pub fn entries(&self) -> f64 {
        self.entries.into_inner()
    }

    #[inline]
    pub fn values(&self) -> &BTreeMap<BagValue, OrderedFloat<f64>> {
        &self.values
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        let mut values = self.values.clone();
        for (key, weight) in &other.values {
            let slot = values.entry(key.clone()).or_insert(OrderedFloat(0.0));
            *slot = OrderedFloat(slot.into_inner() + weight.into_inner());
        }
        let mut out = Bagged::new(self.entries() + other.entries(), values)?;
        out.name = merged_name(self.name(), other.name(), TAG)?;
        Ok(out)
    }

    pub(crate) fn zero(&self) -> Self {
        Bagged {
            name: self.name.clone(),
            entries: OrderedFloat(0.0),
            values: BTreeMap::new(),
        }
    }

    pub(crate) fn to_json_fragment(&self, suppress_name: bool) -> Value {
        let mut obj = Map::new();
        obj.insert("entries".to_string(), json::float_to_json(self.entries()));
        obj.insert(
            "values".to_string(),
            Value::Array(
                self.values
                    .iter()
                    .map(|(key, weight)| {
                        let mut pair = Map::new();
                        pair.insert("n".to_string(), json::float_to_json(weight.into_inner()));
                        pair.insert("v".to_string(), key.to_json());
                        Value::Object(pair)
                    })
                    .collect(),
            ),
        );
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
        json::check_keys(obj, &["entries", "values"], &["name"], TAG)?;
        let entries = json::get_f64(obj, "entries", TAG)?;

        let mut values = BTreeMap::new();
        for (i, item) in json::array(json::get(obj, "values", TAG)?, "Bag.values")?
            .iter()
            .enumerate()
        {
            let pair = json::object(item, &format!("Bag.values {}", i))?;
            json::check_keys(pair, &["n", "v"], &[], &format!("Bag.values {}", i))?;
            let weight = json::get_f64(pair, "n", &format!("Bag.values {}", i))?;
            let key = BagValue::from_json(
                json::get(pair, "v", &format!("Bag.values {}", i))?,
                &format!("Bag.values {} v", i),
            )?;
            values.insert(key, OrderedFloat(weight));
        }

        let mut out = Bagged::new(entries, values)?;
        out.name = json::get_opt_name(obj, TAG)?
            .or_else(|| name_from_parent.map(str::to_string));
        Ok(out)
    }
}

pub(crate) fn factory(value: &Value, name_from_parent: Option<&str>) -> HgResult<Aggregated> {
    Bagged::from_json_fragment(value, name_from_parent).map(Aggregated::Bagged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::assert_exact;

    #[test]
    fn distinct_keys_accumulate_weight_separately() {
        let mut bag = Bagging::new(Quantity::new(|x: &f64| BagValue::number(*x)));
        for (v, w) in [(1.0, 1.0), (2.0, 0.5), (1.0, 2.0)] {
            bag.fill(&v, w).expect("fill");
        }
        assert_exact("entries", 3.5, bag.entries);
        assert_eq!(bag.values.len(), 2);
        assert_eq!(bag.values[&BagValue::number(1.0)], 3.0);
        assert_eq!(bag.values[&BagValue::number(2.0)], 0.5);
    }

    #[test]
    fn merge_unions_keys_and_sums_common_ones() {
        let mut a = Bagging::new(Quantity::new(|s: &String| BagValue::text(s.clone())));
        let mut b = a.zero();
        a.fill(&"one".to_string(), 1.0).expect("fill");
        b.fill(&"one".to_string(), 2.0).expect("fill");
        b.fill(&"two".to_string(), 1.0).expect("fill");

        let m = a.merge(&b).expect("merge");
        assert_eq!(m.values[&BagValue::text("one")], 3.0);
        assert_eq!(m.values[&BagValue::text("two")], 1.0);
    }

    #[test]
    fn mixed_vector_lengths_are_rejected() {
        let mut bag = Bagging::new(Quantity::new(|xs: &Vec<f64>| {
            BagValue::vector(xs.iter().copied())
        }));
        bag.fill(&vec![1.0, 2.0], 1.0).expect("first vector");
        let err = bag.fill(&vec![1.0, 2.0, 3.0], 1.0).expect_err("length mix");
        assert!(matches!(err, HgError::Validation { .. }));
    }

    #[test]
    fn key_order_is_numbers_then_strings_then_vectors() {
        let keys = [
            BagValue::vector([1.0]),
            BagValue::text("a"),
            BagValue::number(9.0),
        ];
        let mut sorted = keys.to_vec();
        sorted.sort();
        assert_eq!(
            sorted,
            vec![
                BagValue::number(9.0),
                BagValue::text("a"),
                BagValue::vector([1.0])
            ]
        );
    }
}
