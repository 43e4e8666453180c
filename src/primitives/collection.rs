//! Branching composites: every sub-aggregator sees every datum.
//!
//! Label and Index hold same-typed subs (addressed by name and by position);
//! UntypedLabel and Branch mix types freely. Homogeneity is checked at
//! construction by comparing factory tags.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde_json::{Map, Value};

use crate::error::{HgError, HgResult};
use crate::json;
use crate::primitives::{Aggregated, Aggregating};
use crate::registry::Factory;

pub(crate) const LABEL_TAG: &str = "Label";
pub(crate) const UNTYPED_LABEL_TAG: &str = "UntypedLabel";
pub(crate) const INDEX_TAG: &str = "Index";
pub(crate) const BRANCH_TAG: &str = "Branch";

fn check_entries(entries: f64, what: &str) -> HgResult<()> {
    if entries < 0.0 {
        return Err(HgError::validation(format!(
            "{} entries ({}) cannot be negative",
            what, entries
        )));
    }
    Ok(())
}

fn check_same_tag<'a>(mut tags: impl Iterator<Item = &'a str>, what: &str) -> HgResult<()> {
    if let Some(first) = tags.next() {
        if tags.any(|t| t != first) {
            return Err(HgError::validation(format!(
                "all {} values must have the same type",
                what
            )));
        }
    }
    Ok(())
}

/* ================================================================
 * Label
 * ================================================================ */

/// Present-tense Label: an ordered map of same-typed sub-aggregators.
pub struct Labeling<D> {
    pub(crate) entries: f64,
    pub(crate) pairs: BTreeMap<String, Aggregating<D>>,
}

impl<D> Labeling<D> {
    pub fn new(pairs: Vec<(impl Into<String>, Aggregating<D>)>) -> HgResult<Self> {
        if pairs.is_empty() {
            return Err(HgError::validation(
                "Label needs at least one sub-aggregator".to_string(),
            ));
        }
        let pairs: BTreeMap<String, Aggregating<D>> =
            pairs.into_iter().map(|(k, v)| (k.into(), v)).collect();
        check_same_tag(pairs.values().map(|v| v.tag()), LABEL_TAG)?;
        Ok(Labeling { entries: 0.0, pairs })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.pairs.len()
    }

    pub fn get(&self, label: &str) -> Option<&Aggregating<D>> {
        self.pairs.get(label)
    }

    pub(crate) fn fill(&mut self, datum: &D, weight: f64) -> HgResult<()> {
        if weight > 0.0 {
            for sub in self.pairs.values_mut() {
                sub.fill(datum, weight)?;
            }
            self.entries += weight;
        }
        Ok(())
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.pairs.len() != other.pairs.len()
            || self.pairs.keys().ne(other.pairs.keys())
        {
            return Err(HgError::mismatch("Label keys differ".to_string()));
        }
        let mut pairs = BTreeMap::new();
        for ((k, a), (_, b)) in self.pairs.iter().zip(&other.pairs) {
            pairs.insert(k.clone(), a.merge(b)?);
        }
        Ok(Labeling {
            entries: self.entries + other.entries,
            pairs,
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Labeling {
            entries: 0.0,
            pairs: self
                .pairs
                .iter()
                .map(|(k, v)| (k.clone(), v.zero()))
                .collect(),
        }
    }

    pub(crate) fn snapshot(&self) -> Labeled {
        Labeled {
            entries: OrderedFloat(self.entries),
            pairs: self
                .pairs
                .iter()
                .map(|(k, v)| (k.clone(), v.snapshot()))
                .collect(),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregating<D>> {
        self.pairs.values().collect()
    }
}

impl<D> Clone for Labeling<D> {
    fn clone(&self) -> Self {
        Labeling {
            entries: self.entries,
            pairs: self.pairs.clone(),
        }
    }
}

/// Past-tense Label.
#[derive(Debug, Clone, PartialEq)]
pub struct Labeled {
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) pairs: BTreeMap<String, Aggregated>,
}

impl Labeled {
    pub fn new(entries: f64, pairs: BTreeMap<String, Aggregated>) -> HgResult<Self> {
        check_entries(entries, LABEL_TAG)?;
        if pairs.is_empty() {
            return Err(HgError::validation(
                "Label needs at least one sub-aggregator".to_string(),
            ));
        }
        check_same_tag(pairs.values().map(|v| v.tag()), LABEL_TAG)?;
        Ok(Labeled {
            entries: OrderedFloat(entries),
            pairs,
        })
    }

    #[inline]
    pub fn entries(&self) -> f64 {
        self.entries.into_inner()
    }

    #[inline]
    pub fn pairs(&self) -> &BTreeMap<String, Aggregated> {
        &self.pairs
    }

    pub fn get(&self, label: &str) -> Option<&Aggregated> {
        self.pairs.get(label)
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.pairs.len() != other.pairs.len()
            || self.pairs.keys().ne(other.pairs.keys())
        {
            return Err(HgError::mismatch("Label keys differ".to_string()));
        }
        let mut pairs = BTreeMap::new();
        for ((k, a), (_, b)) in self.pairs.iter().zip(&other.pairs) {
            pairs.insert(k.clone(), a.merge(b)?);
        }
        Labeled::new(self.entries() + other.entries(), pairs)
    }

    pub(crate) fn zero(&self) -> Self {
        Labeled {
            entries: OrderedFloat(0.0),
            pairs: self
                .pairs
                .iter()
                .map(|(k, v)| (k.clone(), v.zero()))
                .collect(),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregated> {
        self.pairs.values().collect()
    }

    pub(crate) fn to_json_fragment(&self, _suppress_name: bool) -> Value {
        let mut obj = Map::new();
        obj.insert("entries".to_string(), json::float_to_json(self.entries()));
        obj.insert(
            "type".to_string(),
            Value::String(
                self.pairs
                    .values()
                    .next()
                    .map(|v| v.tag())
                    .unwrap_or_default()
                    .to_string(),
            ),
        );
        let mut data = Map::new();
        for (label, sub) in &self.pairs {
            data.insert(label.clone(), sub.to_json_fragment(false));
        }
        obj.insert("data".to_string(), Value::Object(data));
        Value::Object(obj)
    }

    pub(crate) fn from_json_fragment(
        value: &Value,
        _name_from_parent: Option<&str>,
    ) -> HgResult<Self> {
        let obj = json::object(value, LABEL_TAG)?;
        json::check_keys(obj, &["entries", "type", "data"], &[], LABEL_TAG)?;
        let tag = json::get_str(obj, "type", LABEL_TAG)?;
        let mut pairs = BTreeMap::new();
        for (label, sub) in json::object(json::get(obj, "data", LABEL_TAG)?, "Label.data")? {
            pairs.insert(label.clone(), Factory::fragment(tag, sub, None)?);
        }
        Labeled::new(json::get_f64(obj, "entries", LABEL_TAG)?, pairs)
    }
}

/* ================================================================
 * UntypedLabel
 * ================================================================ */

/// Present-tense UntypedLabel: name-addressed subs of mixed types.
pub struct UntypedLabeling<D> {
    pub(crate) entries: f64,
    pub(crate) pairs: BTreeMap<String, Aggregating<D>>,
}

impl<D> UntypedLabeling<D> {
    pub fn new(pairs: Vec<(impl Into<String>, Aggregating<D>)>) -> HgResult<Self> {
        if pairs.is_empty() {
            return Err(HgError::validation(
                "UntypedLabel needs at least one sub-aggregator".to_string(),
            ));
        }
        Ok(UntypedLabeling {
            entries: 0.0,
            pairs: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.pairs.len()
    }

    pub fn get(&self, label: &str) -> Option<&Aggregating<D>> {
        self.pairs.get(label)
    }

    pub(crate) fn fill(&mut self, datum: &D, weight: f64) -> HgResult<()> {
        if weight > 0.0 {
            for sub in self.pairs.values_mut() {
                sub.fill(datum, weight)?;
            }
            self.entries += weight;
        }
        Ok(())
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.pairs.len() != other.pairs.len()
            || self.pairs.keys().ne(other.pairs.keys())
        {
            return Err(HgError::mismatch("UntypedLabel keys differ".to_string()));
        }
        let mut pairs = BTreeMap::new();
        for ((k, a), (_, b)) in self.pairs.iter().zip(&other.pairs) {
            pairs.insert(k.clone(), a.merge(b)?);
        }
        Ok(UntypedLabeling {
            entries: self.entries + other.entries,
            pairs,
        })
    }

    pub(crate) fn zero(&self) -> Self {
        UntypedLabeling {
            entries: 0.0,
            pairs: self
                .pairs
                .iter()
                .map(|(k, v)| (k.clone(), v.zero()))
                .collect(),
        }
    }

    pub(crate) fn snapshot(&self) -> UntypedLabeled {
        UntypedLabeled {
            entries: OrderedFloat(self.entries),
            pairs: self
                .pairs
                .iter()
                .map(|(k, v)| (k.clone(), v.snapshot()))
                .collect(),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregating<D>> {
        self.pairs.values().collect()
    }
}

impl<D> Clone for UntypedLabeling<D> {
    fn clone(&self) -> Self {
        UntypedLabeling {
            entries: self.entries,
            pairs: self.pairs.clone(),
        }
    }
}

/// Past-tense UntypedLabel.
#[derive(Debug, Clone, PartialEq)]
pub struct UntypedLabeled {
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) pairs: BTreeMap<String, Aggregated>,
}

impl UntypedLabeled {
    pub fn new(entries: f64, pairs: BTreeMap<String, Aggregated>) -> HgResult<Self> {
        check_entries(entries, UNTYPED_LABEL_TAG)?;
        if pairs.is_empty() {
            return Err(HgError::validation(
                "UntypedLabel needs at least one sub-aggregator".to_string(),
            ));
        }
        Ok(UntypedLabeled {
            entries: OrderedFloat(entries),
            pairs,
        })
    }

    #[inline]
    pub fn entries(&self) -> f64 {
        self.entries.into_inner()
    }

    #[inline]
    pub fn pairs(&self) -> &BTreeMap<String, Aggregated> {
        &self.pairs
    }

    pub fn get(&self, label: &str) -> Option<&Aggregated> {
        self.pairs.get(label)
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.pairs.len() != other.pairs.len()
            || self.pairs.keys().ne(other.pairs.keys())
        {
            return Err(HgError::mismatch("UntypedLabel keys differ".to_string()));
        }
        let mut pairs = BTreeMap::new();
        for ((k, a), (_, b)) in self.pairs.iter().zip(&other.pairs) {
            pairs.insert(k.clone(), a.merge(b)?);
        }
        UntypedLabeled::new(self.entries() + other.entries(), pairs)
    }

    pub(crate) fn zero(&self) -> Self {
        UntypedLabeled {
            entries: OrderedFloat(0.0),
            pairs: self
                .pairs
                .iter()
                .map(|(k, v)| (k.clone(), v.zero()))
                .collect(),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregated> {
        self.pairs.values().collect()
    }

    pub(crate) fn to_json_fragment(&self, _suppress_name: bool) -> Value {
        let mut obj = Map::new();
        obj.insert("entries".to_string(), json::float_to_json(self.entries()));
        let mut data = Map::new();
        for (label, sub) in &self.pairs {
            let mut wrapped = Map::new();
            wrapped.insert("type".to_string(), Value::String(sub.tag().to_string()));
            wrapped.insert("data".to_string(), sub.to_json_fragment(false));
            data.insert(label.clone(), Value::Object(wrapped));
        }
        obj.insert("data".to_string(), Value::Object(data));
        Value::Object(obj)
    }

    pub(crate) fn from_json_fragment(
        value: &Value,
        _name_from_parent: Option<&str>,
    ) -> HgResult<Self> {
        let obj = json::object(value, UNTYPED_LABEL_TAG)?;
        json::check_keys(obj, &["entries", "data"], &[], UNTYPED_LABEL_TAG)?;
        let mut pairs = BTreeMap::new();
        for (label, wrapped) in
            json::object(json::get(obj, "data", UNTYPED_LABEL_TAG)?, "UntypedLabel.data")?
        {
            let wrapped = json::object(wrapped, &format!("UntypedLabel.data {:?}", label))?;
            json::check_keys(
                wrapped,
                &["type", "data"],
                &[],
                &format!("UntypedLabel.data {:?}", label),
            )?;
            let tag = json::get_str(wrapped, "type", UNTYPED_LABEL_TAG)?;
            pairs.insert(
                label.clone(),
                Factory::fragment(tag, json::get(wrapped, "data", UNTYPED_LABEL_TAG)?, None)?,
            );
        }
        UntypedLabeled::new(json::get_f64(obj, "entries", UNTYPED_LABEL_TAG)?, pairs)
    }
}

/* ================================================================
 * Index
 * ================================================================ */

/// Present-tense Index: position-addressed subs of one type.
pub struct Indexing<D> {
    pub(crate) entries: f64,
    pub(crate) values: Vec<Aggregating<D>>,
}

impl<D> Indexing<D> {
    pub fn new(values: Vec<Aggregating<D>>) -> HgResult<Self> {
        if values.is_empty() {
            return Err(HgError::validation(
                "Index needs at least one sub-aggregator".to_string(),
            ));
        }
        check_same_tag(values.iter().map(|v| v.tag()), INDEX_TAG)?;
        Ok(Indexing {
            entries: 0.0,
            values,
        })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, i: usize) -> Option<&Aggregating<D>> {
        self.values.get(i)
    }

    pub(crate) fn fill(&mut self, datum: &D, weight: f64) -> HgResult<()> {
        if weight > 0.0 {
            for sub in self.values.iter_mut() {
                sub.fill(datum, weight)?;
            }
            self.entries += weight;
        }
        Ok(())
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.size() != other.size() {
            return Err(HgError::mismatch(format!(
                "Index sizes differ ({} vs {})",
                self.size(),
                other.size()
            )));
        }
        Ok(Indexing {
            entries: self.entries + other.entries,
            values: self
                .values
                .iter()
                .zip(&other.values)
                .map(|(a, b)| a.merge(b))
                .collect::<HgResult<Vec<_>>>()?,
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Indexing {
            entries: 0.0,
            values: self.values.iter().map(|v| v.zero()).collect(),
        }
    }

    pub(crate) fn snapshot(&self) -> Indexed {
        Indexed {
            entries: OrderedFloat(self.entries),
            values: self.values.iter().map(|v| v.snapshot()).collect(),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregating<D>> {
        self.values.iter().collect()
    }
}

impl<D> Clone for Indexing<D> {
    fn clone(&self) -> Self {
        Indexing {
            entries: self.entries,
            values: self.values.clone(),
        }
    }
}

/// Past-tense Index.
#[derive(Debug, Clone, PartialEq)]
pub struct Indexed {
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) values: Vec<Aggregated>,
}

impl Indexed {
    pub fn new(entries: f64, values: Vec<Aggregated>) -> HgResult<Self> {
        check_entries(entries, INDEX_TAG)?;
        if values.is_empty() {
            return Err(HgError::validation(
                "Index needs at least one sub-aggregator".to_string(),
            ));
        }
        check_same_tag(values.iter().map(|v| v.tag()), INDEX_TAG)?;
        Ok(Indexed {
            entries: OrderedFloat(entries),
            values,
        })
    }

    #[inline]
    pub fn entries(&self) -> f64 {
        self.entries.into_inner()
    }

    #[inline]
    pub fn values(&self) -> &[Aggregated] {
        &self.values
    }

    pub fn get(&self, i: usize) -> Option<&Aggregated> {
        self.values.get(i)
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.values.len() != other.values.len() {
            return Err(HgError::mismatch(format!(
                "Index sizes differ ({} vs {})",
                self.values.len(),
                other.values.len()
            )));
        }
        Indexed::new(
            self.entries() + other.entries(),
            self.values
                .iter()
                .zip(&other.values)
                .map(|(a, b)| a.merge(b))
                .collect::<HgResult<Vec<_>>>()?,
        )
    }

    pub(crate) fn zero(&self) -> Self {
        Indexed {
            entries: OrderedFloat(0.0),
            values: self.values.iter().map(|v| v.zero()).collect(),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregated> {
        self.values.iter().collect()
    }

    pub(crate) fn to_json_fragment(&self, _suppress_name: bool) -> Value {
        let mut obj = Map::new();
        obj.insert("entries".to_string(), json::float_to_json(self.entries()));
        obj.insert(
            "type".to_string(),
            Value::String(self.values[0].tag().to_string()),
        );
        obj.insert(
            "data".to_string(),
            Value::Array(
                self.values
                    .iter()
                    .map(|v| v.to_json_fragment(false))
                    .collect(),
            ),
        );
        Value::Object(obj)
    }

    pub(crate) fn from_json_fragment(
        value: &Value,
        _name_from_parent: Option<&str>,
    ) -> HgResult<Self> {
        let obj = json::object(value, INDEX_TAG)?;
        json::check_keys(obj, &["entries", "type", "data"], &[], INDEX_TAG)?;
        let tag = json::get_str(obj, "type", INDEX_TAG)?;
        let values = json::array(json::get(obj, "data", INDEX_TAG)?, "Index.data")?
            .iter()
            .map(|v| Factory::fragment(tag, v, None))
            .collect::<HgResult<Vec<_>>>()?;
        Indexed::new(json::get_f64(obj, "entries", INDEX_TAG)?, values)
    }
}

/* ================================================================
 * Branch
 * ================================================================ */

/// Present-tense Branch: a fixed-arity heterogeneous tuple of subs.
pub struct Branching<D> {
    pub(crate) entries: f64,
    pub(crate) values: Vec<Aggregating<D>>,
}

impl<D> Branching<D> {
    pub fn new(values: Vec<Aggregating<D>>) -> HgResult<Self> {
        if values.is_empty() {
            return Err(HgError::validation(
                "Branch needs at least one sub-aggregator".to_string(),
            ));
        }
        Ok(Branching {
            entries: 0.0,
            values,
        })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, i: usize) -> Option<&Aggregating<D>> {
        self.values.get(i)
    }

    pub(crate) fn fill(&mut self, datum: &D, weight: f64) -> HgResult<()> {
        if weight > 0.0 {
            for sub in self.values.iter_mut() {
                sub.fill(datum, weight)?;
            }
            self.entries += weight;
        }
        Ok(())
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.size() != other.size() {
            return Err(HgError::mismatch(format!(
                "Branch sizes differ ({} vs {})",
                self.size(),
                other.size()
            )));
        }
        Ok(Branching {
            entries: self.entries + other.entries,
            values: self
                .values
                .iter()
                .zip(&other.values)
                .map(|(a, b)| a.merge(b))
                .collect::<HgResult<Vec<_>>>()?,
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Branching {
            entries: 0.0,
            values: self.values.iter().map(|v| v.zero()).collect(),
        }
    }

    pub(crate) fn snapshot(&self) -> Branched {
        Branched {
            entries: OrderedFloat(self.entries),
            values: self.values.iter().map(|v| v.snapshot()).collect(),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregating<D>> {
        self.values.iter().collect()
    }
}

impl<D> Clone for Branching<D> {
    fn clone(&self) -> Self {
        Branching {
            entries: self.entries,
            values: self.values.clone(),
        }
    }
}

/// Past-tense Branch.
#[derive(Debug, Clone, PartialEq)]
pub struct Branched {
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) values: Vec<Aggregated>,
}

impl Branched {
    pub fn new(entries: f64, values: Vec<Aggregated>) -> HgResult<Self> {
        check_entries(entries, BRANCH_TAG)?;
        if values.is_empty() {
            return Err(HgError::validation(
                "Branch needs at least one sub-aggregator".to_string(),
            ));
        }
        Ok(Branched {
            entries: OrderedFloat(entries),
            values,
        })
    }

    #[inline]
    pub fn entries(&self) -> f64 {
        self.entries.into_inner()
    }

    #[inline]
    pub fn values(&self) -> &[Aggregated] {
        &self.values
    }

    pub fn get(&self, i: usize) -> Option<&Aggregated> {
        self.values.get(i)
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.values.len() != other.values.len() {
            return Err(HgError::mismatch(format!(
                "Branch sizes differ ({} vs {})",
                self.values.len(),
                other.values.len()
            )));
        }
        Branched::new(
            self.entries() + other.entries(),
            self.values
                .iter()
                .zip(&other.values)
                .map(|(a, b)| a.merge(b))
                .collect::<HgResult<Vec<_>>>()?,
        )
    }

    pub(crate) fn zero(&self) -> Self {
        Branched {
            entries: OrderedFloat(0.0),
            values: self.values.iter().map(|v| v.zero()).collect(),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregated> {
        self.values.iter().collect()
    }

    pub(crate) fn to_json_fragment(&self, _suppress_name: bool) -> Value {
        let mut obj = Map::new();
        obj.insert("entries".to_string(), json::float_to_json(self.entries()));
        obj.insert(
            "data".to_string(),
            Value::Array(
                self.values
                    .iter()
                    .map(|v| {
                        let mut wrapped = Map::new();
                        wrapped.insert("type".to_string(), Value::String(v.tag().to_string()));
                        wrapped.insert("data".to_string(), v.to_json_fragment(false));
                        Value::Object(wrapped)
                    })
                    .collect(),
            ),
        );
        Value::Object(obj)
    }

    pub(crate) fn from_json_fragment(
        value: &Value,
        _name_from_parent: Option<&str>,
    ) -> HgResult<Self> {
        let obj = json::object(value, BRANCH_TAG)?;
        json::check_keys(obj, &["entries", "data"], &[], BRANCH_TAG)?;
        let mut values = Vec::new();
        for (i, wrapped) in json::array(json::get(obj, "data", BRANCH_TAG)?, "Branch.data")?
            .iter()
            .enumerate()
        {
            let wrapped = json::object(wrapped, &format!("Branch.data {}", i))?;
            json::check_keys(wrapped, &["type", "data"], &[], &format!("Branch.data {}", i))?;
            let tag = json::get_str(wrapped, "type", BRANCH_TAG)?;
            values.push(Factory::fragment(
                tag,
                json::get(wrapped, "data", BRANCH_TAG)?,
                None,
            )?);
        }
        Branched::new(json::get_f64(obj, "entries", BRANCH_TAG)?, values)
    }
}

pub(crate) fn label_factory(value: &Value, name: Option<&str>) -> HgResult<Aggregated> {
    Labeled::from_json_fragment(value, name).map(Aggregated::Labeled)
}

pub(crate) fn untyped_label_factory(value: &Value, name: Option<&str>) -> HgResult<Aggregated> {
    UntypedLabeled::from_json_fragment(value, name).map(Aggregated::UntypedLabeled)
}

pub(crate) fn index_factory(value: &Value, name: Option<&str>) -> HgResult<Aggregated> {
    Indexed::from_json_fragment(value, name).map(Aggregated::Indexed)
}

pub(crate) fn branch_factory(value: &Value, name: Option<&str>) -> HgResult<Aggregated> {
    Branched::from_json_fragment(value, name).map(Aggregated::Branched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::sum::Summing;
    use crate::quantity::Quantity;
    use crate::test_helpers::assert_exact;

    #[test]
    fn label_requires_one_shared_type() {
        let ok = Labeling::<f64>::new(vec![
            ("a", Aggregating::count()),
            ("b", Aggregating::count()),
        ]);
        assert!(ok.is_ok());

        let bad = Labeling::new(vec![
            ("a", Aggregating::count()),
            ("b", Summing::new(Quantity::new(|x: &f64| *x)).into()),
        ]);
        assert!(bad.is_err());
    }

    #[test]
    fn untyped_label_and_branch_accept_mixed_types() {
        let ul = UntypedLabeling::new(vec![
            ("count", Aggregating::count()),
            ("sum", Summing::new(Quantity::new(|x: &f64| *x)).into()),
        ]);
        assert!(ul.is_ok());

        let br = Branching::new(vec![
            Aggregating::count(),
            Summing::new(Quantity::new(|x: &f64| *x)).into(),
        ]);
        assert!(br.is_ok());
    }

    #[test]
    fn every_sub_sees_every_datum() {
        let mut b = Branching::new(vec![
            Aggregating::count(),
            Summing::new(Quantity::new(|x: &f64| *x)).into(),
        ])
        .expect("build");
        b.fill(&2.0, 1.0).expect("fill");
        b.fill(&3.0, 0.5).expect("fill");

        assert_exact("entries", 1.5, b.entries);
        assert_exact("count", 1.5, b.values[0].entries());
        assert_exact("sum entries", 1.5, b.values[1].entries());
    }

    #[test]
    fn label_merge_requires_the_same_keys() {
        let a = Labeling::<f64>::new(vec![("x", Aggregating::count())]).expect("a");
        let b = Labeling::<f64>::new(vec![("y", Aggregating::count())]).expect("b");
        assert!(a.merge(&b).is_err());

        let c = Labeling::<f64>::new(vec![("x", Aggregating::count())]).expect("c");
        assert!(a.merge(&c).is_ok());
    }

    #[test]
    fn index_addresses_by_position() {
        let mut idx =
            Indexing::new(vec![Aggregating::count(), Aggregating::count()]).expect("build");
        idx.fill(&(), 2.0).expect("fill");
        assert_exact("slot 0", 2.0, idx.get(0).expect("slot").entries());
        assert_exact("slot 1", 2.0, idx.get(1).expect("slot").entries());
        assert!(idx.get(2).is_none());
    }
}
