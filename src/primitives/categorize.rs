//! Categorize: one sub-aggregator per observed category string.

use std::collections::{BTreeMap, HashMap};

use ordered_float::OrderedFloat;
use serde_json::{Map, Value};

use crate::error::{HgError, HgResult};
use crate::json;
use crate::primitives::{merged_name, Aggregated, Aggregating};
use crate::quantity::Quantity;
use crate::registry::Factory;

pub(crate) const TAG: &str = "Categorize";

/// Present-tense categorizer.
pub struct Categorizing<D> {
    pub(crate) quantity: Quantity<D, String>,
    pub(crate) entries: f64,
    pub(crate) value: Box<Aggregating<D>>,
    pub(crate) pairs: HashMap<String, Aggregating<D>>,
}

impl<D> Categorizing<D> {
    pub fn new(quantity: Quantity<D, String>, value: Aggregating<D>) -> Self {
        Categorizing {
            quantity,
            entries: 0.0,
            value: Box::new(value.zero()),
            pairs: HashMap::new(),
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.pairs.len()
    }

    pub fn get(&self, category: &str) -> Option<&Aggregating<D>> {
        self.pairs.get(category)
    }

    pub(crate) fn fill(&mut self, datum: &D, weight: f64) -> HgResult<()> {
        if weight > 0.0 {
            let category = self.quantity.eval(datum);
            self.pairs
                .entry(category)
                .or_insert_with(|| self.value.zero())
                .fill(datum, weight)?;
            self.entries += weight;
        }
        Ok(())
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        let mut pairs = self.pairs.clone();
        for (category, sub) in &other.pairs {
            match pairs.get_mut(category) {
                Some(existing) => *existing = existing.merge(sub)?,
                None => {
                    pairs.insert(category.clone(), sub.clone());
                }
            }
        }
        Ok(Categorizing {
            quantity: self.quantity.merge_with(&other.quantity)?,
            entries: self.entries + other.entries,
            value: self.value.clone(),
            pairs,
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Categorizing {
            quantity: self.quantity.clone(),
            entries: 0.0,
            value: self.value.clone(),
            pairs: HashMap::new(),
        }
    }

    pub(crate) fn snapshot(&self) -> Categorized {
        Categorized {
            name: self.quantity.name().map(str::to_string),
            entries: OrderedFloat(self.entries),
            content_type: self.value.tag().to_string(),
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

impl<D> Clone for Categorizing<D> {
    fn clone(&self) -> Self {
        Categorizing {
            quantity: self.quantity.clone(),
            entries: self.entries,
            value: self.value.clone(),
            pairs: self.pairs.clone(),
        }
    }
}

/// Past-tense categorizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Categorized {
    pub(crate) name: Option<String>,
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) content_type: String,
    pub(crate) pairs: BTreeMap<String, Aggregated>,
}

impl Categorized {
    pub fn new(
        entries: f64,
        content_type: impl Into<String>,
        pairs: BTreeMap<String, Aggregated>,
    ) -> HgResult<Self> {
        if entries < 0.0 {
            return Err(HgError::validation(format!(
                "Categorize entries ({}) cannot be negative",
                entries
            )));
        }
        let content_type = content_type.into();
        if let Some(sub) = pairs.values().find(|sub| sub.tag() != content_type) {
            return Err(HgError::validation(format!(
                "Categorize values must all be {:?}, found {:?}",
                content_type,
                sub.tag()
            )));
        }
        Ok(Categorized {
            name: None,
            entries: OrderedFloat(entries),
            content_type,
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

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.content_type != other.content_type {
            return Err(HgError::mismatch(format!(
                "Categorize content types differ ({:?} vs {:?})",
                self.content_type, other.content_type
            )));
        }
        let mut pairs = self.pairs.clone();
        for (category, sub) in &other.pairs {
            match pairs.get_mut(category) {
                Some(existing) => *existing = existing.merge(sub)?,
                None => {
                    pairs.insert(category.clone(), sub.clone());
                }
            }
        }
        let mut out = Categorized::new(
            self.entries() + other.entries(),
            self.content_type.clone(),
            pairs,
        )?;
        out.name = merged_name(self.name(), other.name(), TAG)?;
        Ok(out)
    }

    pub(crate) fn zero(&self) -> Self {
        Categorized {
            name: self.name.clone(),
            entries: OrderedFloat(0.0),
            content_type: self.content_type.clone(),
            pairs: BTreeMap::new(),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregated> {
        self.pairs.values().collect()
    }

    pub(crate) fn to_json_fragment(&self, suppress_name: bool) -> Value {
        let mut obj = Map::new();
        obj.insert("entries".to_string(), json::float_to_json(self.entries()));
        obj.insert(
            "type".to_string(),
            Value::String(self.content_type.clone()),
        );
        let mut data = Map::new();
        for (category, sub) in &self.pairs {
            data.insert(category.clone(), sub.to_json_fragment(false));
        }
        obj.insert("data".to_string(), Value::Object(data));
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

        let content_type = json::get_str(obj, "type", TAG)?.to_string();
        let mut pairs = BTreeMap::new();
        for (category, sub) in json::object(json::get(obj, "data", TAG)?, "Categorize.data")? {
            pairs.insert(
                category.clone(),
                Factory::fragment(&content_type, sub, None)?,
            );
        }

        let mut out = Categorized::new(
            json::get_f64(obj, "entries", TAG)?,
            content_type,
            pairs,
        )?;
        out.name = json::get_opt_name(obj, TAG)?
            .or_else(|| name_from_parent.map(str::to_string));
        Ok(out)
    }
}

pub(crate) fn factory(value: &Value, name_from_parent: Option<&str>) -> HgResult<Aggregated> {
    Categorized::from_json_fragment(value, name_from_parent).map(Aggregated::Categorized)
}
