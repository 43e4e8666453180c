//! Limit: keep a sub-aggregator only while entries stay within a capacity.
//!
//! Useful around memory-unbounded aggregators (Bag, Categorize): detail is
//! retained for small datasets and dropped wholesale for large ones. The sub
//! is dropped when entries strictly exceed the capacity, and a drop on either
//! side of a merge is contagious.

use ordered_float::OrderedFloat;
use serde_json::{Map, Value};

use crate::error::{HgError, HgResult};
use crate::json;
use crate::primitives::{Aggregated, Aggregating};
use crate::registry::Factory;

pub(crate) const TAG: &str = "Limit";

fn check_limit(limit: f64) -> HgResult<()> {
    if !(limit >= 0.0) {
        return Err(HgError::validation(format!(
            "Limit capacity ({}) must be non-negative",
            limit
        )));
    }
    Ok(())
}

/// Present-tense limiter.
pub struct Limiting<D> {
    pub(crate) entries: f64,
    pub(crate) limit: f64,
    pub(crate) content_type: String,
    pub(crate) value: Option<Box<Aggregating<D>>>,
}

impl<D> Limiting<D> {
    pub fn new(value: Aggregating<D>, limit: f64) -> HgResult<Self> {
        check_limit(limit)?;
        Ok(Limiting {
            entries: 0.0,
            limit,
            content_type: value.tag().to_string(),
            value: Some(Box::new(value)),
        })
    }

    /// True once the capacity has been exceeded and the sub dropped.
    #[inline]
    pub fn saturated(&self) -> bool {
        self.value.is_none()
    }

    #[inline]
    pub fn get(&self) -> Option<&Aggregating<D>> {
        self.value.as_deref()
    }

    pub(crate) fn fill(&mut self, datum: &D, weight: f64) -> HgResult<()> {
        if weight > 0.0 {
            if self.entries + weight > self.limit {
                self.value = None;
            } else if let Some(value) = self.value.as_mut() {
                value.fill(datum, weight)?;
            }
            self.entries += weight;
        }
        Ok(())
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.limit != other.limit {
            return Err(HgError::mismatch(format!(
                "Limit capacities differ ({} vs {})",
                self.limit, other.limit
            )));
        }
        let entries = self.entries + other.entries;
        let value = match (&self.value, &other.value) {
            (Some(a), Some(b)) if entries <= self.limit => Some(Box::new(a.merge(b)?)),
            _ => None,
        };
        Ok(Limiting {
            entries,
            limit: self.limit,
            content_type: self.content_type.clone(),
            value,
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Limiting {
            entries: 0.0,
            limit: self.limit,
            content_type: self.content_type.clone(),
            value: self.value.as_ref().map(|v| Box::new(v.zero())),
        }
    }

    pub(crate) fn snapshot(&self) -> Limited {
        Limited {
            entries: OrderedFloat(self.entries),
            limit: OrderedFloat(self.limit),
            content_type: self.content_type.clone(),
            value: self.value.as_ref().map(|v| Box::new(v.snapshot())),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregating<D>> {
        match &self.value {
            Some(value) => vec![value.as_ref()],
            None => Vec::new(),
        }
    }
}

impl<D> Clone for Limiting<D> {
    fn clone(&self) -> Self {
        Limiting {
            entries: self.entries,
            limit: self.limit,
            content_type: self.content_type.clone(),
            value: self.value.clone(),
        }
    }
}

/// Past-tense limiter.
#[derive(Debug, Clone, PartialEq)]
pub struct Limited {
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) limit: OrderedFloat<f64>,
    pub(crate) content_type: String,
    pub(crate) value: Option<Box<Aggregated>>,
}

impl Limited {
    pub fn new(
        entries: f64,
        limit: f64,
        content_type: impl Into<String>,
        value: Option<Aggregated>,
    ) -> HgResult<Self> {
        if entries < 0.0 {
            return Err(HgError::validation(format!(
                "Limit entries ({}) cannot be negative",
                entries
            )));
        }
        check_limit(limit)?;
        let content_type = content_type.into();
        if let Some(sub) = &value {
            if sub.tag() != content_type {
                return Err(HgError::validation(format!(
                    "Limit content type {:?} does not match its value {:?}",
                    content_type,
                    sub.tag()
                )));
            }
        }
        Ok(Limited {
            entries: OrderedFloat(entries),
            limit: OrderedFloat(limit),
            content_type,
            value: value.map(Box::new),
        })
    }

    #[inline]
    pub fn entries(&self) -> f64 {
        self.entries.into_inner()
    }

    #[inline]
    pub fn limit(&self) -> f64 {
        self.limit.into_inner()
    }

    #[inline]
    pub fn saturated(&self) -> bool {
        self.value.is_none()
    }

    #[inline]
    pub fn get(&self) -> Option<&Aggregated> {
        self.value.as_deref()
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.limit != other.limit {
            return Err(HgError::mismatch(format!(
                "Limit capacities differ ({} vs {})",
                self.limit(),
                other.limit()
            )));
        }
        let entries = self.entries() + other.entries();
        let value = match (&self.value, &other.value) {
            (Some(a), Some(b)) if entries <= self.limit() => Some(a.merge(b)?),
            _ => None,
        };
        Limited::new(entries, self.limit(), self.content_type.clone(), value)
    }

    pub(crate) fn zero(&self) -> Self {
        Limited {
            entries: OrderedFloat(0.0),
            limit: self.limit,
            content_type: self.content_type.clone(),
            value: self.value.as_ref().map(|v| Box::new(v.zero())),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregated> {
        match &self.value {
            Some(value) => vec![value.as_ref()],
            None => Vec::new(),
        }
    }

    pub(crate) fn to_json_fragment(&self, _suppress_name: bool) -> Value {
        let mut obj = Map::new();
        obj.insert("entries".to_string(), json::float_to_json(self.entries()));
        obj.insert("limit".to_string(), json::float_to_json(self.limit()));
        obj.insert(
            "type".to_string(),
            Value::String(self.content_type.clone()),
        );
        obj.insert(
            "data".to_string(),
            match &self.value {
                Some(sub) => sub.to_json_fragment(false),
                None => Value::Null,
            },
        );
        Value::Object(obj)
    }

    pub(crate) fn from_json_fragment(
        value: &Value,
        _name_from_parent: Option<&str>,
    ) -> HgResult<Self> {
        let obj = json::object(value, TAG)?;
        json::check_keys(obj, &["entries", "limit", "type", "data"], &[], TAG)?;
        let content_type = json::get_str(obj, "type", TAG)?.to_string();
        let sub = match json::get(obj, "data", TAG)? {
            Value::Null => None,
            data => Some(Factory::fragment(&content_type, data, None)?),
        };
        Limited::new(
            json::get_f64(obj, "entries", TAG)?,
            json::get_f64(obj, "limit", TAG)?,
            content_type,
            sub,
        )
    }
}

pub(crate) fn factory(value: &Value, name_from_parent: Option<&str>) -> HgResult<Aggregated> {
    Limited::from_json_fragment(value, name_from_parent).map(Aggregated::Limited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::assert_exact;

    #[test]
    fn sub_survives_exactly_at_capacity_and_drops_beyond() {
        let mut l = Limiting::new(Aggregating::count(), 3.0).expect("build");
        l.fill(&(), 2.0).expect("fill");
        l.fill(&(), 1.0).expect("fill");
        assert!(!l.saturated());
        assert_exact("sub", 3.0, l.get().expect("sub").entries());

        l.fill(&(), 0.5).expect("fill");
        assert!(l.saturated());
        assert_exact("entries", 3.5, l.entries);
    }

    #[test]
    fn merge_drops_when_the_combined_entries_exceed_capacity() {
        let mut a = Limiting::new(Aggregating::count(), 10.0).expect("build");
        let mut b = a.zero();
        a.fill(&(), 4.0).expect("fill");
        b.fill(&(), 5.0).expect("fill");
        assert!(!a.merge(&b).expect("merge").saturated());

        b.fill(&(), 2.0).expect("fill");
        let m = a.merge(&b).expect("merge");
        assert!(m.saturated());
        assert_exact("entries", 11.0, m.entries);
    }

    #[test]
    fn merge_requires_equal_capacities() {
        let a = Limiting::<()>::new(Aggregating::count(), 10.0).expect("a");
        let b = Limiting::<()>::new(Aggregating::count(), 20.0).expect("b");
        assert!(a.merge(&b).is_err());
    }
}
