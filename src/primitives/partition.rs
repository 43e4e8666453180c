//! Partition: adjacent half-open intervals, each datum routed to exactly one.
//!
//! The cut list starts at negative infinity, so every non-NaN quantity lands
//! in the interval `[c_k, c_{k+1})` whose bounds bracket it; the last
//! interval is unbounded above. NaN quantities land nowhere but still count
//! toward `entries`.

use ordered_float::OrderedFloat;
use serde_json::{Map, Value};

use crate::error::{HgError, HgResult};
use crate::json;
use crate::primitives::{merged_name, Aggregated, Aggregating};
use crate::quantity::Quantity;
use crate::registry::Factory;

pub(crate) const TAG: &str = "Partition";

fn check_thresholds(thresholds: &[f64]) -> HgResult<()> {
    if thresholds.is_empty() {
        return Err(HgError::validation(
            "Partition needs at least one cut (the implicit -inf cut)".to_string(),
        ));
    }
    if thresholds.iter().any(|t| t.is_nan()) {
        return Err(HgError::validation(
            "Partition cutoffs cannot be NaN".to_string(),
        ));
    }
    if thresholds.windows(2).any(|w| w[0] >= w[1]) {
        return Err(HgError::validation(
            "Partition cutoffs must be strictly increasing".to_string(),
        ));
    }
    Ok(())
}

/// Present-tense partition.
pub struct Partitioning<D> {
    pub(crate) quantity: Quantity<D, f64>,
    pub(crate) entries: f64,
    pub(crate) cuts: Vec<(f64, Aggregating<D>)>,
}

impl<D> Partitioning<D> {
    /// One sub per interval; the leading interval starts at negative
    /// infinity.
    pub fn new(
        quantity: Quantity<D, f64>,
        value: Aggregating<D>,
        cutoffs: Vec<f64>,
    ) -> HgResult<Self> {
        let mut thresholds = vec![f64::NEG_INFINITY];
        thresholds.extend(cutoffs);
        check_thresholds(&thresholds)?;
        Ok(Partitioning {
            quantity,
            entries: 0.0,
            cuts: thresholds
                .into_iter()
                .map(|t| (t, value.zero()))
                .collect(),
        })
    }

    pub fn thresholds(&self) -> Vec<f64> {
        self.cuts.iter().map(|(t, _)| *t).collect()
    }

    pub(crate) fn fill(&mut self, datum: &D, weight: f64) -> HgResult<()> {
        if weight > 0.0 {
            let q = self.quantity.eval(datum);
            // First index whose threshold exceeds q; the interval before it
            // owns the datum. NaN compares false everywhere and lands in no
            // interval.
            let at = self.cuts.partition_point(|(t, _)| q >= *t);
            if at > 0 {
                self.cuts[at - 1].1.fill(datum, weight)?;
            }
            self.entries += weight;
        }
        Ok(())
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.thresholds() != other.thresholds() {
            return Err(HgError::mismatch(
                "Partition cut thresholds differ".to_string(),
            ));
        }
        let cuts = self
            .cuts
            .iter()
            .zip(&other.cuts)
            .map(|((t, a), (_, b))| Ok((*t, a.merge(b)?)))
            .collect::<HgResult<Vec<_>>>()?;
        Ok(Partitioning {
            quantity: self.quantity.merge_with(&other.quantity)?,
            entries: self.entries + other.entries,
            cuts,
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Partitioning {
            quantity: self.quantity.clone(),
            entries: 0.0,
            cuts: self.cuts.iter().map(|(t, v)| (*t, v.zero())).collect(),
        }
    }

    pub(crate) fn snapshot(&self) -> Partitioned {
        Partitioned {
            name: self.quantity.name().map(str::to_string),
            entries: OrderedFloat(self.entries),
            cuts: self
                .cuts
                .iter()
                .map(|(t, v)| (OrderedFloat(*t), v.snapshot()))
                .collect(),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregating<D>> {
        self.cuts.iter().map(|(_, v)| v).collect()
    }
}

impl<D> Clone for Partitioning<D> {
    fn clone(&self) -> Self {
        Partitioning {
            quantity: self.quantity.clone(),
            entries: self.entries,
            cuts: self.cuts.clone(),
        }
    }
}

/// Past-tense partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Partitioned {
    pub(crate) name: Option<String>,
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) cuts: Vec<(OrderedFloat<f64>, Aggregated)>,
}

impl Partitioned {
    pub fn new(entries: f64, cuts: Vec<(f64, Aggregated)>) -> HgResult<Self> {
        if entries < 0.0 {
            return Err(HgError::validation(format!(
                "Partition entries ({}) cannot be negative",
                entries
            )));
        }
        let thresholds: Vec<f64> = cuts.iter().map(|(t, _)| *t).collect();
        check_thresholds(&thresholds)?;
        if let Some(first) = cuts.first() {
            if cuts.iter().any(|(_, v)| v.tag() != first.1.tag()) {
                return Err(HgError::validation(
                    "all Partition values must have the same type".to_string(),
                ));
            }
        }
        Ok(Partitioned {
            name: None,
            entries: OrderedFloat(entries),
            cuts: cuts
                .into_iter()
                .map(|(t, v)| (OrderedFloat(t), v))
                .collect(),
        })
    }

    #[inline]
    pub fn entries(&self) -> f64 {
        self.entries.into_inner()
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn thresholds(&self) -> Vec<f64> {
        self.cuts.iter().map(|(t, _)| t.into_inner()).collect()
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.thresholds() != other.thresholds() {
            return Err(HgError::mismatch(
                "Partition cut thresholds differ".to_string(),
            ));
        }
        let cuts = self
            .cuts
            .iter()
            .zip(&other.cuts)
            .map(|((t, a), (_, b))| Ok((t.into_inner(), a.merge(b)?)))
            .collect::<HgResult<Vec<_>>>()?;
        let mut out = Partitioned::new(self.entries() + other.entries(), cuts)?;
        out.name = merged_name(self.name(), other.name(), TAG)?;
        Ok(out)
    }

    pub(crate) fn zero(&self) -> Self {
        Partitioned {
            name: self.name.clone(),
            entries: OrderedFloat(0.0),
            cuts: self.cuts.iter().map(|(t, v)| (*t, v.zero())).collect(),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregated> {
        self.cuts.iter().map(|(_, v)| v).collect()
    }

    pub(crate) fn to_json_fragment(&self, suppress_name: bool) -> Value {
        let data_name = self.cuts[0].1.quantity_name();

        let mut obj = Map::new();
        obj.insert("entries".to_string(), json::float_to_json(self.entries()));
        obj.insert(
            "type".to_string(),
            Value::String(self.cuts[0].1.tag().to_string()),
        );
        obj.insert(
            "data".to_string(),
            Value::Array(
                self.cuts
                    .iter()
                    .map(|(t, v)| {
                        let mut pair = Map::new();
                        pair.insert("atleast".to_string(), json::float_to_json(t.into_inner()));
                        pair.insert("data".to_string(), v.to_json_fragment(true));
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
        if let Some(data_name) = data_name {
            obj.insert(
                "data:name".to_string(),
                Value::String(data_name.to_string()),
            );
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
            &["entries", "type", "data"],
            &["name", "data:name"],
            TAG,
        )?;
        let tag = json::get_str(obj, "type", TAG)?;
        let data_name = json::get_opt_str(obj, "data:name", TAG)?;

        let mut cuts = Vec::new();
        for (i, item) in json::array(json::get(obj, "data", TAG)?, "Partition.data")?
            .iter()
            .enumerate()
        {
            let pair = json::object(item, &format!("Partition.data {}", i))?;
            json::check_keys(
                pair,
                &["atleast", "data"],
                &[],
                &format!("Partition.data {}", i),
            )?;
            let atleast = json::get_f64(pair, "atleast", &format!("Partition.data {}", i))?;
            let sub = Factory::fragment(
                tag,
                json::get(pair, "data", &format!("Partition.data {}", i))?,
                data_name.as_deref(),
            )?;
            cuts.push((atleast, sub));
        }

        let mut out = Partitioned::new(json::get_f64(obj, "entries", TAG)?, cuts)?;
        out.name = json::get_opt_name(obj, TAG)?
            .or_else(|| name_from_parent.map(str::to_string));
        Ok(out)
    }
}

pub(crate) fn factory(value: &Value, name_from_parent: Option<&str>) -> HgResult<Aggregated> {
    Partitioned::from_json_fragment(value, name_from_parent).map(Aggregated::Partitioned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::assert_exact;

    fn partition() -> Partitioning<f64> {
        Partitioning::new(
            Quantity::new(|x: &f64| *x),
            Aggregating::count(),
            vec![0.0, 5.0, 10.0],
        )
        .expect("build")
    }

    #[test]
    fn each_datum_lands_in_exactly_one_interval() {
        let mut p = partition();
        for q in [-3.0, 1.0, 6.0, 12.0, 5.0] {
            p.fill(&q, 1.0).expect("fill");
        }
        let counts: Vec<f64> = p.cuts.iter().map(|(_, v)| v.entries()).collect();
        // (-inf,0): -3 | [0,5): 1 | [5,10): 6 and 5 | [10,inf): 12
        assert_eq!(counts, vec![1.0, 1.0, 2.0, 1.0]);
        let total: f64 = counts.iter().sum();
        assert_exact("routing is exclusive", p.entries, total);
    }

    #[test]
    fn nan_counts_entries_but_lands_nowhere() {
        let mut p = partition();
        p.fill(&f64::NAN, 1.0).expect("fill");
        assert_exact("entries", 1.0, p.entries);
        let total: f64 = p.cuts.iter().map(|(_, v)| v.entries()).sum();
        assert_exact("no sub filled", 0.0, total);
    }

    #[test]
    fn infinity_lands_in_the_unbounded_last_interval() {
        let mut p = partition();
        p.fill(&f64::INFINITY, 1.0).expect("fill");
        assert_exact("last interval", 1.0, p.cuts[3].1.entries());
    }
}
