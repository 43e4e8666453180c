//! SparselyBin: regular bins created on demand over an unbounded axis.
//!
//! While filling, bins live in a hash map keyed by `floor((q - origin) /
//! binWidth)`; the past tense keeps the same data sorted. Reported
//! `low`/`high`/`num` derive from the observed index range.

use std::collections::{BTreeMap, HashMap};

use ordered_float::OrderedFloat;
use serde_json::{Map, Value};

use crate::error::{HgError, HgResult};
use crate::json;
use crate::primitives::{merged_name, Aggregated, Aggregating};
use crate::quantity::Quantity;
use crate::registry::Factory;

pub(crate) const TAG: &str = "SparselyBin";

fn check_bin_width(bin_width: f64) -> HgResult<()> {
    if !(bin_width > 0.0) || !bin_width.is_finite() {
        return Err(HgError::validation(format!(
            "SparselyBin binWidth ({}) must be greater than zero",
            bin_width
        )));
    }
    Ok(())
}

/// Present-tense sparse binner.
pub struct SparselyBinning<D> {
    pub(crate) quantity: Quantity<D, f64>,
    pub(crate) bin_width: f64,
    pub(crate) origin: f64,
    pub(crate) entries: f64,
    pub(crate) value: Box<Aggregating<D>>,
    pub(crate) bins: HashMap<i64, Aggregating<D>>,
    pub(crate) nanflow: Box<Aggregating<D>>,
}

impl<D> SparselyBinning<D> {
    pub fn new(
        bin_width: f64,
        quantity: Quantity<D, f64>,
        value: Aggregating<D>,
    ) -> HgResult<Self> {
        Self::with_origin(bin_width, 0.0, quantity, value, Aggregating::count())
    }

    pub fn with_origin(
        bin_width: f64,
        origin: f64,
        quantity: Quantity<D, f64>,
        value: Aggregating<D>,
        nanflow: Aggregating<D>,
    ) -> HgResult<Self> {
        check_bin_width(bin_width)?;
        Ok(SparselyBinning {
            quantity,
            bin_width,
            origin,
            entries: 0.0,
            value: Box::new(value.zero()),
            bins: HashMap::new(),
            nanflow: Box::new(nanflow.zero()),
        })
    }

    #[inline]
    pub fn bin(&self, q: f64) -> i64 {
        ((q - self.origin) / self.bin_width).floor() as i64
    }

    pub fn min_bin(&self) -> Option<i64> {
        self.bins.keys().min().copied()
    }

    pub fn max_bin(&self) -> Option<i64> {
        self.bins.keys().max().copied()
    }

    /// Span of the observed index range, in bins.
    pub fn num(&self) -> i64 {
        match (self.min_bin(), self.max_bin()) {
            (Some(lo), Some(hi)) => 1 + hi - lo,
            _ => 0,
        }
    }

    pub fn low(&self) -> Option<f64> {
        self.min_bin().map(|i| i as f64 * self.bin_width + self.origin)
    }

    pub fn high(&self) -> Option<f64> {
        self.max_bin()
            .map(|i| (i + 1) as f64 * self.bin_width + self.origin)
    }

    /// Edges of the bin at `index`.
    pub fn range(&self, index: i64) -> (f64, f64) {
        (
            index as f64 * self.bin_width + self.origin,
            (index + 1) as f64 * self.bin_width + self.origin,
        )
    }

    pub(crate) fn fill(&mut self, datum: &D, weight: f64) -> HgResult<()> {
        if weight > 0.0 {
            let q = self.quantity.eval(datum);
            if q.is_nan() {
                self.nanflow.fill(datum, weight)?;
            } else {
                let index = self.bin(q);
                self.bins
                    .entry(index)
                    .or_insert_with(|| self.value.zero())
                    .fill(datum, weight)?;
            }
            self.entries += weight;
        }
        Ok(())
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.bin_width != other.bin_width {
            return Err(HgError::mismatch(format!(
                "SparselyBin binWidth differs ({} vs {})",
                self.bin_width, other.bin_width
            )));
        }
        if self.origin != other.origin {
            return Err(HgError::mismatch(format!(
                "SparselyBin origin differs ({} vs {})",
                self.origin, other.origin
            )));
        }
        let mut bins = self.bins.clone();
        for (index, sub) in &other.bins {
            match bins.get_mut(index) {
                Some(existing) => *existing = existing.merge(sub)?,
                None => {
                    bins.insert(*index, sub.clone());
                }
            }
        }
        Ok(SparselyBinning {
            quantity: self.quantity.merge_with(&other.quantity)?,
            bin_width: self.bin_width,
            origin: self.origin,
            entries: self.entries + other.entries,
            value: self.value.clone(),
            bins,
            nanflow: Box::new(self.nanflow.merge(&other.nanflow)?),
        })
    }

    pub(crate) fn zero(&self) -> Self {
        SparselyBinning {
            quantity: self.quantity.clone(),
            bin_width: self.bin_width,
            origin: self.origin,
            entries: 0.0,
            value: self.value.clone(),
            bins: HashMap::new(),
            nanflow: Box::new(self.nanflow.zero()),
        }
    }

    pub(crate) fn snapshot(&self) -> SparselyBinned {
        SparselyBinned {
            name: self.quantity.name().map(str::to_string),
            bin_width: OrderedFloat(self.bin_width),
            origin: OrderedFloat(self.origin),
            entries: OrderedFloat(self.entries),
            content_type: self.value.tag().to_string(),
            bins: self
                .bins
                .iter()
                .map(|(i, v)| (*i, v.snapshot()))
                .collect(),
            nanflow: Box::new(self.nanflow.snapshot()),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregating<D>> {
        let mut out = vec![self.nanflow.as_ref()];
        out.extend(self.bins.values());
        out
    }
}

impl<D> Clone for SparselyBinning<D> {
    fn clone(&self) -> Self {
        SparselyBinning {
            quantity: self.quantity.clone(),
            bin_width: self.bin_width,
            origin: self.origin,
            entries: self.entries,
            value: self.value.clone(),
            bins: self.bins.clone(),
            nanflow: self.nanflow.clone(),
        }
    }
}

/// Past-tense sparse binner.
#[derive(Debug, Clone, PartialEq)]
pub struct SparselyBinned {
    pub(crate) name: Option<String>,
    pub(crate) bin_width: OrderedFloat<f64>,
    pub(crate) origin: OrderedFloat<f64>,
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) content_type: String,
    pub(crate) bins: BTreeMap<i64, Aggregated>,
    pub(crate) nanflow: Box<Aggregated>,
}

impl SparselyBinned {
    pub fn new(
        bin_width: f64,
        origin: f64,
        entries: f64,
        content_type: impl Into<String>,
        bins: BTreeMap<i64, Aggregated>,
        nanflow: Aggregated,
    ) -> HgResult<Self> {
        check_bin_width(bin_width)?;
        if entries < 0.0 {
            return Err(HgError::validation(format!(
                "SparselyBin entries ({}) cannot be negative",
                entries
            )));
        }
        let content_type = content_type.into();
        if let Some(sub) = bins.values().find(|sub| sub.tag() != content_type) {
            return Err(HgError::validation(format!(
                "SparselyBin bins must all be {:?}, found {:?}",
                content_type,
                sub.tag()
            )));
        }
        Ok(SparselyBinned {
            name: None,
            bin_width: OrderedFloat(bin_width),
            origin: OrderedFloat(origin),
            entries: OrderedFloat(entries),
            content_type,
            bins,
            nanflow: Box::new(nanflow),
        })
    }

    #[inline]
    pub fn entries(&self) -> f64 {
        self.entries.into_inner()
    }

    #[inline]
    pub fn bin_width(&self) -> f64 {
        self.bin_width.into_inner()
    }

    #[inline]
    pub fn origin(&self) -> f64 {
        self.origin.into_inner()
    }

    #[inline]
    pub fn bins(&self) -> &BTreeMap<i64, Aggregated> {
        &self.bins
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn min_bin(&self) -> Option<i64> {
        self.bins.keys().next().copied()
    }

    pub fn max_bin(&self) -> Option<i64> {
        self.bins.keys().next_back().copied()
    }

    pub fn num(&self) -> i64 {
        match (self.min_bin(), self.max_bin()) {
            (Some(lo), Some(hi)) => 1 + hi - lo,
            _ => 0,
        }
    }

    pub fn low(&self) -> Option<f64> {
        self.min_bin()
            .map(|i| i as f64 * self.bin_width() + self.origin())
    }

    pub fn high(&self) -> Option<f64> {
        self.max_bin()
            .map(|i| (i + 1) as f64 * self.bin_width() + self.origin())
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.bin_width != other.bin_width {
            return Err(HgError::mismatch(format!(
                "SparselyBin binWidth differs ({} vs {})",
                self.bin_width(),
                other.bin_width()
            )));
        }
        if self.origin != other.origin {
            return Err(HgError::mismatch(format!(
                "SparselyBin origin differs ({} vs {})",
                self.origin(),
                other.origin()
            )));
        }
        let mut bins = self.bins.clone();
        for (index, sub) in &other.bins {
            match bins.get_mut(index) {
                Some(existing) => *existing = existing.merge(sub)?,
                None => {
                    bins.insert(*index, sub.clone());
                }
            }
        }
        let mut out = SparselyBinned::new(
            self.bin_width(),
            self.origin(),
            self.entries() + other.entries(),
            self.content_type.clone(),
            bins,
            self.nanflow.merge(&other.nanflow)?,
        )?;
        out.name = merged_name(self.name(), other.name(), TAG)?;
        Ok(out)
    }

    pub(crate) fn zero(&self) -> Self {
        SparselyBinned {
            name: self.name.clone(),
            bin_width: self.bin_width,
            origin: self.origin,
            entries: OrderedFloat(0.0),
            content_type: self.content_type.clone(),
            bins: BTreeMap::new(),
            nanflow: Box::new(self.nanflow.zero()),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregated> {
        let mut out: Vec<&Aggregated> = vec![self.nanflow.as_ref()];
        out.extend(self.bins.values());
        out
    }

    pub(crate) fn to_json_fragment(&self, suppress_name: bool) -> Value {
        let mut obj = Map::new();
        obj.insert("binWidth".to_string(), json::float_to_json(self.bin_width()));
        obj.insert("entries".to_string(), json::float_to_json(self.entries()));
        obj.insert(
            "bins:type".to_string(),
            Value::String(self.content_type.clone()),
        );
        let mut bins = Map::new();
        for (index, sub) in &self.bins {
            bins.insert(index.to_string(), sub.to_json_fragment(false));
        }
        obj.insert("bins".to_string(), Value::Object(bins));
        obj.insert(
            "nanflow:type".to_string(),
            Value::String(self.nanflow.tag().to_string()),
        );
        obj.insert("nanflow".to_string(), self.nanflow.to_json_fragment(false));
        obj.insert("origin".to_string(), json::float_to_json(self.origin()));
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
        json::check_keys(
            obj,
            &[
                "binWidth",
                "entries",
                "bins:type",
                "bins",
                "nanflow:type",
                "nanflow",
                "origin",
            ],
            &["name"],
            TAG,
        )?;

        let content_type = json::get_str(obj, "bins:type", TAG)?.to_string();
        let mut bins = BTreeMap::new();
        for (key, sub) in json::object(json::get(obj, "bins", TAG)?, "SparselyBin.bins")? {
            let index: i64 = key.parse().map_err(|_| {
                HgError::json_format(format!(
                    "SparselyBin.bins key must be an integer, got {:?}",
                    key
                ))
            })?;
            bins.insert(index, Factory::fragment(&content_type, sub, None)?);
        }

        let nanflow = Factory::fragment(
            json::get_str(obj, "nanflow:type", TAG)?,
            json::get(obj, "nanflow", TAG)?,
            None,
        )?;

        let mut out = SparselyBinned::new(
            json::get_f64(obj, "binWidth", TAG)?,
            json::get_f64(obj, "origin", TAG)?,
            json::get_f64(obj, "entries", TAG)?,
            content_type,
            bins,
            nanflow,
        )?;
        out.name = json::get_opt_name(obj, TAG)?
            .or_else(|| name_from_parent.map(str::to_string));
        Ok(out)
    }
}

pub(crate) fn factory(value: &Value, name_from_parent: Option<&str>) -> HgResult<Aggregated> {
    SparselyBinned::from_json_fragment(value, name_from_parent).map(Aggregated::SparselyBinned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::assert_exact;

    fn unit_bins() -> SparselyBinning<f64> {
        SparselyBinning::new(1.0, Quantity::new(|x: &f64| *x), Aggregating::count())
            .expect("build")
    }

    #[test]
    fn bins_appear_on_demand() {
        let mut s = unit_bins();
        for q in [0.2, 3.7, 3.9, -0.1] {
            s.fill(&q, 1.0).expect("fill");
        }

        assert_exact("entries", 4.0, s.entries);
        assert_eq!(s.bins.len(), 3);
        assert_exact("bin 0", 1.0, s.bins[&0].entries());
        assert_exact("bin 3", 2.0, s.bins[&3].entries());
        assert_exact("bin -1", 1.0, s.bins[&-1].entries());
        assert_eq!(s.min_bin(), Some(-1));
        assert_eq!(s.max_bin(), Some(3));
        assert_eq!(s.num(), 5);
        assert_eq!(s.low(), Some(-1.0));
        assert_eq!(s.high(), Some(4.0));
    }

    #[test]
    fn nan_goes_to_nanflow_not_a_bin() {
        let mut s = unit_bins();
        s.fill(&f64::NAN, 1.0).expect("fill");
        assert!(s.bins.is_empty());
        assert_exact("nanflow", 1.0, s.nanflow.entries());
        assert_exact("entries", 1.0, s.entries);
    }

    #[test]
    fn merge_unions_indexes_and_requires_matching_grid() {
        let mut a = unit_bins();
        let mut b = unit_bins();
        a.fill(&0.5, 1.0).expect("fill");
        b.fill(&0.5, 2.0).expect("fill");
        b.fill(&9.5, 1.0).expect("fill");

        let m = a.merge(&b).expect("merge");
        assert_exact("bin 0", 3.0, m.bins[&0].entries());
        assert_exact("bin 9", 1.0, m.bins[&9].entries());

        let shifted = SparselyBinning::with_origin(
            1.0,
            0.5,
            Quantity::new(|x: &f64| *x),
            Aggregating::count(),
            Aggregating::count(),
        )
        .expect("build");
        assert!(a.merge(&shifted).is_err());
    }

    #[test]
    fn negative_indexes_round_down() {
        let s = unit_bins();
        assert_eq!(s.bin(-0.1), -1);
        assert_eq!(s.bin(-1.0), -1);
        assert_eq!(s.bin(-1.1), -2);
        assert_eq!(s.bin(0.0), 0);
    }
}
