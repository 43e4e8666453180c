//! Bin: a dense, regular partition of `[low, high)` with out-of-range sinks.
//!
//! The bin itself applies no selection; wrap it in Select to reweight or cut
//! (a plain histogram is `Select ∘ Bin(..., Count)`).

use ordered_float::OrderedFloat;
use serde_json::{Map, Value};

use crate::error::{HgError, HgResult};
use crate::json;
use crate::primitives::{merged_name, Aggregated, Aggregating};
use crate::quantity::Quantity;
use crate::registry::Factory;

pub(crate) const TAG: &str = "Bin";

/// Present-tense dense binner.
pub struct Binning<D> {
    pub(crate) quantity: Quantity<D, f64>,
    pub(crate) entries: f64,
    pub(crate) low: f64,
    pub(crate) high: f64,
    pub(crate) values: Vec<Aggregating<D>>,
    pub(crate) underflow: Box<Aggregating<D>>,
    pub(crate) overflow: Box<Aggregating<D>>,
    pub(crate) nanflow: Box<Aggregating<D>>,
}

fn check_edges(num: usize, low: f64, high: f64) -> HgResult<()> {
    if num < 1 {
        return Err(HgError::validation(format!(
            "Bin num ({}) must be at least one",
            num
        )));
    }
    if !(low < high) {
        return Err(HgError::validation(format!(
            "Bin low ({}) must be less than high ({})",
            low, high
        )));
    }
    Ok(())
}

impl<D> Binning<D> {
    /// `num` zeroed copies of `value` over `[low, high)`, with Count sinks.
    pub fn new(
        num: usize,
        low: f64,
        high: f64,
        quantity: Quantity<D, f64>,
        value: Aggregating<D>,
    ) -> HgResult<Self> {
        Self::with_flows(
            num,
            low,
            high,
            quantity,
            value,
            Aggregating::count(),
            Aggregating::count(),
            Aggregating::count(),
        )
    }

    /// Full constructor with caller-supplied underflow/overflow/nanflow.
    #[allow(clippy::too_many_arguments)]
    pub fn with_flows(
        num: usize,
        low: f64,
        high: f64,
        quantity: Quantity<D, f64>,
        value: Aggregating<D>,
        underflow: Aggregating<D>,
        overflow: Aggregating<D>,
        nanflow: Aggregating<D>,
    ) -> HgResult<Self> {
        check_edges(num, low, high)?;
        Ok(Binning {
            quantity,
            entries: 0.0,
            low,
            high,
            values: (0..num).map(|_| value.zero()).collect(),
            underflow: Box::new(underflow.zero()),
            overflow: Box::new(overflow.zero()),
            nanflow: Box::new(nanflow.zero()),
        })
    }

    #[inline]
    pub fn num(&self) -> usize {
        self.values.len()
    }

    /// Index of an in-range quantity; clamped to the last bin only when
    /// floating-point rounding lifts the result to `num` at the right edge.
    fn index(&self, q: f64) -> usize {
        let raw = (self.num() as f64 * (q - self.low) / (self.high - self.low)).floor() as usize;
        raw.min(self.num() - 1)
    }

    pub(crate) fn fill(&mut self, datum: &D, weight: f64) -> HgResult<()> {
        if weight > 0.0 {
            let q = self.quantity.eval(datum);
            if q.is_nan() {
                self.nanflow.fill(datum, weight)?;
            } else if q < self.low {
                self.underflow.fill(datum, weight)?;
            } else if q >= self.high {
                self.overflow.fill(datum, weight)?;
            } else {
                let index = self.index(q);
                self.values[index].fill(datum, weight)?;
            }
            self.entries += weight;
        }
        Ok(())
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.low != other.low || self.high != other.high {
            return Err(HgError::mismatch(format!(
                "Bin edges differ ([{}, {}) vs [{}, {}))",
                self.low, self.high, other.low, other.high
            )));
        }
        if self.num() != other.num() {
            return Err(HgError::mismatch(format!(
                "Bin counts differ ({} vs {})",
                self.num(),
                other.num()
            )));
        }
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a.merge(b))
            .collect::<HgResult<Vec<_>>>()?;
        Ok(Binning {
            quantity: self.quantity.merge_with(&other.quantity)?,
            entries: self.entries + other.entries,
            low: self.low,
            high: self.high,
            values,
            underflow: Box::new(self.underflow.merge(&other.underflow)?),
            overflow: Box::new(self.overflow.merge(&other.overflow)?),
            nanflow: Box::new(self.nanflow.merge(&other.nanflow)?),
        })
    }

    pub(crate) fn zero(&self) -> Self {
        Binning {
            quantity: self.quantity.clone(),
            entries: 0.0,
            low: self.low,
            high: self.high,
            values: self.values.iter().map(|v| v.zero()).collect(),
            underflow: Box::new(self.underflow.zero()),
            overflow: Box::new(self.overflow.zero()),
            nanflow: Box::new(self.nanflow.zero()),
        }
    }

    pub(crate) fn snapshot(&self) -> Binned {
        Binned {
            name: self.quantity.name().map(str::to_string),
            entries: OrderedFloat(self.entries),
            low: OrderedFloat(self.low),
            high: OrderedFloat(self.high),
            values: self.values.iter().map(|v| v.snapshot()).collect(),
            underflow: Box::new(self.underflow.snapshot()),
            overflow: Box::new(self.overflow.snapshot()),
            nanflow: Box::new(self.nanflow.snapshot()),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregating<D>> {
        let mut out = vec![
            self.underflow.as_ref(),
            self.overflow.as_ref(),
            self.nanflow.as_ref(),
        ];
        out.extend(self.values.iter());
        out
    }
}

impl<D> Clone for Binning<D> {
    fn clone(&self) -> Self {
        Binning {
            quantity: self.quantity.clone(),
            entries: self.entries,
            low: self.low,
            high: self.high,
            values: self.values.clone(),
            underflow: self.underflow.clone(),
            overflow: self.overflow.clone(),
            nanflow: self.nanflow.clone(),
        }
    }
}

/// Past-tense dense binner.
#[derive(Debug, Clone, PartialEq)]
pub struct Binned {
    pub(crate) name: Option<String>,
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) low: OrderedFloat<f64>,
    pub(crate) high: OrderedFloat<f64>,
    pub(crate) values: Vec<Aggregated>,
    pub(crate) underflow: Box<Aggregated>,
    pub(crate) overflow: Box<Aggregated>,
    pub(crate) nanflow: Box<Aggregated>,
}

impl Binned {
    pub fn new(
        low: f64,
        high: f64,
        entries: f64,
        values: Vec<Aggregated>,
        underflow: Aggregated,
        overflow: Aggregated,
        nanflow: Aggregated,
    ) -> HgResult<Self> {
        if entries < 0.0 {
            return Err(HgError::validation(format!(
                "Bin entries ({}) cannot be negative",
                entries
            )));
        }
        check_edges(values.len(), low, high)?;
        if let Some(first) = values.first() {
            if values.iter().any(|v| v.tag() != first.tag()) {
                return Err(HgError::validation(
                    "all Bin values must have the same type".to_string(),
                ));
            }
        }
        Ok(Binned {
            name: None,
            entries: OrderedFloat(entries),
            low: OrderedFloat(low),
            high: OrderedFloat(high),
            values,
            underflow: Box::new(underflow),
            overflow: Box::new(overflow),
            nanflow: Box::new(nanflow),
        })
    }

    #[inline]
    pub fn entries(&self) -> f64 {
        self.entries.into_inner()
    }

    #[inline]
    pub fn low(&self) -> f64 {
        self.low.into_inner()
    }

    #[inline]
    pub fn high(&self) -> f64 {
        self.high.into_inner()
    }

    #[inline]
    pub fn num(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn values(&self) -> &[Aggregated] {
        &self.values
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.low != other.low || self.high != other.high {
            return Err(HgError::mismatch(format!(
                "Bin edges differ ([{}, {}) vs [{}, {}))",
                self.low(),
                self.high(),
                other.low(),
                other.high()
            )));
        }
        if self.num() != other.num() {
            return Err(HgError::mismatch(format!(
                "Bin counts differ ({} vs {})",
                self.num(),
                other.num()
            )));
        }
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a.merge(b))
            .collect::<HgResult<Vec<_>>>()?;
        let mut out = Binned::new(
            self.low(),
            self.high(),
            self.entries() + other.entries(),
            values,
            self.underflow.merge(&other.underflow)?,
            self.overflow.merge(&other.overflow)?,
            self.nanflow.merge(&other.nanflow)?,
        )?;
        out.name = merged_name(self.name(), other.name(), TAG)?;
        Ok(out)
    }

    pub(crate) fn zero(&self) -> Self {
        Binned {
            name: self.name.clone(),
            entries: OrderedFloat(0.0),
            low: self.low,
            high: self.high,
            values: self.values.iter().map(|v| v.zero()).collect(),
            underflow: Box::new(self.underflow.zero()),
            overflow: Box::new(self.overflow.zero()),
            nanflow: Box::new(self.nanflow.zero()),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregated> {
        let mut out = vec![
            self.underflow.as_ref(),
            self.overflow.as_ref(),
            self.nanflow.as_ref(),
        ];
        out.extend(self.values.iter());
        out
    }

    pub(crate) fn to_json_fragment(&self, suppress_name: bool) -> Value {
        let values_name = self.values.first().and_then(|v| v.quantity_name());

        let mut obj = Map::new();
        obj.insert("low".to_string(), json::float_to_json(self.low()));
        obj.insert("high".to_string(), json::float_to_json(self.high()));
        obj.insert("entries".to_string(), json::float_to_json(self.entries()));
        obj.insert(
            "values:type".to_string(),
            Value::String(self.values[0].tag().to_string()),
        );
        obj.insert(
            "values".to_string(),
            Value::Array(
                self.values
                    .iter()
                    .map(|v| v.to_json_fragment(true))
                    .collect(),
            ),
        );
        obj.insert(
            "underflow:type".to_string(),
            Value::String(self.underflow.tag().to_string()),
        );
        obj.insert("underflow".to_string(), self.underflow.to_json_fragment(false));
        obj.insert(
            "overflow:type".to_string(),
            Value::String(self.overflow.tag().to_string()),
        );
        obj.insert("overflow".to_string(), self.overflow.to_json_fragment(false));
        obj.insert(
            "nanflow:type".to_string(),
            Value::String(self.nanflow.tag().to_string()),
        );
        obj.insert("nanflow".to_string(), self.nanflow.to_json_fragment(false));
        if !suppress_name {
            if let Some(name) = self.name() {
                obj.insert("name".to_string(), Value::String(name.to_string()));
            }
        }
        if let Some(values_name) = values_name {
            obj.insert(
                "values:name".to_string(),
                Value::String(values_name.to_string()),
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
            &[
                "low",
                "high",
                "entries",
                "values:type",
                "values",
                "underflow:type",
                "underflow",
                "overflow:type",
                "overflow",
                "nanflow:type",
                "nanflow",
            ],
            &["name", "values:name"],
            TAG,
        )?;

        let values_tag = json::get_str(obj, "values:type", TAG)?;
        let values_name = json::get_opt_str(obj, "values:name", TAG)?;
        let values = json::array(json::get(obj, "values", TAG)?, "Bin.values")?
            .iter()
            .map(|v| Factory::fragment(values_tag, v, values_name.as_deref()))
            .collect::<HgResult<Vec<_>>>()?;

        let underflow = Factory::fragment(
            json::get_str(obj, "underflow:type", TAG)?,
            json::get(obj, "underflow", TAG)?,
            None,
        )?;
        let overflow = Factory::fragment(
            json::get_str(obj, "overflow:type", TAG)?,
            json::get(obj, "overflow", TAG)?,
            None,
        )?;
        let nanflow = Factory::fragment(
            json::get_str(obj, "nanflow:type", TAG)?,
            json::get(obj, "nanflow", TAG)?,
            None,
        )?;

        let mut out = Binned::new(
            json::get_f64(obj, "low", TAG)?,
            json::get_f64(obj, "high", TAG)?,
            json::get_f64(obj, "entries", TAG)?,
            values,
            underflow,
            overflow,
            nanflow,
        )?;
        out.name = json::get_opt_name(obj, TAG)?
            .or_else(|| name_from_parent.map(str::to_string));
        Ok(out)
    }
}

pub(crate) fn factory(value: &Value, name_from_parent: Option<&str>) -> HgResult<Aggregated> {
    Binned::from_json_fragment(value, name_from_parent).map(Aggregated::Binned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::assert_exact;

    fn five_bins() -> Binning<f64> {
        Binning::new(
            5,
            0.0,
            5.0,
            Quantity::new(|x: &f64| *x),
            Aggregating::count(),
        )
        .expect("build")
    }

    #[test]
    fn routing_covers_range_sinks_and_the_right_edge() {
        let mut bin = five_bins();
        for q in [0.5, 0.5, 2.5, 4.999, 5.0, -1.0, f64::NAN] {
            bin.fill(&q, 1.0).expect("fill");
        }

        let counts: Vec<f64> = bin.values.iter().map(|v| v.entries()).collect();
        assert_eq!(counts, vec![2.0, 0.0, 1.0, 0.0, 1.0]);
        assert_exact("underflow", 1.0, bin.underflow.entries());
        assert_exact("overflow", 1.0, bin.overflow.entries());
        assert_exact("nanflow", 1.0, bin.nanflow.entries());
        assert_exact("entries", 7.0, bin.entries);
    }

    #[test]
    fn index_formula_matches_the_floor_rule() {
        let bin = five_bins();
        assert_eq!(bin.index(0.0), 0);
        assert_eq!(bin.index(0.999), 0);
        assert_eq!(bin.index(1.0), 1);
        assert_eq!(bin.index(4.999_999), 4);
    }

    #[test]
    fn constructor_rejects_degenerate_shapes() {
        let q = || Quantity::new(|x: &f64| *x);
        assert!(Binning::new(0, 0.0, 1.0, q(), Aggregating::count()).is_err());
        assert!(Binning::new(3, 1.0, 1.0, q(), Aggregating::count()).is_err());
        assert!(Binning::new(3, 2.0, 1.0, q(), Aggregating::count()).is_err());
    }

    #[test]
    fn merge_requires_identical_edges_and_counts() {
        let mut a = five_bins();
        let mut b = five_bins();
        a.fill(&1.5, 1.0).expect("fill");
        b.fill(&1.7, 2.0).expect("fill");

        let m = a.merge(&b).expect("merge");
        assert_exact("entries", 3.0, m.entries);
        assert_exact("bin 1", 3.0, m.values[1].entries());

        let other = Binning::new(
            5,
            0.0,
            10.0,
            Quantity::new(|x: &f64| *x),
            Aggregating::count(),
        )
        .expect("build");
        assert!(a.merge(&other).is_err());
    }
}
