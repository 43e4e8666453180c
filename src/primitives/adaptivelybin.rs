//! AdaptivelyBin: one-pass clustering into at most `num` centers.
//!
//! Every fill inserts a fresh cluster at the observed value, then the sorted
//! cluster list is squeezed back under the cap by fusing the adjacent pair
//! with the smallest blended gap (see [`crate::clustering`]). `tailDetail`
//! controls how much a pair's distance from the observed range midpoint
//! discounts its gap in that choice.

use ordered_float::OrderedFloat;
use serde_json::{Map, Value};

use crate::clustering::{find_center, merge_down};
use crate::error::{HgError, HgResult};
use crate::json;
use crate::primitives::minmax::{maxplus, minplus};
use crate::primitives::{merged_name, Aggregated, Aggregating};
use crate::quantity::Quantity;
use crate::registry::Factory;

pub(crate) const TAG: &str = "AdaptivelyBin";

fn check_parameters(num: usize, tail_detail: f64) -> HgResult<()> {
    if num < 2 {
        return Err(HgError::validation(format!(
            "AdaptivelyBin num ({}) must be at least two",
            num
        )));
    }
    if !(0.0..=1.0).contains(&tail_detail) {
        return Err(HgError::validation(format!(
            "AdaptivelyBin tailDetail ({}) must be between 0.0 and 1.0 inclusive",
            tail_detail
        )));
    }
    Ok(())
}

/// Present-tense adaptive binner.
pub struct AdaptivelyBinning<D> {
    pub(crate) quantity: Quantity<D, f64>,
    pub(crate) num: usize,
    pub(crate) tail_detail: f64,
    pub(crate) value: Box<Aggregating<D>>,
    pub(crate) entries: f64,
    pub(crate) bins: Vec<(f64, Aggregating<D>)>,
    pub(crate) min: f64,
    pub(crate) max: f64,
    pub(crate) nanflow: Box<Aggregating<D>>,
}

impl<D> AdaptivelyBinning<D> {
    pub fn new(
        quantity: Quantity<D, f64>,
        num: usize,
        tail_detail: f64,
        value: Aggregating<D>,
    ) -> HgResult<Self> {
        check_parameters(num, tail_detail)?;
        Ok(AdaptivelyBinning {
            quantity,
            num,
            tail_detail,
            value: Box::new(value.zero()),
            entries: 0.0,
            bins: Vec::new(),
            min: f64::NAN,
            max: f64::NAN,
            nanflow: Box::new(Aggregating::count()),
        })
    }

    #[inline]
    pub fn num(&self) -> usize {
        self.num
    }

    #[inline]
    pub fn tail_detail(&self) -> f64 {
        self.tail_detail
    }

    pub fn centers(&self) -> Vec<f64> {
        self.bins.iter().map(|(c, _)| *c).collect()
    }

    pub(crate) fn fill(&mut self, datum: &D, weight: f64) -> HgResult<()> {
        if weight > 0.0 {
            let q = self.quantity.eval(datum);
            if q.is_nan() {
                self.nanflow.fill(datum, weight)?;
            } else {
                if self.min.is_nan() || q < self.min {
                    self.min = q;
                }
                if self.max.is_nan() || q > self.max {
                    self.max = q;
                }
                match find_center(&self.bins, q) {
                    Ok(at) => self.bins[at].1.fill(datum, weight)?,
                    Err(at) => {
                        let mut sub = self.value.zero();
                        sub.fill(datum, weight)?;
                        self.bins.insert(at, (q, sub));
                        merge_down(
                            &mut self.bins,
                            self.num,
                            self.tail_detail,
                            self.min,
                            self.max,
                            |v| v.entries(),
                            |a, b| a.merge(b),
                        )?;
                    }
                }
            }
            self.entries += weight;
        }
        Ok(())
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.num != other.num {
            return Err(HgError::mismatch(format!(
                "AdaptivelyBin num differs ({} vs {})",
                self.num, other.num
            )));
        }
        if self.tail_detail != other.tail_detail {
            return Err(HgError::mismatch(format!(
                "AdaptivelyBin tailDetail differs ({} vs {})",
                self.tail_detail, other.tail_detail
            )));
        }

        let min = minplus(self.min, other.min);
        let max = maxplus(self.max, other.max);

        let mut bins = self.bins.clone();
        for (center, sub) in &other.bins {
            match find_center(&bins, *center) {
                Ok(at) => bins[at].1 = bins[at].1.merge(sub)?,
                Err(at) => bins.insert(at, (*center, sub.clone())),
            }
        }
        merge_down(
            &mut bins,
            self.num,
            self.tail_detail,
            min,
            max,
            |v| v.entries(),
            |a, b| a.merge(b),
        )?;

        Ok(AdaptivelyBinning {
            quantity: self.quantity.merge_with(&other.quantity)?,
            num: self.num,
            tail_detail: self.tail_detail,
            value: self.value.clone(),
            entries: self.entries + other.entries,
            bins,
            min,
            max,
            nanflow: Box::new(self.nanflow.merge(&other.nanflow)?),
        })
    }

    pub(crate) fn zero(&self) -> Self {
        AdaptivelyBinning {
            quantity: self.quantity.clone(),
            num: self.num,
            tail_detail: self.tail_detail,
            value: self.value.clone(),
            entries: 0.0,
            bins: Vec::new(),
            min: f64::NAN,
            max: f64::NAN,
            nanflow: Box::new(self.nanflow.zero()),
        }
    }

    pub(crate) fn snapshot(&self) -> AdaptivelyBinned {
        AdaptivelyBinned {
            name: self.quantity.name().map(str::to_string),
            entries: OrderedFloat(self.entries),
            num: self.num,
            tail_detail: OrderedFloat(self.tail_detail),
            content_type: self.value.tag().to_string(),
            bins: self
                .bins
                .iter()
                .map(|(c, v)| (OrderedFloat(*c), v.snapshot()))
                .collect(),
            min: OrderedFloat(self.min),
            max: OrderedFloat(self.max),
            nanflow: Box::new(self.nanflow.snapshot()),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregating<D>> {
        let mut out = vec![self.nanflow.as_ref()];
        out.extend(self.bins.iter().map(|(_, v)| v));
        out
    }
}

impl<D> Clone for AdaptivelyBinning<D> {
    fn clone(&self) -> Self {
        AdaptivelyBinning {
            quantity: self.quantity.clone(),
            num: self.num,
            tail_detail: self.tail_detail,
            value: self.value.clone(),
            entries: self.entries,
            bins: self.bins.clone(),
            min: self.min,
            max: self.max,
            nanflow: self.nanflow.clone(),
        }
    }
}

/// Past-tense adaptive binner.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptivelyBinned {
    pub(crate) name: Option<String>,
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) num: usize,
    pub(crate) tail_detail: OrderedFloat<f64>,
    pub(crate) content_type: String,
    pub(crate) bins: Vec<(OrderedFloat<f64>, Aggregated)>,
    pub(crate) min: OrderedFloat<f64>,
    pub(crate) max: OrderedFloat<f64>,
    pub(crate) nanflow: Box<Aggregated>,
}

impl AdaptivelyBinned {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entries: f64,
        num: usize,
        tail_detail: f64,
        content_type: impl Into<String>,
        bins: Vec<(f64, Aggregated)>,
        min: f64,
        max: f64,
        nanflow: Aggregated,
    ) -> HgResult<Self> {
        if entries < 0.0 {
            return Err(HgError::validation(format!(
                "AdaptivelyBin entries ({}) cannot be negative",
                entries
            )));
        }
        check_parameters(num, tail_detail)?;
        if bins.len() > num {
            return Err(HgError::validation(format!(
                "AdaptivelyBin holds {} clusters but num is {}",
                bins.len(),
                num
            )));
        }
        let content_type = content_type.into();
        if let Some((_, sub)) = bins.iter().find(|(_, sub)| sub.tag() != content_type) {
            return Err(HgError::validation(format!(
                "AdaptivelyBin bins must all be {:?}, found {:?}",
                content_type,
                sub.tag()
            )));
        }
        if bins.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(HgError::validation(
                "AdaptivelyBin centers must be strictly increasing".to_string(),
            ));
        }
        Ok(AdaptivelyBinned {
            name: None,
            entries: OrderedFloat(entries),
            num,
            tail_detail: OrderedFloat(tail_detail),
            content_type,
            bins: bins
                .into_iter()
                .map(|(c, v)| (OrderedFloat(c), v))
                .collect(),
            min: OrderedFloat(min),
            max: OrderedFloat(max),
            nanflow: Box::new(nanflow),
        })
    }

    #[inline]
    pub fn entries(&self) -> f64 {
        self.entries.into_inner()
    }

    #[inline]
    pub fn num(&self) -> usize {
        self.num
    }

    #[inline]
    pub fn tail_detail(&self) -> f64 {
        self.tail_detail.into_inner()
    }

    #[inline]
    pub fn min(&self) -> f64 {
        self.min.into_inner()
    }

    #[inline]
    pub fn max(&self) -> f64 {
        self.max.into_inner()
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn centers(&self) -> Vec<f64> {
        self.bins.iter().map(|(c, _)| c.into_inner()).collect()
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.num != other.num {
            return Err(HgError::mismatch(format!(
                "AdaptivelyBin num differs ({} vs {})",
                self.num, other.num
            )));
        }
        if self.tail_detail != other.tail_detail {
            return Err(HgError::mismatch(format!(
                "AdaptivelyBin tailDetail differs ({} vs {})",
                self.tail_detail(),
                other.tail_detail()
            )));
        }

        let min = minplus(self.min(), other.min());
        let max = maxplus(self.max(), other.max());

        let mut bins: Vec<(f64, Aggregated)> = self
            .bins
            .iter()
            .map(|(c, v)| (c.into_inner(), v.clone()))
            .collect();
        for (center, sub) in &other.bins {
            match find_center(&bins, center.into_inner()) {
                Ok(at) => bins[at].1 = bins[at].1.merge(sub)?,
                Err(at) => bins.insert(at, (center.into_inner(), sub.clone())),
            }
        }
        merge_down(
            &mut bins,
            self.num,
            self.tail_detail(),
            min,
            max,
            |v| v.entries(),
            |a, b| a.merge(b),
        )?;

        let mut out = AdaptivelyBinned::new(
            self.entries() + other.entries(),
            self.num,
            self.tail_detail(),
            self.content_type.clone(),
            bins,
            min,
            max,
            self.nanflow.merge(&other.nanflow)?,
        )?;
        out.name = merged_name(self.name(), other.name(), TAG)?;
        Ok(out)
    }

    pub(crate) fn zero(&self) -> Self {
        AdaptivelyBinned {
            name: self.name.clone(),
            entries: OrderedFloat(0.0),
            num: self.num,
            tail_detail: self.tail_detail,
            content_type: self.content_type.clone(),
            bins: Vec::new(),
            min: OrderedFloat(f64::NAN),
            max: OrderedFloat(f64::NAN),
            nanflow: Box::new(self.nanflow.zero()),
        }
    }

    pub(crate) fn children(&self) -> Vec<&Aggregated> {
        let mut out: Vec<&Aggregated> = vec![self.nanflow.as_ref()];
        out.extend(self.bins.iter().map(|(_, v)| v));
        out
    }

    pub(crate) fn to_json_fragment(&self, suppress_name: bool) -> Value {
        let mut obj = Map::new();
        obj.insert("entries".to_string(), json::float_to_json(self.entries()));
        obj.insert("num".to_string(), Value::from(self.num as u64));
        obj.insert(
            "bins:type".to_string(),
            Value::String(self.content_type.clone()),
        );
        obj.insert(
            "bins".to_string(),
            Value::Array(
                self.bins
                    .iter()
                    .map(|(c, v)| {
                        let mut pair = Map::new();
                        pair.insert("center".to_string(), json::float_to_json(c.into_inner()));
                        pair.insert("value".to_string(), v.to_json_fragment(false));
                        Value::Object(pair)
                    })
                    .collect(),
            ),
        );
        obj.insert("min".to_string(), json::float_to_json(self.min()));
        obj.insert("max".to_string(), json::float_to_json(self.max()));
        obj.insert(
            "nanflow:type".to_string(),
            Value::String(self.nanflow.tag().to_string()),
        );
        obj.insert("nanflow".to_string(), self.nanflow.to_json_fragment(false));
        obj.insert(
            "tailDetail".to_string(),
            json::float_to_json(self.tail_detail()),
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
        json::check_keys(
            obj,
            &[
                "entries",
                "num",
                "bins:type",
                "bins",
                "min",
                "max",
                "nanflow:type",
                "nanflow",
                "tailDetail",
            ],
            &["name"],
            TAG,
        )?;

        let content_type = json::get_str(obj, "bins:type", TAG)?.to_string();
        let mut bins = Vec::new();
        for (i, item) in json::array(json::get(obj, "bins", TAG)?, "AdaptivelyBin.bins")?
            .iter()
            .enumerate()
        {
            let pair = json::object(item, &format!("AdaptivelyBin.bins {}", i))?;
            json::check_keys(
                pair,
                &["center", "value"],
                &[],
                &format!("AdaptivelyBin.bins {}", i),
            )?;
            let center = json::get_f64(pair, "center", &format!("AdaptivelyBin.bins {}", i))?;
            let sub = Factory::fragment(
                &content_type,
                json::get(pair, "value", &format!("AdaptivelyBin.bins {}", i))?,
                None,
            )?;
            bins.push((center, sub));
        }

        let nanflow = Factory::fragment(
            json::get_str(obj, "nanflow:type", TAG)?,
            json::get(obj, "nanflow", TAG)?,
            None,
        )?;

        let mut out = AdaptivelyBinned::new(
            json::get_f64(obj, "entries", TAG)?,
            json::usize_from_json(json::get(obj, "num", TAG)?, "AdaptivelyBin.num")?,
            json::get_f64(obj, "tailDetail", TAG)?,
            content_type,
            bins,
            json::get_f64(obj, "min", TAG)?,
            json::get_f64(obj, "max", TAG)?,
            nanflow,
        )?;
        out.name = json::get_opt_name(obj, TAG)?
            .or_else(|| name_from_parent.map(str::to_string));
        Ok(out)
    }
}

pub(crate) fn factory(value: &Value, name_from_parent: Option<&str>) -> HgResult<Aggregated> {
    AdaptivelyBinned::from_json_fragment(value, name_from_parent).map(Aggregated::AdaptivelyBinned)
}
