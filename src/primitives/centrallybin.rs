//! CentrallyBin: a fixed set of bin centers with nearest-center assignment.
//!
//! The extremes are unbounded, so there is no underflow or overflow; only NaN
//! needs a sink. Ties between two equally near centers go to the lower one.

use ordered_float::OrderedFloat;
use serde_json::{Map, Value};

use crate::clustering;
use crate::error::{HgError, HgResult};
use crate::json;
use crate::primitives::minmax::{maxplus, minplus};
use crate::primitives::{merged_name, Aggregated, Aggregating};
use crate::quantity::Quantity;
use crate::registry::Factory;

pub(crate) const TAG: &str = "CentrallyBin";

fn check_centers(centers: &[f64]) -> HgResult<()> {
    if centers.len() < 2 {
        return Err(HgError::validation(format!(
            "CentrallyBin needs at least two centers (got {})",
            centers.len()
        )));
    }
    if centers.iter().any(|c| c.is_nan()) {
        return Err(HgError::validation(
            "CentrallyBin centers cannot be NaN".to_string(),
        ));
    }
    if centers.windows(2).any(|w| w[0] >= w[1]) {
        return Err(HgError::validation(
            "CentrallyBin centers must be strictly increasing".to_string(),
        ));
    }
    Ok(())
}

/// Present-tense central binner.
pub struct CentrallyBinning<D> {
    pub(crate) quantity: Quantity<D, f64>,
    pub(crate) entries: f64,
    pub(crate) bins: Vec<(f64, Aggregating<D>)>,
    pub(crate) min: f64,
    pub(crate) max: f64,
    pub(crate) nanflow: Box<Aggregating<D>>,
}

impl<D> CentrallyBinning<D> {
    pub fn new(
        mut centers: Vec<f64>,
        quantity: Quantity<D, f64>,
        value: Aggregating<D>,
    ) -> HgResult<Self> {
        centers.sort_by(f64::total_cmp);
        check_centers(&centers)?;
        Ok(CentrallyBinning {
            quantity,
            entries: 0.0,
            bins: centers.into_iter().map(|c| (c, value.zero())).collect(),
            min: f64::NAN,
            max: f64::NAN,
            nanflow: Box::new(Aggregating::count()),
        })
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
                let index = clustering::nearest_index(&self.bins, q);
                self.bins[index].1.fill(datum, weight)?;
                if self.min.is_nan() || q < self.min {
                    self.min = q;
                }
                if self.max.is_nan() || q > self.max {
                    self.max = q;
                }
            }
            self.entries += weight;
        }
        Ok(())
    }

    pub(crate) fn merge(&self, other: &Self) -> HgResult<Self> {
        if self.centers() != other.centers() {
            return Err(HgError::mismatch(
                "CentrallyBin centers differ".to_string(),
            ));
        }
        let bins = self
            .bins
            .iter()
            .zip(&other.bins)
            .map(|((c, a), (_, b))| Ok((*c, a.merge(b)?)))
            .collect::<HgResult<Vec<_>>>()?;
        Ok(CentrallyBinning {
            quantity: self.quantity.merge_with(&other.quantity)?,
            entries: self.entries + other.entries,
            bins,
            min: minplus(self.min, other.min),
            max: maxplus(self.max, other.max),
            nanflow: Box::new(self.nanflow.merge(&other.nanflow)?),
        })
    }

    pub(crate) fn zero(&self) -> Self {
        CentrallyBinning {
            quantity: self.quantity.clone(),
            entries: 0.0,
            bins: self.bins.iter().map(|(c, v)| (*c, v.zero())).collect(),
            min: f64::NAN,
            max: f64::NAN,
            nanflow: Box::new(self.nanflow.zero()),
        }
    }

    pub(crate) fn snapshot(&self) -> CentrallyBinned {
        CentrallyBinned {
            name: self.quantity.name().map(str::to_string),
            entries: OrderedFloat(self.entries),
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

impl<D> Clone for CentrallyBinning<D> {
    fn clone(&self) -> Self {
        CentrallyBinning {
            quantity: self.quantity.clone(),
            entries: self.entries,
            bins: self.bins.clone(),
            min: self.min,
            max: self.max,
            nanflow: self.nanflow.clone(),
        }
    }
}

/// Past-tense central binner.
#[derive(Debug, Clone, PartialEq)]
pub struct CentrallyBinned {
    pub(crate) name: Option<String>,
    pub(crate) entries: OrderedFloat<f64>,
    pub(crate) bins: Vec<(OrderedFloat<f64>, Aggregated)>,
    pub(crate) min: OrderedFloat<f64>,
    pub(crate) max: OrderedFloat<f64>,
    pub(crate) nanflow: Box<Aggregated>,
}

impl CentrallyBinned {
    pub fn new(
        entries: f64,
        bins: Vec<(f64, Aggregated)>,
        min: f64,
        max: f64,
        nanflow: Aggregated,
    ) -> HgResult<Self> {
        if entries < 0.0 {
            return Err(HgError::validation(format!(
                "CentrallyBin entries ({}) cannot be negative",
                entries
            )));
        }
        let centers: Vec<f64> = bins.iter().map(|(c, _)| *c).collect();
        check_centers(&centers)?;
        if let Some(first) = bins.first() {
            if bins.iter().any(|(_, v)| v.tag() != first.1.tag()) {
                return Err(HgError::validation(
                    "all CentrallyBin values must have the same type".to_string(),
                ));
            }
        }
        Ok(CentrallyBinned {
            name: None,
            entries: OrderedFloat(entries),
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
        if self.centers() != other.centers() {
            return Err(HgError::mismatch(
                "CentrallyBin centers differ".to_string(),
            ));
        }
        let bins = self
            .bins
            .iter()
            .zip(&other.bins)
            .map(|((c, a), (_, b))| Ok((c.into_inner(), a.merge(b)?)))
            .collect::<HgResult<Vec<_>>>()?;
        let mut out = CentrallyBinned::new(
            self.entries() + other.entries(),
            bins,
            minplus(self.min(), other.min()),
            maxplus(self.max(), other.max()),
            self.nanflow.merge(&other.nanflow)?,
        )?;
        out.name = merged_name(self.name(), other.name(), TAG)?;
        Ok(out)
    }

    pub(crate) fn zero(&self) -> Self {
        CentrallyBinned {
            name: self.name.clone(),
            entries: OrderedFloat(0.0),
            bins: self
                .bins
                .iter()
                .map(|(c, v)| (*c, v.zero()))
                .collect(),
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
        obj.insert(
            "bins:type".to_string(),
            Value::String(self.bins[0].1.tag().to_string()),
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
                "bins:type",
                "bins",
                "min",
                "max",
                "nanflow:type",
                "nanflow",
            ],
            &["name"],
            TAG,
        )?;

        let bins_tag = json::get_str(obj, "bins:type", TAG)?;
        let mut bins = Vec::new();
        for (i, item) in json::array(json::get(obj, "bins", TAG)?, "CentrallyBin.bins")?
            .iter()
            .enumerate()
        {
            let pair = json::object(item, &format!("CentrallyBin.bins {}", i))?;
            json::check_keys(
                pair,
                &["center", "value"],
                &[],
                &format!("CentrallyBin.bins {}", i),
            )?;
            let center = json::get_f64(pair, "center", &format!("CentrallyBin.bins {}", i))?;
            let sub = Factory::fragment(
                bins_tag,
                json::get(pair, "value", &format!("CentrallyBin.bins {}", i))?,
                None,
            )?;
            bins.push((center, sub));
        }

        let nanflow = Factory::fragment(
            json::get_str(obj, "nanflow:type", TAG)?,
            json::get(obj, "nanflow", TAG)?,
            None,
        )?;

        let mut out = CentrallyBinned::new(
            json::get_f64(obj, "entries", TAG)?,
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
    CentrallyBinned::from_json_fragment(value, name_from_parent).map(Aggregated::CentrallyBinned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::assert_exact;

    fn three_centers() -> CentrallyBinning<f64> {
        CentrallyBinning::new(
            vec![0.0, 2.0, 10.0],
            Quantity::new(|x: &f64| *x),
            Aggregating::count(),
        )
        .expect("build")
    }

    #[test]
    fn fills_route_to_the_nearest_center_with_lower_ties() {
        let mut c = three_centers();
        for q in [-5.0, 0.9, 1.0, 1.1, 50.0] {
            c.fill(&q, 1.0).expect("fill");
        }
        // 1.0 is equidistant from 0 and 2 and goes to the lower center.
        assert_exact("center 0", 3.0, c.bins[0].1.entries());
        assert_exact("center 2", 1.0, c.bins[1].1.entries());
        assert_exact("center 10", 1.0, c.bins[2].1.entries());
        assert_exact("min", -5.0, c.min);
        assert_exact("max", 50.0, c.max);
    }

    #[test]
    fn nan_routes_to_nanflow_without_touching_extremes() {
        let mut c = three_centers();
        c.fill(&f64::NAN, 1.0).expect("fill");
        assert_exact("nanflow", 1.0, c.nanflow.entries());
        assert!(c.min.is_nan() && c.max.is_nan());
    }

    #[test]
    fn constructor_sorts_and_validates_centers() {
        let q = || Quantity::new(|x: &f64| *x);
        let c = CentrallyBinning::new(vec![10.0, 0.0, 2.0], q(), Aggregating::count())
            .expect("build");
        assert_eq!(c.centers(), vec![0.0, 2.0, 10.0]);

        assert!(CentrallyBinning::new(vec![1.0], q(), Aggregating::count()).is_err());
        assert!(CentrallyBinning::new(vec![1.0, 1.0], q(), Aggregating::count()).is_err());
    }

    #[test]
    fn merge_requires_identical_centers() {
        let mut a = three_centers();
        let mut b = three_centers();
        a.fill(&0.1, 1.0).expect("fill");
        b.fill(&9.9, 2.0).expect("fill");

        let m = a.merge(&b).expect("merge");
        assert_exact("entries", 3.0, m.entries);
        assert_exact("min", 0.1, m.min);
        assert_exact("max", 9.9, m.max);

        let other = CentrallyBinning::new(
            vec![0.0, 5.0],
            Quantity::new(|x: &f64| *x),
            Aggregating::count(),
        )
        .expect("build");
        assert!(a.merge(&other).is_err());
    }
}
