//! User-supplied extractors.
//!
//! A [`Quantity`] wraps a closure `Fn(&D) -> R` that pulls one value out of an
//! input record: a number to bin or average, a category string, or a bag key.
//! Quantities may carry a *name* (propagated into JSON as `"name"`) and may
//! memoize their last evaluation, which pays off when the same expensive
//! extractor feeds several branches of one tree.
//!
//! Naming is one-shot: renaming an already-named quantity is a
//! [`NameConflict`](crate::HgError::NameConflict).

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use crate::error::{HgError, HgResult};

/// A named, shareable extractor from a datum to a value.
///
/// Cloning a `Quantity` shares the underlying function (and its memo, if
/// any), so an aggregator's `zero` and `merge` results evaluate the very same
/// closure as the original.
pub struct Quantity<D, R> {
    name: Option<String>,
    f: Arc<dyn Fn(&D) -> R>,
}

/// A selection is a numeric quantity interpreted as an extra weight factor.
/// Boolean predicates are lifted to 1.0/0.0 by the caller.
pub type Selection<D> = Quantity<D, f64>;

/// The constant-1.0 selection: every datum passes with its full weight.
pub fn unweighted<D>() -> Selection<D> {
    Quantity::new(|_| 1.0)
}

impl<D, R> Quantity<D, R> {
    /// Wrap a bare closure with no name and no caching.
    pub fn new(f: impl Fn(&D) -> R + 'static) -> Self {
        Quantity {
            name: None,
            f: Arc::new(f),
        }
    }

    /// Wrap a closure under a name; the name travels into JSON output.
    pub fn named(name: impl Into<String>, f: impl Fn(&D) -> R + 'static) -> Self {
        Quantity {
            name: Some(name.into()),
            f: Arc::new(f),
        }
    }

    /// Attach a name to an unnamed quantity. Naming is one-shot: attaching a
    /// different name to an already-named quantity fails.
    pub fn with_name(self, name: impl Into<String>) -> HgResult<Self> {
        let name = name.into();
        if let Some(existing) = &self.name {
            if *existing != name {
                return Err(HgError::name_conflict(format!(
                    "cannot rename quantity {:?} to {:?}",
                    existing, name
                )));
            }
        }
        Ok(Quantity {
            name: Some(name),
            f: self.f,
        })
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Apply the extractor to one datum.
    #[inline]
    pub fn eval(&self, datum: &D) -> R {
        (self.f)(datum)
    }

    /// The quantity carried by a merge result: the function is shared from
    /// `self`; the name is whichever side has one, and both sides must agree
    /// when both are named.
    pub(crate) fn merge_with(&self, other: &Self) -> HgResult<Self> {
        match (self.name(), other.name()) {
            (Some(a), Some(b)) if a != b => Err(HgError::name_conflict(format!(
                "cannot merge quantities named {:?} and {:?}",
                a, b
            ))),
            (None, Some(b)) => Ok(Quantity {
                name: Some(b.to_string()),
                f: Arc::clone(&self.f),
            }),
            _ => Ok(self.clone()),
        }
    }
}

impl<D: Clone + PartialEq + 'static, R: Clone + 'static> Quantity<D, R> {
    /// Wrap a closure with last-value memoization: if the next datum compares
    /// equal to the previous one, the stored result is returned without
    /// re-evaluating.
    pub fn cached(f: impl Fn(&D) -> R + 'static) -> Self {
        let memo: RefCell<Option<(D, R)>> = RefCell::new(None);
        Quantity::new(move |datum: &D| {
            if let Some((last, out)) = memo.borrow().as_ref() {
                if last == datum {
                    return out.clone();
                }
            }
            let out = f(datum);
            *memo.borrow_mut() = Some((datum.clone(), out.clone()));
            out
        })
    }

    /// Named variant of [`Quantity::cached`].
    pub fn cached_named(name: impl Into<String>, f: impl Fn(&D) -> R + 'static) -> Self {
        Quantity {
            name: Some(name.into()),
            ..Self::cached(f)
        }
    }
}

impl<D, R> Clone for Quantity<D, R> {
    fn clone(&self) -> Self {
        Quantity {
            name: self.name.clone(),
            f: Arc::clone(&self.f),
        }
    }
}

impl<D, R> fmt::Debug for Quantity<D, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "Quantity({:?})", name),
            None => write!(f, "Quantity(<anonymous>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn naming_is_one_shot() {
        let q: Quantity<f64, f64> = Quantity::new(|x| *x);
        let q = q.with_name("px").expect("first naming");
        assert_eq!(q.name(), Some("px"));

        // Same name again is a no-op, a different name is a conflict.
        assert!(q.clone().with_name("px").is_ok());
        let err = q.with_name("py").expect_err("rename must fail");
        assert!(matches!(err, HgError::NameConflict { .. }));
    }

    #[test]
    fn merge_with_adopts_the_named_side_and_rejects_disagreement() {
        let anon: Quantity<f64, f64> = Quantity::new(|x| *x);
        let named: Quantity<f64, f64> = Quantity::named("pt", |x| *x);

        assert_eq!(anon.merge_with(&named).expect("adopt").name(), Some("pt"));
        assert_eq!(named.merge_with(&anon).expect("keep").name(), Some("pt"));

        let other: Quantity<f64, f64> = Quantity::named("eta", |x| *x);
        assert!(named.merge_with(&other).is_err());
    }

    #[test]
    fn cached_reevaluates_only_on_new_input() {
        let calls = Rc::new(Cell::new(0u32));
        let seen = Rc::clone(&calls);
        let q: Quantity<i64, f64> = Quantity::cached(move |x| {
            seen.set(seen.get() + 1);
            *x as f64
        });

        assert_eq!(q.eval(&7), 7.0);
        assert_eq!(q.eval(&7), 7.0);
        assert_eq!(calls.get(), 1);

        assert_eq!(q.eval(&8), 8.0);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn clones_share_the_function_and_its_memo() {
        let calls = Rc::new(Cell::new(0u32));
        let seen = Rc::clone(&calls);
        let q: Quantity<i64, f64> = Quantity::cached(move |x| {
            seen.set(seen.get() + 1);
            *x as f64
        });
        let q2 = q.clone();

        q.eval(&1);
        q2.eval(&1);
        assert_eq!(calls.get(), 1);
    }
}
