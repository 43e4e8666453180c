//! A declarative grammar of composable aggregation primitives.
//!
//! Describe an entire data reduction as a tree of aggregators, feed each
//! input record once into the root, and read weighted summaries off the
//! leaves: counts, sums, means, variances, dense and sparse histograms,
//! adaptive clusters, profile plots, arbitrarily nested views.
//!
//! Trees are commutative monoids under [`merge`](primitives::Aggregating::merge):
//! fill independent trees over shards of a dataset, then combine them in any
//! order and grouping to get the single-pass answer. Every tree has a
//! canonical JSON form, so one process can produce a result that another
//! consumes.
//!
//! Aggregators come in two tenses. The *present tense* (`Counting`,
//! `Summing`, `Binning`, ...) is mutable, holds the user's extraction
//! closures, and accepts [`fill`](primitives::Aggregating::fill). The *past
//! tense* (`Counted`, `Summed`, `Binned`, ...) is an immutable snapshot of
//! the numbers, the only serializable form, and what
//! [`Factory::from_json`] returns.
//!
//! ```
//! use histogrammar::primitives::{Aggregating, Binning, Labeling};
//! use histogrammar::{Factory, HgResult, Quantity};
//!
//! fn main() -> HgResult<()> {
//!     let mut tree: Aggregating<(f64, f64)> = Labeling::new(vec![
//!         (
//!             "px",
//!             Binning::new(
//!                 10,
//!                 -5.0,
//!                 5.0,
//!                 Quantity::named("px", |d: &(f64, f64)| d.0),
//!                 Aggregating::count(),
//!             )?
//!             .into(),
//!         ),
//!         (
//!             "pt",
//!             Binning::new(
//!                 10,
//!                 0.0,
//!                 10.0,
//!                 Quantity::named("pt", |d: &(f64, f64)| d.1),
//!                 Aggregating::count(),
//!             )?
//!             .into(),
//!         ),
//!     ])?
//!     .into();
//!
//!     for event in [(0.5, 2.0), (-1.5, 7.5), (3.0, 0.1)] {
//!         tree.fill(&event, 1.0)?;
//!     }
//!
//!     let text = tree.to_json();
//!     let read_back = Factory::from_json(&text)?;
//!     assert_eq!(read_back, tree.snapshot());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod histogram;
pub mod primitives;
pub mod quantity;
pub mod registry;
pub mod test_helpers;

mod clustering;
mod json;

pub use error::{HgError, HgResult};
pub use histogram::{histogram, profile};
pub use primitives::{Aggregated, Aggregating};
pub use quantity::{unweighted, Quantity, Selection};
pub use registry::Factory;
