//! One-pass clustering support for center-keyed bins.
//!
//! Both tenses of the adaptive binner keep a vector of `(center, sub)` pairs
//! sorted by center and squeeze it back under a cap after every insertion by
//! greedily fusing the adjacent pair with the smallest blended gap
//!
//! ```text
//! score = (1 - tailDetail) * gap + tailDetail * gap / (1 + d)
//! ```
//!
//! where `gap` is the distance between the pair's centers and `d` is the
//! distance from the pair's midpoint to the midpoint of the observed
//! `[min, max]` range. `tailDetail = 0` fuses the smallest absolute gap;
//! raising it discounts the gaps of pairs far from the range midpoint, so
//! equal gaps fuse in the extremes before the bulk. Ties keep the lowest
//! pair.
//!
//! The fused cluster sits at the entries-weighted mean of the two centers and
//! carries the merge of the two sub-aggregators.

use crate::error::HgResult;

/// Index of the nearest center in a sorted `(center, sub)` list. Ties between
/// two equally distant centers go to the lower one. `x` must not be NaN and
/// `bins` must be non-empty.
pub(crate) fn nearest_index<T>(bins: &[(f64, T)], x: f64) -> usize {
    debug_assert!(!bins.is_empty());
    let above = bins.partition_point(|(c, _)| *c < x);
    if above == bins.len() {
        above - 1
    } else if above == 0 {
        0
    } else if (x - bins[above - 1].0).abs() <= (bins[above].0 - x).abs() {
        above - 1
    } else {
        above
    }
}

/// Where `x` lives in a sorted `(center, sub)` list: `Ok(i)` when `bins[i]`
/// is centered exactly at `x`, otherwise `Err(i)` with the insertion point.
pub(crate) fn find_center<T>(bins: &[(f64, T)], x: f64) -> Result<usize, usize> {
    let at = bins.partition_point(|(c, _)| *c < x);
    if at < bins.len() && bins[at].0 == x {
        Ok(at)
    } else {
        Err(at)
    }
}

/// Greedily fuse adjacent clusters until at most `num` remain.
pub(crate) fn merge_down<T>(
    bins: &mut Vec<(f64, T)>,
    num: usize,
    tail_detail: f64,
    min: f64,
    max: f64,
    entries_of: impl Fn(&T) -> f64,
    combine: impl Fn(&T, &T) -> HgResult<T>,
) -> HgResult<()> {
    while bins.len() > num {
        let overall_mid = (min + max) / 2.0;
        let mut best = 0usize;
        let mut best_score = f64::INFINITY;
        for i in 0..bins.len() - 1 {
            let gap = bins[i + 1].0 - bins[i].0;
            let d = ((bins[i].0 + bins[i + 1].0) / 2.0 - overall_mid).abs();
            let score = (1.0 - tail_detail) * gap + tail_detail * gap / (1.0 + d);
            if score < best_score {
                best_score = score;
                best = i;
            }
        }

        let (c1, c2) = (bins[best].0, bins[best + 1].0);
        let (e1, e2) = (entries_of(&bins[best].1), entries_of(&bins[best + 1].1));
        let center = if e1 + e2 > 0.0 {
            (c1 * e1 + c2 * e2) / (e1 + e2)
        } else {
            (c1 + c2) / 2.0
        };
        let fused = combine(&bins[best].1, &bins[best + 1].1)?;
        bins[best] = (center, fused);
        bins.remove(best + 1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(bins: &[(f64, f64)]) -> Vec<(f64, f64)> {
        bins.to_vec()
    }

    #[test]
    fn nearest_index_breaks_ties_toward_the_lower_center() {
        let bins: Vec<(f64, ())> = [0.0, 2.0, 10.0].iter().map(|c| (*c, ())).collect();
        assert_eq!(nearest_index(&bins, -5.0), 0);
        assert_eq!(nearest_index(&bins, 0.9), 0);
        assert_eq!(nearest_index(&bins, 1.0), 0); // midpoint of 0 and 2
        assert_eq!(nearest_index(&bins, 1.1), 1);
        assert_eq!(nearest_index(&bins, 10.0), 2);
        assert_eq!(nearest_index(&bins, 99.0), 2);
    }

    #[test]
    fn merge_down_with_zero_tail_detail_fuses_the_smallest_gap() {
        let mut bins = weights(&[(0.0, 1.0), (10.0, 1.0), (10.5, 3.0), (20.0, 1.0)]);
        merge_down(&mut bins, 3, 0.0, 0.0, 20.0, |w| *w, |a, b| Ok(a + b))
            .expect("merge down");

        let centers: Vec<f64> = bins.iter().map(|(c, _)| *c).collect();
        // 10 and 10.5 fuse at their weight-weighted mean.
        assert_eq!(centers, vec![0.0, (10.0 + 10.5 * 3.0) / 4.0, 20.0]);
        assert_eq!(bins[1].1, 4.0);
    }

    #[test]
    fn full_tail_detail_fuses_equal_gaps_farthest_from_the_middle_first() {
        // Gaps 9-11 and 20-22 are equal; at tail_detail = 1 the far pair's
        // score is discounted by its distance from (min+max)/2 and fuses.
        let mut bins = weights(&[(0.0, 1.0), (9.0, 1.0), (11.0, 1.0), (20.0, 1.0), (22.0, 1.0)]);
        merge_down(&mut bins, 4, 1.0, 0.0, 22.0, |w| *w, |a, b| Ok(a + b))
            .expect("merge down");

        let centers: Vec<f64> = bins.iter().map(|(c, _)| *c).collect();
        assert_eq!(centers, vec![0.0, 9.0, 11.0, 21.0]);
    }

    #[test]
    fn merge_down_keeps_totals_and_respects_the_cap() {
        let mut bins: Vec<(f64, f64)> = (0..50).map(|i| (i as f64, 1.0)).collect();
        merge_down(&mut bins, 7, 0.2, 0.0, 49.0, |w| *w, |a, b| Ok(a + b))
            .expect("merge down");

        assert!(bins.len() <= 7);
        let total: f64 = bins.iter().map(|(_, w)| *w).sum();
        assert_eq!(total, 50.0);
        assert!(bins.windows(2).all(|w| w[0].0 < w[1].0));
    }
}
