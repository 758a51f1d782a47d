//! Piecewise-constant functions over the time axis.
//!
//! An [`IntervalSet`] stores sorted, non-overlapping `[start, end)` segments,
//! each carrying a constant value. Points outside every segment evaluate to 0.
//! The upper end of a segment may be `f64::INFINITY`, which is how open-ended
//! state ("on since t", "priority p since t") is represented.
//!
//! # Combination
//!
//! [`IntervalSet::func`] evaluates a combining function on the common
//! refinement of several sets. The function is called once per refined cell
//! with the value each input takes inside that cell, so it is only meaningful
//! for inputs that are themselves piecewise-constant.

use std::fmt;

/// Magnitude below which a running sum is treated as exactly zero.
pub const SUM_EPSILON: f64 = 1e-12;

/// One constant piece of an [`IntervalSet`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub value: f64,
}

impl Segment {
    const fn new(start: f64, end: f64, value: f64) -> Self {
        Self { start, end, value }
    }
}

/// A piecewise-constant function of time.
///
/// Adjacent segments with equal values are not merged by [`add_section`];
/// only [`func`] produces a fully simplified set. Both forms evaluate and
/// integrate identically.
///
/// [`add_section`]: IntervalSet::add_section
/// [`func`]: IntervalSet::func
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntervalSet {
    segments: Vec<Segment>,
}

impl IntervalSet {
    /// Creates an empty set (the zero function).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Builds a set by inserting `(start, end, value)` triples in order.
    ///
    /// Later triples overwrite earlier ones where they overlap.
    pub fn from_segments<I>(segments: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64, f64)>,
    {
        let mut set = Self::new();
        for (start, end, value) in segments {
            set.add_section(start, end, Some(value));
        }
        set
    }

    /// Writes `value` on `[start, end)`, replacing whatever was stored there.
    ///
    /// A `None` value deletes coverage on the range instead. Empty ranges
    /// (`end <= start`) and NaN coordinates are ignored.
    pub fn add_section(&mut self, start: f64, end: f64, value: Option<f64>) {
        if start.is_nan() || end.is_nan() || end <= start {
            return;
        }

        // Segments are sorted and disjoint, so both `start` and `end` ascend.
        let lo = self.segments.partition_point(|s| s.end <= start);
        let hi = self.segments.partition_point(|s| s.start < end);

        let mut replacement = Vec::with_capacity(3);
        if lo < hi {
            let first = self.segments[lo];
            if first.start < start {
                replacement.push(Segment::new(first.start, start, first.value));
            }
        }
        if let Some(value) = value {
            replacement.push(Segment::new(start, end, value));
        }
        if lo < hi {
            let last = self.segments[hi - 1];
            if last.end > end {
                replacement.push(Segment::new(end, last.end, last.value));
            }
        }

        self.segments.splice(lo..hi, replacement);
    }

    /// Same as [`add_section`](Self::add_section) with the range first
    /// clamped to `bound`.
    pub fn add_section_bounded(
        &mut self,
        start: f64,
        end: f64,
        value: Option<f64>,
        bound: (f64, f64),
    ) {
        self.add_section(start.max(bound.0), end.min(bound.1), value);
    }

    /// Removes every segment.
    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// Returns a copy equal to `self` on `[t0, t1]` and zero elsewhere.
    #[must_use]
    pub fn cut(&self, t0: f64, t1: f64) -> Self {
        let segments = self
            .segments
            .iter()
            .filter_map(|s| {
                let start = s.start.max(t0);
                let end = s.end.min(t1);
                (end > start).then_some(Segment::new(start, end, s.value))
            })
            .collect();
        Self { segments }
    }

    /// Lowest covered coordinate and highest covered coordinate.
    pub fn boundaries(&self) -> Option<(f64, f64)> {
        let first = self.segments.first()?;
        let last = self.segments.last()?;
        Some((first.start, last.end))
    }

    /// Value at `t`; 0 where nothing is stored.
    ///
    /// At `t = +inf` the value of a last segment reaching infinity is returned.
    pub fn val(&self, t: f64) -> f64 {
        let idx = self.segments.partition_point(|s| s.end <= t);
        match self.segments.get(idx) {
            Some(s) if s.start <= t => s.value,
            _ if t == f64::INFINITY => self
                .segments
                .last()
                .filter(|s| s.end == f64::INFINITY)
                .map_or(0.0, |s| s.value),
            _ => 0.0,
        }
    }

    /// Integral over `[t0, t1]`, defaulting to the covered range.
    ///
    /// Infinite segments are clipped by the bounds; zero-valued segments are
    /// skipped so an unbounded zero tail never turns into NaN.
    pub fn integral(&self, t0: Option<f64>, t1: Option<f64>) -> f64 {
        let Some((lo, hi)) = self.boundaries() else {
            return 0.0;
        };
        let t0 = t0.unwrap_or(lo);
        let t1 = t1.unwrap_or(hi);

        self.segments
            .iter()
            .filter(|s| s.value != 0.0)
            .map(|s| {
                let start = s.start.max(t0);
                let end = s.end.min(t1);
                if end > start {
                    (end - start) * s.value
                } else {
                    0.0
                }
            })
            .sum()
    }

    /// Combines `sets` pointwise on the common refinement of their breakpoints.
    ///
    /// `combine` receives the value of every input (in order) inside a refined
    /// cell. Cells where all inputs are zero are skipped, and non-finite results
    /// count as zero, so `|v| v[0] / v[1]` never faults on a zero denominator.
    /// The result has no zero segments and no adjacent equal-valued segments.
    pub fn func<F>(combine: F, sets: &[&Self]) -> Self
    where
        F: Fn(&[f64]) -> f64,
    {
        let mut result = Self::new();
        if sets.is_empty() {
            return result;
        }

        let mut points: Vec<f64> = sets
            .iter()
            .flat_map(|set| set.segments.iter().flat_map(|s| [s.start, s.end]))
            .collect();
        points.sort_by(f64::total_cmp);
        points.dedup();

        let mut cursors = vec![0usize; sets.len()];
        let mut values = vec![0.0; sets.len()];

        for cell in points.windows(2) {
            let (a, b) = (cell[0], cell[1]);
            let sample = sample_point(a, b);

            let mut any_nonzero = false;
            for ((set, cursor), value) in sets.iter().zip(&mut cursors).zip(&mut values) {
                *value = set.value_with_cursor(sample, cursor);
                any_nonzero |= *value != 0.0;
            }
            if !any_nonzero {
                continue;
            }

            let combined = combine(&values);
            if combined.is_finite() && combined != 0.0 {
                result.push_merged(a, b, combined);
            }
        }

        result
    }

    /// Pointwise sum of `sets`.
    ///
    /// Each segment becomes a pair of value deltas; one sort and one sweep
    /// over them yields the sum in O(n log n) for n segments in total.
    /// Residue below [`SUM_EPSILON`] left by cancelling deltas counts as 0.
    pub fn sum(sets: &[&Self]) -> Self {
        let mut deltas: Vec<(f64, f64)> = sets
            .iter()
            .flat_map(|set| set.segments.iter())
            .filter(|s| s.value != 0.0)
            .flat_map(|s| [(s.start, s.value), (s.end, -s.value)])
            .collect();
        deltas.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut result = Self::new();
        let mut acc = 0.0;
        let mut i = 0;
        while i < deltas.len() {
            let at = deltas[i].0;
            while i < deltas.len() && deltas[i].0 == at {
                acc += deltas[i].1;
                i += 1;
            }
            if acc.abs() < SUM_EPSILON {
                acc = 0.0;
            }
            if let Some(&(next, _)) = deltas.get(i) {
                if acc != 0.0 && acc.is_finite() {
                    result.push_merged(at, next, acc);
                }
            }
        }
        result
    }

    /// 1 wherever `self` is nonzero.
    #[must_use]
    pub fn support(&self) -> Self {
        let mut result = Self::new();
        for s in self.segments.iter().filter(|s| s.value != 0.0) {
            result.push_merged(s.start, s.end, 1.0);
        }
        result
    }

    /// Combines `self` with `other` cell by cell, on the support of `self`
    /// only.
    ///
    /// The first overlapping segment of `other` is found by binary search, so
    /// the cost is that of the overlap rather than of all of `other`. As in
    /// [`func`](Self::func), zero and non-finite results are dropped.
    #[must_use]
    pub fn zip_on_support<F>(&self, other: &Self, combine: F) -> Self
    where
        F: Fn(f64, f64) -> f64,
    {
        let mut result = Self::new();
        for s in self.segments.iter().filter(|s| s.value != 0.0) {
            let mut idx = other.segments.partition_point(|o| o.end <= s.start);
            let mut cursor = s.start;
            while cursor < s.end {
                let (cell_end, other_value, consumed) = match other.segments.get(idx) {
                    Some(o) if o.start <= cursor => (o.end.min(s.end), o.value, o.end <= s.end),
                    Some(o) => (o.start.min(s.end), 0.0, false),
                    None => (s.end, 0.0, false),
                };
                let value = combine(s.value, other_value);
                if value.is_finite() && value != 0.0 {
                    result.push_merged(cursor, cell_end, value);
                }
                if consumed {
                    idx += 1;
                }
                cursor = cell_end;
            }
        }
        result
    }

    /// The stored segments in ascending order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Point lookup for monotonically increasing `t`; `cursor` carries the
    /// scan position between calls.
    fn value_with_cursor(&self, t: f64, cursor: &mut usize) -> f64 {
        while *cursor < self.segments.len() && self.segments[*cursor].end <= t {
            *cursor += 1;
        }
        match self.segments.get(*cursor) {
            Some(s) if s.start <= t => s.value,
            _ => 0.0,
        }
    }

    /// Appends a segment past the current end, extending the last one when it
    /// touches and carries the same value.
    fn push_merged(&mut self, start: f64, end: f64, value: f64) {
        if let Some(last) = self.segments.last_mut() {
            if last.end == start && last.value == value {
                last.end = end;
                return;
            }
        }
        self.segments.push(Segment::new(start, end, value));
    }
}

/// A point strictly inside the cell `(a, b)`.
fn sample_point(a: f64, b: f64) -> f64 {
    match (a.is_finite(), b.is_finite()) {
        (true, true) => f64::midpoint(a, b),
        (true, false) => a + 1.0,
        (false, true) => b - 1.0,
        (false, false) => 0.0,
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for s in &self.segments {
            writeln!(f, "[{}, {}] -- {}", s.start, s.end, s.value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[expect(
    clippy::float_cmp,
    reason = "piecewise values are exact small integers or dyadic fractions"
)]
mod tests {
    use super::*;

    const INF: f64 = f64::INFINITY;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn overwrite_inside_existing_segment_splits_it() {
        let mut set = IntervalSet::new();
        set.add_section(0.0, 10.0, Some(1.0));
        set.add_section(3.0, 6.0, Some(2.0));

        assert_eq!(set.val(1.0), 1.0);
        assert_eq!(set.val(4.0), 2.0);
        assert_eq!(set.val(8.0), 1.0);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn none_value_deletes_coverage() {
        let mut set = IntervalSet::new();
        set.add_section(0.0, 10.0, Some(1.0));
        set.add_section(3.0, 6.0, None);

        assert_eq!(set.val(4.0), 0.0);
        assert_eq!(set.val(1.0), 1.0);
        assert_eq!(set.val(8.0), 1.0);
        assert_close(set.integral(None, None), 7.0);
    }

    #[test]
    fn overwrite_spanning_several_segments() {
        let mut set = IntervalSet::from_segments([(0.0, 2.0, 1.0), (3.0, 5.0, 2.0), (6.0, 9.0, 3.0)]);
        set.add_section(1.0, 7.0, Some(5.0));

        let segments: Vec<_> = set.segments().iter().map(|s| (s.start, s.end, s.value)).collect();
        assert_eq!(
            segments,
            vec![(0.0, 1.0, 1.0), (1.0, 7.0, 5.0), (7.0, 9.0, 3.0)]
        );
    }

    #[test]
    fn degenerate_range_is_noop() {
        let mut set = IntervalSet::from_segments([(0.0, 10.0, 1.0)]);
        let before = set.clone();
        set.add_section(5.0, 5.0, Some(3.0));
        set.add_section(6.0, 2.0, None);
        set.add_section(f64::NAN, 4.0, Some(3.0));
        assert_eq!(set, before);
    }

    #[test]
    fn bounded_insert_clamps_range() {
        let mut set = IntervalSet::new();
        set.add_section_bounded(-5.0, 50.0, Some(1.0), (0.0, 20.0));
        assert_eq!(set.boundaries(), Some((0.0, 20.0)));

        set.add_section_bounded(30.0, 40.0, Some(1.0), (0.0, 20.0));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn adding_same_section_twice_does_not_grow_extent() {
        let mut once = IntervalSet::new();
        once.add_section(2.0, 8.0, Some(1.5));
        let mut twice = once.clone();
        twice.add_section(2.0, 8.0, Some(1.5));

        assert_eq!(twice, once);
        assert_close(twice.integral(None, None), 9.0);
    }

    #[test]
    fn uncovered_points_are_zero() {
        let set = IntervalSet::from_segments([(0.0, 1.0, 4.0), (5.0, 6.0, 2.0)]);
        for t in [-1.0, 1.0, 3.0, 6.0, 100.0] {
            assert_eq!(set.val(t), 0.0, "t = {t}");
        }
        assert_eq!(IntervalSet::new().val(0.0), 0.0);
    }

    #[test]
    fn value_at_infinity_uses_open_tail() {
        let open = IntervalSet::from_segments([(0.0, 5.0, 1.0), (5.0, INF, 0.25)]);
        assert_eq!(open.val(INF), 0.25);
        assert_eq!(open.val(1e12), 0.25);

        let closed = IntervalSet::from_segments([(0.0, 5.0, 1.0)]);
        assert_eq!(closed.val(INF), 0.0);
    }

    #[test]
    fn integral_handles_partial_overlap_and_infinite_tail() {
        let set = IntervalSet::from_segments([(0.0, 10.0, 1.0), (20.0, INF, 2.0)]);

        assert_close(set.integral(Some(5.0), Some(25.0)), 5.0 + 10.0);
        assert_close(set.integral(Some(2.0), Some(3.0)), 1.0);
        assert_close(set.integral(Some(12.0), Some(18.0)), 0.0);
        assert_eq!(set.integral(None, None), INF);
    }

    #[test]
    fn integral_of_infinite_zero_tail_is_finite() {
        let set = IntervalSet::from_segments([(0.0, 10.0, 1.0), (10.0, INF, 0.0)]);
        assert_close(set.integral(None, None), 10.0);
    }

    #[test]
    fn cut_then_integrate_equals_windowed_integral() {
        let set = IntervalSet::from_segments([
            (0.0, 3.0, 1.0),
            (3.0, 7.0, 0.5),
            (9.0, 12.0, 3.0),
            (15.0, INF, 2.0),
        ]);
        for (t0, t1) in [(0.0, 20.0), (1.0, 2.0), (2.5, 10.0), (8.0, 8.5), (11.0, 100.0)] {
            assert_close(set.cut(t0, t1).integral(None, None), set.integral(Some(t0), Some(t1)));
        }
    }

    #[test]
    fn cut_clips_straddling_segments() {
        let set = IntervalSet::from_segments([(0.0, 10.0, 1.0), (10.0, INF, 2.0)]);
        let cut = set.cut(5.0, 15.0);
        assert_eq!(cut.boundaries(), Some((5.0, 15.0)));
        assert_eq!(cut.val(4.0), 0.0);
        assert_eq!(cut.val(12.0), 2.0);
        assert!(set.cut(20.0, 10.0).is_empty());
    }

    #[test]
    fn func_sum_integrates_to_sum_of_integrals() {
        let a = IntervalSet::from_segments([(0.0, 4.0, 1.0), (6.0, 9.0, 2.0)]);
        let b = IntervalSet::from_segments([(2.0, 7.0, 3.0), (8.0, INF, 0.5)]);
        let sum = IntervalSet::func(|v| v.iter().sum(), &[&a, &b]);

        for (t0, t1) in [(0.0, 10.0), (1.0, 3.0), (3.5, 8.5), (-5.0, 50.0)] {
            assert_close(
                sum.integral(Some(t0), Some(t1)),
                a.integral(Some(t0), Some(t1)) + b.integral(Some(t0), Some(t1)),
            );
        }
    }

    #[test]
    fn func_merges_equal_neighbours_and_drops_zeros() {
        let a = IntervalSet::from_segments([(0.0, 2.0, 1.0), (2.0, 4.0, 1.0), (4.0, 6.0, 0.0)]);
        let simplified = IntervalSet::func(|v| v[0], &[&a]);

        assert_eq!(simplified.segments(), &[Segment::new(0.0, 4.0, 1.0)]);
    }

    #[test]
    fn func_indicator_marks_any_nonzero_cell() {
        let a = IntervalSet::from_segments([(0.0, 2.0, 1.0)]);
        let b = IntervalSet::from_segments([(1.0, 3.0, 1.0), (5.0, INF, 1.0)]);
        let any = IntervalSet::func(|_| 1.0, &[&a, &b]);

        assert_eq!(
            any.segments(),
            &[Segment::new(0.0, 3.0, 1.0), Segment::new(5.0, INF, 1.0)]
        );
    }

    #[test]
    fn func_division_by_zero_total_yields_zero() {
        let p = IntervalSet::from_segments([(0.0, 10.0, 2.0), (10.0, INF, 0.0)]);
        let q = IntervalSet::from_segments([(5.0, INF, 0.0)]);
        let total = IntervalSet::func(|v| v.iter().sum(), &[&p, &q]);
        let weight = IntervalSet::func(|v| v[0] / v[1], &[&q, &total]);

        assert!(weight.is_empty());
        assert_eq!(weight.val(20.0), 0.0);
    }

    #[test]
    fn func_without_inputs_is_empty() {
        assert!(IntervalSet::func(|_| 1.0, &[]).is_empty());
    }

    #[test]
    fn display_lists_segments() {
        let set = IntervalSet::from_segments([(285.0, 341.0, 1.0), (341.0, INF, 0.25)]);
        insta::assert_snapshot!(set.to_string().trim_end(), @r"
        [285, 341] -- 1
        [341, inf] -- 0.25
        ");
    }

    #[test]
    fn sum_matches_func() {
        let a = IntervalSet::from_segments([(0.0, 10.0, 1.0), (20.0, INF, 2.0)]);
        let b = IntervalSet::from_segments([(5.0, 25.0, 3.0)]);
        let c = IntervalSet::from_segments([(8.0, 9.0, 0.5)]);
        let sets = [&a, &b, &c];

        let swept = IntervalSet::sum(&sets);
        assert_eq!(swept, IntervalSet::func(|v| v.iter().sum(), &sets));
        assert_eq!(swept.val(8.5), 4.5);
        assert_eq!(swept.val(15.0), 3.0);
        assert_eq!(swept.val(1e9), 2.0);
    }

    #[test]
    fn sum_cancels_to_exact_zero() {
        let a = IntervalSet::from_segments([(0.0, 10.0, 0.1), (10.0, 20.0, 0.2)]);
        let b = IntervalSet::from_segments([(0.0, 10.0, 0.2)]);

        let swept = IntervalSet::sum(&[&a, &b]);
        assert_eq!(swept.val(25.0), 0.0);
        assert_eq!(swept.boundaries().map(|(_, hi)| hi), Some(20.0));
    }

    #[test]
    fn support_marks_nonzero_coverage() {
        let a = IntervalSet::from_segments([(0.0, 5.0, 2.0), (5.0, 10.0, 3.0), (12.0, 14.0, 0.0)]);
        assert_eq!(a.support().segments(), &[Segment::new(0.0, 10.0, 1.0)]);
    }

    #[test]
    fn zip_on_support_matches_func_on_own_support() {
        let weights = IntervalSet::from_segments([(10.0, 30.0, 0.5), (50.0, INF, 0.25)]);
        let working =
            IntervalSet::from_segments([(0.0, 15.0, 1.0), (20.0, 60.0, 1.0), (70.0, INF, 1.0)]);

        let zipped = weights.zip_on_support(&working, |w, on| w * on);
        assert_eq!(zipped, IntervalSet::func(|v| v[0] * v[1], &[&weights, &working]));
        assert_close(zipped.integral(Some(0.0), Some(100.0)), 5.0 * 0.5 + 10.0 * 0.5 + 10.0 * 0.25 + 30.0 * 0.25);
    }

    #[test]
    fn zip_on_support_drops_zero_denominators() {
        let p = IntervalSet::from_segments([(0.0, 10.0, 1.0)]);
        let total = IntervalSet::from_segments([(5.0, 10.0, 4.0)]);

        let ratio = p.zip_on_support(&total, |a, b| a / b);
        assert_eq!(ratio.segments(), &[Segment::new(5.0, 10.0, 0.25)]);
    }
}
