//! Run container for consecutive sequences.
//!
//! Stores values as a sorted vector of [Interval]s, each covering `start..=start + length`.
//! Runs never overlap and are never adjacent, so every run is maximal. This is the most compact
//! representation for long stretches of consecutive values and for fully saturated containers.
//!
//! [Interval] is `#[repr(C)]` and [bytemuck::Pod], matching the on-disk `(start, length)` pair,
//! so a run zone inside a frozen buffer can be borrowed as `&[Interval]` without copying.
//!
//! # References
//!
//! - [Roaring Bitmap Paper](https://arxiv.org/pdf/1402.6407)
//! - [Consistently faster and smaller compressed bitmaps with Roaring](https://arxiv.org/pdf/1603.06549)

use bytemuck::{Pod, Zeroable};
use core::{iter::FlatMap, mem, ops::RangeInclusive, slice};

/// A run of consecutive values `start..=start + length`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Interval {
    /// First value of the run.
    pub start: u16,
    /// Number of values in the run, minus one.
    pub length: u16,
}

impl Interval {
    /// Creates a run covering `start..=end`.
    #[inline]
    pub const fn from_bounds(start: u16, end: u16) -> Self {
        debug_assert!(start <= end);
        Self {
            start,
            length: end - start,
        }
    }

    /// Returns the last value of the run.
    #[inline]
    pub const fn end(&self) -> u16 {
        self.start + self.length
    }

    /// Returns the number of values in the run.
    #[inline]
    pub const fn cardinality(&self) -> usize {
        self.length as usize + 1
    }

    /// Checks if the run covers `value`.
    #[inline]
    pub const fn contains(&self, value: u16) -> bool {
        value >= self.start && value - self.start <= self.length
    }

    /// Returns the values covered by the run.
    #[inline]
    pub fn range(&self) -> RangeInclusive<u16> {
        self.start..=self.end()
    }
}

/// Iterator over the values of a run container.
pub type RunIter<'a> =
    FlatMap<slice::Iter<'a, Interval>, RangeInclusive<u16>, fn(&Interval) -> RangeInclusive<u16>>;

/// A container that stores values as run-length encoded ranges.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Run {
    runs: Vec<Interval>,
}

impl Run {
    /// Creates an empty run container.
    #[inline]
    pub const fn new() -> Self {
        Self { runs: Vec::new() }
    }

    /// Creates a run container representing a fully saturated container [0, 65535].
    #[inline]
    pub fn full() -> Self {
        Self {
            runs: vec![Interval::from_bounds(0, u16::MAX)],
        }
    }

    /// Creates a run container from sorted, disjoint, non-adjacent runs.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if the runs are not normalized.
    #[inline]
    pub fn from_intervals(runs: Vec<Interval>) -> Self {
        debug_assert!(is_normalized(&runs), "runs must be sorted and non-adjacent");
        Self { runs }
    }

    /// Creates a run container from a sorted array of values.
    pub fn from_array(values: &[u16]) -> Self {
        Self {
            runs: from_array(values),
        }
    }

    /// Returns the number of runs in the container.
    #[inline]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Returns the cardinality (number of values) in the container.
    #[inline]
    pub fn len(&self) -> usize {
        cardinality(&self.runs)
    }

    /// Returns whether the container is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Returns whether the container is fully saturated (contains all 65536 values).
    #[inline]
    pub fn is_full(&self) -> bool {
        is_full(&self.runs)
    }

    /// Checks if the container contains the given value.
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        contains(&self.runs, value)
    }

    /// Inserts a value into the container, merging with neighboring runs.
    ///
    /// Returns `true` if the value was newly inserted, `false` if it already existed.
    pub fn insert(&mut self, value: u16) -> bool {
        let pos = self.runs.partition_point(|r| r.start <= value);
        let touches_next =
            pos < self.runs.len() && u32::from(self.runs[pos].start) == u32::from(value) + 1;

        if pos > 0 {
            let prev = self.runs[pos - 1];
            if prev.contains(value) {
                return false;
            }
            if u32::from(prev.end()) + 1 == u32::from(value) {
                self.runs[pos - 1].length += 1;
                if touches_next {
                    // Value bridges prev and next
                    let next = self.runs.remove(pos);
                    self.runs[pos - 1].length += next.length + 1;
                }
                return true;
            }
        }

        if touches_next {
            let next = &mut self.runs[pos];
            next.start = value;
            next.length += 1;
        } else {
            self.runs.insert(pos, Interval::from_bounds(value, value));
        }
        true
    }

    /// Removes a value from the container, splitting its run if needed.
    ///
    /// Returns `true` if the value was present.
    pub fn remove(&mut self, value: u16) -> bool {
        let pos = self.runs.partition_point(|r| r.start <= value);
        if pos == 0 {
            return false;
        }
        let index = pos - 1;
        let run = self.runs[index];
        if !run.contains(value) {
            return false;
        }

        if run.length == 0 {
            self.runs.remove(index);
        } else if value == run.start {
            self.runs[index] = Interval::from_bounds(value + 1, run.end());
        } else if value == run.end() {
            self.runs[index].length -= 1;
        } else {
            self.runs[index] = Interval::from_bounds(run.start, value - 1);
            self.runs
                .insert(index + 1, Interval::from_bounds(value + 1, run.end()));
        }
        true
    }

    /// Returns the runs as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[Interval] {
        &self.runs
    }

    /// Consumes the container and returns the underlying vector.
    #[inline]
    pub fn into_vec(self) -> Vec<Interval> {
        self.runs
    }

    /// Releases unused capacity, returning the number of bytes freed.
    pub fn shrink_to_fit(&mut self) -> usize {
        let freed = (self.runs.capacity() - self.runs.len()) * mem::size_of::<Interval>();
        self.runs.shrink_to_fit();
        freed
    }
}

/// Returns whether runs are sorted, in bounds, and separated by at least one absent value.
pub(crate) fn is_normalized(runs: &[Interval]) -> bool {
    runs.iter()
        .all(|r| u32::from(r.start) + u32::from(r.length) <= u32::from(u16::MAX))
        && runs
            .windows(2)
            .all(|w| u32::from(w[0].end()) + 1 < u32::from(w[1].start))
}

#[inline]
pub(crate) fn is_full(runs: &[Interval]) -> bool {
    runs.len() == 1 && runs[0].start == 0 && runs[0].length == u16::MAX
}

/// Counts the values covered by `runs`.
#[inline]
pub(crate) fn cardinality(runs: &[Interval]) -> usize {
    runs.iter().map(Interval::cardinality).sum()
}

pub(crate) fn contains(runs: &[Interval], value: u16) -> bool {
    let pos = runs.partition_point(|r| r.start <= value);
    pos > 0 && runs[pos - 1].contains(value)
}

/// Returns the number of values `<= value`.
pub(crate) fn rank(runs: &[Interval], value: u16) -> usize {
    let mut count = 0;
    for run in runs {
        if run.start > value {
            break;
        }
        count += (run.end().min(value) - run.start) as usize + 1;
    }
    count
}

/// Returns the value at position `pos` (zero-based).
pub(crate) fn select(runs: &[Interval], pos: usize) -> Option<u16> {
    let mut remaining = pos;
    for run in runs {
        if remaining < run.cardinality() {
            return Some(run.start + remaining as u16);
        }
        remaining -= run.cardinality();
    }
    None
}

/// Returns the smallest value `>= from`.
pub(crate) fn successor(runs: &[Interval], from: u16) -> Option<u16> {
    let pos = runs.partition_point(|r| r.end() < from);
    runs.get(pos).map(|r| r.start.max(from))
}

/// Returns the largest value `<= from`.
pub(crate) fn predecessor(runs: &[Interval], from: u16) -> Option<u16> {
    let pos = runs.partition_point(|r| r.start <= from);
    pos.checked_sub(1).map(|pos| runs[pos].end().min(from))
}

/// Iterates over every value covered by `runs`.
#[inline]
pub(crate) fn iter(runs: &[Interval]) -> RunIter<'_> {
    runs.iter()
        .flat_map(Interval::range as fn(&Interval) -> RangeInclusive<u16>)
}

/// Collapses sorted values into maximal runs.
pub(crate) fn from_array(values: &[u16]) -> Vec<Interval> {
    let mut runs: Vec<Interval> = Vec::new();
    for &value in values {
        match runs.last_mut() {
            Some(last) if u32::from(last.end()) + 1 == u32::from(value) => last.length += 1,
            _ => runs.push(Interval::from_bounds(value, value)),
        }
    }
    runs
}

/// Sweeps the boundaries of `a` and `b`, emitting maximal runs where `op(in_a, in_b)` holds.
///
/// Boundaries are tracked as `u32` so that the exclusive end of a run ending at 65535 fits.
/// `op(false, false)` must be false.
fn combine(a: &[Interval], b: &[Interval], op: impl Fn(bool, bool) -> bool) -> Vec<Interval> {
    #[inline]
    fn boundary(runs: &[Interval], index: usize) -> u32 {
        let run = runs[index / 2];
        if index % 2 == 0 {
            u32::from(run.start)
        } else {
            u32::from(run.end()) + 1
        }
    }

    let (na, nb) = (a.len() * 2, b.len() * 2);
    let (mut i, mut j) = (0, 0);
    let mut open: Option<u32> = None;
    let mut result = Vec::new();
    while i < na || j < nb {
        let pa = if i < na { boundary(a, i) } else { u32::MAX };
        let pb = if j < nb { boundary(b, j) } else { u32::MAX };
        let point = pa.min(pb);
        if pa == point {
            i += 1;
        }
        if pb == point {
            j += 1;
        }

        // An odd number of boundaries consumed means the point is inside a run
        match (open, op(i % 2 == 1, j % 2 == 1)) {
            (None, true) => open = Some(point),
            (Some(start), false) => {
                result.push(Interval::from_bounds(start as u16, (point - 1) as u16));
                open = None;
            }
            _ => {}
        }
    }
    result
}

pub(crate) fn union(a: &[Interval], b: &[Interval]) -> Vec<Interval> {
    combine(a, b, |x, y| x || y)
}

pub(crate) fn intersection(a: &[Interval], b: &[Interval]) -> Vec<Interval> {
    combine(a, b, |x, y| x && y)
}

pub(crate) fn difference(a: &[Interval], b: &[Interval]) -> Vec<Interval> {
    combine(a, b, |x, y| x && !y)
}

pub(crate) fn symmetric_difference(a: &[Interval], b: &[Interval]) -> Vec<Interval> {
    combine(a, b, |x, y| x != y)
}

/// Counts the values covered by both `a` and `b`.
pub(crate) fn intersection_len(a: &[Interval], b: &[Interval]) -> usize {
    let (mut i, mut j) = (0, 0);
    let mut count = 0;
    while i < a.len() && j < b.len() {
        let (x, y) = (a[i], b[j]);
        let start = x.start.max(y.start);
        let end = x.end().min(y.end());
        if start <= end {
            count += (end - start) as usize + 1;
        }
        if x.end() < y.end() {
            i += 1;
        } else {
            j += 1;
        }
    }
    count
}

/// Returns whether `a` and `b` cover at least one common value.
pub(crate) fn intersects(a: &[Interval], b: &[Interval]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (x, y) = (a[i], b[j]);
        if x.start.max(y.start) <= x.end().min(y.end()) {
            return true;
        }
        if x.end() < y.end() {
            i += 1;
        } else {
            j += 1;
        }
    }
    false
}

/// Walks sorted `values` alongside `runs`, reporting for each value whether a run covers it.
#[inline]
fn walk_array(values: &[u16], runs: &[Interval], mut f: impl FnMut(u16, bool) -> bool) {
    let mut r = 0;
    for &value in values {
        while r < runs.len() && runs[r].end() < value {
            r += 1;
        }
        let covered = r < runs.len() && runs[r].start <= value;
        if !f(value, covered) {
            return;
        }
    }
}

/// Returns the values of `values` covered (or, if `keep` is false, not covered) by `runs`.
pub(crate) fn filter_array(values: &[u16], runs: &[Interval], keep: bool) -> Vec<u16> {
    let mut result = Vec::with_capacity(values.len());
    walk_array(values, runs, |value, covered| {
        if covered == keep {
            result.push(value);
        }
        true
    });
    result
}

/// Counts the values of `values` covered by `runs`.
pub(crate) fn array_intersection_len(values: &[u16], runs: &[Interval]) -> usize {
    let mut count = 0;
    walk_array(values, runs, |_, covered| {
        count += covered as usize;
        true
    });
    count
}

/// Returns whether any value of `values` is covered by `runs`.
pub(crate) fn array_intersects(values: &[u16], runs: &[Interval]) -> bool {
    let mut found = false;
    walk_array(values, runs, |_, covered| {
        found = covered;
        !covered
    });
    found
}
