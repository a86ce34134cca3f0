//! Array container for sparse data.
//!
//! Stores up to [MAX_CARDINALITY] sorted `u16` values. Once an insertion would push the
//! cardinality past this threshold, the owning [super::Container] converts to a [super::Bitmap].
//!
//! The free functions in this module operate on sorted, deduplicated slices so that they can be
//! shared between owned containers and containers borrowed from a frozen buffer.

/// Maximum cardinality of an array container.
///
/// Array container size: 2 bytes per element.
/// Bitmap container size: 8192 bytes (fixed).
/// Crossover point: 8192 / 2 = 4096 elements.
pub const MAX_CARDINALITY: usize = 4096;

/// When one side is this many times larger than the other, intersections binary search the
/// larger side instead of merging.
const SKEW_FACTOR: usize = 64;

/// A container that stores sparse `u16` values in a sorted array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Array {
    values: Vec<u16>,
}

impl Array {
    /// Creates an empty array container.
    #[inline]
    pub const fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Creates an array container with room for `capacity` values.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity.min(MAX_CARDINALITY)),
        }
    }

    /// Creates an array container from a sorted, deduplicated vector.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if the values are not strictly ascending.
    #[inline]
    pub fn from_sorted_vec(values: Vec<u16>) -> Self {
        debug_assert!(
            values.windows(2).all(|w| w[0] < w[1]),
            "values must be sorted and unique"
        );
        Self { values }
    }

    /// Returns the number of values in the container.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns whether the container is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns whether the container is at maximum capacity.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.values.len() >= MAX_CARDINALITY
    }

    /// Checks if the container contains the given value.
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        self.values.binary_search(&value).is_ok()
    }

    /// Inserts a value into the container.
    ///
    /// Returns `true` if the value was newly inserted, `false` if it already existed.
    ///
    /// The caller is responsible for checking [is_full](Self::is_full) first.
    #[inline]
    pub fn insert(&mut self, value: u16) -> bool {
        // Appending in order is the common case
        if self.values.last().map_or(true, |&last| last < value) {
            self.values.push(value);
            return true;
        }
        match self.values.binary_search(&value) {
            Ok(_) => false,
            Err(pos) => {
                self.values.insert(pos, value);
                true
            }
        }
    }

    /// Removes a value from the container. Returns `true` if the value was present.
    #[inline]
    pub fn remove(&mut self, value: u16) -> bool {
        self.values.binary_search(&value).is_ok_and(|pos| {
            self.values.remove(pos);
            true
        })
    }

    /// Removes all values in `[start, end]`. Returns the number of values removed.
    pub fn remove_range(&mut self, start: u16, end: u16) -> usize {
        let lo = self.values.partition_point(|&v| v < start);
        let hi = self.values.partition_point(|&v| v <= end);
        self.values.drain(lo..hi);
        hi - lo
    }

    /// Retains only the values for which `f` returns true.
    #[inline]
    pub fn retain(&mut self, f: impl FnMut(&u16) -> bool) {
        self.values.retain(f);
    }

    /// Returns the underlying values as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[u16] {
        &self.values
    }

    /// Consumes the container and returns the underlying vector.
    #[inline]
    pub fn into_vec(self) -> Vec<u16> {
        self.values
    }

    /// Releases unused capacity, returning the number of bytes freed.
    pub fn shrink_to_fit(&mut self) -> usize {
        let freed = (self.values.capacity() - self.values.len()) * 2;
        self.values.shrink_to_fit();
        freed
    }
}

/// Returns the number of values in `values` that are `<= value`.
#[inline]
pub(crate) fn rank(values: &[u16], value: u16) -> usize {
    values.partition_point(|&v| v <= value)
}

/// Returns the smallest value `>= from`.
#[inline]
pub(crate) fn successor(values: &[u16], from: u16) -> Option<u16> {
    let pos = values.partition_point(|&v| v < from);
    values.get(pos).copied()
}

/// Returns the largest value `<= from`.
#[inline]
pub(crate) fn predecessor(values: &[u16], from: u16) -> Option<u16> {
    let pos = values.partition_point(|&v| v <= from);
    pos.checked_sub(1).map(|pos| values[pos])
}

/// Returns the number of maximal runs of consecutive values.
pub(crate) fn number_of_runs(values: &[u16]) -> usize {
    if values.is_empty() {
        return 0;
    }
    1 + values.windows(2).filter(|w| w[1] != w[0] + 1).count()
}

/// Merges two sorted slices into their union.
pub(crate) fn union(a: &[u16], b: &[u16]) -> Vec<u16> {
    let mut result = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (av, bv) = (a[i], b[j]);
        if av < bv {
            result.push(av);
            i += 1;
        } else if bv < av {
            result.push(bv);
            j += 1;
        } else {
            result.push(av);
            i += 1;
            j += 1;
        }
    }
    result.extend_from_slice(&a[i..]);
    result.extend_from_slice(&b[j..]);
    result
}

/// Intersects two sorted slices.
pub(crate) fn intersection(a: &[u16], b: &[u16]) -> Vec<u16> {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if small.len() * SKEW_FACTOR < large.len() {
        return small
            .iter()
            .copied()
            .filter(|v| large.binary_search(v).is_ok())
            .collect();
    }

    let mut result = Vec::with_capacity(small.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (av, bv) = (a[i], b[j]);
        if av < bv {
            i += 1;
        } else if bv < av {
            j += 1;
        } else {
            result.push(av);
            i += 1;
            j += 1;
        }
    }
    result
}

/// Counts the values two sorted slices have in common.
pub(crate) fn intersection_len(a: &[u16], b: &[u16]) -> usize {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if small.len() * SKEW_FACTOR < large.len() {
        return small
            .iter()
            .filter(|v| large.binary_search(v).is_ok())
            .count();
    }

    let mut count = 0;
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (av, bv) = (a[i], b[j]);
        if av < bv {
            i += 1;
        } else if bv < av {
            j += 1;
        } else {
            count += 1;
            i += 1;
            j += 1;
        }
    }
    count
}

/// Returns whether two sorted slices share at least one value.
pub(crate) fn intersects(a: &[u16], b: &[u16]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (av, bv) = (a[i], b[j]);
        if av < bv {
            i += 1;
        } else if bv < av {
            j += 1;
        } else {
            return true;
        }
    }
    false
}

/// Computes `a - b` over sorted slices.
pub(crate) fn difference(a: &[u16], b: &[u16]) -> Vec<u16> {
    let mut result = Vec::with_capacity(a.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (av, bv) = (a[i], b[j]);
        if av < bv {
            result.push(av);
            i += 1;
        } else if bv < av {
            j += 1;
        } else {
            i += 1;
            j += 1;
        }
    }
    result.extend_from_slice(&a[i..]);
    result
}

/// Computes the symmetric difference of two sorted slices.
pub(crate) fn symmetric_difference(a: &[u16], b: &[u16]) -> Vec<u16> {
    let mut result = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (av, bv) = (a[i], b[j]);
        if av < bv {
            result.push(av);
            i += 1;
        } else if bv < av {
            result.push(bv);
            j += 1;
        } else {
            i += 1;
            j += 1;
        }
    }
    result.extend_from_slice(&a[i..]);
    result.extend_from_slice(&b[j..]);
    result
}
