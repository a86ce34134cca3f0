//! Containers holding the low 16 bits of values that share a high 16-bit key.
//!
//! | Type   | Storage                 | Best for                      |
//! |--------|-------------------------|-------------------------------|
//! | Array  | Sorted `Vec<u16>`       | Sparse data (< 4096 elements) |
//! | Bitmap | 1024 `u64` words (8 KiB)| Dense data                    |
//! | Run    | Sorted `Vec<Interval>`  | Consecutive sequences         |
//!
//! An array is promoted to a bitmap once it would exceed [MAX_CARDINALITY] values and a bitmap is
//! demoted back to an array as soon as its cardinality drops to [MAX_CARDINALITY] or below. Run
//! containers are only produced by [Container::optimize], by range mutations, and by algebra over
//! run inputs; whenever one is produced it is normalized to whichever representation serializes
//! smallest.
//!
//! [ContainerRef] is the borrowed form shared by owned containers and containers viewed inside a
//! frozen buffer. All read-only operations and the pairwise algebra in [ops] are written against it.

pub mod array;
pub mod bitmap;
pub mod ops;
pub mod run;

pub use array::{Array, MAX_CARDINALITY};
pub use bitmap::{Bitmap, BitmapIter, WORDS};
use core::{
    fmt::{self, Formatter},
    iter::Copied,
    mem, slice,
};
pub use run::{Interval, Run, RunIter};
use tracing::trace;

/// Serialized size of a bitmap container in bytes.
pub(crate) const BITMAP_SERIALIZED_SIZE: usize = bitmap::BYTES;

/// Serialized size of an array container with `cardinality` values, including its count.
#[inline]
pub(crate) const fn array_serialized_size(cardinality: usize) -> usize {
    2 + 2 * cardinality
}

/// Serialized size of a run container with `runs` runs, including its run count.
#[inline]
pub(crate) const fn run_serialized_size(runs: usize) -> usize {
    2 + 4 * runs
}

/// A container that stores a subset of `u16` values.
#[derive(Clone)]
pub enum Container {
    /// Sorted array of values. Used for sparse data.
    Array(Array),
    /// Fixed-size bitset. Used for dense data.
    Bitmap(Bitmap),
    /// Run-length encoded ranges. Used for consecutive sequences.
    Run(Run),
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// Creates an empty (array) container.
    #[inline]
    pub const fn new() -> Self {
        Self::Array(Array::new())
    }

    /// Creates a container with all 65536 values present.
    #[inline]
    pub fn full() -> Self {
        Self::Run(Run::full())
    }

    /// Creates a container from sorted, deduplicated values, promoting to a bitmap if needed.
    pub fn from_array(values: Vec<u16>) -> Self {
        if values.len() > MAX_CARDINALITY {
            return Self::Bitmap(Bitmap::from_array(&values));
        }
        Self::Array(Array::from_sorted_vec(values))
    }

    /// Creates a container from a bitmap, demoting to an array if sparse.
    pub fn from_bitmap(bitmap: Bitmap) -> Self {
        if bitmap.is_sparse() {
            return Self::Array(Array::from_sorted_vec(bitmap.to_array()));
        }
        Self::Bitmap(bitmap)
    }

    /// Creates a container from normalized runs, choosing the representation that serializes
    /// smallest.
    ///
    /// Runs are kept if they are no larger than both the array and bitmap forms.
    pub fn from_runs(runs: Vec<Interval>) -> Self {
        if runs.is_empty() {
            return Self::new();
        }
        let cardinality = run::cardinality(&runs);
        let run_size = run_serialized_size(runs.len());
        let array_size = array_serialized_size(cardinality);
        if run_size <= array_size.min(BITMAP_SERIALIZED_SIZE) {
            return Self::Run(Run::from_intervals(runs));
        }
        if cardinality <= MAX_CARDINALITY {
            return Self::Array(Array::from_sorted_vec(run::iter(&runs).collect()));
        }
        Self::Bitmap(Bitmap::from_runs(&runs))
    }

    /// Borrows the container.
    #[inline]
    pub fn view(&self) -> ContainerRef<'_> {
        match self {
            Self::Array(array) => ContainerRef::Array(array.as_slice()),
            Self::Bitmap(bitmap) => ContainerRef::Bitmap {
                words: bitmap.words(),
                len: bitmap.len(),
            },
            Self::Run(run) => ContainerRef::Run(run.as_slice()),
        }
    }

    /// Returns the number of values in the container.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Self::Array(array) => array.len(),
            Self::Bitmap(bitmap) => bitmap.len(),
            Self::Run(run) => run.len(),
        }
    }

    /// Returns whether the container is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Array(array) => array.is_empty(),
            Self::Bitmap(bitmap) => bitmap.is_empty(),
            Self::Run(run) => run.is_empty(),
        }
    }

    /// Checks if the container contains the given value.
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        match self {
            Self::Array(array) => array.contains(value),
            Self::Bitmap(bitmap) => bitmap.contains(value),
            Self::Run(run) => run.contains(value),
        }
    }

    /// Inserts a value, promoting a full array to a bitmap.
    ///
    /// Returns `true` if the value was newly inserted.
    pub fn insert(&mut self, value: u16) -> bool {
        match self {
            Self::Array(array) => {
                if array.contains(value) {
                    return false;
                }
                if array.is_full() {
                    let mut bitmap = Bitmap::from_array(array.as_slice());
                    bitmap.insert(value);
                    trace!(cardinality = bitmap.len(), "promoted array to bitmap");
                    *self = Self::Bitmap(bitmap);
                    return true;
                }
                array.insert(value)
            }
            Self::Bitmap(bitmap) => bitmap.insert(value),
            Self::Run(run) => run.insert(value),
        }
    }

    /// Removes a value, demoting a sparse bitmap to an array.
    ///
    /// Returns `true` if the value was present.
    pub fn remove(&mut self, value: u16) -> bool {
        let removed = match self {
            Self::Array(array) => array.remove(value),
            Self::Bitmap(bitmap) => bitmap.remove(value),
            Self::Run(run) => run.remove(value),
        };
        if removed {
            self.demote();
        }
        removed
    }

    /// Converts a bitmap at or below [MAX_CARDINALITY] back into an array.
    pub(crate) fn demote(&mut self) {
        if let Self::Bitmap(bitmap) = self {
            if bitmap.is_sparse() {
                trace!(cardinality = bitmap.len(), "demoted bitmap to array");
                let values = bitmap.to_array();
                *self = Self::Array(Array::from_sorted_vec(values));
            }
        }
    }

    /// Inserts every value in `[start, end]`. Returns the number of values newly inserted.
    pub fn insert_range(&mut self, start: u16, end: u16) -> usize {
        if start > end {
            return 0;
        }
        let before = self.len();
        if start == 0 && end == u16::MAX {
            *self = Self::full();
            return (1 << 16) - before;
        }

        let range = [Interval::from_bounds(start, end)];
        match self {
            Self::Bitmap(bitmap) => return bitmap.insert_range(start, end),
            Self::Array(array) => {
                let merged = run::union(&run::from_array(array.as_slice()), &range);
                *self = Self::from_runs(merged);
            }
            Self::Run(existing) => {
                let merged = run::union(existing.as_slice(), &range);
                *self = Self::from_runs(merged);
            }
        }
        self.len() - before
    }

    /// Removes every value in `[start, end]`. Returns the number of values removed.
    pub fn remove_range(&mut self, start: u16, end: u16) -> usize {
        if start > end {
            return 0;
        }
        let removed = match self {
            Self::Array(array) => array.remove_range(start, end),
            Self::Bitmap(bitmap) => bitmap.remove_range(start, end),
            Self::Run(existing) => {
                let before = existing.len();
                let range = [Interval::from_bounds(start, end)];
                *self = Self::from_runs(run::difference(existing.as_slice(), &range));
                before - self.len()
            }
        };
        self.demote();
        removed
    }

    /// Complements membership of every value in `[start, end]`.
    pub fn flip_range(&mut self, start: u16, end: u16) {
        if start > end {
            return;
        }
        if let Self::Bitmap(bitmap) = self {
            bitmap.flip_range(start, end);
            self.demote();
            return;
        }
        let range = [Interval::from_bounds(start, end)];
        *self = ops::xor(self.view(), ContainerRef::Run(&range));
    }

    /// Converts to or from a run container, whichever serializes smallest.
    ///
    /// Arrays and bitmaps convert to runs only when strictly smaller. Returns `true` if the
    /// container is a run container afterwards.
    pub fn optimize(&mut self) -> bool {
        match self {
            Self::Array(array) => {
                let runs = array::number_of_runs(array.as_slice());
                if run_serialized_size(runs) < array_serialized_size(array.len()) {
                    *self = Self::Run(Run::from_array(array.as_slice()));
                }
            }
            Self::Bitmap(bitmap) => {
                let runs = bitmap::number_of_runs(bitmap.words());
                if run_serialized_size(runs) < BITMAP_SERIALIZED_SIZE {
                    *self = Self::Run(Run::from_intervals(bitmap::to_runs(bitmap.words())));
                }
            }
            Self::Run(existing) => {
                let runs = mem::take(existing).into_vec();
                *self = Self::from_runs(runs);
            }
        }
        matches!(self, Self::Run(_))
    }

    /// Converts a run container into an array or bitmap.
    ///
    /// Returns `true` if the container was a run container.
    pub fn remove_run_compression(&mut self) -> bool {
        let Self::Run(existing) = self else {
            return false;
        };
        let cardinality = existing.len();
        *self = if cardinality <= MAX_CARDINALITY {
            Self::Array(Array::from_sorted_vec(run::iter(existing.as_slice()).collect()))
        } else {
            Self::Bitmap(Bitmap::from_runs(existing.as_slice()))
        };
        true
    }

    /// Releases unused capacity. Returns the number of bytes freed.
    pub fn shrink_to_fit(&mut self) -> usize {
        match self {
            Self::Array(array) => array.shrink_to_fit(),
            Self::Bitmap(_) => 0,
            Self::Run(run) => run.shrink_to_fit(),
        }
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        self.view() == other.view()
    }
}

impl Eq for Container {}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.view().fmt(f)
    }
}

/// A borrowed container, either owned by a [Container] or viewed inside a frozen buffer.
#[derive(Clone, Copy)]
pub enum ContainerRef<'a> {
    /// Sorted, deduplicated values.
    Array(&'a [u16]),
    /// Bitset words with their cached cardinality.
    Bitmap {
        words: &'a [u64; WORDS],
        len: usize,
    },
    /// Normalized runs.
    Run(&'a [Interval]),
}

impl<'a> ContainerRef<'a> {
    /// Returns the number of values in the container.
    #[inline]
    pub fn len(&self) -> usize {
        match *self {
            Self::Array(values) => values.len(),
            Self::Bitmap { len, .. } => len,
            Self::Run(runs) => run::cardinality(runs),
        }
    }

    /// Returns whether the container is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        match *self {
            Self::Array(values) => values.is_empty(),
            Self::Bitmap { len, .. } => len == 0,
            Self::Run(runs) => runs.is_empty(),
        }
    }

    /// Returns whether all 65536 values are present.
    #[inline]
    pub fn is_full(&self) -> bool {
        match *self {
            Self::Array(_) => false,
            Self::Bitmap { len, .. } => len == 1 << 16,
            Self::Run(runs) => run::is_full(runs),
        }
    }

    /// Checks if the container contains the given value.
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        match *self {
            Self::Array(values) => values.binary_search(&value).is_ok(),
            Self::Bitmap { words, .. } => bitmap::contains(words, value),
            Self::Run(runs) => run::contains(runs, value),
        }
    }

    /// Returns the number of values `<= value`.
    pub fn rank(&self, value: u16) -> usize {
        match *self {
            Self::Array(values) => array::rank(values, value),
            Self::Bitmap { words, .. } => bitmap::rank(words, value),
            Self::Run(runs) => run::rank(runs, value),
        }
    }

    /// Returns the value at position `pos` (zero-based), if any.
    pub fn select(&self, pos: usize) -> Option<u16> {
        match *self {
            Self::Array(values) => values.get(pos).copied(),
            Self::Bitmap { words, len } if pos < len => bitmap::select(words, pos),
            Self::Bitmap { .. } => None,
            Self::Run(runs) => run::select(runs, pos),
        }
    }

    /// Returns the smallest value `>= from`.
    pub fn successor(&self, from: u16) -> Option<u16> {
        match *self {
            Self::Array(values) => array::successor(values, from),
            Self::Bitmap { words, .. } => bitmap::successor(words, from),
            Self::Run(runs) => run::successor(runs, from),
        }
    }

    /// Returns the largest value `<= from`.
    pub fn predecessor(&self, from: u16) -> Option<u16> {
        match *self {
            Self::Array(values) => array::predecessor(values, from),
            Self::Bitmap { words, .. } => bitmap::predecessor(words, from),
            Self::Run(runs) => run::predecessor(runs, from),
        }
    }

    /// Returns the smallest value.
    #[inline]
    pub fn min(&self) -> Option<u16> {
        match *self {
            Self::Array(values) => values.first().copied(),
            Self::Bitmap { words, .. } => bitmap::successor(words, 0),
            Self::Run(runs) => runs.first().map(|r| r.start),
        }
    }

    /// Returns the largest value.
    #[inline]
    pub fn max(&self) -> Option<u16> {
        match *self {
            Self::Array(values) => values.last().copied(),
            Self::Bitmap { words, .. } => bitmap::predecessor(words, u16::MAX),
            Self::Run(runs) => runs.last().map(Interval::end),
        }
    }

    /// Returns the number of maximal runs of consecutive values.
    pub fn run_count(&self) -> usize {
        match *self {
            Self::Array(values) => array::number_of_runs(values),
            Self::Bitmap { words, .. } => bitmap::number_of_runs(words),
            Self::Run(runs) => runs.len(),
        }
    }

    /// Returns an iterator over the values in ascending order.
    #[inline]
    pub fn iter(&self) -> ContainerIter<'a> {
        match *self {
            Self::Array(values) => ContainerIter::Array(values.iter().copied()),
            Self::Bitmap { words, .. } => ContainerIter::Bitmap(BitmapIter::new(words)),
            Self::Run(runs) => ContainerIter::Run(run::iter(runs)),
        }
    }

    /// Appends every value, combined with the high key `high`, to `out`.
    pub fn append_to(&self, high: u16, out: &mut Vec<u32>) {
        let base = u32::from(high) << 16;
        out.reserve(self.len());
        out.extend(self.iter().map(|low| base | u32::from(low)));
    }

    /// Copies the container into an owned bitmap.
    pub fn to_bitmap(&self) -> Bitmap {
        match *self {
            Self::Array(values) => Bitmap::from_array(values),
            Self::Bitmap { words, len } => Bitmap::copied(words, len),
            Self::Run(runs) => Bitmap::from_runs(runs),
        }
    }

    /// Copies the container, keeping its representation.
    pub fn to_container(&self) -> Container {
        match *self {
            Self::Array(values) => Container::Array(Array::from_sorted_vec(values.to_vec())),
            Self::Bitmap { words, len } => Container::Bitmap(Bitmap::copied(words, len)),
            Self::Run(runs) => Container::Run(Run::from_intervals(runs.to_vec())),
        }
    }
}

impl PartialEq for ContainerRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (*self, *other) {
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Bitmap { words: a, .. }, Self::Bitmap { words: b, .. }) => a == b,
            (Self::Run(a), Self::Run(b)) => a == b,
            _ => self.len() == other.len() && self.iter().eq(other.iter()),
        }
    }
}

impl Eq for ContainerRef<'_> {}

impl fmt::Debug for ContainerRef<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Array(values) => write!(f, "Array({} elements)", values.len()),
            Self::Bitmap { len, .. } => write!(f, "Bitmap({len} elements)"),
            Self::Run(runs) => write!(f, "Run({} runs, {} elements)", runs.len(), self.len()),
        }
    }
}

/// Iterator over the values of a container, usable from both ends.
#[derive(Clone, Debug)]
pub enum ContainerIter<'a> {
    Array(Copied<slice::Iter<'a, u16>>),
    Bitmap(BitmapIter<'a>),
    Run(RunIter<'a>),
}

impl Iterator for ContainerIter<'_> {
    type Item = u16;

    #[inline]
    fn next(&mut self) -> Option<u16> {
        match self {
            Self::Array(iter) => iter.next(),
            Self::Bitmap(iter) => iter.next(),
            Self::Run(iter) => iter.next(),
        }
    }
}

impl DoubleEndedIterator for ContainerIter<'_> {
    #[inline]
    fn next_back(&mut self) -> Option<u16> {
        match self {
            Self::Array(iter) => iter.next_back(),
            Self::Bitmap(iter) => iter.next_back(),
            Self::Run(iter) => iter.next_back(),
        }
    }
}
