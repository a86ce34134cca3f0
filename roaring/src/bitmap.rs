//! The owned, mutable roaring bitmap.

use crate::{
    container::{Container, ContainerRef},
    format::{self, Config},
    iter::Iter,
    roaring::{inclusive_bounds, split},
    Error, Roaring,
};
use bytes::Buf;
use commonware_codec::Read;
use core::{
    fmt::{self, Formatter},
    mem,
    ops::{Range, RangeBounds},
};
use tracing::debug;

/// Remembers the container touched by the previous bulk call.
///
/// Passing the same context to consecutive [RoaringBitmap::insert_bulk],
/// [RoaringBitmap::remove_bulk] or [Roaring::contains_bulk] calls skips the key search while values
/// keep landing in the same container. The cached slot is validated on every use, so a context that
/// outlived a structural change of the bitmap (or that was used with a different bitmap) only costs
/// a lookup and never yields a wrong answer.
#[derive(Clone, Copy, Debug, Default)]
pub struct BulkContext {
    slot: Option<(u16, usize)>,
}

impl BulkContext {
    /// Creates an empty context.
    pub const fn new() -> Self {
        Self { slot: None }
    }

    /// Returns the cached index for `key` if it still points at `key`.
    #[inline]
    pub(crate) fn lookup(&self, keys: &[u16], key: u16) -> Option<usize> {
        let (cached, index) = self.slot?;
        (cached == key && keys.get(index) == Some(&key)).then_some(index)
    }

    #[inline]
    pub(crate) fn remember(&mut self, key: u16, index: usize) {
        self.slot = Some((key, index));
    }
}

/// A compressed set of `u32` values.
///
/// Values are partitioned by their high 16 bits. Each partition is stored in a [Container] chosen
/// for its density (see [crate::container]). Keys are kept strictly ascending and no container is
/// ever empty.
///
/// # Example
///
/// ```
/// use commonware_roaring::{Roaring, RoaringBitmap};
///
/// let mut bitmap = RoaringBitmap::new();
/// bitmap.insert(1);
/// bitmap.insert(1_000_000);
/// bitmap.insert_range(10..20);
///
/// assert_eq!(bitmap.len(), 12);
/// assert!(bitmap.contains(15));
/// assert_eq!(bitmap.get(-1).unwrap(), 1_000_000);
/// ```
#[derive(Clone, Default)]
pub struct RoaringBitmap {
    pub(crate) keys: Vec<u16>,
    pub(crate) containers: Vec<Container>,
}

impl RoaringBitmap {
    /// Creates an empty bitmap.
    pub const fn new() -> Self {
        Self {
            keys: Vec::new(),
            containers: Vec::new(),
        }
    }

    /// Creates an empty bitmap with room for `containers` containers.
    pub fn with_capacity(containers: usize) -> Self {
        Self {
            keys: Vec::with_capacity(containers),
            containers: Vec::with_capacity(containers),
        }
    }

    /// Builds a bitmap from a list of values.
    ///
    /// Ascending input (duplicates allowed) is consumed directly, a container at a time. Unsorted
    /// input is sorted first.
    pub fn from_sorted(values: &[u32]) -> Self {
        if !values.windows(2).all(|w| w[0] <= w[1]) {
            let mut sorted = values.to_vec();
            sorted.sort_unstable();
            return Self::from_sorted(&sorted);
        }

        Self::from_ascending(values.iter().copied())
    }

    /// Builds a bitmap from non-decreasing values, one container at a time.
    fn from_ascending(values: impl IntoIterator<Item = u32>) -> Self {
        let mut result = Self::new();
        let mut current: Option<(u16, Vec<u16>)> = None;
        for value in values {
            let (high, low) = split(value);
            if let Some((key, lows)) = &mut current {
                if *key == high {
                    if lows.last() != Some(&low) {
                        lows.push(low);
                    }
                    continue;
                }
            }
            if let Some((key, lows)) = current.replace((high, vec![low])) {
                result.push(key, Container::from_array(lows));
            }
        }
        if let Some((key, lows)) = current {
            result.push(key, Container::from_array(lows));
        }
        result
    }

    /// Builds a bitmap holding every `step`-th value of `range`, starting at its lower bound.
    ///
    /// A `step` of zero yields an empty bitmap.
    pub fn from_range(range: impl RangeBounds<u32>, step: u32) -> Self {
        let Some((start, end)) = inclusive_bounds(range) else {
            return Self::new();
        };
        match step {
            0 => Self::new(),
            1 => {
                let mut result = Self::new();
                result.insert_range(start..=end);
                result
            }
            _ => Self::from_ascending((start..=end).step_by(step as usize)),
        }
    }

    /// Appends a container with a key greater than every existing key.
    #[inline]
    pub(crate) fn push(&mut self, key: u16, container: Container) {
        debug_assert!(self.keys.last().map_or(true, |&last| last < key));
        debug_assert!(!container.is_empty());
        self.keys.push(key);
        self.containers.push(container);
    }

    /// Returns the index of the container for `high`, creating an empty one if needed.
    ///
    /// The caller must leave the container non-empty.
    fn entry(&mut self, high: u16) -> usize {
        match self.keys.binary_search(&high) {
            Ok(index) => index,
            Err(index) => {
                self.keys.insert(index, high);
                self.containers.insert(index, Container::new());
                index
            }
        }
    }

    /// Removes the container at `index`.
    fn remove_container(&mut self, index: usize) {
        self.keys.remove(index);
        self.containers.remove(index);
    }

    /// Removes every empty container within `range`.
    fn drop_empty(&mut self, range: Range<usize>) {
        let mut write = range.start;
        for read in range.clone() {
            if !self.containers[read].is_empty() {
                self.keys.swap(write, read);
                self.containers.swap(write, read);
                write += 1;
            }
        }
        self.keys.drain(write..range.end);
        self.containers.drain(write..range.end);
    }

    /// Returns the range of container indices whose keys fall in `[low, high]`.
    fn key_range(&self, low: u16, high: u16) -> Range<usize> {
        let start = self.keys.partition_point(|&k| k < low);
        let end = self.keys.partition_point(|&k| k <= high);
        start..end
    }

    /// Inserts a value. Returns true if it was not already present.
    pub fn insert(&mut self, value: u32) -> bool {
        let (high, low) = split(value);
        let index = self.entry(high);
        self.containers[index].insert(low)
    }

    /// Inserts a value, reusing the container located by the previous call with `context`.
    pub fn insert_bulk(&mut self, context: &mut BulkContext, value: u32) -> bool {
        let (high, low) = split(value);
        let index = match context.lookup(&self.keys, high) {
            Some(index) => index,
            None => {
                let index = self.entry(high);
                context.remember(high, index);
                index
            }
        };
        self.containers[index].insert(low)
    }

    /// Inserts every value. Returns the number of values that were newly inserted.
    pub fn insert_many(&mut self, values: &[u32]) -> u64 {
        let mut context = BulkContext::new();
        values
            .iter()
            .filter(|&&value| self.insert_bulk(&mut context, value))
            .count() as u64
    }

    /// Removes a value. Returns true if it was present.
    pub fn remove(&mut self, value: u32) -> bool {
        let (high, low) = split(value);
        let Ok(index) = self.keys.binary_search(&high) else {
            return false;
        };
        let removed = self.containers[index].remove(low);
        if self.containers[index].is_empty() {
            self.remove_container(index);
        }
        removed
    }

    /// Removes a value, reusing the container located by the previous call with `context`.
    pub fn remove_bulk(&mut self, context: &mut BulkContext, value: u32) -> bool {
        let (high, low) = split(value);
        let index = match context.lookup(&self.keys, high) {
            Some(index) => index,
            None => match self.keys.binary_search(&high) {
                Ok(index) => {
                    context.remember(high, index);
                    index
                }
                Err(_) => return false,
            },
        };
        let removed = self.containers[index].remove(low);
        if self.containers[index].is_empty() {
            self.remove_container(index);
        }
        removed
    }

    /// Removes every value. Returns the number of values that were present.
    pub fn remove_many(&mut self, values: &[u32]) -> u64 {
        let mut context = BulkContext::new();
        values
            .iter()
            .filter(|&&value| self.remove_bulk(&mut context, value))
            .count() as u64
    }

    /// Removes all values.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.containers.clear();
    }

    /// Removes and returns the smallest value.
    pub fn pop_min(&mut self) -> Result<u32, Error> {
        let value = self.min().ok_or(Error::NotFound)?;
        self.remove(value);
        Ok(value)
    }

    /// Removes and returns the largest value.
    pub fn pop_max(&mut self) -> Result<u32, Error> {
        let value = self.max().ok_or(Error::NotFound)?;
        self.remove(value);
        Ok(value)
    }

    /// Inserts every value in `range`. Returns the number of values that were newly inserted.
    ///
    /// # Example
    ///
    /// ```
    /// use commonware_roaring::{Roaring, RoaringBitmap};
    ///
    /// let mut bitmap = RoaringBitmap::new();
    /// bitmap.insert_range(10..20);
    /// assert_eq!(bitmap.len(), 10);
    ///
    /// bitmap.insert_range(15..=25);
    /// assert_eq!(bitmap.len(), 16);
    /// ```
    pub fn insert_range(&mut self, range: impl RangeBounds<u32>) -> u64 {
        let Some((start, end)) = inclusive_bounds(range) else {
            return 0;
        };
        let (start_high, start_low) = split(start);
        let (end_high, end_low) = split(end);

        let mut inserted = 0;
        for high in start_high..=end_high {
            let first = if high == start_high { start_low } else { 0 };
            let last = if high == end_high { end_low } else { u16::MAX };
            let index = self.entry(high);
            inserted += self.containers[index].insert_range(first, last) as u64;
        }
        inserted
    }

    /// Removes every value in `range`. Returns the number of values that were removed.
    pub fn remove_range(&mut self, range: impl RangeBounds<u32>) -> u64 {
        let Some((start, end)) = inclusive_bounds(range) else {
            return 0;
        };
        let (start_high, start_low) = split(start);
        let (end_high, end_low) = split(end);

        let affected = self.key_range(start_high, end_high);
        let mut removed = 0;
        for index in affected.clone() {
            let high = self.keys[index];
            let first = if high == start_high { start_low } else { 0 };
            let last = if high == end_high { end_low } else { u16::MAX };
            let container = &mut self.containers[index];
            if first == 0 && last == u16::MAX {
                removed += container.len() as u64;
                *container = Container::new();
            } else {
                removed += container.remove_range(first, last) as u64;
            }
        }
        self.drop_empty(affected);
        removed
    }

    /// Complements membership of every value in `range`.
    pub fn flip_inplace(&mut self, range: impl RangeBounds<u32>) {
        let Some((start, end)) = inclusive_bounds(range) else {
            return;
        };
        let (start_high, start_low) = split(start);
        let (end_high, end_low) = split(end);

        for high in start_high..=end_high {
            let first = if high == start_high { start_low } else { 0 };
            let last = if high == end_high { end_low } else { u16::MAX };
            match self.keys.binary_search(&high) {
                Ok(index) => {
                    self.containers[index].flip_range(first, last);
                    if self.containers[index].is_empty() {
                        self.remove_container(index);
                    }
                }
                Err(index) => {
                    let mut container = Container::new();
                    container.insert_range(first, last);
                    self.keys.insert(index, high);
                    self.containers.insert(index, container);
                }
            }
        }
    }

    /// Converts every container to run encoding where that is smaller, and back where it is not.
    ///
    /// Returns true if at least one run container remains.
    pub fn run_optimize(&mut self) -> bool {
        let mut runs = 0;
        for container in &mut self.containers {
            if container.optimize() {
                runs += 1;
            }
        }
        self.drop_empty(0..self.containers.len());
        debug!(
            containers = self.containers.len(),
            runs, "optimized run containers"
        );
        runs > 0
    }

    /// Converts every run container back to an array or bitmap.
    ///
    /// Returns true if any container changed.
    pub fn remove_run_compression(&mut self) -> bool {
        let mut changed = false;
        for container in &mut self.containers {
            changed |= container.remove_run_compression();
        }
        changed
    }

    /// Releases unused capacity. Returns the number of bytes freed.
    pub fn shrink_to_fit(&mut self) -> usize {
        let mut freed = (self.keys.capacity() - self.keys.len()) * mem::size_of::<u16>()
            + (self.containers.capacity() - self.containers.len()) * mem::size_of::<Container>();
        self.keys.shrink_to_fit();
        self.containers.shrink_to_fit();
        for container in &mut self.containers {
            freed += container.shrink_to_fit();
        }
        freed
    }

    /// Reads a bitmap in the portable format.
    pub fn deserialize_portable(buf: &mut impl Buf) -> Result<Self, Error> {
        Self::deserialize_portable_cfg(buf, &Config::default())
    }

    /// Reads a bitmap in the portable format, bounding allocations by `config`.
    ///
    /// Equivalent to [Read::read_cfg], with the error wrapped in [Error::Codec].
    pub fn deserialize_portable_cfg(buf: &mut impl Buf, config: &Config) -> Result<Self, Error> {
        Ok(Self::read_cfg(buf, config)?)
    }

    /// Reads a bitmap in the native format.
    pub fn deserialize(buf: &mut impl Buf) -> Result<Self, Error> {
        Self::deserialize_cfg(buf, &Config::default())
    }

    /// Reads a bitmap in the native format, bounding allocations by `config`.
    pub fn deserialize_cfg(buf: &mut impl Buf, config: &Config) -> Result<Self, Error> {
        format::native::read(buf, config)
    }

    /// Returns an iterator over the containers and their keys.
    pub fn containers(&self) -> impl Iterator<Item = (u16, &Container)> {
        self.keys.iter().copied().zip(self.containers.iter())
    }
}

impl Roaring for RoaringBitmap {
    #[inline]
    fn keys(&self) -> &[u16] {
        &self.keys
    }

    #[inline]
    fn container(&self, index: usize) -> ContainerRef<'_> {
        self.containers[index].view()
    }
}

impl PartialEq for RoaringBitmap {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl Eq for RoaringBitmap {}

impl fmt::Debug for RoaringBitmap {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RoaringBitmap {{ len: {}, containers: {} }}",
            self.len(),
            self.container_count()
        )
    }
}

impl<'a> IntoIterator for &'a RoaringBitmap {
    type Item = u32;
    type IntoIter = Iter<'a, RoaringBitmap>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<u32> for RoaringBitmap {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut bitmap = Self::new();
        bitmap.extend(iter);
        bitmap
    }
}

impl Extend<u32> for RoaringBitmap {
    fn extend<I: IntoIterator<Item = u32>>(&mut self, iter: I) {
        let mut context = BulkContext::new();
        for value in iter {
            self.insert_bulk(&mut context, value);
        }
    }
}

impl From<&[u32]> for RoaringBitmap {
    fn from(values: &[u32]) -> Self {
        Self::from_sorted(values)
    }
}

#[cfg(feature = "arbitrary")]
impl arbitrary::Arbitrary<'_> for RoaringBitmap {
    fn arbitrary(u: &mut arbitrary::Unstructured<'_>) -> arbitrary::Result<Self> {
        let size = u.int_in_range(0..=1024)?;
        let mut bitmap = Self::new();
        for _ in 0..size {
            bitmap.insert(u.arbitrary::<u32>()?);
        }
        let ranges = u.int_in_range(0..=4)?;
        for _ in 0..ranges {
            let start = u.arbitrary::<u32>()?;
            let len = u.int_in_range(0..=100_000)?;
            bitmap.insert_range(start..start.saturating_add(len));
        }
        if u.arbitrary()? {
            bitmap.run_optimize();
        }
        Ok(bitmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::MAX_CARDINALITY;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::BTreeSet;

    fn model(bitmap: &RoaringBitmap) -> BTreeSet<u32> {
        bitmap.iter().collect()
    }

    fn assert_canonical(bitmap: &RoaringBitmap) {
        assert!(bitmap.keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(bitmap.keys.len(), bitmap.containers.len());
        assert!(bitmap.containers.iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn test_new() {
        let bitmap = RoaringBitmap::new();
        assert!(bitmap.is_empty());
        assert_eq!(bitmap.len(), 0);
        assert_eq!(bitmap.container_count(), 0);
        assert_eq!(bitmap.min(), None);
        assert_eq!(bitmap.max(), None);
    }

    #[test]
    fn test_insert_and_contains() {
        let mut bitmap = RoaringBitmap::new();
        assert!(bitmap.insert(0));
        assert!(bitmap.insert(42));
        assert!(bitmap.insert(u32::MAX));
        assert!(!bitmap.insert(42));

        assert_eq!(bitmap.len(), 3);
        assert!(bitmap.contains(0));
        assert!(bitmap.contains(42));
        assert!(bitmap.contains(u32::MAX));
        assert!(!bitmap.contains(1));
        assert!(!bitmap.contains(65_536 + 42));
        assert_eq!(bitmap.container_count(), 2);
        assert_canonical(&bitmap);
    }

    #[test]
    fn test_remove() {
        let mut bitmap = RoaringBitmap::new();
        bitmap.insert(5);
        bitmap.insert(70_000);

        assert!(bitmap.remove(5));
        assert!(!bitmap.remove(5));
        assert!(!bitmap.remove(6));
        assert_eq!(bitmap.container_count(), 1);
        assert!(bitmap.remove(70_000));
        assert!(bitmap.is_empty());
        assert_canonical(&bitmap);
    }

    #[test]
    fn test_array_to_bitmap_and_back() {
        let mut bitmap = RoaringBitmap::new();
        for i in 0..=MAX_CARDINALITY as u32 {
            bitmap.insert(i * 2);
        }
        assert!(matches!(bitmap.containers[0], Container::Bitmap(_)));
        bitmap.remove(0);
        assert!(matches!(bitmap.containers[0], Container::Array(_)));
        assert_eq!(bitmap.len(), MAX_CARDINALITY as u64);
    }

    #[test]
    fn test_scenario_algebra() {
        let a = RoaringBitmap::from_sorted(&[1, 2, 3, 1_000_000, 1_000_001]);
        let b = RoaringBitmap::from_sorted(&[3, 4, 1_000_001]);

        let and = a.and(&b);
        let or = a.or(&b);
        let andnot = a.andnot(&b);
        assert_eq!(and.to_vec(), vec![3, 1_000_001]);
        assert_eq!(or.to_vec(), vec![1, 2, 3, 4, 1_000_000, 1_000_001]);
        assert_eq!(andnot.to_vec(), vec![1, 2, 1_000_000]);
        assert_eq!(and.len(), 2);
        assert_eq!(or.len(), 6);
        assert_eq!(andnot.len(), 3);
        assert_eq!(a.xor(&b).to_vec(), vec![1, 2, 4, 1_000_000]);
    }

    #[test]
    fn test_from_sorted_unsorted_input() {
        let sorted = RoaringBitmap::from_sorted(&[1, 1, 2, 70_000, 70_000, 80_000]);
        let unsorted = RoaringBitmap::from_sorted(&[80_000, 2, 70_000, 1, 70_000, 1]);
        assert_eq!(sorted, unsorted);
        assert_eq!(sorted.to_vec(), vec![1, 2, 70_000, 80_000]);
        assert_canonical(&unsorted);

        let dense: Vec<u32> = (0..10_000).collect();
        let bitmap = RoaringBitmap::from_sorted(&dense);
        assert!(matches!(bitmap.containers[0], Container::Bitmap(_)));
        assert_eq!(bitmap.len(), 10_000);
    }

    #[test]
    fn test_from_range() {
        assert!(RoaringBitmap::from_range(0..100, 0).is_empty());
        assert!(RoaringBitmap::from_range(100..100, 1).is_empty());

        let stepped = RoaringBitmap::from_range(10..200_000, 7);
        let expected: Vec<u32> = (10..200_000).step_by(7).collect();
        assert_eq!(stepped.to_vec(), expected);
        assert_canonical(&stepped);

        let contiguous = RoaringBitmap::from_range(65_000..=70_000, 1);
        assert_eq!(contiguous.len(), 5_001);
        assert_eq!(contiguous.min(), Some(65_000));
        assert_eq!(contiguous.max(), Some(70_000));

        let tail = RoaringBitmap::from_range(u32::MAX - 10.., 5);
        assert_eq!(tail.to_vec(), vec![u32::MAX - 10, u32::MAX - 5, u32::MAX]);
    }

    #[test]
    fn test_bulk_context() {
        let mut bitmap = RoaringBitmap::new();
        let mut context = BulkContext::new();
        for value in [1, 2, 3, 70_000, 4, 70_001, 1] {
            bitmap.insert_bulk(&mut context, value);
        }
        assert_eq!(bitmap.to_vec(), vec![1, 2, 3, 4, 70_000, 70_001]);

        // Structural change under a live context.
        bitmap.insert(0x0001_0000 - 1);
        bitmap.remove(70_000);
        bitmap.remove(70_001);
        assert!(bitmap.contains_bulk(&mut context, 1));
        assert!(!bitmap.contains_bulk(&mut context, 70_000));
        assert!(bitmap.insert_bulk(&mut context, 70_002));
        assert!(bitmap.contains_bulk(&mut context, 70_002));
        assert_canonical(&bitmap);

        let flags = bitmap.contains_many(&[1, 5, 70_002, 65_535, u32::MAX]);
        assert_eq!(flags, vec![true, false, true, true, false]);
    }

    #[test]
    fn test_insert_remove_many() {
        let mut bitmap = RoaringBitmap::new();
        assert_eq!(bitmap.insert_many(&[5, 1, 5, 100_000, 3]), 4);
        assert_eq!(bitmap.remove_many(&[1, 2, 100_000, 100_000]), 2);
        assert_eq!(bitmap.to_vec(), vec![3, 5]);
        assert_canonical(&bitmap);
    }

    #[test]
    fn test_pop() {
        let mut bitmap = RoaringBitmap::from_sorted(&[3, 7, 200_000]);
        assert_eq!(bitmap.pop_min().unwrap(), 3);
        assert_eq!(bitmap.pop_max().unwrap(), 200_000);
        assert_eq!(bitmap.pop_max().unwrap(), 7);
        assert!(matches!(bitmap.pop_min(), Err(Error::NotFound)));
        assert!(matches!(bitmap.pop_max(), Err(Error::NotFound)));
    }

    #[test]
    fn test_get() {
        let bitmap = RoaringBitmap::from_sorted(&[10, 20, 70_000]);
        assert_eq!(bitmap.get(0).unwrap(), 10);
        assert_eq!(bitmap.get(2).unwrap(), 70_000);
        assert_eq!(bitmap.get(-1).unwrap(), 70_000);
        assert_eq!(bitmap.get(-3).unwrap(), 10);
        assert!(matches!(bitmap.get(3), Err(Error::NotFound)));
        assert!(matches!(bitmap.get(-4), Err(Error::NotFound)));

        let empty = RoaringBitmap::new();
        for index in [-1, 0, 1] {
            assert!(matches!(empty.get(index), Err(Error::NotFound)));
        }
    }

    #[test]
    fn test_rank_select_position() {
        let bitmap = RoaringBitmap::from_sorted(&[10, 20, 70_000, 70_001]);
        assert_eq!(bitmap.rank(0), 0);
        assert_eq!(bitmap.rank(10), 1);
        assert_eq!(bitmap.rank(69_999), 2);
        assert_eq!(bitmap.rank(u32::MAX), 4);
        assert_eq!(bitmap.select(3), Some(70_001));
        assert_eq!(bitmap.select(4), None);
        assert_eq!(bitmap.position(70_000), Some(2));
        assert_eq!(bitmap.position(15), None);
    }

    #[test]
    fn test_insert_range_spanning_containers() {
        let mut bitmap = RoaringBitmap::new();
        assert_eq!(bitmap.insert_range(65_530..131_080), 65_550);
        assert_eq!(bitmap.container_count(), 3);
        assert!(matches!(bitmap.containers[1], Container::Run(_)));
        assert_eq!(bitmap.insert_range(65_520..=65_540), 10);
        assert_eq!(bitmap.insert_range(10..10), 0);
        assert_canonical(&bitmap);
    }

    #[test]
    fn test_remove_range() {
        let mut bitmap = RoaringBitmap::new();
        bitmap.insert_range(0..300_000);
        assert_eq!(bitmap.remove_range(100..=200_000), 199_901);
        assert_eq!(bitmap.len(), 300_000 - 199_901);
        assert!(bitmap.contains(99));
        assert!(!bitmap.contains(100));
        assert!(!bitmap.contains(200_000));
        assert!(bitmap.contains(200_001));
        assert_eq!(bitmap.container_count(), 3);

        assert_eq!(bitmap.remove_range(..), 300_000 - 199_901);
        assert!(bitmap.is_empty());
        assert_canonical(&bitmap);
    }

    #[test]
    fn test_flip() {
        let mut bitmap = RoaringBitmap::from_sorted(&[1, 5, 70_000]);
        bitmap.flip_inplace(0..8);
        assert_eq!(bitmap.to_vec(), vec![0, 2, 3, 4, 6, 7, 70_000]);

        let flipped = bitmap.flip(65_536..65_536 * 3);
        assert_eq!(flipped.len(), 7 + 65_536 * 2 - 2);
        assert!(!flipped.contains(70_000));
        assert!(flipped.contains(70_001));
        assert_eq!(flipped.container_count(), 3);
        assert_canonical(&flipped);

        let restored = flipped.flip(65_536..65_536 * 3);
        assert_eq!(restored, bitmap);
        assert_canonical(&restored);

        let mut empty = RoaringBitmap::new();
        empty.flip_inplace(10..10);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_run_optimize() {
        let mut bitmap = RoaringBitmap::new();
        bitmap.insert_range(0..10_000);
        bitmap.insert(100_000);
        let before = model(&bitmap);

        bitmap.remove_run_compression();
        assert!(matches!(bitmap.containers[0], Container::Bitmap(_)));
        assert!(bitmap.run_optimize());
        assert!(matches!(bitmap.containers[0], Container::Run(_)));
        assert!(matches!(bitmap.containers[1], Container::Array(_)));
        assert!(bitmap.run_optimize());
        assert_eq!(model(&bitmap), before);

        let stats = bitmap.statistics();
        assert_eq!(stats.run_containers, 1);
        assert_eq!(stats.array_containers, 1);
        assert_eq!(stats.run_values, 10_000);
        assert_eq!(stats.array_values, 1);
        assert_eq!(stats.run_bytes, 6);
        assert_eq!(stats.array_bytes, 2);
        assert_eq!(stats.cardinality, 10_001);
        assert_eq!(stats.min, Some(0));
        assert_eq!(stats.max, Some(100_000));
    }

    #[test]
    fn test_shrink_to_fit() {
        let mut bitmap = RoaringBitmap::with_capacity(64);
        bitmap.insert(1);
        assert!(bitmap.shrink_to_fit() > 0);
        assert_eq!(bitmap.to_vec(), vec![1]);
    }

    #[test]
    fn test_predicates() {
        let a = RoaringBitmap::from_sorted(&[1, 2, 70_000]);
        let b = RoaringBitmap::from_sorted(&[1, 2, 3, 70_000]);
        let c = RoaringBitmap::from_sorted(&[4, 80_000]);

        assert!(a.is_subset(&b));
        assert!(a.is_strict_subset(&b));
        assert!(a.is_subset(&a));
        assert!(!a.is_strict_subset(&a));
        assert!(!b.is_subset(&a));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(RoaringBitmap::new().is_subset(&a));
        assert!(a.equals(&a.clone()));
        assert!(!a.equals(&b));
    }

    #[test]
    fn test_equality_ignores_representation() {
        let mut a = RoaringBitmap::new();
        a.insert_range(0..5_000);
        let b: RoaringBitmap = (0..5_000).collect();
        assert!(matches!(a.containers[0], Container::Run(_)));
        assert!(matches!(b.containers[0], Container::Bitmap(_)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_cardinality_ops() {
        let a: RoaringBitmap = (0..1_000).collect();
        let b: RoaringBitmap = (500..2_000).collect();
        assert_eq!(a.and_cardinality(&b), 500);
        assert_eq!(a.or_cardinality(&b), 2_000);
        assert_eq!(a.andnot_cardinality(&b), 500);
        assert_eq!(a.xor_cardinality(&b), 1_500);
        assert_eq!(a.jaccard_index(&b), 0.25);
        assert!(RoaringBitmap::new()
            .jaccard_index(&RoaringBitmap::new())
            .is_nan());
    }

    #[test]
    fn test_clear_and_clone() {
        let mut bitmap: RoaringBitmap = [1, 2, 3].into_iter().collect();
        let copy = bitmap.clone();
        bitmap.clear();
        assert!(bitmap.is_empty());
        assert_eq!(copy.len(), 3);
    }

    #[test]
    fn test_debug() {
        let bitmap = RoaringBitmap::from_sorted(&[1, 70_000]);
        assert_eq!(
            format!("{bitmap:?}"),
            "RoaringBitmap { len: 2, containers: 2 }"
        );
    }

    #[test]
    fn test_random_mutations_against_model() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut bitmap = RoaringBitmap::new();
        let mut expected = BTreeSet::new();
        for _ in 0..5_000 {
            let value = rng.gen_range(0..300_000);
            match rng.gen_range(0..6) {
                0 | 1 => assert_eq!(bitmap.insert(value), expected.insert(value)),
                2 => assert_eq!(bitmap.remove(value), expected.remove(&value)),
                3 => {
                    let end = value + rng.gen_range(0..10_000);
                    let added = (value..end).filter(|v| expected.insert(*v)).count();
                    assert_eq!(bitmap.insert_range(value..end), added as u64);
                }
                4 => {
                    let end = value + rng.gen_range(0..10_000);
                    let removed = (value..end).filter(|v| expected.remove(v)).count();
                    assert_eq!(bitmap.remove_range(value..end), removed as u64);
                }
                _ => {
                    let end = value + rng.gen_range(0..1_000);
                    bitmap.flip_inplace(value..end);
                    for v in value..end {
                        if !expected.remove(&v) {
                            expected.insert(v);
                        }
                    }
                }
            }
        }
        assert_canonical(&bitmap);
        assert_eq!(model(&bitmap), expected);
        assert_eq!(bitmap.len(), expected.len() as u64);

        bitmap.run_optimize();
        assert_eq!(model(&bitmap), expected);
    }
}
