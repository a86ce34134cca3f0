//! Read-only operations shared by owned and frozen bitmaps.
//!
//! A bitmap is a sorted index of `(key, container)` pairs. [Roaring] only requires access to the
//! keys and to each container in borrowed form; everything else (queries, ordered access,
//! predicates, allocating set algebra, and serialization) is provided on top of that.

use crate::{
    container::ContainerRef,
    format,
    iter::{Cursor, Iter},
    ops, BulkContext, Error, RoaringBitmap,
};
use bytes::BufMut;
use core::ops::{Bound, RangeBounds};

/// Splits a value into its high key and low bits.
#[inline]
pub(crate) const fn split(value: u32) -> (u16, u16) {
    ((value >> 16) as u16, value as u16)
}

/// Combines a high key and low bits into a value.
#[inline]
pub(crate) const fn combine(high: u16, low: u16) -> u32 {
    ((high as u32) << 16) | low as u32
}

/// Resolves range bounds into an inclusive `(start, end)` pair, or `None` if the range is empty.
pub(crate) fn inclusive_bounds(range: impl RangeBounds<u32>) -> Option<(u32, u32)> {
    let start = match range.start_bound() {
        Bound::Included(&n) => n,
        Bound::Excluded(&n) => n.checked_add(1)?,
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&n) => n,
        Bound::Excluded(&n) => n.checked_sub(1)?,
        Bound::Unbounded => u32::MAX,
    };
    (start <= end).then_some((start, end))
}

/// Summary of how a bitmap is stored.
///
/// Byte counts are the payload sizes of the portable encoding: an array payload is its values
/// (the cardinality lives in the header), while a run payload is prefixed by its run count.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Number of containers.
    pub containers: usize,
    /// Number of array containers.
    pub array_containers: usize,
    /// Number of run containers.
    pub run_containers: usize,
    /// Number of bitmap containers.
    pub bitmap_containers: usize,
    /// Values held in array containers.
    pub array_values: u64,
    /// Values held in run containers.
    pub run_values: u64,
    /// Values held in bitmap containers.
    pub bitmap_values: u64,
    /// Serialized payload bytes of array containers.
    pub array_bytes: usize,
    /// Serialized payload bytes of run containers.
    pub run_bytes: usize,
    /// Serialized payload bytes of bitmap containers.
    pub bitmap_bytes: usize,
    /// Smallest value, if any.
    pub min: Option<u32>,
    /// Largest value, if any.
    pub max: Option<u32>,
    /// Number of values.
    pub cardinality: u64,
}

/// Read-only access to a roaring bitmap.
///
/// Implemented by [RoaringBitmap] and [crate::FrozenBitmap]. Operations that produce a new set
/// accept any other [Roaring] and always return an owned [RoaringBitmap], so owned and frozen
/// bitmaps can be freely combined.
pub trait Roaring {
    /// Returns the high keys of all containers, strictly ascending.
    fn keys(&self) -> &[u16];

    /// Borrows the container at `index` (parallel to [Roaring::keys]).
    fn container(&self, index: usize) -> ContainerRef<'_>;

    /// Returns the number of containers.
    #[inline]
    fn container_count(&self) -> usize {
        self.keys().len()
    }

    /// Returns the number of values in the bitmap.
    fn len(&self) -> u64 {
        (0..self.container_count())
            .map(|i| self.container(i).len() as u64)
            .sum()
    }

    /// Returns true if the bitmap contains no values.
    #[inline]
    fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    /// Checks if the given value is present.
    fn contains(&self, value: u32) -> bool {
        let (high, low) = split(value);
        self.keys()
            .binary_search(&high)
            .is_ok_and(|i| self.container(i).contains(low))
    }

    /// Checks membership, reusing the container located by the previous call with `context`.
    fn contains_bulk(&self, context: &mut BulkContext, value: u32) -> bool {
        let (high, low) = split(value);
        let keys = self.keys();
        let index = match context.lookup(keys, high) {
            Some(index) => index,
            None => match keys.binary_search(&high) {
                Ok(index) => {
                    context.remember(high, index);
                    index
                }
                Err(_) => return false,
            },
        };
        self.container(index).contains(low)
    }

    /// Checks membership of every value, in order.
    fn contains_many(&self, values: &[u32]) -> Vec<bool> {
        let mut context = BulkContext::default();
        values
            .iter()
            .map(|&value| self.contains_bulk(&mut context, value))
            .collect()
    }

    /// Returns the smallest value, or `None` if empty.
    fn min(&self) -> Option<u32> {
        let high = *self.keys().first()?;
        self.container(0).min().map(|low| combine(high, low))
    }

    /// Returns the largest value, or `None` if empty.
    fn max(&self) -> Option<u32> {
        let index = self.container_count().checked_sub(1)?;
        let high = self.keys()[index];
        self.container(index).max().map(|low| combine(high, low))
    }

    /// Returns the number of values `<= value`.
    fn rank(&self, value: u32) -> u64 {
        let (high, low) = split(value);
        let keys = self.keys();
        let mut rank = 0;
        for (index, &key) in keys.iter().enumerate() {
            if key > high {
                break;
            }
            let container = self.container(index);
            if key == high {
                return rank + container.rank(low) as u64;
            }
            rank += container.len() as u64;
        }
        rank
    }

    /// Returns the zero-based index of `value`, or `None` if absent.
    fn position(&self, value: u32) -> Option<u64> {
        self.contains(value).then(|| self.rank(value) - 1)
    }

    /// Returns the value at zero-based position `pos` in ascending order.
    fn select(&self, pos: u64) -> Option<u32> {
        let mut remaining = pos;
        for (index, &key) in self.keys().iter().enumerate() {
            let container = self.container(index);
            let len = container.len() as u64;
            if remaining < len {
                return container
                    .select(remaining as usize)
                    .map(|low| combine(key, low));
            }
            remaining -= len;
        }
        None
    }

    /// Returns the value at `index`, where negative indices count back from the end
    /// (`-1` is the largest value).
    ///
    /// Returns [Error::NotFound] if the index falls outside `[-len, len)`.
    fn get(&self, index: i64) -> Result<u32, Error> {
        let len = self.len() as i64;
        let index = if index < 0 { index + len } else { index };
        if index < 0 || index >= len {
            return Err(Error::NotFound);
        }
        self.select(index as u64).ok_or(Error::NotFound)
    }

    /// Returns a double-ended iterator over the values in ascending order.
    #[inline]
    fn iter(&self) -> Iter<'_, Self> {
        Iter::new(self)
    }

    /// Returns a cursor positioned at the smallest value.
    #[inline]
    fn cursor(&self) -> Cursor<'_, Self> {
        Cursor::new(self)
    }

    /// Collects every value into a sorted vector.
    fn to_vec(&self) -> Vec<u32> {
        let mut values = Vec::with_capacity(self.len() as usize);
        for (index, &key) in self.keys().iter().enumerate() {
            self.container(index).append_to(key, &mut values);
        }
        values
    }

    /// Returns true if every value of `self` is in `other`.
    fn is_subset(&self, other: &impl Roaring) -> bool {
        ops::is_subset(self, other)
    }

    /// Returns true if `self` is a subset of `other` and the two differ.
    fn is_strict_subset(&self, other: &impl Roaring) -> bool {
        self.len() < other.len() && self.is_subset(other)
    }

    /// Returns true if `self` and `other` share at least one value.
    fn intersects(&self, other: &impl Roaring) -> bool {
        ops::intersects(self, other)
    }

    /// Returns true if `self` and `other` hold exactly the same values.
    fn equals(&self, other: &impl Roaring) -> bool {
        let (a, b) = (self.keys(), other.keys());
        a == b && (0..a.len()).all(|i| self.container(i) == other.container(i))
    }

    /// Returns `self & other`.
    fn and(&self, other: &impl Roaring) -> RoaringBitmap {
        ops::and(self, other)
    }

    /// Returns `self | other`.
    fn or(&self, other: &impl Roaring) -> RoaringBitmap {
        ops::or(self, other)
    }

    /// Returns `self - other`.
    fn andnot(&self, other: &impl Roaring) -> RoaringBitmap {
        ops::andnot(self, other)
    }

    /// Returns `self ^ other`.
    fn xor(&self, other: &impl Roaring) -> RoaringBitmap {
        ops::xor(self, other)
    }

    /// Returns `|self & other|` without materializing the intersection.
    fn and_cardinality(&self, other: &impl Roaring) -> u64 {
        ops::and_cardinality(self, other)
    }

    /// Returns `|self | other|`.
    fn or_cardinality(&self, other: &impl Roaring) -> u64 {
        self.len() + other.len() - self.and_cardinality(other)
    }

    /// Returns `|self - other|`.
    fn andnot_cardinality(&self, other: &impl Roaring) -> u64 {
        self.len() - self.and_cardinality(other)
    }

    /// Returns `|self ^ other|`.
    fn xor_cardinality(&self, other: &impl Roaring) -> u64 {
        self.len() + other.len() - 2 * self.and_cardinality(other)
    }

    /// Returns the Jaccard index `|self & other| / |self | other|`.
    ///
    /// Two empty bitmaps yield `NaN`.
    fn jaccard_index(&self, other: &impl Roaring) -> f64 {
        let intersection = self.and_cardinality(other);
        let union = self.len() + other.len() - intersection;
        intersection as f64 / union as f64
    }

    /// Returns a copy with membership of every value in `range` complemented.
    fn flip(&self, range: impl RangeBounds<u32>) -> RoaringBitmap {
        let mut result = self.to_bitmap();
        result.flip_inplace(range);
        result
    }

    /// Copies the bitmap into an owned [RoaringBitmap], keeping container representations.
    fn to_bitmap(&self) -> RoaringBitmap {
        let mut result = RoaringBitmap::with_capacity(self.container_count());
        for (index, &key) in self.keys().iter().enumerate() {
            result.push(key, self.container(index).to_container());
        }
        result
    }

    /// Returns how the bitmap is stored.
    fn statistics(&self) -> Statistics {
        let mut stats = Statistics {
            containers: self.container_count(),
            min: self.min(),
            max: self.max(),
            ..Default::default()
        };
        for index in 0..self.container_count() {
            let container = self.container(index);
            let len = container.len() as u64;
            stats.cardinality += len;
            match container {
                ContainerRef::Array(values) => {
                    stats.array_containers += 1;
                    stats.array_values += len;
                    stats.array_bytes += values.len() * 2;
                }
                ContainerRef::Bitmap { .. } => {
                    stats.bitmap_containers += 1;
                    stats.bitmap_values += len;
                    stats.bitmap_bytes += crate::container::bitmap::BYTES;
                }
                ContainerRef::Run(runs) => {
                    stats.run_containers += 1;
                    stats.run_values += len;
                    stats.run_bytes += 2 + runs.len() * 4;
                }
            }
        }
        stats
    }

    /// Returns the exact size of the portable encoding.
    fn portable_size(&self) -> usize {
        format::portable::size(self)
    }

    /// Writes the portable (cross-implementation) encoding.
    fn serialize_portable(&self, buf: &mut impl BufMut) {
        format::portable::write_to(self, buf)
    }

    /// Returns the exact size of the frozen encoding.
    fn frozen_size(&self) -> usize {
        format::frozen::size(self)
    }

    /// Writes the frozen encoding, which can be viewed in place with
    /// [crate::FrozenBitmap::view].
    fn serialize_frozen(&self, buf: &mut impl BufMut) {
        format::frozen::write(self, buf)
    }

    /// Returns the exact size of the native encoding.
    fn size_in_bytes(&self) -> usize {
        format::native::size(self)
    }

    /// Writes the native encoding: a tag byte followed by either a plain list of values or the
    /// portable encoding, whichever is smaller.
    fn serialize(&self, buf: &mut impl BufMut) {
        format::native::write(self, buf)
    }
}
