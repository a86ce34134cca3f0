//! Ordered traversal of a bitmap.
//!
//! [Iter] is a standard double-ended iterator. [Cursor] is a seekable position that can move in
//! both directions, reposition itself at the first value at or above a target, and copy values out
//! in batches.

use crate::{
    container::{ContainerIter, ContainerRef},
    roaring::{combine, split},
    Roaring,
};
use core::iter::FusedIterator;

/// Iterator over the values of a bitmap in ascending order.
pub struct Iter<'a, R: Roaring + ?Sized> {
    bitmap: &'a R,
    /// Next container to open from the front.
    front_index: usize,
    /// One past the next container to open from the back.
    back_index: usize,
    front: Option<(u16, ContainerIter<'a>)>,
    back: Option<(u16, ContainerIter<'a>)>,
    remaining: u64,
}

impl<'a, R: Roaring + ?Sized> Iter<'a, R> {
    pub(crate) fn new(bitmap: &'a R) -> Self {
        Self {
            bitmap,
            front_index: 0,
            back_index: bitmap.container_count(),
            front: None,
            back: None,
            remaining: bitmap.len(),
        }
    }

    fn open(&self, index: usize) -> (u16, ContainerIter<'a>) {
        (self.bitmap.keys()[index], self.bitmap.container(index).iter())
    }
}

impl<R: Roaring + ?Sized> Iterator for Iter<'_, R> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        loop {
            if let Some((high, iter)) = &mut self.front {
                if let Some(low) = iter.next() {
                    self.remaining -= 1;
                    return Some(combine(*high, low));
                }
                self.front = None;
            }
            if self.front_index < self.back_index {
                self.front = Some(self.open(self.front_index));
                self.front_index += 1;
                continue;
            }
            let (high, iter) = self.back.as_mut()?;
            let low = iter.next()?;
            self.remaining -= 1;
            return Some(combine(*high, low));
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (remaining, usize::try_from(self.remaining).ok())
    }

    fn count(self) -> usize {
        self.remaining as usize
    }
}

impl<R: Roaring + ?Sized> DoubleEndedIterator for Iter<'_, R> {
    fn next_back(&mut self) -> Option<u32> {
        loop {
            if let Some((high, iter)) = &mut self.back {
                if let Some(low) = iter.next_back() {
                    self.remaining -= 1;
                    return Some(combine(*high, low));
                }
                self.back = None;
            }
            if self.front_index < self.back_index {
                self.back_index -= 1;
                self.back = Some(self.open(self.back_index));
                continue;
            }
            let (high, iter) = self.front.as_mut()?;
            let low = iter.next_back()?;
            self.remaining -= 1;
            return Some(combine(*high, low));
        }
    }
}

impl<R: Roaring + ?Sized> FusedIterator for Iter<'_, R> {}

/// Where a [Cursor] currently points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Position {
    /// Before the smallest value.
    BeforeFirst,
    /// At value `low` of the container at `index`.
    At { index: usize, low: u16 },
    /// After the largest value.
    PastLast,
}

/// A bidirectional, seekable position within a bitmap.
///
/// A new cursor points at the smallest value (or past the end, if the bitmap is empty). Moving
/// past either end leaves the cursor in a terminal state that reports no value; moving back in
/// the other direction resumes from the nearest end.
///
/// # Example
///
/// ```
/// use commonware_roaring::{Roaring, RoaringBitmap};
///
/// let bitmap = RoaringBitmap::from_sorted(&[1, 5, 100_000]);
/// let mut cursor = bitmap.cursor();
/// assert_eq!(cursor.value(), Some(1));
///
/// assert!(cursor.seek(6));
/// assert_eq!(cursor.value(), Some(100_000));
///
/// assert!(!cursor.advance());
/// assert_eq!(cursor.value(), None);
///
/// assert!(cursor.previous());
/// assert_eq!(cursor.value(), Some(100_000));
/// ```
pub struct Cursor<'a, R: Roaring + ?Sized> {
    bitmap: &'a R,
    position: Position,
}

impl<R: Roaring + ?Sized> Clone for Cursor<'_, R> {
    fn clone(&self) -> Self {
        Self {
            bitmap: self.bitmap,
            position: self.position,
        }
    }
}

impl<'a, R: Roaring + ?Sized> Cursor<'a, R> {
    pub(crate) fn new(bitmap: &'a R) -> Self {
        let mut cursor = Self {
            bitmap,
            position: Position::BeforeFirst,
        };
        cursor.position = cursor.first_from(0);
        cursor
    }

    /// Returns the first value in or after the container at `index`.
    fn first_from(&self, index: usize) -> Position {
        (index..self.bitmap.container_count())
            .find_map(|index| {
                let low = self.bitmap.container(index).min()?;
                Some(Position::At { index, low })
            })
            .unwrap_or(Position::PastLast)
    }

    /// Returns the last value in or before the container at `index - 1`.
    fn last_before(&self, index: usize) -> Position {
        (0..index)
            .rev()
            .find_map(|index| {
                let low = self.bitmap.container(index).max()?;
                Some(Position::At { index, low })
            })
            .unwrap_or(Position::BeforeFirst)
    }

    /// Returns the current value, or `None` if the cursor is past either end.
    pub fn value(&self) -> Option<u32> {
        match self.position {
            Position::At { index, low } => Some(combine(self.bitmap.keys()[index], low)),
            _ => None,
        }
    }

    /// Returns true if the cursor points at a value.
    #[inline]
    pub fn has_value(&self) -> bool {
        matches!(self.position, Position::At { .. })
    }

    /// Moves to the next value in ascending order. Returns false once the end is passed.
    pub fn advance(&mut self) -> bool {
        self.position = match self.position {
            Position::BeforeFirst => self.first_from(0),
            Position::At { index, low } => {
                let next = low
                    .checked_add(1)
                    .and_then(|from| self.bitmap.container(index).successor(from));
                match next {
                    Some(low) => Position::At { index, low },
                    None => self.first_from(index + 1),
                }
            }
            Position::PastLast => Position::PastLast,
        };
        self.has_value()
    }

    /// Moves to the previous value. Returns false once the start is passed.
    pub fn previous(&mut self) -> bool {
        self.position = match self.position {
            Position::BeforeFirst => Position::BeforeFirst,
            Position::At { index, low } => {
                let prev = low
                    .checked_sub(1)
                    .and_then(|from| self.bitmap.container(index).predecessor(from));
                match prev {
                    Some(low) => Position::At { index, low },
                    None => self.last_before(index),
                }
            }
            Position::PastLast => self.last_before(self.bitmap.container_count()),
        };
        self.has_value()
    }

    /// Moves to the smallest value `>= target`. Returns false if there is none.
    pub fn seek(&mut self, target: u32) -> bool {
        let (high, low) = split(target);
        let keys = self.bitmap.keys();
        let index = keys.partition_point(|&k| k < high);
        self.position = match keys.get(index) {
            Some(&key) if key == high => match self.bitmap.container(index).successor(low) {
                Some(low) => Position::At { index, low },
                None => self.first_from(index + 1),
            },
            _ => self.first_from(index),
        };
        self.has_value()
    }

    /// Copies values, starting at the current one, into `out` and moves past them.
    ///
    /// Returns the number of values written, which is less than `out.len()` only when the end of
    /// the bitmap was reached.
    pub fn read(&mut self, out: &mut [u32]) -> usize {
        let mut written = 0;
        while written < out.len() {
            let Position::At { index, low } = self.position else {
                break;
            };
            let high = self.bitmap.keys()[index];
            match self.bitmap.container(index) {
                ContainerRef::Array(values) => {
                    let start = values.partition_point(|&v| v < low);
                    let take = (values.len() - start).min(out.len() - written);
                    for (slot, &value) in out[written..written + take]
                        .iter_mut()
                        .zip(&values[start..start + take])
                    {
                        *slot = combine(high, value);
                    }
                    written += take;
                    self.position = match values.get(start + take) {
                        Some(&low) => Position::At { index, low },
                        None => self.first_from(index + 1),
                    };
                }
                _ => {
                    out[written] = combine(high, low);
                    written += 1;
                    self.advance();
                }
            }
        }
        written
    }
}
