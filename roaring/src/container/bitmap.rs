//! Bitmap container for dense data.
//!
//! Stores membership as 65536 bits packed into 1024 `u64` words (8 KiB), with a cached
//! cardinality so that [Bitmap::len] is constant time.
//!
//! ```text
//! value v  ->  word v >> 6, bit v & 63
//!
//! word:   0        1        2            1023
//!       [........][........][........] ... [........]
//!        0..=63    64..=127  128..=191      65472..=65535
//! ```
//!
//! The free functions operate on a borrowed word array so they apply equally to owned
//! containers and to bitmaps borrowed from a frozen buffer.

use super::{array::MAX_CARDINALITY, run::Interval};

/// Number of `u64` words in a bitmap container.
pub const WORDS: usize = 1024;

/// Size of a bitmap container in bytes.
pub const BYTES: usize = WORDS * 8;

/// Returns the mask covering bits `lo..=hi` of a single word.
#[inline]
const fn mask(lo: u32, hi: u32) -> u64 {
    (u64::MAX << lo) & (u64::MAX >> (63 - hi))
}

/// A container that stores dense `u16` values as a fixed-size bitset.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Bitmap {
    words: Box<[u64; WORDS]>,
    len: usize,
}

impl Default for Bitmap {
    fn default() -> Self {
        Self::new()
    }
}

impl Bitmap {
    /// Creates an empty bitmap container.
    pub fn new() -> Self {
        Self {
            words: Box::new([0; WORDS]),
            len: 0,
        }
    }

    /// Creates a bitmap container with every bit set.
    pub fn full() -> Self {
        Self {
            words: Box::new([u64::MAX; WORDS]),
            len: 1 << 16,
        }
    }

    /// Creates a bitmap container from raw words, computing the cardinality.
    pub fn from_words(words: Box<[u64; WORDS]>) -> Self {
        let len = cardinality(&words);
        Self { words, len }
    }

    /// Copies borrowed words whose cardinality is already known.
    #[inline]
    pub(crate) fn copied(words: &[u64; WORDS], len: usize) -> Self {
        Self {
            words: Box::new(*words),
            len,
        }
    }

    /// Creates a bitmap container from a sorted array of values.
    pub fn from_array(values: &[u16]) -> Self {
        let mut bitmap = Self::new();
        for &value in values {
            bitmap.words[value as usize >> 6] |= 1 << (value & 63);
        }
        bitmap.len = values.len();
        bitmap
    }

    /// Creates a bitmap container covering the given runs.
    pub fn from_runs(runs: &[Interval]) -> Self {
        let mut bitmap = Self::new();
        for run in runs {
            bitmap.insert_range(run.start, run.end());
        }
        bitmap
    }

    /// Returns the number of set bits.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns whether no bits are set.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns whether every bit is set.
    #[inline]
    pub const fn is_full(&self) -> bool {
        self.len == 1 << 16
    }

    /// Returns the underlying words.
    #[inline]
    pub fn words(&self) -> &[u64; WORDS] {
        &self.words
    }

    /// Checks if the given value is set.
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        contains(&self.words, value)
    }

    /// Sets a bit. Returns `true` if it was previously clear.
    #[inline]
    pub fn insert(&mut self, value: u16) -> bool {
        let word = &mut self.words[value as usize >> 6];
        let bit = 1u64 << (value & 63);
        let added = *word & bit == 0;
        *word |= bit;
        self.len += added as usize;
        added
    }

    /// Clears a bit. Returns `true` if it was previously set.
    #[inline]
    pub fn remove(&mut self, value: u16) -> bool {
        let word = &mut self.words[value as usize >> 6];
        let bit = 1u64 << (value & 63);
        let removed = *word & bit != 0;
        *word &= !bit;
        self.len -= removed as usize;
        removed
    }

    /// Flips a single bit.
    #[inline]
    pub fn toggle(&mut self, value: u16) {
        let word = &mut self.words[value as usize >> 6];
        let bit = 1u64 << (value & 63);
        if *word & bit == 0 {
            self.len += 1;
        } else {
            self.len -= 1;
        }
        *word ^= bit;
    }

    /// Sets every bit in `[start, end]`. Returns the number of bits newly set.
    pub fn insert_range(&mut self, start: u16, end: u16) -> usize {
        let mut added = 0;
        self.for_each_word(start, end, |word, m| {
            added += (m & !*word).count_ones() as usize;
            *word |= m;
        });
        self.len += added;
        added
    }

    /// Clears every bit in `[start, end]`. Returns the number of bits cleared.
    pub fn remove_range(&mut self, start: u16, end: u16) -> usize {
        let mut removed = 0;
        self.for_each_word(start, end, |word, m| {
            removed += (m & *word).count_ones() as usize;
            *word &= !m;
        });
        self.len -= removed;
        removed
    }

    /// Flips every bit in `[start, end]`.
    pub fn flip_range(&mut self, start: u16, end: u16) {
        let mut set = 0;
        let mut total = 0;
        self.for_each_word(start, end, |word, m| {
            set += (m & *word).count_ones() as usize;
            total += m.count_ones() as usize;
            *word ^= m;
        });
        self.len = self.len + total - 2 * set;
    }

    /// Applies `f` to every word overlapping `[start, end]` along with the mask of bits in range.
    #[inline]
    fn for_each_word(&mut self, start: u16, end: u16, mut f: impl FnMut(&mut u64, u64)) {
        if start > end {
            return;
        }
        let (first, last) = (start as usize >> 6, end as usize >> 6);
        let (lo, hi) = (start as u32 & 63, end as u32 & 63);
        if first == last {
            f(&mut self.words[first], mask(lo, hi));
            return;
        }
        f(&mut self.words[first], mask(lo, 63));
        for word in &mut self.words[first + 1..last] {
            f(word, u64::MAX);
        }
        f(&mut self.words[last], mask(0, hi));
    }

    /// Applies a word-wise binary operation against `other` in place.
    pub fn apply(&mut self, other: &[u64; WORDS], op: impl Fn(u64, u64) -> u64) {
        let mut len = 0;
        for (word, &rhs) in self.words.iter_mut().zip(other.iter()) {
            *word = op(*word, rhs);
            len += word.count_ones() as usize;
        }
        self.len = len;
    }

    /// Retains only the bits that fall within one of `runs`.
    pub fn retain_runs(&mut self, runs: &[Interval]) {
        let mut next = 0u32;
        for run in runs {
            if u32::from(run.start) > next {
                self.remove_range(next as u16, run.start - 1);
            }
            next = u32::from(run.end()) + 1;
        }
        if next <= u32::from(u16::MAX) {
            self.remove_range(next as u16, u16::MAX);
        }
    }

    /// Returns the sorted values of the set bits.
    pub fn to_array(&self) -> Vec<u16> {
        to_array(&self.words, self.len)
    }

    /// Returns whether this container would be better stored as an array.
    #[inline]
    pub const fn is_sparse(&self) -> bool {
        self.len <= MAX_CARDINALITY
    }
}

/// Counts the set bits across all words.
pub(crate) fn cardinality(words: &[u64; WORDS]) -> usize {
    words.iter().map(|w| w.count_ones() as usize).sum()
}

/// Counts the set bits in `[start, end]`.
pub(crate) fn range_cardinality(words: &[u64; WORDS], start: u16, end: u16) -> usize {
    let (first, last) = (start as usize >> 6, end as usize >> 6);
    let (lo, hi) = (start as u32 & 63, end as u32 & 63);
    if first == last {
        return (words[first] & mask(lo, hi)).count_ones() as usize;
    }
    let mut count = (words[first] & mask(lo, 63)).count_ones() as usize;
    count += words[first + 1..last]
        .iter()
        .map(|w| w.count_ones() as usize)
        .sum::<usize>();
    count + (words[last] & mask(0, hi)).count_ones() as usize
}

#[inline]
pub(crate) fn contains(words: &[u64; WORDS], value: u16) -> bool {
    words[value as usize >> 6] & (1 << (value & 63)) != 0
}

/// Returns the number of set bits `<= value`.
pub(crate) fn rank(words: &[u64; WORDS], value: u16) -> usize {
    let index = value as usize >> 6;
    let below: usize = words[..index].iter().map(|w| w.count_ones() as usize).sum();
    below + (words[index] & mask(0, value as u32 & 63)).count_ones() as usize
}

/// Returns the value of the set bit at position `pos` (zero-based).
pub(crate) fn select(words: &[u64; WORDS], pos: usize) -> Option<u16> {
    let mut remaining = pos;
    for (index, &word) in words.iter().enumerate() {
        let count = word.count_ones() as usize;
        if remaining < count {
            let mut word = word;
            for _ in 0..remaining {
                word &= word - 1;
            }
            return Some(((index << 6) as u32 + word.trailing_zeros()) as u16);
        }
        remaining -= count;
    }
    None
}

/// Returns the smallest set bit `>= from`.
pub(crate) fn successor(words: &[u64; WORDS], from: u16) -> Option<u16> {
    let mut index = from as usize >> 6;
    let mut word = words[index] & (u64::MAX << (from & 63));
    loop {
        if word != 0 {
            return Some(((index << 6) as u32 + word.trailing_zeros()) as u16);
        }
        index += 1;
        if index == WORDS {
            return None;
        }
        word = words[index];
    }
}

/// Returns the largest set bit `<= from`.
pub(crate) fn predecessor(words: &[u64; WORDS], from: u16) -> Option<u16> {
    let mut index = from as usize >> 6;
    let mut word = words[index] & mask(0, from as u32 & 63);
    loop {
        if word != 0 {
            return Some(((index << 6) as u32 + 63 - word.leading_zeros()) as u16);
        }
        if index == 0 {
            return None;
        }
        index -= 1;
        word = words[index];
    }
}

/// Returns the number of maximal runs of set bits.
pub(crate) fn number_of_runs(words: &[u64; WORDS]) -> usize {
    let mut runs = 0;
    for pair in words.windows(2) {
        let (word, next) = (pair[0], pair[1]);
        runs += (!word & (word << 1)).count_ones() as usize;
        runs += ((word >> 63) & !next & 1) as usize;
    }
    let last = words[WORDS - 1];
    runs += (!last & (last << 1)).count_ones() as usize;
    runs + (last >> 63) as usize
}

/// Returns the maximal runs of set bits.
pub(crate) fn to_runs(words: &[u64; WORDS]) -> Vec<Interval> {
    let mut runs = Vec::new();
    let mut index = 0;
    let mut word = words[0];
    loop {
        while word == 0 && index < WORDS - 1 {
            index += 1;
            word = words[index];
        }
        if word == 0 {
            return runs;
        }
        let start = (index << 6) as u32 + word.trailing_zeros();

        // Fill in everything below the run start, then find the first zero above it
        let mut filled = word | (word - 1);
        while filled == u64::MAX && index < WORDS - 1 {
            index += 1;
            filled = words[index];
        }
        if filled == u64::MAX {
            runs.push(Interval::from_bounds(start as u16, u16::MAX));
            return runs;
        }
        let end = (index << 6) as u32 + (!filled).trailing_zeros();
        runs.push(Interval::from_bounds(start as u16, (end - 1) as u16));
        word = filled & (filled + 1);
    }
}

/// Returns the sorted values of the set bits.
pub(crate) fn to_array(words: &[u64; WORDS], len: usize) -> Vec<u16> {
    let mut values = Vec::with_capacity(len);
    for (index, &word) in words.iter().enumerate() {
        let mut word = word;
        while word != 0 {
            values.push(((index << 6) as u32 + word.trailing_zeros()) as u16);
            word &= word - 1;
        }
    }
    values
}

/// Iterator over the set bits of a bitmap container, usable from both ends.
#[derive(Clone, Debug)]
pub struct BitmapIter<'a> {
    words: &'a [u64; WORDS],
    front: usize,
    front_word: u64,
    back: usize,
    back_word: u64,
}

impl<'a> BitmapIter<'a> {
    pub(crate) fn new(words: &'a [u64; WORDS]) -> Self {
        Self {
            words,
            front: 0,
            front_word: words[0],
            back: WORDS - 1,
            back_word: words[WORDS - 1],
        }
    }
}

impl Iterator for BitmapIter<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        loop {
            if self.front_word != 0 {
                let bit = self.front_word.trailing_zeros();
                self.front_word &= self.front_word - 1;
                if self.front == self.back {
                    self.back_word = self.front_word;
                }
                return Some(((self.front << 6) as u32 + bit) as u16);
            }
            if self.front >= self.back {
                return None;
            }
            self.front += 1;
            self.front_word = if self.front == self.back {
                self.back_word
            } else {
                self.words[self.front]
            };
        }
    }
}

impl DoubleEndedIterator for BitmapIter<'_> {
    fn next_back(&mut self) -> Option<u16> {
        loop {
            if self.back_word != 0 {
                let bit = 63 - self.back_word.leading_zeros();
                self.back_word &= !(1 << bit);
                if self.front == self.back {
                    self.front_word = self.back_word;
                }
                return Some(((self.back << 6) as u32 + bit) as u16);
            }
            if self.back <= self.front {
                return None;
            }
            self.back -= 1;
            self.back_word = if self.back == self.front {
                self.front_word
            } else {
                self.words[self.back]
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove() {
        let mut bitmap = Bitmap::new();
        assert!(bitmap.insert(0));
        assert!(bitmap.insert(u16::MAX));
        assert!(!bitmap.insert(0));
        assert_eq!(bitmap.len(), 2);
        assert!(bitmap.contains(u16::MAX));

        assert!(bitmap.remove(0));
        assert!(!bitmap.remove(0));
        assert_eq!(bitmap.len(), 1);
    }

    #[test]
    fn test_ranges() {
        let mut bitmap = Bitmap::new();
        assert_eq!(bitmap.insert_range(10, 200), 191);
        assert_eq!(bitmap.insert_range(100, 300), 100);
        assert_eq!(bitmap.len(), 291);
        assert_eq!(range_cardinality(bitmap.words(), 0, 63), 54);

        assert_eq!(bitmap.remove_range(64, 127), 64);
        assert_eq!(bitmap.len(), 227);

        bitmap.flip_range(0, 9);
        assert_eq!(bitmap.len(), 237);
        assert!(bitmap.contains(0));
        assert!(!bitmap.contains(64));

        assert_eq!(bitmap.len(), cardinality(bitmap.words()));
    }

    #[test]
    fn test_full() {
        let mut bitmap = Bitmap::new();
        assert_eq!(bitmap.insert_range(0, u16::MAX), 1 << 16);
        assert!(bitmap.is_full());
        assert_eq!(bitmap, Bitmap::full());
        assert_eq!(number_of_runs(bitmap.words()), 1);
        assert_eq!(to_runs(bitmap.words()), vec![Interval::from_bounds(0, u16::MAX)]);
    }

    #[test]
    fn test_rank_select() {
        let bitmap = Bitmap::from_array(&[3, 64, 65, 1000, u16::MAX]);
        assert_eq!(rank(bitmap.words(), 2), 0);
        assert_eq!(rank(bitmap.words(), 3), 1);
        assert_eq!(rank(bitmap.words(), 64), 2);
        assert_eq!(rank(bitmap.words(), u16::MAX), 5);

        assert_eq!(select(bitmap.words(), 0), Some(3));
        assert_eq!(select(bitmap.words(), 2), Some(65));
        assert_eq!(select(bitmap.words(), 4), Some(u16::MAX));
        assert_eq!(select(bitmap.words(), 5), None);
    }

    #[test]
    fn test_successor_predecessor() {
        let bitmap = Bitmap::from_array(&[3, 64, 1000]);
        assert_eq!(successor(bitmap.words(), 0), Some(3));
        assert_eq!(successor(bitmap.words(), 4), Some(64));
        assert_eq!(successor(bitmap.words(), 1001), None);
        assert_eq!(predecessor(bitmap.words(), 999), Some(64));
        assert_eq!(predecessor(bitmap.words(), 2), None);
        assert_eq!(predecessor(bitmap.words(), u16::MAX), Some(1000));
    }

    #[test]
    fn test_runs() {
        let mut bitmap = Bitmap::new();
        bitmap.insert_range(0, 5);
        bitmap.insert_range(63, 64);
        bitmap.insert_range(127, 200);
        bitmap.insert(u16::MAX);

        assert_eq!(number_of_runs(bitmap.words()), 4);
        assert_eq!(
            to_runs(bitmap.words()),
            vec![
                Interval::from_bounds(0, 5),
                Interval::from_bounds(63, 64),
                Interval::from_bounds(127, 200),
                Interval::from_bounds(u16::MAX, u16::MAX),
            ]
        );
        assert_eq!(Bitmap::from_runs(&to_runs(bitmap.words())), bitmap);
    }

    #[test]
    fn test_retain_runs() {
        let mut bitmap = Bitmap::new();
        bitmap.insert_range(0, 1000);
        bitmap.retain_runs(&[Interval::from_bounds(10, 20), Interval::from_bounds(900, 2000)]);
        assert_eq!(bitmap.len(), 11 + 101);
        assert!(!bitmap.contains(9));
        assert!(bitmap.contains(10));
        assert!(!bitmap.contains(21));
        assert!(bitmap.contains(1000));
    }

    #[test]
    fn test_iter_both_ends() {
        let values = [0, 1, 63, 64, 500, 65000, u16::MAX];
        let bitmap = Bitmap::from_array(&values);

        let forward: Vec<u16> = BitmapIter::new(bitmap.words()).collect();
        assert_eq!(forward, values);

        let backward: Vec<u16> = BitmapIter::new(bitmap.words()).rev().collect();
        let mut expected = values.to_vec();
        expected.reverse();
        assert_eq!(backward, expected);

        // Meet in the middle without yielding any value twice
        let mut iter = BitmapIter::new(bitmap.words());
        assert_eq!(iter.next(), Some(0));
        assert_eq!(iter.next_back(), Some(u16::MAX));
        assert_eq!(iter.next_back(), Some(65000));
        assert_eq!(iter.next(), Some(1));
        assert_eq!(iter.next(), Some(63));
        assert_eq!(iter.next(), Some(64));
        assert_eq!(iter.next_back(), Some(500));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next_back(), None);
    }

    #[test]
    fn test_iter_single_word() {
        let bitmap = Bitmap::from_array(&[1, 2, 3]);
        let mut iter = BitmapIter::new(bitmap.words());
        assert_eq!(iter.next_back(), Some(3));
        assert_eq!(iter.next(), Some(1));
        assert_eq!(iter.next_back(), Some(2));
        assert_eq!(iter.next(), None);
    }
}
