//! Set operations between containers of any representation.
//!
//! Every operation takes two [ContainerRef]s and returns an owned [Container] whose
//! representation depends on the inputs and on the result cardinality:
//!
//! | Operation | Array, Array           | Array, Bitmap | Bitmap, Bitmap      | with Run          |
//! |-----------|------------------------|---------------|---------------------|-------------------|
//! | or        | Array if sum <= 4096   | Bitmap        | Bitmap              | smallest of three |
//! | and       | Array                  | Array         | by popcount         | see below         |
//! | andnot    | Array                  | by left side  | by popcount         | see below         |
//! | xor       | Array if sum <= 4096   | by popcount   | by popcount         | smallest of three |
//!
//! Whenever a result is produced from a bitmap it is demoted to an array if its cardinality is at
//! most [MAX_CARDINALITY]. Whenever a result is produced from a run merge it is normalized with
//! [Container::from_runs].
//!
//! An array paired with a bitmap is densified into a temporary bitmap, and combined word by word,
//! only when it holds more than [BITMAP_CROSSOVER] values. Smaller arrays are tested (or set)
//! value by value against the bitmap's words. In [xor] against runs, an array with fewer than
//! [DENSIFY_THRESHOLD] values is merged as runs and a larger one is combined with a temporary
//! bitmap (or array) built from the runs.
//!
//! The `*_len` and `intersects` variants never allocate, so they always test arrays value by value.

use super::{
    array, bitmap, run, Array, Bitmap, Container, ContainerRef as Ref, MAX_CARDINALITY, WORDS,
};

/// Arrays with fewer values than this are merged with run containers directly.
pub const DENSIFY_THRESHOLD: usize = 32;

/// Arrays with more values than this are densified before being combined with a bitmap.
pub const BITMAP_CROSSOVER: usize = WORDS;

/// Sets the bits of `other` in `target`.
fn or_into(target: &mut Bitmap, other: Ref<'_>) {
    match other {
        Ref::Array(values) if values.len() > BITMAP_CROSSOVER => {
            target.apply(Bitmap::from_array(values).words(), |a, b| a | b)
        }
        Ref::Array(values) => {
            for &value in values {
                target.insert(value);
            }
        }
        Ref::Bitmap { words, .. } => target.apply(words, |a, b| a | b),
        Ref::Run(runs) => {
            for run in runs {
                target.insert_range(run.start, run.end());
            }
        }
    }
}

/// Clears the bits of `other` in `target`.
fn andnot_into(target: &mut Bitmap, other: Ref<'_>) {
    match other {
        Ref::Array(values) if values.len() > BITMAP_CROSSOVER => {
            target.apply(Bitmap::from_array(values).words(), |a, b| a & !b)
        }
        Ref::Array(values) => {
            for &value in values {
                target.remove(value);
            }
        }
        Ref::Bitmap { words, .. } => target.apply(words, |a, b| a & !b),
        Ref::Run(runs) => {
            for run in runs {
                target.remove_range(run.start, run.end());
            }
        }
    }
}

/// Flips the bits of `other` in `target`.
fn xor_into(target: &mut Bitmap, other: Ref<'_>) {
    match other {
        Ref::Array(values) if values.len() > BITMAP_CROSSOVER => {
            target.apply(Bitmap::from_array(values).words(), |a, b| a ^ b)
        }
        Ref::Array(values) => {
            for &value in values {
                target.toggle(value);
            }
        }
        Ref::Bitmap { words, .. } => target.apply(words, |a, b| a ^ b),
        Ref::Run(runs) => {
            for run in runs {
                target.flip_range(run.start, run.end());
            }
        }
    }
}

/// Returns the values of `values` whose membership in `words` equals `keep`.
fn filter_by_bitmap(values: &[u16], words: &[u64; WORDS], keep: bool) -> Array {
    Array::from_sorted_vec(
        values
            .iter()
            .copied()
            .filter(|&v| bitmap::contains(words, v) == keep)
            .collect(),
    )
}

/// Returns the intersection of two bitmaps, gathering values directly when sparse.
fn and_bitmaps(a: &[u64; WORDS], b: &[u64; WORDS]) -> Container {
    let len: usize = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x & y).count_ones() as usize)
        .sum();
    if len > MAX_CARDINALITY {
        let mut result = Bitmap::copied(a, 0);
        result.apply(b, |x, y| x & y);
        return Container::Bitmap(result);
    }

    let mut values = Vec::with_capacity(len);
    for (index, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let mut word = x & y;
        while word != 0 {
            values.push(((index << 6) as u32 + word.trailing_zeros()) as u16);
            word &= word - 1;
        }
    }
    Container::Array(Array::from_sorted_vec(values))
}

/// Computes `a | b`.
pub fn or(a: Ref<'_>, b: Ref<'_>) -> Container {
    match (a, b) {
        (Ref::Array(x), Ref::Array(y)) => {
            if x.len() + y.len() <= MAX_CARDINALITY {
                return Container::Array(Array::from_sorted_vec(array::union(x, y)));
            }
            let mut result = Bitmap::from_array(x);
            or_into(&mut result, b);
            Container::from_bitmap(result)
        }
        (Ref::Bitmap { words, len }, other) | (other, Ref::Bitmap { words, len }) => {
            if other.is_full() {
                return Container::full();
            }
            let mut result = Bitmap::copied(words, len);
            or_into(&mut result, other);
            Container::from_bitmap(result)
        }
        (Ref::Run(x), Ref::Run(y)) => {
            if run::is_full(x) || run::is_full(y) {
                return Container::full();
            }
            Container::from_runs(run::union(x, y))
        }
        (Ref::Array(values), Ref::Run(runs)) | (Ref::Run(runs), Ref::Array(values)) => {
            if run::is_full(runs) {
                return Container::full();
            }
            Container::from_runs(run::union(&run::from_array(values), runs))
        }
    }
}

/// Computes `a & b`.
pub fn and(a: Ref<'_>, b: Ref<'_>) -> Container {
    match (a, b) {
        (Ref::Array(x), Ref::Array(y)) => {
            Container::Array(Array::from_sorted_vec(array::intersection(x, y)))
        }
        (Ref::Array(values), Ref::Bitmap { words, .. })
        | (Ref::Bitmap { words, .. }, Ref::Array(values)) => {
            if values.len() > BITMAP_CROSSOVER {
                return and_bitmaps(Bitmap::from_array(values).words(), words);
            }
            Container::Array(filter_by_bitmap(values, words, true))
        }
        (Ref::Bitmap { words: x, .. }, Ref::Bitmap { words: y, .. }) => and_bitmaps(x, y),
        (Ref::Run(x), Ref::Run(y)) => {
            if run::is_full(x) {
                return b.to_container();
            }
            if run::is_full(y) {
                return a.to_container();
            }
            Container::from_runs(run::intersection(x, y))
        }
        (Ref::Array(values), Ref::Run(runs)) | (Ref::Run(runs), Ref::Array(values)) => {
            if run::is_full(runs) {
                return Container::Array(Array::from_sorted_vec(values.to_vec()));
            }
            Container::Array(Array::from_sorted_vec(run::filter_array(values, runs, true)))
        }
        (Ref::Bitmap { words, len }, Ref::Run(runs))
        | (Ref::Run(runs), Ref::Bitmap { words, len }) => {
            if run::is_full(runs) {
                return Container::from_bitmap(Bitmap::copied(words, len));
            }
            if run::cardinality(runs) <= MAX_CARDINALITY {
                let values = run::iter(runs)
                    .filter(|&v| bitmap::contains(words, v))
                    .collect();
                return Container::Array(Array::from_sorted_vec(values));
            }
            let mut result = Bitmap::copied(words, len);
            result.retain_runs(runs);
            Container::from_bitmap(result)
        }
    }
}

/// Computes `a - b`.
pub fn andnot(a: Ref<'_>, b: Ref<'_>) -> Container {
    match (a, b) {
        (Ref::Array(x), Ref::Array(y)) => {
            Container::Array(Array::from_sorted_vec(array::difference(x, y)))
        }
        (Ref::Array(values), Ref::Bitmap { words, .. }) => {
            if values.len() > BITMAP_CROSSOVER {
                let mut result = Bitmap::from_array(values);
                result.apply(words, |x, y| x & !y);
                return Container::from_bitmap(result);
            }
            Container::Array(filter_by_bitmap(values, words, false))
        }
        (Ref::Array(values), Ref::Run(runs)) => {
            Container::Array(Array::from_sorted_vec(run::filter_array(values, runs, false)))
        }
        (Ref::Bitmap { words, len }, other) => {
            let mut result = Bitmap::copied(words, len);
            andnot_into(&mut result, other);
            Container::from_bitmap(result)
        }
        (Ref::Run(x), Ref::Run(y)) => Container::from_runs(run::difference(x, y)),
        (Ref::Run(runs), Ref::Array(values)) => {
            Container::from_runs(run::difference(runs, &run::from_array(values)))
        }
        (Ref::Run(runs), Ref::Bitmap { words, .. }) => {
            if run::cardinality(runs) <= MAX_CARDINALITY {
                let values = run::iter(runs)
                    .filter(|&v| !bitmap::contains(words, v))
                    .collect();
                return Container::Array(Array::from_sorted_vec(values));
            }
            let mut result = Bitmap::from_runs(runs);
            result.apply(words, |x, y| x & !y);
            Container::from_bitmap(result)
        }
    }
}

/// Computes `a ^ b`.
pub fn xor(a: Ref<'_>, b: Ref<'_>) -> Container {
    match (a, b) {
        (Ref::Array(x), Ref::Array(y)) => {
            if x.len() + y.len() <= MAX_CARDINALITY {
                return Container::Array(Array::from_sorted_vec(array::symmetric_difference(
                    x, y,
                )));
            }
            let mut result = Bitmap::from_array(x);
            xor_into(&mut result, b);
            Container::from_bitmap(result)
        }
        (Ref::Bitmap { words, len }, other) | (other, Ref::Bitmap { words, len }) => {
            let mut result = Bitmap::copied(words, len);
            xor_into(&mut result, other);
            Container::from_bitmap(result)
        }
        (Ref::Run(x), Ref::Run(y)) => Container::from_runs(run::symmetric_difference(x, y)),
        (Ref::Array(values), Ref::Run(runs)) | (Ref::Run(runs), Ref::Array(values)) => {
            if values.len() < DENSIFY_THRESHOLD {
                return Container::from_runs(run::symmetric_difference(
                    &run::from_array(values),
                    runs,
                ));
            }
            if run::cardinality(runs) <= MAX_CARDINALITY {
                let expanded: Vec<u16> = run::iter(runs).collect();
                return xor(Ref::Array(&expanded), Ref::Array(values));
            }
            let mut result = Bitmap::from_runs(runs);
            xor_into(&mut result, Ref::Array(values));
            Container::from_bitmap(result)
        }
    }
}

/// Returns `|a & b|` without materializing the intersection.
pub fn and_len(a: Ref<'_>, b: Ref<'_>) -> usize {
    match (a, b) {
        (Ref::Array(x), Ref::Array(y)) => array::intersection_len(x, y),
        (Ref::Array(values), Ref::Bitmap { words, .. })
        | (Ref::Bitmap { words, .. }, Ref::Array(values)) => values
            .iter()
            .filter(|&&v| bitmap::contains(words, v))
            .count(),
        (Ref::Bitmap { words: x, .. }, Ref::Bitmap { words: y, .. }) => x
            .iter()
            .zip(y.iter())
            .map(|(a, b)| (a & b).count_ones() as usize)
            .sum(),
        (Ref::Run(x), Ref::Run(y)) => run::intersection_len(x, y),
        (Ref::Array(values), Ref::Run(runs)) | (Ref::Run(runs), Ref::Array(values)) => {
            run::array_intersection_len(values, runs)
        }
        (Ref::Bitmap { words, .. }, Ref::Run(runs))
        | (Ref::Run(runs), Ref::Bitmap { words, .. }) => runs
            .iter()
            .map(|r| bitmap::range_cardinality(words, r.start, r.end()))
            .sum(),
    }
}

/// Returns `|a | b|`.
#[inline]
pub fn or_len(a: Ref<'_>, b: Ref<'_>) -> usize {
    a.len() + b.len() - and_len(a, b)
}

/// Returns `|a - b|`.
#[inline]
pub fn andnot_len(a: Ref<'_>, b: Ref<'_>) -> usize {
    a.len() - and_len(a, b)
}

/// Returns `|a ^ b|`.
#[inline]
pub fn xor_len(a: Ref<'_>, b: Ref<'_>) -> usize {
    a.len() + b.len() - 2 * and_len(a, b)
}

/// Returns whether `a` and `b` share at least one value.
pub fn intersects(a: Ref<'_>, b: Ref<'_>) -> bool {
    match (a, b) {
        (Ref::Array(x), Ref::Array(y)) => array::intersects(x, y),
        (Ref::Array(values), Ref::Bitmap { words, .. })
        | (Ref::Bitmap { words, .. }, Ref::Array(values)) => {
            values.iter().any(|&v| bitmap::contains(words, v))
        }
        (Ref::Bitmap { words: x, .. }, Ref::Bitmap { words: y, .. }) => {
            x.iter().zip(y.iter()).any(|(a, b)| a & b != 0)
        }
        (Ref::Run(x), Ref::Run(y)) => run::intersects(x, y),
        (Ref::Array(values), Ref::Run(runs)) | (Ref::Run(runs), Ref::Array(values)) => {
            run::array_intersects(values, runs)
        }
        (Ref::Bitmap { words, .. }, Ref::Run(runs))
        | (Ref::Run(runs), Ref::Bitmap { words, .. }) => runs
            .iter()
            .any(|r| bitmap::successor(words, r.start).is_some_and(|v| v <= r.end())),
    }
}

/// Returns whether every value of `a` is also in `b`.
#[inline]
pub fn is_subset(a: Ref<'_>, b: Ref<'_>) -> bool {
    let len = a.len();
    len <= b.len() && and_len(a, b) == len
}

/// Returns true if `array` should be densified before being combined with `other`.
fn densify(array: &Array, other: Ref<'_>) -> bool {
    array.len() > BITMAP_CROSSOVER && matches!(other, Ref::Bitmap { .. })
}

impl Container {
    /// Replaces `self` with `self | other`.
    pub fn or_assign(&mut self, other: Ref<'_>) {
        match self {
            Self::Bitmap(bitmap) if !other.is_full() => or_into(bitmap, other),
            _ => *self = or(self.view(), other),
        }
    }

    /// Replaces `self` with `self & other`.
    pub fn and_assign(&mut self, other: Ref<'_>) {
        match self {
            Self::Array(array) if !densify(array, other) => array.retain(|&v| other.contains(v)),
            Self::Bitmap(bitmap) if matches!(other, Ref::Bitmap { .. }) => {
                if let Ref::Bitmap { words, .. } = other {
                    bitmap.apply(words, |a, b| a & b);
                }
                self.demote();
            }
            _ => *self = and(self.view(), other),
        }
    }

    /// Replaces `self` with `self - other`.
    pub fn andnot_assign(&mut self, other: Ref<'_>) {
        match self {
            Self::Array(array) if !densify(array, other) => array.retain(|&v| !other.contains(v)),
            Self::Bitmap(bitmap) => {
                andnot_into(bitmap, other);
                self.demote();
            }
            _ => *self = andnot(self.view(), other),
        }
    }

    /// Replaces `self` with `self ^ other`.
    pub fn xor_assign(&mut self, other: Ref<'_>) {
        match self {
            Self::Bitmap(bitmap) => {
                xor_into(bitmap, other);
                self.demote();
            }
            _ => *self = xor(self.view(), other),
        }
    }
}
