//! Whole-bitmap algebra.
//!
//! Every binary operation is a merge walk over the two key indices. Keys present on both sides
//! are combined with the container algebra in [crate::container::ops]; keys present on one side
//! only are copied or skipped depending on the operation. Skipped stretches are crossed by
//! galloping, so intersecting a small bitmap with a large one costs roughly
//! `O(small * log(large))` key comparisons.

use crate::{
    container::{ops as container, Container, ContainerRef},
    Roaring, RoaringBitmap,
};
use core::{
    cmp::{Ordering, Reverse},
    mem,
};
use std::collections::BinaryHeap;

/// A binary set operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    And,
    Or,
    AndNot,
    Xor,
}

impl Op {
    /// Whether keys found only on the left side survive.
    #[inline]
    const fn keeps_left(self) -> bool {
        !matches!(self, Self::And)
    }

    /// Whether keys found only on the right side survive.
    #[inline]
    const fn keeps_right(self) -> bool {
        matches!(self, Self::Or | Self::Xor)
    }

    fn apply(self, a: ContainerRef<'_>, b: ContainerRef<'_>) -> Container {
        match self {
            Self::And => container::and(a, b),
            Self::Or => container::or(a, b),
            Self::AndNot => container::andnot(a, b),
            Self::Xor => container::xor(a, b),
        }
    }

    fn assign(self, target: &mut Container, other: ContainerRef<'_>) {
        match self {
            Self::And => target.and_assign(other),
            Self::Or => target.or_assign(other),
            Self::AndNot => target.andnot_assign(other),
            Self::Xor => target.xor_assign(other),
        }
    }
}

/// Returns the first index `>= from` whose key is `>= target` (or `keys.len()`).
///
/// Probes at exponentially growing distances before binary searching the final window.
pub(crate) fn advance_until(keys: &[u16], from: usize, target: u16) -> usize {
    let len = keys.len();
    if from >= len || keys[from] >= target {
        return from.min(len);
    }
    let mut span = 1;
    while from + span < len && keys[from + span] < target {
        span *= 2;
    }
    let lo = from + span / 2;
    let hi = (from + span + 1).min(len);
    lo + keys[lo..hi].partition_point(|&k| k < target)
}

fn merge<A, B>(a: &A, b: &B, op: Op) -> RoaringBitmap
where
    A: Roaring + ?Sized,
    B: Roaring + ?Sized,
{
    let (left, right) = (a.keys(), b.keys());
    let capacity = match op {
        Op::And => left.len().min(right.len()),
        Op::AndNot => left.len(),
        Op::Or | Op::Xor => left.len() + right.len(),
    };
    let mut result = RoaringBitmap::with_capacity(capacity);

    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            Ordering::Less if op.keeps_left() => {
                result.push(left[i], a.container(i).to_container());
                i += 1;
            }
            Ordering::Less => i = advance_until(left, i, right[j]),
            Ordering::Greater if op.keeps_right() => {
                result.push(right[j], b.container(j).to_container());
                j += 1;
            }
            Ordering::Greater => j = advance_until(right, j, left[i]),
            Ordering::Equal => {
                let container = op.apply(a.container(i), b.container(j));
                if !container.is_empty() {
                    result.push(left[i], container);
                }
                i += 1;
                j += 1;
            }
        }
    }
    if op.keeps_left() {
        for i in i..left.len() {
            result.push(left[i], a.container(i).to_container());
        }
    }
    if op.keeps_right() {
        for j in j..right.len() {
            result.push(right[j], b.container(j).to_container());
        }
    }
    result
}

/// Calls `f` with every pair of containers sharing a key, stopping early when `f` returns false.
fn for_each_shared<A, B>(
    a: &A,
    b: &B,
    mut f: impl FnMut(ContainerRef<'_>, ContainerRef<'_>) -> bool,
) where
    A: Roaring + ?Sized,
    B: Roaring + ?Sized,
{
    let (left, right) = (a.keys(), b.keys());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            Ordering::Less => i = advance_until(left, i, right[j]),
            Ordering::Greater => j = advance_until(right, j, left[i]),
            Ordering::Equal => {
                if !f(a.container(i), b.container(j)) {
                    return;
                }
                i += 1;
                j += 1;
            }
        }
    }
}

pub(crate) fn and<A: Roaring + ?Sized, B: Roaring + ?Sized>(a: &A, b: &B) -> RoaringBitmap {
    merge(a, b, Op::And)
}

pub(crate) fn or<A: Roaring + ?Sized, B: Roaring + ?Sized>(a: &A, b: &B) -> RoaringBitmap {
    merge(a, b, Op::Or)
}

pub(crate) fn andnot<A: Roaring + ?Sized, B: Roaring + ?Sized>(a: &A, b: &B) -> RoaringBitmap {
    merge(a, b, Op::AndNot)
}

pub(crate) fn xor<A: Roaring + ?Sized, B: Roaring + ?Sized>(a: &A, b: &B) -> RoaringBitmap {
    merge(a, b, Op::Xor)
}

pub(crate) fn and_cardinality<A: Roaring + ?Sized, B: Roaring + ?Sized>(a: &A, b: &B) -> u64 {
    let mut total = 0;
    for_each_shared(a, b, |x, y| {
        total += container::and_len(x, y) as u64;
        true
    });
    total
}

pub(crate) fn intersects<A: Roaring + ?Sized, B: Roaring + ?Sized>(a: &A, b: &B) -> bool {
    let mut found = false;
    for_each_shared(a, b, |x, y| {
        found = container::intersects(x, y);
        !found
    });
    found
}

pub(crate) fn is_subset<A: Roaring + ?Sized, B: Roaring + ?Sized>(a: &A, b: &B) -> bool {
    let (left, right) = (a.keys(), b.keys());
    if left.len() > right.len() {
        return false;
    }
    let mut j = 0;
    for (i, &key) in left.iter().enumerate() {
        j = advance_until(right, j, key);
        if right.get(j) != Some(&key) || !container::is_subset(a.container(i), b.container(j)) {
            return false;
        }
        j += 1;
    }
    true
}

impl RoaringBitmap {
    /// Rebuilds `self` as `self <op> other`, reusing containers of `self` in place.
    fn merge_assign<R: Roaring + ?Sized>(&mut self, other: &R, op: Op) {
        let right = other.keys();
        let keys = mem::take(&mut self.keys);
        let containers = mem::take(&mut self.containers);
        let capacity = if op.keeps_right() {
            keys.len() + right.len()
        } else {
            keys.len()
        };
        self.keys.reserve(capacity);
        self.containers.reserve(capacity);

        let mut j = 0;
        for (key, mut container) in keys.into_iter().zip(containers) {
            if op.keeps_right() {
                while j < right.len() && right[j] < key {
                    self.push(right[j], other.container(j).to_container());
                    j += 1;
                }
            } else {
                j = advance_until(right, j, key);
            }
            if right.get(j) == Some(&key) {
                op.assign(&mut container, other.container(j));
                j += 1;
            } else if !op.keeps_left() {
                continue;
            }
            if !container.is_empty() {
                self.push(key, container);
            }
        }
        if op.keeps_right() {
            for j in j..right.len() {
                self.push(right[j], other.container(j).to_container());
            }
        }
    }

    /// Replaces `self` with `self & other`.
    pub fn and_inplace(&mut self, other: &impl Roaring) {
        self.merge_assign(other, Op::And);
    }

    /// Replaces `self` with `self | other`.
    pub fn or_inplace(&mut self, other: &impl Roaring) {
        self.merge_assign(other, Op::Or);
    }

    /// Replaces `self` with `self - other`.
    pub fn andnot_inplace(&mut self, other: &impl Roaring) {
        self.merge_assign(other, Op::AndNot);
    }

    /// Replaces `self` with `self ^ other`.
    pub fn xor_inplace(&mut self, other: &impl Roaring) {
        self.merge_assign(other, Op::Xor);
    }

    /// Returns the union of all `bitmaps`, folding them left to right.
    ///
    /// Returns an empty bitmap if there are no inputs. The result never aliases an input.
    pub fn union_many<'a, R: Roaring + 'a>(bitmaps: impl IntoIterator<Item = &'a R>) -> Self {
        let mut result = Self::new();
        for bitmap in bitmaps {
            result.or_inplace(bitmap);
        }
        result
    }

    /// Returns the union of all `bitmaps`, always merging the two smallest operands first.
    ///
    /// Produces the same set as [RoaringBitmap::union_many] but does less work when input sizes
    /// are skewed.
    pub fn union_many_heap<'a, R: Roaring + 'a>(bitmaps: impl IntoIterator<Item = &'a R>) -> Self {
        enum Operand<'a, R> {
            Borrowed(&'a R),
            Owned(RoaringBitmap),
        }

        let mut operands: Vec<Option<Operand<'a, R>>> = Vec::new();
        let mut heap = BinaryHeap::new();
        for bitmap in bitmaps {
            heap.push(Reverse((bitmap.len(), operands.len())));
            operands.push(Some(Operand::Borrowed(bitmap)));
        }

        while heap.len() > 1 {
            let (Some(Reverse((_, a))), Some(Reverse((_, b)))) = (heap.pop(), heap.pop()) else {
                break;
            };
            let (Some(a), Some(b)) = (operands[a].take(), operands[b].take()) else {
                break;
            };
            let merged = match (a, b) {
                (Operand::Owned(mut a), Operand::Owned(b)) => {
                    a.or_inplace(&b);
                    a
                }
                (Operand::Owned(mut a), Operand::Borrowed(b))
                | (Operand::Borrowed(b), Operand::Owned(mut a)) => {
                    a.or_inplace(b);
                    a
                }
                (Operand::Borrowed(a), Operand::Borrowed(b)) => a.or(b),
            };
            heap.push(Reverse((merged.len(), operands.len())));
            operands.push(Some(Operand::Owned(merged)));
        }

        match heap.pop().and_then(|Reverse((_, index))| operands[index].take()) {
            Some(Operand::Owned(bitmap)) => bitmap,
            Some(Operand::Borrowed(bitmap)) => bitmap.to_bitmap(),
            None => Self::new(),
        }
    }

    /// Returns the intersection of all `bitmaps`, starting from the smallest.
    ///
    /// Returns an empty bitmap if there are no inputs. The result never aliases an input.
    pub fn intersection_many<'a, R: Roaring + 'a>(
        bitmaps: impl IntoIterator<Item = &'a R>,
    ) -> Self {
        let mut sorted: Vec<&R> = bitmaps.into_iter().collect();
        sorted.sort_by_cached_key(|bitmap| bitmap.len());
        let Some((first, rest)) = sorted.split_first() else {
            return Self::new();
        };
        let mut result = first.to_bitmap();
        for bitmap in rest {
            if result.is_empty() {
                break;
            }
            result.and_inplace(*bitmap);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::BTreeSet;
    use test_case::test_case;

    /// Builds a bitmap mixing sparse values, dense blocks and long runs across a few keys.
    fn random_bitmap(rng: &mut StdRng) -> (RoaringBitmap, BTreeSet<u32>) {
        let mut bitmap = RoaringBitmap::new();
        let mut model = BTreeSet::new();
        for _ in 0..rng.gen_range(0..4) {
            let key = rng.gen_range(0..8u32) << 16;
            match rng.gen_range(0..3) {
                0 => {
                    for _ in 0..rng.gen_range(1..200) {
                        let value = key | rng.gen_range(0..65_536);
                        bitmap.insert(value);
                        model.insert(value);
                    }
                }
                1 => {
                    for _ in 0..rng.gen_range(5_000..20_000) {
                        let value = key | rng.gen_range(0..65_536);
                        bitmap.insert(value);
                        model.insert(value);
                    }
                }
                _ => {
                    let start = key | rng.gen_range(0..60_000);
                    let end = start + rng.gen_range(1..20_000);
                    bitmap.insert_range(start..end);
                    model.extend(start..end);
                }
            }
        }
        if rng.gen_bool(0.5) {
            bitmap.run_optimize();
        }
        (bitmap, model)
    }

    fn assert_matches(bitmap: &RoaringBitmap, expected: &BTreeSet<u32>) {
        assert!(bitmap.keys.windows(2).all(|w| w[0] < w[1]));
        assert!(bitmap.containers.iter().all(|c| !c.is_empty()));
        assert_eq!(bitmap.len(), expected.len() as u64);
        assert!(bitmap.iter().eq(expected.iter().copied()));
    }

    #[test_case(&[], 0, 0; "empty")]
    #[test_case(&[1, 2, 3], 0, 0; "before all")]
    #[test_case(&[1, 2, 3], 0, 2; "exact")]
    #[test_case(&[1, 2, 3], 0, 4; "after all")]
    #[test_case(&[1, 3, 5, 7, 9, 11, 13, 15, 17], 2, 12; "galloping")]
    #[test_case(&[1, 3, 5, 7, 9, 11, 13, 15, 17], 8, 100; "last")]
    fn test_advance_until(keys: &[u16], from: usize, target: u16) {
        let expected = from + keys[from.min(keys.len())..].partition_point(|&k| k < target);
        assert_eq!(advance_until(keys, from, target), expected);
    }

    #[test]
    fn test_advance_until_exhaustive() {
        let keys: Vec<u16> = (0..100).map(|k| k * 3).collect();
        for from in 0..=keys.len() {
            for target in 0..310 {
                let expected = from + keys[from..].partition_point(|&k| k < target);
                assert_eq!(advance_until(&keys, from, target), expected);
            }
        }
    }

    #[test]
    fn test_algebra_against_model() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..40 {
            let (a, ma) = random_bitmap(&mut rng);
            let (b, mb) = random_bitmap(&mut rng);

            let and: BTreeSet<u32> = ma.intersection(&mb).copied().collect();
            let or: BTreeSet<u32> = ma.union(&mb).copied().collect();
            let andnot: BTreeSet<u32> = ma.difference(&mb).copied().collect();
            let xor: BTreeSet<u32> = ma.symmetric_difference(&mb).copied().collect();

            assert_matches(&a.and(&b), &and);
            assert_matches(&a.or(&b), &or);
            assert_matches(&a.andnot(&b), &andnot);
            assert_matches(&a.xor(&b), &xor);

            assert_eq!(a.and_cardinality(&b), and.len() as u64);
            assert_eq!(a.or_cardinality(&b), or.len() as u64);
            assert_eq!(a.andnot_cardinality(&b), andnot.len() as u64);
            assert_eq!(a.xor_cardinality(&b), xor.len() as u64);
            assert_eq!(a.intersects(&b), !and.is_empty());
            assert_eq!(a.is_subset(&b), ma.is_subset(&mb));

            let mut c = a.clone();
            c.and_inplace(&b);
            assert_matches(&c, &and);
            let mut c = a.clone();
            c.or_inplace(&b);
            assert_matches(&c, &or);
            let mut c = a.clone();
            c.andnot_inplace(&b);
            assert_matches(&c, &andnot);
            let mut c = a.clone();
            c.xor_inplace(&b);
            assert_matches(&c, &xor);
        }
    }

    #[test]
    fn test_algebra_identities() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            let (a, _) = random_bitmap(&mut rng);
            let (b, _) = random_bitmap(&mut rng);
            assert_eq!(a.and(&b).or(&a.andnot(&b)), a);
            assert_eq!(a.xor(&b), a.andnot(&b).or(&b.andnot(&a)));
            assert_eq!(a.or(&b).len() + a.and(&b).len(), a.len() + b.len());
            assert!(a.and(&b).is_subset(&a));
            assert!(a.is_subset(&a.or(&b)));
        }
    }

    #[test]
    fn test_n_ary() {
        let mut rng = StdRng::seed_from_u64(2);
        let inputs: Vec<(RoaringBitmap, BTreeSet<u32>)> =
            (0..7).map(|_| random_bitmap(&mut rng)).collect();
        let bitmaps: Vec<RoaringBitmap> = inputs.iter().map(|(b, _)| b.clone()).collect();

        let union: BTreeSet<u32> = inputs.iter().flat_map(|(_, m)| m.iter().copied()).collect();
        let sequential = RoaringBitmap::union_many(&bitmaps);
        let heap = RoaringBitmap::union_many_heap(&bitmaps);
        assert_matches(&sequential, &union);
        assert_matches(&heap, &union);

        let overlapping: Vec<RoaringBitmap> = (0..4u32)
            .map(|i| RoaringBitmap::from_range(i * 10..100_000, i + 1))
            .collect();
        let expected: BTreeSet<u32> = (30..100_000).filter(|v| v % 12 == 2).collect();
        assert_matches(&RoaringBitmap::intersection_many(&overlapping), &expected);
    }

    #[test]
    fn test_n_ary_edge_cases() {
        let none: Vec<RoaringBitmap> = Vec::new();
        assert!(RoaringBitmap::union_many(&none).is_empty());
        assert!(RoaringBitmap::union_many_heap(&none).is_empty());
        assert!(RoaringBitmap::intersection_many(&none).is_empty());

        let one = vec![RoaringBitmap::from_sorted(&[1, 2, 70_000])];
        let mut copy = RoaringBitmap::union_many_heap(&one);
        assert_eq!(copy, one[0]);
        copy.insert(5);
        assert_eq!(one[0].len(), 3);
        assert_eq!(RoaringBitmap::union_many(&one), one[0]);
        assert_eq!(RoaringBitmap::intersection_many(&one), one[0]);

        let disjoint = vec![
            RoaringBitmap::from_sorted(&[1]),
            RoaringBitmap::from_sorted(&[2]),
            RoaringBitmap::from_sorted(&[1, 2]),
        ];
        assert!(RoaringBitmap::intersection_many(&disjoint).is_empty());
    }

    #[test]
    fn test_galloping_skips_containers() {
        let sparse = RoaringBitmap::from_sorted(&[5 << 16, 900 << 16 | 7]);
        let wide: RoaringBitmap = (0..1_000u32).map(|k| k << 16 | 7).collect();
        assert_eq!(sparse.and(&wide).to_vec(), vec![900 << 16 | 7]);
        assert_eq!(wide.and(&sparse).to_vec(), vec![900 << 16 | 7]);
        assert_eq!(sparse.and_cardinality(&wide), 1);
        assert_eq!(sparse.andnot(&wide).to_vec(), vec![5 << 16]);
        assert!(!sparse.is_subset(&wide));
        assert!(RoaringBitmap::from_sorted(&[7, 3 << 16 | 7]).is_subset(&wide));
    }
}
