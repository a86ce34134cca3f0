#![no_main]

use arbitrary::Arbitrary;
use commonware_roaring::{FrozenBuffer, Roaring, RoaringBitmap};
use libfuzzer_sys::fuzz_target;
use std::collections::BTreeSet;

const MAX_RANGE: u32 = 1 << 18;

#[derive(Arbitrary, Debug)]
enum Operation {
    Insert(u32),
    Remove(u32),
    InsertRange(u32, u32),
    RemoveRange(u32, u32),
    Flip(u32, u32),
    And(RoaringBitmap),
    Or(RoaringBitmap),
    AndNot(RoaringBitmap),
    Xor(RoaringBitmap),
    RunOptimize,
    RemoveRunCompression,
    PopMin,
    PopMax,
    Select(u64),
    Rank(u32),
    Seek(u32),
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    operations: Vec<Operation>,
}

fn bounds(start: u32, len: u32) -> (u32, u32) {
    (start, start.saturating_add(len % MAX_RANGE))
}

fn fuzz(input: FuzzInput) {
    let mut bitmap = RoaringBitmap::new();
    let mut model = BTreeSet::new();

    for operation in input.operations {
        match operation {
            Operation::Insert(value) => {
                assert_eq!(bitmap.insert(value), model.insert(value));
            }
            Operation::Remove(value) => {
                assert_eq!(bitmap.remove(value), model.remove(&value));
            }
            Operation::InsertRange(start, len) => {
                let (start, end) = bounds(start, len);
                let added = bitmap.insert_range(start..end);
                let before = model.len();
                model.extend(start..end);
                assert_eq!(added, (model.len() - before) as u64);
            }
            Operation::RemoveRange(start, len) => {
                let (start, end) = bounds(start, len);
                let removed = bitmap.remove_range(start..end);
                let before = model.len();
                model.retain(|v| !(start..end).contains(v));
                assert_eq!(removed, (before - model.len()) as u64);
            }
            Operation::Flip(start, len) => {
                let (start, end) = bounds(start, len);
                bitmap.flip_inplace(start..end);
                for value in start..end {
                    if !model.remove(&value) {
                        model.insert(value);
                    }
                }
            }
            Operation::And(other) => {
                let other_model: BTreeSet<u32> = other.iter().collect();
                assert_eq!(bitmap.and_cardinality(&other), bitmap.and(&other).len());
                bitmap.and_inplace(&other);
                model = &model & &other_model;
            }
            Operation::Or(other) => {
                let other_model: BTreeSet<u32> = other.iter().collect();
                assert_eq!(bitmap.or_cardinality(&other), bitmap.or(&other).len());
                bitmap.or_inplace(&other);
                model = &model | &other_model;
            }
            Operation::AndNot(other) => {
                let other_model: BTreeSet<u32> = other.iter().collect();
                bitmap.andnot_inplace(&other);
                model = &model - &other_model;
            }
            Operation::Xor(other) => {
                let other_model: BTreeSet<u32> = other.iter().collect();
                assert_eq!(bitmap.xor_cardinality(&other), bitmap.xor(&other).len());
                bitmap.xor_inplace(&other);
                model = &model ^ &other_model;
            }
            Operation::RunOptimize => {
                bitmap.run_optimize();
            }
            Operation::RemoveRunCompression => {
                bitmap.remove_run_compression();
            }
            Operation::PopMin => {
                assert_eq!(bitmap.pop_min().ok(), model.pop_first());
            }
            Operation::PopMax => {
                assert_eq!(bitmap.pop_max().ok(), model.pop_last());
            }
            Operation::Select(pos) => {
                let expected = usize::try_from(pos)
                    .ok()
                    .and_then(|pos| model.iter().nth(pos))
                    .copied();
                assert_eq!(bitmap.select(pos), expected);
            }
            Operation::Rank(value) => {
                assert_eq!(bitmap.rank(value), model.range(..=value).count() as u64);
            }
            Operation::Seek(target) => {
                let mut cursor = bitmap.cursor();
                let found = cursor.seek(target);
                let expected = model.range(target..).next().copied();
                assert_eq!(found, expected.is_some());
                assert_eq!(cursor.value(), expected);
            }
        }

        assert_eq!(bitmap.len(), model.len() as u64);
        assert_eq!(bitmap.min(), model.first().copied());
        assert_eq!(bitmap.max(), model.last().copied());
    }

    assert!(bitmap.iter().eq(model.iter().copied()));
    assert!(bitmap.iter().rev().eq(model.iter().rev().copied()));

    let mut portable = Vec::new();
    bitmap.serialize_portable(&mut portable);
    assert_eq!(portable.len(), bitmap.portable_size());
    let decoded = RoaringBitmap::deserialize_portable(&mut portable.as_slice()).unwrap();
    assert_eq!(decoded, bitmap);

    let mut native = Vec::new();
    bitmap.serialize(&mut native);
    assert_eq!(native.len(), bitmap.size_in_bytes());
    let decoded = RoaringBitmap::deserialize(&mut native.as_slice()).unwrap();
    assert_eq!(decoded, bitmap);

    let buffer = FrozenBuffer::new(&bitmap);
    let frozen = buffer.view().unwrap();
    assert_eq!(frozen, bitmap);
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});
