//! The frozen layout, viewable in place from a 32-byte aligned buffer.
//!
//! ```text
//! bitmap zone   8192 bytes per bitmap container
//! run zone      4 bytes per run (u16 start, u16 length - 1)
//! array zone    2 bytes per array value
//! keys          n * u16
//! counts        n * u16: cardinality - 1 for arrays and bitmaps, run count for runs
//! typecodes     n * u8: 1 = bitmap, 2 = array, 3 = run
//! header        u32: (n << 15) | 13766
//! ```
//!
//! Zones hold containers of their type in key order. Because the bitmap zone comes first and every
//! zone length is even, a 32-byte aligned buffer places every field at its natural alignment.

use crate::{
    container::{
        bitmap::BYTES as BITMAP_BYTES, run, ContainerRef, Interval, MAX_CARDINALITY, WORDS,
    },
    error::allocation,
    format::MAX_CONTAINERS,
    Error, FrozenBitmap, Roaring,
};
use bytemuck::{try_cast_slice, try_from_bytes};
use bytes::BufMut;
use commonware_codec::Error as CodecError;
use tracing::debug;

/// Required alignment of a buffer passed to [view].
pub const ALIGNMENT: usize = 32;

const FROZEN_COOKIE: u32 = 13766;

const TYPECODE_BITMAP: u8 = 1;
const TYPECODE_ARRAY: u8 = 2;
const TYPECODE_RUN: u8 = 3;

/// Bytes of index (key, count, typecode) per container.
const INDEX_BYTES: usize = 5;

/// Returns the number of bytes [write] produces.
pub(crate) fn size<R: Roaring + ?Sized>(bitmap: &R) -> usize {
    let zones: usize = (0..bitmap.container_count())
        .map(|i| match bitmap.container(i) {
            ContainerRef::Bitmap { .. } => BITMAP_BYTES,
            ContainerRef::Run(runs) => 4 * runs.len(),
            ContainerRef::Array(values) => 2 * values.len(),
        })
        .sum();
    zones + INDEX_BYTES * bitmap.container_count() + 4
}

/// Writes `bitmap` in the frozen layout.
pub(crate) fn write<R: Roaring + ?Sized>(bitmap: &R, buf: &mut impl BufMut) {
    let count = bitmap.container_count();
    let containers = || (0..count).map(|i| bitmap.container(i));

    for container in containers() {
        if let ContainerRef::Bitmap { words, .. } = container {
            for &word in words.iter() {
                buf.put_u64_le(word);
            }
        }
    }
    for container in containers() {
        if let ContainerRef::Run(runs) = container {
            for run in runs {
                buf.put_u16_le(run.start);
                buf.put_u16_le(run.length);
            }
        }
    }
    for container in containers() {
        if let ContainerRef::Array(values) = container {
            for &value in values {
                buf.put_u16_le(value);
            }
        }
    }
    for &key in bitmap.keys() {
        buf.put_u16_le(key);
    }
    for container in containers() {
        let count = match container {
            ContainerRef::Run(runs) => runs.len(),
            other => other.len() - 1,
        };
        buf.put_u16_le(count as u16);
    }
    for container in containers() {
        buf.put_u8(match container {
            ContainerRef::Bitmap { .. } => TYPECODE_BITMAP,
            ContainerRef::Array(_) => TYPECODE_ARRAY,
            ContainerRef::Run(_) => TYPECODE_RUN,
        });
    }
    buf.put_u32_le(((count as u32) << 15) | FROZEN_COOKIE);
}

/// Splits `len` bytes off the front of `zone`.
fn take<'a>(zone: &mut &'a [u8], len: usize) -> &'a [u8] {
    let (head, tail) = zone.split_at(len);
    *zone = tail;
    head
}

fn decode(buf: &[u8]) -> Result<FrozenBitmap<'_>, Error> {
    if cfg!(target_endian = "big") {
        return Err(Error::UnsupportedPlatform);
    }
    if buf.as_ptr() as usize % ALIGNMENT != 0 {
        return Err(Error::Misaligned(ALIGNMENT));
    }
    let misaligned = |_| Error::Misaligned(ALIGNMENT);

    // Header.
    let Some(header_at) = buf.len().checked_sub(4) else {
        return Err(CodecError::EndOfBuffer.into());
    };
    let mut header = [0u8; 4];
    header.copy_from_slice(&buf[header_at..]);
    let header = u32::from_le_bytes(header);
    if header & 0x7FFF != FROZEN_COOKIE {
        return Err(CodecError::Invalid("FrozenBitmap", "invalid cookie").into());
    }
    let count = (header >> 15) as usize;
    if count > MAX_CONTAINERS {
        return Err(CodecError::InvalidLength(count).into());
    }

    // Index.
    let Some(index_at) = header_at.checked_sub(INDEX_BYTES * count) else {
        return Err(CodecError::EndOfBuffer.into());
    };
    let index = &buf[index_at..header_at];
    let keys: &[u16] = try_cast_slice(&index[..2 * count]).map_err(misaligned)?;
    let counts: &[u16] = try_cast_slice(&index[2 * count..4 * count]).map_err(misaligned)?;
    let typecodes = &index[4 * count..];
    if !keys.windows(2).all(|w| w[0] < w[1]) {
        return Err(CodecError::Invalid("FrozenBitmap", "keys not strictly ascending").into());
    }

    // Zones.
    let (mut bitmap_zone, mut run_zone, mut array_zone) = (0, 0, 0);
    for (&typecode, &count) in typecodes.iter().zip(counts) {
        let count = usize::from(count);
        match typecode {
            TYPECODE_BITMAP => bitmap_zone += BITMAP_BYTES,
            TYPECODE_ARRAY => array_zone += 2 * (count + 1),
            TYPECODE_RUN if count == 0 => {
                return Err(CodecError::Invalid("Run", "empty run container").into());
            }
            TYPECODE_RUN => run_zone += 4 * count,
            other => return Err(CodecError::InvalidEnum(other).into()),
        }
    }
    let zones = bitmap_zone + run_zone + array_zone;
    if zones > index_at {
        return Err(CodecError::EndOfBuffer.into());
    }
    if zones < index_at {
        return Err(CodecError::Invalid("FrozenBitmap", "unexpected trailing bytes").into());
    }
    let (mut bitmaps, rest) = buf.split_at(bitmap_zone);
    let (mut runs, mut arrays) = rest[..run_zone + array_zone].split_at(run_zone);

    // Containers.
    let mut containers = Vec::new();
    containers
        .try_reserve_exact(count)
        .map_err(|err| allocation("FrozenBitmap", err))?;
    for (&typecode, &count) in typecodes.iter().zip(counts) {
        let count = usize::from(count);
        let container = match typecode {
            TYPECODE_BITMAP => {
                let words: &[u64; WORDS] =
                    try_from_bytes(take(&mut bitmaps, BITMAP_BYTES)).map_err(misaligned)?;
                let len = words.iter().map(|w| w.count_ones() as usize).sum();
                if len != count + 1 {
                    return Err(CodecError::Invalid("Bitmap", "cardinality mismatch").into());
                }
                ContainerRef::Bitmap { words, len }
            }
            TYPECODE_ARRAY => {
                let values: &[u16] =
                    try_cast_slice(take(&mut arrays, 2 * (count + 1))).map_err(misaligned)?;
                if values.len() > MAX_CARDINALITY {
                    return Err(CodecError::Invalid("Array", "too many values").into());
                }
                if !values.windows(2).all(|w| w[0] < w[1]) {
                    return Err(
                        CodecError::Invalid("Array", "values not strictly ascending").into(),
                    );
                }
                ContainerRef::Array(values)
            }
            _ => {
                let intervals: &[Interval] =
                    try_cast_slice(take(&mut runs, 4 * count)).map_err(misaligned)?;
                if !run::is_normalized(intervals) {
                    return Err(CodecError::Invalid("Run", "runs not normalized").into());
                }
                ContainerRef::Run(intervals)
            }
        };
        containers.push(container);
    }
    Ok(FrozenBitmap { keys, containers })
}

/// Views a frozen buffer in place.
///
/// The buffer must start at a [ALIGNMENT]-byte boundary and contain exactly one frozen bitmap.
pub fn view(buf: &[u8]) -> Result<FrozenBitmap<'_>, Error> {
    let result = decode(buf);
    if let Err(err) = &result {
        debug!(?err, len = buf.len(), "rejected frozen bitmap");
    }
    result
}
