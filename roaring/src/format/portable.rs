//! The portable roaring layout, interoperable with other roaring implementations.
//!
//! ```text
//! cookie            u32    12346, or 12347 | (n - 1) << 16 when any run container is present
//! [n]               u32    only with cookie 12346
//! [run flags]       ceil(n / 8) bytes, bit i set if container i is a run (only with 12347)
//! descriptive hdr   n * (u16 key, u16 cardinality - 1)
//! [offsets]         n * u32, byte offset of each payload (omitted when runs exist and n < 4)
//! payloads          array:  cardinality * u16
//!                   bitmap: 1024 * u64
//!                   run:    u16 run count, then run count * (u16 start, u16 length - 1)
//! ```
//!
//! Non-run containers are typed by their cardinality: more than 4096 values means bitmap.
//! Offsets are written for compatibility but ignored when reading, since payloads are consumed
//! sequentially.
//!
//! This is the [commonware_codec] encoding of [RoaringBitmap] (and of [FrozenBitmap], which can be
//! written but not read), with [Config] as its read configuration.

use super::Config;
use crate::{
    container::{
        run_serialized_size, Array, Bitmap, Container, ContainerRef, Interval, Run,
        BITMAP_SERIALIZED_SIZE, MAX_CARDINALITY, WORDS,
    },
    error::allocation,
    FrozenBitmap, Roaring, RoaringBitmap,
};
use bytes::{Buf, BufMut};
use commonware_codec::{util::at_least, EncodeSize, Error as CodecError, Read, Write};
use tracing::debug;

const SERIAL_COOKIE_NO_RUNCONTAINER: u32 = 12346;
const SERIAL_COOKIE: u16 = 12347;

/// Below this many containers, a layout with run containers omits the offset header.
const NO_OFFSET_THRESHOLD: usize = 4;

fn has_runs<R: Roaring + ?Sized>(bitmap: &R) -> bool {
    (0..bitmap.container_count()).any(|i| matches!(bitmap.container(i), ContainerRef::Run(_)))
}

fn has_offsets(count: usize, runs: bool) -> bool {
    !runs || count >= NO_OFFSET_THRESHOLD
}

fn header_size(count: usize, runs: bool) -> usize {
    let cookie = if runs { 4 + count.div_ceil(8) } else { 8 };
    let offsets = if has_offsets(count, runs) { 4 * count } else { 0 };
    cookie + 4 * count + offsets
}

fn payload_size(container: ContainerRef<'_>) -> usize {
    match container {
        ContainerRef::Run(runs) => run_serialized_size(runs.len()),
        other if other.len() > MAX_CARDINALITY => BITMAP_SERIALIZED_SIZE,
        other => 2 * other.len(),
    }
}

fn write_words(words: &[u64; WORDS], buf: &mut impl BufMut) {
    for &word in words.iter() {
        buf.put_u64_le(word);
    }
}

fn write_payload(container: ContainerRef<'_>, buf: &mut impl BufMut) {
    match container {
        ContainerRef::Run(runs) => {
            buf.put_u16_le(runs.len() as u16);
            for run in runs {
                buf.put_u16_le(run.start);
                buf.put_u16_le(run.length);
            }
        }
        ContainerRef::Bitmap { words, len } if len > MAX_CARDINALITY => write_words(words, buf),
        ContainerRef::Array(values) if values.len() <= MAX_CARDINALITY => {
            for &value in values {
                buf.put_u16_le(value);
            }
        }
        other if other.len() > MAX_CARDINALITY => write_words(other.to_bitmap().words(), buf),
        other => {
            for value in other.iter() {
                buf.put_u16_le(value);
            }
        }
    }
}

/// Returns the number of bytes [write_to] produces.
pub(crate) fn size<R: Roaring + ?Sized>(bitmap: &R) -> usize {
    let payloads: usize = (0..bitmap.container_count())
        .map(|i| payload_size(bitmap.container(i)))
        .sum();
    header_size(bitmap.container_count(), has_runs(bitmap)) + payloads
}

/// Writes `bitmap` in the portable layout.
pub(crate) fn write_to<R: Roaring + ?Sized>(bitmap: &R, buf: &mut impl BufMut) {
    let keys = bitmap.keys();
    let count = keys.len();
    let runs = has_runs(bitmap);

    if runs {
        buf.put_u32_le(u32::from(SERIAL_COOKIE) | ((count as u32 - 1) << 16));
        let mut flags = vec![0u8; count.div_ceil(8)];
        for i in 0..count {
            if matches!(bitmap.container(i), ContainerRef::Run(_)) {
                flags[i / 8] |= 1 << (i % 8);
            }
        }
        buf.put_slice(&flags);
    } else {
        buf.put_u32_le(SERIAL_COOKIE_NO_RUNCONTAINER);
        buf.put_u32_le(count as u32);
    }

    for (i, &key) in keys.iter().enumerate() {
        buf.put_u16_le(key);
        buf.put_u16_le((bitmap.container(i).len() - 1) as u16);
    }

    if has_offsets(count, runs) {
        let mut offset = header_size(count, runs);
        for i in 0..count {
            buf.put_u32_le(offset as u32);
            offset += payload_size(bitmap.container(i));
        }
    }

    for i in 0..count {
        write_payload(bitmap.container(i), buf);
    }
}

fn read_array(buf: &mut impl Buf, cardinality: usize) -> Result<Container, CodecError> {
    at_least(buf, 2 * cardinality)?;
    let mut values = Vec::new();
    values.try_reserve_exact(cardinality).map_err(|err| allocation("Array", err))?;
    for _ in 0..cardinality {
        let value = buf.get_u16_le();
        if values.last().is_some_and(|&last| last >= value) {
            return Err(CodecError::Invalid("Array", "values not strictly ascending"));
        }
        values.push(value);
    }
    Ok(Container::Array(Array::from_sorted_vec(values)))
}

fn read_bitmap(buf: &mut impl Buf, cardinality: usize) -> Result<Container, CodecError> {
    at_least(buf, BITMAP_SERIALIZED_SIZE)?;
    let mut words = Box::new([0u64; WORDS]);
    for word in words.iter_mut() {
        *word = buf.get_u64_le();
    }
    let bitmap = Bitmap::from_words(words);
    if bitmap.len() != cardinality {
        return Err(CodecError::Invalid("Bitmap", "cardinality mismatch"));
    }
    Ok(Container::Bitmap(bitmap))
}

fn read_run(buf: &mut impl Buf, cardinality: usize) -> Result<Container, CodecError> {
    at_least(buf, 2)?;
    let count = buf.get_u16_le() as usize;
    at_least(buf, 4 * count)?;
    let mut runs: Vec<Interval> = Vec::new();
    runs.try_reserve_exact(count).map_err(|err| allocation("Run", err))?;
    let mut total = 0;
    for _ in 0..count {
        let start = buf.get_u16_le();
        let length = buf.get_u16_le();
        if u32::from(start) + u32::from(length) > u32::from(u16::MAX) {
            return Err(CodecError::Invalid("Run", "run exceeds container"));
        }
        total += usize::from(length) + 1;
        match runs.last_mut() {
            Some(last) if start <= last.end() => {
                return Err(CodecError::Invalid("Run", "runs not strictly ascending"));
            }
            // Adjacent runs are merged so the container stays normalized.
            Some(last) if u32::from(start) == u32::from(last.end()) + 1 => {
                last.length += length + 1;
            }
            _ => runs.push(Interval { start, length }),
        }
    }
    if total != cardinality {
        return Err(CodecError::Invalid("Run", "cardinality mismatch"));
    }
    Ok(Container::Run(Run::from_intervals(runs)))
}

fn decode(buf: &mut impl Buf, config: &Config) -> Result<RoaringBitmap, CodecError> {
    at_least(buf, 4)?;
    let cookie = buf.get_u32_le();
    let (count, flags) = if cookie & 0xFFFF == u32::from(SERIAL_COOKIE) {
        let count = (cookie >> 16) as usize + 1;
        config.check_containers(count)?;
        at_least(buf, count.div_ceil(8))?;
        let mut flags = vec![0u8; count.div_ceil(8)];
        buf.copy_to_slice(&mut flags);
        (count, Some(flags))
    } else if cookie == SERIAL_COOKIE_NO_RUNCONTAINER {
        at_least(buf, 4)?;
        let count = buf.get_u32_le() as usize;
        config.check_containers(count)?;
        (count, None)
    } else {
        return Err(CodecError::Invalid("RoaringBitmap", "invalid cookie"));
    };

    at_least(buf, 4 * count)?;
    let reserve = |err| allocation("RoaringBitmap", err);
    let mut header = Vec::new();
    header.try_reserve_exact(count).map_err(reserve)?;
    for _ in 0..count {
        let key = buf.get_u16_le();
        let cardinality = buf.get_u16_le() as usize + 1;
        if header.last().is_some_and(|&(last, _)| last >= key) {
            return Err(CodecError::Invalid("RoaringBitmap", "keys not strictly ascending"));
        }
        header.push((key, cardinality));
    }

    if has_offsets(count, flags.is_some()) {
        at_least(buf, 4 * count)?;
        buf.advance(4 * count);
    }

    let mut bitmap = RoaringBitmap::new();
    bitmap.keys.try_reserve_exact(count).map_err(reserve)?;
    bitmap.containers.try_reserve_exact(count).map_err(reserve)?;
    for (i, (key, cardinality)) in header.into_iter().enumerate() {
        let is_run = flags
            .as_ref()
            .is_some_and(|flags| flags[i / 8] & (1 << (i % 8)) != 0);
        let container = if is_run {
            read_run(buf, cardinality)?
        } else if cardinality > MAX_CARDINALITY {
            read_bitmap(buf, cardinality)?
        } else {
            read_array(buf, cardinality)?
        };
        bitmap.push(key, container);
    }
    Ok(bitmap)
}

impl Read for RoaringBitmap {
    type Cfg = Config;

    fn read_cfg(buf: &mut impl Buf, cfg: &Self::Cfg) -> Result<Self, CodecError> {
        let result = decode(buf, cfg);
        if let Err(err) = &result {
            debug!(?err, "rejected portable bitmap");
        }
        result
    }
}

impl Write for RoaringBitmap {
    fn write(&self, buf: &mut impl BufMut) {
        write_to(self, buf);
    }
}

impl EncodeSize for RoaringBitmap {
    fn encode_size(&self) -> usize {
        size(self)
    }
}

impl Write for FrozenBitmap<'_> {
    fn write(&self, buf: &mut impl BufMut) {
        write_to(self, buf);
    }
}

impl EncodeSize for FrozenBitmap<'_> {
    fn encode_size(&self) -> usize {
        size(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, FrozenBuffer};
    use bytes::BytesMut;
    use commonware_codec::{Decode, Encode};
    use commonware_macros::test_traced;

    fn encode(bitmap: &RoaringBitmap) -> BytesMut {
        let buf = bitmap.encode();
        let mut serialized = Vec::with_capacity(bitmap.portable_size());
        bitmap.serialize_portable(&mut serialized);
        assert_eq!(&buf[..], &serialized[..]);
        buf
    }

    fn decode_all(bytes: &[u8]) -> Result<RoaringBitmap, CodecError> {
        RoaringBitmap::decode_cfg(bytes, &Config::default())
    }

    fn mixed() -> RoaringBitmap {
        let mut bitmap = RoaringBitmap::new();
        bitmap.insert_many(&[1, 5, 9]);
        for value in (65_536..131_072).step_by(2) {
            bitmap.insert(value);
        }
        bitmap.insert_range(200_000..260_000);
        bitmap.insert(u32::MAX);
        bitmap.run_optimize();
        bitmap
    }

    #[test]
    fn test_empty() {
        let bitmap = RoaringBitmap::new();
        let buf = encode(&bitmap);
        assert_eq!(&buf[..], &[0x3A, 0x30, 0, 0, 0, 0, 0, 0]);
        let decoded = decode_all(&buf).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.iter().next(), None);
    }

    #[test]
    fn test_array_bytes() {
        let bitmap = RoaringBitmap::from_sorted(&[1, 2, 3]);
        let buf = encode(&bitmap);
        #[rustfmt::skip]
        let expected = [
            0x3A, 0x30, 0, 0,   // cookie
            1, 0, 0, 0,         // containers
            0, 0, 2, 0,         // key 0, cardinality 3
            16, 0, 0, 0,        // offset
            1, 0, 2, 0, 3, 0,   // values
        ];
        assert_eq!(&buf[..], &expected);
        assert_eq!(decode_all(&buf).unwrap(), bitmap);
    }

    #[test]
    fn test_run_bytes() {
        let mut bitmap = RoaringBitmap::new();
        bitmap.insert_range(0..100);
        assert!(bitmap.run_optimize());
        let buf = encode(&bitmap);
        #[rustfmt::skip]
        let expected = [
            0x3B, 0x30, 0, 0,   // cookie, one container
            1,                  // run flags
            0, 0, 99, 0,        // key 0, cardinality 100
            1, 0, 0, 0, 99, 0,  // one run: start 0, length 100
        ];
        assert_eq!(&buf[..], &expected);
        assert_eq!(decode_all(&buf).unwrap(), bitmap);
    }

    #[test]
    fn test_roundtrip_mixed() {
        let bitmap = mixed();
        let stats = bitmap.statistics();
        assert!(stats.array_containers > 0);
        assert!(stats.bitmap_containers > 0);
        assert!(stats.run_containers > 0);
        assert!(bitmap.container_count() >= NO_OFFSET_THRESHOLD);

        let decoded = decode_all(&encode(&bitmap)).unwrap();
        assert_eq!(decoded, bitmap);
        assert_eq!(decoded.statistics(), stats);
    }

    #[test]
    fn test_roundtrip_single_and_dense() {
        for bitmap in [
            RoaringBitmap::from_sorted(&[42]),
            (0..200_000).collect(),
            (0..300_000).step_by(5).collect(),
        ] {
            assert_eq!(decode_all(&encode(&bitmap)).unwrap(), bitmap);
        }
    }

    #[test]
    fn test_frozen_view_encodes_identically() {
        let bitmap = mixed();
        let buffer = FrozenBuffer::new(&bitmap);
        let frozen = buffer.view().unwrap();
        assert_eq!(frozen.encode_size(), bitmap.encode_size());
        assert_eq!(frozen.encode(), bitmap.encode());
    }

    #[test_traced]
    fn test_truncated_buffer() {
        for bitmap in [RoaringBitmap::from_sorted(&[1, 2, 3]), mixed()] {
            let buf = encode(&bitmap);
            for len in 0..buf.len() {
                assert!(
                    matches!(decode_all(&buf[..len]), Err(CodecError::EndOfBuffer)),
                    "len {len}"
                );
            }
        }
    }

    #[test_traced]
    fn test_trailing_bytes() {
        let mut buf = encode(&RoaringBitmap::from_sorted(&[1, 2, 3]));
        buf.put_u8(0);
        assert!(matches!(decode_all(&buf), Err(CodecError::ExtraData(_))));

        let mut reader = &buf[..];
        let bitmap = RoaringBitmap::deserialize_portable(&mut reader).unwrap();
        assert_eq!(bitmap.to_vec(), vec![1, 2, 3]);
        assert_eq!(reader.len(), 1);
    }

    #[test_traced]
    fn test_invalid_cookie() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(12345);
        buf.put_u32_le(0);
        assert!(matches!(
            decode_all(&buf),
            Err(CodecError::Invalid("RoaringBitmap", "invalid cookie"))
        ));
    }

    #[test_traced]
    fn test_max_containers_exceeded() {
        let bitmap = RoaringBitmap::from_sorted(&[1, 70_000, 140_000]);
        let buf = encode(&bitmap);
        let config = Config { max_containers: 2 };
        assert!(matches!(
            RoaringBitmap::read_cfg(&mut &buf[..], &config),
            Err(CodecError::InvalidLength(3))
        ));
        assert!(matches!(
            RoaringBitmap::deserialize_portable_cfg(&mut &buf[..], &config),
            Err(Error::Codec(CodecError::InvalidLength(3)))
        ));

        let mut buf = BytesMut::new();
        buf.put_u32_le(SERIAL_COOKIE_NO_RUNCONTAINER);
        buf.put_u32_le(u32::MAX);
        assert!(matches!(
            decode_all(&buf),
            Err(CodecError::InvalidLength(len)) if len == u32::MAX as usize
        ));
    }

    #[test_traced]
    fn test_unsorted_keys() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(SERIAL_COOKIE_NO_RUNCONTAINER);
        buf.put_u32_le(2);
        buf.put_u16_le(5);
        buf.put_u16_le(0);
        buf.put_u16_le(5);
        buf.put_u16_le(0);
        buf.put_bytes(0, 8);
        buf.put_u16_le(1);
        buf.put_u16_le(1);
        assert!(matches!(
            decode_all(&buf),
            Err(CodecError::Invalid("RoaringBitmap", _))
        ));
    }

    #[test_traced]
    fn test_unsorted_array() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(SERIAL_COOKIE_NO_RUNCONTAINER);
        buf.put_u32_le(1);
        buf.put_u16_le(0);
        buf.put_u16_le(1);
        buf.put_u32_le(16);
        buf.put_u16_le(7);
        buf.put_u16_le(7);
        assert!(matches!(decode_all(&buf), Err(CodecError::Invalid("Array", _))));
    }

    #[test_traced]
    fn test_bitmap_cardinality_mismatch() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(SERIAL_COOKIE_NO_RUNCONTAINER);
        buf.put_u32_le(1);
        buf.put_u16_le(0);
        buf.put_u16_le(MAX_CARDINALITY as u16);
        buf.put_u32_le(16);
        buf.put_bytes(0xFF, BITMAP_SERIALIZED_SIZE);
        assert!(matches!(decode_all(&buf), Err(CodecError::Invalid("Bitmap", _))));
    }

    fn run_buffer(runs: &[(u16, u16)], cardinality: u16) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u32_le(u32::from(SERIAL_COOKIE));
        buf.put_u8(1);
        buf.put_u16_le(0);
        buf.put_u16_le(cardinality - 1);
        buf.put_u16_le(runs.len() as u16);
        for &(start, length) in runs {
            buf.put_u16_le(start);
            buf.put_u16_le(length);
        }
        buf
    }

    #[test_traced]
    fn test_runs_validated() {
        let overlapping = run_buffer(&[(0, 10), (5, 10)], 22);
        assert!(matches!(decode_all(&overlapping), Err(CodecError::Invalid("Run", _))));

        let overflow = run_buffer(&[(65_000, 1_000)], 1_001);
        assert!(matches!(decode_all(&overflow), Err(CodecError::Invalid("Run", _))));

        let mismatch = run_buffer(&[(0, 10)], 5);
        assert!(matches!(decode_all(&mismatch), Err(CodecError::Invalid("Run", _))));

        let empty = run_buffer(&[], 1);
        assert!(matches!(decode_all(&empty), Err(CodecError::Invalid("Run", _))));
    }

    #[test]
    fn test_adjacent_runs_merged() {
        let buf = run_buffer(&[(0, 9), (10, 9), (30, 0)], 21);
        let bitmap = decode_all(&buf).unwrap();
        assert_eq!(bitmap.len(), 21);
        match bitmap.container(0) {
            ContainerRef::Run(runs) => {
                assert_eq!(runs, &[Interval::from_bounds(0, 19), Interval::from_bounds(30, 30)])
            }
            other => panic!("unexpected container {other:?}"),
        }
    }

    #[test]
    fn test_error_kind() {
        let err = RoaringBitmap::deserialize_portable(&mut &[1u8, 2][..]).unwrap_err();
        assert!(err.is_encoding());
        assert!(!err.is_allocation());
    }
}
