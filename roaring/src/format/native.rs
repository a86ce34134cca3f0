//! The native layout: a tag byte followed by whichever body is smaller.
//!
//! - Tag `1`: u32 cardinality, then every value as u32.
//! - Tag `2`: the [portable](super::portable) layout.

use super::{portable, Config};
use crate::{error::allocation, Error, Roaring, RoaringBitmap};
use bytes::{Buf, BufMut};
use commonware_codec::{util::at_least, Error as CodecError, Read};
use tracing::debug;

const TAG_VALUES: u8 = 1;
const TAG_PORTABLE: u8 = 2;

/// Size of the tag-1 body for a bitmap of `len` values.
fn values_size(len: u64) -> u64 {
    4 + 4 * len
}

/// Returns the number of bytes [write] produces.
pub(crate) fn size<R: Roaring + ?Sized>(bitmap: &R) -> usize {
    let values = values_size(bitmap.len());
    let portable = portable::size(bitmap) as u64;
    1 + values.min(portable) as usize
}

/// Writes `bitmap` in the native layout.
pub(crate) fn write<R: Roaring + ?Sized>(bitmap: &R, buf: &mut impl BufMut) {
    let len = bitmap.len();
    if values_size(len) <= portable::size(bitmap) as u64 {
        buf.put_u8(TAG_VALUES);
        buf.put_u32_le(len as u32);
        for value in bitmap.iter() {
            buf.put_u32_le(value);
        }
    } else {
        buf.put_u8(TAG_PORTABLE);
        portable::write_to(bitmap, buf);
    }
}

fn decode(buf: &mut impl Buf, config: &Config) -> Result<RoaringBitmap, CodecError> {
    at_least(buf, 1)?;
    match buf.get_u8() {
        TAG_VALUES => {
            at_least(buf, 4)?;
            let len = buf.get_u32_le() as usize;
            at_least(buf, len.saturating_mul(4))?;
            let mut values = Vec::new();
            values.try_reserve_exact(len).map_err(|err| allocation("RoaringBitmap", err))?;
            values.extend((0..len).map(|_| buf.get_u32_le()));
            let bitmap = RoaringBitmap::from_sorted(&values);
            config.check_containers(bitmap.container_count())?;
            Ok(bitmap)
        }
        TAG_PORTABLE => RoaringBitmap::read_cfg(buf, config),
        tag => Err(CodecError::InvalidEnum(tag)),
    }
}

/// Reads a bitmap in the native layout.
pub(crate) fn read(buf: &mut impl Buf, config: &Config) -> Result<RoaringBitmap, Error> {
    let result = decode(buf, config);
    if let Err(err) = &result {
        debug!(?err, "rejected native bitmap");
    }
    result.map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use commonware_macros::test_traced;

    fn roundtrip(bitmap: &RoaringBitmap) -> (u8, RoaringBitmap) {
        let mut buf = BytesMut::new();
        bitmap.serialize(&mut buf);
        assert_eq!(buf.len(), bitmap.size_in_bytes());
        let tag = buf[0];
        let mut reader = &buf[..];
        let decoded = RoaringBitmap::deserialize(&mut reader).unwrap();
        assert!(reader.is_empty());
        (tag, decoded)
    }

    #[test]
    fn test_sparse_uses_values() {
        let bitmap = RoaringBitmap::from_sorted(&[1, 70_000, 140_000, u32::MAX]);
        let (tag, decoded) = roundtrip(&bitmap);
        assert_eq!(tag, TAG_VALUES);
        assert_eq!(decoded, bitmap);
        assert_eq!(bitmap.size_in_bytes(), 1 + 4 + 16);
    }

    #[test]
    fn test_dense_uses_portable() {
        let mut bitmap = RoaringBitmap::new();
        bitmap.insert_range(0..100_000);
        let (tag, decoded) = roundtrip(&bitmap);
        assert_eq!(tag, TAG_PORTABLE);
        assert_eq!(decoded, bitmap);
        assert_eq!(bitmap.size_in_bytes(), 1 + bitmap.portable_size());
    }

    #[test]
    fn test_empty() {
        let (tag, decoded) = roundtrip(&RoaringBitmap::new());
        assert_eq!(tag, TAG_VALUES);
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_unsorted_values_accepted() {
        let mut buf = BytesMut::new();
        buf.put_u8(TAG_VALUES);
        buf.put_u32_le(3);
        for value in [9u32, 2, 9] {
            buf.put_u32_le(value);
        }
        let bitmap = RoaringBitmap::deserialize(&mut &buf[..]).unwrap();
        assert_eq!(bitmap.to_vec(), vec![2, 9]);
    }

    #[test_traced]
    fn test_invalid() {
        assert!(matches!(
            RoaringBitmap::deserialize(&mut &[7u8][..]),
            Err(Error::Codec(CodecError::InvalidEnum(7)))
        ));
        assert!(matches!(
            RoaringBitmap::deserialize(&mut &[0u8; 0][..]),
            Err(Error::Codec(CodecError::EndOfBuffer))
        ));

        let mut buf = BytesMut::new();
        buf.put_u8(TAG_VALUES);
        buf.put_u32_le(u32::MAX);
        buf.put_u32_le(1);
        assert!(matches!(
            RoaringBitmap::deserialize(&mut &buf[..]),
            Err(Error::Codec(CodecError::EndOfBuffer))
        ));
    }

    #[test_traced]
    fn test_max_containers() {
        let bitmap = RoaringBitmap::from_sorted(&[1, 70_000]);
        let mut buf = BytesMut::new();
        bitmap.serialize(&mut buf);
        let config = Config { max_containers: 1 };
        assert!(matches!(
            RoaringBitmap::deserialize_cfg(&mut &buf[..], &config),
            Err(Error::Codec(CodecError::InvalidLength(2)))
        ));
    }
}
