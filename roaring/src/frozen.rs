//! Read-only bitmaps viewed in place over a serialized buffer.

use crate::{container::ContainerRef, format, Error, Roaring};
use bytemuck::{Pod, Zeroable};

/// A read-only bitmap borrowing its containers from a frozen buffer.
///
/// Only the container index is allocated; every key, value, run and bitmap word is read directly
/// from the buffer, which must outlive the view. Set operations accept any [Roaring] and return an
/// owned [crate::RoaringBitmap].
///
/// # Example
///
/// ```
/// use commonware_roaring::{FrozenBuffer, Roaring, RoaringBitmap};
///
/// let bitmap = RoaringBitmap::from_sorted(&[1, 2, 3, 100_000]);
/// let buffer = FrozenBuffer::new(&bitmap);
/// let frozen = buffer.view().unwrap();
///
/// assert_eq!(frozen.len(), 4);
/// assert!(frozen.contains(100_000));
/// assert_eq!(frozen.or(&bitmap), bitmap);
/// ```
#[derive(Clone, Debug)]
pub struct FrozenBitmap<'a> {
    pub(crate) keys: &'a [u16],
    pub(crate) containers: Vec<ContainerRef<'a>>,
}

impl<'a> FrozenBitmap<'a> {
    /// Views a buffer produced by [Roaring::serialize_frozen].
    ///
    /// Fails with [Error::Misaligned] unless `buf` starts at a
    /// [format::frozen::ALIGNMENT]-byte boundary (see [FrozenBuffer]), and with
    /// [Error::UnsupportedPlatform] on big-endian targets.
    pub fn view(buf: &'a [u8]) -> Result<Self, Error> {
        format::frozen::view(buf)
    }
}

impl Roaring for FrozenBitmap<'_> {
    #[inline]
    fn keys(&self) -> &[u16] {
        self.keys
    }

    #[inline]
    fn container(&self, index: usize) -> ContainerRef<'_> {
        self.containers[index]
    }
}

impl<R: Roaring> PartialEq<R> for FrozenBitmap<'_> {
    fn eq(&self, other: &R) -> bool {
        self.equals(other)
    }
}

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, align(32))]
struct Chunk([u8; 32]);

/// An owned byte buffer aligned for [FrozenBitmap::view].
#[derive(Clone)]
pub struct FrozenBuffer {
    chunks: Vec<Chunk>,
    len: usize,
}

impl FrozenBuffer {
    /// Serializes `bitmap` in the frozen layout.
    pub fn new(bitmap: &(impl Roaring + ?Sized)) -> Self {
        let len = bitmap.frozen_size();
        let mut buffer = Self::zeroed(len);
        let mut out = buffer.as_bytes_mut();
        bitmap.serialize_frozen(&mut out);
        debug_assert!(out.is_empty());
        buffer
    }

    /// Copies `bytes` into an aligned buffer.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buffer = Self::zeroed(bytes.len());
        buffer.as_bytes_mut().copy_from_slice(bytes);
        buffer
    }

    fn zeroed(len: usize) -> Self {
        Self {
            chunks: vec![Chunk::zeroed(); len.div_ceil(format::frozen::ALIGNMENT)],
            len,
        }
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut(&mut self.chunks)[..self.len]
    }

    /// Returns the serialized bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice(&self.chunks)[..self.len]
    }

    /// Views the buffer as a bitmap.
    pub fn view(&self) -> Result<FrozenBitmap<'_>, Error> {
        FrozenBitmap::view(self.as_bytes())
    }
}

impl AsRef<[u8]> for FrozenBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
