//! Binary encodings of a bitmap.
//!
//! - [portable]: the cross-implementation layout shared by every roaring library.
//! - [native]: a one-byte tag selecting either a plain list of values or the portable layout.
//! - [frozen]: a layout that can be viewed in place, without copying, from an aligned buffer.
//!
//! All integers are little-endian. Decoders check that the buffer holds every declared field before
//! reading it and validate the decoded structure, so malformed input fails with a
//! [commonware_codec::Error] rather than producing a corrupt bitmap.

pub mod frozen;
pub mod native;
pub mod portable;

use commonware_codec::Error as CodecError;

/// Number of distinct high keys.
pub const MAX_CONTAINERS: usize = 1 << 16;

/// Limits applied while decoding untrusted input.
///
/// Used as the [commonware_codec::Read::Cfg] of [crate::RoaringBitmap].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of containers a decoded bitmap may hold.
    ///
    /// Checked before any container is allocated.
    pub max_containers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_containers: MAX_CONTAINERS,
        }
    }
}

impl Config {
    /// Checks a declared container count against the key space and the configured limit.
    pub(crate) fn check_containers(&self, count: usize) -> Result<(), CodecError> {
        if count > MAX_CONTAINERS || count > self.max_containers {
            return Err(CodecError::InvalidLength(count));
        }
        Ok(())
    }
}
