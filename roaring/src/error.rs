//! Errors returned by bitmap queries and decoders.

use commonware_codec::Error as CodecError;
use std::collections::TryReserveError;
use thiserror::Error;

/// Errors that can occur when querying or decoding a bitmap.
#[derive(Debug, Error)]
pub enum Error {
    /// A positional lookup (or pop) found no value.
    #[error("not found")]
    NotFound,
    /// A frozen view was requested over a buffer that is not suitably aligned.
    #[error("buffer is not {0}-byte aligned")]
    Misaligned(usize),
    /// Frozen views reinterpret little-endian memory in place.
    #[error("frozen views require a little-endian target")]
    UnsupportedPlatform,
    /// A buffer could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl Error {
    /// Returns true if memory for decoded containers could not be reserved.
    pub fn is_allocation(&self) -> bool {
        matches!(self, Self::Codec(CodecError::Wrapped(_, err)) if err.is::<TryReserveError>())
    }

    /// Returns true if the error was caused by a malformed or truncated buffer.
    pub fn is_encoding(&self) -> bool {
        matches!(self, Self::Codec(_)) && !self.is_allocation()
    }
}

/// Wraps a failed reservation made while decoding `context`.
pub(crate) fn allocation(context: &'static str, err: TryReserveError) -> CodecError {
    CodecError::Wrapped(context, Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let truncated = Error::from(CodecError::EndOfBuffer);
        assert!(truncated.is_encoding());
        assert!(!truncated.is_allocation());

        let err = Vec::<u64>::new().try_reserve_exact(usize::MAX).unwrap_err();
        let failed = Error::from(allocation("RoaringBitmap", err));
        assert!(failed.is_allocation());
        assert!(!failed.is_encoding());

        assert!(!Error::NotFound.is_encoding());
        assert!(!Error::Misaligned(32).is_encoding());
    }
}
