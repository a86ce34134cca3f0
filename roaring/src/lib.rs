//! Compress sets of 32-bit integers with roaring bitmaps.
//!
//! Values are partitioned by their high 16 bits into containers that each hold the low 16 bits of
//! one partition, stored as a sorted array, a 65536-bit bitset, or a list of runs (whichever fits
//! the partition's density). Set operations walk both key indices in order and dispatch to the
//! container algebra for keys present on both sides.
//!
//! [RoaringBitmap] implements the [commonware_codec] traits using the portable format, which
//! every roaring implementation can read. The [format] module also provides a native format and a
//! frozen format that can be viewed in place without copying.
//!
//! # Status
//!
//! `commonware-roaring` is **ALPHA** software and is not yet recommended for production use.
//! Developers should expect breaking changes and occasional instability.
//!
//! # Example
//!
//! ```
//! use commonware_roaring::{Roaring, RoaringBitmap};
//!
//! let a = RoaringBitmap::from_sorted(&[1, 2, 3, 1_000_000, 1_000_001]);
//! let b = RoaringBitmap::from_sorted(&[3, 4, 1_000_001]);
//!
//! assert_eq!(a.and(&b).to_vec(), vec![3, 1_000_001]);
//! assert_eq!(a.or(&b).len(), 6);
//! assert_eq!(a.andnot(&b).to_vec(), vec![1, 2, 1_000_000]);
//!
//! let mut buf = Vec::new();
//! a.serialize_portable(&mut buf);
//! let decoded = RoaringBitmap::deserialize_portable(&mut buf.as_slice()).unwrap();
//! assert_eq!(decoded, a);
//!
//! // The same bytes, through the codec traits
//! use commonware_codec::{Decode, Encode};
//! use commonware_roaring::Config;
//!
//! assert_eq!(&a.encode()[..], &buf[..]);
//! assert_eq!(RoaringBitmap::decode_cfg(&buf[..], &Config::default()).unwrap(), a);
//! ```

pub mod container;
pub mod format;

mod bitmap;
pub use bitmap::{BulkContext, RoaringBitmap};
mod error;
pub use error::Error;
mod frozen;
pub use frozen::{FrozenBitmap, FrozenBuffer};
mod iter;
pub use iter::{Cursor, Iter};
mod ops;
mod roaring;
pub use format::Config;
pub use roaring::{Roaring, Statistics};
