//! Compressed bitmaps over `u32` values.
//!
//! Every value is split into a 16-bit bucket key (`value >> 16`) and a 16-bit low
//! part. Values sharing a key live in one [`Container`](container::Container),
//! stored as a sorted array, a 65536-bit bitmap or a list of runs depending on
//! density. A [`ContainerDirectory`](directory::ContainerDirectory) keeps the
//! containers sorted by key, and [`Bitmap`] exposes the set API on top of it.
//!
//! Two flavors share one implementation through the [`storage::Storage`]
//! parameter:
//! - [`Bitmap`]: heap-owned and mutable.
//! - [`FrozenBitmap`]: a read-only view over a serialized byte buffer.

pub mod aggregation;
pub mod batch;
pub mod bitmap;
pub mod config;
pub mod container;
pub mod directory;
pub mod iter;
pub mod lazy;
pub mod serialization;
pub mod storage;
pub mod util;

#[cfg(test)]
mod tests;

pub use bitmap::{Bitmap, BitmapBase, BitmapStats, FrozenBitmap};
pub use lazy::LazyBitmap;
pub use roar_common::{Error, ErrorKind, Result};
