//! Lazily accumulated unions.
//!
//! Unioning many bitmaps one at a time keeps recounting the same bitmap
//! containers. A [`LazyBitmap`] skips that bookkeeping: bitmap containers are
//! OR-ed word-wise and marked pending, and [`LazyBitmap::repair`] recounts each
//! of them once at the end. Until then the state exposes no cardinality,
//! serialization or comparison.

use crate::{
    bitmap::{Bitmap, BitmapBase},
    container::SetOp,
    directory::ContainerDirectory,
    storage::Storage,
};

/// Union in progress; convert with [`repair`](LazyBitmap::repair).
#[derive(Clone, Debug, Default)]
pub struct LazyBitmap {
    directory: ContainerDirectory,
}

impl LazyBitmap {
    pub fn new() -> LazyBitmap {
        LazyBitmap::default()
    }

    pub(crate) fn from_directory(directory: ContainerDirectory) -> LazyBitmap {
        LazyBitmap { directory }
    }

    /// Adds `other` to the union.
    pub fn or_with<S: Storage>(&mut self, other: &BitmapBase<S>) {
        self.directory
            .merge_in_place(SetOp::LazyOr, other.directory());
    }

    /// Number of containers accumulated so far.
    pub fn container_count(&self) -> usize {
        self.directory.len()
    }

    /// Recounts pending containers and returns the finished union.
    pub fn repair(mut self) -> Bitmap {
        self.directory
            .containers_mut()
            .for_each(|container| container.repair_after_lazy());
        Bitmap::from_directory(self.directory)
    }
}

impl<'a, S: Storage> Extend<&'a BitmapBase<S>> for LazyBitmap {
    fn extend<I: IntoIterator<Item = &'a BitmapBase<S>>>(&mut self, iter: I) {
        for bitmap in iter {
            self.or_with(bitmap);
        }
    }
}
