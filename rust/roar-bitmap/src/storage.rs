//! Storage flavors for container payloads.
//!
//! A [`Storage`] names the three slice holders used by the container variants.
//! [`Owned`] uses growable heap buffers and supports mutation. [`Borrowed`] holds
//! slices of an externally owned byte buffer (for example a memory-mapped file),
//! falling back to a decoded copy when the bytes cannot be reinterpreted in place.
//! Algorithms read through `AsRef` and are written once for both flavors.

use std::{borrow::Cow, fmt::Debug, marker::PhantomData};

use byteorder::{ByteOrder, LittleEndian};

use crate::container::run::Run;

/// Storage capability of a container: how its sorted values, bitmap words and
/// runs are held.
pub trait Storage: Clone + Debug + Send + Sync {
    type Values: AsRef<[u16]> + Clone + Debug + Send + Sync;
    type Words: AsRef<[u64]> + Clone + Debug + Send + Sync;
    type Runs: AsRef<[Run]> + Clone + Debug + Send + Sync;
}

/// Heap-owned, mutable storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct Owned;

impl Storage for Owned {
    type Values = Vec<u16>;
    type Words = Box<[u64]>;
    type Runs = Vec<Run>;
}

/// Read-only storage over a caller-owned buffer with lifetime `'a`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Borrowed<'a>(PhantomData<&'a [u8]>);

impl<'a> Storage for Borrowed<'a> {
    type Values = Cow<'a, [u16]>;
    type Words = Cow<'a, [u64]>;
    type Runs = Cow<'a, [Run]>;
}

/// Allocation of fixed-length word arrays backing bitmap containers.
///
/// `count` is a word count (number of `u64`s), not a bit count.
pub trait WordStore {
    /// Allocate `count` words of `u64`, initialized to zero.
    fn new_zeroed(count: usize) -> Self;

    /// Allocate `count` words of `u64`, initializing every word to `pattern`.
    fn new_with_pattern(count: usize, pattern: u64) -> Self;
}

impl WordStore for Box<[u64]> {
    fn new_zeroed(count: usize) -> Self {
        vec![0u64; count].into_boxed_slice()
    }

    fn new_with_pattern(count: usize, pattern: u64) -> Self {
        vec![pattern; count].into_boxed_slice()
    }
}

/// Reinterprets little-endian bytes as `u16` values without copying when the
/// host is little-endian and `bytes` is suitably aligned; decodes a copy otherwise.
///
/// `bytes.len()` must be even.
pub fn borrow_u16s(bytes: &[u8]) -> Cow<'_, [u16]> {
    debug_assert_eq!(bytes.len() % 2, 0);
    if cfg!(target_endian = "little") {
        if let Ok(values) = bytemuck::try_cast_slice(bytes) {
            return Cow::Borrowed(values);
        }
    }
    Cow::Owned(bytes.chunks_exact(2).map(LittleEndian::read_u16).collect())
}

/// Same as [`borrow_u16s`] for 64-bit words. `bytes.len()` must be a multiple of 8.
pub fn borrow_u64s(bytes: &[u8]) -> Cow<'_, [u64]> {
    debug_assert_eq!(bytes.len() % 8, 0);
    if cfg!(target_endian = "little") {
        if let Ok(words) = bytemuck::try_cast_slice(bytes) {
            return Cow::Borrowed(words);
        }
    }
    Cow::Owned(bytes.chunks_exact(8).map(LittleEndian::read_u64).collect())
}

/// Same as [`borrow_u16s`] for `(start, length - 1)` run pairs.
/// `bytes.len()` must be a multiple of 4.
pub fn borrow_runs(bytes: &[u8]) -> Cow<'_, [Run]> {
    debug_assert_eq!(bytes.len() % 4, 0);
    if cfg!(target_endian = "little") {
        if let Ok(runs) = bytemuck::try_cast_slice(bytes) {
            return Cow::Borrowed(runs);
        }
    }
    Cow::Owned(
        bytes
            .chunks_exact(4)
            .map(|pair| Run {
                start: LittleEndian::read_u16(&pair[0..2]),
                length: LittleEndian::read_u16(&pair[2..4]),
            })
            .collect(),
    )
}
