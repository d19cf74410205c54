//! Compressed set of `u32` values.
//!
//! A [`BitmapBase`] is a [`ContainerDirectory`] plus the set API: membership,
//! order statistics, set algebra, range operations, value shifting and
//! iteration.
//!
//! Flavors
//! - [`Bitmap`] owns its containers and supports mutation.
//! - [`FrozenBitmap`] borrows the payloads of a serialized buffer (see
//!   [`FrozenBitmap::view`]). Every operation producing a new set returns an
//!   owned [`Bitmap`], so the buffer is never written.
//!
//! Binary operations accept any pair of flavors. Pure forms (`and`, `or`, ...)
//! leave both operands untouched; the `*_with` forms update an owned receiver.
//!
//! Range arguments are half-open `Range<u64>` within `[0, 2^32]`, so the
//! largest value can be addressed with `x..(1 << 32)`.

use std::{
    fmt,
    ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Range, Sub, SubAssign},
};

use roar_common::{Error, Result, verify_arg};

use crate::{
    batch::BatchIter,
    container::{CONTAINER_SPAN, Container, ContainerKind, SetOp},
    directory::ContainerDirectory,
    iter::{Iter, SignedIter},
    lazy::LazyBitmap,
    storage::{Borrowed, Owned, Storage},
    util,
};

/// Exclusive upper bound of the value domain.
const DOMAIN_END: u64 = 1 << 32;

/// A compressed bitmap over the storage flavor `S`.
#[derive(Clone)]
pub struct BitmapBase<S: Storage = Owned> {
    pub(crate) directory: ContainerDirectory<S>,
}

/// Heap-owned, mutable bitmap.
pub type Bitmap = BitmapBase<Owned>;

/// Read-only bitmap over a serialized buffer.
pub type FrozenBitmap<'a> = BitmapBase<Borrowed<'a>>;

/// Summary of a bitmap's internal layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitmapStats {
    /// Total number of values.
    pub cardinality: u64,
    pub container_count: usize,
    pub array_containers: usize,
    pub bitmap_containers: usize,
    pub run_containers: usize,
    /// Values held by array containers.
    pub array_values: u64,
    /// Values held by bitmap containers.
    pub bitmap_values: u64,
    /// Values held by run containers.
    pub run_values: u64,
    /// Runs stored across all run containers.
    pub run_count: usize,
    /// Size of the portable serialization.
    pub serialized_bytes: usize,
    /// Heap bytes owned by the directory and its containers.
    pub heap_bytes: usize,
}

impl<S: Storage> BitmapBase<S> {
    pub(crate) fn from_directory(directory: ContainerDirectory<S>) -> BitmapBase<S> {
        BitmapBase { directory }
    }

    pub fn directory(&self) -> &ContainerDirectory<S> {
        &self.directory
    }

    /// Number of values.
    pub fn len(&self) -> u64 {
        self.directory.cardinality()
    }

    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }

    /// Number of non-empty containers.
    pub fn container_count(&self) -> usize {
        self.directory.len()
    }

    pub fn contains(&self, value: u32) -> bool {
        let (key, low) = util::split(value);
        self.directory.get(key).is_some_and(|c| c.contains(low))
    }

    /// Whether every value of `range` is present; true for an empty range.
    pub fn contains_range(&self, range: Range<u64>) -> Result<bool> {
        check_range(&range)?;
        for (key, low_range) in key_ranges(range) {
            match self.directory.get(key) {
                Some(container) if container.contains_range(low_range)? => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Whether any value of `range` is present.
    pub fn intersects_range(&self, range: Range<u64>) -> Result<bool> {
        check_range(&range)?;
        for (key, container) in self.containers_within(&range) {
            if container.intersects_range(low_range(key, &range))? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Number of values inside `range`.
    pub fn range_cardinality(&self, range: Range<u64>) -> Result<u64> {
        check_range(&range)?;
        let mut count = 0;
        for (key, container) in self.containers_within(&range) {
            count += container.range_cardinality(low_range(key, &range))? as u64;
        }
        Ok(count)
    }

    /// Number of values `<= value`.
    pub fn rank(&self, value: u32) -> u64 {
        let (key, low) = util::split(value);
        let mut rank = 0;
        for (k, container) in self.directory.iter() {
            if k < key {
                rank += container.len() as u64;
            } else {
                if k == key {
                    rank += container.rank(low) as u64;
                }
                break;
            }
        }
        rank
    }

    /// The `index`-th smallest value (0-based).
    pub fn select(&self, index: u64) -> Result<u32> {
        if self.is_empty() {
            return Err(Error::empty_container("select"));
        }
        let mut remaining = index;
        for (key, container) in self.directory.iter() {
            let len = container.len() as u64;
            if remaining < len {
                return Ok(util::combine(key, container.select(remaining as usize)?));
            }
            remaining -= len;
        }
        Err(Error::out_of_range(index, self.len()))
    }

    /// Smallest value; fails on an empty bitmap.
    pub fn first(&self) -> Result<u32> {
        let (key, container) = self
            .directory
            .iter()
            .next()
            .ok_or_else(|| Error::empty_container("first"))?;
        Ok(util::combine(key, container.first()?))
    }

    /// Largest value; fails on an empty bitmap.
    pub fn last(&self) -> Result<u32> {
        let (key, container) = self
            .directory
            .iter()
            .next_back()
            .ok_or_else(|| Error::empty_container("last"))?;
        Ok(util::combine(key, container.last()?))
    }

    pub fn min(&self) -> Option<u32> {
        self.first().ok()
    }

    pub fn max(&self) -> Option<u32> {
        self.last().ok()
    }

    /// Smallest value `>= from`.
    pub fn next_value(&self, from: u32) -> Option<u32> {
        let (key, low) = util::split(from);
        let start = self.directory.locate_from(0, key);
        (start..self.directory.len()).find_map(|index| {
            let (k, container) = self.directory.entry(index);
            let found = if k == key {
                container.next_value(low)
            } else {
                container.first().ok()
            };
            found.map(|v| util::combine(k, v))
        })
    }

    /// Largest value `<= from`.
    pub fn prev_value(&self, from: u32) -> Option<u32> {
        let (key, low) = util::split(from);
        let end = match self.directory.locate(key) {
            Ok(index) => index + 1,
            Err(index) => index,
        };
        (0..end).rev().find_map(|index| {
            let (k, container) = self.directory.entry(index);
            let found = if k == key {
                container.prev_value(low)
            } else {
                container.last().ok()
            };
            found.map(|v| util::combine(k, v))
        })
    }

    /// Smallest absent value `>= from`.
    pub fn next_absent_value(&self, from: u32) -> Option<u32> {
        let mut value = from as u64;
        let mut index = self.directory.locate_from(0, util::split(from).0);
        loop {
            let (key, low) = util::split(value as u32);
            if index >= self.directory.len() || self.directory.keys()[index] != key {
                return Some(value as u32);
            }
            let (_, container) = self.directory.entry(index);
            match container.next_absent(low) {
                Some(absent) => return Some(util::combine(key, absent)),
                None => {
                    value = (key as u64 + 1) << 16;
                    if value >= DOMAIN_END {
                        return None;
                    }
                    index += 1;
                }
            }
        }
    }

    /// Largest absent value `<= from`.
    pub fn prev_absent_value(&self, from: u32) -> Option<u32> {
        let mut value = from;
        let mut index = match self.directory.locate(util::split(from).0) {
            Ok(index) => Some(index),
            Err(index) => index.checked_sub(1),
        };
        loop {
            let (key, low) = util::split(value);
            let Some(i) = index.filter(|&i| self.directory.keys()[i] == key) else {
                return Some(value);
            };
            let (_, container) = self.directory.entry(i);
            match container.prev_absent(low) {
                Some(absent) => return Some(util::combine(key, absent)),
                None if key == 0 => return None,
                None => {
                    value = ((key as u32) << 16) - 1;
                    index = i.checked_sub(1);
                }
            }
        }
    }

    /// Whether the two sets share a value.
    pub fn intersects<S2: Storage>(&self, other: &BitmapBase<S2>) -> bool {
        self.directory.intersects(&other.directory)
    }

    /// Whether every value of `self` is in `other`.
    pub fn is_subset<S2: Storage>(&self, other: &BitmapBase<S2>) -> bool {
        self.directory.is_subset(&other.directory)
    }

    pub fn and_cardinality<S2: Storage>(&self, other: &BitmapBase<S2>) -> u64 {
        self.directory.and_cardinality(&other.directory)
    }

    pub fn or_cardinality<S2: Storage>(&self, other: &BitmapBase<S2>) -> u64 {
        self.len() + other.len() - self.and_cardinality(other)
    }

    pub fn xor_cardinality<S2: Storage>(&self, other: &BitmapBase<S2>) -> u64 {
        self.len() + other.len() - 2 * self.and_cardinality(other)
    }

    pub fn and_not_cardinality<S2: Storage>(&self, other: &BitmapBase<S2>) -> u64 {
        self.len() - self.and_cardinality(other)
    }

    /// `|A ∩ B| / |A ∪ B|`; two empty sets are considered identical (1.0).
    pub fn jaccard_index<S2: Storage>(&self, other: &BitmapBase<S2>) -> f64 {
        let and = self.and_cardinality(other);
        let or = self.len() + other.len() - and;
        if or == 0 { 1.0 } else { and as f64 / or as f64 }
    }

    /// The `n` smallest values.
    pub fn limit(&self, n: u64) -> Bitmap {
        let mut out = Bitmap::new();
        let mut remaining = n;
        for (key, container) in self.directory.iter() {
            if remaining == 0 {
                break;
            }
            let len = container.len() as u64;
            if len <= remaining {
                out.directory.append(key, container.materialize());
                remaining -= len;
            } else {
                let values = container.iter().take(remaining as usize).collect();
                out.directory
                    .append(key, Container::from_sorted_values(values));
                remaining = 0;
            }
        }
        out
    }

    pub fn to_vec(&self) -> Vec<u32> {
        let mut values = Vec::with_capacity(self.len() as usize);
        values.extend(self.iter());
        values
    }

    /// Ascending iterator; `.rev()` iterates in descending order.
    pub fn iter(&self) -> Iter<'_, S> {
        Iter::new(&self.directory)
    }

    /// Values reinterpreted as `i32`, in ascending signed order.
    pub fn iter_signed(&self) -> SignedIter<'_, S> {
        SignedIter::new(&self.directory)
    }

    /// Bulk extraction into caller-provided buffers.
    pub fn batch_iter(&self) -> BatchIter<'_, S> {
        BatchIter::new(self.iter())
    }

    pub fn and<S2: Storage>(&self, other: &BitmapBase<S2>) -> Bitmap {
        Bitmap::from_directory(self.directory.merge(SetOp::And, &other.directory))
    }

    pub fn or<S2: Storage>(&self, other: &BitmapBase<S2>) -> Bitmap {
        Bitmap::from_directory(self.directory.merge(SetOp::Or, &other.directory))
    }

    pub fn xor<S2: Storage>(&self, other: &BitmapBase<S2>) -> Bitmap {
        Bitmap::from_directory(self.directory.merge(SetOp::Xor, &other.directory))
    }

    /// Values of `self` absent from `other`.
    pub fn and_not<S2: Storage>(&self, other: &BitmapBase<S2>) -> Bitmap {
        Bitmap::from_directory(self.directory.merge(SetOp::AndNot, &other.directory))
    }

    /// Starts a lazy union; see [`LazyBitmap`].
    pub fn lazy_or<S2: Storage>(&self, other: &BitmapBase<S2>) -> LazyBitmap {
        LazyBitmap::from_directory(self.directory.merge(SetOp::LazyOr, &other.directory))
    }

    /// Every value shifted by `offset`; values leaving `[0, 2^32)` are dropped.
    pub fn add_offset(&self, offset: i64) -> Bitmap {
        let span = CONTAINER_SPAN as i64;
        let key_offset = offset.div_euclid(span);
        let low_offset = offset.rem_euclid(span) as u16;
        let mut out = Bitmap::new();
        if key_offset <= -span || key_offset >= span {
            return out;
        }
        let valid_key = |key: i64| (0..span).contains(&key);
        for (key, container) in self.directory.iter() {
            let base = key as i64 + key_offset;
            if low_offset == 0 {
                if valid_key(base) {
                    out.directory.append(base as u16, container.materialize());
                }
                continue;
            }
            let (low, high) = container.add_offset(low_offset);
            for (target, part) in [(base, low), (base + 1, high)] {
                if part.is_empty() || !valid_key(target) {
                    continue;
                }
                let target = target as u16;
                if out.directory.keys().last() == Some(&target) {
                    if let Some((_, last)) = out.directory.last_mut() {
                        last.or_with(&part);
                    }
                } else {
                    out.directory.append(target, part);
                }
            }
        }
        out
    }

    /// Like [`add_offset`](Self::add_offset), but fails with `Overflow` when a
    /// value would leave `[0, 2^32)`.
    pub fn checked_add_offset(&self, offset: i64) -> Result<Bitmap> {
        if let (Some(min), Some(max)) = (self.min(), self.max()) {
            let shifted_min = min as i64 + offset;
            let shifted_max = max as i64 + offset;
            if shifted_min < 0 || shifted_max > u32::MAX as i64 {
                return Err(Error::overflow(format!(
                    "shifting [{min}, {max}] by {offset} leaves the u32 domain"
                )));
            }
        }
        Ok(self.add_offset(offset))
    }

    /// Owned deep copy.
    pub fn materialize(&self) -> Bitmap {
        Bitmap::from_directory(self.directory.materialize())
    }

    /// Summary statistics about the set and its container layout.
    pub fn stats(&self) -> BitmapStats {
        let mut stats = BitmapStats {
            container_count: self.directory.len(),
            serialized_bytes: self.serialized_size_in_bytes(),
            heap_bytes: self.heap_size_bytes(),
            ..Default::default()
        };
        for (_, container) in self.directory.iter() {
            let len = container.len() as u64;
            stats.cardinality += len;
            match container.kind() {
                ContainerKind::Array => {
                    stats.array_containers += 1;
                    stats.array_values += len;
                }
                ContainerKind::Bitmap => {
                    stats.bitmap_containers += 1;
                    stats.bitmap_values += len;
                }
                ContainerKind::Run => {
                    stats.run_containers += 1;
                    stats.run_values += len;
                    stats.run_count += container.count_runs();
                }
            }
        }
        stats
    }

    /// Heap bytes used by the directory and its container payloads.
    pub fn heap_size_bytes(&self) -> usize {
        self.directory.heap_size_bytes()
    }

    /// Containers whose key overlaps `range`, in key order.
    fn containers_within(
        &self,
        range: &Range<u64>,
    ) -> impl Iterator<Item = (u16, &Container<S>)> + '_ {
        let (first_key, last_key) = if range.start < range.end {
            ((range.start >> 16) as u32, ((range.end - 1) >> 16) as u32)
        } else {
            (1, 0)
        };
        let start = self.directory.locate_from(0, first_key.min(0xFFFF) as u16);
        self.directory
            .iter()
            .skip(start)
            .take_while(move |&(key, _)| (key as u32) <= last_key)
            .filter(move |&(key, _)| (key as u32) >= first_key)
    }
}

impl Bitmap {
    pub fn new() -> Bitmap {
        Bitmap::from_directory(ContainerDirectory::default())
    }

    /// Bitmap holding exactly the values of `range`.
    pub fn from_range(range: Range<u64>) -> Result<Bitmap> {
        let mut bitmap = Bitmap::new();
        bitmap.insert_range(range)?;
        Ok(bitmap)
    }

    /// Bitmap holding `values`, in any order and with repetitions.
    pub fn bitmap_of(values: &[u32]) -> Bitmap {
        values.iter().copied().collect()
    }

    /// Builds a bitmap from ascending values, appending without searching.
    /// Repeated values are allowed; a decreasing value is an error.
    pub fn from_sorted_iter(values: impl IntoIterator<Item = u32>) -> Result<Bitmap> {
        let mut bitmap = Bitmap::new();
        let mut previous = None;
        for value in values {
            verify_arg!(values, previous.is_none_or(|p| p <= value));
            previous = Some(value);
            let (key, low) = util::split(value);
            if bitmap.directory.keys().last() == Some(&key) {
                if let Some((_, container)) = bitmap.directory.last_mut() {
                    container.insert(low);
                }
            } else {
                bitmap.directory.append(key, Container::singleton(low));
            }
        }
        Ok(bitmap)
    }

    /// Inserts `value`; returns whether it was absent.
    pub fn insert(&mut self, value: u32) -> bool {
        let (key, low) = util::split(value);
        if let Some((last, container)) = self.directory.last_mut() {
            if last == key {
                return container.insert(low);
            }
        }
        match self.directory.locate(key) {
            Ok(index) => self.directory.container_at_mut(index).insert(low),
            Err(index) => {
                self.directory.insert(index, key, Container::singleton(low));
                true
            }
        }
    }

    /// Removes `value`; returns whether it was present.
    pub fn remove(&mut self, value: u32) -> bool {
        let (key, low) = util::split(value);
        match self.directory.locate(key) {
            Ok(index) => {
                let removed = self.directory.container_at_mut(index).remove(low);
                self.directory.remove_if_empty(index);
                removed
            }
            Err(_) => false,
        }
    }

    /// Toggles `value`.
    pub fn flip(&mut self, value: u32) {
        let (key, low) = util::split(value);
        match self.directory.locate(key) {
            Ok(index) => {
                self.directory.container_at_mut(index).flip(low);
                self.directory.remove_if_empty(index);
            }
            Err(index) => self.directory.insert(index, key, Container::singleton(low)),
        }
    }

    pub fn insert_range(&mut self, range: Range<u64>) -> Result<()> {
        check_range(&range)?;
        for (key, low_range) in key_ranges(range) {
            match self.directory.locate(key) {
                Ok(index) => self
                    .directory
                    .container_at_mut(index)
                    .insert_range(low_range)?,
                Err(index) => {
                    self.directory
                        .insert(index, key, Container::from_range(low_range)?)
                }
            }
        }
        Ok(())
    }

    pub fn remove_range(&mut self, range: Range<u64>) -> Result<()> {
        check_range(&range)?;
        for (key, low_range) in key_ranges(range) {
            if let Ok(index) = self.directory.locate(key) {
                if low_range.len() == CONTAINER_SPAN as usize {
                    self.directory.remove_at(index);
                } else {
                    self.directory
                        .container_at_mut(index)
                        .remove_range(low_range)?;
                    self.directory.remove_if_empty(index);
                }
            }
        }
        Ok(())
    }

    /// Toggles every value of `range`.
    pub fn flip_range(&mut self, range: Range<u64>) -> Result<()> {
        check_range(&range)?;
        for (key, low_range) in key_ranges(range) {
            match self.directory.locate(key) {
                Ok(index) => {
                    self.directory
                        .container_at_mut(index)
                        .flip_range(low_range)?;
                    self.directory.remove_if_empty(index);
                }
                Err(index) => {
                    self.directory
                        .insert(index, key, Container::from_range(low_range)?)
                }
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.directory.clear();
    }

    pub fn and_with<S2: Storage>(&mut self, other: &BitmapBase<S2>) {
        self.directory.merge_in_place(SetOp::And, &other.directory);
    }

    pub fn or_with<S2: Storage>(&mut self, other: &BitmapBase<S2>) {
        self.directory.merge_in_place(SetOp::Or, &other.directory);
    }

    pub fn xor_with<S2: Storage>(&mut self, other: &BitmapBase<S2>) {
        self.directory.merge_in_place(SetOp::Xor, &other.directory);
    }

    pub fn and_not_with<S2: Storage>(&mut self, other: &BitmapBase<S2>) {
        self.directory.merge_in_place(SetOp::AndNot, &other.directory);
    }

    /// Re-encodes containers as runs where that is smaller, and run containers
    /// that stopped paying off as arrays or bitmaps. Returns whether any
    /// container changed.
    pub fn run_optimize(&mut self) -> bool {
        let changed = self
            .directory
            .containers_mut()
            .map(|container| container.run_optimize())
            .filter(|&changed| changed)
            .count();
        log::debug!(
            "run_optimize: {changed} of {} containers re-encoded",
            self.directory.len()
        );
        changed > 0
    }

    /// Converts every run container to an array or bitmap; returns whether any
    /// run container was present.
    pub fn remove_run_compression(&mut self) -> bool {
        self.directory
            .containers_mut()
            .fold(false, |any, container| container.remove_run_compression() | any)
    }

    pub fn shrink_to_fit(&mut self) {
        self.directory.shrink_to_fit();
    }
}

impl Default for Bitmap {
    fn default() -> Self {
        Bitmap::new()
    }
}

impl<S: Storage> fmt::Debug for BitmapBase<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len() <= 16 {
            f.debug_set().entries(self.iter()).finish()
        } else {
            write!(
                f,
                "Bitmap<{} values in {} containers, {}..={}>",
                self.len(),
                self.container_count(),
                self.min().unwrap_or_default(),
                self.max().unwrap_or_default()
            )
        }
    }
}

impl<S: Storage, S2: Storage> PartialEq<BitmapBase<S2>> for BitmapBase<S> {
    fn eq(&self, other: &BitmapBase<S2>) -> bool {
        self.directory == other.directory
    }
}

impl<S: Storage> Eq for BitmapBase<S> {}

impl FromIterator<u32> for Bitmap {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut bitmap = Bitmap::new();
        bitmap.extend(iter);
        bitmap
    }
}

impl<'a> FromIterator<&'a u32> for Bitmap {
    fn from_iter<I: IntoIterator<Item = &'a u32>>(iter: I) -> Self {
        iter.into_iter().copied().collect()
    }
}

impl Extend<u32> for Bitmap {
    fn extend<I: IntoIterator<Item = u32>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<'a> Extend<&'a u32> for Bitmap {
    fn extend<I: IntoIterator<Item = &'a u32>>(&mut self, iter: I) {
        self.extend(iter.into_iter().copied());
    }
}

impl<'a, S: Storage> IntoIterator for &'a BitmapBase<S> {
    type Item = u32;
    type IntoIter = Iter<'a, S>;

    fn into_iter(self) -> Iter<'a, S> {
        self.iter()
    }
}

macro_rules! binary_operator {
    ($trait:ident, $method:ident, $op:ident, $assign_trait:ident, $assign_method:ident, $op_with:ident) => {
        impl<S: Storage, S2: Storage> $trait<&BitmapBase<S2>> for &BitmapBase<S> {
            type Output = Bitmap;

            fn $method(self, rhs: &BitmapBase<S2>) -> Bitmap {
                self.$op(rhs)
            }
        }

        impl<S2: Storage> $assign_trait<&BitmapBase<S2>> for Bitmap {
            fn $assign_method(&mut self, rhs: &BitmapBase<S2>) {
                self.$op_with(rhs);
            }
        }
    };
}

binary_operator!(BitAnd, bitand, and, BitAndAssign, bitand_assign, and_with);
binary_operator!(BitOr, bitor, or, BitOrAssign, bitor_assign, or_with);
binary_operator!(BitXor, bitxor, xor, BitXorAssign, bitxor_assign, xor_with);
binary_operator!(Sub, sub, and_not, SubAssign, sub_assign, and_not_with);

fn check_range(range: &Range<u64>) -> Result<()> {
    verify_arg!(range, range.start <= range.end && range.end <= DOMAIN_END);
    Ok(())
}

/// Low-bit range of `range` within the container of `key`.
fn low_range(key: u16, range: &Range<u64>) -> Range<u32> {
    let base = (key as u64) << 16;
    let start = range.start.max(base) - base;
    let end = range.end.min(base + CONTAINER_SPAN as u64).max(base) - base;
    start.min(end) as u32..end as u32
}

/// Splits a validated, non-empty `range` into per-key low-bit ranges.
fn key_ranges(range: Range<u64>) -> impl Iterator<Item = (u16, Range<u32>)> {
    let keys = if range.start < range.end {
        (range.start >> 16) as u32..(((range.end - 1) >> 16) + 1) as u32
    } else {
        0..0
    };
    keys.map(move |key| (key as u16, low_range(key as u16, &range)))
}
