//! Sorted-array container payload.

use std::ops::Range;

use itertools::Itertools;

use crate::{
    container::{
        ARRAY_MAX_LEN,
        bitmap::BitmapContainer,
        run::{Run, RunContainer},
    },
    util,
};

/// Strictly increasing list of 16-bit values.
///
/// Containers keep arrays at or below [`ARRAY_MAX_LEN`] values; above that the
/// owning [`Container`](super::Container) promotes to a bitmap.
#[derive(Clone, Debug, Default)]
pub struct ArrayContainer<V = Vec<u16>> {
    values: V,
}

impl<V: AsRef<[u16]>> ArrayContainer<V> {
    /// Wraps sorted, unique values.
    pub fn wrap(values: V) -> ArrayContainer<V> {
        #[cfg(debug_assertions)]
        assert!(util::is_strictly_increasing(values.as_ref()));
        ArrayContainer { values }
    }

    /// Wraps values read from untrusted input; see [`Container::validate`].
    ///
    /// [`Container::validate`]: crate::container::Container::validate
    pub(crate) fn wrap_unchecked(values: V) -> ArrayContainer<V> {
        ArrayContainer { values }
    }

    #[inline]
    pub fn values(&self) -> &[u16] {
        self.values.as_ref()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        self.values().binary_search(&value).is_ok()
    }

    /// Number of values `<= value`.
    pub fn rank(&self, value: u16) -> usize {
        self.values().partition_point(|&v| v <= value)
    }

    pub fn select(&self, index: usize) -> Option<u16> {
        self.values().get(index).copied()
    }

    pub fn first(&self) -> Option<u16> {
        self.values().first().copied()
    }

    pub fn last(&self) -> Option<u16> {
        self.values().last().copied()
    }

    /// Smallest value `>= from`.
    pub fn next_value(&self, from: u16) -> Option<u16> {
        let index = self.lower_bound(from as u32);
        self.values().get(index).copied()
    }

    /// Largest value `<= from`.
    pub fn prev_value(&self, from: u16) -> Option<u16> {
        let index = self.rank(from);
        index.checked_sub(1).map(|i| self.values()[i])
    }

    /// Smallest value `>= from` that is not in the container.
    pub fn next_absent(&self, from: u16) -> Option<u16> {
        let values = self.values();
        let mut index = self.lower_bound(from as u32);
        let mut candidate = from as u32;
        while index < values.len() && values[index] as u32 == candidate {
            candidate += 1;
            index += 1;
        }
        u16::try_from(candidate).ok()
    }

    /// Largest value `<= from` that is not in the container.
    pub fn prev_absent(&self, from: u16) -> Option<u16> {
        let values = self.values();
        let mut index = self.rank(from);
        let mut candidate = from as i32;
        while index > 0 && values[index - 1] as i32 == candidate {
            candidate -= 1;
            index -= 1;
        }
        u16::try_from(candidate).ok()
    }

    /// Number of values in `range`; `range.end <= 65536`.
    pub fn range_cardinality(&self, range: Range<u32>) -> usize {
        if range.start >= range.end {
            return 0;
        }
        self.lower_bound(range.end) - self.lower_bound(range.start)
    }

    /// Whether every value of `range` is present.
    pub fn contains_range(&self, range: Range<u32>) -> bool {
        if range.start >= range.end {
            return true;
        }
        self.range_cardinality(range.clone()) == (range.end - range.start) as usize
    }

    /// Whether any value of `range` is present.
    pub fn intersects_range(&self, range: Range<u32>) -> bool {
        range.start < range.end && self.lower_bound(range.start) < self.lower_bound(range.end)
    }

    /// Number of maximal runs of consecutive values.
    pub fn count_runs(&self) -> usize {
        let values = self.values();
        if values.is_empty() {
            return 0;
        }
        1 + values
            .windows(2)
            .filter(|w| w[0] as u32 + 1 != w[1] as u32)
            .count()
    }

    #[inline]
    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'_, u16>> {
        self.values().iter().copied()
    }

    /// Payload size in the portable format: two bytes per value.
    pub fn serialized_size_in_bytes(&self) -> usize {
        2 * self.len()
    }

    pub fn heap_size_bytes(&self) -> usize {
        std::mem::size_of_val(self.values())
    }

    pub fn to_owned_array(&self) -> ArrayContainer {
        ArrayContainer {
            values: self.values().to_vec(),
        }
    }

    pub fn to_bitmap(&self) -> BitmapContainer {
        let mut bitmap = BitmapContainer::empty();
        bitmap.insert_many(self.iter());
        bitmap
    }

    pub fn to_run(&self) -> RunContainer {
        let runs = self
            .iter()
            .map(|v| (v, v))
            .coalesce(|(first, last), (next, next_last)| {
                if last as u32 + 1 == next as u32 {
                    Ok((first, next_last))
                } else {
                    Err(((first, last), (next, next_last)))
                }
            })
            .map(|(first, last)| Run::new(first, last))
            .collect();
        RunContainer::wrap(runs)
    }

    pub fn and<V2: AsRef<[u16]>>(&self, other: &ArrayContainer<V2>) -> ArrayContainer {
        let mut values = Vec::new();
        util::intersect_sorted(self.values(), other.values(), &mut values);
        ArrayContainer { values }
    }

    /// Union as a sorted vector; the result may exceed [`ARRAY_MAX_LEN`] and is
    /// classified by the caller.
    pub fn or_values<V2: AsRef<[u16]>>(&self, other: &ArrayContainer<V2>) -> Vec<u16> {
        let mut values = Vec::new();
        util::union_sorted(self.values(), other.values(), &mut values);
        values
    }

    /// Symmetric difference as a sorted vector, classified by the caller.
    pub fn xor_values<V2: AsRef<[u16]>>(&self, other: &ArrayContainer<V2>) -> Vec<u16> {
        let mut values = Vec::new();
        util::symmetric_difference_sorted(self.values(), other.values(), &mut values);
        values
    }

    pub fn and_not<V2: AsRef<[u16]>>(&self, other: &ArrayContainer<V2>) -> ArrayContainer {
        let mut values = Vec::with_capacity(self.len());
        util::difference_sorted(self.values(), other.values(), &mut values);
        ArrayContainer { values }
    }

    /// Keeps the values for which `predicate` holds.
    pub fn filter(&self, predicate: impl Fn(u16) -> bool) -> ArrayContainer {
        ArrayContainer {
            values: self.iter().filter(|&v| predicate(v)).collect(),
        }
    }

    pub fn and_cardinality<V2: AsRef<[u16]>>(&self, other: &ArrayContainer<V2>) -> usize {
        util::intersection_count(self.values(), other.values())
    }

    pub fn intersects<V2: AsRef<[u16]>>(&self, other: &ArrayContainer<V2>) -> bool {
        util::intersects_sorted(self.values(), other.values())
    }

    /// Values shifted up by `offset`, split into the part that stays below 65536
    /// and the part that wraps into the next key.
    pub fn add_offset(&self, offset: u16) -> (ArrayContainer, ArrayContainer) {
        let values = self.values();
        let split = values.partition_point(|&v| v as u32 + (offset as u32) < 1 << 16);
        let low = values[..split].iter().map(|&v| v + offset).collect();
        let high = values[split..]
            .iter()
            .map(|&v| (v as u32 + offset as u32 - (1 << 16)) as u16)
            .collect();
        (ArrayContainer { values: low }, ArrayContainer { values: high })
    }

    #[inline]
    fn lower_bound(&self, value: u32) -> usize {
        self.values().partition_point(|&v| (v as u32) < value)
    }
}

impl ArrayContainer {
    pub fn new() -> ArrayContainer {
        ArrayContainer { values: Vec::new() }
    }

    pub fn from_range(range: Range<u32>) -> ArrayContainer {
        debug_assert!(range.end <= 1 << 16);
        ArrayContainer {
            values: range.map(|v| v as u16).collect(),
        }
    }

    pub fn into_values(self) -> Vec<u16> {
        self.values
    }

    /// Inserts `value`; returns whether it was absent.
    ///
    /// The caller promotes to a bitmap before the length would exceed
    /// [`ARRAY_MAX_LEN`].
    pub fn insert(&mut self, value: u16) -> bool {
        match self.values.binary_search(&value) {
            Ok(_) => false,
            Err(index) => {
                debug_assert!(self.values.len() < ARRAY_MAX_LEN);
                self.values.insert(index, value);
                true
            }
        }
    }

    /// Removes `value`; returns whether it was present.
    pub fn remove(&mut self, value: u16) -> bool {
        match self.values.binary_search(&value) {
            Ok(index) => {
                self.values.remove(index);
                true
            }
            Err(_) => false,
        }
    }

    pub fn insert_range(&mut self, range: Range<u32>) {
        if range.start >= range.end {
            return;
        }
        let start = self.lower_bound(range.start);
        let end = self.lower_bound(range.end);
        self.values.splice(start..end, range.map(|v| v as u16));
    }

    pub fn remove_range(&mut self, range: Range<u32>) {
        if range.start >= range.end {
            return;
        }
        let start = self.lower_bound(range.start);
        let end = self.lower_bound(range.end);
        self.values.drain(start..end);
    }

    /// Toggles every value of `range`.
    pub fn flip_range(&mut self, range: Range<u32>) {
        if range.start >= range.end {
            return;
        }
        let start = self.lower_bound(range.start);
        let end = self.lower_bound(range.end);
        let present = &self.values[start..end];
        let mut flipped = Vec::with_capacity((range.end - range.start) as usize - present.len());
        let mut next = present.iter().peekable();
        for v in range {
            if next.next_if(|&&p| p as u32 == v).is_none() {
                flipped.push(v as u16);
            }
        }
        self.values.splice(start..end, flipped);
    }

    pub fn shrink_to_fit(&mut self) {
        self.values.shrink_to_fit();
    }
}

impl From<Vec<u16>> for ArrayContainer {
    fn from(values: Vec<u16>) -> Self {
        ArrayContainer::wrap(values)
    }
}
