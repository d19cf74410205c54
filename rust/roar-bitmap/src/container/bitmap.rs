//! Dense bitmap container payload: 65536 bits in 1024 little-endian `u64` words.

use std::ops::{Range, RangeInclusive};

use crate::{
    container::{
        BITMAP_WORDS,
        array::ArrayContainer,
        run::{RunBuilder, RunContainer},
    },
    storage::WordStore,
};

/// Cardinality bookkeeping of a bitmap container.
///
/// Lazy unions skip the per-word population count and leave the container in
/// `PendingRepair`; [`BitmapContainer::repair`] brings it back to `Valid`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    Valid(u32),
    PendingRepair,
}

impl Cardinality {
    pub fn get(self) -> Option<usize> {
        match self {
            Cardinality::Valid(n) => Some(n as usize),
            Cardinality::PendingRepair => None,
        }
    }
}

/// Bit vector over the 16-bit value space with a maintained cardinality.
///
/// Bit `v` is bit `v % 64` of word `v / 64`. Containers hold a bitmap only above
/// [`ARRAY_MAX_LEN`](super::ARRAY_MAX_LEN) values; lower cardinalities demote to
/// an array.
#[derive(Clone, Debug)]
pub struct BitmapContainer<W = Box<[u64]>> {
    words: W,
    cardinality: Cardinality,
}

impl<W: AsRef<[u64]>> BitmapContainer<W> {
    /// Wraps `words` whose population count is `cardinality`.
    ///
    /// Panics: if `words` does not hold exactly [`BITMAP_WORDS`] words.
    pub fn wrap(words: W, cardinality: usize) -> BitmapContainer<W> {
        assert_eq!(words.as_ref().len(), BITMAP_WORDS);
        BitmapContainer {
            words,
            cardinality: Cardinality::Valid(cardinality as u32),
        }
    }

    #[inline]
    pub fn words(&self) -> &[u64] {
        self.words.as_ref()
    }

    #[inline]
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Number of set bits.
    ///
    /// Panics: if the container is pending repair after a lazy union.
    #[inline]
    pub fn len(&self) -> usize {
        match self.cardinality.get() {
            Some(n) => n,
            None => panic!("bitmap container cardinality read before repair"),
        }
    }

    /// Whether no bit is set; valid in either cardinality state.
    pub fn is_empty(&self) -> bool {
        match self.cardinality {
            Cardinality::Valid(n) => n == 0,
            Cardinality::PendingRepair => self.words().iter().all(|&w| w == 0),
        }
    }

    /// Population count of the words, independent of the maintained cardinality.
    pub fn count_ones(&self) -> usize {
        self.words().iter().map(|w| w.count_ones() as usize).sum()
    }

    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        (self.words()[value as usize / 64] >> (value % 64)) & 1 != 0
    }

    /// Number of set bits `<= value`.
    pub fn rank(&self, value: u16) -> usize {
        let (word_index, bit) = (value as usize / 64, value as u32 % 64);
        self.words()[..word_index]
            .iter()
            .map(|w| w.count_ones() as usize)
            .sum::<usize>()
            + (self.words()[word_index] << (63 - bit)).count_ones() as usize
    }

    /// Position of the `index`-th set bit (0-based).
    pub fn select(&self, index: usize) -> Option<u16> {
        let mut remaining = index as u32;
        for (word_index, &word) in self.words().iter().enumerate() {
            let ones = word.count_ones();
            if remaining < ones {
                return Some((word_index * 64) as u16 + select_in_word(word, remaining));
            }
            remaining -= ones;
        }
        None
    }

    pub fn first(&self) -> Option<u16> {
        self.next_value(0)
    }

    pub fn last(&self) -> Option<u16> {
        self.prev_value(u16::MAX)
    }

    /// Smallest set bit `>= from`.
    pub fn next_value(&self, from: u16) -> Option<u16> {
        next_set_bit(self.words(), from as u32).map(|v| v as u16)
    }

    /// Largest set bit `<= from`.
    pub fn prev_value(&self, from: u16) -> Option<u16> {
        prev_set_bit(self.words(), from as u32).map(|v| v as u16)
    }

    /// Smallest clear bit `>= from`.
    pub fn next_absent(&self, from: u16) -> Option<u16> {
        let words = self.words();
        let mut word_index = from as usize / 64;
        let mut word = !words[word_index] & (u64::MAX << (from % 64));
        loop {
            if word != 0 {
                return Some((word_index * 64) as u16 + word.trailing_zeros() as u16);
            }
            word_index += 1;
            if word_index == BITMAP_WORDS {
                return None;
            }
            word = !words[word_index];
        }
    }

    /// Largest clear bit `<= from`.
    pub fn prev_absent(&self, from: u16) -> Option<u16> {
        let words = self.words();
        let mut word_index = from as usize / 64;
        let mut word = !words[word_index] & (u64::MAX >> (63 - from % 64));
        loop {
            if word != 0 {
                return Some((word_index * 64) as u16 + 63 - word.leading_zeros() as u16);
            }
            if word_index == 0 {
                return None;
            }
            word_index -= 1;
            word = !words[word_index];
        }
    }

    /// Number of set bits in `range`; `range.end <= 65536`.
    pub fn range_cardinality(&self, range: Range<u32>) -> usize {
        let words = self.words();
        range_masks(range)
            .map(|(i, mask)| (words[i] & mask).count_ones() as usize)
            .sum()
    }

    pub fn contains_range(&self, range: Range<u32>) -> bool {
        let words = self.words();
        range_masks(range).all(|(i, mask)| words[i] & mask == mask)
    }

    pub fn intersects_range(&self, range: Range<u32>) -> bool {
        let words = self.words();
        range_masks(range).any(|(i, mask)| words[i] & mask != 0)
    }

    /// Number of maximal runs of set bits.
    pub fn count_runs(&self) -> usize {
        // A run starts at bit i when bit i is set and bit i - 1 is clear; bit -1 is
        // treated as clear and the previous word's MSB carries into bit 0.
        let mut runs = 0usize;
        let mut prev_word = 0u64;
        for &word in self.words() {
            let starts = word & !((word << 1) | (prev_word >> 63));
            runs += starts.count_ones() as usize;
            prev_word = word;
        }
        runs
    }

    /// Payload size in the portable format.
    pub fn serialized_size_in_bytes(&self) -> usize {
        BITMAP_WORDS * 8
    }

    pub fn heap_size_bytes(&self) -> usize {
        std::mem::size_of_val(self.words())
    }

    pub fn to_owned_bitmap(&self) -> BitmapContainer {
        BitmapContainer {
            words: self.words().into(),
            cardinality: self.cardinality,
        }
    }

    pub fn to_array(&self) -> ArrayContainer {
        let mut values = Vec::with_capacity(self.cardinality.get().unwrap_or(0));
        for (word_index, &word) in self.words().iter().enumerate() {
            let mut word = word;
            let base = (word_index * 64) as u16;
            while word != 0 {
                values.push(base + word.trailing_zeros() as u16);
                word &= word - 1;
            }
        }
        ArrayContainer::wrap(values)
    }

    pub fn to_run(&self) -> RunContainer {
        let mut builder = RunBuilder::default();
        for (word_index, &word) in self.words().iter().enumerate() {
            let base = (word_index * 64) as u32;
            let mut word = word;
            while word != 0 {
                let start = word.trailing_zeros();
                let ones = (word >> start).trailing_ones();
                builder.push_range(base + start..base + start + ones);
                let consumed = start + ones;
                word = if consumed >= 64 { 0 } else { word & (u64::MAX << consumed) };
            }
        }
        builder.finish()
    }

    /// Word-wise AND. Callers expecting a sparse result use `and_to_array`.
    pub fn and<W2: AsRef<[u64]>>(&self, other: &BitmapContainer<W2>) -> BitmapContainer {
        self.combine(other, |a, b| a & b)
    }

    pub fn or<W2: AsRef<[u64]>>(&self, other: &BitmapContainer<W2>) -> BitmapContainer {
        self.combine(other, |a, b| a | b)
    }

    pub fn xor<W2: AsRef<[u64]>>(&self, other: &BitmapContainer<W2>) -> BitmapContainer {
        self.combine(other, |a, b| a ^ b)
    }

    pub fn and_not<W2: AsRef<[u64]>>(&self, other: &BitmapContainer<W2>) -> BitmapContainer {
        self.combine(other, |a, b| a & !b)
    }

    pub fn and_cardinality<W2: AsRef<[u64]>>(&self, other: &BitmapContainer<W2>) -> usize {
        self.words()
            .iter()
            .zip(other.words())
            .map(|(a, b)| (a & b).count_ones() as usize)
            .sum()
    }

    pub fn intersects<W2: AsRef<[u64]>>(&self, other: &BitmapContainer<W2>) -> bool {
        self.words()
            .iter()
            .zip(other.words())
            .any(|(a, b)| a & b != 0)
    }

    /// Intersection materialized directly as a sorted array of the set bits.
    pub fn and_to_array<W2: AsRef<[u64]>>(&self, other: &BitmapContainer<W2>) -> ArrayContainer {
        let mut values = Vec::new();
        for (word_index, (a, b)) in self.words().iter().zip(other.words()).enumerate() {
            let mut word = a & b;
            let base = (word_index * 64) as u16;
            while word != 0 {
                values.push(base + word.trailing_zeros() as u16);
                word &= word - 1;
            }
        }
        ArrayContainer::wrap(values)
    }

    /// Bits of this bitmap inside the given ranges, as a fresh bitmap.
    pub fn retain_ranges(&self, ranges: impl Iterator<Item = Range<u32>>) -> BitmapContainer {
        let source = self.words();
        let mut words: Box<[u64]> = WordStore::new_zeroed(BITMAP_WORDS);
        for range in ranges {
            for (i, mask) in range_masks(range) {
                words[i] |= source[i] & mask;
            }
        }
        BitmapContainer::from_words(words)
    }

    /// Bits shifted up by `offset`, split into the part that stays below 65536 and
    /// the part that wraps into the next key.
    pub fn add_offset(&self, offset: u16) -> (BitmapContainer, BitmapContainer) {
        let words = self.words();
        let (word_shift, bit_shift) = (offset as usize / 64, offset as u32 % 64);
        // Shifted image over 2048 words; the upper half lands in the next key.
        let shifted = |target: usize| -> u64 {
            let word_at = |i: usize| -> u64 {
                i.checked_sub(word_shift)
                    .and_then(|source| words.get(source).copied())
                    .unwrap_or(0)
            };
            if bit_shift == 0 {
                word_at(target)
            } else {
                let carry = target
                    .checked_sub(1)
                    .map(|i| word_at(i) >> (64 - bit_shift))
                    .unwrap_or(0);
                (word_at(target) << bit_shift) | carry
            }
        };
        let mut low: Box<[u64]> = WordStore::new_zeroed(BITMAP_WORDS);
        let mut high: Box<[u64]> = WordStore::new_zeroed(BITMAP_WORDS);
        for (i, word) in low.iter_mut().enumerate() {
            *word = shifted(i);
        }
        for (i, word) in high.iter_mut().enumerate() {
            *word = shifted(BITMAP_WORDS + i);
        }
        (BitmapContainer::from_words(low), BitmapContainer::from_words(high))
    }

    fn combine<W2: AsRef<[u64]>>(
        &self,
        other: &BitmapContainer<W2>,
        op: impl Fn(u64, u64) -> u64,
    ) -> BitmapContainer {
        let mut cardinality = 0u32;
        let words: Box<[u64]> = self
            .words()
            .iter()
            .zip(other.words())
            .map(|(&a, &b)| {
                let word = op(a, b);
                cardinality += word.count_ones();
                word
            })
            .collect();
        BitmapContainer {
            words,
            cardinality: Cardinality::Valid(cardinality),
        }
    }
}

impl BitmapContainer {
    pub fn empty() -> BitmapContainer {
        BitmapContainer {
            words: WordStore::new_zeroed(BITMAP_WORDS),
            cardinality: Cardinality::Valid(0),
        }
    }

    pub fn full() -> BitmapContainer {
        BitmapContainer {
            words: WordStore::new_with_pattern(BITMAP_WORDS, u64::MAX),
            cardinality: Cardinality::Valid(1 << 16),
        }
    }

    /// Takes ownership of `words`, counting the cardinality.
    pub fn from_words(words: Box<[u64]>) -> BitmapContainer {
        assert_eq!(words.len(), BITMAP_WORDS);
        let cardinality = words.iter().map(|w| w.count_ones()).sum();
        BitmapContainer {
            words,
            cardinality: Cardinality::Valid(cardinality),
        }
    }

    pub fn from_range(range: Range<u32>) -> BitmapContainer {
        let mut bitmap = BitmapContainer::empty();
        bitmap.insert_range(range);
        bitmap
    }

    /// Sets bit `value`; returns whether it was clear.
    #[inline]
    pub fn insert(&mut self, value: u16) -> bool {
        let word = &mut self.words[value as usize / 64];
        let previous = *word;
        *word |= 1u64 << (value % 64);
        let added = ((previous ^ *word) >> (value % 64)) as u32;
        self.adjust_cardinality(added as i64);
        added != 0
    }

    /// Clears bit `value`; returns whether it was set.
    #[inline]
    pub fn remove(&mut self, value: u16) -> bool {
        let word = &mut self.words[value as usize / 64];
        let previous = *word;
        *word &= !(1u64 << (value % 64));
        let removed = ((previous ^ *word) >> (value % 64)) as u32;
        self.adjust_cardinality(-(removed as i64));
        removed != 0
    }

    /// Toggles bit `value`.
    pub fn flip(&mut self, value: u16) {
        let word = &mut self.words[value as usize / 64];
        let mask = 1u64 << (value % 64);
        let delta = if *word & mask == 0 { 1 } else { -1 };
        *word ^= mask;
        self.adjust_cardinality(delta);
    }

    /// Sets every value yielded by `values`, maintaining the cardinality.
    pub fn insert_many(&mut self, values: impl Iterator<Item = u16>) {
        for value in values {
            self.insert(value);
        }
    }

    pub fn insert_range(&mut self, range: Range<u32>) {
        self.process_range(range, |word, mask| *word |= mask);
    }

    pub fn remove_range(&mut self, range: Range<u32>) {
        self.process_range(range, |word, mask| *word &= !mask);
    }

    pub fn flip_range(&mut self, range: Range<u32>) {
        self.process_range(range, |word, mask| *word ^= mask);
    }

    /// In-place word-wise combination with another bitmap.
    pub fn combine_in_place<W2: AsRef<[u64]>>(
        &mut self,
        other: &BitmapContainer<W2>,
        op: impl Fn(u64, u64) -> u64,
    ) {
        let mut cardinality = 0u32;
        for (a, &b) in self.words.iter_mut().zip(other.words()) {
            *a = op(*a, b);
            cardinality += a.count_ones();
        }
        self.cardinality = Cardinality::Valid(cardinality);
    }

    /// Word-wise OR that leaves the cardinality pending repair.
    pub fn lazy_or<W2: AsRef<[u64]>>(&mut self, other: &BitmapContainer<W2>) {
        for (a, &b) in self.words.iter_mut().zip(other.words()) {
            *a |= b;
        }
        self.cardinality = Cardinality::PendingRepair;
    }

    /// Sets the bits of `values` and leaves the cardinality pending repair.
    pub fn lazy_insert_many(&mut self, values: impl Iterator<Item = u16>) {
        for value in values {
            self.words[value as usize / 64] |= 1u64 << (value % 64);
        }
        self.cardinality = Cardinality::PendingRepair;
    }

    /// Sets the bits of `range` and leaves the cardinality pending repair.
    pub fn lazy_insert_range(&mut self, range: Range<u32>) {
        for (i, mask) in range_masks(range) {
            self.words[i] |= mask;
        }
        self.cardinality = Cardinality::PendingRepair;
    }

    /// Recounts the cardinality after lazy unions.
    pub fn repair(&mut self) {
        self.cardinality = Cardinality::Valid(self.count_ones() as u32);
    }

    /// Applies `mask_fn` to every word overlapping `range` with a mask of the bits
    /// inside the range, tracking the cardinality through a pre/post popcount.
    fn process_range(&mut self, range: Range<u32>, mask_fn: impl Fn(&mut u64, u64)) {
        let mut delta = 0i64;
        for (i, mask) in range_masks(range) {
            let word = &mut self.words[i];
            let before = (*word & mask).count_ones() as i64;
            mask_fn(word, mask);
            delta += (*word & mask).count_ones() as i64 - before;
        }
        self.adjust_cardinality(delta);
    }

    #[inline]
    fn adjust_cardinality(&mut self, delta: i64) {
        if let Cardinality::Valid(n) = &mut self.cardinality {
            *n = (*n as i64 + delta) as u32;
        }
    }
}

impl Default for BitmapContainer {
    fn default() -> Self {
        BitmapContainer::empty()
    }
}

/// Position of the `n`-th set bit of `word` (0-based); `n < word.count_ones()`.
#[inline]
fn select_in_word(mut word: u64, n: u32) -> u16 {
    for _ in 0..n {
        word &= word - 1;
    }
    word.trailing_zeros() as u16
}

/// Yields `(word_index, mask)` for every word overlapping `range`, where `mask`
/// selects the bits of that word inside the range.
///
/// Handles ranges that start or end exactly on a word boundary, and `range.end`
/// equal to 65536. Empty ranges yield nothing.
pub(crate) fn range_masks(range: Range<u32>) -> impl Iterator<Item = (usize, u64)> {
    debug_assert!(range.end <= 1 << 16);
    let (start, end) = (range.start as usize, range.end as usize);
    let words: RangeInclusive<usize> = if start < end {
        start / 64..=(end - 1) / 64
    } else {
        // Empty: 1..=0 yields nothing.
        1..=0
    };
    let (first_word, last_word) = (start / 64, end.saturating_sub(1) / 64);
    words.map(move |i| {
        let mut mask = u64::MAX;
        if i == first_word {
            mask &= u64::MAX << (start % 64);
        }
        if i == last_word {
            mask &= u64::MAX >> (63 - (end - 1) % 64);
        }
        (i, mask)
    })
}

/// Smallest set bit `>= from` within `words`, `from < words.len() * 64`.
pub(crate) fn next_set_bit(words: &[u64], from: u32) -> Option<u32> {
    let mut word_index = from as usize / 64;
    let mut word = *words.get(word_index)? & (u64::MAX << (from % 64));
    loop {
        if word != 0 {
            return Some((word_index * 64) as u32 + word.trailing_zeros());
        }
        word_index += 1;
        word = *words.get(word_index)?;
    }
}

/// Largest set bit `<= from` within `words`.
pub(crate) fn prev_set_bit(words: &[u64], from: u32) -> Option<u32> {
    let mut word_index = from as usize / 64;
    let mut word = *words.get(word_index)? & (u64::MAX >> (63 - from % 64));
    loop {
        if word != 0 {
            return Some((word_index * 64) as u32 + 63 - word.leading_zeros());
        }
        word_index = word_index.checked_sub(1)?;
        word = words[word_index];
    }
}
