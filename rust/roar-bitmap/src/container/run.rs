//! Run-length container payload.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};

use crate::container::{array::ArrayContainer, bitmap::BitmapContainer};

/// A maximal run of consecutive values `start..=start + length`.
///
/// The layout matches the portable format: `length` holds the run length minus
/// one, so a run can cover the whole 16-bit space.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Run {
    pub start: u16,
    pub length: u16,
}

impl Run {
    /// Run covering `first..=last`.
    #[inline]
    pub fn new(first: u16, last: u16) -> Run {
        debug_assert!(first <= last);
        Run {
            start: first,
            length: last - first,
        }
    }

    /// Run covering a non-empty `range` with `range.end <= 65536`.
    #[inline]
    pub fn from_range(range: Range<u32>) -> Run {
        debug_assert!(range.start < range.end && range.end <= 1 << 16);
        Run {
            start: range.start as u16,
            length: (range.end - range.start - 1) as u16,
        }
    }

    #[inline]
    pub fn first(&self) -> u16 {
        self.start
    }

    #[inline]
    pub fn last(&self) -> u16 {
        self.start + self.length
    }

    /// Exclusive end, up to 65536.
    #[inline]
    pub fn end(&self) -> u32 {
        self.start as u32 + self.length as u32 + 1
    }

    /// Number of values in the run.
    #[inline]
    pub fn value_count(&self) -> u32 {
        self.length as u32 + 1
    }

    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        self.start <= value && value <= self.last()
    }

    #[inline]
    pub fn to_range(self) -> Range<u32> {
        self.start as u32..self.end()
    }
}

/// Sorted list of disjoint, non-adjacent runs.
#[derive(Clone, Debug, Default)]
pub struct RunContainer<R = Vec<Run>> {
    runs: R,
}

impl<R: AsRef<[Run]>> RunContainer<R> {
    pub fn wrap(runs: R) -> RunContainer<R> {
        #[cfg(debug_assertions)]
        assert!(runs_are_canonical(runs.as_ref()));
        RunContainer { runs }
    }

    /// Wraps runs read from untrusted input; see [`Container::validate`].
    ///
    /// [`Container::validate`]: crate::container::Container::validate
    pub(crate) fn wrap_unchecked(runs: R) -> RunContainer<R> {
        RunContainer { runs }
    }

    #[inline]
    pub fn runs(&self) -> &[Run] {
        self.runs.as_ref()
    }

    #[inline]
    pub fn run_count(&self) -> usize {
        self.runs().len()
    }

    pub fn len(&self) -> usize {
        self.runs().iter().map(|r| r.value_count() as usize).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.runs().is_empty()
    }

    /// Whether the container covers all 65536 values.
    pub fn is_full(&self) -> bool {
        matches!(self.runs(), [run] if run.start == 0 && run.length == u16::MAX)
    }

    pub fn contains(&self, value: u16) -> bool {
        let index = self.runs().partition_point(|r| r.start <= value);
        index > 0 && self.runs()[index - 1].last() >= value
    }

    /// Number of values `<= value`.
    pub fn rank(&self, value: u16) -> usize {
        let mut rank = 0usize;
        for run in self.runs() {
            if run.start > value {
                break;
            }
            rank += (run.last().min(value) - run.start) as usize + 1;
        }
        rank
    }

    pub fn select(&self, index: usize) -> Option<u16> {
        let mut remaining = index;
        for run in self.runs() {
            let count = run.value_count() as usize;
            if remaining < count {
                return Some(run.start + remaining as u16);
            }
            remaining -= count;
        }
        None
    }

    pub fn first(&self) -> Option<u16> {
        self.runs().first().map(|r| r.start)
    }

    pub fn last(&self) -> Option<u16> {
        self.runs().last().map(|r| r.last())
    }

    /// Smallest value `>= from`.
    pub fn next_value(&self, from: u16) -> Option<u16> {
        let index = self.runs().partition_point(|r| r.last() < from);
        self.runs().get(index).map(|r| r.start.max(from))
    }

    /// Largest value `<= from`.
    pub fn prev_value(&self, from: u16) -> Option<u16> {
        let index = self.runs().partition_point(|r| r.start <= from);
        index
            .checked_sub(1)
            .map(|i| self.runs()[i].last().min(from))
    }

    /// Smallest value `>= from` that is not in the container.
    pub fn next_absent(&self, from: u16) -> Option<u16> {
        let index = self.runs().partition_point(|r| r.start <= from);
        match index.checked_sub(1).map(|i| self.runs()[i]) {
            // Runs are non-adjacent, so the value after a run is absent.
            Some(run) if run.last() >= from => u16::try_from(run.end()).ok(),
            _ => Some(from),
        }
    }

    /// Largest value `<= from` that is not in the container.
    pub fn prev_absent(&self, from: u16) -> Option<u16> {
        let index = self.runs().partition_point(|r| r.start <= from);
        match index.checked_sub(1).map(|i| self.runs()[i]) {
            Some(run) if run.last() >= from => run.start.checked_sub(1),
            _ => Some(from),
        }
    }

    /// Number of values in `range`; `range.end <= 65536`.
    pub fn range_cardinality(&self, range: Range<u32>) -> usize {
        if range.start >= range.end {
            return 0;
        }
        let runs = self.runs();
        let first = runs.partition_point(|r| r.end() <= range.start);
        runs[first..]
            .iter()
            .take_while(|r| (r.start as u32) < range.end)
            .map(|r| (r.end().min(range.end) - (r.start as u32).max(range.start)) as usize)
            .sum()
    }

    pub fn contains_range(&self, range: Range<u32>) -> bool {
        if range.start >= range.end {
            return true;
        }
        let runs = self.runs();
        let index = runs.partition_point(|r| r.end() <= range.start);
        runs.get(index)
            .is_some_and(|r| (r.start as u32) <= range.start && r.end() >= range.end)
    }

    pub fn intersects_range(&self, range: Range<u32>) -> bool {
        if range.start >= range.end {
            return false;
        }
        let runs = self.runs();
        let index = runs.partition_point(|r| r.end() <= range.start);
        runs.get(index).is_some_and(|r| (r.start as u32) < range.end)
    }

    /// Payload size in the portable format: a run count followed by two `u16` per run.
    pub fn serialized_size_in_bytes(&self) -> usize {
        serialized_size(self.run_count())
    }

    pub fn heap_size_bytes(&self) -> usize {
        std::mem::size_of_val(self.runs())
    }

    pub fn to_owned_run(&self) -> RunContainer {
        RunContainer {
            runs: self.runs().to_vec(),
        }
    }

    pub fn to_array(&self) -> ArrayContainer {
        ArrayContainer::wrap(self.values().collect())
    }

    pub fn to_bitmap(&self) -> BitmapContainer {
        let mut bitmap = BitmapContainer::empty();
        for run in self.runs() {
            bitmap.insert_range(run.to_range());
        }
        bitmap
    }

    /// Values in ascending order.
    pub fn values(&self) -> impl Iterator<Item = u16> + '_ {
        self.runs()
            .iter()
            .flat_map(|r| (r.start as u32..r.end()).map(|v| v as u16))
    }

    pub fn or<R2: AsRef<[Run]>>(&self, other: &RunContainer<R2>) -> RunContainer {
        union_runs(self.runs(), other.runs())
    }

    pub fn and<R2: AsRef<[Run]>>(&self, other: &RunContainer<R2>) -> RunContainer {
        intersect_runs(self.runs(), other.runs())
    }

    pub fn and_not<R2: AsRef<[Run]>>(&self, other: &RunContainer<R2>) -> RunContainer {
        subtract_runs(self.runs(), other.runs())
    }

    pub fn xor<R2: AsRef<[Run]>>(&self, other: &RunContainer<R2>) -> RunContainer {
        let union = union_runs(self.runs(), other.runs());
        let common = intersect_runs(self.runs(), other.runs());
        subtract_runs(union.runs(), common.runs())
    }

    pub fn and_cardinality<R2: AsRef<[Run]>>(&self, other: &RunContainer<R2>) -> usize {
        let mut count = 0usize;
        for_each_overlap(self.runs(), other.runs(), |range| {
            count += (range.end - range.start) as usize;
            true
        });
        count
    }

    pub fn intersects<R2: AsRef<[Run]>>(&self, other: &RunContainer<R2>) -> bool {
        let mut found = false;
        for_each_overlap(self.runs(), other.runs(), |_| {
            found = true;
            false
        });
        found
    }

    /// Values of `array` that fall inside a run.
    pub fn and_array<V: AsRef<[u16]>>(&self, array: &ArrayContainer<V>) -> ArrayContainer {
        let runs = self.runs();
        let mut index = 0;
        let mut values = Vec::new();
        for value in array.iter() {
            while index < runs.len() && runs[index].last() < value {
                index += 1;
            }
            if index == runs.len() {
                break;
            }
            if runs[index].start <= value {
                values.push(value);
            }
        }
        ArrayContainer::wrap(values)
    }

    /// Number of values of `array` that fall inside a run.
    pub fn and_array_cardinality<V: AsRef<[u16]>>(&self, array: &ArrayContainer<V>) -> usize {
        let runs = self.runs();
        let mut index = 0;
        let mut count = 0;
        for value in array.iter() {
            while index < runs.len() && runs[index].last() < value {
                index += 1;
            }
            if index == runs.len() {
                break;
            }
            if runs[index].start <= value {
                count += 1;
            }
        }
        count
    }

    /// Values of `array` that fall outside every run.
    pub fn filter_array_outside<V: AsRef<[u16]>>(
        &self,
        array: &ArrayContainer<V>,
    ) -> ArrayContainer {
        let runs = self.runs();
        let mut index = 0;
        let mut values = Vec::with_capacity(array.len());
        for value in array.iter() {
            while index < runs.len() && runs[index].last() < value {
                index += 1;
            }
            if index == runs.len() || runs[index].start > value {
                values.push(value);
            }
        }
        ArrayContainer::wrap(values)
    }

    /// Number of bits of `bitmap` covered by the runs.
    pub fn and_bitmap_cardinality<W: AsRef<[u64]>>(&self, bitmap: &BitmapContainer<W>) -> usize {
        self.runs()
            .iter()
            .map(|r| bitmap.range_cardinality(r.to_range()))
            .sum()
    }

    /// Bits of `bitmap` covered by the runs, as a fresh bitmap.
    pub fn and_bitmap<W: AsRef<[u64]>>(&self, bitmap: &BitmapContainer<W>) -> BitmapContainer {
        bitmap.retain_ranges(self.runs().iter().map(|r| r.to_range()))
    }

    /// Runs shifted up by `offset`, split into the part that stays below 65536 and
    /// the part that wraps into the next key.
    pub fn add_offset(&self, offset: u16) -> (RunContainer, RunContainer) {
        let mut low = RunBuilder::default();
        let mut high = RunBuilder::default();
        for run in self.runs() {
            let range = run.to_range();
            let (start, end) = (range.start + offset as u32, range.end + offset as u32);
            let span = 1u32 << 16;
            low.push_range(start.min(span)..end.min(span));
            high.push_range(start.max(span) - span..end.max(span) - span);
        }
        (low.finish(), high.finish())
    }
}

impl RunContainer {
    pub fn new() -> RunContainer {
        RunContainer { runs: Vec::new() }
    }

    /// The container holding all 65536 values.
    pub fn full() -> RunContainer {
        RunContainer {
            runs: vec![Run::new(0, u16::MAX)],
        }
    }

    pub fn from_range(range: Range<u32>) -> RunContainer {
        let mut builder = RunBuilder::default();
        builder.push_range(range);
        builder.finish()
    }

    pub fn into_runs(self) -> Vec<Run> {
        self.runs
    }

    /// Inserts `value`, extending or merging neighboring runs; returns whether it
    /// was absent.
    pub fn insert(&mut self, value: u16) -> bool {
        let runs = &mut self.runs;
        let index = runs.partition_point(|r| r.start <= value);
        if index > 0 {
            let prev = runs[index - 1];
            if prev.last() >= value {
                return false;
            }
            if prev.end() == value as u32 {
                runs[index - 1].length += 1;
                if index < runs.len() && runs[index].start as u32 == value as u32 + 1 {
                    let next = runs.remove(index);
                    runs[index - 1] = Run::new(prev.start, next.last());
                }
                return true;
            }
        }
        if index < runs.len() && runs[index].start as u32 == value as u32 + 1 {
            runs[index].start = value;
            runs[index].length += 1;
            return true;
        }
        runs.insert(index, Run::new(value, value));
        true
    }

    /// Removes `value`, shrinking or splitting its run; returns whether it was
    /// present.
    pub fn remove(&mut self, value: u16) -> bool {
        let runs = &mut self.runs;
        let index = runs.partition_point(|r| r.start <= value);
        let Some(i) = index.checked_sub(1) else {
            return false;
        };
        let run = runs[i];
        if run.last() < value {
            return false;
        }
        match (run.start == value, run.last() == value) {
            (true, true) => {
                runs.remove(i);
            }
            (true, false) => runs[i] = Run::new(value + 1, run.last()),
            (false, true) => runs[i] = Run::new(run.start, value - 1),
            (false, false) => {
                runs[i] = Run::new(run.start, value - 1);
                runs.insert(i + 1, Run::new(value + 1, run.last()));
            }
        }
        true
    }

    pub fn insert_range(&mut self, range: Range<u32>) {
        if range.start >= range.end {
            return;
        }
        let runs = &mut self.runs;
        // Runs overlapping or adjacent to the range are absorbed.
        let lo = runs.partition_point(|r| r.end() < range.start);
        let hi = runs.partition_point(|r| (r.start as u32) <= range.end);
        let mut merged = range;
        if lo < hi {
            merged.start = merged.start.min(runs[lo].start as u32);
            merged.end = merged.end.max(runs[hi - 1].end());
        }
        runs.splice(lo..hi, std::iter::once(Run::from_range(merged)));
    }

    pub fn remove_range(&mut self, range: Range<u32>) {
        if range.start >= range.end {
            return;
        }
        let runs = &mut self.runs;
        let lo = runs.partition_point(|r| r.end() <= range.start);
        let hi = runs.partition_point(|r| (r.start as u32) < range.end);
        if lo >= hi {
            return;
        }
        let mut remainder = Vec::with_capacity(2);
        if (runs[lo].start as u32) < range.start {
            remainder.push(Run::from_range(runs[lo].start as u32..range.start));
        }
        if runs[hi - 1].end() > range.end {
            remainder.push(Run::from_range(range.end..runs[hi - 1].end()));
        }
        runs.splice(lo..hi, remainder);
    }

    pub fn flip_range(&mut self, range: Range<u32>) {
        if range.start >= range.end {
            return;
        }
        let flipped = self.xor(&RunContainer::from_range(range));
        *self = flipped;
    }

    pub fn shrink_to_fit(&mut self) {
        self.runs.shrink_to_fit();
    }
}

impl From<Vec<Run>> for RunContainer {
    fn from(runs: Vec<Run>) -> Self {
        RunContainer::wrap(runs)
    }
}

/// Accumulates runs from ranges pushed in non-decreasing start order, fusing
/// overlapping and adjacent ranges so the result stays canonical.
#[derive(Debug, Default)]
pub struct RunBuilder {
    runs: Vec<Run>,
}

impl RunBuilder {
    pub fn push_range(&mut self, range: Range<u32>) {
        if range.start >= range.end {
            return;
        }
        if let Some(last) = self.runs.last_mut() {
            debug_assert!((last.start as u32) <= range.start);
            if range.start <= last.end() {
                if range.end > last.end() {
                    *last = Run::from_range(last.start as u32..range.end);
                }
                return;
            }
        }
        self.runs.push(Run::from_range(range));
    }

    #[inline]
    pub fn push_value(&mut self, value: u16) {
        self.push_range(value as u32..value as u32 + 1);
    }

    pub fn finish(self) -> RunContainer {
        RunContainer { runs: self.runs }
    }
}

/// Payload size of a run container with `run_count` runs.
#[inline]
pub fn serialized_size(run_count: usize) -> usize {
    2 + 4 * run_count
}

/// Whether runs are sorted, non-overlapping, non-adjacent and inside the 16-bit
/// space.
pub fn runs_are_canonical(runs: &[Run]) -> bool {
    runs.iter().all(|r| (r.start as u32 + r.length as u32) <= u16::MAX as u32)
        && runs.windows(2).all(|w| w[0].end() < w[1].start as u32)
}

fn union_runs(a: &[Run], b: &[Run]) -> RunContainer {
    let mut builder = RunBuilder::default();
    let (mut i, mut j) = (0, 0);
    while i < a.len() || j < b.len() {
        let take_a = j == b.len() || (i < a.len() && a[i].start <= b[j].start);
        if take_a {
            builder.push_range(a[i].to_range());
            i += 1;
        } else {
            builder.push_range(b[j].to_range());
            j += 1;
        }
    }
    builder.finish()
}

fn intersect_runs(a: &[Run], b: &[Run]) -> RunContainer {
    let mut builder = RunBuilder::default();
    for_each_overlap(a, b, |range| {
        builder.push_range(range);
        true
    });
    builder.finish()
}

/// Calls `f` with every non-empty overlap of a run of `a` and a run of `b`, in
/// ascending order, until `f` returns false.
fn for_each_overlap(a: &[Run], b: &[Run], mut f: impl FnMut(Range<u32>) -> bool) {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let start = (a[i].start as u32).max(b[j].start as u32);
        let end = a[i].end().min(b[j].end());
        if start < end && !f(start..end) {
            return;
        }
        if a[i].end() <= b[j].end() {
            i += 1;
        } else {
            j += 1;
        }
    }
}

fn subtract_runs(a: &[Run], b: &[Run]) -> RunContainer {
    let mut builder = RunBuilder::default();
    let mut j = 0;
    for run in a {
        let mut cursor = run.start as u32;
        let end = run.end();
        while j < b.len() && b[j].end() <= cursor {
            j += 1;
        }
        let mut k = j;
        while k < b.len() && (b[k].start as u32) < end {
            if b[k].start as u32 > cursor {
                builder.push_range(cursor..b[k].start as u32);
            }
            cursor = cursor.max(b[k].end());
            k += 1;
        }
        if cursor < end {
            builder.push_range(cursor..end);
        }
    }
    builder.finish()
}
