//! Ordered iteration over containers and bitmaps.
//!
//! All iterators are double-ended and support `advance_to`, which skips forward
//! to the first remaining value `>= target` without visiting the values in
//! between. Skipping is galloping for arrays, word-wise for bitmaps and
//! run-wise for run containers.

use crate::{
    container::{
        Container,
        bitmap::{next_set_bit, prev_set_bit},
        run::Run,
    },
    directory::ContainerDirectory,
    storage::Storage,
    util,
};

/// Cursor over a sorted array payload.
#[derive(Clone, Debug)]
pub struct ArrayIter<'a> {
    values: &'a [u16],
    front: usize,
    back: usize,
}

impl<'a> ArrayIter<'a> {
    pub fn new(values: &'a [u16]) -> ArrayIter<'a> {
        ArrayIter {
            values,
            front: 0,
            back: values.len(),
        }
    }

    pub fn advance_to(&mut self, target: u16) {
        self.front = util::gallop(&self.values[..self.back], self.front, target);
    }

    fn fill(&mut self, out: &mut [u32], high: u32) -> usize {
        let remaining = &self.values[self.front..self.back];
        let n = remaining.len().min(out.len());
        for (slot, &low) in out.iter_mut().zip(&remaining[..n]) {
            *slot = high | low as u32;
        }
        self.front += n;
        n
    }
}

impl Iterator for ArrayIter<'_> {
    type Item = u16;

    #[inline]
    fn next(&mut self) -> Option<u16> {
        if self.front < self.back {
            self.front += 1;
            Some(self.values[self.front - 1])
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.back - self.front;
        (n, Some(n))
    }
}

impl DoubleEndedIterator for ArrayIter<'_> {
    #[inline]
    fn next_back(&mut self) -> Option<u16> {
        if self.front < self.back {
            self.back -= 1;
            Some(self.values[self.back])
        } else {
            None
        }
    }
}

/// Cursor over the set bits of a bitmap payload. The remaining positions are
/// `front..back`.
#[derive(Clone, Debug)]
pub struct BitIter<'a> {
    words: &'a [u64],
    front: u32,
    back: u32,
}

impl<'a> BitIter<'a> {
    pub fn new(words: &'a [u64]) -> BitIter<'a> {
        BitIter {
            words,
            front: 0,
            back: (words.len() * 64) as u32,
        }
    }

    pub fn advance_to(&mut self, target: u16) {
        self.front = self.front.max(target as u32);
    }

    fn fill(&mut self, out: &mut [u32], high: u32) -> usize {
        let mut n = 0;
        while n < out.len() && self.front < self.back {
            let word_index = self.front as usize / 64;
            let word_base = (word_index * 64) as u32;
            let mut word = self.words[word_index] & (u64::MAX << (self.front % 64));
            if self.back < word_base + 64 {
                word &= (1u64 << (self.back % 64)) - 1;
            }
            while word != 0 && n < out.len() {
                let bit = word_base + word.trailing_zeros();
                out[n] = high | bit;
                n += 1;
                word &= word - 1;
                self.front = bit + 1;
            }
            if word == 0 {
                self.front = word_base + 64;
            }
        }
        n
    }
}

impl Iterator for BitIter<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if self.front >= self.back {
            return None;
        }
        match next_set_bit(self.words, self.front) {
            Some(bit) if bit < self.back => {
                self.front = bit + 1;
                Some(bit as u16)
            }
            _ => {
                self.front = self.back;
                None
            }
        }
    }
}

impl DoubleEndedIterator for BitIter<'_> {
    fn next_back(&mut self) -> Option<u16> {
        if self.front >= self.back {
            return None;
        }
        match prev_set_bit(self.words, self.back - 1) {
            Some(bit) if bit >= self.front => {
                self.back = bit;
                Some(bit as u16)
            }
            _ => {
                self.back = self.front;
                None
            }
        }
    }
}

/// Cursor over the values of a run payload.
///
/// The remaining values are `front..back`; `front_run` is the run holding
/// `front` and `back_run - 1` the run holding `back - 1`.
#[derive(Clone, Debug)]
pub struct RunIter<'a> {
    runs: &'a [Run],
    front_run: usize,
    front: u32,
    back_run: usize,
    back: u32,
}

impl<'a> RunIter<'a> {
    pub fn new(runs: &'a [Run]) -> RunIter<'a> {
        RunIter {
            runs,
            front_run: 0,
            front: runs.first().map_or(0, |r| r.start as u32),
            back_run: runs.len(),
            back: runs.last().map_or(0, Run::end),
        }
    }

    pub fn advance_to(&mut self, target: u16) {
        let target = target as u32;
        if target <= self.front {
            return;
        }
        let tail = &self.runs[self.front_run.min(self.runs.len())..];
        self.front_run += tail.partition_point(|r| r.end() <= target);
        match self.runs.get(self.front_run) {
            Some(run) => self.front = target.max(run.start as u32),
            None => self.front = self.back,
        }
    }

    fn fill(&mut self, out: &mut [u32], high: u32) -> usize {
        let mut n = 0;
        while n < out.len() && self.front < self.back {
            let run_end = self.runs[self.front_run].end().min(self.back);
            let count = ((run_end - self.front) as usize).min(out.len() - n);
            for (slot, value) in out[n..n + count].iter_mut().zip(self.front..) {
                *slot = high | value;
            }
            n += count;
            self.front += count as u32;
            self.step_front_run();
        }
        n
    }

    fn step_front_run(&mut self) {
        if self.front >= self.runs[self.front_run].end() {
            self.front_run += 1;
            if let Some(run) = self.runs.get(self.front_run) {
                self.front = self.front.max(run.start as u32);
            }
        }
    }
}

impl Iterator for RunIter<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if self.front >= self.back {
            return None;
        }
        let value = self.front;
        self.front += 1;
        self.step_front_run();
        Some(value as u16)
    }
}

impl DoubleEndedIterator for RunIter<'_> {
    fn next_back(&mut self) -> Option<u16> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        let value = self.back;
        if value == self.runs[self.back_run - 1].start as u32 {
            self.back_run -= 1;
            self.back = match self.back_run {
                0 => 0,
                n => self.back.min(self.runs[n - 1].end()),
            };
        }
        Some(value as u16)
    }
}

/// Iterator over the low bits of one container, in ascending order.
#[derive(Clone, Debug)]
pub enum ContainerIter<'a> {
    Array(ArrayIter<'a>),
    Bitmap(BitIter<'a>),
    Run(RunIter<'a>),
}

impl<'a> ContainerIter<'a> {
    pub fn new<S: Storage>(container: &'a Container<S>) -> ContainerIter<'a> {
        match container {
            Container::Array(a) => ContainerIter::Array(ArrayIter::new(a.values())),
            Container::Bitmap(b) => ContainerIter::Bitmap(BitIter::new(b.words())),
            Container::Run(r) => ContainerIter::Run(RunIter::new(r.runs())),
        }
    }

    /// Skips to the first remaining value `>= target`.
    pub fn advance_to(&mut self, target: u16) {
        match self {
            ContainerIter::Array(it) => it.advance_to(target),
            ContainerIter::Bitmap(it) => it.advance_to(target),
            ContainerIter::Run(it) => it.advance_to(target),
        }
    }

    /// Writes `high | value` for the next values into `out`; returns how many
    /// were written, fewer than `out.len()` only when the container is
    /// exhausted.
    pub(crate) fn fill(&mut self, out: &mut [u32], high: u32) -> usize {
        match self {
            ContainerIter::Array(it) => it.fill(out, high),
            ContainerIter::Bitmap(it) => it.fill(out, high),
            ContainerIter::Run(it) => it.fill(out, high),
        }
    }
}

impl Iterator for ContainerIter<'_> {
    type Item = u16;

    #[inline]
    fn next(&mut self) -> Option<u16> {
        match self {
            ContainerIter::Array(it) => it.next(),
            ContainerIter::Bitmap(it) => it.next(),
            ContainerIter::Run(it) => it.next(),
        }
    }
}

impl DoubleEndedIterator for ContainerIter<'_> {
    #[inline]
    fn next_back(&mut self) -> Option<u16> {
        match self {
            ContainerIter::Array(it) => it.next_back(),
            ContainerIter::Bitmap(it) => it.next_back(),
            ContainerIter::Run(it) => it.next_back(),
        }
    }
}

/// Ascending iterator over the values of a bitmap.
///
/// Containers at positions `front_index..back_index` of the directory have not
/// been opened yet; `front` and `back` are the partially consumed containers at
/// either end.
#[derive(Clone, Debug)]
pub struct Iter<'a, S: Storage> {
    directory: &'a ContainerDirectory<S>,
    front_index: usize,
    back_index: usize,
    front: Option<(u16, ContainerIter<'a>)>,
    back: Option<(u16, ContainerIter<'a>)>,
}

impl<'a, S: Storage> Iter<'a, S> {
    pub(crate) fn new(directory: &'a ContainerDirectory<S>) -> Iter<'a, S> {
        Self::over_positions(directory, 0, directory.len())
    }

    /// Iterator over the containers at positions `start..end`.
    pub(crate) fn over_positions(
        directory: &'a ContainerDirectory<S>,
        start: usize,
        end: usize,
    ) -> Iter<'a, S> {
        Iter {
            directory,
            front_index: start,
            back_index: end,
            front: None,
            back: None,
        }
    }

    /// Skips to the first remaining value `>= target`. Values already returned
    /// from the back are never revisited.
    pub fn advance_to(&mut self, target: u32) {
        let (key, low) = util::split(target);
        if let Some((front_key, it)) = &mut self.front {
            match (*front_key).cmp(&key) {
                std::cmp::Ordering::Greater => return,
                std::cmp::Ordering::Equal => return it.advance_to(low),
                std::cmp::Ordering::Less => self.front = None,
            }
        }
        let index = self
            .directory
            .locate_from(self.front_index, key)
            .min(self.back_index);
        self.front_index = index;
        if index < self.back_index {
            let (found, container) = self.directory.entry(index);
            if found == key {
                let mut it = container.iter();
                it.advance_to(low);
                self.front = Some((found, it));
                self.front_index += 1;
            }
        } else if let Some((back_key, it)) = &mut self.back {
            if *back_key < key {
                self.back = None;
            } else if *back_key == key {
                it.advance_to(low);
            }
        }
    }

    /// Fills `out` with the next values; returns how many were written, fewer
    /// than `out.len()` only at the end of the iteration.
    pub(crate) fn fill(&mut self, out: &mut [u32]) -> usize {
        let mut filled = 0;
        while filled < out.len() {
            if let Some((key, it)) = &mut self.front {
                filled += it.fill(&mut out[filled..], (*key as u32) << 16);
                if filled < out.len() {
                    self.front = None;
                }
            } else if self.front_index < self.back_index {
                self.front = Some(self.open(self.front_index));
                self.front_index += 1;
            } else if let Some((key, it)) = &mut self.back {
                filled += it.fill(&mut out[filled..], (*key as u32) << 16);
                if filled < out.len() {
                    self.back = None;
                }
            } else {
                break;
            }
        }
        filled
    }

    fn open(&self, index: usize) -> (u16, ContainerIter<'a>) {
        let (key, container) = self.directory.entry(index);
        (key, container.iter())
    }
}

impl<S: Storage> Iterator for Iter<'_, S> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        loop {
            if let Some((key, it)) = &mut self.front {
                if let Some(low) = it.next() {
                    return Some(util::combine(*key, low));
                }
                self.front = None;
            }
            if self.front_index < self.back_index {
                self.front = Some(self.open(self.front_index));
                self.front_index += 1;
            } else {
                let (key, it) = self.back.as_mut()?;
                let value = it.next().map(|low| util::combine(*key, low));
                if value.is_none() {
                    self.back = None;
                }
                return value;
            }
        }
    }
}

impl<S: Storage> DoubleEndedIterator for Iter<'_, S> {
    fn next_back(&mut self) -> Option<u32> {
        loop {
            if let Some((key, it)) = &mut self.back {
                if let Some(low) = it.next_back() {
                    return Some(util::combine(*key, low));
                }
                self.back = None;
            }
            if self.front_index < self.back_index {
                self.back_index -= 1;
                self.back = Some(self.open(self.back_index));
            } else {
                let (key, it) = self.front.as_mut()?;
                let value = it.next_back().map(|low| util::combine(*key, low));
                if value.is_none() {
                    self.front = None;
                }
                return value;
            }
        }
    }
}

/// Iterates values reinterpreted as `i32`, in signed order: values with the
/// high bit set (negative) first, then the rest.
#[derive(Clone, Debug)]
pub struct SignedIter<'a, S: Storage> {
    negatives: Iter<'a, S>,
    positives: Iter<'a, S>,
}

impl<'a, S: Storage> SignedIter<'a, S> {
    pub(crate) fn new(directory: &'a ContainerDirectory<S>) -> SignedIter<'a, S> {
        let split = directory.locate_from(0, 0x8000);
        SignedIter {
            negatives: Iter::over_positions(directory, split, directory.len()),
            positives: Iter::over_positions(directory, 0, split),
        }
    }
}

impl<S: Storage> Iterator for SignedIter<'_, S> {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        self.negatives
            .next()
            .or_else(|| self.positives.next())
            .map(|v| v as i32)
    }
}

impl<S: Storage> DoubleEndedIterator for SignedIter<'_, S> {
    fn next_back(&mut self) -> Option<i32> {
        self.positives
            .next_back()
            .or_else(|| self.negatives.next_back())
            .map(|v| v as i32)
    }
}
