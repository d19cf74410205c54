//! Batch extraction of bitmap values.
//!
//! Consumers that process values in bulk pull them into a caller-provided
//! buffer. Each container kind fills the buffer with its own loop (a slice copy
//! for arrays, word scans for bitmaps, consecutive ranges for runs), avoiding a
//! dispatch per value.

use crate::{iter::Iter, storage::Storage};

/// Cursor producing values in ascending batches.
#[derive(Clone, Debug)]
pub struct BatchIter<'a, S: Storage> {
    inner: Iter<'a, S>,
}

impl<'a, S: Storage> BatchIter<'a, S> {
    pub(crate) fn new(inner: Iter<'a, S>) -> BatchIter<'a, S> {
        BatchIter { inner }
    }

    /// Writes the next values into `buffer` and returns how many were written.
    ///
    /// Fewer than `buffer.len()` values means the bitmap is exhausted; a
    /// subsequent call returns 0.
    pub fn next_batch(&mut self, buffer: &mut [u32]) -> usize {
        self.inner.fill(buffer)
    }

    /// Skips to the first remaining value `>= target`.
    pub fn advance_to(&mut self, target: u32) {
        self.inner.advance_to(target);
    }

    /// Collects the rest of the values in batches of `batch_size`.
    pub fn collect_batches(mut self, batch_size: usize) -> Vec<Vec<u32>> {
        assert!(batch_size > 0, "batch size must be positive");
        let mut batches = Vec::new();
        let mut buffer = vec![0u32; batch_size];
        loop {
            let n = self.next_batch(&mut buffer);
            if n == 0 {
                break;
            }
            batches.push(buffer[..n].to_vec());
            if n < batch_size {
                break;
            }
        }
        batches
    }
}
