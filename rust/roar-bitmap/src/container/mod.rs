//! Containers hold the low 16 bits of the values sharing one bucket key.
//! - Three encodings: Array (sorted `u16`, at most 4096 values), Bitmap (65536
//!   bits plus a cardinality) and Run (sorted, non-adjacent runs).
//! - Mutations promote Array to Bitmap above 4096 values and demote Bitmap to
//!   Array at or below 4096. Run is only entered through `run_optimize`, through
//!   deserialization, or as the result of an operation on run inputs.
//! - Binary operations accept any storage flavor on either side and always
//!   produce an owned container whose encoding follows the result's size.
//! - Range arguments are half-open `Range<u32>` with `end <= 65536`.

use std::ops::Range;

use roar_common::{Error, Result, verify_arg, verify_data};

use crate::{
    container::{
        array::ArrayContainer,
        bitmap::{BitmapContainer, Cardinality},
        run::{Run, RunContainer},
    },
    iter::ContainerIter,
    storage::{Owned, Storage},
    util,
};

pub mod array;
pub mod bitmap;
pub mod run;

/// Number of values addressable by one container.
pub const CONTAINER_SPAN: u32 = 1 << 16;

/// Largest cardinality stored as an array.
pub const ARRAY_MAX_LEN: usize = 4096;

/// Number of 64-bit words in a bitmap container.
pub const BITMAP_WORDS: usize = 1024;

/// The values of one bucket key, in one of three encodings.
///
/// `S` selects the storage flavor; read operations are available for every
/// flavor, mutation only for [`Owned`].
#[derive(Clone, Debug)]
pub enum Container<S: Storage = Owned> {
    Array(ArrayContainer<S::Values>),
    Bitmap(BitmapContainer<S::Words>),
    Run(RunContainer<S::Runs>),
}

/// Identifies the encoding of a [`Container`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Array,
    Bitmap,
    Run,
}

/// Binary operations driven by the directory merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SetOp {
    And,
    Or,
    Xor,
    AndNot,
    /// Union that may leave bitmap cardinalities pending repair.
    LazyOr,
}

impl SetOp {
    /// Whether containers found only in the left operand survive.
    pub(crate) fn keeps_left(self) -> bool {
        !matches!(self, SetOp::And)
    }

    /// Whether containers found only in the right operand survive.
    pub(crate) fn keeps_right(self) -> bool {
        matches!(self, SetOp::Or | SetOp::Xor | SetOp::LazyOr)
    }
}

impl Container {
    /// An empty array container.
    pub fn new() -> Container {
        Container::Array(ArrayContainer::new())
    }

    pub fn singleton(value: u16) -> Container {
        Container::Array(ArrayContainer::wrap(vec![value]))
    }

    /// Container holding exactly the values of `range`.
    pub fn from_range(range: Range<u32>) -> Result<Container> {
        check_range(&range)?;
        Ok(if range.len() <= ARRAY_MAX_LEN {
            Container::Array(ArrayContainer::from_range(range))
        } else {
            Container::Bitmap(BitmapContainer::from_range(range))
        })
    }

    /// Classifies sorted, unique values by cardinality.
    pub fn from_sorted_values(values: Vec<u16>) -> Container {
        if values.len() <= ARRAY_MAX_LEN {
            Container::Array(ArrayContainer::wrap(values))
        } else {
            let mut bitmap = BitmapContainer::empty();
            bitmap.insert_many(values.into_iter());
            Container::Bitmap(bitmap)
        }
    }

    /// Wraps a bitmap, demoting it to an array when sparse.
    pub fn from_bitmap(bitmap: BitmapContainer) -> Container {
        if bitmap.len() <= ARRAY_MAX_LEN {
            Container::Array(bitmap.to_array())
        } else {
            Container::Bitmap(bitmap)
        }
    }

    /// Picks the smallest encoding for the result of a run operation, keeping
    /// runs on ties.
    pub fn from_runs(runs: RunContainer) -> Container {
        let cardinality = runs.len();
        let run_size = runs.serialized_size_in_bytes();
        let array_size = 2 * cardinality;
        let bitmap_size = BITMAP_WORDS * 8;
        if run_size <= array_size.min(bitmap_size) {
            Container::Run(runs)
        } else if cardinality <= ARRAY_MAX_LEN {
            Container::Array(runs.to_array())
        } else {
            Container::Bitmap(runs.to_bitmap())
        }
    }

    /// Inserts `value`; returns whether it was absent.
    pub fn insert(&mut self, value: u16) -> bool {
        match self {
            Container::Array(a) => {
                if a.len() < ARRAY_MAX_LEN {
                    return a.insert(value);
                }
                if a.contains(value) {
                    return false;
                }
                let mut bitmap = a.to_bitmap();
                bitmap.insert(value);
                *self = Container::Bitmap(bitmap);
                true
            }
            Container::Bitmap(b) => b.insert(value),
            Container::Run(r) => r.insert(value),
        }
    }

    /// Removes `value`; returns whether it was present.
    pub fn remove(&mut self, value: u16) -> bool {
        let removed = match self {
            Container::Array(a) => a.remove(value),
            Container::Bitmap(b) => b.remove(value),
            Container::Run(r) => r.remove(value),
        };
        if removed {
            self.demote_if_sparse();
        }
        removed
    }

    /// Toggles `value`.
    pub fn flip(&mut self, value: u16) {
        if !self.remove(value) {
            self.insert(value);
        }
    }

    pub fn insert_range(&mut self, range: Range<u32>) -> Result<()> {
        check_range(&range)?;
        if range.is_empty() {
            return Ok(());
        }
        match self {
            Container::Array(a) => {
                let added = range.len() - a.range_cardinality(range.clone());
                if a.len() + added <= ARRAY_MAX_LEN {
                    a.insert_range(range);
                } else {
                    let mut bitmap = a.to_bitmap();
                    bitmap.insert_range(range);
                    *self = Container::Bitmap(bitmap);
                }
            }
            Container::Bitmap(b) => b.insert_range(range),
            Container::Run(r) => r.insert_range(range),
        }
        Ok(())
    }

    pub fn remove_range(&mut self, range: Range<u32>) -> Result<()> {
        check_range(&range)?;
        match self {
            Container::Array(a) => a.remove_range(range),
            Container::Bitmap(b) => b.remove_range(range),
            Container::Run(r) => r.remove_range(range),
        }
        self.demote_if_sparse();
        Ok(())
    }

    /// Toggles every value of `range`.
    pub fn flip_range(&mut self, range: Range<u32>) -> Result<()> {
        check_range(&range)?;
        if range.is_empty() {
            return Ok(());
        }
        match self {
            Container::Array(a) => {
                let present = a.range_cardinality(range.clone());
                if a.len() + range.len() - 2 * present <= ARRAY_MAX_LEN {
                    a.flip_range(range);
                } else {
                    let mut bitmap = a.to_bitmap();
                    bitmap.flip_range(range);
                    *self = Container::Bitmap(bitmap);
                }
            }
            Container::Bitmap(b) => b.flip_range(range),
            Container::Run(r) => r.flip_range(range),
        }
        self.demote_if_sparse();
        Ok(())
    }

    pub fn and_with<S2: Storage>(&mut self, other: &Container<S2>) {
        match (&mut *self, other) {
            (Container::Bitmap(a), Container::Bitmap(b)) => a.combine_in_place(b, |x, y| x & y),
            (this, other) => *this = this.and(other),
        }
        self.demote_if_sparse();
    }

    pub fn or_with<S2: Storage>(&mut self, other: &Container<S2>) {
        match (&mut *self, other) {
            (Container::Bitmap(a), Container::Bitmap(b)) => a.combine_in_place(b, |x, y| x | y),
            (Container::Bitmap(a), Container::Array(b)) => a.insert_many(b.iter()),
            (this, other) => *this = this.or(other),
        }
    }

    pub fn xor_with<S2: Storage>(&mut self, other: &Container<S2>) {
        match (&mut *self, other) {
            (Container::Bitmap(a), Container::Bitmap(b)) => a.combine_in_place(b, |x, y| x ^ y),
            (Container::Bitmap(a), Container::Array(b)) => b.iter().for_each(|v| a.flip(v)),
            (this, other) => *this = this.xor(other),
        }
        self.demote_if_sparse();
    }

    pub fn and_not_with<S2: Storage>(&mut self, other: &Container<S2>) {
        match (&mut *self, other) {
            (Container::Bitmap(a), Container::Bitmap(b)) => a.combine_in_place(b, |x, y| x & !y),
            (Container::Bitmap(a), Container::Array(b)) => {
                b.iter().for_each(|v| {
                    a.remove(v);
                })
            }
            (this, other) => *this = this.and_not(other),
        }
        self.demote_if_sparse();
    }

    /// Union that skips cardinality maintenance for bitmap results.
    ///
    /// Arrays are promoted to bitmaps when the union may outgrow them; the result
    /// must go through [`repair_after_lazy`](Self::repair_after_lazy) before its
    /// cardinality is read.
    pub fn lazy_or_with<S2: Storage>(&mut self, other: &Container<S2>) {
        let promoted = match (&*self, other) {
            (Container::Array(a), Container::Bitmap(_) | Container::Run(_)) => Some(a.to_bitmap()),
            (Container::Array(a), Container::Array(b)) if a.len() + b.len() > ARRAY_MAX_LEN => {
                Some(a.to_bitmap())
            }
            _ => None,
        };
        if let Some(bitmap) = promoted {
            *self = Container::Bitmap(bitmap);
        }
        match (self, other) {
            (Container::Bitmap(a), Container::Bitmap(b)) => a.lazy_or(b),
            (Container::Bitmap(a), Container::Array(b)) => a.lazy_insert_many(b.iter()),
            (Container::Bitmap(a), Container::Run(b)) => {
                for run in b.runs() {
                    a.lazy_insert_range(run.to_range());
                }
            }
            (this, other) => *this = this.or(other),
        }
    }

    /// Recounts a bitmap left pending by lazy unions and demotes it when sparse.
    pub fn repair_after_lazy(&mut self) {
        if let Container::Bitmap(b) = self {
            if b.cardinality() == Cardinality::PendingRepair {
                b.repair();
            }
        }
        self.demote_if_sparse();
    }

    pub(crate) fn apply_in_place<S2: Storage>(&mut self, op: SetOp, other: &Container<S2>) {
        match op {
            SetOp::And => self.and_with(other),
            SetOp::Or => self.or_with(other),
            SetOp::Xor => self.xor_with(other),
            SetOp::AndNot => self.and_not_with(other),
            SetOp::LazyOr => self.lazy_or_with(other),
        }
    }

    /// Converts to runs when that encoding is strictly smaller; a run container
    /// is re-encoded when runs stopped paying off. Returns whether the encoding
    /// changed.
    pub fn run_optimize(&mut self) -> bool {
        match self.run_optimized() {
            Some(container) => {
                log::trace!(
                    "run_optimize: {:?} -> {:?} ({} values)",
                    self.kind(),
                    container.kind(),
                    container.len()
                );
                *self = container;
                true
            }
            None => false,
        }
    }

    /// Converts a run container back to an array or bitmap; returns whether it
    /// was a run container.
    pub fn remove_run_compression(&mut self) -> bool {
        let converted = match &*self {
            Container::Run(r) if r.len() <= ARRAY_MAX_LEN => Container::Array(r.to_array()),
            Container::Run(r) => Container::Bitmap(r.to_bitmap()),
            _ => return false,
        };
        *self = converted;
        true
    }

    pub fn shrink_to_fit(&mut self) {
        match self {
            Container::Array(a) => a.shrink_to_fit(),
            Container::Bitmap(_) => {}
            Container::Run(r) => r.shrink_to_fit(),
        }
    }

    fn demote_if_sparse(&mut self) {
        let demoted = match self {
            Container::Bitmap(b) if b.len() <= ARRAY_MAX_LEN => Some(b.to_array()),
            _ => None,
        };
        if let Some(array) = demoted {
            *self = Container::Array(array);
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Container::new()
    }
}

impl<S: Storage> Container<S> {
    pub fn kind(&self) -> ContainerKind {
        match self {
            Container::Array(_) => ContainerKind::Array,
            Container::Bitmap(_) => ContainerKind::Bitmap,
            Container::Run(_) => ContainerKind::Run,
        }
    }

    /// Number of values.
    ///
    /// Panics: if the container is a bitmap pending repair after a lazy union.
    pub fn len(&self) -> usize {
        match self {
            Container::Array(a) => a.len(),
            Container::Bitmap(b) => b.len(),
            Container::Run(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Container::Array(a) => a.is_empty(),
            Container::Bitmap(b) => b.is_empty(),
            Container::Run(r) => r.is_empty(),
        }
    }

    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        match self {
            Container::Array(a) => a.contains(value),
            Container::Bitmap(b) => b.contains(value),
            Container::Run(r) => r.contains(value),
        }
    }

    /// Number of values `<= value`.
    pub fn rank(&self, value: u16) -> usize {
        match self {
            Container::Array(a) => a.rank(value),
            Container::Bitmap(b) => b.rank(value),
            Container::Run(r) => r.rank(value),
        }
    }

    /// The `index`-th smallest value (0-based).
    ///
    /// Fails with `EmptyContainer` on an empty container and with `OutOfRange`
    /// when `index >= len()`.
    pub fn select(&self, index: usize) -> Result<u16> {
        if self.is_empty() {
            return Err(Error::empty_container("select"));
        }
        let value = match self {
            Container::Array(a) => a.select(index),
            Container::Bitmap(b) => b.select(index),
            Container::Run(r) => r.select(index),
        };
        value.ok_or_else(|| Error::out_of_range(index as u64, self.len() as u64))
    }

    pub fn first(&self) -> Result<u16> {
        let value = match self {
            Container::Array(a) => a.first(),
            Container::Bitmap(b) => b.first(),
            Container::Run(r) => r.first(),
        };
        value.ok_or_else(|| Error::empty_container("first"))
    }

    pub fn last(&self) -> Result<u16> {
        let value = match self {
            Container::Array(a) => a.last(),
            Container::Bitmap(b) => b.last(),
            Container::Run(r) => r.last(),
        };
        value.ok_or_else(|| Error::empty_container("last"))
    }

    /// Smallest value `>= from`.
    pub fn next_value(&self, from: u16) -> Option<u16> {
        match self {
            Container::Array(a) => a.next_value(from),
            Container::Bitmap(b) => b.next_value(from),
            Container::Run(r) => r.next_value(from),
        }
    }

    /// Largest value `<= from`.
    pub fn prev_value(&self, from: u16) -> Option<u16> {
        match self {
            Container::Array(a) => a.prev_value(from),
            Container::Bitmap(b) => b.prev_value(from),
            Container::Run(r) => r.prev_value(from),
        }
    }

    /// Smallest absent value `>= from`.
    pub fn next_absent(&self, from: u16) -> Option<u16> {
        match self {
            Container::Array(a) => a.next_absent(from),
            Container::Bitmap(b) => b.next_absent(from),
            Container::Run(r) => r.next_absent(from),
        }
    }

    /// Largest absent value `<= from`.
    pub fn prev_absent(&self, from: u16) -> Option<u16> {
        match self {
            Container::Array(a) => a.prev_absent(from),
            Container::Bitmap(b) => b.prev_absent(from),
            Container::Run(r) => r.prev_absent(from),
        }
    }

    /// Number of values inside `range`.
    pub fn range_cardinality(&self, range: Range<u32>) -> Result<usize> {
        check_range(&range)?;
        Ok(match self {
            Container::Array(a) => a.range_cardinality(range),
            Container::Bitmap(b) => b.range_cardinality(range),
            Container::Run(r) => r.range_cardinality(range),
        })
    }

    /// Whether every value of `range` is present; true for an empty range.
    pub fn contains_range(&self, range: Range<u32>) -> Result<bool> {
        check_range(&range)?;
        Ok(match self {
            Container::Array(a) => a.contains_range(range),
            Container::Bitmap(b) => b.contains_range(range),
            Container::Run(r) => r.contains_range(range),
        })
    }

    /// Whether any value of `range` is present; false for an empty range.
    pub fn intersects_range(&self, range: Range<u32>) -> Result<bool> {
        check_range(&range)?;
        Ok(match self {
            Container::Array(a) => a.intersects_range(range),
            Container::Bitmap(b) => b.intersects_range(range),
            Container::Run(r) => r.intersects_range(range),
        })
    }

    /// Number of maximal runs of consecutive values.
    pub fn count_runs(&self) -> usize {
        match self {
            Container::Array(a) => a.count_runs(),
            Container::Bitmap(b) => b.count_runs(),
            Container::Run(r) => r.run_count(),
        }
    }

    /// Values in ascending order; the iterator is double-ended.
    pub fn iter(&self) -> ContainerIter<'_> {
        ContainerIter::new(self)
    }

    /// Payload size in the portable serialization format.
    pub fn serialized_size_in_bytes(&self) -> usize {
        match self {
            Container::Array(a) => a.serialized_size_in_bytes(),
            Container::Bitmap(b) => b.serialized_size_in_bytes(),
            Container::Run(r) => r.serialized_size_in_bytes(),
        }
    }

    /// Bytes held on the heap by this container's payload.
    pub fn heap_size_bytes(&self) -> usize {
        match self {
            Container::Array(a) => a.heap_size_bytes(),
            Container::Bitmap(b) => b.heap_size_bytes(),
            Container::Run(r) => r.heap_size_bytes(),
        }
    }

    /// Owned copy with the same encoding.
    pub fn materialize(&self) -> Container {
        match self {
            Container::Array(a) => Container::Array(a.to_owned_array()),
            Container::Bitmap(b) => Container::Bitmap(b.to_owned_bitmap()),
            Container::Run(r) => Container::Run(r.to_owned_run()),
        }
    }

    /// Array-encoded copy; fails with `InvalidArgument` above
    /// [`ARRAY_MAX_LEN`] values.
    pub fn to_array(&self) -> Result<Container> {
        verify_arg!(len, self.len() <= ARRAY_MAX_LEN);
        Ok(Container::Array(match self {
            Container::Array(a) => a.to_owned_array(),
            Container::Bitmap(b) => b.to_array(),
            Container::Run(r) => r.to_array(),
        }))
    }

    /// Bitmap-encoded copy.
    pub fn to_bitmap(&self) -> Container {
        Container::Bitmap(match self {
            Container::Array(a) => a.to_bitmap(),
            Container::Bitmap(b) => b.to_owned_bitmap(),
            Container::Run(r) => r.to_bitmap(),
        })
    }

    /// Run-encoded copy.
    pub fn to_run(&self) -> Container {
        Container::Run(match self {
            Container::Array(a) => a.to_run(),
            Container::Bitmap(b) => b.to_run(),
            Container::Run(r) => r.to_owned_run(),
        })
    }

    /// The run-optimized form of this container, or `None` when the current
    /// encoding is already the smallest (ties keep the current encoding).
    pub fn run_optimized(&self) -> Option<Container> {
        match self {
            Container::Array(a) => {
                let run_size = run::serialized_size(a.count_runs());
                (run_size < a.serialized_size_in_bytes()).then(|| Container::Run(a.to_run()))
            }
            Container::Bitmap(b) => {
                let run_size = run::serialized_size(b.count_runs());
                (run_size < b.serialized_size_in_bytes()).then(|| Container::Run(b.to_run()))
            }
            Container::Run(r) => match Container::from_runs(r.to_owned_run()) {
                Container::Run(_) => None,
                other => Some(other),
            },
        }
    }

    pub fn and<S2: Storage>(&self, other: &Container<S2>) -> Container {
        match (self, other) {
            (Container::Array(a), Container::Array(b)) => Container::Array(a.and(b)),
            (Container::Array(a), Container::Bitmap(b)) => {
                Container::Array(a.filter(|v| b.contains(v)))
            }
            (Container::Bitmap(a), Container::Array(b)) => {
                Container::Array(b.filter(|v| a.contains(v)))
            }
            (Container::Bitmap(a), Container::Bitmap(b)) => {
                if a.and_cardinality(b) <= ARRAY_MAX_LEN {
                    Container::Array(a.and_to_array(b))
                } else {
                    Container::Bitmap(a.and(b))
                }
            }
            (Container::Array(a), Container::Run(r)) => Container::Array(r.and_array(a)),
            (Container::Run(r), Container::Array(a)) => Container::Array(r.and_array(a)),
            (Container::Bitmap(b), Container::Run(r)) => run_and_bitmap(r, b),
            (Container::Run(r), Container::Bitmap(b)) => run_and_bitmap(r, b),
            (Container::Run(a), Container::Run(b)) => Container::from_runs(a.and(b)),
        }
    }

    pub fn or<S2: Storage>(&self, other: &Container<S2>) -> Container {
        match (self, other) {
            (Container::Array(a), Container::Array(b)) => {
                Container::from_sorted_values(a.or_values(b))
            }
            (Container::Array(a), Container::Bitmap(b)) => array_or_bitmap(a, b),
            (Container::Bitmap(b), Container::Array(a)) => array_or_bitmap(a, b),
            (Container::Bitmap(a), Container::Bitmap(b)) => Container::from_bitmap(a.or(b)),
            (Container::Array(a), Container::Run(r)) => run_or_array(r, a),
            (Container::Run(r), Container::Array(a)) => run_or_array(r, a),
            (Container::Bitmap(b), Container::Run(r)) => run_or_bitmap(r, b),
            (Container::Run(r), Container::Bitmap(b)) => run_or_bitmap(r, b),
            (Container::Run(a), Container::Run(b)) => {
                if a.is_full() || b.is_full() {
                    Container::Run(RunContainer::full())
                } else {
                    Container::from_runs(a.or(b))
                }
            }
        }
    }

    pub fn xor<S2: Storage>(&self, other: &Container<S2>) -> Container {
        match (self, other) {
            (Container::Array(a), Container::Array(b)) => {
                Container::from_sorted_values(a.xor_values(b))
            }
            (Container::Array(a), Container::Bitmap(b)) => array_xor_bitmap(a, b),
            (Container::Bitmap(b), Container::Array(a)) => array_xor_bitmap(a, b),
            (Container::Bitmap(a), Container::Bitmap(b)) => Container::from_bitmap(a.xor(b)),
            (Container::Array(a), Container::Run(r)) => Container::from_runs(r.xor(&a.to_run())),
            (Container::Run(r), Container::Array(a)) => Container::from_runs(r.xor(&a.to_run())),
            (Container::Bitmap(b), Container::Run(r)) => run_xor_bitmap(r, b),
            (Container::Run(r), Container::Bitmap(b)) => run_xor_bitmap(r, b),
            (Container::Run(a), Container::Run(b)) => Container::from_runs(a.xor(b)),
        }
    }

    /// Values of `self` absent from `other`.
    pub fn and_not<S2: Storage>(&self, other: &Container<S2>) -> Container {
        match (self, other) {
            (Container::Array(a), Container::Array(b)) => Container::Array(a.and_not(b)),
            (Container::Array(a), Container::Bitmap(b)) => {
                Container::Array(a.filter(|v| !b.contains(v)))
            }
            (Container::Array(a), Container::Run(r)) => Container::Array(r.filter_array_outside(a)),
            (Container::Bitmap(a), Container::Array(b)) => {
                let mut out = a.to_owned_bitmap();
                b.iter().for_each(|v| {
                    out.remove(v);
                });
                Container::from_bitmap(out)
            }
            (Container::Bitmap(a), Container::Bitmap(b)) => Container::from_bitmap(a.and_not(b)),
            (Container::Bitmap(b), Container::Run(r)) => {
                let mut out = b.to_owned_bitmap();
                for run in r.runs() {
                    out.remove_range(run.to_range());
                }
                Container::from_bitmap(out)
            }
            (Container::Run(r), Container::Array(a)) => {
                Container::from_runs(r.and_not(&a.to_run()))
            }
            (Container::Run(r), Container::Bitmap(b)) => {
                if r.len() <= ARRAY_MAX_LEN {
                    let values = r.values().filter(|&v| !b.contains(v)).collect();
                    Container::Array(ArrayContainer::wrap(values))
                } else {
                    Container::from_bitmap(r.to_bitmap().and_not(b))
                }
            }
            (Container::Run(a), Container::Run(b)) => Container::from_runs(a.and_not(b)),
        }
    }

    /// Lazy union as a new container; see [`Container::lazy_or_with`].
    pub fn lazy_or<S2: Storage>(&self, other: &Container<S2>) -> Container {
        let mut out = self.materialize();
        out.lazy_or_with(other);
        out
    }

    pub(crate) fn apply<S2: Storage>(&self, op: SetOp, other: &Container<S2>) -> Container {
        match op {
            SetOp::And => self.and(other),
            SetOp::Or => self.or(other),
            SetOp::Xor => self.xor(other),
            SetOp::AndNot => self.and_not(other),
            SetOp::LazyOr => self.lazy_or(other),
        }
    }

    /// Size of the intersection, without materializing it.
    pub fn and_cardinality<S2: Storage>(&self, other: &Container<S2>) -> usize {
        match (self, other) {
            (Container::Array(a), Container::Array(b)) => a.and_cardinality(b),
            (Container::Array(a), Container::Bitmap(b)) => {
                a.iter().filter(|&v| b.contains(v)).count()
            }
            (Container::Bitmap(b), Container::Array(a)) => {
                a.iter().filter(|&v| b.contains(v)).count()
            }
            (Container::Bitmap(a), Container::Bitmap(b)) => a.and_cardinality(b),
            (Container::Array(a), Container::Run(r)) => r.and_array_cardinality(a),
            (Container::Run(r), Container::Array(a)) => r.and_array_cardinality(a),
            (Container::Bitmap(b), Container::Run(r)) => r.and_bitmap_cardinality(b),
            (Container::Run(r), Container::Bitmap(b)) => r.and_bitmap_cardinality(b),
            (Container::Run(a), Container::Run(b)) => a.and_cardinality(b),
        }
    }

    /// Whether the two containers share a value.
    pub fn intersects<S2: Storage>(&self, other: &Container<S2>) -> bool {
        match (self, other) {
            (Container::Array(a), Container::Array(b)) => a.intersects(b),
            (Container::Array(a), Container::Bitmap(b)) => a.iter().any(|v| b.contains(v)),
            (Container::Bitmap(b), Container::Array(a)) => a.iter().any(|v| b.contains(v)),
            (Container::Bitmap(a), Container::Bitmap(b)) => a.intersects(b),
            (Container::Array(a), Container::Run(r)) => a.iter().any(|v| r.contains(v)),
            (Container::Run(r), Container::Array(a)) => a.iter().any(|v| r.contains(v)),
            (Container::Bitmap(b), Container::Run(r)) => {
                r.runs().iter().any(|run| b.intersects_range(run.to_range()))
            }
            (Container::Run(r), Container::Bitmap(b)) => {
                r.runs().iter().any(|run| b.intersects_range(run.to_range()))
            }
            (Container::Run(a), Container::Run(b)) => a.intersects(b),
        }
    }

    /// Whether every value of `self` is in `other`.
    pub fn is_subset<S2: Storage>(&self, other: &Container<S2>) -> bool {
        let len = self.len();
        len <= other.len() && self.and_cardinality(other) == len
    }

    /// Values shifted up by `offset`: the part that stays within this key and
    /// the part that carries into the next key. Either part may be empty.
    pub fn add_offset(&self, offset: u16) -> (Container, Container) {
        match self {
            Container::Array(a) => {
                let (low, high) = a.add_offset(offset);
                (Container::Array(low), Container::Array(high))
            }
            Container::Bitmap(b) => {
                let (low, high) = b.add_offset(offset);
                (Container::from_bitmap(low), Container::from_bitmap(high))
            }
            Container::Run(r) => {
                let (low, high) = r.add_offset(offset);
                (Container::Run(low), Container::Run(high))
            }
        }
    }

    /// Checks the encoding invariants; used on untrusted deserialized input.
    pub fn validate(&self) -> Result<()> {
        match self {
            Container::Array(a) => {
                verify_data!(array_container, !a.is_empty() && a.len() <= ARRAY_MAX_LEN);
                verify_data!(
                    array_container,
                    util::is_strictly_increasing(a.values())
                );
            }
            Container::Bitmap(b) => {
                verify_data!(bitmap_container, b.words().len() == BITMAP_WORDS);
                let count = b.count_ones();
                verify_data!(
                    bitmap_container,
                    b.cardinality() == Cardinality::Valid(count as u32)
                );
                verify_data!(bitmap_container, count > ARRAY_MAX_LEN);
            }
            Container::Run(r) => {
                verify_data!(run_container, !r.is_empty());
                verify_data!(run_container, run::runs_are_canonical(r.runs()));
            }
        }
        Ok(())
    }
}

impl<S: Storage, S2: Storage> PartialEq<Container<S2>> for Container<S> {
    /// Content equality, regardless of encoding.
    fn eq(&self, other: &Container<S2>) -> bool {
        match (self, other) {
            (Container::Array(a), Container::Array(b)) => a.values() == b.values(),
            (Container::Bitmap(a), Container::Bitmap(b)) => a.words() == b.words(),
            (Container::Run(a), Container::Run(b)) => a.runs() == b.runs(),
            _ => self.len() == other.len() && self.iter().eq(other.iter()),
        }
    }
}

impl<S: Storage> Eq for Container<S> {}

fn check_range(range: &Range<u32>) -> Result<()> {
    verify_arg!(
        range,
        range.start <= range.end && range.end <= CONTAINER_SPAN
    );
    Ok(())
}

fn array_or_bitmap<V: AsRef<[u16]>, W: AsRef<[u64]>>(
    array: &ArrayContainer<V>,
    bitmap: &BitmapContainer<W>,
) -> Container {
    let mut out = bitmap.to_owned_bitmap();
    out.insert_many(array.iter());
    Container::from_bitmap(out)
}

fn array_xor_bitmap<V: AsRef<[u16]>, W: AsRef<[u64]>>(
    array: &ArrayContainer<V>,
    bitmap: &BitmapContainer<W>,
) -> Container {
    let mut out = bitmap.to_owned_bitmap();
    array.iter().for_each(|v| out.flip(v));
    Container::from_bitmap(out)
}

fn run_and_bitmap<R: AsRef<[Run]>, W: AsRef<[u64]>>(
    runs: &RunContainer<R>,
    bitmap: &BitmapContainer<W>,
) -> Container {
    if runs.is_full() {
        return Container::from_bitmap(bitmap.to_owned_bitmap());
    }
    if runs.len() <= ARRAY_MAX_LEN {
        let values = runs.values().filter(|&v| bitmap.contains(v)).collect();
        return Container::Array(ArrayContainer::wrap(values));
    }
    Container::from_bitmap(runs.and_bitmap(bitmap))
}

fn run_or_array<R: AsRef<[Run]>, V: AsRef<[u16]>>(
    runs: &RunContainer<R>,
    array: &ArrayContainer<V>,
) -> Container {
    if runs.is_full() {
        return Container::Run(RunContainer::full());
    }
    Container::from_runs(runs.or(&array.to_run()))
}

fn run_or_bitmap<R: AsRef<[Run]>, W: AsRef<[u64]>>(
    runs: &RunContainer<R>,
    bitmap: &BitmapContainer<W>,
) -> Container {
    if runs.is_full() {
        return Container::Run(RunContainer::full());
    }
    let mut out = bitmap.to_owned_bitmap();
    for run in runs.runs() {
        out.insert_range(run.to_range());
    }
    Container::from_bitmap(out)
}

fn run_xor_bitmap<R: AsRef<[Run]>, W: AsRef<[u64]>>(
    runs: &RunContainer<R>,
    bitmap: &BitmapContainer<W>,
) -> Container {
    let mut out = bitmap.to_owned_bitmap();
    for run in runs.runs() {
        out.flip_range(run.to_range());
    }
    Container::from_bitmap(out)
}
