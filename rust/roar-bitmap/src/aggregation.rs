//! K-way aggregation of many bitmaps.
//!
//! Every helper reads its inputs only and returns a new owned [`Bitmap`].
//! Strategies:
//! - naive: a left fold of in-place pairwise operations.
//! - priority queue: repeatedly combines the two inputs with the fewest values.
//! - horizontal: groups the containers of all inputs by key and reduces each
//!   group once; unions go through lazy container ORs with a single repair.
//! - parallel: the horizontal reduction with key groups spread over the rayon
//!   pool.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BinaryHeap},
};

use rayon::prelude::*;
use roar_common::Result;

use crate::{
    bitmap::{Bitmap, BitmapBase},
    config::{AggregationConfig, AggregationStrategy},
    container::Container,
    directory::ContainerDirectory,
    storage::Storage,
};

/// Operation reduced by [`aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    And,
    Or,
    Xor,
}

impl AggregateOp {
    fn apply<S: Storage, S2: Storage>(self, a: &BitmapBase<S>, b: &BitmapBase<S2>) -> Bitmap {
        match self {
            AggregateOp::And => a.and(b),
            AggregateOp::Or => a.or(b),
            AggregateOp::Xor => a.xor(b),
        }
    }

    fn apply_in_place<S: Storage>(self, target: &mut Bitmap, other: &BitmapBase<S>) {
        match self {
            AggregateOp::And => target.and_with(other),
            AggregateOp::Or => target.or_with(other),
            AggregateOp::Xor => target.xor_with(other),
        }
    }
}

/// Union of all inputs.
pub fn or<'a, S: Storage + 'a>(inputs: impl IntoIterator<Item = &'a BitmapBase<S>>) -> Bitmap {
    horizontal_or(inputs)
}

/// Intersection of all inputs; empty when there are none.
///
/// Inputs are intersected smallest first and the reduction stops as soon as the
/// partial result is empty.
pub fn and<'a, S: Storage + 'a>(inputs: impl IntoIterator<Item = &'a BitmapBase<S>>) -> Bitmap {
    let mut inputs = inputs.into_iter().collect::<Vec<_>>();
    inputs.sort_by_key(|bitmap| bitmap.len());
    naive_and(inputs)
}

/// Symmetric difference of all inputs.
pub fn xor<'a, S: Storage + 'a>(inputs: impl IntoIterator<Item = &'a BitmapBase<S>>) -> Bitmap {
    horizontal_xor(inputs)
}

pub fn naive_or<'a, S: Storage + 'a>(
    inputs: impl IntoIterator<Item = &'a BitmapBase<S>>,
) -> Bitmap {
    naive_fold(AggregateOp::Or, inputs)
}

pub fn naive_and<'a, S: Storage + 'a>(
    inputs: impl IntoIterator<Item = &'a BitmapBase<S>>,
) -> Bitmap {
    naive_fold(AggregateOp::And, inputs)
}

pub fn naive_xor<'a, S: Storage + 'a>(
    inputs: impl IntoIterator<Item = &'a BitmapBase<S>>,
) -> Bitmap {
    naive_fold(AggregateOp::Xor, inputs)
}

pub fn priority_queue_or<'a, S: Storage + 'a>(
    inputs: impl IntoIterator<Item = &'a BitmapBase<S>>,
) -> Bitmap {
    priority_queue(AggregateOp::Or, inputs)
}

pub fn priority_queue_xor<'a, S: Storage + 'a>(
    inputs: impl IntoIterator<Item = &'a BitmapBase<S>>,
) -> Bitmap {
    priority_queue(AggregateOp::Xor, inputs)
}

pub fn horizontal_or<'a, S: Storage + 'a>(
    inputs: impl IntoIterator<Item = &'a BitmapBase<S>>,
) -> Bitmap {
    let groups = group_by_key(inputs);
    collect_groups(groups.into_iter().map(|(key, group)| (key, union_group(&group))))
}

pub fn horizontal_xor<'a, S: Storage + 'a>(
    inputs: impl IntoIterator<Item = &'a BitmapBase<S>>,
) -> Bitmap {
    let groups = group_by_key(inputs);
    collect_groups(groups.into_iter().map(|(key, group)| (key, xor_group(&group))))
}

/// [`horizontal_or`] with key groups reduced on the rayon pool.
pub fn par_or<'a, S: Storage + 'a>(inputs: impl IntoIterator<Item = &'a BitmapBase<S>>) -> Bitmap {
    let groups = group_by_key(inputs).into_iter().collect::<Vec<_>>();
    let reduced = groups
        .into_par_iter()
        .map(|(key, group)| (key, union_group(&group)))
        .collect::<Vec<_>>();
    collect_groups(reduced.into_iter())
}

/// [`horizontal_xor`] with key groups reduced on the rayon pool.
pub fn par_xor<'a, S: Storage + 'a>(
    inputs: impl IntoIterator<Item = &'a BitmapBase<S>>,
) -> Bitmap {
    let groups = group_by_key(inputs).into_iter().collect::<Vec<_>>();
    let reduced = groups
        .into_par_iter()
        .map(|(key, group)| (key, xor_group(&group)))
        .collect::<Vec<_>>();
    collect_groups(reduced.into_iter())
}

/// Reduces `inputs` with `op` using the strategy selected by `config`.
///
/// Intersections have no key-grouped or queued form; every strategy other than
/// `Naive` intersects smallest first (see [`and`]).
pub fn aggregate<'a, S: Storage + 'a>(
    op: AggregateOp,
    inputs: impl IntoIterator<Item = &'a BitmapBase<S>>,
    config: &AggregationConfig,
) -> Result<Bitmap> {
    config.validate()?;
    let inputs = inputs.into_iter().collect::<Vec<_>>();
    let strategy = match config.strategy {
        AggregationStrategy::Parallel if inputs.len() < config.parallel_min_inputs => {
            AggregationStrategy::Horizontal
        }
        strategy => strategy,
    };
    log::debug!(
        "aggregate {op:?} over {} inputs using {strategy:?}",
        inputs.len()
    );
    Ok(match (op, strategy) {
        (_, AggregationStrategy::Naive) => naive_fold(op, inputs),
        (AggregateOp::And, _) => and(inputs),
        (_, AggregationStrategy::PriorityQueue) => priority_queue(op, inputs),
        (AggregateOp::Or, AggregationStrategy::Horizontal) => horizontal_or(inputs),
        (AggregateOp::Xor, AggregationStrategy::Horizontal) => horizontal_xor(inputs),
        (AggregateOp::Or, AggregationStrategy::Parallel) => par_or(inputs),
        (AggregateOp::Xor, AggregationStrategy::Parallel) => par_xor(inputs),
    })
}

fn naive_fold<'a, S: Storage + 'a>(
    op: AggregateOp,
    inputs: impl IntoIterator<Item = &'a BitmapBase<S>>,
) -> Bitmap {
    let mut inputs = inputs.into_iter();
    let Some(first) = inputs.next() else {
        return Bitmap::new();
    };
    let mut result = first.materialize();
    for input in inputs {
        if op == AggregateOp::And && result.is_empty() {
            break;
        }
        op.apply_in_place(&mut result, input);
    }
    result
}

/// Partial result held by the priority queue.
enum Operand<'a, S: Storage> {
    Input(&'a BitmapBase<S>),
    Owned(Bitmap),
}

impl<S: Storage> Operand<'_, S> {
    fn len(&self) -> u64 {
        match self {
            Operand::Input(bitmap) => bitmap.len(),
            Operand::Owned(bitmap) => bitmap.len(),
        }
    }

    fn combine(self, op: AggregateOp, other: Self) -> Bitmap {
        match (self, other) {
            (Operand::Owned(mut a), Operand::Owned(b)) => {
                op.apply_in_place(&mut a, &b);
                a
            }
            (Operand::Owned(mut a), Operand::Input(b)) | (Operand::Input(b), Operand::Owned(mut a)) => {
                op.apply_in_place(&mut a, b);
                a
            }
            (Operand::Input(a), Operand::Input(b)) => op.apply(a, b),
        }
    }

    fn into_bitmap(self) -> Bitmap {
        match self {
            Operand::Input(bitmap) => bitmap.materialize(),
            Operand::Owned(bitmap) => bitmap,
        }
    }
}

fn priority_queue<'a, S: Storage + 'a>(
    op: AggregateOp,
    inputs: impl IntoIterator<Item = &'a BitmapBase<S>>,
) -> Bitmap {
    let mut slots = inputs
        .into_iter()
        .map(|bitmap| Some(Operand::Input(bitmap)))
        .collect::<Vec<_>>();
    let mut heap = slots
        .iter()
        .enumerate()
        .filter_map(|(slot, operand)| Some(Reverse((operand.as_ref()?.len(), slot))))
        .collect::<BinaryHeap<_>>();

    while let (Some(Reverse((_, a))), Some(Reverse((_, b)))) = (heap.pop(), heap.pop()) {
        let (Some(left), Some(right)) = (slots[a].take(), slots[b].take()) else {
            break;
        };
        let combined = left.combine(op, right);
        heap.push(Reverse((combined.len(), slots.len())));
        slots.push(Some(Operand::Owned(combined)));
    }
    slots
        .into_iter()
        .flatten()
        .next()
        .map_or_else(Bitmap::new, Operand::into_bitmap)
}

fn group_by_key<'a, S: Storage + 'a>(
    inputs: impl IntoIterator<Item = &'a BitmapBase<S>>,
) -> BTreeMap<u16, Vec<&'a Container<S>>> {
    let mut groups = BTreeMap::<u16, Vec<&'a Container<S>>>::new();
    for bitmap in inputs {
        for (key, container) in bitmap.directory().iter() {
            groups.entry(key).or_default().push(container);
        }
    }
    groups
}

fn union_group<S: Storage>(group: &[&Container<S>]) -> Container {
    let Some((first, rest)) = group.split_first() else {
        return Container::new();
    };
    let mut result = first.materialize();
    for container in rest {
        result.lazy_or_with(*container);
    }
    result.repair_after_lazy();
    result
}

fn xor_group<S: Storage>(group: &[&Container<S>]) -> Container {
    let Some((first, rest)) = group.split_first() else {
        return Container::new();
    };
    let mut result = first.materialize();
    for container in rest {
        result.xor_with(*container);
    }
    result
}

fn collect_groups(groups: impl Iterator<Item = (u16, Container)>) -> Bitmap {
    let mut directory = ContainerDirectory::default();
    for (key, container) in groups {
        if !container.is_empty() {
            directory.append(key, container);
        }
    }
    Bitmap::from_directory(directory)
}
