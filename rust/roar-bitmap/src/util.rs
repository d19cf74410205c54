//! Sorted-slice helpers shared by the containers and the directory.

use std::cmp::Ordering;

/// Ratio between operand lengths above which intersections switch from a
/// linear two-pointer sweep to galloping over the larger operand.
const GALLOP_RATIO: usize = 64;

/// Splits a value into its bucket key and low 16 bits.
#[inline]
pub fn split(value: u32) -> (u16, u16) {
    ((value >> 16) as u16, value as u16)
}

/// Inverse of [`split`].
#[inline]
pub fn combine(key: u16, low: u16) -> u32 {
    ((key as u32) << 16) | low as u32
}

/// Returns the smallest index `i >= from` such that `values[i] >= target`, or
/// `values.len()` if there is none.
///
/// The search probes `from + 1, from + 2, from + 4, ...` before finishing with a
/// binary search, so its cost is logarithmic in the distance skipped rather than
/// in the slice length.
pub fn gallop<T: Ord + Copy>(values: &[T], from: usize, target: T) -> usize {
    if from >= values.len() || values[from] >= target {
        return from;
    }
    // values[lo] < target holds throughout.
    let mut lo = from;
    let mut step = 1;
    while lo + step < values.len() && values[lo + step] < target {
        lo += step;
        step *= 2;
    }
    let hi = (lo + step).min(values.len());
    lo + 1 + values[lo + 1..hi].partition_point(|&v| v < target)
}

/// Appends the intersection of two strictly increasing slices to `out`.
pub fn intersect_sorted<T: Ord + Copy>(a: &[T], b: &[T], out: &mut Vec<T>) {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if small.is_empty() {
        return;
    }
    if small.len() * GALLOP_RATIO < large.len() {
        let mut pos = 0;
        for &value in small {
            pos = gallop(large, pos, value);
            if pos == large.len() {
                break;
            }
            if large[pos] == value {
                out.push(value);
                pos += 1;
            }
        }
        return;
    }
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
}

/// Size of the intersection of two strictly increasing slices.
pub fn intersection_count<T: Ord + Copy>(a: &[T], b: &[T]) -> usize {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if small.len() * GALLOP_RATIO < large.len() {
        let mut pos = 0;
        let mut count = 0;
        for &value in small {
            pos = gallop(large, pos, value);
            if pos == large.len() {
                break;
            }
            if large[pos] == value {
                count += 1;
                pos += 1;
            }
        }
        return count;
    }
    let (mut i, mut j, mut count) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                count += 1;
                i += 1;
                j += 1;
            }
        }
    }
    count
}

/// Whether two strictly increasing slices share at least one value.
pub fn intersects_sorted<T: Ord + Copy>(a: &[T], b: &[T]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i = gallop(a, i, b[j]),
            Ordering::Greater => j = gallop(b, j, a[i]),
            Ordering::Equal => return true,
        }
    }
    false
}

/// Appends the union of two strictly increasing slices to `out`.
pub fn union_sorted<T: Ord + Copy>(a: &[T], b: &[T], out: &mut Vec<T>) {
    out.reserve(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
}

/// Appends the values of `a` that are absent from `b` to `out`.
pub fn difference_sorted<T: Ord + Copy>(a: &[T], b: &[T], out: &mut Vec<T>) {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            Ordering::Greater => j = gallop(b, j, a[i]),
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
}

/// Appends the values present in exactly one of the two slices to `out`.
pub fn symmetric_difference_sorted<T: Ord + Copy>(a: &[T], b: &[T], out: &mut Vec<T>) {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
}

/// Whether the slice is strictly increasing.
pub fn is_strictly_increasing<T: Ord>(values: &[T]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}
