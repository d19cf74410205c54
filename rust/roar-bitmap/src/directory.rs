//! The ordered map from bucket key to container.
//!
//! Keys are strictly increasing and every stored container is non-empty (lazy
//! unions may temporarily hold bitmaps whose cardinality awaits repair). The
//! merge routines walk two directories in key order, galloping over the side
//! whose unmatched containers are dropped.

use std::{cmp::Ordering, mem};

use crate::{
    container::{Container, SetOp},
    storage::{Owned, Storage},
    util,
};

#[derive(Clone, Debug)]
pub struct ContainerDirectory<S: Storage = Owned> {
    keys: Vec<u16>,
    containers: Vec<Container<S>>,
}

impl<S: Storage> Default for ContainerDirectory<S> {
    fn default() -> Self {
        ContainerDirectory {
            keys: Vec::new(),
            containers: Vec::new(),
        }
    }
}

impl<S: Storage> ContainerDirectory<S> {
    pub fn with_capacity(capacity: usize) -> ContainerDirectory<S> {
        ContainerDirectory {
            keys: Vec::with_capacity(capacity),
            containers: Vec::with_capacity(capacity),
        }
    }

    /// Number of containers.
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[u16] {
        &self.keys
    }

    pub fn containers(&self) -> &[Container<S>] {
        &self.containers
    }

    /// Position of `key`, or the position where it would be inserted.
    #[inline]
    pub fn locate(&self, key: u16) -> std::result::Result<usize, usize> {
        self.keys.binary_search(&key)
    }

    /// First position at or after `from` whose key is `>= key`.
    pub fn locate_from(&self, from: usize, key: u16) -> usize {
        util::gallop(&self.keys, from, key)
    }

    pub fn get(&self, key: u16) -> Option<&Container<S>> {
        self.locate(key).ok().map(|i| &self.containers[i])
    }

    /// Key and container at position `index`.
    pub fn entry(&self, index: usize) -> (u16, &Container<S>) {
        (self.keys[index], &self.containers[index])
    }

    pub fn iter(
        &self,
    ) -> impl DoubleEndedIterator<Item = (u16, &Container<S>)> + ExactSizeIterator + '_ {
        self.keys.iter().copied().zip(self.containers.iter())
    }

    /// Total number of values across all containers.
    pub fn cardinality(&self) -> u64 {
        self.containers.iter().map(|c| c.len() as u64).sum()
    }

    pub fn heap_size_bytes(&self) -> usize {
        self.keys.capacity() * size_of::<u16>()
            + self.containers.capacity() * size_of::<Container<S>>()
            + self
                .containers
                .iter()
                .map(Container::heap_size_bytes)
                .sum::<usize>()
    }

    /// Owned deep copy.
    pub fn materialize(&self) -> ContainerDirectory {
        ContainerDirectory {
            keys: self.keys.clone(),
            containers: self.containers.iter().map(Container::materialize).collect(),
        }
    }

    /// Appends a container whose key is greater than every stored key.
    pub fn append(&mut self, key: u16, container: Container<S>) {
        debug_assert!(self.keys.last().is_none_or(|&last| last < key));
        self.keys.push(key);
        self.containers.push(container);
    }

    /// Combines two directories key by key into a new owned directory.
    pub(crate) fn merge<S2: Storage>(
        &self,
        op: SetOp,
        other: &ContainerDirectory<S2>,
    ) -> ContainerDirectory {
        let (a, b) = (&self.keys, &other.keys);
        let mut out = ContainerDirectory::with_capacity(match op {
            SetOp::And => a.len().min(b.len()),
            SetOp::AndNot => a.len(),
            _ => a.len() + b.len(),
        });
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                Ordering::Less if op.keeps_left() => {
                    out.append(a[i], self.containers[i].materialize());
                    i += 1;
                }
                Ordering::Less => i = util::gallop(a, i, b[j]),
                Ordering::Greater if op.keeps_right() => {
                    out.append(b[j], other.containers[j].materialize());
                    j += 1;
                }
                Ordering::Greater => j = util::gallop(b, j, a[i]),
                Ordering::Equal => {
                    let container = self.containers[i].apply(op, &other.containers[j]);
                    if !container.is_empty() {
                        out.append(a[i], container);
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        if op.keeps_left() {
            for k in i..a.len() {
                out.append(a[k], self.containers[k].materialize());
            }
        }
        if op.keeps_right() {
            for k in j..b.len() {
                out.append(b[k], other.containers[k].materialize());
            }
        }
        out
    }

    /// Size of the intersection of two directories.
    pub(crate) fn and_cardinality<S2: Storage>(&self, other: &ContainerDirectory<S2>) -> u64 {
        let mut total = 0;
        self.for_each_match(other, |a, b| {
            total += a.and_cardinality(b) as u64;
            true
        });
        total
    }

    pub(crate) fn intersects<S2: Storage>(&self, other: &ContainerDirectory<S2>) -> bool {
        let mut found = false;
        self.for_each_match(other, |a, b| {
            found = a.intersects(b);
            !found
        });
        found
    }

    /// Whether every value of `self` is in `other`.
    pub(crate) fn is_subset<S2: Storage>(&self, other: &ContainerDirectory<S2>) -> bool {
        if self.len() > other.len() {
            return false;
        }
        let mut j = 0;
        for (key, container) in self.iter() {
            j = other.locate_from(j, key);
            if j == other.len() || other.keys[j] != key || !container.is_subset(&other.containers[j])
            {
                return false;
            }
            j += 1;
        }
        true
    }

    /// Calls `f` on every pair of containers sharing a key, in key order, until
    /// `f` returns false.
    fn for_each_match<S2: Storage>(
        &self,
        other: &ContainerDirectory<S2>,
        mut f: impl FnMut(&Container<S>, &Container<S2>) -> bool,
    ) {
        let (a, b) = (&self.keys, &other.keys);
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                Ordering::Less => i = util::gallop(a, i, b[j]),
                Ordering::Greater => j = util::gallop(b, j, a[i]),
                Ordering::Equal => {
                    if !f(&self.containers[i], &other.containers[j]) {
                        return;
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
    }
}

impl ContainerDirectory {
    pub fn get_mut(&mut self, key: u16) -> Option<&mut Container> {
        self.locate(key).ok().map(|i| &mut self.containers[i])
    }

    /// Container for `key`, inserting an empty array container when absent.
    ///
    /// The caller must populate a newly inserted container before the directory
    /// is observed again.
    pub fn get_or_insert(&mut self, key: u16) -> &mut Container {
        let index = match self.locate(key) {
            Ok(index) => index,
            Err(index) => {
                self.insert(index, key, Container::new());
                index
            }
        };
        &mut self.containers[index]
    }

    pub fn container_at_mut(&mut self, index: usize) -> &mut Container {
        &mut self.containers[index]
    }

    /// Swaps in `container` at `index` and returns the previous one.
    pub fn replace(&mut self, index: usize, container: Container) -> Container {
        mem::replace(&mut self.containers[index], container)
    }

    pub fn insert(&mut self, index: usize, key: u16, container: Container) {
        debug_assert!(index == 0 || self.keys[index - 1] < key);
        debug_assert!(index == self.keys.len() || key < self.keys[index]);
        self.keys.insert(index, key);
        self.containers.insert(index, container);
    }

    pub fn remove_at(&mut self, index: usize) -> (u16, Container) {
        (self.keys.remove(index), self.containers.remove(index))
    }

    /// Drops the container at `index` if it became empty.
    pub fn remove_if_empty(&mut self, index: usize) {
        if self.containers[index].is_empty() {
            self.remove_at(index);
        }
    }

    /// Drops every empty container.
    pub fn retain_non_empty(&mut self) {
        let mut write = 0;
        for read in 0..self.keys.len() {
            if !self.containers[read].is_empty() {
                self.keys.swap(write, read);
                self.containers.swap(write, read);
                write += 1;
            }
        }
        self.truncate(write);
    }

    pub fn last_mut(&mut self) -> Option<(u16, &mut Container)> {
        let key = *self.keys.last()?;
        self.containers.last_mut().map(|c| (key, c))
    }

    pub fn containers_mut(&mut self) -> std::slice::IterMut<'_, Container> {
        self.containers.iter_mut()
    }

    pub fn truncate(&mut self, len: usize) {
        self.keys.truncate(len);
        self.containers.truncate(len);
    }

    /// Removes positions `start..end`.
    pub fn drain_positions(&mut self, start: usize, end: usize) {
        self.keys.drain(start..end);
        self.containers.drain(start..end);
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.containers.clear();
    }

    pub fn shrink_to_fit(&mut self) {
        self.keys.shrink_to_fit();
        self.containers.shrink_to_fit();
        self.containers.iter_mut().for_each(Container::shrink_to_fit);
    }

    /// Combines `other` into `self` key by key.
    pub(crate) fn merge_in_place<S2: Storage>(&mut self, op: SetOp, other: &ContainerDirectory<S2>) {
        let keys = mem::take(&mut self.keys);
        let containers = mem::take(&mut self.containers);
        let (b_keys, b) = (&other.keys, &other.containers);
        if op.keeps_right() {
            self.keys.reserve(keys.len() + b_keys.len());
            self.containers.reserve(keys.len() + b_keys.len());
        }
        let mut j = 0;
        for (key, mut container) in keys.into_iter().zip(containers) {
            if op.keeps_right() {
                while j < b_keys.len() && b_keys[j] < key {
                    self.append(b_keys[j], b[j].materialize());
                    j += 1;
                }
            } else {
                j = util::gallop(b_keys, j, key);
            }
            if j < b_keys.len() && b_keys[j] == key {
                container.apply_in_place(op, &b[j]);
                j += 1;
                if !container.is_empty() {
                    self.append(key, container);
                }
            } else if op.keeps_left() {
                self.append(key, container);
            }
        }
        if op.keeps_right() {
            for k in j..b_keys.len() {
                self.append(b_keys[k], b[k].materialize());
            }
        }
    }
}

impl<S: Storage, S2: Storage> PartialEq<ContainerDirectory<S2>> for ContainerDirectory<S> {
    fn eq(&self, other: &ContainerDirectory<S2>) -> bool {
        self.keys == other.keys
            && self
                .containers
                .iter()
                .zip(other.containers.iter())
                .all(|(a, b)| a == b)
    }
}
