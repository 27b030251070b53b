// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Partitions of an address space into disjoint ranges with uniform values.

use crate::DeviceSize;
use std::{
    collections::BTreeMap,
    fmt::{Debug, Error as FmtError, Formatter},
    ops::Range,
};

/// A map from disjoint, half-open ranges `start..end` to values.
///
/// Unlike a general range map, values are never merged on insertion. Ranges are split whenever an
/// operation only covers part of them, and [`coalesce`] joins touching ranges back together once
/// their values are equal again.
///
/// [`coalesce`]: RangeMap::coalesce
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct RangeMap<V> {
    // The range start is the key, the end is stored next to the value.
    btm: BTreeMap<DeviceSize, Entry<V>>,
}

#[derive(Clone, PartialEq, Eq)]
struct Entry<V> {
    end: DeviceSize,
    value: V,
}

impl<V> Default for RangeMap<V> {
    #[inline]
    fn default() -> Self {
        RangeMap {
            btm: BTreeMap::new(),
        }
    }
}

impl<V> RangeMap<V> {
    #[cfg(test)]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the number of partitions.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.btm.len()
    }

    /// Iterates over all partitions in ascending order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (Range<DeviceSize>, &V)> + '_ {
        self.btm
            .iter()
            .map(|(&start, entry)| (start..entry.end, &entry.value))
    }

    /// Returns the key of the first partition that overlaps `range`, or `range.start` if none
    /// starts before it.
    fn first_overlapping_key(&self, range: &Range<DeviceSize>) -> DeviceSize {
        self.btm
            .range(..=range.start)
            .next_back()
            .filter(|(_, entry)| entry.end > range.start)
            .map_or(range.start, |(&start, _)| start)
    }

    /// Iterates over the partitions that overlap `range`.
    ///
    /// The partitions are returned whole; they may extend past either end of `range`.
    pub(crate) fn range(
        &self,
        range: &Range<DeviceSize>,
    ) -> impl Iterator<Item = (Range<DeviceSize>, &V)> + '_ {
        let (first, end) = if range.is_empty() {
            (0, 0)
        } else {
            (self.first_overlapping_key(range), range.end)
        };

        self.btm
            .range(first..end)
            .map(|(&start, entry)| (start..entry.end, &entry.value))
    }

    /// Iterates mutably over the partitions that overlap `range`.
    ///
    /// Call [`split_at`] on both ends of `range` first to only get the partitions inside it.
    ///
    /// [`split_at`]: RangeMap::split_at
    pub(crate) fn range_mut(
        &mut self,
        range: &Range<DeviceSize>,
    ) -> impl Iterator<Item = (Range<DeviceSize>, &mut V)> + '_ {
        let (first, end) = if range.is_empty() {
            (0, 0)
        } else {
            (self.first_overlapping_key(range), range.end)
        };

        self.btm
            .range_mut(first..end)
            .map(|(&start, entry)| (start..entry.end, &mut entry.value))
    }

    /// Returns the ranges inside `range` that no partition covers.
    pub(crate) fn gaps(&self, range: &Range<DeviceSize>) -> Vec<Range<DeviceSize>> {
        let mut gaps = Vec::new();
        let mut cursor = range.start;

        for (partition, _) in self.range(range) {
            if partition.start > cursor {
                gaps.push(cursor..partition.start);
            }

            cursor = cursor.max(partition.end);
        }

        if cursor < range.end {
            gaps.push(cursor..range.end);
        }

        gaps
    }

    /// Removes all partitions inside `range` and inserts `value` over the whole of it.
    ///
    /// Partitions that stick out of `range` must have been split beforehand.
    fn replace_inside(&mut self, range: Range<DeviceSize>, value: V) {
        let inside: Vec<DeviceSize> = self
            .btm
            .range(range.start..range.end)
            .map(|(&start, _)| start)
            .collect();

        for start in inside {
            self.btm.remove(&start);
        }

        self.btm.insert(
            range.start,
            Entry {
                end: range.end,
                value,
            },
        );
    }
}

impl<V> RangeMap<V>
where
    V: Clone,
{
    /// Splits the partition containing `at` in two, so that a partition boundary lies at `at`.
    pub(crate) fn split_at(&mut self, at: DeviceSize) {
        let Some((&start, entry)) = self.btm.range(..at).next_back() else {
            return;
        };

        if entry.end <= at {
            return;
        }

        let tail = Entry {
            end: entry.end,
            value: entry.value.clone(),
        };

        if let Some(entry) = self.btm.get_mut(&start) {
            entry.end = at;
        }

        self.btm.insert(at, tail);
    }

    /// Splits the partitions at both ends of `range`, then fills the gaps inside it with values
    /// from `fill`.
    ///
    /// Afterwards, `range` is covered exactly by whole partitions.
    pub(crate) fn cover(&mut self, range: &Range<DeviceSize>, mut fill: impl FnMut() -> V) {
        if range.is_empty() {
            return;
        }

        self.split_at(range.start);
        self.split_at(range.end);

        for gap in self.gaps(range) {
            self.btm.insert(
                gap.start,
                Entry {
                    end: gap.end,
                    value: fill(),
                },
            );
        }
    }

    /// Overwrites `range` with `value`, discarding what was there before.
    pub(crate) fn insert(&mut self, range: Range<DeviceSize>, value: V) {
        if range.is_empty() {
            return;
        }

        self.split_at(range.start);
        self.split_at(range.end);
        self.replace_inside(range, value);
    }
}

impl<V> RangeMap<V>
where
    V: PartialEq,
{
    /// Joins touching partitions with equal values that overlap or border `range`.
    pub(crate) fn coalesce(&mut self, range: &Range<DeviceSize>) {
        let first = self
            .btm
            .range(..range.start)
            .next_back()
            .map_or(range.start, |(&start, _)| start);
        let keys: Vec<DeviceSize> = self
            .btm
            .range(first..=range.end)
            .map(|(&start, _)| start)
            .collect();

        let mut current = None;

        for start in keys {
            let Some(prev_start) = current else {
                current = Some(start);
                continue;
            };

            let joinable = match (self.btm.get(&prev_start), self.btm.get(&start)) {
                (Some(prev), Some(next)) => prev.end == start && prev.value == next.value,
                _ => false,
            };

            if joinable {
                if let Some(next) = self.btm.remove(&start) {
                    if let Some(prev) = self.btm.get_mut(&prev_start) {
                        prev.end = next.end;
                    }
                }
            } else {
                current = Some(start);
            }
        }
    }
}

impl<V> Debug for RangeMap<V>
where
    V: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_map().entries(self.iter()).finish()
    }
}
