// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The access state table of a command buffer, or of one subpass of a render pass.

use crate::{
    access::{Conflict, ResourceAccessState, SyncOrdering, Tag},
    range_map::RangeMap,
    resource::ResourceId,
    sync::{AccessType, SyncBarrier},
    DeviceSize,
};
use foldhash::HashMap;
use smallvec::SmallVec;
use std::ops::Range;

/// A barrier together with the part of the address space it applies to.
#[derive(Clone, Debug)]
pub(crate) struct ScopedBarrier {
    pub(crate) barrier: SyncBarrier,
    pub(crate) scope: BarrierScope,
}

#[derive(Clone, Debug)]
pub(crate) enum BarrierScope {
    /// All ranges of all resources.
    Global,
    /// Some ranges of one resource, optionally transitioning their layout.
    Resource {
        resource: ResourceId,
        ranges: Vec<Range<DeviceSize>>,
        layout_transition: bool,
    },
}

/// The access history of every range of every resource that has been accessed.
#[derive(Clone, Debug, Default)]
pub(crate) struct AccessContext {
    resources: HashMap<ResourceId, RangeMap<ResourceAccessState>>,
}

impl AccessContext {
    #[inline]
    pub(crate) fn new() -> Self {
        AccessContext::default()
    }

    /// Forgets all access history.
    #[inline]
    pub(crate) fn reset(&mut self) {
        self.resources.clear();
    }

    /// Iterates over the partitions of `resource` that overlap `range`, clipped to `range`.
    fn partitions<'a>(
        &'a self,
        resource: ResourceId,
        range: &'a Range<DeviceSize>,
    ) -> impl Iterator<Item = (Range<DeviceSize>, &'a ResourceAccessState)> + 'a {
        self.resources
            .get(&resource)
            .into_iter()
            .flat_map(move |map| map.range(range))
            .map(move |(partition, state)| {
                (
                    partition.start.max(range.start)..partition.end.min(range.end),
                    state,
                )
            })
    }

    /// Returns the first conflict of `access` to `range` of `resource` with the history.
    pub(crate) fn detect_hazard(
        &self,
        resource: ResourceId,
        range: &Range<DeviceSize>,
        access: AccessType,
        ordering: SyncOrdering,
    ) -> Option<(Range<DeviceSize>, Conflict)> {
        self.partitions(resource, range).find_map(|(partition, state)| {
            state
                .detect_ordered_hazard(access, ordering)
                .map(|conflict| (partition, conflict))
        })
    }

    /// Returns the first race of `access` to `range` of `resource` with an access made at or
    /// after `start_tag`.
    pub(crate) fn detect_async_hazard(
        &self,
        resource: ResourceId,
        range: &Range<DeviceSize>,
        access: AccessType,
        start_tag: Tag,
    ) -> Option<(Range<DeviceSize>, Conflict)> {
        self.partitions(resource, range).find_map(|(partition, state)| {
            state
                .detect_async_hazard(access, start_tag)
                .map(|conflict| (partition, conflict))
        })
    }

    /// Returns the first conflict of a layout transition of `range` of `resource`, made by
    /// `barrier`, with the history.
    pub(crate) fn detect_barrier_hazard(
        &self,
        resource: ResourceId,
        range: &Range<DeviceSize>,
        barrier: &SyncBarrier,
    ) -> Option<(Range<DeviceSize>, Conflict)> {
        self.partitions(resource, range).find_map(|(partition, state)| {
            state
                .detect_barrier_hazard(barrier)
                .map(|conflict| (partition, conflict))
        })
    }

    /// Records `access` to `range` of `resource`.
    pub(crate) fn update(
        &mut self,
        resource: ResourceId,
        range: &Range<DeviceSize>,
        access: AccessType,
        tag: Tag,
    ) {
        if range.is_empty() {
            return;
        }

        let map = self.resources.entry(resource).or_default();
        let partitions = map.len();
        map.cover(range, ResourceAccessState::default);

        for (_, state) in map.range_mut(range) {
            state.update(access, tag);
        }

        map.coalesce(range);

        if map.len() > partitions {
            tracing::trace!(
                target: "vulkano_syncval",
                ?resource,
                partitions = map.len(),
                "split access partitions",
            );
        }
    }

    /// Applies a set of barriers that take effect simultaneously, each restricted to its scope.
    ///
    /// A part of the address space only receives the barriers whose scope covers it. If
    /// `before_tag` is given, only accesses older than it are in the source scopes.
    pub(crate) fn apply_barriers(
        &mut self,
        barriers: &[ScopedBarrier],
        tag: Tag,
        before_tag: Option<Tag>,
    ) {
        let global: SmallVec<[SyncBarrier; 2]> = barriers
            .iter()
            .filter(|b| matches!(b.scope, BarrierScope::Global))
            .map(|b| b.barrier)
            .collect();

        // Layout transitions also cover ranges that have no history yet.
        for scoped in barriers {
            if let BarrierScope::Resource {
                resource,
                ranges,
                layout_transition: true,
            } = &scoped.scope
            {
                let map = self.resources.entry(*resource).or_default();

                for range in ranges {
                    map.cover(range, ResourceAccessState::default);
                }
            }
        }

        for (&resource, map) in self.resources.iter_mut() {
            let scoped: SmallVec<[(&SyncBarrier, &[Range<DeviceSize>], bool); 4]> = barriers
                .iter()
                .filter_map(|b| match &b.scope {
                    BarrierScope::Resource {
                        resource: r,
                        ranges,
                        layout_transition,
                    } if *r == resource => {
                        Some((&b.barrier, ranges.as_slice(), *layout_transition))
                    }
                    _ => None,
                })
                .collect();

            if global.is_empty() && scoped.is_empty() {
                continue;
            }

            for &(_, ranges, _) in &scoped {
                for range in ranges {
                    map.split_at(range.start);
                    map.split_at(range.end);
                }
            }

            let mut applicable: SmallVec<[SyncBarrier; 4]> = SmallVec::new();

            for (partition, state) in map.range_mut(&(0..DeviceSize::MAX)) {
                applicable.clear();
                applicable.extend_from_slice(&global);
                let mut layout_transition = false;

                for &(barrier, ranges, transition) in &scoped {
                    let covers = ranges
                        .iter()
                        .any(|r| r.start <= partition.start && partition.end <= r.end);

                    if covers {
                        applicable.push(*barrier);
                        layout_transition |= transition;
                    }
                }

                if !applicable.is_empty() {
                    state.apply_barriers(&applicable, layout_transition.then_some(tag), before_tag);
                }
            }

            map.coalesce(&(0..DeviceSize::MAX));
        }
    }

    /// Records a layout transition of `ranges` of `resource`, performed between the source and
    /// destination scopes of `barriers`.
    pub(crate) fn record_layout_transition(
        &mut self,
        resource: ResourceId,
        ranges: &[Range<DeviceSize>],
        barriers: &[SyncBarrier],
        tag: Tag,
    ) {
        let mut state = ResourceAccessState::default();
        state.apply_barriers(barriers, Some(tag), None);

        let map = self.resources.entry(resource).or_default();

        for range in ranges {
            map.insert(range.clone(), state.clone());
            map.coalesce(range);
        }
    }

    /// Merges the history of `other` into `self`, after applying `barriers` to it.
    ///
    /// This is how the context of a subpass is made from the contexts it depends on.
    pub(crate) fn resolve_from(&mut self, other: &AccessContext, barriers: &[SyncBarrier]) {
        for (&resource, other_map) in &other.resources {
            let map = self.resources.entry(resource).or_default();

            for (range, other_state) in other_map.iter() {
                let mut other_state = other_state.clone();

                if !barriers.is_empty() {
                    other_state.apply_barriers(barriers, None, None);
                }

                map.cover(&range, ResourceAccessState::default);

                for (_, state) in map.range_mut(&range) {
                    state.resolve(&other_state);
                }
            }

            map.coalesce(&(0..DeviceSize::MAX));
        }
    }

    /// Returns the number of partitions of `resource`.
    #[cfg(test)]
    pub(crate) fn partition_count(&self, resource: ResourceId) -> usize {
        self.resources.get(&resource).map_or(0, |map| map.len())
    }
}
