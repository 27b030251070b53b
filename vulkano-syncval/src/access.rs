// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The access history of a single range of a resource.

use crate::{
    hazard::HazardKind,
    sync::{AccessScope, AccessType, PipelineStages, SyncBarrier},
};
use smallvec::SmallVec;
use std::cmp::Ordering;

/// The index of a recorded command, used to tell apart older and newer accesses.
pub(crate) type Tag = usize;

/// The most recent write to a range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct WriteAccess {
    pub(crate) access: AccessType,
    pub(crate) tag: Tag,
    /// The later accesses that the write has been made visible to.
    pub(crate) barriers: AccessScope,
    /// The later stages that the write has been ordered before.
    pub(crate) dependency_chain: PipelineStages,
}

/// A read since the most recent write. There is at most one per stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ReadAccess {
    pub(crate) access: AccessType,
    pub(crate) tag: Tag,
    /// The later stages that the read has been ordered before.
    pub(crate) barriers: PipelineStages,
}

impl ReadAccess {
    #[inline]
    fn stage(&self) -> PipelineStages {
        self.access.stage_mask()
    }
}

/// The implicit ordering that rasterization guarantees between attachment accesses of a subpass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum SyncOrdering {
    /// No implicit ordering.
    NonAttachment,
    /// Color attachment accesses are ordered with each other.
    ColorAttachment,
    /// Depth/stencil attachment accesses are ordered with each other.
    DepthStencilAttachment,
    /// Load and store operations are ordered with all attachment accesses, including input
    /// attachment reads.
    Raster,
}

struct OrderingBarrier {
    exec_scope: PipelineStages,
    access_scope: AccessScope,
    input_attachment: bool,
}

impl SyncOrdering {
    fn barrier(self) -> OrderingBarrier {
        let color = [
            AccessType::ColorAttachmentOutputColorAttachmentRead,
            AccessType::ColorAttachmentOutputColorAttachmentWrite,
        ];
        let depth_stencil = [
            AccessType::EarlyFragmentTestsDepthStencilAttachmentRead,
            AccessType::EarlyFragmentTestsDepthStencilAttachmentWrite,
            AccessType::LateFragmentTestsDepthStencilAttachmentRead,
            AccessType::LateFragmentTestsDepthStencilAttachmentWrite,
        ];
        let fragment_tests =
            PipelineStages::EARLY_FRAGMENT_TESTS | PipelineStages::LATE_FRAGMENT_TESTS;

        match self {
            SyncOrdering::NonAttachment => OrderingBarrier {
                exec_scope: PipelineStages::empty(),
                access_scope: AccessScope::empty(),
                input_attachment: false,
            },
            SyncOrdering::ColorAttachment => OrderingBarrier {
                exec_scope: PipelineStages::COLOR_ATTACHMENT_OUTPUT,
                access_scope: color.into_iter().collect(),
                input_attachment: false,
            },
            SyncOrdering::DepthStencilAttachment => OrderingBarrier {
                exec_scope: fragment_tests,
                access_scope: depth_stencil.into_iter().collect(),
                input_attachment: false,
            },
            SyncOrdering::Raster => OrderingBarrier {
                exec_scope: PipelineStages::COLOR_ATTACHMENT_OUTPUT | fragment_tests,
                access_scope: color
                    .into_iter()
                    .chain(depth_stencil)
                    .chain([AccessType::FragmentShaderInputAttachmentRead])
                    .collect(),
                input_attachment: true,
            },
        }
    }
}

/// A prior access that a new access is not ordered with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Conflict {
    pub(crate) kind: HazardKind,
    pub(crate) prior_access: AccessType,
    pub(crate) prior_tag: Tag,
    /// The stages that the prior access has been ordered before.
    pub(crate) prior_barriers: PipelineStages,
    /// The accesses that the prior write has been made visible to.
    pub(crate) prior_visibility: AccessScope,
}

impl Conflict {
    fn read(kind: HazardKind, read: &ReadAccess) -> Self {
        Conflict {
            kind,
            prior_access: read.access,
            prior_tag: read.tag,
            prior_barriers: read.barriers,
            prior_visibility: AccessScope::empty(),
        }
    }

    fn write(kind: HazardKind, write: &WriteAccess) -> Self {
        Conflict {
            kind,
            prior_access: write.access,
            prior_tag: write.tag,
            prior_barriers: write.dependency_chain,
            prior_visibility: write.barriers,
        }
    }
}

/// The access history of a range: the last write, and the reads since then.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ResourceAccessState {
    last_write: Option<WriteAccess>,
    last_reads: SmallVec<[ReadAccess; 3]>,
}

impl ResourceAccessState {
    #[cfg(test)]
    pub(crate) fn last_write(&self) -> Option<&WriteAccess> {
        self.last_write.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn last_reads(&self) -> &[ReadAccess] {
        &self.last_reads
    }

    fn last_read_stages(&self) -> PipelineStages {
        self.last_reads
            .iter()
            .fold(PipelineStages::empty(), |acc, read| acc | read.stage())
    }

    /// Returns the stages of the reads that are implicitly ordered with later accesses under
    /// `ordering`.
    fn ordered_read_stages(&self, ordering: &OrderingBarrier) -> PipelineStages {
        let mut stages = self.last_read_stages() & ordering.exec_scope;

        if ordering.input_attachment
            && self
                .last_reads
                .iter()
                .any(|read| read.access == AccessType::FragmentShaderInputAttachmentRead)
        {
            stages |= PipelineStages::FRAGMENT_SHADER;
        }

        stages
    }

    /// Checks whether `access` is ordered with the accesses in the history.
    #[cfg(test)]
    pub(crate) fn detect_hazard(&self, access: AccessType) -> Option<Conflict> {
        self.detect_ordered_hazard(access, SyncOrdering::NonAttachment)
    }

    /// Checks whether `access` is ordered with the accesses in the history, taking the implicit
    /// rasterization order into account.
    pub(crate) fn detect_ordered_hazard(
        &self,
        access: AccessType,
        ordering: SyncOrdering,
    ) -> Option<Conflict> {
        let ordering = ordering.barrier();

        if access.is_read() {
            let write = self.last_write.as_ref()?;

            if write.barriers.contains(access) {
                return None;
            }

            let access_is_ordered = ordering.exec_scope.intersects(access.stage_mask())
                || (ordering.input_attachment
                    && access == AccessType::FragmentShaderInputAttachmentRead);

            if access_is_ordered {
                let most_recent_is_ordered = ordering.access_scope.contains(write.access)
                    || !self.ordered_read_stages(&ordering).is_empty();

                if most_recent_is_ordered {
                    return None;
                }
            }

            return Some(Conflict::write(HazardKind::ReadAfterWrite, write));
        }

        let access_is_ordered = ordering.access_scope.contains(access);

        if !self.last_reads.is_empty() {
            let ordered_stages = if access_is_ordered {
                self.ordered_read_stages(&ordering)
            } else {
                PipelineStages::empty()
            };

            return self
                .last_reads
                .iter()
                .filter(|read| !read.stage().intersects(ordered_stages))
                .find(|read| !read.barriers.intersects(access.stage_mask()))
                .map(|read| Conflict::read(HazardKind::WriteAfterRead, read));
        }

        let write = self.last_write.as_ref()?;

        if access_is_ordered && ordering.access_scope.contains(write.access) {
            return None;
        }

        if write.barriers.contains(access) {
            return None;
        }

        Some(Conflict::write(HazardKind::WriteAfterWrite, write))
    }

    /// Checks whether the layout transition of a barrier is ordered with the accesses in the
    /// history. Only the source scopes of `barrier` matter.
    pub(crate) fn detect_barrier_hazard(&self, barrier: &SyncBarrier) -> Option<Conflict> {
        if !self.last_reads.is_empty() {
            return self
                .last_reads
                .iter()
                .find(|read| {
                    !barrier
                        .src_exec_scope
                        .intersects(read.stage() | read.barriers)
                })
                .map(|read| Conflict::read(HazardKind::WriteAfterRead, read));
        }

        let write = self.last_write.as_ref()?;

        if barrier.src_access_scope.contains(write.access)
            || write.dependency_chain.intersects(barrier.src_exec_scope)
        {
            return None;
        }

        Some(Conflict::write(HazardKind::WriteAfterWrite, write))
    }

    /// Checks whether `access` races with an access made at or after `start_tag` in a subpass
    /// that isn't ordered with the current one.
    ///
    /// Layout transitions are not considered: they are ordered by the subpass dependencies of the
    /// subpass that performs them, not by the commands in it.
    pub(crate) fn detect_async_hazard(
        &self,
        access: AccessType,
        start_tag: Tag,
    ) -> Option<Conflict> {
        let write = self.last_write.as_ref().filter(|write| {
            write.tag >= start_tag && write.access != AccessType::ImageLayoutTransition
        });

        if access.is_read() {
            return write.map(|write| Conflict::write(HazardKind::ReadRacingWrite, write));
        }

        if let Some(write) = write {
            return Some(Conflict::write(HazardKind::WriteRacingWrite, write));
        }

        self.last_reads
            .iter()
            .find(|read| read.tag >= start_tag)
            .map(|read| Conflict::read(HazardKind::WriteRacingRead, read))
    }

    /// Records `access` as the newest access.
    pub(crate) fn update(&mut self, access: AccessType, tag: Tag) {
        if access.is_write() {
            self.last_write = Some(WriteAccess {
                access,
                tag,
                barriers: AccessScope::empty(),
                dependency_chain: PipelineStages::empty(),
            });
            self.last_reads.clear();

            return;
        }

        let stage = access.stage_mask();

        match self.last_reads.iter_mut().find(|read| read.stage() == stage) {
            Some(read) => {
                read.access = access;
                read.tag = tag;
                read.barriers = PipelineStages::empty();
            }
            None => self.last_reads.push(ReadAccess {
                access,
                tag,
                barriers: PipelineStages::empty(),
            }),
        }
    }

    /// Applies a set of barriers that take effect simultaneously.
    ///
    /// Every barrier is tested against the history as it was before any of them, so one barrier
    /// of the set never extends the chain that another one starts. If `layout_transition` is
    /// given, the barriers also perform a layout transition, which is recorded as a write with
    /// that tag and is in the source scope of every barrier.
    ///
    /// If `before_tag` is given, only accesses older than it are in the source scopes. This is
    /// how the first synchronization scope of an event wait is limited.
    pub(crate) fn apply_barriers(
        &mut self,
        barriers: &[SyncBarrier],
        layout_transition: Option<Tag>,
        before_tag: Option<Tag>,
    ) {
        let in_first_scope = |tag: Tag| before_tag.map_or(true, |before| tag < before);

        let mut write_barriers = AccessScope::empty();
        let mut write_chain = PipelineStages::empty();
        let mut read_barriers: SmallVec<[PipelineStages; 3]> =
            SmallVec::from_elem(PipelineStages::empty(), self.last_reads.len());

        for barrier in barriers {
            let write_in_scope = match (&self.last_write, layout_transition) {
                (_, Some(_)) => true,
                (Some(write), None) => {
                    in_first_scope(write.tag)
                        && (barrier.src_access_scope.contains(write.access)
                            || write.dependency_chain.intersects(barrier.src_exec_scope))
                }
                (None, None) => false,
            };

            if write_in_scope {
                write_barriers |= barrier.dst_access_scope;
                write_chain |= barrier.dst_exec_scope;
            }

            for (read, pending) in self.last_reads.iter().zip(read_barriers.iter_mut()) {
                if in_first_scope(read.tag)
                    && barrier
                        .src_exec_scope
                        .intersects(read.stage() | read.barriers)
                {
                    *pending |= barrier.dst_exec_scope;
                }
            }
        }

        if let Some(tag) = layout_transition {
            self.last_write = Some(WriteAccess {
                access: AccessType::ImageLayoutTransition,
                tag,
                barriers: write_barriers,
                dependency_chain: write_chain,
            });
            self.last_reads.clear();

            return;
        }

        if let Some(write) = &mut self.last_write {
            write.barriers |= write_barriers;
            write.dependency_chain |= write_chain;
        }

        for (read, pending) in self.last_reads.iter_mut().zip(read_barriers) {
            read.barriers |= pending;
        }
    }

    /// Merges the history of a context that executes before the same point as this one.
    ///
    /// The newer write wins. If both histories share the same last write, the barriers of both
    /// are kept, and the reads are merged per stage.
    pub(crate) fn resolve(&mut self, other: &Self) {
        let self_tag = self.last_write.as_ref().map(|write| write.tag);
        let other_tag = other.last_write.as_ref().map(|write| write.tag);

        match self_tag.cmp(&other_tag) {
            Ordering::Less => *self = other.clone(),
            Ordering::Greater => {}
            Ordering::Equal => {
                if let (Some(write), Some(other_write)) = (&mut self.last_write, &other.last_write)
                {
                    write.barriers |= other_write.barriers;
                    write.dependency_chain |= other_write.dependency_chain;
                }

                for other_read in &other.last_reads {
                    match self
                        .last_reads
                        .iter_mut()
                        .find(|read| read.stage() == other_read.stage())
                    {
                        Some(read) => match read.tag.cmp(&other_read.tag) {
                            Ordering::Less => *read = other_read.clone(),
                            Ordering::Equal => read.barriers |= other_read.barriers,
                            Ordering::Greater => {}
                        },
                        None => self.last_reads.push(other_read.clone()),
                    }
                }
            }
        }
    }
}
