// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Pipeline barriers, and their resolved form.
//!
//! A barrier describes a dependency between commands recorded before it (the source scope) and
//! commands recorded after it (the destination scope). The pipeline stages create an *execution
//! dependency*: the `src_stages` of earlier commands must be finished before the `dst_stages` of
//! later commands may start. The access flags create a *memory dependency*: writes in
//! `src_access` are made available and visible to the accesses in `dst_access`.
//!
//! An execution dependency alone orders a later write after an earlier read, but it never makes
//! an earlier write visible, so a later read or write of the same memory still needs the access
//! flags.

use super::{AccessFlags, AccessScope, PipelineStages};
use crate::{
    resource::{ImageLayout, ImageSubresourceRange, ResourceId},
    DeviceSize,
};
use std::ops::Range;

/// The barriers of a single `PipelineBarrier` or `WaitEvents` command.
#[derive(Clone, Debug)]
pub struct DependencyInfo {
    /// Memory barriers for global operations and accesses, not limited to a single resource.
    ///
    /// The default value is empty.
    pub memory_barriers: Vec<MemoryBarrier>,

    /// Memory barriers for ranges of individual buffers.
    ///
    /// The default value is empty.
    pub buffer_memory_barriers: Vec<BufferMemoryBarrier>,

    /// Memory barriers for subresource ranges of individual images.
    ///
    /// The default value is empty.
    pub image_memory_barriers: Vec<ImageMemoryBarrier>,

    pub _ne: crate::NonExhaustive,
}

impl Default for DependencyInfo {
    #[inline]
    fn default() -> Self {
        Self {
            memory_barriers: Vec::new(),
            buffer_memory_barriers: Vec::new(),
            image_memory_barriers: Vec::new(),
            _ne: crate::NE,
        }
    }
}

impl DependencyInfo {
    /// Returns `true` if `self` doesn't contain any barriers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.memory_barriers.is_empty()
            && self.buffer_memory_barriers.is_empty()
            && self.image_memory_barriers.is_empty()
    }

    /// Returns the union of the source stages of all barriers.
    pub fn src_stages(&self) -> PipelineStages {
        let memory = self.memory_barriers.iter().map(|b| b.src_stages);
        let buffer = self.buffer_memory_barriers.iter().map(|b| b.src_stages);
        let image = self.image_memory_barriers.iter().map(|b| b.src_stages);

        memory
            .chain(buffer)
            .chain(image)
            .fold(PipelineStages::empty(), |acc, s| acc | s)
    }

    /// Returns the union of the destination stages of all barriers.
    pub fn dst_stages(&self) -> PipelineStages {
        let memory = self.memory_barriers.iter().map(|b| b.dst_stages);
        let buffer = self.buffer_memory_barriers.iter().map(|b| b.dst_stages);
        let image = self.image_memory_barriers.iter().map(|b| b.dst_stages);

        memory
            .chain(buffer)
            .chain(image)
            .fold(PipelineStages::empty(), |acc, s| acc | s)
    }
}

/// A memory barrier that is applied globally.
#[derive(Clone, Debug)]
pub struct MemoryBarrier {
    /// The pipeline stages in the source scope to wait for.
    ///
    /// The default value is [`PipelineStages::empty()`].
    pub src_stages: PipelineStages,

    /// The memory accesses in the source scope to make available and visible.
    ///
    /// The default value is [`AccessFlags::empty()`].
    pub src_access: AccessFlags,

    /// The pipeline stages in the destination scope that must wait for `src_stages`.
    ///
    /// The default value is [`PipelineStages::empty()`].
    pub dst_stages: PipelineStages,

    /// The memory accesses in the destination scope that must wait for `src_access` to be made
    /// available and visible.
    ///
    /// The default value is [`AccessFlags::empty()`].
    pub dst_access: AccessFlags,

    pub _ne: crate::NonExhaustive,
}

impl Default for MemoryBarrier {
    #[inline]
    fn default() -> Self {
        Self {
            src_stages: PipelineStages::empty(),
            src_access: AccessFlags::empty(),
            dst_stages: PipelineStages::empty(),
            dst_access: AccessFlags::empty(),
            _ne: crate::NE,
        }
    }
}

/// A memory barrier that is applied to a byte range of a single buffer.
#[derive(Clone, Debug)]
pub struct BufferMemoryBarrier {
    /// The pipeline stages in the source scope to wait for.
    ///
    /// The default value is [`PipelineStages::empty()`].
    pub src_stages: PipelineStages,

    /// The memory accesses in the source scope to make available and visible.
    ///
    /// The default value is [`AccessFlags::empty()`].
    pub src_access: AccessFlags,

    /// The pipeline stages in the destination scope that must wait for `src_stages`.
    ///
    /// The default value is [`PipelineStages::empty()`].
    pub dst_stages: PipelineStages,

    /// The memory accesses in the destination scope that must wait for `src_access` to be made
    /// available and visible.
    ///
    /// The default value is [`AccessFlags::empty()`].
    pub dst_access: AccessFlags,

    /// The buffer to apply the barrier to.
    ///
    /// The default value is [`ResourceId::INVALID`], which must be overridden.
    pub buffer: ResourceId,

    /// The byte range of `buffer` to apply the barrier to.
    ///
    /// The default value is empty, which must be overridden.
    pub range: Range<DeviceSize>,

    pub _ne: crate::NonExhaustive,
}

impl Default for BufferMemoryBarrier {
    #[inline]
    fn default() -> Self {
        Self {
            src_stages: PipelineStages::empty(),
            src_access: AccessFlags::empty(),
            dst_stages: PipelineStages::empty(),
            dst_access: AccessFlags::empty(),
            buffer: ResourceId::INVALID,
            range: 0..0,
            _ne: crate::NE,
        }
    }
}

/// A memory barrier that is applied to a subresource range of a single image.
///
/// If `old_layout` and `new_layout` differ, the barrier performs a layout transition, which is a
/// write to the whole subresource range that happens between the two scopes.
#[derive(Clone, Debug)]
pub struct ImageMemoryBarrier {
    /// The pipeline stages in the source scope to wait for.
    ///
    /// The default value is [`PipelineStages::empty()`].
    pub src_stages: PipelineStages,

    /// The memory accesses in the source scope to make available and visible.
    ///
    /// The default value is [`AccessFlags::empty()`].
    pub src_access: AccessFlags,

    /// The pipeline stages in the destination scope that must wait for `src_stages`.
    ///
    /// The default value is [`PipelineStages::empty()`].
    pub dst_stages: PipelineStages,

    /// The memory accesses in the destination scope that must wait for `src_access` to be made
    /// available and visible.
    ///
    /// The default value is [`AccessFlags::empty()`].
    pub dst_access: AccessFlags,

    /// The layout that the subresource range is expected to be in when the source scope
    /// completes.
    ///
    /// The default value is [`ImageLayout::Undefined`].
    pub old_layout: ImageLayout,

    /// The layout that the subresource range will be transitioned to before the destination
    /// scope begins.
    ///
    /// The default value is [`ImageLayout::Undefined`].
    pub new_layout: ImageLayout,

    /// The image to apply the barrier to.
    ///
    /// The default value is [`ResourceId::INVALID`], which must be overridden.
    pub image: ResourceId,

    /// The subresource range of `image` to apply the barrier to.
    ///
    /// The default value is empty, which must be overridden.
    pub subresource_range: ImageSubresourceRange,

    pub _ne: crate::NonExhaustive,
}

impl Default for ImageMemoryBarrier {
    #[inline]
    fn default() -> Self {
        Self {
            src_stages: PipelineStages::empty(),
            src_access: AccessFlags::empty(),
            dst_stages: PipelineStages::empty(),
            dst_access: AccessFlags::empty(),
            old_layout: ImageLayout::Undefined,
            new_layout: ImageLayout::Undefined,
            image: ResourceId::INVALID,
            subresource_range: ImageSubresourceRange::default(),
            _ne: crate::NE,
        }
    }
}

impl ImageMemoryBarrier {
    #[inline]
    pub fn is_layout_transition(&self) -> bool {
        self.old_layout != self.new_layout
    }
}

/// A barrier reduced to the scopes that hazard detection works with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct SyncBarrier {
    /// The stages of earlier commands that must finish, including all logically earlier stages.
    pub(crate) src_exec_scope: PipelineStages,
    /// The earlier accesses that are made available.
    pub(crate) src_access_scope: AccessScope,
    /// The stages of later commands that wait, including all logically later stages.
    pub(crate) dst_exec_scope: PipelineStages,
    /// The later accesses that the available writes are made visible to.
    pub(crate) dst_access_scope: AccessScope,
}

impl SyncBarrier {
    pub(crate) fn new(
        src_stages: PipelineStages,
        src_access: AccessFlags,
        dst_stages: PipelineStages,
        dst_access: AccessFlags,
    ) -> Self {
        SyncBarrier {
            src_exec_scope: src_stages.with_earlier_stages(),
            src_access_scope: AccessScope::from_masks(src_stages, src_access),
            dst_exec_scope: dst_stages.with_later_stages(),
            dst_access_scope: AccessScope::from_masks(dst_stages, dst_access),
        }
    }

    /// Returns a barrier whose scopes are the union of the scopes of `barriers`.
    ///
    /// This is only valid for checking the source scopes. Two barriers don't compose into one
    /// whose destination covers what both sources cover.
    pub(crate) fn merged<'a>(barriers: impl IntoIterator<Item = &'a SyncBarrier>) -> Self {
        barriers
            .into_iter()
            .fold(SyncBarrier::default(), |acc, barrier| SyncBarrier {
                src_exec_scope: acc.src_exec_scope | barrier.src_exec_scope,
                src_access_scope: acc.src_access_scope | barrier.src_access_scope,
                dst_exec_scope: acc.dst_exec_scope | barrier.dst_exec_scope,
                dst_access_scope: acc.dst_access_scope | barrier.dst_access_scope,
            })
    }

    /// Returns `self` with the source execution scope restricted to `exec_scope`.
    ///
    /// This is what a wait on an event does: only the stages that the event was set with are
    /// waited on.
    pub(crate) fn restricted_to(mut self, exec_scope: PipelineStages) -> Self {
        self.src_exec_scope &= exec_scope;
        self.src_access_scope = self
            .src_access_scope
            .iter()
            .filter(|access_type| exec_scope.intersects(access_type.stage_mask()))
            .collect();

        self
    }
}

impl From<&MemoryBarrier> for SyncBarrier {
    #[inline]
    fn from(val: &MemoryBarrier) -> Self {
        SyncBarrier::new(val.src_stages, val.src_access, val.dst_stages, val.dst_access)
    }
}

impl From<&BufferMemoryBarrier> for SyncBarrier {
    #[inline]
    fn from(val: &BufferMemoryBarrier) -> Self {
        SyncBarrier::new(val.src_stages, val.src_access, val.dst_stages, val.dst_access)
    }
}

impl From<&ImageMemoryBarrier> for SyncBarrier {
    #[inline]
    fn from(val: &ImageMemoryBarrier) -> Self {
        SyncBarrier::new(val.src_stages, val.src_access, val.dst_stages, val.dst_access)
    }
}
