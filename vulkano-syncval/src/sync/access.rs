// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Individual memory accesses, each performed by exactly one pipeline stage.

use super::{AccessFlags, PipelineStages};
use std::{fmt, ops};

macro_rules! access_types {
    (
        $(
            $(#[$meta:meta])*
            $name:ident {
                stage_mask: $stage_flag:ident,
                access_mask: $access_flag:ident,
                write: $write:literal,
            }
        )*
    ) => {
        /// Specifies which type of access is performed on a resource, and by which stage.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub enum AccessType {
            $(
                $(#[$meta])*
                $name,
            )*

            /// The write that an image layout transition performs.
            ///
            /// It has no stage and no access type of its own: it happens as part of the barrier or
            /// subpass dependency that requests it, between the two scopes.
            ImageLayoutTransition,
        }

        impl AccessType {
            /// All access types, in the order of their index.
            pub const ALL: &'static [AccessType] = &[
                $(Self::$name,)*
                Self::ImageLayoutTransition,
            ];

            /// Returns the stage mask of this type of access.
            #[inline]
            #[must_use]
            pub const fn stage_mask(self) -> PipelineStages {
                match self {
                    $(
                        Self::$name => PipelineStages::$stage_flag,
                    )*
                    Self::ImageLayoutTransition => PipelineStages::empty(),
                }
            }

            /// Returns the access mask of this type of access.
            #[inline]
            #[must_use]
            pub const fn access_mask(self) -> AccessFlags {
                match self {
                    $(
                        Self::$name => AccessFlags::$access_flag,
                    )*
                    Self::ImageLayoutTransition => AccessFlags::empty(),
                }
            }

            /// Returns whether this type of access writes to memory.
            #[inline]
            #[must_use]
            pub const fn is_write(self) -> bool {
                match self {
                    $(
                        Self::$name => $write,
                    )*
                    Self::ImageLayoutTransition => true,
                }
            }
        }
    };
}

access_types! {
    DrawIndirectIndirectCommandRead {
        stage_mask: DRAW_INDIRECT,
        access_mask: INDIRECT_COMMAND_READ,
        write: false,
    }

    VertexInputIndexRead {
        stage_mask: VERTEX_INPUT,
        access_mask: INDEX_READ,
        write: false,
    }

    VertexInputVertexAttributeRead {
        stage_mask: VERTEX_INPUT,
        access_mask: VERTEX_ATTRIBUTE_READ,
        write: false,
    }

    VertexShaderUniformRead {
        stage_mask: VERTEX_SHADER,
        access_mask: UNIFORM_READ,
        write: false,
    }

    VertexShaderShaderRead {
        stage_mask: VERTEX_SHADER,
        access_mask: SHADER_READ,
        write: false,
    }

    VertexShaderShaderWrite {
        stage_mask: VERTEX_SHADER,
        access_mask: SHADER_WRITE,
        write: true,
    }

    TessellationControlShaderUniformRead {
        stage_mask: TESSELLATION_CONTROL_SHADER,
        access_mask: UNIFORM_READ,
        write: false,
    }

    TessellationControlShaderShaderRead {
        stage_mask: TESSELLATION_CONTROL_SHADER,
        access_mask: SHADER_READ,
        write: false,
    }

    TessellationControlShaderShaderWrite {
        stage_mask: TESSELLATION_CONTROL_SHADER,
        access_mask: SHADER_WRITE,
        write: true,
    }

    TessellationEvaluationShaderUniformRead {
        stage_mask: TESSELLATION_EVALUATION_SHADER,
        access_mask: UNIFORM_READ,
        write: false,
    }

    TessellationEvaluationShaderShaderRead {
        stage_mask: TESSELLATION_EVALUATION_SHADER,
        access_mask: SHADER_READ,
        write: false,
    }

    TessellationEvaluationShaderShaderWrite {
        stage_mask: TESSELLATION_EVALUATION_SHADER,
        access_mask: SHADER_WRITE,
        write: true,
    }

    GeometryShaderUniformRead {
        stage_mask: GEOMETRY_SHADER,
        access_mask: UNIFORM_READ,
        write: false,
    }

    GeometryShaderShaderRead {
        stage_mask: GEOMETRY_SHADER,
        access_mask: SHADER_READ,
        write: false,
    }

    GeometryShaderShaderWrite {
        stage_mask: GEOMETRY_SHADER,
        access_mask: SHADER_WRITE,
        write: true,
    }

    FragmentShaderUniformRead {
        stage_mask: FRAGMENT_SHADER,
        access_mask: UNIFORM_READ,
        write: false,
    }

    FragmentShaderShaderRead {
        stage_mask: FRAGMENT_SHADER,
        access_mask: SHADER_READ,
        write: false,
    }

    FragmentShaderShaderWrite {
        stage_mask: FRAGMENT_SHADER,
        access_mask: SHADER_WRITE,
        write: true,
    }

    FragmentShaderInputAttachmentRead {
        stage_mask: FRAGMENT_SHADER,
        access_mask: INPUT_ATTACHMENT_READ,
        write: false,
    }

    EarlyFragmentTestsDepthStencilAttachmentRead {
        stage_mask: EARLY_FRAGMENT_TESTS,
        access_mask: DEPTH_STENCIL_ATTACHMENT_READ,
        write: false,
    }

    EarlyFragmentTestsDepthStencilAttachmentWrite {
        stage_mask: EARLY_FRAGMENT_TESTS,
        access_mask: DEPTH_STENCIL_ATTACHMENT_WRITE,
        write: true,
    }

    LateFragmentTestsDepthStencilAttachmentRead {
        stage_mask: LATE_FRAGMENT_TESTS,
        access_mask: DEPTH_STENCIL_ATTACHMENT_READ,
        write: false,
    }

    LateFragmentTestsDepthStencilAttachmentWrite {
        stage_mask: LATE_FRAGMENT_TESTS,
        access_mask: DEPTH_STENCIL_ATTACHMENT_WRITE,
        write: true,
    }

    ColorAttachmentOutputColorAttachmentRead {
        stage_mask: COLOR_ATTACHMENT_OUTPUT,
        access_mask: COLOR_ATTACHMENT_READ,
        write: false,
    }

    ColorAttachmentOutputColorAttachmentWrite {
        stage_mask: COLOR_ATTACHMENT_OUTPUT,
        access_mask: COLOR_ATTACHMENT_WRITE,
        write: true,
    }

    ComputeShaderUniformRead {
        stage_mask: COMPUTE_SHADER,
        access_mask: UNIFORM_READ,
        write: false,
    }

    ComputeShaderShaderRead {
        stage_mask: COMPUTE_SHADER,
        access_mask: SHADER_READ,
        write: false,
    }

    ComputeShaderShaderWrite {
        stage_mask: COMPUTE_SHADER,
        access_mask: SHADER_WRITE,
        write: true,
    }

    TransferTransferRead {
        stage_mask: TRANSFER,
        access_mask: TRANSFER_READ,
        write: false,
    }

    TransferTransferWrite {
        stage_mask: TRANSFER,
        access_mask: TRANSFER_WRITE,
        write: true,
    }

    HostHostRead {
        stage_mask: HOST,
        access_mask: HOST_READ,
        write: false,
    }

    HostHostWrite {
        stage_mask: HOST,
        access_mask: HOST_WRITE,
        write: true,
    }
}

impl AccessType {
    /// Returns the position of this access type in [`AccessType::ALL`].
    #[inline]
    pub const fn index(self) -> u32 {
        self as u32
    }

    /// Returns whether this type of access only reads from memory.
    #[inline]
    pub const fn is_read(self) -> bool {
        !self.is_write()
    }

    /// Returns the shader read, shader write or uniform read access of `stage`, if `stage` is a
    /// single shader stage.
    pub fn shader(stage: PipelineStages, access: AccessFlags) -> Option<Self> {
        AccessType::ALL.iter().copied().find(|&access_type| {
            access_type.stage_mask() == stage && access_type.access_mask() == access
        })
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ImageLayoutTransition {
            return write!(f, "IMAGE_LAYOUT_TRANSITION");
        }

        write!(f, "{:?}({:?})", self.stage_mask(), self.access_mask())
    }
}

/// A set of [`AccessType`]s.
///
/// Masks of stages and access flags describe a rectangle of `(stage, access)` pairs, most of which
/// don't exist. This set only contains the pairs that do, which is what memory dependencies are
/// resolved against.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccessScope(u64);

impl AccessScope {
    #[inline]
    pub const fn empty() -> Self {
        AccessScope(0)
    }

    /// Returns the set of access types that are performed by one of `stages` and have one of the
    /// access flags in `access`.
    ///
    /// `MEMORY_READ` and `MEMORY_WRITE` stand for all reads and all writes respectively. The stage
    /// mask is expanded, but not extended to earlier or later stages: that is for the caller to do
    /// when it describes an execution scope.
    pub fn from_masks(stages: PipelineStages, access: AccessFlags) -> Self {
        let stages = stages.expand();
        let mut access = access;

        if access.intersects(AccessFlags::MEMORY_READ) {
            access |= AccessFlags::READS;
        }

        if access.intersects(AccessFlags::MEMORY_WRITE) {
            access |= AccessFlags::WRITES;
        }

        let mut scope = AccessScope::empty();

        for &access_type in AccessType::ALL {
            if stages.intersects(access_type.stage_mask())
                && access.intersects(access_type.access_mask())
            {
                scope.insert(access_type);
            }
        }

        scope
    }

    /// Returns the set containing only `access_type`.
    #[inline]
    pub const fn single(access_type: AccessType) -> Self {
        AccessScope(1 << access_type.index())
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn contains(self, access_type: AccessType) -> bool {
        self.0 & (1 << access_type.index()) != 0
    }

    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn insert(&mut self, access_type: AccessType) {
        self.0 |= 1 << access_type.index();
    }

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        AccessScope(self.0 | other.0)
    }

    /// Returns the union of the stage masks of the contained access types.
    pub fn stages(self) -> PipelineStages {
        self.iter()
            .fold(PipelineStages::empty(), |acc, a| acc | a.stage_mask())
    }

    /// Returns the union of the access masks of the contained access types.
    pub fn access_flags(self) -> AccessFlags {
        self.iter()
            .fold(AccessFlags::empty(), |acc, a| acc | a.access_mask())
    }

    pub fn iter(self) -> impl Iterator<Item = AccessType> {
        AccessType::ALL
            .iter()
            .copied()
            .filter(move |&access_type| self.contains(access_type))
    }
}

impl ops::BitOr for AccessScope {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl ops::BitOrAssign for AccessScope {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl From<AccessType> for AccessScope {
    #[inline]
    fn from(val: AccessType) -> Self {
        AccessScope::single(val)
    }
}

impl FromIterator<AccessType> for AccessScope {
    fn from_iter<T: IntoIterator<Item = AccessType>>(iter: T) -> Self {
        let mut scope = AccessScope::empty();

        for access_type in iter {
            scope.insert(access_type);
        }

        scope
    }
}

impl fmt::Debug for AccessScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_access_type_has_an_index() {
        assert!(AccessType::ALL.len() <= 64);

        for (index, &access_type) in AccessType::ALL.iter().enumerate() {
            assert_eq!(access_type.index() as usize, index);

            if access_type != AccessType::ImageLayoutTransition {
                assert_eq!(access_type.stage_mask().count(), 1);
                assert_eq!(access_type.access_mask().count(), 1);
                assert_eq!(
                    access_type.is_write(),
                    access_type.access_mask().contains_writes(),
                );
            }
        }
    }

    #[test]
    fn scope_from_masks() {
        let scope = AccessScope::from_masks(PipelineStages::TRANSFER, AccessFlags::TRANSFER_READ);
        assert_eq!(scope, AccessScope::single(AccessType::TransferTransferRead));

        // Stages without the matching access type contribute nothing.
        let scope = AccessScope::from_masks(
            PipelineStages::TRANSFER | PipelineStages::COMPUTE_SHADER,
            AccessFlags::TRANSFER_WRITE,
        );
        assert_eq!(scope, AccessScope::single(AccessType::TransferTransferWrite));

        let scope =
            AccessScope::from_masks(PipelineStages::ALL_COMMANDS, AccessFlags::MEMORY_WRITE);
        assert!(scope.contains(AccessType::ComputeShaderShaderWrite));
        assert!(scope.contains(AccessType::ColorAttachmentOutputColorAttachmentWrite));
        assert!(!scope.contains(AccessType::TransferTransferRead));
        assert!(!scope.contains(AccessType::HostHostWrite));
        assert!(!scope.contains(AccessType::ImageLayoutTransition));
    }

    #[test]
    fn shader_lookup() {
        assert_eq!(
            AccessType::shader(PipelineStages::FRAGMENT_SHADER, AccessFlags::SHADER_READ),
            Some(AccessType::FragmentShaderShaderRead),
        );
        assert_eq!(
            AccessType::shader(PipelineStages::TRANSFER, AccessFlags::SHADER_READ),
            None,
        );
    }
}
