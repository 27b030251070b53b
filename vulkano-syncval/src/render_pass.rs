// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Description of the steps of the rendering process, and how they are ordered.
//!
//! A render pass is made up of three parts:
//!
//! - A list of attachments, which are image views that are read or written by the subpasses.
//! - One or more subpasses, which are the steps in which the rendering process takes place, and
//!   the attachments that are used for each step.
//! - Dependencies, which describe how the accesses of one subpass are ordered with the accesses of
//!   another subpass, or with the commands outside of the render pass.
//!
//! Subpasses that aren't ordered with each other by a chain of dependencies may execute
//! concurrently. Inside a subpass, the accesses to attachments made by rasterization are ordered
//! with each other, but nothing else is.
//!
//! Attachments are loaded at the start of the first subpass that uses them, and stored at the end
//! of the last one. Whenever a subpass uses an attachment in a different layout than the previous
//! one, the attachment's layout is transitioned when entering that subpass, and it is transitioned
//! to its final layout when the render pass ends.

use crate::{
    access::{Conflict, SyncOrdering, Tag},
    command::{AttachmentAccess, ClearAttachment, ClearAttachmentsInfo, Usage},
    context::AccessContext,
    hazard::{AccessOrigin, DependencySource, DetectedHazard},
    resource::{
        ImageAspects, ImageLayout, ImageSubresourceLayers, ImageSubresourceRange, ResourceId,
        Resources,
    },
    sync::{AccessFlags, AccessType, PipelineStages, SyncBarrier},
    validator::{HazardStateUpdate, ImplicitDependencyPolicy, SyncValidatorCreateInfo},
    DeviceSize, SyncValError,
};
use smallvec::SmallVec;
use std::{ops::Range, sync::Arc};

/// A validated render pass, with the ordering between its subpasses worked out.
///
/// ```
/// use vulkano_syncval::render_pass::{
///     AttachmentDescription, AttachmentReference, LoadOp, RenderPass, RenderPassCreateInfo,
///     StoreOp, SubpassDescription,
/// };
/// use vulkano_syncval::resource::ImageLayout;
///
/// let render_pass = RenderPass::new(RenderPassCreateInfo {
///     attachments: vec![AttachmentDescription {
///         load_op: LoadOp::Clear,
///         store_op: StoreOp::Store,
///         initial_layout: ImageLayout::Undefined,
///         final_layout: ImageLayout::ColorAttachmentOptimal,
///         ..Default::default()
///     }],
///     subpasses: vec![SubpassDescription {
///         color_attachments: vec![Some(AttachmentReference {
///             attachment: 0,
///             layout: ImageLayout::ColorAttachmentOptimal,
///             ..Default::default()
///         })],
///         ..Default::default()
///     }],
///     ..Default::default()
/// })
/// .unwrap();
///
/// assert_eq!(render_pass.subpasses().len(), 1);
/// ```
#[derive(Debug)]
pub struct RenderPass {
    attachments: Vec<AttachmentDescription>,
    subpasses: Vec<SubpassDescription>,
    dependencies: Vec<SubpassDependency>,

    attachment_uses: Vec<Option<AttachmentUse>>,
    edges: Vec<SubpassEdges>,
    transitions: Vec<Vec<LayoutTransition>>,
    final_transitions: Vec<LayoutTransition>,
    // reachable[src][dst]: a chain of dependencies orders `src` before `dst`.
    reachable: Vec<Vec<bool>>,
}

impl RenderPass {
    /// Validates a render pass description and works out the ordering of its subpasses.
    pub fn new(create_info: RenderPassCreateInfo) -> Result<Arc<RenderPass>, SyncValError> {
        create_info.validate()?;

        let RenderPassCreateInfo {
            attachments,
            subpasses,
            dependencies,
            _ne: _,
        } = create_info;

        let attachment_uses = attachment_uses(attachments.len(), &subpasses);
        let edges = subpass_edges(subpasses.len(), &dependencies, &attachment_uses);
        let (transitions, final_transitions) = layout_transitions(&attachments, &subpasses);
        let reachable = reachability(&edges);

        Ok(Arc::new(RenderPass {
            attachments,
            subpasses,
            dependencies,
            attachment_uses,
            edges,
            transitions,
            final_transitions,
            reachable,
        }))
    }

    /// Returns the attachments of the render pass.
    #[inline]
    pub fn attachments(&self) -> &[AttachmentDescription] {
        &self.attachments
    }

    /// Returns the subpasses of the render pass.
    #[inline]
    pub fn subpasses(&self) -> &[SubpassDescription] {
        &self.subpasses
    }

    /// Returns the dependencies of the render pass.
    #[inline]
    pub fn dependencies(&self) -> &[SubpassDependency] {
        &self.dependencies
    }

    /// Returns whether a chain of dependencies orders subpass `src` before subpass `dst`.
    #[inline]
    pub fn is_ordered_before(&self, src: u32, dst: u32) -> bool {
        self.reachable
            .get(src as usize)
            .and_then(|row| row.get(dst as usize))
            .copied()
            .unwrap_or(false)
    }

    fn is_first_use(&self, attachment: usize, subpass: u32) -> bool {
        self.attachment_uses[attachment].map_or(false, |u| u.first_subpass == subpass)
    }

    fn is_last_use(&self, attachment: usize, subpass: u32) -> bool {
        self.attachment_uses[attachment].map_or(false, |u| u.last_subpass == subpass)
    }
}

/// Parameters to create a new `RenderPass`.
#[derive(Clone, Debug)]
pub struct RenderPassCreateInfo {
    /// The attachments available for the render pass.
    ///
    /// The default value is empty.
    pub attachments: Vec<AttachmentDescription>,

    /// The subpasses that make up this render pass.
    ///
    /// A render pass must contain at least one subpass.
    ///
    /// The default value is empty, which must be overridden.
    pub subpasses: Vec<SubpassDescription>,

    /// The dependencies between subpasses.
    ///
    /// The default value is empty.
    pub dependencies: Vec<SubpassDependency>,

    pub _ne: crate::NonExhaustive,
}

impl Default for RenderPassCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            attachments: Vec::new(),
            subpasses: Vec::new(),
            dependencies: Vec::new(),
            _ne: crate::NE,
        }
    }
}

impl RenderPassCreateInfo {
    fn validate(&self) -> Result<(), SyncValError> {
        let invalid = |problem: String| SyncValError::InvalidRenderPass { problem };

        if self.subpasses.is_empty() {
            return Err(invalid("`subpasses` is empty".to_owned()));
        }

        let attachment_count = self.attachments.len() as u32;

        for (subpass_index, subpass) in self.subpasses.iter().enumerate() {
            if !subpass.color_resolve_attachments.is_empty()
                && subpass.color_resolve_attachments.len() != subpass.color_attachments.len()
            {
                return Err(invalid(format!(
                    "`subpasses[{}].color_resolve_attachments` is not empty, but its length \
                    doesn't match `color_attachments`",
                    subpass_index,
                )));
            }

            let referenced = subpass
                .references()
                .map(|reference| reference.attachment)
                .chain(subpass.preserve_attachments.iter().copied());

            for attachment in referenced {
                if attachment >= attachment_count {
                    return Err(invalid(format!(
                        "`subpasses[{}]` refers to attachment {}, but there are only {} \
                        attachments",
                        subpass_index, attachment, attachment_count,
                    )));
                }
            }
        }

        let subpass_count = self.subpasses.len() as u32;

        for (dependency_index, dependency) in self.dependencies.iter().enumerate() {
            match (dependency.src_subpass, dependency.dst_subpass) {
                (None, None) => {
                    return Err(invalid(format!(
                        "`dependencies[{}]` has both `src_subpass` and `dst_subpass` set to \
                        `None`",
                        dependency_index,
                    )));
                }
                (Some(src), Some(dst)) if src > dst => {
                    return Err(invalid(format!(
                        "`dependencies[{}].src_subpass` is greater than `dst_subpass`",
                        dependency_index,
                    )));
                }
                _ => {}
            }

            for subpass in [dependency.src_subpass, dependency.dst_subpass]
                .into_iter()
                .flatten()
            {
                if subpass >= subpass_count {
                    return Err(invalid(format!(
                        "`dependencies[{}]` refers to subpass {}, but there are only {} \
                        subpasses",
                        dependency_index, subpass, subpass_count,
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Describes an attachment that will be used in a render pass.
#[derive(Clone, Debug)]
pub struct AttachmentDescription {
    /// What the implementation should do with the color or depth aspect of the attachment before
    /// the first subpass that uses it.
    ///
    /// The default value is [`LoadOp::DontCare`].
    pub load_op: LoadOp,

    /// What the implementation should do with the color or depth aspect of the attachment after
    /// the last subpass that uses it.
    ///
    /// The default value is [`StoreOp::DontCare`].
    pub store_op: StoreOp,

    /// The equivalent of `load_op` for the stencil aspect of the attachment.
    ///
    /// The default value is [`LoadOp::DontCare`].
    pub stencil_load_op: LoadOp,

    /// The equivalent of `store_op` for the stencil aspect of the attachment.
    ///
    /// The default value is [`StoreOp::DontCare`].
    pub stencil_store_op: StoreOp,

    /// The layout that the image must be in at the start of the render pass.
    ///
    /// The default value is [`ImageLayout::Undefined`].
    pub initial_layout: ImageLayout,

    /// The layout that the image will be transitioned to at the end of the render pass.
    ///
    /// The default value is [`ImageLayout::Undefined`], which must be overridden.
    pub final_layout: ImageLayout,

    pub _ne: crate::NonExhaustive,
}

impl Default for AttachmentDescription {
    #[inline]
    fn default() -> Self {
        Self {
            load_op: LoadOp::DontCare,
            store_op: StoreOp::DontCare,
            stencil_load_op: LoadOp::DontCare,
            stencil_store_op: StoreOp::DontCare,
            initial_layout: ImageLayout::Undefined,
            final_layout: ImageLayout::Undefined,
            _ne: crate::NE,
        }
    }
}

impl AttachmentDescription {
    fn load_op(&self, aspect: ImageAspects) -> LoadOp {
        if aspect == ImageAspects::STENCIL {
            self.stencil_load_op
        } else {
            self.load_op
        }
    }
}

/// A reference in a subpass description to a particular attachment of the render pass.
#[derive(Clone, Debug)]
pub struct AttachmentReference {
    /// The number of the attachment being referred to.
    ///
    /// The default value is `0`.
    pub attachment: u32,

    /// The image layout that the attachment should be transitioned to at the start of the
    /// subpass.
    ///
    /// The default value is [`ImageLayout::Undefined`], which must be overridden.
    pub layout: ImageLayout,

    pub _ne: crate::NonExhaustive,
}

impl Default for AttachmentReference {
    #[inline]
    fn default() -> Self {
        Self {
            attachment: 0,
            layout: ImageLayout::Undefined,
            _ne: crate::NE,
        }
    }
}

/// Describes one of the subpasses of a render pass.
#[derive(Clone, Debug)]
pub struct SubpassDescription {
    /// The attachments of the render pass that are to be used as input attachments in this
    /// subpass.
    ///
    /// The default value is empty.
    pub input_attachments: Vec<Option<AttachmentReference>>,

    /// The attachments of the render pass that are to be used as color attachments in this
    /// subpass.
    ///
    /// The default value is empty.
    pub color_attachments: Vec<Option<AttachmentReference>>,

    /// The attachments of the render pass that are to be used as multisample resolve attachments
    /// for the color attachments in this subpass.
    ///
    /// If not empty, the number of elements must equal the number of elements in
    /// `color_attachments`.
    ///
    /// The default value is empty.
    pub color_resolve_attachments: Vec<Option<AttachmentReference>>,

    /// The single attachment of the render pass that is to be used as depth/stencil attachment in
    /// this subpass.
    ///
    /// The default value is `None`.
    pub depth_stencil_attachment: Option<AttachmentReference>,

    /// The indices of attachments of the render pass that will be preserved during this subpass.
    ///
    /// The default value is empty.
    pub preserve_attachments: Vec<u32>,

    pub _ne: crate::NonExhaustive,
}

impl Default for SubpassDescription {
    #[inline]
    fn default() -> Self {
        Self {
            input_attachments: Vec::new(),
            color_attachments: Vec::new(),
            color_resolve_attachments: Vec::new(),
            depth_stencil_attachment: None,
            preserve_attachments: Vec::new(),
            _ne: crate::NE,
        }
    }
}

impl SubpassDescription {
    /// Returns all attachments that the subpass uses, in the order in which their layouts are
    /// taken into account.
    fn references(&self) -> impl Iterator<Item = &AttachmentReference> {
        self.input_attachments
            .iter()
            .chain(&self.color_attachments)
            .chain(&self.color_resolve_attachments)
            .flatten()
            .chain(&self.depth_stencil_attachment)
    }
}

/// A dependency between two subpasses of a render pass, or between a subpass and the commands
/// outside of the render pass.
///
/// Each dependency orders the accesses in its own source scope before the accesses in its own
/// destination scope. Two dependencies between the same subpasses don't combine into one: the
/// memory made available by one of them is not made visible by the other.
#[derive(Clone, Debug)]
pub struct SubpassDependency {
    /// The index of the subpass that writes the data that `dst_subpass` is going to use.
    ///
    /// `None` refers to the commands before the render pass.
    ///
    /// The default value is `None`.
    pub src_subpass: Option<u32>,

    /// The index of the subpass that reads the data that `src_subpass` wrote.
    ///
    /// `None` refers to the commands after the render pass.
    ///
    /// The default value is `None`.
    pub dst_subpass: Option<u32>,

    /// The pipeline stages that must be finished on `src_subpass` before the `dst_stages` of
    /// `dst_subpass` can start.
    ///
    /// The default value is [`PipelineStages::empty()`].
    pub src_stages: PipelineStages,

    /// The pipeline stages of `dst_subpass` that must wait for the `src_stages` of
    /// `src_subpass` to be finished.
    ///
    /// The default value is [`PipelineStages::empty()`].
    pub dst_stages: PipelineStages,

    /// The way `src_subpass` accesses the attachments on which we depend.
    ///
    /// The default value is [`AccessFlags::empty()`].
    pub src_access: AccessFlags,

    /// The way `dst_subpass` accesses the attachments on which we depend.
    ///
    /// The default value is [`AccessFlags::empty()`].
    pub dst_access: AccessFlags,

    pub _ne: crate::NonExhaustive,
}

impl Default for SubpassDependency {
    #[inline]
    fn default() -> Self {
        Self {
            src_subpass: None,
            dst_subpass: None,
            src_stages: PipelineStages::empty(),
            dst_stages: PipelineStages::empty(),
            src_access: AccessFlags::empty(),
            dst_access: AccessFlags::empty(),
            _ne: crate::NE,
        }
    }
}

impl From<&SubpassDependency> for SyncBarrier {
    #[inline]
    fn from(val: &SubpassDependency) -> Self {
        SyncBarrier::new(val.src_stages, val.src_access, val.dst_stages, val.dst_access)
    }
}

vulkan_enum! {
    /// Describes what the implementation should do with an attachment at the start of the
    /// subpass that first uses it.
    LoadOp = AttachmentLoadOp(i32);

    /// The content of the attachment will be loaded from memory. This is a read.
    Load = LOAD,

    /// The content of the attachment will be filled by the implementation with a uniform value.
    /// This is a write.
    Clear = CLEAR,

    /// The attachment will have undefined content. This is still a write, of unknown data.
    DontCare = DONT_CARE,
}

vulkan_enum! {
    /// Describes what the implementation should do with an attachment after the last subpass
    /// that uses it.
    StoreOp = AttachmentStoreOp(i32);

    /// The attachment will be stored to memory.
    Store = STORE,

    /// The content of the attachment becomes undefined. This is still a write, of unknown data.
    DontCare = DONT_CARE,
}

/// A view of a single mip level of an image, used as an attachment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageView {
    pub image: ResourceId,

    /// The subresources of `image` that the view covers. It must contain exactly one mip level.
    pub subresource_range: ImageSubresourceRange,
}

impl ImageView {
    #[inline]
    pub fn new(image: ResourceId, subresource_range: ImageSubresourceRange) -> Self {
        ImageView {
            image,
            subresource_range,
        }
    }
}

/// Parameters to begin a render pass.
#[derive(Clone, Debug)]
pub struct RenderPassBeginInfo {
    /// The render pass to begin.
    ///
    /// There is no default value.
    pub render_pass: Arc<RenderPass>,

    /// The image views to use as attachments, one per attachment of `render_pass`.
    ///
    /// There is no default value.
    pub attachments: Vec<ImageView>,

    /// The offset of the area that is rendered to, in texels.
    ///
    /// The default value is `[0; 2]`.
    pub render_area_offset: [u32; 2],

    /// The extent of the area that is rendered to. It is clamped to the extent of each
    /// attachment.
    ///
    /// The default value is `[u32::MAX; 2]`, which covers the attachments entirely.
    pub render_area_extent: [u32; 2],

    pub _ne: crate::NonExhaustive,
}

impl RenderPassBeginInfo {
    /// Returns a `RenderPassBeginInfo` with the specified `render_pass` and `attachments`.
    #[inline]
    pub fn new(render_pass: Arc<RenderPass>, attachments: Vec<ImageView>) -> Self {
        Self {
            render_pass,
            attachments,
            render_area_offset: [0; 2],
            render_area_extent: [u32::MAX; 2],
            _ne: crate::NE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct AttachmentUse {
    first_subpass: u32,
    last_subpass: u32,
}

fn attachment_uses(
    attachment_count: usize,
    subpasses: &[SubpassDescription],
) -> Vec<Option<AttachmentUse>> {
    let mut uses: Vec<Option<AttachmentUse>> = vec![None; attachment_count];

    for (subpass_index, subpass) in subpasses.iter().enumerate() {
        let subpass_index = subpass_index as u32;

        for reference in subpass.references() {
            let attachment_use =
                uses[reference.attachment as usize].get_or_insert(AttachmentUse {
                    first_subpass: subpass_index,
                    last_subpass: subpass_index,
                });
            attachment_use.last_subpass = subpass_index;
        }
    }

    uses
}

/// How the commands outside of the render pass are ordered with a subpass.
#[derive(Clone, Debug, PartialEq, Eq)]
enum ExternalEdge {
    /// By the dependencies with `None` on the outside.
    Explicit {
        barriers: SmallVec<[SyncBarrier; 2]>,
        indices: Vec<u32>,
    },
    /// By the implicit dependency, because the subpass has no explicit one.
    Implicit,
    /// The subpass is only ordered with the outside through other subpasses.
    Unordered,
}

/// The dependencies from an earlier subpass into a later one.
#[derive(Clone, Debug, PartialEq, Eq)]
struct SubpassEdge {
    subpass: u32,
    barriers: SmallVec<[SyncBarrier; 2]>,
    indices: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct SubpassEdges {
    from_external: ExternalEdge,
    to_external: ExternalEdge,
    prev: Vec<SubpassEdge>,
}

impl SubpassEdges {
    fn prev_indices(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self
            .prev
            .iter()
            .flat_map(|edge| edge.indices.iter().copied())
            .collect();
        indices.sort_unstable();

        indices
    }
}

fn subpass_edges(
    subpass_count: usize,
    dependencies: &[SubpassDependency],
    attachment_uses: &[Option<AttachmentUse>],
) -> Vec<SubpassEdges> {
    let mut from_external: Vec<Option<(SmallVec<[SyncBarrier; 2]>, Vec<u32>)>> =
        vec![None; subpass_count];
    let mut to_external = from_external.clone();
    let mut prev: Vec<Vec<SubpassEdge>> = vec![Vec::new(); subpass_count];
    let mut has_successor = vec![false; subpass_count];

    for (index, dependency) in dependencies.iter().enumerate() {
        let barrier = SyncBarrier::from(dependency);
        let index = index as u32;

        match (dependency.src_subpass, dependency.dst_subpass) {
            (None, Some(dst)) => {
                let (barriers, indices) =
                    from_external[dst as usize].get_or_insert_with(Default::default);
                barriers.push(barrier);
                indices.push(index);
            }
            (Some(src), None) => {
                let (barriers, indices) =
                    to_external[src as usize].get_or_insert_with(Default::default);
                barriers.push(barrier);
                indices.push(index);
            }
            // Self-dependencies only order accesses within the subpass, which pipeline barriers
            // inside the subpass take care of.
            (Some(src), Some(dst)) if src != dst => {
                has_successor[src as usize] = true;
                let edges = &mut prev[dst as usize];

                match edges.iter_mut().find(|edge| edge.subpass == src) {
                    Some(edge) => {
                        edge.barriers.push(barrier);
                        edge.indices.push(index);
                    }
                    None => edges.push(SubpassEdge {
                        subpass: src,
                        barriers: SmallVec::from_elem(barrier, 1),
                        indices: vec![index],
                    }),
                }
            }
            _ => {}
        }
    }

    let uses_of = |subpass: u32| {
        attachment_uses
            .iter()
            .flatten()
            .fold((false, false), |(first, last), u| {
                (
                    first || u.first_subpass == subpass,
                    last || u.last_subpass == subpass,
                )
            })
    };

    (0..subpass_count)
        .map(|subpass| {
            let (is_first_use, is_last_use) = uses_of(subpass as u32);
            let prev = std::mem::take(&mut prev[subpass]);

            let from_external = match from_external[subpass].take() {
                Some((barriers, indices)) => ExternalEdge::Explicit { barriers, indices },
                None if prev.is_empty() || is_first_use => ExternalEdge::Implicit,
                None => ExternalEdge::Unordered,
            };
            let to_external = match to_external[subpass].take() {
                Some((barriers, indices)) => ExternalEdge::Explicit { barriers, indices },
                None if !has_successor[subpass] || is_last_use => ExternalEdge::Implicit,
                None => ExternalEdge::Unordered,
            };

            SubpassEdges {
                from_external,
                to_external,
                prev,
            }
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct LayoutTransition {
    attachment: u32,
    /// The subpass that last used the attachment, or `None` if the transition is from the
    /// initial layout.
    prev_subpass: Option<u32>,
    old_layout: ImageLayout,
    new_layout: ImageLayout,
}

fn layout_transitions(
    attachments: &[AttachmentDescription],
    subpasses: &[SubpassDescription],
) -> (Vec<Vec<LayoutTransition>>, Vec<LayoutTransition>) {
    let mut current: Vec<(ImageLayout, Option<u32>)> = attachments
        .iter()
        .map(|attachment| (attachment.initial_layout, None))
        .collect();
    let mut transitions = Vec::with_capacity(subpasses.len());

    for (subpass_index, subpass) in subpasses.iter().enumerate() {
        let subpass_index = subpass_index as u32;
        let mut subpass_transitions = Vec::new();

        for reference in subpass.references() {
            let (layout, last_subpass) = &mut current[reference.attachment as usize];

            // The first reference of the subpass decides the layout.
            if *last_subpass == Some(subpass_index) {
                continue;
            }

            if *layout != reference.layout {
                subpass_transitions.push(LayoutTransition {
                    attachment: reference.attachment,
                    prev_subpass: *last_subpass,
                    old_layout: *layout,
                    new_layout: reference.layout,
                });
                *layout = reference.layout;
            }

            *last_subpass = Some(subpass_index);
        }

        transitions.push(subpass_transitions);
    }

    // Attachments that no subpass uses are left alone.
    let final_transitions = current
        .into_iter()
        .zip(attachments)
        .enumerate()
        .filter_map(|(attachment, ((layout, last_subpass), description))| {
            let last_subpass = last_subpass?;

            (layout != description.final_layout).then(|| LayoutTransition {
                attachment: attachment as u32,
                prev_subpass: Some(last_subpass),
                old_layout: layout,
                new_layout: description.final_layout,
            })
        })
        .collect();

    (transitions, final_transitions)
}

fn reachability(edges: &[SubpassEdges]) -> Vec<Vec<bool>> {
    let subpass_count = edges.len();
    let mut reachable = vec![vec![false; subpass_count]; subpass_count];

    for dst in 0..subpass_count {
        for edge in &edges[dst].prev {
            let src = edge.subpass as usize;
            reachable[src][dst] = true;

            for earlier in 0..src {
                if reachable[earlier][src] {
                    reachable[earlier][dst] = true;
                }
            }
        }
    }

    reachable
}

/// The dependency that stands in for a missing dependency from the outside into a subpass.
fn implicit_begin_barrier() -> SyncBarrier {
    SyncBarrier::new(
        PipelineStages::TOP_OF_PIPE,
        AccessFlags::empty(),
        PipelineStages::ALL_COMMANDS,
        AccessFlags::INPUT_ATTACHMENT_READ
            | AccessFlags::COLOR_ATTACHMENT_READ
            | AccessFlags::COLOR_ATTACHMENT_WRITE
            | AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
            | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
    )
}

/// The dependency that stands in for a missing dependency from a subpass to the outside.
fn implicit_end_barrier() -> SyncBarrier {
    SyncBarrier::new(
        PipelineStages::ALL_COMMANDS,
        AccessFlags::COLOR_ATTACHMENT_WRITE | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        PipelineStages::BOTTOM_OF_PIPE,
        AccessFlags::empty(),
    )
}

impl ExternalEdge {
    /// Returns the barriers of the edge, or `None` if the edge doesn't exist.
    fn barriers(
        &self,
        implicit: SyncBarrier,
        policy: ImplicitDependencyPolicy,
    ) -> Option<SmallVec<[SyncBarrier; 2]>> {
        match self {
            ExternalEdge::Explicit { barriers, .. } => Some(barriers.clone()),
            ExternalEdge::Implicit => Some(match policy {
                ImplicitDependencyPolicy::ChainWithBarriers => SmallVec::from_elem(implicit, 1),
                ImplicitDependencyPolicy::NoOrdering => SmallVec::new(),
            }),
            ExternalEdge::Unordered => None,
        }
    }

    fn dependency_source(&self, fallback: impl FnOnce() -> Vec<u32>) -> DependencySource {
        match self {
            ExternalEdge::Explicit { indices, .. } => DependencySource::Subpass {
                indices: indices.clone(),
            },
            ExternalEdge::Implicit => DependencySource::ImplicitExternal,
            ExternalEdge::Unordered => DependencySource::Subpass {
                indices: fallback(),
            },
        }
    }
}

/// An attachment image view, resolved to address ranges.
#[derive(Clone, Debug)]
struct AttachmentState {
    image: ResourceId,
    mip_level: u32,
    array_layers: Range<u32>,
    /// The whole view, which layout transitions write.
    view_ranges: Vec<Range<DeviceSize>>,
    /// The render area of each aspect of the view, which load, store and resolve operations
    /// access.
    planes: SmallVec<[(ImageAspects, Vec<Range<DeviceSize>>); 2]>,
}

impl AttachmentState {
    fn new(
        resources: &Resources,
        view: &ImageView,
        render_area_offset: [u32; 2],
        render_area_extent: [u32; 2],
    ) -> Result<Self, SyncValError> {
        let image_info = resources.image(view.image)?;
        let subresource_range = &view.subresource_range;

        if subresource_range.mip_levels.len() != 1 {
            return Err(SyncValError::OutOfBounds {
                resource: view.image,
                problem: "an attachment view must have exactly one mip level",
            });
        }

        let view_ranges = resources.image_subresource_ranges(view.image, subresource_range)?;
        let mip_level = subresource_range.mip_levels.start;
        let [width, height, _] = image_info.mip_level_extent(mip_level);
        let [x, y] = render_area_offset;
        let extent = [
            render_area_extent[0].min(width.saturating_sub(x)),
            render_area_extent[1].min(height.saturating_sub(y)),
            1,
        ];

        let mut planes = SmallVec::new();

        for aspect in subresource_range.aspects.iter() {
            let ranges = resources.image_region_ranges(
                view.image,
                &ImageSubresourceLayers {
                    aspects: aspect,
                    mip_level,
                    array_layers: subresource_range.array_layers.clone(),
                },
                [x, y, 0],
                extent,
            )?;
            planes.push((aspect, ranges));
        }

        Ok(AttachmentState {
            image: view.image,
            mip_level,
            array_layers: subresource_range.array_layers.clone(),
            view_ranges,
            planes,
        })
    }

    fn plane(&self, aspect: ImageAspects) -> Option<&[Range<DeviceSize>]> {
        self.planes
            .iter()
            .find(|(a, _)| *a == aspect)
            .map(|(_, ranges)| ranges.as_slice())
    }
}

/// An attachment that still has to be stored when the render pass ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct StoreObligation {
    subpass: u32,
    attachment: u32,
}

/// The state of the render pass instance that is currently being recorded.
///
/// Every subpass has its own access context, made when entering it by merging the contexts that
/// it depends on, each seen through the barriers of the dependency. When the render pass ends,
/// all subpass contexts are merged back into the context of the command buffer.
#[derive(Debug)]
pub(crate) struct RenderPassState {
    render_pass: Arc<RenderPass>,
    attachments: Vec<AttachmentState>,
    contexts: Vec<AccessContext>,
    start_tags: Vec<Tag>,
    pending_stores: Vec<StoreObligation>,
}

impl RenderPassState {
    /// Begins the render pass, entering its first subpass.
    ///
    /// Returns `None` if entering the first subpass produced hazards, in which case nothing is
    /// recorded.
    pub(crate) fn begin(
        resources: &Resources,
        begin_info: &RenderPassBeginInfo,
        main: &AccessContext,
        tag: Tag,
        config: &SyncValidatorCreateInfo,
        hazards: &mut Vec<DetectedHazard>,
    ) -> Result<Option<Self>, SyncValError> {
        let RenderPassBeginInfo {
            render_pass,
            attachments,
            render_area_offset,
            render_area_extent,
            _ne: _,
        } = begin_info;

        if attachments.len() != render_pass.attachments.len() {
            return Err(SyncValError::AttachmentCountMismatch {
                required: render_pass.attachments.len() as u32,
                provided: attachments.len() as u32,
            });
        }

        let attachments = attachments
            .iter()
            .map(|view| {
                AttachmentState::new(resources, view, *render_area_offset, *render_area_extent)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let subpass_count = render_pass.subpasses.len();
        let mut state = RenderPassState {
            render_pass: render_pass.clone(),
            attachments,
            contexts: Vec::with_capacity(subpass_count),
            start_tags: Vec::with_capacity(subpass_count),
            pending_stores: Vec::new(),
        };

        let hazard_count = hazards.len();
        state.enter_subpass(main, tag, config, hazards);

        Ok((hazards.len() == hazard_count).then_some(state))
    }

    /// Returns the index of the current subpass.
    #[inline]
    pub(crate) fn current_subpass(&self) -> u32 {
        (self.contexts.len() - 1) as u32
    }

    /// Returns the number of subpasses after the current one.
    #[inline]
    pub(crate) fn remaining_subpasses(&self) -> u32 {
        self.render_pass.subpasses.len() as u32 - 1 - self.current_subpass()
    }

    /// Returns the access context of the current subpass.
    #[inline]
    pub(crate) fn current_context_mut(&mut self) -> &mut AccessContext {
        let current = self.contexts.len() - 1;
        &mut self.contexts[current]
    }

    /// Ends the current subpass and enters the next one.
    pub(crate) fn next_subpass(
        &mut self,
        main: &AccessContext,
        tag: Tag,
        config: &SyncValidatorCreateInfo,
        hazards: &mut Vec<DetectedHazard>,
    ) -> Result<(), SyncValError> {
        if self.remaining_subpasses() == 0 {
            return Err(SyncValError::NoSubpassesRemaining);
        }

        self.leave_subpass(tag, config, hazards);
        self.enter_subpass(main, tag, config, hazards);

        Ok(())
    }

    /// Ends the render pass: stores the attachments, transitions them to their final layouts and
    /// merges the accesses of all subpasses into `main`.
    ///
    /// The caller must make sure that the current subpass is the last one.
    pub(crate) fn end(
        mut self,
        main: &mut AccessContext,
        tag: Tag,
        config: &SyncValidatorCreateInfo,
        hazards: &mut Vec<DetectedHazard>,
    ) {
        debug_assert_eq!(self.remaining_subpasses(), 0);

        self.leave_subpass(tag, config, hazards);

        for obligation in std::mem::take(&mut self.pending_stores) {
            self.store(obligation, tag, config, hazards);
        }

        let render_pass = self.render_pass.clone();
        let policy = config.implicit_external_dependency;
        let end_barriers = |subpass: usize| {
            render_pass.edges[subpass]
                .to_external
                .barriers(implicit_end_barrier(), policy)
        };

        let mut final_transitions = Vec::with_capacity(render_pass.final_transitions.len());

        for transition in &render_pass.final_transitions {
            let Some(subpass) = transition.prev_subpass else {
                continue;
            };
            let subpass = subpass as usize;
            let attachment = &self.attachments[transition.attachment as usize];
            let barriers = end_barriers(subpass).unwrap_or_default();
            let merged = SyncBarrier::merged(&barriers);

            let found = attachment.view_ranges.iter().find_map(|range| {
                self.contexts[subpass].detect_barrier_hazard(attachment.image, range, &merged)
            });

            if let Some((range, conflict)) = found {
                let edges = &render_pass.edges[subpass];
                hazards.push(DetectedHazard {
                    resource: attachment.image,
                    range,
                    access: AccessType::ImageLayoutTransition,
                    origin: AccessOrigin::LayoutTransition,
                    conflict,
                    dependency: Some(
                        edges
                            .to_external
                            .dependency_source(|| edges.prev_indices()),
                    ),
                });
            }

            final_transitions.push((attachment.image, &attachment.view_ranges, barriers));
        }

        for (subpass, context) in self.contexts.iter().enumerate() {
            let barriers = end_barriers(subpass).unwrap_or_default();
            main.resolve_from(context, &barriers);
        }

        for (image, ranges, barriers) in final_transitions {
            main.record_layout_transition(image, ranges, &barriers, tag);
        }

        tracing::debug!(
            target: "vulkano_syncval",
            subpasses = self.contexts.len(),
            "ended render pass",
        );
    }

    fn enter_subpass(
        &mut self,
        main: &AccessContext,
        tag: Tag,
        config: &SyncValidatorCreateInfo,
        hazards: &mut Vec<DetectedHazard>,
    ) {
        let render_pass = self.render_pass.clone();
        let subpass = self.contexts.len();
        let edges = &render_pass.edges[subpass];
        let policy = config.implicit_external_dependency;
        let begin_barriers = edges.from_external.barriers(implicit_begin_barrier(), policy);

        let mut context = AccessContext::new();

        if let Some(barriers) = &begin_barriers {
            context.resolve_from(main, barriers);
        }

        for edge in &edges.prev {
            context.resolve_from(&self.contexts[edge.subpass as usize], &edge.barriers);
        }

        for transition in &render_pass.transitions[subpass] {
            let attachment = &self.attachments[transition.attachment as usize];

            let (source, barriers, dependency) = match transition.prev_subpass {
                None => (
                    Some(main),
                    begin_barriers.clone().unwrap_or_default(),
                    edges.from_external.dependency_source(|| edges.prev_indices()),
                ),
                Some(prev_subpass) => {
                    match edges.prev.iter().find(|edge| edge.subpass == prev_subpass) {
                        Some(edge) => (
                            Some(&self.contexts[prev_subpass as usize]),
                            edge.barriers.clone(),
                            DependencySource::Subpass {
                                indices: edge.indices.clone(),
                            },
                        ),
                        // Without a dependency from the previous user there is nothing to
                        // check the transition against.
                        None => (
                            None,
                            ExternalEdge::Implicit
                                .barriers(implicit_begin_barrier(), policy)
                                .unwrap_or_default(),
                            DependencySource::None,
                        ),
                    }
                }
            };

            if let Some(source) = source {
                let merged = SyncBarrier::merged(&barriers);
                let found = attachment.view_ranges.iter().find_map(|range| {
                    source.detect_barrier_hazard(attachment.image, range, &merged)
                });

                if let Some((range, conflict)) = found {
                    hazards.push(DetectedHazard {
                        resource: attachment.image,
                        range,
                        access: AccessType::ImageLayoutTransition,
                        origin: AccessOrigin::LayoutTransition,
                        conflict,
                        dependency: Some(dependency),
                    });
                }
            }

            tracing::trace!(
                target: "vulkano_syncval",
                attachment = transition.attachment,
                old_layout = ?transition.old_layout,
                new_layout = ?transition.new_layout,
                "transitioning attachment layout",
            );

            context.record_layout_transition(
                attachment.image,
                &attachment.view_ranges,
                &barriers,
                tag,
            );
        }

        self.contexts.push(context);
        self.start_tags.push(tag);

        tracing::debug!(target: "vulkano_syncval", subpass, "entered subpass");

        let subpass = subpass as u32;

        for (attachment_index, attachment) in self.attachments.iter().enumerate() {
            if !render_pass.is_first_use(attachment_index, subpass) {
                continue;
            }

            let description = &render_pass.attachments[attachment_index];

            for (aspect, ranges) in &attachment.planes {
                let (access, ordering) = load_access(*aspect, description.load_op(*aspect));
                let usage = Usage {
                    resource: attachment.image,
                    ranges: ranges.clone(),
                    access,
                    ordering,
                };
                let found = self.detect_usage(subpass, &usage, AccessOrigin::LoadOp);
                let skip =
                    found.is_some() && config.hazard_state_update == HazardStateUpdate::Skip;
                hazards.extend(found);

                if !skip {
                    update(&mut self.contexts[subpass as usize], &usage, tag);
                }
            }
        }
    }

    fn leave_subpass(
        &mut self,
        tag: Tag,
        config: &SyncValidatorCreateInfo,
        hazards: &mut Vec<DetectedHazard>,
    ) {
        let render_pass = self.render_pass.clone();
        let subpass = self.current_subpass();
        let description = &render_pass.subpasses[subpass as usize];

        let resolve_pairs = description
            .color_attachments
            .iter()
            .zip(&description.color_resolve_attachments)
            .filter_map(|(color, resolve)| Some((color.as_ref()?, resolve.as_ref()?)));

        for (color, resolve) in resolve_pairs {
            let usages = [
                (
                    color.attachment,
                    AccessType::ColorAttachmentOutputColorAttachmentRead,
                ),
                (
                    resolve.attachment,
                    AccessType::ColorAttachmentOutputColorAttachmentWrite,
                ),
            ]
            .into_iter()
            .filter_map(|(attachment, access)| {
                let ranges = self.attachments[attachment as usize].plane(ImageAspects::COLOR)?;

                Some(Usage {
                    resource: self.attachments[attachment as usize].image,
                    ranges: ranges.to_vec(),
                    access,
                    ordering: SyncOrdering::ColorAttachment,
                })
            })
            .collect::<SmallVec<[_; 2]>>();

            self.record_usages(&usages, AccessOrigin::ResolveOp, tag, config, hazards);
        }

        for attachment in 0..self.attachments.len() {
            if render_pass.is_last_use(attachment, subpass) {
                self.pending_stores.push(StoreObligation {
                    subpass,
                    attachment: attachment as u32,
                });
            }
        }
    }

    fn store(
        &mut self,
        obligation: StoreObligation,
        tag: Tag,
        config: &SyncValidatorCreateInfo,
        hazards: &mut Vec<DetectedHazard>,
    ) {
        let StoreObligation {
            subpass,
            attachment,
        } = obligation;
        let attachment = &self.attachments[attachment as usize];
        let concurrent: SmallVec<[usize; 4]> = (0..self.contexts.len())
            .filter(|&other| {
                other != subpass as usize
                    && !self.render_pass.is_ordered_before(other as u32, subpass)
                    && !self.render_pass.is_ordered_before(subpass, other as u32)
            })
            .collect();
        let mut updates: SmallVec<[Usage; 2]> = SmallVec::new();

        for (aspect, ranges) in &attachment.planes {
            let access = if *aspect == ImageAspects::COLOR {
                AccessType::ColorAttachmentOutputColorAttachmentWrite
            } else {
                AccessType::LateFragmentTestsDepthStencilAttachmentWrite
            };
            let usage = Usage {
                resource: attachment.image,
                ranges: ranges.clone(),
                access,
                ordering: SyncOrdering::Raster,
            };

            let found = usage
                .ranges
                .iter()
                .find_map(|range| {
                    concurrent.iter().find_map(|&other| {
                        self.contexts[other]
                            .detect_async_hazard(
                                usage.resource,
                                range,
                                usage.access,
                                self.start_tags[other],
                            )
                    })
                })
                .map(|(range, conflict)| (range, conflict, Some(DependencySource::None)))
                .or_else(|| self.detect_sync(subpass, &usage));

            if let Some((range, conflict, dependency)) = found {
                hazards.push(DetectedHazard {
                    resource: usage.resource,
                    range,
                    access: usage.access,
                    origin: AccessOrigin::StoreOp,
                    conflict,
                    dependency,
                });

                if config.hazard_state_update == HazardStateUpdate::Skip {
                    continue;
                }
            }

            updates.push(usage);
        }

        for usage in &updates {
            update(&mut self.contexts[subpass as usize], usage, tag);
        }
    }

    /// Records accesses of a command in the current subpass.
    pub(crate) fn record_usages(
        &mut self,
        usages: &[Usage],
        origin: AccessOrigin,
        tag: Tag,
        config: &SyncValidatorCreateInfo,
        hazards: &mut Vec<DetectedHazard>,
    ) {
        let subpass = self.current_subpass();

        for usage in usages {
            let found = self.detect_usage(subpass, usage, origin);
            let skip = found.is_some() && config.hazard_state_update == HazardStateUpdate::Skip;
            hazards.extend(found);

            if !skip {
                update(self.current_context_mut(), usage, tag);
            }
        }
    }

    /// Checks an access of `subpass`. Reads are first checked for races with the subpasses that
    /// may run concurrently, and then against the history of the subpass.
    fn detect_usage(
        &self,
        subpass: u32,
        usage: &Usage,
        origin: AccessOrigin,
    ) -> Option<DetectedHazard> {
        let race = if usage.access.is_read() {
            self.detect_race(subpass, usage)
        } else {
            None
        };

        race.or_else(|| self.detect_sync(subpass, usage))
            .map(|(range, conflict, dependency)| DetectedHazard {
                resource: usage.resource,
                range,
                access: usage.access,
                origin,
                conflict,
                dependency,
            })
    }

    fn detect_race(
        &self,
        subpass: u32,
        usage: &Usage,
    ) -> Option<(Range<DeviceSize>, Conflict, Option<DependencySource>)> {
        (0..subpass)
            .filter(|&earlier| !self.render_pass.is_ordered_before(earlier, subpass))
            .find_map(|earlier| {
                let earlier = earlier as usize;

                usage.ranges.iter().find_map(|range| {
                    self.contexts[earlier].detect_async_hazard(
                        usage.resource,
                        range,
                        usage.access,
                        self.start_tags[earlier],
                    )
                })
            })
            .map(|(range, conflict)| (range, conflict, Some(DependencySource::None)))
    }

    fn detect_sync(
        &self,
        subpass: u32,
        usage: &Usage,
    ) -> Option<(Range<DeviceSize>, Conflict, Option<DependencySource>)> {
        let context = &self.contexts[subpass as usize];

        usage
            .ranges
            .iter()
            .find_map(|range| {
                context.detect_hazard(usage.resource, range, usage.access, usage.ordering)
            })
            .map(|(range, conflict)| {
                let dependency = self.dependency_for(subpass, usage.resource, &conflict);
                (range, conflict, dependency)
            })
    }

    /// Returns the dependency that was expected to order an access of `subpass` to `resource`
    /// after the prior access of `conflict`.
    fn dependency_for(
        &self,
        subpass: u32,
        resource: ResourceId,
        conflict: &Conflict,
    ) -> Option<DependencySource> {
        let edges = &self.render_pass.edges[subpass as usize];
        let prior_tag = conflict.prior_tag;

        if prior_tag < self.start_tags[0] {
            return Some(edges.from_external.dependency_source(|| edges.prev_indices()));
        }

        let mut prior_subpass = self.start_tags[..=subpass as usize]
            .iter()
            .rposition(|&start_tag| start_tag <= prior_tag)? as u32;

        // Resolve operations of a subpass share the tag of the command that enters the next one.
        if prior_subpass > 0
            && self.start_tags[prior_subpass as usize] == prior_tag
            && conflict.prior_access != AccessType::ImageLayoutTransition
            && self.resolves_into(prior_subpass - 1, resource)
        {
            prior_subpass -= 1;
        }

        if prior_subpass == subpass {
            return None;
        }

        let indices = match edges.prev.iter().find(|edge| edge.subpass == prior_subpass) {
            Some(edge) => edge.indices.clone(),
            None => edges.prev_indices(),
        };

        Some(DependencySource::Subpass { indices })
    }

    /// Returns whether the resolve operations of `subpass` access `resource`.
    fn resolves_into(&self, subpass: u32, resource: ResourceId) -> bool {
        let description = &self.render_pass.subpasses[subpass as usize];

        description
            .color_attachments
            .iter()
            .zip(&description.color_resolve_attachments)
            .filter_map(|(color, resolve)| Some([color.as_ref()?, resolve.as_ref()?]))
            .flatten()
            .any(|reference| self.attachments[reference.attachment as usize].image == resource)
    }

    /// Returns the accesses that a draw makes to the attachments of the current subpass.
    pub(crate) fn draw_usages(&self, attachment_access: &AttachmentAccess) -> Vec<Usage> {
        let description = &self.render_pass.subpasses[self.current_subpass() as usize];
        let mut usages = Vec::new();

        if attachment_access.color_write {
            for reference in description.color_attachments.iter().flatten() {
                let attachment = &self.attachments[reference.attachment as usize];

                if let Some(ranges) = attachment.plane(ImageAspects::COLOR) {
                    usages.push(Usage {
                        resource: attachment.image,
                        ranges: ranges.to_vec(),
                        access: AccessType::ColorAttachmentOutputColorAttachmentWrite,
                        ordering: SyncOrdering::ColorAttachment,
                    });
                }
            }
        }

        if let Some(reference) = &description.depth_stencil_attachment {
            let attachment = &self.attachments[reference.attachment as usize];
            let read_only = reference.layout == ImageLayout::DepthStencilReadOnlyOptimal;
            let aspects = [
                (
                    ImageAspects::DEPTH,
                    attachment_access.depth_test,
                    attachment_access.depth_write,
                ),
                (
                    ImageAspects::STENCIL,
                    attachment_access.stencil_test,
                    attachment_access.stencil_write,
                ),
            ];

            for (aspect, test, write) in aspects {
                let Some(ranges) = attachment.plane(aspect) else {
                    continue;
                };

                if test {
                    usages.push(Usage {
                        resource: attachment.image,
                        ranges: ranges.to_vec(),
                        access: AccessType::EarlyFragmentTestsDepthStencilAttachmentRead,
                        ordering: SyncOrdering::DepthStencilAttachment,
                    });
                }

                if write && !read_only {
                    usages.push(Usage {
                        resource: attachment.image,
                        ranges: ranges.to_vec(),
                        access: AccessType::LateFragmentTestsDepthStencilAttachmentWrite,
                        ordering: SyncOrdering::DepthStencilAttachment,
                    });
                }
            }
        }

        usages
    }

    /// Returns the accesses of a `ClearAttachments` command in the current subpass.
    pub(crate) fn clear_attachment_usages(
        &self,
        resources: &Resources,
        clear_info: &ClearAttachmentsInfo,
    ) -> Result<Vec<Usage>, SyncValError> {
        let description = &self.render_pass.subpasses[self.current_subpass() as usize];
        let mut usages = Vec::new();

        for clear_attachment in &clear_info.attachments {
            let (reference, aspects, access, ordering) = match *clear_attachment {
                ClearAttachment::Color { color_attachment } => (
                    description
                        .color_attachments
                        .get(color_attachment as usize)
                        .and_then(Option::as_ref),
                    ImageAspects::COLOR,
                    AccessType::ColorAttachmentOutputColorAttachmentWrite,
                    SyncOrdering::ColorAttachment,
                ),
                ClearAttachment::Depth
                | ClearAttachment::Stencil
                | ClearAttachment::DepthStencil => {
                    let aspects = match clear_attachment {
                        ClearAttachment::Depth => ImageAspects::DEPTH,
                        ClearAttachment::Stencil => ImageAspects::STENCIL,
                        _ => ImageAspects::DEPTH | ImageAspects::STENCIL,
                    };

                    (
                        description.depth_stencil_attachment.as_ref(),
                        aspects,
                        AccessType::LateFragmentTestsDepthStencilAttachmentWrite,
                        SyncOrdering::DepthStencilAttachment,
                    )
                }
            };

            // Clearing an unused attachment does nothing.
            let Some(reference) = reference else {
                continue;
            };

            let attachment = &self.attachments[reference.attachment as usize];

            for &(aspect, _) in &attachment.planes {
                if !aspects.contains(aspect) {
                    continue;
                }

                for rect in &clear_info.rects {
                    let base_layer = attachment.array_layers.start;
                    let array_layers = base_layer
                        .checked_add(rect.array_layers.start)
                        .zip(base_layer.checked_add(rect.array_layers.end))
                        .map(|(start, end)| start..end)
                        .filter(|layers| layers.end <= attachment.array_layers.end)
                        .ok_or(SyncValError::OutOfBounds {
                            resource: attachment.image,
                            problem: "the layers of a clear rectangle exceed the attachment",
                        })?;

                    let ranges = resources.image_region_ranges(
                        attachment.image,
                        &ImageSubresourceLayers {
                            aspects: aspect,
                            mip_level: attachment.mip_level,
                            array_layers,
                        },
                        [rect.offset[0], rect.offset[1], 0],
                        [rect.extent[0], rect.extent[1], 1],
                    )?;

                    usages.push(Usage {
                        resource: attachment.image,
                        ranges,
                        access,
                        ordering,
                    });
                }
            }
        }

        Ok(usages)
    }
}

fn load_access(aspect: ImageAspects, load_op: LoadOp) -> (AccessType, SyncOrdering) {
    let read = load_op == LoadOp::Load;

    if aspect == ImageAspects::COLOR {
        let access = if read {
            AccessType::ColorAttachmentOutputColorAttachmentRead
        } else {
            AccessType::ColorAttachmentOutputColorAttachmentWrite
        };

        (access, SyncOrdering::ColorAttachment)
    } else {
        let access = if read {
            AccessType::EarlyFragmentTestsDepthStencilAttachmentRead
        } else {
            AccessType::EarlyFragmentTestsDepthStencilAttachmentWrite
        };

        (access, SyncOrdering::DepthStencilAttachment)
    }
}

fn update(context: &mut AccessContext, usage: &Usage, tag: Tag) {
    for range in &usage.ranges {
        context.update(usage.resource, range, usage.access, tag);
    }
}
