// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The commands that a command buffer can record, and the memory accesses they make.
//!
//! Each command is described by the resources it touches, in the same terms as the corresponding
//! Vulkan command: buffer regions in bytes and image regions in texels of a subresource. The
//! validator turns a command into a list of accesses, each one a pipeline stage and access type
//! over some ranges of a resource's address space.
//!
//! Pipelines and shaders are outside of the model. A draw or dispatch lists the buffers and
//! images that it reads or writes through its bindings instead.

use crate::{
    access::SyncOrdering,
    render_pass::RenderPassBeginInfo,
    resource::{ImageSubresourceLayers, ImageSubresourceRange, ResourceId, Resources},
    sync::{AccessFlags, AccessType, DependencyInfo, EventId, PipelineStages},
    DeviceSize, SyncValError,
};
use smallvec::SmallVec;
use std::ops::Range;

/// A command recorded into a command buffer.
#[derive(Clone, Debug)]
pub enum Command {
    /// Copies regions of a buffer to another buffer.
    CopyBuffer(CopyBufferInfo),

    /// Copies regions of an image to another image.
    CopyImage(CopyImageInfo),

    /// Copies from a buffer to regions of an image.
    CopyBufferToImage(CopyBufferToImageInfo),

    /// Copies from regions of an image to a buffer.
    CopyImageToBuffer(CopyImageToBufferInfo),

    /// Blits regions of an image to another image, with scaling.
    BlitImage(BlitImageInfo),

    /// Resolves a multisampled image into a single-sampled one.
    ResolveImage(ResolveImageInfo),

    /// Fills a range of a buffer with a value.
    FillBuffer { dst_buffer: BufferRange },

    /// Writes inline data to a range of a buffer.
    UpdateBuffer { dst_buffer: BufferRange },

    /// Clears subresources of a color image.
    ClearColorImage(ClearImageInfo),

    /// Clears subresources of a depth/stencil image.
    ClearDepthStencilImage(ClearImageInfo),

    /// Clears rectangles of attachments of the current subpass.
    ClearAttachments(ClearAttachmentsInfo),

    /// Copies the results of queries into a range of a buffer.
    CopyQueryPoolResults { dst_buffer: BufferRange },

    /// Dispatches compute work.
    Dispatch { descriptors: Vec<DescriptorBinding> },

    /// Dispatches compute work, with the parameters read from a buffer.
    DispatchIndirect {
        indirect_buffer: BufferRange,
        descriptors: Vec<DescriptorBinding>,
    },

    /// Draws non-indexed vertices.
    Draw(DrawInfo),

    /// Draws indexed vertices.
    DrawIndexed(DrawInfo),

    /// Draws non-indexed vertices, with the parameters read from a buffer.
    DrawIndirect {
        indirect_buffer: BufferRange,
        draw: DrawInfo,
    },

    /// Draws indexed vertices, with the parameters read from a buffer.
    DrawIndexedIndirect {
        indirect_buffer: BufferRange,
        draw: DrawInfo,
    },

    /// Explicitly listed accesses, for commands that aren't otherwise modeled.
    Accesses(Vec<ResourceAccess>),

    /// Inserts a memory dependency.
    PipelineBarrier(DependencyInfo),

    /// Signals an event once the given stages of all previous commands have finished.
    SetEvent {
        event: EventId,
        stages: PipelineStages,
    },

    /// Unsignals an event once the given stages of all previous commands have finished.
    ResetEvent {
        event: EventId,
        stages: PipelineStages,
    },

    /// Waits for events to be signaled, and inserts a memory dependency from the commands before
    /// the signals to the commands after the wait.
    WaitEvents {
        events: SmallVec<[EventId; 1]>,
        dependency_info: DependencyInfo,
    },

    /// Begins a render pass, entering its first subpass.
    BeginRenderPass(RenderPassBeginInfo),

    /// Advances to the next subpass of the current render pass.
    NextSubpass,

    /// Ends the current render pass.
    EndRenderPass,
}

/// Where a command may be recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CommandScope {
    Outside,
    Inside,
    Both,
}

impl Command {
    /// Returns the name of the command, as used in reports.
    pub fn name(&self) -> &'static str {
        match self {
            Command::CopyBuffer(_) => "copy_buffer",
            Command::CopyImage(_) => "copy_image",
            Command::CopyBufferToImage(_) => "copy_buffer_to_image",
            Command::CopyImageToBuffer(_) => "copy_image_to_buffer",
            Command::BlitImage(_) => "blit_image",
            Command::ResolveImage(_) => "resolve_image",
            Command::FillBuffer { .. } => "fill_buffer",
            Command::UpdateBuffer { .. } => "update_buffer",
            Command::ClearColorImage(_) => "clear_color_image",
            Command::ClearDepthStencilImage(_) => "clear_depth_stencil_image",
            Command::ClearAttachments(_) => "clear_attachments",
            Command::CopyQueryPoolResults { .. } => "copy_query_pool_results",
            Command::Dispatch { .. } => "dispatch",
            Command::DispatchIndirect { .. } => "dispatch_indirect",
            Command::Draw(_) => "draw",
            Command::DrawIndexed(_) => "draw_indexed",
            Command::DrawIndirect { .. } => "draw_indirect",
            Command::DrawIndexedIndirect { .. } => "draw_indexed_indirect",
            Command::Accesses(_) => "accesses",
            Command::PipelineBarrier(_) => "pipeline_barrier",
            Command::SetEvent { .. } => "set_event",
            Command::ResetEvent { .. } => "reset_event",
            Command::WaitEvents { .. } => "wait_events",
            Command::BeginRenderPass(_) => "begin_render_pass",
            Command::NextSubpass => "next_subpass",
            Command::EndRenderPass => "end_render_pass",
        }
    }

    pub(crate) fn scope(&self) -> CommandScope {
        match self {
            Command::CopyBuffer(_)
            | Command::CopyImage(_)
            | Command::CopyBufferToImage(_)
            | Command::CopyImageToBuffer(_)
            | Command::BlitImage(_)
            | Command::ResolveImage(_)
            | Command::FillBuffer { .. }
            | Command::UpdateBuffer { .. }
            | Command::ClearColorImage(_)
            | Command::ClearDepthStencilImage(_)
            | Command::CopyQueryPoolResults { .. }
            | Command::Dispatch { .. }
            | Command::DispatchIndirect { .. }
            | Command::SetEvent { .. }
            | Command::ResetEvent { .. }
            | Command::BeginRenderPass(_) => CommandScope::Outside,
            Command::ClearAttachments(_)
            | Command::Draw(_)
            | Command::DrawIndexed(_)
            | Command::DrawIndirect { .. }
            | Command::DrawIndexedIndirect { .. }
            | Command::NextSubpass
            | Command::EndRenderPass => CommandScope::Inside,
            Command::Accesses(_) | Command::PipelineBarrier(_) | Command::WaitEvents { .. } => {
                CommandScope::Both
            }
        }
    }

    /// Returns the accesses of the command to resources named by the command itself, in the
    /// order in which they are checked and recorded.
    ///
    /// Accesses to attachments through the current subpass are not included.
    pub(crate) fn usages(&self, resources: &Resources) -> Result<Vec<Usage>, SyncValError> {
        let mut usages = Vec::new();

        match self {
            Command::CopyBuffer(info) => info.usages(resources, &mut usages)?,
            Command::CopyImage(info) => info.usages(resources, &mut usages)?,
            Command::CopyBufferToImage(info) => info.usages(resources, &mut usages)?,
            Command::CopyImageToBuffer(info) => info.usages(resources, &mut usages)?,
            Command::BlitImage(info) => info.usages(resources, &mut usages)?,
            Command::ResolveImage(info) => info.usages(resources, &mut usages)?,
            Command::FillBuffer { dst_buffer }
            | Command::UpdateBuffer { dst_buffer }
            | Command::CopyQueryPoolResults { dst_buffer } => {
                usages.push(dst_buffer.usage(resources, AccessType::TransferTransferWrite)?);
            }
            Command::ClearColorImage(info) | Command::ClearDepthStencilImage(info) => {
                for subresource_range in &info.regions {
                    usages.push(Usage::new(
                        info.image,
                        resources.image_subresource_ranges(info.image, subresource_range)?,
                        AccessType::TransferTransferWrite,
                    ));
                }
            }
            Command::Dispatch { descriptors } => {
                descriptor_usages(resources, descriptors, true, &mut usages)?;
            }
            Command::DispatchIndirect {
                indirect_buffer,
                descriptors,
            } => {
                usages.push(
                    indirect_buffer
                        .usage(resources, AccessType::DrawIndirectIndirectCommandRead)?,
                );
                descriptor_usages(resources, descriptors, true, &mut usages)?;
            }
            Command::Draw(draw) => draw.usages(resources, false, &mut usages)?,
            Command::DrawIndexed(draw) => draw.usages(resources, true, &mut usages)?,
            Command::DrawIndirect {
                indirect_buffer,
                draw,
            } => {
                usages.push(
                    indirect_buffer
                        .usage(resources, AccessType::DrawIndirectIndirectCommandRead)?,
                );
                draw.usages(resources, false, &mut usages)?;
            }
            Command::DrawIndexedIndirect {
                indirect_buffer,
                draw,
            } => {
                usages.push(
                    indirect_buffer
                        .usage(resources, AccessType::DrawIndirectIndirectCommandRead)?,
                );
                draw.usages(resources, true, &mut usages)?;
            }
            Command::Accesses(accesses) => {
                for access in accesses {
                    usages.push(access.usage(resources)?);
                }
            }
            Command::ClearAttachments(_)
            | Command::PipelineBarrier(_)
            | Command::SetEvent { .. }
            | Command::ResetEvent { .. }
            | Command::WaitEvents { .. }
            | Command::BeginRenderPass(_)
            | Command::NextSubpass
            | Command::EndRenderPass => {}
        }

        Ok(usages)
    }
}

/// One access of a command to some ranges of a resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Usage {
    pub(crate) resource: ResourceId,
    pub(crate) ranges: Vec<Range<DeviceSize>>,
    pub(crate) access: AccessType,
    pub(crate) ordering: SyncOrdering,
}

impl Usage {
    #[inline]
    pub(crate) fn new(
        resource: ResourceId,
        ranges: impl IntoIterator<Item = Range<DeviceSize>>,
        access: AccessType,
    ) -> Self {
        Usage {
            resource,
            ranges: ranges.into_iter().collect(),
            access,
            ordering: SyncOrdering::NonAttachment,
        }
    }

    #[inline]
    pub(crate) fn with_ordering(mut self, ordering: SyncOrdering) -> Self {
        self.ordering = ordering;
        self
    }
}

/// A range of a buffer, in bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferRange {
    pub buffer: ResourceId,
    pub range: Range<DeviceSize>,
}

impl BufferRange {
    #[inline]
    pub fn new(buffer: ResourceId, range: Range<DeviceSize>) -> Self {
        BufferRange { buffer, range }
    }

    fn usage(&self, resources: &Resources, access: AccessType) -> Result<Usage, SyncValError> {
        Ok(Usage::new(
            self.buffer,
            resources.buffer_ranges(self.buffer, self.range.clone())?,
            access,
        ))
    }
}

/// Parameters to copy data from a buffer to another buffer.
///
/// The fields of `regions` represent bytes.
#[derive(Clone, Debug)]
pub struct CopyBufferInfo {
    /// The buffer to copy from.
    ///
    /// There is no default value.
    pub src_buffer: ResourceId,

    /// The buffer to copy to.
    ///
    /// There is no default value.
    pub dst_buffer: ResourceId,

    /// The regions of both buffers to copy between, specified in bytes.
    ///
    /// The default value is a single region, with zero offsets and a `size` of [`WHOLE_SIZE`],
    /// which copies as much as fits in both buffers.
    pub regions: SmallVec<[BufferCopy; 1]>,

    pub _ne: crate::NonExhaustive,
}

/// A `size` that extends to the end of the buffers.
pub const WHOLE_SIZE: DeviceSize = ash::vk::WHOLE_SIZE;

impl CopyBufferInfo {
    /// Returns a `CopyBufferInfo` with the specified `src_buffer` and `dst_buffer`.
    #[inline]
    pub fn buffers(src_buffer: ResourceId, dst_buffer: ResourceId) -> Self {
        Self {
            src_buffer,
            dst_buffer,
            regions: smallvec::smallvec![BufferCopy {
                size: WHOLE_SIZE,
                ..Default::default()
            }],
            _ne: crate::NE,
        }
    }

    fn usages(&self, resources: &Resources, usages: &mut Vec<Usage>) -> Result<(), SyncValError> {
        let src_size = resources.buffer(self.src_buffer)?.size();
        let dst_size = resources.buffer(self.dst_buffer)?.size();

        for region in &self.regions {
            let size = if region.size == WHOLE_SIZE {
                src_size
                    .saturating_sub(region.src_offset)
                    .min(dst_size.saturating_sub(region.dst_offset))
            } else {
                region.size
            };

            usages.push(Usage::new(
                self.src_buffer,
                resources.buffer_ranges(self.src_buffer, byte_range(region.src_offset, size))?,
                AccessType::TransferTransferRead,
            ));
            usages.push(Usage::new(
                self.dst_buffer,
                resources.buffer_ranges(self.dst_buffer, byte_range(region.dst_offset, size))?,
                AccessType::TransferTransferWrite,
            ));
        }

        Ok(())
    }
}

fn byte_range(offset: DeviceSize, size: DeviceSize) -> Range<DeviceSize> {
    offset..offset.saturating_add(size)
}

/// A region of data to copy between buffers.
#[derive(Clone, Debug)]
pub struct BufferCopy {
    /// The offset in bytes or elements from the start of `src_buffer` that copying will
    /// start from.
    ///
    /// The default value is `0`.
    pub src_offset: DeviceSize,

    /// The offset in bytes or elements from the start of `dst_buffer` that copying will
    /// start from.
    ///
    /// The default value is `0`.
    pub dst_offset: DeviceSize,

    /// The number of bytes or elements to copy.
    ///
    /// The default value is `0`, which must be overridden.
    pub size: DeviceSize,

    pub _ne: crate::NonExhaustive,
}

impl Default for BufferCopy {
    #[inline]
    fn default() -> Self {
        Self {
            src_offset: 0,
            dst_offset: 0,
            size: 0,
            _ne: crate::NE,
        }
    }
}

/// Parameters to copy data from an image to another image.
#[derive(Clone, Debug)]
pub struct CopyImageInfo {
    /// The image to copy from.
    ///
    /// There is no default value.
    pub src_image: ResourceId,

    /// The image to copy to.
    ///
    /// There is no default value.
    pub dst_image: ResourceId,

    /// The regions of both images to copy between.
    ///
    /// The default value is empty.
    pub regions: SmallVec<[ImageCopy; 1]>,

    pub _ne: crate::NonExhaustive,
}

impl CopyImageInfo {
    /// Returns a `CopyImageInfo` with the specified `src_image` and `dst_image`.
    #[inline]
    pub fn images(src_image: ResourceId, dst_image: ResourceId) -> Self {
        Self {
            src_image,
            dst_image,
            regions: SmallVec::new(),
            _ne: crate::NE,
        }
    }

    fn usages(&self, resources: &Resources, usages: &mut Vec<Usage>) -> Result<(), SyncValError> {
        for region in &self.regions {
            usages.push(Usage::new(
                self.src_image,
                resources.image_region_ranges(
                    self.src_image,
                    &region.src_subresource,
                    region.src_offset,
                    region.extent,
                )?,
                AccessType::TransferTransferRead,
            ));
            usages.push(Usage::new(
                self.dst_image,
                resources.image_region_ranges(
                    self.dst_image,
                    &region.dst_subresource,
                    region.dst_offset,
                    region.extent,
                )?,
                AccessType::TransferTransferWrite,
            ));
        }

        Ok(())
    }
}

/// A region of data to copy between images.
#[derive(Clone, Debug)]
pub struct ImageCopy {
    /// The subresource of `src_image` to copy from.
    ///
    /// The default value is empty, which must be overridden.
    pub src_subresource: ImageSubresourceLayers,

    /// The offset from the zero coordinate of `src_image` that copying will start from.
    ///
    /// The default value is `[0; 3]`.
    pub src_offset: [u32; 3],

    /// The subresource of `dst_image` to copy to.
    ///
    /// The default value is empty, which must be overridden.
    pub dst_subresource: ImageSubresourceLayers,

    /// The offset from the zero coordinate of `dst_image` that copying will start from.
    ///
    /// The default value is `[0; 3]`.
    pub dst_offset: [u32; 3],

    /// The extent of texels to copy.
    ///
    /// The default value is `[0; 3]`, which must be overridden.
    pub extent: [u32; 3],

    pub _ne: crate::NonExhaustive,
}

impl Default for ImageCopy {
    #[inline]
    fn default() -> Self {
        Self {
            src_subresource: ImageSubresourceLayers::default(),
            src_offset: [0; 3],
            dst_subresource: ImageSubresourceLayers::default(),
            dst_offset: [0; 3],
            extent: [0; 3],
            _ne: crate::NE,
        }
    }
}

/// Parameters to copy data from a buffer to an image.
#[derive(Clone, Debug)]
pub struct CopyBufferToImageInfo {
    /// The buffer to copy from.
    ///
    /// There is no default value.
    pub src_buffer: ResourceId,

    /// The image to copy to.
    ///
    /// There is no default value.
    pub dst_image: ResourceId,

    /// The regions of the buffer and image to copy between.
    ///
    /// The default value is empty.
    pub regions: SmallVec<[BufferImageCopy; 1]>,

    pub _ne: crate::NonExhaustive,
}

impl CopyBufferToImageInfo {
    /// Returns a `CopyBufferToImageInfo` with the specified `src_buffer` and `dst_image`.
    #[inline]
    pub fn buffer_image(src_buffer: ResourceId, dst_image: ResourceId) -> Self {
        Self {
            src_buffer,
            dst_image,
            regions: SmallVec::new(),
            _ne: crate::NE,
        }
    }

    fn usages(&self, resources: &Resources, usages: &mut Vec<Usage>) -> Result<(), SyncValError> {
        let texel_size = resources.image(self.dst_image)?.texel_size();

        for region in &self.regions {
            usages.push(Usage::new(
                self.src_buffer,
                resources.buffer_ranges(self.src_buffer, region.buffer_range(texel_size))?,
                AccessType::TransferTransferRead,
            ));
            usages.push(Usage::new(
                self.dst_image,
                resources.image_region_ranges(
                    self.dst_image,
                    &region.image_subresource,
                    region.image_offset,
                    region.image_extent,
                )?,
                AccessType::TransferTransferWrite,
            ));
        }

        Ok(())
    }
}

/// Parameters to copy data from an image to a buffer.
#[derive(Clone, Debug)]
pub struct CopyImageToBufferInfo {
    /// The image to copy from.
    ///
    /// There is no default value.
    pub src_image: ResourceId,

    /// The buffer to copy to.
    ///
    /// There is no default value.
    pub dst_buffer: ResourceId,

    /// The regions of the image and buffer to copy between.
    ///
    /// The default value is empty.
    pub regions: SmallVec<[BufferImageCopy; 1]>,

    pub _ne: crate::NonExhaustive,
}

impl CopyImageToBufferInfo {
    /// Returns a `CopyImageToBufferInfo` with the specified `src_image` and `dst_buffer`.
    #[inline]
    pub fn image_buffer(src_image: ResourceId, dst_buffer: ResourceId) -> Self {
        Self {
            src_image,
            dst_buffer,
            regions: SmallVec::new(),
            _ne: crate::NE,
        }
    }

    fn usages(&self, resources: &Resources, usages: &mut Vec<Usage>) -> Result<(), SyncValError> {
        let texel_size = resources.image(self.src_image)?.texel_size();

        for region in &self.regions {
            usages.push(Usage::new(
                self.src_image,
                resources.image_region_ranges(
                    self.src_image,
                    &region.image_subresource,
                    region.image_offset,
                    region.image_extent,
                )?,
                AccessType::TransferTransferRead,
            ));
            usages.push(Usage::new(
                self.dst_buffer,
                resources.buffer_ranges(self.dst_buffer, region.buffer_range(texel_size))?,
                AccessType::TransferTransferWrite,
            ));
        }

        Ok(())
    }
}

/// A region of data to copy between a buffer and an image.
#[derive(Clone, Debug)]
pub struct BufferImageCopy {
    /// The offset in bytes from the start of the buffer that copying will start from.
    ///
    /// The default value is `0`.
    pub buffer_offset: DeviceSize,

    /// The number of texels between successive rows of image data in the buffer.
    ///
    /// If set to `0`, the width of the image is used.
    ///
    /// The default value is `0`.
    pub buffer_row_length: u32,

    /// The number of rows between successive depth slices of image data in the buffer.
    ///
    /// If set to `0`, the height of the image is used.
    ///
    /// The default value is `0`.
    pub buffer_image_height: u32,

    /// The subresource of the image to copy from/to.
    ///
    /// The default value is empty, which must be overridden.
    pub image_subresource: ImageSubresourceLayers,

    /// The offset from the zero coordinate of the image that copying will start from.
    ///
    /// The default value is `[0; 3]`.
    pub image_offset: [u32; 3],

    /// The extent of texels in the image to copy.
    ///
    /// The default value is `[0; 3]`, which must be overridden.
    pub image_extent: [u32; 3],

    pub _ne: crate::NonExhaustive,
}

impl Default for BufferImageCopy {
    #[inline]
    fn default() -> Self {
        Self {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: ImageSubresourceLayers::default(),
            image_offset: [0; 3],
            image_extent: [0; 3],
            _ne: crate::NE,
        }
    }
}

impl BufferImageCopy {
    // Following
    // https://www.khronos.org/registry/vulkan/specs/1.3-extensions/html/chap20.html#copies-buffers-images-addressing
    fn buffer_range(&self, texel_size: DeviceSize) -> Range<DeviceSize> {
        let &BufferImageCopy {
            buffer_offset,
            mut buffer_row_length,
            mut buffer_image_height,
            ref image_subresource,
            image_offset: _,
            image_extent,
            _ne: _,
        } = self;

        if image_extent.contains(&0) || image_subresource.array_layers.is_empty() {
            return buffer_offset..buffer_offset;
        }

        if buffer_row_length == 0 {
            buffer_row_length = image_extent[0];
        }

        if buffer_image_height == 0 {
            buffer_image_height = image_extent[1];
        }

        let [width, height, depth] = image_extent.map(|e| e as DeviceSize);
        let row_length = buffer_row_length as DeviceSize;
        let image_height = buffer_image_height as DeviceSize;
        let slices = depth
            * (image_subresource.array_layers.end - image_subresource.array_layers.start)
                as DeviceSize;

        let texels = ((slices - 1) * image_height + (height - 1)) * row_length + width;

        byte_range(buffer_offset, texels.saturating_mul(texel_size))
    }
}

/// Parameters to blit image data.
#[derive(Clone, Debug)]
pub struct BlitImageInfo {
    /// The image to blit from.
    ///
    /// There is no default value.
    pub src_image: ResourceId,

    /// The image to blit to.
    ///
    /// There is no default value.
    pub dst_image: ResourceId,

    /// The regions of both images to blit between.
    ///
    /// The default value is empty.
    pub regions: SmallVec<[ImageBlit; 1]>,

    pub _ne: crate::NonExhaustive,
}

impl BlitImageInfo {
    /// Returns a `BlitImageInfo` with the specified `src_image` and `dst_image`.
    #[inline]
    pub fn images(src_image: ResourceId, dst_image: ResourceId) -> Self {
        Self {
            src_image,
            dst_image,
            regions: SmallVec::new(),
            _ne: crate::NE,
        }
    }

    fn usages(&self, resources: &Resources, usages: &mut Vec<Usage>) -> Result<(), SyncValError> {
        for region in &self.regions {
            let (src_offset, src_extent) = corners_to_region(region.src_offsets);
            let (dst_offset, dst_extent) = corners_to_region(region.dst_offsets);

            usages.push(Usage::new(
                self.src_image,
                resources.image_region_ranges(
                    self.src_image,
                    &region.src_subresource,
                    src_offset,
                    src_extent,
                )?,
                AccessType::TransferTransferRead,
            ));
            usages.push(Usage::new(
                self.dst_image,
                resources.image_region_ranges(
                    self.dst_image,
                    &region.dst_subresource,
                    dst_offset,
                    dst_extent,
                )?,
                AccessType::TransferTransferWrite,
            ));
        }

        Ok(())
    }
}

// The corners of a blit region may be given in any order, to mirror the image.
fn corners_to_region(corners: [[u32; 3]; 2]) -> ([u32; 3], [u32; 3]) {
    let [a, b] = corners;
    let offset = [a[0].min(b[0]), a[1].min(b[1]), a[2].min(b[2])];
    let extent = [a[0].abs_diff(b[0]), a[1].abs_diff(b[1]), a[2].abs_diff(b[2])];

    (offset, extent)
}

/// A region of data to blit between images.
#[derive(Clone, Debug)]
pub struct ImageBlit {
    /// The subresource of `src_image` to blit from.
    ///
    /// The default value is empty, which must be overridden.
    pub src_subresource: ImageSubresourceLayers,

    /// The offsets from the zero coordinate of `src_image`, defining two corners of the region
    /// to blit from.
    ///
    /// The default value is `[[0; 3]; 2]`, which must be overridden.
    pub src_offsets: [[u32; 3]; 2],

    /// The subresource of `dst_image` to blit to.
    ///
    /// The default value is empty, which must be overridden.
    pub dst_subresource: ImageSubresourceLayers,

    /// The offset from the zero coordinate of `dst_image` defining two corners of the
    /// region to blit to.
    ///
    /// The default value is `[[0; 3]; 2]`, which must be overridden.
    pub dst_offsets: [[u32; 3]; 2],

    pub _ne: crate::NonExhaustive,
}

impl Default for ImageBlit {
    #[inline]
    fn default() -> Self {
        Self {
            src_subresource: ImageSubresourceLayers::default(),
            src_offsets: [[0; 3]; 2],
            dst_subresource: ImageSubresourceLayers::default(),
            dst_offsets: [[0; 3]; 2],
            _ne: crate::NE,
        }
    }
}

/// Parameters to resolve image data.
#[derive(Clone, Debug)]
pub struct ResolveImageInfo {
    /// The multisampled image to resolve from.
    ///
    /// There is no default value.
    pub src_image: ResourceId,

    /// The non-multisampled image to resolve into.
    ///
    /// There is no default value.
    pub dst_image: ResourceId,

    /// The regions of both images to resolve between.
    ///
    /// The default value is empty.
    pub regions: SmallVec<[ImageCopy; 1]>,

    pub _ne: crate::NonExhaustive,
}

impl ResolveImageInfo {
    /// Returns a `ResolveImageInfo` with the specified `src_image` and `dst_image`.
    #[inline]
    pub fn images(src_image: ResourceId, dst_image: ResourceId) -> Self {
        Self {
            src_image,
            dst_image,
            regions: SmallVec::new(),
            _ne: crate::NE,
        }
    }

    fn usages(&self, resources: &Resources, usages: &mut Vec<Usage>) -> Result<(), SyncValError> {
        CopyImageInfo {
            src_image: self.src_image,
            dst_image: self.dst_image,
            regions: self.regions.clone(),
            _ne: crate::NE,
        }
        .usages(resources, usages)
    }
}

/// Parameters to clear a color or depth/stencil image.
#[derive(Clone, Debug)]
pub struct ClearImageInfo {
    /// The image to clear.
    ///
    /// There is no default value.
    pub image: ResourceId,

    /// The subresource ranges of the image to clear.
    ///
    /// The default value is empty.
    pub regions: SmallVec<[ImageSubresourceRange; 1]>,

    pub _ne: crate::NonExhaustive,
}

impl ClearImageInfo {
    /// Returns a `ClearImageInfo` with the specified `image`.
    #[inline]
    pub fn image(image: ResourceId) -> Self {
        Self {
            image,
            regions: SmallVec::new(),
            _ne: crate::NE,
        }
    }
}

/// Parameters to clear attachments of the current subpass.
#[derive(Clone, Debug, Default)]
pub struct ClearAttachmentsInfo {
    /// The attachments to clear.
    pub attachments: SmallVec<[ClearAttachment; 4]>,

    /// The rectangles to clear, in every attachment.
    pub rects: SmallVec<[ClearRect; 4]>,
}

/// An attachment of the current subpass to clear.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearAttachment {
    /// The color attachment at the given index of the subpass's `color_attachments`.
    Color { color_attachment: u32 },

    /// The depth aspect of the depth/stencil attachment.
    Depth,

    /// The stencil aspect of the depth/stencil attachment.
    Stencil,

    /// Both aspects of the depth/stencil attachment.
    DepthStencil,
}

/// A rectangle of attachments to clear.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClearRect {
    /// The offset of the rectangle, in framebuffer coordinates.
    pub offset: [u32; 2],

    /// The extent of the rectangle.
    pub extent: [u32; 2],

    /// The layers of the attachments to clear, relative to the first layer of each attachment.
    pub array_layers: Range<u32>,
}

impl Default for ClearRect {
    #[inline]
    fn default() -> Self {
        Self {
            offset: [0; 2],
            extent: [0; 2],
            array_layers: 0..1,
        }
    }
}

/// The resources that a draw command reads and writes.
#[derive(Clone, Debug)]
pub struct DrawInfo {
    /// The bound vertex buffers that the draw reads.
    ///
    /// The default value is empty.
    pub vertex_buffers: Vec<BufferRange>,

    /// The bound index buffer. Only indexed draws read it.
    ///
    /// The default value is `None`.
    pub index_buffer: Option<BufferRange>,

    /// The descriptors that the shaders of the draw access.
    ///
    /// The default value is empty.
    pub descriptors: Vec<DescriptorBinding>,

    /// How the draw accesses the attachments of the current subpass.
    ///
    /// The default value writes the color attachments and doesn't touch the depth/stencil
    /// attachment.
    pub attachments: AttachmentAccess,

    pub _ne: crate::NonExhaustive,
}

impl Default for DrawInfo {
    #[inline]
    fn default() -> Self {
        Self {
            vertex_buffers: Vec::new(),
            index_buffer: None,
            descriptors: Vec::new(),
            attachments: AttachmentAccess::default(),
            _ne: crate::NE,
        }
    }
}

impl DrawInfo {
    fn usages(
        &self,
        resources: &Resources,
        indexed: bool,
        usages: &mut Vec<Usage>,
    ) -> Result<(), SyncValError> {
        if indexed {
            if let Some(index_buffer) = &self.index_buffer {
                usages.push(index_buffer.usage(resources, AccessType::VertexInputIndexRead)?);
            }
        }

        for vertex_buffer in &self.vertex_buffers {
            usages.push(
                vertex_buffer.usage(resources, AccessType::VertexInputVertexAttributeRead)?,
            );
        }

        descriptor_usages(resources, &self.descriptors, false, usages)
    }
}

/// The fixed-function accesses of a draw to the attachments of the current subpass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AttachmentAccess {
    /// Whether the color attachments are written.
    ///
    /// The default value is `true`.
    pub color_write: bool,

    /// Whether the depth test reads the depth aspect.
    ///
    /// The default value is `false`.
    pub depth_test: bool,

    /// Whether the depth aspect is written.
    ///
    /// The default value is `false`.
    pub depth_write: bool,

    /// Whether the stencil test reads the stencil aspect.
    ///
    /// The default value is `false`.
    pub stencil_test: bool,

    /// Whether the stencil aspect is written.
    ///
    /// The default value is `false`.
    pub stencil_write: bool,
}

impl Default for AttachmentAccess {
    #[inline]
    fn default() -> Self {
        Self {
            color_write: true,
            depth_test: false,
            depth_write: false,
            stencil_test: false,
            stencil_write: false,
        }
    }
}

vulkan_enum! {
    /// Describes what kind of resource a descriptor refers to.
    DescriptorType = DescriptorType(i32);

    /// An image that is sampled, together with a sampler.
    CombinedImageSampler = COMBINED_IMAGE_SAMPLER,

    /// An image that is sampled.
    SampledImage = SAMPLED_IMAGE,

    /// An image that is read or written directly.
    StorageImage = STORAGE_IMAGE,

    /// A buffer viewed as texels, that is read.
    UniformTexelBuffer = UNIFORM_TEXEL_BUFFER,

    /// A buffer viewed as texels, that is read or written.
    StorageTexelBuffer = STORAGE_TEXEL_BUFFER,

    /// A buffer of uniform data.
    UniformBuffer = UNIFORM_BUFFER,

    /// A buffer that is read or written directly.
    StorageBuffer = STORAGE_BUFFER,

    /// An attachment of the current subpass, read at the same pixel by a fragment shader.
    InputAttachment = INPUT_ATTACHMENT,
}

/// A resource bound to a descriptor and accessed by shaders.
#[derive(Clone, Debug)]
pub struct DescriptorBinding {
    pub descriptor_type: DescriptorType,

    /// The shader stages that access the descriptor. Dispatches always access it in the
    /// `COMPUTE_SHADER` stage.
    pub stages: PipelineStages,

    pub resource: DescriptorResource,

    /// For storage descriptors, whether the shaders write to the resource. Written storage
    /// descriptors are treated as written only, like the shaders would do.
    pub write: bool,
}

/// The resource bound to a descriptor.
#[derive(Clone, Debug)]
pub enum DescriptorResource {
    Buffer(BufferRange),
    Image {
        image: ResourceId,
        subresource_range: ImageSubresourceRange,
    },
}

impl DescriptorBinding {
    fn access_flags(&self) -> AccessFlags {
        match self.descriptor_type {
            DescriptorType::UniformBuffer => AccessFlags::UNIFORM_READ,
            DescriptorType::InputAttachment => AccessFlags::INPUT_ATTACHMENT_READ,
            DescriptorType::StorageImage
            | DescriptorType::StorageTexelBuffer
            | DescriptorType::StorageBuffer
                if self.write =>
            {
                AccessFlags::SHADER_WRITE
            }
            _ => AccessFlags::SHADER_READ,
        }
    }
}

fn descriptor_usages(
    resources: &Resources,
    descriptors: &[DescriptorBinding],
    compute: bool,
    usages: &mut Vec<Usage>,
) -> Result<(), SyncValError> {
    for descriptor in descriptors {
        let (resource, ranges) = match &descriptor.resource {
            DescriptorResource::Buffer(buffer_range) => (
                buffer_range.buffer,
                resources
                    .buffer_ranges(buffer_range.buffer, buffer_range.range.clone())?
                    .into_vec(),
            ),
            DescriptorResource::Image {
                image,
                subresource_range,
            } => (
                *image,
                resources.image_subresource_ranges(*image, subresource_range)?,
            ),
        };

        let stages = if compute {
            PipelineStages::COMPUTE_SHADER
        } else if descriptor.descriptor_type == DescriptorType::InputAttachment {
            PipelineStages::FRAGMENT_SHADER
        } else {
            descriptor.stages & PipelineStages::GRAPHICS_STAGES
        };
        let ordering = if descriptor.descriptor_type == DescriptorType::InputAttachment {
            SyncOrdering::Raster
        } else {
            SyncOrdering::NonAttachment
        };
        let access_flags = descriptor.access_flags();

        for stage in stages.iter() {
            if let Some(access) = AccessType::shader(stage, access_flags) {
                usages.push(
                    Usage::new(resource, ranges.iter().cloned(), access).with_ordering(ordering),
                );
            }
        }
    }

    Ok(())
}

/// An explicitly described access, for commands that aren't otherwise modeled.
#[derive(Clone, Debug)]
pub struct ResourceAccess {
    pub resource: ResourceId,
    pub range: AccessRange,
    pub access: AccessType,
}

/// The part of a resource that a [`ResourceAccess`] touches.
#[derive(Clone, Debug)]
pub enum AccessRange {
    /// A range of a buffer, in bytes.
    Buffer(Range<DeviceSize>),

    /// Whole subresources of an image.
    ImageSubresources(ImageSubresourceRange),

    /// A region of texels of an image.
    ImageRegion {
        subresource: ImageSubresourceLayers,
        offset: [u32; 3],
        extent: [u32; 3],
    },
}

impl ResourceAccess {
    fn usage(&self, resources: &Resources) -> Result<Usage, SyncValError> {
        let ranges = match &self.range {
            AccessRange::Buffer(range) => resources
                .buffer_ranges(self.resource, range.clone())?
                .into_vec(),
            AccessRange::ImageSubresources(subresource_range) => {
                resources.image_subresource_ranges(self.resource, subresource_range)?
            }
            AccessRange::ImageRegion {
                subresource,
                offset,
                extent,
            } => resources.image_region_ranges(self.resource, subresource, *offset, *extent)?,
        };

        Ok(Usage::new(self.resource, ranges, self.access))
    }
}
