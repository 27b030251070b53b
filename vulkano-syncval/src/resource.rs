// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The registry of resources that commands refer to.
//!
//! Every resource is tracked over a single linear address space. For a buffer this is simply its
//! byte range. For an image, the subresources are laid out one after the other, ordered by aspect,
//! then mip level, then array layer, and each subresource is a grid of texels the size of mip level
//! 0. Rows of texels touched by a region therefore map to contiguous ranges, and a region spanning
//! the full width of a subresource collapses into a single range.

use crate::{sync::EventId, DeviceSize, SyncValError};
use smallvec::SmallVec;
use std::ops::Range;

/// Identifies a resource in a [`Resources`] registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceId(u32);

impl ResourceId {
    /// An ID that never refers to a resource.
    pub const INVALID: Self = ResourceId(u32::MAX);

    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// The kind of a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResourceKind {
    Buffer,
    Image,
}

vulkan_bitflags! {
    /// An individual data type within an image.
    ImageAspects = ImageAspectFlags(u32);

    /// The single aspect of images with a color format.
    COLOR = COLOR,

    /// The depth component of a depth/stencil format.
    DEPTH = DEPTH,

    /// The stencil component of a depth/stencil format.
    STENCIL = STENCIL,
}

vulkan_enum! {
    /// In-memory layout of the pixel data of an image.
    ImageLayout = ImageLayout(i32);

    /// The layout of the data is unknown, and the image is treated as containing no valid data.
    Undefined = UNDEFINED,

    /// A layout that supports all accesses, but may be less efficient than a specialized one.
    General = GENERAL,

    ColorAttachmentOptimal = COLOR_ATTACHMENT_OPTIMAL,

    DepthStencilAttachmentOptimal = DEPTH_STENCIL_ATTACHMENT_OPTIMAL,

    DepthStencilReadOnlyOptimal = DEPTH_STENCIL_READ_ONLY_OPTIMAL,

    ShaderReadOnlyOptimal = SHADER_READ_ONLY_OPTIMAL,

    TransferSrcOptimal = TRANSFER_SRC_OPTIMAL,

    TransferDstOptimal = TRANSFER_DST_OPTIMAL,

    /// The layout of the data is host-defined and its contents are preserved.
    Preinitialized = PREINITIALIZED,

    PresentSrc = PRESENT_SRC_KHR,
}

impl Default for ImageLayout {
    #[inline]
    fn default() -> Self {
        ImageLayout::Undefined
    }
}

/// Parameters to register a buffer.
#[derive(Clone, Debug)]
pub struct BufferCreateInfo {
    /// The size in bytes of the buffer.
    ///
    /// The default value is `0`, which must be overridden.
    pub size: DeviceSize,

    pub _ne: crate::NonExhaustive,
}

impl Default for BufferCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            size: 0,
            _ne: crate::NE,
        }
    }
}

/// Parameters to register an image.
#[derive(Clone, Debug)]
pub struct ImageCreateInfo {
    /// The aspects that the format of the image has.
    ///
    /// The default value is [`ImageAspects::COLOR`].
    pub aspects: ImageAspects,

    /// The width, height and depth of mip level 0.
    ///
    /// The default value is `[0; 3]`, which must be overridden.
    pub extent: [u32; 3],

    /// The number of mip levels.
    ///
    /// The default value is `1`.
    pub mip_levels: u32,

    /// The number of array layers.
    ///
    /// The default value is `1`.
    pub array_layers: u32,

    /// The size in bytes of one texel, used to compute the buffer footprint of buffer/image
    /// copies.
    ///
    /// The default value is `4`.
    pub texel_size: DeviceSize,

    pub _ne: crate::NonExhaustive,
}

impl Default for ImageCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            aspects: ImageAspects::COLOR,
            extent: [0; 3],
            mip_levels: 1,
            array_layers: 1,
            texel_size: 4,
            _ne: crate::NE,
        }
    }
}

/// Describes a range of subresources of an image.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageSubresourceRange {
    /// The aspects of the image to include.
    pub aspects: ImageAspects,

    /// The range of mip levels to include.
    pub mip_levels: Range<u32>,

    /// The range of array layers to include.
    pub array_layers: Range<u32>,
}

/// Describes a range of array layers of a single mip level of an image.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageSubresourceLayers {
    /// The aspects of the image to include.
    pub aspects: ImageAspects,

    /// The mip level to select.
    pub mip_level: u32,

    /// The range of array layers to include.
    pub array_layers: Range<u32>,
}

impl From<ImageSubresourceLayers> for ImageSubresourceRange {
    #[inline]
    fn from(val: ImageSubresourceLayers) -> Self {
        Self {
            aspects: val.aspects,
            mip_levels: val.mip_level..val.mip_level + 1,
            array_layers: val.array_layers,
        }
    }
}

/// The tracked layout of a registered buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferInfo {
    size: DeviceSize,
}

impl BufferInfo {
    #[inline]
    pub fn size(&self) -> DeviceSize {
        self.size
    }

    /// Returns the byte range `offset..offset + size`, checking that it is inside the buffer.
    pub fn range(
        &self,
        offset: DeviceSize,
        size: DeviceSize,
    ) -> Result<Range<DeviceSize>, &'static str> {
        let end = offset
            .checked_add(size)
            .ok_or("the end of the range overflows")?;

        if end > self.size {
            return Err("the range exceeds the size of the buffer");
        }

        Ok(offset..end)
    }

    /// Returns the whole range of the buffer.
    #[inline]
    pub fn whole_range(&self) -> Range<DeviceSize> {
        0..self.size
    }
}

/// The tracked layout of a registered image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageInfo {
    aspects: ImageAspects,
    extent: [u32; 3],
    mip_levels: u32,
    array_layers: u32,
    texel_size: DeviceSize,
}

impl ImageInfo {
    #[inline]
    pub fn aspects(&self) -> ImageAspects {
        self.aspects
    }

    #[inline]
    pub fn extent(&self) -> [u32; 3] {
        self.extent
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    #[inline]
    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }

    #[inline]
    pub fn texel_size(&self) -> DeviceSize {
        self.texel_size
    }

    /// Returns the subresource range covering the whole image.
    #[inline]
    pub fn subresource_range(&self) -> ImageSubresourceRange {
        ImageSubresourceRange {
            aspects: self.aspects,
            mip_levels: 0..self.mip_levels,
            array_layers: 0..self.array_layers,
        }
    }

    /// Returns the extent of the given mip level.
    pub fn mip_level_extent(&self, mip_level: u32) -> [u32; 3] {
        self.extent.map(|e| e.checked_shr(mip_level).unwrap_or(0).max(1))
    }

    fn texels_per_subresource(&self) -> DeviceSize {
        self.extent.iter().map(|&e| e as DeviceSize).product()
    }

    fn aspect_index(&self, aspect: ImageAspects) -> DeviceSize {
        self.aspects
            .iter()
            .take_while(|&a| a != aspect)
            .count() as DeviceSize
    }

    fn subresource_base(
        &self,
        aspect: ImageAspects,
        mip_level: u32,
        array_layer: u32,
    ) -> DeviceSize {
        let subresource = (self.aspect_index(aspect) * self.mip_levels as DeviceSize
            + mip_level as DeviceSize)
            * self.array_layers as DeviceSize
            + array_layer as DeviceSize;

        subresource * self.texels_per_subresource()
    }

    /// Returns the size of the whole address space of the image.
    pub fn address_space_size(&self) -> DeviceSize {
        self.aspects.count() as DeviceSize
            * self.mip_levels as DeviceSize
            * self.array_layers as DeviceSize
            * self.texels_per_subresource()
    }

    fn check_aspects(&self, aspects: ImageAspects) -> Result<(), &'static str> {
        if aspects.is_empty() {
            return Err("no aspects were selected");
        }

        if !self.aspects.contains(aspects) {
            return Err("an aspect was selected that the image doesn't have");
        }

        Ok(())
    }

    /// Returns the ranges of the address space covered by `subresource_range`.
    pub fn subresource_range_ranges(
        &self,
        subresource_range: &ImageSubresourceRange,
    ) -> Result<Vec<Range<DeviceSize>>, &'static str> {
        self.check_aspects(subresource_range.aspects)?;

        if subresource_range.mip_levels.end > self.mip_levels
            || subresource_range.mip_levels.is_empty()
        {
            return Err("the mip level range is empty or exceeds the image");
        }

        if subresource_range.array_layers.end > self.array_layers
            || subresource_range.array_layers.is_empty()
        {
            return Err("the array layer range is empty or exceeds the image");
        }

        let mut ranges = RangeAccumulator::default();

        for aspect in subresource_range.aspects.iter() {
            for mip_level in subresource_range.mip_levels.clone() {
                let start = self.subresource_base(
                    aspect,
                    mip_level,
                    subresource_range.array_layers.start,
                );
                let end =
                    self.subresource_base(aspect, mip_level, subresource_range.array_layers.end);
                ranges.push(start..end);
            }
        }

        Ok(ranges.into_vec())
    }

    /// Returns the ranges of the address space covered by the texels of a region of
    /// `subresource`, with `offset` and `extent` given in texels of the selected mip level.
    pub fn region_ranges(
        &self,
        subresource: &ImageSubresourceLayers,
        offset: [u32; 3],
        extent: [u32; 3],
    ) -> Result<Vec<Range<DeviceSize>>, &'static str> {
        self.check_aspects(subresource.aspects)?;

        if subresource.mip_level >= self.mip_levels {
            return Err("the mip level exceeds the image");
        }

        if subresource.array_layers.end > self.array_layers
            || subresource.array_layers.is_empty()
        {
            return Err("the array layer range is empty or exceeds the image");
        }

        let mip_extent = self.mip_level_extent(subresource.mip_level);

        for i in 0..3 {
            if offset[i] as u64 + extent[i] as u64 > mip_extent[i] as u64 {
                return Err("the region exceeds the extent of the mip level");
            }
        }

        let [width, height, _] = self.extent.map(|e| e as DeviceSize);
        let mut ranges = RangeAccumulator::default();

        for aspect in subresource.aspects.iter() {
            for array_layer in subresource.array_layers.clone() {
                let base = self.subresource_base(aspect, subresource.mip_level, array_layer);

                for z in offset[2]..offset[2] + extent[2] {
                    for y in offset[1]..offset[1] + extent[1] {
                        let row = base + (z as DeviceSize * height + y as DeviceSize) * width;
                        let start = row + offset[0] as DeviceSize;
                        ranges.push(start..start + extent[0] as DeviceSize);
                    }
                }
            }
        }

        Ok(ranges.into_vec())
    }
}

/// Collects ranges in ascending order, joining each one with the previous one when they touch.
#[derive(Default)]
struct RangeAccumulator {
    ranges: Vec<Range<DeviceSize>>,
}

impl RangeAccumulator {
    fn push(&mut self, range: Range<DeviceSize>) {
        if range.is_empty() {
            return;
        }

        match self.ranges.last_mut() {
            Some(last) if last.end == range.start => last.end = range.end,
            _ => self.ranges.push(range),
        }
    }

    fn into_vec(self) -> Vec<Range<DeviceSize>> {
        self.ranges
    }
}

/// A registered resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceInfo {
    Buffer(BufferInfo),
    Image(ImageInfo),
}

impl ResourceInfo {
    #[inline]
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceInfo::Buffer(_) => ResourceKind::Buffer,
            ResourceInfo::Image(_) => ResourceKind::Image,
        }
    }
}

/// The registry of resources of one analysis session.
///
/// Commands only carry [`ResourceId`]s, which the validator resolves into address ranges through
/// this registry.
#[derive(Clone, Debug, Default)]
pub struct Resources {
    resources: Vec<ResourceInfo>,
    event_count: u32,
}

impl Resources {
    /// Returns an empty registry.
    #[inline]
    pub fn new() -> Self {
        Resources::default()
    }

    /// Registers a new buffer.
    pub fn create_buffer(&mut self, create_info: BufferCreateInfo) -> ResourceId {
        let BufferCreateInfo { size, _ne: _ } = create_info;

        self.insert(ResourceInfo::Buffer(BufferInfo { size }))
    }

    /// Registers a new image.
    pub fn create_image(&mut self, create_info: ImageCreateInfo) -> ResourceId {
        let ImageCreateInfo {
            aspects,
            extent,
            mip_levels,
            array_layers,
            texel_size,
            _ne: _,
        } = create_info;

        self.insert(ResourceInfo::Image(ImageInfo {
            aspects,
            extent,
            mip_levels,
            array_layers,
            texel_size,
        }))
    }

    /// Registers a new event.
    pub fn create_event(&mut self) -> EventId {
        let id = EventId(self.event_count);
        self.event_count += 1;

        id
    }

    /// Returns whether `event` was registered in this registry.
    #[inline]
    pub fn contains_event(&self, event: EventId) -> bool {
        event.0 < self.event_count
    }

    fn insert(&mut self, info: ResourceInfo) -> ResourceId {
        let id = ResourceId(self.resources.len() as u32);
        self.resources.push(info);

        id
    }

    /// Returns the number of registered resources.
    #[inline]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[inline]
    pub fn get(&self, id: ResourceId) -> Option<&ResourceInfo> {
        self.resources.get(id.0 as usize)
    }

    /// Returns the buffer with the given ID.
    pub fn buffer(&self, id: ResourceId) -> Result<&BufferInfo, SyncValError> {
        match self.get(id) {
            Some(ResourceInfo::Buffer(info)) => Ok(info),
            Some(ResourceInfo::Image(_)) => Err(SyncValError::ResourceKindMismatch {
                resource: id,
                expected: ResourceKind::Buffer,
            }),
            None => Err(SyncValError::UnknownResource { resource: id }),
        }
    }

    /// Returns the image with the given ID.
    pub fn image(&self, id: ResourceId) -> Result<&ImageInfo, SyncValError> {
        match self.get(id) {
            Some(ResourceInfo::Image(info)) => Ok(info),
            Some(ResourceInfo::Buffer(_)) => Err(SyncValError::ResourceKindMismatch {
                resource: id,
                expected: ResourceKind::Image,
            }),
            None => Err(SyncValError::UnknownResource { resource: id }),
        }
    }

    /// Returns the address ranges of `range` of a buffer.
    pub(crate) fn buffer_ranges(
        &self,
        id: ResourceId,
        range: Range<DeviceSize>,
    ) -> Result<SmallVec<[Range<DeviceSize>; 1]>, SyncValError> {
        let info = self.buffer(id)?;

        if range.start > range.end {
            return Err(SyncValError::OutOfBounds {
                resource: id,
                problem: "the start of the range is past its end",
            });
        }

        let range = info
            .range(range.start, range.end - range.start)
            .map_err(|problem| SyncValError::OutOfBounds {
                resource: id,
                problem,
            })?;

        Ok(SmallVec::from_buf([range]))
    }

    /// Returns the address ranges of a subresource range of an image.
    pub(crate) fn image_subresource_ranges(
        &self,
        id: ResourceId,
        subresource_range: &ImageSubresourceRange,
    ) -> Result<Vec<Range<DeviceSize>>, SyncValError> {
        self.image(id)?
            .subresource_range_ranges(subresource_range)
            .map_err(|problem| SyncValError::OutOfBounds {
                resource: id,
                problem,
            })
    }

    /// Returns the address ranges of a region of an image.
    pub(crate) fn image_region_ranges(
        &self,
        id: ResourceId,
        subresource: &ImageSubresourceLayers,
        offset: [u32; 3],
        extent: [u32; 3],
    ) -> Result<Vec<Range<DeviceSize>>, SyncValError> {
        self.image(id)?
            .region_ranges(subresource, offset, extent)
            .map_err(|problem| SyncValError::OutOfBounds {
                resource: id,
                problem,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(resources: &mut Resources, aspects: ImageAspects, layers: u32) -> ResourceId {
        resources.create_image(ImageCreateInfo {
            aspects,
            extent: [32, 32, 1],
            mip_levels: 2,
            array_layers: layers,
            ..Default::default()
        })
    }

    #[test]
    fn buffer_bounds() {
        let mut resources = Resources::new();
        let buffer = resources.create_buffer(BufferCreateInfo {
            size: 256,
            ..Default::default()
        });

        assert_eq!(
            resources.buffer_ranges(buffer, 128..256).unwrap().as_slice(),
            &[128..256],
        );
        assert!(matches!(
            resources.buffer_ranges(buffer, 128..257),
            Err(SyncValError::OutOfBounds { .. }),
        ));
        assert!(matches!(
            resources.image(buffer),
            Err(SyncValError::ResourceKindMismatch { .. }),
        ));
        assert!(matches!(
            resources.buffer(ResourceId::INVALID),
            Err(SyncValError::UnknownResource { .. }),
        ));
    }

    #[test]
    fn whole_subresources_coalesce() {
        let mut resources = Resources::new();
        let id = image(&mut resources, ImageAspects::COLOR, 2);
        let info = resources.image(id).unwrap();

        let ranges = info
            .subresource_range_ranges(&info.subresource_range())
            .unwrap();
        assert_eq!(ranges, vec![0..info.address_space_size()]);
        assert_eq!(info.address_space_size(), 2 * 2 * 32 * 32);

        // Layer 1 of each mip level is a separate range.
        let ranges = info
            .subresource_range_ranges(&ImageSubresourceRange {
                aspects: ImageAspects::COLOR,
                mip_levels: 0..2,
                array_layers: 1..2,
            })
            .unwrap();
        assert_eq!(ranges, vec![1024..2048, 3072..4096]);
    }

    #[test]
    fn half_regions_are_disjoint() {
        let mut resources = Resources::new();
        let id = image(&mut resources, ImageAspects::COLOR, 1);
        let info = resources.image(id).unwrap();
        let layers = ImageSubresourceLayers {
            aspects: ImageAspects::COLOR,
            mip_level: 0,
            array_layers: 0..1,
        };

        let front = info.region_ranges(&layers, [0, 0, 0], [16, 32, 1]).unwrap();
        let back = info.region_ranges(&layers, [16, 0, 0], [16, 32, 1]).unwrap();
        assert_eq!(front.len(), 32);
        assert_eq!(front[1], 32..48);
        assert_eq!(back[1], 48..64);
        assert!(front
            .iter()
            .all(|f| back.iter().all(|b| f.end <= b.start || b.end <= f.start)));

        // Full-width regions collapse into one range.
        let full = info.region_ranges(&layers, [0, 0, 0], [32, 32, 1]).unwrap();
        assert_eq!(full, vec![0..1024]);

        assert!(info.region_ranges(&layers, [16, 0, 0], [17, 32, 1]).is_err());
    }

    #[test]
    fn deep_mip_levels_are_one_texel() {
        let mut resources = Resources::new();
        let id = resources.create_image(ImageCreateInfo {
            extent: [32, 32, 1],
            mip_levels: 40,
            ..Default::default()
        });
        let info = resources.image(id).unwrap();

        assert_eq!(info.mip_level_extent(5), [1, 1, 1]);
        assert_eq!(info.mip_level_extent(32), [1, 1, 1]);
        assert_eq!(info.mip_level_extent(39), [1, 1, 1]);

        let layers = ImageSubresourceLayers {
            aspects: ImageAspects::COLOR,
            mip_level: 35,
            array_layers: 0..1,
        };
        let base = 35 * 32 * 32;
        assert_eq!(
            info.region_ranges(&layers, [0, 0, 0], [1, 1, 1]).unwrap(),
            vec![base..base + 1],
        );
        assert!(info.region_ranges(&layers, [0, 0, 0], [2, 1, 1]).is_err());
    }

    #[test]
    fn depth_stencil_planes() {
        let mut resources = Resources::new();
        let id = image(
            &mut resources,
            ImageAspects::DEPTH | ImageAspects::STENCIL,
            1,
        );
        let info = resources.image(id).unwrap();

        let stencil = info
            .subresource_range_ranges(&ImageSubresourceRange {
                aspects: ImageAspects::STENCIL,
                mip_levels: 0..1,
                array_layers: 0..1,
            })
            .unwrap();
        assert_eq!(stencil, vec![2048..3072]);

        assert!(info
            .subresource_range_ranges(&ImageSubresourceRange {
                aspects: ImageAspects::COLOR,
                mip_levels: 0..1,
                array_layers: 0..1,
            })
            .is_err());
    }
}
