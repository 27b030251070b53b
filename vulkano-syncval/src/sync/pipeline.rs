// Copyright (c) 2017 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

vulkan_bitflags! {
    /// A set of stages in a device queue.
    PipelineStages impl {
        /// Replaces the `ALL_COMMANDS` and `ALL_GRAPHICS` meta-stages with the individual stages
        /// that they stand for.
        #[inline]
        pub const fn expand(self) -> Self {
            let mut result = self.difference(Self::ALL_COMMANDS.union(Self::ALL_GRAPHICS));

            if self.intersects(Self::ALL_COMMANDS) {
                result = result.union(Self::ALL_QUEUE_STAGES);
            } else if self.intersects(Self::ALL_GRAPHICS) {
                result = result.union(Self::GRAPHICS_STAGES);
            }

            result
        }

        /// Returns `self` with all stages that come logically earlier than one of its stages, in
        /// any pipeline that the stage is part of.
        ///
        /// This is the extent of a source execution scope.
        #[inline]
        pub fn with_earlier_stages(self) -> Self {
            let stages = self.expand();
            let mut result = stages;

            for order in STAGE_ORDERS {
                for (index, &stage) in order.iter().enumerate() {
                    if stages.intersects(stage) {
                        for &earlier in &order[..index] {
                            result |= earlier;
                        }
                    }
                }
            }

            result
        }

        /// Returns `self` with all stages that come logically later than one of its stages, in
        /// any pipeline that the stage is part of.
        ///
        /// This is the extent of a destination execution scope.
        #[inline]
        pub fn with_later_stages(self) -> Self {
            let stages = self.expand();
            let mut result = stages;

            for order in STAGE_ORDERS {
                for (index, &stage) in order.iter().enumerate() {
                    if stages.intersects(stage) {
                        for &later in &order[index + 1..] {
                            result |= later;
                        }
                    }
                }
            }

            result
        }
    }
    = PipelineStageFlags(u32);

    /// The start of the pipeline. No work happens in this stage.
    TOP_OF_PIPE = TOP_OF_PIPE,

    /// Indirect command arguments are read.
    DRAW_INDIRECT = DRAW_INDIRECT,

    /// Vertex and index buffers are read.
    VERTEX_INPUT = VERTEX_INPUT,

    VERTEX_SHADER = VERTEX_SHADER,

    TESSELLATION_CONTROL_SHADER = TESSELLATION_CONTROL_SHADER,

    TESSELLATION_EVALUATION_SHADER = TESSELLATION_EVALUATION_SHADER,

    GEOMETRY_SHADER = GEOMETRY_SHADER,

    FRAGMENT_SHADER = FRAGMENT_SHADER,

    /// Early fragment tests, including the depth/stencil load operations of a subpass.
    EARLY_FRAGMENT_TESTS = EARLY_FRAGMENT_TESTS,

    /// Late fragment tests, including the depth/stencil store operations of a subpass.
    LATE_FRAGMENT_TESTS = LATE_FRAGMENT_TESTS,

    /// Color blending and the color load, store and resolve operations of a subpass.
    COLOR_ATTACHMENT_OUTPUT = COLOR_ATTACHMENT_OUTPUT,

    COMPUTE_SHADER = COMPUTE_SHADER,

    /// Copy, blit, resolve, fill, update and clear commands outside of a render pass.
    TRANSFER = TRANSFER,

    /// The end of the pipeline. No work happens in this stage.
    BOTTOM_OF_PIPE = BOTTOM_OF_PIPE,

    /// Pseudo-stage for host access to device memory.
    HOST = HOST,

    /// All graphics pipeline stages.
    ALL_GRAPHICS = ALL_GRAPHICS,

    /// All stages of all commands supported by the queue.
    ALL_COMMANDS = ALL_COMMANDS,
}

impl PipelineStages {
    /// The individual stages that `ALL_GRAPHICS` stands for.
    pub const GRAPHICS_STAGES: Self = Self::DRAW_INDIRECT
        .union(Self::VERTEX_INPUT)
        .union(Self::VERTEX_SHADER)
        .union(Self::TESSELLATION_CONTROL_SHADER)
        .union(Self::TESSELLATION_EVALUATION_SHADER)
        .union(Self::GEOMETRY_SHADER)
        .union(Self::FRAGMENT_SHADER)
        .union(Self::EARLY_FRAGMENT_TESTS)
        .union(Self::LATE_FRAGMENT_TESTS)
        .union(Self::COLOR_ATTACHMENT_OUTPUT);

    /// The individual stages that `ALL_COMMANDS` stands for.
    pub const ALL_QUEUE_STAGES: Self = Self::TOP_OF_PIPE
        .union(Self::GRAPHICS_STAGES)
        .union(Self::COMPUTE_SHADER)
        .union(Self::TRANSFER)
        .union(Self::BOTTOM_OF_PIPE);
}

const GRAPHICS_ORDER: [PipelineStages; 12] = [
    PipelineStages::TOP_OF_PIPE,
    PipelineStages::DRAW_INDIRECT,
    PipelineStages::VERTEX_INPUT,
    PipelineStages::VERTEX_SHADER,
    PipelineStages::TESSELLATION_CONTROL_SHADER,
    PipelineStages::TESSELLATION_EVALUATION_SHADER,
    PipelineStages::GEOMETRY_SHADER,
    PipelineStages::EARLY_FRAGMENT_TESTS,
    PipelineStages::FRAGMENT_SHADER,
    PipelineStages::LATE_FRAGMENT_TESTS,
    PipelineStages::COLOR_ATTACHMENT_OUTPUT,
    PipelineStages::BOTTOM_OF_PIPE,
];

const COMPUTE_ORDER: [PipelineStages; 4] = [
    PipelineStages::TOP_OF_PIPE,
    PipelineStages::DRAW_INDIRECT,
    PipelineStages::COMPUTE_SHADER,
    PipelineStages::BOTTOM_OF_PIPE,
];

const TRANSFER_ORDER: [PipelineStages; 3] = [
    PipelineStages::TOP_OF_PIPE,
    PipelineStages::TRANSFER,
    PipelineStages::BOTTOM_OF_PIPE,
];

// The host stage is not part of any device pipeline and is only ordered with itself.
const STAGE_ORDERS: [&[PipelineStages]; 3] = [&GRAPHICS_ORDER, &COMPUTE_ORDER, &TRANSFER_ORDER];

vulkan_bitflags! {
    /// A set of memory access types that are included in a memory dependency.
    AccessFlags impl {
        /// Returns whether `self` contains any write access types.
        #[inline]
        pub const fn contains_writes(self) -> bool {
            self.intersects(Self::WRITES)
        }
    }
    = AccessFlags(u32);

    /// Read access to an indirect buffer.
    INDIRECT_COMMAND_READ = INDIRECT_COMMAND_READ,

    /// Read access to an index buffer.
    INDEX_READ = INDEX_READ,

    /// Read access to a vertex buffer.
    VERTEX_ATTRIBUTE_READ = VERTEX_ATTRIBUTE_READ,

    /// Read access to a uniform buffer in a shader.
    UNIFORM_READ = UNIFORM_READ,

    /// Read access to an input attachment in a fragment shader, within a render pass.
    INPUT_ATTACHMENT_READ = INPUT_ATTACHMENT_READ,

    /// Read access to a sampled image, storage image or storage buffer in a shader.
    SHADER_READ = SHADER_READ,

    /// Write access to a storage image or storage buffer in a shader.
    SHADER_WRITE = SHADER_WRITE,

    /// Read access to a color attachment during blending or a load operation.
    COLOR_ATTACHMENT_READ = COLOR_ATTACHMENT_READ,

    /// Write access to a color, resolve attachment during a render pass or a clear, store
    /// operation.
    COLOR_ATTACHMENT_WRITE = COLOR_ATTACHMENT_WRITE,

    /// Read access to a depth/stencil attachment during depth/stencil tests or a load operation.
    DEPTH_STENCIL_ATTACHMENT_READ = DEPTH_STENCIL_ATTACHMENT_READ,

    /// Write access to a depth/stencil attachment during depth/stencil tests or a clear, store
    /// operation.
    DEPTH_STENCIL_ATTACHMENT_WRITE = DEPTH_STENCIL_ATTACHMENT_WRITE,

    /// Read access to a buffer or image in a transfer command.
    TRANSFER_READ = TRANSFER_READ,

    /// Write access to a buffer or image in a transfer command.
    TRANSFER_WRITE = TRANSFER_WRITE,

    /// Read access to memory on the host.
    HOST_READ = HOST_READ,

    /// Write access to memory on the host.
    HOST_WRITE = HOST_WRITE,

    /// Read access to memory of any kind.
    MEMORY_READ = MEMORY_READ,

    /// Write access to memory of any kind.
    MEMORY_WRITE = MEMORY_WRITE,
}

impl AccessFlags {
    /// All access types that write to memory.
    pub const WRITES: Self = Self::SHADER_WRITE
        .union(Self::COLOR_ATTACHMENT_WRITE)
        .union(Self::DEPTH_STENCIL_ATTACHMENT_WRITE)
        .union(Self::TRANSFER_WRITE)
        .union(Self::HOST_WRITE)
        .union(Self::MEMORY_WRITE);

    /// All access types that read from memory.
    pub const READS: Self = Self::all().difference(Self::WRITES);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_meta_stages() {
        assert_eq!(
            PipelineStages::ALL_COMMANDS.expand(),
            PipelineStages::ALL_QUEUE_STAGES,
        );
        assert_eq!(
            PipelineStages::ALL_GRAPHICS.expand(),
            PipelineStages::GRAPHICS_STAGES,
        );
        assert!(!PipelineStages::ALL_COMMANDS.expand().intersects(PipelineStages::HOST));
        assert_eq!(
            (PipelineStages::ALL_GRAPHICS | PipelineStages::TRANSFER).expand(),
            PipelineStages::GRAPHICS_STAGES | PipelineStages::TRANSFER,
        );
    }

    #[test]
    fn earlier_stages() {
        assert_eq!(
            PipelineStages::TOP_OF_PIPE.with_earlier_stages(),
            PipelineStages::TOP_OF_PIPE,
        );
        assert_eq!(
            PipelineStages::TRANSFER.with_earlier_stages(),
            PipelineStages::TOP_OF_PIPE | PipelineStages::TRANSFER,
        );
        assert_eq!(
            PipelineStages::FRAGMENT_SHADER.with_earlier_stages(),
            PipelineStages::TOP_OF_PIPE
                | PipelineStages::DRAW_INDIRECT
                | PipelineStages::VERTEX_INPUT
                | PipelineStages::VERTEX_SHADER
                | PipelineStages::TESSELLATION_CONTROL_SHADER
                | PipelineStages::TESSELLATION_EVALUATION_SHADER
                | PipelineStages::GEOMETRY_SHADER
                | PipelineStages::EARLY_FRAGMENT_TESTS
                | PipelineStages::FRAGMENT_SHADER,
        );
        assert_eq!(
            PipelineStages::BOTTOM_OF_PIPE.with_earlier_stages(),
            PipelineStages::ALL_QUEUE_STAGES,
        );
        assert_eq!(PipelineStages::HOST.with_earlier_stages(), PipelineStages::HOST);
    }

    #[test]
    fn later_stages() {
        assert_eq!(
            PipelineStages::TOP_OF_PIPE.with_later_stages(),
            PipelineStages::ALL_QUEUE_STAGES,
        );
        assert_eq!(
            PipelineStages::COMPUTE_SHADER.with_later_stages(),
            PipelineStages::COMPUTE_SHADER | PipelineStages::BOTTOM_OF_PIPE,
        );
        assert_eq!(
            PipelineStages::LATE_FRAGMENT_TESTS.with_later_stages(),
            PipelineStages::LATE_FRAGMENT_TESTS
                | PipelineStages::COLOR_ATTACHMENT_OUTPUT
                | PipelineStages::BOTTOM_OF_PIPE,
        );
        assert_eq!(
            PipelineStages::BOTTOM_OF_PIPE.with_later_stages(),
            PipelineStages::BOTTOM_OF_PIPE,
        );
    }

    #[test]
    fn ash_round_trip() {
        let stages = PipelineStages::TRANSFER | PipelineStages::HOST;
        let raw = ash::vk::PipelineStageFlags::from(stages);
        assert_eq!(
            raw,
            ash::vk::PipelineStageFlags::TRANSFER | ash::vk::PipelineStageFlags::HOST,
        );
        assert_eq!(PipelineStages::from(raw), stages);
        assert!(AccessFlags::READS.contains(AccessFlags::MEMORY_READ));
        assert!(!AccessFlags::READS.contains_writes());
    }
}
