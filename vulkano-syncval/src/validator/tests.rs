// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use super::*;
use crate::{
    command::{
        BufferCopy, ClearAttachment, ClearAttachmentsInfo, ClearImageInfo, ClearRect,
        CopyBufferInfo, CopyImageInfo, DescriptorBinding, DescriptorResource, DescriptorType,
        DrawInfo, ImageCopy,
    },
    hazard::{DependencySource, EventMisuseKind},
    render_pass::{
        AttachmentDescription, AttachmentReference, ImageView, LoadOp, RenderPass,
        RenderPassBeginInfo, RenderPassCreateInfo, StoreOp, SubpassDependency,
        SubpassDescription,
    },
    resource::{
        BufferCreateInfo, ImageAspects, ImageCreateInfo, ImageLayout, ImageSubresourceLayers,
        ImageSubresourceRange,
    },
    sync::{AccessFlags, BufferMemoryBarrier, ImageMemoryBarrier, MemoryBarrier},
};
use smallvec::smallvec;
use std::sync::Arc;

const RAW: &str = "SYNC-HAZARD-READ_AFTER_WRITE";
const WAR: &str = "SYNC-HAZARD-WRITE_AFTER_READ";
const WAW: &str = "SYNC-HAZARD-WRITE_AFTER_WRITE";
const READ_RACING_WRITE: &str = "SYNC-HAZARD-READ-RACING-WRITE";
const WRITE_RACING_WRITE: &str = "SYNC-HAZARD-WRITE-RACING-WRITE";
const WRITE_RACING_READ: &str = "SYNC-HAZARD-WRITE-RACING-READ";

fn codes(reports: &[SyncReport]) -> Vec<&'static str> {
    reports.iter().map(SyncReport::code).collect()
}

fn buffer(resources: &mut Resources, size: DeviceSize) -> ResourceId {
    resources.create_buffer(BufferCreateInfo {
        size,
        ..Default::default()
    })
}

fn image(resources: &mut Resources, extent: u32) -> ResourceId {
    resources.create_image(ImageCreateInfo {
        extent: [extent, extent, 1],
        ..Default::default()
    })
}

fn whole_image(resources: &Resources, image: ResourceId) -> ImageSubresourceRange {
    resources.image(image).unwrap().subresource_range()
}

fn copy(src: ResourceId, dst: ResourceId) -> Command {
    Command::CopyBuffer(CopyBufferInfo::buffers(src, dst))
}

fn copy_region(
    src: ResourceId,
    dst: ResourceId,
    offsets: [DeviceSize; 2],
    size: DeviceSize,
) -> Command {
    Command::CopyBuffer(CopyBufferInfo {
        regions: smallvec![BufferCopy {
            src_offset: offsets[0],
            dst_offset: offsets[1],
            size,
            ..Default::default()
        }],
        ..CopyBufferInfo::buffers(src, dst)
    })
}

fn copy_regions(
    src: ResourceId,
    dst: ResourceId,
    regions: &[([DeviceSize; 2], DeviceSize)],
) -> Command {
    Command::CopyBuffer(CopyBufferInfo {
        regions: regions
            .iter()
            .map(|&(offsets, size)| BufferCopy {
                src_offset: offsets[0],
                dst_offset: offsets[1],
                size,
                ..Default::default()
            })
            .collect(),
        ..CopyBufferInfo::buffers(src, dst)
    })
}

fn copy_image(src: ResourceId, dst: ResourceId, extent: u32) -> Command {
    let layers = ImageSubresourceLayers {
        aspects: ImageAspects::COLOR,
        mip_level: 0,
        array_layers: 0..1,
    };

    Command::CopyImage(CopyImageInfo {
        regions: smallvec![ImageCopy {
            src_subresource: layers.clone(),
            dst_subresource: layers,
            extent: [extent, extent, 1],
            ..Default::default()
        }],
        ..CopyImageInfo::images(src, dst)
    })
}

fn memory_barrier(
    src_stages: PipelineStages,
    src_access: AccessFlags,
    dst_stages: PipelineStages,
    dst_access: AccessFlags,
) -> DependencyInfo {
    DependencyInfo {
        memory_barriers: vec![MemoryBarrier {
            src_stages,
            src_access,
            dst_stages,
            dst_access,
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn execution_barrier(src_stages: PipelineStages, dst_stages: PipelineStages) -> Command {
    Command::PipelineBarrier(memory_barrier(
        src_stages,
        AccessFlags::empty(),
        dst_stages,
        AccessFlags::empty(),
    ))
}

fn set(event: EventId) -> Command {
    Command::SetEvent {
        event,
        stages: PipelineStages::TRANSFER,
    }
}

fn reset(event: EventId) -> Command {
    Command::ResetEvent {
        event,
        stages: PipelineStages::TRANSFER,
    }
}

fn wait(event: EventId, dependency_info: DependencyInfo) -> Command {
    Command::WaitEvents {
        events: smallvec![event],
        dependency_info,
    }
}

fn reference(attachment: u32, layout: ImageLayout) -> Option<AttachmentReference> {
    Some(AttachmentReference {
        attachment,
        layout,
        ..Default::default()
    })
}

fn color_attachment(
    load_op: LoadOp,
    initial_layout: ImageLayout,
    final_layout: ImageLayout,
) -> AttachmentDescription {
    AttachmentDescription {
        load_op,
        store_op: StoreOp::Store,
        initial_layout,
        final_layout,
        ..Default::default()
    }
}

fn dependency(
    src_subpass: Option<u32>,
    dst_subpass: Option<u32>,
    stages: [PipelineStages; 2],
    access: [AccessFlags; 2],
) -> SubpassDependency {
    SubpassDependency {
        src_subpass,
        dst_subpass,
        src_stages: stages[0],
        dst_stages: stages[1],
        src_access: access[0],
        dst_access: access[1],
        ..Default::default()
    }
}

fn begin(
    resources: &Resources,
    render_pass: &Arc<RenderPass>,
    images: &[ResourceId],
) -> Command {
    let attachments = images
        .iter()
        .map(|&image| ImageView::new(image, whole_image(resources, image)))
        .collect();

    Command::BeginRenderPass(RenderPassBeginInfo::new(render_pass.clone(), attachments))
}

fn input_attachment_draw(resources: &Resources, image: ResourceId) -> Command {
    Command::Draw(DrawInfo {
        descriptors: vec![DescriptorBinding {
            descriptor_type: DescriptorType::InputAttachment,
            stages: PipelineStages::FRAGMENT_SHADER,
            resource: DescriptorResource::Image {
                image,
                subresource_range: whole_image(resources, image),
            },
            write: false,
        }],
        ..Default::default()
    })
}

/// A render pass with one color attachment written by a single subpass.
fn single_subpass(load_op: LoadOp) -> Arc<RenderPass> {
    RenderPass::new(RenderPassCreateInfo {
        attachments: vec![color_attachment(
            load_op,
            ImageLayout::Undefined,
            ImageLayout::ColorAttachmentOptimal,
        )],
        subpasses: vec![SubpassDescription {
            color_attachments: vec![reference(0, ImageLayout::ColorAttachmentOptimal)],
            ..Default::default()
        }],
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn write_after_read() {
    let mut resources = Resources::new();
    let a = buffer(&mut resources, 256);
    let b = buffer(&mut resources, 256);
    let c = buffer(&mut resources, 256);
    let mut validator = CommandBufferValidator::new(&resources, Default::default());

    assert!(validator.record(copy(a, b)).unwrap().is_empty());

    let reports = validator.record(copy(c, a)).unwrap();
    assert_eq!(codes(&reports), [WAR]);

    let hazard = reports[0].as_hazard().unwrap();
    assert_eq!(hazard.resource, a);
    assert_eq!(hazard.origin, AccessOrigin::Command);
    assert_eq!(hazard.access, AccessType::TransferTransferWrite);
    assert_eq!(hazard.prior_access, AccessType::TransferTransferRead);
    assert_eq!(hazard.command, CommandRef { index: 1, name: "copy_buffer" });
    assert_eq!(hazard.prior_command, CommandRef { index: 0, name: "copy_buffer" });
    assert_eq!(hazard.dependency, None);

    assert_eq!(validator.command_count(), 2);
    assert_eq!(validator.reports(), &reports[..]);
}

#[test]
fn resolved_sequence_replays_cleanly() {
    let mut resources = Resources::new();
    let a = buffer(&mut resources, 256);
    let b = buffer(&mut resources, 256);
    let c = buffer(&mut resources, 256);
    let sequence = || {
        [
            copy(a, b),
            Command::PipelineBarrier(DependencyInfo {
                buffer_memory_barriers: vec![BufferMemoryBarrier {
                    src_stages: PipelineStages::TRANSFER,
                    src_access: AccessFlags::TRANSFER_READ,
                    dst_stages: PipelineStages::TRANSFER,
                    dst_access: AccessFlags::TRANSFER_WRITE,
                    buffer: a,
                    range: 0..256,
                    ..Default::default()
                }],
                ..Default::default()
            }),
            copy(c, a),
        ]
    };
    let mut validator = CommandBufferValidator::new(&resources, Default::default());

    for _ in 0..2 {
        for command in sequence() {
            assert!(validator.record(command).unwrap().is_empty());
        }

        assert_eq!(validator.command_count(), 3);
        validator.reset();
    }
}

#[test]
fn regions_of_one_copy_hazard_with_each_other() {
    let mut resources = Resources::new();
    let buffers: Vec<_> = (0..5).map(|_| buffer(&mut resources, 256)).collect();
    let mut validator = CommandBufferValidator::new(&resources, Default::default());

    // The second region writes over the end of the first one.
    let reports = validator
        .record(copy_regions(buffers[0], buffers[1], &[([0, 0], 64), ([64, 32], 64)]))
        .unwrap();
    assert_eq!(codes(&reports), [WAW]);

    let hazard = reports[0].as_hazard().unwrap();
    assert_eq!(hazard.resource, buffers[1]);
    assert_eq!(hazard.range, 32..64);
    assert_eq!(hazard.prior_command, hazard.command);

    assert!(validator
        .record(copy_regions(buffers[2], buffers[3], &[([0, 0], 64), ([64, 64], 64)]))
        .unwrap()
        .is_empty());

    // Copying within one buffer writes over what the same region reads.
    let reports = validator
        .record(copy_regions(buffers[4], buffers[4], &[([0, 32], 64)]))
        .unwrap();
    assert_eq!(codes(&reports), [WAR]);
    assert_eq!(reports[0].as_hazard().unwrap().range, 32..64);
}

#[test]
fn execution_barrier_orders_reads_only() {
    let mut resources = Resources::new();
    let a = buffer(&mut resources, 256);
    let b = buffer(&mut resources, 256);
    let c = buffer(&mut resources, 256);
    let mut validator = CommandBufferValidator::new(&resources, Default::default());

    validator.record(copy(a, b)).unwrap();
    let reports = validator
        .record(execution_barrier(PipelineStages::TRANSFER, PipelineStages::TRANSFER))
        .unwrap();
    assert!(reports.is_empty());

    // The read of `a` is ordered, but the write of `b` was never made available.
    assert!(validator.record(copy(c, a)).unwrap().is_empty());
    assert_eq!(codes(&validator.record(copy(c, b)).unwrap()), [WAW]);
}

#[test]
fn hazards_are_tracked_per_range() {
    let mut resources = Resources::new();
    let a = buffer(&mut resources, 256);
    let b = buffer(&mut resources, 256);
    let c = buffer(&mut resources, 256);
    let mut validator = CommandBufferValidator::new(&resources, Default::default());

    validator.record(copy_region(a, b, [0, 0], 128)).unwrap();
    assert!(validator
        .record(copy_region(a, b, [128, 128], 128))
        .unwrap()
        .is_empty());
    assert_eq!(codes(&validator.record(copy(c, b)).unwrap()), [WAW]);
}

#[test]
fn buffer_barrier_covers_only_its_range() {
    let mut resources = Resources::new();
    let a = buffer(&mut resources, 256);
    let b = buffer(&mut resources, 256);
    let mut validator = CommandBufferValidator::new(&resources, Default::default());

    validator.record(copy(a, b)).unwrap();
    validator
        .record(Command::PipelineBarrier(DependencyInfo {
            buffer_memory_barriers: vec![BufferMemoryBarrier {
                src_stages: PipelineStages::TRANSFER,
                src_access: AccessFlags::TRANSFER_WRITE,
                dst_stages: PipelineStages::TRANSFER,
                dst_access: AccessFlags::TRANSFER_WRITE,
                buffer: b,
                range: 0..128,
                ..Default::default()
            }],
            ..Default::default()
        }))
        .unwrap();

    assert!(validator
        .record(copy_region(a, b, [0, 0], 128))
        .unwrap()
        .is_empty());

    let reports = validator.record(copy_region(a, b, [128, 128], 128)).unwrap();
    assert_eq!(codes(&reports), [WAW]);
    assert_eq!(reports[0].as_hazard().unwrap().prior_command.index, 0);
}

#[test]
fn event_wait_orders_commands_before_the_set() {
    let mut resources = Resources::new();
    let a = buffer(&mut resources, 256);
    let b = buffer(&mut resources, 256);
    let c = buffer(&mut resources, 256);
    let event = resources.create_event();
    let mut validator = CommandBufferValidator::new(&resources, Default::default());

    validator.record(copy(a, b)).unwrap();
    validator.record(set(event)).unwrap();
    validator.record(copy_region(a, c, [128, 128], 128)).unwrap();
    let reports = validator
        .record(wait(
            event,
            memory_barrier(
                PipelineStages::TRANSFER,
                AccessFlags::empty(),
                PipelineStages::TRANSFER,
                AccessFlags::empty(),
            ),
        ))
        .unwrap();
    assert!(reports.is_empty());

    // The front of `a` was only read before the event was set.
    assert!(validator
        .record(copy_region(c, a, [0, 0], 128))
        .unwrap()
        .is_empty());

    // The back of `a` was read after the event was set.
    let reports = validator.record(copy_region(c, a, [0, 128], 128)).unwrap();
    assert_eq!(codes(&reports), [WAR]);
    assert_eq!(reports[0].as_hazard().unwrap().prior_command.index, 2);
}

#[test]
fn event_wait_without_memory_dependency() {
    let mut resources = Resources::new();
    let a = buffer(&mut resources, 256);
    let b = buffer(&mut resources, 256);
    let c = buffer(&mut resources, 256);
    let event = resources.create_event();
    let exec_only = || {
        memory_barrier(
            PipelineStages::TRANSFER,
            AccessFlags::empty(),
            PipelineStages::TRANSFER,
            AccessFlags::empty(),
        )
    };

    let mut validator = CommandBufferValidator::new(&resources, Default::default());
    validator.record(copy(a, b)).unwrap();
    validator.record(set(event)).unwrap();
    validator.record(wait(event, exec_only())).unwrap();
    assert!(validator.record(copy(c, a)).unwrap().is_empty());
    assert_eq!(codes(&validator.record(copy(c, b)).unwrap()), [WAW]);

    validator.reset();
    validator.record(copy(a, b)).unwrap();
    validator.record(set(event)).unwrap();
    validator
        .record(wait(
            event,
            memory_barrier(
                PipelineStages::TRANSFER,
                AccessFlags::TRANSFER_WRITE,
                PipelineStages::TRANSFER,
                AccessFlags::TRANSFER_WRITE,
            ),
        ))
        .unwrap();
    assert!(validator.record(copy(c, b)).unwrap().is_empty());
    assert!(validator.record(copy(c, a)).unwrap().is_empty());
}

#[test]
fn event_misuse() {
    let mut resources = Resources::new();
    let event = resources.create_event();
    let all_commands = || {
        Command::PipelineBarrier(memory_barrier(
            PipelineStages::ALL_COMMANDS,
            AccessFlags::empty(),
            PipelineStages::ALL_COMMANDS,
            AccessFlags::empty(),
        ))
    };
    let transfer_wait = |dst_stages| {
        wait(
            event,
            memory_barrier(
                PipelineStages::TRANSFER,
                AccessFlags::empty(),
                dst_stages,
                AccessFlags::empty(),
            ),
        )
    };
    let mut validator = CommandBufferValidator::new(&resources, Default::default());

    assert!(validator.record(reset(event)).unwrap().is_empty());
    let reports = validator
        .record(wait(
            event,
            memory_barrier(
                PipelineStages::ALL_COMMANDS,
                AccessFlags::empty(),
                PipelineStages::TRANSFER,
                AccessFlags::empty(),
            ),
        ))
        .unwrap();
    assert_eq!(
        codes(&reports),
        [
            "VUID-vkCmdResetEvent-event-03834",
            "VUID-vkCmdWaitEvents-srcStageMask-01158",
        ],
    );

    validator.reset();
    validator.record(set(event)).unwrap();
    assert!(validator
        .record(transfer_wait(PipelineStages::FRAGMENT_SHADER))
        .unwrap()
        .is_empty());
    assert_eq!(
        codes(&validator.record(reset(event)).unwrap()),
        ["SYNC-vkCmdResetEvent-missingbarrier-wait"],
    );

    validator.reset();
    validator.record(reset(event)).unwrap();
    let reports = validator.record(set(event)).unwrap();
    assert_eq!(codes(&reports), ["SYNC-vkCmdSetEvent-missingbarrier-reset"]);

    let SyncReport::EventMisuse(misuse) = &reports[0] else {
        panic!("expected an event misuse");
    };
    assert_eq!(misuse.event, event);
    assert_eq!(misuse.kind, EventMisuseKind::SetMissingBarrierAfterReset);
    assert_eq!(misuse.prior_command.map(|command| command.index), Some(0));

    let sequence = [
        all_commands(),
        set(event),
        transfer_wait(PipelineStages::TRANSFER),
        reset(event),
        all_commands(),
        set(event),
    ];
    for command in sequence {
        assert!(validator.record(command).unwrap().is_empty());
    }
    assert_eq!(
        codes(&validator.record(reset(event)).unwrap()),
        ["SYNC-vkCmdResetEvent-missingbarrier-set"],
    );

    validator.reset();
    validator.record(set(event)).unwrap();
    assert_eq!(
        codes(&validator.record(set(event)).unwrap()),
        ["SYNC-vkCmdSetEvent-missingbarrier-set"],
    );
}

#[test]
fn hazardous_access_is_skipped() {
    let mut resources = Resources::new();
    let a = buffer(&mut resources, 256);
    let b = buffer(&mut resources, 256);
    let c = buffer(&mut resources, 256);
    let d = buffer(&mut resources, 256);

    let mut committing = CommandBufferValidator::new(&resources, Default::default());
    committing.record(copy(a, b)).unwrap();
    assert_eq!(codes(&committing.record(copy(c, a)).unwrap()), [WAR]);
    assert_eq!(codes(&committing.record(copy(a, d)).unwrap()), [RAW]);

    let mut skipping = CommandBufferValidator::new(
        &resources,
        SyncValidatorCreateInfo {
            hazard_state_update: HazardStateUpdate::Skip,
            ..Default::default()
        },
    );
    skipping.record(copy(a, b)).unwrap();
    assert_eq!(codes(&skipping.record(copy(c, a)).unwrap()), [WAR]);
    assert!(skipping.record(copy(a, d)).unwrap().is_empty());
}

#[test]
fn max_reports() {
    let mut resources = Resources::new();
    let a = buffer(&mut resources, 256);
    let b = buffer(&mut resources, 256);
    let c = buffer(&mut resources, 256);
    let mut validator = CommandBufferValidator::new(
        &resources,
        SyncValidatorCreateInfo {
            max_reports: Some(1),
            ..Default::default()
        },
    );

    validator.record(copy(a, b)).unwrap();
    assert_eq!(codes(&validator.record(copy(c, a)).unwrap()), [WAR]);
    assert_eq!(codes(&validator.record(copy(c, b)).unwrap()), [WAW]);
    assert_eq!(codes(validator.reports()), [WAR]);
}

#[test]
fn reset_discards_history() {
    let mut resources = Resources::new();
    let a = buffer(&mut resources, 256);
    let b = buffer(&mut resources, 256);
    let c = buffer(&mut resources, 256);
    let mut validator = CommandBufferValidator::new(&resources, Default::default());

    validator.record(copy(a, b)).unwrap();
    validator.record(copy(c, a)).unwrap();
    assert_eq!(validator.reports().len(), 1);

    validator.reset();
    assert_eq!(validator.command_count(), 0);
    assert!(validator.reports().is_empty());
    assert!(validator.record(copy(c, a)).unwrap().is_empty());
}

#[test]
fn malformed_commands() {
    let mut resources = Resources::new();
    let a = buffer(&mut resources, 256);
    let b = buffer(&mut resources, 256);
    let rt = image(&mut resources, 32);
    let mut validator = CommandBufferValidator::new(&resources, Default::default());

    assert!(matches!(
        validator.record(set(EventId(7))),
        Err(SyncValError::UnknownEvent { event: EventId(7) }),
    ));
    assert!(matches!(
        validator.record(copy(a, ResourceId::INVALID)),
        Err(SyncValError::UnknownResource { .. }),
    ));
    assert!(matches!(
        validator.record(Command::NextSubpass),
        Err(SyncValError::NotInRenderPass {
            command: "next_subpass"
        }),
    ));
    assert!(matches!(
        validator.record(Command::EndRenderPass),
        Err(SyncValError::NotInRenderPass { .. }),
    ));

    let render_pass = single_subpass(LoadOp::Clear);
    assert!(matches!(
        validator.record(Command::BeginRenderPass(RenderPassBeginInfo::new(
            render_pass.clone(),
            Vec::new(),
        ))),
        Err(SyncValError::AttachmentCountMismatch {
            required: 1,
            provided: 0,
        }),
    ));
    assert_eq!(validator.command_count(), 0);

    assert!(validator
        .record(begin(&resources, &render_pass, &[rt]))
        .unwrap()
        .is_empty());
    assert!(matches!(
        validator.record(copy(a, b)),
        Err(SyncValError::ForbiddenInsideRenderPass {
            command: "copy_buffer"
        }),
    ));
    assert!(matches!(
        validator.record(Command::NextSubpass),
        Err(SyncValError::NoSubpassesRemaining),
    ));
    assert!(validator.is_in_render_pass());
    assert!(validator.record(Command::EndRenderPass).unwrap().is_empty());
    assert!(!validator.is_in_render_pass());
    assert_eq!(validator.command_count(), 2);
}

#[test]
fn end_before_last_subpass() {
    let mut resources = Resources::new();
    let rt = image(&mut resources, 32);
    let subpass = || SubpassDescription {
        color_attachments: vec![reference(0, ImageLayout::ColorAttachmentOptimal)],
        ..Default::default()
    };
    let render_pass = RenderPass::new(RenderPassCreateInfo {
        attachments: vec![color_attachment(
            LoadOp::Clear,
            ImageLayout::Undefined,
            ImageLayout::ColorAttachmentOptimal,
        )],
        subpasses: vec![subpass(), subpass()],
        dependencies: vec![dependency(
            Some(0),
            Some(1),
            [PipelineStages::COLOR_ATTACHMENT_OUTPUT; 2],
            [AccessFlags::COLOR_ATTACHMENT_WRITE; 2],
        )],
        ..Default::default()
    })
    .unwrap();
    let mut validator = CommandBufferValidator::new(&resources, Default::default());

    validator.record(begin(&resources, &render_pass, &[rt])).unwrap();
    assert!(matches!(
        validator.record(Command::EndRenderPass),
        Err(SyncValError::SubpassesRemaining { remaining: 1 }),
    ));
    assert!(validator.is_in_render_pass());

    assert!(validator.record(Command::NextSubpass).unwrap().is_empty());
    assert!(validator.record(Command::EndRenderPass).unwrap().is_empty());
}

#[test]
fn begin_transition_needs_external_barrier() {
    let mut resources = Resources::new();
    let a = image(&mut resources, 32);
    let b = image(&mut resources, 32);
    let rt0 = image(&mut resources, 32);
    let rt1 = image(&mut resources, 32);
    let attachment =
        || color_attachment(LoadOp::Clear, ImageLayout::Undefined, ImageLayout::General);
    let render_pass = RenderPass::new(RenderPassCreateInfo {
        attachments: vec![attachment(), attachment()],
        subpasses: vec![SubpassDescription {
            color_attachments: vec![
                reference(0, ImageLayout::ColorAttachmentOptimal),
                reference(1, ImageLayout::ColorAttachmentOptimal),
            ],
            ..Default::default()
        }],
        ..Default::default()
    })
    .unwrap();
    let mut validator = CommandBufferValidator::new(&resources, Default::default());

    validator.record(copy_image(a, rt0, 32)).unwrap();
    let reports = validator.record(begin(&resources, &render_pass, &[rt0, rt1])).unwrap();
    assert_eq!(codes(&reports), [WAW]);

    let hazard = reports[0].as_hazard().unwrap();
    assert_eq!(hazard.resource, rt0);
    assert_eq!(hazard.access, AccessType::ImageLayoutTransition);
    assert_eq!(hazard.origin, AccessOrigin::LayoutTransition);
    assert_eq!(hazard.prior_command, CommandRef { index: 0, name: "copy_image" });
    assert_eq!(hazard.dependency, Some(DependencySource::ImplicitExternal));

    // A render pass that failed to begin was never entered.
    assert!(!validator.is_in_render_pass());

    // Chains with the `TOP_OF_PIPE` source scope of the implicit dependency.
    validator
        .record(Command::PipelineBarrier(DependencyInfo {
            image_memory_barriers: vec![ImageMemoryBarrier {
                src_stages: PipelineStages::TRANSFER,
                src_access: AccessFlags::TRANSFER_WRITE,
                dst_stages: PipelineStages::TOP_OF_PIPE,
                old_layout: ImageLayout::General,
                new_layout: ImageLayout::General,
                image: rt0,
                subresource_range: whole_image(&resources, rt0),
                ..Default::default()
            }],
            ..Default::default()
        }))
        .unwrap();

    validator.record(copy_image(rt1, b, 32)).unwrap();
    let reports = validator.record(begin(&resources, &render_pass, &[rt0, rt1])).unwrap();
    assert_eq!(codes(&reports), [WAR]);
    assert_eq!(reports[0].as_hazard().unwrap().resource, rt1);

    validator
        .record(execution_barrier(PipelineStages::TRANSFER, PipelineStages::TOP_OF_PIPE))
        .unwrap();
    assert!(validator
        .record(begin(&resources, &render_pass, &[rt0, rt1]))
        .unwrap()
        .is_empty());
    assert!(validator.record(Command::EndRenderPass).unwrap().is_empty());
}

#[test]
fn implicit_dependency_policy() {
    let mut resources = Resources::new();
    let rt = image(&mut resources, 32);
    let render_pass = single_subpass(LoadOp::Clear);

    let mut chaining = CommandBufferValidator::new(&resources, Default::default());
    assert!(chaining
        .record(begin(&resources, &render_pass, &[rt]))
        .unwrap()
        .is_empty());

    let mut unordered = CommandBufferValidator::new(
        &resources,
        SyncValidatorCreateInfo {
            implicit_external_dependency: ImplicitDependencyPolicy::NoOrdering,
            ..Default::default()
        },
    );
    let reports = unordered.record(begin(&resources, &render_pass, &[rt])).unwrap();
    assert_eq!(codes(&reports), [WAW]);
    assert_eq!(reports[0].as_hazard().unwrap().origin, AccessOrigin::LoadOp);
}

#[test]
fn load_ops_after_explicit_dependency() {
    let mut resources = Resources::new();
    let color = image(&mut resources, 32);
    let input = image(&mut resources, 32);
    let render_pass = RenderPass::new(RenderPassCreateInfo {
        attachments: vec![
            color_attachment(
                LoadOp::Clear,
                ImageLayout::Undefined,
                ImageLayout::ColorAttachmentOptimal,
            ),
            color_attachment(
                LoadOp::Load,
                ImageLayout::TransferDstOptimal,
                ImageLayout::ShaderReadOnlyOptimal,
            ),
        ],
        subpasses: vec![SubpassDescription {
            input_attachments: vec![reference(1, ImageLayout::ShaderReadOnlyOptimal)],
            color_attachments: vec![reference(0, ImageLayout::ColorAttachmentOptimal)],
            ..Default::default()
        }],
        dependencies: vec![dependency(
            None,
            Some(0),
            [PipelineStages::TRANSFER, PipelineStages::FRAGMENT_SHADER],
            [
                AccessFlags::TRANSFER_WRITE,
                AccessFlags::INPUT_ATTACHMENT_READ | AccessFlags::SHADER_READ,
            ],
        )],
        ..Default::default()
    })
    .unwrap();
    let mut validator = CommandBufferValidator::new(&resources, Default::default());

    // The explicit dependency makes the transitions visible to the fragment shader only, not to
    // the load operations.
    let reports = validator
        .record(begin(&resources, &render_pass, &[color, input]))
        .unwrap();
    assert_eq!(codes(&reports), [WAW, RAW]);
    assert!(reports
        .iter()
        .all(|report| report.as_hazard().unwrap().origin == AccessOrigin::LoadOp));
    assert_eq!(reports[0].as_hazard().unwrap().resource, color);
    assert_eq!(reports[1].as_hazard().unwrap().resource, input);
}

#[test]
fn dependencies_do_not_combine() {
    let mut resources = Resources::new();
    let color = image(&mut resources, 64);
    let input = image(&mut resources, 64);
    let color_range = whole_image(&resources, color);
    let input_range = whole_image(&resources, input);

    const TRANSFER: PipelineStages = PipelineStages::TRANSFER;
    const COLOR_OUTPUT: PipelineStages = PipelineStages::COLOR_ATTACHMENT_OUTPUT;

    let render_pass = |dependencies| {
        RenderPass::new(RenderPassCreateInfo {
            attachments: vec![
                AttachmentDescription {
                    load_op: LoadOp::Clear,
                    store_op: StoreOp::Store,
                    initial_layout: ImageLayout::General,
                    final_layout: ImageLayout::General,
                    ..Default::default()
                },
                AttachmentDescription {
                    load_op: LoadOp::Load,
                    store_op: StoreOp::DontCare,
                    initial_layout: ImageLayout::General,
                    final_layout: ImageLayout::General,
                    ..Default::default()
                },
            ],
            subpasses: vec![SubpassDescription {
                input_attachments: vec![reference(1, ImageLayout::General)],
                color_attachments: vec![reference(0, ImageLayout::General)],
                ..Default::default()
            }],
            dependencies,
            ..Default::default()
        })
        .unwrap()
    };
    let positive = render_pass(vec![
        dependency(
            None,
            Some(0),
            [TRANSFER, COLOR_OUTPUT],
            [AccessFlags::empty(), AccessFlags::COLOR_ATTACHMENT_WRITE],
        ),
        dependency(
            None,
            Some(0),
            [TRANSFER, COLOR_OUTPUT],
            [AccessFlags::TRANSFER_WRITE, AccessFlags::COLOR_ATTACHMENT_READ],
        ),
        dependency(
            Some(0),
            None,
            [COLOR_OUTPUT, TRANSFER],
            [AccessFlags::COLOR_ATTACHMENT_WRITE, AccessFlags::TRANSFER_READ],
        ),
        dependency(
            Some(0),
            None,
            [COLOR_OUTPUT, TRANSFER],
            [AccessFlags::COLOR_ATTACHMENT_WRITE, AccessFlags::TRANSFER_WRITE],
        ),
    ]);
    let negative = render_pass(vec![
        dependency(
            None,
            Some(0),
            [TRANSFER, COLOR_OUTPUT],
            [AccessFlags::empty(), AccessFlags::COLOR_ATTACHMENT_WRITE],
        ),
        dependency(
            None,
            Some(0),
            [TRANSFER, COLOR_OUTPUT],
            [AccessFlags::TRANSFER_WRITE, AccessFlags::empty()],
        ),
        dependency(
            None,
            Some(0),
            [COLOR_OUTPUT, COLOR_OUTPUT],
            [AccessFlags::empty(), AccessFlags::COLOR_ATTACHMENT_READ],
        ),
    ]);

    let image_barrier = |image, src_access, dst_access, subresource_range| ImageMemoryBarrier {
        src_stages: TRANSFER,
        src_access,
        dst_stages: TRANSFER,
        dst_access,
        old_layout: ImageLayout::General,
        new_layout: ImageLayout::General,
        image,
        subresource_range,
        ..Default::default()
    };
    let any_access = AccessFlags::MEMORY_READ | AccessFlags::MEMORY_WRITE;

    let mut validator = CommandBufferValidator::new(&resources, Default::default());
    let commands = [
        Command::PipelineBarrier(DependencyInfo {
            image_memory_barriers: vec![ImageMemoryBarrier {
                src_stages: PipelineStages::TOP_OF_PIPE,
                ..image_barrier(
                    color,
                    any_access,
                    AccessFlags::TRANSFER_WRITE,
                    color_range.clone(),
                )
            }],
            ..Default::default()
        }),
        Command::ClearColorImage(ClearImageInfo {
            regions: smallvec![color_range.clone()],
            ..ClearImageInfo::image(color)
        }),
        Command::PipelineBarrier(DependencyInfo {
            image_memory_barriers: vec![
                image_barrier(
                    color,
                    AccessFlags::TRANSFER_WRITE,
                    AccessFlags::TRANSFER_READ,
                    color_range,
                ),
                image_barrier(input, any_access, AccessFlags::TRANSFER_WRITE, input_range),
            ],
            ..Default::default()
        }),
        copy_image(color, input, 64),
        begin(&resources, &positive, &[color, input]),
        input_attachment_draw(&resources, input),
        Command::EndRenderPass,
        copy_image(color, input, 64),
    ];

    for command in commands {
        let name = command.name();
        let reports = validator.record(command).unwrap();
        assert!(reports.is_empty(), "{}: {:?}", name, reports);
    }

    // The transfer write of `input` is made available by one dependency and made visible to
    // the load operation by another, which doesn't make it visible.
    let reports = validator
        .record(begin(&resources, &negative, &[color, input]))
        .unwrap();
    assert_eq!(codes(&reports), [RAW]);

    let hazard = reports[0].as_hazard().unwrap();
    assert_eq!(hazard.resource, input);
    assert_eq!(hazard.origin, AccessOrigin::LoadOp);
    assert_eq!(hazard.prior_command, CommandRef { index: 7, name: "copy_image" });
}

#[test]
fn clear_rects_stay_within_the_attachment() {
    let mut resources = Resources::new();
    let rt = resources.create_image(ImageCreateInfo {
        extent: [32, 32, 1],
        array_layers: 2,
        ..Default::default()
    });
    let view = ImageView::new(
        rt,
        ImageSubresourceRange {
            aspects: ImageAspects::COLOR,
            mip_levels: 0..1,
            array_layers: 1..2,
        },
    );
    let render_pass = single_subpass(LoadOp::Clear);
    let clear = |array_layers| {
        Command::ClearAttachments(ClearAttachmentsInfo {
            attachments: smallvec![ClearAttachment::Color {
                color_attachment: 0
            }],
            rects: smallvec![ClearRect {
                offset: [0, 0],
                extent: [32, 32],
                array_layers,
            }],
        })
    };
    let mut validator = CommandBufferValidator::new(&resources, Default::default());

    assert!(validator
        .record(Command::BeginRenderPass(RenderPassBeginInfo::new(
            render_pass,
            vec![view],
        )))
        .unwrap()
        .is_empty());
    assert!(validator.record(clear(0..1)).unwrap().is_empty());
    assert!(matches!(
        validator.record(clear(0..2)),
        Err(SyncValError::OutOfBounds { resource, .. }) if resource == rt,
    ));
    assert!(matches!(
        validator.record(clear(0..u32::MAX)),
        Err(SyncValError::OutOfBounds { resource, .. }) if resource == rt,
    ));
    assert_eq!(validator.command_count(), 2);
}

#[test]
fn resolve_hazards_name_the_resolving_subpass() {
    let mut resources = Resources::new();
    let images: Vec<_> = (0..3).map(|_| image(&mut resources, 32)).collect();
    let general = || AttachmentDescription {
        load_op: LoadOp::Clear,
        store_op: StoreOp::Store,
        initial_layout: ImageLayout::General,
        final_layout: ImageLayout::General,
        ..Default::default()
    };
    let render_pass = RenderPass::new(RenderPassCreateInfo {
        attachments: vec![general(), general(), general()],
        subpasses: vec![
            SubpassDescription {
                color_attachments: vec![reference(0, ImageLayout::General)],
                color_resolve_attachments: vec![reference(1, ImageLayout::General)],
                ..Default::default()
            },
            SubpassDescription {
                color_attachments: vec![reference(2, ImageLayout::General)],
                ..Default::default()
            },
        ],
        // Makes the resolve available, but not visible to shader reads.
        dependencies: vec![dependency(
            Some(0),
            Some(1),
            [
                PipelineStages::COLOR_ATTACHMENT_OUTPUT,
                PipelineStages::FRAGMENT_SHADER,
            ],
            [AccessFlags::COLOR_ATTACHMENT_WRITE, AccessFlags::empty()],
        )],
        ..Default::default()
    })
    .unwrap();
    let sample_resolved = Command::Draw(DrawInfo {
        descriptors: vec![DescriptorBinding {
            descriptor_type: DescriptorType::SampledImage,
            stages: PipelineStages::FRAGMENT_SHADER,
            resource: DescriptorResource::Image {
                image: images[1],
                subresource_range: whole_image(&resources, images[1]),
            },
            write: false,
        }],
        ..Default::default()
    });
    let mut validator = CommandBufferValidator::new(&resources, Default::default());

    assert!(validator
        .record(begin(&resources, &render_pass, &images))
        .unwrap()
        .is_empty());
    assert!(validator.record(Command::NextSubpass).unwrap().is_empty());

    let reports = validator.record(sample_resolved).unwrap();
    assert_eq!(codes(&reports), [RAW]);

    let hazard = reports[0].as_hazard().unwrap();
    assert_eq!(hazard.resource, images[1]);
    assert_eq!(hazard.prior_command, CommandRef { index: 1, name: "next_subpass" });
    assert_eq!(
        hazard.prior_access,
        AccessType::ColorAttachmentOutputColorAttachmentWrite,
    );
    assert_eq!(
        hazard.dependency,
        Some(DependencySource::Subpass { indices: vec![0] }),
    );
}

/// Records a render pass whose first subpass writes attachment 0, and whose other three subpasses
/// read attachment 0 as an input attachment and write attachment 1. Returns the codes of the
/// reports of each command.
fn record_fan_out(dependencies: Vec<SubpassDependency>) -> Vec<Vec<&'static str>> {
    let mut resources = Resources::new();
    let images: Vec<_> = (0..4).map(|_| image(&mut resources, 32)).collect();

    let reading_subpass = || SubpassDescription {
        input_attachments: vec![reference(0, ImageLayout::ShaderReadOnlyOptimal)],
        color_attachments: vec![reference(1, ImageLayout::ColorAttachmentOptimal)],
        ..Default::default()
    };
    let attachment = |final_layout| {
        color_attachment(LoadOp::Clear, ImageLayout::ColorAttachmentOptimal, final_layout)
    };
    let render_pass = RenderPass::new(RenderPassCreateInfo {
        attachments: vec![
            attachment(ImageLayout::ShaderReadOnlyOptimal),
            attachment(ImageLayout::ColorAttachmentOptimal),
            attachment(ImageLayout::ColorAttachmentOptimal),
            attachment(ImageLayout::ColorAttachmentOptimal),
        ],
        subpasses: vec![
            SubpassDescription {
                color_attachments: vec![reference(0, ImageLayout::ColorAttachmentOptimal)],
                ..Default::default()
            },
            reading_subpass(),
            reading_subpass(),
            reading_subpass(),
        ],
        dependencies,
        ..Default::default()
    })
    .unwrap();

    let mut commands = vec![
        Command::PipelineBarrier(DependencyInfo {
            image_memory_barriers: images
                .iter()
                .map(|&image| ImageMemoryBarrier {
                    src_stages: PipelineStages::TOP_OF_PIPE,
                    dst_stages: PipelineStages::COLOR_ATTACHMENT_OUTPUT,
                    dst_access: AccessFlags::COLOR_ATTACHMENT_WRITE,
                    old_layout: ImageLayout::Undefined,
                    new_layout: ImageLayout::ColorAttachmentOptimal,
                    image,
                    subresource_range: whole_image(&resources, image),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }),
        begin(&resources, &render_pass, &images),
        Command::Draw(DrawInfo::default()),
    ];

    for _ in 1..4 {
        commands.push(Command::NextSubpass);
        commands.push(input_attachment_draw(&resources, images[0]));
    }

    commands.push(Command::EndRenderPass);

    let mut validator = CommandBufferValidator::new(&resources, Default::default());

    commands
        .into_iter()
        .map(|command| codes(&validator.record(command).unwrap()))
        .collect()
}

fn input_dependency(src_subpass: u32, dst_subpass: u32) -> SubpassDependency {
    dependency(
        Some(src_subpass),
        Some(dst_subpass),
        [
            PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            PipelineStages::FRAGMENT_SHADER,
        ],
        [
            AccessFlags::COLOR_ATTACHMENT_WRITE,
            AccessFlags::INPUT_ATTACHMENT_READ,
        ],
    )
}

#[test]
fn subpasses_without_dependencies_race() {
    let results = record_fan_out(Vec::new());
    let empty: &[&str] = &[];

    // barrier, begin, draw
    assert!(results[..3].iter().all(|codes| codes.is_empty()));

    for subpass in 0..3 {
        assert_eq!(results[3 + 2 * subpass], empty);
        assert_eq!(results[4 + 2 * subpass], [READ_RACING_WRITE]);
    }

    assert_eq!(results[9], [WRITE_RACING_WRITE, WRITE_RACING_WRITE]);
}

#[test]
fn stores_race_with_unordered_subpasses() {
    let results = record_fan_out((1..4).map(|dst| input_dependency(0, dst)).collect());

    assert!(results[..9].iter().all(|codes| codes.is_empty()));
    assert_eq!(results[9], [WRITE_RACING_READ, WRITE_RACING_WRITE]);
}

#[test]
fn ordered_subpasses_do_not_race() {
    let mut dependencies: Vec<_> = (1..4).map(|dst| input_dependency(0, dst)).collect();
    dependencies.push(input_dependency(1, 3));
    dependencies.push(input_dependency(2, 3));

    let results = record_fan_out(dependencies);
    assert!(results.iter().all(|codes| codes.is_empty()));
}
