// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Reports produced while replaying a command buffer.
//!
//! Every report carries a stable string code, the same that the Vulkan validation layers use, so
//! that reports can be matched and filtered by tools.

use crate::{
    access::{Conflict, Tag},
    resource::ResourceId,
    sync::{AccessScope, AccessType, EventId, PipelineStages},
    DeviceSize,
};
use std::{error::Error, fmt, ops::Range};

/// The classification of a hazard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HazardKind {
    /// A read is not ordered after, or can't see, an earlier write.
    ReadAfterWrite,

    /// A write is not ordered after an earlier read.
    WriteAfterRead,

    /// A write is not ordered after, or can't see, an earlier write.
    WriteAfterWrite,

    /// A read races with a write of a subpass that is not ordered with it.
    ReadRacingWrite,

    /// A write races with a write of a subpass that is not ordered with it.
    WriteRacingWrite,

    /// A write races with a read of a subpass that is not ordered with it.
    WriteRacingRead,
}

impl HazardKind {
    /// Returns the stable code of the hazard.
    pub const fn code(self) -> &'static str {
        match self {
            HazardKind::ReadAfterWrite => "SYNC-HAZARD-READ_AFTER_WRITE",
            HazardKind::WriteAfterRead => "SYNC-HAZARD-WRITE_AFTER_READ",
            HazardKind::WriteAfterWrite => "SYNC-HAZARD-WRITE_AFTER_WRITE",
            HazardKind::ReadRacingWrite => "SYNC-HAZARD-READ-RACING-WRITE",
            HazardKind::WriteRacingWrite => "SYNC-HAZARD-WRITE-RACING-WRITE",
            HazardKind::WriteRacingRead => "SYNC-HAZARD-WRITE-RACING-READ",
        }
    }

    /// Returns whether the hazard is between subpasses that have no dependency between them.
    pub const fn is_race(self) -> bool {
        matches!(
            self,
            HazardKind::ReadRacingWrite
                | HazardKind::WriteRacingWrite
                | HazardKind::WriteRacingRead,
        )
    }
}

/// Identifies a command in the command buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CommandRef {
    /// The position of the command in the command buffer.
    pub index: usize,

    /// The name of the command.
    pub name: &'static str,
}

impl fmt::Display for CommandRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` (command {})", self.name, self.index)
    }
}

/// The part of a command that performed an access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AccessOrigin {
    /// The command itself, such as a copy or a draw.
    Command,

    /// An image layout transition of a barrier or of a subpass.
    LayoutTransition,

    /// The load operation of an attachment, at the start of its first subpass.
    LoadOp,

    /// The store operation of an attachment, at the end of its last subpass.
    StoreOp,

    /// The multisample resolve of a color attachment, at the end of its subpass.
    ResolveOp,
}

/// The synchronization edge that was found insufficient.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DependencySource {
    /// Subpass dependencies of the render pass, by index.
    Subpass { indices: Vec<u32> },

    /// The implicit dependency between the render pass and the commands outside of it.
    ImplicitExternal,

    /// No dependency exists between the two subpasses.
    None,
}

/// A detected synchronization hazard.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SyncHazard {
    pub kind: HazardKind,

    /// The resource that was accessed.
    pub resource: ResourceId,

    /// The range of the address space of `resource` where the conflict was found.
    pub range: Range<DeviceSize>,

    /// The command that made the offending access.
    pub command: CommandRef,

    /// The offending access.
    pub access: AccessType,

    /// Which part of `command` made the access.
    pub origin: AccessOrigin,

    /// The command that made the conflicting prior access.
    pub prior_command: CommandRef,

    /// The conflicting prior access.
    pub prior_access: AccessType,

    /// The stages that the prior access had been ordered before at the time of the access.
    pub prior_barriers: PipelineStages,

    /// The accesses that the prior write had been made visible to at the time of the access.
    pub prior_visibility: AccessScope,

    /// The dependency that was expected to order the two accesses, if any.
    pub dependency: Option<DependencySource>,
}

impl SyncHazard {
    /// Returns the stable code of the hazard.
    #[inline]
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl Error for SyncHazard {}

impl fmt::Display for SyncHazard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {} on resource {:?} (range {:?})",
            self.code(),
            self.command,
            match self.origin {
                AccessOrigin::Command => "accesses",
                AccessOrigin::LayoutTransition => "transitions the layout",
                AccessOrigin::LoadOp => "loads an attachment",
                AccessOrigin::StoreOp => "stores an attachment",
                AccessOrigin::ResolveOp => "resolves an attachment",
            },
            self.resource,
            self.range,
        )?;

        write!(
            f,
            " with {}, which conflicts with {} by {}",
            self.access, self.prior_access, self.prior_command,
        )?;

        match &self.dependency {
            Some(DependencySource::Subpass { indices }) => {
                write!(f, "; subpass dependencies {:?} are insufficient", indices)
            }
            Some(DependencySource::ImplicitExternal) => {
                write!(f, "; the implicit external subpass dependency is insufficient")
            }
            Some(DependencySource::None) => {
                write!(f, "; no dependency exists between the subpasses")
            }
            None => write!(
                f,
                "; the prior access is ordered before {:?} and visible to {:?}",
                self.prior_barriers, self.prior_visibility,
            ),
        }
    }
}

/// A conflict found while replaying a command, before it is tied to command names.
#[derive(Clone, Debug)]
pub(crate) struct DetectedHazard {
    pub(crate) resource: ResourceId,
    pub(crate) range: Range<DeviceSize>,
    pub(crate) access: AccessType,
    pub(crate) origin: AccessOrigin,
    pub(crate) conflict: Conflict,
    pub(crate) dependency: Option<DependencySource>,
}

impl DetectedHazard {
    /// Turns the conflict into a report, naming the commands with `command_ref`.
    pub(crate) fn into_hazard(
        self,
        tag: Tag,
        command_ref: impl Fn(Tag) -> CommandRef,
    ) -> SyncHazard {
        let DetectedHazard {
            resource,
            range,
            access,
            origin,
            conflict,
            dependency,
        } = self;

        SyncHazard {
            kind: conflict.kind,
            resource,
            range,
            command: command_ref(tag),
            access,
            origin,
            prior_command: command_ref(conflict.prior_tag),
            prior_access: conflict.prior_access,
            prior_barriers: conflict.prior_barriers,
            prior_visibility: conflict.prior_visibility,
            dependency,
        }
    }
}

/// The classification of a misuse of an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventMisuseKind {
    /// A reset follows a set without a barrier in between.
    ResetMissingBarrierAfterSet,

    /// A reset follows a wait without a barrier in between.
    ResetMissingBarrierAfterWait,

    /// A set follows a reset without a barrier in between.
    SetMissingBarrierAfterReset,

    /// A set follows another set without a barrier in between.
    SetMissingBarrierAfterSet,

    /// A set follows a wait without a barrier in between.
    SetMissingBarrierAfterWait,

    /// A wait follows a reset of the event in the same command buffer.
    WaitAfterReset,

    /// The source stages of a wait differ from the stages the event was set with.
    WaitSourceStageMismatch {
        set_stages: PipelineStages,
        wait_stages: PipelineStages,
    },
}

impl EventMisuseKind {
    /// Returns the stable code of the misuse.
    pub const fn code(self) -> &'static str {
        match self {
            EventMisuseKind::ResetMissingBarrierAfterSet => {
                "SYNC-vkCmdResetEvent-missingbarrier-set"
            }
            EventMisuseKind::ResetMissingBarrierAfterWait => {
                "SYNC-vkCmdResetEvent-missingbarrier-wait"
            }
            EventMisuseKind::SetMissingBarrierAfterReset => {
                "SYNC-vkCmdSetEvent-missingbarrier-reset"
            }
            EventMisuseKind::SetMissingBarrierAfterSet => "SYNC-vkCmdSetEvent-missingbarrier-set",
            EventMisuseKind::SetMissingBarrierAfterWait => "SYNC-vkCmdSetEvent-missingbarrier-wait",
            EventMisuseKind::WaitAfterReset => "VUID-vkCmdResetEvent-event-03834",
            EventMisuseKind::WaitSourceStageMismatch { .. } => {
                "VUID-vkCmdWaitEvents-srcStageMask-01158"
            }
        }
    }
}

/// A misuse of an event.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EventMisuse {
    pub kind: EventMisuseKind,

    /// The event that was misused.
    pub event: EventId,

    /// The command that misused the event.
    pub command: CommandRef,

    /// The earlier command on the event that the misuse relates to.
    pub prior_command: Option<CommandRef>,
}

impl EventMisuse {
    /// Returns the stable code of the misuse.
    #[inline]
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl Error for EventMisuse {}

impl fmt::Display for EventMisuse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} on event {:?}", self.code(), self.command, self.event)?;

        match self.kind {
            EventMisuseKind::WaitAfterReset => {
                write!(f, " waits on an event that was reset in this command buffer")?
            }
            EventMisuseKind::WaitSourceStageMismatch {
                set_stages,
                wait_stages,
            } => write!(
                f,
                " waits with source stages {:?}, but the event was set with {:?}",
                wait_stages, set_stages,
            )?,
            _ => write!(f, " has no barrier since the previous operation on the event")?,
        }

        if let Some(prior_command) = &self.prior_command {
            write!(f, " (previous operation: {})", prior_command)?;
        }

        Ok(())
    }
}

/// A report produced while replaying a command buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SyncReport {
    Hazard(SyncHazard),
    EventMisuse(EventMisuse),
}

impl SyncReport {
    /// Returns the stable code of the report.
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            SyncReport::Hazard(hazard) => hazard.code(),
            SyncReport::EventMisuse(misuse) => misuse.code(),
        }
    }

    /// Returns the command that the report is about.
    #[inline]
    pub fn command(&self) -> CommandRef {
        match self {
            SyncReport::Hazard(hazard) => hazard.command,
            SyncReport::EventMisuse(misuse) => misuse.command,
        }
    }

    #[inline]
    pub fn as_hazard(&self) -> Option<&SyncHazard> {
        match self {
            SyncReport::Hazard(hazard) => Some(hazard),
            SyncReport::EventMisuse(_) => None,
        }
    }
}

impl Error for SyncReport {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SyncReport::Hazard(hazard) => Some(hazard),
            SyncReport::EventMisuse(misuse) => Some(misuse),
        }
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncReport::Hazard(hazard) => fmt::Display::fmt(hazard, f),
            SyncReport::EventMisuse(misuse) => fmt::Display::fmt(misuse, f),
        }
    }
}

impl From<SyncHazard> for SyncReport {
    #[inline]
    fn from(val: SyncHazard) -> Self {
        SyncReport::Hazard(val)
    }
}

impl From<EventMisuse> for SyncReport {
    #[inline]
    fn from(val: EventMisuse) -> Self {
        SyncReport::EventMisuse(val)
    }
}
