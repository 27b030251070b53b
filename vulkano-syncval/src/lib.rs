// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

#![doc(html_logo_url = "https://raw.githubusercontent.com/vulkano-rs/vulkano/master/logo.png")]
//! Synchronization hazard detection for recorded Vulkan command sequences.
//!
//! This crate replays the commands of a single command buffer in program order and checks that
//! every memory access is ordered relative to every other access that could race with it, using
//! only the ordering primitives that were actually recorded: pipeline barriers, events and
//! render pass subpass dependencies. Nothing is submitted to a device; the analysis is a
//! deterministic simulation of what the commands would do.
//!
//! # Brief summary of the crate
//!
//! - The [`Resources`] registry holds the layout of every buffer and image that commands refer
//!   to. Buffers are a linear range of bytes; images are a grid of subresources indexed by aspect,
//!   mip level and array layer.
//! - A [`CommandBufferValidator`] is created from a [`SyncValidatorCreateInfo`] and is fed
//!   [`Command`]s one by one. Each command is translated into a list of accesses, which are checked
//!   against the access history of the touched ranges and then recorded.
//! - Every conflict is returned as a [`SyncHazard`] with a stable code such as
//!   `SYNC-HAZARD-WRITE_AFTER_READ`. Misuse of events is reported as an [`EventMisuse`].
//!   Detection never stops early: all reports of a command buffer are accumulated.
//!
//! Structural mistakes in the input itself, such as referring to a resource that isn't in the
//! registry or recording `NextSubpass` outside of a render pass, are returned as a
//! [`SyncValError`] from the recording call instead.
//!
//! # Example
//!
//! ```
//! use vulkano_syncval::{
//!     command::{Command, CopyBufferInfo},
//!     resource::{BufferCreateInfo, Resources},
//!     CommandBufferValidator, SyncValidatorCreateInfo,
//! };
//!
//! let mut resources = Resources::new();
//! let a = resources.create_buffer(BufferCreateInfo { size: 256, ..Default::default() });
//! let b = resources.create_buffer(BufferCreateInfo { size: 256, ..Default::default() });
//! let c = resources.create_buffer(BufferCreateInfo { size: 256, ..Default::default() });
//!
//! let mut validator = CommandBufferValidator::new(&resources, SyncValidatorCreateInfo::default());
//! let copy = |src, dst| Command::CopyBuffer(CopyBufferInfo::buffers(src, dst));
//!
//! validator.record(copy(a, b)).unwrap();
//! let hazards = validator.record(copy(c, a)).unwrap();
//! assert_eq!(hazards.len(), 1);
//! assert_eq!(hazards[0].code(), "SYNC-HAZARD-WRITE_AFTER_READ");
//! ```

#![warn(rust_2018_idioms, rust_2021_compatibility)]

pub use crate::{
    command::Command,
    hazard::{EventMisuse, HazardKind, SyncHazard, SyncReport},
    resource::{ResourceId, Resources},
    validator::{
        CommandBufferValidator, HazardStateUpdate, ImplicitDependencyPolicy,
        SyncValidatorCreateInfo,
    },
};
pub use ash::vk::DeviceSize;
use std::{error::Error, fmt};

#[macro_use]
mod macros;
pub(crate) mod access;
pub mod command;
pub(crate) mod context;
pub mod hazard;
pub(crate) mod range_map;
pub mod render_pass;
pub mod resource;
pub mod sync;
pub mod validator;

/// A helper type for non-exhaustive structs.
///
/// This type cannot be constructed outside this crate. Structures with a field of this type can
/// only be constructed by calling a constructor function or `Default::default()`. The effect is
/// similar to the standard Rust `#[non_exhaustive]` attribute, except that it does not prevent
/// update syntax from being used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)] // add traits as needed
pub struct NonExhaustive(pub(crate) ());

pub(crate) const NE: NonExhaustive = NonExhaustive(());

#[cfg(feature = "serde")]
pub(crate) const fn non_exhaustive() -> NonExhaustive {
    NE
}

/// Error that can happen when the recorded input itself is malformed.
///
/// These are never hazards: a hazard is a property of a well-formed command sequence and is
/// reported as a [`SyncHazard`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncValError {
    /// The resource is not known to the registry the validator was created with.
    UnknownResource { resource: ResourceId },

    /// The event is not known to the registry the validator was created with.
    UnknownEvent { event: sync::EventId },

    /// The resource is of the wrong kind for how the command uses it.
    ResourceKindMismatch {
        resource: ResourceId,
        expected: resource::ResourceKind,
    },

    /// A range or region addressed by the command lies outside of the resource.
    OutOfBounds {
        resource: ResourceId,
        problem: &'static str,
    },

    /// The command can only be recorded inside a render pass.
    NotInRenderPass { command: &'static str },

    /// The command can't be recorded inside a render pass.
    ForbiddenInsideRenderPass { command: &'static str },

    /// `NextSubpass` was recorded while already in the last subpass.
    NoSubpassesRemaining,

    /// `EndRenderPass` was recorded before reaching the last subpass.
    SubpassesRemaining { remaining: u32 },

    /// The render pass description is inconsistent.
    InvalidRenderPass { problem: String },

    /// The number of attachments provided doesn't match the render pass.
    AttachmentCountMismatch { required: u32, provided: u32 },
}

impl Error for SyncValError {}

impl fmt::Display for SyncValError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::UnknownResource { resource } => {
                write!(f, "the resource {:?} is not in the registry", resource)
            }
            Self::UnknownEvent { event } => {
                write!(f, "the event {:?} is not in the registry", event)
            }
            Self::ResourceKindMismatch { resource, expected } => write!(
                f,
                "the resource {:?} was used as a {:?}, but it isn't one",
                resource, expected,
            ),
            Self::OutOfBounds { resource, problem } => write!(
                f,
                "an access to the resource {:?} is out of bounds: {}",
                resource, problem,
            ),
            Self::NotInRenderPass { command } => write!(
                f,
                "`{}` can only be recorded inside a render pass",
                command,
            ),
            Self::ForbiddenInsideRenderPass { command } => write!(
                f,
                "`{}` can't be recorded inside a render pass",
                command,
            ),
            Self::NoSubpassesRemaining => {
                write!(f, "the render pass is already in its last subpass")
            }
            Self::SubpassesRemaining { remaining } => write!(
                f,
                "the render pass was ended with {} subpasses remaining",
                remaining,
            ),
            Self::InvalidRenderPass { problem } => {
                write!(f, "the render pass is invalid: {}", problem)
            }
            Self::AttachmentCountMismatch { required, provided } => write!(
                f,
                "the render pass has {} attachments, but {} were provided",
                required, provided,
            ),
        }
    }
}
