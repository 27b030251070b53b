// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The vocabulary of synchronization: pipeline stages, memory accesses, barriers and events.
//!
//! Every command executes in one or more *pipeline stages*, and accesses memory with one or more
//! *access types*. An access type is always made in one specific stage, for example a transfer
//! read in the `TRANSFER` stage or a uniform read in the `VERTEX_SHADER` stage.
//!
//! Two accesses to the same memory are ordered by a *dependency* when the earlier access is in the
//! first synchronization scope of the dependency and the later access is in its second one. A
//! dependency has an *execution* part, made of pipeline stages, and a *memory* part, made of access
//! types. Write accesses need both: a later access must not only execute after the write, it must
//! also see its results.

pub use self::{
    access::{AccessScope, AccessType},
    barrier::{BufferMemoryBarrier, DependencyInfo, ImageMemoryBarrier, MemoryBarrier},
    event::EventId,
    pipeline::{AccessFlags, PipelineStages},
};
pub(crate) use self::{
    barrier::SyncBarrier,
    event::{EventScope, EventTracker, TrackedMisuse},
};

mod access;
mod barrier;
mod event;
mod pipeline;
