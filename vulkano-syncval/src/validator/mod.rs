// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Replaying a command buffer and collecting its hazards.
//!
//! A [`CommandBufferValidator`] plays the role of a command buffer that is being recorded. Every
//! call to [`record`] appends one command: the accesses of the command are checked against the
//! history of the ranges they touch, and then become part of that history. Synchronization
//! commands don't access anything themselves, but change how later accesses are checked.
//!
//! [`record`]: CommandBufferValidator::record

use crate::{
    access::Tag,
    command::{Command, CommandScope, Usage},
    context::{AccessContext, BarrierScope, ScopedBarrier},
    hazard::{AccessOrigin, CommandRef, DetectedHazard, EventMisuse, SyncReport},
    render_pass::RenderPassState,
    resource::{ResourceId, Resources},
    sync::{
        AccessType, DependencyInfo, EventId, EventScope, EventTracker, PipelineStages, SyncBarrier,
        TrackedMisuse,
    },
    DeviceSize, SyncValError,
};
use smallvec::SmallVec;
use std::ops::Range;

#[cfg(test)]
mod tests;

/// Parameters to create a new `CommandBufferValidator`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SyncValidatorCreateInfo {
    /// How subpasses without an explicit dependency on the commands outside of the render pass
    /// are ordered with them.
    ///
    /// The default value is [`ImplicitDependencyPolicy::ChainWithBarriers`].
    pub implicit_external_dependency: ImplicitDependencyPolicy,

    /// Whether an access that caused a hazard is still recorded.
    ///
    /// The default value is [`HazardStateUpdate::Commit`].
    pub hazard_state_update: HazardStateUpdate,

    /// The maximum number of reports that the validator retains. Reports past this number are
    /// still returned from [`CommandBufferValidator::record`] and logged.
    ///
    /// The default value is `None`, which retains every report.
    pub max_reports: Option<usize>,

    #[cfg_attr(feature = "serde", serde(skip, default = "crate::non_exhaustive"))]
    pub _ne: crate::NonExhaustive,
}

impl Default for SyncValidatorCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            implicit_external_dependency: ImplicitDependencyPolicy::ChainWithBarriers,
            hazard_state_update: HazardStateUpdate::Commit,
            max_reports: None,
            _ne: crate::NE,
        }
    }
}

/// How the implicit dependency between a render pass and the commands around it behaves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImplicitDependencyPolicy {
    /// The implicit dependency waits for nothing and makes nothing available, but its execution
    /// scope starts at `TOP_OF_PIPE`. An earlier barrier that reaches `TOP_OF_PIPE` therefore
    /// chains with it.
    #[default]
    ChainWithBarriers,

    /// The implicit dependency orders nothing.
    NoOrdering,
}

/// What happens to the access history when an access causes a hazard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HazardStateUpdate {
    /// The access is recorded as if it had been properly synchronized.
    #[default]
    Commit,

    /// The access is left out of the history.
    Skip,
}

/// Checks the synchronization of the commands of one command buffer.
///
/// Commands are recorded in program order with [`record`](Self::record). Hazards don't stop the
/// validator: every report of the command buffer is accumulated, and can be retrieved with
/// [`reports`](Self::reports).
#[derive(Debug)]
pub struct CommandBufferValidator {
    resources: Resources,
    create_info: SyncValidatorCreateInfo,

    context: AccessContext,
    render_pass: Option<RenderPassState>,
    events: EventTracker,

    // Indexed by tag.
    command_names: Vec<&'static str>,
    reports: Vec<SyncReport>,
}

impl CommandBufferValidator {
    /// Returns a new validator for a command buffer whose commands refer to `resources`.
    pub fn new(resources: &Resources, create_info: SyncValidatorCreateInfo) -> Self {
        CommandBufferValidator {
            resources: resources.clone(),
            create_info,
            context: AccessContext::new(),
            render_pass: None,
            events: EventTracker::new(),
            command_names: Vec::new(),
            reports: Vec::new(),
        }
    }

    /// Returns the parameters the validator was created with.
    #[inline]
    pub fn create_info(&self) -> &SyncValidatorCreateInfo {
        &self.create_info
    }

    /// Returns the reports retained so far.
    #[inline]
    pub fn reports(&self) -> &[SyncReport] {
        &self.reports
    }

    /// Returns the number of commands recorded so far.
    #[inline]
    pub fn command_count(&self) -> usize {
        self.command_names.len()
    }

    /// Returns whether a render pass is currently being recorded.
    #[inline]
    pub fn is_in_render_pass(&self) -> bool {
        self.render_pass.is_some()
    }

    /// Discards all history, as if the command buffer had been reset.
    pub fn reset(&mut self) {
        self.context.reset();
        self.render_pass = None;
        self.events.reset();
        self.command_names.clear();
        self.reports.clear();

        tracing::debug!(target: "vulkano_syncval", "reset command buffer");
    }

    /// Records a command, returning the reports that it caused.
    ///
    /// An error is returned if the command itself is malformed, or can't be recorded in the
    /// current state. In that case nothing is recorded.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn record(&mut self, command: Command) -> Result<Vec<SyncReport>, SyncValError> {
        let name = command.name();

        match (command.scope(), self.render_pass.is_some()) {
            (CommandScope::Outside, true) => {
                return Err(SyncValError::ForbiddenInsideRenderPass { command: name });
            }
            (CommandScope::Inside, false) => {
                return Err(SyncValError::NotInRenderPass { command: name });
            }
            _ => {}
        }

        let tag = self.command_names.len();
        tracing::trace!(target: "vulkano_syncval", tag, command = name);

        let mut hazards = Vec::new();
        let mut misuses = SmallVec::<[TrackedMisuse; 2]>::new();

        match &command {
            Command::PipelineBarrier(dependency_info) => {
                let barriers = ResolvedBarriers::new(&self.resources, dependency_info)?;
                self.pipeline_barrier(&barriers, tag, &mut hazards);
                self.events.apply_pipeline_barrier(
                    dependency_info.src_stages(),
                    dependency_info.dst_stages(),
                );
            }
            Command::SetEvent { event, stages } => {
                self.check_event(*event)?;
                misuses.extend(self.events.set_event(*event, *stages, tag));
            }
            Command::ResetEvent { event, stages } => {
                self.check_event(*event)?;
                misuses.extend(self.events.reset_event(*event, *stages, tag));
            }
            Command::WaitEvents {
                events,
                dependency_info,
            } => {
                for &event in events {
                    self.check_event(event)?;
                }

                let barriers = ResolvedBarriers::new(&self.resources, dependency_info)?;
                let (scopes, wait_misuses) = self.events.wait_events(
                    events,
                    dependency_info.src_stages(),
                    dependency_info.dst_stages(),
                    tag,
                );
                misuses.extend(wait_misuses);
                self.wait_events(&barriers, &scopes, tag, &mut hazards);
            }
            Command::BeginRenderPass(begin_info) => {
                let state = RenderPassState::begin(
                    &self.resources,
                    begin_info,
                    &self.context,
                    tag,
                    &self.create_info,
                    &mut hazards,
                )?;

                if state.is_none() {
                    tracing::debug!(
                        target: "vulkano_syncval",
                        "render pass not begun because of hazards",
                    );
                }

                self.render_pass = state;
            }
            Command::NextSubpass => {
                let state = self
                    .render_pass
                    .as_mut()
                    .ok_or(SyncValError::NotInRenderPass { command: name })?;
                state.next_subpass(&self.context, tag, &self.create_info, &mut hazards)?;
            }
            Command::EndRenderPass => {
                let state = self
                    .render_pass
                    .take()
                    .ok_or(SyncValError::NotInRenderPass { command: name })?;
                let remaining = state.remaining_subpasses();

                if remaining != 0 {
                    self.render_pass = Some(state);

                    return Err(SyncValError::SubpassesRemaining { remaining });
                }

                state.end(&mut self.context, tag, &self.create_info, &mut hazards);
            }
            _ => {
                let usages = self.command_usages(&command)?;
                self.record_usages(&usages, tag, &mut hazards);
            }
        }

        self.command_names.push(name);

        Ok(self.report(tag, hazards, misuses))
    }

    fn check_event(&self, event: EventId) -> Result<(), SyncValError> {
        if self.resources.contains_event(event) {
            Ok(())
        } else {
            Err(SyncValError::UnknownEvent { event })
        }
    }

    /// Returns the context that barriers apply to: the current subpass inside a render pass.
    fn current_context_mut(&mut self) -> &mut AccessContext {
        match &mut self.render_pass {
            Some(state) => state.current_context_mut(),
            None => &mut self.context,
        }
    }

    /// Returns all accesses of a command, including those to the attachments of the current
    /// subpass.
    fn command_usages(&self, command: &Command) -> Result<Vec<Usage>, SyncValError> {
        let mut usages = command.usages(&self.resources)?;

        if let Some(state) = &self.render_pass {
            match command {
                Command::Draw(draw)
                | Command::DrawIndexed(draw)
                | Command::DrawIndirect { draw, .. }
                | Command::DrawIndexedIndirect { draw, .. } => {
                    usages.extend(state.draw_usages(&draw.attachments));
                }
                Command::ClearAttachments(clear_info) => {
                    usages.extend(state.clear_attachment_usages(&self.resources, clear_info)?);
                }
                _ => {}
            }
        }

        Ok(usages)
    }

    fn record_usages(&mut self, usages: &[Usage], tag: Tag, hazards: &mut Vec<DetectedHazard>) {
        if let Some(state) = &mut self.render_pass {
            state.record_usages(usages, AccessOrigin::Command, tag, &self.create_info, hazards);

            return;
        }

        for usage in usages {
            let found = usage.ranges.iter().find_map(|range| {
                self.context
                    .detect_hazard(usage.resource, range, usage.access, usage.ordering)
            });

            if let Some((range, conflict)) = found {
                hazards.push(DetectedHazard {
                    resource: usage.resource,
                    range,
                    access: usage.access,
                    origin: AccessOrigin::Command,
                    conflict,
                    dependency: None,
                });

                if self.create_info.hazard_state_update == HazardStateUpdate::Skip {
                    continue;
                }
            }

            for range in &usage.ranges {
                self.context.update(usage.resource, range, usage.access, tag);
            }
        }
    }

    fn pipeline_barrier(
        &mut self,
        barriers: &ResolvedBarriers,
        tag: Tag,
        hazards: &mut Vec<DetectedHazard>,
    ) {
        let context = self.current_context_mut();
        barriers.detect_transition_hazards(context, None, hazards);
        context.apply_barriers(&barriers.scoped, tag, None);

        tracing::debug!(
            target: "vulkano_syncval",
            barriers = barriers.scoped.len(),
            "applied pipeline barrier",
        );
    }

    fn wait_events(
        &mut self,
        barriers: &ResolvedBarriers,
        scopes: &[EventScope],
        tag: Tag,
        hazards: &mut Vec<DetectedHazard>,
    ) {
        let exec_scope = scopes
            .iter()
            .fold(PipelineStages::empty(), |acc, scope| acc | scope.exec_scope);
        let context = self.current_context_mut();
        barriers.detect_transition_hazards(context, Some(exec_scope), hazards);

        // Events that weren't set in this command buffer contribute nothing to the first scope,
        // but the layout transitions still happen.
        if scopes.is_empty() {
            context.apply_barriers(&barriers.restricted_to(PipelineStages::empty()), tag, None);
        }

        for scope in scopes {
            context.apply_barriers(
                &barriers.restricted_to(scope.exec_scope),
                tag,
                Some(scope.set_tag),
            );
        }

        tracing::debug!(
            target: "vulkano_syncval",
            barriers = barriers.scoped.len(),
            events = scopes.len(),
            "applied event wait",
        );
    }

    fn report(
        &mut self,
        tag: Tag,
        hazards: Vec<DetectedHazard>,
        misuses: SmallVec<[TrackedMisuse; 2]>,
    ) -> Vec<SyncReport> {
        let command_names = &self.command_names;
        let command_ref = |tag: Tag| CommandRef {
            index: tag,
            name: command_names[tag],
        };

        let hazards = hazards
            .into_iter()
            .map(|hazard| SyncReport::from(hazard.into_hazard(tag, command_ref)));
        let misuses = misuses.into_iter().map(|misuse| {
            SyncReport::from(EventMisuse {
                kind: misuse.kind,
                event: misuse.event,
                command: command_ref(tag),
                prior_command: misuse.prior_tag.map(command_ref),
            })
        });
        let reports: Vec<SyncReport> = hazards.chain(misuses).collect();

        for report in &reports {
            tracing::warn!(target: "vulkano_syncval", code = report.code(), "{}", report);
        }

        let retained = match self.create_info.max_reports {
            Some(max_reports) => max_reports.saturating_sub(self.reports.len()),
            None => reports.len(),
        };
        self.reports.extend(reports.iter().take(retained).cloned());

        reports
    }
}

/// The barriers of a `PipelineBarrier` or `WaitEvents`, resolved to address ranges.
struct ResolvedBarriers {
    scoped: Vec<ScopedBarrier>,
    global: SmallVec<[SyncBarrier; 2]>,
    transitions: Vec<(ResourceId, Vec<Range<DeviceSize>>, SyncBarrier)>,
}

impl ResolvedBarriers {
    fn new(resources: &Resources, dependency_info: &DependencyInfo) -> Result<Self, SyncValError> {
        let DependencyInfo {
            memory_barriers,
            buffer_memory_barriers,
            image_memory_barriers,
            _ne: _,
        } = dependency_info;

        let global: SmallVec<[SyncBarrier; 2]> =
            memory_barriers.iter().map(SyncBarrier::from).collect();
        let mut scoped: Vec<ScopedBarrier> = global
            .iter()
            .map(|&barrier| ScopedBarrier {
                barrier,
                scope: BarrierScope::Global,
            })
            .collect();
        let mut transitions = Vec::new();

        for buffer_barrier in buffer_memory_barriers {
            let ranges =
                resources.buffer_ranges(buffer_barrier.buffer, buffer_barrier.range.clone())?;

            scoped.push(ScopedBarrier {
                barrier: SyncBarrier::from(buffer_barrier),
                scope: BarrierScope::Resource {
                    resource: buffer_barrier.buffer,
                    ranges: ranges.into_vec(),
                    layout_transition: false,
                },
            });
        }

        for image_barrier in image_memory_barriers {
            let ranges = resources
                .image_subresource_ranges(image_barrier.image, &image_barrier.subresource_range)?;
            let barrier = SyncBarrier::from(image_barrier);
            let layout_transition = image_barrier.is_layout_transition();

            if layout_transition {
                transitions.push((image_barrier.image, ranges.clone(), barrier));
            }

            scoped.push(ScopedBarrier {
                barrier,
                scope: BarrierScope::Resource {
                    resource: image_barrier.image,
                    ranges,
                    layout_transition,
                },
            });
        }

        Ok(ResolvedBarriers {
            scoped,
            global,
            transitions,
        })
    }

    fn restricted_to(&self, exec_scope: PipelineStages) -> Vec<ScopedBarrier> {
        self.scoped
            .iter()
            .map(|scoped| ScopedBarrier {
                barrier: scoped.barrier.restricted_to(exec_scope),
                scope: scoped.scope.clone(),
            })
            .collect()
    }

    /// Checks the layout transitions against the history. A transition is a write that is
    /// ordered after everything in the source scope of its own barrier together with the global
    /// memory barriers of the same command.
    fn detect_transition_hazards(
        &self,
        context: &AccessContext,
        exec_scope: Option<PipelineStages>,
        hazards: &mut Vec<DetectedHazard>,
    ) {
        for (image, ranges, barrier) in &self.transitions {
            let merged = SyncBarrier::merged(self.global.iter().chain(std::iter::once(barrier)));
            let merged = match exec_scope {
                Some(exec_scope) => merged.restricted_to(exec_scope),
                None => merged,
            };

            let found = ranges
                .iter()
                .find_map(|range| context.detect_barrier_hazard(*image, range, &merged));

            if let Some((range, conflict)) = found {
                hazards.push(DetectedHazard {
                    resource: *image,
                    range,
                    access: AccessType::ImageLayoutTransition,
                    origin: AccessOrigin::LayoutTransition,
                    conflict,
                    dependency: None,
                });
            }
        }
    }
}
