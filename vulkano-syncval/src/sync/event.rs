// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Tracking of the set, reset and wait operations on events within a command buffer.
//!
//! An event splits a dependency in two. `SetEvent` captures every command recorded before it,
//! limited to the stages it is given: that is the first synchronization scope. `WaitEvents` then
//! orders that scope before its destination stages, exactly like a pipeline barrier would, except
//! that commands recorded between the set and the wait are not in the first scope.
//!
//! Setting or resetting an event while a previous operation on it may still be pending is a
//! race on the event itself. An operation is only safe once a barrier or wait has ordered the
//! previous operation's stages before it.

use super::PipelineStages;
use crate::{access::Tag, hazard::EventMisuseKind};
use foldhash::HashMap;
use smallvec::SmallVec;

/// Identifies an event in a [`Resources`](crate::Resources) registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId(pub(crate) u32);

impl EventId {
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EventCommand {
    Set,
    Reset,
    Wait,
}

#[derive(Clone, Debug, Default)]
struct EventState {
    /// The last operation on the event in this command buffer.
    last_command: Option<(EventCommand, Tag)>,
    /// The source execution scope of the last set or reset.
    exec_scope: PipelineStages,
    /// The stages that the last operation has been ordered before.
    barriers: PipelineStages,
    /// The stage mask the event was last set with, or empty if it was last reset. `None` if
    /// neither happened in this command buffer.
    stage_mask: Option<PipelineStages>,
}

impl EventState {
    fn has_barrier(&self, stage_mask: PipelineStages, exec_scope: PipelineStages) -> bool {
        self.last_command.is_none()
            || stage_mask.intersects(PipelineStages::ALL_COMMANDS)
            || self.barriers.intersects(exec_scope)
            || self.barriers.intersects(PipelineStages::ALL_COMMANDS)
    }
}

/// The first synchronization scope of an event, as seen by a wait on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct EventScope {
    /// Only accesses recorded before this tag are in the scope.
    pub(crate) set_tag: Tag,
    /// Only accesses made by these stages are in the scope.
    pub(crate) exec_scope: PipelineStages,
}

/// A misuse found by the tracker, with the tag of the earlier operation it relates to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TrackedMisuse {
    pub(crate) event: EventId,
    pub(crate) kind: EventMisuseKind,
    pub(crate) prior_tag: Option<Tag>,
}

/// The state of all events used by one command buffer.
#[derive(Clone, Debug, Default)]
pub(crate) struct EventTracker {
    events: HashMap<EventId, EventState>,
}

impl EventTracker {
    #[inline]
    pub(crate) fn new() -> Self {
        EventTracker::default()
    }

    /// Forgets the state of all events.
    #[inline]
    pub(crate) fn reset(&mut self) {
        self.events.clear();
    }

    /// Records a `SetEvent`, returning a misuse if the previous operation isn't ordered before it.
    pub(crate) fn set_event(
        &mut self,
        event: EventId,
        stages: PipelineStages,
        tag: Tag,
    ) -> Option<TrackedMisuse> {
        let exec_scope = stages.with_earlier_stages();
        let state = self.events.entry(event).or_default();

        let misuse = if state.has_barrier(stages, exec_scope) {
            None
        } else {
            state.last_command.map(|(command, prior_tag)| TrackedMisuse {
                event,
                kind: match command {
                    EventCommand::Set => EventMisuseKind::SetMissingBarrierAfterSet,
                    EventCommand::Reset => EventMisuseKind::SetMissingBarrierAfterReset,
                    EventCommand::Wait => EventMisuseKind::SetMissingBarrierAfterWait,
                },
                prior_tag: Some(prior_tag),
            })
        };

        state.last_command = Some((EventCommand::Set, tag));
        state.exec_scope = exec_scope;
        state.barriers = PipelineStages::empty();
        state.stage_mask = Some(stages);

        misuse
    }

    /// Records a `ResetEvent`, returning a misuse if the previous set or wait isn't ordered before
    /// it.
    pub(crate) fn reset_event(
        &mut self,
        event: EventId,
        stages: PipelineStages,
        tag: Tag,
    ) -> Option<TrackedMisuse> {
        let exec_scope = stages.with_earlier_stages();
        let state = self.events.entry(event).or_default();

        let misuse = if state.has_barrier(stages, exec_scope) {
            None
        } else {
            match state.last_command {
                Some((EventCommand::Set, prior_tag)) => Some(TrackedMisuse {
                    event,
                    kind: EventMisuseKind::ResetMissingBarrierAfterSet,
                    prior_tag: Some(prior_tag),
                }),
                Some((EventCommand::Wait, prior_tag)) => Some(TrackedMisuse {
                    event,
                    kind: EventMisuseKind::ResetMissingBarrierAfterWait,
                    prior_tag: Some(prior_tag),
                }),
                // Resetting twice is harmless.
                Some((EventCommand::Reset, _)) | None => None,
            }
        };

        state.last_command = Some((EventCommand::Reset, tag));
        state.exec_scope = exec_scope;
        state.barriers = PipelineStages::empty();
        state.stage_mask = Some(PipelineStages::empty());

        misuse
    }

    /// Records the execution dependency of a pipeline barrier.
    pub(crate) fn apply_pipeline_barrier(
        &mut self,
        src_stages: PipelineStages,
        dst_stages: PipelineStages,
    ) {
        let src_exec_scope = src_stages.with_earlier_stages();
        let dst_exec_scope = dst_stages.with_later_stages();

        for state in self.events.values_mut() {
            if src_stages.intersects(PipelineStages::ALL_COMMANDS)
                || src_exec_scope.intersects(state.exec_scope)
            {
                state.barriers |= dst_exec_scope;
            }
        }
    }

    /// Records a `WaitEvents` on `events`.
    ///
    /// Returns the first scopes of the events that were set in this command buffer, and the
    /// misuses found.
    pub(crate) fn wait_events(
        &mut self,
        events: &[EventId],
        src_stages: PipelineStages,
        dst_stages: PipelineStages,
        tag: Tag,
    ) -> (SmallVec<[EventScope; 2]>, SmallVec<[TrackedMisuse; 2]>) {
        let mut scopes = SmallVec::new();
        let mut misuses = SmallVec::new();
        let dst_exec_scope = dst_stages.with_later_stages();

        let mut known_stage_mask = Some(PipelineStages::empty());

        for &event in events {
            let state = self.events.entry(event).or_default();

            match state.last_command {
                Some((EventCommand::Set, set_tag)) => scopes.push(EventScope {
                    set_tag,
                    exec_scope: state.exec_scope & src_stages.with_earlier_stages(),
                }),
                Some((EventCommand::Reset, reset_tag)) => misuses.push(TrackedMisuse {
                    event,
                    kind: EventMisuseKind::WaitAfterReset,
                    prior_tag: Some(reset_tag),
                }),
                Some((EventCommand::Wait, _)) | None => {}
            }

            known_stage_mask = match (known_stage_mask, state.stage_mask) {
                (Some(acc), Some(mask)) => Some(acc | mask),
                _ => None,
            };

            state.last_command = Some((EventCommand::Wait, tag));
            state.barriers = dst_exec_scope;
        }

        // The host stage may always be added to the source stages, for events set on the host.
        if let (Some(set_stages), Some(&first)) = (known_stage_mask, events.first()) {
            if src_stages - PipelineStages::HOST != set_stages {
                misuses.push(TrackedMisuse {
                    event: first,
                    kind: EventMisuseKind::WaitSourceStageMismatch {
                        set_stages,
                        wait_stages: src_stages,
                    },
                    prior_tag: None,
                });
            }
        }

        (scopes, misuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: EventId = EventId(0);
    const TRANSFER: PipelineStages = PipelineStages::TRANSFER;

    fn kinds(misuses: &[TrackedMisuse]) -> Vec<EventMisuseKind> {
        misuses.iter().map(|m| m.kind).collect()
    }

    #[test]
    fn wait_after_reset() {
        let mut tracker = EventTracker::new();
        assert_eq!(tracker.reset_event(EVENT, TRANSFER, 0), None);

        let (scopes, misuses) =
            tracker.wait_events(&[EVENT], PipelineStages::ALL_COMMANDS, TRANSFER, 1);
        assert!(scopes.is_empty());
        assert_eq!(
            kinds(&misuses),
            vec![
                EventMisuseKind::WaitAfterReset,
                EventMisuseKind::WaitSourceStageMismatch {
                    set_stages: PipelineStages::empty(),
                    wait_stages: PipelineStages::ALL_COMMANDS,
                },
            ],
        );
    }

    #[test]
    fn reset_after_wait_needs_barrier() {
        let mut tracker = EventTracker::new();
        assert_eq!(tracker.set_event(EVENT, TRANSFER, 0), None);

        let (scopes, misuses) =
            tracker.wait_events(&[EVENT], TRANSFER, PipelineStages::FRAGMENT_SHADER, 1);
        assert!(misuses.is_empty());
        assert_eq!(
            scopes.as_slice(),
            &[EventScope {
                set_tag: 0,
                exec_scope: PipelineStages::TOP_OF_PIPE | TRANSFER,
            }],
        );

        let misuse = tracker.reset_event(EVENT, TRANSFER, 2).unwrap();
        assert_eq!(misuse.kind, EventMisuseKind::ResetMissingBarrierAfterWait);
        assert_eq!(misuse.prior_tag, Some(1));
    }

    #[test]
    fn barriers_order_event_operations() {
        let mut tracker = EventTracker::new();
        assert_eq!(tracker.reset_event(EVENT, TRANSFER, 0), None);
        assert_eq!(
            tracker.set_event(EVENT, TRANSFER, 1).map(|m| m.kind),
            Some(EventMisuseKind::SetMissingBarrierAfterReset),
        );

        tracker.apply_pipeline_barrier(PipelineStages::ALL_COMMANDS, PipelineStages::ALL_COMMANDS);
        assert_eq!(tracker.set_event(EVENT, TRANSFER, 2), None);

        let (_, misuses) = tracker.wait_events(&[EVENT], TRANSFER, TRANSFER, 3);
        assert!(misuses.is_empty());
        assert_eq!(tracker.reset_event(EVENT, TRANSFER, 4), None);

        tracker.apply_pipeline_barrier(PipelineStages::ALL_COMMANDS, PipelineStages::ALL_COMMANDS);
        assert_eq!(tracker.set_event(EVENT, TRANSFER, 5), None);
        assert_eq!(
            tracker.reset_event(EVENT, TRANSFER, 6).map(|m| m.kind),
            Some(EventMisuseKind::ResetMissingBarrierAfterSet),
        );
    }

    #[test]
    fn set_twice() {
        let mut tracker = EventTracker::new();
        assert_eq!(tracker.set_event(EVENT, TRANSFER, 0), None);
        assert_eq!(
            tracker.set_event(EVENT, TRANSFER, 1).map(|m| m.kind),
            Some(EventMisuseKind::SetMissingBarrierAfterSet),
        );

        tracker.reset();
        assert_eq!(tracker.set_event(EVENT, TRANSFER, 0), None);
    }

    #[test]
    fn unrelated_barrier_does_not_help() {
        let mut tracker = EventTracker::new();
        assert_eq!(tracker.set_event(EVENT, TRANSFER, 0), None);

        tracker.apply_pipeline_barrier(
            PipelineStages::COMPUTE_SHADER,
            PipelineStages::COMPUTE_SHADER,
        );
        assert!(tracker.reset_event(EVENT, TRANSFER, 1).is_some());
    }
}
