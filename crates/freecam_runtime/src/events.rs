// SPDX-License-Identifier: MIT OR Apache-2.0
//! Playback notifications.
//!
//! Events raised while the registry lock is held are queued and handed out
//! afterwards, in the order they were raised. Batches from every caller go
//! through one [`Dispatcher`] FIFO, so that order also holds across threads.

use crate::host::HostServices;
use crate::state::TimelineId;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;

/// What happened to a timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimelineEventKind {
    /// Playback started (or was switched to)
    PlaybackStarted,
    /// Playback stopped (or was switched away from)
    PlaybackStopped,
    /// A wait-mode timeline reached its end
    PlaybackCompleted,
}

impl TimelineEventKind {
    /// Message type number on the bus
    pub fn message_type(&self) -> u32 {
        match self {
            Self::PlaybackStarted => 0,
            Self::PlaybackStopped => 1,
            Self::PlaybackCompleted => 2,
        }
    }

    /// Script callback name
    pub fn script_event_name(&self) -> &'static str {
        match self {
            Self::PlaybackStarted => "OnTimelinePlaybackStarted",
            Self::PlaybackStopped => "OnTimelinePlaybackStopped",
            Self::PlaybackCompleted => "OnTimelinePlaybackCompleted",
        }
    }
}

/// A notification about one timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimelineEvent {
    /// What happened
    pub kind: TimelineEventKind,
    /// Which timeline
    pub timeline: TimelineId,
}

impl fmt::Display for TimelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind.script_event_name(), self.timeline)
    }
}

/// Script object registered for timeline callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReceiverHandle(pub u32);

impl fmt::Display for ReceiverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// Events waiting for the lock to be released
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    pending: Vec<TimelineEvent>,
}

impl EventQueue {
    pub(crate) fn push(&mut self, kind: TimelineEventKind, timeline: TimelineId) {
        self.pending.push(TimelineEvent { kind, timeline });
    }

    pub(crate) fn take(&mut self) -> Vec<TimelineEvent> {
        std::mem::take(&mut self.pending)
    }
}

/// Events of one manager call, with the receivers registered at the time
#[derive(Debug)]
struct Batch {
    events: Vec<TimelineEvent>,
    receivers: Vec<ReceiverHandle>,
}

#[derive(Debug, Default)]
struct DispatchState {
    pending: VecDeque<Batch>,
    draining: bool,
}

/// Ordered hand-off from the registry lock to the host.
///
/// Batches must be enqueued while the registry lock is still held. After
/// releasing it, the caller drains: if another thread (or an outer frame of
/// the same thread) is already draining, the batch is left to it.
#[derive(Debug, Default)]
pub(crate) struct Dispatcher {
    state: Mutex<DispatchState>,
}

/// Clears the draining flag if a callback unwinds mid-delivery
struct DrainGuard<'a>(&'a Mutex<DispatchState>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().draining = false;
        }
    }
}

impl Dispatcher {
    pub(crate) fn enqueue(&self, events: Vec<TimelineEvent>, receivers: Vec<ReceiverHandle>) {
        if events.is_empty() {
            return;
        }
        self.state.lock().pending.push_back(Batch { events, receivers });
    }

    /// Deliver queued batches until the queue is empty. Must not be called
    /// with the registry lock held.
    pub(crate) fn drain(&self, host: &HostServices) {
        {
            let mut state = self.state.lock();
            if state.draining || state.pending.is_empty() {
                return;
            }
            state.draining = true;
        }
        let _guard = DrainGuard(&self.state);
        loop {
            let batch = {
                let mut state = self.state.lock();
                match state.pending.pop_front() {
                    Some(batch) => batch,
                    None => {
                        state.draining = false;
                        return;
                    }
                }
            };
            deliver(host, &batch.events, &batch.receivers);
        }
    }
}

/// Hand events to the bus and every receiver, in order
fn deliver(host: &HostServices, events: &[TimelineEvent], receivers: &[ReceiverHandle]) {
    for event in events {
        host.bus.dispatch(event);
        for receiver in receivers {
            host.scripts
                .notify(*receiver, event.kind.script_event_name(), event.timeline);
        }
        tracing::info!(
            "Sent event '{}' for timeline {} to {} receivers",
            event.kind.script_event_name(),
            event.timeline,
            receivers.len()
        );
    }
}
