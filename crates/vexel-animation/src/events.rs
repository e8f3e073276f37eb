//! Playback lifecycle events.
//!
//! The engine raises exactly two event kinds: `Finish` when an animation's
//! local time reaches the boundary for its playback direction, and `Cancel`
//! when it is torn down early. Both are deferred: they become observable at
//! the end of the next timeline tick, after lifecycle futures for the same
//! transition have settled. The host drains the queue after each tick.
//!
//! # Usage
//!
//! ```ignore
//! use vexel_animation::{PlaybackEvent, Timeline};
//!
//! let timeline = Timeline::new();
//! // ...play animations...
//! timeline.tick(16.67);
//!
//! for event in timeline.drain_events() {
//!     match event {
//!         PlaybackEvent::Finish { target, .. } => println!("{target} finished"),
//!         PlaybackEvent::Cancel { target, .. } => println!("{target} canceled"),
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::types::AnimationId;

/// Event emitted when an animation reaches a lifecycle boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// The animation reached its finish boundary.
    Finish {
        /// The animation instance ID.
        animation_id: AnimationId,
        /// The node the animation's effect targets.
        target: String,
        /// The animation's local time when the event was raised.
        current_time: Option<f64>,
        /// The timeline clock when the event was raised.
        timeline_time: Option<f64>,
    },
    /// The animation was canceled before completion.
    Cancel {
        /// The animation instance ID.
        animation_id: AnimationId,
        /// The node the animation's effect targeted.
        target: String,
        /// The animation's local time just before cancellation.
        current_time: Option<f64>,
        /// The timeline clock when the event was raised.
        timeline_time: Option<f64>,
    },
}

impl PlaybackEvent {
    /// Get the animation ID for this event.
    pub fn animation_id(&self) -> AnimationId {
        match self {
            Self::Finish { animation_id, .. } | Self::Cancel { animation_id, .. } => *animation_id,
        }
    }

    /// Get the target node ID for this event.
    pub fn target(&self) -> &str {
        match self {
            Self::Finish { target, .. } | Self::Cancel { target, .. } => target,
        }
    }

    /// Get the animation's local time when the event was raised.
    pub fn current_time(&self) -> Option<f64> {
        match self {
            Self::Finish { current_time, .. } | Self::Cancel { current_time, .. } => *current_time,
        }
    }

    /// Check if this is a finish event.
    pub fn is_finish(&self) -> bool {
        matches!(self, Self::Finish { .. })
    }

    /// Check if this is a cancel event.
    pub fn is_cancel(&self) -> bool {
        matches!(self, Self::Cancel { .. })
    }
}

/// Queue for collecting playback events during tick cycles.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<PlaybackEvent>,
}

impl EventQueue {
    /// Create a new empty event queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an event onto the queue.
    pub fn push(&mut self, event: PlaybackEvent) {
        self.events.push_back(event);
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get the number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Pop the next event from the queue.
    pub fn pop(&mut self) -> Option<PlaybackEvent> {
        self.events.pop_front()
    }

    /// Drain all events from the queue, returning an iterator.
    pub fn drain(&mut self) -> impl Iterator<Item = PlaybackEvent> + '_ {
        self.events.drain(..)
    }

    /// Peek at the next event without removing it.
    pub fn peek(&self) -> Option<&PlaybackEvent> {
        self.events.front()
    }

    /// Clear all pending events.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Get events for a specific target node.
    pub fn events_for_target(&self, target: &str) -> Vec<&PlaybackEvent> {
        self.events.iter().filter(|e| e.target() == target).collect()
    }
}
