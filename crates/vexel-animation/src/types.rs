//! Core types shared across the timing engine.

use serde::{Deserialize, Serialize};

/// Unique identifier for an animation instance.
///
/// Ids are allocated by the [`Timeline`](crate::Timeline) that the animation is
/// constructed against, so they are unique per timeline rather than per
/// process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnimationId(pub u64);

impl std::fmt::Display for AnimationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "animation_{}", self.0)
    }
}

/// Reported playback state of an animation.
///
/// `Idle`, `Paused`, `Running` and `Finished` are mutually exclusive and are a
/// pure function of the animation's internal flags. `Pending` is the overlay
/// reported while a fresh start time or a seek is waiting for the next frame;
/// it only appears in reported state history, never in
/// [`Animation::play_state`](crate::Animation::play_state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayState {
    /// Not started or canceled.
    Idle,
    /// Waiting for the next frame to establish a start time or settle a seek.
    Pending,
    /// Paused at a fixed local time.
    Paused,
    /// Advancing with the timeline clock.
    Running,
    /// Local time has reached the boundary for the current playback direction.
    Finished,
}

impl std::fmt::Display for PlayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Paused => "paused",
            Self::Running => "running",
            Self::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Timing summary reported by an effect.
///
/// The engine only consumes `active_duration`; `end_time` is carried for
/// effects that apply a start delay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComputedTiming {
    /// Length of the active interval in milliseconds. May be `f64::INFINITY`.
    pub active_duration: f64,
    /// End of the effect including any delay, in milliseconds.
    pub end_time: f64,
}

impl ComputedTiming {
    /// Timing for an effect with no delay.
    pub fn from_duration(active_duration: f64) -> Self {
        Self {
            active_duration,
            end_time: active_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_animation_id_display() {
        assert_eq!(AnimationId(7).to_string(), "animation_7");
    }

    #[test]
    fn test_play_state_serialization() {
        let json = serde_json::to_string(&PlayState::Running).unwrap();
        assert_eq!(json, "\"running\"");

        let parsed: PlayState = serde_json::from_str("\"finished\"").unwrap();
        assert_eq!(parsed, PlayState::Finished);
    }

    #[test]
    fn test_computed_timing_from_duration() {
        let timing = ComputedTiming::from_duration(250.0);
        assert_eq!(timing.active_duration, 250.0);
        assert_eq!(timing.end_time, 250.0);

        let unbounded = ComputedTiming::from_duration(f64::INFINITY);
        assert!(unbounded.active_duration.is_infinite());
    }
}
