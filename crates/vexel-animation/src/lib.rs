//! Web-Animations-style timing engine for the vexel renderer.
//!
//! This crate provides:
//! - **Timeline**: the global per-frame driver and time source
//! - **Animation**: the playback state machine (play, pause, seek, reverse)
//! - **Lifecycle futures**: `ready`/`finished` handles with settle-once semantics
//! - **Playback events**: finish/cancel notifications for the host
//!
//! # Architecture
//!
//! ```text
//! Timeline (frame clock, dirty flag, event queue)
//!   └── Animation (state machine, lifecycle futures)
//!         └── AnimationEffect (opaque: sampling, in-effect status, timing)
//! ```
//!
//! Property resolution and interpolation are not part of this crate; they sit
//! behind the [`AnimationEffect`] trait in the host scene graph.

pub mod animation;
pub mod effect;
pub mod error;
pub mod events;
pub mod future;
pub mod timeline;
pub mod types;

pub use animation::Animation;
pub use effect::{AnimationEffect, SampleEffect, SampleProbe};
pub use error::{Result, TimingError};
pub use events::{EventQueue, PlaybackEvent};
pub use future::StateFuture;
pub use timeline::Timeline;
pub use types::{AnimationId, ComputedTiming, PlayState};
