//! Error types for the timing engine.

use thiserror::Error;

/// Result type for timing operations.
pub type Result<T> = std::result::Result<T, TimingError>;

/// Errors that can occur while driving an animation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimingError {
    /// A rewind was requested for a negative-rate animation whose active
    /// duration is unbounded, so there is no end to rewind to.
    #[error("unable to rewind negative playback rate animation with infinite duration")]
    InvalidRewind,

    /// The awaited lifecycle state was abandoned because the animation was
    /// canceled first.
    #[error("animation was canceled before reaching the awaited state")]
    Canceled,

    /// The operation exists for API parity but is not supported by this engine.
    #[error("{0} is not supported")]
    NotSupported(&'static str),
}
