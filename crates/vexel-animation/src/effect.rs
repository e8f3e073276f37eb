//! The effect contract and a minimal sample implementation.
//!
//! The engine never interprets properties or keyframes itself. Everything it
//! knows about visual output goes through [`AnimationEffect`]: the animation
//! pushes a local time into the effect once per frame and the effect reports
//! whether it is currently producing output. Property resolution, easing and
//! interpolation live behind this trait in the host scene graph.

use crate::types::ComputedTiming;

/// Sampling contract between an animation and its visual effect.
///
/// `update` is called with `Some(local_time)` to sample the effect, or `None`
/// to un-apply it entirely (used by cancellation). The return value reports
/// whether the effect produced output for that time, which keeps the animation
/// registered with its timeline while anything is still visible.
pub trait AnimationEffect {
    /// Sample the effect at `local_time` milliseconds, or un-apply it when
    /// `None`. Returns whether the effect is in effect at that time.
    fn update(&mut self, local_time: Option<f64>) -> bool;

    /// Timing summary for this effect.
    fn computed_timing(&self) -> ComputedTiming;

    /// Identifier of the scene node this effect targets.
    fn target_id(&self) -> &str;
}

/// Shared read handle onto a [`SampleEffect`]'s current value.
///
/// The effect itself is owned by the animation once attached; the probe lets
/// the host keep observing the sampled value from outside.
#[derive(Debug, Clone)]
pub struct SampleProbe {
    value: std::rc::Rc<std::cell::Cell<f64>>,
}

impl SampleProbe {
    /// Current sampled value.
    pub fn get(&self) -> f64 {
        self.value.get()
    }
}

/// Linear scalar ramp used by the demo driver and tests.
///
/// Samples `from..to` linearly over `duration_ms` and reports being in effect
/// for local times inside the active interval. Out-of-range samples clamp the
/// value but report not-in-effect, which models a fill mode of `none`.
#[derive(Debug)]
pub struct SampleEffect {
    target: String,
    duration_ms: f64,
    from: f64,
    to: f64,
    value: std::rc::Rc<std::cell::Cell<f64>>,
}

impl SampleEffect {
    /// Create an effect targeting `target` with the given active duration.
    pub fn new(target: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            target: target.into(),
            duration_ms,
            from: 0.0,
            to: 1.0,
            value: std::rc::Rc::new(std::cell::Cell::new(0.0)),
        }
    }

    /// Set the output range sampled over the active interval.
    pub fn with_range(mut self, from: f64, to: f64) -> Self {
        self.from = from;
        self.to = to;
        self.value.set(from);
        self
    }

    /// Current sampled value.
    pub fn value(&self) -> f64 {
        self.value.get()
    }

    /// Read handle that stays valid after the effect is attached.
    pub fn probe(&self) -> SampleProbe {
        SampleProbe {
            value: self.value.clone(),
        }
    }
}

impl AnimationEffect for SampleEffect {
    fn update(&mut self, local_time: Option<f64>) -> bool {
        let Some(t) = local_time else {
            self.value.set(self.from);
            return false;
        };

        let progress = if self.duration_ms > 0.0 {
            (t / self.duration_ms).clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.value.set(self.from + (self.to - self.from) * progress);

        t >= 0.0 && t < self.duration_ms
    }

    fn computed_timing(&self) -> ComputedTiming {
        ComputedTiming::from_duration(self.duration_ms)
    }

    fn target_id(&self) -> &str {
        &self.target
    }
}
