//! The per-frame driver and time source.
//!
//! A [`Timeline`] owns the frame clock and the set of animations associated
//! with it. The host render loop calls [`tick`](Timeline::tick) once per
//! frame with the frame time in milliseconds; everything else (advancing
//! local times, settling lifecycle futures, delivering finish and cancel
//! events) happens inside that call, synchronously and in a fixed order.
//!
//! # Architecture
//!
//! ```text
//! Timeline::tick(frame_time)
//!   ├── clock update (non-monotonic input clamped)
//!   ├── Animation::tick for every member, insertion order
//!   ├── future reconcile pass over promise-holding animations
//!   └── flush of deferred finish/cancel events and callbacks
//! ```
//!
//! The timeline also carries the render dirty flag: operations that change an
//! effect's output outside the tick loop mark it, and the host checks
//! [`needs_redraw`](Timeline::needs_redraw) to decide whether to schedule a
//! frame.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use static_assertions::assert_not_impl_any;
use tracing::{debug, trace, warn};

use crate::animation::Animation;
use crate::events::{EventQueue, PlaybackEvent};
use crate::types::AnimationId;

pub(crate) struct TimelineInner {
    pub(crate) current_time: Option<f64>,
    pub(crate) animations: Vec<Animation>,
    pub(crate) animations_with_promises: Vec<Animation>,
    pub(crate) deferred_events: Vec<(Animation, PlaybackEvent)>,
    pub(crate) events: EventQueue,
    pub(crate) next_animation_id: u64,
    pub(crate) dirty: bool,
}

/// Per-frame driver shared by all animations of one document.
///
/// Cloning yields another handle to the same timeline. Single-threaded by
/// construction; drive it from the render loop's thread only.
#[derive(Clone)]
pub struct Timeline {
    inner: Rc<RefCell<TimelineInner>>,
}

assert_not_impl_any!(Timeline: Send, Sync);

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Timeline {
    /// Create an empty timeline with an unset clock.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(TimelineInner {
                current_time: None,
                animations: Vec::new(),
                animations_with_promises: Vec::new(),
                deferred_events: Vec::new(),
                events: EventQueue::new(),
                next_animation_id: 0,
                dirty: false,
            })),
        }
    }

    /// Current clock value in milliseconds, or `None` before the first tick
    /// (and after [`restart`](Self::restart)).
    pub fn current_time(&self) -> Option<f64> {
        self.inner.borrow().current_time
    }

    /// Number of animations associated with this timeline.
    pub fn animation_count(&self) -> usize {
        self.inner.borrow().animations.len()
    }

    /// Advance the timeline to `frame_time` milliseconds.
    ///
    /// Frame times must not move backwards; non-monotonic input is clamped to
    /// the current clock and logged. Within one call the order is fixed:
    /// clock update, per-animation ticks in insertion order, the future
    /// reconcile pass, then the deferred event flush.
    pub fn tick(&self, frame_time: f64) {
        let (time, animations) = {
            let mut inner = self.inner.borrow_mut();
            let time = match inner.current_time {
                Some(current) if frame_time < current => {
                    warn!(frame_time, current, "non-monotonic frame time, clamping");
                    current
                }
                _ => frame_time,
            };
            inner.current_time = Some(time);
            // Animations may rejoin the set mid-loop; iterate a snapshot.
            (time, inner.animations.clone())
        };
        trace!(time, animations = animations.len(), "timeline tick");

        for animation in &animations {
            animation.tick(time, true);
        }

        let tracked = std::mem::take(&mut self.inner.borrow_mut().animations_with_promises);
        let retained: Vec<Animation> = tracked
            .into_iter()
            .filter(|animation| animation.update_futures())
            .collect();
        {
            let mut inner = self.inner.borrow_mut();
            for animation in retained {
                if !inner
                    .animations_with_promises
                    .iter()
                    .any(|a| a.id() == animation.id())
                {
                    inner.animations_with_promises.push(animation);
                }
            }
        }

        // Callbacks run strictly after future settlement for the same
        // transition, and with no timeline borrow held.
        let deferred = std::mem::take(&mut self.inner.borrow_mut().deferred_events);
        for (animation, event) in deferred {
            self.inner.borrow_mut().events.push(event.clone());
            animation.invoke_callback(event);
        }
    }

    /// Reset the clock so the next frame time is accepted unconditionally.
    ///
    /// Used when an animation's current time is mutated directly. Settles no
    /// futures and delivers no events.
    pub fn restart(&self) {
        debug!("timeline restart");
        self.inner.borrow_mut().current_time = None;
    }

    /// Record that `animation`'s effect output changed outside the tick loop
    /// and a re-render is needed before the next frame.
    pub fn apply_dirtied_animation(&self, animation: &Animation) {
        trace!(id = %animation.id(), "animation dirtied");
        self.inner.borrow_mut().dirty = true;
    }

    /// Whether any effect output changed since the last
    /// [`clear_dirty`](Self::clear_dirty).
    pub fn needs_redraw(&self) -> bool {
        self.inner.borrow().dirty
    }

    /// Acknowledge the dirty flag after rendering a frame.
    pub fn clear_dirty(&self) {
        self.inner.borrow_mut().dirty = false;
    }

    /// Drain all pending playback events.
    pub fn drain_events(&self) -> Vec<PlaybackEvent> {
        self.inner.borrow_mut().events.drain().collect()
    }

    pub(crate) fn allocate_id(&self) -> AnimationId {
        let mut inner = self.inner.borrow_mut();
        inner.next_animation_id += 1;
        AnimationId(inner.next_animation_id)
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<TimelineInner>> {
        Rc::downgrade(&self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::test_effect::RecordingEffect;
    use crate::effect::SampleEffect;
    use crate::error::TimingError;
    use crate::types::PlayState;
    use std::cell::Cell;
    use std::future::Future;
    use std::pin::pin;
    use std::rc::Rc;
    use std::task::{Context, Poll, Waker};

    #[test]
    fn test_clock_starts_unset_and_follows_ticks() {
        let timeline = Timeline::new();
        assert_eq!(timeline.current_time(), None);

        timeline.tick(16.67);
        assert_eq!(timeline.current_time(), Some(16.67));

        timeline.tick(33.33);
        assert_eq!(timeline.current_time(), Some(33.33));
    }

    #[test]
    fn test_non_monotonic_frame_time_is_clamped() {
        let timeline = Timeline::new();
        let (effect, _) = RecordingEffect::new(1000.0);
        let animation = Animation::new(Box::new(effect), &timeline);
        animation.play().unwrap();

        timeline.tick(0.0);
        timeline.tick(400.0);
        assert_eq!(animation.current_time(), Some(400.0));

        // The clock refuses to move backwards and the animation holds.
        timeline.tick(100.0);
        assert_eq!(timeline.current_time(), Some(400.0));
        assert_eq!(animation.current_time(), Some(400.0));
    }

    #[test]
    fn test_restart_accepts_earlier_frame_time() {
        let timeline = Timeline::new();
        timeline.tick(1000.0);

        timeline.restart();
        assert_eq!(timeline.current_time(), None);

        timeline.tick(10.0);
        assert_eq!(timeline.current_time(), Some(10.0));
    }

    #[test]
    fn test_playing_twice_does_not_duplicate_membership() {
        let timeline = Timeline::new();
        let animation = Animation::new(Box::new(SampleEffect::new("n", 100.0)), &timeline);

        animation.play().unwrap();
        animation.play().unwrap();
        assert_eq!(timeline.animation_count(), 1);
    }

    #[test]
    fn test_animations_tick_in_insertion_order() {
        let timeline = Timeline::new();
        let (first_effect, _) = RecordingEffect::new(100.0);
        let (second_effect, _) = RecordingEffect::new(100.0);
        let first = Animation::new(
            Box::new(first_effect.with_target("node_a")),
            &timeline,
        );
        let second = Animation::new(
            Box::new(second_effect.with_target("node_b")),
            &timeline,
        );

        // Play in reverse creation order; membership follows play order.
        second.play().unwrap();
        first.play().unwrap();

        timeline.tick(0.0);
        timeline.tick(200.0);
        timeline.tick(300.0);

        // Both finish on the same frame, so event order mirrors tick order.
        let events = timeline.drain_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].animation_id(), second.id());
        assert_eq!(events[1].animation_id(), first.id());
    }

    #[test]
    fn test_dirty_flag_tracks_out_of_band_changes() {
        let timeline = Timeline::new();
        let animation = Animation::new(Box::new(SampleEffect::new("n", 100.0)), &timeline);
        assert!(!timeline.needs_redraw());

        animation.play().unwrap();
        assert!(timeline.needs_redraw());

        timeline.clear_dirty();
        assert!(!timeline.needs_redraw());

        timeline.apply_dirtied_animation(&animation);
        assert!(timeline.needs_redraw());
    }

    #[test]
    fn test_futures_settle_exactly_once_across_ticks() {
        let timeline = Timeline::new();
        let (effect, _) = RecordingEffect::new(1000.0);
        let animation = Animation::new(Box::new(effect), &timeline);
        animation.play().unwrap();

        let mut ready = pin!(animation.ready());
        let mut finished = pin!(animation.finished());
        let mut cx = Context::from_waker(Waker::noop());

        assert!(ready.as_mut().poll(&mut cx).is_pending());
        assert!(finished.as_mut().poll(&mut cx).is_pending());

        timeline.tick(0.0);
        assert!(matches!(ready.as_mut().poll(&mut cx), Poll::Ready(Ok(_))));
        assert!(finished.as_mut().poll(&mut cx).is_pending());

        timeline.tick(500.0);
        assert!(finished.as_mut().poll(&mut cx).is_pending());

        timeline.tick(1000.0);
        match finished.as_mut().poll(&mut cx) {
            Poll::Ready(Ok(resolved)) => assert_eq!(resolved.id(), animation.id()),
            _ => panic!("finished future should resolve at the t=1000 tick"),
        }

        // Later ticks observe the same settled outcome, not a fresh one.
        timeline.tick(1500.0);
        assert!(matches!(ready.as_mut().poll(&mut cx), Poll::Ready(Ok(_))));
        assert!(matches!(finished.as_mut().poll(&mut cx), Poll::Ready(Ok(_))));
    }

    #[test]
    fn test_settled_future_blocks_on_completion() {
        let timeline = Timeline::new();
        let (effect, _) = RecordingEffect::new(500.0);
        let animation = Animation::new(Box::new(effect), &timeline);
        animation.play().unwrap();

        timeline.tick(0.0);
        timeline.tick(600.0);

        let resolved = pollster::block_on(animation.finished()).unwrap();
        assert_eq!(resolved.id(), animation.id());
        assert_eq!(resolved.play_state(), PlayState::Finished);
    }

    #[test]
    fn test_cancel_rejects_outstanding_futures() {
        let timeline = Timeline::new();
        let (effect, _) = RecordingEffect::new(1000.0);
        let animation = Animation::new(Box::new(effect), &timeline);
        animation.play().unwrap();

        // Both futures taken while the start is still pending.
        let ready = animation.ready();
        let finished = animation.finished();

        animation.cancel();
        assert!(matches!(
            pollster::block_on(ready),
            Err(TimingError::Canceled)
        ));
        assert!(matches!(
            pollster::block_on(finished),
            Err(TimingError::Canceled)
        ));
    }

    #[test]
    fn test_leaving_finished_mints_a_fresh_finished_future() {
        let timeline = Timeline::new();
        let (effect, _) = RecordingEffect::new(500.0);
        let animation = Animation::new(Box::new(effect), &timeline);
        animation.play().unwrap();
        timeline.tick(0.0);
        timeline.tick(600.0);

        let first = animation.finished();
        assert!(first.is_settled());

        animation.play().unwrap();
        let second = animation.finished();
        assert!(!second.is_settled());

        timeline.tick(700.0);
        timeline.tick(1200.0);
        assert!(second.is_settled());
        assert!(pollster::block_on(second).is_ok());
    }

    #[test]
    fn test_onfinish_fires_exactly_once_per_transition() {
        let timeline = Timeline::new();
        let (effect, _) = RecordingEffect::new(1000.0);
        let animation = Animation::new(Box::new(effect), &timeline);
        let calls = Rc::new(Cell::new(0u32));
        let seen = Rc::new(RefCell::new(None));
        {
            let calls = calls.clone();
            let seen = seen.clone();
            animation.set_onfinish(move |event| {
                calls.set(calls.get() + 1);
                *seen.borrow_mut() = Some(event);
            });
        }
        animation.play().unwrap();

        timeline.tick(0.0);
        timeline.tick(500.0);
        assert_eq!(calls.get(), 0);

        timeline.tick(1000.0);
        assert_eq!(calls.get(), 1);

        timeline.tick(1500.0);
        timeline.tick(2000.0);
        assert_eq!(calls.get(), 1);

        let event = seen.borrow_mut().take().unwrap();
        assert!(event.is_finish());
        assert_eq!(event.current_time(), Some(1000.0));
        assert_eq!(event.animation_id(), animation.id());
    }

    #[test]
    fn test_finish_event_is_drainable_by_the_host() {
        let timeline = Timeline::new();
        let (effect, _) = RecordingEffect::new(300.0);
        let animation = Animation::new(Box::new(effect.with_target("hero")), &timeline);
        animation.play().unwrap();

        timeline.tick(0.0);
        assert!(timeline.drain_events().is_empty());

        timeline.tick(350.0);
        let events = timeline.drain_events();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_finish());
        assert_eq!(events[0].target(), "hero");

        // Draining consumes; nothing is re-delivered.
        timeline.tick(400.0);
        assert!(timeline.drain_events().is_empty());
    }

    #[test]
    fn test_oncancel_fires_on_the_next_tick() {
        let timeline = Timeline::new();
        let (effect, _) = RecordingEffect::new(1000.0);
        let animation = Animation::new(Box::new(effect), &timeline);
        let calls = Rc::new(Cell::new(0u32));
        {
            let calls = calls.clone();
            animation.set_oncancel(move |event| {
                assert!(event.is_cancel());
                calls.set(calls.get() + 1);
            });
        }
        animation.play().unwrap();
        timeline.tick(0.0);
        timeline.tick(200.0);

        animation.cancel();
        assert_eq!(calls.get(), 0);

        timeline.tick(300.0);
        assert_eq!(calls.get(), 1);
        let events = timeline.drain_events();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_cancel());
        assert_eq!(events[0].current_time(), Some(200.0));
    }

    #[test]
    fn test_replay_can_finish_again() {
        let timeline = Timeline::new();
        let (effect, _) = RecordingEffect::new(400.0);
        let animation = Animation::new(Box::new(effect), &timeline);
        let calls = Rc::new(Cell::new(0u32));
        {
            let calls = calls.clone();
            animation.set_onfinish(move |_| calls.set(calls.get() + 1));
        }

        animation.play().unwrap();
        timeline.tick(0.0);
        timeline.tick(500.0);
        assert_eq!(calls.get(), 1);

        animation.play().unwrap();
        timeline.tick(600.0);
        timeline.tick(1100.0);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_ids_are_unique_per_timeline() {
        let timeline = Timeline::new();
        let a = Animation::new(Box::new(SampleEffect::new("a", 1.0)), &timeline);
        let b = Animation::new(Box::new(SampleEffect::new("b", 1.0)), &timeline);
        assert_ne!(a.id(), b.id());
    }
}
