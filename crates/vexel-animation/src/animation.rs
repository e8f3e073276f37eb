//! The animation state machine.
//!
//! An [`Animation`] binds one effect to one timeline and owns the playback
//! state that the Web Animations model exposes: play state, current time,
//! start time, playback rate and the `ready`/`finished` lifecycle futures.
//!
//! # Architecture
//!
//! The handle is a cheap `Rc` clone around interior state. The three booleans
//! `idle`, `paused` and `finished_flag`, together with the raw local time,
//! fully determine the reported play state; there is no stored state enum to
//! drift out of sync. While running with an established start time the local
//! time is always derived as `(timeline_time - start_time) * playback_rate`.
//!
//! Mutating operations never touch the effect directly. They funnel through
//! `tick_current_time` and `ensure_alive`, which push the local time into the
//! effect exactly once and re-register the animation with its timeline while
//! output is still visible.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use static_assertions::assert_not_impl_any;
use tracing::debug;

use crate::effect::AnimationEffect;
use crate::error::{Result, TimingError};
use crate::events::PlaybackEvent;
use crate::future::{StateFuture, StateSlot};
use crate::timeline::{Timeline, TimelineInner};
use crate::types::{AnimationId, PlayState};

type FinishCallback = Box<dyn FnMut(PlaybackEvent)>;

pub(crate) struct AnimationInner {
    effect: Box<dyn AnimationEffect>,
    idle: bool,
    paused: bool,
    finished_flag: bool,
    in_effect: bool,
    in_timeline: bool,
    current_time_pending: bool,
    current_time: f64,
    hold_time: f64,
    start_time: Option<f64>,
    playback_rate: f64,
    old_play_state: PlayState,
    ready_slot: Option<Rc<StateSlot>>,
    finished_slot: Option<Rc<StateSlot>>,
    onfinish: Option<FinishCallback>,
    oncancel: Option<FinishCallback>,
}

fn total_duration_of(inner: &AnimationInner) -> f64 {
    inner.effect.computed_timing().active_duration
}

fn is_finished(inner: &AnimationInner) -> bool {
    !inner.idle
        && ((inner.playback_rate > 0.0 && inner.current_time >= total_duration_of(inner))
            || (inner.playback_rate < 0.0 && inner.current_time <= 0.0))
}

fn play_state_of(inner: &AnimationInner) -> PlayState {
    if inner.idle {
        PlayState::Idle
    } else if is_finished(inner) {
        PlayState::Finished
    } else if inner.paused {
        PlayState::Paused
    } else {
        PlayState::Running
    }
}

fn pending_of(inner: &AnimationInner) -> bool {
    (inner.start_time.is_none() && !inner.paused && inner.playback_rate != 0.0)
        || inner.current_time_pending
}

fn visible_time_of(inner: &AnimationInner) -> Option<f64> {
    if inner.idle || inner.current_time_pending {
        None
    } else {
        Some(inner.current_time)
    }
}

/// Handle to one playing (or playable) animation.
///
/// Cloning is cheap and yields a second handle to the same animation. The
/// handle is single-threaded; it lives and dies with its timeline's thread.
#[derive(Clone)]
pub struct Animation {
    id: AnimationId,
    inner: Rc<RefCell<AnimationInner>>,
    timeline: Weak<RefCell<TimelineInner>>,
}

assert_not_impl_any!(Animation: Send, Sync);

impl Animation {
    /// Create an animation driving `effect` on `timeline`.
    ///
    /// The animation starts idle and is not yet a member of the timeline's
    /// tick set; [`play`](Self::play) (or a seek) activates it. The effect is
    /// sampled once at local time zero to establish its initial output.
    pub fn new(mut effect: Box<dyn AnimationEffect>, timeline: &Timeline) -> Self {
        let in_effect = effect.update(Some(0.0));
        let animation = Self {
            id: timeline.allocate_id(),
            inner: Rc::new(RefCell::new(AnimationInner {
                effect,
                idle: true,
                paused: false,
                finished_flag: true,
                in_effect,
                in_timeline: false,
                current_time_pending: false,
                current_time: 0.0,
                hold_time: 0.0,
                start_time: None,
                playback_rate: 1.0,
                old_play_state: PlayState::Idle,
                ready_slot: None,
                finished_slot: None,
                onfinish: None,
                oncancel: None,
            })),
            timeline: timeline.downgrade(),
        };
        animation.update_futures();
        animation
    }

    /// This animation's timeline-allocated id.
    pub fn id(&self) -> AnimationId {
        self.id
    }

    /// Target node id of the attached effect.
    pub fn target(&self) -> String {
        self.inner.borrow().effect.target_id().to_string()
    }

    /// Current playback state.
    pub fn play_state(&self) -> PlayState {
        play_state_of(&self.inner.borrow())
    }

    /// Whether a start time or an explicit seek is waiting for the next frame.
    pub fn pending(&self) -> bool {
        pending_of(&self.inner.borrow())
    }

    /// Active duration reported by the effect, in milliseconds.
    pub fn total_duration(&self) -> f64 {
        total_duration_of(&self.inner.borrow())
    }

    /// Current local time in milliseconds, or `None` while idle or while a
    /// seek is pending.
    pub fn current_time(&self) -> Option<f64> {
        self.update_futures();
        visible_time_of(&self.inner.borrow())
    }

    /// Timeline time at which local time zero falls, when established.
    pub fn start_time(&self) -> Option<f64> {
        self.inner.borrow().start_time
    }

    /// Last local time captured by [`pause`](Self::pause).
    pub fn hold_time(&self) -> f64 {
        self.inner.borrow().hold_time
    }

    /// Current playback rate. Negative plays backwards; zero freezes.
    pub fn playback_rate(&self) -> f64 {
        self.inner.borrow().playback_rate
    }

    /// Seek to `new_time` milliseconds of local time.
    ///
    /// Applies the effect at the new time immediately, without clamping to the
    /// active duration. A NaN input is silently ignored. Seeking an idle
    /// animation activates it in the paused state.
    pub fn set_current_time(&self, new_time: f64) {
        if new_time.is_nan() {
            return;
        }
        // Capture the clock before the seek resets it, so a running
        // animation's start time stays continuous with the frames the host
        // keeps feeding in.
        let timeline_now = self.timeline_time().unwrap_or(0.0);
        if let Some(timeline) = self.timeline.upgrade() {
            timeline.borrow_mut().current_time = None;
        }
        {
            let mut inner = self.inner.borrow_mut();
            if !inner.paused && inner.start_time.is_some() {
                inner.start_time = Some(timeline_now - new_time / inner.playback_rate);
            }
            inner.current_time_pending = false;
            if inner.current_time == new_time {
                return;
            }
            if inner.idle {
                inner.idle = false;
                inner.paused = true;
            }
        }
        self.tick_current_time(new_time, true);
        self.mark_dirty();
    }

    /// Pin local time zero to `new_time` on the timeline clock.
    ///
    /// Ignored while paused or idle, and for NaN input. The local time is
    /// re-derived from the new start time immediately.
    pub fn set_start_time(&self, new_time: f64) {
        if new_time.is_nan() {
            return;
        }
        self.update_futures();
        let rate = {
            let mut inner = self.inner.borrow_mut();
            if inner.paused || inner.idle {
                return;
            }
            inner.start_time = Some(new_time);
            inner.playback_rate
        };
        let timeline_now = self.timeline_time().unwrap_or(0.0);
        self.tick_current_time((timeline_now - new_time) * rate, false);
        self.mark_dirty();
        self.update_futures();
    }

    /// Change the playback rate, preserving the visible current time.
    ///
    /// The start time is cleared so the next frame derives a fresh one for
    /// the new rate. A NaN input is silently ignored.
    pub fn set_playback_rate(&self, value: f64) {
        if value.is_nan() {
            return;
        }
        if value == self.inner.borrow().playback_rate {
            return;
        }
        self.update_futures();
        let old_current_time = self.current_time();
        {
            let mut inner = self.inner.borrow_mut();
            inner.playback_rate = value;
            inner.start_time = None;
        }
        let state = self.play_state();
        if state != PlayState::Paused && state != PlayState::Idle {
            {
                let mut inner = self.inner.borrow_mut();
                inner.finished_flag = false;
                inner.idle = false;
            }
            self.ensure_alive();
            self.mark_dirty();
        }
        if let Some(t) = old_current_time {
            self.set_current_time(t);
        }
        self.update_futures();
    }

    /// Alias for [`set_playback_rate`](Self::set_playback_rate), matching the
    /// Web Animations surface.
    pub fn update_playback_rate(&self, rate: f64) {
        self.set_playback_rate(rate);
    }

    /// Start or resume playback.
    ///
    /// A finished or idle animation rewinds to its start point first. Fails
    /// with [`TimingError::InvalidRewind`] without mutating anything when the
    /// rewind target does not exist (negative rate, unbounded duration).
    pub fn play(&self) -> Result<()> {
        self.update_futures();
        let needs_rewind = {
            let inner = self.inner.borrow();
            let rewind = inner.idle || is_finished(&inner);
            if rewind && inner.playback_rate < 0.0 && total_duration_of(&inner).is_infinite() {
                return Err(TimingError::InvalidRewind);
            }
            rewind
        };
        self.inner.borrow_mut().paused = false;
        if needs_rewind {
            self.rewind()?;
            self.inner.borrow_mut().start_time = None;
        }
        {
            let mut inner = self.inner.borrow_mut();
            inner.finished_flag = false;
            inner.idle = false;
        }
        self.ensure_alive();
        self.mark_dirty();
        self.add_to_timeline();
        self.update_futures();
        Ok(())
    }

    /// Pause playback at the current local time.
    ///
    /// A running animation defers the commit to the next frame via the
    /// pending-seek flag; an idle animation rewinds first, which can fail the
    /// same way [`play`](Self::play) does.
    pub fn pause(&self) -> Result<()> {
        self.update_futures();
        if let Some(t) = self.current_time() {
            if t != 0.0 {
                self.inner.borrow_mut().hold_time = t;
            }
        }
        let (finished, paused, idle) = {
            let inner = self.inner.borrow();
            if inner.idle
                && inner.playback_rate < 0.0
                && total_duration_of(&inner).is_infinite()
            {
                return Err(TimingError::InvalidRewind);
            }
            (is_finished(&inner), inner.paused, inner.idle)
        };
        if !finished && !paused && !idle {
            self.inner.borrow_mut().current_time_pending = true;
        } else if idle {
            self.rewind()?;
            self.inner.borrow_mut().idle = false;
        }
        {
            let mut inner = self.inner.borrow_mut();
            inner.start_time = None;
            inner.paused = true;
        }
        self.update_futures();
        Ok(())
    }

    /// Jump to the end point for the current playback direction.
    ///
    /// No-op while idle.
    pub fn finish(&self) {
        self.update_futures();
        if self.inner.borrow().idle {
            return;
        }
        let end = {
            let inner = self.inner.borrow();
            if inner.playback_rate > 0.0 {
                total_duration_of(&inner)
            } else {
                0.0
            }
        };
        self.set_current_time(end);
        {
            let mut inner = self.inner.borrow_mut();
            inner.start_time = Some(total_duration_of(&inner) - inner.current_time);
            inner.current_time_pending = false;
        }
        self.mark_dirty();
        self.update_futures();
    }

    /// Cancel the animation, un-applying its effect.
    ///
    /// No-op unless the effect currently produces output. Outstanding
    /// lifecycle futures reject with [`TimingError::Canceled`]; a cancel
    /// event is delivered at the end of the next tick.
    pub fn cancel(&self) {
        self.update_futures();
        if !self.inner.borrow().in_effect {
            return;
        }
        let event = PlaybackEvent::Cancel {
            animation_id: self.id,
            target: self.target(),
            current_time: visible_time_of(&self.inner.borrow()),
            timeline_time: self.timeline_time(),
        };
        {
            let mut inner = self.inner.borrow_mut();
            inner.in_effect = false;
            inner.idle = true;
            inner.paused = false;
            inner.finished_flag = true;
            inner.current_time = 0.0;
            inner.start_time = None;
            inner.effect.update(None);
        }
        debug!(id = %self.id, "animation canceled");
        self.mark_dirty();
        self.defer_event(event);
        self.update_futures();
    }

    /// Reverse playback direction, keeping the visual position continuous.
    ///
    /// Fails like [`play`](Self::play) when reversing would require rewinding
    /// an unbounded animation, without mutating anything.
    pub fn reverse(&self) -> Result<()> {
        self.update_futures();
        {
            let inner = self.inner.borrow();
            let new_rate = -inner.playback_rate;
            let would_rewind = inner.idle
                || (new_rate > 0.0 && inner.current_time >= total_duration_of(&inner))
                || (new_rate < 0.0 && inner.current_time <= 0.0);
            if would_rewind && new_rate < 0.0 && total_duration_of(&inner).is_infinite() {
                return Err(TimingError::InvalidRewind);
            }
        }
        let old_current_time = self.current_time();
        let new_rate = -self.playback_rate();
        self.set_playback_rate(new_rate);
        self.play()?;
        if let Some(t) = old_current_time {
            self.set_current_time(t);
        }
        self.update_futures();
        Ok(())
    }

    /// Future resolving once the animation is ready to advance, i.e. when the
    /// pending start or seek has been committed by a frame. Rejects if the
    /// animation is canceled first.
    pub fn ready(&self) -> StateFuture {
        let (slot, created) = {
            let mut inner = self.inner.borrow_mut();
            match &inner.ready_slot {
                Some(slot) => (slot.clone(), false),
                None => {
                    let slot = StateSlot::new();
                    inner.ready_slot = Some(slot.clone());
                    (slot, true)
                }
            }
        };
        if created {
            self.track_futures();
            if !self.pending() {
                slot.resolve(self.clone());
            }
        }
        StateFuture::new(slot)
    }

    /// Future resolving once the animation finishes. Rejects if the animation
    /// is canceled first.
    pub fn finished(&self) -> StateFuture {
        let (slot, created) = {
            let mut inner = self.inner.borrow_mut();
            match &inner.finished_slot {
                Some(slot) => (slot.clone(), false),
                None => {
                    let slot = StateSlot::new();
                    inner.finished_slot = Some(slot.clone());
                    (slot, true)
                }
            }
        };
        if created {
            self.track_futures();
            if self.play_state() == PlayState::Finished {
                slot.resolve(self.clone());
            }
        }
        StateFuture::new(slot)
    }

    /// Install the finish callback, replacing any previous one. Fired at most
    /// once per finish transition, at the end of the tick that observed it.
    pub fn set_onfinish(&self, callback: impl FnMut(PlaybackEvent) + 'static) {
        self.inner.borrow_mut().onfinish = Some(Box::new(callback));
    }

    /// Remove the finish callback.
    pub fn clear_onfinish(&self) {
        self.inner.borrow_mut().onfinish = None;
    }

    /// Install the cancel callback, replacing any previous one.
    pub fn set_oncancel(&self, callback: impl FnMut(PlaybackEvent) + 'static) {
        self.inner.borrow_mut().oncancel = Some(Box::new(callback));
    }

    /// Remove the cancel callback.
    pub fn clear_oncancel(&self) {
        self.inner.borrow_mut().oncancel = None;
    }

    /// Not supported; effects never outlive their animation here.
    pub fn persist(&self) -> Result<()> {
        Err(TimingError::NotSupported("persist"))
    }

    /// Not supported; there is no style system to commit into.
    pub fn commit_styles(&self) -> Result<()> {
        Err(TimingError::NotSupported("commit_styles"))
    }

    /// Not supported; use [`set_onfinish`](Self::set_onfinish) and
    /// [`set_oncancel`](Self::set_oncancel) instead.
    pub fn add_event_listener(&self, _event_type: &str) -> Result<()> {
        Err(TimingError::NotSupported("add_event_listener"))
    }

    /// Not supported.
    pub fn remove_event_listener(&self, _event_type: &str) -> Result<()> {
        Err(TimingError::NotSupported("remove_event_listener"))
    }

    /// Not supported.
    pub fn dispatch_event(&self, _event: PlaybackEvent) -> Result<()> {
        Err(TimingError::NotSupported("dispatch_event"))
    }

    /// Advance this animation for a timeline frame.
    ///
    /// With no start time established, an animation-frame tick derives one
    /// from the current local time; otherwise the local time is re-derived
    /// from the clock and clamped at the finish boundary. Frame ticks also
    /// commit pending seeks and queue the finish transition.
    pub(crate) fn tick(&self, timeline_time: f64, is_animation_frame: bool) {
        let (idle, paused, start_time, current_time, rate) = {
            let inner = self.inner.borrow();
            (
                inner.idle,
                inner.paused,
                inner.start_time,
                inner.current_time,
                inner.playback_rate,
            )
        };
        if !idle && !paused {
            match start_time {
                // Rate zero never advances, so a start time would be
                // meaningless (and divide current time by zero).
                None => {
                    if is_animation_frame && rate != 0.0 {
                        self.set_start_time(timeline_time - current_time / rate);
                    }
                }
                Some(start) => {
                    let finished = is_finished(&self.inner.borrow());
                    if !finished {
                        self.tick_current_time((timeline_time - start) * rate, false);
                    }
                }
            }
        }
        if is_animation_frame {
            self.inner.borrow_mut().current_time_pending = false;
            self.queue_finish_transition(timeline_time);
        }
    }

    /// Head-and-tail reconcile pass for the lifecycle futures.
    ///
    /// Compares the previously reported play state (with the pending overlay)
    /// against the current one and settles or drops the slots accordingly.
    /// Returns whether any slot is still being tracked.
    pub(crate) fn update_futures(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        let old = inner.old_play_state;
        // Idle wins over the pending overlay so cancellation reliably rejects
        // both slots; an idle animation trivially has no established start.
        let new = if inner.idle {
            PlayState::Idle
        } else if pending_of(&inner) {
            PlayState::Pending
        } else {
            play_state_of(&inner)
        };
        if new != old {
            if let Some(slot) = inner.ready_slot.clone() {
                if new == PlayState::Idle {
                    slot.reject();
                    inner.ready_slot = None;
                } else if old == PlayState::Pending {
                    slot.resolve(self.clone());
                } else if new == PlayState::Pending {
                    inner.ready_slot = None;
                }
            }
            if let Some(slot) = inner.finished_slot.clone() {
                if new == PlayState::Idle {
                    slot.reject();
                    inner.finished_slot = None;
                } else if new == PlayState::Finished {
                    slot.resolve(self.clone());
                } else if old == PlayState::Finished {
                    inner.finished_slot = None;
                }
            }
        }
        inner.old_play_state = new;
        inner.ready_slot.is_some() || inner.finished_slot.is_some()
    }

    /// Deliver a deferred event to its callback slot. Called by the timeline
    /// during the end-of-tick flush.
    pub(crate) fn invoke_callback(&self, event: PlaybackEvent) {
        let taken = {
            let mut inner = self.inner.borrow_mut();
            match event {
                PlaybackEvent::Finish { .. } => inner.onfinish.take(),
                PlaybackEvent::Cancel { .. } => inner.oncancel.take(),
            }
        };
        // The callback runs without any borrow held so it may freely call
        // back into this animation; only restore it if it did not install a
        // replacement.
        if let Some(mut callback) = taken {
            let is_finish = event.is_finish();
            callback(event);
            let mut inner = self.inner.borrow_mut();
            let slot = if is_finish {
                &mut inner.onfinish
            } else {
                &mut inner.oncancel
            };
            if slot.is_none() {
                *slot = Some(callback);
            }
        }
    }

    fn rewind(&self) -> Result<()> {
        let (rate, total) = {
            let inner = self.inner.borrow();
            (inner.playback_rate, total_duration_of(&inner))
        };
        if rate >= 0.0 {
            self.set_current_time(0.0);
            Ok(())
        } else if total.is_finite() {
            self.set_current_time(total);
            Ok(())
        } else {
            Err(TimingError::InvalidRewind)
        }
    }

    fn tick_current_time(&self, new_time: f64, ignore_limit: bool) {
        if self.inner.borrow().current_time == new_time {
            return;
        }
        {
            let mut inner = self.inner.borrow_mut();
            inner.current_time = new_time;
            if !ignore_limit && is_finished(&inner) {
                inner.current_time = if inner.playback_rate > 0.0 {
                    total_duration_of(&inner)
                } else {
                    0.0
                };
            }
        }
        self.ensure_alive();
    }

    fn ensure_alive(&self) {
        let join_timeline = {
            let mut inner = self.inner.borrow_mut();
            let visible = visible_time_of(&inner);
            // A negative-rate animation sitting exactly at local time zero
            // samples one millisecond before zero so the effect un-applies at
            // the boundary instead of sticking at its first frame.
            inner.in_effect = if inner.playback_rate < 0.0 && visible == Some(0.0) {
                inner.effect.update(Some(-1.0))
            } else {
                inner.effect.update(visible)
            };
            !inner.in_timeline && (inner.in_effect || !inner.finished_flag)
        };
        if join_timeline {
            self.add_to_timeline();
        }
    }

    fn add_to_timeline(&self) {
        let Some(timeline) = self.timeline.upgrade() else {
            return;
        };
        {
            let mut timeline = timeline.borrow_mut();
            if !timeline.animations.iter().any(|a| a.id == self.id) {
                timeline.animations.push(self.clone());
            }
        }
        self.inner.borrow_mut().in_timeline = true;
    }

    fn track_futures(&self) {
        let Some(timeline) = self.timeline.upgrade() else {
            return;
        };
        let mut timeline = timeline.borrow_mut();
        if !timeline
            .animations_with_promises
            .iter()
            .any(|a| a.id == self.id)
        {
            timeline.animations_with_promises.push(self.clone());
        }
    }

    fn queue_finish_transition(&self, timeline_time: f64) {
        let transitioned = {
            let inner = self.inner.borrow();
            !inner.finished_flag && is_finished(&inner)
        };
        if !transitioned {
            return;
        }
        self.inner.borrow_mut().finished_flag = true;
        let event = PlaybackEvent::Finish {
            animation_id: self.id,
            target: self.target(),
            current_time: visible_time_of(&self.inner.borrow()),
            timeline_time: Some(timeline_time),
        };
        debug!(id = %self.id, timeline_time, "animation finished");
        self.defer_event(event);
    }

    fn defer_event(&self, event: PlaybackEvent) {
        if let Some(timeline) = self.timeline.upgrade() {
            timeline
                .borrow_mut()
                .deferred_events
                .push((self.clone(), event));
        }
    }

    fn mark_dirty(&self) {
        if let Some(timeline) = self.timeline.upgrade() {
            timeline.borrow_mut().dirty = true;
        }
    }

    fn timeline_time(&self) -> Option<f64> {
        self.timeline.upgrade().and_then(|t| t.borrow().current_time)
    }
}

impl std::fmt::Debug for Animation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Animation")
            .field("id", &self.id)
            .field("play_state", &play_state_of(&inner))
            .field("current_time", &visible_time_of(&inner))
            .field("playback_rate", &inner.playback_rate)
            .finish()
    }
}
