//! Single-slot futures backing the `ready` and `finished` lifecycle handles.
//!
//! Each animation owns at most one ready slot and one finished slot. A slot
//! settles at most once: it either resolves with the animation handle or
//! rejects when the animation is canceled first. Multiple futures may observe
//! the same slot; all of them see the same outcome. Settled slots are dropped
//! by the animation when it leaves the corresponding state, so a later access
//! mints a fresh unsettled slot.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::animation::Animation;
use crate::error::TimingError;

enum SlotState {
    Unsettled,
    Resolved(Animation),
    Rejected,
}

/// Shared settlement slot for one lifecycle transition.
pub(crate) struct StateSlot {
    state: RefCell<SlotState>,
    wakers: RefCell<Vec<Waker>>,
}

impl StateSlot {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(SlotState::Unsettled),
            wakers: RefCell::new(Vec::new()),
        })
    }

    /// Resolve with the animation handle. No-op if already settled.
    pub(crate) fn resolve(&self, animation: Animation) {
        {
            let mut state = self.state.borrow_mut();
            if !matches!(*state, SlotState::Unsettled) {
                return;
            }
            *state = SlotState::Resolved(animation);
        }
        self.wake_all();
    }

    /// Reject with [`TimingError::Canceled`]. No-op if already settled.
    pub(crate) fn reject(&self) {
        {
            let mut state = self.state.borrow_mut();
            if !matches!(*state, SlotState::Unsettled) {
                return;
            }
            *state = SlotState::Rejected;
        }
        self.wake_all();
    }

    pub(crate) fn is_settled(&self) -> bool {
        !matches!(*self.state.borrow(), SlotState::Unsettled)
    }

    fn wake_all(&self) {
        for waker in self.wakers.borrow_mut().drain(..) {
            waker.wake();
        }
    }
}

/// Future for an animation lifecycle transition.
///
/// Returned by [`Animation::ready`](crate::Animation::ready) and
/// [`Animation::finished`](crate::Animation::finished). Resolves with a clone
/// of the animation handle once the transition is observed by a timeline tick,
/// or fails with [`TimingError::Canceled`].
pub struct StateFuture {
    slot: Rc<StateSlot>,
}

impl StateFuture {
    pub(crate) fn new(slot: Rc<StateSlot>) -> Self {
        Self { slot }
    }

    /// Check whether the underlying slot has settled.
    pub fn is_settled(&self) -> bool {
        self.slot.is_settled()
    }
}

impl Future for StateFuture {
    type Output = Result<Animation, TimingError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &*self.slot.state.borrow() {
            SlotState::Unsettled => {
                self.slot.wakers.borrow_mut().push(cx.waker().clone());
                Poll::Pending
            }
            SlotState::Resolved(animation) => Poll::Ready(Ok(animation.clone())),
            SlotState::Rejected => Poll::Ready(Err(TimingError::Canceled)),
        }
    }
}
