//! Coalescing cleanup timer.
//!
//! # Responsibilities
//! - Keep at most one pending sweep timer for the whole directory
//! - Replace the pending timer when a sooner deadline is requested
//!
//! # Design Decisions
//! - Explicit `Idle`/`Armed` state machine; the armed deadline is the only
//!   deadline compared against
//! - Timers fire a short lead time after the nominal deadline to absorb
//!   scheduling skew
//! - Each armed timer carries a generation; a timer that was replaced but had
//!   already woken up is recognised and ignored

use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::Instant;

use super::channel::Retirement;

const MIN_LEAD: Duration = Duration::from_millis(1);
const MAX_LEAD: Duration = Duration::from_secs(5);

/// Extra wait added after a nominal deadline: a tenth of the delay, between
/// 1ms and 5s.
pub fn lead_time(delay: Duration) -> Duration {
    (delay / 10).clamp(MIN_LEAD, MAX_LEAD)
}

/// Pending timer state.
#[derive(Debug)]
pub(crate) enum TimerState {
    Idle,
    Armed {
        /// Nominal deadline this timer was armed for.
        deadline: Instant,
        generation: u64,
        task: AbortHandle,
    },
}

/// What a cleanup request did to the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupRequest {
    /// Infinite delay, or a pending timer is already due sooner.
    Unchanged,
    /// A new timer was armed.
    Armed,
    /// The pending timer was cancelled for a sooner one.
    Replaced,
    /// No runtime was available to arm a timer.
    Unavailable,
}

#[derive(Debug)]
pub(crate) struct CleanupTimer {
    state: TimerState,
    generation: u64,
}

impl CleanupTimer {
    pub(crate) fn new() -> Self {
        Self {
            state: TimerState::Idle,
            generation: 0,
        }
    }

    /// Ask for a sweep after `delay`.
    ///
    /// `arm` spawns the timer task for the given wait and generation; it
    /// returns `None` when no timer can be spawned.
    pub(crate) fn request<F>(&mut self, delay: Retirement, now: Instant, arm: F) -> CleanupRequest
    where
        F: FnOnce(Duration, u64) -> Option<AbortHandle>,
    {
        let Retirement::After(delay) = delay else {
            return CleanupRequest::Unchanged;
        };
        // A deadline past the clock's range is the same as never.
        let (Some(deadline), Some(wait)) = (now.checked_add(delay), delay.checked_add(lead_time(delay))) else {
            return CleanupRequest::Unchanged;
        };

        let mut replaced = false;
        if let TimerState::Armed { deadline: current, task, .. } = &self.state {
            if deadline >= *current {
                return CleanupRequest::Unchanged;
            }
            task.abort();
            self.state = TimerState::Idle;
            replaced = true;
        }

        self.generation += 1;
        let generation = self.generation;
        match arm(wait, generation) {
            Some(task) => {
                self.state = TimerState::Armed { deadline, generation, task };
                if replaced {
                    CleanupRequest::Replaced
                } else {
                    CleanupRequest::Armed
                }
            }
            None => CleanupRequest::Unavailable,
        }
    }

    /// Called by a timer task when it wakes. Returns true if it is still the
    /// pending timer, in which case the state is back to `Idle`.
    pub(crate) fn fire(&mut self, generation: u64) -> bool {
        match self.state {
            TimerState::Armed { generation: armed, .. } if armed == generation => {
                self.state = TimerState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Nominal deadline of the pending timer.
    pub(crate) fn pending_deadline(&self) -> Option<Instant> {
        match self.state {
            TimerState::Armed { deadline, .. } => Some(deadline),
            TimerState::Idle => None,
        }
    }

    /// Cancel any pending timer.
    pub(crate) fn cancel(&mut self) {
        if let TimerState::Armed { task, .. } = &self.state {
            task.abort();
        }
        self.state = TimerState::Idle;
    }
}
