//! Trailing-edge motion debouncing.
//!
//! Raw per-frame motion signals arrive in bursts: one cat walking through
//! the scene flags dozens of consecutive frames. [`MotionDebouncer`] turns
//! that burst into a single [`MotionEvent`], emitted once the scene has been
//! quiet for the settle delay, carrying the most recent frame that actually
//! contained motion.

use std::time::{Duration, Instant, SystemTime};

use crate::detect::MotionRegion;
use crate::frame::Frame;

/// A confirmed motion episode: sustained change followed by a quiet settle
/// window. Consumed by the throttle and notifier, then discarded.
pub struct MotionEvent {
    /// The most recent frame that contained motion.
    pub frame: Frame,
    /// Wall-clock time motion was first observed.
    pub first_seen: SystemTime,
    /// Wall-clock time motion was last confirmed.
    pub last_seen: SystemTime,
}

impl MotionEvent {
    /// Observed duration of the episode, zero if the clock stepped backwards.
    pub fn duration(&self) -> Duration {
        self.last_seen
            .duration_since(self.first_seen)
            .unwrap_or(Duration::ZERO)
    }

    pub fn first_seen_epoch(&self) -> u64 {
        epoch_seconds(self.first_seen)
    }

    pub fn last_seen_epoch(&self) -> u64 {
        epoch_seconds(self.last_seen)
    }
}

fn epoch_seconds(t: SystemTime) -> u64 {
    t.duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

struct PendingMotion {
    first_seen: SystemTime,
    last_seen: SystemTime,
    /// Monotonic time of the last frame with motion; the settle window is
    /// measured from here.
    last_motion_at: Instant,
    snapshot: Frame,
}

enum State {
    Idle,
    Pending(PendingMotion),
}

/// Debouncer state machine. At most one episode is pending at a time; an
/// episode fully resolves (emits or is reset) before the next can start.
pub struct MotionDebouncer {
    settle_delay: Duration,
    state: State,
}

impl MotionDebouncer {
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            settle_delay,
            state: State::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    /// Feed one detection cycle into the state machine.
    ///
    /// Returns a [`MotionEvent`] exactly when a pending episode confirms:
    /// the regions are empty and at least `settle_delay` has elapsed since
    /// the last frame with motion. Confirmation returns the machine to idle
    /// in the same call, so no intermediate frames are lost.
    pub fn advance(
        &mut self,
        regions: &[MotionRegion],
        frame: &Frame,
        now: Instant,
    ) -> Option<MotionEvent> {
        if !regions.is_empty() {
            match &mut self.state {
                State::Idle => {
                    log::debug!("motion started ({} region(s))", regions.len());
                    self.state = State::Pending(PendingMotion {
                        first_seen: frame.captured_at(),
                        last_seen: frame.captured_at(),
                        last_motion_at: now,
                        snapshot: frame.clone(),
                    });
                }
                State::Pending(pending) => {
                    pending.last_seen = frame.captured_at();
                    pending.last_motion_at = now;
                    pending.snapshot = frame.clone();
                }
            }
            return None;
        }

        match &self.state {
            State::Idle => None,
            State::Pending(pending) => {
                if now.duration_since(pending.last_motion_at) < self.settle_delay {
                    return None;
                }
                let State::Pending(pending) = std::mem::replace(&mut self.state, State::Idle)
                else {
                    return None;
                };
                log::debug!(
                    "motion settled after {:.1}s quiet",
                    now.duration_since(pending.last_motion_at).as_secs_f64()
                );
                Some(MotionEvent {
                    frame: pending.snapshot,
                    first_seen: pending.first_seen,
                    last_seen: pending.last_seen,
                })
            }
        }
    }

    /// Abandon any pending episode. Used when the frame source ends or
    /// fails fatally; no event is emitted for a half-observed episode.
    pub fn reset(&mut self) {
        if !self.is_idle() {
            log::debug!("pending motion episode abandoned");
        }
        self.state = State::Idle;
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
