//! # Replay Pacing
//!
//! A frame-rate timer for deterministic file playback: decoded frames are
//! emitted at the stream's data rate by blocking on [`ReplayTimer::wait_next`]
//! between frames.
//!
//! The timer schedules ticks on an absolute timeline from its construction
//! instant, so per-tick wake-up error does not accumulate across a long
//! replay. Each wait runs a three-stage cascade: coarse sleep for most of
//! the interval, then yielding, then a short spin, which keeps timing tight
//! from tens up to several thousand frames per second without pinning a
//! core for the whole interval.

use std::thread;
use std::time::{Duration, Instant};

use crate::error::ParseError;

/// Within this margin of the tick the timer yields instead of sleeping.
const YIELD_MARGIN: Duration = Duration::from_micros(500);

/// Within this margin of the tick the timer spin-waits.
const SPIN_MARGIN: Duration = Duration::from_micros(50);

/// Paces frame emission at a fixed rate.
#[derive(Debug)]
pub struct ReplayTimer {
    interval: Duration,
    next_tick: Instant,
}

impl ReplayTimer {
    /// A timer ticking `frames_per_second` times per second, starting one
    /// interval from now.
    pub fn new(frames_per_second: f64) -> Result<Self, ParseError> {
        if !frames_per_second.is_finite() || frames_per_second <= 0.0 {
            return Err(ParseError::invalid_field(
                "frame rate",
                format!("{} frames per second is not a positive rate", frames_per_second),
            ));
        }
        let interval = Duration::from_secs_f64(1.0 / frames_per_second);
        Ok(ReplayTimer {
            interval,
            next_tick: Instant::now() + interval,
        })
    }

    /// The interval between ticks.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Blocks until the next scheduled tick and returns the instant it
    /// fired.
    ///
    /// If the caller falls behind by a full interval or more, the timer
    /// resynchronizes to the present rather than bursting to catch up.
    pub fn wait_next(&mut self) -> Instant {
        let target = self.next_tick;

        loop {
            let now = Instant::now();
            if now >= target {
                break;
            }
            let remaining = target - now;
            if remaining > YIELD_MARGIN {
                // Sleep short of the tick; the OS may overshoot a coarse
                // sleep by the scheduler quantum.
                thread::sleep(remaining - YIELD_MARGIN);
            } else if remaining > SPIN_MARGIN {
                thread::yield_now();
            } else {
                std::hint::spin_loop();
            }
        }

        let fired = Instant::now();
        self.next_tick = target + self.interval;
        if self.next_tick <= fired {
            self.next_tick = fired + self.interval;
        }
        fired
    }
}
