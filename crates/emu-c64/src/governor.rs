//! Frame governor: throttles emulation to the video refresh rate.
//!
//! The host runs the CPU in frame-sized batches and calls
//! [`FrameGovernor::throttle`] after each one. The governor sleeps until
//! the frame deadline on a monotone clock. It never drops frames: when the
//! host falls behind, the deadline is re-based and the machine simply runs
//! slower than real time.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Frames kept in the rolling statistics window.
const WINDOW: usize = 10;

/// Wall-clock frame pacing.
pub struct FrameGovernor {
    frame_duration: Duration,
    enabled: bool,
    next_deadline: Option<Instant>,
    last_frame: Option<Instant>,
    frame_times: VecDeque<Duration>,
    frames: u64,
}

impl FrameGovernor {
    /// Governor for the given refresh rate. `enabled = false` makes
    /// `throttle` a no-op (benchmarks run flat out).
    #[must_use]
    pub fn new(refresh_hz: f64, enabled: bool) -> Self {
        Self {
            frame_duration: Duration::from_secs_f64(1.0 / refresh_hz),
            enabled,
            next_deadline: None,
            last_frame: None,
            frame_times: VecDeque::with_capacity(WINDOW),
            frames: 0,
        }
    }

    /// Account for one finished frame and sleep to its deadline.
    pub fn throttle(&mut self) {
        let now = Instant::now();
        self.frames += 1;

        if let Some(last) = self.last_frame.replace(now) {
            if self.frame_times.len() == WINDOW {
                self.frame_times.pop_front();
            }
            self.frame_times.push_back(now - last);
        }

        if !self.enabled {
            return;
        }

        let deadline = self.next_deadline.unwrap_or(now) + self.frame_duration;
        if deadline > now {
            std::thread::sleep(deadline - now);
            self.next_deadline = Some(deadline);
        } else {
            // Behind schedule: re-base instead of accumulating debt.
            self.next_deadline = Some(now);
        }
    }

    /// Completed frame count.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Average wall-clock frame time over the last ten frames.
    #[must_use]
    pub fn average_frame_time(&self) -> Option<Duration> {
        if self.frame_times.is_empty() {
            return None;
        }
        let total: Duration = self.frame_times.iter().sum();
        Some(total / self.frame_times.len() as u32)
    }

    /// Whether throttling is active.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_governor_does_not_sleep() {
        let mut governor = FrameGovernor::new(50.0, false);
        let start = Instant::now();
        for _ in 0..5 {
            governor.throttle();
        }
        assert!(start.elapsed() < Duration::from_millis(20));
        assert_eq!(governor.frame_count(), 5);
    }

    #[test]
    fn enabled_governor_paces_frames() {
        // Very fast "refresh" keeps the test short.
        let mut governor = FrameGovernor::new(1000.0, true);
        let start = Instant::now();
        for _ in 0..5 {
            governor.throttle();
        }
        // Five frames at 1 ms each: at least ~4 ms must have passed.
        assert!(start.elapsed() >= Duration::from_millis(4));
    }

    #[test]
    fn rolling_average_fills_in() {
        let mut governor = FrameGovernor::new(1000.0, false);
        assert!(governor.average_frame_time().is_none());
        governor.throttle();
        assert!(governor.average_frame_time().is_none(), "needs two frames");
        governor.throttle();
        assert!(governor.average_frame_time().is_some());
    }
}
