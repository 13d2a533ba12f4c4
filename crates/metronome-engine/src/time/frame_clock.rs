use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Wall time elapsed since the previous tick.
    pub elapsed: Duration,

    /// `elapsed` expressed in target-rate frames: 1.0 is exactly one frame at the
    /// target rate, 2.0 means the tick arrived one frame late.
    pub delta: f64,

    /// Monotonic timestamp taken at the tick.
    pub now: Instant,

    /// Monotonic frame counter.
    pub frame_index: u64,
}

/// Frame clock producing `FrameTime` snapshots from caller-supplied readings.
///
/// `FrameClock` does not read time itself; the scheduler passes in the reading it
/// took at the start of the tick so the rearm deadline and the delta agree on "now".
///
/// Delta is not clamped. A long stall shows up as a large delta, which is what the
/// rate regulator needs to see.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    frame_index: u64,
}

impl FrameClock {
    /// Creates a clock whose baseline is `now`.
    pub fn start(now: Instant) -> Self {
        Self {
            last: now,
            frame_index: 0,
        }
    }

    /// Timestamp of the previous tick (or of `start`).
    pub fn last(&self) -> Instant {
        self.last
    }

    /// Advances the clock to `now` and returns a new `FrameTime`.
    ///
    /// `target_rate` is the configured ticks-per-second and must be positive.
    pub fn tick(&mut self, now: Instant, target_rate: f64) -> FrameTime {
        debug_assert!(target_rate > 0.0);

        let elapsed = now.saturating_duration_since(self.last);
        self.last = now;

        let ft = FrameTime {
            elapsed,
            delta: elapsed.as_secs_f64() * target_rate,
            now,
            frame_index: self.frame_index,
        };

        self.frame_index = self
            .frame_index
            .wrapping_add(1);

        ft
    }
}
