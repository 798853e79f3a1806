use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Time elapsed since the previous frame tick, in seconds.
    pub dt: f32,

    /// Seconds accumulated over all ticks since the clock was created.
    ///
    /// Pauses do not advance it, so animations resume where they stopped.
    pub elapsed: f32,

    /// Monotonic timestamp taken at the tick.
    pub now: Instant,

    /// Monotonic frame counter.
    pub frame_index: u64,
}

impl FrameTime {
    /// Delta time in milliseconds, the unit the quality autoscaler works in.
    #[inline]
    pub fn dt_ms(&self) -> f32 {
        self.dt * 1000.0
    }
}

/// Delta-time source for the render loop.
///
/// Delta time is clamped so that a window that was hidden, minimized or stopped
/// in a debugger does not feed a huge step into animations and the quality
/// controller. Calling [`FrameClock::reset`] when the loop resumes drops the
/// paused interval entirely.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    elapsed: f32,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    /// Creates a new clock with default clamps (100µs to 250ms).
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    /// Creates a clock with custom delta-time clamps.
    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        Self {
            last: Instant::now(),
            elapsed: 0.0,
            frame_index: 0,
            dt_min,
            dt_max,
        }
    }

    /// Resets the clock baseline; the next tick measures from now.
    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    pub fn reset_at(&mut self, now: Instant) {
        self.last = now;
    }

    /// Advances the clock and returns a new `FrameTime`.
    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    /// Advances the clock to an explicit timestamp.
    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max);

        self.last = now;
        self.elapsed += dt.as_secs_f32();

        let ft = FrameTime {
            dt: dt.as_secs_f32(),
            elapsed: self.elapsed,
            now,
            frame_index: self.frame_index,
        };

        self.frame_index = self.frame_index.wrapping_add(1);

        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_measures_interval() {
        let start = Instant::now();
        let mut clock = FrameClock::new();
        clock.reset_at(start);
        let ft = clock.tick_at(start + Duration::from_millis(16));
        assert!((ft.dt_ms() - 16.0).abs() < 1e-3);
        assert_eq!(ft.frame_index, 0);
        assert_eq!(clock.tick_at(start + Duration::from_millis(32)).frame_index, 1);
    }

    #[test]
    fn long_stall_is_clamped() {
        let start = Instant::now();
        let mut clock = FrameClock::new();
        clock.reset_at(start);
        let ft = clock.tick_at(start + Duration::from_secs(10));
        assert!((ft.dt - 0.25).abs() < 1e-6);
    }

    #[test]
    fn reset_skips_paused_interval() {
        let start = Instant::now();
        let mut clock = FrameClock::new();
        clock.reset_at(start);
        clock.tick_at(start + Duration::from_millis(10));
        clock.reset_at(start + Duration::from_secs(5));
        let ft = clock.tick_at(start + Duration::from_secs(5) + Duration::from_millis(20));
        assert!((ft.dt_ms() - 20.0).abs() < 1e-3);
        assert!((ft.elapsed - 0.030).abs() < 1e-4);
    }
}
