//! Fixed-timestep simulation heartbeat.
//!
//! Decouples world ticks (fixed rate) from presentation (variable rate) using
//! an accumulator, so the pipeline always advances in whole ticks no matter
//! how long a frame took.

use std::time::{Duration, Instant};

use tracing::warn;

/// Default tick rate.
pub const DEFAULT_TICK_RATE_HZ: u32 = 60;

/// Frames longer than this are clamped so a stall cannot queue up dozens of
/// catch-up ticks.
pub const MAX_FRAME_TIME: f64 = 0.25;

/// Accumulator that turns elapsed wall-clock time into whole ticks.
pub struct Heartbeat {
    step: f64,
    previous_time: Instant,
    accumulator: f64,
    total_sim_time: f64,
    frame_count: u64,
    update_count: u64,
}

impl Heartbeat {
    /// Heartbeat ticking `rate_hz` times per second. A zero rate falls back
    /// to [`DEFAULT_TICK_RATE_HZ`].
    pub fn new(rate_hz: u32) -> Self {
        let rate = if rate_hz == 0 { DEFAULT_TICK_RATE_HZ } else { rate_hz };
        Self {
            step: 1.0 / f64::from(rate),
            previous_time: Instant::now(),
            accumulator: 0.0,
            total_sim_time: 0.0,
            frame_count: 0,
            update_count: 0,
        }
    }

    /// Measures the time since the last call and runs the due ticks.
    ///
    /// `update_fn(step, total_sim_time)` runs zero or more times, then
    /// `render_fn(alpha)` runs exactly once with `alpha` in `[0, 1)`.
    pub fn tick(&mut self, update_fn: impl FnMut(f64, f64), render_fn: impl FnMut(f64)) {
        let now = Instant::now();
        let frame_time = now.duration_since(self.previous_time).as_secs_f64();
        self.previous_time = now;
        self.advance(frame_time, update_fn, render_fn);
    }

    /// Same as [`tick`](Self::tick) with an explicit frame time in seconds.
    pub fn advance(
        &mut self,
        frame_time: f64,
        mut update_fn: impl FnMut(f64, f64),
        mut render_fn: impl FnMut(f64),
    ) {
        let mut frame_time = frame_time.max(0.0);
        if frame_time > MAX_FRAME_TIME {
            warn!(
                "Frame time {:.1}ms exceeds maximum, clamping to {:.1}ms",
                frame_time * 1000.0,
                MAX_FRAME_TIME * 1000.0
            );
            frame_time = MAX_FRAME_TIME;
        }

        self.accumulator += frame_time;
        while self.accumulator >= self.step {
            update_fn(self.step, self.total_sim_time);
            self.total_sim_time += self.step;
            self.accumulator -= self.step;
            self.update_count += 1;
        }

        render_fn(self.alpha());
        self.frame_count += 1;
    }

    /// How long until the next tick is due.
    pub fn time_to_next_step(&self) -> Duration {
        let elapsed = self.previous_time.elapsed().as_secs_f64();
        Duration::from_secs_f64((self.step - self.accumulator - elapsed).max(0.0))
    }

    pub fn alpha(&self) -> f64 {
        if self.accumulator > 0.0 {
            self.accumulator / self.step
        } else {
            0.0
        }
    }

    /// Seconds per tick.
    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn total_sim_time(&self) -> f64 {
        self.total_sim_time
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_RATE_HZ)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 1.0 / 60.0;

    #[test]
    fn test_default_rate() {
        let beat = Heartbeat::default();
        assert!((beat.step() - DT).abs() < 1e-12);
        assert_eq!(beat.frame_count(), 0);
        assert_eq!(beat.update_count(), 0);
    }

    #[test]
    fn test_zero_rate_uses_default() {
        assert!((Heartbeat::new(0).step() - DT).abs() < 1e-12);
    }

    #[test]
    fn test_single_step() {
        let mut beat = Heartbeat::default();
        let mut updates = 0;
        beat.advance(DT, |_, _| updates += 1, |_| {});
        assert_eq!(updates, 1);
        assert!(beat.alpha() < 1e-9);
    }

    #[test]
    fn test_multiple_steps_advance_sim_time() {
        let mut beat = Heartbeat::default();
        let mut times = Vec::new();
        beat.advance(3.0 * DT + 1e-9, |_, t| times.push(t), |_| {});
        assert_eq!(times.len(), 3);
        assert!((times[2] - 2.0 * DT).abs() < 1e-12);
        assert!((beat.total_sim_time() - 3.0 * DT).abs() < 1e-12);
    }

    #[test]
    fn test_partial_frame_renders_without_update() {
        let mut beat = Heartbeat::default();
        let mut updates = 0;
        let mut alpha = -1.0;
        beat.advance(0.25 * DT, |_, _| updates += 1, |a| alpha = a);
        assert_eq!(updates, 0);
        assert!((alpha - 0.25).abs() < 1e-9);
        assert_eq!(beat.frame_count(), 1);
    }

    #[test]
    fn test_long_frame_is_clamped() {
        let mut beat = Heartbeat::default();
        let mut updates = 0u32;
        beat.advance(1.0, |_, _| updates += 1, |_| {});
        let max_updates = (MAX_FRAME_TIME / DT).ceil() as u32;
        assert!(updates > 0 && updates <= max_updates);
    }

    #[test]
    fn test_negative_frame_time_ignored() {
        let mut beat = Heartbeat::default();
        let mut updates = 0;
        beat.advance(-1.0, |_, _| updates += 1, |_| {});
        assert_eq!(updates, 0);
        assert_eq!(beat.alpha(), 0.0);
    }

    #[test]
    fn test_same_frames_same_ticks() {
        let frames = [0.017, 0.015, 0.020, 0.016, 0.033, 0.008, 0.018];
        let mut a = Heartbeat::default();
        let mut b = Heartbeat::default();
        for &ft in &frames {
            a.advance(ft, |_, _| {}, |_| {});
            b.advance(ft, |_, _| {}, |_| {});
            assert_eq!(a.alpha(), b.alpha());
        }
        assert_eq!(a.update_count(), b.update_count());
        assert_eq!(a.frame_count(), frames.len() as u64);
    }

    #[test]
    fn test_time_to_next_step_bounded() {
        let beat = Heartbeat::new(30);
        assert!(beat.time_to_next_step() <= Duration::from_secs_f64(1.0 / 30.0));
    }
}
