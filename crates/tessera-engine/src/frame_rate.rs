//! Frame pacing.
//!
//! [`FrameRateController`] measures each frame and, when pacing, sleeps off
//! whatever is left of the target frame time. In fixed-step mode (headless
//! runs and tests) it never sleeps and always reports the target time, so
//! simulations are reproducible.

use std::time::{Duration, Instant};

/// Longest time step handed to objects, so a stall does not teleport them.
pub const MAX_FRAME_DT: f32 = 0.25;

#[derive(Debug, Clone)]
pub struct FrameRateController {
    target: Duration,
    fixed_step: bool,
    started: Option<Instant>,
    dt: f32,
    last_frame_time: Duration,
    frames: u64,
}

impl FrameRateController {
    /// Pace to `fps` frames per second with measured time steps.
    pub fn new(fps: u32) -> Self {
        let target = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
        Self {
            target,
            fixed_step: false,
            started: None,
            dt: target.as_secs_f32(),
            last_frame_time: Duration::ZERO,
            frames: 0,
        }
    }

    /// Always report `1 / fps` and never sleep.
    pub fn fixed(fps: u32) -> Self {
        Self {
            fixed_step: true,
            ..Self::new(fps)
        }
    }

    /// Mark the start of a frame.
    pub fn begin_frame(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Mark the end of a frame: sleep to the target when pacing, then record
    /// the time step of the next frame.
    pub fn end_frame(&mut self) {
        let Some(started) = self.started.take() else {
            return;
        };
        let busy = started.elapsed();
        if !self.fixed_step && busy < self.target {
            std::thread::sleep(self.target - busy);
        }
        self.last_frame_time = started.elapsed();
        self.frames += 1;
        if !self.fixed_step {
            self.dt = self.last_frame_time.as_secs_f32().min(MAX_FRAME_DT);
        }
    }

    /// Time step, in seconds, to simulate this frame with.
    pub fn delta_time(&self) -> f32 {
        self.dt
    }

    pub fn target_frame_time(&self) -> Duration {
        self.target
    }

    /// Wall time of the last completed frame, including any sleep.
    pub fn last_frame_time(&self) -> Duration {
        self.last_frame_time
    }

    pub fn is_fixed_step(&self) -> bool {
        self.fixed_step
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_step_reports_the_target() {
        let mut pacer = FrameRateController::fixed(50);
        for _ in 0..3 {
            pacer.begin_frame();
            pacer.end_frame();
            assert!((pacer.delta_time() - 0.02).abs() < 1e-6);
        }
        assert_eq!(pacer.frame_count(), 3);
        assert!(pacer.is_fixed_step());
    }

    #[test]
    fn pacing_sleeps_up_to_the_target() {
        let mut pacer = FrameRateController::new(100);
        pacer.begin_frame();
        pacer.end_frame();
        assert!(pacer.last_frame_time() >= Duration::from_millis(10));
        assert!(pacer.delta_time() >= 0.01);
        assert!(pacer.delta_time() <= MAX_FRAME_DT);
    }

    #[test]
    fn slow_frames_are_clamped() {
        let mut pacer = FrameRateController::new(1000);
        pacer.begin_frame();
        std::thread::sleep(Duration::from_millis(300));
        pacer.end_frame();
        assert_eq!(pacer.delta_time(), MAX_FRAME_DT);
    }

    #[test]
    fn end_without_begin_is_ignored() {
        let mut pacer = FrameRateController::new(60);
        pacer.end_frame();
        assert_eq!(pacer.frame_count(), 0);
    }
}
