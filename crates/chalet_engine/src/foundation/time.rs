//! Time management utilities

use std::time::{Duration, Instant};

/// Wall-clock seconds elapsed since a fixed start point
///
/// The renderer creates one at construction and derives the model rotation
/// from it every frame.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    start: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    /// Start a new clock now
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    /// Seconds elapsed since the clock started
    pub fn elapsed_secs(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }
}

/// Frame timer used for FPS reporting
pub struct Timer {
    last_report: Instant,
    frames_since_report: u32,
    frame_count: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_report: now,
            frames_since_report: 0,
            frame_count: 0,
        }
    }

    /// Update the timer (should be called once per frame)
    pub fn update(&mut self) {
        self.frame_count += 1;
        self.frames_since_report += 1;
    }

    /// Number of frames counted so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average FPS over the last `interval`, returned once per interval
    pub fn fps_report(&mut self, interval: Duration) -> Option<f32> {
        let elapsed = self.last_report.elapsed();
        if elapsed < interval {
            return None;
        }

        let fps = self.frames_since_report as f32 / elapsed.as_secs_f32();
        self.last_report = Instant::now();
        self.frames_since_report = 0;
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_monotonic() {
        let clock = Clock::new();
        let first = clock.elapsed_secs();
        std::thread::sleep(Duration::from_millis(2));
        assert!(clock.elapsed_secs() > first);
    }

    #[test]
    fn test_timer_counts_frames() {
        let mut timer = Timer::new();
        for _ in 0..5 {
            timer.update();
        }
        assert_eq!(timer.frame_count(), 5);
    }

    #[test]
    fn test_fps_report_waits_for_interval() {
        let mut timer = Timer::new();
        timer.update();
        assert!(timer.fps_report(Duration::from_secs(3600)).is_none());

        let fps = timer.fps_report(Duration::ZERO);
        assert!(fps.is_some());
        // Report resets the window
        assert_eq!(timer.frames_since_report, 0);
    }
}
