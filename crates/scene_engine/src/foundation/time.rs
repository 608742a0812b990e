//! Time management utilities

use std::time::{Duration, Instant};

/// Frame clock driven by the host's delta time.
///
/// The engine never reads the wall clock for simulation: the host frame
/// driver passes `dt` and the clock accumulates it, which keeps updates
/// deterministic under test.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    delta_time: f32,
    total_time: f32,
    frame_count: u64,
}

impl FrameClock {
    /// Create a new clock at frame zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by one frame
    pub fn advance(&mut self, delta_time: f32) {
        self.delta_time = delta_time;
        self.total_time += delta_time;
        self.frame_count += 1;
    }

    /// Get the time since the last frame in seconds
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Get the total accumulated time in seconds
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Get the number of frames advanced so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Get the average FPS since clock creation
    pub fn average_fps(&self) -> f32 {
        if self.total_time > 0.0 {
            self.frame_count as f32 / self.total_time
        } else {
            0.0
        }
    }
}

/// Simple stopwatch for measuring elapsed wall time of a frame phase
#[derive(Debug)]
pub struct Stopwatch {
    start_time: Option<Instant>,
    elapsed: Duration,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopwatch {
    /// Create a new stopped stopwatch
    pub fn new() -> Self {
        Self {
            start_time: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Create a new stopwatch and start it immediately
    pub fn start_new() -> Self {
        let mut stopwatch = Self::new();
        stopwatch.start();
        stopwatch
    }

    /// Start the stopwatch
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Stop the stopwatch and accumulate elapsed time
    pub fn stop(&mut self) {
        if let Some(start) = self.start_time {
            self.elapsed += start.elapsed();
            self.start_time = None;
        }
    }

    /// Get the elapsed time
    pub fn elapsed(&self) -> Duration {
        let current_elapsed = self.start_time.map_or(Duration::ZERO, |start| start.elapsed());
        self.elapsed + current_elapsed
    }

    /// Get the elapsed time in milliseconds
    pub fn elapsed_millis(&self) -> f32 {
        self.elapsed().as_secs_f32() * 1000.0
    }
}
