use std::time::{Duration, Instant};

/// Wall-clock timer for one child process run
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start_time: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Elapsed time in milliseconds, keeping sub-millisecond precision
    pub fn elapsed_ms(&self) -> f64 {
        duration_ms(self.elapsed())
    }
}

pub fn duration_ms(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}
