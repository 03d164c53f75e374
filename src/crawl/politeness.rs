use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;

/// Spacing between consecutive requests, with random jitter.
///
/// Every request goes through [`Throttle::wait`]; when the previous request
/// started less than `min` ago, a random pause in `[min, max]` is taken.
#[derive(Debug, Clone)]
pub struct Throttle {
    min: Duration,
    max: Duration,
    last_request: Option<Instant>,
}

impl Throttle {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
            last_request: None,
        }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    /// Raises the minimum spacing (e.g. to a robots `Crawl-delay`).
    pub fn raise_floor(&mut self, floor: Duration) {
        if floor > self.min {
            self.min = floor;
            self.max = self.max.max(floor);
        }
    }

    /// Pause owed before a request issued at `now`, if any.
    pub fn pause_before(&self, now: Instant) -> Option<Duration> {
        let last = self.last_request?;
        if now.saturating_duration_since(last) >= self.min {
            return None;
        }
        Some(self.jitter())
    }

    /// Sleeps as needed, then records the request start. Returns the time slept.
    pub fn wait(&mut self) -> Duration {
        let slept = match self.pause_before(Instant::now()) {
            Some(pause) => {
                thread::sleep(pause);
                pause
            }
            None => Duration::ZERO,
        };
        self.last_request = Some(Instant::now());
        slept
    }

    fn jitter(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let secs = rand::rng().random_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs).max(self.min)
    }
}
