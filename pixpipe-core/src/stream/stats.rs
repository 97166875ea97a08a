//! Per-session frame statistics.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Snapshot published after every presented frame.
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    /// Frames presented since the session started.
    pub frames: u64,
    /// Payload bytes received (compressed, as sent on the wire).
    pub bytes_in: u64,
    /// Smoothed frames per second.
    pub fps: f64,
    /// Time spent decompressing and reconstructing the last frame.
    pub last_decode: Duration,
    /// Wire size of the last payload.
    pub last_payload: usize,
    pub width: u32,
    pub height: u32,
}

impl FrameStats {
    /// Average compressed payload size.
    pub fn mean_payload(&self) -> f64 {
        if self.frames == 0 {
            return 0.0;
        }
        self.bytes_in as f64 / self.frames as f64
    }
}

/// Rolling frame-interval average over the last `window` frames.
#[derive(Debug)]
pub struct FpsCounter {
    samples: VecDeque<Duration>,
    window: usize,
    last: Option<Instant>,
}

impl FpsCounter {
    pub fn new(window: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(window),
            window: window.max(1),
            last: None,
        }
    }

    /// Record a frame at the current instant and return the new rate.
    pub fn tick(&mut self) -> f64 {
        self.tick_at(Instant::now())
    }

    /// Record with an explicit timestamp (useful for testing).
    pub fn tick_at(&mut self, now: Instant) -> f64 {
        if let Some(last) = self.last {
            if self.samples.len() == self.window {
                self.samples.pop_front();
            }
            self.samples.push_back(now.duration_since(last));
        }
        self.last = Some(now);
        self.rate()
    }

    pub fn rate(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let avg = self.samples.iter().map(Duration::as_secs_f64).sum::<f64>()
            / self.samples.len() as f64;
        if avg > 0.0 { 1.0 / avg } else { 0.0 }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.last = None;
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new(60)
    }
}
