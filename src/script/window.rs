//! Fixed-capacity moving-average window backing `smooth(x, n)`.

use heapless::Deque;

use crate::config::SMOOTHING_CAPACITY;

#[derive(Debug, Clone)]
pub struct SmoothingWindow {
    samples: Deque<f64, SMOOTHING_CAPACITY>,
    len: usize,
}

impl SmoothingWindow {
    /// `len` is clamped to `1..=SMOOTHING_CAPACITY`.
    pub fn new(len: usize) -> Self {
        Self {
            samples: Deque::new(),
            len: len.clamp(1, SMOOTHING_CAPACITY),
        }
    }

    /// Add a sample, evicting the oldest once full, and return the mean of
    /// what is held.
    pub fn push(&mut self, sample: f64) -> f64 {
        if self.samples.len() >= self.len {
            self.samples.pop_front();
        }
        // Cannot fail: len <= capacity and we just made room.
        let _ = self.samples.push_back(sample);
        self.mean()
    }

    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
