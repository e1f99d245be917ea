//! Fixed-depth sliding window statistics.

use heapless::HistoryBuffer;

/// Last `N` samples with mean / stdev / min / max.
#[derive(Debug, Clone)]
pub struct Statistics<const N: usize> {
    samples: HistoryBuffer<f64, N>,
}

impl<const N: usize> Default for Statistics<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Statistics<N> {
    pub fn new() -> Self {
        Self {
            samples: HistoryBuffer::new(),
        }
    }

    /// Add a sample, evicting the oldest once the window is full.
    pub fn push(&mut self, value: f64) {
        self.samples.write(value);
    }

    /// Add a heading in degrees, unwrapped against the previous sample so
    /// a window straddling ±180° stays continuous.
    pub fn push_angle(&mut self, degrees: f64) {
        let value = match self.last() {
            Some(prev) => prev + wrap_degrees(degrees - prev),
            None => degrees,
        };
        self.samples.write(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.samples.capacity()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Most recent sample.
    pub fn last(&self) -> Option<f64> {
        self.samples.recent().copied()
    }

    pub fn mean(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.samples.as_slice().iter().sum::<f64>() / self.len() as f64
    }

    /// Population standard deviation.
    pub fn stdev(&self) -> f64 {
        if self.len() < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let var = self
            .samples
            .as_slice()
            .iter()
            .map(|v| (v - mean) * (v - mean))
            .sum::<f64>()
            / self.len() as f64;
        var.sqrt()
    }

    pub fn min(&self) -> f64 {
        self.samples
            .as_slice()
            .iter()
            .copied()
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    pub fn max(&self) -> f64 {
        self.samples
            .as_slice()
            .iter()
            .copied()
            .reduce(f64::max)
            .unwrap_or(0.0)
    }

    /// `max - min` over the window.
    pub fn range(&self) -> f64 {
        self.max() - self.min()
    }
}

/// Fold an angle difference into (-180, 180].
fn wrap_degrees(delta: f64) -> f64 {
    let d = delta % 360.0;
    if d > 180.0 {
        d - 360.0
    } else if d <= -180.0 {
        d + 360.0
    } else {
        d
    }
}
