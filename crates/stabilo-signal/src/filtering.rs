//! Smoothing filters for sensor channels.

use stabilo_core::RingBuffer;

/// Moving average filter over a fixed-capacity window
#[derive(Debug, Clone)]
pub struct MovingAverageFilter {
    window: RingBuffer<f64>,
    sum: f64,
}

impl MovingAverageFilter {
    pub fn new(window_size: usize) -> Self {
        Self {
            window: RingBuffer::with_capacity(window_size.max(1)),
            sum: 0.0,
        }
    }

    /// Window matching a low-pass cutoff: one window spans one cutoff period
    pub fn for_cutoff(cutoff_hz: f64, sample_rate_hz: f64) -> Self {
        Self::new((sample_rate_hz / cutoff_hz).round().max(1.0) as usize)
    }

    pub fn window_size(&self) -> usize {
        self.window.capacity()
    }

    pub fn filter(&mut self, x: f64) -> f64 {
        self.sum += x;
        if let Some(evicted) = self.window.push(x) {
            self.sum -= evicted;
        }

        self.sum / self.window.len() as f64
    }

    /// Filter an entire signal from a clean state
    pub fn filter_signal(&mut self, signal: &[f64]) -> Vec<f64> {
        self.reset();
        signal.iter().map(|&x| self.filter(x)).collect()
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.sum = 0.0;
    }
}

/// Exponential smoothing for slow channels such as skin temperature
#[derive(Debug, Clone)]
pub struct ExponentialFilter {
    alpha: f64,
    state: Option<f64>,
}

impl ExponentialFilter {
    /// `alpha` in [0, 1]; higher follows the input more closely
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            state: None,
        }
    }

    /// Smoothing with a time constant given in samples
    pub fn from_time_constant(time_constant: f64) -> Self {
        Self::new(1.0 / (time_constant.max(0.0) + 1.0))
    }

    pub fn filter(&mut self, x: f64) -> f64 {
        let y = match self.state {
            Some(prev) => self.alpha * x + (1.0 - self.alpha) * prev,
            None => x,
        };
        self.state = Some(y);
        y
    }

    pub fn value(&self) -> Option<f64> {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_average() {
        let mut filter = MovingAverageFilter::new(3);

        assert_eq!(filter.filter(3.0), 3.0);
        assert_eq!(filter.filter(6.0), 4.5);
        assert_eq!(filter.filter(9.0), 6.0);
        // First sample leaves the window
        assert_eq!(filter.filter(12.0), 9.0);
    }

    #[test]
    fn test_cutoff_window() {
        let filter = MovingAverageFilter::for_cutoff(2.0, 50.0);
        assert_eq!(filter.window_size(), 25);
    }

    #[test]
    fn test_smooths_alternating_noise() {
        let signal: Vec<f64> = (0..100)
            .map(|i| 10.0 + if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let mut filter = MovingAverageFilter::new(10);
        let filtered = filter.filter_signal(&signal);

        for &v in &filtered[10..] {
            assert!((v - 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_exponential_filter() {
        let mut filter = ExponentialFilter::new(0.5);
        assert!(filter.value().is_none());

        assert_eq!(filter.filter(10.0), 10.0);
        assert_eq!(filter.filter(20.0), 15.0);
        assert_eq!(filter.filter(20.0), 17.5);

        filter.reset();
        assert_eq!(filter.filter(4.0), 4.0);
    }

    #[test]
    fn test_time_constant() {
        let mut filter = ExponentialFilter::from_time_constant(49.0);
        filter.filter(0.0);
        // alpha = 1 / 50
        assert!((filter.filter(100.0) - 2.0).abs() < 1e-12);
    }
}
