//! Respiratory metrics from the chest stretch sensor.
//!
//! The stretch channel rises during inspiration and falls during expiration.
//! A bounded history is low-pass filtered and breath cycles are located as
//! alternating peaks and valleys of the smoothed signal.

use serde::{Deserialize, Serialize};

use stabilo_core::{stats, EngineConfig, RespirationConfig, RingBuffer};

use crate::filtering::MovingAverageFilter;
use crate::spectrum::SpectrumAnalyzer;

/// Breathing metrics over the buffered window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RespiratoryMetrics {
    /// Breaths per minute, within the configured physiological bounds
    pub breathing_rate_bpm: f64,
    /// Mean peak height minus mean valley depth (raw sensor units)
    pub amplitude: f64,
    /// Summed peak-to-valley time over summed valley-to-peak time
    pub ie_ratio: f64,
    /// Breath-to-breath regularity (0-1)
    pub regularity: f64,
    pub filtered_signal: Vec<f64>,
    pub peak_indices: Vec<usize>,
    pub valley_indices: Vec<usize>,
    /// Share of signal power in the breathing band (0-1)
    pub signal_quality: Option<f64>,
}

impl RespiratoryMetrics {
    /// False for the zeroed record returned on insufficient data
    pub fn has_data(&self) -> bool {
        !self.filtered_signal.is_empty()
    }

    pub fn breath_count(&self) -> usize {
        self.peak_indices.len()
    }
}

/// Stateful processor owning the stretch-value history
pub struct RespiratorySignalProcessor {
    config: RespirationConfig,
    sample_rate: f64,
    min_samples: usize,
    buffer: RingBuffer<f64>,
    lowpass: MovingAverageFilter,
    spectrum: SpectrumAnalyzer,
}

impl RespiratorySignalProcessor {
    /// Create a processor
    ///
    /// # Arguments
    /// * `config` - Filter, threshold and default parameters
    /// * `sample_rate` - Stretch channel sampling rate (Hz)
    /// * `capacity` - History length in samples
    /// * `min_samples` - Samples required before metrics are computed
    pub fn new(
        config: RespirationConfig,
        sample_rate: f64,
        capacity: usize,
        min_samples: usize,
    ) -> Self {
        let lowpass = MovingAverageFilter::for_cutoff(config.lowpass_cutoff_hz, sample_rate);
        let spectrum = SpectrumAnalyzer::new(capacity.next_power_of_two(), sample_rate);

        Self {
            config,
            sample_rate,
            min_samples,
            buffer: RingBuffer::with_capacity(capacity),
            lowpass,
            spectrum,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let rate = config.sampling.sample_rate_hz;
        Self::new(
            config.respiration.clone(),
            rate,
            config.windows.respiratory_buffer_samples(rate),
            config.windows.min_analysis_samples,
        )
    }

    /// Append stretch readings, evicting the oldest when full
    pub fn push(&mut self, samples: &[i32]) {
        for &s in samples {
            self.buffer.push(s as f64);
        }
    }

    /// Append readings and compute metrics over the updated window
    pub fn process(&mut self, samples: &[i32]) -> RespiratoryMetrics {
        self.push(samples);
        self.compute()
    }

    /// Metrics over the current window; zeroed when too short
    pub fn compute(&mut self) -> RespiratoryMetrics {
        if self.buffer.len() < self.min_samples {
            return RespiratoryMetrics::default();
        }

        let raw = self.buffer.to_vec();
        let filtered = self.lowpass.filter_signal(&raw);

        let mean = stats::mean(&filtered);
        let std = stats::std_dev(&filtered);
        let upper = mean + self.config.peak_threshold_std * std;
        let lower = mean - self.config.peak_threshold_std * std;

        let min_separation = self.min_peak_separation();
        let peaks = find_extrema(&filtered, Extremum::Peak, upper, min_separation);
        let valleys = find_extrema(&filtered, Extremum::Valley, lower, min_separation);

        let intervals: Vec<f64> = peaks.windows(2).map(|w| (w[1] - w[0]) as f64).collect();

        let breathing_rate_bpm = if intervals.is_empty() {
            self.config.default_rate_bpm
        } else {
            let mean_interval_s = stats::mean(&intervals) / self.sample_rate;
            if mean_interval_s > 0.0 {
                60.0 / mean_interval_s
            } else {
                self.config.default_rate_bpm
            }
        }
        .clamp(self.config.min_rate_bpm, self.config.max_rate_bpm);

        let amplitude = if peaks.is_empty() || valleys.is_empty() {
            0.0
        } else {
            let peak_mean = stats::mean(&peaks.iter().map(|&i| filtered[i]).collect::<Vec<_>>());
            let valley_mean =
                stats::mean(&valleys.iter().map(|&i| filtered[i]).collect::<Vec<_>>());
            peak_mean - valley_mean
        };

        let ie_ratio = inspiration_expiration_ratio(&peaks, &valleys)
            .unwrap_or(self.config.default_ie_ratio);

        let regularity = if intervals.is_empty() {
            0.0
        } else {
            1.0 / (1.0 + stats::coefficient_of_variation(&intervals))
        };

        let signal_quality = self
            .spectrum
            .power_spectrum(&filtered)
            .band_power_ratio(self.config.band_low_hz, self.config.band_high_hz);

        RespiratoryMetrics {
            breathing_rate_bpm,
            amplitude,
            ie_ratio,
            regularity,
            filtered_signal: filtered,
            peak_indices: peaks,
            valley_indices: valleys,
            signal_quality: Some(signal_quality),
        }
    }

    /// Half of the shortest physiological breath period, in samples
    fn min_peak_separation(&self) -> usize {
        let shortest_period_s = 60.0 / self.config.max_rate_bpm;
        ((shortest_period_s * self.sample_rate) / 2.0).round().max(1.0) as usize
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.lowpass.reset();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extremum {
    Peak,
    Valley,
}

/// Local extrema beyond `threshold`, merging candidates closer than
/// `min_separation` samples into the more extreme one
fn find_extrema(
    signal: &[f64],
    kind: Extremum,
    threshold: f64,
    min_separation: usize,
) -> Vec<usize> {
    let mut found: Vec<usize> = Vec::new();
    if signal.len() < 3 {
        return found;
    }

    let more_extreme = |a: f64, b: f64| match kind {
        Extremum::Peak => a > b,
        Extremum::Valley => a < b,
    };

    for i in 1..signal.len() - 1 {
        let v = signal[i];
        let is_local = more_extreme(v, signal[i - 1])
            && !more_extreme(signal[i + 1], v)
            && more_extreme(v, threshold);
        if !is_local {
            continue;
        }

        match found.last_mut() {
            Some(last) if i - *last < min_separation => {
                if more_extreme(v, signal[*last]) {
                    *last = i;
                }
            }
            _ => found.push(i),
        }
    }

    found
}

/// Summed peak-to-valley time over summed valley-to-peak time
fn inspiration_expiration_ratio(peaks: &[usize], valleys: &[usize]) -> Option<f64> {
    let mut events: Vec<(usize, Extremum)> = peaks
        .iter()
        .map(|&i| (i, Extremum::Peak))
        .chain(valleys.iter().map(|&i| (i, Extremum::Valley)))
        .collect();
    events.sort_by_key(|&(i, _)| i);

    let mut inspiration = 0usize;
    let mut expiration = 0usize;
    for pair in events.windows(2) {
        match (pair[0].1, pair[1].1) {
            (Extremum::Valley, Extremum::Peak) => inspiration += pair[1].0 - pair[0].0,
            (Extremum::Peak, Extremum::Valley) => expiration += pair[1].0 - pair[0].0,
            _ => {}
        }
    }

    if inspiration == 0 || expiration == 0 {
        return None;
    }
    Some(expiration as f64 / inspiration as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f64 = 50.0;

    fn processor() -> RespiratorySignalProcessor {
        RespiratorySignalProcessor::from_config(&EngineConfig::default())
    }

    fn breathing_signal(bpm: f64, seconds: f64, amplitude: f64) -> Vec<i32> {
        let n = (seconds * SAMPLE_RATE) as usize;
        let freq = bpm / 60.0;
        (0..n)
            .map(|i| {
                let t = i as f64 / SAMPLE_RATE;
                (2000.0 + amplitude * (2.0 * std::f64::consts::PI * freq * t).sin()).round() as i32
            })
            .collect()
    }

    #[test]
    fn test_insufficient_data_is_zeroed() {
        let mut processor = processor();
        let metrics = processor.process(&breathing_signal(15.0, 1.9, 100.0));

        assert_eq!(metrics, RespiratoryMetrics::default());
        assert!(!metrics.has_data());
        assert_eq!(processor.len(), 95);
    }

    #[test]
    fn test_fifteen_bpm_sine() {
        let mut processor = processor();
        let metrics = processor.process(&breathing_signal(15.0, 10.0, 100.0));

        assert!(metrics.has_data());
        assert!(
            (metrics.breathing_rate_bpm - 15.0).abs() <= 1.0,
            "rate = {}",
            metrics.breathing_rate_bpm
        );
        assert!(metrics.regularity > 0.9);
        assert!(metrics.amplitude > 100.0);
        assert!((metrics.ie_ratio - 1.0).abs() < 0.2, "symmetric breathing");
        assert!(metrics.signal_quality.unwrap() > 0.8);
    }

    #[test]
    fn test_buffer_is_bounded() {
        let mut processor = processor();
        processor.push(&breathing_signal(12.0, 30.0, 50.0));
        assert_eq!(processor.len(), 500);
        assert_eq!(processor.capacity(), 500);

        let metrics = processor.compute();
        assert_eq!(metrics.filtered_signal.len(), 500);
        assert!((metrics.breathing_rate_bpm - 12.0).abs() <= 1.0);
    }

    #[test]
    fn test_rate_always_clamped() {
        let cases = [
            breathing_signal(3.0, 10.0, 1_000_000.0),
            breathing_signal(45.0, 10.0, 1_000_000.0),
            breathing_signal(90.0, 10.0, 5.0),
            vec![2000; 500],
            (0..500).map(|i| ((i * 7919) % 1000) as i32).collect(),
        ];

        for signal in cases {
            let mut processor = processor();
            let metrics = processor.process(&signal);
            assert!(
                (5.0..=30.0).contains(&metrics.breathing_rate_bpm),
                "rate = {}",
                metrics.breathing_rate_bpm
            );
        }
    }

    #[test]
    fn test_flat_signal_defaults() {
        let mut processor = processor();
        let metrics = processor.process(&vec![1500; 300]);

        assert!(metrics.peak_indices.is_empty());
        assert_eq!(metrics.breathing_rate_bpm, 15.0);
        assert_eq!(metrics.ie_ratio, 0.5);
        assert_eq!(metrics.amplitude, 0.0);
        assert_eq!(metrics.regularity, 0.0);
    }

    #[test]
    fn test_long_fall_raises_ie_ratio() {
        // 4 s breaths: 1.2 s rise, 2.8 s fall
        let period = 200usize;
        let rise = 60usize;
        let signal: Vec<i32> = (0..500)
            .map(|i| {
                let phase = i % period;
                let level = if phase < rise {
                    phase as f64 / rise as f64
                } else {
                    1.0 - (phase - rise) as f64 / (period - rise) as f64
                };
                (1000.0 + 200.0 * level).round() as i32
            })
            .collect();

        let mut processor = processor();
        let metrics = processor.process(&signal);
        // Falling phase more than twice the rising one
        assert!(metrics.ie_ratio > 1.5, "ie = {}", metrics.ie_ratio);
        assert!((metrics.breathing_rate_bpm - 15.0).abs() <= 1.0);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut processor = processor();
        processor.push(&breathing_signal(15.0, 5.0, 100.0));
        processor.reset();
        assert!(processor.is_empty());
        assert!(!processor.compute().has_data());
    }

    #[test]
    fn test_extrema_merge_close_candidates() {
        let signal = [0.0, 5.0, 4.9, 5.1, 0.0, -5.0, 0.0];
        let peaks = find_extrema(&signal, Extremum::Peak, 1.0, 3);
        assert_eq!(peaks, vec![3]);

        let valleys = find_extrema(&signal, Extremum::Valley, -1.0, 3);
        assert_eq!(valleys, vec![5]);
    }

    #[test]
    fn test_ie_ratio_requires_both_phases() {
        assert_eq!(inspiration_expiration_ratio(&[10, 20], &[]), None);
        let ratio = inspiration_expiration_ratio(&[10, 50], &[0, 40]).unwrap();
        // Peak-to-valley 10->40 over valley-to-peak 0->10 and 40->50
        assert!((ratio - 30.0 / 20.0).abs() < 1e-12);
    }
}
