//! Power spectrum of short physiological signals.
//!
//! Used to judge how much of a channel's energy lies in a band of interest,
//! e.g. breathing at 0.1-0.7 Hz.

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// One-sided power spectrum
#[derive(Debug, Clone)]
pub struct PowerSpectrum {
    /// Bin centre frequencies (Hz)
    pub frequencies: Vec<f64>,

    /// Power per bin (DC excluded from band ratios)
    pub power: Vec<f64>,
}

impl PowerSpectrum {
    /// Fraction of non-DC power within `[low_hz, high_hz]`
    pub fn band_power_ratio(&self, low_hz: f64, high_hz: f64) -> f64 {
        let total: f64 = self.power.iter().skip(1).sum();
        if total < 1e-12 {
            return 0.0;
        }

        let band: f64 = self
            .frequencies
            .iter()
            .zip(&self.power)
            .skip(1)
            .filter(|(f, _)| **f >= low_hz && **f <= high_hz)
            .map(|(_, p)| p)
            .sum();

        (band / total).clamp(0.0, 1.0)
    }

    /// Frequency of the strongest non-DC bin
    pub fn peak_frequency(&self) -> f64 {
        self.power
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| self.frequencies[i])
            .unwrap_or(0.0)
    }
}

/// FFT-based spectrum analyzer with a fixed transform length
pub struct SpectrumAnalyzer {
    fft_size: usize,
    sample_rate: f64,
    fft: Arc<dyn Fft<f64>>,
}

impl SpectrumAnalyzer {
    pub fn new(fft_size: usize, sample_rate: f64) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            fft_size,
            sample_rate,
            fft,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Most recent `fft_size` samples, mean removed and Hann-windowed over
    /// their own length
    fn windowed_segment(&self, signal: &[f64]) -> Vec<f64> {
        let start = signal.len().saturating_sub(self.fft_size);
        let segment = &signal[start..];
        let mean = stabilo_core::stats::mean(segment);

        segment
            .iter()
            .zip(hann_window(segment.len()))
            .map(|(&x, w)| (x - mean) * w)
            .collect()
    }

    /// Spectrum of the most recent `fft_size` samples, zero-padded when shorter
    pub fn power_spectrum(&self, signal: &[f64]) -> PowerSpectrum {
        let mut buffer: Vec<Complex<f64>> = self
            .windowed_segment(signal)
            .into_iter()
            .map(|x| Complex::new(x, 0.0))
            .collect();
        buffer.resize(self.fft_size, Complex::new(0.0, 0.0));

        self.fft.process(&mut buffer);

        let n = self.fft_size;
        let freq_step = self.sample_rate / n as f64;
        let half = n / 2 + 1;

        PowerSpectrum {
            frequencies: (0..half).map(|i| i as f64 * freq_step).collect(),
            power: buffer[..half].iter().map(|c| c.norm_sqr() / n as f64).collect(),
        }
    }
}

/// Hann window coefficients
pub fn hann_window(size: usize) -> Vec<f64> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / (size - 1) as f64).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window() {
        let window = hann_window(10);

        assert!(window[0] < 0.01);
        assert!(window[9] < 0.01);
        assert!((window[4] - 1.0).abs() < 0.1 || (window[5] - 1.0).abs() < 0.1);
    }

    #[test]
    fn test_peak_of_breathing_sine() {
        let analyzer = SpectrumAnalyzer::new(512, 50.0);
        let signal: Vec<f64> = (0..512)
            .map(|i| (2.0 * std::f64::consts::PI * 0.25 * i as f64 / 50.0).sin())
            .collect();

        let spectrum = analyzer.power_spectrum(&signal);
        assert!((spectrum.peak_frequency() - 0.25).abs() < 0.1);
        assert!(spectrum.band_power_ratio(0.1, 0.7) > 0.8);
    }

    #[test]
    fn test_fast_signal_outside_band() {
        let analyzer = SpectrumAnalyzer::new(512, 50.0);
        let signal: Vec<f64> = (0..512)
            .map(|i| (2.0 * std::f64::consts::PI * 5.0 * i as f64 / 50.0).sin())
            .collect();

        let spectrum = analyzer.power_spectrum(&signal);
        assert!(spectrum.band_power_ratio(0.1, 0.7) < 0.1);
    }

    #[test]
    fn test_short_segment_tapers_at_both_ends() {
        let analyzer = SpectrumAnalyzer::new(512, 50.0);
        let signal: Vec<f64> = (0..500).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();

        let windowed = analyzer.windowed_segment(&signal);
        assert_eq!(windowed.len(), 500);
        assert!(windowed[0].abs() < 1e-12);
        assert!(windowed[499].abs() < 1e-12);
        assert!(windowed[250].abs() > 0.99);
    }

    #[test]
    fn test_long_signal_keeps_latest_samples() {
        let analyzer = SpectrumAnalyzer::new(64, 50.0);
        let signal: Vec<f64> = (0..100).map(|i| i as f64).collect();
        assert_eq!(analyzer.windowed_segment(&signal).len(), 64);
    }

    #[test]
    fn test_constant_signal_has_no_band_power() {
        let analyzer = SpectrumAnalyzer::new(64, 50.0);
        let spectrum = analyzer.power_spectrum(&[3.0; 40]);
        assert_eq!(spectrum.band_power_ratio(0.1, 0.7), 0.0);
    }
}
