//! Postural sway features from a window of orientation estimates.

use serde::{Deserialize, Serialize};

use stabilo_core::{
    centroid, path_length, stats, sway_path_cm, Covariance2, EngineConfig, OrientationEstimate,
    PostureConfig, Result, SwayPoint,
};

use crate::diffusion::{stabilogram_diffusion, StabilogramDiffusion};
use crate::sensory::{self, BalanceCondition, SensoryWeights};

/// Smallest sway area reported for a computed window (cm²)
pub const MIN_SWAY_AREA_CM2: f64 = 0.1;

/// Area scale at which the sway term of the stability index halves (cm²)
const STABILITY_AREA_SCALE_CM2: f64 = 10.0;

/// Sway features of one analysis window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PosturalFeatures {
    pub sway_path_length_cm: f64,
    /// 95 % confidence-ellipse area
    pub sway_area_cm2: f64,
    pub sway_velocity_cm_s: f64,
    /// `[dominant_hz, spectral_centroid_hz]`
    pub frequency_peaks: Vec<f64>,
    /// Overall steadiness (0-1)
    pub stability_index: f64,
    /// RMS antero-posterior sway (cm)
    pub ap_sway: f64,
    /// RMS medio-lateral sway (cm)
    pub ml_sway: f64,
    /// Mean lean from upright (cm)
    pub mean_ml_cm: f64,
    pub mean_ap_cm: f64,
    pub duration_s: f64,
    pub stabilogram_diffusion: Option<StabilogramDiffusion>,
}

impl PosturalFeatures {
    /// False for the zeroed record returned on insufficient data
    pub fn has_data(&self) -> bool {
        self.sway_area_cm2 > 0.0
    }

    pub fn dominant_frequency(&self) -> f64 {
        self.frequency_peaks.first().copied().unwrap_or(0.0)
    }

    pub fn spectral_centroid(&self) -> f64 {
        self.frequency_peaks.get(1).copied().unwrap_or(0.0)
    }

    /// Combined RMS sway magnitude (cm)
    pub fn combined_sway(&self) -> f64 {
        (self.ap_sway * self.ap_sway + self.ml_sway * self.ml_sway).sqrt()
    }

    /// Larger directional sway over the smaller one (1 = symmetric)
    pub fn asymmetry_ratio(&self) -> f64 {
        let (hi, lo) = if self.ml_sway >= self.ap_sway {
            (self.ml_sway, self.ap_sway)
        } else {
            (self.ap_sway, self.ml_sway)
        };
        if lo < 1e-9 {
            return if hi < 1e-9 { 1.0 } else { f64::INFINITY };
        }
        hi / lo
    }

    pub fn description(&self) -> &'static str {
        if self.stability_index > 0.8 {
            "Excellent postural control"
        } else if self.stability_index > 0.6 {
            "Good postural control"
        } else if self.stability_index > 0.4 {
            "Fair postural control"
        } else {
            "Poor postural control"
        }
    }
}

/// Result of scanning candidate sway frequencies
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencySummary {
    pub dominant_hz: f64,
    pub centroid_hz: f64,
    /// `(frequency_hz, magnitude)` for every candidate
    pub magnitudes: Vec<(f64, f64)>,
}

/// Correlate the mean-removed path with a complex sinusoid at each
/// candidate frequency and report the strongest one and the centroid
pub fn frequency_scan(
    path: &[SwayPoint],
    sample_rate: f64,
    min_hz: f64,
    max_hz: f64,
    step_hz: f64,
) -> FrequencySummary {
    use std::f64::consts::PI;

    let center = centroid(path);
    let n = path.len().max(1) as f64;
    let n_candidates = ((max_hz - min_hz) / step_hz).round() as usize + 1;

    let magnitudes: Vec<(f64, f64)> = (0..n_candidates)
        .map(|k| {
            let f = min_hz + k as f64 * step_hz;
            let w = 2.0 * PI * f / sample_rate;
            let (mut xr, mut xi, mut yr, mut yi) = (0.0, 0.0, 0.0, 0.0);
            for (i, p) in path.iter().enumerate() {
                let (sin, cos) = (w * i as f64).sin_cos();
                let dx = p.x - center.x;
                let dy = p.y - center.y;
                xr += dx * cos;
                xi -= dx * sin;
                yr += dy * cos;
                yi -= dy * sin;
            }
            let magnitude = (xr * xr + xi * xi + yr * yr + yi * yi).sqrt() / n;
            (f, magnitude)
        })
        .collect();

    let total: f64 = magnitudes.iter().map(|(_, m)| m).sum();
    if total < 1e-12 {
        return FrequencySummary {
            dominant_hz: 0.0,
            centroid_hz: 0.0,
            magnitudes,
        };
    }

    let dominant_hz = magnitudes
        .iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(f, _)| *f)
        .unwrap_or(0.0);
    let centroid_hz = magnitudes.iter().map(|(f, m)| f * m).sum::<f64>() / total;

    FrequencySummary {
        dominant_hz,
        centroid_hz,
        magnitudes,
    }
}

/// Average of an inverse-frequency and an inverse-area term, in [0, 1]
pub fn stability_index(dominant_hz: f64, sway_area_cm2: f64) -> f64 {
    let frequency_term = 1.0 / (1.0 + dominant_hz.max(0.0));
    let sway_term = 1.0 / (1.0 + sway_area_cm2.max(0.0) / STABILITY_AREA_SCALE_CM2);
    ((frequency_term + sway_term) / 2.0).clamp(0.0, 1.0)
}

/// Stateless postural feature extractor
#[derive(Debug, Clone)]
pub struct PosturalFeatureExtractor {
    config: PostureConfig,
    sample_rate: f64,
    min_samples: usize,
}

impl PosturalFeatureExtractor {
    pub fn new(config: PostureConfig, sample_rate: f64, min_samples: usize) -> Self {
        Self {
            config,
            sample_rate,
            min_samples,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.posture.clone(),
            config.sampling.sample_rate_hz,
            config.windows.min_analysis_samples,
        )
    }

    /// Enable or disable the stabilogram diffusion analysis
    pub fn with_diffusion(mut self, enabled: bool) -> Self {
        self.config.compute_diffusion = enabled;
        self
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Sway path of a window in centimetres
    pub fn sway_path(&self, orientations: &[OrientationEstimate]) -> Vec<SwayPoint> {
        sway_path_cm(orientations, self.config.device_height_m)
    }

    /// Extract all features; windows shorter than the minimum yield zeros
    pub fn extract(&self, orientations: &[OrientationEstimate]) -> PosturalFeatures {
        if orientations.len() < self.min_samples {
            return PosturalFeatures::default();
        }

        let path = self.sway_path(orientations);
        let sway_path_length_cm = path_length(&path);

        let sway_area_cm2 = Covariance2::from_points(&path)
            .map(|cov| cov.ellipse_area())
            .unwrap_or(0.0)
            .max(MIN_SWAY_AREA_CM2);

        let duration_s = self.window_duration(orientations);
        let sway_velocity_cm_s = if duration_s > 0.0 {
            sway_path_length_cm / duration_s
        } else {
            0.0
        };

        let center = centroid(&path);
        let ml: Vec<f64> = path.iter().map(|p| p.x).collect();
        let ap: Vec<f64> = path.iter().map(|p| p.y).collect();
        let ml_sway = stats::population_variance(&ml, center.x).sqrt();
        let ap_sway = stats::population_variance(&ap, center.y).sqrt();

        let frequency = frequency_scan(
            &path,
            self.sample_rate,
            self.config.frequency_min_hz,
            self.config.frequency_max_hz,
            self.config.frequency_step_hz,
        );

        let stabilogram_diffusion = if self.config.compute_diffusion {
            let max_lag = ((self.config.max_diffusion_lag_secs * self.sample_rate).round()
                as usize)
                .min(path.len() / 2);
            stabilogram_diffusion(&path, self.sample_rate, max_lag)
        } else {
            None
        };

        PosturalFeatures {
            sway_path_length_cm,
            sway_area_cm2,
            sway_velocity_cm_s,
            frequency_peaks: vec![frequency.dominant_hz, frequency.centroid_hz],
            stability_index: stability_index(frequency.dominant_hz, sway_area_cm2),
            ap_sway,
            ml_sway,
            mean_ml_cm: center.x,
            mean_ap_cm: center.y,
            duration_s,
            stabilogram_diffusion,
        }
    }

    /// Closed-eyes over open-eyes sway area
    pub fn romberg_ratio(
        &self,
        eyes_open: &[OrientationEstimate],
        eyes_closed: &[OrientationEstimate],
    ) -> f64 {
        let open = self.extract(eyes_open);
        let closed = self.extract(eyes_closed);
        sensory::romberg_ratio(open.sway_area_cm2, closed.sway_area_cm2)
    }

    /// Relative reliance on vision, proprioception and the vestibular system
    pub fn sensory_weights(
        &self,
        conditions: &[(BalanceCondition, &[OrientationEstimate])],
    ) -> Result<SensoryWeights> {
        let stabilities: Vec<(BalanceCondition, f64)> = conditions
            .iter()
            .map(|(condition, window)| (*condition, self.extract(window).stability_index))
            .collect();
        sensory::sensory_weights(&stabilities)
    }

    /// Elapsed time from timestamps, falling back to the nominal rate
    fn window_duration(&self, orientations: &[OrientationEstimate]) -> f64 {
        let (Some(first), Some(last)) = (orientations.first(), orientations.last()) else {
            return 0.0;
        };
        let elapsed_ms = last.timestamp_ms.saturating_sub(first.timestamp_ms);
        if elapsed_ms > 0 {
            elapsed_ms as f64 / 1000.0
        } else {
            (orientations.len().saturating_sub(1)) as f64 / self.sample_rate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sway_window;

    fn extractor() -> PosturalFeatureExtractor {
        PosturalFeatureExtractor::from_config(&EngineConfig::default())
    }

    #[test]
    fn test_short_window_is_zeroed() {
        let features = extractor().extract(&sway_window(99, 1.0, 0.5));
        assert_eq!(features, PosturalFeatures::default());
        assert!(!features.has_data());
    }

    #[test]
    fn test_motionless_window_has_area_floor() {
        let window: Vec<OrientationEstimate> = (0..150)
            .map(|i| OrientationEstimate::new(0.0, 0.0, 0.0, i * 20))
            .collect();
        let features = extractor().extract(&window);

        assert_eq!(features.sway_area_cm2, MIN_SWAY_AREA_CM2);
        assert_eq!(features.sway_path_length_cm, 0.0);
        assert_eq!(features.sway_velocity_cm_s, 0.0);
        assert!(features.stability_index > 0.9);
    }

    #[test]
    fn test_area_grows_with_amplitude() {
        let extractor = extractor();
        let mut previous = 0.0;
        for amplitude in [0.01, 0.1, 0.5, 1.0, 2.0, 4.0] {
            let area = extractor.extract(&sway_window(250, amplitude, 0.5)).sway_area_cm2;
            assert!(area >= previous, "area {} < {}", area, previous);
            previous = area;
        }
    }

    #[test]
    fn test_dominant_frequency() {
        let features = extractor().extract(&sway_window(250, 1.0, 0.8));
        assert!((features.dominant_frequency() - 0.8).abs() < 0.15);
        assert!(features.spectral_centroid() > 0.1);
        assert_eq!(features.frequency_peaks.len(), 2);
    }

    #[test]
    fn test_directional_sway_and_velocity() {
        let features = extractor().extract(&sway_window(250, 2.0, 0.5));

        // Roll amplitude is twice the pitch amplitude
        assert!(features.ml_sway > features.ap_sway);
        assert!((features.asymmetry_ratio() - 2.0).abs() < 0.3);

        // RMS of a sine is amplitude / sqrt(2)
        let expected_ml = stabilo_core::angle_to_displacement_cm(2.0, 1.0) / 2f64.sqrt();
        assert!((features.ml_sway - expected_ml).abs() / expected_ml < 0.1);

        assert!((features.duration_s - 4.98).abs() < 1e-9);
        assert!(
            (features.sway_velocity_cm_s - features.sway_path_length_cm / features.duration_s)
                .abs()
                < 1e-9
        );
    }

    #[test]
    fn test_garbage_timestamps_do_not_overflow() {
        let mut window = sway_window(150, 1.0, 0.5);
        window[0].timestamp_ms = i64::MIN;
        if let Some(last) = window.last_mut() {
            last.timestamp_ms = i64::MAX;
        }
        let features = extractor().extract(&window);
        assert!(features.duration_s.is_finite() && features.duration_s > 0.0);
        assert!(features.sway_velocity_cm_s.is_finite());

        // Backwards clock falls back to the nominal rate
        window[0].timestamp_ms = i64::MAX;
        if let Some(last) = window.last_mut() {
            last.timestamp_ms = i64::MIN;
        }
        let features = extractor().extract(&window);
        assert!((features.duration_s - 149.0 / 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let extractor = extractor();
        let window = sway_window(200, 1.5, 0.3);
        assert_eq!(extractor.extract(&window), extractor.extract(&window));
    }

    #[test]
    fn test_stability_index_bounds() {
        assert!((stability_index(0.0, 0.0) - 1.0).abs() < 1e-12);
        assert!(stability_index(5.0, 1000.0) < 0.1);
        assert!(stability_index(0.5, 5.0) > stability_index(0.5, 50.0));
        for f in [0.0, 0.1, 1.0, 5.0] {
            for a in [0.1, 10.0, 100.0] {
                let s = stability_index(f, a);
                assert!((0.0..=1.0).contains(&s));
            }
        }
    }

    #[test]
    fn test_diffusion_toggle() {
        let window = sway_window(250, 1.0, 0.5);
        let with = extractor().extract(&window);
        assert!(with.stabilogram_diffusion.is_some());

        let without = extractor().with_diffusion(false).extract(&window);
        assert!(without.stabilogram_diffusion.is_none());
        assert_eq!(without.sway_area_cm2, with.sway_area_cm2);
    }

    #[test]
    fn test_romberg_from_windows() {
        let extractor = extractor();
        let open = sway_window(250, 0.5, 0.4);
        let closed = sway_window(250, 1.0, 0.4);

        // Doubling the amplitude quadruples the area
        let ratio = extractor.romberg_ratio(&open, &closed);
        assert!((ratio - 4.0).abs() < 0.1, "ratio = {}", ratio);
    }

    #[test]
    fn test_sensory_weights_from_windows() {
        let extractor = extractor();
        let firm_open = sway_window(250, 0.3, 0.3);
        let firm_closed = sway_window(250, 2.5, 0.6);
        let foam_open = sway_window(250, 0.5, 0.3);

        let weights = extractor
            .sensory_weights(&[
                (BalanceCondition::EyesOpenFirm, firm_open.as_slice()),
                (BalanceCondition::EyesClosedFirm, firm_closed.as_slice()),
                (BalanceCondition::EyesOpenFoam, foam_open.as_slice()),
            ])
            .unwrap();

        assert!((weights.visual + weights.proprioceptive + weights.vestibular - 1.0).abs() < 1e-9);
        assert!(weights.visual > weights.proprioceptive);

        let missing_baseline = extractor.sensory_weights(&[
            (BalanceCondition::EyesClosedFirm, firm_closed.as_slice()),
            (BalanceCondition::EyesOpenFoam, foam_open.as_slice()),
        ]);
        assert!(missing_baseline.is_err());
    }
}
