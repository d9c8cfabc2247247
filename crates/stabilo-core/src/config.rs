//! Engine configuration.
//!
//! Every section has defaults matching a 50 Hz chest-worn sensor; any subset
//! can be overridden from a file or `STABILO__SECTION__KEY` environment
//! variables.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sensor sampling parameters
    pub sampling: SamplingConfig,

    /// Orientation fusion strategy and parameters
    pub fusion: FusionConfig,

    /// Buffer and window sizes
    pub windows: WindowConfig,

    /// Respiratory signal processing
    pub respiration: RespirationConfig,

    /// Postural feature extraction
    pub posture: PostureConfig,

    /// Real-time alerting
    pub alerts: AlertConfig,

    /// Clinical reference thresholds
    pub clinical: ClinicalThresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Nominal sample rate (Hz)
    pub sample_rate_hz: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 50.0,
        }
    }
}

/// Orientation fusion strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    Complementary,
    Kalman,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub strategy: FusionStrategy,

    /// Gyroscope weight of the complementary filter (0-1)
    pub complementary_alpha: f64,

    pub kalman: KalmanConfig,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            strategy: FusionStrategy::Complementary,
            complementary_alpha: 0.98,
            kalman: KalmanConfig::default(),
        }
    }
}

/// Kalman noise matrices, row-major nested arrays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    /// Process noise Q over [roll, pitch, roll_rate, pitch_rate] (4x4)
    pub process_noise: Vec<Vec<f64>>,

    /// Measurement noise R over accelerometer [roll, pitch] (2x2)
    pub measurement_noise: Vec<Vec<f64>>,

    /// Initial estimate covariance diagonal
    pub initial_covariance: f64,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            process_noise: diagonal(&[0.001, 0.001, 0.003, 0.003]),
            measurement_noise: diagonal(&[0.1, 0.1]),
            initial_covariance: 1.0,
        }
    }
}

fn diagonal(values: &[f64]) -> Vec<Vec<f64>> {
    (0..values.len())
        .map(|i| {
            (0..values.len())
                .map(|j| if i == j { values[i] } else { 0.0 })
                .collect()
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Real-time circular buffer length (seconds)
    pub buffer_secs: f64,

    /// Samples that must be buffered before a feature pass (seconds)
    pub feature_window_secs: f64,

    /// Respiratory ring buffer length (seconds)
    pub respiratory_buffer_secs: f64,

    /// Minimum samples for any postural or respiratory analysis
    pub min_analysis_samples: usize,

    /// Number of recent stability scores kept for confidence estimation
    pub feature_history_len: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            buffer_secs: 5.0,
            feature_window_secs: 1.0,
            respiratory_buffer_secs: 10.0,
            min_analysis_samples: 100,
            feature_history_len: 10,
        }
    }
}

impl WindowConfig {
    pub fn buffer_samples(&self, sample_rate_hz: f64) -> usize {
        seconds_to_samples(self.buffer_secs, sample_rate_hz)
    }

    pub fn feature_window_samples(&self, sample_rate_hz: f64) -> usize {
        seconds_to_samples(self.feature_window_secs, sample_rate_hz)
    }

    pub fn respiratory_buffer_samples(&self, sample_rate_hz: f64) -> usize {
        seconds_to_samples(self.respiratory_buffer_secs, sample_rate_hz)
    }
}

fn seconds_to_samples(secs: f64, sample_rate_hz: f64) -> usize {
    (secs * sample_rate_hz).round().max(1.0) as usize
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RespirationConfig {
    /// Low-pass cutoff for the stretch channel (Hz)
    pub lowpass_cutoff_hz: f64,

    /// Peak/valley threshold in standard deviations from the mean
    pub peak_threshold_std: f64,

    pub min_rate_bpm: f64,
    pub max_rate_bpm: f64,

    /// Reported when fewer than two peaks are found
    pub default_rate_bpm: f64,

    /// Reported when inspiration/expiration phases cannot be timed
    pub default_ie_ratio: f64,

    /// Breathing band used for the signal quality estimate (Hz)
    pub band_low_hz: f64,
    pub band_high_hz: f64,
}

impl Default for RespirationConfig {
    fn default() -> Self {
        Self {
            lowpass_cutoff_hz: 2.0,
            peak_threshold_std: 0.3,
            min_rate_bpm: 5.0,
            max_rate_bpm: 30.0,
            default_rate_bpm: 15.0,
            default_ie_ratio: 0.5,
            band_low_hz: 0.1,
            band_high_hz: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostureConfig {
    /// Height of the sensor above the ankle joint (m)
    pub device_height_m: f64,

    /// Sway frequency scan range and resolution (Hz)
    pub frequency_min_hz: f64,
    pub frequency_max_hz: f64,
    pub frequency_step_hz: f64,

    /// Compute stabilogram diffusion on every extraction
    pub compute_diffusion: bool,

    /// Longest lag considered by the diffusion analysis (seconds)
    pub max_diffusion_lag_secs: f64,
}

impl Default for PostureConfig {
    fn default() -> Self {
        Self {
            device_height_m: 1.0,
            frequency_min_hz: 0.1,
            frequency_max_hz: 5.0,
            frequency_step_hz: 0.1,
            compute_diffusion: true,
            max_diffusion_lag_secs: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Stability index below which balance is flagged
    pub stability_threshold: f64,

    /// Combined RMS sway above which sway is flagged (cm)
    pub sway_threshold_cm: f64,

    /// Ratio between the larger and smaller directional sway
    pub asymmetry_ratio: f64,

    /// Nominal exercise length used for progress reporting (seconds)
    pub exercise_duration_secs: f64,

    pub low_battery_percent: u8,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            stability_threshold: 0.3,
            sway_threshold_cm: 5.0,
            asymmetry_ratio: 2.0,
            exercise_duration_secs: 60.0,
            low_battery_percent: 15,
        }
    }
}

/// Reference values used to interpret sway areas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalThresholds {
    pub normal_area_min_cm2: f64,
    pub normal_area_max_cm2: f64,
    pub pathological_area_cm2: f64,

    /// Percent change regarded as significant
    pub significant_change_pct: f64,

    /// Percent change regarded as a change at all
    pub change_pct: f64,

    /// Sessions averaged at each end of a longitudinal trend
    pub trend_window: usize,

    /// Percent difference between trend windows regarded as a trend
    pub trend_change_pct: f64,
}

impl Default for ClinicalThresholds {
    fn default() -> Self {
        Self {
            normal_area_min_cm2: 10.0,
            normal_area_max_cm2: 20.0,
            pathological_area_cm2: 50.0,
            significant_change_pct: 25.0,
            change_pct: 10.0,
            trend_window: 3,
            trend_change_pct: 10.0,
        }
    }
}

impl EngineConfig {
    const ENV_PREFIX: &'static str = "STABILO";

    /// Load configuration from file, with environment overrides
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix(Self::ENV_PREFIX).separator("__"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        tracing::debug!("Loaded engine configuration from {}", path);
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix(Self::ENV_PREFIX).separator("__"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the signal chain meaningless
    pub fn validate(&self) -> Result<()> {
        if self.sampling.sample_rate_hz.is_nan() || self.sampling.sample_rate_hz <= 0.0 {
            return Err(Error::Config("sample rate must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.fusion.complementary_alpha) {
            return Err(Error::Config(format!(
                "complementary alpha must lie in [0, 1], got {}",
                self.fusion.complementary_alpha
            )));
        }
        if self.windows.feature_window_secs > self.windows.buffer_secs {
            return Err(Error::Config(
                "feature window cannot exceed the real-time buffer".into(),
            ));
        }
        if self.windows.min_analysis_samples < 4 {
            return Err(Error::Config("minimum analysis window too small".into()));
        }
        if self.respiration.min_rate_bpm >= self.respiration.max_rate_bpm {
            return Err(Error::Config("breathing rate bounds are inverted".into()));
        }
        if self.respiration.lowpass_cutoff_hz <= 0.0 {
            return Err(Error::Config("low-pass cutoff must be positive".into()));
        }
        if self.posture.frequency_step_hz <= 0.0
            || self.posture.frequency_min_hz >= self.posture.frequency_max_hz
        {
            return Err(Error::Config("invalid sway frequency scan range".into()));
        }
        if self.posture.device_height_m <= 0.0 {
            return Err(Error::Config("device height must be positive".into()));
        }
        if self.clinical.normal_area_max_cm2 <= 0.0 || self.clinical.trend_window == 0 {
            return Err(Error::Config("invalid clinical thresholds".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.sampling.sample_rate_hz, 50.0);
        assert_eq!(config.fusion.complementary_alpha, 0.98);
        assert_eq!(config.windows.buffer_samples(50.0), 250);
        assert_eq!(config.windows.feature_window_samples(50.0), 50);
        assert_eq!(config.windows.respiratory_buffer_samples(50.0), 500);
        assert_eq!(config.alerts.stability_threshold, 0.3);
        assert_eq!(config.alerts.sway_threshold_cm, 5.0);
        assert_eq!(config.clinical.pathological_area_cm2, 50.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_kalman_shapes() {
        let kalman = KalmanConfig::default();
        assert_eq!(kalman.process_noise.len(), 4);
        assert!(kalman.process_noise.iter().all(|row| row.len() == 4));
        assert_eq!(kalman.measurement_noise.len(), 2);
        assert_eq!(kalman.measurement_noise[1][1], 0.1);
        assert_eq!(kalman.measurement_noise[0][1], 0.0);
    }

    #[test]
    fn test_validation_rejects_bad_alpha() {
        let mut config = EngineConfig::default();
        config.fusion.complementary_alpha = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_partial_file() {
        let path = std::env::temp_dir().join(format!("stabilo-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "[sampling]\nsample_rate_hz = 100.0\n\n[fusion]\nstrategy = \"kalman\"\n",
        )
        .unwrap();

        let config = EngineConfig::from_file(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.sampling.sample_rate_hz, 100.0);
        assert_eq!(config.fusion.strategy, FusionStrategy::Kalman);
        // Untouched sections keep their defaults
        assert_eq!(config.windows, WindowConfig::default());
        assert_eq!(config.clinical, ClinicalThresholds::default());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
