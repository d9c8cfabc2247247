//! Flattened, normalized feature vector for external scorers.
//!
//! Layout (32 values, each clamped to [0, 1]):
//!
//! - 0..16: postural
//! - 16..24: respiratory
//! - 24..28: temporal
//! - 28..32: demographic
//!
//! Values that are unavailable (no diffusion analysis, unknown age, ...)
//! are encoded as 0.5.

use chrono::{DateTime, Datelike, Timelike, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use stabilo_signal::RespiratoryMetrics;

use crate::features::PosturalFeatures;

pub const FEATURE_DIM: usize = 32;
pub const POSTURAL_DIM: usize = 16;
pub const RESPIRATORY_DIM: usize = 8;
pub const TEMPORAL_DIM: usize = 4;
pub const DEMOGRAPHIC_DIM: usize = 4;

/// Encoding of a missing value
pub const MISSING: f64 = 0.5;

/// `(name, min, max)` for every slot, in vector order
pub const FEATURE_RANGES: [(&str, f64, f64); FEATURE_DIM] = [
    ("sway_path_length_cm", 0.0, 200.0),
    ("sway_area_cm2", 0.0, 20.0),
    ("sway_velocity_cm_s", 0.0, 10.0),
    ("stability_index", 0.0, 1.0),
    ("ap_sway_cm", 0.0, 5.0),
    ("ml_sway_cm", 0.0, 5.0),
    ("dominant_frequency_hz", 0.0, 5.0),
    ("spectral_centroid_hz", 0.0, 5.0),
    ("asymmetry_ratio", 0.0, 3.0),
    ("diffusion_short_term_slope", 0.0, 20.0),
    ("diffusion_long_term_slope", 0.0, 20.0),
    ("diffusion_critical_time_s", 0.0, 2.0),
    ("diffusion_coefficient", 0.0, 10.0),
    ("mean_ml_offset_cm", -5.0, 5.0),
    ("mean_ap_offset_cm", -5.0, 5.0),
    ("romberg_ratio", 0.5, 10.0),
    ("breathing_rate_bpm", 10.0, 30.0),
    ("breathing_amplitude", 0.0, 500.0),
    ("ie_ratio", 0.0, 4.0),
    ("breathing_regularity", 0.0, 1.0),
    ("respiratory_signal_quality", 0.0, 1.0),
    ("breath_peak_count", 0.0, 10.0),
    ("breath_valley_count", 0.0, 10.0),
    ("breath_cycle_duration_s", 2.0, 12.0),
    ("exercise_elapsed_s", 0.0, 60.0),
    ("exercise_progress_pct", 0.0, 100.0),
    ("hour_of_day", 0.0, 24.0),
    ("day_of_week", 0.0, 6.0),
    ("age_years", 18.0, 90.0),
    ("height_cm", 140.0, 210.0),
    ("weight_kg", 40.0, 150.0),
    ("sex", 0.0, 1.0),
];

/// Min/max normalization clamped to [0, 1]
pub fn normalize_to_range(value: f64, min: f64, max: f64) -> f64 {
    if max <= min || value.is_nan() {
        return MISSING;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// Names of all slots, in vector order
pub fn feature_names() -> Vec<&'static str> {
    FEATURE_RANGES.iter().map(|(name, _, _)| *name).collect()
}

/// When the window was recorded, relative to the exercise and the clock
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TemporalContext {
    pub elapsed_s: f64,
    pub progress_pct: f64,
    /// Fractional hour, 0-24
    pub hour_of_day: f64,
    /// Days since Monday, 0-6
    pub day_of_week: u32,
}

impl TemporalContext {
    pub fn at(timestamp: DateTime<Utc>, elapsed_s: f64, progress_pct: f64) -> Self {
        Self {
            elapsed_s,
            progress_pct,
            hour_of_day: timestamp.hour() as f64 + timestamp.minute() as f64 / 60.0,
            day_of_week: timestamp.weekday().num_days_from_monday(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Female,
    Male,
}

/// Optional anthropometrics of the person
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Demographics {
    pub age_years: Option<f64>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub sex: Option<Sex>,
}

/// Flatten one window of features into the normalized 32-value vector
pub fn build_feature_vector(
    postural: &PosturalFeatures,
    respiratory: &RespiratoryMetrics,
    romberg_ratio: Option<f64>,
    temporal: &TemporalContext,
    demographics: &Demographics,
) -> Array1<f64> {
    let diffusion = postural.stabilogram_diffusion;
    let asymmetry = if postural.has_data() {
        Some(postural.asymmetry_ratio())
    } else {
        None
    };
    let cycle_duration = if respiratory.breathing_rate_bpm > 0.0 {
        Some(60.0 / respiratory.breathing_rate_bpm)
    } else {
        None
    };

    let raw: [Option<f64>; FEATURE_DIM] = [
        Some(postural.sway_path_length_cm),
        Some(postural.sway_area_cm2),
        Some(postural.sway_velocity_cm_s),
        Some(postural.stability_index),
        Some(postural.ap_sway),
        Some(postural.ml_sway),
        Some(postural.dominant_frequency()),
        Some(postural.spectral_centroid()),
        asymmetry,
        diffusion.map(|d| d.short_term_slope),
        diffusion.map(|d| d.long_term_slope),
        diffusion.map(|d| d.critical_time_s),
        diffusion.map(|d| d.diffusion_coefficient),
        Some(postural.mean_ml_cm),
        Some(postural.mean_ap_cm),
        romberg_ratio,
        Some(respiratory.breathing_rate_bpm),
        Some(respiratory.amplitude),
        Some(respiratory.ie_ratio),
        Some(respiratory.regularity),
        respiratory.signal_quality,
        Some(respiratory.peak_indices.len() as f64),
        Some(respiratory.valley_indices.len() as f64),
        cycle_duration,
        Some(temporal.elapsed_s),
        Some(temporal.progress_pct),
        Some(temporal.hour_of_day),
        Some(temporal.day_of_week as f64),
        demographics.age_years,
        demographics.height_cm,
        demographics.weight_kg,
        demographics.sex.map(|s| match s {
            Sex::Female => 0.0,
            Sex::Male => 1.0,
        }),
    ];

    raw.iter()
        .zip(FEATURE_RANGES.iter())
        .map(|(value, (_, min, max))| match value {
            Some(v) => normalize_to_range(*v, *min, *max),
            None => MISSING,
        })
        .collect()
}
