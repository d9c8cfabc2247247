//! Live feedback derived from one feature pass.

use serde::{Deserialize, Serialize};

use stabilo_core::{stats, AlertConfig, ExerciseType};
use stabilo_posture::PosturalFeatures;
use stabilo_signal::RespiratoryMetrics;

use crate::processor::ProcessorState;

/// Breathing rate scoring best (bpm)
pub const TARGET_BREATHING_RATE_BPM: f64 = 15.0;

/// Falling phase about twice as long as the rising one
pub const TARGET_IE_RATIO: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ExcessiveSway,
    PoorBalance,
    AsymmetricPosture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

impl AlertSeverity {
    /// Severity from how far a metric overshoots its threshold, relative to it
    pub fn from_excess(relative_excess: f64) -> Self {
        if relative_excess >= 0.5 {
            AlertSeverity::High
        } else if relative_excess >= 0.25 {
            AlertSeverity::Medium
        } else {
            AlertSeverity::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostureAlert {
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
}

/// Output of one real-time feature pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealTimeInsights {
    /// Timestamp of the newest sample in the window
    pub timestamp_ms: i64,
    pub exercise_type: Option<ExerciseType>,
    pub state: ProcessorState,
    pub stability_score: f64,
    /// 0-1
    pub breathing_quality: f64,
    pub breathing_rate_bpm: f64,
    pub alert: Option<PostureAlert>,
    pub recommendations: Vec<String>,
    /// 0-100
    pub exercise_progress_pct: f64,
    /// 0-1
    pub confidence: f64,
    /// Smoothed skin temperature
    pub skin_temperature_c: Option<f64>,
    pub postural_features: PosturalFeatures,
}

/// Weighted rate, regularity and I:E scores; zero without respiratory data
pub fn breathing_quality(metrics: &RespiratoryMetrics) -> f64 {
    if !metrics.has_data() {
        return 0.0;
    }

    let rate_score = (1.0
        - (metrics.breathing_rate_bpm - TARGET_BREATHING_RATE_BPM).abs()
            / TARGET_BREATHING_RATE_BPM)
        .clamp(0.0, 1.0);
    let ie_score =
        (1.0 - (metrics.ie_ratio - TARGET_IE_RATIO).abs() / TARGET_IE_RATIO).clamp(0.0, 1.0);

    (0.4 * rate_score + 0.4 * metrics.regularity.clamp(0.0, 1.0) + 0.2 * ie_score).clamp(0.0, 1.0)
}

/// The single most pressing postural alert, if any.
///
/// Checked in order: excessive sway, poor balance, asymmetric posture.
/// Zeroed features never alert.
pub fn select_alert(features: &PosturalFeatures, config: &AlertConfig) -> Option<PostureAlert> {
    if !features.has_data() {
        return None;
    }

    let sway = features.combined_sway();
    if sway > config.sway_threshold_cm {
        let excess = (sway - config.sway_threshold_cm) / config.sway_threshold_cm;
        return Some(PostureAlert {
            kind: AlertKind::ExcessiveSway,
            severity: AlertSeverity::from_excess(excess),
            message: format!(
                "Sway of {:.1} cm exceeds {:.1} cm",
                sway, config.sway_threshold_cm
            ),
        });
    }

    if features.stability_index < config.stability_threshold {
        let excess =
            (config.stability_threshold - features.stability_index) / config.stability_threshold;
        return Some(PostureAlert {
            kind: AlertKind::PoorBalance,
            severity: AlertSeverity::from_excess(excess),
            message: format!(
                "Stability {:.2} is below {:.2}",
                features.stability_index, config.stability_threshold
            ),
        });
    }

    let asymmetry = features.asymmetry_ratio();
    if asymmetry > config.asymmetry_ratio {
        let excess = if asymmetry.is_finite() {
            (asymmetry - config.asymmetry_ratio) / config.asymmetry_ratio
        } else {
            1.0
        };
        let direction = if features.ml_sway > features.ap_sway {
            "side-to-side"
        } else {
            "front-to-back"
        };
        return Some(PostureAlert {
            kind: AlertKind::AsymmetricPosture,
            severity: AlertSeverity::from_excess(excess),
            message: format!("Sway is mostly {}", direction),
        });
    }

    None
}

pub fn recommendations(
    features: &PosturalFeatures,
    alert: Option<&PostureAlert>,
    breathing_quality: f64,
) -> Vec<String> {
    if !features.has_data() {
        return vec!["Collecting data, hold still".to_string()];
    }

    let mut out = Vec::new();

    match alert.map(|a| a.kind) {
        Some(AlertKind::ExcessiveSway) => {
            out.push("Widen your stance slightly and soften your knees".to_string());
        }
        Some(AlertKind::PoorBalance) => {
            out.push("Keep a stable support within reach".to_string());
            out.push("Fix your gaze on a point at eye level".to_string());
        }
        Some(AlertKind::AsymmetricPosture) => {
            out.push("Distribute your weight evenly over both feet".to_string());
        }
        None => {}
    }

    if breathing_quality > 0.0 && breathing_quality < 0.5 {
        out.push("Slow your breathing and lengthen each exhale".to_string());
    }

    if out.is_empty() {
        out.push("Good control, keep holding the position".to_string());
    }
    out
}

/// Elapsed fraction of the nominal exercise length, capped at 100 %
pub fn exercise_progress(elapsed_s: f64, exercise_duration_s: f64) -> f64 {
    if exercise_duration_s <= 0.0 {
        return 100.0;
    }
    (elapsed_s.max(0.0) / exercise_duration_s * 100.0).min(100.0)
}

/// Regularity of sample arrival: 1 for a perfectly even clock
pub fn timing_consistency(timestamps_ms: &[i64]) -> f64 {
    let intervals: Vec<f64> = timestamps_ms
        .windows(2)
        .map(|w| w[1].saturating_sub(w[0]) as f64)
        .collect();
    if intervals.is_empty() || stats::mean(&intervals) <= 0.0 {
        return 0.0;
    }
    1.0 / (1.0 + stats::coefficient_of_variation(&intervals))
}

/// Steadiness of recent stability scores.
///
/// Zero before any score exists, neutral with a single one.
pub fn feature_consistency(stability_history: &[f64]) -> f64 {
    match stability_history.len() {
        0 => return 0.0,
        1 => return 0.5,
        _ => {}
    }
    let mean = stats::mean(stability_history);
    1.0 / (1.0 + 10.0 * stats::variance(stability_history, mean).sqrt())
}

/// Blend of data quality, feature consistency and respiratory strength
pub fn confidence(
    timestamps_ms: &[i64],
    stability_history: &[f64],
    respiratory: &RespiratoryMetrics,
) -> f64 {
    let respiratory_strength = respiratory.signal_quality.unwrap_or(0.0).clamp(0.0, 1.0);

    (0.4 * timing_consistency(timestamps_ms)
        + 0.3 * feature_consistency(stability_history)
        + 0.3 * respiratory_strength)
        .clamp(0.0, 1.0)
}
