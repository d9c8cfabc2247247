//! Sensory-integration estimates from balance conditions.
//!
//! Upright balance combines visual, proprioceptive (feet and ankles) and
//! vestibular input. Removing vision (eyes closed) or degrading
//! proprioception (compliant foam) and measuring the loss of stability
//! shows how much the person relies on each channel.

use serde::{Deserialize, Serialize};

use stabilo_core::{stats, Error, Result};

pub const MIN_ROMBERG_RATIO: f64 = 0.5;
pub const MAX_ROMBERG_RATIO: f64 = 10.0;

/// Spread of per-condition stability giving full confidence
const FULL_CONFIDENCE_SPREAD: f64 = 0.2;

/// Closed-eyes over open-eyes sway area, clamped to [0.5, 10]
pub fn romberg_ratio(eyes_open_area_cm2: f64, eyes_closed_area_cm2: f64) -> f64 {
    if eyes_open_area_cm2 <= 0.0 {
        return 1.0;
    }
    (eyes_closed_area_cm2 / eyes_open_area_cm2).clamp(MIN_ROMBERG_RATIO, MAX_ROMBERG_RATIO)
}

/// Standing condition of the modified clinical sensory interaction test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BalanceCondition {
    EyesOpenFirm,
    EyesClosedFirm,
    EyesOpenFoam,
    EyesClosedFoam,
}

/// Relative reliance on each sensory system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensoryWeights {
    pub visual: f64,
    pub proprioceptive: f64,
    pub vestibular: f64,
    /// How well the conditions discriminate between systems (0-1)
    pub confidence: f64,
}

impl SensoryWeights {
    pub fn dominant(&self) -> &'static str {
        if self.visual >= self.proprioceptive && self.visual >= self.vestibular {
            "visual"
        } else if self.proprioceptive >= self.vestibular {
            "proprioceptive"
        } else {
            "vestibular"
        }
    }
}

/// Estimate sensory weights from per-condition stability indices.
///
/// Requires two to four distinct conditions including eyes-open on a firm
/// surface as the baseline.
pub fn sensory_weights(conditions: &[(BalanceCondition, f64)]) -> Result<SensoryWeights> {
    if !(2..=4).contains(&conditions.len()) {
        return Err(Error::InvalidInput(format!(
            "sensory weighting needs 2-4 conditions, got {}",
            conditions.len()
        )));
    }
    for (i, (condition, _)) in conditions.iter().enumerate() {
        if conditions[..i].iter().any(|(c, _)| c == condition) {
            return Err(Error::InvalidInput(format!("duplicate condition {:?}", condition)));
        }
    }

    let stability = |wanted: BalanceCondition| {
        conditions
            .iter()
            .find(|(c, _)| *c == wanted)
            .map(|(_, s)| s.clamp(0.0, 1.0))
    };

    let baseline = stability(BalanceCondition::EyesOpenFirm).ok_or_else(|| {
        Error::InvalidInput("eyes-open firm-surface baseline is required".into())
    })?;
    let closed_firm = stability(BalanceCondition::EyesClosedFirm);
    let open_foam = stability(BalanceCondition::EyesOpenFoam);
    let closed_foam = stability(BalanceCondition::EyesClosedFoam);

    let visual = match (closed_firm, open_foam, closed_foam) {
        (Some(cf), _, _) => baseline - cf,
        (None, Some(of), Some(xf)) => of - xf,
        _ => 0.0,
    }
    .max(0.0);

    let proprioceptive = match (open_foam, closed_firm, closed_foam) {
        (Some(of), _, _) => baseline - of,
        (None, Some(cf), Some(xf)) => cf - xf,
        _ => 0.0,
    }
    .max(0.0);

    // What is left once the other channels are removed
    let vestibular = closed_foam.unwrap_or_else(|| {
        conditions
            .iter()
            .map(|(_, s)| s.clamp(0.0, 1.0))
            .fold(f64::INFINITY, f64::min)
    });

    let total = visual + proprioceptive + vestibular;
    let (visual, proprioceptive, vestibular) = if total < 1e-9 {
        (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0)
    } else {
        (visual / total, proprioceptive / total, vestibular / total)
    };

    let values: Vec<f64> = conditions.iter().map(|(_, s)| s.clamp(0.0, 1.0)).collect();
    let spread = stats::std_dev(&values);
    let coverage = conditions.len() as f64 / 4.0;
    let confidence = ((spread / FULL_CONFIDENCE_SPREAD).min(1.0) * coverage).clamp(0.0, 1.0);

    Ok(SensoryWeights {
        visual,
        proprioceptive,
        vestibular,
        confidence,
    })
}
