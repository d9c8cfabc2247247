//! Stabilogram diffusion analysis.
//!
//! Mean squared displacement of the sway path grows quickly over short
//! time lags (open-loop control) and flattens over long lags once
//! closed-loop corrections take over. The lag where the slope changes most
//! separates the two regimes.

use serde::{Deserialize, Serialize};

use stabilo_core::{stats, SwayPoint};

/// Fewest MSD points allowed in each regression region
const MIN_REGION_POINTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilogramDiffusion {
    /// Short-term MSD slope (cm²/s)
    pub short_term_slope: f64,
    /// Long-term MSD slope (cm²/s)
    pub long_term_slope: f64,
    /// Lag of the regime transition (s)
    pub critical_time_s: f64,
    /// MSD at the transition (cm²)
    pub critical_msd: f64,
    /// Short-term diffusion coefficient, half the short-term slope
    pub diffusion_coefficient: f64,
}

/// Mean squared displacement for lags `1..=max_lag` samples
pub fn mean_squared_displacement(path: &[SwayPoint], max_lag: usize) -> Vec<f64> {
    (1..=max_lag.min(path.len().saturating_sub(1)))
        .map(|lag| {
            let count = path.len() - lag;
            path.iter()
                .zip(&path[lag..])
                .map(|(a, b)| (b.x - a.x).powi(2) + (b.y - a.y).powi(2))
                .sum::<f64>()
                / count as f64
        })
        .collect()
}

/// Two-regime diffusion summary; `None` when too few lags are available
pub fn stabilogram_diffusion(
    path: &[SwayPoint],
    sample_rate: f64,
    max_lag: usize,
) -> Option<StabilogramDiffusion> {
    let msd = mean_squared_displacement(path, max_lag);
    if msd.len() < 2 * MIN_REGION_POINTS {
        return None;
    }

    let dt = 1.0 / sample_rate;
    let lags: Vec<f64> = (1..=msd.len()).map(|k| k as f64 * dt).collect();
    let slopes: Vec<f64> = msd.windows(2).map(|w| (w[1] - w[0]) / dt).collect();

    // slopes[k - 1] enters point k, slopes[k] leaves it
    let critical = (MIN_REGION_POINTS - 1..=msd.len() - MIN_REGION_POINTS)
        .max_by(|&a, &b| {
            let change_a = (slopes[a] - slopes[a - 1]).abs();
            let change_b = (slopes[b] - slopes[b - 1]).abs();
            change_a.total_cmp(&change_b)
        })?;

    let short_term_slope = stats::linear_regression_slope(&lags[..=critical], &msd[..=critical]);
    let long_term_slope = stats::linear_regression_slope(&lags[critical..], &msd[critical..]);

    Some(StabilogramDiffusion {
        short_term_slope,
        long_term_slope,
        critical_time_s: lags[critical],
        critical_msd: msd[critical],
        diffusion_coefficient: short_term_slope / 2.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msd_of_linear_drift() {
        // Constant velocity: MSD grows with the square of the lag
        let path: Vec<SwayPoint> = (0..50).map(|i| SwayPoint::new(i as f64, 0.0)).collect();
        let msd = mean_squared_displacement(&path, 5);
        assert_eq!(msd, vec![1.0, 4.0, 9.0, 16.0, 25.0]);
    }

    #[test]
    fn test_too_few_lags() {
        let path: Vec<SwayPoint> = (0..5).map(|i| SwayPoint::new(i as f64, 0.0)).collect();
        assert!(stabilogram_diffusion(&path, 50.0, 100).is_none());
    }

    #[test]
    fn test_bounded_sway_flattens() {
        // Slow oscillation: MSD rises, then turns over near half a period
        let path: Vec<SwayPoint> = (0..500)
            .map(|i| {
                let t = i as f64 / 50.0;
                SwayPoint::new((2.0 * std::f64::consts::PI * 0.3 * t).sin(), 0.0)
            })
            .collect();
        let sdf = stabilogram_diffusion(&path, 50.0, 100).unwrap();

        assert!(sdf.short_term_slope > 0.0);
        assert!(sdf.short_term_slope > sdf.long_term_slope.abs());
        assert!(sdf.critical_time_s > 1.0 && sdf.critical_time_s <= 2.0);
        assert!((sdf.diffusion_coefficient - sdf.short_term_slope / 2.0).abs() < 1e-12);
    }
}
