//! Centre-of-pressure sway paths.
//!
//! A chest-worn sensor tilts around the ankles like an inverted pendulum, so
//! small roll/pitch angles map onto horizontal displacement of the body's
//! centre of mass.

use serde::{Deserialize, Serialize};

use crate::types::OrientationEstimate;

/// Horizontal sway position: `x` medio-lateral, `y` antero-posterior
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SwayPoint {
    pub x: f64,
    pub y: f64,
}

impl SwayPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &SwayPoint) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }
}

/// Arc length of a small tilt at the given pivot height, in centimetres
pub fn angle_to_displacement_cm(angle_deg: f64, height_m: f64) -> f64 {
    angle_deg * height_m * std::f64::consts::PI / 180.0 * 100.0
}

/// Convert orientation estimates into a sway path in centimetres
pub fn sway_path_cm(orientations: &[OrientationEstimate], height_m: f64) -> Vec<SwayPoint> {
    orientations
        .iter()
        .map(|o| {
            SwayPoint::new(
                angle_to_displacement_cm(o.roll, height_m),
                angle_to_displacement_cm(o.pitch, height_m),
            )
        })
        .collect()
}

/// Total distance travelled along the path
pub fn path_length(points: &[SwayPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points.windows(2).map(|w| w[0].distance_to(&w[1])).sum()
}

pub fn centroid(points: &[SwayPoint]) -> SwayPoint {
    if points.is_empty() {
        return SwayPoint::default();
    }
    let n = points.len() as f64;
    SwayPoint::new(
        points.iter().map(|p| p.x).sum::<f64>() / n,
        points.iter().map(|p| p.y).sum::<f64>() / n,
    )
}
