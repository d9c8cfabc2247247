//! Planar covariance and 95 % confidence-ellipse geometry.

use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};

use crate::sway::{centroid, SwayPoint};

/// Chi-square quantile for two degrees of freedom at 95 % coverage
pub const CHI_SQUARE_95_2DOF: f64 = 5.991;

/// Ellipse area from covariance eigenvalues, in squared input units
pub fn ellipse_area(lambda1: f64, lambda2: f64) -> f64 {
    std::f64::consts::PI * (lambda1.max(0.0) * lambda2.max(0.0) * CHI_SQUARE_95_2DOF).sqrt()
}

/// Sample covariance of a 2-D point cloud
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Covariance2 {
    pub xx: f64,
    pub xy: f64,
    pub yy: f64,
}

impl Covariance2 {
    /// Returns `None` for fewer than two points
    pub fn from_points(points: &[SwayPoint]) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }

        let c = centroid(points);
        let denom = (points.len() - 1) as f64;

        let (mut xx, mut xy, mut yy) = (0.0, 0.0, 0.0);
        for p in points {
            let dx = p.x - c.x;
            let dy = p.y - c.y;
            xx += dx * dx;
            xy += dx * dy;
            yy += dy * dy;
        }

        Some(Self {
            xx: xx / denom,
            xy: xy / denom,
            yy: yy / denom,
        })
    }

    pub fn to_matrix(&self) -> Matrix2<f64> {
        Matrix2::new(self.xx, self.xy, self.xy, self.yy)
    }

    /// Eigenvalues in descending order, negative round-off clamped to zero
    pub fn eigenvalues(&self) -> (f64, f64) {
        let values = self.to_matrix().symmetric_eigenvalues();
        let (a, b) = (values[0].max(0.0), values[1].max(0.0));
        if a >= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Orientation of the major axis (radians)
    pub fn principal_rotation(&self) -> f64 {
        (2.0 * self.xy).atan2(self.xx - self.yy) / 2.0
    }

    pub fn ellipse_area(&self) -> f64 {
        let (l1, l2) = self.eigenvalues();
        ellipse_area(l1, l2)
    }
}

/// 95 % confidence ellipse of a sway path recorded in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfidenceEllipse {
    pub center_x: f64,
    pub center_y: f64,
    pub semi_axis_a: f64,
    pub semi_axis_b: f64,
    /// Major-axis rotation (radians)
    pub rotation: f64,
    pub area_cm2: f64,
}

impl ConfidenceEllipse {
    const MM2_PER_CM2: f64 = 100.0;

    /// Full ellipse geometry; fewer than two points yields a degenerate
    /// ellipse at the centroid
    pub fn from_sway_path(path_mm: &[SwayPoint]) -> Self {
        let center = centroid(path_mm);
        let Some(cov) = Covariance2::from_points(path_mm) else {
            return Self {
                center_x: center.x,
                center_y: center.y,
                ..Self::default()
            };
        };

        let (l1, l2) = cov.eigenvalues();

        Self {
            center_x: center.x,
            center_y: center.y,
            semi_axis_a: (CHI_SQUARE_95_2DOF * l1).sqrt(),
            semi_axis_b: (CHI_SQUARE_95_2DOF * l2).sqrt(),
            rotation: cov.principal_rotation(),
            area_cm2: ellipse_area(l1, l2) / Self::MM2_PER_CM2,
        }
    }

    /// Whether a point (mm) falls inside the ellipse
    pub fn contains(&self, point: &SwayPoint) -> bool {
        if self.semi_axis_a <= 0.0 || self.semi_axis_b <= 0.0 {
            return false;
        }
        let (sin, cos) = self.rotation.sin_cos();
        let dx = point.x - self.center_x;
        let dy = point.y - self.center_y;
        let u = dx * cos + dy * sin;
        let v = -dx * sin + dy * cos;
        (u / self.semi_axis_a).powi(2) + (v / self.semi_axis_b).powi(2) <= 1.0
    }

    /// Evenly spaced outline points for plotting
    pub fn boundary(&self, n_points: usize) -> Vec<SwayPoint> {
        let (sin, cos) = self.rotation.sin_cos();
        (0..n_points)
            .map(|i| {
                let t = 2.0 * std::f64::consts::PI * i as f64 / n_points as f64;
                let u = self.semi_axis_a * t.cos();
                let v = self.semi_axis_b * t.sin();
                SwayPoint::new(
                    self.center_x + u * cos - v * sin,
                    self.center_y + u * sin + v * cos,
                )
            })
            .collect()
    }
}
