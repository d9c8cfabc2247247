//! Fundamental types for the stabilo engine.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Unique identifier for a recorded test session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for the person performing the exercises (pseudonymous)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

/// Three-axis sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_nalgebra(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

impl From<Vector3<f64>> for Vector3D {
    fn from(v: Vector3<f64>) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

/// One packet from the wearable: IMU, stretch sensor and housekeeping.
///
/// Accelerometer units are arbitrary (only ratios are used), gyroscope
/// readings are in degrees per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorSample {
    pub timestamp_ms: i64,
    pub battery_percent: u8,
    pub button_bitmask: u8,
    pub accel: Vector3D,
    pub gyro: Vector3D,
    pub stretch_value: i32,
    pub temperature_c: f64,
}

impl SensorSample {
    pub const MAX_BUTTON_MASK: u8 = 0b11;

    /// Convenience constructor for an upright, motionless device
    pub fn at_rest(timestamp_ms: i64) -> Self {
        Self {
            timestamp_ms,
            battery_percent: 100,
            button_bitmask: 0,
            accel: Vector3D::new(0.0, 0.0, 1.0),
            gyro: Vector3D::zero(),
            stretch_value: 0,
            temperature_c: 33.0,
        }
    }

    /// Check housekeeping ranges and reject non-finite readings
    pub fn validate(&self) -> Result<()> {
        if self.battery_percent > 100 {
            return Err(Error::InvalidInput(format!(
                "battery percentage out of range: {}",
                self.battery_percent
            )));
        }
        if self.button_bitmask > Self::MAX_BUTTON_MASK {
            return Err(Error::InvalidInput(format!(
                "button bitmask out of range: {:#04b}",
                self.button_bitmask
            )));
        }
        if !self.accel.is_finite() || !self.gyro.is_finite() || !self.temperature_c.is_finite() {
            return Err(Error::InvalidInput("non-finite sensor reading".into()));
        }
        Ok(())
    }
}

/// Fused device orientation in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OrientationEstimate {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub angular_velocity: Option<Vector3D>,
    /// Filter confidence (0-1), when the strategy provides one
    pub confidence: Option<f64>,
    pub timestamp_ms: i64,
}

impl OrientationEstimate {
    pub fn new(roll: f64, pitch: f64, yaw: f64, timestamp_ms: i64) -> Self {
        Self {
            roll,
            pitch,
            yaw,
            angular_velocity: None,
            confidence: None,
            timestamp_ms,
        }
    }
}

/// Balance or breathing exercise performed during a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExerciseType {
    QuietStanding,
    EyesClosed,
    FoamStanding,
    TandemStance,
    SingleLegStance,
    WeightShift,
    PacedBreathing,
}

impl ExerciseType {
    pub fn description(&self) -> &'static str {
        match self {
            ExerciseType::QuietStanding => "Quiet standing, eyes open",
            ExerciseType::EyesClosed => "Quiet standing, eyes closed",
            ExerciseType::FoamStanding => "Standing on a compliant surface",
            ExerciseType::TandemStance => "Heel-to-toe tandem stance",
            ExerciseType::SingleLegStance => "Single-leg stance",
            ExerciseType::WeightShift => "Controlled weight shifting",
            ExerciseType::PacedBreathing => "Paced diaphragmatic breathing",
        }
    }
}

/// Position of a session in the test/retest protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestType {
    Pre,
    Post,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_validation() {
        let sample = SensorSample::at_rest(0);
        assert!(sample.validate().is_ok());

        let bad_battery = SensorSample {
            battery_percent: 120,
            ..sample
        };
        assert!(matches!(bad_battery.validate(), Err(Error::InvalidInput(_))));

        let bad_button = SensorSample {
            button_bitmask: 4,
            ..sample
        };
        assert!(bad_button.validate().is_err());

        let nan_gyro = SensorSample {
            gyro: Vector3D::new(f64::NAN, 0.0, 0.0),
            ..sample
        };
        assert!(nan_gyro.validate().is_err());
    }

    #[test]
    fn test_session_ids_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn test_vector_magnitude() {
        let v = Vector3D::new(3.0, 4.0, 0.0);
        assert!((v.magnitude() - 5.0).abs() < 1e-12);
        assert_eq!(Vector3D::from(v.to_nalgebra()), v);
    }
}
