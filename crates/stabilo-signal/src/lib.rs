//! # Stabilo-Signal
//!
//! Sensor-level signal processing: orientation fusion of accelerometer and
//! gyroscope readings, smoothing filters, respiratory metrics from the
//! stretch channel, and the sensor source boundary.

pub mod acquisition;
pub mod filtering;
pub mod fusion;
pub mod linalg;
pub mod respiration;
pub mod spectrum;

pub use acquisition::{ReplaySource, SampleSource, SimulatedSensor, SimulationProfile};
pub use filtering::{ExponentialFilter, MovingAverageFilter};
pub use fusion::{ComplementaryFilter, KalmanOrientationFilter, OrientationFusion};
pub use respiration::{RespiratoryMetrics, RespiratorySignalProcessor};
