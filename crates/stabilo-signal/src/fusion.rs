//! Orientation fusion of accelerometer and gyroscope readings.
//!
//! The accelerometer gives an absolute but noisy tilt reference from the
//! gravity vector; the gyroscope gives smooth but drifting angular rates.
//! Both strategies below blend the two:
//!
//! - [`ComplementaryFilter`]: fixed-weight blend, cheap and predictable
//! - [`KalmanOrientationFilter`]: constant-velocity state model with
//!   covariance tracking, reports its own confidence
//!
//! Yaw has no gravity reference and is gyro-integrated in both strategies.

use nalgebra::{Matrix2, Matrix4};
use serde::{Deserialize, Serialize};

use stabilo_core::{
    EngineConfig, Error, FusionStrategy, KalmanConfig, OrientationEstimate, Result, SensorSample,
};

use crate::linalg::{
    invert_2x2, matrix_from_rows, try_invert, InnovationMatrix, MeasurementMatrix,
    MeasurementVector, StateMatrix, StateVector,
};

/// Roll and pitch (degrees) implied by the gravity vector
pub fn accel_angles(sample: &SensorSample) -> (f64, f64) {
    let a = &sample.accel;
    let roll = a.y.atan2(a.z).to_degrees();
    let pitch = (-a.x).atan2((a.y * a.y + a.z * a.z).sqrt()).to_degrees();
    (roll, pitch)
}

/// Complementary filter state (degrees)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ComplementaryState {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Advance a complementary filter by one sample
pub fn complementary_step(
    state: &mut ComplementaryState,
    alpha: f64,
    dt: f64,
    sample: &SensorSample,
) -> OrientationEstimate {
    let (roll_accel, pitch_accel) = accel_angles(sample);

    let roll_gyro = state.roll + sample.gyro.x * dt;
    let pitch_gyro = state.pitch + sample.gyro.y * dt;

    state.roll = alpha * roll_gyro + (1.0 - alpha) * roll_accel;
    state.pitch = alpha * pitch_gyro + (1.0 - alpha) * pitch_accel;
    state.yaw += sample.gyro.z * dt;

    OrientationEstimate {
        roll: state.roll,
        pitch: state.pitch,
        yaw: state.yaw,
        angular_velocity: Some(sample.gyro),
        confidence: None,
        timestamp_ms: sample.timestamp_ms,
    }
}

/// Fixed-weight gyro/accelerometer blend
#[derive(Debug, Clone)]
pub struct ComplementaryFilter {
    state: ComplementaryState,
    alpha: f64,
    dt: f64,
}

impl ComplementaryFilter {
    /// Create a new complementary filter
    ///
    /// # Arguments
    /// * `alpha` - Gyroscope weight (0-1), 0.98 for a 50 Hz stream
    /// * `sample_rate_hz` - Nominal sample rate
    pub fn new(alpha: f64, sample_rate_hz: f64) -> Self {
        Self {
            state: ComplementaryState::default(),
            alpha: alpha.clamp(0.0, 1.0),
            dt: 1.0 / sample_rate_hz,
        }
    }

    pub fn update(&mut self, sample: &SensorSample) -> OrientationEstimate {
        complementary_step(&mut self.state, self.alpha, self.dt, sample)
    }

    pub fn state(&self) -> &ComplementaryState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = ComplementaryState::default();
    }
}

/// Kalman filter state over `[roll, pitch, roll_rate, pitch_rate]`
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanState {
    pub x: StateVector,
    pub p: StateMatrix,
    /// Gyro-integrated heading, outside the filter
    pub yaw: f64,
}

impl KalmanState {
    pub fn new(initial_covariance: f64) -> Self {
        Self {
            x: StateVector::zeros(),
            p: StateMatrix::identity() * initial_covariance,
            yaw: 0.0,
        }
    }

    /// Filter confidence, `1 / (1 + trace(P))`
    pub fn confidence(&self) -> f64 {
        1.0 / (1.0 + self.p.trace())
    }
}

/// Constant-velocity transition and accelerometer measurement model
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanModel {
    pub f: StateMatrix,
    pub h: MeasurementMatrix,
    pub q: StateMatrix,
    pub r: InnovationMatrix,
    pub dt: f64,
    pub initial_covariance: f64,
}

impl KalmanModel {
    /// Build the model from configured noise matrices.
    ///
    /// The measurement is two-dimensional, so R must be 2x2; any other
    /// shape is rejected the same way the innovation inverse would be.
    pub fn from_config(config: &KalmanConfig, sample_rate_hz: f64) -> Result<Self> {
        let q = matrix_from_rows(&config.process_noise)?;
        if q.shape() != (4, 4) {
            return Err(Error::Config(format!(
                "process noise must be 4x4, got {}x{}",
                q.nrows(),
                q.ncols()
            )));
        }

        let r = matrix_from_rows(&config.measurement_noise)?;
        // Shape check shared with the generic inverse
        try_invert(&r)?;

        let dt = 1.0 / sample_rate_hz;
        #[rustfmt::skip]
        let f = Matrix4::new(
            1.0, 0.0, dt,  0.0,
            0.0, 1.0, 0.0, dt,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        #[rustfmt::skip]
        let h = MeasurementMatrix::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
        );

        Ok(Self {
            f,
            h,
            q: StateMatrix::from_fn(|i, j| q[(i, j)]),
            r: Matrix2::from_fn(|i, j| r[(i, j)]),
            dt,
            initial_covariance: config.initial_covariance,
        })
    }
}

/// Advance a Kalman filter by one predict/update cycle
pub fn kalman_step(
    state: &mut KalmanState,
    model: &KalmanModel,
    sample: &SensorSample,
) -> OrientationEstimate {
    // Predict
    state.x = model.f * state.x;
    state.p = model.f * state.p * model.f.transpose() + model.q;

    // Update with accelerometer tilt
    let (roll_accel, pitch_accel) = accel_angles(sample);
    let z = MeasurementVector::new(roll_accel, pitch_accel);
    let innovation = z - model.h * state.x;

    let s = model.h * state.p * model.h.transpose() + model.r;
    let gain = state.p * model.h.transpose() * invert_2x2(&s);

    state.x += gain * innovation;
    state.p = (StateMatrix::identity() - gain * model.h) * state.p;

    state.yaw += sample.gyro.z * model.dt;

    OrientationEstimate {
        roll: state.x[0],
        pitch: state.x[1],
        yaw: state.yaw,
        angular_velocity: Some(stabilo_core::Vector3D::new(
            state.x[2],
            state.x[3],
            sample.gyro.z,
        )),
        confidence: Some(state.confidence()),
        timestamp_ms: sample.timestamp_ms,
    }
}

/// Kalman orientation filter with confidence reporting
#[derive(Debug, Clone)]
pub struct KalmanOrientationFilter {
    state: KalmanState,
    model: KalmanModel,
}

impl KalmanOrientationFilter {
    pub fn new(config: &KalmanConfig, sample_rate_hz: f64) -> Result<Self> {
        let model = KalmanModel::from_config(config, sample_rate_hz)?;
        Ok(Self {
            state: KalmanState::new(model.initial_covariance),
            model,
        })
    }

    pub fn update(&mut self, sample: &SensorSample) -> OrientationEstimate {
        kalman_step(&mut self.state, &self.model, sample)
    }

    pub fn state(&self) -> &KalmanState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = KalmanState::new(self.model.initial_covariance);
    }
}

/// Orientation fusion strategy selected by configuration
#[derive(Debug, Clone)]
pub enum OrientationFusion {
    Complementary(ComplementaryFilter),
    Kalman(KalmanOrientationFilter),
}

impl OrientationFusion {
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let rate = config.sampling.sample_rate_hz;
        match config.fusion.strategy {
            FusionStrategy::Complementary => Ok(Self::Complementary(ComplementaryFilter::new(
                config.fusion.complementary_alpha,
                rate,
            ))),
            FusionStrategy::Kalman => Ok(Self::Kalman(KalmanOrientationFilter::new(
                &config.fusion.kalman,
                rate,
            )?)),
        }
    }

    pub fn update(&mut self, sample: &SensorSample) -> OrientationEstimate {
        match self {
            Self::Complementary(filter) => filter.update(sample),
            Self::Kalman(filter) => filter.update(sample),
        }
    }

    /// Fuse a whole recording from a fresh state
    pub fn fuse_all(&mut self, samples: &[SensorSample]) -> Vec<OrientationEstimate> {
        self.reset();
        samples.iter().map(|s| self.update(s)).collect()
    }

    pub fn strategy(&self) -> FusionStrategy {
        match self {
            Self::Complementary(_) => FusionStrategy::Complementary,
            Self::Kalman(_) => FusionStrategy::Kalman,
        }
    }

    pub fn reset(&mut self) {
        match self {
            Self::Complementary(filter) => filter.reset(),
            Self::Kalman(filter) => filter.reset(),
        }
    }
}
