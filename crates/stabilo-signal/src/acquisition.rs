//! Sensor sample sources.
//!
//! The wearable transport lives outside this crate; everything downstream
//! consumes samples through [`SampleSource`]. Two sources ship with the
//! crate:
//!
//! - [`SimulatedSensor`]: synthetic sway and breathing at a fixed rate
//! - [`ReplaySource`]: an in-memory recording played back in order

use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::mpsc;

use stabilo_core::{Error, Result, SensorSample, Vector3D};

/// Trait for sensor sample backends
#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Start delivering samples
    async fn start(&mut self) -> Result<()>;

    /// Stop delivering samples
    async fn stop(&mut self) -> Result<()>;

    /// Check if the source is delivering
    fn is_running(&self) -> bool;

    /// Nominal sample rate (Hz)
    fn sample_rate_hz(&self) -> f64;

    /// Receive the next sample
    async fn recv(&mut self) -> Result<SensorSample>;

    /// Try to receive a sample without waiting
    fn try_recv(&mut self) -> Option<SensorSample>;
}

/// Parameters of the synthetic wearer
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationProfile {
    pub sample_rate_hz: f64,
    /// Peak medio-lateral tilt (degrees)
    pub sway_amplitude_deg: f64,
    pub sway_frequency_hz: f64,
    pub breathing_rate_bpm: f64,
    /// Stretch sensor excursion (raw units)
    pub breathing_amplitude: f64,
    pub battery_percent: u8,
    /// Stop after this many samples
    pub max_samples: Option<usize>,
    /// Pace delivery at the sample rate instead of as fast as possible
    pub realtime: bool,
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self {
            sample_rate_hz: 50.0,
            sway_amplitude_deg: 1.0,
            sway_frequency_hz: 0.4,
            breathing_rate_bpm: 12.0,
            breathing_amplitude: 150.0,
            battery_percent: 80,
            max_samples: None,
            realtime: true,
        }
    }
}

/// Deterministic synthetic sample `index` of a profile
pub fn simulate_sample(profile: &SimulationProfile, index: usize) -> SensorSample {
    use std::f64::consts::PI;

    let t = index as f64 / profile.sample_rate_hz;
    let w_ml = 2.0 * PI * profile.sway_frequency_hz;
    let w_ap = 0.7 * w_ml;

    let roll = profile.sway_amplitude_deg * (w_ml * t).sin();
    let pitch = 0.6 * profile.sway_amplitude_deg * (w_ap * t + 1.0).sin();
    let roll_rate = profile.sway_amplitude_deg * w_ml * (w_ml * t).cos();
    let pitch_rate = 0.6 * profile.sway_amplitude_deg * w_ap * (w_ap * t + 1.0).cos();

    let (r, p) = (roll.to_radians(), pitch.to_radians());
    let breathing = (2.0 * PI * profile.breathing_rate_bpm / 60.0 * t).sin();

    SensorSample {
        timestamp_ms: (t * 1000.0).round() as i64,
        battery_percent: profile.battery_percent,
        button_bitmask: 0,
        accel: Vector3D::new(-p.sin(), p.cos() * r.sin(), p.cos() * r.cos()),
        gyro: Vector3D::new(roll_rate, pitch_rate, 0.0),
        stretch_value: (2000.0 + profile.breathing_amplitude * breathing).round() as i32,
        temperature_c: 33.5,
    }
}

/// Synthetic wearable driven by a background task
pub struct SimulatedSensor {
    profile: SimulationProfile,
    is_running: bool,
    rx: Option<mpsc::Receiver<SensorSample>>,
}

impl SimulatedSensor {
    pub fn new(profile: SimulationProfile) -> Self {
        Self {
            profile,
            is_running: false,
            rx: None,
        }
    }

    pub fn profile(&self) -> &SimulationProfile {
        &self.profile
    }
}

#[async_trait]
impl SampleSource for SimulatedSensor {
    async fn start(&mut self) -> Result<()> {
        if self.is_running {
            return Ok(());
        }

        let (tx, rx) = mpsc::channel(1000);
        self.rx = Some(rx);
        self.is_running = true;

        let profile = self.profile.clone();
        tokio::spawn(async move {
            let period = tokio::time::Duration::from_secs_f64(1.0 / profile.sample_rate_hz);
            let mut ticker = tokio::time::interval(period);
            let mut index = 0usize;

            loop {
                if profile.max_samples.is_some_and(|max| index >= max) {
                    break;
                }
                if profile.realtime {
                    ticker.tick().await;
                }

                if tx.send(simulate_sample(&profile, index)).await.is_err() {
                    break;
                }
                index += 1;
            }
            tracing::debug!("Simulated sensor finished after {} samples", index);
        });

        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.is_running = false;
        self.rx = None;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.is_running
    }

    fn sample_rate_hz(&self) -> f64 {
        self.profile.sample_rate_hz
    }

    async fn recv(&mut self) -> Result<SensorSample> {
        match &mut self.rx {
            Some(rx) => match rx.recv().await {
                Some(sample) => Ok(sample),
                None => {
                    self.is_running = false;
                    Err(Error::Acquisition("Simulated sensor exhausted".into()))
                }
            },
            None => Err(Error::Acquisition("Sensor not started".into())),
        }
    }

    fn try_recv(&mut self) -> Option<SensorSample> {
        self.rx.as_mut()?.try_recv().ok()
    }
}

/// Plays back a recorded sequence of samples
pub struct ReplaySource {
    samples: VecDeque<SensorSample>,
    sample_rate_hz: f64,
    is_running: bool,
}

impl ReplaySource {
    pub fn new(samples: Vec<SensorSample>, sample_rate_hz: f64) -> Self {
        Self {
            samples: samples.into(),
            sample_rate_hz,
            is_running: false,
        }
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

#[async_trait]
impl SampleSource for ReplaySource {
    async fn start(&mut self) -> Result<()> {
        self.is_running = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.is_running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.is_running
    }

    fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    async fn recv(&mut self) -> Result<SensorSample> {
        if !self.is_running {
            return Err(Error::Acquisition("Replay not started".into()));
        }
        match self.samples.pop_front() {
            Some(sample) => Ok(sample),
            None => {
                self.is_running = false;
                Err(Error::Acquisition("End of recording".into()))
            }
        }
    }

    fn try_recv(&mut self) -> Option<SensorSample> {
        if !self.is_running {
            return None;
        }
        self.samples.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::accel_angles;

    #[test]
    fn test_simulated_sample_geometry() {
        let profile = SimulationProfile::default();
        for index in [0, 7, 33, 120] {
            let sample = simulate_sample(&profile, index);
            assert!(sample.validate().is_ok());
            assert!((sample.accel.magnitude() - 1.0).abs() < 1e-9);

            let t = index as f64 / profile.sample_rate_hz;
            let expected_roll = profile.sway_amplitude_deg
                * (2.0 * std::f64::consts::PI * profile.sway_frequency_hz * t).sin();
            let (roll, _) = accel_angles(&sample);
            assert!((roll - expected_roll).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_simulated_sensor() {
        let profile = SimulationProfile {
            max_samples: Some(25),
            realtime: false,
            ..Default::default()
        };
        let mut sensor = SimulatedSensor::new(profile);

        assert!(sensor.recv().await.is_err(), "not started yet");

        sensor.start().await.unwrap();
        assert!(sensor.is_running());

        let first = sensor.recv().await.unwrap();
        assert_eq!(first.timestamp_ms, 0);
        let second = sensor.recv().await.unwrap();
        assert_eq!(second.timestamp_ms, 20);

        for _ in 2..25 {
            sensor.recv().await.unwrap();
        }
        assert!(sensor.recv().await.is_err());
        assert!(!sensor.is_running());

        sensor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_replay_source() {
        let samples: Vec<SensorSample> = (0..3).map(|i| SensorSample::at_rest(i * 20)).collect();
        let mut source = ReplaySource::new(samples, 50.0);

        assert!(source.try_recv().is_none());
        source.start().await.unwrap();
        assert_eq!(source.recv().await.unwrap().timestamp_ms, 0);
        assert_eq!(source.try_recv().unwrap().timestamp_ms, 20);
        assert_eq!(source.remaining(), 1);
        source.recv().await.unwrap();

        assert!(matches!(source.recv().await, Err(Error::Acquisition(_))));
        assert!(!source.is_running());
    }
}
