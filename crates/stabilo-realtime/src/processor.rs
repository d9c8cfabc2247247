//! Sliding-window processor turning raw samples into live insights.
//!
//! Samples are fused into orientations as they arrive and kept in
//! fixed-capacity rings. Once a feature window's worth is buffered, each
//! sample may trigger a feature pass over the whole ring. A pass is
//! begun and finished explicitly so at most one is ever in flight; samples
//! arriving meanwhile are buffered and picked up by the next pass.

use serde::{Deserialize, Serialize};

use stabilo_core::{
    AlertConfig, EngineConfig, ExerciseType, OrientationEstimate, Result, RingBuffer,
    SensorSample,
};
use stabilo_posture::PosturalFeatureExtractor;
use stabilo_signal::{ExponentialFilter, OrientationFusion, RespiratorySignalProcessor};

use crate::insights::{self, RealTimeInsights};

/// Skin temperature smoothing, in samples
const TEMPERATURE_TIME_CONSTANT: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorState {
    Idle,
    FillingBuffer,
    SteadyState,
}

/// Snapshot of the rings taken when a pass begins
#[derive(Debug, Clone)]
pub struct FeatureWindow {
    pub orientations: Vec<OrientationEstimate>,
    pub timestamps_ms: Vec<i64>,
}

impl FeatureWindow {
    pub fn len(&self) -> usize {
        self.orientations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orientations.is_empty()
    }

    pub fn latest_timestamp_ms(&self) -> i64 {
        self.timestamps_ms.last().copied().unwrap_or(0)
    }
}

pub struct RealTimeSlidingProcessor {
    alerts: AlertConfig,
    feature_window: usize,
    state: ProcessorState,
    exercise: Option<ExerciseType>,

    samples: RingBuffer<SensorSample>,
    orientations: RingBuffer<OrientationEstimate>,
    stability_history: RingBuffer<f64>,

    fusion: OrientationFusion,
    respiratory: RespiratorySignalProcessor,
    extractor: PosturalFeatureExtractor,
    temperature: ExponentialFilter,

    in_flight: bool,
    exercise_start_ms: Option<i64>,
    low_battery_reported: bool,
    passes: u64,
}

impl RealTimeSlidingProcessor {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let rate = config.sampling.sample_rate_hz;
        let capacity = config.windows.buffer_samples(rate);

        Ok(Self {
            alerts: config.alerts.clone(),
            feature_window: config.windows.feature_window_samples(rate).min(capacity),
            state: ProcessorState::Idle,
            exercise: None,
            samples: RingBuffer::with_capacity(capacity),
            orientations: RingBuffer::with_capacity(capacity),
            stability_history: RingBuffer::with_capacity(config.windows.feature_history_len.max(1)),
            fusion: OrientationFusion::from_config(config)?,
            respiratory: RespiratorySignalProcessor::from_config(config),
            // Diffusion is left to offline session analysis
            extractor: PosturalFeatureExtractor::from_config(config).with_diffusion(false),
            temperature: ExponentialFilter::from_time_constant(TEMPERATURE_TIME_CONSTANT),
            in_flight: false,
            exercise_start_ms: None,
            low_battery_reported: false,
            passes: 0,
        })
    }

    /// Reset all filters and buffers and begin filling
    pub fn start_exercise(&mut self, exercise: ExerciseType) {
        self.samples.clear();
        self.orientations.clear();
        self.stability_history.clear();
        self.fusion.reset();
        self.respiratory.reset();
        self.temperature.reset();
        self.in_flight = false;
        self.exercise_start_ms = None;
        self.low_battery_reported = false;
        self.passes = 0;

        self.exercise = Some(exercise);
        self.state = ProcessorState::FillingBuffer;
        tracing::info!("Exercise started: {}", exercise.description());
    }

    /// Stop consuming samples; buffered data is kept until the next start
    pub fn stop_exercise(&mut self) {
        if self.state == ProcessorState::Idle {
            return;
        }
        tracing::info!(
            "Exercise stopped after {} feature passes ({:.1} s)",
            self.passes,
            self.elapsed_s()
        );
        self.state = ProcessorState::Idle;
        self.in_flight = false;
    }

    /// Buffer one sample.
    ///
    /// Returns `Ok(false)` when no exercise is running and the sample was
    /// ignored; invalid samples are rejected without touching any state.
    pub fn push_sample(&mut self, sample: &SensorSample) -> Result<bool> {
        if self.state == ProcessorState::Idle {
            tracing::trace!("Ignoring sample at {} ms while idle", sample.timestamp_ms);
            return Ok(false);
        }
        sample.validate()?;

        if sample.battery_percent < self.alerts.low_battery_percent && !self.low_battery_reported {
            tracing::warn!("Sensor battery low: {}%", sample.battery_percent);
            self.low_battery_reported = true;
        }

        self.exercise_start_ms.get_or_insert(sample.timestamp_ms);
        self.samples.push(*sample);
        self.orientations.push(self.fusion.update(sample));
        self.respiratory.push(&[sample.stretch_value]);
        self.temperature.filter(sample.temperature_c);

        if self.state == ProcessorState::FillingBuffer && self.samples.len() >= self.feature_window
        {
            tracing::debug!("Feature window filled with {} samples", self.samples.len());
            self.state = ProcessorState::SteadyState;
        }

        Ok(true)
    }

    /// Claim the next feature pass, if one may start now
    pub fn try_begin_pass(&mut self) -> Option<FeatureWindow> {
        if self.state != ProcessorState::SteadyState || self.in_flight {
            return None;
        }
        self.in_flight = true;

        Some(FeatureWindow {
            orientations: self.orientations.to_vec(),
            timestamps_ms: self.samples.iter().map(|s| s.timestamp_ms).collect(),
        })
    }

    /// Run both extractors over a claimed window and release the pass
    pub fn finish_pass(&mut self, window: FeatureWindow) -> RealTimeInsights {
        let postural_features = self.extractor.extract(&window.orientations);
        let respiratory = self.respiratory.compute();

        let stability_score = if postural_features.has_data() {
            self.stability_history.push(postural_features.stability_index);
            postural_features.stability_index
        } else {
            0.0
        };

        let breathing_quality = insights::breathing_quality(&respiratory);
        let alert = insights::select_alert(&postural_features, &self.alerts);
        if let Some(alert) = &alert {
            tracing::debug!("{:?} alert ({:?}): {}", alert.kind, alert.severity, alert.message);
        }
        let recommendations =
            insights::recommendations(&postural_features, alert.as_ref(), breathing_quality);

        let history = self.stability_history.to_vec();
        let confidence = insights::confidence(&window.timestamps_ms, &history, &respiratory);

        self.passes += 1;
        self.in_flight = false;

        RealTimeInsights {
            timestamp_ms: window.latest_timestamp_ms(),
            exercise_type: self.exercise,
            state: self.state,
            stability_score,
            breathing_quality,
            breathing_rate_bpm: respiratory.breathing_rate_bpm,
            alert,
            recommendations,
            exercise_progress_pct: insights::exercise_progress(
                self.elapsed_s(),
                self.alerts.exercise_duration_secs,
            ),
            confidence,
            skin_temperature_c: self.temperature.value(),
            postural_features,
        }
    }

    /// Buffer a sample and run a pass when one is due
    pub fn process_sample(&mut self, sample: &SensorSample) -> Result<Option<RealTimeInsights>> {
        if !self.push_sample(sample)? {
            return Ok(None);
        }
        Ok(self.try_begin_pass().map(|window| self.finish_pass(window)))
    }

    /// Seconds between the first and the newest sample of the exercise
    pub fn elapsed_s(&self) -> f64 {
        match (self.exercise_start_ms, self.samples.latest()) {
            (Some(start), Some(latest)) => {
                latest.timestamp_ms.saturating_sub(start).max(0) as f64 / 1000.0
            }
            _ => 0.0,
        }
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    pub fn exercise(&self) -> Option<ExerciseType> {
        self.exercise
    }

    pub fn is_pass_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn buffered(&self) -> usize {
        self.samples.len()
    }

    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Most recent stability scores, oldest first
    pub fn stability_history(&self) -> Vec<f64> {
        self.stability_history.to_vec()
    }
}
