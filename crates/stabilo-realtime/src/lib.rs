//! # Stabilo-Realtime
//!
//! Bounded-latency processing of a live sample stream: a sliding window
//! over the most recent five seconds, at most one feature pass at a time,
//! and insights with alerts, progress and a confidence estimate.

pub mod insights;
pub mod processor;
pub mod stream;

pub use insights::{AlertKind, AlertSeverity, PostureAlert, RealTimeInsights};
pub use processor::{FeatureWindow, ProcessorState, RealTimeSlidingProcessor};
pub use stream::RealTimeStream;
