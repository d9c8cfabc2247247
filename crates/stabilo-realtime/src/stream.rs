//! Async driver feeding a sample source through the sliding processor.

use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use stabilo_core::{EngineConfig, ExerciseType, Result};
use stabilo_signal::SampleSource;

use crate::insights::RealTimeInsights;
use crate::processor::RealTimeSlidingProcessor;

const DEFAULT_OUTPUT_QUEUE: usize = 256;

pub struct RealTimeStream {
    config: EngineConfig,
    output_queue_size: usize,
    is_running: Arc<RwLock<bool>>,
}

impl RealTimeStream {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            output_queue_size: DEFAULT_OUTPUT_QUEUE,
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    pub fn with_output_queue(mut self, size: usize) -> Self {
        self.output_queue_size = size.max(1);
        self
    }

    /// Start an exercise on `source` and stream insights as passes complete
    pub async fn start_streaming<S: SampleSource + 'static>(
        &mut self,
        mut source: S,
        exercise: ExerciseType,
    ) -> Result<mpsc::Receiver<RealTimeInsights>> {
        let mut processor = RealTimeSlidingProcessor::new(&self.config)?;
        let (tx, rx) = mpsc::channel(self.output_queue_size);

        source.start().await?;
        processor.start_exercise(exercise);

        *self.is_running.write().await = true;
        let is_running = self.is_running.clone();

        tokio::spawn(async move {
            loop {
                if !*is_running.read().await {
                    break;
                }

                match source.recv().await {
                    Ok(sample) => match processor.process_sample(&sample) {
                        Ok(Some(insights)) => {
                            if tx.send(insights).await.is_err() {
                                break; // Receiver dropped
                            }
                        }
                        Ok(None) => continue,
                        Err(e) => {
                            tracing::warn!("Dropping sample at {} ms: {}", sample.timestamp_ms, e);
                        }
                    },
                    Err(e) => {
                        if source.is_running() {
                            tracing::error!("Acquisition error: {}", e);
                        } else {
                            tracing::info!("Sample source finished: {}", e);
                        }
                        break;
                    }
                }
            }

            processor.stop_exercise();
            *is_running.write().await = false;
            if let Err(e) = source.stop().await {
                tracing::warn!("Failed to stop sample source: {}", e);
            }
        });

        Ok(rx)
    }

    pub async fn stop(&mut self) {
        *self.is_running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
