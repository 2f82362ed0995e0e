// Monitoring session - continuous analysis of a live audio feed
//
// The caller pushes captured samples; a worker thread cuts them into
// overlapping analysis windows and broadcasts one AnalysisResult per window.
//
// Architecture:
// - BufferPool: pre-allocated blocks circulating through two rtrb queues
// - SessionWorker: accumulates blocks and runs the shared CryAnalyzer
// - Output: tokio broadcast channel, also exposed as a futures Stream

mod worker;

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::analysis::{CryAnalyzer, FeatureVector, SharedNoiseProfile};
use crate::audio::buffer_pool::{BufferPool, CaptureChannels};
use crate::config::{AppConfig, SessionConfig};
use crate::error::AnalysisError;

pub use worker::spawn_session_worker;

/// Feature vector of one analysis window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub features: FeatureVector,
    /// Sequence number of the window within the session
    pub window_index: u64,
    /// Start of the window in milliseconds since the session started
    pub timestamp_ms: u64,
    /// Wall-clock time spent analyzing the window
    pub elapsed_us: u64,
}

/// Stream of results for async consumers; lagged results are skipped
pub type ResultStream = Pin<Box<dyn Stream<Item = AnalysisResult> + Send>>;

/// A running monitoring session
///
/// Dropping the session stops the worker.
pub struct MonitoringSession {
    config: SessionConfig,
    capture: CaptureChannels,
    analyzer: Arc<CryAnalyzer>,
    result_sender: broadcast::Sender<AnalysisResult>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl MonitoringSession {
    /// Start a session with a fresh noise profile
    ///
    /// # Errors
    /// `InvalidConfiguration` / `InvalidFrameLength` if the configuration is
    /// unusable at this sample rate
    pub fn start(sample_rate: u32, config: AppConfig) -> Result<Self, AnalysisError> {
        Self::start_with_profile(sample_rate, config, SharedNoiseProfile::new())
    }

    /// Start a session that continues from an existing noise profile
    pub fn start_with_profile(
        sample_rate: u32,
        config: AppConfig,
        profile: SharedNoiseProfile,
    ) -> Result<Self, AnalysisError> {
        config.session.validate()?;
        let analyzer = Arc::new(CryAnalyzer::with_profile(
            sample_rate,
            config.pipeline,
            profile,
        )?);
        let session = config.session;

        let (capture, worker_channels) =
            BufferPool::new(session.buffer_pool_size, session.buffer_size).split_for_threads();
        let (result_sender, _) = broadcast::channel(session.result_channel_capacity);
        let running = Arc::new(AtomicBool::new(true));

        let worker = spawn_session_worker(
            worker_channels,
            Arc::clone(&analyzer),
            result_sender.clone(),
            Arc::clone(&running),
            &session,
        );

        tracing::info!(
            "[MonitoringSession] Started at {} Hz ({} x {} sample buffers)",
            sample_rate,
            session.buffer_pool_size,
            session.buffer_size
        );

        Ok(Self {
            config: session,
            capture,
            analyzer,
            result_sender,
            running,
            worker: Some(worker),
        })
    }

    pub fn analyzer(&self) -> &Arc<CryAnalyzer> {
        &self.analyzer
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Queue captured samples for analysis
    ///
    /// # Returns
    /// Number of samples accepted; fewer than `samples.len()` when the pool
    /// has no free blocks (the worker is falling behind) or the session stopped
    pub fn push_samples(&mut self, samples: &[f32]) -> usize {
        if !self.is_running() {
            return 0;
        }
        let queued = self.capture.push_samples(samples, self.config.buffer_size);
        if queued < samples.len() {
            tracing::warn!(
                "[MonitoringSession] Buffer pool exhausted, dropped {} samples",
                samples.len() - queued
            );
        }
        queued
    }

    /// Receive results broadcast after this call
    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisResult> {
        self.result_sender.subscribe()
    }

    /// Results broadcast after this call as a Stream
    ///
    /// The stream ends once the session is stopped and dropped.
    pub fn result_stream(&self) -> ResultStream {
        let stream = BroadcastStream::new(self.subscribe()).filter_map(|result| async move {
            match result {
                Ok(result) => Some(result),
                Err(err) => {
                    tracing::warn!("[MonitoringSession] Result stream lagged: {}", err);
                    None
                }
            }
        });
        Box::pin(stream)
    }

    /// Stop the worker after it drains queued audio, and wait for it
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::error!("[MonitoringSession] Worker thread panicked");
            }
            tracing::info!("[MonitoringSession] Stopped");
        }
    }
}

impl Drop for MonitoringSession {
    fn drop(&mut self) {
        self.stop();
    }
}
