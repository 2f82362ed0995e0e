// Session worker - background thread turning queued audio into feature vectors
//
// Loop: pop a block from the data queue → append to the accumulator → return
// the block to the pool → while a full analysis window is available, analyze
// it, broadcast the result and advance by the hop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rtrb::PopError;
use tokio::sync::broadcast;

use super::AnalysisResult;
use crate::analysis::CryAnalyzer;
use crate::audio::buffer_pool::WorkerChannels;
use crate::config::SessionConfig;
use crate::debug::pipeline_tracer;
use crate::error::log_analysis_error;

struct SessionWorker {
    // Channels & Config
    channels: WorkerChannels,
    analyzer: Arc<CryAnalyzer>,
    result_sender: broadcast::Sender<AnalysisResult>,
    running: Arc<AtomicBool>,
    window_samples: usize,
    hop_samples: usize,
    log_every_n_windows: u64,

    // State
    accumulator: Vec<f32>,
    /// Absolute sample index of accumulator[0]
    window_start_sample: u64,
    window_index: u64,
    total_elapsed_us: u64,
}

impl SessionWorker {
    fn new(
        channels: WorkerChannels,
        analyzer: Arc<CryAnalyzer>,
        result_sender: broadcast::Sender<AnalysisResult>,
        running: Arc<AtomicBool>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            channels,
            analyzer,
            result_sender,
            running,
            window_samples: config.analysis_window_samples,
            hop_samples: config.analysis_hop_samples,
            log_every_n_windows: config.log_every_n_windows,
            accumulator: Vec::with_capacity(config.analysis_window_samples * 2),
            window_start_sample: 0,
            window_index: 0,
            total_elapsed_us: 0,
        }
    }

    fn run(mut self) {
        tracing::info!(
            "[SessionWorker] Starting analysis loop (window={} hop={} sample_rate={})",
            self.window_samples,
            self.hop_samples,
            self.analyzer.sample_rate()
        );

        loop {
            let buffer = match self.channels.data_consumer.pop() {
                Ok(buffer) => buffer,
                Err(PopError::Empty) => {
                    // Check the running flag only once the queue is drained
                    if !self.running.load(Ordering::SeqCst) {
                        tracing::info!("[SessionWorker] Stopped and queue empty, exiting");
                        break;
                    }
                    thread::sleep(Duration::from_millis(1));
                    continue;
                }
            };

            self.accumulator.extend_from_slice(&buffer);
            pipeline_tracer::trace_buffer_received(buffer.len(), self.accumulator.len());

            // Return buffer to pool immediately
            if self.channels.pool_producer.push(buffer).is_err() {
                tracing::warn!("[SessionWorker] Pool queue full, dropping buffer");
            }

            while self.accumulator.len() >= self.window_samples {
                self.analyze_window();
                self.accumulator.drain(..self.hop_samples);
                self.window_start_sample += self.hop_samples as u64;
            }
        }

        tracing::info!(
            "[SessionWorker] Analyzed {} windows, {} samples left unanalyzed",
            self.window_index,
            self.accumulator.len()
        );
    }

    fn analyze_window(&mut self) {
        let started = Instant::now();
        let result = self.analyzer.analyze(&self.accumulator[..self.window_samples]);
        let elapsed_us = started.elapsed().as_micros() as u64;

        let features = match result {
            Ok(features) => features,
            Err(err) => {
                log_analysis_error(&err, "session window");
                return;
            }
        };

        let timestamp_ms = self.window_start_sample * 1000 / self.analyzer.sample_rate() as u64;
        let result = AnalysisResult {
            features,
            window_index: self.window_index,
            timestamp_ms,
            elapsed_us,
        };

        // Send fails only when nobody is subscribed
        let receivers = self.result_sender.send(result).unwrap_or(0);
        pipeline_tracer::trace_result_sent(self.window_index, receivers);

        self.window_index += 1;
        self.total_elapsed_us += elapsed_us;

        if self.log_every_n_windows > 0 && self.window_index % self.log_every_n_windows == 0 {
            tracing::info!(
                "[SessionWorker] {} windows analyzed, mean analysis time {}us",
                self.window_index,
                self.total_elapsed_us / self.window_index
            );
        }
    }
}

/// Spawn the worker thread for a monitoring session
///
/// # Arguments
/// * `channels` - Worker half of the buffer pool
/// * `analyzer` - Analyzer shared with the session handle
/// * `result_sender` - Broadcast channel for AnalysisResults
/// * `running` - Cleared by the session to stop the worker
/// * `config` - Window, hop and logging parameters (assumed validated)
pub fn spawn_session_worker(
    channels: WorkerChannels,
    analyzer: Arc<CryAnalyzer>,
    result_sender: broadcast::Sender<AnalysisResult>,
    running: Arc<AtomicBool>,
    config: &SessionConfig,
) -> JoinHandle<()> {
    let worker = SessionWorker::new(channels, analyzer, result_sender, running, config);
    thread::spawn(move || worker.run())
}
