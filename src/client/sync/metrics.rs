//! # Sync Metrics
//!
//! Cumulative counters across drain passes.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct SyncMetrics {
    pub total_passes: u64,
    pub successful_passes: u64,
    pub partial_passes: u64,
    pub failed_passes: u64,
    /// Drain requests dropped because a pass was already running
    pub skipped_passes: u64,
    pub records_synced: u64,
    pub dispatch_failures: u64,
    pub average_pass_duration: Duration,
    pub last_pass_duration: Option<Duration>,
    last_pass_start: Option<Instant>,
}

/// How a finished pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassResult {
    Success,
    Partial,
    Failed,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass_start(&mut self) {
        self.last_pass_start = Some(Instant::now());
        self.total_passes += 1;
    }

    pub fn record_pass_end(&mut self, result: PassResult, synced: usize, failed: usize) {
        match result {
            PassResult::Success => self.successful_passes += 1,
            PassResult::Partial => self.partial_passes += 1,
            PassResult::Failed => self.failed_passes += 1,
        }
        self.records_synced += synced as u64;
        self.dispatch_failures += failed as u64;

        if let Some(start) = self.last_pass_start.take() {
            let duration = start.elapsed();
            self.last_pass_duration = Some(duration);

            let finished = u128::from(
                self.successful_passes + self.partial_passes + self.failed_passes,
            );
            // Rolling average over finished passes
            let total = self.average_pass_duration.as_nanos() * (finished - 1) + duration.as_nanos();
            let average = u64::try_from(total / finished).unwrap_or(u64::MAX);
            self.average_pass_duration = Duration::from_nanos(average);
        }
    }

    pub fn record_skip(&mut self) {
        self.skipped_passes += 1;
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_passes == 0 {
            0.0
        } else {
            self.successful_passes as f64 / self.total_passes as f64
        }
    }
}
