//! Periodic purge of expired rate windows and idempotency records.

use crate::idempotency::IdempotencyStore;
use crate::metrics::METRICS;
use crate::rate_limit::RateLimitStore;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Entries removed by one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub rate_windows: usize,
    pub idempotency_records: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.rate_windows + self.idempotency_records
    }
}

pub struct CleanupSweeper {
    rate_limiter: Arc<dyn RateLimitStore>,
    idempotency: Arc<dyn IdempotencyStore>,
    interval: Duration,
}

impl CleanupSweeper {
    pub fn new(
        rate_limiter: Arc<dyn RateLimitStore>,
        idempotency: Arc<dyn IdempotencyStore>,
        interval: Duration,
    ) -> Self {
        Self {
            rate_limiter,
            idempotency,
            interval,
        }
    }

    pub fn sweep_once(&self) -> SweepReport {
        let report = SweepReport {
            rate_windows: self.rate_limiter.purge_expired(),
            idempotency_records: self.idempotency.purge_expired(),
        };
        METRICS
            .swept_records
            .fetch_add(report.total() as u64, Ordering::Relaxed);
        report
    }

    /// Sweep every `interval` until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = cancel.cancelled() => {
                    info!("Cleanup sweeper shutting down");
                    return;
                }
            }

            let report = self.sweep_once();
            debug!(
                rate_windows = report.rate_windows,
                idempotency_records = report.idempotency_records,
                remaining = self.idempotency.len(),
                "Cleanup sweep"
            );
        }
    }
}
