//! Prometheus metrics (lock-free atomics, zero allocation on hot path).

use crate::classify::{ErrorKind, RelayOutcome};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    // --- Traffic ---
    pub relay_total: AtomicU64,
    pub relay_confirmed: AtomicU64,
    pub relay_rejected: AtomicU64,
    pub relay_failed: AtomicU64,

    // --- Gates ---
    pub rate_limited: AtomicU64,
    pub duplicates: AtomicU64,
    pub fee_too_high: AtomicU64,

    // --- Execution ---
    pub submitted: AtomicU64,
    pub reverted: AtomicU64,
    pub confirmation_timeouts: AtomicU64,

    // --- Latency (μs, updated via CAS) ---
    pub relay_duration_us_sum: AtomicU64,
    pub relay_duration_us_max: AtomicU64,

    // --- RPC ---
    pub rpc_failovers: AtomicU64,
    pub rpc_errors: AtomicU64,

    // --- Sweeper ---
    pub swept_records: AtomicU64,
}

impl Metrics {
    const fn new() -> Self {
        Self {
            relay_total: AtomicU64::new(0),
            relay_confirmed: AtomicU64::new(0),
            relay_rejected: AtomicU64::new(0),
            relay_failed: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            fee_too_high: AtomicU64::new(0),
            submitted: AtomicU64::new(0),
            reverted: AtomicU64::new(0),
            confirmation_timeouts: AtomicU64::new(0),
            relay_duration_us_sum: AtomicU64::new(0),
            relay_duration_us_max: AtomicU64::new(0),
            rpc_failovers: AtomicU64::new(0),
            rpc_errors: AtomicU64::new(0),
            swept_records: AtomicU64::new(0),
        }
    }

    /// Count a finished relay attempt by outcome and kind.
    pub fn record_outcome(&self, outcome: &RelayOutcome, start: Instant) {
        match outcome {
            RelayOutcome::Confirmed { .. } => {
                self.relay_confirmed.fetch_add(1, Ordering::Relaxed);
            }
            RelayOutcome::Rejected { .. } => {
                self.relay_rejected.fetch_add(1, Ordering::Relaxed);
            }
            RelayOutcome::Failed { .. } => {
                self.relay_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        let counter = match outcome.kind() {
            Some(ErrorKind::RateLimited) => Some(&self.rate_limited),
            Some(ErrorKind::DuplicateRequest) => Some(&self.duplicates),
            Some(ErrorKind::FeeTooHigh) => Some(&self.fee_too_high),
            Some(ErrorKind::Reverted) => Some(&self.reverted),
            Some(ErrorKind::ConfirmationTimeout) => Some(&self.confirmation_timeouts),
            _ => None,
        };
        if let Some(c) = counter {
            c.fetch_add(1, Ordering::Relaxed);
        }
        self.record_relay_duration(start);
    }

    pub fn record_relay_duration(&self, start: Instant) {
        let us = start.elapsed().as_micros() as u64;
        self.relay_duration_us_sum.fetch_add(us, Ordering::Relaxed);
        // CAS loop for max tracking
        let mut cur = self.relay_duration_us_max.load(Ordering::Relaxed);
        while us > cur {
            match self.relay_duration_us_max.compare_exchange_weak(
                cur,
                us,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self, idempotency_records: usize, rate_limited_senders: usize) -> String {
        let relay_total = self.relay_total.load(Ordering::Relaxed);
        let confirmed = self.relay_confirmed.load(Ordering::Relaxed);
        let rejected = self.relay_rejected.load(Ordering::Relaxed);
        let failed = self.relay_failed.load(Ordering::Relaxed);
        let rate_limited = self.rate_limited.load(Ordering::Relaxed);
        let duplicates = self.duplicates.load(Ordering::Relaxed);
        let fee_too_high = self.fee_too_high.load(Ordering::Relaxed);
        let submitted = self.submitted.load(Ordering::Relaxed);
        let reverted = self.reverted.load(Ordering::Relaxed);
        let timeouts = self.confirmation_timeouts.load(Ordering::Relaxed);
        let dur_sum = self.relay_duration_us_sum.load(Ordering::Relaxed);
        let dur_max = self.relay_duration_us_max.swap(0, Ordering::Relaxed);
        let rpc_failovers = self.rpc_failovers.load(Ordering::Relaxed);
        let rpc_errors = self.rpc_errors.load(Ordering::Relaxed);
        let swept = self.swept_records.load(Ordering::Relaxed);

        // Convert μs to seconds for Prometheus conventions
        let dur_sum_s = dur_sum as f64 / 1_000_000.0;
        let dur_max_s = dur_max as f64 / 1_000_000.0;

        format!(
            "\
# HELP relayer_relay_total Total relay requests received.\n\
# TYPE relayer_relay_total counter\n\
relayer_relay_total {relay_total}\n\
# HELP relayer_relay_confirmed_total Relays confirmed on-chain.\n\
# TYPE relayer_relay_confirmed_total counter\n\
relayer_relay_confirmed_total {confirmed}\n\
# HELP relayer_relay_rejected_total Relays refused before submission.\n\
# TYPE relayer_relay_rejected_total counter\n\
relayer_relay_rejected_total {rejected}\n\
# HELP relayer_relay_failed_total Relays that failed after admission.\n\
# TYPE relayer_relay_failed_total counter\n\
relayer_relay_failed_total {failed}\n\
# HELP relayer_rate_limited_total Requests refused by the per-sender rate limit.\n\
# TYPE relayer_rate_limited_total counter\n\
relayer_rate_limited_total {rate_limited}\n\
# HELP relayer_duplicates_total Requests refused as duplicates.\n\
# TYPE relayer_duplicates_total counter\n\
relayer_duplicates_total {duplicates}\n\
# HELP relayer_fee_too_high_total Requests refused by the fee ceiling.\n\
# TYPE relayer_fee_too_high_total counter\n\
relayer_fee_too_high_total {fee_too_high}\n\
# HELP relayer_submitted_total Transactions broadcast with relayer funds.\n\
# TYPE relayer_submitted_total counter\n\
relayer_submitted_total {submitted}\n\
# HELP relayer_reverted_total Submitted transactions that reverted.\n\
# TYPE relayer_reverted_total counter\n\
relayer_reverted_total {reverted}\n\
# HELP relayer_confirmation_timeouts_total Receipt waits that timed out.\n\
# TYPE relayer_confirmation_timeouts_total counter\n\
relayer_confirmation_timeouts_total {timeouts}\n\
# HELP relayer_relay_duration_seconds_sum Total pipeline time (seconds).\n\
# TYPE relayer_relay_duration_seconds_sum counter\n\
relayer_relay_duration_seconds_sum {dur_sum_s:.6}\n\
# HELP relayer_relay_duration_seconds_max Max pipeline time since last scrape (seconds).\n\
# TYPE relayer_relay_duration_seconds_max gauge\n\
relayer_relay_duration_seconds_max {dur_max_s:.6}\n\
# HELP relayer_rpc_failovers_total RPC primary-to-fallback failovers.\n\
# TYPE relayer_rpc_failovers_total counter\n\
relayer_rpc_failovers_total {rpc_failovers}\n\
# HELP relayer_rpc_errors_total RPC errors.\n\
# TYPE relayer_rpc_errors_total counter\n\
relayer_rpc_errors_total {rpc_errors}\n\
# HELP relayer_swept_records_total Cache entries removed by the cleanup sweeper.\n\
# TYPE relayer_swept_records_total counter\n\
relayer_swept_records_total {swept}\n\
# HELP relayer_idempotency_records Live duplicate-guard records.\n\
# TYPE relayer_idempotency_records gauge\n\
relayer_idempotency_records {idempotency_records}\n\
# HELP relayer_rate_limit_senders Senders with an open rate window.\n\
# TYPE relayer_rate_limit_senders gauge\n\
relayer_rate_limit_senders {rate_limited_senders}\n"
        )
    }
}
