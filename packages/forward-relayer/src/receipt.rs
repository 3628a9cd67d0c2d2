//! Confirmation polling as a bounded state machine:
//! `Submitted → Confirmed | Reverted | TimedOut`.

use crate::classify::ExecutionFailure;
use crate::rpc::{ChainRpc, ReceiptSummary};
use alloy::primitives::TxHash;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where a submitted transaction stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Submitted(TxHash),
    Confirmed(ReceiptSummary),
    Reverted(ReceiptSummary),
    TimedOut(TxHash),
}

impl Confirmation {
    /// Apply one receipt poll. Terminal states never move.
    pub fn on_poll(self, polled: Option<ReceiptSummary>) -> Self {
        match (self, polled) {
            (Confirmation::Submitted(_), Some(r)) if r.success => Confirmation::Confirmed(r),
            (Confirmation::Submitted(_), Some(r)) => Confirmation::Reverted(r),
            (state, _) => state,
        }
    }

    pub fn on_deadline(self) -> Self {
        match self {
            Confirmation::Submitted(h) => Confirmation::TimedOut(h),
            state => state,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Confirmation::Submitted(_))
    }

    pub fn into_result(self) -> Result<ReceiptSummary, ExecutionFailure> {
        match self {
            Confirmation::Confirmed(r) => Ok(r),
            Confirmation::Reverted(r) => Err(ExecutionFailure::Reverted(r.tx_hash)),
            Confirmation::Submitted(h) | Confirmation::TimedOut(h) => {
                Err(ExecutionFailure::Timeout(h))
            }
        }
    }
}

pub struct ReceiptWaiter {
    rpc: Arc<dyn ChainRpc>,
    poll_interval: Duration,
    timeout: Duration,
}

impl ReceiptWaiter {
    pub fn new(rpc: Arc<dyn ChainRpc>, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            rpc,
            poll_interval,
            timeout,
        }
    }

    /// Poll until the receipt is final or the timeout lapses. RPC errors
    /// while polling are logged and the next tick polls again.
    pub async fn wait(&self, tx_hash: TxHash) -> Result<ReceiptSummary, ExecutionFailure> {
        let poll = async {
            let mut state = Confirmation::Submitted(tx_hash);
            while !state.is_terminal() {
                tokio::time::sleep(self.poll_interval).await;
                match self.rpc.receipt(tx_hash).await {
                    Ok(polled) => state = state.on_poll(polled),
                    Err(e) => warn!(%tx_hash, error = %e, "Receipt poll failed"),
                }
                debug!(%tx_hash, ?state, "Receipt polled");
            }
            state
        };

        let state = match tokio::time::timeout(self.timeout, poll).await {
            Ok(state) => state,
            Err(_) => Confirmation::Submitted(tx_hash).on_deadline(),
        };

        match state {
            Confirmation::Confirmed(r) => {
                info!(%tx_hash, block = r.block_number, gas_used = r.gas_used, "Transaction confirmed")
            }
            Confirmation::Reverted(r) => warn!(%tx_hash, block = r.block_number, "Transaction reverted"),
            _ => warn!(%tx_hash, timeout_secs = self.timeout.as_secs(), "Gave up waiting for receipt"),
        }
        state.into_result()
    }
}
