//! Fee-ceiling gate.

use crate::rpc::ChainRpc;
use tracing::warn;

/// Result of comparing the network fee against the ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeDecision {
    /// At or below the ceiling; the fetched price is reused for submission.
    Within(u128),
    /// The fee could not be fetched. The executor fetches again.
    Unknown,
    TooHigh(u128),
}

#[derive(Debug, Clone, Copy)]
pub struct FeePolicyGuard {
    ceiling_wei: u128,
}

impl FeePolicyGuard {
    pub fn new(ceiling_wei: u128) -> Self {
        Self { ceiling_wei }
    }

    pub fn ceiling_wei(&self) -> u128 {
        self.ceiling_wei
    }

    pub fn evaluate(&self, gas_price: u128) -> FeeDecision {
        if gas_price > self.ceiling_wei {
            FeeDecision::TooHigh(gas_price)
        } else {
            FeeDecision::Within(gas_price)
        }
    }

    pub async fn check(&self, rpc: &dyn ChainRpc) -> FeeDecision {
        match rpc.gas_price().await {
            Ok(price) => self.evaluate(price),
            Err(e) => {
                warn!(error = %e, "Gas price fetch failed, deferring to executor");
                FeeDecision::Unknown
            }
        }
    }
}

impl FeeDecision {
    /// Price to hand to the executor, if one was fetched.
    pub fn price(self) -> Option<u128> {
        match self {
            FeeDecision::Within(p) => Some(p),
            FeeDecision::Unknown | FeeDecision::TooHigh(_) => None,
        }
    }
}
