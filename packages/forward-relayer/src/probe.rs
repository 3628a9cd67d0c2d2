//! Read-only precondition checks against the ledger, run before any funds
//! are committed.

use crate::authorization::Authorization;
use crate::contracts::{IForwardHub, IForwardTarget};
use crate::rpc::ChainRpc;
use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolCall;
use std::sync::Arc;
use tracing::debug;

/// What the ledger says about an authorization slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    Clear,
    /// The target reports the sender already completed the one-shot action.
    AlreadyCompleted,
    /// The hub already consumed this `(from, space, nonce)`.
    NonceUsed,
}

pub struct StatusProbe {
    rpc: Arc<dyn ChainRpc>,
    hub: Address,
    target: Address,
}

impl StatusProbe {
    pub fn new(rpc: Arc<dyn ChainRpc>, hub: Address, target: Address) -> Self {
        Self { rpc, hub, target }
    }

    pub async fn check(&self, forward: &Authorization) -> Result<Precondition, crate::Error> {
        if self.has_completed(forward.from).await? {
            return Ok(Precondition::AlreadyCompleted);
        }
        if self.is_nonce_used(forward).await? {
            return Ok(Precondition::NonceUsed);
        }
        Ok(Precondition::Clear)
    }

    /// `minted(from)` on the target contract.
    pub async fn has_completed(&self, account: Address) -> Result<bool, crate::Error> {
        let input = IForwardTarget::mintedCall { account }.abi_encode();
        let out = self.rpc.call(self.target, Bytes::from(input)).await?;
        let minted = IForwardTarget::mintedCall::abi_decode_returns(&out)
            .map_err(|e| crate::Error::Rpc(format!("minted() returned undecodable data: {e}")))?;
        debug!(%account, minted, "Completion status");
        Ok(minted)
    }

    /// `isNonceUsed(from, space, nonce)` on the hub.
    pub async fn is_nonce_used(&self, forward: &Authorization) -> Result<bool, crate::Error> {
        let input = IForwardHub::isNonceUsedCall {
            user: forward.from,
            space: forward.space,
            nonce: forward.nonce,
        }
        .abi_encode();
        let out = self.rpc.call(self.hub, Bytes::from(input)).await?;
        IForwardHub::isNonceUsedCall::abi_decode_returns(&out)
            .map_err(|e| crate::Error::Rpc(format!("isNonceUsed() returned undecodable data: {e}")))
    }
}
