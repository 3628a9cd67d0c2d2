//! The relay pipeline: admission gates, execution and confirmation.
//!
//! Gate order:
//! 1. per-sender rate limit
//! 2. idempotency mark on `(from, space, nonce)`
//! 3. target, caller, content hash and deadline checks (local)
//! 4. ledger preconditions (`minted`, `isNonceUsed`)
//! 5. fee ceiling
//!
//! Every gate short-circuits into a [`RelayOutcome::Rejected`]. Past the
//! gates the request is admitted and funds are spent.

use crate::authorization::RelayRequest;
use crate::classify::{ErrorKind, RelayOutcome};
use crate::clock::Clock;
use crate::config::Config;
use crate::executor::{Executor, GasPolicy};
use crate::fee::{FeeDecision, FeePolicyGuard};
use crate::idempotency::{IdempotencyStore, MemoryIdempotencyStore};
use crate::probe::{Precondition, StatusProbe};
use crate::rate_limit::{MemoryRateLimiter, RateLimitStore};
use crate::receipt::ReceiptWaiter;
use crate::rpc::ChainRpc;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::sync::Arc;
use tracing::{info, warn};

const GWEI: u128 = 1_000_000_000;

pub struct RelayPipeline {
    rpc: Arc<dyn ChainRpc>,
    clock: Arc<dyn Clock>,
    rate_limiter: Arc<dyn RateLimitStore>,
    idempotency: Arc<dyn IdempotencyStore>,
    probe: StatusProbe,
    fee: FeePolicyGuard,
    executor: Executor,
    waiter: ReceiptWaiter,
    target: Address,
}

impl RelayPipeline {
    /// Pipeline backed by the in-memory stores.
    pub fn from_config(
        config: &Config,
        rpc: Arc<dyn ChainRpc>,
        signer: PrivateKeySigner,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rate_limiter = Arc::new(MemoryRateLimiter::new(
            config.rate_limit_max,
            config.rate_limit_window(),
            clock.clone(),
        ));
        let idempotency = Arc::new(MemoryIdempotencyStore::new(
            config.idempotency_ttl(),
            clock.clone(),
        ));
        Self::with_stores(config, rpc, signer, clock, rate_limiter, idempotency)
    }

    pub fn with_stores(
        config: &Config,
        rpc: Arc<dyn ChainRpc>,
        signer: PrivateKeySigner,
        clock: Arc<dyn Clock>,
        rate_limiter: Arc<dyn RateLimitStore>,
        idempotency: Arc<dyn IdempotencyStore>,
    ) -> Self {
        let executor = Executor::new(
            rpc.clone(),
            signer,
            config.hub(),
            config.chain_id,
            GasPolicy {
                default_gas_limit: config.default_gas_limit,
                buffer_percent: config.gas_buffer_percent,
            },
            config.rpc_call_timeout(),
        );
        Self {
            probe: StatusProbe::new(rpc.clone(), config.hub(), config.target()),
            fee: FeePolicyGuard::new(config.max_gas_price_wei()),
            waiter: ReceiptWaiter::new(
                rpc.clone(),
                config.receipt_poll_interval(),
                config.receipt_timeout(),
            ),
            executor,
            rpc,
            clock,
            rate_limiter,
            idempotency,
            target: config.target(),
        }
    }

    /// The relay's own identity; Forwards must name it as `caller`.
    pub fn relayer(&self) -> Address {
        self.executor.relayer()
    }

    pub fn rate_limiter(&self) -> &Arc<dyn RateLimitStore> {
        &self.rate_limiter
    }

    pub fn idempotency(&self) -> &Arc<dyn IdempotencyStore> {
        &self.idempotency
    }

    /// Run one request through the gates and, if admitted, to a receipt.
    pub async fn relay(&self, request: &RelayRequest, req_id: &str) -> RelayOutcome {
        let forward = &request.forward;
        let from = forward.from;

        if !self.rate_limiter.admit(from) {
            warn!(req_id, %from, "Rate limit exceeded");
            return RelayOutcome::rejected(ErrorKind::RateLimited);
        }

        let key = request.key();
        if !self.idempotency.try_mark_pending(&key) {
            warn!(req_id, %key, "Duplicate request");
            return RelayOutcome::rejected(ErrorKind::DuplicateRequest);
        }

        if let Some(outcome) = self.check_local(request, req_id) {
            return outcome;
        }

        match self.probe.check(forward).await {
            Ok(Precondition::Clear) => {}
            Ok(Precondition::AlreadyCompleted) => {
                info!(req_id, %from, "Sender already completed the action");
                return RelayOutcome::rejected(ErrorKind::AlreadyCompleted);
            }
            Ok(Precondition::NonceUsed) => {
                info!(req_id, %key, "Nonce already used on-chain");
                return RelayOutcome::rejected(ErrorKind::DuplicateRequest);
            }
            Err(e) => {
                warn!(req_id, error = %e, "Precondition probe failed");
                return RelayOutcome::rejected_with(ErrorKind::ExecutionFailed, e.to_string());
            }
        }

        let fee = self.fee.check(self.rpc.as_ref()).await;
        if let FeeDecision::TooHigh(price) = fee {
            let ceiling = self.fee.ceiling_wei();
            warn!(req_id, gas_price = price, ceiling, "Gas price above ceiling");
            return RelayOutcome::rejected_with(
                ErrorKind::FeeTooHigh,
                format!(
                    "current: {} gwei, max: {} gwei",
                    price / GWEI,
                    ceiling / GWEI
                ),
            );
        }

        info!(req_id, %from, nonce = %forward.nonce, space = forward.space, "Request admitted");

        let submitted = match self.executor.submit(request, fee.price()).await {
            Ok(s) => s,
            Err(failure) => {
                warn!(req_id, error = %failure, "Submission failed");
                return RelayOutcome::failed(&failure);
            }
        };

        match self.waiter.wait(submitted.tx_hash).await {
            Ok(receipt) => RelayOutcome::Confirmed {
                tx_hash: receipt.tx_hash,
                block_number: receipt.block_number,
                gas_used: receipt.gas_used,
            },
            Err(failure) => RelayOutcome::failed(&failure),
        }
    }

    /// Gates that need no I/O.
    fn check_local(&self, request: &RelayRequest, req_id: &str) -> Option<RelayOutcome> {
        let forward = &request.forward;

        if forward.to != self.target {
            warn!(req_id, to = %forward.to, expected = %self.target, "Invalid target");
            return Some(RelayOutcome::rejected(ErrorKind::InvalidTarget));
        }

        // Address equality is byte equality, so checksum case never matters.
        if forward.caller != self.relayer() {
            warn!(req_id, caller = %forward.caller, "Invalid caller");
            return Some(RelayOutcome::rejected(ErrorKind::InvalidCaller));
        }

        let computed = request.content_hash();
        if computed != forward.data_hash {
            warn!(req_id, expected = %forward.data_hash, %computed, "DataHash mismatch");
            return Some(RelayOutcome::rejected(ErrorKind::HashMismatch));
        }

        let now = self.clock.now_secs();
        if forward.is_expired_at(now) {
            warn!(req_id, deadline = forward.deadline_secs(), now, "Deadline expired");
            return Some(RelayOutcome::rejected(ErrorKind::Expired));
        }

        None
    }
}
