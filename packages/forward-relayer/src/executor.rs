//! Builds, signs and broadcasts the outer `execute` transaction.
//!
//! Submission spends relayer funds and advances the relayer nonce whatever the
//! eventual on-chain result, so nothing here is ever retried.

use crate::authorization::RelayRequest;
use crate::classify::ExecutionFailure;
use crate::contracts::{Forward, IForwardHub};
use crate::metrics::METRICS;
use crate::rpc::ChainRpc;
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use std::sync::atomic::Ordering;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

/// Gas limit derivation.
#[derive(Debug, Clone, Copy)]
pub struct GasPolicy {
    /// Used when estimation fails.
    pub default_gas_limit: u64,
    /// Added on top of a successful estimate.
    pub buffer_percent: u64,
}

impl GasPolicy {
    pub fn limit(&self, estimate: Option<u64>) -> u64 {
        match estimate {
            Some(gas) => gas.saturating_mul(100 + self.buffer_percent) / 100,
            None => self.default_gas_limit,
        }
    }
}

/// A broadcast transaction awaiting confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedTx {
    pub tx_hash: TxHash,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: u128,
}

pub struct Executor {
    rpc: Arc<dyn ChainRpc>,
    wallet: EthereumWallet,
    relayer: Address,
    hub: Address,
    chain_id: u64,
    gas: GasPolicy,
    /// Bound on each node call made while `submit_lock` is held.
    call_timeout: Duration,
    /// Held across nonce fetch + sign + send so two requests never share a nonce.
    submit_lock: AsyncMutex<()>,
}

impl Executor {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        signer: PrivateKeySigner,
        hub: Address,
        chain_id: u64,
        gas: GasPolicy,
        call_timeout: Duration,
    ) -> Self {
        let relayer = signer.address();
        Self {
            rpc,
            wallet: EthereumWallet::from(signer),
            relayer,
            hub,
            chain_id,
            gas,
            call_timeout,
            submit_lock: AsyncMutex::new(()),
        }
    }

    pub fn relayer(&self) -> Address {
        self.relayer
    }

    /// ABI-encode `execute(forward, callData, signature)`.
    pub fn encode_execute(request: &RelayRequest) -> Bytes {
        IForwardHub::executeCall {
            forward: Forward::from(&request.forward),
            callData: request.call_data.clone(),
            signature: request.signature.clone(),
        }
        .abi_encode()
        .into()
    }

    /// Sign and broadcast. `gas_price` is reused from the fee gate when known.
    pub async fn submit(
        &self,
        request: &RelayRequest,
        gas_price: Option<u128>,
    ) -> Result<SubmittedTx, ExecutionFailure> {
        let input = Self::encode_execute(request);

        let _submit = self.submit_lock.lock().await;

        let nonce = self
            .bounded("eth_getTransactionCount", self.rpc.pending_nonce(self.relayer))
            .await
            .map_err(|e| ExecutionFailure::Rpc(format!("failed to get nonce: {e}")))?;

        let gas_price = match gas_price {
            Some(p) => p,
            None => self
                .bounded("eth_gasPrice", self.rpc.gas_price())
                .await
                .map_err(|e| ExecutionFailure::Rpc(format!("failed to get gas price: {e}")))?,
        };

        let call = TransactionRequest::default()
            .with_from(self.relayer)
            .with_to(self.hub)
            .with_value(U256::ZERO)
            .with_input(input)
            .with_gas_price(gas_price);

        let estimate = match self
            .bounded("eth_estimateGas", self.rpc.estimate_gas(call.clone()))
            .await
        {
            Ok(gas) => Some(gas),
            Err(e) => {
                warn!(
                    error = %e,
                    default_gas_limit = self.gas.default_gas_limit,
                    "Gas estimation failed, using default limit"
                );
                None
            }
        };
        let gas_limit = self.gas.limit(estimate);

        let envelope = call
            .with_nonce(nonce)
            .with_gas_limit(gas_limit)
            .with_chain_id(self.chain_id)
            .build(&self.wallet)
            .await
            .map_err(|e| ExecutionFailure::Sign(e.to_string()))?;
        let local_hash = *envelope.tx_hash();
        let raw = Bytes::from(envelope.encoded_2718());

        info!(
            tx_hash = %local_hash,
            nonce,
            gas_limit,
            gas_price,
            from = %request.forward.from,
            "Broadcasting execute transaction"
        );

        // A send that times out may still have reached the node; it is reported, not retried.
        let tx_hash = self
            .bounded("eth_sendRawTransaction", self.rpc.send_raw_transaction(raw))
            .await
            .map_err(|e| ExecutionFailure::Submit(e.to_string()))?;
        METRICS.submitted.fetch_add(1, Ordering::Relaxed);

        if tx_hash != local_hash {
            warn!(%tx_hash, %local_hash, "Node reported a different transaction hash");
        }

        Ok(SubmittedTx {
            tx_hash,
            nonce,
            gas_limit,
            gas_price,
        })
    }

    async fn bounded<T>(
        &self,
        what: &'static str,
        call: impl Future<Output = Result<T, crate::Error>>,
    ) -> Result<T, crate::Error> {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| crate::Error::Rpc(format!("{what} timed out after {:?}", self.call_timeout)))?
    }
}
