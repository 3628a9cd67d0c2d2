//! Ledger access: the [`ChainRpc`] seam and its JSON-RPC implementation with
//! primary → fallback failover and a circuit breaker.

use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::{RpcError, TransportErrorKind, TransportResult};
use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::metrics::METRICS;

const CIRCUIT_BREAKER_THRESHOLD: u64 = 5;
const CIRCUIT_BREAKER_WINDOW_MS: u64 = 30_000;

/// The parts of a receipt the relayer reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub tx_hash: TxHash,
    /// `false` when the transaction reverted.
    pub success: bool,
    pub block_number: u64,
    pub gas_used: u64,
}

/// Everything the pipeline needs from the ledger. All calls may suspend.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Read-only `eth_call` against `to`.
    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, crate::Error>;

    /// Suggested legacy gas price, in wei.
    async fn gas_price(&self) -> Result<u128, crate::Error>;

    /// Pending transaction count (next nonce) of `account`.
    async fn pending_nonce(&self, account: Address) -> Result<u64, crate::Error>;

    async fn estimate_gas(&self, tx: TransactionRequest) -> Result<u64, crate::Error>;

    /// Broadcast a signed, EIP-2718 encoded transaction.
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash, crate::Error>;

    /// `Ok(None)` while the transaction is not yet mined.
    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<ReceiptSummary>, crate::Error>;

    /// Quick connectivity check. Returns "ok", "degraded", or error.
    async fn health_check(&self) -> Result<&'static str, crate::Error>;
}

struct CircuitState {
    failures: u64,
    last_failure_ms: u64,
    open: bool,
}

/// JSON-RPC client with primary → fallback failover.
pub struct RpcClient {
    primary: DynProvider,
    fallback: DynProvider,
    primary_url: String,
    fallback_url: String,
    circuit: Mutex<CircuitState>,
    total_failovers: AtomicU64,
    /// Set after the first successful response; drives `/ready`.
    reachable: AtomicBool,
}

impl RpcClient {
    pub fn new(primary_url: &str, fallback_url: &str) -> Result<Self, crate::Error> {
        let primary = connect(primary_url)?;
        let fallback = connect(fallback_url)?;
        info!(
            primary = primary_url,
            fallback = fallback_url,
            "RPC client initialized with failover"
        );
        Ok(Self {
            primary,
            fallback,
            primary_url: primary_url.to_string(),
            fallback_url: fallback_url.to_string(),
            circuit: Mutex::new(CircuitState {
                failures: 0,
                last_failure_ms: 0,
                open: false,
            }),
            total_failovers: AtomicU64::new(0),
            reachable: AtomicBool::new(false),
        })
    }

    /// Run `op` on the active provider, retrying once on the fallback when the
    /// node could not be reached. An error reply from the node is returned as is.
    async fn with_failover<T, F, Fut>(&self, what: &'static str, op: F) -> Result<T, crate::Error>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = TransportResult<T>>,
    {
        match op(self.active().clone()).await {
            Ok(v) => {
                self.record_success();
                Ok(v)
            }
            Err(e) if !is_node_failure(&e) => {
                self.reachable.store(true, Ordering::Relaxed);
                Err(crate::Error::Rpc(format!("{what} rejected: {e}")))
            }
            Err(e) => {
                self.record_failure();
                warn!(error = %e, op = what, "RPC call failed, trying fallback");
                let v = op(self.fallback.clone()).await.map_err(|e2| {
                    crate::Error::Rpc(format!("{what} failed: primary={e}, fallback={e2}"))
                })?;
                self.reachable.store(true, Ordering::Relaxed);
                Ok(v)
            }
        }
    }

    // --- Failover / circuit breaker ---

    /// Active client (primary unless circuit is open).
    fn active(&self) -> &DynProvider {
        if self.is_circuit_open() {
            &self.fallback
        } else {
            &self.primary
        }
    }

    fn record_success(&self) {
        self.reachable.store(true, Ordering::Relaxed);
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        if circuit.failures > 0 {
            info!(primary = %self.primary_url, "Primary RPC recovered");
            circuit.failures = 0;
            circuit.open = false;
        }
    }

    fn record_failure(&self) {
        METRICS.rpc_errors.fetch_add(1, Ordering::Relaxed);
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        circuit.failures += 1;
        circuit.last_failure_ms = now_ms();
        if circuit.failures >= CIRCUIT_BREAKER_THRESHOLD && !circuit.open {
            circuit.open = true;
            self.total_failovers.fetch_add(1, Ordering::Relaxed);
            METRICS.rpc_failovers.fetch_add(1, Ordering::Relaxed);
            warn!(
                failures = circuit.failures,
                fallback = %self.fallback_url,
                "Circuit breaker opened, routing to fallback"
            );
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        if !circuit.open {
            return false;
        }
        if now_ms().saturating_sub(circuit.last_failure_ms) > CIRCUIT_BREAKER_WINDOW_MS {
            circuit.open = false;
            circuit.failures = 0;
            info!(primary = %self.primary_url, "Circuit breaker half-open, retrying primary");
            return false;
        }
        true
    }

    pub fn failover_count(&self) -> u64 {
        self.total_failovers.load(Ordering::Relaxed)
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Relaxed)
    }

    /// Currently active RPC URL.
    pub fn active_url(&self) -> &str {
        if self.is_circuit_open() {
            &self.fallback_url
        } else {
            &self.primary_url
        }
    }
}

#[async_trait]
impl ChainRpc for RpcClient {
    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, crate::Error> {
        let tx = TransactionRequest::default().to(to).input(input.into());
        self.with_failover("eth_call", |p| {
            let tx = tx.clone();
            async move { p.call(tx).await }
        })
        .await
    }

    async fn gas_price(&self) -> Result<u128, crate::Error> {
        self.with_failover("eth_gasPrice", |p| async move { p.get_gas_price().await })
            .await
    }

    async fn pending_nonce(&self, account: Address) -> Result<u64, crate::Error> {
        self.with_failover("eth_getTransactionCount", |p| async move {
            p.get_transaction_count(account).pending().await
        })
        .await
    }

    async fn estimate_gas(&self, tx: TransactionRequest) -> Result<u64, crate::Error> {
        self.with_failover("eth_estimateGas", |p| {
            let tx = tx.clone();
            async move { p.estimate_gas(tx).await }
        })
        .await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash, crate::Error> {
        // Only unreachable nodes fail over; the same signed bytes cannot double-spend.
        self.with_failover("eth_sendRawTransaction", |p| {
            let raw = raw.clone();
            async move {
                let pending = p.send_raw_transaction(&raw).await?;
                Ok(*pending.tx_hash())
            }
        })
        .await
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<ReceiptSummary>, crate::Error> {
        let receipt = self
            .with_failover("eth_getTransactionReceipt", |p| async move {
                p.get_transaction_receipt(tx_hash).await
            })
            .await?;
        Ok(receipt.map(|r| ReceiptSummary {
            tx_hash,
            success: r.status(),
            block_number: r.block_number().unwrap_or_default(),
            gas_used: r.gas_used(),
        }))
    }

    async fn health_check(&self) -> Result<&'static str, crate::Error> {
        match self.primary.get_block_number().await {
            Ok(_) => {
                self.reachable.store(true, Ordering::Relaxed);
                Ok("ok")
            }
            Err(_) => match self.fallback.get_block_number().await {
                Ok(_) => {
                    self.reachable.store(true, Ordering::Relaxed);
                    Ok("degraded")
                }
                Err(e) => Err(crate::Error::Rpc(format!("Both RPCs unreachable: {e}"))),
            },
        }
    }
}

fn connect(url: &str) -> Result<DynProvider, crate::Error> {
    let url = url
        .parse()
        .map_err(|e| crate::Error::Config(format!("Invalid RPC URL {url:?}: {e}")))?;
    Ok(ProviderBuilder::default().connect_http(url).erased())
}

/// The node was unreachable or answered with something that is not JSON-RPC.
/// Error replies (reverts, "nonce too low") are answers, not failures.
fn is_node_failure(e: &RpcError<TransportErrorKind>) -> bool {
    matches!(
        e,
        RpcError::Transport(_) | RpcError::NullResp | RpcError::DeserError { .. }
    )
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
