//! In-process ledger and app fixtures shared by the integration tests.

use alloy::primitives::{address, keccak256, Address, Bytes, TxHash, B256};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::{SolCall, SolValue};
use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use forward_relayer::clock::ManualClock;
use forward_relayer::contracts::{IForwardHub, IForwardTarget};
use forward_relayer::rpc::{ChainRpc, ReceiptSummary};
use forward_relayer::{create_router, serve, AppState, Config, Error};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

pub const HUB: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
pub const TARGET: Address = address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512");
pub const USER: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
pub const GWEI: u64 = 1_000_000_000;

/// Far enough ahead that no test ever hits it.
pub const DEADLINE: u64 = 4_102_444_800;

/// The relayer's key; tests sign nothing with it but need its address.
pub fn relayer_key() -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&B256::repeat_byte(0x5a)).unwrap()
}

/// Scriptable ledger standing in for a JSON-RPC node.
pub struct MockLedger {
    pub minted: AtomicBool,
    pub nonce_used: AtomicBool,
    pub reachable: AtomicBool,
    pub gas_price_wei: AtomicU64,
    pub fail_estimate: AtomicBool,
    pub revert: AtomicBool,
    pub never_mined: AtomicBool,
    pub nonce: AtomicU64,
    pub sent: Mutex<Vec<Bytes>>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self {
            minted: AtomicBool::new(false),
            nonce_used: AtomicBool::new(false),
            reachable: AtomicBool::new(true),
            gas_price_wei: AtomicU64::new(25 * GWEI),
            fail_estimate: AtomicBool::new(false),
            revert: AtomicBool::new(false),
            never_mined: AtomicBool::new(false),
            nonce: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl MockLedger {
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn check_reachable(&self) -> Result<(), Error> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Rpc("connection refused".into()))
        }
    }
}

#[async_trait]
impl ChainRpc for MockLedger {
    async fn call(&self, _to: Address, input: Bytes) -> Result<Bytes, Error> {
        self.check_reachable()?;
        let selector = input.get(..4).unwrap_or_default();
        let flag = if selector == IForwardTarget::mintedCall::SELECTOR.as_slice() {
            self.minted.load(Ordering::SeqCst)
        } else if selector == IForwardHub::isNonceUsedCall::SELECTOR.as_slice() {
            self.nonce_used.load(Ordering::SeqCst)
        } else {
            return Err(Error::Rpc("execution reverted".into()));
        };
        Ok(flag.abi_encode().into())
    }

    async fn gas_price(&self) -> Result<u128, Error> {
        self.check_reachable()?;
        Ok(self.gas_price_wei.load(Ordering::SeqCst) as u128)
    }

    async fn pending_nonce(&self, _account: Address) -> Result<u64, Error> {
        self.check_reachable()?;
        Ok(self.nonce.load(Ordering::SeqCst))
    }

    async fn estimate_gas(&self, _tx: TransactionRequest) -> Result<u64, Error> {
        if self.fail_estimate.load(Ordering::SeqCst) {
            return Err(Error::Rpc("execution reverted".into()));
        }
        Ok(90_000)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash, Error> {
        self.check_reachable()?;
        let hash = keccak256(&raw);
        self.sent.lock().unwrap().push(raw);
        self.nonce.fetch_add(1, Ordering::SeqCst);
        Ok(hash)
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<ReceiptSummary>, Error> {
        if self.never_mined.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(ReceiptSummary {
            tx_hash,
            success: !self.revert.load(Ordering::SeqCst),
            block_number: 4_200,
            gas_used: 71_337,
        }))
    }

    async fn health_check(&self) -> Result<&'static str, Error> {
        self.check_reachable()?;
        Ok("ok")
    }
}

pub fn test_config() -> Config {
    Config {
        rpc_url: "http://127.0.0.1:8545".into(),
        private_key: relayer_key().to_bytes().to_string(),
        hub_address: Some(HUB),
        target_contract: Some(TARGET),
        ..Config::default()
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub ledger: Arc<MockLedger>,
    pub clock: Arc<ManualClock>,
}

pub fn test_app_with(config: Config) -> TestApp {
    let ledger = Arc::new(MockLedger::default());
    let clock = Arc::new(ManualClock::starting_now());
    let state = Arc::new(AppState::with_rpc(config, ledger.clone(), clock.clone()).unwrap());
    TestApp {
        router: create_router(state.clone()),
        state,
        ledger,
        clock,
    }
}

pub fn test_app() -> TestApp {
    test_app_with(test_config())
}

/// A `POST /relay` body that passes every gate.
pub fn relay_body(nonce: u64) -> Value {
    let call_data = IForwardTarget::mintedCall { account: USER }.abi_encode();
    json!({
        "forward": {
            "from": USER.to_string(),
            "to": TARGET.to_string(),
            "value": "0",
            "space": 0,
            "nonce": nonce.to_string(),
            "deadline": DEADLINE,
            "dataHash": keccak256(&call_data).to_string(),
            "caller": relayer_key().address().to_string().to_lowercase()
        },
        "signature": Bytes::from(vec![0x1b; 65]).to_string(),
        "callData": Bytes::from(call_data).to_string()
    })
}

pub async fn post_json(router: &Router, path: &str, body: &Value) -> Result<(StatusCode, Value)> {
    post_raw(router, path, serde_json::to_vec(body)?).await
}

pub async fn post_raw(router: &Router, path: &str, body: Vec<u8>) -> Result<(StatusCode, Value)> {
    let response = router
        .clone()
        .oneshot(
            Request::post(path)
                .header("content-type", "application/json")
                .body(Body::from(body))?,
        )
        .await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

pub async fn get(router: &Router, path: &str) -> Result<(StatusCode, Vec<u8>)> {
    let response = router
        .clone()
        .oneshot(Request::get(path).body(Body::empty())?)
        .await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, bytes.to_vec()))
}

/// The full server on a loopback port, stopped through `shutdown`.
pub struct RunningServer {
    pub url: String,
    pub shutdown: CancellationToken,
    pub handle: JoinHandle<std::io::Result<()>>,
}

pub async fn spawn_server(state: Arc<AppState>) -> Result<RunningServer> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("http://{}", listener.local_addr()?);
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(serve(listener, state, shutdown.clone()));
    Ok(RunningServer {
        url,
        shutdown,
        handle,
    })
}

/// Poll until the ledger has seen a broadcast, for at most `limit`.
pub async fn wait_for_broadcast(ledger: &MockLedger, limit: std::time::Duration) -> Result<()> {
    tokio::time::timeout(limit, async {
        while ledger.sent_count() == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await?;
    Ok(())
}
