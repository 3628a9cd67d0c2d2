//! Application state shared across handlers.

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::pipeline::RelayPipeline;
use crate::rpc::{ChainRpc, RpcClient};
use crate::sweeper::CleanupSweeper;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::info;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub relayer: Address,
    pub rpc: Arc<dyn ChainRpc>,
    pub pipeline: Arc<RelayPipeline>,
    /// In-flight relays; they outlive their HTTP connection.
    pub tasks: TaskTracker,
    pub ready: AtomicBool,
}

impl AppState {
    /// Create application state against the configured RPC endpoints.
    pub fn new(config: Config) -> Result<Self, crate::Error> {
        let rpc = RpcClient::new(&config.rpc_url, config.fallback_url())?;
        Self::with_rpc(config, Arc::new(rpc), Arc::new(SystemClock))
    }

    /// Create application state over any ledger implementation.
    pub fn with_rpc(
        config: Config,
        rpc: Arc<dyn ChainRpc>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, crate::Error> {
        let signer = parse_signer(&config.private_key)?;
        let relayer = signer.address();
        info!(relayer = %relayer, "Loaded relayer key");

        let pipeline = RelayPipeline::from_config(&config, rpc.clone(), signer, clock);

        Ok(Self {
            config,
            relayer,
            rpc,
            pipeline: Arc::new(pipeline),
            tasks: TaskTracker::new(),
            ready: AtomicBool::new(false),
        })
    }

    /// Sweeper over the pipeline's stores.
    pub fn sweeper(&self) -> CleanupSweeper {
        CleanupSweeper::new(
            self.pipeline.rate_limiter().clone(),
            self.pipeline.idempotency().clone(),
            self.config.cleanup_interval(),
        )
    }
}

/// Never echoes the key material in the error.
fn parse_signer(private_key: &str) -> Result<PrivateKeySigner, crate::Error> {
    private_key
        .trim()
        .parse::<PrivateKeySigner>()
        .map_err(|_| crate::Error::Signer("RELAYER_PRIVATE_KEY is not a valid secp256k1 key".into()))
}
