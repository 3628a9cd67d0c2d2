//! Relayer configuration.
//!
//! Loaded from an optional `relayer.{toml,yaml,json}` file and
//! `RELAYER_`-prefixed environment variables.

use alloy::primitives::Address;
use serde::Deserialize;
use std::time::Duration;

/// One gwei in wei.
const GWEI: u128 = 1_000_000_000;

/// Configuration for the forward relayer.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// JSON-RPC endpoint of the ledger. Required.
    #[serde(default)]
    pub rpc_url: String,

    /// Secondary endpoint used when the primary trips the circuit breaker.
    /// Empty means "same as primary".
    #[serde(default)]
    pub fallback_rpc_url: String,

    /// Hex-encoded secp256k1 key of the funded relayer account. Required.
    #[serde(default)]
    pub private_key: String,

    /// Hub (forwarding) contract that receives `execute`. Required.
    #[serde(default)]
    pub hub_address: Option<Address>,

    /// The only contract Forwards may target. Required.
    #[serde(default)]
    pub target_contract: Option<Address>,

    #[serde(default = "defaults::chain_id")]
    pub chain_id: u64,

    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Fee ceiling in gwei; admission is refused above it.
    #[serde(default = "defaults::max_gas_price_gwei")]
    pub max_gas_price_gwei: u64,

    /// Gas limit used when `eth_estimateGas` fails.
    #[serde(default = "defaults::default_gas_limit")]
    pub default_gas_limit: u64,

    /// Margin added on top of a successful estimate, in percent.
    #[serde(default = "defaults::gas_buffer_percent")]
    pub gas_buffer_percent: u64,

    #[serde(default = "defaults::rate_limit_max")]
    pub rate_limit_max: usize,

    #[serde(default = "defaults::rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    #[serde(default = "defaults::idempotency_ttl_secs")]
    pub idempotency_ttl_secs: u64,

    #[serde(default = "defaults::cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    #[serde(default = "defaults::receipt_poll_secs")]
    pub receipt_poll_secs: u64,

    #[serde(default = "defaults::receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,

    /// Bound on each node call made during submission.
    #[serde(default = "defaults::rpc_call_timeout_secs")]
    pub rpc_call_timeout_secs: u64,

    #[serde(default = "defaults::shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Include raw error text in the `details` field of error responses.
    #[serde(default)]
    pub verbose_errors: bool,
}

impl Config {
    /// Load from `relayer.*` (optional) and `RELAYER_*` environment variables.
    pub fn load() -> Result<Self, crate::Error> {
        let config: Config = config::Config::builder()
            .add_source(config::File::with_name("relayer").required(false))
            .add_source(config::Environment::with_prefix("RELAYER"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations missing a required value.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.rpc_url.trim().is_empty() {
            return Err(crate::Error::Config("RELAYER_RPC_URL is required".into()));
        }
        if self.private_key.trim().is_empty() {
            return Err(crate::Error::Config("RELAYER_PRIVATE_KEY is required".into()));
        }
        if self.hub_address.is_none() {
            return Err(crate::Error::Config("RELAYER_HUB_ADDRESS is required".into()));
        }
        if self.target_contract.is_none() {
            return Err(crate::Error::Config(
                "RELAYER_TARGET_CONTRACT is required".into(),
            ));
        }
        if self.rate_limit_max == 0 {
            return Err(crate::Error::Config(
                "RELAYER_RATE_LIMIT_MAX must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn hub(&self) -> Address {
        self.hub_address.unwrap_or_default()
    }

    pub fn target(&self) -> Address {
        self.target_contract.unwrap_or_default()
    }

    pub fn fallback_url(&self) -> &str {
        if self.fallback_rpc_url.trim().is_empty() {
            &self.rpc_url
        } else {
            &self.fallback_rpc_url
        }
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    pub fn max_gas_price_wei(&self) -> u128 {
        self.max_gas_price_gwei as u128 * GWEI
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn idempotency_ttl(&self) -> Duration {
        Duration::from_secs(self.idempotency_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_secs(self.receipt_poll_secs.max(1))
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn rpc_call_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_call_timeout_secs.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: String::new(),
            fallback_rpc_url: String::new(),
            private_key: String::new(),
            hub_address: None,
            target_contract: None,
            chain_id: defaults::chain_id(),
            port: defaults::port(),
            max_gas_price_gwei: defaults::max_gas_price_gwei(),
            default_gas_limit: defaults::default_gas_limit(),
            gas_buffer_percent: defaults::gas_buffer_percent(),
            rate_limit_max: defaults::rate_limit_max(),
            rate_limit_window_secs: defaults::rate_limit_window_secs(),
            idempotency_ttl_secs: defaults::idempotency_ttl_secs(),
            cleanup_interval_secs: defaults::cleanup_interval_secs(),
            receipt_poll_secs: defaults::receipt_poll_secs(),
            receipt_timeout_secs: defaults::receipt_timeout_secs(),
            rpc_call_timeout_secs: defaults::rpc_call_timeout_secs(),
            shutdown_grace_secs: defaults::shutdown_grace_secs(),
            verbose_errors: false,
        }
    }
}

// The private key must never reach the logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("rpc_url", &self.rpc_url)
            .field("fallback_rpc_url", &self.fallback_rpc_url)
            .field("private_key", &"<redacted>")
            .field("hub_address", &self.hub_address)
            .field("target_contract", &self.target_contract)
            .field("chain_id", &self.chain_id)
            .field("port", &self.port)
            .field("max_gas_price_gwei", &self.max_gas_price_gwei)
            .field("verbose_errors", &self.verbose_errors)
            .finish_non_exhaustive()
    }
}

mod defaults {
    /// Polygon Amoy.
    pub fn chain_id() -> u64 {
        80002
    }

    pub fn port() -> u16 {
        3000
    }

    pub fn max_gas_price_gwei() -> u64 {
        100
    }

    pub fn default_gas_limit() -> u64 {
        500_000
    }

    pub fn gas_buffer_percent() -> u64 {
        20
    }

    pub fn rate_limit_max() -> usize {
        5
    }

    pub fn rate_limit_window_secs() -> u64 {
        60
    }

    pub fn idempotency_ttl_secs() -> u64 {
        300
    }

    pub fn cleanup_interval_secs() -> u64 {
        60
    }

    pub fn receipt_poll_secs() -> u64 {
        2
    }

    pub fn receipt_timeout_secs() -> u64 {
        120
    }

    pub fn rpc_call_timeout_secs() -> u64 {
        15
    }

    pub fn shutdown_grace_secs() -> u64 {
        30
    }
}
