//! # Forward Relayer
//!
//! A relayer for gasless meta-transactions. Users sign a `Forward`
//! authorization off-chain; the relayer validates it, pays the gas and
//! submits it to the hub contract, which verifies the signature on-chain.
//!
//! ## Quick Start
//! ```bash
//! RELAYER_RPC_URL=... RELAYER_PRIVATE_KEY=... RELAYER_HUB_ADDRESS=... \
//! RELAYER_TARGET_CONTRACT=... cargo run --bin forward-relayer
//! ```
//!
//! ## Endpoints
//! - `GET /health` - Liveness with relayer address
//! - `GET /ready` - Readiness (RPC reachable)
//! - `GET /metrics` - Prometheus counters
//! - `POST /relay` - Validate and execute a signed Forward

pub mod authorization;
pub mod classify;
pub mod clock;
pub mod config;
pub mod contracts;
mod error;
pub mod executor;
pub mod fee;
mod handlers;
pub mod idempotency;
pub mod metrics;
mod middleware;
pub mod pipeline;
pub mod probe;
pub mod rate_limit;
pub mod receipt;
mod response;
mod router;
pub mod rpc;
mod server;
mod state;
pub mod sweeper;

pub use config::Config;
pub use error::Error;
pub use router::create as create_router;
pub use server::serve;
pub use state::AppState;
