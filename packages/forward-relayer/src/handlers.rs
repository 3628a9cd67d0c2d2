//! HTTP request handlers.

use crate::authorization::RelayRequest;
use crate::classify::{ErrorKind, RelayOutcome};
use crate::clock::{Clock, SystemClock};
use crate::metrics::METRICS;
use crate::middleware::RequestId;
use crate::response::{HealthResponse, RelayResponse};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{FromRequest, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Liveness with the relay identity.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        relayer: state.relayer.to_checksum(None),
        timestamp: SystemClock.now_secs(),
    })
}

/// Readiness probe. Returns 200 once the ledger RPC has answered.
pub async fn ready(State(state): State<Arc<AppState>>) -> Response {
    // Lazily flip ready on the first successful probe.
    if !state.ready.load(Ordering::Relaxed) {
        match state.rpc.health_check().await {
            Ok(rpc_status) => {
                info!(rpc_status, "Ledger RPC reachable, marking ready");
                state.ready.store(true, Ordering::Relaxed);
            }
            Err(e) => {
                warn!(error = %e, "Readiness probe failed");
                return e.into_response();
            }
        }
    }
    StatusCode::OK.into_response()
}

/// Prometheus metrics in text exposition format.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = METRICS.render(
        state.pipeline.idempotency().len(),
        state.pipeline.rate_limiter().tracked(),
    );
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        body,
    )
}

/// Validate a signed Forward and execute it. `POST /relay`
pub async fn relay(
    State(state): State<Arc<AppState>>,
    request_parts: axum::extract::Request,
) -> (StatusCode, Json<RelayResponse>) {
    let start = std::time::Instant::now();
    METRICS.relay_total.fetch_add(1, Ordering::Relaxed);
    let verbose = state.config.verbose_errors;

    // Extract correlation ID (set by middleware).
    let req_id = request_parts
        .extensions()
        .get::<RequestId>()
        .map(|r| r.0.clone())
        .unwrap_or_default();

    let parsed = match Bytes::from_request(request_parts, &state).await {
        Ok(body) => RelayRequest::parse(&body).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    let request = match parsed {
        Ok(r) => r,
        Err(details) => {
            warn!(req_id = %req_id, error = %details, "Invalid relay body");
            let outcome = RelayOutcome::rejected_with(ErrorKind::MalformedRequest, details);
            METRICS.record_outcome(&outcome, start);
            return respond(&outcome, verbose);
        }
    };

    info!(
        req_id = %req_id,
        from = %request.forward.from,
        nonce = %request.forward.nonce,
        "Relaying request"
    );

    // Spawned so a client disconnect never abandons an admitted submission.
    let pipeline = state.pipeline.clone();
    let task = state.tasks.spawn({
        let req_id = req_id.clone();
        async move {
            let outcome = pipeline.relay(&request, &req_id).await;
            METRICS.record_outcome(&outcome, start);
            outcome
        }
    });

    let outcome = match task.await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(req_id = %req_id, error = %e, "Relay task aborted");
            RelayOutcome::rejected_with(ErrorKind::ExecutionFailed, e.to_string())
        }
    };

    match &outcome {
        RelayOutcome::Confirmed { tx_hash, .. } => {
            info!(req_id = %req_id, tx_hash = %tx_hash, "Relay confirmed")
        }
        other => info!(req_id = %req_id, kind = ?other.kind(), "Relay finished without confirmation"),
    }
    respond(&outcome, verbose)
}

fn respond(outcome: &RelayOutcome, verbose: bool) -> (StatusCode, Json<RelayResponse>) {
    (
        outcome.status(),
        Json(RelayResponse::from_outcome(outcome, verbose)),
    )
}
