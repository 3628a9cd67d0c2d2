//! HTTP surface tests: the real router over an in-process ledger.

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use forward_relayer::metrics::METRICS;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tower::ServiceExt;

use crate::utils::{
    get, post_json, post_raw, relay_body, relayer_key, spawn_server, test_app, test_app_with,
    test_config, wait_for_broadcast, GWEI,
};

// ── Health / readiness / metrics ────────────────────────────────────

#[tokio::test]
async fn test_health_reports_relayer_identity() -> Result<()> {
    let app = test_app();
    let (status, body) = get(&app.router, "/health").await?;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body)?;
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(
        body["relayer"],
        json!(relayer_key().address().to_checksum(None))
    );
    assert!(body["timestamp"].as_u64().unwrap() > 1_600_000_000);
    Ok(())
}

#[tokio::test]
async fn test_ready_follows_ledger_reachability() -> Result<()> {
    let app = test_app();
    app.ledger.reachable.store(false, Ordering::SeqCst);
    let (status, _) = get(&app.router, "/ready").await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    app.ledger.reachable.store(true, Ordering::SeqCst);
    let (status, _) = get(&app.router, "/ready").await?;
    assert_eq!(status, StatusCode::OK);

    // Stays ready once flipped.
    app.ledger.reachable.store(false, Ordering::SeqCst);
    let (status, _) = get(&app.router, "/ready").await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_metrics_exposition() -> Result<()> {
    let app = test_app();
    let (status, body) = get(&app.router, "/metrics").await?;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body)?;
    assert!(text.contains("# TYPE relayer_relay_total counter"));
    assert!(text.contains("relayer_idempotency_records 0"));
    Ok(())
}

#[tokio::test]
async fn test_request_id_is_echoed_or_generated() -> Result<()> {
    let app = test_app();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/health")
                .header("x-request-id", "abc-123")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.headers()["x-request-id"], "abc-123");

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty())?)
        .await?;
    let generated = response.headers()["x-request-id"].to_str()?;
    assert!(generated.starts_with("fwd-"));
    Ok(())
}

#[tokio::test]
async fn test_cors_allows_any_origin() -> Result<()> {
    let app = test_app();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/health")
                .header("origin", "https://mint.example")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    Ok(())
}

// ── POST /relay ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_relay_success_body() -> Result<()> {
    let app = test_app();
    let (status, body) = post_json(&app.router, "/relay", &relay_body(1)).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["blockNumber"], json!(4_200));
    assert_eq!(body["gasUsed"], json!("71337"));
    assert_eq!(body["txHash"], body["transactionHash"]);
    assert!(body.get("error").is_none());
    assert_eq!(app.ledger.sent_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_malformed_json_is_400() -> Result<()> {
    let app = test_app();
    let (status, body) = post_raw(&app.router, "/relay", b"{not json".to_vec()).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("Invalid request body"));
    assert_eq!(body["code"], json!("MalformedRequest"));
    assert!(body.get("details").is_none());
    Ok(())
}

#[tokio::test]
async fn test_missing_field_is_400_with_details_when_verbose() -> Result<()> {
    let mut config = test_config();
    config.verbose_errors = true;
    let app = test_app_with(config);

    let mut req = relay_body(1);
    req.as_object_mut().unwrap().remove("signature");
    let (status, body) = post_json(&app.router, "/relay", &req).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"], json!("missing field: signature"));
    assert_eq!(app.ledger.sent_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_hash_mismatch_is_400() -> Result<()> {
    let app = test_app();
    let mut req = relay_body(1);
    req["callData"] = json!("0xdeadbeef");
    let (status, body) = post_json(&app.router, "/relay", &req).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("DataHash mismatch - signature invalid"));
    assert_eq!(app.ledger.sent_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_fee_ceiling_is_503() -> Result<()> {
    let app = test_app();
    app.ledger
        .gas_price_wei
        .store(101 * GWEI, Ordering::SeqCst);
    let (status, body) = post_json(&app.router, "/relay", &relay_body(1)).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], json!("FeeTooHigh"));
    assert_eq!(app.ledger.sent_count(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_sixth_request_is_429() -> Result<()> {
    let app = test_app();
    for nonce in 0..5 {
        let (status, _) = post_json(&app.router, "/relay", &relay_body(nonce)).await?;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = post_json(&app.router, "/relay", &relay_body(5)).await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], json!("Too many requests. Please try again later."));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_reverted_is_500_with_hash() -> Result<()> {
    let app = test_app();
    app.ledger.revert.store(true, Ordering::SeqCst);
    let (status, body) = post_json(&app.router, "/relay", &relay_body(1)).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], json!("Reverted"));
    assert!(body["txHash"].as_str().unwrap().starts_with("0x"));
    Ok(())
}

#[tokio::test]
async fn test_already_completed_is_400() -> Result<()> {
    let app = test_app();
    app.ledger.minted.store(true, Ordering::SeqCst);
    let (status, body) = post_json(&app.router, "/relay", &relay_body(1)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("AlreadyCompleted"));
    Ok(())
}

#[tokio::test]
async fn test_unreachable_ledger_is_generic_500() -> Result<()> {
    let app = test_app();
    app.ledger.reachable.store(false, Ordering::SeqCst);
    let (status, body) = post_json(&app.router, "/relay", &relay_body(1)).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], json!("Transaction failed"));
    assert!(body.get("details").is_none());
    Ok(())
}

// ── Disconnects and shutdown ────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_client_disconnect_does_not_abandon_relay() -> Result<()> {
    let app = test_app();
    app.ledger.never_mined.store(true, Ordering::SeqCst);
    let confirmed_before = METRICS.relay_confirmed.load(Ordering::SeqCst);

    let client = tokio::spawn({
        let router = app.router.clone();
        async move { post_json(&router, "/relay", &relay_body(1)).await }
    });
    wait_for_broadcast(&app.ledger, Duration::from_secs(5)).await?;

    client.abort();
    assert!(client.await.unwrap_err().is_cancelled());
    assert_eq!(app.state.tasks.len(), 1);

    // Mined after the client has gone; the tracked task still sees it through.
    app.ledger.never_mined.store(false, Ordering::SeqCst);
    app.state.tasks.close();
    app.state.tasks.wait().await;

    assert_eq!(app.ledger.sent_count(), 1);
    assert!(METRICS.relay_confirmed.load(Ordering::SeqCst) > confirmed_before);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_drains_in_flight_relay() -> Result<()> {
    let mut config = test_config();
    config.receipt_poll_secs = 1;
    config.shutdown_grace_secs = 10;
    let app = test_app_with(config);
    app.ledger.never_mined.store(true, Ordering::SeqCst);
    let server = spawn_server(app.state.clone()).await?;

    let client = tokio::spawn({
        let url = format!("{}/relay", server.url);
        async move {
            reqwest::Client::new()
                .post(url)
                .json(&relay_body(1))
                .send()
                .await
        }
    });
    wait_for_broadcast(&app.ledger, Duration::from_secs(5)).await?;

    let start = Instant::now();
    server.shutdown.cancel();
    tokio::time::sleep(Duration::from_millis(200)).await;
    app.ledger.never_mined.store(false, Ordering::SeqCst);

    server.handle.await??;
    assert!(start.elapsed() < Duration::from_secs(10));
    assert!(app.state.tasks.is_empty());

    let response = client.await??;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["success"], json!(true));
    assert_eq!(app.ledger.sent_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_is_bounded_by_grace() -> Result<()> {
    let mut config = test_config();
    config.receipt_timeout_secs = 60;
    config.shutdown_grace_secs = 1;
    let app = test_app_with(config);
    app.ledger.never_mined.store(true, Ordering::SeqCst);
    let server = spawn_server(app.state.clone()).await?;

    let client = tokio::spawn({
        let url = format!("{}/relay", server.url);
        async move {
            reqwest::Client::new()
                .post(url)
                .json(&relay_body(1))
                .send()
                .await
        }
    });
    wait_for_broadcast(&app.ledger, Duration::from_secs(5)).await?;

    let start = Instant::now();
    server.shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), server.handle).await???;
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");

    client.abort();
    Ok(())
}
