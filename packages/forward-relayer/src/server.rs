//! Serve the router until shutdown, then drain in-flight relays.
//!
//! The grace period starts when `shutdown` fires and bounds the whole
//! shutdown: open connections and tracked relays share one deadline.

use crate::router::create as create_router;
use crate::state::AppState;
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let grace = state.config.shutdown_grace();

    let sweeper = state.sweeper();
    let sweeper_cancel = shutdown.child_token();
    let sweeper_task = tokio::spawn({
        let cancel = sweeper_cancel.clone();
        async move { sweeper.run(cancel).await }
    });

    let server = axum::serve(listener, create_router(state.clone()))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .into_future();
    tokio::pin!(server);

    let finished = tokio::select! {
        res = &mut server => Some(res),
        () = shutdown.cancelled() => None,
    };
    let deadline = Instant::now() + grace;

    let served = match finished {
        Some(res) => res,
        None => {
            info!(grace_secs = grace.as_secs(), "Shutdown requested, closing listener");
            match tokio::time::timeout_at(deadline, &mut server).await {
                Ok(res) => res,
                Err(_) => {
                    warn!("Connections still open at the shutdown deadline, dropping them");
                    Ok(())
                }
            }
        }
    };

    // --- Stop sweeper, drain in-flight relays ---
    sweeper_cancel.cancel();
    let _ = sweeper_task.await;

    state.tasks.close();
    let in_flight = state.tasks.len();
    if tokio::time::timeout_at(deadline, state.tasks.wait())
        .await
        .is_ok()
    {
        info!(drained = in_flight, "All in-flight relays drained");
    } else {
        warn!(
            remaining = state.tasks.len(),
            "Drain timeout, abandoning in-flight relays"
        );
    }

    served
}
