//! Health Check Server - Liveness and Readiness Probes
//!
//! Exposes /live and /ready endpoints via axum 0.7. Readiness depends on
//! price feed reachability and a readable state store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::broadcast;
use tracing::{info, instrument};

/// Shared health state polled by readiness probes.
#[derive(Debug)]
pub struct HealthState {
    pub feed_healthy: AtomicBool,
    pub storage_healthy: AtomicBool,
    /// Set once the startup session has been applied.
    pub session_applied: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            feed_healthy: AtomicBool::new(true),
            storage_healthy: AtomicBool::new(true),
            session_applied: AtomicBool::new(false),
        }
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.feed_healthy.load(Ordering::Relaxed)
            && self.storage_healthy.load(Ordering::Relaxed)
            && self.session_applied.load(Ordering::Relaxed)
    }
}

pub struct HealthServer {
    state: Arc<HealthState>,
    port: u16,
}

impl HealthServer {
    pub fn new(state: Arc<HealthState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Serve probes until shutdown.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .with_state(Arc::clone(&self.state));

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(address = %addr, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
        if state.is_ready() {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_only_after_session() {
        let state = HealthState::new();
        assert!(!state.is_ready());
        state.session_applied.store(true, Ordering::Relaxed);
        assert!(state.is_ready());
        state.feed_healthy.store(false, Ordering::Relaxed);
        assert!(!state.is_ready());
    }
}
