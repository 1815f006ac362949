use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::sync::Notify;

use crate::status::{CollectionStatus, LastCollection};

static PROM_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
struct AppState {
    status: CollectionStatus,
    trigger: Arc<Notify>,
}

#[derive(Serialize)]
struct Overview {
    status: &'static str,
    service: &'static str,
    last_collection: LastCollection,
}

/// Install the Prometheus recorder and serve the health endpoints in the
/// background.
pub async fn init(bind_addr: &str, status: CollectionStatus, trigger: Arc<Notify>) -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus metrics recorder")?;

    // Only the first call installs a handle.
    let _ = PROM_HANDLE.set(handle);

    let addr: SocketAddr = bind_addr
        .parse()
        .with_context(|| format!("invalid keepalive bind address {bind_addr}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind keepalive listener on {addr}"))?;

    let app = router(AppState { status, trigger });

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app.into_make_service()).await {
            tracing::error!(error = %e, "keepalive server error");
        }
    });

    tracing::info!(%addr, "keepalive server listening");
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(overview_handler))
        .route("/status", get(status_handler))
        .route("/collect", get(collect_handler).post(collect_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn overview_handler(State(state): State<AppState>) -> Json<Overview> {
    Json(Overview {
        status: "running",
        service: env!("CARGO_PKG_NAME"),
        last_collection: state.status.snapshot(),
    })
}

async fn status_handler(State(state): State<AppState>) -> Json<LastCollection> {
    Json(state.status.snapshot())
}

/// Wakes the collector; the poll itself runs on the collector task.
async fn collect_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.trigger.notify_one();
    metrics::counter!("manual_collections_requested_total").increment(1);
    (StatusCode::ACCEPTED, Json(state.status.snapshot()))
}

async fn metrics_handler() -> impl IntoResponse {
    match PROM_HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not initialized".to_string(),
        ),
    }
}

/// Periodically GET an external URL so hosting platforms that idle
/// inactive services keep this one awake.
pub fn spawn_self_ping(url: String, interval: Duration) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("building self-ping client")?;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so startup is not pinged.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match client.get(&url).send().await {
                Ok(resp) => tracing::debug!(status = %resp.status(), "self-ping"),
                Err(e) => {
                    metrics::counter!("self_ping_failures_total").increment(1);
                    tracing::warn!(error = %e, url = %url, "self-ping failed");
                }
            }
        }
    });

    Ok(())
}
