//! http boundary receiving alertmanager webhook payloads

use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{extract::Extension, http::StatusCode, routing::post, Json, Router};
use bytes::Bytes;
use prometheus::IntCounterVec;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    alert::AlertGroup, processor::AlertProcessor, telemetry_endpoint::register_collector,
};

/// config file options for the webhook listener
#[derive(Debug, Deserialize, Clone)]
pub struct AlertReceiverSettings {
    pub bind_address: IpAddr,
    pub port: u16,
}

impl AlertReceiverSettings {
    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

struct State {
    processor: AlertProcessor,
    received: IntCounterVec,
}

impl State {
    fn new(processor: AlertProcessor) -> Result<Self, prometheus::Error> {
        let received = IntCounterVec::new(
            prometheus::opts!("received_payloads_total", "deserialized webhook payloads")
                .namespace("augur")
                .subsystem("webhook"),
            &["status"],
        )?;

        Ok(Self { processor, received: register_collector(received)? })
    }
}

/// Acknowledges with 200 once every alert of the batch was attempted.
///
/// Per-alert analysis and delivery failures stay internal, the alerting
/// engine only sees the acknowledgment. Payloads that don't deserialize are
/// rejected with 400 instead of crashing the process.
async fn alertmanager_webhook(
    Extension(state): Extension<Arc<State>>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let payload = match serde_json::from_slice::<AlertGroup>(&body) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::debug!(error = %err, "failed to deserialize webhook payload");
            return (StatusCode::BAD_REQUEST, Json(json!({ "status": "error" })));
        }
    };

    state
        .received
        .with_label_values(&[payload.status.as_str()])
        .inc();

    let summary = state.processor.process(&payload, &body).await;

    if !summary.is_empty() {
        tracing::info!(
            alerts = summary.outcomes.len(),
            delivered = summary.delivered(),
            lost = summary.lost(),
            "processed alert batch"
        );
    }

    (StatusCode::OK, Json(json!({ "status": "success" })))
}

fn app(state: Arc<State>) -> Router {
    Router::new()
        .route("/webhook", post(alertmanager_webhook))
        .layer(Extension(state))
}

pub async fn run_prometheus_receiver(
    settings: &AlertReceiverSettings,
    processor: AlertProcessor,
) -> Result<()> {
    let state = Arc::new(State::new(processor).context("failed to register webhook meters")?);

    axum::Server::bind(&settings.to_socket_addr())
        .serve(app(state).into_make_service())
        .await
        .context("prometheus endpoint crashed")?;

    Ok(())
}
