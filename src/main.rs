//! prometheus alertmanager receiver that enriches firing alerts with a
//! Vertex AI root cause analysis and forwards the report to Slack
//!
//! Features:
//! - alertmanager compatible webhook endpoint
//! - per alert root cause analysis through the Vertex AI generateContent api
//! - best effort delivery to a slack incoming webhook
//! - prometheus telemetry endpoint

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    analysis::VertexAiClient, processor::AlertProcessor, settings::Settings,
    slack::SlackWebhookClient,
};

mod alert;
mod alertmanager_webhook_receiver;
mod analysis;
mod log;
mod processor;
mod prompt;
mod settings;
mod slack;
mod telemetry_endpoint;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
    setup_panic_handler();

    let settings = Settings::load().context("failed to load config and command line arguments")?;

    log::setup_logging(&settings.log).context("could not setup logging")?;

    let analyzer =
        VertexAiClient::new(&settings.vertex).context("failed to construct Vertex AI client")?;
    let notifier = SlackWebhookClient::new(&settings.slack)
        .context("failed to construct Slack webhook client")?;

    let processor = AlertProcessor::new(Arc::new(analyzer), Arc::new(notifier))
        .context("failed to register processor meters")?;

    tracing::info!(
        project_id = settings.vertex.project_id.as_str(),
        region = settings.vertex.region.as_str(),
        model = settings.vertex.model.as_str(),
        "starting alert analysis bridge"
    );

    {
        let telemetry_settings = settings.telemetry_endpoint.clone();
        tokio::spawn(async move {
            telemetry_endpoint::run_telemetry_endpoint(&telemetry_settings).await;
        });
    }

    alertmanager_webhook_receiver::run_prometheus_receiver(
        &settings.alert_webhook_receiver,
        processor,
    )
    .await
}
