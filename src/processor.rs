//! orchestrates analysis and delivery for one webhook payload
//!
//! Alerts of a firing payload are processed concurrently and independently.
//! An analysis failure degrades the alert's message into an error notice, a
//! delivery failure loses only that alert's message. Neither aborts the
//! remaining alerts of the batch.

use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;
use prometheus::IntCounterVec;

use crate::{
    alert::{Alert, AlertGroup, AlertStatus},
    analysis::Analyzer,
    prompt,
    slack::Notifier,
    telemetry_endpoint::register_collector,
};

/// terminal state of one alert's pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertOutcome {
    /// analysis succeeded and the report reached the channel
    Delivered,
    /// analysis failed but the error notice reached the channel
    ErrorNoticeDelivered,
    /// analysis succeeded but the report could not be posted
    DeliveryFailed,
    /// neither analysis nor delivery succeeded
    Failed,
}

impl AlertOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::ErrorNoticeDelivered => "error_notice_delivered",
            Self::DeliveryFailed => "delivery_failed",
            Self::Failed => "failed",
        }
    }

    /// true if the channel received a message for this alert
    pub fn is_delivered(self) -> bool {
        matches!(self, Self::Delivered | Self::ErrorNoticeDelivered)
    }
}

/// per-batch aggregation of alert outcomes, in payload order
///
/// Internal observability only, the webhook acknowledgment does not expose
/// it to the alerting engine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessingSummary {
    pub outcomes: Vec<AlertOutcome>,
}

impl ProcessingSummary {
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// alerts whose message reached the channel, degraded or not
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_delivered()).count()
    }

    /// alerts whose message was lost
    pub fn lost(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }
}

/// prometheus meters for the processor
struct ProcessorMetrics {
    outcomes: IntCounterVec,
}

impl ProcessorMetrics {
    fn new() -> Result<Self, prometheus::Error> {
        let outcomes = IntCounterVec::new(
            prometheus::opts!("alerts_processed_total", "alert pipelines by terminal state")
                .namespace("augur")
                .subsystem("processor"),
            &["outcome"],
        )?;

        Ok(Self { outcomes: register_collector(outcomes)? })
    }

    fn record(&self, outcome: AlertOutcome) {
        self.outcomes.with_label_values(&[outcome.as_str()]).inc();
    }
}

/// drives filter → prompt → analyze → notify for every alert of a payload
pub struct AlertProcessor {
    analyzer: Arc<dyn Analyzer>,
    notifier: Arc<dyn Notifier>,
    metrics: ProcessorMetrics,
}

impl AlertProcessor {
    pub fn new(
        analyzer: Arc<dyn Analyzer>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, prometheus::Error> {
        Ok(Self { analyzer, notifier, metrics: ProcessorMetrics::new()? })
    }

    /// Processes one webhook payload to completion.
    ///
    /// Non-firing payloads are acknowledged without side effects. The
    /// summary is returned only once every alert of the batch was attempted.
    pub async fn process(&self, payload: &AlertGroup, raw_body: &Bytes) -> ProcessingSummary {
        if payload.status != AlertStatus::Firing {
            tracing::debug!(
                status = payload.status.as_str(),
                "payload is not firing, nothing to do"
            );

            return ProcessingSummary::default();
        }

        let outcomes = join_all(
            payload
                .alerts
                .iter()
                .map(|alert| self.handle_alert(alert, raw_body)),
        )
        .await;

        for outcome in &outcomes {
            self.metrics.record(*outcome);
        }

        ProcessingSummary { outcomes }
    }

    async fn handle_alert(&self, alert: &Alert, raw_body: &Bytes) -> AlertOutcome {
        let prompt = prompt::build_prompt(alert, raw_body);

        // a failed analysis still reaches the channel as an error notice so
        // the on-call team is never left uninformed
        let (message, degraded) = match self.analyzer.analyze(&prompt).await {
            Ok(analysis) => (analysis, false),
            Err(err) => {
                tracing::warn!(
                    alertname = alert.name(),
                    error = %err,
                    "analysis failed, delivering error notice instead"
                );

                (
                    format!(":warning: *Analysis failed for alert `{}`:* {err}", alert.name()),
                    true,
                )
            }
        };

        match self.notifier.notify(&message).await {
            Ok(()) => {
                tracing::debug!(alertname = alert.name(), "alert report delivered");

                if degraded {
                    AlertOutcome::ErrorNoticeDelivered
                } else {
                    AlertOutcome::Delivered
                }
            }
            Err(err) => {
                tracing::error!(
                    alertname = alert.name(),
                    error = %err,
                    "failed to deliver alert report"
                );

                if degraded {
                    AlertOutcome::Failed
                } else {
                    AlertOutcome::DeliveryFailed
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use async_trait::async_trait;
    use reqwest::StatusCode;

    use crate::{
        analysis::{AnalysisError, Analyzer},
        slack::{DeliveryError, Notifier},
    };

    /// scripted [Analyzer] recording every prompt it sees
    #[derive(Default)]
    pub(crate) struct RecordingAnalyzer {
        pub(crate) calls: AtomicUsize,
        pub(crate) prompts: Mutex<Vec<String>>,
        /// call indices that fail
        pub(crate) fail_on: Vec<usize>,
    }

    #[async_trait]
    impl Analyzer for RecordingAnalyzer {
        async fn analyze(&self, prompt: &str) -> Result<String, AnalysisError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_owned());

            if self.fail_on.contains(&call) {
                Err(AnalysisError::NoText)
            } else {
                Ok(format!("analysis text #{call}"))
            }
        }
    }

    /// scripted [Notifier] recording every message it sees
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub(crate) calls: AtomicUsize,
        pub(crate) messages: Mutex<Vec<String>>,
        /// call indices that fail
        pub(crate) fail_on: Vec<usize>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, message: &str) -> Result<(), DeliveryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.messages.lock().unwrap().push(message.to_owned());

            if self.fail_on.contains(&call) {
                Err(DeliveryError::Api {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: "no_service".to_owned(),
                })
            } else {
                Ok(())
            }
        }
    }
}
