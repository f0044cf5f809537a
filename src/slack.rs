//! delivers rendered analyses to a slack incoming webhook
//!
//! One message per alert, a single attempt each. Failures are reported to
//! the caller as [DeliveryError] and never abort the caller's batch.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// slack rejects section blocks with more than 3000 characters of text
const MAX_SECTION_TEXT_LEN: usize = 3000;

/// marker appended when an analysis had to be cut down to the block limit
const TRUNCATION_MARKER: &str = "… (truncated)";

/// fallback line shown in notification previews
const FALLBACK_TEXT: &str = "Automated alert analysis received";

/// attribution footer attached to every message
const ATTRIBUTION: &str = "Analyzed by augur · Vertex AI";

/// outbound requests are bounded so a hanging webhook cannot pin a batch
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// config file options for the notification destination
#[derive(Debug, Clone, Deserialize)]
pub struct SlackSettings {
    pub webhook_url: Url,
}

/// failure of a single delivery attempt
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("request to Slack failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Slack returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

/// capability of posting one message to the destination channel
#[async_trait]
pub trait Notifier: Send + Sync {
    /// a single attempt, no retry
    async fn notify(&self, message: &str) -> Result<(), DeliveryError>;
}

#[derive(Debug, Serialize)]
struct WebhookMessage {
    text: &'static str,
    blocks: Vec<Block>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Section { text: Mrkdwn },
    Divider,
    Context { elements: Vec<Mrkdwn> },
}

#[derive(Debug, Serialize)]
struct Mrkdwn {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

impl Mrkdwn {
    fn new(text: impl Into<String>) -> Self {
        Self { kind: "mrkdwn", text: text.into() }
    }
}

/// wraps analysis text into the envelope the webhook expects:
/// preview text, the analysis section, a divider and the attribution footer
fn envelope(message: &str) -> WebhookMessage {
    WebhookMessage {
        text: FALLBACK_TEXT,
        blocks: vec![
            Block::Section { text: Mrkdwn::new(truncated(message, MAX_SECTION_TEXT_LEN)) },
            Block::Divider,
            Block::Context { elements: vec![Mrkdwn::new(ATTRIBUTION)] },
        ],
    }
}

/// cuts `text` down to at most `max` bytes without splitting a character
fn truncated(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_owned();
    }

    let mut end = max - TRUNCATION_MARKER.len();
    while !text.is_char_boundary(end) {
        end -= 1;
    }

    let mut cut = text[..end].to_owned();
    cut.push_str(TRUNCATION_MARKER);
    cut
}

/// [Notifier] backed by a slack incoming webhook
pub struct SlackWebhookClient {
    client: reqwest::Client,
    webhook_url: Url,
}

impl SlackWebhookClient {
    pub fn new(settings: &SlackSettings) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self { client, webhook_url: settings.webhook_url.clone() })
    }
}

#[async_trait]
impl Notifier for SlackWebhookClient {
    async fn notify(&self, message: &str) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&envelope(message))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Api { status, body });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_has_section_divider_and_footer() {
        let value = serde_json::to_value(envelope("node-3 is saturated")).unwrap();

        assert_eq!(value["text"], FALLBACK_TEXT);

        let blocks = value["blocks"].as_array().unwrap();
        assert_eq!(blocks.len(), 3);

        assert_eq!(blocks[0]["type"], "section");
        assert_eq!(blocks[0]["text"]["type"], "mrkdwn");
        assert_eq!(blocks[0]["text"]["text"], "node-3 is saturated");

        assert_eq!(blocks[1], serde_json::json!({ "type": "divider" }));

        assert_eq!(blocks[2]["type"], "context");
        assert_eq!(blocks[2]["elements"][0]["text"], ATTRIBUTION);
    }

    #[test]
    fn short_messages_pass_through_untruncated() {
        assert_eq!(truncated("all good", MAX_SECTION_TEXT_LEN), "all good");
    }

    #[test]
    fn oversized_messages_are_cut_to_the_block_limit() {
        let long = "a".repeat(MAX_SECTION_TEXT_LEN + 500);
        let cut = truncated(&long, MAX_SECTION_TEXT_LEN);

        assert_eq!(cut.len(), MAX_SECTION_TEXT_LEN);
        assert!(cut.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn truncation_never_splits_a_character() {
        // 'é' is two bytes; an odd cut position would land inside one
        let long = "é".repeat(MAX_SECTION_TEXT_LEN);
        let cut = truncated(&long, MAX_SECTION_TEXT_LEN);

        assert!(cut.len() <= MAX_SECTION_TEXT_LEN);
        assert!(cut.ends_with(TRUNCATION_MARKER));
    }
}
