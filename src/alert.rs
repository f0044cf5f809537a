//! data structures for deserializing incoming alertmanager payloads

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// placeholder substituted for missing labels and annotations
pub const PLACEHOLDER: &str = "N/A";

/// lifecycle state of an alert group
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Firing,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Firing => "firing",
            Self::Resolved => "resolved",
        }
    }
}

/// webhook payload grouping one or more alerts
///
/// `status` is the only mandatory field. Everything else alertmanager sends
/// is carried along when present and defaulted when absent.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertGroup {
    pub status: AlertStatus,
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub receiver: Option<String>,
    #[serde(default)]
    pub group_labels: HashMap<String, String>,
    #[serde(default)]
    pub common_labels: HashMap<String, String>,
    #[serde(default)]
    pub common_annotations: HashMap<String, String>,
    #[serde(default, rename = "externalURL")]
    pub external_url: Option<String>,
}

/// one alert instance of a group
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(default)]
    pub status: Option<AlertStatus>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "generatorURL")]
    pub generator_url: Option<String>,
}

impl Alert {
    /// looks up a label, falling back to [PLACEHOLDER]
    pub fn label(&self, key: &str) -> &str {
        self.labels.get(key).map_or(PLACEHOLDER, String::as_str)
    }

    /// looks up an annotation, falling back to [PLACEHOLDER]
    pub fn annotation(&self, key: &str) -> &str {
        self.annotations.get(key).map_or(PLACEHOLDER, String::as_str)
    }

    pub fn name(&self) -> &str {
        self.label("alertname")
    }

    pub fn severity(&self) -> &str {
        self.label("severity")
    }

    pub fn summary(&self) -> &str {
        self.annotation("summary")
    }

    pub fn description(&self) -> &str {
        self.annotation("description")
    }
}
