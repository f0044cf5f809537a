//! startup configuration, loaded once and passed by reference into the
//! components that need it

use anyhow::{Context, Result};
use clap::{App, Arg};
use config::{
    builder::{ConfigBuilder, DefaultState},
    Config, ConfigError, Environment, File,
};
use serde::Deserialize;

use crate::{
    alertmanager_webhook_receiver::AlertReceiverSettings, analysis::VertexAiSettings,
    log::LogSettings, slack::SlackSettings, telemetry_endpoint::TelemetryEndpointSettings,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub vertex: VertexAiSettings,
    pub slack: SlackSettings,
    pub alert_webhook_receiver: AlertReceiverSettings,
    pub telemetry_endpoint: TelemetryEndpointSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Loads configuration from the config file merged with `AUGUR__`
    /// prefixed environment variables (environment wins). Mandatory options
    /// without a value fail the load, which aborts startup.
    pub fn load() -> Result<Self> {
        let opts = App::new(clap::crate_name!())
            .version(clap::crate_version!())
            .about(clap::crate_description!())
            .arg(
                Arg::new("config")
                    .help("path of config file")
                    .takes_value(true)
                    .short('c')
                    .long("config")
                    .default_value("./config.yaml"),
            )
            .arg(
                Arg::new("level")
                    .help("log level")
                    .possible_values(["error", "warn", "info", "debug", "trace"])
                    .ignore_case(true)
                    .takes_value(true)
                    .long("log"),
            )
            .get_matches();

        #[allow(clippy::expect_used)]
        let config_path = opts.value_of("config").expect("config has a default value");

        let mut settings: Settings = defaults(Config::builder())
            .context("can't assemble config defaults")?
            .add_source(File::with_name(config_path).required(false))
            .add_source(Environment::with_prefix("AUGUR").separator("__"))
            .build()
            .context("can't load config")?
            .try_deserialize()
            .context("can't load config")?;

        if let Some(level) = opts.value_of("level") {
            settings.log.level = level.to_string();
        }

        Ok(settings)
    }
}

/// optional settings fall back to these values
fn defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    builder
        .set_default("vertex.region", "us-central1")?
        .set_default("vertex.model", "gemini-2.5-pro")?
        .set_default("vertex.request_timeout", 30.0)?
        .set_default("alert_webhook_receiver.bind_address", "0.0.0.0")?
        .set_default("alert_webhook_receiver.port", 5001_i64)?
        .set_default("telemetry_endpoint.bind_address", "0.0.0.0")?
        .set_default("telemetry_endpoint.port", 9095_i64)?
        .set_default("log.level", "info")
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    fn from_yaml(yaml: &str) -> Result<Settings, ConfigError> {
        defaults(Config::builder())?
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()
    }

    const MINIMAL: &str = "\
slack:
  webhook_url: https://hooks.slack.com/services/T000/B000/XXXX
vertex:
  project_id: acme-prod
";

    #[test]
    fn optional_settings_fall_back_to_defaults() {
        let settings = from_yaml(MINIMAL).unwrap();

        assert_eq!(settings.vertex.region, "us-central1");
        assert_eq!(settings.vertex.model, "gemini-2.5-pro");
        assert_eq!(settings.vertex.request_timeout.as_secs(), 30);
        assert_eq!(settings.alert_webhook_receiver.port, 5001);
        assert_eq!(settings.telemetry_endpoint.port, 9095);
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn configured_values_override_the_defaults() {
        let yaml = "\
slack:
  webhook_url: https://hooks.slack.com/services/T000/B000/XXXX
vertex:
  project_id: acme-prod
  region: europe-west1
  model: gemini-2.5-flash
alert_webhook_receiver:
  bind_address: 127.0.0.1
  port: 8080
";
        let settings = from_yaml(yaml).unwrap();

        assert_eq!(settings.vertex.region, "europe-west1");
        assert_eq!(settings.vertex.model, "gemini-2.5-flash");
        assert_eq!(settings.alert_webhook_receiver.port, 8080);
    }

    #[test]
    fn missing_project_id_fails_the_load() {
        let yaml = "\
slack:
  webhook_url: https://hooks.slack.com/services/T000/B000/XXXX
";
        assert!(from_yaml(yaml).is_err());
    }

    #[test]
    fn missing_webhook_url_fails_the_load() {
        let yaml = "\
vertex:
  project_id: acme-prod
";
        assert!(from_yaml(yaml).is_err());
    }
}
