//! builds the instruction prompt sent to the reasoning model
//!
//! The template is a fixed constant. Its three report sections (what
//! happened, likely causes, next steps) are what the delivered message
//! format relies on, so template changes must keep that structure.

use crate::alert::Alert;

/// Renders the analysis instruction for one alert.
///
/// Missing labels and annotations already arrive as placeholders from
/// [Alert]'s accessors. The raw webhook payload is embedded verbatim as
/// supporting context for the model.
pub fn build_prompt(alert: &Alert, raw_payload: &[u8]) -> String {
    let raw = String::from_utf8_lossy(raw_payload);

    format!(
        "You are a senior Site Reliability Engineer and an observability expert. \
         You received the following alert from Prometheus. Your task is to analyze it and \
         provide a clear, actionable summary for the on-call team in a Slack channel.\n\
         \n\
         *Alert data:*\n\
         - *Alert name:* {name}\n\
         - *Severity:* {severity}\n\
         - *Summary:* {summary}\n\
         - *Description:* {description}\n\
         - *Raw payload (JSON):* ```json\n{raw}\n```\n\
         \n\
         *Your report (format for Slack using mrkdwn):*\n\
         \n\
         1. *:rotating_light: What happened?*\n\
         Explain the problem in one or two simple sentences.\n\
         \n\
         2. *:mag: Analysis and likely causes:*\n\
         Based on the alert data, list 2 to 3 likely root causes.\n\
         \n\
         3. *:wrench: Suggested next steps:*\n\
         Provide a list of 3 actionable steps to investigate and mitigate the problem.\n",
        name = alert.name(),
        severity = alert.severity(),
        summary = alert.summary(),
        description = alert.description(),
        raw = raw,
    )
}

#[cfg(test)]
mod tests {
    use crate::alert::{AlertGroup, PLACEHOLDER};

    use super::*;

    fn firing_group(payload: &str) -> AlertGroup {
        serde_json::from_str(payload).unwrap()
    }

    const HIGH_CPU: &str = r#"{
        "status": "firing",
        "alerts": [
            {
                "labels": { "alertname": "HighCPU", "severity": "critical" },
                "annotations": { "summary": "CPU at 95%", "description": "node-3 overloaded" }
            }
        ]
    }"#;

    #[test]
    fn prompt_contains_the_alert_fields_and_raw_payload() {
        let group = firing_group(HIGH_CPU);
        let prompt = build_prompt(&group.alerts[0], HIGH_CPU.as_bytes());

        assert!(prompt.contains("HighCPU"));
        assert!(prompt.contains("critical"));
        assert!(prompt.contains("CPU at 95%"));
        assert!(prompt.contains("node-3 overloaded"));
        assert!(prompt.contains(HIGH_CPU));
    }

    #[test]
    fn prompt_requests_the_three_report_sections() {
        let group = firing_group(HIGH_CPU);
        let prompt = build_prompt(&group.alerts[0], HIGH_CPU.as_bytes());

        assert!(prompt.contains("What happened?"));
        assert!(prompt.contains("Analysis and likely causes:"));
        assert!(prompt.contains("Suggested next steps:"));
    }

    #[test]
    fn prompt_is_deterministic() {
        let group = firing_group(HIGH_CPU);

        assert_eq!(
            build_prompt(&group.alerts[0], HIGH_CPU.as_bytes()),
            build_prompt(&group.alerts[0], HIGH_CPU.as_bytes()),
        );
    }

    #[test]
    fn missing_fields_render_as_placeholders() {
        let payload = r#"{ "status": "firing", "alerts": [ { "labels": { "alertname": "NoMeta" } } ] }"#;
        let group = firing_group(payload);
        let prompt = build_prompt(&group.alerts[0], payload.as_bytes());

        assert!(prompt.contains("NoMeta"));
        assert!(prompt.contains(&format!("*Severity:* {PLACEHOLDER}")));
        assert!(prompt.contains(&format!("*Summary:* {PLACEHOLDER}")));
        assert!(prompt.contains(&format!("*Description:* {PLACEHOLDER}")));
    }
}
