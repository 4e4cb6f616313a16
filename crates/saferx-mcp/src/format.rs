//! Rendering backend JSON into the markdown text returned to the host.

use crate::model::SafetyAlert;
use serde_json::Value;

const ALERTS_HEADING: &str = "## Safety Alerts";
const SAFETY_DATA_HEADING: &str = "## Full Safety Data";
const METADATA_HEADING: &str = "## SafeRx API Metadata";

/// Text for a non-success backend response: `Error {status}: {compact body}`.
#[must_use]
pub fn error_text(status: u16, body: &Value) -> String {
    format!("Error {status}: {}", compact(body))
}

/// Text for a successful screening: alerts first (when any), then the full response.
#[must_use]
pub fn check_result_text(body: &Value) -> String {
    let alerts = SafetyAlert::extract(body);
    let mut out = String::new();
    if !alerts.is_empty() {
        out.push_str(ALERTS_HEADING);
        out.push_str("\n\n");
        let lines: Vec<String> = alerts.iter().map(alert_line).collect();
        out.push_str(&lines.join("\n"));
        out.push_str("\n\n");
    }
    out.push_str(&json_section(SAFETY_DATA_HEADING, body));
    out
}

/// Text for a successful metadata lookup.
#[must_use]
pub fn metadata_text(body: &Value) -> String {
    json_section(METADATA_HEADING, body)
}

fn alert_line(alert: &SafetyAlert) -> String {
    format!(
        "- **{}** [{}]: {}",
        alert.severity, alert.kind, alert.message
    )
}

fn json_section(heading: &str, body: &Value) -> String {
    format!("{heading}\n\n```json\n{}\n```", pretty(body))
}

fn compact(body: &Value) -> String {
    serde_json::to_string(body).unwrap_or_else(|_| body.to_string())
}

fn pretty(body: &Value) -> String {
    serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string())
}

/// Pull the JSON payload back out of a rendered section's fenced block.
#[must_use]
pub fn fenced_json(text: &str) -> Option<&str> {
    let start = text.find("```json\n")? + "```json\n".len();
    let end = text[start..].rfind("\n```")? + start;
    Some(&text[start..end])
}
