//! Audit reporter
//!
//! Renders one policy report into the configured output formats. The format
//! list deduplicates by first occurrence (`["human","json","human"]` renders
//! `human` then `json`); each rendered format logs one entry at the highest
//! violation severity, and a failing audit writes the human rendering to
//! stderr.

use serde_json::json;

use crate::config::ReportConfig;
use crate::diagnostics::Severity;

use super::{PolicyReport, PolicyViolation};

/// One rendered report body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub format: String,
    pub body: String,
}

/// Reporter output: the rendered bodies plus the audit verdict.
#[derive(Debug, Clone)]
pub struct AuditReportOutput {
    pub rendered: Vec<RenderedReport>,

    /// True when any violation reached the configured failure severity.
    pub failed: bool,
}

/// Multi-format audit reporter.
#[derive(Debug, Default)]
pub struct AuditReporter;

impl AuditReporter {
    pub fn new() -> Self {
        Self
    }

    /// Render the report in every requested format.
    pub fn report(&self, report: &PolicyReport, config: &ReportConfig) -> AuditReportOutput {
        let formats = dedupe_formats(&config.formats);
        let fail_on = config.fail_on.unwrap_or(Severity::Error);
        let failed = report
            .violations
            .iter()
            .any(|violation| violation.severity >= fail_on);
        let highest = report.summary.highest_severity();

        let mut rendered = Vec::with_capacity(formats.len());
        for format in formats {
            let body = match format.as_str() {
                "markdown" => render_markdown(report),
                "html" => render_html(report),
                "json" => render_json(report),
                _ => render_human(report),
            };

            // One log entry per rendered format at the highest severity.
            match highest {
                Some(Severity::Error) => {
                    tracing::error!(format = %format, violations = report.summary.violation_count, "audit report rendered")
                }
                Some(Severity::Warn) => {
                    tracing::warn!(format = %format, violations = report.summary.violation_count, "audit report rendered")
                }
                _ => {
                    tracing::info!(format = %format, violations = report.summary.violation_count, "audit report rendered")
                }
            }

            if failed && format == "human" {
                eprintln!("{body}");
            }

            rendered.push(RenderedReport { format, body });
        }

        AuditReportOutput { rendered, failed }
    }
}

/// First-occurrence dedup; empty input defaults to `human`.
fn dedupe_formats(formats: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for format in formats {
        if seen.insert(format.clone()) {
            out.push(format.clone());
        }
    }
    if out.is_empty() {
        out.push("human".to_string());
    }
    out
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warn => "warning",
        Severity::Info => "info",
    }
}

fn render_human(report: &PolicyReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Audit: {} polic{} evaluated over {} token(s), {} violation(s)\n",
        report.summary.policy_count,
        if report.summary.policy_count == 1 { "y" } else { "ies" },
        report.summary.token_count,
        report.summary.violation_count
    ));
    for violation in &report.violations {
        out.push_str(&format!(
            "  [{}] {} {} - {}\n",
            severity_label(violation.severity),
            violation.policy_name,
            violation.pointer,
            violation.message
        ));
    }
    out
}

fn render_markdown(report: &PolicyReport) -> String {
    let mut out = String::from("# Token Audit\n\n");
    out.push_str(&format!(
        "**{}** violation(s) across **{}** token(s).\n\n",
        report.summary.violation_count, report.summary.token_count
    ));
    if !report.violations.is_empty() {
        out.push_str("| Severity | Policy | Pointer | Message |\n");
        out.push_str("| --- | --- | --- | --- |\n");
        for violation in &report.violations {
            out.push_str(&format!(
                "| {} | {} | `{}` | {} |\n",
                severity_label(violation.severity),
                violation.policy_name,
                violation.pointer,
                violation.message.replace('|', "\\|")
            ));
        }
    }
    out
}

fn render_html(report: &PolicyReport) -> String {
    let mut rows = String::new();
    for violation in &report.violations {
        rows.push_str(&format!(
            "      <tr><td>{}</td><td>{}</td><td><code>{}</code></td><td>{}</td></tr>\n",
            severity_label(violation.severity),
            escape(&violation.policy_name),
            escape(&violation.pointer),
            escape(&violation.message)
        ));
    }
    format!(
        r#"<!doctype html>
<html>
  <head><meta charset="utf-8" /><title>Token Audit</title></head>
  <body>
    <h1>Token Audit</h1>
    <p>{} violation(s) across {} token(s).</p>
    <table>
      <tr><th>Severity</th><th>Policy</th><th>Pointer</th><th>Message</th></tr>
{rows}    </table>
  </body>
</html>
"#,
        report.summary.violation_count, report.summary.token_count
    )
}

fn render_json(report: &PolicyReport) -> String {
    let payload = json!({
        "summary": report.summary,
        "violations": report.violations.iter().map(violation_json).collect::<Vec<_>>(),
    });
    let mut body = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| "{}".to_string());
    body.push('\n');
    body
}

fn violation_json(violation: &PolicyViolation) -> serde_json::Value {
    json!({
        "policy": violation.policy_name,
        "pointer": violation.pointer,
        "severity": severity_label(violation.severity),
        "message": violation.message,
        "details": violation.details,
    })
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
