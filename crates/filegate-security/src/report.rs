//! Batch reports and human/JSON formatting of screening results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{IssueKind, ScreeningResult, Severity, ThreatLevel};

/// Aggregate over a batch of screening results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningReport {
    pub generated_at: DateTime<Utc>,
    pub total_files: usize,
    pub passed: usize,
    pub failed: usize,
    /// Every level is present, zero or not.
    pub by_threat_level: BTreeMap<ThreatLevel, usize>,
    pub by_issue_kind: BTreeMap<IssueKind, usize>,
    pub results: Vec<ScreeningResult>,
}

pub fn generate_report(results: &[ScreeningResult]) -> ScreeningReport {
    let mut by_threat_level: BTreeMap<ThreatLevel, usize> =
        ThreatLevel::ALL.iter().map(|l| (*l, 0)).collect();
    let mut by_issue_kind = BTreeMap::new();
    for r in results {
        *by_threat_level.entry(r.threat_level).or_insert(0) += 1;
        for issue in &r.issues {
            *by_issue_kind.entry(issue.kind).or_insert(0) += 1;
        }
    }
    let passed = results.iter().filter(|r| r.passed).count();
    ScreeningReport {
        generated_at: Utc::now(),
        total_files: results.len(),
        passed,
        failed: results.len() - passed,
        by_threat_level,
        by_issue_kind,
        results: results.to_vec(),
    }
}

fn threat_icon(level: ThreatLevel) -> &'static str {
    match level {
        ThreatLevel::None => "🟢",
        ThreatLevel::Low => "🔵",
        ThreatLevel::Medium => "🟡",
        ThreatLevel::High => "🔴",
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "Info",
        Severity::Warning => "Warning",
        Severity::Error => "Error",
    }
}

/// Multi-line, human-readable verdict for one file.
pub fn format_screening_result(result: &ScreeningResult) -> String {
    format_screening_result_impl(result, false)
}

/// One line per file; issues summarized by kind.
pub fn format_screening_result_compact(result: &ScreeningResult) -> String {
    format_screening_result_impl(result, true)
}

fn format_screening_result_impl(result: &ScreeningResult, compact: bool) -> String {
    let verdict = if result.passed { "✅" } else { "⛔" };
    let header = format!(
        "{} {} {} [{}] detected {}",
        verdict,
        threat_icon(result.threat_level),
        result.file_path.display(),
        result.threat_level,
        result.detected_type
    );
    if result.issues.is_empty() {
        return header;
    }

    if compact {
        let mut kinds: BTreeMap<IssueKind, usize> = BTreeMap::new();
        for issue in &result.issues {
            *kinds.entry(issue.kind).or_insert(0) += 1;
        }
        let summary: Vec<String> = kinds
            .iter()
            .map(|(kind, count)| format!("{}×{}", count, kind))
            .collect();
        return format!("{} ({})", header, summary.join(", "));
    }

    let mut output = format!("{}\n", header);
    let last = result.issues.len() - 1;
    for (idx, issue) in result.issues.iter().enumerate() {
        let branch = if idx == last { "└─" } else { "├─" };
        output.push_str(&format!(
            "     {} [{}] {}: {}\n",
            branch,
            severity_label(issue.severity),
            issue.kind,
            issue.message
        ));
    }
    output.trim_end().to_string()
}

/// Machine-readable form of one result.
pub fn format_screening_result_json(result: &ScreeningResult) -> String {
    serde_json::to_string(result).unwrap_or_else(|_| "{}".to_string())
}

/// Summary block for a whole batch.
pub fn format_report(report: &ScreeningReport) -> String {
    let mut output = format!(
        "📋 Screened {} file(s): {} passed, {} failed\n",
        report.total_files, report.passed, report.failed
    );
    for (level, count) in &report.by_threat_level {
        output.push_str(&format!("  {} {:<6} {}\n", threat_icon(*level), level, count));
    }
    if !report.by_issue_kind.is_empty() {
        output.push_str("\nIssues:\n");
        for (kind, count) in &report.by_issue_kind {
            output.push_str(&format!("  {}× {}\n", count, kind));
        }
    }
    output.push_str(&format!("\nGenerated {}", report.generated_at.to_rfc3339()));
    output
}
