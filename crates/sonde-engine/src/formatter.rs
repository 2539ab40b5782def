use sonde_common::verdict::{ProbeVerdict, RunReport, Summary};

/// One line per verdict: `PASS [/orders] open-menu: resolved via ...`.
pub fn format_verdict(verdict: &ProbeVerdict) -> String {
    let mut out = format!("{}", verdict.outcome);
    if let Some(page) = &verdict.page {
        out.push_str(&format!(" [{}]", page));
    }
    out.push_str(&format!(" {}", verdict.capability));
    if let Some(phase) = verdict.phase {
        out.push_str(&format!(" ({})", phase));
    }
    out.push_str(&format!(": {}", verdict.detail));
    out
}

pub fn format_tally(summary: &Summary) -> String {
    format!(
        "Passed: {}  Failed: {}  Skipped: {}  Total: {}",
        summary.passed,
        summary.failed,
        summary.skipped,
        summary.total()
    )
}

/// Verdict lines followed by the tally.
pub fn format_report(report: &RunReport) -> String {
    let mut lines: Vec<String> = report.verdicts.iter().map(format_verdict).collect();
    lines.push(String::new());
    lines.push(format_tally(&report.summary));
    lines.join("\n")
}
