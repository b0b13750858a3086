use std::fmt::Write;
use std::path::Path;

use serde::Serialize;

use super::{BatchReport, Breakdown};
use crate::Result;

#[derive(Serialize)]
struct SummaryJson<'a> {
    total_in_list: usize,
    attempted: usize,
    transcribed_ok: usize,
    skipped_existing: usize,
    failed: usize,
    failure_breakdown: &'a Breakdown,
    output_dir: &'a Path,
    failures_csv: Option<&'a Path>,
    generated_at: String,
}

/// Machine-readable summary. `failures_csv` is only mentioned when there were failures.
pub fn summary_json(report: &BatchReport, failures_csv: &Path) -> Result<String> {
    let summary = SummaryJson {
        total_in_list: report.total_in_list,
        attempted: report.attempted,
        transcribed_ok: report.ok,
        skipped_existing: report.skipped,
        failed: report.failed,
        failure_breakdown: &report.breakdown,
        output_dir: &report.output_dir,
        failures_csv: (report.failed > 0).then_some(failures_csv),
        generated_at: report.generated_at.to_rfc3339(),
    };

    Ok(serde_json::to_string_pretty(&summary)?)
}

/// Human-readable summary
pub fn summary_text(report: &BatchReport, failures_csv: &Path) -> String {
    let mut out = String::new();

    out.push_str("TRANSCRIPT REPORT SUMMARY\n");
    let _ = writeln!(out, "Generated            : {}", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "Output directory     : {}", report.output_dir.display());
    let _ = writeln!(out, "Total lines in list  : {}", report.total_in_list);
    let _ = writeln!(out, "Attempted            : {}", report.attempted);
    let _ = writeln!(out, "Transcribed OK       : {}", report.ok);
    let _ = writeln!(out, "Skipped (already had): {}", report.skipped);
    let _ = writeln!(out, "Failed               : {}", report.failed);

    if !report.breakdown.is_empty() {
        out.push_str("\nFailure breakdown:\n");
        for (reason, count) in report.breakdown.entries() {
            let _ = writeln!(out, "  {reason}: {count}");
        }
        let _ = writeln!(out, "\nSee details: {}", failures_csv.display());
    }

    out
}

/// Failure listing with columns `video_id,title,url,reason`
pub fn failures_csv(report: &BatchReport) -> String {
    let mut out = String::from("video_id,title,url,reason\r\n");

    for record in &report.failures {
        let fields = [
            csv_field(&record.video_id),
            csv_field(&record.title),
            csv_field(&record.url),
            csv_field(&record.reason_label()),
        ];
        out.push_str(&fields.join(","));
        out.push_str("\r\n");
    }

    out
}

/// Quote a field when it holds a delimiter, a quote or a line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
