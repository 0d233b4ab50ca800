//! Plain-text rendering of runs, trends and clean reports.

use std::fmt::Write;

use qualitywatch_core::{CleanReport, MetricResult, RecordValue, RunReport, TrendPoint};

fn value_text(value: &RecordValue) -> String {
    if value.is_unavailable() {
        return "?".to_string();
    }
    match value {
        RecordValue::Number(n) => format!("{n}"),
        RecordValue::Text(text) => text.clone(),
    }
}

fn push_row(out: &mut String, result: &MetricResult, id_width: usize) {
    let _ = writeln!(
        out,
        "{:<5} {:<id_width$}  {:>10}  since {}",
        result.status.symbol(),
        result.id,
        value_text(&result.value),
        result.since.format("%Y-%m-%d %H:%M"),
    );
}

/// Render a run as one line per metric followed by the meta-metrics.
pub fn render_run(report: &RunReport) -> String {
    let id_width = report
        .metrics
        .iter()
        .chain(report.meta.iter())
        .map(|r| r.id.len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    let _ = writeln!(out, "Run at {}", report.date.to_rfc3339());
    for result in &report.metrics {
        push_row(&mut out, result, id_width);
    }
    if !report.meta.is_empty() {
        out.push('\n');
        for result in &report.meta {
            push_row(&mut out, result, id_width);
        }
    }
    out
}

/// Render a metric's trend, oldest first.
pub fn render_trend(id: &str, points: &[TrendPoint]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{id}: {} points", points.len());
    for point in points {
        let _ = writeln!(out, "{}  {}", point.date.to_rfc3339(), value_text(&point.value));
    }
    out
}

/// Render the outcome of a clean pass.
pub fn render_clean(report: &CleanReport) -> String {
    format!(
        "{} lines before, {} duplicates removed, {} compacted, {} lines after\n",
        report.lines_before, report.duplicates_removed, report.compacted, report.lines_after
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use qualitywatch_core::{BucketCounts, Status};

    fn result(id: &str, value: RecordValue, status: Status) -> MetricResult {
        MetricResult {
            id: id.to_string(),
            name: id.to_string(),
            value,
            status,
            since: Utc.with_ymd_and_hms(2024, 2, 1, 8, 30, 0).unwrap(),
            norm: String::new(),
            url: None,
        }
    }

    #[test]
    fn run_lists_metrics_then_meta_metrics() {
        let report = RunReport {
            date: Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap(),
            metrics: vec![
                result("violations", RecordValue::Number(3.0), Status::Red),
                result("spirit", RecordValue::Text(":-)".into()), Status::Perfect),
                result("security", RecordValue::unavailable(), Status::MissingSource),
            ],
            meta: vec![result("GreenMetaMetric", RecordValue::Number(33.0), Status::Red)],
            counts: BucketCounts::default(),
        };

        let text = render_run(&report);
        let lines: Vec<_> = text.lines().collect();

        assert!(lines[0].starts_with("Run at 2024-02-02"));
        assert!(lines[1].starts_with("CRIT  violations"));
        assert!(lines[2].contains(":-)"));
        assert!(lines[3].starts_with("NOSRC security"));
        assert!(lines[3].contains("?"));
        assert_eq!(lines[4], "");
        assert!(lines[5].contains("GreenMetaMetric"));
        assert!(lines[1].ends_with("since 2024-02-01 08:30"));
    }

    #[test]
    fn trend_lists_points() {
        let points = vec![TrendPoint {
            date: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            value: RecordValue::Number(4.0),
        }];
        let text = render_trend("violations", &points);
        assert!(text.starts_with("violations: 1 points"));
        assert!(text.contains("  4"));
    }

    #[test]
    fn clean_summary() {
        let report = CleanReport {
            lines_before: 10,
            duplicates_removed: 3,
            compacted: 2,
            lines_after: 7,
        };
        assert_eq!(
            render_clean(&report),
            "10 lines before, 3 duplicates removed, 2 compacted, 7 lines after\n"
        );
    }
}
