use std::fmt::Write;

use serde::Serialize;

use crate::aggregate::{self, RecordFilter};
use crate::models::{MetricRecord, PeriodSummary, Store, Thresholds};
use crate::period::DateRange;
use crate::quadrant::{self, Classification, Quadrant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Markdown,
    Json,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuadrantReport {
    pub period: Option<DateRange>,
    pub thresholds: Thresholds,
    /// False when no record matched the period at all.
    pub has_records: bool,
    pub summary: PeriodSummary,
    pub classification: Classification,
}

impl QuadrantReport {
    pub fn build(
        records: &[MetricRecord],
        stores: &[Store],
        filter: &RecordFilter,
        thresholds: Thresholds,
    ) -> Self {
        let points = aggregate::aggregate(records, stores, filter);
        let summary = quadrant::period_summary(&points);
        let classification = quadrant::classify(&points, &thresholds);

        Self {
            period: filter.date_range,
            thresholds,
            has_records: records.iter().any(|record| filter.matches(record)),
            summary,
            classification,
        }
    }
}

pub fn render(
    report: &QuadrantReport,
    format: ReportFormat,
    top_stores: usize,
) -> anyhow::Result<String> {
    match format {
        ReportFormat::Markdown => Ok(render_markdown(report, top_stores)),
        ReportFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}

pub fn render_markdown(report: &QuadrantReport, top_stores: usize) -> String {
    let mut output = String::new();
    let period_label = match report.period {
        Some(range) => format!("{} to {}", range.start, range.end),
        None => "all time".to_string(),
    };

    let _ = writeln!(output, "# Store Quadrant Report");
    let _ = writeln!(output, "Period: {}", period_label);
    let _ = writeln!(
        output,
        "Targets: revenue {:.1}%, compliance {:.1}%",
        report.thresholds.target_revenue, report.thresholds.target_compliance
    );
    let _ = writeln!(output);

    if !report.has_records {
        let _ = writeln!(output, "No records found for this period.");
        return output;
    }

    let _ = writeln!(output, "## Period Summary");
    let _ = writeln!(
        output,
        "- Average revenue: {:.1}%",
        report.summary.avg_revenue
    );
    let _ = writeln!(
        output,
        "- Average compliance: {:.1}%",
        report.summary.avg_compliance
    );
    let _ = writeln!(
        output,
        "- {} records across {} stores",
        report.summary.record_count, report.summary.store_count
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Distribution");
    for (quadrant, count) in &report.classification.tally {
        let _ = writeln!(output, "- {}: {}", quadrant, count);
    }

    for quadrant in Quadrant::ALL {
        let mut members: Vec<_> = report
            .classification
            .classified
            .iter()
            .filter(|entry| entry.quadrant == quadrant)
            .collect();
        if members.is_empty() {
            continue;
        }
        members.sort_by(|a, b| {
            b.point
                .avg_revenue
                .partial_cmp(&a.point.avg_revenue)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let _ = writeln!(output);
        let _ = writeln!(output, "## {}", quadrant);
        for entry in members.iter().take(top_stores) {
            let _ = writeln!(
                output,
                "- {}: revenue {:.1}%, compliance {:.1}% across {} records",
                entry.point.store_name,
                entry.point.avg_revenue,
                entry.point.avg_compliance,
                entry.point.count
            );
        }
        if members.len() > top_stores {
            let _ = writeln!(output, "- ... and {} more", members.len() - top_stores);
        }
    }

    output
}
