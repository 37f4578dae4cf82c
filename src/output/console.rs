//! Console rendering of the run summary

use crate::output::RunSummary;

/// Formats the run summary as a fixed-width table
pub fn format_summary_table(summary: &RunSummary) -> String {
    let width = summary
        .sources
        .iter()
        .map(|report| report.source.len())
        .max()
        .unwrap_or(0)
        .max("SOURCE".len());

    let mut out = String::new();
    out.push_str(&format!(
        "{:<width$}  {:<16}  {:>7}  {:>7}  {:>5}  DETAIL\n",
        "SOURCE",
        "STATUS",
        "RECORDS",
        "SKIPPED",
        "PAGES",
        width = width
    ));

    for report in &summary.sources {
        let mut detail = report.error_detail.clone().unwrap_or_default();
        if report.destination_inconsistent {
            detail = format!("[inconsistent] {}", detail);
        }
        out.push_str(
            format!(
                "{:<width$}  {:<16}  {:>7}  {:>7}  {:>5}  {}",
                report.source,
                report.outcome_status.as_str(),
                report.records_written,
                report.skipped_row_count,
                report.pages_fetched,
                detail,
                width = width
            )
            .trim_end(),
        );
        out.push('\n');
    }

    let counts = summary
        .status_counts()
        .into_iter()
        .map(|(status, count)| format!("{}={}", status, count))
        .collect::<Vec<_>>()
        .join(" ");

    out.push_str(&format!(
        "\n{} sources, {} records written in {}s ({})\n",
        summary.sources.len(),
        summary.total_records(),
        (summary.finished_at - summary.started_at).num_seconds(),
        counts
    ));

    out
}

/// Prints the run summary to stdout
pub fn print_summary(summary: &RunSummary) {
    print!("{}", format_summary_table(summary));
}
