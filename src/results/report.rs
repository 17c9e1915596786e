//! Report generation for test runs
//!
//! Renders a [`StoredRun`] as a plain-text summary, Markdown or a standalone
//! HTML page.

use chrono::{DateTime, Local};

use crate::models::CaseResult;
use crate::results::storage::StoredRun;
use crate::utils::format_hms;

const RULE_WIDTH: usize = 72;

/// Report output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Markdown,
    Html,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            "html" | "htm" => Some(ReportFormat::Html),
            _ => None,
        }
    }
}

/// Report generator
pub struct ReportGenerator;

impl ReportGenerator {
    pub fn render(run: &StoredRun, format: ReportFormat) -> String {
        match format {
            ReportFormat::Text => Self::text(run),
            ReportFormat::Markdown => Self::markdown(run),
            ReportFormat::Html => Self::html(run),
        }
    }

    /// Plain-text summary table
    pub fn text(run: &StoredRun) -> String {
        let mut output = String::new();

        output.push_str(&format!("{}\n", "=".repeat(RULE_WIDTH)));
        output.push_str(&format!("Total: {}\n", run.summary.total));
        output.push_str(&format!(
            "Started: {}    Finished: {}    Elapsed: {}\n",
            format_datetime(&run.started_at),
            format_datetime(&run.finished_at),
            format_hms(run.elapsed())
        ));
        output.push_str(&format!("{}\n", "-".repeat(RULE_WIDTH)));
        output.push_str(&format!("{:<14}{:<10}{}\n", "Result", "Count", "Percent (%)"));
        for (result, count, percent) in run.summary.rows() {
            output.push_str(&format!("{:<14}{:<10}{:.2}\n", result.label(), count, percent));
        }
        output.push_str(&format!("{}\n", "=".repeat(RULE_WIDTH)));

        output
    }

    pub fn markdown(run: &StoredRun) -> String {
        let mut output = String::new();

        output.push_str(&format!("# {} Test Report\n\n", run.project));
        output.push_str("## Summary\n\n");
        output.push_str("| Result | Count | Percent (%) |\n");
        output.push_str("|--------|-------|-------------|\n");
        for (result, count, percent) in run.summary.rows() {
            output.push_str(&format!("| {} | {} | {:.2} |\n", result.label(), count, percent));
        }

        output.push_str("\n## Cases\n\n");
        output.push_str("| Module | Title | Priority | Result | Attempts |\n");
        output.push_str("|--------|-------|----------|--------|----------|\n");
        for case in &run.cases {
            output.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                case.module,
                case.title,
                case.priority,
                case.record.result.label(),
                case.record.attempts
            ));
        }

        output
    }

    /// Standalone HTML page with an overview and per-case detail rows
    pub fn html(run: &StoredRun) -> String {
        let project = escape_html(&run.project);
        let mut output = String::new();

        output.push_str(&format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{project} Test Report</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 40px; }}
        table, caption, tr, th, td {{ border: 2px solid gray; border-collapse: collapse; }}
        .pass {{ background-color: green; }}
        .fail {{ background-color: red; cursor: pointer; text-decoration: underline; }}
        .block {{ background-color: yellow; cursor: pointer; text-decoration: underline; }}
        .timeout {{ background-color: lightgray; cursor: pointer; text-decoration: underline; }}
        .detail {{ display: none; }}
        #detail {{ position: fixed; left: 0; top: 0; width: 100%; height: 100%; background-color: rgba(0,0,0,0.5); display: none; }}
        #detail > div {{ width: 80%; max-height: 80%; margin: 5% auto; overflow: auto; background-color: white; }}
    </style>
</head>
<body>
<h1 style="text-align: center">{project} Test Report</h1>
<table style="width: 50%; margin: auto; text-align: center">
    <caption style="background-color: lightgray">
        <div style="font-size: 1.5rem; font-weight: bold">Overview</div>
        <div style="text-align: left">Total: {total}</div>
        <div style="text-align: left">Started: {started} &nbsp;&nbsp; Finished: {finished} &nbsp;&nbsp; Elapsed: {elapsed}</div>
    </caption>
    <tr><th style="width: 40%">Result</th><th style="width: 30%">Count</th><th style="width: 30%">Percent (%)</th></tr>
"#,
            total = run.summary.total,
            started = format_datetime(&run.started_at),
            finished = format_datetime(&run.finished_at),
            elapsed = format_hms(run.elapsed()),
        ));

        for (result, count, percent) in run.summary.rows() {
            output.push_str(&format!(
                "    <tr><td>{}</td><td>{}</td><td>{:.2}</td></tr>\n",
                result.label(),
                count,
                percent
            ));
        }
        output.push_str("</table>\n<br>\n");

        output.push_str(
            r#"<table style="width: 100%; text-align: center">
    <caption style="background-color: lightgray; font-size: 1.5rem; font-weight: bold">Details</caption>
    <tr>
        <th style="width: 20%">Module</th>
        <th style="width: 45%">Title</th>
        <th style="width: 5%">Priority</th>
        <th style="width: 10%">Start</th>
        <th style="width: 10%">Stop</th>
        <th style="width: 10%">Result</th>
        <th class="detail">Detail</th>
    </tr>
"#,
        );

        for case in &run.cases {
            let record = &case.record;
            let (start, stop) = match record.result {
                CaseResult::NotExecuted => ("--".to_string(), "--".to_string()),
                _ => (format_time(&record.start_time), format_time(&record.stop_time)),
            };
            let cell = match result_class(record.result) {
                Some(class) if record.result.is_adverse() => format!(
                    r#"<td class="{class}" onclick="openDetail(this)">{}</td>"#,
                    record.result.label()
                ),
                Some(class) => format!(r#"<td class="{class}">{}</td>"#, record.result.label()),
                None => format!("<td>{}</td>", record.result.label()),
            };

            output.push_str(&format!(
                r#"    <tr>
        <td style="text-align: left">{}</td>
        <td style="text-align: left">{}</td>
        <td>{}</td>
        <td>{}</td>
        <td>{}</td>
        {}
        <td class="detail">{}</td>
    </tr>
"#,
                escape_html(&case.module),
                escape_html(&case.title),
                case.priority,
                start,
                stop,
                cell,
                escape_html(&record.detail)
            ));
        }

        output.push_str(
            r#"</table>
<div id="detail" onclick="closeDetail()">
    <div onclick="event.cancelBubble = true">
        <pre style="margin: 1rem; color: red; font-weight: bold" id="detail-content"></pre>
        <div style="margin-bottom: 1rem; text-align: center"><button onclick="closeDetail()">Close</button></div>
    </div>
</div>
<script>
    function openDetail(obj) {
        document.getElementById('detail-content').innerHTML = obj.nextElementSibling.innerHTML;
        document.getElementById('detail').style.display = 'inline';
    }

    function closeDetail() {
        document.getElementById('detail').style.display = 'none';
    }
</script>
</body>
</html>
"#,
        );

        output
    }
}

fn result_class(result: CaseResult) -> Option<&'static str> {
    match result {
        CaseResult::Pass => Some("pass"),
        CaseResult::Fail => Some("fail"),
        CaseResult::Block => Some("block"),
        CaseResult::Timeout => Some("timeout"),
        CaseResult::NotExecuted | CaseResult::Executing => None,
    }
}

fn format_datetime(dt: &Option<DateTime<Local>>) -> String {
    dt.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "--".to_string())
}

fn format_time(dt: &Option<DateTime<Local>>) -> String {
    dt.map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--".to_string())
}

fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
