use chrono::{DateTime, FixedOffset};
use clap::ValueEnum;
use hangar::SyncHistoryModel;
use hangar::db;
use hangar::store::history;
use hangar::sync::CategoryStatus;
use tabled::Tabled;
use uuid::Uuid;

/// Output format for status display.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

const MAX_ERROR_CHARS: usize = 60;

/// One row of the status table.
#[derive(Debug, Clone, Tabled)]
pub(crate) struct StatusDisplay {
    #[tabled(rename = "Category")]
    pub endpoint: String,
    #[tabled(rename = "Source")]
    pub source: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Records")]
    pub records: i32,
    #[tabled(rename = "Last Sync")]
    pub last_sync_at: String,
    #[tabled(rename = "Error")]
    pub error: String,
}

/// One audit row of a single run.
#[derive(Debug, Clone, Tabled)]
pub(crate) struct RunRowDisplay {
    #[tabled(rename = "Category")]
    pub category: String,
    #[tabled(rename = "Source")]
    pub source: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Records")]
    pub records: i32,
    #[tabled(rename = "Unmatched")]
    pub unmatched: i32,
    #[tabled(rename = "Skipped")]
    pub skipped: i32,
    #[tabled(rename = "Started")]
    pub started_at: String,
    #[tabled(rename = "Error")]
    pub error: String,
}

impl From<&SyncHistoryModel> for RunRowDisplay {
    fn from(row: &SyncHistoryModel) -> Self {
        Self {
            category: row.category.clone(),
            source: row.source.clone(),
            status: row.status.to_string(),
            records: row.record_count,
            unmatched: row.unmatched_count,
            skipped: row.skipped_count,
            started_at: utc(row.started_at),
            error: row
                .error_message
                .as_deref()
                .map(truncate)
                .unwrap_or_default(),
        }
    }
}

fn utc(t: DateTime<FixedOffset>) -> String {
    t.with_timezone(&chrono::Utc)
        .format("%Y-%m-%d %H:%M:%S UTC")
        .to_string()
}

impl From<&CategoryStatus> for StatusDisplay {
    fn from(s: &CategoryStatus) -> Self {
        Self {
            endpoint: s.endpoint.clone(),
            source: s.source.clone(),
            status: s.status.to_string(),
            records: s.total_records,
            last_sync_at: s
                .last_sync_at
                .map(utc)
                .unwrap_or_else(|| "never".to_string()),
            error: s
                .error_message
                .as_deref()
                .map(truncate)
                .unwrap_or_default(),
        }
    }
}

fn truncate(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_CHARS {
        message.to_string()
    } else {
        let head: String = message.chars().take(MAX_ERROR_CHARS - 1).collect();
        format!("{head}…")
    }
}

fn render(statuses: &[CategoryStatus], format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Table => {
            let rows: Vec<StatusDisplay> = statuses.iter().map(StatusDisplay::from).collect();
            let mut table = tabled::Table::new(rows);
            table.with(tabled::settings::Style::rounded());
            Ok(table.to_string())
        }
        OutputFormat::Json => serde_json::to_string_pretty(statuses),
    }
}

fn render_run(rows: &[SyncHistoryModel], format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Table => {
            let rows: Vec<RunRowDisplay> = rows.iter().map(RunRowDisplay::from).collect();
            let mut table = tabled::Table::new(rows);
            table.with(tabled::settings::Style::rounded());
            Ok(table.to_string())
        }
        OutputFormat::Json => serde_json::to_string_pretty(rows),
    }
}

/// Show the latest outcome per category, or every row of one run when `run` is given.
pub(crate) async fn handle_status(
    format: OutputFormat,
    run: Option<Uuid>,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = db::connect(database_url).await?;

    if let Some(run_id) = run {
        let rows = history::rows_for_run(&db, run_id).await?;
        if rows.is_empty() && matches!(format, OutputFormat::Table) {
            println!("No sync history recorded for run {run_id}.");
            return Ok(());
        }
        println!("{}", render_run(&rows, format)?);
        return Ok(());
    }

    let statuses = history::latest_per_category(&db).await?;

    if statuses.is_empty() && matches!(format, OutputFormat::Table) {
        println!("No sync has been recorded yet. Run `hangar sync all` first.");
        return Ok(());
    }

    println!("{}", render(&statuses, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use hangar::entity::sync_status::SyncStatus;

    use super::*;

    fn status(endpoint: &str, error: Option<&str>) -> CategoryStatus {
        CategoryStatus {
            endpoint: endpoint.to_string(),
            source: "wiki".to_string(),
            last_sync_at: Some(DateTime::parse_from_rfc3339("2025-03-01T12:30:00+02:00").unwrap()),
            total_records: 42,
            status: if error.is_some() {
                SyncStatus::Error
            } else {
                SyncStatus::Success
            },
            error_message: error.map(str::to_string),
        }
    }

    #[test]
    fn display_row_normalizes_timestamp_to_utc() {
        let row = StatusDisplay::from(&status("vehicles", None));
        assert_eq!(row.last_sync_at, "2025-03-01 10:30:00 UTC");
        assert_eq!(row.status, "success");
        assert_eq!(row.records, 42);
        assert!(row.error.is_empty());
    }

    #[test]
    fn long_errors_are_truncated_in_the_table() {
        let long = "x".repeat(200);
        let row = StatusDisplay::from(&status("items", Some(&long)));
        assert_eq!(row.error.chars().count(), MAX_ERROR_CHARS);
        assert!(row.error.ends_with('…'));
    }

    #[test]
    fn json_output_keeps_full_error_and_lowercase_status() {
        let out = render(&[status("items", Some("HTTP 500"))], OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["endpoint"], "items");
        assert_eq!(value[0]["status"], "error");
        assert_eq!(value[0]["error_message"], "HTTP 500");
    }

    fn history_row(category: &str) -> SyncHistoryModel {
        let started = DateTime::parse_from_rfc3339("2025-03-01T12:30:00+02:00").unwrap();
        SyncHistoryModel {
            id: Uuid::new_v4(),
            run_id: Uuid::nil(),
            source: "corpus".to_string(),
            category: category.to_string(),
            status: SyncStatus::Success,
            record_count: 120,
            unmatched_count: 3,
            skipped_count: 1,
            error_message: None,
            started_at: started,
            completed_at: Some(started),
        }
    }

    #[test]
    fn run_rows_show_unmatched_and_skipped_counts() {
        let row = RunRowDisplay::from(&history_row("paints"));
        assert_eq!(row.started_at, "2025-03-01 10:30:00 UTC");
        assert_eq!(row.unmatched, 3);
        assert_eq!(row.skipped, 1);

        let table = render_run(&[history_row("paints")], OutputFormat::Table).unwrap();
        assert!(table.contains("Unmatched"));
        assert!(table.contains("paints"));

        let json = render_run(&[history_row("loaners")], OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["category"], "loaners");
        assert_eq!(value[0]["unmatched_count"], 3);
    }

    #[test]
    fn table_output_has_headers() {
        let out = render(&[status("paints", None)], OutputFormat::Table).unwrap();
        assert!(out.contains("Category"));
        assert!(out.contains("Last Sync"));
        assert!(out.contains("paints"));
    }
}
