//! Events command - track and manage events
//!
//! Every mutation is committed to the local database first; the matching
//! sync task is queued in the outbox and delivered by the daemon or by
//! `evtrack sync`.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone, Utc};
use clap::Subcommand;
use evtrack_core::domain::{EventEdit, EventRecord, GpsCoordinate, NameCatalog, RowId};
use tracing::info;

use crate::context::{AppContext, CliContext};
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Events subcommands
#[derive(Debug, Subcommand)]
pub enum EventsCommand {
    /// Start tracking a new event
    Start {
        /// Event name (may be empty)
        name: String,
        /// Free-text notes
        #[arg(long, default_value = "")]
        notes: String,
        /// Start time: epoch milliseconds, RFC 3339 or `now`
        #[arg(long, value_parser = parse_time)]
        at: Option<i64>,
    },
    /// Stop tracking an event and queue its upload
    Finish {
        /// Local event id
        id: RowId,
        /// End time: epoch milliseconds, RFC 3339 or `now`
        #[arg(long, value_parser = parse_time)]
        at: Option<i64>,
    },
    /// Append a GPS fix to an event
    Locate {
        id: RowId,
        #[arg(allow_negative_numbers = true)]
        latitude: f64,
        #[arg(allow_negative_numbers = true)]
        longitude: f64,
        /// Fix time: epoch milliseconds, RFC 3339 or `now`
        #[arg(long, value_parser = parse_time)]
        at: Option<i64>,
    },
    /// Edit an event and queue the update
    Edit {
        id: RowId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long, value_parser = parse_time)]
        start: Option<i64>,
        #[arg(long, value_parser = parse_time)]
        end: Option<i64>,
    },
    /// Delete an event and queue the deletion
    Delete { id: RowId },
    /// List events, newest first
    List {
        /// Include deleted events
        #[arg(long)]
        all: bool,
        /// Show at most this many events
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one event in detail
    Show { id: RowId },
    /// Print the classifier features of all named events
    Features,
}

impl EventsCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let app = ctx.open().await?;

        let result = self.run(ctx, &app, format, formatter.as_ref()).await;
        app.close().await;
        result
    }

    async fn run(
        &self,
        ctx: &CliContext,
        app: &AppContext,
        format: OutputFormat,
        formatter: &dyn OutputFormatter,
    ) -> Result<()> {
        match self {
            EventsCommand::Start { name, notes, at } => {
                let start = at.unwrap_or_else(now_millis);
                let record = app.events.start_event(name, notes, start).await?;
                report_event(format, formatter, "Started", &record)?;
            }
            EventsCommand::Finish { id, at } => {
                let end = at.unwrap_or_else(now_millis);
                let record = app.events.finish_event(*id, end).await?;
                report_event(format, formatter, "Finished", &record)?;
                formatter.info("Upload queued");
            }
            EventsCommand::Locate {
                id,
                latitude,
                longitude,
                at,
            } => {
                let fix = GpsCoordinate::new(*latitude, *longitude, at.unwrap_or_else(now_millis));
                let record = app.events.record_location(*id, fix).await?;
                report_event(format, formatter, "Location recorded for", &record)?;
            }
            EventsCommand::Edit {
                id,
                name,
                notes,
                start,
                end,
            } => {
                let edit = EventEdit {
                    name: name.clone(),
                    notes: notes.clone(),
                    start_time: *start,
                    end_time: *end,
                };
                if edit.is_empty() {
                    formatter.warn("Nothing to change; pass --name, --notes, --start or --end");
                    return Ok(());
                }
                let record = app.events.edit_event(*id, &edit).await?;
                report_event(format, formatter, "Edited", &record)?;
            }
            EventsCommand::Delete { id } => {
                let record = app.events.delete_event(*id).await?;
                report_event(format, formatter, "Deleted", &record)?;
                formatter.info("Deletion queued");
            }
            EventsCommand::List { all, limit } => {
                let mut records = app.events.list_events(*all).await?;
                if let Some(limit) = limit {
                    records.truncate(*limit);
                }
                info!(count = records.len(), "Listing events");

                if format.is_json() {
                    formatter.print_json(&serde_json::to_value(&records)?);
                } else if records.is_empty() {
                    formatter.info("No events");
                } else {
                    for record in &records {
                        println!("{}", summary_line(record));
                    }
                }
            }
            EventsCommand::Show { id } => {
                let record = app
                    .events
                    .get_event(*id)
                    .await?
                    .with_context(|| format!("Event {id} not found"))?;
                if format.is_json() {
                    formatter.print_json(&serde_json::to_value(&record)?);
                } else {
                    print_details(formatter, &record);
                }
            }
            EventsCommand::Features => {
                let catalog = NameCatalog::new(ctx.config.prediction.known_names.iter());
                let features = app.events.training_features(&catalog).await?;

                if format.is_json() {
                    formatter.print_json(&serde_json::to_value(&features)?);
                } else {
                    formatter.success(&format!("{} feature rows", features.len()));
                    for row in &features {
                        let place = match (row.latitude, row.longitude) {
                            (Some(lat), Some(lon)) => format!("{lat:.5},{lon:.5}"),
                            _ => "-".to_string(),
                        };
                        formatter.info(&format!(
                            "{:02}h day {}  {:<22} {}",
                            row.hour_of_day, row.day_of_week, place, row.name
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

fn report_event(
    format: OutputFormat,
    formatter: &dyn OutputFormatter,
    verb: &str,
    record: &EventRecord,
) -> Result<()> {
    if format.is_json() {
        formatter.print_json(&serde_json::to_value(record)?);
    } else {
        let id = record
            .row_id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "?".to_string());
        formatter.success(&format!("{verb} event #{id} {}", display_name(record)));
    }
    Ok(())
}

fn print_details(formatter: &dyn OutputFormatter, record: &EventRecord) {
    formatter.success(&format!("Event {}", display_name(record)));
    formatter.field("uuid", record.uuid().as_str());
    formatter.field("notes", record.notes());
    formatter.field("start", &format_time(record.start_time()));
    if record.is_in_progress() {
        formatter.field("end", "in progress");
    } else {
        formatter.field("end", &format_time(record.end_time()));
    }
    if let Some(ms) = record.duration_ms() {
        formatter.field("duration", &format_duration(ms));
    }
    if let Some(updated) = record.updated_at() {
        formatter.field("updated", &updated.to_string());
    }
    formatter.field("gps fixes", &record.gps().len().to_string());
    formatter.field("synced", if record.is_persisted() { "yes" } else { "no" });
    if record.is_deleted() {
        formatter.field("deleted", "yes");
    }
}

fn summary_line(record: &EventRecord) -> String {
    let id = record.row_id().map(|id| id.as_i64()).unwrap_or_default();
    let duration = if record.is_in_progress() {
        "running".to_string()
    } else {
        record
            .duration_ms()
            .map(format_duration)
            .unwrap_or_else(|| "invalid".to_string())
    };
    let deleted = if record.is_deleted() { " (deleted)" } else { "" };
    format!(
        "{:>5}  {}  {:>8}  {}{}",
        id,
        format_time(record.start_time()),
        duration,
        display_name(record),
        deleted
    )
}

fn display_name(record: &EventRecord) -> String {
    if record.is_named() {
        format!("\"{}\"", record.name())
    } else {
        "(unnamed)".to_string()
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parses epoch milliseconds, an RFC 3339 timestamp, or `now`
pub fn parse_time(value: &str) -> Result<i64, String> {
    if value.eq_ignore_ascii_case("now") {
        return Ok(now_millis());
    }
    if let Ok(ms) = value.parse::<i64>() {
        return Ok(ms);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.timestamp_millis())
        .map_err(|_| format!("expected epoch milliseconds, RFC 3339 or 'now', got '{value}'"))
}

fn format_time(ms: i64) -> String {
    match Local.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => ms.to_string(),
    }
}

/// `1h 05m`, `12m` or `40s`
fn format_duration(ms: i64) -> String {
    let secs = ms / 1000;
    let (hours, minutes) = (secs / 3600, (secs % 3600) / 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_epoch_millis() {
        assert_eq!(parse_time("1577872800000"), Ok(1_577_872_800_000));
    }

    #[test]
    fn test_parse_time_rfc3339_with_offset() {
        assert_eq!(
            parse_time("2020-01-01T11:00:00+01:00"),
            Ok(1_577_872_800_000)
        );
    }

    #[test]
    fn test_parse_time_now() {
        let before = Utc::now().timestamp_millis();
        let parsed = parse_time("now").unwrap();
        assert!(parsed >= before);
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        let err = parse_time("yesterday").unwrap_err();
        assert!(err.contains("yesterday"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(40_000), "40s");
        assert_eq!(format_duration(12 * 60_000), "12m");
        assert_eq!(format_duration(65 * 60_000), "1h 05m");
    }

    #[test]
    fn test_summary_line_survives_overflowing_interval() {
        let odd = EventRecord::new("Odd", "", i64::MIN).with_end_time(1);
        assert!(summary_line(&odd).contains("invalid"));
    }

    #[test]
    fn test_summary_line_marks_running_and_deleted() {
        let running = EventRecord::new("Lunch", "", 1_000).with_row_id(RowId::new(3));
        let line = summary_line(&running);
        assert!(line.contains("running"));
        assert!(line.contains("\"Lunch\""));

        let deleted = EventRecord::new("", "", 1_000)
            .with_end_time(61_000)
            .with_deleted(true);
        let line = summary_line(&deleted);
        assert!(line.contains("1m"));
        assert!(line.contains("(unnamed) (deleted)"));
    }
}
