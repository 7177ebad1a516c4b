//! Session export.
//!
//! Writes the recorded action timestamps of a session to disk on request,
//! as pretty JSON, JSON Lines or CSV.

use crate::core::rates::RateReport;
use crate::core::recorder::HistorySnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// The name of this producer.
pub const PRODUCER_NAME: &str = "apm-tracker";

/// Timestamp layout used in CSV rows.
const CSV_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Jsonl,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Jsonl => "jsonl",
            ExportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "jsonl" => Ok(ExportFormat::Jsonl),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

/// One recorded action in an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedAction {
    pub timestamp: DateTime<Utc>,
    pub effective: bool,
}

/// Everything written for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExport {
    pub session_id: Uuid,
    pub producer: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub exported_at: DateTime<Utc>,
    pub report: RateReport,
    /// Raw and effective actions merged in time order
    pub actions: Vec<ExportedAction>,
}

impl SessionExport {
    pub fn new(snapshot: &HistorySnapshot, report: RateReport, exported_at: DateTime<Utc>) -> Self {
        let mut actions: Vec<ExportedAction> = snapshot
            .actions
            .iter()
            .map(|&timestamp| ExportedAction {
                timestamp,
                effective: false,
            })
            .chain(
                snapshot
                    .effective_actions
                    .iter()
                    .map(|&timestamp| ExportedAction {
                        timestamp,
                        effective: true,
                    }),
            )
            .collect();
        // Stable: a raw action stays ahead of an effective one at the same instant
        actions.sort_by_key(|a| a.timestamp);

        Self {
            session_id: Uuid::new_v4(),
            producer: PRODUCER_NAME.to_string(),
            version: crate::VERSION.to_string(),
            started_at: snapshot.started_at,
            exported_at,
            report,
            actions,
        }
    }

    /// Default file name: `apm_data_<UTC timestamp>.<ext>`.
    pub fn file_name(&self, format: ExportFormat) -> String {
        format!(
            "apm_data_{}.{}",
            self.exported_at.format("%Y%m%d_%H%M%S"),
            format.extension()
        )
    }
}

#[derive(Serialize)]
struct CsvRow {
    timestamp: String,
    action_type: &'static str,
    effective: bool,
}

/// Write `export` into `dir` under its default file name.
pub fn write_export(
    dir: &Path,
    format: ExportFormat,
    export: &SessionExport,
) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export.file_name(format));
    write_to(&path, format, export)?;
    info!(?path, actions = export.actions.len(), "session exported");
    Ok(path)
}

/// Write `export` to `path` in the given format.
pub fn write_to(path: &Path, format: ExportFormat, export: &SessionExport) -> Result<(), ExportError> {
    let file = File::create(path)?;

    match format {
        ExportFormat::Json => {
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, export)?;
            writer.flush()?;
        }
        ExportFormat::Jsonl => {
            let mut writer = BufWriter::new(file);
            for action in &export.actions {
                serde_json::to_writer(&mut writer, action)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(file);
            for action in &export.actions {
                writer.serialize(CsvRow {
                    timestamp: action.timestamp.format(CSV_TIME_FORMAT).to_string(),
                    action_type: if action.effective {
                        "effective"
                    } else {
                        "regular"
                    },
                    effective: action.effective,
                })?;
            }
            writer.flush()?;
        }
    }

    Ok(())
}

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("unknown export format: {0} (expected json, jsonl or csv)")]
    UnknownFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at_ms(offset_ms: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::milliseconds(offset_ms)
    }

    fn sample_export() -> SessionExport {
        let snapshot = HistorySnapshot {
            started_at: at_ms(0),
            actions: vec![at_ms(0), at_ms(100), at_ms(900)],
            effective_actions: vec![at_ms(0), at_ms(900)],
        };
        SessionExport::new(&snapshot, RateReport::default(), at_ms(60_000))
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("jsonl".parse::<ExportFormat>().unwrap(), ExportFormat::Jsonl);
        assert!(matches!(
            "xml".parse::<ExportFormat>(),
            Err(ExportError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_actions_are_merged_in_time_order() {
        let export = sample_export();
        let flags: Vec<bool> = export.actions.iter().map(|a| a.effective).collect();
        assert_eq!(flags, vec![false, true, false, false, true]);
        assert_eq!(export.file_name(ExportFormat::Csv), "apm_data_20231114_221420.csv");
    }

    #[test]
    fn test_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let export = sample_export();
        let path = write_export(dir.path(), ExportFormat::Csv, &export).unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "timestamp,action_type,effective");
        assert_eq!(lines[1], "2023-11-14T22:13:20.000Z,regular,false");
        assert_eq!(lines[2], "2023-11-14T22:13:20.000Z,effective,true");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_json_export_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let export = sample_export();
        let path = write_export(dir.path(), ExportFormat::Json, &export).unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        let loaded: SessionExport = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.session_id, export.session_id);
        assert_eq!(loaded.actions, export.actions);
    }

    #[test]
    fn test_jsonl_has_one_line_per_action() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        write_to(&path, ExportFormat::Jsonl, &sample_export()).unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 5);
    }
}
