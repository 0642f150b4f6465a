//! Tracking data ingestion
//!
//! Reads tracking exports (a JSON array, or one JSON object per line) into
//! validated [`TrackingRecord`]s ready for [`Database::replace_tracking`].
//!
//! [`Database::replace_tracking`]: crate::db::Database::replace_tracking

use crate::error::{Error, Result};
use crate::types::TrackingRecord;
use std::path::Path;

/// Read and validate a tracking file.
pub fn load_tracking_file(path: &Path) -> Result<Vec<TrackingRecord>> {
    let content = std::fs::read_to_string(path)?;
    let records = parse_tracking(&content)?;
    tracing::info!(
        path = %path.display(),
        records = records.len(),
        "Loaded tracking file"
    );
    Ok(records)
}

/// Parse tracking records from a JSON array or JSONL text.
///
/// Every record must pass validation and all records must share one
/// `match_id`. The first failure is reported with its zero-based index.
pub fn parse_tracking(content: &str) -> Result<Vec<TrackingRecord>> {
    let trimmed = content.trim_start();

    let values: Vec<serde_json::Value> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        trimmed
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(index, line)| {
                serde_json::from_str(line).map_err(|e| Error::InvalidRecord {
                    index,
                    message: e.to_string(),
                })
            })
            .collect::<Result<_>>()?
    };

    let mut records: Vec<TrackingRecord> = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        let record: TrackingRecord =
            serde_json::from_value(value).map_err(|e| Error::InvalidRecord {
                index,
                message: e.to_string(),
            })?;
        validate_record(&record).map_err(|message| Error::InvalidRecord { index, message })?;

        if let Some(first) = records.first() {
            if first.match_id != record.match_id {
                return Err(Error::InvalidRecord {
                    index,
                    message: format!(
                        "match_id '{}' differs from '{}'; load one match per file",
                        record.match_id, first.match_id
                    ),
                });
            }
        }
        records.push(record);
    }

    Ok(records)
}

fn validate_record(record: &TrackingRecord) -> std::result::Result<(), String> {
    if record.match_id.trim().is_empty() {
        return Err("match_id must not be empty".to_string());
    }
    if record.frame < 0 {
        return Err(format!("frame must not be negative, got {}", record.frame));
    }
    for (name, value) in [("x", record.x), ("y", record.y), ("z", record.z)] {
        if !value.is_finite() {
            return Err(format!("{name} must be a finite number"));
        }
    }
    Ok(())
}
