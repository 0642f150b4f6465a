//! Event detection and clustering
//!
//! Raw tracking frames become events in two steps:
//!
//! ```text
//! tracking rows ──► detector ──► FrameDetection[] ──► clustering ──► ClusteredEvent[]
//! ```
//!
//! [`process_match`] runs both steps for one stored match and persists the
//! result in the `events` table.

pub mod clustering;
pub mod detectors;

pub use clustering::cluster_frames_into_events;
pub use detectors::detect_2v1_in_final_third;

use crate::config::DetectorConfig;
use crate::db::Database;
use crate::error::Result;
use crate::types::{ClusteredEvent, StoredEvent};
use serde_json::json;

/// Event type recorded for 2v1 final-third events.
pub const EVENT_TYPE_2V1_FINAL_THIRD: &str = "2v1_final_third";

/// Detection source recorded in event metadata.
const DETECTION_SOURCE: &str = "rule_based_v1";

/// Counts from one [`process_match`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    /// Tracking rows loaded
    pub records: usize,
    /// Frame-level detections
    pub detections: usize,
    /// Events stored
    pub events: usize,
}

/// Detect 2v1 situations for one match, cluster them and store the events.
///
/// Previously stored events of this type for the match are replaced, unless the
/// match has no tracking data, in which case nothing is touched.
pub fn process_match(
    db: &Database,
    match_id: &str,
    attacking_team_id: &str,
    params: &DetectorConfig,
    max_gap: u64,
) -> Result<ProcessSummary> {
    let records = db.tracking_for_match(match_id)?;
    if records.is_empty() {
        tracing::warn!(match_id, "No tracking data found, skipping event processing");
        return Ok(ProcessSummary::default());
    }

    let detections = detect_2v1_in_final_third(&records, attacking_team_id, params);
    let clustered = cluster_frames_into_events(&detections, max_gap);
    let events: Vec<StoredEvent> = clustered
        .iter()
        .map(|event| to_stored_event(event, attacking_team_id))
        .collect();

    let stored = db.replace_events(match_id, EVENT_TYPE_2V1_FINAL_THIRD, &events)?;

    tracing::info!(
        match_id,
        attacking_team_id,
        records = records.len(),
        detections = detections.len(),
        events = stored,
        "Processed match events"
    );

    Ok(ProcessSummary {
        records: records.len(),
        detections: detections.len(),
        events: stored,
    })
}

fn to_stored_event(event: &ClusteredEvent, team_id: &str) -> StoredEvent {
    StoredEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        match_id: event.match_id.clone(),
        event_type: EVENT_TYPE_2V1_FINAL_THIRD.to_string(),
        start_time: event.start_time,
        end_time: event.end_time,
        start_frame: event.start_frame,
        end_frame: event.end_frame,
        team_id: Some(team_id.to_string()),
        // The rule-based detector does not report player ids.
        players_involved: Vec::new(),
        metadata_json: json!({
            "detection_source": DETECTION_SOURCE,
            "frame_count": event.frame_count,
        }),
    }
}
