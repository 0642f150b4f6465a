//! Rule-based frame detectors over raw tracking records.

use crate::config::DetectorConfig;
use crate::types::{FrameDetection, TrackingRecord};
use serde_json::json;
use std::collections::BTreeMap;

/// Detect frames with a 2v1 situation around the ball in the final third.
///
/// A frame qualifies when:
/// - the ball is at `x >= 2/3 * pitch_length` (attack assumed towards +x)
/// - at least two attackers are within `local_radius` of the ball
/// - exactly one defender is within `local_radius` of the ball
///
/// Defenders are non-ball records with a team other than `attacking_team_id`;
/// records without a team (officials) are ignored. Frames with no ball, no
/// attackers or no defenders are skipped. Output is ordered by frame.
pub fn detect_2v1_in_final_third(
    records: &[TrackingRecord],
    attacking_team_id: &str,
    params: &DetectorConfig,
) -> Vec<FrameDetection> {
    let final_third_x = params.pitch_length * 2.0 / 3.0;

    let mut frames: BTreeMap<i64, Vec<&TrackingRecord>> = BTreeMap::new();
    for record in records {
        frames.entry(record.frame).or_default().push(record);
    }

    let mut detections = Vec::new();
    for (frame, frame_records) in frames {
        let Some(ball) = frame_records.iter().find(|r| r.is_ball()) else {
            continue;
        };
        if ball.x < final_third_x {
            continue;
        }

        let mut attackers = 0usize;
        let mut defenders = 0usize;
        let mut attackers_near = 0usize;
        let mut defenders_near = 0usize;
        for record in frame_records.iter().filter(|r| !r.is_ball()) {
            let Some(team) = record.team_id.as_deref() else {
                continue;
            };
            let near = distance(record, ball) <= params.local_radius;
            if team == attacking_team_id {
                attackers += 1;
                attackers_near += usize::from(near);
            } else {
                defenders += 1;
                defenders_near += usize::from(near);
            }
        }

        if attackers == 0 || defenders == 0 {
            continue;
        }

        if attackers_near >= 2 && defenders_near == 1 {
            let first = frame_records[0];
            let mut detection = FrameDetection::new(&first.match_id, frame, first.timestamp_iso);
            detection.extra.insert(
                "details".to_string(),
                json!(format!(
                    "{attackers_near} attackers vs {defenders_near} defenders"
                )),
            );
            detection
                .extra
                .insert("attackers_near".to_string(), json!(attackers_near));
            detection
                .extra
                .insert("defenders_near".to_string(), json!(defenders_near));
            detections.push(detection);
        }
    }

    tracing::debug!(
        records = records.len(),
        detections = detections.len(),
        attacking_team_id,
        "Ran 2v1 final third detector"
    );

    detections
}

fn distance(a: &TrackingRecord, b: &TrackingRecord) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}
