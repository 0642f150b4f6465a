//! Result post-processing
//!
//! Decides whether an executed result set describes separate moments or one
//! situation spread over consecutive frames, and folds the latter into events.
//! Clustering is presentation only, so every doubt falls back to raw rows.

use crate::events::cluster_frames_into_events;
use crate::llm::{CompletionRequest, LlmClient, ModelTier};
use crate::types::{AgentData, FrameDetection, Row};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Columns tried, in order, for a row's timestamp.
const TIMESTAMP_FIELDS: [&str; 4] = ["timestamp_iso", "timestamp", "time", "ts"];

const CLASSIFIER_SYSTEM: &str = "You decide how query results should be presented. \
Answer with a single word: CLUSTER if the rows are consecutive frames of one or more \
continuous situations that should be grouped into events, or INDIVIDUAL if each row \
is a separate result.";

pub struct ResultPostProcessor<'a> {
    llm: &'a dyn LlmClient,
    max_gap: u64,
}

impl<'a> ResultPostProcessor<'a> {
    pub fn new(llm: &'a dyn LlmClient, max_gap: u64) -> Self {
        Self { llm, max_gap }
    }

    pub fn post_process(&self, user_query: &str, rows: Vec<Row>) -> AgentData {
        if rows.is_empty() {
            return AgentData::Rows(rows);
        }
        if !self.wants_clustering(user_query, &rows) {
            return AgentData::Rows(rows);
        }

        let detections: Option<Vec<FrameDetection>> = rows.iter().map(row_to_detection).collect();
        match detections {
            Some(detections) => {
                let events = cluster_frames_into_events(&detections, self.max_gap);
                tracing::info!(rows = rows.len(), events = events.len(), "Clustered results");
                AgentData::Events(events)
            }
            None => {
                tracing::debug!("Rows are not frame-shaped; returning them unclustered");
                AgentData::Rows(rows)
            }
        }
    }

    /// Fast-tier cluster/individual question. Errors count as "individual".
    fn wants_clustering(&self, user_query: &str, rows: &[Row]) -> bool {
        let columns: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        let prompt = format!(
            "Question: {user_query}\nThe query returned {} row(s) with columns: {}.\n\
             Answer CLUSTER or INDIVIDUAL.",
            rows.len(),
            columns.join(", ")
        );
        let request = CompletionRequest::new(prompt)
            .with_system(CLASSIFIER_SYSTEM)
            .with_tier(ModelTier::Fast);

        match self.llm.complete(&request) {
            Ok(answer) => answer.to_uppercase().contains("CLUSTER"),
            Err(e) => {
                tracing::warn!(error = %e, "Classification failed; keeping raw rows");
                false
            }
        }
    }
}

/// Convert a frame-shaped row. `None` when `frame` or a timestamp is unusable.
pub(crate) fn row_to_detection(row: &Row) -> Option<FrameDetection> {
    let frame = integral(row.get("frame")?)?;
    let (ts_field, timestamp) = TIMESTAMP_FIELDS.iter().find_map(|field| {
        row.get(*field)
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
            .map(|ts| (*field, ts))
    })?;
    let match_id = match row.get("match_id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    let mut detection = FrameDetection::new(match_id, frame, timestamp);
    detection.extra = row
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "frame" | "match_id") && k.as_str() != ts_field)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Some(detection)
}

fn integral(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    let f = value.as_f64()?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::ScriptedClient;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn frame_rows() -> Vec<Row> {
        [10, 11, 12, 50, 51, 100]
            .iter()
            .map(|f| {
                row(json!({
                    "match_id": "m1",
                    "frame": f,
                    "timestamp_iso": format!("2025-01-01T12:00:{:02}.000Z", f % 60),
                    "attackers": 2
                }))
            })
            .collect()
    }

    #[test]
    fn empty_rows_skip_classification() {
        let client = ScriptedClient::new(["CLUSTER"]);
        let data = ResultPostProcessor::new(&client, 10).post_process("q", Vec::new());
        assert_eq!(data, AgentData::Rows(Vec::new()));
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn cluster_answer_folds_rows_into_events() {
        let client = ScriptedClient::new(["cluster."]);
        let data = ResultPostProcessor::new(&client, 5).post_process("2v1 moments", frame_rows());

        let events = data.as_events().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!((events[0].start_frame, events[0].end_frame), (10, 12));
        assert_eq!(events[1].frame_count, 2);
        assert_eq!(events[2].match_id, "m1");
        assert_eq!(client.request(0).tier, ModelTier::Fast);
    }

    #[test]
    fn individual_answer_keeps_rows() {
        let client = ScriptedClient::new(["INDIVIDUAL"]);
        let rows = frame_rows();
        let data = ResultPostProcessor::new(&client, 5).post_process("top speeds", rows.clone());
        assert_eq!(data, AgentData::Rows(rows));
    }

    #[test]
    fn classification_failure_keeps_rows() {
        let client = ScriptedClient::new(Vec::<String>::new()).then_fail("timeout");
        let rows = frame_rows();
        let data = ResultPostProcessor::new(&client, 5).post_process("q", rows.clone());
        assert_eq!(data, AgentData::Rows(rows));
    }

    #[test]
    fn row_without_frame_is_returned_unmodified() {
        let client = ScriptedClient::new(["CLUSTER"]);
        let mut rows = frame_rows();
        rows[3].remove("frame");
        let data = ResultPostProcessor::new(&client, 5).post_process("q", rows.clone());
        assert_eq!(data, AgentData::Rows(rows));
    }

    #[test]
    fn row_conversion_accepts_alternate_timestamps() {
        let detection = row_to_detection(&row(json!({
            "frame": 42.0,
            "ts": "2025-01-01 12:00:01.5",
            "player_id": "p7"
        })))
        .unwrap();
        assert_eq!(detection.frame, 42);
        assert_eq!(detection.match_id, "");
        assert_eq!(detection.timestamp.timestamp_millis() % 1000, 500);
        assert!(detection.extra.contains_key("player_id"));
        assert!(!detection.extra.contains_key("ts"));
    }

    #[test]
    fn row_conversion_rejects_fractional_frame_and_bad_time() {
        assert!(row_to_detection(&row(json!({"frame": 1.5, "timestamp": "2025-01-01T00:00:00Z"}))).is_none());
        assert!(row_to_detection(&row(json!({"frame": 1, "timestamp": "yesterday"}))).is_none());
        assert!(row_to_detection(&row(json!({"frame": "1", "timestamp": "2025-01-01T00:00:00Z"}))).is_none());
    }
}
