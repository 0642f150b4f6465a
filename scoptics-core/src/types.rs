//! Core domain types for scoptics
//!
//! These types describe tracking data as stored, the frame-level detections
//! derived from it, and the events produced by clustering those detections.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Frame** | One time-sampled snapshot of tracked object positions |
//! | **Tracked object** | A player, referee, or ball position record within one frame |
//! | **Detection** | A frame that satisfied some condition (detector rule or SQL predicate) |
//! | **Event** | A contiguous run of detections folded together by frame gap |
//! | **Turn** | One entry in the conversation history exchanged with the caller |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One result row from the tracking store, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Player id used for ball position records.
pub const BALL_PLAYER_ID: &str = "ball";

// ============================================
// Tracking
// ============================================

/// A single row of the `tracking` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub match_id: String,
    pub frame: i64,
    pub timestamp_iso: DateTime<Utc>,
    /// `None` for the ball
    #[serde(default)]
    pub team_id: Option<String>,
    /// `"ball"` for the ball
    #[serde(default)]
    pub player_id: Option<String>,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub orientation: Option<f64>,
}

impl TrackingRecord {
    /// Whether this record is the ball rather than a person.
    pub fn is_ball(&self) -> bool {
        self.player_id.as_deref() == Some(BALL_PLAYER_ID)
    }
}

/// Match metadata stored alongside tracking data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchInfo {
    pub match_id: String,
    pub home_team_id: Option<String>,
    pub away_team_id: Option<String>,
    pub competition: Option<String>,
    pub kickoff_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

// ============================================
// Detections and events
// ============================================

/// A frame-level detection.
///
/// Produced by detectors or by a frame-shaped query result. Any columns beyond
/// `match_id`, `frame` and `timestamp` are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDetection {
    pub match_id: String,
    pub frame: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Row,
}

impl FrameDetection {
    pub fn new(match_id: impl Into<String>, frame: i64, timestamp: DateTime<Utc>) -> Self {
        Self {
            match_id: match_id.into(),
            frame,
            timestamp,
            extra: Row::new(),
        }
    }
}

/// A continuous event folded from one or more detections.
///
/// Invariants: `start_frame <= end_frame`, `start_time <= end_time` for
/// time-ordered input, and `frame_count >= 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusteredEvent {
    pub match_id: String,
    pub start_frame: i64,
    pub end_frame: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub frame_count: usize,
}

/// A row of the `events` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: String,
    pub match_id: String,
    pub event_type: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub start_frame: i64,
    pub end_frame: i64,
    pub team_id: Option<String>,
    pub players_involved: Vec<String>,
    pub metadata_json: serde_json::Value,
}

// ============================================
// Conversation
// ============================================

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// One turn of conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub parts: Vec<String>,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            parts: vec![text.into()],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            parts: vec![text.into()],
        }
    }

    /// All parts joined by newlines.
    pub fn text(&self) -> String {
        self.parts.join("\n")
    }
}

// ============================================
// Pipeline output
// ============================================

/// Data returned alongside the conversational response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AgentData {
    /// Raw rows as returned by the query
    Rows(Vec<Row>),
    /// Rows folded into continuous events
    Events(Vec<ClusteredEvent>),
}

impl AgentData {
    pub fn len(&self) -> usize {
        match self {
            AgentData::Rows(rows) => rows.len(),
            AgentData::Events(events) => events.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_events(&self) -> Option<&[ClusteredEvent]> {
        match self {
            AgentData::Events(events) => Some(events),
            AgentData::Rows(_) => None,
        }
    }

    pub fn as_rows(&self) -> Option<&[Row]> {
        match self {
            AgentData::Rows(rows) => Some(rows),
            AgentData::Events(_) => None,
        }
    }
}

/// Result of one full pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    pub conversational_response: String,
    /// `None` whenever the run ended before or during execution
    pub data: Option<AgentData>,
    pub updated_history: Vec<ChatTurn>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_detection_flattens_extra_fields() {
        let value = json!({
            "match_id": "m1",
            "frame": 7,
            "timestamp": "2025-01-01T12:00:00Z",
            "details": "2 attackers vs 1 defenders"
        });
        let detection: FrameDetection = serde_json::from_value(value).unwrap();
        assert_eq!(detection.frame, 7);
        assert_eq!(
            detection.extra.get("details").and_then(|v| v.as_str()),
            Some("2 attackers vs 1 defenders")
        );
    }

    #[test]
    fn test_chat_turn_roles_serialize_lowercase() {
        let turn = ChatTurn::model("hello");
        let value = serde_json::to_value(&turn).unwrap();
        assert_eq!(value["role"], "model");
        assert_eq!(value["parts"][0], "hello");
    }

    #[test]
    fn test_agent_data_serializes_as_plain_array() {
        let data = AgentData::Rows(vec![Row::new()]);
        let value = serde_json::to_value(&data).unwrap();
        assert!(value.is_array());
        assert_eq!(data.len(), 1);
        assert!(data.as_events().is_none());
    }

    #[test]
    fn test_tracking_record_ball() {
        let record: TrackingRecord = serde_json::from_value(json!({
            "match_id": "m1",
            "frame": 1,
            "timestamp_iso": "2025-01-01T12:00:00.1Z",
            "player_id": "ball",
            "x": 50.0,
            "y": 0.0
        }))
        .unwrap();
        assert!(record.is_ball());
        assert_eq!(record.team_id, None);
        assert_eq!(record.z, 0.0);
    }
}
