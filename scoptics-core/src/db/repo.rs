//! Database repository layer
//!
//! Provides query and insert operations for tracking data, match metadata and
//! detected events, plus read-only execution of generated queries.

use crate::error::{Error, Result};
use crate::types::{MatchInfo, Row, StoredEvent, TrackingRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Mutex;

/// Filter for structured event search.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub match_id: Option<String>,
    pub event_type: Option<String>,
    pub team_id: Option<String>,
    /// Events ending at or after this frame
    pub from_frame: Option<i64>,
    /// Events starting at or before this frame
    pub to_frame: Option<i64>,
    pub limit: Option<usize>,
}

/// Per-match row counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSummary {
    pub match_id: String,
    pub tracking_rows: i64,
    pub event_count: i64,
}

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    // ============================================
    // Match operations
    // ============================================

    /// Insert or update match metadata
    pub fn upsert_match(&self, info: &MatchInfo) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO matches (match_id, home_team_id, away_team_id, competition, kickoff_at, metadata)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(match_id) DO UPDATE SET
                home_team_id = excluded.home_team_id,
                away_team_id = excluded.away_team_id,
                competition = excluded.competition,
                kickoff_at = excluded.kickoff_at,
                metadata = excluded.metadata
            "#,
            params![
                info.match_id,
                info.home_team_id,
                info.away_team_id,
                info.competition,
                info.kickoff_at.as_ref().map(format_timestamp),
                info.metadata.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Get match metadata by ID
    pub fn get_match(&self, match_id: &str) -> Result<Option<MatchInfo>> {
        let conn = self.conn.lock().unwrap();
        let info = conn
            .query_row(
                "SELECT * FROM matches WHERE match_id = ?",
                [match_id],
                |row| {
                    let kickoff: Option<String> = row.get("kickoff_at")?;
                    let metadata: Option<String> = row.get("metadata")?;
                    Ok(MatchInfo {
                        match_id: row.get("match_id")?,
                        home_team_id: row.get("home_team_id")?,
                        away_team_id: row.get("away_team_id")?,
                        competition: row.get("competition")?,
                        kickoff_at: kickoff.map(|s| parse_timestamp(&s)).transpose()?,
                        metadata: metadata
                            .and_then(|s| serde_json::from_str(&s).ok())
                            .unwrap_or(serde_json::Value::Null),
                    })
                },
            )
            .optional()?;
        Ok(info)
    }

    /// List every known match with tracking and event counts
    pub fn list_matches(&self) -> Result<Vec<MatchSummary>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT ids.match_id,
                   (SELECT COUNT(*) FROM tracking t WHERE t.match_id = ids.match_id),
                   (SELECT COUNT(*) FROM events e WHERE e.match_id = ids.match_id)
            FROM (
                SELECT match_id FROM tracking
                UNION
                SELECT match_id FROM matches
            ) ids
            ORDER BY ids.match_id
            "#,
        )?;
        let matches = stmt
            .query_map([], |row| {
                Ok(MatchSummary {
                    match_id: row.get(0)?,
                    tracking_rows: row.get(1)?,
                    event_count: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(matches)
    }

    // ============================================
    // Tracking operations
    // ============================================

    /// Replace all tracking rows of one match in a single transaction.
    ///
    /// Every record must belong to `match_id`. Returns the number of rows inserted.
    pub fn replace_tracking(&self, match_id: &str, records: &[TrackingRecord]) -> Result<usize> {
        if let Some((index, record)) = records
            .iter()
            .enumerate()
            .find(|(_, r)| r.match_id != match_id)
        {
            return Err(Error::InvalidRecord {
                index,
                message: format!(
                    "match_id '{}' does not match '{}'",
                    record.match_id, match_id
                ),
            });
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let removed = tx.execute("DELETE FROM tracking WHERE match_id = ?", [match_id])?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO tracking (match_id, frame, timestamp_iso, team_id, player_id,
                                      x, y, z, speed, orientation)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )?;
            for record in records {
                stmt.execute(params![
                    record.match_id,
                    record.frame,
                    format_timestamp(&record.timestamp_iso),
                    record.team_id,
                    record.player_id,
                    record.x,
                    record.y,
                    record.z,
                    record.speed,
                    record.orientation,
                ])?;
            }
        }

        tx.commit()?;

        tracing::info!(
            match_id,
            removed,
            inserted = records.len(),
            "Replaced tracking data"
        );

        Ok(records.len())
    }

    /// Load all tracking rows of one match ordered by frame
    pub fn tracking_for_match(&self, match_id: &str) -> Result<Vec<TrackingRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM tracking WHERE match_id = ? ORDER BY frame ASC, rowid ASC",
        )?;
        let records = stmt
            .query_map([match_id], Self::row_to_tracking)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn row_to_tracking(row: &rusqlite::Row) -> rusqlite::Result<TrackingRecord> {
        let timestamp: String = row.get("timestamp_iso")?;
        Ok(TrackingRecord {
            match_id: row.get("match_id")?,
            frame: row.get("frame")?,
            timestamp_iso: parse_timestamp(&timestamp)?,
            team_id: row.get("team_id")?,
            player_id: row.get("player_id")?,
            x: row.get("x")?,
            y: row.get("y")?,
            z: row.get("z")?,
            speed: row.get("speed")?,
            orientation: row.get("orientation")?,
        })
    }

    // ============================================
    // Event operations
    // ============================================

    /// Replace the events of one type for one match.
    ///
    /// Returns the number of events inserted.
    pub fn replace_events(
        &self,
        match_id: &str,
        event_type: &str,
        events: &[StoredEvent],
    ) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM events WHERE match_id = ?1 AND event_type = ?2",
            params![match_id, event_type],
        )?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO events (event_id, match_id, event_type, start_time, end_time,
                                    start_frame, end_frame, team_id, players_involved, metadata_json)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )?;
            for event in events {
                stmt.execute(params![
                    event.event_id,
                    event.match_id,
                    event.event_type,
                    format_timestamp(&event.start_time),
                    format_timestamp(&event.end_time),
                    event.start_frame,
                    event.end_frame,
                    event.team_id,
                    serde_json::to_string(&event.players_involved)?,
                    event.metadata_json.to_string(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(events.len())
    }

    /// Find events matching a structured filter, ordered by match then start frame
    pub fn find_events(&self, filter: &EventFilter) -> Result<Vec<StoredEvent>> {
        let conn = self.conn.lock().unwrap();

        let mut sql = String::from("SELECT * FROM events WHERE 1=1");
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(match_id) = &filter.match_id {
            sql.push_str(" AND match_id = ?");
            params.push(Box::new(match_id.clone()));
        }

        if let Some(event_type) = &filter.event_type {
            sql.push_str(" AND event_type = ?");
            params.push(Box::new(event_type.clone()));
        }

        if let Some(team_id) = &filter.team_id {
            sql.push_str(" AND team_id = ?");
            params.push(Box::new(team_id.clone()));
        }

        if let Some(from_frame) = filter.from_frame {
            sql.push_str(" AND end_frame >= ?");
            params.push(Box::new(from_frame));
        }

        if let Some(to_frame) = filter.to_frame {
            sql.push_str(" AND start_frame <= ?");
            params.push(Box::new(to_frame));
        }

        sql.push_str(" ORDER BY match_id ASC, start_frame ASC");

        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(params_refs.as_slice(), Self::row_to_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events)
    }

    fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<StoredEvent> {
        let start_time: String = row.get("start_time")?;
        let end_time: String = row.get("end_time")?;
        let players: String = row.get("players_involved")?;
        let metadata: String = row.get("metadata_json")?;

        Ok(StoredEvent {
            event_id: row.get("event_id")?,
            match_id: row.get("match_id")?,
            event_type: row.get("event_type")?,
            start_time: parse_timestamp(&start_time)?,
            end_time: parse_timestamp(&end_time)?,
            start_frame: row.get("start_frame")?,
            end_frame: row.get("end_frame")?,
            team_id: row.get("team_id")?,
            players_involved: serde_json::from_str(&players).unwrap_or_default(),
            metadata_json: serde_json::from_str(&metadata).unwrap_or(serde_json::json!({})),
        })
    }

    // ============================================
    // Generated query execution
    // ============================================

    /// Execute a single read-only statement and return its rows as JSON objects.
    ///
    /// Only one `SELECT` or `WITH` statement is accepted; SQLite must also report
    /// the prepared statement as read-only. All failures, including SQL errors,
    /// are reported as [`Error::Execution`] carrying the underlying message.
    pub fn execute_read_only(&self, sql: &str) -> Result<Vec<Row>> {
        let statement = single_select_statement(sql)?;

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(statement).map_err(execution_error)?;
        if !stmt.readonly() {
            return Err(Error::Execution(
                "only read-only statements may be executed".to_string(),
            ));
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query([]).map_err(execution_error)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().map_err(execution_error)? {
            let mut record = Row::new();
            for (i, name) in columns.iter().enumerate() {
                let value = row.get_ref(i).map_err(execution_error)?;
                record.insert(name.clone(), value_to_json(value));
            }
            results.push(record);
        }

        tracing::debug!(rows = results.len(), "Executed read-only query");
        Ok(results)
    }
}

/// Render a timestamp the way the store keeps it: RFC 3339, UTC, millisecond precision.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

fn execution_error(e: rusqlite::Error) -> Error {
    Error::Execution(e.to_string())
}

/// Strip one optional trailing semicolon and insist on a single SELECT/WITH statement.
fn single_select_statement(sql: &str) -> Result<&str> {
    let statement = sql.trim().trim_end_matches(';').trim_end();
    if statement.is_empty() {
        return Err(Error::Execution("query is empty".to_string()));
    }
    if statement.contains(';') {
        return Err(Error::Execution(
            "multiple statements are not allowed".to_string(),
        ));
    }

    let keyword: String = statement
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    match keyword.as_str() {
        "SELECT" | "WITH" => Ok(statement),
        _ => Err(Error::Execution(format!(
            "only SELECT queries may be executed, got '{}'",
            keyword
        ))),
    }
}

fn value_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(bytes) => {
            serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
        ValueRef::Blob(bytes) => serde_json::Value::String(hex::encode(bytes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn kickoff() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn record(match_id: &str, frame: i64, player: &str) -> TrackingRecord {
        TrackingRecord {
            match_id: match_id.to_string(),
            frame,
            timestamp_iso: kickoff() + Duration::milliseconds(frame * 40),
            team_id: Some("team_A".to_string()),
            player_id: Some(player.to_string()),
            x: 10.0 + frame as f64,
            y: -3.5,
            z: 0.0,
            speed: Some(6.25),
            orientation: None,
        }
    }

    fn event(match_id: &str, event_type: &str, start: i64, end: i64) -> StoredEvent {
        StoredEvent {
            event_id: format!("{match_id}-{event_type}-{start}"),
            match_id: match_id.to_string(),
            event_type: event_type.to_string(),
            start_time: kickoff() + Duration::seconds(start),
            end_time: kickoff() + Duration::seconds(end),
            start_frame: start,
            end_frame: end,
            team_id: Some("team_A".to_string()),
            players_involved: vec!["p7".to_string()],
            metadata_json: json!({"frame_count": end - start + 1}),
        }
    }

    #[test]
    fn test_replace_tracking_round_trip() {
        let db = test_db();
        let records = vec![record("m1", 2, "p1"), record("m1", 1, "p1")];
        assert_eq!(db.replace_tracking("m1", &records).unwrap(), 2);

        let loaded = db.tracking_for_match("m1").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].frame, 1);
        assert_eq!(loaded[1], records[0]);
    }

    #[test]
    fn test_replace_tracking_removes_previous_rows() {
        let db = test_db();
        db.replace_tracking("m1", &[record("m1", 1, "p1"), record("m1", 2, "p1")])
            .unwrap();
        db.replace_tracking("m2", &[record("m2", 1, "p1")]).unwrap();
        db.replace_tracking("m1", &[record("m1", 9, "p2")]).unwrap();

        assert_eq!(db.tracking_for_match("m1").unwrap().len(), 1);
        assert_eq!(db.tracking_for_match("m2").unwrap().len(), 1);
    }

    #[test]
    fn test_replace_tracking_rejects_foreign_match() {
        let db = test_db();
        let err = db
            .replace_tracking("m1", &[record("m1", 1, "p1"), record("m2", 2, "p1")])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRecord { index: 1, .. }));
        assert!(db.tracking_for_match("m1").unwrap().is_empty());
    }

    #[test]
    fn test_match_upsert_and_listing() {
        let db = test_db();
        let info = MatchInfo {
            match_id: "m1".to_string(),
            home_team_id: Some("team_A".to_string()),
            away_team_id: Some("team_B".to_string()),
            competition: None,
            kickoff_at: Some(kickoff()),
            metadata: json!({"venue": "home"}),
        };
        db.upsert_match(&info).unwrap();
        db.replace_tracking("m2", &[record("m2", 1, "p1")]).unwrap();

        assert_eq!(db.get_match("m1").unwrap(), Some(info));
        assert!(db.get_match("m9").unwrap().is_none());

        let listed = db.list_matches().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1].tracking_rows, 1);
    }

    #[test]
    fn test_events_replace_and_filter() {
        let db = test_db();
        db.replace_events(
            "m1",
            "2v1_final_third",
            &[event("m1", "2v1_final_third", 10, 20), event("m1", "2v1_final_third", 300, 320)],
        )
        .unwrap();
        db.replace_events("m1", "press", &[event("m1", "press", 50, 60)])
            .unwrap();

        let all = db.find_events(&EventFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].players_involved, vec!["p7".to_string()]);

        let typed = db
            .find_events(&EventFilter {
                event_type: Some("2v1_final_third".to_string()),
                from_frame: Some(15),
                to_frame: Some(100),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(typed.len(), 1);
        assert_eq!(typed[0].start_frame, 10);

        db.replace_events("m1", "2v1_final_third", &[]).unwrap();
        assert_eq!(db.find_events(&EventFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_execute_read_only_maps_values() {
        let db = test_db();
        db.replace_tracking("m1", &[record("m1", 3, "p1")]).unwrap();

        let rows = db
            .execute_read_only(
                "SELECT match_id, frame, timestamp_iso, speed, orientation FROM tracking;",
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row["match_id"], json!("m1"));
        assert_eq!(row["frame"], json!(3));
        assert_eq!(row["timestamp_iso"], json!("2025-01-01T12:00:00.120Z"));
        assert_eq!(row["speed"], json!(6.25));
        assert_eq!(row["orientation"], serde_json::Value::Null);
    }

    #[test]
    fn test_execute_read_only_accepts_cte() {
        let db = test_db();
        db.replace_tracking("m1", &[record("m1", 1, "p1"), record("m1", 2, "p1")])
            .unwrap();
        let rows = db
            .execute_read_only(
                "WITH fast AS (SELECT frame FROM tracking WHERE speed > 5) SELECT COUNT(*) AS n FROM fast",
            )
            .unwrap();
        assert_eq!(rows[0]["n"], json!(2));
    }

    #[test]
    fn test_execute_read_only_rejects_writes() {
        let db = test_db();
        for sql in [
            "DELETE FROM tracking",
            "SELECT 1; DROP TABLE tracking",
            "   ",
            "WITH x AS (SELECT 1) DELETE FROM tracking",
        ] {
            let err = db.execute_read_only(sql).unwrap_err();
            assert!(matches!(err, Error::Execution(_)), "{sql}");
        }
        assert!(db.execute_read_only("select 1 as one").is_ok());
    }

    #[test]
    fn test_executor_cannot_modify_store() {
        use crate::pipeline::QueryExecutor;

        let db = test_db();
        db.replace_tracking("m1", &[record("m1", 1, "ball"), record("m1", 2, "ball")])
            .unwrap();

        for sql in ["DELETE FROM tracking", "UPDATE tracking SET frame = 0", "DROP TABLE events"] {
            assert!(db.execute(sql).is_err(), "{sql}");
        }
        assert_eq!(db.tracking_for_match("m1").unwrap().len(), 2);
    }

    #[test]
    fn test_execute_read_only_surfaces_sql_errors() {
        let db = test_db();
        let err = db.execute_read_only("SELECT nope FROM tracking").unwrap_err();
        match err {
            Error::Execution(msg) => assert!(msg.contains("nope")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
