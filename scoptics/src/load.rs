//! scoptics-load - load tracking data into the local store
//!
//! Reads a JSON array or JSONL file of tracking records for one match and
//! replaces whatever tracking rows that match had before.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use scoptics_core::ingest::load_tracking_file;
use scoptics_core::{Config, Database, MatchInfo};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "scoptics-load")]
#[command(about = "Load football tracking data (JSON or JSONL) into the store")]
#[command(version)]
struct Args {
    /// Tracking file: a JSON array or one JSON record per line
    file: PathBuf,

    /// Home team id recorded in match metadata
    #[arg(long)]
    home_team: Option<String>,

    /// Away team id recorded in match metadata
    #[arg(long)]
    away_team: Option<String>,

    /// Competition name
    #[arg(long)]
    competition: Option<String>,

    /// Kickoff time (RFC 3339)
    #[arg(long)]
    kickoff: Option<DateTime<Utc>>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        scoptics_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let db_path = Config::database_path();
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Reading {}", args.file.display()));

    let records = load_tracking_file(&args.file)
        .with_context(|| format!("failed to load {}", args.file.display()))?;
    let Some(first) = records.first() else {
        pb.finish_and_clear();
        println!("No tracking records in {}.", args.file.display());
        return Ok(());
    };
    let match_id = first.match_id.clone();

    pb.set_message(format!("Storing {} records for {}", records.len(), match_id));
    let inserted = db
        .replace_tracking(&match_id, &records)
        .context("failed to store tracking records")?;

    // Keep earlier metadata for any field not given on the command line.
    let existing = db.get_match(&match_id)?;
    let info = MatchInfo {
        match_id: match_id.clone(),
        home_team_id: args
            .home_team
            .or_else(|| existing.as_ref().and_then(|m| m.home_team_id.clone())),
        away_team_id: args
            .away_team
            .or_else(|| existing.as_ref().and_then(|m| m.away_team_id.clone())),
        competition: args
            .competition
            .or_else(|| existing.as_ref().and_then(|m| m.competition.clone())),
        kickoff_at: args
            .kickoff
            .or_else(|| existing.as_ref().and_then(|m| m.kickoff_at)),
        metadata: json!({
            "source_file": args.file.display().to_string(),
            "loaded_at": Utc::now().to_rfc3339(),
        }),
    };
    db.upsert_match(&info).context("failed to store match metadata")?;

    pb.finish_and_clear();
    tracing::info!(match_id = %match_id, inserted, "Loaded tracking file");

    let frames = {
        let mut frames: Vec<i64> = records.iter().map(|r| r.frame).collect();
        frames.sort_unstable();
        frames.dedup();
        frames.len()
    };

    println!("Load complete:");
    println!("  Match:            {}", match_id);
    println!("  Records inserted: {}", inserted);
    println!("  Frames:           {}", frames);
    println!("  Database:         {}", db_path.display());

    Ok(())
}
