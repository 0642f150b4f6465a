//! scoptics-process - detect and store events for one match
//!
//! Runs the rule-based 2v1 final-third detector over a match's tracking data,
//! clusters the detections and replaces the match's stored events of that type.

use anyhow::{Context, Result};
use clap::Parser;
use scoptics_core::events::{process_match, EVENT_TYPE_2V1_FINAL_THIRD};
use scoptics_core::{Config, Database};

#[derive(Parser)]
#[command(name = "scoptics-process")]
#[command(about = "Detect 2v1 final-third events for a match")]
#[command(version)]
struct Args {
    /// Match to process
    match_id: String,

    /// Team whose attacks are analyzed
    attacking_team_id: String,

    /// Largest frame gap merged into one event (defaults to pipeline.cluster_max_gap)
    #[arg(long)]
    max_gap: Option<u64>,

    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text")]
    format: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        scoptics_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let max_gap = args.max_gap.unwrap_or(config.pipeline.cluster_max_gap);
    tracing::debug!(max_gap, "Using cluster gap");

    let db_path = Config::database_path();
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    let summary = process_match(
        &db,
        &args.match_id,
        &args.attacking_team_id,
        &config.detector,
        max_gap,
    )
    .with_context(|| format!("failed to process match '{}'", args.match_id))?;

    if args.format == "json" {
        let output = serde_json::json!({
            "match_id": args.match_id,
            "attacking_team_id": args.attacking_team_id,
            "event_type": EVENT_TYPE_2V1_FINAL_THIRD,
            "records": summary.records,
            "detections": summary.detections,
            "events": summary.events,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if summary.records == 0 {
        println!("No tracking data found for match '{}'.", args.match_id);
        println!("Run 'scoptics-load' first to load tracking data.");
        return Ok(());
    }

    println!("Processing complete:");
    println!("  Match:            {}", args.match_id);
    println!("  Attacking team:   {}", args.attacking_team_id);
    println!("  Tracking records: {}", summary.records);
    println!("  Detections:       {}", summary.detections);
    println!("  Events stored:    {}", summary.events);

    Ok(())
}
