//! scoptics-events - list stored events

use anyhow::{Context, Result};
use clap::Parser;
use scoptics_core::{Config, Database, EventFilter};

#[derive(Parser)]
#[command(name = "scoptics-events")]
#[command(about = "List detected events stored for loaded matches")]
#[command(version)]
struct Args {
    /// Only events of this match
    #[arg(short, long = "match")]
    match_id: Option<String>,

    /// Only events of this type (e.g. 2v1_final_third)
    #[arg(short = 't', long)]
    event_type: Option<String>,

    /// Only events of this team
    #[arg(long)]
    team: Option<String>,

    /// Only events ending at or after this frame
    #[arg(long)]
    from_frame: Option<i64>,

    /// Only events starting at or before this frame
    #[arg(long)]
    to_frame: Option<i64>,

    /// Maximum number of events
    #[arg(short, long)]
    limit: Option<usize>,

    /// List loaded matches instead of events
    #[arg(long)]
    matches: bool,

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

    let db_path = Config::database_path();
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    if args.matches {
        let matches = db.list_matches()?;
        if matches.is_empty() {
            println!("No matches found in database.");
            println!("Run 'scoptics-load' first to load tracking data.");
            return Ok(());
        }
        for m in matches {
            println!(
                "{}  {} tracking rows, {} events",
                m.match_id, m.tracking_rows, m.event_count
            );
        }
        return Ok(());
    }

    let filter = EventFilter {
        match_id: args.match_id,
        event_type: args.event_type,
        team_id: args.team,
        from_frame: args.from_frame,
        to_frame: args.to_frame,
        limit: args.limit,
    };
    let events = db.find_events(&filter).context("failed to query events")?;

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    if events.is_empty() {
        println!("No events found.");
        return Ok(());
    }

    for event in &events {
        let frame_count = event
            .metadata_json
            .get("frame_count")
            .and_then(|v| v.as_u64())
            .map(|n| format!(", {n} frames"))
            .unwrap_or_default();
        println!(
            "{}  {}  team {}  frames {}-{}  {} -> {}{}",
            event.match_id,
            event.event_type,
            event.team_id.as_deref().unwrap_or("-"),
            event.start_frame,
            event.end_frame,
            event.start_time.format("%H:%M:%S%.3f"),
            event.end_time.format("%H:%M:%S%.3f"),
            frame_count
        );
    }
    println!("\n{} event(s)", events.len());

    Ok(())
}
