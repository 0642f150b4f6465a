//! scoptics - ask tactical questions about loaded tracking data
//!
//! Runs one question through the query pipeline and prints the answer plus
//! any rows or events it produced. Pass `--history` to continue a saved
//! conversation; the file is rewritten with the new exchange appended.

use anyhow::{Context, Result};
use clap::Parser;
use scoptics_core::llm::create_client;
use scoptics_core::{AgentData, AgentResponse, ChatTurn, Config, Database, Pipeline};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "scoptics")]
#[command(about = "Ask tactical questions about football tracking data")]
#[command(version)]
struct Args {
    /// The question to ask
    #[arg(required = true)]
    question: Vec<String>,

    /// Conversation history file (JSON), read before and written after the question
    #[arg(long)]
    history: Option<PathBuf>,

    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Maximum rows or events printed in text mode
    #[arg(long, default_value = "20")]
    max_rows: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let question = args.question.join(" ").trim().to_string();
    if question.is_empty() {
        anyhow::bail!("question must not be empty");
    }

    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        scoptics_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let db_path = Config::database_path();
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    let llm = config.require_llm()?;
    let client = create_client(llm).context("failed to create LLM client")?;

    let history = match args.history {
        Some(ref path) => read_history(path)?,
        None => Vec::new(),
    };

    let pipeline = Pipeline::new(client.as_ref(), &db, config.pipeline.clone());
    let response = pipeline.run(&question, &history);
    tracing::info!(
        answered = response.data.is_some(),
        history = response.updated_history.len(),
        "Question finished"
    );

    if let Some(ref path) = args.history {
        write_history(path, &response.updated_history)?;
    }

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_text_response(&response, args.max_rows);
    }

    Ok(())
}

fn read_history(path: &Path) -> Result<Vec<ChatTurn>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read history file {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse history file {}", path.display()))
}

fn write_history(path: &Path, history: &[ChatTurn]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, serde_json::to_string_pretty(history)?)
        .with_context(|| format!("failed to write history file {}", path.display()))
}

fn print_text_response(response: &AgentResponse, max_rows: usize) {
    println!("{}", response.conversational_response);

    let Some(data) = &response.data else {
        return;
    };
    println!();

    match data {
        AgentData::Events(events) => {
            println!("{} event(s):", events.len());
            for event in events.iter().take(max_rows) {
                println!(
                    "  {}  frames {}-{}  {} -> {}  ({} frames)",
                    event.match_id,
                    event.start_frame,
                    event.end_frame,
                    event.start_time.format("%H:%M:%S%.3f"),
                    event.end_time.format("%H:%M:%S%.3f"),
                    event.frame_count
                );
            }
        }
        AgentData::Rows(rows) => {
            println!("{} row(s):", rows.len());
            for row in rows.iter().take(max_rows) {
                println!("  {}", serde_json::Value::Object(row.clone()));
            }
        }
    }

    if data.len() > max_rows {
        println!("  ... {} more", data.len() - max_rows);
    }
}
