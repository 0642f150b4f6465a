//! # scoptics-core
//!
//! Core library for scoptics - tactical questions over football tracking data.
//!
//! This library provides:
//! - Domain types for tracking records, frame detections and events
//! - Event clustering and the rule-based 2v1 final-third detector
//! - A self-healing natural-language to SQL pipeline
//! - SQLite storage for tracking, match metadata and events
//! - Configuration management and logging
//!
//! ## Architecture
//!
//! Data flows through three layers:
//! - **Tracking:** per-frame positions loaded from JSON/JSONL files
//! - **Events:** detector output clustered into continuous spells (regenerable)
//! - **Answers:** model-planned SQL run read-only against the store, optionally clustered
//!
//! ## Example
//!
//! ```rust,no_run
//! use scoptics_core::{llm, Config, Database, Pipeline};
//!
//! let config = Config::load().expect("failed to load config");
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let client = llm::create_client(config.require_llm().unwrap()).unwrap();
//! let pipeline = Pipeline::new(client.as_ref(), &db, config.pipeline.clone());
//! let response = pipeline.run("When did the home team create 2v1s in the final third?", &[]);
//! println!("{}", response.conversational_response);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::{Database, EventFilter};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, QueryExecutor};
pub use types::*;

// Public modules
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod types;
