//! Database layer for scoptics
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository pattern for tracking, match and event queries
//! - Read-only execution of generated analysis queries

pub mod repo;
pub mod schema;

pub use repo::{format_timestamp, Database, EventFilter, MatchSummary};
