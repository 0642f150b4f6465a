//! Query execution seam.

use crate::db::Database;
use crate::error::Result;
use crate::types::Row;

/// Runs one validated read-only query.
///
/// Implementations reject anything but a single SELECT with
/// [`Error::Execution`](crate::Error::Execution).
pub trait QueryExecutor: Send + Sync {
    fn execute(&self, sql: &str) -> Result<Vec<Row>>;
}

impl QueryExecutor for Database {
    fn execute(&self, sql: &str) -> Result<Vec<Row>> {
        self.execute_read_only(sql)
    }
}
