//! Error types for scoptics-core

use thiserror::Error;

/// Main error type for the scoptics-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level failure talking to the language model
    #[error("LLM error: {0}")]
    Llm(String),

    /// The planning response was not a usable plan
    #[error("planning error: {0}")]
    Planning(String),

    /// A step's generation response did not contain a named CTE block
    #[error("could not extract SQL for step {step}: {message}")]
    UnparsableStep { step: u32, message: String },

    /// The plan's final projection is missing required keys
    #[error("incomplete plan: {0}")]
    IncompletePlan(String),

    /// The validation response was not a `{is_valid, errors}` verdict
    #[error("validation response could not be parsed: {0}")]
    ValidationParse(String),

    /// Query execution failed or the statement was rejected
    #[error("execution error: {0}")]
    Execution(String),

    /// A tracking record failed validation during ingestion
    #[error("invalid record at index {index}: {message}")]
    InvalidRecord { index: usize, message: String },
}

impl Error {
    /// Whether this error ends the whole request rather than a single healing attempt.
    ///
    /// Validation parse failures are the only pipeline error the healing loop absorbs.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Error::ValidationParse(_))
    }
}

/// Result type alias for scoptics-core
pub type Result<T> = std::result::Result<T, Error>;
