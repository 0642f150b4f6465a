//! Query validation through the model.

use super::prompts::{SCHEMA_CONTEXT, VALIDATOR_SYSTEM};
use super::response::parse_json_response;
use crate::error::{Error, Result};
use crate::llm::{CompletionRequest, LlmClient};
use serde::{Deserialize, Serialize};

/// Error reported when a verdict is invalid but names no problem.
pub const GENERIC_VALIDATION_ERROR: &str = "the query was rejected by validation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub is_valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

pub struct QueryValidator<'a> {
    llm: &'a dyn LlmClient,
}

impl<'a> QueryValidator<'a> {
    pub fn new(llm: &'a dyn LlmClient) -> Self {
        Self { llm }
    }

    /// Ask for a `{is_valid, errors}` verdict on `sql`.
    ///
    /// Returns [`Error::ValidationParse`] when the answer is not a verdict.
    /// An invalid verdict always carries at least one error.
    pub fn validate(&self, sql: &str) -> Result<ValidationVerdict> {
        let request = CompletionRequest::new(format!("Query to review:\n{sql}"))
            .with_system(format!("{VALIDATOR_SYSTEM}\n\n{SCHEMA_CONTEXT}"));
        let raw = self.llm.complete(&request)?;

        let mut verdict: ValidationVerdict =
            parse_json_response(&raw).map_err(Error::ValidationParse)?;
        verdict.errors.retain(|e| !e.trim().is_empty());
        if !verdict.is_valid && verdict.errors.is_empty() {
            verdict.errors.push(GENERIC_VALIDATION_ERROR.to_string());
        }
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::ScriptedClient;

    #[test]
    fn parses_valid_verdict() {
        let client = ScriptedClient::new([r#"{"is_valid": true, "errors": []}"#]);
        let verdict = QueryValidator::new(&client).validate("SELECT 1").unwrap();
        assert!(verdict.is_valid);
        assert!(client.prompt(0).contains("SELECT 1"));
    }

    #[test]
    fn invalid_without_errors_gets_generic_error() {
        let client = ScriptedClient::new([r#"```json
{"is_valid": false}
```"#]);
        let verdict = QueryValidator::new(&client).validate("SELECT 1").unwrap();
        assert_eq!(verdict.errors, vec![GENERIC_VALIDATION_ERROR.to_string()]);
    }

    #[test]
    fn unparsable_verdict_is_validation_parse_error() {
        let client = ScriptedClient::new(["Looks fine to me!"]);
        let err = QueryValidator::new(&client).validate("SELECT 1").unwrap_err();
        assert!(matches!(err, Error::ValidationParse(_)));
        assert!(!err.is_terminal());
    }
}
