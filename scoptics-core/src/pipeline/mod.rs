//! Natural-language query pipeline
//!
//! One [`Pipeline::run`] call answers one question:
//!
//! ```text
//! question ─► HealingController ─► QueryExecutor ─► ResultPostProcessor ─► summary
//!             (plan/assemble/validate,                (cluster or rows)
//!              bounded retries)
//! ```
//!
//! Every stage waits on the previous one; nothing runs concurrently. The
//! caller's conversation history is read, never modified, and a new history
//! with this exchange appended is returned.

pub mod assemble;
pub mod execute;
pub mod heal;
pub mod plan;
pub mod postprocess;
pub mod prompts;
mod response;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

pub use assemble::{AssembledQuery, CteFragment, SqlAssembler};
pub use execute::QueryExecutor;
pub use heal::{HealingAttempt, HealingController, HealingOutcome, HealingReport, HealingState};
pub use plan::{AnalyticalPlan, FinalSelectDetails, OrderBy, PlanBuilder, PlanStep, SortDirection};
pub use postprocess::ResultPostProcessor;
pub use validate::{QueryValidator, ValidationVerdict};

use crate::config::PipelineConfig;
use crate::error::Error;
use crate::llm::{CompletionRequest, LlmClient};
use crate::types::{AgentData, AgentResponse, ChatTurn};
use prompts::SUMMARIZER_SYSTEM;
use serde_json::Value;

/// Answers tactical questions against a tracking store.
pub struct Pipeline<'a> {
    llm: &'a dyn LlmClient,
    executor: &'a dyn QueryExecutor,
    config: PipelineConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(llm: &'a dyn LlmClient, executor: &'a dyn QueryExecutor, config: PipelineConfig) -> Self {
        Self {
            llm,
            executor,
            config,
        }
    }

    /// Run the full pipeline for `user_query`.
    ///
    /// Never fails: every error becomes an apologetic response with `data`
    /// set to `None`.
    pub fn run(&self, user_query: &str, history: &[ChatTurn]) -> AgentResponse {
        let span = tracing::info_span!("pipeline", request = %uuid::Uuid::new_v4());
        let _enter = span.enter();
        tracing::info!(history = history.len(), "Answering question");

        let report = HealingController::new(self.llm, self.config.max_heal_retries).run(user_query);
        tracing::info!(
            attempts = report.attempts.len(),
            final_state = ?report.final_state,
            "Healing finished"
        );

        let query = match report.outcome {
            HealingOutcome::Succeeded { query, .. } => query,
            HealingOutcome::Exhausted { errors } => {
                let message = format!(
                    "Sorry, I couldn't build a valid query for that question after {} attempt(s). \
                     Problems found: {}",
                    report.attempts.len(),
                    errors.join("; ")
                );
                return respond(user_query, history, message, None);
            }
            HealingOutcome::Aborted(error) => {
                let message = format!(
                    "Sorry, I couldn't work out how to answer that question. Reason: {error}"
                );
                return respond(user_query, history, message, None);
            }
        };

        let rows = match self.executor.execute(&query) {
            Ok(rows) => rows,
            Err(error) => {
                tracing::warn!(error = %error, "Query execution failed");
                let detail = match error {
                    Error::Execution(message) => message,
                    other => other.to_string(),
                };
                let message = format!("Sorry, the query failed to run: {detail}");
                return respond(user_query, history, message, None);
            }
        };
        tracing::info!(rows = rows.len(), "Query executed");

        let data = ResultPostProcessor::new(self.llm, self.config.cluster_max_gap)
            .post_process(user_query, rows);
        let summary = self.summarize(user_query, history, &query, &data);
        respond(user_query, history, summary, Some(data))
    }

    /// Model-written answer, or a count-only sentence if the call fails.
    fn summarize(&self, user_query: &str, history: &[ChatTurn], sql: &str, data: &AgentData) -> String {
        let prompt = summary_prompt(user_query, sql, data, self.config.max_result_rows_for_summary);
        let request = CompletionRequest::new(prompt)
            .with_system(SUMMARIZER_SYSTEM)
            .with_history(history);

        match self.llm.complete(&request) {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => fallback_summary(data),
            Err(e) => {
                tracing::warn!(error = %e, "Summarization failed; using fallback");
                fallback_summary(data)
            }
        }
    }
}

fn summary_prompt(user_query: &str, sql: &str, data: &AgentData, max_rows: usize) -> String {
    let total = data.len();
    let shown: Vec<Value> = match data {
        AgentData::Rows(rows) => rows
            .iter()
            .take(max_rows)
            .map(|r| Value::Object(r.clone()))
            .collect(),
        AgentData::Events(events) => events
            .iter()
            .take(max_rows)
            .filter_map(|e| serde_json::to_value(e).ok())
            .collect(),
    };
    let kind = match data {
        AgentData::Rows(_) => "rows",
        AgentData::Events(_) => "events",
    };
    let body = serde_json::to_string_pretty(&shown).unwrap_or_else(|_| "[]".to_string());

    let mut prompt = format!(
        "Question: {user_query}\n\nSQL that was run:\n{sql}\n\nThe query produced {total} {kind}."
    );
    if shown.len() < total {
        prompt.push_str(&format!(" The first {} are shown.", shown.len()));
    }
    prompt.push_str(&format!("\n\n{body}"));
    prompt
}

fn fallback_summary(data: &AgentData) -> String {
    format!("Found {} result(s).", data.len())
}

fn respond(
    user_query: &str,
    history: &[ChatTurn],
    message: String,
    data: Option<AgentData>,
) -> AgentResponse {
    let mut updated_history = history.to_vec();
    updated_history.push(ChatTurn::user(user_query));
    updated_history.push(ChatTurn::model(message.clone()));
    AgentResponse {
        conversational_response: message,
        data,
        updated_history,
    }
}
