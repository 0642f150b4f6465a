//! Healing controller
//!
//! Drives plan → assemble → validate in a bounded loop. An invalid verdict
//! sends its errors into a brand-new plan; planning and assembly failures end
//! the request at once.
//!
//! ```text
//! Planning ──> Assembling ──> Validating ──> Succeeded
//!    ^                            │
//!    └──────── Retrying <─────────┤ invalid, budget left
//!                                 └──> Failed (invalid, budget spent)
//! ```

use super::assemble::SqlAssembler;
use super::plan::{AnalyticalPlan, PlanBuilder};
use super::validate::{QueryValidator, GENERIC_VALIDATION_ERROR};
use crate::error::Error;
use crate::llm::LlmClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealingState {
    Planning,
    Assembling,
    Validating,
    Retrying,
    Succeeded,
    Failed,
}

impl HealingState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, HealingState::Succeeded | HealingState::Failed)
    }
}

/// What one pass through the loop produced.
#[derive(Debug, Clone, PartialEq)]
pub struct HealingAttempt {
    /// Starts at 0
    pub attempt_number: u32,
    pub plan: Option<AnalyticalPlan>,
    pub query: Option<String>,
    pub errors: Vec<String>,
}

impl HealingAttempt {
    fn new(attempt_number: u32) -> Self {
        Self {
            attempt_number,
            plan: None,
            query: None,
            errors: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub enum HealingOutcome {
    /// Validation accepted `query`
    Succeeded { plan: AnalyticalPlan, query: String },
    /// Every attempt was rejected; holds the last rejection's errors
    Exhausted { errors: Vec<String> },
    /// A planning, assembly or transport error ended the loop
    Aborted(Error),
}

/// Full trace of one healing run.
#[derive(Debug)]
pub struct HealingReport {
    pub attempts: Vec<HealingAttempt>,
    pub transitions: Vec<HealingState>,
    pub final_state: HealingState,
    pub last_errors: Vec<String>,
    pub outcome: HealingOutcome,
}

impl HealingReport {
    pub fn succeeded(&self) -> bool {
        self.final_state == HealingState::Succeeded
    }

    /// Number of plans requested.
    pub fn plan_builds(&self) -> usize {
        self.transitions
            .iter()
            .filter(|s| **s == HealingState::Planning)
            .count()
    }
}

pub struct HealingController<'a> {
    llm: &'a dyn LlmClient,
    max_retries: u32,
}

impl<'a> HealingController<'a> {
    /// `max_retries` counts attempts after the first.
    pub fn new(llm: &'a dyn LlmClient, max_retries: u32) -> Self {
        Self { llm, max_retries }
    }

    pub fn run(&self, user_query: &str) -> HealingReport {
        let planner = PlanBuilder::new(self.llm);
        let assembler = SqlAssembler::new(self.llm);
        let validator = QueryValidator::new(self.llm);

        let mut trace = Trace::default();
        let mut prior_errors: Vec<String> = Vec::new();
        let mut attempt_number = 0;

        loop {
            let mut attempt = HealingAttempt::new(attempt_number);

            trace.enter(HealingState::Planning);
            let plan = match planner.build_plan(user_query, &prior_errors) {
                Ok(plan) => plan,
                Err(e) => return trace.abort(attempt, e),
            };
            attempt.plan = Some(plan.clone());

            trace.enter(HealingState::Assembling);
            let assembled = match assembler.assemble(&plan, user_query) {
                Ok(assembled) => assembled,
                Err(e) => return trace.abort(attempt, e),
            };
            attempt.query = Some(assembled.sql.clone());

            trace.enter(HealingState::Validating);
            let errors = match validator.validate(&assembled.sql) {
                Ok(verdict) if verdict.is_valid => {
                    tracing::info!(attempt = attempt_number, "Query passed validation");
                    trace.attempts.push(attempt);
                    trace.enter(HealingState::Succeeded);
                    return trace.finish(
                        Vec::new(),
                        HealingOutcome::Succeeded {
                            plan,
                            query: assembled.sql,
                        },
                    );
                }
                Ok(verdict) => verdict.errors,
                Err(e) if !e.is_terminal() => {
                    tracing::warn!(attempt = attempt_number, error = %e, "Validation response unusable");
                    vec![GENERIC_VALIDATION_ERROR.to_string()]
                }
                Err(e) => return trace.abort(attempt, e),
            };

            tracing::info!(
                attempt = attempt_number,
                errors = errors.len(),
                "Query failed validation"
            );
            attempt.errors = errors.clone();
            trace.attempts.push(attempt);

            if attempt_number >= self.max_retries {
                trace.enter(HealingState::Failed);
                return trace.finish(errors.clone(), HealingOutcome::Exhausted { errors });
            }

            trace.enter(HealingState::Retrying);
            attempt_number += 1;
            prior_errors = errors;
        }
    }
}

#[derive(Default)]
struct Trace {
    attempts: Vec<HealingAttempt>,
    transitions: Vec<HealingState>,
}

impl Trace {
    fn enter(&mut self, state: HealingState) {
        tracing::debug!(?state, "Healing transition");
        self.transitions.push(state);
    }

    fn abort(mut self, mut attempt: HealingAttempt, error: Error) -> HealingReport {
        tracing::warn!(attempt = attempt.attempt_number, error = %error, "Healing aborted");
        let errors = vec![error.to_string()];
        attempt.errors = errors.clone();
        self.attempts.push(attempt);
        self.enter(HealingState::Failed);
        self.finish(errors, HealingOutcome::Aborted(error))
    }

    fn finish(self, last_errors: Vec<String>, outcome: HealingOutcome) -> HealingReport {
        let final_state = self
            .transitions
            .last()
            .copied()
            .unwrap_or(HealingState::Failed);
        HealingReport {
            attempts: self.attempts,
            transitions: self.transitions,
            final_state,
            last_errors,
            outcome,
        }
    }
}
