//! Query plan builder
//!
//! Turns a natural-language request into an [`AnalyticalPlan`] with one
//! planning call. Retries never patch a plan: each call builds a complete new
//! plan, seeing earlier attempts only through their error strings.

use super::prompts::{PLANNER_SYSTEM, SCHEMA_CONTEXT};
use super::response::parse_json_response;
use crate::error::{Error, Result};
use crate::llm::{CompletionRequest, LlmClient};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An ordered list of CTE steps plus the final projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticalPlan {
    #[serde(default)]
    pub explanation: String,
    pub steps: Vec<PlanStep>,
    pub final_select_details: FinalSelectDetails,
}

impl AnalyticalPlan {
    /// The step whose CTE feeds the final SELECT when no source is named.
    pub fn last_step(&self) -> Option<&PlanStep> {
        self.steps.last()
    }

    pub fn defines(&self, cte_name: &str) -> bool {
        self.steps
            .iter()
            .any(|s| s.cte_name.eq_ignore_ascii_case(cte_name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub step_number: u32,
    pub description: String,
    pub cte_name: String,
}

/// Projection applied after the last CTE.
///
/// `columns` may be absent in a model response; the assembler rejects such a
/// plan as incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalSelectDetails {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub order_by: Option<OrderBy>,
    #[serde(default)]
    pub limit: Option<u64>,
    /// Source relation; defaults to the last step's CTE
    #[serde(default)]
    pub from: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    #[serde(alias = "asc")]
    Asc,
    #[serde(alias = "desc")]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Builds plans through the planning capability.
pub struct PlanBuilder<'a> {
    llm: &'a dyn LlmClient,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(llm: &'a dyn LlmClient) -> Self {
        Self { llm }
    }

    /// Build a fresh plan for `user_query`.
    ///
    /// `prior_errors` holds the validation errors of the previous attempt, if any.
    /// Any response that is not a well-shaped plan fails with [`Error::Planning`].
    pub fn build_plan(&self, user_query: &str, prior_errors: &[String]) -> Result<AnalyticalPlan> {
        let request = CompletionRequest::new(planning_prompt(user_query, prior_errors))
            .with_system(format!("{PLANNER_SYSTEM}\n\n{SCHEMA_CONTEXT}"));
        let raw = self.llm.complete(&request)?;

        let plan: AnalyticalPlan = parse_json_response(&raw)
            .map_err(|e| Error::Planning(format!("response is not a plan: {e}")))?;
        validate_plan_shape(&plan).map_err(Error::Planning)?;

        tracing::info!(
            steps = plan.steps.len(),
            retry = !prior_errors.is_empty(),
            explanation = %plan.explanation,
            "Built analytical plan"
        );
        Ok(plan)
    }
}

fn planning_prompt(user_query: &str, prior_errors: &[String]) -> String {
    let mut prompt = format!("User request: {user_query}\n");
    if !prior_errors.is_empty() {
        prompt.push_str(
            "\nA previous query for this request failed validation with these errors:\n",
        );
        for error in prior_errors {
            prompt.push_str(&format!("- {error}\n"));
        }
        prompt.push_str("Write a complete new plan that avoids them.\n");
    }
    prompt
}

/// Check step numbering, CTE naming and the optional limit.
fn validate_plan_shape(plan: &AnalyticalPlan) -> std::result::Result<(), String> {
    if plan.steps.is_empty() {
        return Err("plan has no steps".to_string());
    }

    let mut previous = 0;
    let mut names = HashSet::new();
    for step in &plan.steps {
        if step.step_number <= previous {
            return Err(format!(
                "step numbers must start at 1 and increase, got {} after {}",
                step.step_number, previous
            ));
        }
        previous = step.step_number;

        if !is_identifier(&step.cte_name) {
            return Err(format!(
                "step {} has invalid cte_name '{}'",
                step.step_number, step.cte_name
            ));
        }
        if !names.insert(step.cte_name.to_ascii_lowercase()) {
            return Err(format!("cte_name '{}' is used twice", step.cte_name));
        }
    }

    if plan.final_select_details.limit == Some(0) {
        return Err("limit must be a positive integer".to_string());
    }
    Ok(())
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
