//! Step-wise SQL assembly
//!
//! One generation call per plan step produces one named CTE. The blocks are
//! joined under a single `WITH` and closed by a SELECT built directly from the
//! plan's projection, which never goes through the model.

use super::plan::{AnalyticalPlan, FinalSelectDetails};
use super::prompts::{GENERATOR_SYSTEM, SCHEMA_CONTEXT};
use super::response::unfence;
use crate::error::{Error, Result};
use crate::llm::{CompletionRequest, LlmClient};

/// Tables a final SELECT may read directly.
pub const BASE_TABLES: [&str; 3] = ["tracking", "matches", "events"];

/// One generated CTE block, e.g. `ball AS (SELECT ...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CteFragment {
    pub step_number: u32,
    pub cte_name: String,
    pub sql: String,
}

/// The full read-only query for one healing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledQuery {
    pub sql: String,
    pub ctes: Vec<CteFragment>,
}

pub struct SqlAssembler<'a> {
    llm: &'a dyn LlmClient,
}

impl<'a> SqlAssembler<'a> {
    pub fn new(llm: &'a dyn LlmClient) -> Self {
        Self { llm }
    }

    /// Generate every step's CTE in order and append the final SELECT.
    ///
    /// The projection is checked before any generation call so an incomplete
    /// plan costs nothing.
    pub fn assemble(&self, plan: &AnalyticalPlan, user_query: &str) -> Result<AssembledQuery> {
        let source = final_source(plan)?;
        let system = format!("{GENERATOR_SYSTEM}\n\n{SCHEMA_CONTEXT}");

        let mut ctes: Vec<CteFragment> = Vec::with_capacity(plan.steps.len());
        for step in &plan.steps {
            let prompt = step_prompt(user_query, &ctes, &step.description, &step.cte_name);
            let request = CompletionRequest::new(prompt).with_system(system.clone());
            let raw = self.llm.complete(&request)?;

            let sql = extract_cte(&raw, &step.cte_name).map_err(|message| {
                Error::UnparsableStep {
                    step: step.step_number,
                    message,
                }
            })?;
            tracing::debug!(step = step.step_number, cte = %step.cte_name, "Generated CTE");
            ctes.push(CteFragment {
                step_number: step.step_number,
                cte_name: step.cte_name.clone(),
                sql,
            });
        }

        let blocks: Vec<&str> = ctes.iter().map(|c| c.sql.as_str()).collect();
        let sql = format!(
            "WITH {}\n{}",
            blocks.join(",\n"),
            build_final_select(&plan.final_select_details, &source)
        );
        Ok(AssembledQuery { sql, ctes })
    }
}

/// Resolve the relation the final SELECT reads from.
fn final_source(plan: &AnalyticalPlan) -> Result<String> {
    let details = &plan.final_select_details;
    if details.columns.iter().all(|c| c.trim().is_empty()) {
        return Err(Error::IncompletePlan(
            "final_select_details.columns is missing or empty".to_string(),
        ));
    }

    match details.from.as_deref().map(str::trim) {
        Some(from) if !from.is_empty() => {
            let known = plan.defines(from)
                || BASE_TABLES.iter().any(|t| t.eq_ignore_ascii_case(from));
            if known {
                Ok(from.to_string())
            } else {
                Err(Error::IncompletePlan(format!(
                    "final SELECT reads from '{from}', which no step defines"
                )))
            }
        }
        _ => plan
            .last_step()
            .map(|s| s.cte_name.clone())
            .ok_or_else(|| Error::IncompletePlan("plan has no steps".to_string())),
    }
}

fn step_prompt(user_query: &str, prior: &[CteFragment], description: &str, cte_name: &str) -> String {
    let prior_text = if prior.is_empty() {
        "none".to_string()
    } else {
        prior
            .iter()
            .map(|c| c.sql.as_str())
            .collect::<Vec<_>>()
            .join(",\n")
    };
    format!(
        "Overall goal: {user_query}\n\n\
         CTEs already written:\n{prior_text}\n\n\
         This step: {description}\n\
         Write exactly one CTE named {cte_name}."
    )
}

/// `SELECT cols FROM source [ORDER BY col DIR] [LIMIT n]`
pub fn build_final_select(details: &FinalSelectDetails, source: &str) -> String {
    let columns: Vec<&str> = details
        .columns
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    let mut sql = format!("SELECT {} FROM {}", columns.join(", "), source);
    if let Some(order) = &details.order_by {
        sql.push_str(&format!(" ORDER BY {} {}", order.column, order.direction.as_sql()));
    }
    if let Some(limit) = details.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    sql
}

// ============================================
// CTE extraction
// ============================================

/// Pull the single `<expected_name> AS ( ... )` block out of a generation response.
///
/// The response may be fenced and may start with a stray `WITH`. Apart from
/// comments and one trailing `,` or `;`, the block must be the whole response,
/// and it must carry the expected name (case-insensitive).
pub(crate) fn extract_cte(raw: &str, expected_name: &str) -> std::result::Result<String, String> {
    let body = unfence(raw)?;
    let bytes = body.as_bytes();

    let mut i = skip_trivia(bytes, 0);
    if keyword_at(bytes, i, b"with") {
        i = skip_trivia(bytes, i + 4);
    }
    if i >= bytes.len() {
        return Err("no `<name> AS ( ... )` block found".to_string());
    }
    if !is_ident_start(bytes[i]) {
        return Err(format!("unexpected text before the CTE block at byte {i}"));
    }

    let start = i;
    while i < bytes.len() && is_ident_char(bytes[i]) {
        i += 1;
    }
    let name = &body[start..i];

    let after_name = skip_trivia(bytes, i);
    if !keyword_at(bytes, after_name, b"as") {
        return Err(format!("expected `{name} AS (`, found other text"));
    }
    let open = skip_trivia(bytes, after_name + 2);
    if bytes.get(open) != Some(&b'(') {
        return Err(format!("expected `(` after `{name} AS`"));
    }
    let close = skip_group(bytes, open)?;

    let mut rest = skip_trivia(bytes, close);
    if matches!(bytes.get(rest), Some(b',' | b';')) {
        rest = skip_trivia(bytes, rest + 1);
    }
    if rest < bytes.len() {
        return Err(format!("unexpected text after the CTE block at byte {rest}"));
    }

    if !name.eq_ignore_ascii_case(expected_name) {
        return Err(format!("expected CTE '{expected_name}', found '{name}'"));
    }
    Ok(body[start..close].to_string())
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Case-insensitive keyword at `i`, not followed by an identifier character.
fn keyword_at(bytes: &[u8], i: usize, keyword: &[u8]) -> bool {
    let end = i + keyword.len();
    end <= bytes.len()
        && bytes[i..end].eq_ignore_ascii_case(keyword)
        && bytes.get(end).map_or(true, |b| !is_ident_char(*b))
}

/// Skip whitespace, `-- line` and `/* block */` comments.
fn skip_trivia(bytes: &[u8], mut i: usize) -> usize {
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if bytes[i..].starts_with(b"--") {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
        } else if bytes[i..].starts_with(b"/*") {
            match find(bytes, i + 2, b"*/") {
                Some(end) => i = end + 2,
                None => return bytes.len(),
            }
        } else {
            return i;
        }
    }
}

fn find(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Index just past the quote closing the one at `start`. Doubled quotes are literal.
fn skip_quoted(bytes: &[u8], start: usize) -> std::result::Result<usize, String> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Ok(i + 1);
        }
        i += 1;
    }
    Err("unterminated quoted text".to_string())
}

/// Index just past the `)` matching the `(` at `start`.
fn skip_group(bytes: &[u8], start: usize) -> std::result::Result<usize, String> {
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        i = skip_trivia(bytes, i);
        if i >= bytes.len() {
            break;
        }
        match bytes[i] {
            b'(' => {
                depth += 1;
                i += 1;
            }
            b')' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            b'\'' | b'"' | b'`' => i = skip_quoted(bytes, i)?,
            _ => i += 1,
        }
    }
    Err("unbalanced parentheses".to_string())
}
