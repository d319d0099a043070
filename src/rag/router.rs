//! Router query engine: an LLM picks exactly one registered engine per query.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::engine::{fill_template, QueryEngine, QueryResponse};
use crate::core::errors::{QueryError, SelectionError};
use crate::llm::{parse_json_from_text, LlmService};

const SINGLE_SELECT_PROMPT: &str = "Some choices are given below. It is provided in a numbered list \
(1 to {num_choices}), where each item in the list corresponds to a summary.\n\
---------------------\n\
{choices}\n\
---------------------\n\
Using only the choices above and not prior knowledge, return the choice that is most relevant \
to the question: '{query}'\n\n\
Respond with a single JSON object and nothing else, in the form \
{\"choice\": <number of the choice>, \"reason\": \"<one sentence>\"}.";

/// A query engine plus the natural-language description the selector sees.
#[derive(Clone)]
pub struct QueryEngineTool {
    pub name: String,
    pub description: String,
    pub engine: Arc<dyn QueryEngine>,
}

impl QueryEngineTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        engine: Arc<dyn QueryEngine>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            engine,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// 0-based index into the option list
    pub index: usize,
    pub reason: String,
}

#[async_trait]
pub trait Selector: Send + Sync {
    /// Picks exactly one of `options` (descriptions) for `query`.
    async fn select(&self, query: &str, options: &[String]) -> Result<Selection, SelectionError>;
}

pub struct LlmSelector {
    llm: LlmService,
}

impl LlmSelector {
    pub fn new(llm: LlmService) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Selector for LlmSelector {
    async fn select(&self, query: &str, options: &[String]) -> Result<Selection, SelectionError> {
        if options.is_empty() {
            return Err(SelectionError::NoOptions);
        }

        let choices = options
            .iter()
            .enumerate()
            .map(|(i, description)| format!("({}) {}", i + 1, description))
            .collect::<Vec<_>>()
            .join("\n\n");
        let num_choices = options.len().to_string();
        let prompt = fill_template(
            SINGLE_SELECT_PROMPT,
            &[
                ("num_choices", num_choices.as_str()),
                ("choices", choices.as_str()),
                ("query", query),
            ],
        );

        let raw = self.llm.generate(&prompt, None).await?;
        parse_selection(&raw, options.len())
    }
}

fn parse_selection(raw: &str, options: usize) -> Result<Selection, SelectionError> {
    let value =
        parse_json_from_text(raw).ok_or_else(|| SelectionError::Unparseable(raw.to_string()))?;

    let choice = match value.get("choice") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| SelectionError::Unparseable(raw.to_string()))?;

    if choice < 1 || choice as usize > options {
        return Err(SelectionError::OutOfRange { choice, options });
    }

    let reason = value
        .get("reason")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    Ok(Selection {
        index: (choice - 1) as usize,
        reason,
    })
}

/// Double and typographic quotes break the selector's quoted prompt.
pub fn normalize_quotes(query: &str) -> String {
    query.replace(['"', '\u{201C}', '\u{201D}'], "'")
}

pub struct RouterQueryEngine {
    tools: Vec<QueryEngineTool>,
    selector: Arc<dyn Selector>,
}

impl RouterQueryEngine {
    pub fn new(tools: Vec<QueryEngineTool>, selector: Arc<dyn Selector>) -> Self {
        Self { tools, selector }
    }

    pub fn tools(&self) -> &[QueryEngineTool] {
        &self.tools
    }

    /// Selects one engine and returns its answer unmodified. No fallback, no retry.
    pub async fn query(&self, query: &str) -> Result<QueryResponse, QueryError> {
        if self.tools.is_empty() {
            return Err(SelectionError::NoOptions.into());
        }

        let query = normalize_quotes(query);
        let descriptions: Vec<String> =
            self.tools.iter().map(|t| t.description.clone()).collect();

        let selection = self.selector.select(&query, &descriptions).await?;
        let tool = self.tools.get(selection.index).ok_or_else(|| {
            SelectionError::OutOfRange {
                choice: selection.index as i64 + 1,
                options: self.tools.len(),
            }
        })?;

        tracing::info!(
            "Router selected `{}` ({} engine): {}",
            tool.name,
            tool.engine.name(),
            selection.reason
        );

        Ok(tool.engine.query(&query).await?)
    }
}
