use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::core::errors::CrewError;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("placeholder pattern is valid"));

/// A unit of work bound to one agent (by role). `context` names earlier tasks
/// whose outputs are handed to this one.
#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    pub description: String,
    pub expected_output: String,
    pub agent: String,
    pub context: Vec<String>,
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        expected_output: impl Into<String>,
        agent: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            expected_output: expected_output.into(),
            agent: agent.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, task_name: impl Into<String>) -> Self {
        self.context.push(task_name.into());
        self
    }

    /// Placeholder names in the description, in order of appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        PLACEHOLDER
            .captures_iter(&self.description)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// Substitutes `{name}` placeholders from `inputs`.
    pub fn render_description(
        &self,
        inputs: &HashMap<String, String>,
    ) -> Result<String, CrewError> {
        if let Some(missing) = self
            .placeholders()
            .into_iter()
            .find(|name| !inputs.contains_key(*name))
        {
            return Err(CrewError::MissingInput(missing.to_string()));
        }

        Ok(PLACEHOLDER
            .replace_all(&self.description, |caps: &regex::Captures<'_>| {
                inputs.get(&caps[1]).cloned().unwrap_or_default()
            })
            .into_owned())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskOutput {
    pub task: String,
    pub agent: String,
    pub raw: String,
}
