use std::sync::Arc;

use serde_json::Value;

use super::knowledge::KnowledgeSource;
use crate::core::errors::GenerationError;
use crate::rag::QueryEngine;

/// A named persona that executes tasks. Immutable once the crew is built.
#[derive(Clone)]
pub struct Agent {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub tools: Vec<AgentTool>,
    pub knowledge: Vec<Arc<KnowledgeSource>>,
}

impl Agent {
    pub fn new(
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            tools: Vec::new(),
            knowledge: Vec::new(),
        }
    }

    pub fn with_tool(mut self, tool: AgentTool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_knowledge(mut self, source: Arc<KnowledgeSource>) -> Self {
        self.knowledge.push(source);
        self
    }

    /// The tool called `name`, if this agent holds one. Agents can only invoke their own tools.
    pub fn tool(&self, name: &str) -> Option<&AgentTool> {
        self.tools.iter().find(|tool| tool.name() == name)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("role", &self.role)
            .field(
                "tools",
                &self.tools.iter().map(AgentTool::name).collect::<Vec<_>>(),
            )
            .field("knowledge", &self.knowledge.len())
            .finish()
    }
}

#[derive(Clone)]
pub enum AgentTool {
    Retrieval(RetrievalTool),
}

impl AgentTool {
    pub fn name(&self) -> &str {
        match self {
            AgentTool::Retrieval(tool) => &tool.name,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            AgentTool::Retrieval(tool) => &tool.description,
        }
    }

    /// Argument shape shown to the model in the tool protocol.
    pub fn args_hint(&self) -> &'static str {
        match self {
            AgentTool::Retrieval(_) => r#"{"query":"<search text>"}"#,
        }
    }

    /// `Ok(None)` when the arguments carry nothing usable.
    pub async fn invoke(&self, args: &Value) -> Result<Option<String>, GenerationError> {
        match self {
            AgentTool::Retrieval(tool) => match retrieval_query(args) {
                Some(query) => tool.run(&query).await.map(Some),
                None => Ok(None),
            },
        }
    }
}

/// Wraps a query engine so an agent can look things up in the corpus.
#[derive(Clone)]
pub struct RetrievalTool {
    pub name: String,
    pub description: String,
    pub engine: Arc<dyn QueryEngine>,
}

impl RetrievalTool {
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

    pub async fn run(&self, query: &str) -> Result<String, GenerationError> {
        let response = self.engine.query(query).await?;
        Ok(response.response)
    }
}

fn retrieval_query(args: &Value) -> Option<String> {
    let query = match args {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => ["query", "question", "input"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str)),
        _ => None,
    }?;

    let query = query.trim();
    if query.is_empty() {
        None
    } else {
        Some(query.to_string())
    }
}
