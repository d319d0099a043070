// Agent Executor
// Tool-calling loop that runs one task for one agent

use std::sync::Arc;

use serde_json::Value;

use super::agent::Agent;
use super::knowledge::KnowledgeSource;
use super::task::{Task, TaskOutput};
use crate::core::errors::GenerationError;
use crate::llm::{parse_json_from_text, ChatMessage, LlmService};

const FORCE_FINAL_MESSAGE: &str = "You have used all available tool calls. \
Respond now with your final answer as JSON: {\"type\":\"final\",\"content\":\"...\"}";

#[derive(Clone)]
pub struct AgentExecutor {
    llm: LlmService,
    max_tool_calls: usize,
    /// Sources every agent of the crew draws on, besides its own.
    crew_knowledge: Vec<Arc<KnowledgeSource>>,
}

impl AgentExecutor {
    pub fn new(llm: LlmService) -> Self {
        Self {
            llm,
            max_tool_calls: 5,
            crew_knowledge: Vec::new(),
        }
    }

    pub fn with_max_tool_calls(mut self, max_tool_calls: usize) -> Self {
        self.max_tool_calls = max_tool_calls;
        self
    }

    pub fn with_crew_knowledge(mut self, sources: Vec<Arc<KnowledgeSource>>) -> Self {
        self.crew_knowledge = sources;
        self
    }

    /// Runs `task` as `agent` and returns the agent's final answer.
    pub async fn execute(
        &self,
        agent: &Agent,
        task: &Task,
        description: &str,
        context: &[&TaskOutput],
    ) -> Result<String, GenerationError> {
        let knowledge = self.gather_knowledge(agent, description).await?;

        let mut messages = vec![
            ChatMessage::system(build_agent_instructions(agent)),
            ChatMessage::user(build_task_prompt(
                description,
                &task.expected_output,
                &knowledge,
                context,
            )),
        ];

        let mut tool_calls = 0;
        loop {
            let response = self.llm.chat(messages.clone()).await?;

            let (name, args) = match parse_agent_decision(&response) {
                AgentDecision::Final(content) => return Ok(content),
                AgentDecision::ToolCall { name, args } => (name, args),
            };

            messages.push(ChatMessage::assistant(response));

            if tool_calls >= self.max_tool_calls {
                tracing::warn!(
                    "{} exhausted {} tool call(s) on `{}`; requesting final answer",
                    agent.role,
                    self.max_tool_calls,
                    task.name
                );
                messages.push(ChatMessage::system(FORCE_FINAL_MESSAGE));
                let last = self.llm.chat(messages).await?;
                return match parse_agent_decision(&last) {
                    AgentDecision::Final(content) => Ok(content),
                    AgentDecision::ToolCall { .. } => Err(GenerationError::Failed(format!(
                        "{} did not produce a final answer for `{}`",
                        agent.role, task.name
                    ))),
                };
            }
            tool_calls += 1;

            let observation = match agent.tool(&name) {
                None => {
                    tracing::warn!("{} requested unavailable tool `{}`", agent.role, name);
                    unavailable_tool_message(agent, &name)
                }
                Some(tool) => {
                    tracing::info!(
                        "{} calling `{}` ({}/{})",
                        agent.role,
                        name,
                        tool_calls,
                        self.max_tool_calls
                    );
                    match tool.invoke(&args).await? {
                        Some(output) => format!("Tool `{}` result:\n{}", name, output),
                        None => format!(
                            "Tool `{}` was called without a usable query. Arguments must look like {}.",
                            name,
                            tool.args_hint()
                        ),
                    }
                }
            };
            messages.push(ChatMessage::system(observation));
        }
    }

    async fn gather_knowledge(
        &self,
        agent: &Agent,
        description: &str,
    ) -> Result<Vec<String>, GenerationError> {
        // Agent sources first; a crew source the agent already holds is not queried twice.
        let mut sources: Vec<&Arc<KnowledgeSource>> = agent.knowledge.iter().collect();
        for source in &self.crew_knowledge {
            if !sources.iter().any(|held| Arc::ptr_eq(*held, source)) {
                sources.push(source);
            }
        }

        let mut snippets = Vec::new();
        for source in sources {
            for hit in source.relevant(description).await? {
                snippets.push(format!("[{}] {}", source.name(), hit.node.text));
            }
        }
        Ok(snippets)
    }
}

fn build_agent_instructions(agent: &Agent) -> String {
    let persona = format!(
        "You are {role}. {backstory}\nYour personal goal is: {goal}",
        role = agent.role,
        backstory = agent.backstory,
        goal = agent.goal
    );

    if agent.tools.is_empty() {
        return format!(
            "{persona}\nYou have no tools. Answer the task directly with your complete final answer."
        );
    }

    let tools = agent
        .tools
        .iter()
        .map(|tool| {
            format!(
                "- {}: {} Arguments: {}",
                tool.name(),
                tool.description(),
                tool.args_hint()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"{persona}
You have access to the following tools:
{tools}
When you need to use a tool, respond ONLY with JSON in this format:
{{"type":"tool_call","tool_name":"<tool>","tool_args":{{...}}}}
When you have the final answer, respond ONLY with JSON in this format:
{{"type":"final","content":"..."}}
Do not include any extra text outside the JSON."#
    )
}

fn build_task_prompt(
    description: &str,
    expected_output: &str,
    knowledge: &[String],
    context: &[&TaskOutput],
) -> String {
    let mut prompt = format!("Current Task: {}\n", description);

    if !knowledge.is_empty() {
        prompt.push_str("\nRelevant knowledge:\n");
        prompt.push_str(&knowledge.join("\n\n"));
        prompt.push('\n');
    }

    if !context.is_empty() {
        prompt.push_str("\nThis is the context you're working with:\n");
        let outputs = context
            .iter()
            .map(|output| output.raw.as_str())
            .collect::<Vec<_>>()
            .join("\n\n----------\n\n");
        prompt.push_str(&outputs);
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "\nThis is the expected criteria for your final answer: {}\n\
         You MUST return the actual complete content as the final answer, not a summary.",
        expected_output
    ));
    prompt
}

fn unavailable_tool_message(agent: &Agent, name: &str) -> String {
    if agent.tools.is_empty() {
        format!(
            "Tool `{}` is not available. You have no tools; give your final answer.",
            name
        )
    } else {
        let available = agent
            .tools
            .iter()
            .map(|tool| tool.name())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Tool `{}` is not available. Available tools: {}.",
            name, available
        )
    }
}

enum AgentDecision {
    Final(String),
    ToolCall { name: String, args: Value },
}

fn parse_agent_decision(text: &str) -> AgentDecision {
    if let Some(json_value) = parse_json_from_text(text) {
        if let Some(decision) = parse_decision_from_value(&json_value) {
            return decision;
        }
    }
    AgentDecision::Final(text.trim().to_string())
}

fn parse_decision_from_value(value: &Value) -> Option<AgentDecision> {
    let action_type = value
        .get("type")
        .or_else(|| value.get("action"))
        .and_then(|v| v.as_str())
        .unwrap_or("");

    match action_type {
        "tool_call" => {
            let name = value
                .get("tool_name")
                .or_else(|| value.get("name"))
                .or_else(|| value.get("tool"))
                .and_then(|v| v.as_str())?;
            let args = value
                .get("tool_args")
                .or_else(|| value.get("args"))
                .cloned()
                .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
            Some(AgentDecision::ToolCall {
                name: name.to_string(),
                args,
            })
        }
        "final" => {
            let content = value
                .get("content")
                .or_else(|| value.get("message"))
                .or_else(|| value.get("response"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            Some(AgentDecision::Final(content))
        }
        _ => None,
    }
}
