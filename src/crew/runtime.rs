// Crew Runtime
// Validated task graph executed in list order

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use super::agent::Agent;
use super::executor::AgentExecutor;
use super::knowledge::KnowledgeSource;
use super::task::{Task, TaskOutput};
use crate::core::errors::CrewError;
use crate::llm::LlmService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Process {
    /// Tasks run one after another in list order.
    Sequential,
    /// A manager agent delegates tasks. Modelled but not executable.
    ManagerDelegated,
}

impl Process {
    pub fn as_str(&self) -> &'static str {
        match self {
            Process::Sequential => "sequential",
            Process::ManagerDelegated => "manager_delegated",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CrewOutput {
    /// Output of the final task.
    pub raw: String,
    pub tasks_output: Vec<TaskOutput>,
}

pub struct Crew {
    name: String,
    agents: Vec<Agent>,
    tasks: Vec<Task>,
    process: Process,
    executor: AgentExecutor,
}

impl Crew {
    pub fn builder(name: impl Into<String>) -> CrewBuilder {
        CrewBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn process(&self) -> Process {
        self.process
    }

    /// Runs every task in order. The first failure aborts the run.
    pub async fn kickoff(&self, inputs: &HashMap<String, String>) -> Result<CrewOutput, CrewError> {
        if self.process != Process::Sequential {
            return Err(CrewError::UnsupportedProcess(self.process.as_str()));
        }

        // Render up front so a missing input fails before any generation call.
        let descriptions = self
            .tasks
            .iter()
            .map(|task| task.render_description(inputs))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!("Crew `{}` starting {} task(s)", self.name, self.tasks.len());

        let mut outputs: Vec<TaskOutput> = Vec::with_capacity(self.tasks.len());
        for (task, description) in self.tasks.iter().zip(&descriptions) {
            let agent = self
                .agents
                .iter()
                .find(|agent| agent.role == task.agent)
                .ok_or_else(|| CrewError::UnknownAgent {
                    task: task.name.clone(),
                    agent: task.agent.clone(),
                })?;

            let context: Vec<&TaskOutput> = task
                .context
                .iter()
                .filter_map(|name| outputs.iter().find(|output| &output.task == name))
                .collect();

            tracing::info!("Crew `{}`: {} working on `{}`", self.name, agent.role, task.name);
            let raw = self
                .executor
                .execute(agent, task, description, &context)
                .await
                .map_err(|source| {
                    tracing::error!("Crew `{}` task `{}` failed: {}", self.name, task.name, source);
                    CrewError::Task {
                        task: task.name.clone(),
                        source,
                    }
                })?;

            outputs.push(TaskOutput {
                task: task.name.clone(),
                agent: agent.role.clone(),
                raw,
            });
        }

        let raw = outputs
            .last()
            .map(|output| output.raw.clone())
            .unwrap_or_default();
        tracing::info!("Crew `{}` finished", self.name);

        Ok(CrewOutput {
            raw,
            tasks_output: outputs,
        })
    }
}

pub struct CrewBuilder {
    name: String,
    agents: Vec<Agent>,
    tasks: Vec<Task>,
    process: Process,
    llm: Option<LlmService>,
    max_tool_calls: usize,
    knowledge: Vec<Arc<KnowledgeSource>>,
}

impl CrewBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agents: Vec::new(),
            tasks: Vec::new(),
            process: Process::Sequential,
            llm: None,
            max_tool_calls: 5,
            knowledge: Vec::new(),
        }
    }

    pub fn agent(mut self, agent: Agent) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn process(mut self, process: Process) -> Self {
        self.process = process;
        self
    }

    /// Binds a knowledge source to every agent of the crew.
    pub fn knowledge(mut self, source: Arc<KnowledgeSource>) -> Self {
        self.knowledge.push(source);
        self
    }

    pub fn llm(mut self, llm: LlmService) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn max_tool_calls(mut self, max_tool_calls: usize) -> Self {
        self.max_tool_calls = max_tool_calls;
        self
    }

    pub fn build(self) -> Result<Crew, CrewError> {
        let llm = self
            .llm
            .ok_or_else(|| CrewError::Construction(format!("crew `{}` has no LLM", self.name)))?;
        if self.tasks.is_empty() {
            return Err(CrewError::Construction(format!(
                "crew `{}` has no tasks",
                self.name
            )));
        }

        let mut roles = HashSet::new();
        for agent in &self.agents {
            if !roles.insert(agent.role.as_str()) {
                return Err(CrewError::Construction(format!(
                    "duplicate agent role `{}`",
                    agent.role
                )));
            }
        }

        validate_tasks(&self.tasks, &roles)?;

        Ok(Crew {
            name: self.name,
            agents: self.agents,
            tasks: self.tasks,
            process: self.process,
            executor: AgentExecutor::new(llm)
                .with_max_tool_calls(self.max_tool_calls)
                .with_crew_knowledge(self.knowledge),
        })
    }
}

/// Membership, uniqueness, acyclicity, then list order against context edges.
fn validate_tasks(tasks: &[Task], roles: &HashSet<&str>) -> Result<(), CrewError> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

    for task in tasks {
        if indices.contains_key(task.name.as_str()) {
            return Err(CrewError::DuplicateTask(task.name.clone()));
        }
        if !roles.contains(task.agent.as_str()) {
            return Err(CrewError::UnknownAgent {
                task: task.name.clone(),
                agent: task.agent.clone(),
            });
        }
        let idx = graph.add_node(task.name.as_str());
        indices.insert(task.name.as_str(), idx);
    }

    for task in tasks {
        let to = indices[task.name.as_str()];
        for context in &task.context {
            let from = indices.get(context.as_str()).ok_or_else(|| {
                CrewError::UnknownContextTask {
                    task: task.name.clone(),
                    context: context.clone(),
                }
            })?;
            graph.add_edge(*from, to, ());
        }
    }

    toposort(&graph, None).map_err(|cycle| CrewError::Cycle(graph[cycle.node_id()].to_string()))?;

    let position: HashMap<&str, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, task)| (task.name.as_str(), i))
        .collect();
    for (i, task) in tasks.iter().enumerate() {
        for context in &task.context {
            if position[context.as_str()] >= i {
                return Err(CrewError::OutOfOrder {
                    task: task.name.clone(),
                    context: context.clone(),
                });
            }
        }
    }

    Ok(())
}
