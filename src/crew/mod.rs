//! Agent crews: role-specialised agents executing a validated chain of tasks.

pub mod agent;
pub mod executor;
pub mod fence;
pub mod knowledge;
pub mod presets;
pub mod runtime;
pub mod task;

pub use agent::{Agent, AgentTool, RetrievalTool};
pub use executor::AgentExecutor;
pub use fence::strip_code_fence;
pub use knowledge::KnowledgeSource;
pub use presets::{QuestionSetter, TeachingAssistant};
pub use runtime::{Crew, CrewBuilder, CrewOutput, Process};
pub use task::{Task, TaskOutput};
