pub mod paths;
pub mod service;
pub mod settings;
pub mod validation;

pub use paths::AppPaths;
pub use service::ConfigService;
pub use settings::{CorpusSettings, CrewSettings, LlmSettings, RetrievalSettings, Settings};
