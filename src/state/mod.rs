use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::core::errors::{AnswerError, ConfigError, CrewError, InitializationError};
use crate::crew::{KnowledgeSource, QuestionSetter, TeachingAssistant};
use crate::history::HistoryStore;
use crate::llm::LlmService;
use crate::rag::{
    ChunkerConfig, DocumentLoader, FsCorpusReader, NodeBuilder, RagIndices, RouterQueryEngine,
    VectorQueryEngine,
};

/// Which pipeline answers a student question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerMode {
    /// Agent crew (Knowledge Expert -> Advisor -> Web Designer)
    #[serde(rename = "crewai")]
    Crew,
    /// Router over the summary and vector engines
    #[serde(rename = "llama")]
    Router,
}

impl AnswerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerMode::Crew => "crewai",
            AnswerMode::Router => "llama",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "crewai" => Some(AnswerMode::Crew),
            "llama" => Some(AnswerMode::Router),
            _ => None,
        }
    }
}

impl fmt::Display for AnswerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Global application state shared across all routes.
///
/// Everything here is built once at startup and read-only afterwards,
/// except the history files.
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub settings: Arc<Settings>,
    pub llm: LlmService,
    pub router: RouterQueryEngine,
    pub teaching_assistant: TeachingAssistant,
    pub question_setter: QuestionSetter,
    pub history: HistoryStore,
    pub node_count: usize,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Loads configuration and builds the full pipeline against the configured provider.
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let settings = ConfigService::new(paths.clone()).load_settings()?;
        let llm = LlmService::from_settings(&settings.llm);
        Self::build(paths, settings, llm).await
    }

    /// Corpus, nodes, indices, router, crews, history. Any failure aborts startup.
    pub async fn build(
        paths: Arc<AppPaths>,
        settings: Settings,
        llm: LlmService,
    ) -> Result<Arc<Self>, InitializationError> {
        let loader = DocumentLoader::new(Arc::new(FsCorpusReader::new(
            &settings.corpus.extensions,
        )));
        let builder = NodeBuilder::new(ChunkerConfig {
            chunk_size: settings.corpus.chunk_size,
            chunk_overlap: settings.corpus.chunk_overlap,
        });

        let data_dir = settings
            .corpus
            .data_dir
            .clone()
            .unwrap_or_else(|| paths.default_data_dir.clone());
        tracing::info!("Loading corpus from {}", data_dir.display());
        let documents = loader.load_corpus(&data_dir).await?;

        let nodes = builder.build(&documents);
        tracing::info!(
            "Built {} node(s) from {} document(s), fingerprint {}",
            nodes.len(),
            documents.len(),
            nodes.fingerprint()
        );
        let node_count = nodes.len();

        let indices = RagIndices::build(nodes, &llm).await?;
        let router = indices.router(&llm, &settings.retrieval);

        let lookup = VectorQueryEngine::new(
            indices.vector.clone(),
            llm.clone(),
            settings.retrieval.similarity_top_k,
        );
        let teaching_assistant =
            TeachingAssistant::new(Arc::new(lookup), llm.clone(), settings.crew.max_tool_calls)?;

        let main_material_file = settings.crew.main_material_file.clone().ok_or_else(|| {
            ConfigError::Invalid("crew.main_material_file must be set".to_string())
        })?;
        let past_question_file = settings.crew.past_question_file.clone().ok_or_else(|| {
            ConfigError::Invalid("crew.past_question_file must be set".to_string())
        })?;

        let main_material = KnowledgeSource::from_files(
            "main material",
            &[main_material_file],
            &loader,
            &builder,
            &llm,
            settings.crew.knowledge_top_k,
        )
        .await?;
        let past_questions = KnowledgeSource::from_files(
            "past questions",
            &[past_question_file],
            &loader,
            &builder,
            &llm,
            settings.crew.knowledge_top_k,
        )
        .await?;
        let question_setter = QuestionSetter::new(
            Arc::new(main_material),
            Arc::new(past_questions),
            llm.clone(),
            settings.crew.max_tool_calls,
        )?;

        let history = HistoryStore::new(&paths.history_dir)
            .await
            .map_err(InitializationError::History)?;

        tracing::info!("Study assistant ready (provider: {})", llm.provider_name());

        Ok(Arc::new(AppState {
            paths,
            settings: Arc::new(settings),
            llm,
            router,
            teaching_assistant,
            question_setter,
            history,
            node_count,
            started_at: Utc::now(),
        }))
    }

    pub async fn answer(&self, question: &str, mode: AnswerMode) -> Result<String, AnswerError> {
        match mode {
            AnswerMode::Crew => Ok(self.teaching_assistant.invoke(question).await?),
            AnswerMode::Router => Ok(self.router.query(question).await?.response),
        }
    }

    pub async fn generate_questions(&self) -> Result<String, CrewError> {
        self.question_setter.invoke().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockProvider;
    use std::path::Path;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn settings_for(root: &Path) -> Settings {
        let mut settings = Settings::default();
        settings.llm.api_key = "sk-test".to_string();
        settings.corpus.data_dir = Some(root.join("data"));
        settings.crew.main_material_file = Some(root.join("knowledge/main.txt"));
        settings.crew.past_question_file = Some(root.join("knowledge/past.txt"));
        settings
    }

    fn seed(root: &Path) {
        write(
            &root.join("data/Record/lecture1.txt"),
            "Backpropagation applies the chain rule to compute gradients.",
        );
        write(
            &root.join("data/Textbook/chapter3.txt"),
            "Chapter 3 introduces convolutional neural networks.",
        );
        write(&root.join("knowledge/main.txt"), "Entropy. Gradient descent. Regularization.");
        write(&root.join("knowledge/past.txt"), "Q1. Define entropy.");
    }

    #[test]
    fn answer_mode_uses_form_values() {
        assert_eq!(AnswerMode::parse("crewai"), Some(AnswerMode::Crew));
        assert_eq!(AnswerMode::parse("llama"), Some(AnswerMode::Router));
        assert_eq!(AnswerMode::parse("gpt"), None);
        assert_eq!(serde_json::to_string(&AnswerMode::Router).unwrap(), "\"llama\"");
    }

    #[tokio::test]
    async fn builds_and_answers_through_the_router() {
        let root = tempfile::tempdir().unwrap();
        seed(root.path());
        let mock = MockProvider::default().with_responder(|request| {
            if request.transcript().contains("Some choices are given below") {
                Ok(r#"{"choice": 1, "reason": "summary"}"#.to_string())
            } else {
                Ok("The course covers backpropagation and CNNs.".to_string())
            }
        });

        let state = AppState::build(
            Arc::new(AppPaths::from_root(root.path().to_path_buf())),
            settings_for(root.path()),
            LlmService::new(Arc::new(mock)),
        )
        .await
        .unwrap();

        assert_eq!(state.node_count, 2);
        let answer = state
            .answer("Summarize the course", AnswerMode::Router)
            .await
            .unwrap();
        assert_eq!(answer, "The course covers backpropagation and CNNs.");
    }

    #[tokio::test]
    async fn missing_corpus_aborts_startup() {
        let root = tempfile::tempdir().unwrap();
        let result = AppState::build(
            Arc::new(AppPaths::from_root(root.path().to_path_buf())),
            settings_for(root.path()),
            LlmService::new(Arc::new(MockProvider::default())),
        )
        .await;

        assert!(matches!(result, Err(InitializationError::Corpus(_))));
    }

    #[tokio::test]
    async fn missing_knowledge_file_aborts_startup() {
        let root = tempfile::tempdir().unwrap();
        seed(root.path());
        std::fs::remove_file(root.path().join("knowledge/past.txt")).unwrap();

        let result = AppState::build(
            Arc::new(AppPaths::from_root(root.path().to_path_buf())),
            settings_for(root.path()),
            LlmService::new(Arc::new(MockProvider::default())),
        )
        .await;

        assert!(matches!(
            result,
            Err(InitializationError::Crew(CrewError::Knowledge(_)))
        ));
    }
}
