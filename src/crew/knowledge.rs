//! Static material bound to an agent, or to every agent of a crew.

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::errors::{CrewError, GenerationError};
use crate::llm::LlmService;
use crate::rag::{Corpus, DocumentLoader, NodeBuilder, ScoredNode, VectorIndex};

/// A file (or files) loaded and embedded once, queried per task for relevant passages.
pub struct KnowledgeSource {
    name: String,
    index: Arc<VectorIndex>,
    llm: LlmService,
    top_k: usize,
}

impl KnowledgeSource {
    pub async fn from_files(
        name: impl Into<String>,
        paths: &[PathBuf],
        loader: &DocumentLoader,
        builder: &NodeBuilder,
        llm: &LlmService,
        top_k: usize,
    ) -> Result<Self, CrewError> {
        let name = name.into();
        let documents = loader.load_files(paths, Corpus::Knowledge).await?;
        let nodes = builder.build(&documents);
        let index = VectorIndex::build(nodes, llm)
            .await
            .map_err(|source| CrewError::KnowledgeIndex {
                name: name.clone(),
                source,
            })?;

        tracing::info!(
            "Knowledge source `{}` ready: {} document(s), {} node(s)",
            name,
            documents.len(),
            index.len()
        );
        Ok(Self::from_index(name, Arc::new(index), llm.clone(), top_k))
    }

    pub fn from_index(
        name: impl Into<String>,
        index: Arc<VectorIndex>,
        llm: LlmService,
        top_k: usize,
    ) -> Self {
        Self {
            name: name.into(),
            index,
            llm,
            top_k,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn relevant(&self, prompt: &str) -> Result<Vec<ScoredNode>, GenerationError> {
        self.index.retrieve(&self.llm, prompt, self.top_k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockProvider;
    use crate::rag::{ChunkerConfig, FsCorpusReader};

    fn loader() -> DocumentLoader {
        DocumentLoader::new(Arc::new(FsCorpusReader::new(&["txt".to_string()])))
    }

    #[tokio::test]
    async fn returns_passages_related_to_the_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("past_questions.txt");
        std::fs::write(
            &path,
            "Q1. Explain how backpropagation uses the chain rule.\n\n\
             Q2. Describe convolution kernels and stride.\n\n\
             Q3. Compare recurrent networks with transformers.",
        )
        .unwrap();

        let llm = LlmService::new(Arc::new(MockProvider::default()));
        let builder = NodeBuilder::new(ChunkerConfig {
            chunk_size: 60,
            chunk_overlap: 0,
        });
        let source = KnowledgeSource::from_files("past questions", &[path], &loader(), &builder, &llm, 1)
            .await
            .unwrap();

        let hits = source
            .relevant("backpropagation chain rule question")
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert!(hits[0].node.text.contains("backpropagation"));
        assert_eq!(hits[0].node.corpus, Corpus::Knowledge);
    }

    #[tokio::test]
    async fn missing_file_is_a_knowledge_error() {
        let llm = LlmService::new(Arc::new(MockProvider::default()));
        let builder = NodeBuilder::new(ChunkerConfig::default());

        let result = KnowledgeSource::from_files(
            "main material",
            &[PathBuf::from("/nonexistent/main.pdf")],
            &loader(),
            &builder,
            &llm,
            3,
        )
        .await;

        assert!(matches!(result, Err(CrewError::Knowledge(_))));
    }
}
