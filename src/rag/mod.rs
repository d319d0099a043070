//! Retrieval-augmented generation over the lecture corpus.
//!
//! - `document`: loads `Record` and `Textbook` files into documents
//! - `chunker`: splits documents into deterministic nodes
//! - `vector` / `summary`: the two indices and their query engines
//! - `router`: routes a query to exactly one engine

pub mod chunker;
pub mod document;
pub mod engine;
pub mod router;
pub mod summary;
pub mod vector;

use std::sync::Arc;

pub use chunker::{ChunkerConfig, Node, NodeBuilder, NodeSet};
pub use document::{Corpus, CorpusReader, Document, DocumentLoader, FsCorpusReader};
pub use engine::{QueryEngine, QueryResponse, ScoredNode, EMPTY_RESPONSE};
pub use router::{LlmSelector, QueryEngineTool, RouterQueryEngine, Selector};
pub use summary::{SummaryIndex, TreeSummarizeEngine};
pub use vector::{VectorIndex, VectorQueryEngine};

use crate::core::config::RetrievalSettings;
use crate::core::errors::GenerationError;
use crate::llm::LlmService;

pub const SUMMARY_TOOL_DESCRIPTION: &str =
    "Useful for summarization questions related to the data source";
pub const VECTOR_TOOL_DESCRIPTION: &str =
    "Useful for retrieving specific context related to the data source";

/// Both indices over one node set, built once at startup and shared read-only.
pub struct RagIndices {
    pub summary: Arc<SummaryIndex>,
    pub vector: Arc<VectorIndex>,
}

impl RagIndices {
    pub async fn build(nodes: NodeSet, llm: &LlmService) -> Result<Self, GenerationError> {
        let vector = Arc::new(VectorIndex::build(nodes.clone(), llm).await?);
        let summary = Arc::new(SummaryIndex::new(nodes));
        Ok(Self { summary, vector })
    }

    /// Router over the summary engine (option 1) and the vector engine (option 2).
    pub fn router(&self, llm: &LlmService, retrieval: &RetrievalSettings) -> RouterQueryEngine {
        let summary_engine = TreeSummarizeEngine::new(
            self.summary.clone(),
            llm.clone(),
            retrieval.summary_group_chars,
        );
        let vector_engine = VectorQueryEngine::new(
            self.vector.clone(),
            llm.clone(),
            retrieval.similarity_top_k,
        );

        RouterQueryEngine::new(
            vec![
                QueryEngineTool::new(
                    "summary_tool",
                    SUMMARY_TOOL_DESCRIPTION,
                    Arc::new(summary_engine),
                ),
                QueryEngineTool::new("vector_tool", VECTOR_TOOL_DESCRIPTION, Arc::new(vector_engine)),
            ],
            Arc::new(LlmSelector::new(llm.clone())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockProvider;
    use crate::rag::document::DocumentId;

    fn nodes() -> NodeSet {
        let docs = vec![Document {
            id: DocumentId("Record/lecture1.txt".to_string()),
            text: "Backpropagation applies the chain rule. Dropout randomly zeroes activations."
                .to_string(),
            corpus: Corpus::Record,
            file_name: "lecture1.txt".to_string(),
            page: None,
        }];
        NodeBuilder::new(ChunkerConfig::default()).build(&docs)
    }

    #[tokio::test]
    async fn router_registers_summary_then_vector() {
        let llm = LlmService::new(Arc::new(MockProvider::default()));
        let indices = RagIndices::build(nodes(), &llm).await.unwrap();
        let router = indices.router(&llm, &RetrievalSettings::default());

        let names: Vec<_> = router.tools().iter().map(|t| t.engine.name()).collect();
        assert_eq!(names, vec!["summary", "vector"]);
        assert_eq!(router.tools()[0].description, SUMMARY_TOOL_DESCRIPTION);
    }

    #[tokio::test]
    async fn end_to_end_lookup_goes_through_vector_engine() {
        let mock = MockProvider::default().with_responder(|request| {
            let prompt = request.transcript();
            if prompt.contains("Some choices are given below") {
                Ok(r#"{"choice": 2, "reason": "specific"}"#.to_string())
            } else {
                Ok("Dropout zeroes activations at random.".to_string())
            }
        });
        let llm = LlmService::new(Arc::new(mock.clone()));
        let indices = RagIndices::build(nodes(), &llm).await.unwrap();
        let router = indices.router(&llm, &RetrievalSettings::default());

        let response = router.query("What does dropout do?").await.unwrap();

        assert_eq!(response.response, "Dropout zeroes activations at random.");
        assert_eq!(response.source_nodes.len(), 1);
        assert_eq!(mock.chat_calls(), 2);
    }
}
