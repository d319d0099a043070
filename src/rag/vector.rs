//! Vector index: exact nearest-neighbour search over node embeddings.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use ndarray::ArrayView1;

use super::chunker::NodeSet;
use super::engine::{fill_template, format_context, QueryEngine, QueryResponse, ScoredNode};
use crate::core::errors::GenerationError;
use crate::llm::LlmService;

const TEXT_QA_PROMPT: &str = "Context information is below.\n\
---------------------\n\
{context}\n\
---------------------\n\
Given the context information and not prior knowledge, answer the query.\n\
Query: {query}\n\
Answer: ";

/// Cosine similarity; mismatched or empty vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let a = ArrayView1::from(a);
    let b = ArrayView1::from(b);
    let denom = a.dot(&a).sqrt() * b.dot(&b).sqrt();
    if denom <= f32::EPSILON {
        return 0.0;
    }
    a.dot(&b) / denom
}

/// `(candidate index, score)` sorted by descending score; ties keep candidate order.
pub fn rank_descending_by_cosine(query: &[f32], candidates: &[Vec<f32>]) -> Vec<(usize, f32)> {
    let mut scores: Vec<(usize, f32)> = candidates
        .iter()
        .enumerate()
        .map(|(idx, candidate)| (idx, cosine_similarity(query, candidate)))
        .collect();

    scores.sort_by(|left, right| right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal));
    scores
}

pub struct VectorIndex {
    nodes: NodeSet,
    embeddings: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Embeds every node once. Fails if the embedding capability fails.
    pub async fn build(nodes: NodeSet, llm: &LlmService) -> Result<Self, GenerationError> {
        let texts: Vec<String> = nodes.iter().map(|n| n.text.clone()).collect();
        let embeddings = llm.embed_batch(&texts).await?;
        tracing::info!("Vector index built over {} node(s)", nodes.len());
        Ok(Self { nodes, embeddings })
    }

    pub fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// At most `k` nodes, most similar first.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Vec<ScoredNode> {
        rank_descending_by_cosine(query_embedding, &self.embeddings)
            .into_iter()
            .take(k)
            .map(|(idx, score)| ScoredNode {
                node: self.nodes[idx].clone(),
                score,
            })
            .collect()
    }

    pub async fn retrieve(
        &self,
        llm: &LlmService,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredNode>, GenerationError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let query_embedding = llm.embed(query).await?;
        Ok(self.search(&query_embedding, k))
    }
}

/// Top-k retrieval followed by answer synthesis over the retrieved nodes.
pub struct VectorQueryEngine {
    index: Arc<VectorIndex>,
    llm: LlmService,
    similarity_top_k: usize,
}

impl VectorQueryEngine {
    pub fn new(index: Arc<VectorIndex>, llm: LlmService, similarity_top_k: usize) -> Self {
        Self {
            index,
            llm,
            similarity_top_k,
        }
    }
}

#[async_trait]
impl QueryEngine for VectorQueryEngine {
    fn name(&self) -> &str {
        "vector"
    }

    async fn query(&self, query: &str) -> Result<QueryResponse, GenerationError> {
        let source_nodes = self
            .index
            .retrieve(&self.llm, query, self.similarity_top_k)
            .await?;
        if source_nodes.is_empty() {
            return Ok(QueryResponse::empty());
        }

        tracing::debug!(
            "Vector engine retrieved {} node(s): {:?}",
            source_nodes.len(),
            source_nodes.iter().map(|n| n.node.id.as_str()).collect::<Vec<_>>()
        );

        let context = format_context(source_nodes.iter().map(|n| &n.node));
        let prompt = fill_template(
            TEXT_QA_PROMPT,
            &[("context", context.as_str()), ("query", query)],
        );
        let response = self.llm.generate(&prompt, None).await?;

        Ok(QueryResponse {
            response,
            source_nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockProvider;
    use crate::rag::chunker::Node;
    use crate::rag::document::{Corpus, DocumentId};

    fn approx_eq(left: f32, right: f32) -> bool {
        (left - right).abs() < 1e-5
    }

    fn node(id: &str, text: &str) -> Node {
        Node {
            id: id.to_string(),
            text: text.to_string(),
            document_id: DocumentId(format!("Textbook/{}", id)),
            corpus: Corpus::Textbook,
            file_name: format!("{}.txt", id),
            page: None,
            chunk_index: 0,
            start_offset: 0,
        }
    }

    fn nodes() -> NodeSet {
        NodeSet::new(vec![
            node("cnn", "Convolutional networks share kernels across image positions."),
            node("backprop", "Backpropagation applies the chain rule to compute gradients."),
            node("rnn", "Recurrent networks unroll over time steps of a sequence."),
            node("sgd", "Stochastic gradient descent updates weights using gradients."),
        ])
    }

    #[test]
    fn cosine_is_one_for_identical_vectors() {
        let vec = vec![1.0, 2.0, 3.0, 4.0];
        assert!(approx_eq(cosine_similarity(&vec, &vec), 1.0));
    }

    #[test]
    fn cosine_is_zero_for_orthogonal_or_mismatched_vectors() {
        assert!(approx_eq(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0));
        assert!(approx_eq(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0));
        assert!(approx_eq(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0));
    }

    #[test]
    fn ranking_returns_highest_similarity_first() {
        let query = vec![1.0, 0.0];
        let candidates = vec![vec![0.8, 0.2], vec![0.1, 0.9], vec![0.9, 0.0]];
        let ranked = rank_descending_by_cosine(&query, &candidates);

        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].0, 2);
        assert_eq!(ranked[2].0, 1);
    }

    #[tokio::test]
    async fn search_returns_at_most_k_in_descending_order() {
        let llm = LlmService::new(Arc::new(MockProvider::default()));
        let index = VectorIndex::build(nodes(), &llm).await.unwrap();

        for k in [1, 2, 3, 10] {
            let results = index
                .retrieve(&llm, "How does backpropagation compute gradients?", k)
                .await
                .unwrap();
            assert!(results.len() <= k);
            assert_eq!(results.len(), k.min(4));
            assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        }

        let best = index
            .retrieve(&llm, "backpropagation chain rule gradients", 1)
            .await
            .unwrap();
        assert_eq!(best[0].node.id, "backprop");
    }

    #[tokio::test]
    async fn query_engine_synthesizes_from_retrieved_nodes() {
        let mock = MockProvider::with_responses(vec!["It uses the chain rule."]);
        let llm = LlmService::new(Arc::new(mock.clone()));
        let index = Arc::new(VectorIndex::build(nodes(), &llm).await.unwrap());
        let engine = VectorQueryEngine::new(index, llm, 2);

        let response = engine
            .query("What is backpropagation chain rule?")
            .await
            .unwrap();

        assert_eq!(response.response, "It uses the chain rule.");
        assert_eq!(response.source_nodes.len(), 2);
        let prompt = mock.requests()[0].transcript();
        assert!(prompt.contains("Backpropagation applies the chain rule"));
        assert!(prompt.contains("Query: What is backpropagation chain rule?"));
    }

    #[tokio::test]
    async fn empty_index_answers_without_calling_the_llm() {
        let mock = MockProvider::default();
        let llm = LlmService::new(Arc::new(mock.clone()));
        let index = Arc::new(VectorIndex::build(NodeSet::new(Vec::new()), &llm).await.unwrap());
        let engine = VectorQueryEngine::new(index, llm, 2);

        let response = engine.query("anything").await.unwrap();

        assert_eq!(response.response, crate::rag::engine::EMPTY_RESPONSE);
        assert_eq!(mock.chat_calls(), 0);
    }

    #[tokio::test]
    async fn embedding_failure_fails_the_build() {
        let mock = MockProvider::default()
            .failing_embeddings(GenerationError::RateLimited("429".to_string()));
        let llm = LlmService::new(Arc::new(mock));

        let err = VectorIndex::build(nodes(), &llm).await.err().unwrap();
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn braces_in_corpus_text_do_not_pull_in_the_query() {
        let mock = MockProvider::with_responses(vec!["ok"]);
        let llm = LlmService::new(Arc::new(mock.clone()));
        let set = NodeSet::new(vec![node("fmt", "Python uses {query} style format strings.")]);
        let index = Arc::new(VectorIndex::build(set, &llm).await.unwrap());
        let engine = VectorQueryEngine::new(index, llm, 1);

        engine.query("What are format strings?").await.unwrap();

        let prompt = mock.requests()[0].transcript();
        assert!(prompt.contains("Python uses {query} style format strings."));
        assert_eq!(prompt.matches("What are format strings?").count(), 1);
    }
}
