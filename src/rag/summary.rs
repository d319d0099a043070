//! Summary index: keeps every node and answers by tree-reduce summarization.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join_all;

use super::chunker::NodeSet;
use super::engine::{fill_template, QueryEngine, QueryResponse, ScoredNode};
use crate::core::errors::GenerationError;
use crate::llm::LlmService;

const TREE_SUMMARIZE_PROMPT: &str = "Context information from multiple sources is below.\n\
---------------------\n\
{context}\n\
---------------------\n\
Given the information from multiple sources and not prior knowledge, answer the query.\n\
Query: {query}\n\
Answer: ";

pub struct SummaryIndex {
    nodes: NodeSet,
}

impl SummaryIndex {
    pub fn new(nodes: NodeSet) -> Self {
        tracing::info!("Summary index built over {} node(s)", nodes.len());
        Self { nodes }
    }

    pub fn nodes(&self) -> &NodeSet {
        &self.nodes
    }
}

pub struct TreeSummarizeEngine {
    index: Arc<SummaryIndex>,
    llm: LlmService,
    group_chars: usize,
}

impl TreeSummarizeEngine {
    pub fn new(index: Arc<SummaryIndex>, llm: LlmService, group_chars: usize) -> Self {
        Self {
            index,
            llm,
            group_chars: group_chars.max(1),
        }
    }

    /// Summarise groups concurrently, then the summaries, until one answer remains.
    async fn tree_summarize(
        &self,
        query: &str,
        mut texts: Vec<String>,
    ) -> Result<String, GenerationError> {
        let mut level = 0;
        loop {
            let groups = pack_groups(&texts, self.group_chars);
            if groups.len() <= 1 {
                let last = groups.into_iter().next().unwrap_or_default();
                return self.summarize_group(query, &last).await;
            }

            tracing::debug!(
                "Tree summarize level {}: {} text(s) in {} group(s)",
                level,
                texts.len(),
                groups.len()
            );
            texts = try_join_all(groups.iter().map(|group| self.summarize_group(query, group)))
                .await?;
            level += 1;
        }
    }

    async fn summarize_group(&self, query: &str, group: &[String]) -> Result<String, GenerationError> {
        let context = group.join("\n\n");
        let prompt = fill_template(
            TREE_SUMMARIZE_PROMPT,
            &[("context", context.as_str()), ("query", query)],
        );
        self.llm.generate(&prompt, None).await
    }
}

#[async_trait]
impl QueryEngine for TreeSummarizeEngine {
    fn name(&self) -> &str {
        "summary"
    }

    async fn query(&self, query: &str) -> Result<QueryResponse, GenerationError> {
        let nodes = self.index.nodes();
        if nodes.is_empty() {
            return Ok(QueryResponse::empty());
        }

        let texts = nodes.iter().map(|n| n.text.clone()).collect();
        let response = self.tree_summarize(query, texts).await?;

        // Every node contributes; there is no similarity ranking.
        let source_nodes = nodes
            .iter()
            .map(|node| ScoredNode {
                node: node.clone(),
                score: 1.0,
            })
            .collect();

        Ok(QueryResponse {
            response,
            source_nodes,
        })
    }
}

/// Greedy packing under `budget` chars. A group always takes at least two texts
/// when more remain, so each level at least halves the count.
fn pack_groups(texts: &[String], budget: usize) -> Vec<Vec<String>> {
    let mut groups = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0;

    for text in texts {
        let len = text.chars().count();
        if current.len() >= 2 && current_len + len > budget {
            groups.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current_len += len;
        current.push(text.clone());
    }
    if !current.is_empty() {
        groups.push(current);
    }

    groups
}
