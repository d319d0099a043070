use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm: LlmSettings,
    pub corpus: CorpusSettings,
    pub retrieval: RetrievalSettings,
    pub crew: CrewSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub temperature: f64,
    /// Client-side throttle for outbound calls. `None` disables throttling.
    pub requests_per_minute: Option<u32>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            temperature: 0.1,
            requests_per_minute: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    /// Root holding the `Record` and `Textbook` sub-corpora.
    pub data_dir: Option<PathBuf>,
    pub extensions: Vec<String>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            extensions: vec!["pdf".to_string(), "txt".to_string(), "md".to_string()],
            chunk_size: 1024,
            chunk_overlap: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub similarity_top_k: usize,
    /// Upper bound on the characters packed into one tree-summarize call.
    pub summary_group_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            similarity_top_k: 2,
            summary_group_chars: 8192,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrewSettings {
    pub max_tool_calls: usize,
    pub knowledge_top_k: usize,
    pub past_question_file: Option<PathBuf>,
    pub main_material_file: Option<PathBuf>,
}

impl Default for CrewSettings {
    fn default() -> Self {
        Self {
            max_tool_calls: 5,
            knowledge_top_k: 3,
            past_question_file: None,
            main_material_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}
