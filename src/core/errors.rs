use std::path::PathBuf;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Corpus could not be read. Fatal at startup.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("corpus directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("corpus path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to extract text from {}: {message}", path.display())]
    Pdf { path: PathBuf, message: String },

    #[error("no documents with a recognised extension were found")]
    EmptyCorpus,
}

/// Failure of the generation or embedding capability.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("generation failed: {0}")]
    Failed(String),
}

impl GenerationError {
    pub fn failed<E: std::fmt::Display>(err: E) -> Self {
        GenerationError::Failed(err.to_string())
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GenerationError::RateLimited(_))
    }
}

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("no query engines registered")]
    NoOptions,

    #[error("selector returned an unparseable choice: {0}")]
    Unparseable(String),

    #[error("selector chose option {choice} but only {options} are registered")]
    OutOfRange { choice: i64, options: usize },

    #[error("selector call failed: {0}")]
    Generation(#[from] GenerationError),
}

/// Failure of a routed RAG query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl QueryError {
    pub fn is_rate_limited(&self) -> bool {
        match self {
            QueryError::Generation(err) => err.is_rate_limited(),
            QueryError::Selection(SelectionError::Generation(err)) => err.is_rate_limited(),
            QueryError::Selection(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum CrewError {
    #[error("invalid crew: {0}")]
    Construction(String),

    #[error("task `{task}` is bound to agent `{agent}` which is not a crew member")]
    UnknownAgent { task: String, agent: String },

    #[error("task `{task}` lists unknown context task `{context}`")]
    UnknownContextTask { task: String, context: String },

    #[error("duplicate task name `{0}`")]
    DuplicateTask(String),

    #[error("task context graph contains a cycle through `{0}`")]
    Cycle(String),

    #[error("task `{task}` is scheduled before its context task `{context}`")]
    OutOfOrder { task: String, context: String },

    #[error("missing input `{0}` for task description")]
    MissingInput(String),

    #[error("process `{0}` is not supported")]
    UnsupportedProcess(&'static str),

    #[error("task `{task}` failed: {source}")]
    Task {
        task: String,
        #[source]
        source: GenerationError,
    },

    #[error("failed to load knowledge source: {0}")]
    Knowledge(#[from] LoadError),

    #[error("failed to index knowledge source `{name}`: {source}")]
    KnowledgeIndex {
        name: String,
        #[source]
        source: GenerationError,
    },
}

impl CrewError {
    pub fn is_rate_limited(&self) -> bool {
        match self {
            CrewError::Task { source, .. } | CrewError::KnowledgeIndex { source, .. } => {
                source.is_rate_limited()
            }
            _ => false,
        }
    }
}

/// Failure of either answering pipeline.
#[derive(Debug, Error)]
pub enum AnswerError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Crew(#[from] CrewError),
}

impl AnswerError {
    pub fn is_rate_limited(&self) -> bool {
        match self {
            AnswerError::Query(err) => err.is_rate_limited(),
            AnswerError::Crew(err) => err.is_rate_limited(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to load corpus: {0}")]
    Corpus(#[from] LoadError),

    #[error("Failed to build index: {0}")]
    Index(#[from] GenerationError),

    #[error("Failed to build crew: {0}")]
    Crew(#[from] CrewError),

    #[error("Failed to initialize history store: {0}")]
    History(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        if err.is_rate_limited() {
            ApiError::RateLimited(err.to_string())
        } else {
            ApiError::internal(err)
        }
    }
}

impl From<CrewError> for ApiError {
    fn from(err: CrewError) -> Self {
        if err.is_rate_limited() {
            ApiError::RateLimited(err.to_string())
        } else {
            ApiError::internal(err)
        }
    }
}

impl From<AnswerError> for ApiError {
    fn from(err: AnswerError) -> Self {
        match err {
            AnswerError::Query(err) => err.into(),
            AnswerError::Crew(err) => err.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::RateLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
