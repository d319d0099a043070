//! Append-only JSON-lines history of answered questions and generated question sets.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::state::AnswerMode;

const QA_HISTORY_FILE: &str = "qa_history.jsonl";
const QUESTIONS_HISTORY_FILE: &str = "gen_question_history.jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub mode: AnswerMode,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuestionsRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

pub struct HistoryStore {
    qa_path: PathBuf,
    questions_path: PathBuf,
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub async fn new(dir: &Path) -> io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        Ok(Self {
            qa_path: dir.join(QA_HISTORY_FILE),
            questions_path: dir.join(QUESTIONS_HISTORY_FILE),
            write_lock: Mutex::new(()),
        })
    }

    pub async fn record_answer(
        &self,
        question: &str,
        mode: AnswerMode,
        answer: &str,
    ) -> io::Result<QaRecord> {
        let record = QaRecord {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            question: question.to_string(),
            mode,
            answer: answer.to_string(),
        };
        self.append(&self.qa_path, &record).await?;
        Ok(record)
    }

    pub async fn record_questions(&self, content: &str) -> io::Result<GeneratedQuestionsRecord> {
        let record = GeneratedQuestionsRecord {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            content: content.to_string(),
        };
        self.append(&self.questions_path, &record).await?;
        Ok(record)
    }

    /// Oldest first.
    pub async fn answers(&self) -> io::Result<Vec<QaRecord>> {
        read_records(&self.qa_path).await
    }

    pub async fn generated_questions(&self) -> io::Result<Vec<GeneratedQuestionsRecord>> {
        read_records(&self.questions_path).await
    }

    async fn append<T: Serialize>(&self, path: &Path, record: &T) -> io::Result<()> {
        let mut line = serde_json::to_string(record).map_err(io::Error::other)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

async fn read_records<T: DeserializeOwned>(path: &Path) -> io::Result<Vec<T>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut records = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(record) => records.push(record),
            Err(err) => tracing::warn!(
                "Skipping malformed history line {} in {}: {}",
                line_no + 1,
                path.display(),
                err
            ),
        }
    }
    Ok(records)
}
