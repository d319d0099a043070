//! Document loading for the lecture corpus.
//!
//! The corpus root holds two fixed sub-corpora, `Record` (lecture recording
//! transcripts) and `Textbook`. Every recognised file in each becomes one or
//! more [`Document`]s; PDFs yield one document per page.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::LoadError;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corpus {
    Record,
    Textbook,
    /// Static material bound to a single agent, outside the shared corpus.
    Knowledge,
}

impl Corpus {
    pub const SHARED: [Corpus; 2] = [Corpus::Record, Corpus::Textbook];

    pub fn as_str(&self) -> &'static str {
        match self {
            Corpus::Record => "Record",
            Corpus::Textbook => "Textbook",
            Corpus::Knowledge => "Knowledge",
        }
    }
}

impl fmt::Display for Corpus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub text: String,
    pub corpus: Corpus,
    pub file_name: String,
    /// 1-based page number for paginated sources.
    pub page: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct CorpusFile {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Raw file access, kept behind a trait so loading can be exercised without disk layout.
#[async_trait]
pub trait CorpusReader: Send + Sync {
    /// Recognised files directly inside `directory`, in a stable order.
    async fn list_files(&self, directory: &Path) -> Result<Vec<CorpusFile>, LoadError>;

    async fn read_file(&self, path: &Path) -> Result<CorpusFile, LoadError>;
}

/// Reads the local filesystem, non-recursively, ordered by file name.
pub struct FsCorpusReader {
    extensions: Vec<String>,
}

impl FsCorpusReader {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    fn is_recognised(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}

#[async_trait]
impl CorpusReader for FsCorpusReader {
    async fn list_files(&self, directory: &Path) -> Result<Vec<CorpusFile>, LoadError> {
        let meta = match tokio::fs::metadata(directory).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(LoadError::MissingDirectory(directory.to_path_buf()));
            }
            Err(source) => {
                return Err(LoadError::Io {
                    path: directory.to_path_buf(),
                    source,
                })
            }
        };
        if !meta.is_dir() {
            return Err(LoadError::NotADirectory(directory.to_path_buf()));
        }

        let io_err = |source| LoadError::Io {
            path: directory.to_path_buf(),
            source,
        };

        let mut entries = tokio::fs::read_dir(directory).await.map_err(io_err)?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file && self.is_recognised(&path) {
                paths.push(path);
            }
        }
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            files.push(self.read_file(&path).await?);
        }
        Ok(files)
    }

    async fn read_file(&self, path: &Path) -> Result<CorpusFile, LoadError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(CorpusFile {
            path: path.to_path_buf(),
            bytes,
        })
    }
}

pub struct DocumentLoader {
    reader: Arc<dyn CorpusReader>,
}

impl DocumentLoader {
    pub fn new(reader: Arc<dyn CorpusReader>) -> Self {
        Self { reader }
    }

    /// Loads `Record` then `Textbook` under `root` into one ordered list.
    pub async fn load_corpus(&self, root: &Path) -> Result<Vec<Document>, LoadError> {
        let mut documents = Vec::new();
        for corpus in Corpus::SHARED {
            let directory = root.join(corpus.as_str());
            let files = self.reader.list_files(&directory).await?;
            tracing::info!(
                "Found {} file(s) in {} corpus ({})",
                files.len(),
                corpus,
                directory.display()
            );
            for file in files {
                documents.extend(file_to_documents(file, corpus).await?);
            }
        }

        if documents.is_empty() {
            return Err(LoadError::EmptyCorpus);
        }
        Ok(documents)
    }

    /// Loads individual files, e.g. a knowledge source bound to one agent.
    pub async fn load_files(
        &self,
        paths: &[PathBuf],
        corpus: Corpus,
    ) -> Result<Vec<Document>, LoadError> {
        let mut documents = Vec::new();
        for path in paths {
            let file = self.reader.read_file(path).await?;
            documents.extend(file_to_documents(file, corpus).await?);
        }
        Ok(documents)
    }
}

async fn file_to_documents(file: CorpusFile, corpus: Corpus) -> Result<Vec<Document>, LoadError> {
    let file_name = file
        .path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file.path.display().to_string());

    let is_pdf = file
        .path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    if !is_pdf {
        let text = String::from_utf8_lossy(&file.bytes).to_string();
        return Ok(vec![Document {
            id: DocumentId(format!("{}/{}", corpus, file_name)),
            text,
            corpus,
            file_name,
            page: None,
        }]);
    }

    let path = file.path.clone();
    let bytes = file.bytes;
    let pages =
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem_by_pages(&bytes))
            .await
            .map_err(|e| LoadError::Pdf {
                path: path.clone(),
                message: e.to_string(),
            })?
            .map_err(|e| LoadError::Pdf {
                path: path.clone(),
                message: e.to_string(),
            })?;

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, page_text)| Document {
            id: DocumentId(format!("{}/{}#p{}", corpus, file_name, i + 1)),
            text: page_text,
            corpus,
            file_name: file_name.clone(),
            page: Some(i + 1),
        })
        .collect())
}
