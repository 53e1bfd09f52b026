// CV retrieval indexing: load → split → embed → store → similarity search.
// Every workflow node that needs CV text goes through a `Retriever` built here.

pub mod embeddings;
pub mod loader;
pub mod manager;
pub mod splitter;
pub mod store;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use embeddings::{Embedder, EmbeddingError, HashingEmbedder, HttpEmbedder};
pub use manager::CvEmbeddingManager;
pub use splitter::RecursiveCharacterTextSplitter;
pub use store::{Retriever, VectorStore};

/// A unit of CV text with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// File name or path the text came from.
    pub source: String,
    /// Zero-based page number for paged formats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
}

impl Document {
    pub fn new(page_content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: DocumentMetadata {
                source: source.into(),
                page: None,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Unsupported file format: '{0}' (expected .txt, .pdf or .docx)")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("'{0}' is not valid UTF-8 text")]
    Encoding(String),

    #[error("Failed to extract PDF text: {0}")]
    Pdf(String),

    #[error("Failed to extract DOCX text: {0}")]
    Docx(String),

    #[error("No text could be extracted from '{0}'")]
    EmptyDocument(String),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("No CV index found at '{0}'. Index a CV first.")]
    MissingIndex(String),

    #[error("Corrupt CV index: {0}")]
    CorruptIndex(String),

    #[error("Index was built with embedder '{stored}' but '{current}' is configured")]
    EmbedderMismatch { stored: String, current: String },

    #[error("Invalid splitter settings: {0}")]
    InvalidSplitter(String),
}
