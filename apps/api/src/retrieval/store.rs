//! Flat in-memory vector index with JSON persistence.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::retrieval::{Document, Embedder, RetrievalError};

pub const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexedChunk {
    document: Document,
    embedding: Vec<f32>,
}

/// On-disk layout of a saved index.
#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    embedding_model: String,
    dimension: usize,
    chunks: Vec<IndexedChunk>,
}

#[derive(Debug, Clone)]
pub struct VectorStore {
    embedding_model: String,
    dimension: usize,
    chunks: Vec<IndexedChunk>,
}

impl VectorStore {
    /// Embeds every document and builds a new store.
    pub async fn from_documents(
        docs: Vec<Document>,
        embedder: &dyn Embedder,
    ) -> Result<Self, RetrievalError> {
        let mut store = Self {
            embedding_model: embedder.model_id().to_string(),
            dimension: 0,
            chunks: Vec::with_capacity(docs.len()),
        };
        store.add_documents(docs, embedder).await?;
        Ok(store)
    }

    pub async fn add_documents(
        &mut self,
        docs: Vec<Document>,
        embedder: &dyn Embedder,
    ) -> Result<(), RetrievalError> {
        let texts: Vec<String> = docs.iter().map(|d| d.page_content.clone()).collect();
        let embeddings = embedder.embed_documents(&texts).await?;

        for (document, embedding) in docs.into_iter().zip(embeddings) {
            if self.dimension == 0 {
                self.dimension = embedding.len();
            } else if embedding.len() != self.dimension {
                return Err(RetrievalError::CorruptIndex(format!(
                    "embedding dimension {} does not match index dimension {}",
                    embedding.len(),
                    self.dimension
                )));
            }
            self.chunks.push(IndexedChunk {
                document,
                embedding,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Top-`k` documents by cosine similarity, best first. Ties keep insertion order.
    pub fn similarity_search_by_vector(&self, query: &[f32], k: usize) -> Vec<(Document, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (i, cosine(query, &c.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        scored
            .into_iter()
            .take(k)
            .map(|(i, score)| (self.chunks[i].document.clone(), score))
            .collect()
    }

    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        embedder: &dyn Embedder,
    ) -> Result<Vec<Document>, RetrievalError> {
        let query_vector = embedder.embed_query(query).await?;
        Ok(self
            .similarity_search_by_vector(&query_vector, k)
            .into_iter()
            .map(|(doc, _)| doc)
            .collect())
    }

    pub async fn save_local(&self, dir: &Path) -> Result<(), RetrievalError> {
        tokio::fs::create_dir_all(dir).await?;
        let file = IndexFile {
            embedding_model: self.embedding_model.clone(),
            dimension: self.dimension,
            chunks: self.chunks.clone(),
        };
        let bytes = serde_json::to_vec(&file)
            .map_err(|e| RetrievalError::CorruptIndex(e.to_string()))?;
        // Atomic replace: write a temp file, then rename it over the index
        let path = dir.join(INDEX_FILE);
        let tmp = dir.join(format!("{INDEX_FILE}.tmp"));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        info!("Saved {} chunks to {}", self.chunks.len(), path.display());
        Ok(())
    }

    /// Loads a saved index, refusing one built with a different embedder.
    pub async fn load_local(dir: &Path, embedder: &dyn Embedder) -> Result<Self, RetrievalError> {
        let path = dir.join(INDEX_FILE);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RetrievalError::MissingIndex(dir.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let file: IndexFile = serde_json::from_slice(&bytes)
            .map_err(|e| RetrievalError::CorruptIndex(format!("{}: {e}", path.display())))?;

        if file.embedding_model != embedder.model_id() {
            return Err(RetrievalError::EmbedderMismatch {
                stored: file.embedding_model,
                current: embedder.model_id().to_string(),
            });
        }
        if let Some(bad) = file
            .chunks
            .iter()
            .find(|c| c.embedding.len() != file.dimension)
        {
            return Err(RetrievalError::CorruptIndex(format!(
                "chunk with dimension {} in an index of dimension {}",
                bad.embedding.len(),
                file.dimension
            )));
        }

        Ok(Self {
            embedding_model: file.embedding_model,
            dimension: file.dimension,
            chunks: file.chunks,
        })
    }

    pub fn as_retriever(self: Arc<Self>, embedder: Arc<dyn Embedder>, k: usize) -> Retriever {
        Retriever {
            store: self,
            embedder,
            k,
        }
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// Fixed-`k` query interface over a store.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    k: usize,
}

impl Retriever {
    pub async fn invoke(&self, query: &str) -> Result<Vec<Document>, RetrievalError> {
        if self.store.is_empty() {
            return Ok(Vec::new());
        }
        self.store
            .similarity_search(query, self.k, self.embedder.as_ref())
            .await
    }
}
