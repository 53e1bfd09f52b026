use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::retrieval::loader::{load_cv, load_cv_bytes};
use crate::retrieval::store::INDEX_FILE;
use crate::retrieval::{
    Document, Embedder, RecursiveCharacterTextSplitter, RetrievalError, Retriever, VectorStore,
};

/// Owns the CV index directory: builds it from a CV and hands out retrievers over it.
///
/// The most recently built or loaded store is cached; re-indexing replaces it.
/// Indexing runs one at a time so the cached store always matches `index.json`.
pub struct CvEmbeddingManager {
    index_dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    splitter: RecursiveCharacterTextSplitter,
    current: RwLock<Option<Arc<VectorStore>>>,
    indexing: Mutex<()>,
}

impl CvEmbeddingManager {
    pub fn new(
        index_dir: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
        splitter: RecursiveCharacterTextSplitter,
    ) -> Self {
        Self {
            index_dir: index_dir.into(),
            embedder,
            splitter,
            current: RwLock::new(None),
            indexing: Mutex::new(()),
        }
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    pub async fn load_cv(&self, path: &Path) -> Result<Vec<Document>, RetrievalError> {
        load_cv(path).await
    }

    /// Loads, splits and embeds the CV at `path`, then persists the index.
    pub async fn embed_and_store_cv(&self, path: &Path) -> Result<Arc<VectorStore>, RetrievalError> {
        let docs = self.load_cv(path).await?;
        self.index_documents(&path.display().to_string(), docs).await
    }

    /// Same as `embed_and_store_cv` for an uploaded file.
    pub async fn embed_and_store_bytes(
        &self,
        file_name: &str,
        bytes: Bytes,
    ) -> Result<Arc<VectorStore>, RetrievalError> {
        let docs = load_cv_bytes(file_name, &bytes)?;
        self.index_documents(file_name, docs).await
    }

    async fn index_documents(
        &self,
        source: &str,
        docs: Vec<Document>,
    ) -> Result<Arc<VectorStore>, RetrievalError> {
        let chunks = self.splitter.split_documents(&docs);
        if chunks.is_empty() {
            return Err(RetrievalError::EmptyDocument(source.to_string()));
        }

        let _guard = self.indexing.lock().await;
        let store = VectorStore::from_documents(chunks, self.embedder.as_ref()).await?;
        store.save_local(&self.index_dir).await?;
        info!(
            "Indexed {} chunks from {} with {}",
            store.len(),
            source,
            store.embedding_model()
        );

        let store = Arc::new(store);
        *self.current.write().await = Some(Arc::clone(&store));
        Ok(store)
    }

    pub async fn index_exists(&self) -> bool {
        if self.current.read().await.is_some() {
            return true;
        }
        tokio::fs::try_exists(self.index_dir.join(INDEX_FILE))
            .await
            .unwrap_or(false)
    }

    /// Retriever over the current index, loading it from disk on first use.
    pub async fn get_retriever(&self, k: usize) -> Result<Retriever, RetrievalError> {
        if let Some(store) = self.current.read().await.as_ref() {
            return Ok(Arc::clone(store).as_retriever(Arc::clone(&self.embedder), k));
        }

        let mut current = self.current.write().await;
        let store = match current.as_ref() {
            Some(store) => Arc::clone(store),
            None => {
                let loaded =
                    Arc::new(VectorStore::load_local(&self.index_dir, self.embedder.as_ref()).await?);
                info!(
                    "Loaded CV index with {} chunks from {}",
                    loaded.len(),
                    self.index_dir.display()
                );
                *current = Some(Arc::clone(&loaded));
                loaded
            }
        };
        Ok(store.as_retriever(Arc::clone(&self.embedder), k))
    }
}
