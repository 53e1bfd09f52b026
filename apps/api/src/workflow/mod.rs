// LLM workflows built on a small state-graph engine.
// Nodes reach the LLM only through `llm_client::ChatModel` and the CV only through `retrieval`.

pub mod analysis;
pub mod checkpoint;
pub mod graph;
pub mod improve;
pub mod prompts;

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use bytes::Bytes;
    use tempfile::TempDir;

    use crate::llm_client::{ChatModel, LlmError};
    use crate::retrieval::{CvEmbeddingManager, HashingEmbedder, RecursiveCharacterTextSplitter};

    pub const SAMPLE_CV: &str = "Ana Pérez\nanap@example.com · +56 9 5555 1234\n\n\
        Experiencia laboral\nData Engineer, Acme (2019-2023): pipelines de datos en Rust.\n\n\
        Educación\nIngeniería Civil, Universidad de Chile (2013-2018).\n\n\
        Habilidades\nRust, Python, SQL, Kubernetes.\n\n\
        Logros\nCertificación AWS Solutions Architect (2022).";

    /// Replays canned responses in order and records every prompt it receives.
    pub struct ScriptedChatModel {
        responses: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedChatModel {
        pub fn new(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedChatModel {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(LlmError::EmptyContent)
        }
    }

    pub fn empty_index(dir: &TempDir) -> Arc<CvEmbeddingManager> {
        Arc::new(CvEmbeddingManager::new(
            dir.path().join("cv_index"),
            Arc::new(HashingEmbedder::default()),
            RecursiveCharacterTextSplitter::new(120, 20).unwrap(),
        ))
    }

    /// A manager with `SAMPLE_CV` already indexed under a temp dir.
    pub async fn indexed_cv() -> (TempDir, Arc<CvEmbeddingManager>) {
        let dir = tempfile::tempdir().unwrap();
        let manager = empty_index(&dir);
        manager
            .embed_and_store_bytes("cv.txt", Bytes::from_static(SAMPLE_CV.as_bytes()))
            .await
            .unwrap();
        (dir, manager)
    }
}
