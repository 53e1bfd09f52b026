use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// State snapshot taken after a node finished.
#[derive(Debug, Clone, Serialize)]
pub struct Checkpoint<S> {
    pub thread_id: String,
    pub step: usize,
    pub node: String,
    pub state: S,
    pub created_at: DateTime<Utc>,
}

/// Checkpoints kept per thread; the oldest are dropped first.
pub const MAX_CHECKPOINTS_PER_THREAD: usize = 200;

/// In-memory checkpointer keyed by thread id. History is lost on restart
/// and capped at [`MAX_CHECKPOINTS_PER_THREAD`] entries per thread.
pub struct MemorySaver<S> {
    threads: RwLock<HashMap<String, Vec<Checkpoint<S>>>>,
}

impl<S: Clone> MemorySaver<S> {
    pub fn new() -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
        }
    }

    pub async fn put(&self, thread_id: &str, step: usize, node: &str, state: S) {
        let checkpoint = Checkpoint {
            thread_id: thread_id.to_string(),
            step,
            node: node.to_string(),
            state,
            created_at: Utc::now(),
        };
        let mut threads = self.threads.write().await;
        let history = threads.entry(thread_id.to_string()).or_default();
        history.push(checkpoint);
        if history.len() > MAX_CHECKPOINTS_PER_THREAD {
            let excess = history.len() - MAX_CHECKPOINTS_PER_THREAD;
            history.drain(..excess);
        }
    }

    pub async fn latest(&self, thread_id: &str) -> Option<Checkpoint<S>> {
        self.threads
            .read()
            .await
            .get(thread_id)
            .and_then(|history| history.last().cloned())
    }

    /// All checkpoints of a thread, oldest first.
    pub async fn history(&self, thread_id: &str) -> Vec<Checkpoint<S>> {
        self.threads
            .read()
            .await
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl<S: Clone> Default for MemorySaver<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_latest_returns_last_put() {
        let saver = MemorySaver::new();
        saver.put("1", 1, "extract_content", 10u32).await;
        saver.put("1", 2, "validate_structure", 20u32).await;

        let latest = saver.latest("1").await.unwrap();
        assert_eq!(latest.step, 2);
        assert_eq!(latest.node, "validate_structure");
        assert_eq!(latest.state, 20);
    }

    #[tokio::test]
    async fn test_threads_are_isolated() {
        let saver = MemorySaver::new();
        saver.put("a", 1, "n", "a-state".to_string()).await;
        saver.put("b", 1, "n", "b-state".to_string()).await;

        assert_eq!(saver.history("a").await.len(), 1);
        assert_eq!(saver.latest("b").await.unwrap().state, "b-state");
    }

    #[tokio::test]
    async fn test_history_is_capped_per_thread() {
        let saver = MemorySaver::new();
        for step in 1..=MAX_CHECKPOINTS_PER_THREAD + 5 {
            saver.put("1", step, "n", step).await;
        }

        let history = saver.history("1").await;
        assert_eq!(history.len(), MAX_CHECKPOINTS_PER_THREAD);
        assert_eq!(history[0].step, 6);
        assert_eq!(
            saver.latest("1").await.unwrap().step,
            MAX_CHECKPOINTS_PER_THREAD + 5
        );
    }

    #[tokio::test]
    async fn test_unknown_thread_is_empty() {
        let saver: MemorySaver<u32> = MemorySaver::new();
        assert!(saver.latest("missing").await.is_none());
        assert!(saver.history("missing").await.is_empty());
    }
}
