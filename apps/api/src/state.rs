use std::sync::Arc;

use crate::llm_client::ChatModel;
use crate::retrieval::CvEmbeddingManager;
use crate::workflow::analysis::{build_analysis_graph, AnalysisState};
use crate::workflow::checkpoint::MemorySaver;
use crate::workflow::graph::{CompiledGraph, WorkflowError};
use crate::workflow::improve::{build_improve_graph, ImproveCvState};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub cv_index: Arc<CvEmbeddingManager>,
    pub analysis: Arc<CompiledGraph<AnalysisState>>,
    pub improve: Arc<CompiledGraph<ImproveCvState>>,
    /// Per-thread history of analysis runs, shared with the analysis graph.
    pub checkpoints: Arc<MemorySaver<AnalysisState>>,
}

impl AppState {
    pub fn new(
        llm: Arc<dyn ChatModel>,
        cv_index: Arc<CvEmbeddingManager>,
        retriever_k: usize,
    ) -> Result<Self, WorkflowError> {
        let checkpoints = Arc::new(MemorySaver::new());
        let analysis = build_analysis_graph(
            Arc::clone(&llm),
            Arc::clone(&cv_index),
            retriever_k,
            Arc::clone(&checkpoints),
        )?;
        let improve = build_improve_graph(llm, Arc::clone(&cv_index))?;

        Ok(Self {
            cv_index,
            analysis: Arc::new(analysis),
            improve: Arc::new(improve),
            checkpoints,
        })
    }
}
