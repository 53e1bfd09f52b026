//! CV analysis workflow.
//!
//! ```text
//! extract_content → validate_structure ─┬─ invalid → provide_feedback → END
//!                                       └─ valid → check_job_application ─┬─ no  → create_summary → END
//!                                                                         └─ yes → ask_info_about_job
//!                                                                                  → analyze_compatibility → END
//! ```

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::llm_client::ChatModel;
use crate::retrieval::CvEmbeddingManager;
use crate::workflow::checkpoint::MemorySaver;
use crate::workflow::graph::{CompiledGraph, GraphState, Node, StateGraph, WorkflowError, END};
use crate::workflow::prompts::{
    fill_template, COMPATIBILITY_PROMPT, CV_EXTRACTION_QUERY, FEEDBACK_PROMPT, SUMMARY_PROMPT,
    VALIDATION_PROMPT, VALID_MARKER,
};

pub const EXTRACT_CONTENT: &str = "extract_content";
pub const VALIDATE_STRUCTURE: &str = "validate_structure";
pub const PROVIDE_FEEDBACK: &str = "provide_feedback";
pub const CHECK_JOB_APPLICATION: &str = "check_job_application";
pub const ASK_INFO_ABOUT_JOB: &str = "ask_info_about_job";
pub const CREATE_SUMMARY: &str = "create_summary";
pub const ANALYZE_COMPATIBILITY: &str = "analyze_compatibility";

/// Characters of the job posting echoed back in the conversation log.
const JOB_INFO_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisState {
    pub messages: Vec<Message>,
    pub cv_content: String,
    pub is_cv_valid: bool,
    pub feedback: String,
    pub summary: String,
    #[serde(rename = "person_is_postuled_to_job")]
    pub applying_to_job: bool,
    pub job_info: String,
    pub compatibility_analysis: String,
    pub cv_file_path: String,
}

impl AnalysisState {
    /// Fresh run state for one request.
    pub fn initial(applying_to_job: bool, job_info: Option<String>) -> Self {
        Self {
            messages: vec![Message::human("Analizar CV")],
            applying_to_job,
            job_info: job_info.unwrap_or_default(),
            ..Self::default()
        }
    }
}

/// Partial update returned by a node. `messages` are appended, other fields overwrite.
#[derive(Debug, Default)]
pub struct AnalysisUpdate {
    pub messages: Vec<Message>,
    pub cv_content: Option<String>,
    pub is_cv_valid: Option<bool>,
    pub feedback: Option<String>,
    pub summary: Option<String>,
    pub applying_to_job: Option<bool>,
    pub job_info: Option<String>,
    pub compatibility_analysis: Option<String>,
    pub cv_file_path: Option<String>,
}

impl GraphState for AnalysisState {
    type Update = AnalysisUpdate;

    fn apply(&mut self, update: AnalysisUpdate) {
        self.messages.extend(update.messages);
        if let Some(v) = update.cv_content {
            self.cv_content = v;
        }
        if let Some(v) = update.is_cv_valid {
            self.is_cv_valid = v;
        }
        if let Some(v) = update.feedback {
            self.feedback = v;
        }
        if let Some(v) = update.summary {
            self.summary = v;
        }
        if let Some(v) = update.applying_to_job {
            self.applying_to_job = v;
        }
        if let Some(v) = update.job_info {
            self.job_info = v;
        }
        if let Some(v) = update.compatibility_analysis {
            self.compatibility_analysis = v;
        }
        if let Some(v) = update.cv_file_path {
            self.cv_file_path = v;
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Nodes
// ────────────────────────────────────────────────────────────────────────────

/// Pulls CV text from the index with a broad query.
pub struct ExtractContent {
    pub cv_index: Arc<CvEmbeddingManager>,
    pub k: usize,
}

#[async_trait]
impl Node<AnalysisState> for ExtractContent {
    async fn run(&self, _state: &AnalysisState) -> anyhow::Result<AnalysisUpdate> {
        let retriever = self.cv_index.get_retriever(self.k).await?;
        let docs = retriever.invoke(CV_EXTRACTION_QUERY).await?;
        let cv_text = docs
            .iter()
            .map(|d| d.page_content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        info!("Extracted {} CV chunks ({} chars)", docs.len(), cv_text.len());

        Ok(AnalysisUpdate {
            cv_content: Some(cv_text),
            cv_file_path: docs.first().map(|d| d.metadata.source.clone()),
            ..Default::default()
        })
    }
}

pub struct ValidateStructure {
    pub llm: Arc<dyn ChatModel>,
}

#[async_trait]
impl Node<AnalysisState> for ValidateStructure {
    async fn run(&self, state: &AnalysisState) -> anyhow::Result<AnalysisUpdate> {
        let prompt = fill_template(
            VALIDATION_PROMPT,
            &[("cv_content", state.cv_content.as_str())],
        );
        let response = self.llm.complete(&prompt).await?;
        let is_valid = response.to_uppercase().contains(VALID_MARKER);
        info!("CV structure valid: {is_valid}");

        Ok(AnalysisUpdate {
            is_cv_valid: Some(is_valid),
            ..Default::default()
        })
    }
}

pub struct ProvideFeedback {
    pub llm: Arc<dyn ChatModel>,
}

#[async_trait]
impl Node<AnalysisState> for ProvideFeedback {
    async fn run(&self, state: &AnalysisState) -> anyhow::Result<AnalysisUpdate> {
        let prompt = fill_template(
            FEEDBACK_PROMPT,
            &[("cv_content", state.cv_content.as_str())],
        );
        let feedback = self.llm.complete(&prompt).await?;

        Ok(AnalysisUpdate {
            messages: vec![Message::ai(format!("Retroalimentación del CV:\n{feedback}"))],
            feedback: Some(feedback),
            ..Default::default()
        })
    }
}

/// Records whether the candidate is applying to a job. The answer comes with the request.
pub struct CheckJobApplication;

#[async_trait]
impl Node<AnalysisState> for CheckJobApplication {
    async fn run(&self, state: &AnalysisState) -> anyhow::Result<AnalysisUpdate> {
        info!("Candidate applying to a job: {}", state.applying_to_job);
        Ok(AnalysisUpdate {
            messages: vec![Message::human(
                "Verificando si la persona está postulando a un trabajo...",
            )],
            applying_to_job: Some(state.applying_to_job),
            ..Default::default()
        })
    }
}

pub struct AskInfoAboutJob;

#[async_trait]
impl Node<AnalysisState> for AskInfoAboutJob {
    async fn run(&self, state: &AnalysisState) -> anyhow::Result<AnalysisUpdate> {
        let job_info = state.job_info.trim();
        if job_info.is_empty() {
            bail!("no job description was provided for the compatibility analysis");
        }
        let preview: String = job_info.chars().take(JOB_INFO_PREVIEW_CHARS).collect();

        Ok(AnalysisUpdate {
            messages: vec![Message::human(format!(
                "Información del trabajo recibida: {preview}..."
            ))],
            job_info: Some(job_info.to_string()),
            ..Default::default()
        })
    }
}

pub struct CreateSummary {
    pub llm: Arc<dyn ChatModel>,
}

#[async_trait]
impl Node<AnalysisState> for CreateSummary {
    async fn run(&self, state: &AnalysisState) -> anyhow::Result<AnalysisUpdate> {
        let prompt = fill_template(
            SUMMARY_PROMPT,
            &[("cv_content", state.cv_content.as_str())],
        );
        let summary = self.llm.complete(&prompt).await?;

        Ok(AnalysisUpdate {
            messages: vec![Message::ai(format!("Resumen del CV:\n{summary}"))],
            summary: Some(summary),
            ..Default::default()
        })
    }
}

pub struct AnalyzeCompatibility {
    pub llm: Arc<dyn ChatModel>,
}

#[async_trait]
impl Node<AnalysisState> for AnalyzeCompatibility {
    async fn run(&self, state: &AnalysisState) -> anyhow::Result<AnalysisUpdate> {
        let prompt = fill_template(
            COMPATIBILITY_PROMPT,
            &[
                ("cv_content", state.cv_content.as_str()),
                ("job_info", state.job_info.as_str()),
            ],
        );
        let analysis = self.llm.complete(&prompt).await?;

        Ok(AnalysisUpdate {
            messages: vec![Message::ai(format!(
                "Análisis de compatibilidad:\n{analysis}"
            ))],
            compatibility_analysis: Some(analysis),
            ..Default::default()
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Routing
// ────────────────────────────────────────────────────────────────────────────

pub fn route_after_validation(state: &AnalysisState) -> String {
    let next = if state.is_cv_valid {
        CHECK_JOB_APPLICATION
    } else {
        PROVIDE_FEEDBACK
    };
    next.to_string()
}

pub fn route_after_job_application(state: &AnalysisState) -> String {
    let next = if state.applying_to_job {
        ASK_INFO_ABOUT_JOB
    } else {
        CREATE_SUMMARY
    };
    next.to_string()
}

pub fn build_analysis_graph(
    llm: Arc<dyn ChatModel>,
    cv_index: Arc<CvEmbeddingManager>,
    retriever_k: usize,
    checkpointer: Arc<MemorySaver<AnalysisState>>,
) -> Result<CompiledGraph<AnalysisState>, WorkflowError> {
    StateGraph::<AnalysisState>::new()
        .add_node(
            EXTRACT_CONTENT,
            ExtractContent {
                cv_index,
                k: retriever_k,
            },
        )
        .add_node(VALIDATE_STRUCTURE, ValidateStructure { llm: llm.clone() })
        .add_node(PROVIDE_FEEDBACK, ProvideFeedback { llm: llm.clone() })
        .add_node(CHECK_JOB_APPLICATION, CheckJobApplication)
        .add_node(ASK_INFO_ABOUT_JOB, AskInfoAboutJob)
        .add_node(CREATE_SUMMARY, CreateSummary { llm: llm.clone() })
        .add_node(ANALYZE_COMPATIBILITY, AnalyzeCompatibility { llm })
        .set_entry_point(EXTRACT_CONTENT)
        .add_edge(EXTRACT_CONTENT, VALIDATE_STRUCTURE)
        .add_conditional_edges(VALIDATE_STRUCTURE, route_after_validation)
        .add_conditional_edges(CHECK_JOB_APPLICATION, route_after_job_application)
        .add_edge(ASK_INFO_ABOUT_JOB, ANALYZE_COMPATIBILITY)
        .add_edge(ANALYZE_COMPATIBILITY, END)
        .add_edge(PROVIDE_FEEDBACK, END)
        .add_edge(CREATE_SUMMARY, END)
        .compile(Some(checkpointer))
}
