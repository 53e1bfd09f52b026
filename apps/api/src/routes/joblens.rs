use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::workflow::analysis::AnalysisState;
use crate::workflow::checkpoint::Checkpoint;
use crate::workflow::improve::ImproveCvState;

const DEFAULT_THREAD_ID: &str = "1";
const UPLOAD_FIELD: &str = "file";

// ────────────────────────────────────────────────────────────────────────────
// Request / response types
// ────────────────────────────────────────────────────────────────────────────

/// LangServe-style invoke envelope. Unknown top-level keys such as `kwargs` are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct InvokeRequest {
    #[serde(default)]
    pub input: AnalysisInput,
    #[serde(default)]
    pub config: RunConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisInput {
    #[serde(default = "default_applying")]
    pub person_is_postuled_to_job: bool,
    #[serde(default)]
    pub job_info: Option<String>,
}

impl Default for AnalysisInput {
    fn default() -> Self {
        Self {
            person_is_postuled_to_job: default_applying(),
            job_info: None,
        }
    }
}

fn default_applying() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub configurable: Configurable,
}

#[derive(Debug, Default, Deserialize)]
pub struct Configurable {
    pub thread_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InvokeResponse {
    pub output: AnalysisState,
    pub metadata: RunMetadata,
}

#[derive(Debug, Serialize)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub thread_id: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_name: String,
    pub chunks: usize,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ImproveRequest {
    pub feedback: String,
    #[serde(default)]
    pub cv_content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImproveResponse {
    pub improved_cv: String,
    pub cv_sections: BTreeMap<String, String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /joblens/invoke
pub async fn handle_invoke(
    State(state): State<AppState>,
    Json(req): Json<InvokeRequest>,
) -> Result<Json<InvokeResponse>, AppError> {
    if !state.cv_index.index_exists().await {
        return Err(AppError::UnprocessableEntity(
            "No CV has been indexed yet. Upload a CV to /joblens/cv first.".to_string(),
        ));
    }

    let applying = req.input.person_is_postuled_to_job;
    let job_info = req.input.job_info.filter(|j| !j.trim().is_empty());
    if applying && job_info.is_none() {
        return Err(AppError::Validation(
            "job_info is required when person_is_postuled_to_job is true".to_string(),
        ));
    }

    let thread_id = req
        .config
        .configurable
        .thread_id
        .unwrap_or_else(|| DEFAULT_THREAD_ID.to_string());
    let run_id = Uuid::new_v4();
    info!(%run_id, %thread_id, applying, "Starting CV analysis");

    let output = state
        .analysis
        .invoke(AnalysisState::initial(applying, job_info), &thread_id)
        .await?;

    Ok(Json(InvokeResponse {
        output,
        metadata: RunMetadata { run_id, thread_id },
    }))
}

/// POST /joblens/cv
pub async fn handle_upload_cv(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("Uploaded file has no file name".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;

        info!("Indexing uploaded CV {file_name} ({} bytes)", bytes.len());
        let store = state.cv_index.embed_and_store_bytes(&file_name, bytes).await?;

        return Ok(Json(UploadResponse {
            chunks: store.len(),
            message: format!("CV '{file_name}' indexed"),
            file_name,
        }));
    }

    Err(AppError::Validation(format!(
        "Missing multipart field '{UPLOAD_FIELD}'"
    )))
}

/// POST /joblens/improve
pub async fn handle_improve(
    State(state): State<AppState>,
    Json(req): Json<ImproveRequest>,
) -> Result<Json<ImproveResponse>, AppError> {
    if req.feedback.trim().is_empty() {
        return Err(AppError::Validation("feedback must not be empty".to_string()));
    }

    let cv_content = req.cv_content.unwrap_or_default();
    if cv_content.trim().is_empty() && !state.cv_index.index_exists().await {
        return Err(AppError::UnprocessableEntity(
            "Provide cv_content or upload a CV to /joblens/cv first.".to_string(),
        ));
    }

    let run_id = Uuid::new_v4().to_string();
    info!(%run_id, "Starting CV improvement");

    let input = ImproveCvState {
        cv_content,
        feedback: req.feedback,
        ..Default::default()
    };
    let output = state.improve.invoke(input, &run_id).await?;

    Ok(Json(ImproveResponse {
        improved_cv: output.improved_cv,
        cv_sections: output.cv_sections,
    }))
}

/// GET /joblens/threads/:thread_id/state
pub async fn handle_thread_state(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<Checkpoint<AnalysisState>>, AppError> {
    let checkpoint = state
        .checkpoints
        .latest(&thread_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Thread {thread_id} not found")))?;
    Ok(Json(checkpoint))
}

/// GET /joblens/threads/:thread_id/history
pub async fn handle_thread_history(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Json<Vec<Checkpoint<AnalysisState>>> {
    Json(state.checkpoints.history(&thread_id).await)
}
