use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::AppState;
use super::error::{ApiError, ApiResult};
use crate::aggregate::{GenerationEnvelope, TaskEnvelope, to_envelope};
use crate::store::{EditRecord, StoredEdit};
use crate::tracker::DEFAULT_SESSION;

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    #[serde(default)]
    pub essay: Option<String>,
    #[serde(default)]
    pub source_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub source_text: Option<String>,
    #[serde(default)]
    pub essay_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StoreEditsRequest {
    #[serde(default)]
    pub edits: Option<Vec<EditRecord>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreEditsResponse {
    pub message: String,
    pub edits_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EditsResponse {
    pub edits: Vec<StoredEdit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCompletionRequest {
    #[serde(default)]
    pub highlight_id: Option<i64>,
    #[serde(default)]
    pub completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEditsRequest {
    #[serde(default)]
    pub response_box_text: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

pub async fn index() -> &'static str {
    "Running!"
}

pub async fn evaluate(
    State(state): State<AppState>,
    Json(payload): Json<EvaluateRequest>,
) -> ApiResult<Json<Vec<TaskEnvelope>>> {
    let essay = payload.essay.unwrap_or_default();
    let source_text = payload.source_text.unwrap_or_default();
    debug!(
        essay_chars = essay.chars().count(),
        source_chars = source_text.chars().count(),
        "evaluate request"
    );

    let batch = state.engine.run_batch(&essay, &source_text).await?;
    Ok(Json(to_envelope(&batch)))
}

pub async fn generate(
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> Json<GenerationEnvelope> {
    let source_text = payload.source_text.unwrap_or_default();
    let essay_prompt = payload.essay_prompt.unwrap_or_default();

    let response = state.engine.generate(&source_text, &essay_prompt).await;
    Json(GenerationEnvelope { response })
}

pub async fn store_edits(
    State(state): State<AppState>,
    Json(payload): Json<StoreEditsRequest>,
) -> ApiResult<Json<StoreEditsResponse>> {
    let edits = payload
        .edits
        .ok_or_else(|| ApiError::BadRequest("Invalid request, 'edits' key missing".to_string()))?;

    let edits_count = state.edits.store_edits(&edits).await?;
    info!(edits_count, "edits stored");
    Ok(Json(StoreEditsResponse {
        message: "Edits stored successfully".to_string(),
        edits_count,
    }))
}

pub async fn get_edits(State(state): State<AppState>) -> ApiResult<Json<EditsResponse>> {
    let edits = state.edits.list_edits().await?;
    Ok(Json(EditsResponse { edits }))
}

pub async fn update_completion(
    State(state): State<AppState>,
    Json(payload): Json<UpdateCompletionRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let (Some(id), Some(completed)) = (payload.highlight_id, payload.completed) else {
        return Err(ApiError::BadRequest(
            "Missing highlightId or completed status".to_string(),
        ));
    };

    if !state.edits.set_completed(id, completed).await? {
        return Err(ApiError::NotFound(format!("no edit with id {id}")));
    }
    Ok(MessageResponse::new("Completion status updated successfully"))
}

pub async fn track_edits(
    State(state): State<AppState>,
    Json(payload): Json<TrackEditsRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let text = payload
        .response_box_text
        .ok_or_else(|| ApiError::BadRequest("responseBoxText is missing".to_string()))?;
    let session = payload.session_id.as_deref().unwrap_or(DEFAULT_SESSION);

    if let Some((id, change)) = state
        .sessions
        .record(session, &text, state.changes.as_ref())
        .await?
    {
        debug!(id, session, change_type = %change.change_type, "user change recorded");
    }
    Ok(MessageResponse::new("Edit tracked successfully"))
}

pub async fn clear_tables(State(state): State<AppState>) -> ApiResult<&'static str> {
    state.edits.clear().await?;
    state.sessions.reset().await;
    info!("edit tables cleared");
    Ok("Success!")
}
