use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::autosave::{AutoSaveState, SaveStatus};
use crate::errors::AppError;
use crate::models::Document;
use crate::session::{EditingSession, HistoryOverview};
use crate::state::AppState;
use crate::versions::{Version, VersionDiff};

#[derive(Deserialize)]
pub struct OpenSessionRequest {
    pub resume_id: Uuid,
    pub document: Option<Document>,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub resume_id: Uuid,
    pub document: Document,
    pub history: HistoryOverview,
    pub autosave: AutoSaveView,
}

#[derive(Deserialize)]
pub struct UpdateDocumentRequest {
    pub document: Document,
    pub description: Option<String>,
    pub action: Option<String>,
}

#[derive(Serialize)]
pub struct UpdateDocumentResponse {
    pub document: Document,
    /// Periodic version taken by this edit, if one was due.
    pub auto_version: Option<Version>,
}

#[derive(Serialize)]
pub struct UndoRedoResponse {
    /// `None` when there was nothing to undo/redo.
    pub document: Option<Document>,
    pub history: HistoryOverview,
}

#[derive(Deserialize)]
pub struct BranchQuery {
    pub branch: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateVersionRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub parent_version_id: Option<Uuid>,
    pub branch_name: Option<String>,
}

#[derive(Deserialize)]
pub struct CompareQuery {
    pub a: Uuid,
    pub b: Uuid,
}

#[derive(Serialize)]
pub struct RestoreResponse {
    pub version: Version,
    pub document: Document,
}

#[derive(Deserialize)]
pub struct CreateBranchRequest {
    pub branch_name: String,
    pub document: Option<Document>,
}

#[derive(Serialize)]
pub struct AutoSaveView {
    #[serde(flatten)]
    pub state: AutoSaveState,
    pub status: SaveStatus,
    pub status_text: String,
    /// True when closing now would lose edits.
    pub confirm_unload: bool,
}

impl From<AutoSaveState> for AutoSaveView {
    fn from(state: AutoSaveState) -> Self {
        Self {
            status: state.status(),
            status_text: state.status_text(),
            confirm_unload: state.has_unsaved_changes,
            state,
        }
    }
}

async fn find_session(state: &AppState, id: Uuid) -> Result<Arc<EditingSession>, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("No open session for resume {id}")))
}

fn require_object(document: &Document) -> Result<(), AppError> {
    if document.is_object() {
        Ok(())
    } else {
        Err(AppError::Validation(
            "document must be a JSON object".to_string(),
        ))
    }
}

/// POST /api/v1/sessions
pub async fn handle_open_session(
    State(state): State<AppState>,
    Json(req): Json<OpenSessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    if let Some(document) = &req.document {
        require_object(document)?;
    }
    let session = state.sessions.open(req.resume_id, req.document).await?;
    Ok(Json(SessionResponse {
        resume_id: session.resume_id(),
        document: session.document(),
        history: session.history().await,
        autosave: session.autosave_state().into(),
    }))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_close_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sessions.close(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("No open session for resume {id}")))
    }
}

/// GET /api/v1/sessions/:id/document
pub async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, AppError> {
    let session = find_session(&state, id).await?;
    Ok(Json(session.document()))
}

/// PUT /api/v1/sessions/:id/document
pub async fn handle_update_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDocumentRequest>,
) -> Result<Json<UpdateDocumentResponse>, AppError> {
    require_object(&req.document)?;
    let session = find_session(&state, id).await?;
    let description = req.description.as_deref().unwrap_or("Resume updated");
    let action = req.action.as_deref().unwrap_or("edit");
    let auto_version = session
        .update(req.document.clone(), description, action)
        .await;
    Ok(Json(UpdateDocumentResponse {
        document: req.document,
        auto_version,
    }))
}

/// POST /api/v1/sessions/:id/undo
pub async fn handle_undo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UndoRedoResponse>, AppError> {
    let session = find_session(&state, id).await?;
    let document = session.undo().await;
    Ok(Json(UndoRedoResponse {
        document,
        history: session.history().await,
    }))
}

/// POST /api/v1/sessions/:id/redo
pub async fn handle_redo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UndoRedoResponse>, AppError> {
    let session = find_session(&state, id).await?;
    let document = session.redo().await;
    Ok(Json(UndoRedoResponse {
        document,
        history: session.history().await,
    }))
}

/// GET /api/v1/sessions/:id/history
pub async fn handle_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<HistoryOverview>, AppError> {
    let session = find_session(&state, id).await?;
    Ok(Json(session.history().await))
}

/// DELETE /api/v1/sessions/:id/history
pub async fn handle_clear_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let session = find_session(&state, id).await?;
    session.clear_history().await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/sessions/:id/versions
pub async fn handle_list_versions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<BranchQuery>,
) -> Result<Json<Vec<Version>>, AppError> {
    let session = find_session(&state, id).await?;
    let versions = match params.branch {
        Some(branch) => session.versions_by_branch(&branch).await,
        None => session.versions().await,
    };
    Ok(Json(versions))
}

/// POST /api/v1/sessions/:id/versions
pub async fn handle_create_version(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateVersionRequest>,
) -> Result<(StatusCode, Json<Version>), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }
    let session = find_session(&state, id).await?;
    let version = session
        .create_version(
            &req.name,
            &req.description,
            req.parent_version_id,
            req.branch_name.as_deref(),
        )
        .await;
    Ok((StatusCode::CREATED, Json(version)))
}

/// GET /api/v1/sessions/:id/versions/compare?a=&b=
pub async fn handle_compare_versions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<CompareQuery>,
) -> Result<Json<VersionDiff>, AppError> {
    let session = find_session(&state, id).await?;
    session
        .compare_versions(params.a, params.b)
        .await
        .map(Json)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Cannot compare {} and {}: version not found",
                params.a, params.b
            ))
        })
}

/// GET /api/v1/sessions/:id/versions/current
pub async fn handle_current_version(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Version>, AppError> {
    let session = find_session(&state, id).await?;
    session
        .current_version()
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No versions have been created yet".to_string()))
}

/// POST /api/v1/sessions/:id/versions/:vid/restore
pub async fn handle_restore_version(
    State(state): State<AppState>,
    Path((id, vid)): Path<(Uuid, Uuid)>,
) -> Result<Json<RestoreResponse>, AppError> {
    let session = find_session(&state, id).await?;
    let version = session.restore_version(vid).await?;
    Ok(Json(RestoreResponse {
        document: session.document(),
        version,
    }))
}

/// POST /api/v1/sessions/:id/versions/:vid/branch
pub async fn handle_create_branch(
    State(state): State<AppState>,
    Path((id, vid)): Path<(Uuid, Uuid)>,
    Json(req): Json<CreateBranchRequest>,
) -> Result<(StatusCode, Json<Version>), AppError> {
    if req.branch_name.trim().is_empty() {
        return Err(AppError::Validation(
            "branch_name must not be empty".to_string(),
        ));
    }
    if let Some(document) = &req.document {
        require_object(document)?;
    }
    let session = find_session(&state, id).await?;
    let version = session
        .create_branch(vid, &req.branch_name, req.document.as_ref())
        .await?;
    Ok((StatusCode::CREATED, Json(version)))
}

/// POST /api/v1/sessions/:id/versions/:vid/publish
pub async fn handle_publish_version(
    State(state): State<AppState>,
    Path((id, vid)): Path<(Uuid, Uuid)>,
) -> Result<Json<Version>, AppError> {
    let session = find_session(&state, id).await?;
    Ok(Json(session.publish_version(vid).await?))
}

/// GET /api/v1/sessions/:id/branches
pub async fn handle_list_branches(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<String>>, AppError> {
    let session = find_session(&state, id).await?;
    Ok(Json(session.branches().await))
}

/// GET /api/v1/sessions/:id/autosave
pub async fn handle_autosave_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AutoSaveView>, AppError> {
    let session = find_session(&state, id).await?;
    Ok(Json(session.autosave_state().into()))
}

/// POST /api/v1/sessions/:id/autosave/save
pub async fn handle_force_save(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AutoSaveView>, AppError> {
    let session = find_session(&state, id).await?;
    session.force_save().await?;
    Ok(Json(session.autosave_state().into()))
}

/// POST /api/v1/sessions/:id/autosave/clear-error
pub async fn handle_clear_save_error(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let session = find_session(&state, id).await?;
    session.clear_save_error();
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/:id/autosave/reset
pub async fn handle_reset_autosave(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let session = find_session(&state, id).await?;
    session.reset_autosave();
    Ok(StatusCode::NO_CONTENT)
}
