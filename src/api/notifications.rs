use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::api::auth::CurrentUser;
use crate::api::types::{MessageResponse, NotificationDto};
use crate::services::ProcessOutcome;

#[derive(Deserialize)]
pub struct ProcessRequest {
    pub approved: bool,
}

#[derive(Serialize)]
pub struct ProcessResponse {
    pub outcome: &'static str,
}

/// GET /notifications — everything addressed to the user, newest first.
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<NotificationDto>>>, ApiError> {
    let rows = state
        .store()
        .notifications()
        .list_for_user(current.user.id)
        .await?;
    let dtos = state.notifier().enrich_all(rows).await?;
    Ok(Json(ApiResponse::success(dtos)))
}

/// PUT /notifications/{id}/process — approve or reject an access request.
/// Acting on an already-processed request is a clean no-op.
pub async fn process_request(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(notification_id): Path<i32>,
    Json(payload): Json<ProcessRequest>,
) -> Result<Json<ApiResponse<ProcessResponse>>, ApiError> {
    let outcome = state
        .membership()
        .process_request(&current.user, notification_id, payload.approved)
        .await?;

    let outcome = match outcome {
        ProcessOutcome::Approved => "approved",
        ProcessOutcome::Rejected => "rejected",
        ProcessOutcome::AlreadyProcessed => "already_processed",
    };
    Ok(Json(ApiResponse::success(ProcessResponse { outcome })))
}

/// DELETE /notifications/{id} — consume one notification. Idempotent: a
/// notification that is already gone still yields success.
pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(notification_id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .store()
        .notifications()
        .delete_for_user(notification_id, current.user.id)
        .await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Notification dismissed",
    ))))
}

/// POST /notifications/read-all — reading and deleting are the same
/// transition; this consumes everything addressed to the user.
pub async fn read_all(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let consumed = state
        .store()
        .notifications()
        .consume_all_for_user(current.user.id)
        .await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "Dismissed {consumed} notifications"
    )))))
}
