use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::access;
use crate::api::auth::CurrentUser;
use crate::api::murals::load_mural_and_role;
use crate::api::types::{CommentDto, MessageResponse};
use crate::db::NotificationInput;
use crate::db::repositories::notification::KIND_COMMENT;
use crate::entities::posts;

#[derive(Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

#[derive(Serialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub likes: u64,
}

async fn load_post_for_viewer(
    state: &AppState,
    post_id: i32,
    user_id: i32,
) -> Result<(posts::Model, crate::entities::murals::Model), ApiError> {
    let Some(post) = state.store().posts().get(post_id).await? else {
        return Err(ApiError::post_not_found());
    };
    let (mural, role) = load_mural_and_role(state, post.mural_id, user_id).await?;
    if !access::can_view(&mural, role) {
        return Err(ApiError::forbidden("This mural is private"));
    }
    Ok((post, mural))
}

/// GET /posts/{id}/comments
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(post_id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<CommentDto>>>, ApiError> {
    load_post_for_viewer(&state, post_id, current.user.id).await?;

    let rows = state.store().social().list_comments(post_id).await?;
    let dtos = rows
        .into_iter()
        .map(|(comment, user)| CommentDto {
            id: comment.id,
            post_id: comment.post_id,
            user_id: comment.user_id,
            author_name: user.map(|u| u.display_name).unwrap_or_default(),
            body: comment.body,
            created_at: comment.created_at,
        })
        .collect();

    Ok(Json(ApiResponse::success(dtos)))
}

/// POST /posts/{id}/comments — any viewer, when the mural allows comments.
pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(post_id): Path<i32>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<ApiResponse<CommentDto>>, ApiError> {
    let (post, mural) = load_post_for_viewer(&state, post_id, current.user.id).await?;
    if !mural.comments_enabled {
        return Err(ApiError::forbidden("Comments are disabled on this mural"));
    }

    let body = payload.body.trim().to_string();
    if body.is_empty() {
        return Err(ApiError::validation("A comment needs a body"));
    }

    let comment = state
        .store()
        .social()
        .add_comment(post_id, current.user.id, &body)
        .await?;

    if post.author_id != current.user.id {
        state
            .notifier()
            .notify(NotificationInput {
                sender_id: current.user.id,
                receiver_id: post.author_id,
                mural_id: mural.id,
                kind: KIND_COMMENT,
                message: format!(
                    "{} commented on \"{}\"",
                    current.user.display_name, post.title
                ),
                request_status: None,
            })
            .await?;
    }

    Ok(Json(ApiResponse::success(CommentDto {
        id: comment.id,
        post_id: comment.post_id,
        user_id: comment.user_id,
        author_name: current.user.display_name.clone(),
        body: comment.body,
        created_at: comment.created_at,
    })))
}

/// DELETE /comments/{id} — the comment's author or a mural administrator.
pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(comment_id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let Some(comment) = state.store().social().get_comment(comment_id).await? else {
        return Err(ApiError::NotFound("Comment not found".to_string()));
    };
    let Some(post) = state.store().posts().get(comment.post_id).await? else {
        return Err(ApiError::post_not_found());
    };
    let (_, role) = load_mural_and_role(&state, post.mural_id, current.user.id).await?;

    if comment.user_id != current.user.id && !access::can_administer(role) {
        return Err(ApiError::forbidden(
            "Only the author or an administrator can delete a comment",
        ));
    }

    state.store().social().soft_delete_comment(comment).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Comment deleted",
    ))))
}

/// POST /posts/{id}/like — idempotent; liking twice is a no-op.
pub async fn like_post(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(post_id): Path<i32>,
) -> Result<Json<ApiResponse<LikeResponse>>, ApiError> {
    let (_, mural) = load_post_for_viewer(&state, post_id, current.user.id).await?;
    if !mural.likes_enabled {
        return Err(ApiError::forbidden("Likes are disabled on this mural"));
    }

    state.store().social().like(post_id, current.user.id).await?;
    let likes = state.store().social().like_count(post_id).await?;
    Ok(Json(ApiResponse::success(LikeResponse { liked: true, likes })))
}

/// DELETE /posts/{id}/like — idempotent.
pub async fn unlike_post(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(post_id): Path<i32>,
) -> Result<Json<ApiResponse<LikeResponse>>, ApiError> {
    load_post_for_viewer(&state, post_id, current.user.id).await?;

    state.store().social().unlike(post_id, current.user.id).await?;
    let likes = state.store().social().like_count(post_id).await?;
    Ok(Json(ApiResponse::success(LikeResponse {
        liked: false,
        likes,
    })))
}
