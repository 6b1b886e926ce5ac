use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::access;
use crate::api::auth::CurrentUser;
use crate::api::murals::load_mural_and_role;
use crate::api::types::{ContentDto, MessageResponse, PostDto};
use crate::db::PostInput;
use crate::services::content::InlineContent;

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub description: Option<String>,
    pub pos_x: Option<i32>,
    pub pos_y: Option<i32>,
}

#[derive(Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub pos_x: Option<Option<i32>>,
    #[serde(default)]
    pub pos_y: Option<Option<i32>>,
}

#[derive(Deserialize)]
pub struct InlineContentRequest {
    pub kind: String,
    pub url: Option<String>,
    pub text: Option<String>,
}

/// GET /murals/{id}/posts
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(mural_id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<PostDto>>>, ApiError> {
    let (mural, role) = load_mural_and_role(&state, mural_id, current.user.id).await?;
    if !access::can_view(&mural, role) {
        return Err(ApiError::forbidden("This mural is private"));
    }

    let posts = state.store().posts().list_for_mural(mural_id).await?;

    let mut dtos = Vec::with_capacity(posts.len());
    for item in posts {
        let likes = state.store().social().like_count(item.post.id).await?;
        let liked = state
            .store()
            .social()
            .user_liked(item.post.id, current.user.id)
            .await?;
        dtos.push(PostDto::from_parts(
            item.post,
            item.author_name,
            item.contents,
            likes,
            liked,
        ));
    }

    Ok(Json(ApiResponse::success(dtos)))
}

/// POST /murals/{id}/posts — editor or above.
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(mural_id): Path<i32>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<Json<ApiResponse<PostDto>>, ApiError> {
    let (_, role) = load_mural_and_role(&state, mural_id, current.user.id).await?;
    if !access::can_edit_posts(role) {
        return Err(ApiError::forbidden("Editors and above can create posts"));
    }

    let title = payload.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::validation("A title is required"));
    }

    let post = state
        .store()
        .posts()
        .create(PostInput {
            mural_id,
            author_id: current.user.id,
            title,
            description: payload.description,
            pos_x: payload.pos_x,
            pos_y: payload.pos_y,
        })
        .await?;

    Ok(Json(ApiResponse::success(PostDto::from_parts(
        post,
        current.user.display_name.clone(),
        Vec::new(),
        0,
        false,
    ))))
}

/// PUT /posts/{id} — editor or above on the owning mural.
pub async fn update_post(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(post_id): Path<i32>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<ApiResponse<PostDto>>, ApiError> {
    let Some(post) = state.store().posts().get(post_id).await? else {
        return Err(ApiError::post_not_found());
    };
    let (_, role) = load_mural_and_role(&state, post.mural_id, current.user.id).await?;
    if !access::can_edit_posts(role) {
        return Err(ApiError::forbidden("Editors and above can edit posts"));
    }

    if let Some(title) = &payload.title {
        if title.trim().is_empty() {
            return Err(ApiError::validation("A title is required"));
        }
    }

    let updated = state
        .store()
        .posts()
        .update(
            post,
            payload.title.map(|t| t.trim().to_string()),
            payload.description,
            payload.pos_x,
            payload.pos_y,
        )
        .await?;

    let contents = state.store().posts().list_content(updated.id).await?;
    let likes = state.store().social().like_count(updated.id).await?;
    let liked = state
        .store()
        .social()
        .user_liked(updated.id, current.user.id)
        .await?;
    let author_name = state
        .store()
        .users()
        .get_by_id(updated.author_id)
        .await?
        .map(|u| u.display_name)
        .unwrap_or_default();

    Ok(Json(ApiResponse::success(PostDto::from_parts(
        updated,
        author_name,
        contents,
        likes,
        liked,
    ))))
}

/// DELETE /posts/{id} — editor or above; soft delete plus content cleanup.
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(post_id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let Some(post) = state.store().posts().get(post_id).await? else {
        return Err(ApiError::post_not_found());
    };
    let (_, role) = load_mural_and_role(&state, post.mural_id, current.user.id).await?;
    if !access::can_edit_posts(role) {
        return Err(ApiError::forbidden("Editors and above can delete posts"));
    }

    // The post row is retired first; a cleanup failure then leaves orphaned
    // content rows behind a dead post, never a live post with none.
    state.store().posts().soft_delete(post).await?;
    state.content().clear(post_id).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new("Post deleted"))))
}

/// POST /posts/{id}/content — replace the post's content with an inline
/// payload (a link or a text block).
pub async fn set_inline_content(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(post_id): Path<i32>,
    Json(payload): Json<InlineContentRequest>,
) -> Result<Json<ApiResponse<ContentDto>>, ApiError> {
    let Some(post) = state.store().posts().get(post_id).await? else {
        return Err(ApiError::post_not_found());
    };
    let (_, role) = load_mural_and_role(&state, post.mural_id, current.user.id).await?;
    if !access::can_replace_content(role, post.author_id, current.user.id) {
        return Err(ApiError::forbidden(
            "Only editors or the post's author can change its content",
        ));
    }

    let content = state
        .content()
        .set_inline(
            post_id,
            InlineContent {
                kind: payload.kind,
                url: payload.url,
                text: payload.text,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(content.into())))
}
