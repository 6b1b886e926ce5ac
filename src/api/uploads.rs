use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::access;
use crate::api::auth::CurrentUser;
use crate::api::murals::load_mural_and_role;
use crate::api::types::ContentDto;
use crate::services::content::FileUpload;

/// POST /uploads/posts/{id} — multipart file upload that replaces the post's
/// content. Expects a single `file` field.
pub async fn upload_post_content(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(post_id): Path<i32>,
    mut multipart: Multipart,
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

    let mut upload: Option<FileUpload> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(format!("Failed to read upload: {e}")))?;

        upload = Some(FileUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    let Some(upload) = upload else {
        return Err(ApiError::validation("Missing file field"));
    };

    let content = state.content().replace_with_file(post_id, upload).await?;
    Ok(Json(ApiResponse::success(content.into())))
}
