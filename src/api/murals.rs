use axum::{
    Extension, Json,
    extract::{Path, State},
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::access::{self, Role};
use crate::api::auth::CurrentUser;
use crate::api::types::{MemberDto, MessageResponse, MuralDto};
use crate::db::{MuralInput, MuralUpdate};
use crate::domain::events::UserEvent;
use crate::entities::murals;
use crate::services::JoinOutcome;

const ACCESS_CODE_ATTEMPTS: u32 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct CreateMuralRequest {
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_privacy")]
    pub privacy: String,
    #[serde(default)]
    pub theme_id: i32,
    pub custom_color: Option<String>,
    #[serde(default = "default_true")]
    pub comments_enabled: bool,
    #[serde(default = "default_true")]
    pub likes_enabled: bool,
}

fn default_privacy() -> String {
    access::PRIVACY_PRIVATE.to_string()
}

const fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
pub struct UpdateMuralRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<Option<String>>,
    pub privacy: Option<String>,
    pub theme_id: Option<i32>,
    #[serde(default)]
    pub custom_color: Option<Option<String>>,
    pub comments_enabled: Option<bool>,
    pub likes_enabled: Option<bool>,
}

#[derive(Deserialize)]
pub struct JoinByCodeRequest {
    pub code: String,
}

#[derive(Serialize)]
pub struct JoinResponse {
    pub status: &'static str,
    pub mural: MuralDto,
}

#[derive(Deserialize)]
pub struct TransferRequest {
    pub new_creator_id: i32,
}

#[derive(Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

// ============================================================================
// Helpers
// ============================================================================

/// Load a mural and the requesting user's effective role on it.
pub async fn load_mural_and_role(
    state: &AppState,
    mural_id: i32,
    user_id: i32,
) -> Result<(murals::Model, Option<Role>), ApiError> {
    let Some(mural) = state.store().murals().get(mural_id).await? else {
        return Err(ApiError::mural_not_found());
    };
    let explicit = state
        .store()
        .memberships()
        .explicit_role(mural_id, user_id)
        .await?;
    let role = access::effective_role(&mural, user_id, explicit);
    Ok((mural, role))
}

/// Draw an unused 4-digit access code. Codes stay reserved even by
/// soft-deleted murals, so the pool shrinks over the life of the instance.
async fn generate_access_code(state: &AppState) -> Result<String, ApiError> {
    for _ in 0..ACCESS_CODE_ATTEMPTS {
        let code = format!("{}", rand::rng().random_range(1000..=9999));
        if !state.store().murals().access_code_exists(&code).await? {
            return Ok(code);
        }
    }
    Err(ApiError::Conflict(
        "No free access codes are available".to_string(),
    ))
}

/// Push an event to everyone on a mural except the actor.
async fn broadcast_to_members(
    state: &AppState,
    mural: &murals::Model,
    actor_id: i32,
    event: UserEvent,
) -> Result<(), ApiError> {
    let members = state.store().memberships().list_with_users(mural.id).await?;
    let mut ids: Vec<i32> = members.into_iter().map(|(m, _)| m.user_id).collect();
    if !ids.contains(&mural.creator_id) {
        ids.push(mural.creator_id);
    }
    for id in ids {
        if id != actor_id {
            state.notifier().push(id, event.clone()).await;
        }
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /murals
pub async fn create_mural(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreateMuralRequest>,
) -> Result<Json<ApiResponse<MuralDto>>, ApiError> {
    let title = payload.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::validation("A title is required"));
    }
    if payload.privacy != access::PRIVACY_PUBLIC && payload.privacy != access::PRIVACY_PRIVATE {
        return Err(ApiError::validation("Privacy must be public or private"));
    }

    let access_code = generate_access_code(&state).await?;

    let mural = state
        .store()
        .murals()
        .create(MuralInput {
            title,
            description: payload.description,
            creator_id: current.user.id,
            privacy: payload.privacy,
            access_code,
            theme_id: payload.theme_id,
            custom_color: payload.custom_color,
            comments_enabled: payload.comments_enabled,
            likes_enabled: payload.likes_enabled,
        })
        .await?;

    Ok(Json(ApiResponse::success(MuralDto::from_model(
        mural,
        Some(Role::Admin),
    ))))
}

/// GET /murals — every mural the user belongs to, newest first.
pub async fn list_my_murals(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<MuralDto>>>, ApiError> {
    let murals = state.store().murals().list_for_user(current.user.id).await?;

    let dtos = murals
        .into_iter()
        .map(|(mural, explicit)| {
            let explicit = explicit.and_then(|r| r.parse::<Role>().ok());
            let role = access::effective_role(&mural, current.user.id, explicit);
            MuralDto::from_model(mural, role)
        })
        .collect();

    Ok(Json(ApiResponse::success(dtos)))
}

/// GET /murals/{id}
pub async fn get_mural(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(mural_id): Path<i32>,
) -> Result<Json<ApiResponse<MuralDto>>, ApiError> {
    let (mural, role) = load_mural_and_role(&state, mural_id, current.user.id).await?;
    if !access::can_view(&mural, role) {
        return Err(ApiError::forbidden("This mural is private"));
    }
    Ok(Json(ApiResponse::success(MuralDto::from_model(mural, role))))
}

/// PUT /murals/{id} — administrator only.
pub async fn update_mural(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(mural_id): Path<i32>,
    Json(payload): Json<UpdateMuralRequest>,
) -> Result<Json<ApiResponse<MuralDto>>, ApiError> {
    let (mural, role) = load_mural_and_role(&state, mural_id, current.user.id).await?;
    if !access::can_administer(role) {
        return Err(ApiError::forbidden("Only an administrator can edit the mural"));
    }

    if let Some(privacy) = &payload.privacy {
        if privacy != access::PRIVACY_PUBLIC && privacy != access::PRIVACY_PRIVATE {
            return Err(ApiError::validation("Privacy must be public or private"));
        }
    }
    if let Some(title) = &payload.title {
        if title.trim().is_empty() {
            return Err(ApiError::validation("A title is required"));
        }
    }

    let updated = state
        .store()
        .murals()
        .update(
            mural,
            MuralUpdate {
                title: payload.title.map(|t| t.trim().to_string()),
                description: payload.description,
                privacy: payload.privacy,
                theme_id: payload.theme_id,
                custom_color: payload.custom_color,
                comments_enabled: payload.comments_enabled,
                likes_enabled: payload.likes_enabled,
            },
        )
        .await?;

    broadcast_to_members(
        &state,
        &updated,
        current.user.id,
        UserEvent::MuralUpdated { mural_id },
    )
    .await?;

    Ok(Json(ApiResponse::success(MuralDto::from_model(updated, role))))
}

/// DELETE /murals/{id} — administrator only; soft delete.
pub async fn delete_mural(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(mural_id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let (mural, role) = load_mural_and_role(&state, mural_id, current.user.id).await?;
    if !access::can_administer(role) {
        return Err(ApiError::forbidden(
            "Only an administrator can delete the mural",
        ));
    }

    broadcast_to_members(
        &state,
        &mural,
        current.user.id,
        UserEvent::MuralDeleted { mural_id },
    )
    .await?;

    state.store().murals().soft_delete(mural).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new("Mural deleted"))))
}

/// POST /murals/join — join (or request to join) through a 4-digit code.
pub async fn join_by_code(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<JoinByCodeRequest>,
) -> Result<Json<ApiResponse<JoinResponse>>, ApiError> {
    let code = payload.code.trim();
    if code.len() != 4 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::validation("The access code is 4 digits"));
    }

    let (mural, outcome) = state.membership().join_by_code(&current.user, code).await?;
    Ok(Json(ApiResponse::success(join_response(
        &state,
        mural,
        current.user.id,
        outcome,
    )
    .await?)))
}

/// POST /murals/{id}/join — direct join for public murals.
pub async fn join_public(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(mural_id): Path<i32>,
) -> Result<Json<ApiResponse<JoinResponse>>, ApiError> {
    let (mural, outcome) = state
        .membership()
        .join_public(&current.user, mural_id)
        .await?;
    Ok(Json(ApiResponse::success(join_response(
        &state,
        mural,
        current.user.id,
        outcome,
    )
    .await?)))
}

async fn join_response(
    state: &AppState,
    mural: murals::Model,
    user_id: i32,
    outcome: JoinOutcome,
) -> Result<JoinResponse, ApiError> {
    let status = match outcome {
        JoinOutcome::Joined(_) => "joined",
        JoinOutcome::AlreadyMember => "already_member",
        JoinOutcome::RequestPending => "request_pending",
    };
    let explicit = state
        .store()
        .memberships()
        .explicit_role(mural.id, user_id)
        .await?;
    let role = access::effective_role(&mural, user_id, explicit);
    Ok(JoinResponse {
        status,
        mural: MuralDto::from_model(mural, role),
    })
}

/// POST /murals/{id}/transfer — creator hands the mural to another member.
pub async fn transfer_ownership(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(mural_id): Path<i32>,
    Json(payload): Json<TransferRequest>,
) -> Result<Json<ApiResponse<MuralDto>>, ApiError> {
    let mural = state
        .membership()
        .transfer(&current.user, mural_id, payload.new_creator_id)
        .await?;

    let explicit = state
        .store()
        .memberships()
        .explicit_role(mural_id, current.user.id)
        .await?;
    let role = access::effective_role(&mural, current.user.id, explicit);
    Ok(Json(ApiResponse::success(MuralDto::from_model(mural, role))))
}

/// GET /murals/{id}/members
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(mural_id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<MemberDto>>>, ApiError> {
    let (mural, role) = load_mural_and_role(&state, mural_id, current.user.id).await?;
    if role.is_none() {
        return Err(ApiError::forbidden("Only members can see the member list"));
    }

    let rows = state.store().memberships().list_with_users(mural_id).await?;
    let mut members: Vec<MemberDto> = rows
        .into_iter()
        .map(|(membership, user)| {
            // The creator's stored row (if any) is overridden by identity.
            let role = if membership.user_id == mural.creator_id {
                Role::Admin.to_string()
            } else {
                membership.role
            };
            MemberDto {
                user_id: membership.user_id,
                display_name: user.as_ref().map(|u| u.display_name.clone()).unwrap_or_default(),
                avatar_url: user.and_then(|u| u.avatar_url),
                role,
                joined_at: membership.joined_at,
            }
        })
        .collect();

    // A creator without an explicit row still shows up, as an administrator.
    if !members.iter().any(|m| m.user_id == mural.creator_id) {
        if let Some(creator) = state.store().users().get_by_id(mural.creator_id).await? {
            members.insert(
                0,
                MemberDto {
                    user_id: creator.id,
                    display_name: creator.display_name,
                    avatar_url: creator.avatar_url,
                    role: Role::Admin.to_string(),
                    joined_at: mural.created_at.clone(),
                },
            );
        }
    }

    Ok(Json(ApiResponse::success(members)))
}

/// PUT /murals/{id}/members/{user_id}/role
pub async fn update_member_role(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path((mural_id, target_user_id)): Path<(i32, i32)>,
    Json(payload): Json<RoleRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let role: Role = payload
        .role
        .parse()
        .map_err(|_| ApiError::validation("Role must be reader, editor or admin"))?;

    state
        .membership()
        .update_role(&current.user, mural_id, target_user_id, role)
        .await?;
    Ok(Json(ApiResponse::success(MessageResponse::new("Role updated"))))
}

/// DELETE /murals/{id}/members/{user_id}
pub async fn expel_member(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path((mural_id, target_user_id)): Path<(i32, i32)>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .membership()
        .expel(&current.user, mural_id, target_user_id)
        .await?;
    Ok(Json(ApiResponse::success(MessageResponse::new("Member removed"))))
}

/// POST /murals/{id}/abandon — leave the mural voluntarily.
pub async fn abandon_mural(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(mural_id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.membership().abandon(&current.user, mural_id).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new("Left mural"))))
}
