use axum::{
    Json,
    extract::{Path, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::api::types::{MessageResponse, SessionDto, UserDto};
use crate::entities::{sessions, users};
use crate::services::auth::{LoginInput, RegisterInput};

/// Authenticated identity attached to the request by the middleware.
#[derive(Clone)]
pub struct CurrentUser {
    pub user: users::Model,
    pub session_id: i32,
}

// ============================================================================
// Middleware
// ============================================================================

/// Authentication middleware. Accepts `Authorization: Bearer <token>` where
/// the token is an active session's opaque token.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = extract_bearer(&headers) else {
        return Err(ApiError::Unauthorized("Missing bearer token".to_string()));
    };

    let Some((session, user)) = state.store().sessions().resolve_token(&token).await? else {
        return Err(ApiError::Unauthorized("Invalid or expired token".to_string()));
    };

    tracing::Span::current().record("user_id", user.id);
    request.extensions_mut().insert(CurrentUser {
        user,
        session_id: session.id,
    });
    Ok(next.run(request).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers.get("Authorization")?;
    let auth_str = auth_header.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?;
    Some(token.trim().to_string())
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
    pub captcha_token: Option<String>,
    pub device: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub device: Option<String>,
}

/// Shared shape for register and login: the fresh bearer token, the
/// account, and every session currently active on it.
#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserDto,
    pub sessions: Vec<SessionDto>,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register — creates the account and its first session, so the
/// response already carries a usable bearer token.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, ApiError> {
    let (session, user) = state
        .auth()
        .register(RegisterInput {
            email: payload.email,
            display_name: payload.display_name,
            password: payload.password,
            captcha_token: payload.captcha_token,
            device: payload.device,
        })
        .await?;

    auth_response(&state, session, user).await
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, ApiError> {
    let (session, user) = state
        .auth()
        .login(LoginInput {
            email: payload.email,
            password: payload.password,
            device: payload.device,
        })
        .await?;

    auth_response(&state, session, user).await
}

async fn auth_response(
    state: &AppState,
    session: sessions::Model,
    user: users::Model,
) -> Result<Json<ApiResponse<AuthResponse>>, ApiError> {
    let sessions = state.store().sessions().list_active_for_user(user.id).await?;
    Ok(Json(ApiResponse::success(AuthResponse {
        token: session.token,
        user: user.into(),
        sessions: sessions.into_iter().map(SessionDto::from).collect(),
    })))
}

/// GET /auth/me
pub async fn me(
    axum::Extension(current): axum::Extension<CurrentUser>,
) -> Json<ApiResponse<UserDto>> {
    Json(ApiResponse::success(current.user.into()))
}

/// GET /auth/sessions
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    axum::Extension(current): axum::Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<SessionDto>>>, ApiError> {
    let sessions = state
        .store()
        .sessions()
        .list_active_for_user(current.user.id)
        .await?;
    Ok(Json(ApiResponse::success(
        sessions.into_iter().map(SessionDto::from).collect(),
    )))
}

/// POST /auth/logout — end the current session.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    axum::Extension(current): axum::Extension<CurrentUser>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .store()
        .sessions()
        .deactivate(current.session_id, current.user.id)
        .await?;
    Ok(Json(ApiResponse::success(MessageResponse::new("Logged out"))))
}

/// POST /auth/logout/{session_id} — revoke one of the user's other sessions.
/// Idempotent: a missing or already-revoked session is still a success.
pub async fn logout_session(
    State(state): State<Arc<AppState>>,
    axum::Extension(current): axum::Extension<CurrentUser>,
    Path(session_id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .store()
        .sessions()
        .deactivate(session_id, current.user.id)
        .await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Session revoked",
    ))))
}

/// POST /auth/password/forgot
///
/// Always answers with the same message so the endpoint cannot be used to
/// probe which emails are registered.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.auth().forgot_password(&payload.email).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "If that email is registered, a reset code is on its way",
    ))))
}

/// POST /auth/password/reset
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .auth()
        .reset_password(&payload.token, &payload.password)
        .await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password updated",
    ))))
}
