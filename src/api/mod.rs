use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::SharedState;

pub mod auth;
mod error;
pub mod events;
mod murals;
mod notifications;
mod observability;
mod posts;
mod social;
mod system;
pub mod types;
mod uploads;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn notifier(&self) -> &Arc<crate::services::Notifier> {
        &self.shared.notifier
    }

    #[must_use]
    pub fn auth(&self) -> &Arc<crate::services::AuthService> {
        &self.shared.auth
    }

    #[must_use]
    pub fn membership(&self) -> &Arc<crate::services::MembershipService> {
        &self.shared.membership
    }

    #[must_use]
    pub fn content(&self) -> &Arc<crate::services::ContentService> {
        &self.shared.content
    }
}

pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().server.cors_allowed_origins.clone();

    let protected_routes = create_protected_router(state.clone());

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/health/live", get(system::health_live))
        .route("/health/ready", get(system::health_ready))
        .route("/status", get(system::get_status))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/password/forgot", post(auth::forgot_password))
        .route("/auth/password/reset", post(auth::reset_password))
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/sessions", get(auth::list_sessions))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/logout/{session_id}", post(auth::logout_session))
        .route("/murals", post(murals::create_mural))
        .route("/murals", get(murals::list_my_murals))
        .route("/murals/join", post(murals::join_by_code))
        .route("/murals/{id}", get(murals::get_mural))
        .route("/murals/{id}", put(murals::update_mural))
        .route("/murals/{id}", delete(murals::delete_mural))
        .route("/murals/{id}/join", post(murals::join_public))
        .route("/murals/{id}/transfer", post(murals::transfer_ownership))
        .route("/murals/{id}/abandon", post(murals::abandon_mural))
        .route("/murals/{id}/members", get(murals::list_members))
        .route(
            "/murals/{id}/members/{user_id}/role",
            put(murals::update_member_role),
        )
        .route(
            "/murals/{id}/members/{user_id}",
            delete(murals::expel_member),
        )
        .route("/murals/{id}/posts", get(posts::list_posts))
        .route("/murals/{id}/posts", post(posts::create_post))
        .route("/posts/{id}", put(posts::update_post))
        .route("/posts/{id}", delete(posts::delete_post))
        .route("/posts/{id}/content", post(posts::set_inline_content))
        .route("/uploads/posts/{id}", post(uploads::upload_post_content))
        .route("/posts/{id}/comments", get(social::list_comments))
        .route("/posts/{id}/comments", post(social::add_comment))
        .route("/comments/{id}", delete(social::delete_comment))
        .route("/posts/{id}/like", post(social::like_post))
        .route("/posts/{id}/like", delete(social::unlike_post))
        .route("/notifications", get(notifications::list_notifications))
        .route(
            "/notifications/{id}/process",
            put(notifications::process_request),
        )
        .route(
            "/notifications/{id}",
            delete(notifications::delete_notification),
        )
        .route("/notifications/read-all", post(notifications::read_all))
        .route("/metrics", get(observability::get_metrics))
        .merge(events::router())
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
