use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use muralboard::config::Config;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn spawn_app() -> Router {
    let mut config = Config::default();
    config.general.database_url = "sqlite::memory:".to_string();

    let state = muralboard::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");
    muralboard::api::router(state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = if let Some(body) = body {
        builder
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    } else {
        builder.body(Body::empty()).unwrap()
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn register_user(app: &Router, email: &str, name: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "email": email,
            "display_name": name,
            "password": "correct horse battery",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["token"].as_str().unwrap().to_string()
}

async fn upload_file(app: &Router, token: &str, post_id: i64, file_name: &str) {
    let boundary = "upload-test-boundary";
    let multipart_body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
         Content-Type: image/png\r\n\r\n\
         fake png bytes\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/uploads/posts/{post_id}"))
        .header("Authorization", format!("Bearer {token}"))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(multipart_body))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_probes_are_public() {
    let app = spawn_app().await;

    let (status, body) = send(&app, "GET", "/api/health/live", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "alive");

    let (status, body) = send(&app, "GET", "/api/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["database"], true);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = spawn_app().await;

    let (status, _) = send(&app, "GET", "/api/murals", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut builder = Request::builder().method("GET").uri("/api/murals");
    builder = builder.header("Authorization", "Bearer not-a-real-token");
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_issues_a_working_session_immediately() {
    let app = spawn_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "email": "ana@example.com",
            "display_name": "Ana",
            "password": "correct horse battery",
            "device": "laptop",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["sessions"].as_array().unwrap().len(), 1);

    // The register token works without a login round-trip.
    let (status, body) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "ana@example.com");
    assert_eq!(body["data"]["display_name"], "Ana");
}

#[tokio::test]
async fn login_reports_every_active_session() {
    let app = spawn_app().await;
    register_user(&app, "ana@example.com", "Ana").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({
            "email": "ana@example.com",
            "password": "correct horse battery",
            "device": "phone",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["token"].is_string());

    // One session from registration plus the one just opened.
    let sessions = body["data"]["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().any(|s| s["device"] == "phone"));
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let app = spawn_app().await;
    register_user(&app, "ana@example.com", "Ana").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "email": "ANA@example.com",
            "display_name": "Ana Again",
            "password": "another password",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn repeated_login_failures_lock_the_account() {
    let app = spawn_app().await;
    register_user(&app, "ana@example.com", "Ana").await;

    for _ in 0..5 {
        let (status, _) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "ana@example.com", "password": "wrong"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // Even the correct password is refused while locked.
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": "ana@example.com", "password": "correct horse battery"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "account_locked");
}

#[tokio::test]
async fn logout_invalidates_the_token() {
    let app = spawn_app().await;
    let token = register_user(&app, "ana@example.com", "Ana").await;

    let (status, _) = send(&app, "POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn creator_is_administrator_of_a_new_mural() {
    let app = spawn_app().await;
    let token = register_user(&app, "ana@example.com", "Ana").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/murals",
        Some(&token),
        Some(json!({"title": "Team wall", "privacy": "private"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["my_role"], "admin");

    let code = body["data"]["access_code"].as_str().unwrap();
    assert_eq!(code.len(), 4);
    assert!(code.chars().all(|c| c.is_ascii_digit()));

    let (status, body) = send(&app, "GET", "/api/murals", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["my_role"], "admin");
}

#[tokio::test]
async fn private_murals_are_hidden_from_outsiders() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;
    let bob = register_user(&app, "bob@example.com", "Bob").await;

    let (_, body) = send(
        &app,
        "POST",
        "/api/murals",
        Some(&ana),
        Some(json!({"title": "Secret wall", "privacy": "private"})),
    )
    .await;
    let mural_id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = send(&app, "GET", &format!("/api/murals/{mural_id}"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn public_murals_are_readable_by_anyone_but_not_editable() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;
    let bob = register_user(&app, "bob@example.com", "Bob").await;

    let (_, body) = send(
        &app,
        "POST",
        "/api/murals",
        Some(&ana),
        Some(json!({"title": "Open wall", "privacy": "public"})),
    )
    .await;
    let mural_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = send(&app, "GET", &format!("/api/murals/{mural_id}"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    // Non-members get read access, no role, no access code.
    assert!(body["data"]["my_role"].is_null());
    assert!(body["data"].get("access_code").is_none());

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/murals/{mural_id}/posts"),
        Some(&bob),
        Some(json!({"title": "Drive-by post"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn post_lifecycle_and_editor_threshold() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;
    let bob = register_user(&app, "bob@example.com", "Bob").await;

    let (_, body) = send(
        &app,
        "POST",
        "/api/murals",
        Some(&ana),
        Some(json!({"title": "Open wall", "privacy": "public"})),
    )
    .await;
    let mural_id = body["data"]["id"].as_i64().unwrap();

    // Bob joins and starts as a reader.
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/murals/{mural_id}/join"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "joined");
    assert_eq!(body["data"]["mural"]["my_role"], "reader");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/murals/{mural_id}/posts"),
        Some(&bob),
        Some(json!({"title": "Reader post"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Promote Bob to editor; now post creation works.
    let (_, me) = send(&app, "GET", "/api/auth/me", Some(&bob), None).await;
    let bob_id = me["data"]["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/murals/{mural_id}/members/{bob_id}/role"),
        Some(&ana),
        Some(json!({"role": "editor"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/murals/{mural_id}/posts"),
        Some(&bob),
        Some(json!({"title": "Editor post", "description": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let post_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/murals/{mural_id}/posts"),
        Some(&ana),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["author_name"], "Bob");

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/posts/{post_id}"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(
        &app,
        "GET",
        &format!("/api/murals/{mural_id}/posts"),
        Some(&ana),
        None,
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn content_replacement_keeps_a_single_row() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;

    let (_, body) = send(
        &app,
        "POST",
        "/api/murals",
        Some(&ana),
        Some(json!({"title": "Wall", "privacy": "private"})),
    )
    .await;
    let mural_id = body["data"]["id"].as_i64().unwrap();

    let (_, body) = send(
        &app,
        "POST",
        &format!("/api/murals/{mural_id}/posts"),
        Some(&ana),
        Some(json!({"title": "Post"})),
    )
    .await;
    let post_id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/posts/{post_id}/content"),
        Some(&ana),
        Some(json!({"kind": "text", "text": "first version"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/posts/{post_id}/content"),
        Some(&ana),
        Some(json!({"kind": "link", "url": "https://example.com/doc"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["kind"], "link");

    // Replacement, not accumulation: exactly one content row survives.
    let (_, body) = send(
        &app,
        "GET",
        &format!("/api/murals/{mural_id}/posts"),
        Some(&ana),
        None,
    )
    .await;
    let contents = body["data"][0]["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 1);
    assert_eq!(contents[0]["kind"], "link");
    assert_eq!(contents[0]["url"], "https://example.com/doc");
}

#[tokio::test]
async fn invalid_inline_content_is_rejected() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;

    let (_, body) = send(
        &app,
        "POST",
        "/api/murals",
        Some(&ana),
        Some(json!({"title": "Wall"})),
    )
    .await;
    let mural_id = body["data"]["id"].as_i64().unwrap();

    let (_, body) = send(
        &app,
        "POST",
        &format!("/api/murals/{mural_id}/posts"),
        Some(&ana),
        Some(json!({"title": "Post"})),
    )
    .await;
    let post_id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/posts/{post_id}/content"),
        Some(&ana),
        Some(json!({"kind": "link", "url": "not a url"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/posts/{post_id}/content"),
        Some(&ana),
        Some(json!({"kind": "text", "text": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn uploaded_files_replace_existing_content() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;

    let (_, body) = send(
        &app,
        "POST",
        "/api/murals",
        Some(&ana),
        Some(json!({"title": "Wall"})),
    )
    .await;
    let mural_id = body["data"]["id"].as_i64().unwrap();

    let (_, body) = send(
        &app,
        "POST",
        &format!("/api/murals/{mural_id}/posts"),
        Some(&ana),
        Some(json!({"title": "Post"})),
    )
    .await;
    let post_id = body["data"]["id"].as_i64().unwrap();

    send(
        &app,
        "POST",
        &format!("/api/posts/{post_id}/content"),
        Some(&ana),
        Some(json!({"kind": "text", "text": "placeholder"})),
    )
    .await;

    upload_file(&app, &ana, post_id, "photo.png").await;

    let (_, body) = send(
        &app,
        "GET",
        &format!("/api/murals/{mural_id}/posts"),
        Some(&ana),
        None,
    )
    .await;
    let contents = body["data"][0]["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 1);
    assert_eq!(contents[0]["kind"], "image");
    assert_eq!(contents[0]["file_name"], "photo.png");
}

#[tokio::test]
async fn replaced_and_deleted_uploads_release_their_objects() {
    use muralboard::services::MemoryObjectStorage;
    use muralboard::state::SharedState;
    use std::sync::Arc;

    let mut config = Config::default();
    config.general.database_url = "sqlite::memory:".to_string();

    let storage = Arc::new(MemoryObjectStorage::new());
    let shared = SharedState::with_storage(config, storage.clone())
        .await
        .expect("Failed to create shared state");
    let app = muralboard::api::router(muralboard::api::create_app_state(Arc::new(shared), None));

    let ana = register_user(&app, "ana@example.com", "Ana").await;

    let (_, body) = send(
        &app,
        "POST",
        "/api/murals",
        Some(&ana),
        Some(json!({"title": "Wall"})),
    )
    .await;
    let mural_id = body["data"]["id"].as_i64().unwrap();

    let (_, body) = send(
        &app,
        "POST",
        &format!("/api/murals/{mural_id}/posts"),
        Some(&ana),
        Some(json!({"title": "Post"})),
    )
    .await;
    let post_id = body["data"]["id"].as_i64().unwrap();

    upload_file(&app, &ana, post_id, "first.png").await;
    assert_eq!(storage.len().await, 1);

    // Re-uploading swaps the stored object, never accumulates a second one.
    upload_file(&app, &ana, post_id, "second.png").await;
    assert_eq!(storage.len().await, 1);

    let (_, body) = send(
        &app,
        "GET",
        &format!("/api/murals/{mural_id}/posts"),
        Some(&ana),
        None,
    )
    .await;
    let url = body["data"][0]["contents"][0]["url"].as_str().unwrap();
    assert!(storage.contains(url).await);

    let (status, _) = send(&app, "DELETE", &format!("/api/posts/{post_id}"), Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(storage.len().await, 0);
}

#[tokio::test]
async fn comments_and_likes_respect_mural_toggles() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;

    let (_, body) = send(
        &app,
        "POST",
        "/api/murals",
        Some(&ana),
        Some(json!({"title": "Quiet wall", "comments_enabled": false, "likes_enabled": true})),
    )
    .await;
    let mural_id = body["data"]["id"].as_i64().unwrap();

    let (_, body) = send(
        &app,
        "POST",
        &format!("/api/murals/{mural_id}/posts"),
        Some(&ana),
        Some(json!({"title": "Post"})),
    )
    .await;
    let post_id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/posts/{post_id}/comments"),
        Some(&ana),
        Some(json!({"body": "nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Likes are idempotent: liking twice still counts once.
    for _ in 0..2 {
        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/posts/{post_id}/like"),
            Some(&ana),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["likes"], 1);
    }

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/api/posts/{post_id}/like"),
        Some(&ana),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["likes"], 0);
}

#[tokio::test]
async fn comment_notifies_the_post_author() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;
    let bob = register_user(&app, "bob@example.com", "Bob").await;

    let (_, body) = send(
        &app,
        "POST",
        "/api/murals",
        Some(&ana),
        Some(json!({"title": "Open wall", "privacy": "public"})),
    )
    .await;
    let mural_id = body["data"]["id"].as_i64().unwrap();

    let (_, body) = send(
        &app,
        "POST",
        &format!("/api/murals/{mural_id}/posts"),
        Some(&ana),
        Some(json!({"title": "Post"})),
    )
    .await;
    let post_id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/posts/{post_id}/comments"),
        Some(&bob),
        Some(json!({"body": "nice one"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/api/notifications", Some(&ana), None).await;
    let notifications = body["data"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["kind"], "comment");
    assert_eq!(notifications[0]["sender_name"], "Bob");
}
