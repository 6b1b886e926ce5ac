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

async fn user_id(app: &Router, token: &str) -> i64 {
    let (_, body) = send(app, "GET", "/api/auth/me", Some(token), None).await;
    body["data"]["id"].as_i64().unwrap()
}

/// Create a mural and return (id, `access_code`).
async fn create_mural(app: &Router, token: &str, title: &str, privacy: &str) -> (i64, String) {
    let (status, body) = send(
        app,
        "POST",
        "/api/murals",
        Some(token),
        Some(json!({"title": title, "privacy": privacy})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    (
        body["data"]["id"].as_i64().unwrap(),
        body["data"]["access_code"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn joining_a_public_mural_by_code_is_immediate() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;
    let bob = register_user(&app, "bob@example.com", "Bob").await;

    let (_, code) = create_mural(&app, &ana, "Open wall", "public").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/murals/join",
        Some(&bob),
        Some(json!({"code": code})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "joined");
    assert_eq!(body["data"]["mural"]["my_role"], "reader");

    // Joining again reports existing membership instead of failing.
    let (status, body) = send(
        &app,
        "POST",
        "/api/murals/join",
        Some(&bob),
        Some(json!({"code": code})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "already_member");
}

#[tokio::test]
async fn unknown_or_malformed_codes_are_rejected() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/murals/join",
        Some(&ana),
        Some(json!({"code": "12"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, code) = create_mural(&app, &ana, "Wall", "public").await;
    let wrong = if code == "1000" { "1001" } else { "1000" };
    let (status, _) = send(
        &app,
        "POST",
        "/api/murals/join",
        Some(&ana),
        Some(json!({"code": wrong})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn private_join_opens_a_pending_request() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;
    let bob = register_user(&app, "bob@example.com", "Bob").await;

    let (mural_id, code) = create_mural(&app, &ana, "Secret wall", "private").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/murals/join",
        Some(&bob),
        Some(json!({"code": code})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "request_pending");

    // A second request while one is pending is a conflict.
    let (status, _) = send(
        &app,
        "POST",
        "/api/murals/join",
        Some(&bob),
        Some(json!({"code": code})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Bob is still not a member.
    let (status, _) = send(&app, "GET", &format!("/api/murals/{mural_id}"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = send(&app, "GET", "/api/notifications", Some(&ana), None).await;
    let notifications = body["data"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["kind"], "access_request");
    assert_eq!(notifications[0]["request_status"], "pending");
}

#[tokio::test]
async fn approving_a_request_admits_the_requester() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;
    let bob = register_user(&app, "bob@example.com", "Bob").await;

    let (mural_id, code) = create_mural(&app, &ana, "Secret wall", "private").await;

    send(
        &app,
        "POST",
        "/api/murals/join",
        Some(&bob),
        Some(json!({"code": code})),
    )
    .await;

    let (_, body) = send(&app, "GET", "/api/notifications", Some(&ana), None).await;
    let request_id = body["data"][0]["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/notifications/{request_id}/process"),
        Some(&ana),
        Some(json!({"approved": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "approved");

    // Processing the same request again is a clean no-op.
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/notifications/{request_id}/process"),
        Some(&ana),
        Some(json!({"approved": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "already_processed");

    // Bob is now a reader and was told about the approval.
    let (status, body) = send(&app, "GET", &format!("/api/murals/{mural_id}"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["my_role"], "reader");

    let (_, body) = send(&app, "GET", "/api/notifications", Some(&bob), None).await;
    assert_eq!(body["data"][0]["kind"], "invitation");
}

#[tokio::test]
async fn rejecting_a_request_keeps_the_requester_out() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;
    let bob = register_user(&app, "bob@example.com", "Bob").await;

    let (mural_id, code) = create_mural(&app, &ana, "Secret wall", "private").await;

    send(
        &app,
        "POST",
        "/api/murals/join",
        Some(&bob),
        Some(json!({"code": code})),
    )
    .await;

    let (_, body) = send(&app, "GET", "/api/notifications", Some(&ana), None).await;
    let request_id = body["data"][0]["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/notifications/{request_id}/process"),
        Some(&ana),
        Some(json!({"approved": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "rejected");

    let (status, _) = send(&app, "GET", &format!("/api/murals/{mural_id}"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The rejection consumed the request, so Bob may ask again.
    let (status, body) = send(
        &app,
        "POST",
        "/api/murals/join",
        Some(&bob),
        Some(json!({"code": code})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "request_pending");
}

#[tokio::test]
async fn only_administrators_can_process_requests() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;
    let bob = register_user(&app, "bob@example.com", "Bob").await;
    let eve = register_user(&app, "eve@example.com", "Eve").await;

    let (_, code) = create_mural(&app, &ana, "Secret wall", "private").await;

    send(
        &app,
        "POST",
        "/api/murals/join",
        Some(&bob),
        Some(json!({"code": code})),
    )
    .await;

    let (_, body) = send(&app, "GET", "/api/notifications", Some(&ana), None).await;
    let request_id = body["data"][0]["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/notifications/{request_id}/process"),
        Some(&eve),
        Some(json!({"approved": true})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn creator_must_transfer_before_leaving() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;

    let (mural_id, _) = create_mural(&app, &ana, "Wall", "private").await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/murals/{mural_id}/abandon"),
        Some(&ana),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "creator_must_transfer");
}

#[tokio::test]
async fn members_can_abandon_and_outsiders_cannot() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;
    let bob = register_user(&app, "bob@example.com", "Bob").await;
    let eve = register_user(&app, "eve@example.com", "Eve").await;

    let (mural_id, code) = create_mural(&app, &ana, "Open wall", "public").await;

    send(
        &app,
        "POST",
        "/api/murals/join",
        Some(&bob),
        Some(json!({"code": code})),
    )
    .await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/murals/{mural_id}/abandon"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/api/murals", Some(&bob), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/murals/{mural_id}/abandon"),
        Some(&eve),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ownership_transfer_swaps_the_administrator() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;
    let bob = register_user(&app, "bob@example.com", "Bob").await;

    let (mural_id, code) = create_mural(&app, &ana, "Wall", "public").await;
    let bob_id = user_id(&app, &bob).await;

    send(
        &app,
        "POST",
        "/api/murals/join",
        Some(&bob),
        Some(json!({"code": code})),
    )
    .await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/murals/{mural_id}/transfer"),
        Some(&ana),
        Some(json!({"new_creator_id": bob_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", &format!("/api/murals/{mural_id}"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["my_role"], "admin");
    assert_eq!(body["data"]["creator_id"], bob_id);

    // The outgoing creator's role row was dropped in the same transaction.
    let (status, body) = send(&app, "GET", &format!("/api/murals/{mural_id}"), Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["my_role"].is_null());

    let (_, body) = send(&app, "GET", "/api/notifications", Some(&bob), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn transfer_requires_the_creator_and_a_member_target() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;
    let bob = register_user(&app, "bob@example.com", "Bob").await;

    let (mural_id, code) = create_mural(&app, &ana, "Wall", "public").await;
    let ana_id = user_id(&app, &ana).await;
    let bob_id = user_id(&app, &bob).await;

    // Bob is not a member yet.
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/murals/{mural_id}/transfer"),
        Some(&ana),
        Some(json!({"new_creator_id": bob_id})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    send(
        &app,
        "POST",
        "/api/murals/join",
        Some(&bob),
        Some(json!({"code": code})),
    )
    .await;

    // Only the creator may transfer.
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/murals/{mural_id}/transfer"),
        Some(&bob),
        Some(json!({"new_creator_id": ana_id})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn the_creator_cannot_be_demoted_or_expelled() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;
    let bob = register_user(&app, "bob@example.com", "Bob").await;

    let (mural_id, code) = create_mural(&app, &ana, "Wall", "public").await;
    let ana_id = user_id(&app, &ana).await;
    let bob_id = user_id(&app, &bob).await;

    send(
        &app,
        "POST",
        "/api/murals/join",
        Some(&bob),
        Some(json!({"code": code})),
    )
    .await;
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/murals/{mural_id}/members/{bob_id}/role"),
        Some(&ana),
        Some(json!({"role": "admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Bob is an administrator now but still cannot touch the creator.
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/murals/{mural_id}/members/{ana_id}/role"),
        Some(&bob),
        Some(json!({"role": "reader"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "creator_immune");

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/murals/{mural_id}/members/{ana_id}"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn expelled_members_lose_access() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;
    let bob = register_user(&app, "bob@example.com", "Bob").await;

    let (mural_id, code) = create_mural(&app, &ana, "Secret wall", "private").await;
    let bob_id = user_id(&app, &bob).await;

    send(
        &app,
        "POST",
        "/api/murals/join",
        Some(&bob),
        Some(json!({"code": code})),
    )
    .await;
    let (_, body) = send(&app, "GET", "/api/notifications", Some(&ana), None).await;
    let request_id = body["data"][0]["id"].as_i64().unwrap();
    send(
        &app,
        "PUT",
        &format!("/api/notifications/{request_id}/process"),
        Some(&ana),
        Some(json!({"approved": true})),
    )
    .await;

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/murals/{mural_id}/members/{bob_id}"),
        Some(&ana),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", &format!("/api/murals/{mural_id}"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn notifications_are_consumed_by_reading() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;
    let bob = register_user(&app, "bob@example.com", "Bob").await;

    let (_, code) = create_mural(&app, &ana, "Open wall", "public").await;

    // Bob joining notifies the creator.
    send(
        &app,
        "POST",
        "/api/murals/join",
        Some(&bob),
        Some(json!({"code": code})),
    )
    .await;

    let (_, body) = send(&app, "GET", "/api/notifications", Some(&ana), None).await;
    let notifications = body["data"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    let id = notifications[0]["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/notifications/{id}"),
        Some(&ana),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Deleting again is an idempotent success.
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/notifications/{id}"),
        Some(&ana),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/api/notifications", Some(&ana), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn read_all_consumes_everything() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;
    let bob = register_user(&app, "bob@example.com", "Bob").await;
    let eve = register_user(&app, "eve@example.com", "Eve").await;

    let (_, code) = create_mural(&app, &ana, "Open wall", "public").await;
    for token in [&bob, &eve] {
        send(
            &app,
            "POST",
            "/api/murals/join",
            Some(token),
            Some(json!({"code": code})),
        )
        .await;
    }

    let (_, body) = send(&app, "GET", "/api/notifications", Some(&ana), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, _) = send(&app, "POST", "/api/notifications/read-all", Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/api/notifications", Some(&ana), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn member_list_shows_the_creator_as_administrator() {
    let app = spawn_app().await;
    let ana = register_user(&app, "ana@example.com", "Ana").await;
    let bob = register_user(&app, "bob@example.com", "Bob").await;

    let (mural_id, code) = create_mural(&app, &ana, "Open wall", "public").await;
    let ana_id = user_id(&app, &ana).await;

    send(
        &app,
        "POST",
        "/api/murals/join",
        Some(&bob),
        Some(json!({"code": code})),
    )
    .await;

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/murals/{mural_id}/members"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let members = body["data"].as_array().unwrap();
    assert_eq!(members.len(), 2);
    let creator = members
        .iter()
        .find(|m| m["user_id"].as_i64() == Some(ana_id))
        .unwrap();
    assert_eq!(creator["role"], "admin");
}

#[tokio::test]
async fn a_failed_transfer_leaves_no_partial_state() {
    use muralboard::access::Role;
    use muralboard::db::{MuralInput, Store};
    use muralboard::entities::notifications;
    use sea_orm::Set;

    let store = Store::new("sqlite::memory:").await.unwrap();
    let ana = store
        .users()
        .create("ana@example.com", "Ana", None)
        .await
        .unwrap();
    let bob = store
        .users()
        .create("bob@example.com", "Bob", None)
        .await
        .unwrap();

    let mural = store
        .murals()
        .create(MuralInput {
            title: "Wall".to_string(),
            description: None,
            creator_id: ana.id,
            privacy: "private".to_string(),
            access_code: "4821".to_string(),
            theme_id: 1,
            custom_color: None,
            comments_enabled: true,
            likes_enabled: true,
        })
        .await
        .unwrap();
    store
        .memberships()
        .insert_if_absent(mural.id, ana.id, Role::Admin)
        .await
        .unwrap();
    store
        .memberships()
        .insert_if_absent(mural.id, bob.id, Role::Reader)
        .await
        .unwrap();

    // A notification missing its required columns cannot be inserted; that
    // failure has to roll back the creator reassignment and the member-row
    // delete committed earlier in the same transaction.
    let broken = notifications::ActiveModel {
        sender_id: Set(ana.id),
        ..Default::default()
    };
    let result = store
        .murals()
        .transfer_ownership(mural.clone(), bob.id, broken)
        .await;
    assert!(result.is_err());

    let reloaded = store.murals().get(mural.id).await.unwrap().unwrap();
    assert_eq!(reloaded.creator_id, ana.id);
    assert_eq!(
        store
            .memberships()
            .explicit_role(mural.id, ana.id)
            .await
            .unwrap(),
        Some(Role::Admin)
    );
}
