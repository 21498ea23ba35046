//! HTTP-level integration tests for chat, command dispatch and session history.

mod common;

use axum::http::StatusCode;
use common::{body_json, delete_auth, get_auth, insert_config, post_json_auth, StubLlm};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn merge_request(iid: u64) -> serde_json::Value {
    json!({
        "iid": iid,
        "title": format!("Change {iid}"),
        "description": "Refactors the parser",
        "state": "opened",
        "author": {"name": "Ada Lovelace", "username": "ada"},
        "source_branch": "feature",
        "target_branch": "main",
        "labels": ["backend"],
        "created_at": "2026-03-01T10:00:00Z",
        "updated_at": "2026-03-02T10:00:00Z",
        "web_url": format!("https://gitlab.example.com/group/app/-/merge_requests/{iid}")
    })
}

/// GitLab double serving `count` open merge requests in project 42, plus
/// details and changes for merge request 5.
async fn gitlab_with_mrs(count: u64) -> MockServer {
    let server = MockServer::start().await;
    let mrs: Vec<_> = (1..=count).map(merge_request).collect();
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/42/merge_requests"))
        .and(query_param("state", "opened"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mrs))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/42/merge_requests/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(merge_request(5)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/42/merge_requests/5/changes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "changes": [{"new_path": "src/parser.rs", "diff": "@@ -1 +1 @@\n-old\n+new"}]
        })))
        .mount(&server)
        .await;
    server
}

#[sqlx::test(migrations = "../db/migrations")]
async fn general_chat_goes_to_the_model(pool: PgPool) {
    let app = common::build_test_app_with_llm(pool.clone(), StubLlm::replying("Hello there!"));
    let token = common::login_token(&pool, app.clone(), "chatter").await;

    let response = post_json_auth(
        app,
        "/api/v1/chat",
        json!({ "message": "How are you today?" }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["response"], "Hello there!");
    assert_eq!(json["data"]["model"], "test-model");
    assert!(json["data"]["session_id"].is_string());
    assert!(json["data"]["timestamp"].is_string());
    assert_eq!(json["data"]["selected_config_id"], serde_json::Value::Null);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn general_chat_with_model_down_is_an_upstream_error(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let token = common::login_token(&pool, app.clone(), "offline").await;

    let response = post_json_auth(
        app,
        "/api/v1/chat",
        json!({ "message": "Tell me a joke" }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["code"], "UPSTREAM_ERROR");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn empty_message_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let token = common::login_token(&pool, app.clone(), "silent").await;

    let response = post_json_auth(app, "/api/v1/chat", json!({ "message": "   " }), &token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn chat_requires_authentication(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = common::post_json(app, "/api/v1/chat", json!({ "message": "hi" })).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn two_active_configs_without_selection_get_enumerated_list(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let (user, token) = common::login(&pool, app.clone(), "multi").await;
    insert_config(&pool, user.id, "Work", "https://work.example.com", true).await;
    insert_config(&pool, user.id, "Home", "https://home.example.com", true).await;

    let response = post_json_auth(
        app,
        "/api/v1/chat",
        json!({ "message": "show me merge requests" }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let text = json["data"]["response"].as_str().unwrap();
    assert!(text.starts_with("Please select a GitLab configuration first:"));
    assert!(text.contains("1. Work"));
    assert!(text.contains("2. Home"));
    assert_eq!(json["data"]["selected_config_id"], serde_json::Value::Null);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn single_active_config_is_used_for_list_requests(pool: PgPool) {
    let gitlab = gitlab_with_mrs(12).await;
    let app = common::build_test_app(pool.clone());
    let (user, token) = common::login(&pool, app.clone(), "single").await;
    let config = insert_config(&pool, user.id, "Work", &gitlab.uri(), true).await;
    insert_config(&pool, user.id, "Old", "https://old.example.com", false).await;

    let response = post_json_auth(
        app,
        "/api/v1/chat",
        json!({ "message": "list open MRs" }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let text = json["data"]["response"].as_str().unwrap();
    assert!(text.starts_with("# 📋 Merge Requests in Project 42"));
    assert!(text.contains("### MR !10: Change 10"));
    assert!(!text.contains("### MR !11:"));
    assert!(text.contains("*... and 2 more merge requests*"));
    assert_eq!(json["data"]["selected_config_id"], config.id.to_string());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn slash_command_without_configs_explains_setup(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let token = common::login_token(&pool, app.clone(), "newbie").await;

    let response = post_json_auth(app, "/api/v1/chat", json!({ "message": "/show-mr" }), &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let text = body_json(response).await["data"]["response"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(text.contains("No GitLab Configurations Found"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn unknown_slash_command_lists_commands(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let token = common::login_token(&pool, app.clone(), "typo").await;

    let response = post_json_auth(app, "/api/v1/chat", json!({ "message": "/shwo-mr" }), &token).await;

    let text = body_json(response).await["data"]["response"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(text.starts_with("❌ Unknown command: `/shwo-mr`"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn picking_a_config_id_runs_the_pending_command(pool: PgPool) {
    let gitlab = gitlab_with_mrs(2).await;
    let app = common::build_test_app(pool.clone());
    let (user, token) = common::login(&pool, app.clone(), "picker").await;
    let work = insert_config(&pool, user.id, "Work", &gitlab.uri(), true).await;
    insert_config(&pool, user.id, "Home", "https://home.example.com", true).await;

    let response = post_json_auth(
        app.clone(),
        "/api/v1/chat",
        json!({ "message": "/show-mr" }),
        &token,
    )
    .await;
    let json = body_json(response).await;
    let session_id = json["data"]["session_id"].as_str().unwrap().to_string();
    assert!(json["data"]["response"].as_str().unwrap().contains(&work.id.to_string()));

    let response = post_json_auth(
        app,
        "/api/v1/chat",
        json!({ "message": work.id.to_string(), "session_id": session_id }),
        &token,
    )
    .await;
    let json = body_json(response).await;
    assert!(json["data"]["response"]
        .as_str()
        .unwrap()
        .contains("### MR !2: Change 2"));
    assert_eq!(json["data"]["selected_config_id"], work.id.to_string());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn review_flow_accepts_a_bare_mr_number(pool: PgPool) {
    let gitlab = gitlab_with_mrs(5).await;
    let app = common::build_test_app(pool.clone());
    let (user, token) = common::login(&pool, app.clone(), "reviewer").await;
    let config = insert_config(&pool, user.id, "Work", &gitlab.uri(), true).await;

    let response = post_json_auth(
        app.clone(),
        "/api/v1/chat",
        json!({ "message": "/review-mr", "config_id": config.id }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let session_id = json["data"]["session_id"].as_str().unwrap().to_string();
    assert!(json["data"]["response"]
        .as_str()
        .unwrap()
        .ends_with("Reply with the MR number (e.g., `!123` or just `123`) to review it."));

    let response = post_json_auth(
        app,
        "/api/v1/chat",
        json!({ "message": "5", "session_id": session_id }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let text = json["data"]["response"].as_str().unwrap();
    assert!(text.starts_with("**Merge Request !5: Change 5**"));
    assert!(text.contains("- **src/parser.rs**"));
    assert_eq!(json["data"]["selected_config_id"], config.id.to_string());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn deleted_remembered_config_falls_back_to_selection(pool: PgPool) {
    let gitlab = gitlab_with_mrs(2).await;
    let app = common::build_test_app(pool.clone());
    let (user, token) = common::login(&pool, app.clone(), "forgetful").await;
    let work = insert_config(&pool, user.id, "Work", &gitlab.uri(), true).await;
    insert_config(&pool, user.id, "Home", "https://home.example.com", true).await;
    insert_config(&pool, user.id, "Lab", "https://lab.example.com", true).await;

    let response = post_json_auth(
        app.clone(),
        "/api/v1/chat",
        json!({ "message": "/show-mr", "config_id": work.id }),
        &token,
    )
    .await;
    let json = body_json(response).await;
    let session_id = json["data"]["session_id"].as_str().unwrap().to_string();
    assert_eq!(json["data"]["selected_config_id"], work.id.to_string());

    let response = delete_auth(
        app.clone(),
        &format!("/api/v1/gitlab/configs/{}", work.id),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = post_json_auth(
        app,
        "/api/v1/chat",
        json!({ "message": "/show-mr", "session_id": session_id }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let text = json["data"]["response"].as_str().unwrap();
    assert!(!text.starts_with("❌"));
    assert!(text.contains("1. Home"));
    assert!(text.contains("2. Lab"));
    assert_eq!(json["data"]["selected_config_id"], serde_json::Value::Null);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn unknown_explicit_config_is_reported(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let (user, token) = common::login(&pool, app.clone(), "stray").await;
    insert_config(&pool, user.id, "Work", "https://work.example.com", true).await;
    let stray = Uuid::new_v4();

    let response = post_json_auth(
        app,
        "/api/v1/chat",
        json!({ "message": "show MR !12", "config_id": stray }),
        &token,
    )
    .await;
    let text = body_json(response).await["data"]["response"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(text.starts_with("❌"));
    assert!(text.contains(&stray.to_string()));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn sessions_record_both_sides_of_the_conversation(pool: PgPool) {
    let app = common::build_test_app_with_llm(pool.clone(), StubLlm::replying("Sure."));
    let token = common::login_token(&pool, app.clone(), "historian").await;

    let response = post_json_auth(
        app.clone(),
        "/api/v1/chat",
        json!({ "message": "Can you help me?\nSecond line" }),
        &token,
    )
    .await;
    let session_id = body_json(response).await["data"]["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = get_auth(app.clone(), "/api/v1/chat/sessions", &token).await;
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"][0]["title"], "Can you help me?");

    let messages_uri = format!("/api/v1/chat/sessions/{session_id}/messages");
    let response = get_auth(app.clone(), &messages_uri, &token).await;
    let json = body_json(response).await;
    let messages = json["data"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], "Sure.");
    assert_eq!(messages[1]["message_metadata"]["source"], "llm");

    let response = delete_auth(
        app.clone(),
        &format!("/api/v1/chat/sessions/{session_id}"),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get_auth(app, &messages_uri, &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn other_users_sessions_are_not_found(pool: PgPool) {
    let app = common::build_test_app_with_llm(pool.clone(), StubLlm::replying("Hi."));
    let alice = common::login_token(&pool, app.clone(), "alice").await;
    let bob = common::login_token(&pool, app.clone(), "bob").await;

    let response = post_json_auth(app.clone(), "/api/v1/chat", json!({ "message": "hello" }), &alice).await;
    let session_id = body_json(response).await["data"]["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = post_json_auth(
        app.clone(),
        "/api/v1/chat",
        json!({ "message": "hello", "session_id": session_id }),
        &bob,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get_auth(
        app,
        &format!("/api/v1/chat/sessions/{session_id}/messages"),
        &bob,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
