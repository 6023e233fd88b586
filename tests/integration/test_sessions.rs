//! End-to-end integration tests for the MathBuddy server
//!
//! These tests spawn the real HTTP server on an ephemeral port, wired to
//! stub upstream chat and knowledge services that speak the same wire
//! shapes as the production APIs, then drive full tutoring flows with a
//! plain HTTP client.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use mathbuddy_clients::{
    ChatOptions, HttpChatModel, HttpKnowledgeEngine, KnowledgeEngine, KnowledgeOptions,
};
use mathbuddy_core::ALL_STEPS_COMPLETE;
use mathbuddy_server::{create_router, AppState, Config, RateLimitConfig};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Tutoring reply the stub chat service returns for conversational turns.
const TUTOR_REPLY: &str = "Great question! Let's think about what the fraction means.";

/// Structured reply the stub chat service returns for solve prompts.
const SOLVE_REPLY: &str = "1. Problem type: Arithmetic\n\
2. Steps:\n\
Step 1: Add the numbers.\n\
Step 2: Check the sum.\n\
3. Final answer: 4\n\
4. Summary: Simple addition.";

/// Stub chat-completions endpoint.
///
/// Answers solve prompts with a structured solution and everything else
/// with a canned tutoring reply.
async fn stub_completions(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
    let last_message = body["messages"]
        .as_array()
        .and_then(|messages| messages.last())
        .and_then(|message| message["content"].as_str())
        .unwrap_or_default();
    let content = if last_message.contains("Problem:") {
        SOLVE_REPLY
    } else {
        TUTOR_REPLY
    };
    Json(serde_json::json!({
        "id": "chatcmpl-stub",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    }))
}

/// Stub short-answers endpoint. Always answers "4".
async fn stub_short_answer(
    Query(params): Query<HashMap<String, String>>,
) -> Result<String, StatusCode> {
    if !params.contains_key("appid") || !params.contains_key("i") {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok("4".to_string())
}

/// Binds a router on an ephemeral port and serves it in the background.
async fn spawn_service(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read listener addr");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            eprintln!("Test server error: {e}");
        }
    });
    format!("http://{addr}")
}

/// Spawns the MathBuddy server wired to fresh stub upstreams and returns
/// its base URL.
async fn spawn_server(config: Config, with_knowledge: bool) -> String {
    let chat_url = spawn_service(Router::new().route("/chat/completions", post(stub_completions)))
        .await;
    let chat = Arc::new(
        HttpChatModel::new(ChatOptions::new("test-key").with_base_url(chat_url))
            .expect("Failed to build chat client"),
    );

    let knowledge: Option<Arc<dyn KnowledgeEngine>> = if with_knowledge {
        let knowledge_url =
            spawn_service(Router::new().route("/v1/result", get(stub_short_answer))).await;
        Some(Arc::new(
            HttpKnowledgeEngine::new(
                KnowledgeOptions::new("stub-app-id").with_base_url(knowledge_url),
            )
            .expect("Failed to build knowledge client"),
        ))
    } else {
        None
    };

    spawn_service(create_router(AppState::new(config, chat, knowledge))).await
}

/// Starts a session and returns its id.
async fn start_session(client: &reqwest::Client, base: &str) -> String {
    let started: serde_json::Value = client
        .post(format!("{base}/start_session"))
        .send()
        .await
        .expect("start_session request")
        .json()
        .await
        .expect("start_session body");
    started["session_id"]
        .as_str()
        .expect("session id")
        .to_string()
}

#[tokio::test]
async fn test_full_tutoring_flow() {
    let base = spawn_server(Config::default(), true).await;
    let client = reqwest::Client::new();

    // Start a session on the default grade ladder.
    let started: serde_json::Value = client
        .post(format!("{base}/start_session"))
        .send()
        .await
        .expect("start_session request")
        .json()
        .await
        .expect("start_session body");
    assert_eq!(started["topic"], "3rd Grade");
    assert_eq!(started["difficulty"], 1);
    let session_id = started["session_id"].as_str().expect("session id");

    // One tutoring exchange.
    let chat: serde_json::Value = client
        .post(format!("{base}/chat"))
        .json(&serde_json::json!({
            "message": "Help me with fractions",
            "session_id": session_id,
        }))
        .send()
        .await
        .expect("chat request")
        .json()
        .await
        .expect("chat body");
    assert_eq!(chat["response"], TUTOR_REPLY);
    assert_eq!(chat["topic"], "3rd Grade");

    // Solve a problem into steps; the stub knowledge engine agrees with
    // the final answer.
    let solved: serde_json::Value = client
        .post(format!("{base}/solve"))
        .json(&serde_json::json!({
            "question": "What is 2 + 2?",
            "session_id": session_id,
        }))
        .send()
        .await
        .expect("solve request")
        .json()
        .await
        .expect("solve body");
    assert_eq!(solved["problem_type"], "Arithmetic");
    assert_eq!(solved["steps"].as_array().expect("steps").len(), 2);
    assert_eq!(solved["final_answer"], "4");
    assert_eq!(solved["summary"], "Simple addition.");
    assert_eq!(solved["verified"], true);

    // Walk the stored steps to the completion sentinel.
    let mut steps = Vec::new();
    for _ in 0..3 {
        let advanced: serde_json::Value = client
            .post(format!("{base}/next_step"))
            .json(&serde_json::json!({"session_id": session_id}))
            .send()
            .await
            .expect("next_step request")
            .json()
            .await
            .expect("next_step body");
        steps.push((
            advanced["step"].as_str().expect("step").to_string(),
            advanced["is_final"].as_bool().expect("is_final"),
        ));
    }
    assert_eq!(steps[0], ("Add the numbers.".to_string(), false));
    assert_eq!(steps[1], ("Check the sum.".to_string(), true));
    assert_eq!(steps[2], (ALL_STEPS_COMPLETE.to_string(), true));

    // A graded correct answer bumps difficulty.
    let checked: serde_json::Value = client
        .post(format!("{base}/check_answer"))
        .json(&serde_json::json!({
            "question": "What is 2 + 2?",
            "answer": "4.0",
            "session_id": session_id,
        }))
        .send()
        .await
        .expect("check_answer request")
        .json()
        .await
        .expect("check_answer body");
    assert_eq!(checked["correct"], true);
    assert_eq!(checked["expected"], "4");
    assert_eq!(checked["difficulty"], 2);

    // Progress snapshot reflects everything above.
    let progress: serde_json::Value = client
        .get(format!("{base}/progress/{session_id}"))
        .send()
        .await
        .expect("progress request")
        .json()
        .await
        .expect("progress body");
    assert_eq!(progress["topic"], "3rd Grade");
    assert_eq!(progress["difficulty"], 2);
    // Persona note plus one user/assistant exchange.
    assert_eq!(progress["message_count"], 3);
    assert_eq!(progress["steps_remaining"], 0);

    let created_at = chrono::DateTime::parse_from_rfc3339(
        progress["created_at"].as_str().expect("created_at"),
    )
    .expect("created_at parses");
    let updated_at = chrono::DateTime::parse_from_rfc3339(
        progress["updated_at"].as_str().expect("updated_at"),
    )
    .expect("updated_at parses");
    assert!(created_at <= updated_at);

    // Health sees the one session.
    let health: serde_json::Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .expect("health request")
        .json()
        .await
        .expect("health body");
    assert_eq!(health["status"], "ok");
    assert_eq!(health["sessions"], 1);
}

#[tokio::test]
async fn test_seven_correct_answers_promote_over_http() {
    let base = spawn_server(Config::default(), true).await;
    let client = reqwest::Client::new();
    let session_id = start_session(&client, &base).await;

    for round in 1..=7i64 {
        let checked: serde_json::Value = client
            .post(format!("{base}/check_answer"))
            .json(&serde_json::json!({
                "question": "What is 2 + 2?",
                "answer": "4",
                "session_id": session_id,
            }))
            .send()
            .await
            .expect("check_answer request")
            .json()
            .await
            .expect("check_answer body");

        assert_eq!(checked["correct"], true);
        if round < 7 {
            assert_eq!(checked["topic"], "3rd Grade", "round {round}");
            assert_eq!(checked["difficulty"], round + 1, "round {round}");
        } else {
            // The seventh correct answer reaches the threshold of 8 and
            // promotes to the next grade at difficulty 1.
            assert_eq!(checked["topic"], "4th Grade");
            assert_eq!(checked["difficulty"], 1);
        }
    }
}

#[tokio::test]
async fn test_chat_request_wire_format() {
    // Record every completion request the server sends upstream.
    let log: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&log);
    let chat_url = spawn_service(Router::new().route(
        "/chat/completions",
        post(
            move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let recorder = Arc::clone(&recorder);
                async move {
                    let authorization = headers
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    recorder.lock().await.push(serde_json::json!({
                        "authorization": authorization,
                        "request": body,
                    }));
                    Json(serde_json::json!({
                        "choices": [{
                            "message": {"role": "assistant", "content": TUTOR_REPLY}
                        }]
                    }))
                }
            },
        ),
    ))
    .await;

    let chat = Arc::new(
        HttpChatModel::new(ChatOptions::new("test-key").with_base_url(chat_url))
            .expect("Failed to build chat client"),
    );
    let base = spawn_service(create_router(AppState::new(Config::default(), chat, None))).await;
    let client = reqwest::Client::new();
    let session_id = start_session(&client, &base).await;

    let response = client
        .post(format!("{base}/chat"))
        .json(&serde_json::json!({
            "message": "What is a numerator?",
            "session_id": session_id,
        }))
        .send()
        .await
        .expect("chat request");
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let recorded = log.lock().await;
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0]["authorization"], "Bearer test-key");
    assert_eq!(recorded[0]["request"]["model"], "gpt-3.5-turbo");

    // The transcript starts with the seeded tutor persona and ends with
    // the student's new message.
    let messages = recorded[0]["request"]["messages"]
        .as_array()
        .expect("messages");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    let persona = messages[0]["content"].as_str().expect("persona");
    assert!(persona.contains("MathBuddy"));
    assert!(persona.contains("3rd Grade"));
    assert_eq!(messages[1]["role"], "user");
    assert_eq!(messages[1]["content"], "What is a numerator?");
}

#[tokio::test]
async fn test_api_key_guards_endpoints_but_not_health() {
    let config = Config {
        api_key: Some("integration-secret".to_string()),
        ..Default::default()
    };
    let base = spawn_server(config, false).await;
    let client = reqwest::Client::new();

    let denied = client
        .post(format!("{base}/start_session"))
        .send()
        .await
        .expect("unauthenticated request");
    assert_eq!(denied.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = denied.json().await.expect("error body");
    assert!(body["error"].as_str().expect("error").contains("API key"));

    let wrong = client
        .post(format!("{base}/start_session"))
        .header("X-API-Key", "not-the-secret")
        .send()
        .await
        .expect("wrong-key request");
    assert_eq!(wrong.status(), reqwest::StatusCode::UNAUTHORIZED);

    let allowed = client
        .post(format!("{base}/start_session"))
        .header("X-API-Key", "integration-secret")
        .send()
        .await
        .expect("authenticated request");
    assert_eq!(allowed.status(), reqwest::StatusCode::OK);

    let health = client
        .get(format!("{base}/health"))
        .send()
        .await
        .expect("health request");
    assert_eq!(health.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_quota_is_per_caller() {
    let config = Config {
        rate_limit: Some(RateLimitConfig {
            max_requests: 3,
            window_seconds: 60,
        }),
        ..Default::default()
    };
    let base = spawn_server(config, false).await;
    let client = reqwest::Client::new();

    for round in 0..3 {
        let response = client
            .post(format!("{base}/start_session"))
            .send()
            .await
            .expect("request within quota");
        assert_eq!(response.status(), reqwest::StatusCode::OK, "round {round}");
    }

    let limited = client
        .post(format!("{base}/start_session"))
        .send()
        .await
        .expect("request over quota");
    assert_eq!(limited.status(), reqwest::StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key("retry-after"));

    // A caller presenting a different key gets its own window.
    let other = client
        .post(format!("{base}/start_session"))
        .header("X-API-Key", "someone-else")
        .send()
        .await
        .expect("request from other caller");
    assert_eq!(other.status(), reqwest::StatusCode::OK);

    // Health is exempt from throttling.
    let health = client
        .get(format!("{base}/health"))
        .send()
        .await
        .expect("health request");
    assert_eq!(health.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn test_error_statuses() {
    let base = spawn_server(Config::default(), false).await;
    let client = reqwest::Client::new();

    // Unknown session id.
    let not_found = client
        .post(format!("{base}/chat"))
        .json(&serde_json::json!({
            "message": "hi",
            "session_id": "00000000-0000-4000-8000-000000000000",
        }))
        .send()
        .await
        .expect("chat request");
    assert_eq!(not_found.status(), reqwest::StatusCode::NOT_FOUND);
    let body: serde_json::Value = not_found.json().await.expect("error body");
    assert!(body["error"]
        .as_str()
        .expect("error")
        .contains("Unknown session"));

    // Empty message.
    let session_id = start_session(&client, &base).await;
    let bad_request = client
        .post(format!("{base}/chat"))
        .json(&serde_json::json!({"message": "  ", "session_id": session_id}))
        .send()
        .await
        .expect("chat request");
    assert_eq!(bad_request.status(), reqwest::StatusCode::BAD_REQUEST);

    // Answer checking without a knowledge engine.
    let unavailable = client
        .post(format!("{base}/check_answer"))
        .json(&serde_json::json!({"question": "2+2", "answer": "4"}))
        .send()
        .await
        .expect("check_answer request");
    assert_eq!(
        unavailable.status(),
        reqwest::StatusCode::SERVICE_UNAVAILABLE
    );

    // Unknown route.
    let missing = client
        .get(format!("{base}/nope"))
        .send()
        .await
        .expect("request");
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sessions_stay_isolated() {
    let base = spawn_server(Config::default(), true).await;
    let client = reqwest::Client::new();

    // Create several sessions in parallel.
    let mut starts = Vec::new();
    for _ in 0..5 {
        let client = client.clone();
        let base = base.clone();
        starts.push(async move { start_session(&client, &base).await });
    }
    let ids = futures::future::join_all(starts).await;
    let distinct: std::collections::HashSet<_> = ids.iter().collect();
    assert_eq!(distinct.len(), 5, "session ids must be unique");

    // Grade a different number of correct answers into each session, in
    // parallel across sessions.
    let mut walks = Vec::new();
    for (index, session_id) in ids.iter().enumerate() {
        let client = client.clone();
        let base = base.clone();
        let session_id = session_id.clone();
        walks.push(async move {
            for _ in 0..=index {
                let response = client
                    .post(format!("{base}/check_answer"))
                    .json(&serde_json::json!({
                        "question": "What is 2 + 2?",
                        "answer": "4",
                        "session_id": session_id,
                    }))
                    .send()
                    .await
                    .expect("check_answer request");
                assert_eq!(response.status(), reqwest::StatusCode::OK);
            }
        });
    }
    futures::future::join_all(walks).await;

    // Each session advanced independently: 1..=5 correct answers from
    // difficulty 1 land on 2..=6.
    for (index, session_id) in ids.iter().enumerate() {
        let progress: serde_json::Value = client
            .get(format!("{base}/progress/{session_id}"))
            .send()
            .await
            .expect("progress request")
            .json()
            .await
            .expect("progress body");
        assert_eq!(progress["difficulty"], index as i64 + 2);
        assert_eq!(progress["topic"], "3rd Grade");
    }

    let health: serde_json::Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .expect("health request")
        .json()
        .await
        .expect("health body");
    assert_eq!(health["sessions"], 5);
}
