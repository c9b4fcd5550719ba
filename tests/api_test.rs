use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value as JsonValue};
use tokio_test::assert_ok;
use tower::ServiceExt;
use uuid::Uuid;

use vocab_quiz_backend::{
    build_app,
    config::Config,
    database::{pool::connect, schema::initialize_database},
    error::Result,
    models::question::{FillInDetails, MultipleChoiceDetails, QuestionDetails, QuizQuestion},
    models::section::SectionKind,
    services::llm_service::ChatCompletion,
    services::quiz_generator::{GeneratedSection, SectionContext, SectionGenerator},
    AppState,
};

struct EchoGenerator;

#[async_trait]
impl SectionGenerator for EchoGenerator {
    async fn generate(
        &self,
        section: SectionKind,
        words: &[String],
        _context: &SectionContext,
    ) -> Result<GeneratedSection> {
        let questions = words
            .iter()
            .enumerate()
            .map(|(i, word)| QuizQuestion {
                id: i as i32 + 1,
                word: word.clone(),
                prompt: format!("Which word fits: {}?", word),
                details: if section.is_multiple_choice() {
                    QuestionDetails::MultipleChoice(MultipleChoiceDetails {
                        choices: vec![
                            "alpha".into(),
                            word.clone(),
                            "gamma".into(),
                            "delta".into(),
                        ],
                        correct_index: 1,
                    })
                } else {
                    QuestionDetails::FillIn(FillInDetails {
                        answer: word.clone(),
                        hint: None,
                    })
                },
                explanation: None,
            })
            .collect();
        Ok(GeneratedSection {
            questions,
            model: Some("echo".into()),
        })
    }
}

/// Answers every vision request with a fixed word list.
struct FixedVision;

#[async_trait]
impl ChatCompletion for FixedVision {
    async fn complete_json(
        &self,
        _model: &str,
        _messages: Vec<JsonValue>,
        _temperature: Option<f32>,
    ) -> Result<JsonValue> {
        Ok(json!({ "words": ["Ephemeral", "ubiquitous,", "ephemeral", "  "] }))
    }
}

fn test_config(public_rps: u32) -> Config {
    Config {
        server_address: "127.0.0.1:0".into(),
        database_url: "sqlite::memory:".into(),
        openai_api_key: "sk-test".into(),
        openai_base_url: "http://localhost".into(),
        generation_models: vec!["echo".into()],
        vision_models: vec!["echo-vision".into()],
        session_ttl: Duration::from_secs(60),
        public_rps,
        max_upload_bytes: 1024,
        max_words: 60,
    }
}

async fn test_app(public_rps: u32) -> Router {
    let config = test_config(public_rps);
    let pool = assert_ok!(connect(&config.database_url).await);
    assert_ok!(initialize_database(&pool).await);

    let state = AppState::from_parts(pool, Arc::new(FixedVision), Arc::new(EchoGenerator), &config);
    build_app(state, config.public_rps)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, JsonValue) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(JsonValue::Null)
    };
    (status, headers, json)
}

fn json_request(method: &str, uri: &str, body: JsonValue) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn multipart_request(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let boundary = "quiz-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/words/extract")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn wait_until_settled(app: &Router, id: &str) -> JsonValue {
    for _ in 0..200 {
        let (status, _, session) =
            send(app, empty_request("GET", &format!("/api/generation-sessions/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        let settled = session["sections"]
            .as_object()
            .unwrap()
            .values()
            .all(|s| s["status"] == "ready" || s["status"] == "error");
        if settled {
            return session;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("generation session {} did not settle", id);
}

#[tokio::test]
async fn health_reports_active_sessions() {
    let app = test_app(10_000).await;
    let (status, _, body) = send(&app, empty_request("GET", "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_generation_sessions"], 0);
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn health_degrades_when_the_database_is_gone() {
    let config = test_config(10_000);
    let pool = assert_ok!(connect(&config.database_url).await);
    let state = AppState::from_parts(pool.clone(), Arc::new(FixedVision), Arc::new(EchoGenerator), &config);
    let app = build_app(state, config.public_rps);
    pool.close().await;

    let (status, _, body) = send(&app, empty_request("GET", "/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["database"], "unavailable");
}

#[tokio::test]
async fn generation_session_flow() {
    let app = test_app(10_000).await;

    let (status, _, created) = send(
        &app,
        json_request(
            "POST",
            "/api/generation-sessions",
            json!({ "words": ["candid", " Candid ", "wary", "zeal"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["words"], json!(["candid", "wary", "zeal"]));
    let id = created["id"].as_str().unwrap().to_string();

    let session = wait_until_settled(&app, &id).await;
    let sections = session["sections"].as_object().unwrap();
    assert_eq!(sections.len(), 3);
    for word in ["candid", "wary", "zeal"] {
        let hits = sections
            .values()
            .filter(|s| s["words"].as_array().unwrap().iter().any(|w| w == word))
            .count();
        assert_eq!(hits, 2, "{} should appear in exactly two sections", word);
    }
    for state in sections.values() {
        assert_eq!(state["status"], "ready");
        assert_eq!(
            state["questions"].as_array().unwrap().len(),
            state["words"].as_array().unwrap().len()
        );
    }

    let (status, _, section) = send(
        &app,
        empty_request("GET", &format!("/api/generation-sessions/{}/sections/3", id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(section["section"], "questions_type_3");

    let (status, _, retried) = send(
        &app,
        empty_request("POST", &format!("/api/generation-sessions/{}/sections/1/retry", id)),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(retried["status"], "generating");
    assert_eq!(retried["attempts"], 2);

    let (status, _, _) = send(
        &app,
        empty_request("GET", &format!("/api/generation-sessions/{}/sections/4", id)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = send(
        &app,
        empty_request("GET", &format!("/api/generation-sessions/{}", Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn generation_session_rejects_empty_word_lists() {
    let app = test_app(10_000).await;

    let (status, _, _) = send(
        &app,
        json_request("POST", "/api/generation-sessions", json!({ "words": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(
        &app,
        json_request("POST", "/api/generation-sessions", json!({ "words": ["  ", ""] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let too_many: Vec<String> = (0..61).map(|i| format!("word{}", i)).collect();
    let (status, _, body) = send(
        &app,
        json_request("POST", "/api/generation-sessions", json!({ "words": too_many })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("60"));
}

#[tokio::test]
async fn quiz_submission_is_graded_and_kept_in_history() {
    let app = test_app(10_000).await;

    let (_, _, created) = send(
        &app,
        json_request("POST", "/api/generation-sessions", json!({ "words": ["lucid", "terse"] })),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();
    let session = wait_until_settled(&app, &id).await;

    let mut answers = Vec::new();
    for state in session["sections"].as_object().unwrap().values() {
        for q in state["questions"].as_array().unwrap() {
            let answer = if q["type"] == "multiple_choice" {
                q["correct_index"].clone()
            } else {
                json!(q["answer"].as_str().unwrap().to_uppercase())
            };
            answers.push(json!({
                "section": state["section"],
                "question_id": q["id"],
                "answer": answer,
            }));
        }
    }

    let (status, _, record) = send(
        &app,
        json_request(
            "POST",
            "/api/quiz-sessions",
            json!({ "generation_session_id": id, "answers": answers, "duration_seconds": 95 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["max_score"], 4);
    assert_eq!(record["score"], 4);
    assert_eq!(record["percentage"], 100.0);
    assert_eq!(record["duration_seconds"], 95);
    let record_id = record["id"].as_str().unwrap().to_string();

    let (status, _, page) = send(&app, empty_request("GET", "/api/quiz-sessions?page=0&per_page=500")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["page"], 1);
    assert_eq!(page["per_page"], 100);
    assert_eq!(page["items"][0]["id"], record_id.as_str());

    let (status, _, fetched) =
        send(&app, empty_request("GET", &format!("/api/quiz-sessions/{}", record_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["graded_answers"].as_array().unwrap().len(), 4);

    let (status, _, _) =
        send(&app, empty_request("DELETE", &format!("/api/quiz-sessions/{}", record_id))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, _) =
        send(&app, empty_request("DELETE", &format!("/api/quiz-sessions/{}", record_id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn quiz_submission_for_unknown_session_is_not_found() {
    let app = test_app(10_000).await;
    let (status, _, _) = send(
        &app,
        json_request(
            "POST",
            "/api/quiz-sessions",
            json!({ "generation_session_id": Uuid::new_v4(), "answers": [] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn word_extraction_from_image_upload() {
    let app = test_app(10_000).await;

    let (status, _, body) = send(&app, multipart_request("image", "list.png", "image/png", b"\x89PNG fake")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["words"], json!(["Ephemeral", "ubiquitous"]));
    assert_eq!(body["model"], "echo-vision");

    let (status, _, _) = send(&app, multipart_request("image", "list.pdf", "application/pdf", b"%PDF")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(&app, multipart_request("photo", "list.png", "image/png", b"data")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(&app, multipart_request("image", "big.png", "image/png", &[0u8; 2048])).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn api_requests_beyond_the_limit_are_rejected() {
    let app = test_app(1).await;

    let (status, _, _) = send(&app, empty_request("GET", "/api/quiz-sessions")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, headers, body) = send(&app, empty_request("GET", "/api/quiz-sessions")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(headers.contains_key(header::RETRY_AFTER));
    assert!(body["error"].is_string());
}
