//! API endpoint integration tests

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use persona_voice::api::{self, ApiState, MAX_RECORDING_BYTES};
use persona_voice::{ChatModel, Synthesizer, Transcriber};
use tower::ServiceExt;

mod common;
use common::{
    FakeChatModel, FakeSynthesizer, FakeTranscriber, PersonaFixture, dan_fixture, pipeline,
};

/// Build API state for Dan over the given providers
fn build_state(
    fixture: &PersonaFixture,
    transcriber: Arc<dyn Transcriber>,
    model: Arc<dyn ChatModel>,
    synthesizer: Arc<dyn Synthesizer>,
) -> Arc<ApiState> {
    let pipeline = pipeline(transcriber, model, synthesizer);
    Arc::new(ApiState::new(Arc::new(pipeline), fixture.store.clone()).unwrap())
}

fn happy_state(fixture: &PersonaFixture) -> Arc<ApiState> {
    build_state(
        fixture,
        FakeTranscriber::saying("Hi"),
        FakeChatModel::replying("Hello, I'm Dan"),
        FakeSynthesizer::producing(b"mp3-bytes"),
    )
}

fn post_turn() -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/turn")
        .header(header::CONTENT_TYPE, "audio/webm;codecs=opus")
        .body(Body::from(vec![0x1a, 0x45, 0xdf, 0xa3]))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = dan_fixture();
    let app = api::router(happy_state(&fixture));

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_turn_returns_transcript_and_reply() {
    let fixture = dan_fixture();
    let state = happy_state(&fixture);

    let response = api::router(state.clone()).oneshot(post_turn()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "spoken");
    assert_eq!(json["transcript"], "Hi");
    assert_eq!(json["reply"], "Hello, I'm Dan");
    assert_eq!(json["generation"], 1);
    assert_eq!(json["audio_pending"], true);
    assert!(json.get("notice").is_none());

    assert_eq!(state.session.lock().await.log().len(), 3);
}

#[tokio::test]
async fn test_audio_is_served_once() {
    let fixture = dan_fixture();
    let state = happy_state(&fixture);
    api::router(state.clone()).oneshot(post_turn()).await.unwrap();

    let first = api::router(state.clone()).oneshot(get("/api/audio")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers()[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(body_bytes(first).await, b"mp3-bytes");

    let second = api::router(state).oneshot(get("/api/audio")).await.unwrap();
    assert_eq!(second.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_overlapping_turn_is_rejected() {
    let fixture = dan_fixture();
    let state = happy_state(&fixture);

    // Simulate a run in flight
    let guard = state.session.lock().await;
    let response = api::router(state.clone()).oneshot(post_turn()).await.unwrap();
    drop(guard);

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "busy");
    assert_eq!(state.session.lock().await.log().len(), 1);
}

#[tokio::test]
async fn test_empty_recording_is_bad_request() {
    let fixture = dan_fixture();
    let state = happy_state(&fixture);

    let request = Request::builder()
        .method("POST")
        .uri("/api/turn")
        .body(Body::empty())
        .unwrap();
    let response = api::router(state.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.session.lock().await.generation(), 0);
}

#[tokio::test]
async fn test_transcription_failure_is_a_notice() {
    let fixture = dan_fixture();
    let state = build_state(
        &fixture,
        FakeTranscriber::failing(),
        FakeChatModel::replying("unused"),
        FakeSynthesizer::producing(b"x"),
    );

    let response = api::router(state.clone()).oneshot(post_turn()).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "transcription_failed");
    assert_eq!(state.session.lock().await.log().len(), 1);
}

#[tokio::test]
async fn test_synthesis_failure_returns_text_with_notice() {
    let fixture = dan_fixture();
    let state = build_state(
        &fixture,
        FakeTranscriber::saying("Hi"),
        FakeChatModel::replying("Hello"),
        FakeSynthesizer::failing(),
    );

    let response = api::router(state.clone()).oneshot(post_turn()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "text_only");
    assert_eq!(json["reply"], "Hello");
    assert_eq!(json["notice"]["code"], "synthesis_failed");
    assert_eq!(json["audio_pending"], false);
}

#[tokio::test]
async fn test_conversation_view_skips_system_turn() {
    let fixture = dan_fixture();
    let state = happy_state(&fixture);
    api::router(state.clone()).oneshot(post_turn()).await.unwrap();

    let response = api::router(state).oneshot(get("/api/conversation")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let turns = json["turns"].as_array().unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0]["role"], "user");
    assert_eq!(turns[1]["role"], "assistant");
    assert_eq!(json["latest_assistant"], 1);
}

#[tokio::test]
async fn test_page_renders_conversation() {
    let fixture = dan_fixture();
    let state = happy_state(&fixture);
    api::router(state.clone()).oneshot(post_turn()).await.unwrap();

    let response = api::router(state).oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("<title>Talk to Dan</title>"));
    assert!(html.contains("Hello, I&#39;m Dan"));
    assert!(html.contains("turn assistant latest"));
    assert!(html.contains(r#"src="/api/audio" autoplay"#));
    assert!(!html.contains("Grounded Facts"));
}

#[tokio::test]
async fn test_reset_starts_fresh_session_with_reloaded_persona() {
    let fixture = dan_fixture();
    let state = happy_state(&fixture);
    api::router(state.clone()).oneshot(post_turn()).await.unwrap();
    let old_id = state.session.lock().await.id();

    fixture.write_persona(r#"{"name": "Priya Patel"}"#);

    let request = Request::builder()
        .method("POST")
        .uri("/api/session/reset")
        .body(Body::empty())
        .unwrap();
    let response = api::router(state.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    {
        let session = state.session.lock().await;
        assert_ne!(session.id(), old_id);
        assert_eq!(session.log().len(), 1);
        assert!(session.log().system_prompt().starts_with("You are Priya Patel."));
        assert!(!session.has_pending_audio());
    }

    let html = body_text(api::router(state).oneshot(get("/")).await.unwrap()).await;
    assert!(html.contains("<title>Talk to Priya</title>"));
}

#[tokio::test]
async fn test_reset_with_broken_persona_keeps_session() {
    let fixture = dan_fixture();
    let state = happy_state(&fixture);
    let old_id = state.session.lock().await.id();

    fixture.write_persona("{ not json");

    let request = Request::builder()
        .method("POST")
        .uri("/api/session/reset")
        .body(Body::empty())
        .unwrap();
    let response = api::router(state.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "data_load_failed");
    assert_eq!(state.session.lock().await.id(), old_id);
}

#[tokio::test]
async fn test_state_is_readable_while_turn_holds_session() {
    let fixture = dan_fixture();
    let state = happy_state(&fixture);

    let guard = state.session.lock().await;
    let response = api::router(state.clone()).oneshot(get("/api/state")).await.unwrap();
    drop(guard);

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["state"], "idle");
    assert_eq!(json["label"], "Ready");
}

#[tokio::test]
async fn test_long_wav_recording_is_accepted() {
    let fixture = dan_fixture();
    let state = happy_state(&fixture);

    // 30 s of 48 kHz 16-bit mono
    let request = Request::builder()
        .method("POST")
        .uri("/api/turn")
        .header(header::CONTENT_TYPE, "audio/wav")
        .body(Body::from(vec![0u8; 2_880_044]))
        .unwrap();
    let response = api::router(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "spoken");
}

#[tokio::test]
async fn test_oversized_recording_gets_json_error() {
    let fixture = dan_fixture();
    let state = happy_state(&fixture);

    let request = Request::builder()
        .method("POST")
        .uri("/api/turn")
        .header(header::CONTENT_TYPE, "audio/wav")
        .body(Body::from(vec![0u8; MAX_RECORDING_BYTES + 1]))
        .unwrap();
    let response = api::router(state.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "payload_too_large");
    assert_eq!(state.session.lock().await.generation(), 0);
}
