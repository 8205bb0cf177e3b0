//! Turn submission, conversation view, reply audio, session reset

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State, rejection::BytesRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::ApiState;
use crate::Error;
use crate::conversation::Turn;
use crate::pipeline::PipelineState;
use crate::session::Session;
use crate::voice::{AudioClip, AudioFormat, SynthesizedAudio};

/// Largest accepted recording, matching the Whisper upload limit
pub const MAX_RECORDING_BYTES: usize = 25 * 1024 * 1024;

/// Build turn router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route(
            "/turn",
            post(submit_turn).layer(DefaultBodyLimit::max(MAX_RECORDING_BYTES)),
        )
        .route("/state", get(pipeline_state))
        .route("/conversation", get(conversation))
        .route("/audio", get(reply_audio))
        .route("/session/reset", post(reset_session))
        .with_state(state)
}

/// Error body shared by every JSON response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl From<&Error> for ErrorBody {
    fn from(error: &Error) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// Result of one submitted recording
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    /// `silent`, `spoken` or `text_only`
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    /// Non-fatal problem (speech synthesis failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<ErrorBody>,
    pub generation: u64,
    pub audio_pending: bool,
}

/// Submit a recording and run one turn
///
/// The body is the raw recording; `Content-Type` names its container
/// format and defaults to `audio/webm`, which is what browsers record.
async fn submit_turn(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<TurnResponse>, ApiError> {
    let body = body.map_err(|rejection| {
        tracing::warn!(error = %rejection, "recording rejected");
        ApiError::Rejected(rejection)
    })?;
    if body.is_empty() {
        return Err(ApiError::BadRequest("empty recording"));
    }

    let format = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(AudioFormat::from_mime)
        .unwrap_or(AudioFormat::Webm);

    let Ok(mut session) = state.session.try_lock() else {
        tracing::warn!("turn submitted while another is in flight");
        return Err(ApiError::Busy);
    };

    let outcome = state
        .pipeline
        .run(&mut session, AudioClip::new(body.to_vec(), format))
        .await
        .map_err(ApiError::Failed)?;

    Ok(Json(TurnResponse {
        kind: outcome.kind(),
        transcript: outcome.transcript().map(str::to_string),
        reply: outcome.reply().map(str::to_string),
        notice: outcome.notice().map(ErrorBody::from),
        generation: session.generation(),
        audio_pending: session.has_pending_audio(),
    }))
}

/// Conversation log as seen by the user
#[derive(Debug, Serialize)]
pub struct ConversationView {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub generation: u64,
    pub audio_pending: bool,
    /// Non-system turns in order
    pub turns: Vec<Turn>,
    /// Index into `turns` of the turn to emphasize
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_assistant: Option<usize>,
}

impl ConversationView {
    #[must_use]
    pub fn of(session: &Session) -> Self {
        let log = session.log();
        Self {
            session_id: session.id(),
            started_at: session.started_at(),
            generation: session.generation(),
            audio_pending: session.has_pending_audio(),
            turns: log.history().to_vec(),
            latest_assistant: log.last_assistant_index().and_then(|i| i.checked_sub(1)),
        }
    }
}

async fn conversation(State(state): State<Arc<ApiState>>) -> Json<ConversationView> {
    let session = state.session.lock().await;
    Json(ConversationView::of(&session))
}

/// Reply audio, served once
async fn reply_audio(State(state): State<Arc<ApiState>>) -> Response {
    let audio = state.session.lock().await.take_audio();
    match audio {
        Some(audio) => {
            tracing::debug!(bytes = audio.bytes.len(), "serving reply audio");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, SynthesizedAudio::MIME)],
                audio.bytes,
            )
                .into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Current pipeline stage
#[derive(Debug, Serialize)]
pub struct StateView {
    pub state: PipelineState,
    pub label: &'static str,
}

/// Stage of the running turn; never waits on the session
async fn pipeline_state(State(state): State<Arc<ApiState>>) -> Json<StateView> {
    let current = state.pipeline.state();
    Json(StateView {
        state: current,
        label: current.label(),
    })
}

/// Reset response
#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub session_id: Uuid,
}

/// End the session and start a new one from freshly loaded documents
async fn reset_session(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ResetResponse>, ApiError> {
    let Ok(mut session) = state.session.try_lock() else {
        return Err(ApiError::Busy);
    };

    let documents = state.store.load().map_err(ApiError::Failed)?;
    let previous = session.id();
    *session = Session::for_persona(&documents);
    state.set_documents(documents);

    tracing::info!(previous = %previous, session_id = %session.id(), "session reset");
    Ok(Json(ResetResponse {
        session_id: session.id(),
    }))
}

/// API errors
#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    Busy,
    /// Body could not be read, usually because it exceeds the size limit
    Rejected(BytesRejection),
    Failed(Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        let (status, body) = match self {
            Self::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "bad_request",
                    message: msg.to_string(),
                },
            ),
            Self::Busy => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "busy",
                    message: "a turn is already in progress".to_string(),
                },
            ),
            Self::Rejected(rejection) => (
                rejection.status(),
                ErrorBody {
                    code: if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                        "payload_too_large"
                    } else {
                        "bad_request"
                    },
                    message: rejection.body_text(),
                },
            ),
            Self::Failed(error) => {
                let status = if error.is_recoverable() {
                    StatusCode::BAD_GATEWAY
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, ErrorBody::from(&error))
            }
        };

        (status, Json(ErrorResponse { error: body })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_hides_system_turn_and_points_at_latest_reply() {
        let mut session = Session::new("sys");
        session.log_mut().push_user("hi");
        session.log_mut().push_assistant("hello");
        session.log_mut().push_user("again");

        let view = ConversationView::of(&session);
        assert_eq!(view.turns.len(), 3);
        assert_eq!(view.latest_assistant, Some(1));
        assert!(!view.audio_pending);
    }

    #[test]
    fn fresh_view_has_nothing_to_emphasize() {
        let view = ConversationView::of(&Session::new("sys"));
        assert!(view.turns.is_empty());
        assert_eq!(view.latest_assistant, None);
    }

    #[test]
    fn error_body_uses_error_code() {
        let body = ErrorBody::from(&Error::Completion("timeout".to_string()));
        assert_eq!(body.code, "completion_failed");
        assert!(body.message.contains("timeout"));
    }

    #[test]
    fn state_view_serializes_stage_and_label() {
        let view = StateView {
            state: PipelineState::AwaitingCompletion,
            label: PipelineState::AwaitingCompletion.label(),
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["state"], "awaiting_completion");
        assert_eq!(json["label"], "Thinking...");
    }
}
