use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use devpilot::models::message::Message;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize, Serialize)]
struct ChatRequest {
    message: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct ChatResponse {
    reply: String,
    transcript: Vec<Message>,
}

async fn transcript(State(state): State<AppState>) -> Json<Vec<Message>> {
    let chat = state.chat.lock().await;
    Json(chat.transcript().to_vec())
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> impl IntoResponse {
    let message = request.message.trim();
    if message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "message must not be empty" })),
        )
            .into_response();
    }

    // Turns are answered one at a time, in arrival order
    let mut chat = state.chat.lock().await;
    let reply = chat.submit(message).await.content.clone();
    let response = ChatResponse {
        reply,
        transcript: chat.transcript().to_vec(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

async fn reset(State(state): State<AppState>) -> StatusCode {
    state.chat.lock().await.clear();
    StatusCode::NO_CONTENT
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/transcript", get(transcript))
        .route("/api/chat", post(chat))
        .route("/api/reset", post(reset))
        .with_state(state)
}
