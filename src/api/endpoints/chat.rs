//! Chat endpoints.
//!
//! `GET /app/chat` — transcript, with prompt suggestions while empty
//! `POST /app/chat` — send a message, returns the assistant reply

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ChatRequest, ChatResponse};
use crate::chat::{self, ChatView};

/// `GET /app/chat`
pub async fn transcript(State(ctx): State<ApiContext>) -> Result<Json<ChatView>, ApiError> {
    ctx.state.require_uid()?;
    Ok(Json(chat::chat_view(&ctx)?))
}

/// `POST /app/chat`
pub async fn send(
    State(ctx): State<ApiContext>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let reply = chat::send_message(&ctx, &req.message).await?;
    Ok(Json(ChatResponse { reply }))
}
