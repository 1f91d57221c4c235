use std::sync::Arc;

use {
    axum::{
        Json,
        extract::{State, rejection::JsonRejection},
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    serde_json::{Value, json},
    tracing::{error, info, warn},
};

use crate::state::AppState;

/// Longest accepted message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid JSON body")]
    InvalidJson,
    #[error("Message is required")]
    MissingMessage,
    #[error("Message too long (max 1000 chars)")]
    TooLong,
}

/// Extract and check the `message` field of a submission body.
pub fn validate_message(body: &Value) -> Result<&str, ValidationError> {
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .ok_or(ValidationError::MissingMessage)?;
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ValidationError::TooLong);
    }
    Ok(message)
}

/// Text relayed to the group for a submission.
pub fn relay_text(message: &str) -> String {
    format!("🙏 *New Anonymous Request:* {message}")
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(e) => {
            warn!(error = %e, "rejecting submission body");
            return error_response(StatusCode::BAD_REQUEST, &ValidationError::InvalidJson);
        },
    };
    let message = match validate_message(&body) {
        Ok(message) => message,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    let stored = match state.store.insert(message).await {
        Ok(stored) => stored,
        Err(e) => {
            error!(error = ?e, "submission error");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal Server Error" })),
            )
                .into_response();
        },
    };
    info!(id = stored.id, "prayer request stored");

    match state.target.as_deref() {
        Some(target) => {
            if !state.outbound.send_message(target, &relay_text(message)).await {
                warn!(id = stored.id, "message saved but failed to send to WhatsApp");
            }
        },
        None => warn!("WHATSAPP_GROUP_ID not set, skipping WhatsApp message"),
    }

    Json(json!({ "success": true })).into_response()
}

fn error_response(status: StatusCode, err: &ValidationError) -> Response {
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
