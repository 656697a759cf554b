use super::AppState;
use super::twiml;
use crate::agent::{AgentStatus, Reply};
use axum::Json;
use axum::extract::{Form, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub phone_number: String,
    pub message: String,
}

/// Inbound SMS webhook fields; Twilio sends many more, only these are read.
#[derive(Debug, Deserialize)]
pub struct SmsWebhook {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub agent: AgentStatus,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        };
        let body = ErrorBody {
            error,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub async fn messages(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<Reply>, ApiError> {
    if request.phone_number.trim().is_empty() {
        return Err(ApiError::BadRequest("phone_number is required".into()));
    }
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message is required".into()));
    }
    let reply = state
        .agent
        .process_message(&request.message, &request.phone_number)
        .await;
    Ok(Json(reply))
}

pub async fn sms(State(state): State<AppState>, Form(webhook): Form<SmsWebhook>) -> Response {
    let reply = if webhook.body.trim().is_empty() {
        String::new()
    } else {
        state
            .agent
            .process_message(&webhook.body, &webhook.from)
            .await
            .reply
    };
    (
        [(header::CONTENT_TYPE, "application/xml")],
        twiml::render(&reply),
    )
        .into_response()
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        agent: state.agent.status().await,
    })
}
