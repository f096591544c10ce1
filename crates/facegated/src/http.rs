//! HTTP surface of the web verifier.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::service::{FlowError, PageMode, RegisterRequest, VerificationService, VerifyOutcome, VerifyRequest};

const REGISTER_TEMPLATE: &str = include_str!("../templates/register.html");
const VERIFY_TEMPLATE: &str = include_str!("../templates/verify.html");

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<VerificationService>,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/verify/{token}/{guild_id}", get(verify_page))
        .route("/register", post(register))
        .route("/verify", post(verify))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `{status, message}` body returned by the submission endpoints.
#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub status: &'static str,
    pub message: String,
}

impl StatusBody {
    fn new(status: &'static str, message: impl Into<String>) -> Json<Self> {
        Json(Self { status, message: message.into() })
    }
}

/// Errors from the submission endpoints.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    PayloadTooLarge,
    Flow(FlowError),
}

impl ApiError {
    /// Map a multipart read failure, keeping the body-limit case distinct.
    fn multipart(err: MultipartError, what: &str) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::BadRequest(format!("{what}: {err}"))
        }
    }
}

impl From<FlowError> for ApiError {
    fn from(err: FlowError) -> Self {
        Self::Flow(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, StatusBody::new("fail", message)).into_response()
            }
            Self::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                StatusBody::new("fail", "The uploaded image is too large."),
            )
                .into_response(),
            Self::Flow(err @ (FlowError::Store(_) | FlowError::Engine(_))) => {
                tracing::error!(error = %err, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, StatusBody::new("fail", "Internal server error."))
                    .into_response()
            }
            Self::Flow(err) => {
                tracing::info!(reason = %err, "flow rejected");
                (StatusCode::OK, StatusBody::new("fail", err.to_string())).into_response()
            }
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn verify_page(
    State(state): State<AppState>,
    Path((token, guild_id)): Path<(String, String)>,
) -> Response {
    match state.service.page(&token, &guild_id).await {
        Ok((credential, mode)) => {
            let template = match mode {
                PageMode::Register => REGISTER_TEMPLATE,
                PageMode::Verify => VERIFY_TEMPLATE,
            };
            Html(render(
                template,
                &[
                    ("user_id", credential.user_id.as_str()),
                    ("guild_id", guild_id.as_str()),
                    ("guild_name", credential.guild_name.as_str()),
                    ("token", token.as_str()),
                ],
            ))
            .into_response()
        }
        Err(err @ (FlowError::InvalidCredential | FlowError::BindingMismatch(_))) => {
            tracing::info!(guild_id = %guild_id, reason = %err, "verification page refused");
            (StatusCode::FORBIDDEN, err.to_string()).into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "verification page failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.").into_response()
        }
    }
}

async fn register(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<StatusBody>, ApiError> {
    let mut form = SubmittedForm::read(multipart).await?;
    let req = RegisterRequest {
        user_id: form.field("user_id")?,
        guild_id: form.field("guild_id")?,
        token: form.field("token")?,
        photo: form.photo()?,
    };

    state.service.register(req).await?;
    Ok(StatusBody::new("success", "Face registered successfully."))
}

async fn verify(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<StatusBody>, ApiError> {
    let mut form = SubmittedForm::read(multipart).await?;
    let req = VerifyRequest {
        user_id: form.field("user_id")?,
        guild_id: form.field("guild_id")?,
        guild_name: form.field("guild_name")?,
        token: form.field("token")?,
        photo: form.photo()?,
    };

    match state.service.verify(req).await? {
        VerifyOutcome::Verified => Ok(StatusBody::new("success", "Face verified!")),
        VerifyOutcome::Partial(_) => {
            Ok(StatusBody::new("partial", "Verified, but failed to notify the bot."))
        }
    }
}

/// Text fields plus the uploaded photo of a multipart submission.
struct SubmittedForm {
    fields: HashMap<String, String>,
    photo: Option<Vec<u8>>,
}

impl SubmittedForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut fields = HashMap::new();
        let mut photo = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::multipart(e, "Malformed form"))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::multipart(e, "Could not read upload"))?;
                photo = Some(data.to_vec());
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::multipart(e, &format!("Could not read {name}")))?;
                fields.insert(name, text);
            }
        }

        Ok(Self { fields, photo })
    }

    fn field(&mut self, name: &str) -> Result<String, ApiError> {
        self.fields
            .remove(name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::BadRequest(format!("{name} is required")))
    }

    fn photo(&mut self) -> Result<Vec<u8>, ApiError> {
        self.photo
            .take()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::BadRequest("file is required".to_string()))
    }
}

/// Substitute `{{key}}` placeholders with HTML-escaped values.
fn render(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |html, (key, value)| {
        html.replace(&format!("{{{{{key}}}}}"), &escape_html(value))
    })
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
