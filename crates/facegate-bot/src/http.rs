//! `/verified` listener called by the web verifier.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::grant::RoleGranter;

#[derive(Clone)]
pub struct AppState {
    pub granter: Arc<RoleGranter>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/verified", post(verified))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct VerifiedEvent {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    guild_id: Option<String>,
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn verified(State(state): State<AppState>, Json(event): Json<VerifiedEvent>) -> Response {
    let (Some(user_id), Some(guild_id)) = (required(event.user_id), required(event.guild_id)) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "error", "message": "user_id and guild_id are required" })),
        )
            .into_response();
    };

    tracing::info!(user_id = %user_id, guild_id = %guild_id, "verification event received");

    match state.granter.grant(&user_id, &guild_id).await {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(err) => {
            tracing::error!(user_id = %user_id, error = %err, "could not complete verification event");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": err.to_string() })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::DiscordClient;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app(server: &MockServer) -> Router {
        let granter = RoleGranter::new(DiscordClient::new(server.uri(), "t"), "Face Verified");
        router(AppState { granter: Arc::new(granter) })
    }

    async fn post_json(app: Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::post("/verified")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn mount_discord(server: &MockServer, dm_status: u16) {
        Mock::given(method("GET"))
            .and(path("/guilds/7/roles"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": "55", "name": "Face Verified"}])),
            )
            .mount(server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/guilds/7/members/42/roles/55"))
            .respond_with(ResponseTemplate::new(204))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/users/@me/channels"))
            .respond_with(ResponseTemplate::new(dm_status).set_body_json(json!({"id": "900"})))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/channels/900/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "1"})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_verified_event_ok() {
        let server = MockServer::start().await;
        mount_discord(&server, 200).await;

        let (status, body) = post_json(app(&server), json!({"user_id": "42", "guild_id": "7"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_missing_ids_rejected() {
        let server = MockServer::start().await;

        let (status, body) = post_json(app(&server), json!({"user_id": "42"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let (status, _) = post_json(app(&server), json!({"user_id": " ", "guild_id": "7"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dm_failure_is_server_error() {
        let server = MockServer::start().await;
        mount_discord(&server, 403).await;

        let (status, body) = post_json(app(&server), json!({"user_id": "42", "guild_id": "7"})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("403"));
    }
}
