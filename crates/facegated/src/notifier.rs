//! Role Notifier client: tells the bot that a user passed verification.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notifier request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("notifier answered with status {0}")]
    Rejected(u16),
}

#[derive(Debug, Serialize)]
struct VerifiedPayload<'a> {
    user_id: &'a str,
    guild_id: &'a str,
}

#[async_trait]
pub trait RoleNotifier: Send + Sync {
    /// Single attempt, no retry.
    async fn notify_verified(&self, user_id: &str, guild_id: &str) -> Result<(), NotifyError>;
}

/// POSTs `{user_id, guild_id}` to the bot and expects a 200.
pub struct HttpRoleNotifier {
    client: reqwest::Client,
    url: String,
}

impl HttpRoleNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl RoleNotifier for HttpRoleNotifier {
    async fn notify_verified(&self, user_id: &str, guild_id: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&VerifiedPayload { user_id, guild_id })
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        tracing::info!(user_id, guild_id, "bot notified of verification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier(server: &MockServer) -> HttpRoleNotifier {
        HttpRoleNotifier::new(format!("{}/verified", server.uri()), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_notify_posts_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verified"))
            .and(body_json(json!({"user_id": "42", "guild_id": "7"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        notifier(&server).notify_verified("42", "7").await.unwrap();
    }

    #[tokio::test]
    async fn test_non_200_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verified"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let err = notifier(&server).notify_verified("42", "7").await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected(500)));
    }

    #[tokio::test]
    async fn test_unreachable_is_transport_error() {
        let notifier =
            HttpRoleNotifier::new("http://127.0.0.1:1/verified", Duration::from_secs(2)).unwrap();
        let err = notifier.notify_verified("42", "7").await.unwrap_err();
        assert!(matches!(err, NotifyError::Transport(_)));
    }
}
