//! Minimal Discord REST client: roles, member roles, direct messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscordError {
    #[error("discord request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("discord returned {status} for {endpoint}: {body}")]
    Api { endpoint: String, status: u16, body: String },
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Role {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub footer: EmbedFooter,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

pub const GREEN: u32 = 0x2ECC71;

pub struct DiscordClient {
    http: reqwest::Client,
    base: String,
    auth: String,
}

impl DiscordClient {
    pub fn new(base: impl Into<String>, bot_token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into(),
            auth: format!("Bot {bot_token}"),
        }
    }

    fn request(&self, method: reqwest::Method, endpoint: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{endpoint}", self.base))
            .header(reqwest::header::AUTHORIZATION, &self.auth)
    }

    async fn send(
        &self,
        endpoint: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, DiscordError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DiscordError::Api { endpoint: endpoint.to_string(), status: status.as_u16(), body })
    }

    pub async fn guild_roles(&self, guild_id: &str) -> Result<Vec<Role>, DiscordError> {
        let endpoint = format!("/guilds/{guild_id}/roles");
        let response = self.send(&endpoint, self.request(reqwest::Method::GET, &endpoint)).await?;
        Ok(response.json().await?)
    }

    pub async fn create_role(&self, guild_id: &str, name: &str, color: u32) -> Result<Role, DiscordError> {
        let endpoint = format!("/guilds/{guild_id}/roles");
        let builder = self
            .request(reqwest::Method::POST, &endpoint)
            .json(&serde_json::json!({ "name": name, "color": color }));
        Ok(self.send(&endpoint, builder).await?.json().await?)
    }

    pub async fn add_member_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<(), DiscordError> {
        let endpoint = format!("/guilds/{guild_id}/members/{user_id}/roles/{role_id}");
        self.send(&endpoint, self.request(reqwest::Method::PUT, &endpoint)).await?;
        Ok(())
    }

    /// Open (or reuse) the DM channel with `user_id` and post `embed` there.
    pub async fn send_dm(&self, user_id: &str, embed: &Embed) -> Result<(), DiscordError> {
        let endpoint = "/users/@me/channels";
        let builder = self
            .request(reqwest::Method::POST, endpoint)
            .json(&serde_json::json!({ "recipient_id": user_id }));
        let channel: Channel = self.send(endpoint, builder).await?.json().await?;

        let endpoint = format!("/channels/{}/messages", channel.id);
        let builder = self
            .request(reqwest::Method::POST, &endpoint)
            .json(&serde_json::json!({ "embeds": [embed] }));
        self.send(&endpoint, builder).await?;
        Ok(())
    }
}
