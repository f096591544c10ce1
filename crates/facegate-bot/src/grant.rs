use crate::discord::{DiscordClient, DiscordError, Embed, EmbedFooter, GREEN};

/// Grants the verified role and tells the member about it.
pub struct RoleGranter {
    discord: DiscordClient,
    role_name: String,
}

impl RoleGranter {
    pub fn new(discord: DiscordClient, role_name: impl Into<String>) -> Self {
        Self { discord, role_name: role_name.into() }
    }

    /// Ensure the role exists, add it to the member, then DM them.
    ///
    /// Role failures are logged and do not stop the DM; a failed DM is
    /// returned to the caller.
    pub async fn grant(&self, user_id: &str, guild_id: &str) -> Result<(), DiscordError> {
        match self.assign_role(user_id, guild_id).await {
            Ok(role_id) => tracing::info!(user_id, guild_id, role_id = %role_id, "verified role granted"),
            Err(err) => tracing::error!(user_id, guild_id, error = %err, "could not grant verified role"),
        }

        self.discord.send_dm(user_id, &success_embed()).await?;
        tracing::info!(user_id, "verification DM sent");
        Ok(())
    }

    async fn assign_role(&self, user_id: &str, guild_id: &str) -> Result<String, DiscordError> {
        let roles = self.discord.guild_roles(guild_id).await?;
        let role = match roles.into_iter().find(|r| r.name == self.role_name) {
            Some(role) => role,
            None => {
                let role = self.discord.create_role(guild_id, &self.role_name, GREEN).await?;
                tracing::info!(guild_id, role_id = %role.id, "created verified role");
                role
            }
        };
        self.discord.add_member_role(guild_id, user_id, &role.id).await?;
        Ok(role.id)
    }
}

fn success_embed() -> Embed {
    Embed {
        title: "Verification complete".to_string(),
        description: "Your face matched your registration. You now have access to the server."
            .to_string(),
        color: GREEN,
        footer: EmbedFooter { text: "Facegate".to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_dm(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/users/@me/channels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "900"})))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/channels/900/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "1"})))
            .expect(1)
            .mount(server)
            .await;
    }

    fn granter(server: &MockServer) -> RoleGranter {
        RoleGranter::new(DiscordClient::new(server.uri(), "t"), "Face Verified")
    }

    #[tokio::test]
    async fn test_existing_role_is_reused() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/guilds/7/roles"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": "55", "name": "Face Verified"}])),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/guilds/7/roles"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/guilds/7/members/42/roles/55"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        mount_dm(&server).await;

        granter(&server).grant("42", "7").await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_role_is_created() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/guilds/7/roles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/guilds/7/roles"))
            .and(body_json(json!({"name": "Face Verified", "color": GREEN})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "77", "name": "Face Verified"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/guilds/7/members/42/roles/77"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        mount_dm(&server).await;

        granter(&server).grant("42", "7").await.unwrap();
    }

    #[tokio::test]
    async fn test_role_failure_still_sends_dm() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/guilds/7/roles"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        mount_dm(&server).await;

        granter(&server).grant("42", "7").await.unwrap();
    }

    #[tokio::test]
    async fn test_dm_failure_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/guilds/7/roles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "55", "name": "Face Verified"}])))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/guilds/7/members/42/roles/55"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/users/@me/channels"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Cannot send messages to this user"))
            .mount(&server)
            .await;

        let err = granter(&server).grant("42", "7").await.unwrap_err();
        assert!(matches!(err, DiscordError::Api { status: 403, .. }));
    }
}
