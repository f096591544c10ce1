use std::net::SocketAddr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Bot listener configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bot token for the Discord REST API.
    pub discord_token: String,
    /// Address the `/verified` listener binds to.
    pub listen: SocketAddr,
    /// Discord REST base URL (overridable for tests and proxies).
    pub discord_api: String,
    /// Name of the role granted to verified members.
    pub role_name: String,
}

impl Config {
    /// Load configuration from `FACEGATE_*` environment variables with defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let discord_token = lookup("FACEGATE_DISCORD_TOKEN")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("FACEGATE_DISCORD_TOKEN"))?;

        let listen = match lookup("FACEGATE_BOT_LISTEN") {
            None => SocketAddr::from(([127, 0, 0, 1], 5000)),
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { key: "FACEGATE_BOT_LISTEN", value })?,
        };

        Ok(Self {
            discord_token,
            listen,
            discord_api: lookup("FACEGATE_DISCORD_API")
                .unwrap_or_else(|| "https://discord.com/api/v10".to_string())
                .trim_end_matches('/')
                .to_string(),
            role_name: lookup("FACEGATE_ROLE_NAME").unwrap_or_else(|| "Face Verified".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|key| {
            (key == "FACEGATE_DISCORD_TOKEN").then(|| "token".to_string())
        })
        .unwrap();
        assert_eq!(config.listen.to_string(), "127.0.0.1:5000");
        assert_eq!(config.discord_api, "https://discord.com/api/v10");
        assert_eq!(config.role_name, "Face Verified");
    }

    #[test]
    fn test_token_required_and_api_trimmed() {
        assert!(matches!(
            Config::from_lookup(|_| None),
            Err(ConfigError::Missing("FACEGATE_DISCORD_TOKEN"))
        ));

        let config = Config::from_lookup(|key| match key {
            "FACEGATE_DISCORD_TOKEN" => Some("t".into()),
            "FACEGATE_DISCORD_API" => Some("http://localhost:9999/api/".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.discord_api, "http://localhost:9999/api");
    }
}
