use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Operator settings, loaded from the same `FACEGATE_*` variables the
/// daemons read.
#[derive(Debug, Clone)]
pub struct Config {
    /// Signing secret; only `link` needs it.
    jwt_secret: Option<String>,
    /// Base URL the web verifier is reachable at.
    pub public_url: String,
    pub db_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            jwt_secret: lookup("FACEGATE_JWT_SECRET").filter(|s| !s.is_empty()),
            public_url: lookup("FACEGATE_PUBLIC_URL")
                .unwrap_or_else(|| "http://127.0.0.1:8000".to_string())
                .trim_end_matches('/')
                .to_string(),
            db_path: lookup("FACEGATE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| facegate_core::data_home().join("facegate").join("users.db")),
        }
    }

    pub fn jwt_secret(&self) -> Result<&str, ConfigError> {
        self.jwt_secret.as_deref().ok_or(ConfigError::Missing("FACEGATE_JWT_SECRET"))
    }

    pub fn verification_url(&self, token: &str, guild_id: &str) -> String {
        format!("{}/verify/{token}/{guild_id}", self.public_url)
    }
}
