use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared HS256 secret for verification credentials.
    pub jwt_secret: String,
    /// Address the web verifier listens on.
    pub listen: SocketAddr,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Bot endpoint told about successful verifications.
    pub notify_url: String,
    pub notify_timeout: Duration,
    /// Euclidean distance tolerance for a positive match.
    pub match_tolerance: f32,
    /// Upper bound on request bodies (the photo upload).
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from `FACEGATE_*` environment variables with defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup("FACEGATE_JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("FACEGATE_JWT_SECRET"))?;

        let model_dir = lookup("FACEGATE_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(facegate_core::default_model_dir);

        let db_path = lookup("FACEGATE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| facegate_core::data_home().join("facegate").join("users.db"));

        Ok(Self {
            jwt_secret,
            listen: parse_or(&lookup, "FACEGATE_LISTEN", SocketAddr::from(([127, 0, 0, 1], 8000)))?,
            model_dir,
            db_path,
            notify_url: lookup("FACEGATE_NOTIFY_URL")
                .unwrap_or_else(|| "http://127.0.0.1:5000/verified".to_string()),
            notify_timeout: Duration::from_secs(parse_or(&lookup, "FACEGATE_NOTIFY_TIMEOUT_SECS", 5)?),
            match_tolerance: parse_or(
                &lookup,
                "FACEGATE_MATCH_TOLERANCE",
                facegate_core::ARCFACE_TOLERANCE,
            )?,
            max_upload_bytes: parse_or(&lookup, "FACEGATE_MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
        })
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_dir.join("det_10g.onnx").to_string_lossy().into_owned()
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> String {
        self.model_dir.join("w600k_r50.onnx").to_string_lossy().into_owned()
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("FACEGATE_JWT_SECRET", "s")])).unwrap();
        assert_eq!(config.listen.to_string(), "127.0.0.1:8000");
        assert_eq!(config.notify_url, "http://127.0.0.1:5000/verified");
        assert_eq!(config.match_tolerance, facegate_core::ARCFACE_TOLERANCE);
        assert_eq!(config.notify_timeout, Duration::from_secs(5));
        assert!(config.arcface_model_path().ends_with("w600k_r50.onnx"));
    }

    #[test]
    fn test_secret_required() {
        assert!(matches!(
            Config::from_lookup(lookup(&[])),
            Err(ConfigError::Missing("FACEGATE_JWT_SECRET"))
        ));
        assert!(Config::from_lookup(lookup(&[("FACEGATE_JWT_SECRET", "")])).is_err());
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let config = Config::from_lookup(lookup(&[
            ("FACEGATE_JWT_SECRET", "s"),
            ("FACEGATE_LISTEN", "0.0.0.0:9000"),
            ("FACEGATE_MATCH_TOLERANCE", "0.6"),
            ("FACEGATE_DB_PATH", "/var/lib/facegate/users.db"),
        ]))
        .unwrap();
        assert_eq!(config.listen.port(), 9000);
        assert_eq!(config.match_tolerance, 0.6);
        assert_eq!(config.db_path, PathBuf::from("/var/lib/facegate/users.db"));

        let err = Config::from_lookup(lookup(&[
            ("FACEGATE_JWT_SECRET", "s"),
            ("FACEGATE_MATCH_TOLERANCE", "close"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "FACEGATE_MATCH_TOLERANCE", .. }));
    }
}
