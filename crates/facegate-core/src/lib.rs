//! facegate-core: face encoding, matching, and verification credentials.
//!
//! Face encoding uses SCRFD for detection and ArcFace for recognition, both
//! running via ONNX Runtime on the CPU. The [`FaceEncoder`] trait keeps the
//! concrete backend swappable.

pub mod alignment;
pub mod credential;
pub mod detector;
pub mod encoder;
pub mod recognizer;
pub mod types;

pub use credential::{Credential, CredentialError, CredentialIssuer, CredentialVerifier, ExpectedBinding};
pub use encoder::{EncodeError, FaceEncoder, OnnxFaceEncoder};
pub use recognizer::ARCFACE_TOLERANCE;
pub use types::{BoundingBox, FaceMatcher, FaceVector, MatchResult, DEFAULT_TOLERANCE};

/// Default directory for the ONNX model files.
///
/// `$XDG_DATA_HOME/facegate/models`, falling back to `~/.local/share`.
pub fn default_model_dir() -> std::path::PathBuf {
    data_home().join("facegate").join("models")
}

/// `$XDG_DATA_HOME`, or `$HOME/.local/share`.
pub fn data_home() -> std::path::PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            std::path::PathBuf::from(home).join(".local/share")
        })
}
