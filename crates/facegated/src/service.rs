//! Register and verify flows.

use std::sync::Arc;

use facegate_core::{
    Credential, CredentialError, CredentialVerifier, EncodeError, ExpectedBinding, FaceMatcher,
    FaceVector,
};
use facegate_store::{StoreError, UserRecord, UserStore};
use thiserror::Error;

use crate::engine::{EngineError, EngineHandle};
use crate::notifier::{NotifyError, RoleNotifier};

/// Why a flow did not succeed. Everything but `Store` and `Engine` is an
/// expected outcome reported back to the user.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Invalid or tampered token.")]
    InvalidCredential,
    #[error("Token does not match this {0}.")]
    BindingMismatch(&'static str),
    #[error("Could not read the uploaded image.")]
    UnreadableImage,
    #[error("No face detected in the image.")]
    NoFaceDetected,
    #[error("User not registered yet.")]
    NotRegistered,
    #[error("Face did not match.")]
    NoMatch,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("engine error: {0}")]
    Engine(EngineError),
}

impl From<CredentialError> for FlowError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::BindingMismatch { field } => Self::BindingMismatch(field),
            _ => Self::InvalidCredential,
        }
    }
}

impl From<EngineError> for FlowError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Encode(EncodeError::Decode(_)) => Self::UnreadableImage,
            other => Self::Engine(other),
        }
    }
}

/// Which page a valid link should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMode {
    Register,
    Verify,
}

#[derive(Debug)]
pub enum VerifyOutcome {
    /// Matched and the bot acknowledged.
    Verified,
    /// Matched, but the bot could not be told.
    Partial(NotifyError),
}

pub struct RegisterRequest {
    pub user_id: String,
    pub guild_id: String,
    pub token: String,
    pub photo: Vec<u8>,
}

pub struct VerifyRequest {
    pub user_id: String,
    pub guild_id: String,
    pub guild_name: String,
    pub token: String,
    pub photo: Vec<u8>,
}

pub struct VerificationService {
    verifier: CredentialVerifier,
    engine: EngineHandle,
    store: UserStore,
    matcher: FaceMatcher,
    notifier: Arc<dyn RoleNotifier>,
}

impl VerificationService {
    pub fn new(
        verifier: CredentialVerifier,
        engine: EngineHandle,
        store: UserStore,
        matcher: FaceMatcher,
        notifier: Arc<dyn RoleNotifier>,
    ) -> Self {
        Self { verifier, engine, store, matcher, notifier }
    }

    /// Validate a link credential for `guild_id` and pick the page to serve.
    pub async fn page(&self, token: &str, guild_id: &str) -> Result<(Credential, PageMode), FlowError> {
        let credential = self.verifier.verify(token, &ExpectedBinding::guild(guild_id))?;
        let mode = match self.store.face_vector(&credential.user_id).await? {
            Some(_) => PageMode::Verify,
            None => PageMode::Register,
        };
        Ok((credential, mode))
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<UserRecord, FlowError> {
        let expected = ExpectedBinding::guild(&req.guild_id).with_user(&req.user_id);
        self.verifier.verify(&req.token, &expected)?;

        let vector = self.encode(req.photo).await?;
        let record = self.store.save_registration(&req.user_id, &vector, &req.guild_id).await?;
        tracing::info!(user_id = %req.user_id, guild_id = %req.guild_id, "registration complete");
        Ok(record)
    }

    pub async fn verify(&self, req: VerifyRequest) -> Result<VerifyOutcome, FlowError> {
        let expected = ExpectedBinding::guild(&req.guild_id)
            .with_user(&req.user_id)
            .with_guild_name(&req.guild_name);
        self.verifier.verify(&req.token, &expected)?;

        let reference = self
            .store
            .face_vector(&req.user_id)
            .await?
            .ok_or(FlowError::NotRegistered)?;

        let candidate = self.encode(req.photo).await?;
        let result = self.matcher.compare(&reference, &candidate);
        tracing::info!(
            user_id = %req.user_id,
            guild_id = %req.guild_id,
            matched = result.matched,
            distance = result.distance,
            tolerance = self.matcher.tolerance(),
            "face comparison"
        );
        if !result.matched {
            return Err(FlowError::NoMatch);
        }

        self.store.add_guild(&req.user_id, &req.guild_id).await?;

        match self.notifier.notify_verified(&req.user_id, &req.guild_id).await {
            Ok(()) => Ok(VerifyOutcome::Verified),
            Err(err) => {
                tracing::warn!(user_id = %req.user_id, error = %err, "verified but bot notification failed");
                Ok(VerifyOutcome::Partial(err))
            }
        }
    }

    async fn encode(&self, photo: Vec<u8>) -> Result<FaceVector, FlowError> {
        self.engine.encode(photo).await?.ok_or(FlowError::NoFaceDetected)
    }
}
