use facegate_core::{EncodeError, FaceEncoder, FaceVector};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("could not spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

struct EncodeRequest {
    image: Vec<u8>,
    reply: oneshot::Sender<Result<Option<FaceVector>, EncodeError>>,
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EncodeRequest>,
}

impl EngineHandle {
    /// Encode one photo. `Ok(None)` when no face was found.
    pub async fn encode(&self, image: Vec<u8>) -> Result<Option<FaceVector>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EncodeRequest { image, reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }
}

/// Run `encoder` on a dedicated OS thread.
///
/// Inference is CPU-bound and the ONNX sessions need `&mut`, so requests are
/// serialised through a channel instead of running on the async runtime.
pub fn spawn_engine(mut encoder: Box<dyn FaceEncoder>) -> Result<EngineHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<EncodeRequest>(4);

    std::thread::Builder::new()
        .name("facegate-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                let started = std::time::Instant::now();
                let result = encoder.encode(&req.image);
                tracing::debug!(
                    bytes = req.image.len(),
                    face = matches!(result, Ok(Some(_))),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "encode request handled"
                );
                let _ = req.reply.send(result);
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;

    /// Encoder keyed on the literal photo bytes.
    #[derive(Default)]
    pub struct StubEncoder {
        faces: HashMap<Vec<u8>, FaceVector>,
    }

    impl StubEncoder {
        pub fn with_face(mut self, photo: &str, values: &[f32]) -> Self {
            self.faces.insert(photo.as_bytes().to_vec(), FaceVector::new(values.to_vec()));
            self
        }
    }

    impl FaceEncoder for StubEncoder {
        fn encode(&mut self, image: &[u8]) -> Result<Option<FaceVector>, EncodeError> {
            if image == b"corrupt" {
                let err = image::load_from_memory(image).expect_err("not an image");
                return Err(EncodeError::Decode(err));
            }
            Ok(self.faces.get(image).cloned())
        }
    }
}
