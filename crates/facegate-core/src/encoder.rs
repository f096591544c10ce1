//! Face Encoder boundary: image bytes in, zero or one face vector out.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::FaceVector;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Converts a photo into a facial-feature vector.
///
/// `Ok(None)` means the photo decoded but contained no face; errors are
/// reserved for hard failures.
pub trait FaceEncoder: Send {
    fn encode(&mut self, image: &[u8]) -> Result<Option<FaceVector>, EncodeError>;
}

/// SCRFD detection + ArcFace recognition. Uses the most confident face only.
pub struct OnnxFaceEncoder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceEncoder {
    pub fn load(detector_path: &str, recognizer_path: &str) -> Result<Self, EncodeError> {
        Ok(Self {
            detector: FaceDetector::load(detector_path)?,
            recognizer: FaceRecognizer::load(recognizer_path)?,
        })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode(&mut self, image: &[u8]) -> Result<Option<FaceVector>, EncodeError> {
        let rgb = image::load_from_memory(image)?.to_rgb8();
        let faces = self.detector.detect(&rgb)?;
        tracing::debug!(
            width = rgb.width(),
            height = rgb.height(),
            faces = faces.len(),
            "encode: detection finished"
        );

        let Some(face) = faces.first() else {
            return Ok(None);
        };
        let vector = self.recognizer.extract(&rgb, face)?;
        Ok(Some(vector))
    }
}
