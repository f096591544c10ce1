use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default Euclidean tolerance for a same-person decision.
pub const DEFAULT_TOLERANCE: f32 = 0.6;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BlobError {
    #[error("face vector blob is empty")]
    Empty,
    #[error("face vector blob length {0} is not a multiple of 4")]
    Misaligned(usize),
}

/// Facial-feature vector produced by a face encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceVector {
    pub values: Vec<f32>,
    /// Model version that produced this vector (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl FaceVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values, model_version: None }
    }

    pub fn dims(&self) -> usize {
        self.values.len()
    }

    /// Euclidean distance between two vectors.
    pub fn distance(&self, other: &FaceVector) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// Cosine similarity in [-1, 1]. Zero when either vector has no magnitude.
    pub fn similarity(&self, other: &FaceVector) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    /// Serialize as packed little-endian f32 values.
    pub fn to_blob(&self) -> Vec<u8> {
        self.values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Inverse of [`to_blob`](Self::to_blob). The model version is not part of the blob.
    pub fn from_blob(blob: &[u8]) -> Result<Self, BlobError> {
        if blob.is_empty() {
            return Err(BlobError::Empty);
        }
        if blob.len() % 4 != 0 {
            return Err(BlobError::Misaligned(blob.len()));
        }
        let values = blob
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self::new(values))
    }
}

/// Outcome of comparing a candidate vector against a reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// Euclidean distance; `f32::INFINITY` when dimensions disagree.
    pub distance: f32,
}

/// Same-person decision under a Euclidean distance tolerance.
#[derive(Debug, Clone, Copy)]
pub struct FaceMatcher {
    tolerance: f32,
}

impl Default for FaceMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl FaceMatcher {
    pub fn new(tolerance: f32) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    pub fn compare(&self, reference: &FaceVector, candidate: &FaceVector) -> MatchResult {
        if reference.dims() != candidate.dims() || reference.dims() == 0 {
            return MatchResult { matched: false, distance: f32::INFINITY };
        }
        let distance = reference.distance(candidate);
        MatchResult { matched: distance <= self.tolerance, distance }
    }

    pub fn is_match(&self, reference: &FaceVector, candidate: &FaceVector) -> bool {
        self.compare(reference, candidate).matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(values: &[f32]) -> FaceVector {
        FaceVector::new(values.to_vec())
    }

    #[test]
    fn test_distance_identical() {
        let a = v(&[0.1, 0.2, 0.3]);
        assert!(a.distance(&a).abs() < 1e-6);
    }

    #[test]
    fn test_distance_pythagorean() {
        let a = v(&[0.0, 0.0]);
        let b = v(&[3.0, 4.0]);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_orthogonal_and_zero() {
        assert!(v(&[1.0, 0.0]).similarity(&v(&[0.0, 1.0])).abs() < 1e-6);
        assert_eq!(v(&[0.0, 0.0]).similarity(&v(&[1.0, 0.0])), 0.0);
    }

    #[test]
    fn test_blob_preserves_values() {
        let a = v(&[1.5, -0.25, f32::MIN_POSITIVE]);
        let decoded = FaceVector::from_blob(&a.to_blob()).unwrap();
        assert_eq!(decoded.values, a.values);
        assert_eq!(a.to_blob().len(), 12);
    }

    #[test]
    fn test_blob_rejects_bad_lengths() {
        assert_eq!(FaceVector::from_blob(&[]), Err(BlobError::Empty));
        assert_eq!(FaceVector::from_blob(&[0, 1, 2]), Err(BlobError::Misaligned(3)));
    }

    #[test]
    fn test_matcher_within_tolerance() {
        let m = FaceMatcher::default();
        let result = m.compare(&v(&[0.0, 0.0]), &v(&[0.3, 0.4]));
        assert!(result.matched);
        assert!((result.distance - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_matcher_boundary_is_inclusive() {
        let m = FaceMatcher::new(5.0);
        assert!(m.is_match(&v(&[0.0, 0.0]), &v(&[3.0, 4.0])));
    }

    #[test]
    fn test_matcher_beyond_tolerance() {
        let m = FaceMatcher::default();
        assert!(!m.is_match(&v(&[0.0, 0.0]), &v(&[1.0, 0.0])));
    }

    #[test]
    fn test_matcher_dimension_mismatch() {
        let m = FaceMatcher::new(100.0);
        let result = m.compare(&v(&[0.0, 0.0]), &v(&[0.0, 0.0, 0.0]));
        assert!(!result.matched);
        assert!(result.distance.is_infinite());
    }
}
