//! Detection + recognition behind a single seam.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::Embedding;
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Turns an RGB image into one embedding per detected face.
///
/// Faces are returned in detection order (highest confidence first). An
/// image without faces yields an empty vector, not an error.
pub trait FaceEncoder {
    fn encode_faces(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, EncodeError>;
}

/// SCRFD detector feeding the ArcFace recognizer.
pub struct OnnxFaceEncoder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceEncoder {
    pub fn load(scrfd_path: &Path, arcface_path: &Path) -> Result<Self, EncodeError> {
        let detector = FaceDetector::load(scrfd_path)?;
        let recognizer = FaceRecognizer::load(arcface_path)?;
        Ok(Self { detector, recognizer })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode_faces(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, EncodeError> {
        let faces = self.detector.detect(image)?;
        tracing::trace!(faces = faces.len(), "detected faces");

        let mut embeddings = Vec::with_capacity(faces.len());
        for face in &faces {
            match self.recognizer.extract(image, face) {
                Ok(embedding) => embeddings.push(embedding),
                // A box without landmarks cannot be aligned; skip just that face.
                Err(RecognizerError::NoLandmarks) => {
                    tracing::debug!(confidence = face.confidence, "skipping face without landmarks");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(embeddings)
    }
}
