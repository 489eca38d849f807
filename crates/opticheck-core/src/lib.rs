//! opticheck-core — Face detection, recognition and reference gallery matching.
//!
//! Uses SCRFD for face detection and ArcFace for face embeddings, both
//! running via ONNX Runtime for CPU inference.

pub mod alignment;
pub mod detector;
pub mod encoder;
pub mod gallery;
pub mod recognizer;
pub mod types;

pub use detector::FaceDetector;
pub use encoder::{EncodeError, FaceEncoder, OnnxFaceEncoder};
pub use gallery::{load_gallery, Gallery, GalleryError, SkipReason, SkippedImage};
pub use recognizer::FaceRecognizer;
pub use types::{
    BoundingBox, Embedding, FirstWithinThreshold, GalleryHit, MatchResult, Matcher, ReferenceIdentity,
    UNKNOWN_LABEL,
};

/// SCRFD detection model file name.
pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
/// ArcFace recognition model file name.
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";
