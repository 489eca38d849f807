use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label reported when no reference identity matched.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Build an embedding scaled to unit L2 norm. A zero vector is kept as-is.
    pub fn normalized(values: Vec<f32>) -> Self {
        let norm = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            Self { values: values.into_iter().map(|x| x / norm).collect() }
        } else {
            Self { values }
        }
    }

    /// Cosine similarity in [-1, 1]. Higher = more similar.
    pub fn similarity(&self, other: &Embedding) -> f32 {
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
}

/// One labeled face from the reference gallery. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceIdentity {
    pub label: String,
    pub embedding: Embedding,
}

/// Outcome of one recognition attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    /// Matched label, `None` when nothing qualified.
    pub label: Option<String>,
    /// Similarity of the reported match, 0.0 when unknown.
    pub similarity: f32,
    /// Frames that were successfully acquired and examined.
    pub frames_examined: usize,
    pub timestamp: DateTime<Utc>,
    /// Non-fatal problems met while preparing the attempt, such as skipped
    /// gallery images.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl MatchResult {
    pub fn unknown(frames_examined: usize) -> Self {
        Self {
            label: None,
            similarity: 0.0,
            frames_examined,
            timestamp: Utc::now(),
            warnings: Vec::new(),
        }
    }

    pub fn is_known(&self) -> bool {
        self.label.is_some()
    }

    /// The matched label, or [`UNKNOWN_LABEL`].
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(UNKNOWN_LABEL)
    }
}

/// A gallery entry that satisfied the threshold for a probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GalleryHit<'g> {
    pub index: usize,
    pub label: &'g str,
    pub similarity: f32,
}

/// Strategy for comparing a probe embedding against the reference gallery.
pub trait Matcher {
    fn compare<'g>(
        &self,
        probe: &Embedding,
        gallery: &'g [ReferenceIdentity],
        threshold: f32,
    ) -> Option<GalleryHit<'g>>;
}

/// First identity in gallery order whose cosine similarity reaches the
/// threshold wins. A closer identity later in the gallery never displaces it.
pub struct FirstWithinThreshold;

impl Matcher for FirstWithinThreshold {
    fn compare<'g>(
        &self,
        probe: &Embedding,
        gallery: &'g [ReferenceIdentity],
        threshold: f32,
    ) -> Option<GalleryHit<'g>> {
        gallery.iter().enumerate().find_map(|(index, reference)| {
            let similarity = probe.similarity(&reference.embedding);
            (similarity >= threshold).then_some(GalleryHit {
                index,
                label: reference.label.as_str(),
                similarity,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(label: &str, values: Vec<f32>) -> ReferenceIdentity {
        ReferenceIdentity { label: label.into(), embedding: Embedding::new(values) }
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = Embedding::new(vec![1.0, 0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert!((a.similarity(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        assert!(a.similarity(&b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0]);
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn test_normalized_has_unit_norm() {
        let e = Embedding::normalized(vec![3.0, 4.0]);
        assert!((e.values[0] - 0.6).abs() < 1e-6);
        assert!((e.values[1] - 0.8).abs() < 1e-6);
        assert_eq!(Embedding::normalized(vec![0.0, 0.0]).values, vec![0.0, 0.0]);
    }

    #[test]
    fn test_first_within_threshold_prefers_gallery_order() {
        // "alice" qualifies at ~0.71, "bob" is an exact match but comes later.
        let gallery = vec![
            identity("carol", vec![0.0, 0.0, 1.0]),
            identity("alice", vec![1.0, 1.0, 0.0]),
            identity("bob", vec![1.0, 0.0, 0.0]),
        ];
        let probe = Embedding::new(vec![1.0, 0.0, 0.0]);

        let hit = FirstWithinThreshold.compare(&probe, &gallery, 0.5).unwrap();
        assert_eq!(hit.label, "alice");
        assert_eq!(hit.index, 1);
        assert!((hit.similarity - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);
    }

    #[test]
    fn test_first_within_threshold_no_match() {
        let gallery = vec![identity("other", vec![0.0, 1.0, 0.0])];
        let probe = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert!(FirstWithinThreshold.compare(&probe, &gallery, 0.5).is_none());
    }

    #[test]
    fn test_first_within_threshold_empty_gallery() {
        let probe = Embedding::new(vec![1.0, 0.0]);
        assert!(FirstWithinThreshold.compare(&probe, &[], 0.5).is_none());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let gallery = vec![identity("edge", vec![1.0, 0.0])];
        let probe = Embedding::new(vec![1.0, 0.0]);
        assert!(FirstWithinThreshold.compare(&probe, &gallery, 1.0).is_some());
    }

    #[test]
    fn test_unknown_result_label() {
        let result = MatchResult::unknown(3);
        assert!(!result.is_known());
        assert_eq!(result.display_label(), UNKNOWN_LABEL);
        assert_eq!(result.frames_examined, 3);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_match_result_json_omits_empty_warnings() {
        let mut result = MatchResult::unknown(1);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("warnings").is_none());

        result.warnings.push("No face found in x.png. Skipping this file.".into());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["warnings"][0], "No face found in x.png. Skipping this file.");
    }
}
