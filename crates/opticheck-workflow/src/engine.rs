//! Recognition attempts: open the camera, read frames for a fixed wall-clock
//! window, and report the identity seen.

use crate::workflow::Action;
use opticheck_core::{
    load_gallery, FaceEncoder, FirstWithinThreshold, GalleryError, MatchResult, Matcher,
    ReferenceIdentity, SkippedImage,
};
use opticheck_hw::{CameraError, CaptureDevice, FrameSource};
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(#[from] CameraError),
    #[error("no reference identities to match against")]
    EmptyGallery,
}

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error(transparent)]
    Gallery(#[from] GalleryError),
    #[error("{source}")]
    Match {
        source: MatchError,
        /// Gallery files skipped before the attempt failed.
        skipped: Vec<SkippedImage>,
    },
}

impl VerifyError {
    /// Gallery files that were skipped while loading, if loading got that far.
    pub fn skipped(&self) -> &[SkippedImage] {
        match self {
            VerifyError::Gallery(GalleryError::NoUsableFaces { skipped, .. }) => skipped.as_slice(),
            VerifyError::Gallery(_) => &[],
            VerifyError::Match { skipped, .. } => skipped.as_slice(),
        }
    }
}

/// Parameters of one recognition attempt.
#[derive(Debug, Clone, Copy)]
pub struct MatchSettings {
    /// Minimum cosine similarity for a match.
    pub threshold: f32,
    pub capture_duration: Duration,
    /// Consecutive failed frames after which the attempt ends early.
    pub max_consecutive_failures: usize,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            threshold: 0.40,
            capture_duration: Duration::from_secs(5),
            max_consecutive_failures: 30,
        }
    }
}

/// Run one recognition attempt against `gallery`.
///
/// Each frame's faces are compared in detection order and the first face that
/// matches decides the frame. The returned label is the one from the most
/// recent frame that matched; frames without a match do not clear it.
///
/// Failed frame reads and encoder errors are logged and skipped; a run of
/// `max_consecutive_failures` of them ends the attempt early with the label
/// seen so far. The device is held only inside this call and released on
/// every exit path.
pub fn match_identity<D, E>(
    device: &mut D,
    encoder: &mut E,
    gallery: &[ReferenceIdentity],
    settings: &MatchSettings,
) -> Result<MatchResult, MatchError>
where
    D: CaptureDevice,
    E: FaceEncoder + ?Sized,
{
    if gallery.is_empty() {
        return Err(MatchError::EmptyGallery);
    }

    let mut source = device.open()?;
    let matcher = FirstWithinThreshold;
    let max_failures = settings.max_consecutive_failures.max(1);
    let started = Instant::now();

    let mut last_hit: Option<(String, f32)> = None;
    let mut frames_examined = 0usize;
    let mut consecutive_failures = 0usize;

    while started.elapsed() < settings.capture_duration {
        let attempt = match source.read_frame() {
            Ok(frame) => {
                frames_examined += 1;
                encoder.encode_faces(&frame.image).map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        };
        let probes = match attempt {
            Ok(probes) => {
                consecutive_failures = 0;
                probes
            }
            Err(reason) => {
                consecutive_failures += 1;
                tracing::warn!(%reason, consecutive_failures, "frame skipped");
                if consecutive_failures >= max_failures {
                    tracing::warn!(device = %device.describe(), "too many failed frames, ending attempt");
                    break;
                }
                continue;
            }
        };

        let hit = probes
            .iter()
            .find_map(|probe| matcher.compare(probe, gallery, settings.threshold));
        if let Some(hit) = hit {
            tracing::debug!(label = hit.label, similarity = hit.similarity, "frame matched");
            last_hit = Some((hit.label.to_string(), hit.similarity));
        }
    }
    drop(source);

    let mut result = MatchResult::unknown(frames_examined);
    if let Some((label, similarity)) = last_hit {
        result.label = Some(label);
        result.similarity = similarity;
    }

    tracing::info!(
        device = %device.describe(),
        label = result.display_label(),
        similarity = result.similarity,
        frames_examined,
        "recognition attempt finished"
    );
    Ok(result)
}

/// Load the gallery from `gallery_dir` and run one recognition attempt.
///
/// Gallery files skipped during loading are reported in
/// [`MatchResult::warnings`], or through [`VerifyError::skipped`] when the
/// attempt fails.
pub fn verify_identity<D, E>(
    device: &mut D,
    encoder: &mut E,
    gallery_dir: &Path,
    settings: &MatchSettings,
) -> Result<MatchResult, VerifyError>
where
    D: CaptureDevice,
    E: FaceEncoder + ?Sized,
{
    let gallery = load_gallery(gallery_dir, encoder)?;
    match match_identity(device, encoder, gallery.identities(), settings) {
        Ok(mut result) => {
            result.warnings = gallery.skipped().iter().map(ToString::to_string).collect();
            Ok(result)
        }
        Err(source) => Err(VerifyError::Match { source, skipped: gallery.skipped().to_vec() }),
    }
}

impl From<Result<MatchResult, VerifyError>> for Action {
    fn from(attempt: Result<MatchResult, VerifyError>) -> Self {
        match attempt {
            Ok(result) => Action::Recognized(result),
            Err(e) => Action::RecognitionFailed {
                reason: e.to_string(),
                warnings: e.skipped().iter().map(ToString::to_string).collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use opticheck_core::{EncodeError, Embedding};
    use opticheck_hw::Frame;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Frame script entry: a scene index (see [`SceneEncoder`]) or a read failure.
    #[derive(Clone, Copy)]
    enum Step {
        Scene(u8),
        Fail,
    }

    struct ScriptedSource {
        steps: VecDeque<Step>,
        released: Rc<Cell<bool>>,
        reads: Rc<Cell<usize>>,
        /// What to return once the script runs out.
        after: Step,
    }

    impl FrameSource for ScriptedSource {
        fn read_frame(&mut self) -> Result<Frame, CameraError> {
            self.reads.set(self.reads.get() + 1);
            match self.steps.pop_front().unwrap_or(self.after) {
                Step::Scene(n) => Ok(Frame {
                    image: RgbImage::from_pixel(2, 2, Rgb([n, 0, 0])),
                    timestamp: Instant::now(),
                    sequence: self.reads.get() as u32,
                }),
                Step::Fail => Err(CameraError::CaptureFailed("dequeue timeout".into())),
            }
        }
    }

    impl Drop for ScriptedSource {
        fn drop(&mut self) {
            self.released.set(true);
        }
    }

    struct ScriptedDevice {
        steps: RefCell<Option<Vec<Step>>>,
        after: Step,
        released: Rc<Cell<bool>>,
        reads: Rc<Cell<usize>>,
        busy: bool,
    }

    impl ScriptedDevice {
        fn new(steps: Vec<Step>, after: Step) -> Self {
            Self {
                steps: RefCell::new(Some(steps)),
                after,
                released: Rc::new(Cell::new(false)),
                reads: Rc::new(Cell::new(0)),
                busy: false,
            }
        }
    }

    impl CaptureDevice for ScriptedDevice {
        type Source = ScriptedSource;

        fn open(&self) -> Result<ScriptedSource, CameraError> {
            if self.busy {
                return Err(CameraError::DeviceBusy("/dev/video0".into()));
            }
            Ok(ScriptedSource {
                steps: self.steps.borrow_mut().take().unwrap_or_default().into(),
                released: Rc::clone(&self.released),
                reads: Rc::clone(&self.reads),
                after: self.after,
            })
        }

        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    /// Scene 0: no face. Scene 1: alice. Scene 2: bob. Scene 3: a stranger
    /// then alice in the same frame. Scene 9: encoder error.
    struct SceneEncoder {
        calls: usize,
    }

    fn axis(i: usize) -> Embedding {
        let mut v = vec![0.0; 4];
        v[i] = 1.0;
        Embedding::new(v)
    }

    impl FaceEncoder for SceneEncoder {
        fn encode_faces(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, EncodeError> {
            self.calls += 1;
            Ok(match image.get_pixel(0, 0).0[0] {
                1 => vec![axis(0)],
                2 => vec![axis(1)],
                3 => vec![axis(3), axis(0)],
                9 => {
                    return Err(EncodeError::Recognizer(
                        opticheck_core::recognizer::RecognizerError::InferenceFailed("boom".into()),
                    ))
                }
                _ => Vec::new(),
            })
        }
    }

    fn gallery() -> Vec<ReferenceIdentity> {
        vec![
            ReferenceIdentity { label: "alice".into(), embedding: axis(0) },
            ReferenceIdentity { label: "bob".into(), embedding: axis(1) },
        ]
    }

    fn settings(ms: u64) -> MatchSettings {
        MatchSettings {
            threshold: 0.4,
            capture_duration: Duration::from_millis(ms),
            max_consecutive_failures: 5,
        }
    }

    #[test]
    fn test_label_sticks_through_faceless_frames() {
        let mut device = ScriptedDevice::new(vec![Step::Scene(1), Step::Scene(0)], Step::Scene(0));
        let mut encoder = SceneEncoder { calls: 0 };

        let result = match_identity(&mut device, &mut encoder, &gallery(), &settings(100)).unwrap();

        assert_eq!(result.label.as_deref(), Some("alice"));
        assert!((result.similarity - 1.0).abs() < 1e-6);
        assert!(result.frames_examined >= 2);
        assert!(device.released.get());
    }

    #[test]
    fn test_most_recent_match_wins() {
        let mut device = ScriptedDevice::new(vec![Step::Scene(1), Step::Scene(2)], Step::Scene(0));
        let mut encoder = SceneEncoder { calls: 0 };
        let result = match_identity(&mut device, &mut encoder, &gallery(), &settings(100)).unwrap();
        assert_eq!(result.label.as_deref(), Some("bob"));
    }

    #[test]
    fn test_first_matching_face_decides_frame() {
        let mut device = ScriptedDevice::new(vec![Step::Scene(3)], Step::Scene(0));
        let mut encoder = SceneEncoder { calls: 0 };
        let result = match_identity(&mut device, &mut encoder, &gallery(), &settings(100)).unwrap();
        assert_eq!(result.label.as_deref(), Some("alice"));
    }

    #[test]
    fn test_no_faces_is_unknown() {
        let mut device = ScriptedDevice::new(Vec::new(), Step::Scene(0));
        let mut encoder = SceneEncoder { calls: 0 };
        let result = match_identity(&mut device, &mut encoder, &gallery(), &settings(50)).unwrap();
        assert!(!result.is_known());
        assert_eq!(result.display_label(), "unknown");
        assert_eq!(result.similarity, 0.0);
    }

    #[test]
    fn test_read_failures_are_skipped() {
        let mut device = ScriptedDevice::new(vec![Step::Fail, Step::Fail, Step::Scene(2)], Step::Scene(0));
        let mut encoder = SceneEncoder { calls: 0 };
        let result = match_identity(&mut device, &mut encoder, &gallery(), &settings(100)).unwrap();
        assert_eq!(result.label.as_deref(), Some("bob"));
    }

    #[test]
    fn test_encoder_errors_are_skipped() {
        let mut device = ScriptedDevice::new(vec![Step::Scene(9), Step::Scene(1)], Step::Scene(0));
        let mut encoder = SceneEncoder { calls: 0 };
        let result = match_identity(&mut device, &mut encoder, &gallery(), &settings(100)).unwrap();
        assert_eq!(result.label.as_deref(), Some("alice"));
    }

    #[test]
    fn test_gives_up_after_consecutive_failures_and_releases() {
        let mut device = ScriptedDevice::new(vec![Step::Scene(1)], Step::Fail);
        let mut encoder = SceneEncoder { calls: 0 };

        // Long window: the failure cap must end the attempt, not the clock.
        let started = Instant::now();
        let result = match_identity(&mut device, &mut encoder, &gallery(), &settings(10_000)).unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(result.label.as_deref(), Some("alice"));
        assert_eq!(result.frames_examined, 1);
        assert_eq!(device.reads.get(), 6);
        assert!(device.released.get());
    }

    #[test]
    fn test_busy_device_is_an_error_and_encoder_untouched() {
        let mut device = ScriptedDevice::new(Vec::new(), Step::Scene(1));
        device.busy = true;
        let mut encoder = SceneEncoder { calls: 0 };

        let err = match_identity(&mut device, &mut encoder, &gallery(), &settings(50)).unwrap_err();
        assert!(matches!(err, MatchError::DeviceUnavailable(CameraError::DeviceBusy(_))));
        assert_eq!(encoder.calls, 0);
    }

    #[test]
    fn test_empty_gallery_never_opens_device() {
        let mut device = ScriptedDevice::new(Vec::new(), Step::Scene(1));
        let mut encoder = SceneEncoder { calls: 0 };
        let err = match_identity(&mut device, &mut encoder, &[], &settings(50)).unwrap_err();
        assert!(matches!(err, MatchError::EmptyGallery));
        assert_eq!(device.reads.get(), 0);
    }

    #[test]
    fn test_setup_failure_becomes_recognition_failed_action() {
        let mut device = ScriptedDevice::new(Vec::new(), Step::Scene(1));
        let mut encoder = SceneEncoder { calls: 0 };
        let attempt = verify_identity(&mut device, &mut encoder, Path::new("/nonexistent/match_images"), &settings(50));
        let action = Action::from(attempt);
        assert!(matches!(action, Action::RecognitionFailed { reason, .. } if reason.contains("not found")));
    }

    #[test]
    fn test_skipped_gallery_files_become_warnings() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(2, 2, Rgb([1, 0, 0])).save(dir.path().join("alice.png")).unwrap();
        RgbImage::from_pixel(2, 2, Rgb([0, 0, 0])).save(dir.path().join("empty.png")).unwrap();
        let mut encoder = SceneEncoder { calls: 0 };

        let mut device = ScriptedDevice::new(vec![Step::Scene(1)], Step::Scene(0));
        let result = verify_identity(&mut device, &mut encoder, dir.path(), &settings(50)).unwrap();
        assert_eq!(result.label.as_deref(), Some("alice"));
        assert_eq!(result.warnings, vec!["No face found in empty.png. Skipping this file.".to_string()]);

        let mut busy = ScriptedDevice::new(Vec::new(), Step::Scene(1));
        busy.busy = true;
        let attempt = verify_identity(&mut busy, &mut encoder, dir.path(), &settings(50));
        let Action::RecognitionFailed { reason, warnings } = Action::from(attempt) else {
            panic!("expected RecognitionFailed");
        };
        assert!(reason.contains("camera unavailable"));
        assert_eq!(warnings.len(), 1);
    }
}
