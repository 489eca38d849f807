use crate::engine::MatchSettings;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// V4L2 device index, opened as `/dev/video{index}` (default: 0).
    pub camera_index: usize,
    /// Flat directory of `<label>.jpg|png` reference images.
    pub gallery_dir: PathBuf,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// JSON sheet file backing the record store.
    pub store_path: PathBuf,
    /// Cosine similarity threshold for a positive match.
    pub similarity_threshold: f32,
    /// Wall-clock length of one recognition attempt.
    pub capture_secs: u64,
    /// Length of the simulated vitals scan.
    pub scan_secs: u64,
    /// Consecutive frame failures after which a capture attempt gives up.
    pub max_frame_failures: usize,
}

impl Config {
    /// Load configuration from `OPTICHECK_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("opticheck");

        Self {
            camera_index: env_usize("OPTICHECK_CAMERA_INDEX", 0),
            gallery_dir: env_path("OPTICHECK_GALLERY_DIR", data_dir.join("match_images")),
            model_dir: env_path("OPTICHECK_MODEL_DIR", data_dir.join("models")),
            store_path: env_path("OPTICHECK_STORE_PATH", data_dir.join("users.json")),
            similarity_threshold: env_f32("OPTICHECK_SIMILARITY_THRESHOLD", 0.40),
            capture_secs: env_u64("OPTICHECK_CAPTURE_SECS", 5),
            scan_secs: env_u64("OPTICHECK_SCAN_SECS", 5),
            max_frame_failures: env_usize("OPTICHECK_MAX_FRAME_FAILURES", 30),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> PathBuf {
        self.model_dir.join(opticheck_core::SCRFD_MODEL_FILE)
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> PathBuf {
        self.model_dir.join(opticheck_core::ARCFACE_MODEL_FILE)
    }

    pub fn match_settings(&self) -> MatchSettings {
        MatchSettings {
            threshold: self.similarity_threshold,
            capture_duration: Duration::from_secs(self.capture_secs),
            max_consecutive_failures: self.max_frame_failures,
        }
    }

    pub fn scan_duration(&self) -> Duration {
        Duration::from_secs(self.scan_secs)
    }
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_helpers_fall_back_on_missing_or_garbage() {
        assert_eq!(env_u64("OPTICHECK_TEST_UNSET_U64", 7), 7);
        std::env::set_var("OPTICHECK_TEST_GARBAGE_F32", "not-a-number");
        assert_eq!(env_f32("OPTICHECK_TEST_GARBAGE_F32", 0.4), 0.4);
        std::env::set_var("OPTICHECK_TEST_SET_USIZE", "12");
        assert_eq!(env_usize("OPTICHECK_TEST_SET_USIZE", 0), 12);
    }

    #[test]
    fn test_model_paths_and_settings() {
        let config = Config {
            camera_index: 0,
            gallery_dir: PathBuf::from("/g"),
            model_dir: PathBuf::from("/models"),
            store_path: PathBuf::from("/s.json"),
            similarity_threshold: 0.5,
            capture_secs: 5,
            scan_secs: 2,
            max_frame_failures: 10,
        };
        assert_eq!(config.scrfd_model_path(), PathBuf::from("/models/det_10g.onnx"));
        assert_eq!(config.arcface_model_path(), PathBuf::from("/models/w600k_r50.onnx"));

        let settings = config.match_settings();
        assert_eq!(settings.capture_duration, Duration::from_secs(5));
        assert_eq!(settings.max_consecutive_failures, 10);
        assert_eq!(config.scan_duration(), Duration::from_secs(2));
    }
}
