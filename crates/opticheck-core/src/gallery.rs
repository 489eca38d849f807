//! Reference gallery loading.
//!
//! A gallery directory is flat: `<label>.jpg` / `<label>.png`, one face per
//! file. Files are visited in lexicographic name order so that matching
//! tie-breaks stay deterministic across runs.

use crate::encoder::{EncodeError, FaceEncoder};
use crate::types::ReferenceIdentity;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SUPPORTED_EXTENSIONS: [&str; 2] = ["jpg", "png"];

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("reference image directory not found: {0}")]
    DirectoryMissing(PathBuf),
    #[error("reference image directory is empty: {0}")]
    DirectoryEmpty(PathBuf),
    #[error("no .jpg or .png files in {0}")]
    NoImageFiles(PathBuf),
    #[error("no usable faces in {dir} ({} file(s) skipped)", .skipped.len())]
    NoUsableFaces { dir: PathBuf, skipped: Vec<SkippedImage> },
    #[error("reading {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("encoding reference faces: {0}")]
    Encode(#[from] EncodeError),
}

/// Why a gallery file contributed no identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoFace,
    Unreadable(String),
}

/// A gallery file that was excluded, reported as a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedImage {
    pub file_name: String,
    pub reason: SkipReason,
}

impl std::fmt::Display for SkippedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            SkipReason::NoFace => write!(f, "No face found in {}. Skipping this file.", self.file_name),
            SkipReason::Unreadable(e) => write!(f, "Could not read {}: {e}. Skipping this file.", self.file_name),
        }
    }
}

/// Loaded reference identities plus the files that were skipped.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    identities: Vec<ReferenceIdentity>,
    skipped: Vec<SkippedImage>,
}

impl Gallery {
    pub fn identities(&self) -> &[ReferenceIdentity] {
        &self.identities
    }

    pub fn skipped(&self) -> &[SkippedImage] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
}

/// Load one embedding per labeled reference image in `dir`.
///
/// Images without a detectable face (or that fail to decode) are skipped and
/// listed in [`Gallery::skipped`]. A missing or empty directory, or a
/// directory yielding zero embeddings, is an error.
pub fn load_gallery<E: FaceEncoder + ?Sized>(dir: &Path, encoder: &mut E) -> Result<Gallery, GalleryError> {
    if !dir.is_dir() {
        return Err(GalleryError::DirectoryMissing(dir.to_path_buf()));
    }

    let entries = std::fs::read_dir(dir).map_err(|e| GalleryError::Io(dir.to_path_buf(), e))?;
    let mut any_entry = false;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| GalleryError::Io(dir.to_path_buf(), e))?;
        any_entry = true;
        let path = entry.path();
        if path.is_file() && is_supported_image(&path) {
            files.push(path);
        }
    }

    if !any_entry {
        return Err(GalleryError::DirectoryEmpty(dir.to_path_buf()));
    }
    if files.is_empty() {
        return Err(GalleryError::NoImageFiles(dir.to_path_buf()));
    }
    files.sort();

    let mut gallery = Gallery::default();
    for path in files {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let label = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let image = match image::open(&path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                let skipped = SkippedImage { file_name, reason: SkipReason::Unreadable(e.to_string()) };
                tracing::warn!("{skipped}");
                gallery.skipped.push(skipped);
                continue;
            }
        };

        match encoder.encode_faces(&image)?.into_iter().next() {
            Some(embedding) => {
                tracing::debug!(%label, file = %file_name, "loaded reference identity");
                gallery.identities.push(ReferenceIdentity { label, embedding });
            }
            None => {
                let skipped = SkippedImage { file_name, reason: SkipReason::NoFace };
                tracing::warn!("{skipped}");
                gallery.skipped.push(skipped);
            }
        }
    }

    if gallery.identities.is_empty() {
        return Err(GalleryError::NoUsableFaces {
            dir: dir.to_path_buf(),
            skipped: gallery.skipped,
        });
    }

    tracing::info!(
        dir = %dir.display(),
        identities = gallery.identities.len(),
        skipped = gallery.skipped.len(),
        "reference gallery loaded"
    );
    Ok(gallery)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Embedding;
    use image::{Rgb, RgbImage};

    /// Treats an all-black image as face-less; otherwise embeds the top-left colour.
    struct ColourEncoder;

    impl FaceEncoder for ColourEncoder {
        fn encode_faces(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, EncodeError> {
            let p = image.get_pixel(0, 0).0;
            if p == [0, 0, 0] {
                return Ok(Vec::new());
            }
            Ok(vec![Embedding::new(p.iter().map(|&c| c as f32).collect())])
        }
    }

    fn write_image(dir: &Path, name: &str, colour: [u8; 3]) {
        RgbImage::from_pixel(8, 8, Rgb(colour)).save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_loads_one_identity_per_face() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "bob.png", [0, 255, 0]);
        write_image(dir.path(), "alice.png", [255, 0, 0]);
        write_image(dir.path(), "nobody.png", [0, 0, 0]);

        let gallery = load_gallery(dir.path(), &mut ColourEncoder).unwrap();

        assert_eq!(gallery.len(), 2);
        let labels: Vec<&str> = gallery.identities().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["alice", "bob"]);
        assert_eq!(
            gallery.skipped(),
            &[SkippedImage { file_name: "nobody.png".into(), reason: SkipReason::NoFace }]
        );
    }

    #[test]
    fn test_ignores_unsupported_files() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "carol.png", [10, 20, 30]);
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("dave.gif"), b"GIF89a").unwrap();

        let gallery = load_gallery(dir.path(), &mut ColourEncoder).unwrap();
        assert_eq!(gallery.len(), 1);
        assert!(gallery.skipped().is_empty());
    }

    #[test]
    fn test_label_is_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "jane.doe.png", [9, 9, 9]);
        let gallery = load_gallery(dir.path(), &mut ColourEncoder).unwrap();
        assert_eq!(gallery.identities()[0].label, "jane.doe");
    }

    #[test]
    fn test_unreadable_image_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
        write_image(dir.path(), "erin.png", [1, 1, 1]);

        let gallery = load_gallery(dir.path(), &mut ColourEncoder).unwrap();
        assert_eq!(gallery.len(), 1);
        assert!(matches!(gallery.skipped()[0].reason, SkipReason::Unreadable(_)));
    }

    #[test]
    fn test_missing_directory() {
        let err = load_gallery(Path::new("/nonexistent/match_images"), &mut ColourEncoder).unwrap_err();
        assert!(matches!(err, GalleryError::DirectoryMissing(_)));
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_gallery(dir.path(), &mut ColourEncoder).unwrap_err();
        assert!(matches!(err, GalleryError::DirectoryEmpty(_)));
    }

    #[test]
    fn test_no_image_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.md"), "# faces").unwrap();
        let err = load_gallery(dir.path(), &mut ColourEncoder).unwrap_err();
        assert!(matches!(err, GalleryError::NoImageFiles(_)));
    }

    #[test]
    fn test_zero_usable_faces() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "a.png", [0, 0, 0]);
        write_image(dir.path(), "b.png", [0, 0, 0]);
        let err = load_gallery(dir.path(), &mut ColourEncoder).unwrap_err();
        let GalleryError::NoUsableFaces { skipped, .. } = &err else {
            panic!("expected NoUsableFaces, got {err:?}");
        };
        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0].to_string(), "No face found in a.png. Skipping this file.");
        assert!(err.to_string().contains("2 file(s) skipped"));
    }
}
