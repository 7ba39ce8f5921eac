//! Temporary artifact naming and cleanup
//!
//! Intermediate stage outputs are deterministic derivations of the
//! upload path, colocated with it. Only the upload itself and the
//! generated thumbnail are retained after a job finishes.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

const CROP_SUFFIX: &str = "_face_cropped";
const AUGMENT_SUFFIX: &str = "_aug";

/// Paths of the two temporary files a video job produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoArtifacts {
    /// Stage 1 output: the face-cropped video
    pub cropped: PathBuf,
    /// Stage 2 output: the augmented video
    pub augmented: PathBuf,
}

impl VideoArtifacts {
    /// Derive the artifact paths for an upload
    #[must_use]
    pub fn for_upload(upload_path: &Path) -> Self {
        Self {
            cropped: with_suffix(upload_path, CROP_SUFFIX),
            augmented: with_suffix(upload_path, AUGMENT_SUFFIX),
        }
    }

    /// Remove whichever intermediate files exist
    ///
    /// Best-effort: deletion failures are logged as warnings and never
    /// escalate.
    pub fn cleanup(&self) {
        remove_artifact(&self.cropped);
        remove_artifact(&self.augmented);
    }
}

/// Thumbnail path for a video upload: `{stem}.jpg` beside the upload
#[must_use]
pub fn thumbnail_path_for(upload_path: &Path) -> PathBuf {
    let stem = upload_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("upload");
    upload_path.with_file_name(format!("{stem}.jpg"))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("upload");
    let name = match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => format!("{stem}{suffix}.{ext}"),
        None => format!("{stem}{suffix}"),
    };
    path.with_file_name(name)
}

fn remove_artifact(path: &Path) {
    if !path.exists() {
        return;
    }
    match std::fs::remove_file(path) {
        Ok(()) => info!(path = %path.display(), "removed temporary artifact"),
        Err(e) => warn!(path = %path.display(), "could not remove temporary artifact: {e}"),
    }
}
