/// Common types and utilities for media authenticity analysis
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Processing errors
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Invalid submission: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Job queue is full")]
    QueueFull,

    #[error("Capability failed to load: {0}")]
    CapabilityLoad(String),

    #[error("Pipeline failure: {0}")]
    Pipeline(String),

    #[error("No video stream found")]
    NoVideoStream,

    #[error("FFmpeg error: {0}")]
    FFmpegError(String),

    #[error("Image processing error: {0}")]
    ImageError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<image::ImageError> for ProcessingError {
    fn from(err: image::ImageError) -> Self {
        ProcessingError::ImageError(err.to_string())
    }
}

/// Result type for processing operations
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Kind of submitted media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// Lifecycle state of an analysis job
///
/// The only legal progression is `Queued -> Processing -> {Done | Error}`.
/// `Done` and `Error` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Job is waiting for a worker
    Queued,
    /// Job is being analyzed
    Processing,
    /// Analysis finished and a result was recorded
    Done,
    /// Analysis failed with a recorded message
    Error,
}

impl JobStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    /// Check whether this state admits no further transitions
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    /// Check whether `next` is reachable from this state in one step
    #[must_use]
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Done)
                | (JobStatus::Processing, JobStatus::Error)
        )
    }
}

/// Verdict label as persisted on results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "AI-generated")]
    AiGenerated,
    #[serde(rename = "Real")]
    Real,
}

impl Label {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::AiGenerated => "AI-generated",
            Label::Real => "Real",
        }
    }
}

/// Classifier verdict derived from a raw probability
///
/// `confidence` is always the probability mass assigned to the winning
/// class, not the raw score, so it lands in [0.5, 1.0] for any input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_deepfake: bool,
    pub label: Label,
    pub confidence: f64,
    pub confidence_percent: f64,
}

impl Verdict {
    /// Derive the verdict from a raw AI-generated probability in [0, 1]
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        let p = probability.clamp(0.0, 1.0);
        let is_deepfake = p > 0.5;
        let confidence = if is_deepfake { p } else { 1.0 - p };
        Self {
            is_deepfake,
            label: if is_deepfake {
                Label::AiGenerated
            } else {
                Label::Real
            },
            confidence,
            confidence_percent: round2(confidence * 100.0),
        }
    }
}

/// Round to two decimal places
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
