//! Authenticity analysis pipeline
//!
//! The two analysis paths over uploaded media:
//!
//! - **Image**: decode, preprocess, classify once ([`analyze_image`]).
//! - **Video**: a strict three-stage chain of file-producing transforms —
//!   face-localized crop ([`crop_stage`]), stochastic augmentation
//!   ([`augment_stage`]) and sampled-frame inference aggregation
//!   ([`sample_stage`]). Each stage reads the previous stage's output
//!   file; the two intermediate files are temporary and removed by
//!   [`VideoArtifacts::cleanup`] on every job exit path.
//!
//! Stage outcomes are plain `Result` values; the job runner owns the
//! single state transition at the task boundary.

mod artifacts;
mod augment;
mod crop;
mod image_path;
mod sample;

pub use artifacts::{thumbnail_path_for, VideoArtifacts};
pub use augment::{augment_frame, augment_stage, AugmentConfig};
pub use crop::{crop_stage, padded_crop_rect, FACE_CROP_PADDING};
pub use image_path::analyze_image;
pub use sample::{aggregate_scores, is_sampled, sample_stage, MODEL_FRAME_SIZE, SAMPLE_INTERVAL};
