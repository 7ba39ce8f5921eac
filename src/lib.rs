//! Media authenticity analysis service
//!
//! Facade over the workspace crates: submissions enter through
//! [`service::AnalysisService`], flow through the image or video
//! analysis pipeline, and come back out as persisted results with a
//! verdict and confidence score.

pub use veriframe_capabilities as capabilities;
pub use veriframe_common as common;
pub use veriframe_media_io as media_io;
pub use veriframe_pipeline as pipeline;
pub use veriframe_service as service;
pub use veriframe_storage as storage;
