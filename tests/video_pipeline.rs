//! Video transform pipeline suite
//!
//! Exercises the three stages over real encoded clips synthesized with
//! the media-io sink, with mock capabilities standing in for the models.

mod common;

use common::{write_test_video, FixedBoxLocalizer, NoFaces, SequenceClassifier};

use veriframe_capabilities::BoundingBox;
use veriframe_common::ProcessingError;
use veriframe_media_io::{probe, read_frames};
use veriframe_pipeline::{
    augment_stage, crop_stage, sample_stage, AugmentConfig, SAMPLE_INTERVAL,
};

fn count_frames(path: &std::path::Path) -> u64 {
    read_frames(path, |_, _| Ok(())).unwrap()
}

#[test]
fn test_sink_round_trip_preserves_frames_and_geometry() {
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.mp4");
    write_test_video(&clip, 30, 64, 64).unwrap();

    let meta = probe(&clip).unwrap();
    assert_eq!((meta.width, meta.height), (64, 64));

    let mut dims_seen = Vec::new();
    let decoded = read_frames(&clip, |_, frame| {
        dims_seen.push(frame.dimensions());
        Ok(())
    })
    .unwrap();
    assert_eq!(decoded, 30);
    assert!(dims_seen.iter().all(|&d| d == (64, 64)));
}

#[test]
fn test_sampling_count_and_mean_aggregation() {
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.mp4");
    write_test_video(&clip, 45, 64, 64).unwrap();

    let decodable = count_frames(&clip);
    let expected_samples = (decodable / SAMPLE_INTERVAL) as usize;
    assert!(expected_samples >= 1, "clip too short for the test");

    let scores: Vec<f32> = (0..expected_samples)
        .map(|i| 0.6 + 0.1 * i as f32)
        .collect();
    let expected_mean =
        scores.iter().map(|&s| f64::from(s)).sum::<f64>() / scores.len() as f64;

    let classifier = SequenceClassifier(scores);
    let (verdict, sampled) = sample_stage(&clip, &classifier).unwrap();

    assert_eq!(sampled, expected_samples);
    assert!(verdict.is_deepfake);
    assert!((verdict.confidence - expected_mean).abs() < 1e-6);
}

#[test]
fn test_short_video_yields_fatal_zero_sample_error() {
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("short.mp4");
    // Fewer frames than one sampling interval
    write_test_video(&clip, 10, 64, 64).unwrap();

    let classifier = SequenceClassifier(Vec::new());
    let result = sample_stage(&clip, &classifier);
    match result {
        Err(ProcessingError::Pipeline(message)) => {
            assert!(!message.is_empty());
        }
        other => panic!("expected a fatal pipeline error, got {other:?}"),
    }
}

#[test]
fn test_crop_stage_preserves_geometry_and_frame_count() {
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.mp4");
    let cropped = dir.path().join("clip_face_cropped.mp4");
    write_test_video(&clip, 30, 64, 64).unwrap();

    let localizer = FixedBoxLocalizer(BoundingBox {
        x1: 0.25,
        y1: 0.25,
        x2: 0.75,
        y2: 0.75,
    });
    let written = crop_stage(&clip, &cropped, &localizer).unwrap();
    assert_eq!(written, count_frames(&clip));

    let meta = probe(&cropped).unwrap();
    assert_eq!((meta.width, meta.height), (64, 64));
    assert_eq!(count_frames(&cropped), written);
}

#[test]
fn test_crop_stage_without_detections_keeps_every_frame() {
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.mp4");
    let cropped = dir.path().join("clip_face_cropped.mp4");
    write_test_video(&clip, 20, 64, 64).unwrap();

    let written = crop_stage(&clip, &cropped, &NoFaces).unwrap();
    assert_eq!(written, 20);
    assert_eq!(count_frames(&cropped), 20);
}

#[test]
fn test_augment_stage_writes_every_frame() {
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.mp4");
    let augmented = dir.path().join("clip_aug.mp4");
    write_test_video(&clip, 30, 64, 64).unwrap();

    let written = augment_stage(&clip, &augmented, 42, &AugmentConfig::default()).unwrap();
    assert_eq!(written, 30);

    let meta = probe(&augmented).unwrap();
    assert_eq!((meta.width, meta.height), (64, 64));
    assert_eq!(count_frames(&augmented), 30);
}

#[test]
fn test_chained_stages_feed_sampling() {
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.mp4");
    let cropped = dir.path().join("clip_face_cropped.mp4");
    let augmented = dir.path().join("clip_aug.mp4");
    write_test_video(&clip, 60, 64, 64).unwrap();

    let localizer = FixedBoxLocalizer(BoundingBox {
        x1: 0.2,
        y1: 0.2,
        x2: 0.8,
        y2: 0.8,
    });
    crop_stage(&clip, &cropped, &localizer).unwrap();
    augment_stage(&cropped, &augmented, 7, &AugmentConfig::default()).unwrap();

    let decodable = count_frames(&augmented);
    let expected_samples = (decodable / SAMPLE_INTERVAL) as usize;
    let classifier = SequenceClassifier(vec![0.9; expected_samples]);

    let (verdict, sampled) = sample_stage(&augmented, &classifier).unwrap();
    assert_eq!(sampled, expected_samples);
    assert!(verdict.is_deepfake);
}
