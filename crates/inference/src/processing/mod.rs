//! Decoders turning raw model outputs into results in original-image coordinates.
//!
//! Decoders never fail on malformed tensors: they log a warning and return
//! an empty result.

pub mod detection;
pub mod nms;
pub mod pose;
pub mod segmentation;

use crate::config::InferenceConfig;

pub use detection::Detection;
pub use pose::{Keypoint, KeypointKind, PoseResult, SKELETON};
pub use segmentation::{Mask, SegmentationResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    /// Candidates scoring below this are dropped; equal scores are kept.
    pub confidence_threshold: f32,
    /// Lower-scored boxes overlapping a kept box by at least this IoU are suppressed.
    pub nms_threshold: f32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            nms_threshold: 0.2,
        }
    }
}

impl From<&InferenceConfig> for DetectionParams {
    fn from(config: &InferenceConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            nms_threshold: config.nms_threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentationParams {
    pub detection: DetectionParams,
    /// Soft mask values at or above this are foreground.
    pub mask_threshold: f32,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            detection: DetectionParams::default(),
            mask_threshold: 0.5,
        }
    }
}

impl From<&InferenceConfig> for SegmentationParams {
    fn from(config: &InferenceConfig) -> Self {
        Self {
            detection: config.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseParams {
    /// Candidates below this objectness are dropped; equal values are kept.
    pub objectness_threshold: f32,
    /// Keypoints at or above this confidence are flagged visible.
    pub keypoint_threshold: f32,
}

impl Default for PoseParams {
    fn default() -> Self {
        Self {
            objectness_threshold: 0.5,
            keypoint_threshold: 0.5,
        }
    }
}

impl From<&InferenceConfig> for PoseParams {
    fn from(config: &InferenceConfig) -> Self {
        Self {
            keypoint_threshold: config.keypoint_threshold,
            ..Self::default()
        }
    }
}
