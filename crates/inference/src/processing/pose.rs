use super::PoseParams;
use preprocess::{BBox, Letterbox, Point, Rect};
use tensor::Tensor;

pub const KEYPOINT_COUNT: usize = 17;

/// `x1, y1, x2, y2, objectness, reserved`, then `x, y, confidence` per keypoint.
pub const POSE_ROW_WIDTH: usize = 6 + 3 * KEYPOINT_COUNT;

const KEYPOINT_OFFSET: usize = 6;

/// Body keypoints in model output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeypointKind {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl KeypointKind {
    pub const ALL: [KeypointKind; KEYPOINT_COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEye => "left_eye",
            Self::RightEye => "right_eye",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
        }
    }
}

/// Limbs joining keypoints, for drawing a skeleton.
pub const SKELETON: [(KeypointKind, KeypointKind); 17] = {
    use KeypointKind::*;
    [
        (LeftEye, RightEye),
        (LeftEye, LeftEar),
        (RightEye, RightEar),
        (LeftEar, LeftShoulder),
        (RightEar, RightShoulder),
        (LeftShoulder, RightShoulder),
        (LeftShoulder, LeftElbow),
        (RightShoulder, RightElbow),
        (LeftElbow, LeftWrist),
        (RightElbow, RightWrist),
        (LeftShoulder, LeftHip),
        (RightShoulder, RightHip),
        (LeftHip, RightHip),
        (LeftHip, LeftKnee),
        (RightHip, RightKnee),
        (LeftKnee, LeftAnkle),
        (RightKnee, RightAnkle),
    ]
};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Keypoint {
    /// Position in original-image pixels.
    pub point: Point,
    pub confidence: f32,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoseResult {
    pub bbox: Rect,
    /// Objectness of the candidate.
    pub confidence: f32,
    pub keypoints: [Keypoint; KEYPOINT_COUNT],
    pub source_index: usize,
}

impl PoseResult {
    pub fn keypoint(&self, kind: KeypointKind) -> &Keypoint {
        &self.keypoints[kind.index()]
    }

    /// Skeleton edges whose endpoints are both visible.
    pub fn visible_limbs(&self) -> impl Iterator<Item = (KeypointKind, KeypointKind)> + '_ {
        SKELETON
            .iter()
            .copied()
            .filter(|&(a, b)| self.keypoint(a).visible && self.keypoint(b).visible)
    }
}

/// Decode a `[candidates, 57]` pose tensor for one image.
///
/// Candidates with a negative corner, inverted corners or objectness below
/// the threshold are skipped. No suppression is applied.
#[tracing::instrument(skip_all, fields(shape = ?predictions.shape()))]
pub fn decode(predictions: &Tensor<'_, f32>, letterbox: &Letterbox, params: &PoseParams) -> Vec<PoseResult> {
    let dims = predictions.shape();
    if dims.len() != 2 || dims[1] != POSE_ROW_WIDTH {
        tracing::warn!(?dims, "Pose tensor must be [candidates, {}]", POSE_ROW_WIDTH);
        return Vec::new();
    }

    let data = predictions.read();
    let results: Vec<PoseResult> = data
        .chunks_exact(POSE_ROW_WIDTH)
        .enumerate()
        .filter_map(|(index, row)| pose(row, index, letterbox, params))
        .collect();

    tracing::debug!(poses = results.len(), "Decoded poses");
    results
}

fn pose(row: &[f32], index: usize, letterbox: &Letterbox, params: &PoseParams) -> Option<PoseResult> {
    let (x1, y1, x2, y2, objectness) = (row[0], row[1], row[2], row[3], row[4]);
    if x1 < 0.0 || y1 < 0.0 || x2 < 0.0 || y2 < 0.0 {
        return None;
    }
    if x2 < x1 || y2 < y1 {
        return None;
    }
    if objectness.is_nan() || objectness < params.objectness_threshold {
        return None;
    }

    let mut keypoints = [Keypoint::default(); KEYPOINT_COUNT];
    for (keypoint, raw) in keypoints
        .iter_mut()
        .zip(row[KEYPOINT_OFFSET..].chunks_exact(3))
    {
        *keypoint = Keypoint {
            point: letterbox.restore_point(raw[0], raw[1]),
            confidence: raw[2],
            visible: raw[2] >= params.keypoint_threshold,
        };
    }

    Some(PoseResult {
        bbox: letterbox.restore_box(&BBox::from_corners(x1, y1, x2, y2)),
        confidence: objectness,
        keypoints,
        source_index: index,
    })
}
