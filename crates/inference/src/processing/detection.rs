use super::DetectionParams;
use super::nms::non_max_suppression;
use preprocess::{BBox, Letterbox, Rect};
use tensor::Tensor;

/// Number of leading row entries before the class scores: `cx, cy, w, h, objectness`.
pub const BOX_FIELDS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Box in original-image pixels.
    pub bbox: Rect,
    /// Box in model input coordinates, before letterbox restoration.
    pub input_box: BBox,
    pub class_id: usize,
    /// Class score times objectness.
    pub confidence: f32,
    /// Row of the candidate in the prediction tensor.
    pub source_index: usize,
}

/// Decode a `[batch, candidates, 5 + classes + mask_channels]` prediction tensor.
///
/// Rows are `cx, cy, w, h, objectness, class scores..., mask coefficients...`.
/// Returns one list per image, sorted by confidence with overlaps suppressed
/// and boxes restored through the image's letterbox. A malformed tensor or
/// too few letterboxes yields an empty outer list.
#[tracing::instrument(skip_all, fields(shape = ?predictions.shape()))]
pub fn decode(
    predictions: &Tensor<'_, f32>,
    letterboxes: &[Letterbox],
    mask_channels: usize,
    params: &DetectionParams,
) -> Vec<Vec<Detection>> {
    let dims = predictions.shape();
    if dims.len() != 3 || dims[2] <= BOX_FIELDS + mask_channels {
        tracing::warn!(
            ?dims,
            mask_channels,
            "Prediction tensor must be [batch, candidates, 5 + classes + mask channels]"
        );
        return Vec::new();
    }
    let (batch, candidates, width) = (dims[0], dims[1], dims[2]);
    if letterboxes.len() < batch {
        tracing::warn!(batch, letterboxes = letterboxes.len(), "Missing letterbox per image");
        return Vec::new();
    }
    let classes = width - BOX_FIELDS - mask_channels;

    let data = predictions.read();
    let results: Vec<Vec<Detection>> = data
        .chunks_exact(candidates * width)
        .zip(letterboxes)
        .map(|(rows, letterbox)| {
            let mut kept: Vec<Detection> = rows
                .chunks_exact(width)
                .enumerate()
                .filter_map(|(index, row)| candidate(row, index, classes, params.confidence_threshold))
                .collect();
            non_max_suppression(&mut kept, params.nms_threshold);
            for det in &mut kept {
                det.bbox = letterbox.restore_box(&det.input_box);
            }
            kept
        })
        .collect();

    tracing::debug!(
        detections = results.iter().map(Vec::len).sum::<usize>(),
        "Decoded detections"
    );
    results
}

fn candidate(row: &[f32], index: usize, classes: usize, threshold: f32) -> Option<Detection> {
    let scores = &row[BOX_FIELDS..BOX_FIELDS + classes];
    let (class_id, best) = scores
        .iter()
        .enumerate()
        .fold((0, scores[0]), |(id, best), (i, &s)| if s > best { (i, s) } else { (id, best) });

    let confidence = best * row[4];
    if confidence.is_nan() || confidence < threshold {
        return None;
    }
    let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
    if cx < 0.0 || cy < 0.0 || w < 0.0 || h < 0.0 {
        return None;
    }

    Some(Detection {
        bbox: Rect::default(),
        input_box: BBox::from_center(cx, cy, w, h),
        class_id,
        confidence,
        source_index: index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predictions(batch: usize, rows: &[&[f32]]) -> Tensor<'static, f32> {
        let width = rows[0].len();
        let data: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Tensor::from_vec(&[batch, rows.len() / batch, width], data).unwrap()
    }

    #[test]
    fn test_single_candidate_identity_letterbox() {
        let preds = predictions(1, &[&[10.0, 10.0, 4.0, 4.0, 0.9, 0.99]]);
        let out = decode(&preds, &[Letterbox::identity(640, 640)], 0, &DetectionParams::default());

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), 1);
        let det = &out[0][0];
        assert_eq!(det.bbox, Rect::new(8, 8, 4, 4));
        assert_eq!(det.class_id, 0);
        assert!((det.confidence - 0.891).abs() < 1e-5);
    }

    #[test]
    fn test_argmax_first_max_wins() {
        let preds = predictions(1, &[&[50.0, 50.0, 10.0, 10.0, 1.0, 0.2, 0.7, 0.7]]);
        let out = decode(&preds, &[Letterbox::identity(640, 640)], 0, &DetectionParams::default());
        assert_eq!(out[0][0].class_id, 1);
    }

    #[test]
    fn test_confidence_equal_to_threshold_is_kept() {
        let preds = predictions(1, &[&[50.0, 50.0, 10.0, 10.0, 1.0, 0.5]]);
        let params = DetectionParams {
            confidence_threshold: 0.5,
            ..DetectionParams::default()
        };
        let out = decode(&preds, &[Letterbox::identity(640, 640)], 0, &params);
        assert_eq!(out[0].len(), 1);
    }

    #[test]
    fn test_negative_geometry_rejected() {
        let preds = predictions(
            1,
            &[
                &[-1.0, 50.0, 10.0, 10.0, 1.0, 0.9],
                &[50.0, 50.0, -10.0, 10.0, 1.0, 0.9],
                &[50.0, 50.0, 10.0, 10.0, 1.0, 0.9],
            ],
        );
        let out = decode(&preds, &[Letterbox::identity(640, 640)], 0, &DetectionParams::default());
        assert_eq!(out[0].len(), 1);
        assert_eq!(out[0][0].source_index, 2);
    }

    #[test]
    fn test_batch_uses_per_image_letterbox() {
        let preds = predictions(
            2,
            &[&[320.0, 320.0, 100.0, 100.0, 1.0, 0.9], &[320.0, 320.0, 100.0, 100.0, 1.0, 0.9]],
        );
        let boxes = [Letterbox::identity(640, 640), Letterbox::new(1280, 720, 640, 640)];
        let out = decode(&preds, &boxes, 0, &DetectionParams::default());

        assert_eq!(out.len(), 2);
        assert_eq!(out[0][0].bbox, Rect::new(270, 270, 100, 100));
        // scale 0.5, pad (0, 140): x (270 / 0.5), y ((270 - 140) / 0.5)
        assert_eq!(out[1][0].bbox, Rect::new(540, 260, 200, 200));
    }

    #[test]
    fn test_mask_channels_excluded_from_scores() {
        // Second "score" is actually a mask coefficient and must not win argmax.
        let preds = predictions(1, &[&[50.0, 50.0, 10.0, 10.0, 1.0, 0.6, 9.0]]);
        let out = decode(&preds, &[Letterbox::identity(640, 640)], 1, &DetectionParams::default());
        assert_eq!(out[0][0].class_id, 0);
        assert!((out[0][0].confidence - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_malformed_inputs_yield_empty() {
        let params = DetectionParams::default();
        let boxes = [Letterbox::identity(640, 640)];

        let rank2 = Tensor::from_vec(&[1, 6], vec![0.0; 6]).unwrap();
        assert!(decode(&rank2, &boxes, 0, &params).is_empty());

        let narrow = Tensor::from_vec(&[1, 1, 5], vec![0.0; 5]).unwrap();
        assert!(decode(&narrow, &boxes, 0, &params).is_empty());

        let preds = predictions(1, &[&[50.0, 50.0, 10.0, 10.0, 1.0, 0.9, 0.1]]);
        assert!(decode(&preds, &boxes, 2, &params).is_empty(), "No room for class scores");
        assert!(decode(&preds, &[], 0, &params).is_empty(), "Missing letterbox");

        assert!(decode(&Tensor::absent(), &boxes, 0, &params).is_empty());
    }
}
