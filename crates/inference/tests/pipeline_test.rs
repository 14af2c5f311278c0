use inference::backend::CompletionFn;
use inference::processing::{KeypointKind, detection, pose, segmentation};
use inference::{AsyncBackend, BackendError, DetectionParams, Driver, IoInfo, IoSignature, NamedTensor, PoseParams, SegmentationParams};
use preprocess::{BBox, BgrImage, Letterbox, Rect};
use std::collections::HashMap;
use std::thread;
use std::time::Duration;
use tensor::Tensor;

/// Backend that answers every run with a fixed detection tensor on a worker thread.
struct CannedBackend {
    signature: IoSignature,
    rows: Vec<f32>,
}

impl AsyncBackend for CannedBackend {
    fn io_signature(&self) -> &IoSignature {
        &self.signature
    }

    fn submit(
        &self,
        inputs: Vec<NamedTensor>,
        _output_names: Vec<String>,
        on_complete: CompletionFn,
    ) -> Result<(), BackendError> {
        let batch = inputs[0].tensor.shape()[0];
        let rows = self.rows.clone();
        thread::spawn(move || {
            let width = 6;
            let per_image = rows.len() / width;
            let data: Vec<f32> = (0..batch).flat_map(|_| rows.iter().copied()).collect();
            let result = Tensor::from_vec(&[batch, per_image, width], data)
                .map(|t| vec![NamedTensor::new("output0", t)])
                .map_err(|e| BackendError::Execution(e.to_string()));
            on_complete(result);
        });
        Ok(())
    }
}

#[test]
fn test_single_detection_end_to_end() {
    let preds = Tensor::from_vec(&[1, 1, 6], vec![10.0, 10.0, 4.0, 4.0, 0.9, 0.99]).unwrap();
    let out = detection::decode(&preds, &[Letterbox::identity(640, 640)], 0, &DetectionParams::default());

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].len(), 1);
    assert_eq!(out[0][0].bbox, Rect::new(8, 8, 4, 4));
    assert_eq!(out[0][0].class_id, 0);
    assert!((out[0][0].confidence - 0.891).abs() < 1e-5);
}

#[test]
fn test_driver_to_decoder_restores_original_coordinates() {
    // Box centred in the 640x640 input, 200 wide, on a 1280x720 source image.
    let backend = CannedBackend {
        signature: IoSignature {
            inputs: vec![IoInfo::new("images", &[1, 3, 640, 640])],
            outputs: vec![IoInfo::new("output0", &[1, -1, 6])],
        },
        rows: vec![320.0, 320.0, 200.0, 100.0, 0.8, 0.9],
    };
    let driver = Driver::new(backend, true);
    let image = BgrImage::filled(1280, 720, [10, 20, 30]).unwrap();

    driver
        .exec_images(HashMap::from([("images".to_string(), vec![image])]), None)
        .unwrap();
    let completion = driver.completions().recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(!driver.is_running());

    let preds = completion.output("output0").unwrap();
    let out = detection::decode(preds, completion.letterboxes_for("images"), 0, &DetectionParams::default());

    // scale 0.5, pad (0, 140): (220, 270)-(420, 370) maps to (440, 260)-(840, 460)
    assert_eq!(out[0][0].bbox, Rect::new(440, 260, 400, 200));
    assert_eq!(out[0][0].input_box, BBox::new(220.0, 270.0, 200.0, 100.0));
}

#[test]
fn test_nms_keeps_best_of_overlapping_pair() {
    let preds = Tensor::from_vec(
        &[1, 3, 7],
        vec![
            100.0, 100.0, 50.0, 50.0, 1.0, 0.6, 0.1, // row 0
            102.0, 101.0, 50.0, 50.0, 1.0, 0.9, 0.1, // row 1 overlaps row 0
            400.0, 400.0, 50.0, 50.0, 1.0, 0.1, 0.7, // row 2 elsewhere
        ],
    )
    .unwrap();
    let out = detection::decode(&preds, &[Letterbox::identity(640, 640)], 0, &DetectionParams::default());

    let kept: Vec<(usize, usize)> = out[0].iter().map(|d| (d.source_index, d.class_id)).collect();
    assert_eq!(kept, vec![(1, 0), (2, 1)]);
}

#[test]
fn test_raising_nms_threshold_keeps_both() {
    let preds = Tensor::from_vec(
        &[1, 2, 6],
        vec![100.0, 100.0, 50.0, 50.0, 1.0, 0.6, 102.0, 101.0, 50.0, 50.0, 1.0, 0.9],
    )
    .unwrap();
    let params = DetectionParams {
        nms_threshold: 0.95,
        ..DetectionParams::default()
    };
    let out = detection::decode(&preds, &[Letterbox::identity(640, 640)], 0, &params);
    assert_eq!(out[0].len(), 2);
    assert!(out[0][0].confidence >= out[0][1].confidence, "Sorted by confidence");
}

#[test]
fn test_masks_match_restored_box_size() {
    // 2 prototype channels on a 16x16 grid for a 64x64 input; original image is 128x128.
    let letterbox = Letterbox::new(128, 128, 64, 64);
    let preds = Tensor::from_vec(
        &[1, 2, 8],
        vec![
            16.0, 16.0, 16.0, 8.0, 1.0, 0.9, 1.0, 0.0, // small box, first prototype
            48.0, 40.0, 20.0, 30.0, 1.0, 0.8, 0.0, -1.0, // second box, negated second prototype
        ],
    )
    .unwrap();
    let protos = Tensor::from_vec(
        &[1, 2, 16, 16],
        [vec![2.0; 256], vec![-2.0; 256]].concat(),
    )
    .unwrap();

    let out = segmentation::decode(&preds, &protos, &[letterbox], &SegmentationParams::default());
    assert_eq!(out[0].len(), 2);

    for result in &out[0] {
        let bbox = result.detection.bbox;
        assert_eq!(result.mask.width() as i32, bbox.width);
        assert_eq!(result.mask.height() as i32, bbox.height);
        assert_eq!(result.mask.data().len(), (bbox.width * bbox.height) as usize);
        assert_eq!(result.mask.count(), result.mask.data().len(), "Both logits are positive");
    }
    assert_eq!(out[0][0].detection.bbox, Rect::new(16, 24, 32, 16));
    assert_eq!(out[0][1].detection.bbox, Rect::new(76, 50, 40, 60));
}

#[test]
fn test_pose_objectness_boundary() {
    let mut rows = Vec::new();
    for objectness in [0.49f32, 0.5] {
        rows.extend([10.0, 10.0, 60.0, 90.0, objectness, 0.0]);
        for k in 0..17 {
            rows.extend([20.0 + k as f32, 30.0, 0.9]);
        }
    }
    let preds = Tensor::from_vec(&[2, pose::POSE_ROW_WIDTH], rows).unwrap();
    let out = pose::decode(&preds, &Letterbox::identity(640, 640), &PoseParams::default());

    assert_eq!(out.len(), 1, "0.49 is dropped and 0.5 is kept");
    assert_eq!(out[0].source_index, 1);
    assert_eq!(out[0].bbox, Rect::new(10, 10, 50, 80));
    assert!(out[0].keypoint(KeypointKind::LeftWrist).visible);
    assert_eq!(out[0].visible_limbs().count(), 17);
}
