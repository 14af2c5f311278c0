use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use inference::processing::pose::POSE_ROW_WIDTH;
use inference::processing::{detection, pose, segmentation};
use inference::{DetectionParams, PoseParams, SegmentationParams};
use ndarray::{Array, IxDyn};
use preprocess::Letterbox;
use tensor::Tensor;

const CANDIDATES: usize = 8400;
const CLASSES: usize = 80;

/// Mock YOLO output where the first `hits` rows pass the default threshold
/// and are spread out so NMS keeps most of them.
fn mock_predictions(hits: usize, mask_channels: usize) -> Tensor<'static, f32> {
    let width = 5 + CLASSES + mask_channels;
    let array = Array::from_shape_fn(IxDyn(&[1, CANDIDATES, width]), |idx| {
        let (row, col) = (idx[1], idx[2]);
        let hit = row < hits;
        match col {
            0 => 20.0 + (row % 20) as f32 * 30.0,
            1 => 20.0 + (row / 20 % 20) as f32 * 30.0,
            2 | 3 => 24.0,
            4 => if hit { 0.9 } else { 0.05 },
            c if c < 5 + CLASSES => if hit && c - 5 == row % CLASSES { 0.95 } else { 0.01 },
            _ => ((row + col) % 7) as f32 * 0.1 - 0.3,
        }
    });
    Tensor::try_from(array).unwrap()
}

fn benchmark_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("detection_decode");
    let letterboxes = [Letterbox::new(1920, 1080, 640, 640)];
    let params = DetectionParams::default();

    for hits in [0, 20, 100] {
        let preds = mock_predictions(hits, 0);
        group.bench_with_input(BenchmarkId::new("candidates_8400", hits), &preds, |b, preds| {
            b.iter(|| detection::decode(black_box(preds), black_box(&letterboxes), 0, &params));
        });
    }

    group.finish();
}

fn benchmark_segmentation(c: &mut Criterion) {
    let mut group = c.benchmark_group("segmentation_decode");
    group.sample_size(20);
    let letterboxes = [Letterbox::new(1920, 1080, 640, 640)];
    let params = SegmentationParams::default();
    let protos = Tensor::try_from(Array::from_shape_fn(IxDyn(&[1, 32, 160, 160]), |idx| {
        ((idx[1] * 31 + idx[2] * 7 + idx[3]) % 11) as f32 * 0.2 - 1.0
    }))
    .unwrap();

    for hits in [1, 10] {
        let preds = mock_predictions(hits, 32);
        group.bench_with_input(BenchmarkId::new("masks", hits), &preds, |b, preds| {
            b.iter(|| segmentation::decode(black_box(preds), black_box(&protos), &letterboxes, &params));
        });
    }

    group.finish();
}

fn benchmark_pose(c: &mut Criterion) {
    let mut group = c.benchmark_group("pose_decode");
    let letterbox = Letterbox::new(1280, 720, 640, 640);
    let rows = 300;
    let preds = Tensor::try_from(Array::from_shape_fn(IxDyn(&[rows, POSE_ROW_WIDTH]), |idx| {
        match idx[1] {
            0 | 1 => 100.0,
            2 | 3 => 300.0,
            4 => if idx[0] % 2 == 0 { 0.8 } else { 0.2 },
            5 => 0.0,
            c if (c - 6) % 3 == 2 => 0.7,
            _ => 150.0 + idx[1] as f32,
        }
    }))
    .unwrap();

    group.bench_function("rows_300", |b| {
        b.iter(|| pose::decode(black_box(&preds), &letterbox, &PoseParams::default()));
    });

    group.finish();
}

criterion_group!(benches, benchmark_detection, benchmark_segmentation, benchmark_pose);
criterion_main!(benches);
