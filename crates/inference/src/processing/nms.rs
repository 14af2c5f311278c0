use super::detection::Detection;

/// Greedy class-agnostic non-maximum suppression over `input_box`.
///
/// Sorts by confidence, highest first (ties keep their original order), then
/// keeps each detection unless it overlaps an already kept one with
/// IoU >= `iou_threshold`.
pub fn non_max_suppression(detections: &mut Vec<Detection>, iou_threshold: f32) {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept = 0;
    for index in 0..detections.len() {
        let suppressed = (0..kept).any(|prev| {
            detections[prev].input_box.iou(&detections[index].input_box) >= iou_threshold
        });
        if !suppressed {
            detections.swap(kept, index);
            kept += 1;
        }
    }
    detections.truncate(kept);
}

#[cfg(test)]
mod tests {
    use super::*;
    use preprocess::{BBox, Rect};

    fn det(x: f32, confidence: f32, source_index: usize) -> Detection {
        Detection {
            bbox: Rect::default(),
            input_box: BBox::new(x, 0.0, 10.0, 10.0),
            class_id: 0,
            confidence,
            source_index,
        }
    }

    #[test]
    fn test_overlapping_lower_score_suppressed() {
        // IoU of the first two is 9/11 ≈ 0.82
        let mut dets = vec![det(0.0, 0.8, 0), det(1.0, 0.9, 1), det(50.0, 0.5, 2)];
        non_max_suppression(&mut dets, 0.2);

        let kept: Vec<_> = dets.iter().map(|d| d.source_index).collect();
        assert_eq!(kept, vec![1, 2], "Best box and the disjoint one should survive");
    }

    #[test]
    fn test_iou_equal_to_threshold_suppresses() {
        // x offset 5 on width 10: IoU = 50 / 150 = 1/3
        let mut dets = vec![det(0.0, 0.9, 0), det(5.0, 0.8, 1)];
        non_max_suppression(&mut dets, 1.0 / 3.0);
        assert_eq!(dets.len(), 1);

        let mut dets = vec![det(0.0, 0.9, 0), det(5.0, 0.8, 1)];
        non_max_suppression(&mut dets, 0.34);
        assert_eq!(dets.len(), 2, "IoU below threshold keeps both");
    }

    #[test]
    fn test_ties_keep_original_order() {
        let mut dets = vec![det(0.0, 0.7, 0), det(100.0, 0.7, 1), det(200.0, 0.7, 2)];
        non_max_suppression(&mut dets, 0.5);
        let order: Vec<_> = dets.iter().map(|d| d.source_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_tie_with_overlap_keeps_earlier_row() {
        let mut dets = vec![det(0.0, 0.7, 4), det(0.0, 0.7, 9)];
        non_max_suppression(&mut dets, 0.5);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].source_index, 4);
    }

    #[test]
    fn test_empty_input() {
        let mut dets = Vec::new();
        non_max_suppression(&mut dets, 0.5);
        assert!(dets.is_empty());
    }
}
