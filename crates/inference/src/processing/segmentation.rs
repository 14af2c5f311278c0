use super::SegmentationParams;
use super::detection::{self, Detection};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};
use preprocess::Letterbox;
use tensor::{Tensor, TensorError};

/// Binary instance mask covering a detection's box in original-image pixels.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Mask {
    pub const FOREGROUND: u8 = 255;

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major bytes, `255` for foreground and `0` for background.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.data[(y * self.width + x) as usize] == Self::FOREGROUND
    }

    /// Number of foreground pixels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v == Self::FOREGROUND).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationResult {
    pub detection: Detection,
    pub mask: Mask,
}

/// Decode detections plus per-instance masks.
///
/// `predictions` is `[batch, candidates, 5 + classes + M]` and `prototypes`
/// is `[batch, M, mask_h, mask_w]`. Each kept detection's coefficients are
/// multiplied with the prototypes, passed through a sigmoid, cropped to the
/// box, resized to the restored box size and thresholded.
#[tracing::instrument(skip_all, fields(predictions = ?predictions.shape(), prototypes = ?prototypes.shape()))]
pub fn decode(
    predictions: &Tensor<'_, f32>,
    prototypes: &Tensor<'_, f32>,
    letterboxes: &[Letterbox],
    params: &SegmentationParams,
) -> Vec<Vec<SegmentationResult>> {
    let (pred_dims, proto_dims) = (predictions.shape(), prototypes.shape());
    if pred_dims.len() != 3 || proto_dims.len() != 4 || pred_dims[0] != proto_dims[0] {
        tracing::warn!(
            ?pred_dims,
            ?proto_dims,
            "Segmentation needs [batch, candidates, width] predictions and [batch, M, h, w] prototypes"
        );
        return Vec::new();
    }
    let mask_channels = proto_dims[1];

    let detections = detection::decode(predictions, letterboxes, mask_channels, &params.detection);
    let results: Result<Vec<_>, TensorError> = detections
        .into_iter()
        .enumerate()
        .map(|(image, dets)| decode_image(predictions, prototypes, image, dets, &letterboxes[image], params))
        .collect();

    results.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Mask assembly failed");
        Vec::new()
    })
}

fn decode_image(
    predictions: &Tensor<'_, f32>,
    prototypes: &Tensor<'_, f32>,
    image: usize,
    detections: Vec<Detection>,
    letterbox: &Letterbox,
    params: &SegmentationParams,
) -> tensor::Result<Vec<SegmentationResult>> {
    if detections.is_empty() {
        return Ok(Vec::new());
    }
    let proto_dims = prototypes.shape();
    let (mask_channels, mask_h, mask_w) = (proto_dims[1], proto_dims[2], proto_dims[3]);
    let width = predictions.shape()[2];
    let coeff_start = width - mask_channels;

    let coefficients = Tensor::zeros(&[detections.len(), mask_channels])?;
    {
        let rows = predictions.outer(image)?;
        let src = rows.read();
        let mut dst = coefficients.write()?;
        for (i, det) in detections.iter().enumerate() {
            let row = det.source_index * width;
            dst[i * mask_channels..(i + 1) * mask_channels]
                .copy_from_slice(&src[row + coeff_start..row + width]);
        }
    }

    let protos = prototypes.outer(image)?.reshape(&[mask_channels as isize, -1])?;
    let soft = coefficients.matmul(&protos)?;
    soft.sigmoid_inplace()?;
    let soft = soft.reshape(&[detections.len() as isize, mask_h as isize, mask_w as isize])?;

    detections
        .into_iter()
        .enumerate()
        .map(|(i, detection)| {
            let plane = soft.outer(i)?;
            let mask = box_mask(&plane.to_vec(), mask_w, mask_h, &detection, letterbox, params.mask_threshold);
            Ok(SegmentationResult { detection, mask })
        })
        .collect()
}

/// Crop the soft mask to the detection's box and scale it to the restored box size.
fn box_mask(
    soft: &[f32],
    mask_w: usize,
    mask_h: usize,
    detection: &Detection,
    letterbox: &Letterbox,
    threshold: f32,
) -> Mask {
    let (out_w, out_h) = (detection.bbox.width.max(0) as u32, detection.bbox.height.max(0) as u32);
    if out_w == 0 || out_h == 0 || mask_w == 0 || mask_h == 0 {
        return Mask {
            width: out_w,
            height: out_h,
            data: vec![0; (out_w * out_h) as usize],
        };
    }

    let (padded_w, padded_h) = letterbox.padded_size();
    let (sx, sy) = (mask_w as f32 / padded_w as f32, mask_h as f32 / padded_h as f32);
    // Crop only what the clamped, restored box covers; never the padding.
    let region = letterbox.project_box(&detection.bbox);
    let (x0, x1) = mask_span(region.x * sx, region.right() * sx, mask_w);
    let (y0, y1) = mask_span(region.y * sy, region.bottom() * sy, mask_h);

    let Some(plane) = ImageBuffer::<Luma<f32>, Vec<f32>>::from_raw(mask_w as u32, mask_h as u32, soft.to_vec())
    else {
        tracing::warn!(mask_w, mask_h, len = soft.len(), "Mask plane size mismatch");
        return Mask {
            width: out_w,
            height: out_h,
            data: vec![0; (out_w * out_h) as usize],
        };
    };
    let cropped = imageops::crop_imm(&plane, x0, y0, x1 - x0, y1 - y0).to_image();
    let resized = imageops::resize(&cropped, out_w, out_h, FilterType::Triangle);

    Mask {
        width: out_w,
        height: out_h,
        data: resized
            .pixels()
            .map(|p| if p.0[0] >= threshold { Mask::FOREGROUND } else { 0 })
            .collect(),
    }
}

/// Integer pixel span `[start, end)` covering `[lo, hi]`, clamped to `size` and at least one pixel wide.
fn mask_span(lo: f32, hi: f32, size: usize) -> (u32, u32) {
    let size = size as u32;
    let start = (lo.floor().max(0.0) as u32).min(size - 1);
    let end = (hi.ceil().max(0.0) as u32).clamp(start + 1, size);
    (start, end)
}
