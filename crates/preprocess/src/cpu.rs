use crate::errors::{PreprocessError, Result};
use crate::image::BgrImage;
use crate::letterbox::Letterbox;
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use tensor::Tensor;

pub const LETTERBOX_COLOR: u8 = 114;
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (640, 640);

/// Letterboxes BGR images into a fixed input size and converts them to planar RGB floats.
///
/// Holds the resizer and the padded canvas so repeated calls do not reallocate.
pub struct Preprocessor {
    input_size: (u32, u32),
    resizer: Resizer,
    letterboxed_buffer: Vec<u8>,
}

impl Preprocessor {
    pub fn new(input_size: (u32, u32)) -> Self {
        Self {
            input_size,
            resizer: Resizer::new(),
            letterboxed_buffer: vec![
                LETTERBOX_COLOR;
                input_size.0 as usize * input_size.1 as usize * BgrImage::CHANNELS
            ],
        }
    }

    pub fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    /// Resize `image` preserving aspect ratio and centre it on a grey canvas.
    ///
    /// Returns the padded BGR canvas (borrowed from the internal buffer) and its geometry.
    pub fn letterbox(&mut self, image: &BgrImage) -> Result<(&[u8], Letterbox)> {
        let _s = span!("letterbox");

        let (target_w, target_h) = self.input_size;
        if target_w == 0 || target_h == 0 {
            return Err(PreprocessError::InvalidImage(format!(
                "zero-sized target {}x{}",
                target_w, target_h
            )));
        }

        let letterbox = Letterbox::new(image.width(), image.height(), target_w, target_h);
        let (inside_w, inside_h) = letterbox.inside_size();
        let (pad_x, pad_y) = letterbox.pad();

        tracing::trace!(
            width = image.width(),
            height = image.height(),
            inside_w,
            inside_h,
            pad_x,
            pad_y,
            "Letterboxing image"
        );

        let src = ImageRef::new(image.width(), image.height(), image.data(), PixelType::U8x3)?;
        let mut resized = Image::new(inside_w, inside_h, PixelType::U8x3);

        self.resizer.resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        self.letterboxed_buffer.fill(LETTERBOX_COLOR);

        let resized_data = resized.buffer();
        let row_bytes = inside_w as usize * BgrImage::CHANNELS;
        let stride = target_w as usize * BgrImage::CHANNELS;

        for y in 0..inside_h as usize {
            let src_row = y * row_bytes;
            let dst_row = (y + pad_y as usize) * stride + pad_x as usize * BgrImage::CHANNELS;

            self.letterboxed_buffer[dst_row..dst_row + row_bytes]
                .copy_from_slice(&resized_data[src_row..src_row + row_bytes]);
        }

        Ok((self.letterboxed_buffer.as_slice(), letterbox))
    }

    /// Letterbox `image` and write it as planar RGB `[3, H, W]` into `dst`.
    ///
    /// With `normalize` the values are divided by 255.
    pub fn preprocess_into(&mut self, image: &BgrImage, dst: &mut [f32], normalize: bool) -> Result<Letterbox> {
        let (width, height) = self.input_size;
        let spatial = width as usize * height as usize;
        if dst.len() != BgrImage::CHANNELS * spatial {
            return Err(PreprocessError::InvalidImage(format!(
                "destination holds {} values, expected {}",
                dst.len(),
                BgrImage::CHANNELS * spatial
            )));
        }

        let (canvas, letterbox) = self.letterbox(image)?;

        let _s = span!("to_planar_rgb");
        let factor = if normalize { 1.0 / 255.0 } else { 1.0 };
        let (r_plane, rest) = dst.split_at_mut(spatial);
        let (g_plane, b_plane) = rest.split_at_mut(spatial);

        for (i, px) in canvas.chunks_exact(BgrImage::CHANNELS).enumerate() {
            b_plane[i] = px[0] as f32 * factor;
            g_plane[i] = px[1] as f32 * factor;
            r_plane[i] = px[2] as f32 * factor;
        }

        Ok(letterbox)
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_SIZE)
    }
}

/// Letterbox `image` into a new `target_width × target_height` BGR image.
pub fn letterbox_image(image: &BgrImage, target_width: u32, target_height: u32) -> Result<(BgrImage, Letterbox)> {
    let mut preprocessor = Preprocessor::new((target_width, target_height));
    let (canvas, letterbox) = preprocessor.letterbox(image)?;
    let padded = BgrImage::new(target_width, target_height, canvas.to_vec())?;
    Ok((padded, letterbox))
}

/// Stage a batch of images as a `[batch, 3, H, W]` float tensor.
///
/// `target` is `(width, height)`. Returns one [`Letterbox`] per image, in order.
pub fn images_to_tensor(
    images: &[BgrImage],
    target: (u32, u32),
    normalize: bool,
) -> Result<(Tensor<'static, f32>, Vec<Letterbox>)> {
    let _s = span!("images_to_tensor");

    if images.is_empty() {
        return Err(PreprocessError::InvalidImage("empty image batch".to_string()));
    }

    let (width, height) = target;
    let batch = Tensor::zeros(&[images.len(), 3, height as usize, width as usize])?;
    let mut preprocessor = Preprocessor::new(target);
    let mut letterboxes = Vec::with_capacity(images.len());

    for (i, image) in images.iter().enumerate() {
        let slot = batch.outer(i)?;
        let mut dst = slot.write()?;
        letterboxes.push(preprocessor.preprocess_into(image, &mut dst, normalize)?);
    }

    tracing::debug!(
        batch = images.len(),
        width,
        height,
        normalize,
        "Staged image batch"
    );

    Ok((batch, letterboxes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letterboxing_preserves_aspect_ratio() {
        let image = BgrImage::filled(800, 600, [128, 128, 128]).unwrap();
        let (padded, letterbox) = letterbox_image(&image, 512, 512).unwrap();

        assert_eq!(letterbox.scale(), 0.64, "Scale should preserve aspect ratio");
        assert_eq!(letterbox.pad(), (0, 64), "Y offset should center vertically");
        assert_eq!((padded.width(), padded.height()), (512, 512));

        assert_eq!(padded.pixel(256, 10), Some([114; 3]), "Top band should be padding");
        assert_eq!(padded.pixel(256, 256), Some([128; 3]), "Centre should be image");
        assert_eq!(padded.pixel(256, 500), Some([114; 3]), "Bottom band should be padding");
    }

    #[test]
    fn test_planar_rgb_channel_order() {
        // A single blue (BGR 255,0,0) pixel stretched to 4x4
        let image = BgrImage::new(1, 1, vec![255, 0, 0]).unwrap();
        let mut preprocessor = Preprocessor::new((4, 4));
        let mut dst = vec![0.0f32; 3 * 16];
        preprocessor.preprocess_into(&image, &mut dst, false).unwrap();

        assert!(dst[..16].iter().all(|&v| v == 0.0), "R plane should be empty");
        assert!(dst[16..32].iter().all(|&v| v == 0.0), "G plane should be empty");
        assert!(dst[32..].iter().all(|&v| v == 255.0), "B plane should be full");
    }

    #[test]
    fn test_normalization_scales_to_unit_range() {
        let image = BgrImage::filled(2, 2, [255, 255, 255]).unwrap();
        let mut preprocessor = Preprocessor::new((2, 2));
        let mut dst = vec![0.0f32; 12];
        preprocessor.preprocess_into(&image, &mut dst, true).unwrap();
        assert!(dst.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_destination_size_checked() {
        let image = BgrImage::filled(2, 2, [0, 0, 0]).unwrap();
        let mut preprocessor = Preprocessor::new((4, 4));
        let mut dst = vec![0.0f32; 10];
        assert!(preprocessor.preprocess_into(&image, &mut dst, true).is_err());
    }

    #[test]
    fn test_images_to_tensor_batches() {
        let images = vec![
            BgrImage::filled(32, 16, [0, 0, 255]).unwrap(),
            BgrImage::filled(16, 32, [255, 0, 0]).unwrap(),
        ];
        let (batch, letterboxes) = images_to_tensor(&images, (32, 32), true).unwrap();

        assert_eq!(batch.shape(), &[2, 3, 32, 32]);
        assert_eq!(letterboxes.len(), 2);
        assert_eq!(letterboxes[0].pad(), (0, 8));
        assert_eq!(letterboxes[1].pad(), (8, 0));

        // First image is red: R plane at the centre is 1.0
        assert!((batch.get(&[0, 0, 16, 16]).unwrap() - 1.0).abs() < 1e-6);
        // Second image is blue: B plane at the centre is 1.0, R plane is 0
        assert!((batch.get(&[1, 2, 16, 16]).unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(batch.get(&[1, 0, 16, 16]).unwrap(), 0.0);
        // Padding is grey
        assert!((batch.get(&[1, 0, 16, 0]).unwrap() - 114.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_batch_rejected() {
        assert!(images_to_tensor(&[], (32, 32), true).is_err());
    }
}
