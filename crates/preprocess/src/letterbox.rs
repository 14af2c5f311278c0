use crate::geometry::{BBox, Point, Rect};

/// Scale and padding used to fit an image into the model input, and its inverse.
///
/// The image is scaled by `min(target_w / w, target_h / h)` and centred; the
/// padding on the left/top is `(target - inside) / 2` and any odd remainder
/// lands on the right/bottom edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    original_width: u32,
    original_height: u32,
    padded_width: u32,
    padded_height: u32,
    inside_width: u32,
    inside_height: u32,
    scale: f32,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    /// Geometry for fitting `original` into `target`. All dimensions must be non-zero.
    pub fn new(original_width: u32, original_height: u32, target_width: u32, target_height: u32) -> Self {
        let original_width = original_width.max(1);
        let original_height = original_height.max(1);
        let target_width = target_width.max(1);
        let target_height = target_height.max(1);

        let scale = (target_width as f32 / original_width as f32)
            .min(target_height as f32 / original_height as f32);
        let inside_width = ((original_width as f32 * scale).round() as u32).clamp(1, target_width);
        let inside_height = ((original_height as f32 * scale).round() as u32).clamp(1, target_height);

        Self {
            original_width,
            original_height,
            padded_width: target_width,
            padded_height: target_height,
            inside_width,
            inside_height,
            scale,
            pad_x: (target_width - inside_width) / 2,
            pad_y: (target_height - inside_height) / 2,
        }
    }

    /// No scaling and no padding: model space equals image space.
    pub fn identity(width: u32, height: u32) -> Self {
        Self::new(width, height, width, height)
    }

    pub fn original_size(&self) -> (u32, u32) {
        (self.original_width, self.original_height)
    }

    pub fn padded_size(&self) -> (u32, u32) {
        (self.padded_width, self.padded_height)
    }

    /// Size of the resized image inside the padded canvas.
    pub fn inside_size(&self) -> (u32, u32) {
        (self.inside_width, self.inside_height)
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn pad(&self) -> (u32, u32) {
        (self.pad_x, self.pad_y)
    }

    /// Map a box from padded model space back onto the original image.
    ///
    /// Corners are restored separately, rounded and clamped, so the result
    /// always lies within the original image.
    pub fn restore_box(&self, bbox: &BBox) -> Rect {
        let x1 = self.restore_x(bbox.x);
        let y1 = self.restore_y(bbox.y);
        let x2 = self.restore_x(bbox.right());
        let y2 = self.restore_y(bbox.bottom());
        Rect::new(x1, y1, (x2 - x1).max(0), (y2 - y1).max(0))
    }

    pub fn restore_point(&self, x: f32, y: f32) -> Point {
        Point::new(self.restore_x(x), self.restore_y(y))
    }

    /// Map an original-image rectangle into padded model space.
    pub fn project_box(&self, rect: &Rect) -> BBox {
        BBox::new(
            rect.x as f32 * self.scale + self.pad_x as f32,
            rect.y as f32 * self.scale + self.pad_y as f32,
            rect.width as f32 * self.scale,
            rect.height as f32 * self.scale,
        )
    }

    pub fn project_point(&self, point: &Point) -> (f32, f32) {
        (
            point.x as f32 * self.scale + self.pad_x as f32,
            point.y as f32 * self.scale + self.pad_y as f32,
        )
    }

    fn restore_x(&self, x: f32) -> i32 {
        restore(x, self.pad_x, self.scale, self.original_width)
    }

    fn restore_y(&self, y: f32) -> i32 {
        restore(y, self.pad_y, self.scale, self.original_height)
    }
}

fn restore(v: f32, pad: u32, scale: f32, limit: u32) -> i32 {
    let restored = ((v - pad as f32) / scale).round();
    restored.clamp(0.0, limit as f32) as i32
}
