pub mod cpu;
pub mod errors;
pub mod geometry;
pub mod image;
pub mod letterbox;

pub use cpu::{DEFAULT_INPUT_SIZE, LETTERBOX_COLOR, Preprocessor, images_to_tensor, letterbox_image};
pub use errors::{PreprocessError, Result};
pub use geometry::{BBox, Point, Rect};
pub use image::BgrImage;
pub use letterbox::Letterbox;
