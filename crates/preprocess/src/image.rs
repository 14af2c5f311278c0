use crate::errors::{PreprocessError, Result};

/// Interleaved 8-bit BGR pixels, row-major, no row padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgrImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl BgrImage {
    pub const CHANNELS: usize = 3;

    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PreprocessError::InvalidImage(format!(
                "zero-sized image {}x{}",
                width, height
            )));
        }
        let expected = width as usize * height as usize * Self::CHANNELS;
        if data.len() != expected {
            return Err(PreprocessError::InvalidImage(format!(
                "buffer size mismatch: expected {} bytes for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Image filled with a single BGR colour.
    pub fn filled(width: u32, height: u32, bgr: [u8; 3]) -> Result<Self> {
        let pixels = width as usize * height as usize;
        Self::new(width, height, bgr.repeat(pixels))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }
}
