use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Image buffer error: {0}")]
    ImageBuffer(#[from] fast_image_resize::ImageBufferError),

    #[error("Resize error: {0}")]
    Resize(#[from] fast_image_resize::ResizeError),

    #[error("Tensor error: {0}")]
    Tensor(#[from] tensor::TensorError),
}

pub type Result<T> = std::result::Result<T, PreprocessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_formatting() {
        let err = PreprocessError::InvalidImage("0x0".to_string());
        assert_eq!(err.to_string(), "Invalid image: 0x0");

        let err: PreprocessError = tensor::TensorError::ReadOnly.into();
        assert_eq!(
            err.to_string(),
            "Tensor error: Tensor is a read-only view",
            "Tensor errors should convert via From"
        );
    }
}
