use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Tensor is a read-only view")]
    ReadOnly,
}

pub type Result<T> = std::result::Result<T, TensorError>;

macro_rules! shape_err {
    ($($arg:tt)*) => {
        $crate::errors::TensorError::Shape(format!($($arg)*))
    };
}

pub(crate) use shape_err;
