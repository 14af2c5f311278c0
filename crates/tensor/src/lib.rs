pub mod errors;
pub mod interop;
pub mod matmul;
pub mod ops;
pub mod shape;
pub mod storage;
pub mod tensor;

pub use errors::{Result, TensorError};
pub use matmul::{Gemm, NaiveGemm, NdarrayGemm};
pub use ops::sigmoid;
pub use shape::Shape;
pub use storage::{ReadGuard, WriteGuard};
pub use tensor::Tensor;

/// Element types a tensor can hold.
pub trait Element: Copy + Default + PartialEq + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Element for T where T: Copy + Default + PartialEq + Send + Sync + std::fmt::Debug + 'static {}
