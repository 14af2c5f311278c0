//! Conversions to and from `ndarray` arrays.

use crate::Element;
use crate::errors::{Result, TensorError, shape_err};
use crate::tensor::Tensor;
use ndarray::{ArrayD, ArrayViewD, IxDyn};

impl<T: Element> TryFrom<ArrayD<T>> for Tensor<'static, T> {
    type Error = TensorError;

    fn try_from(array: ArrayD<T>) -> Result<Self> {
        let shape = array.shape().to_vec();
        // iter() walks logical order, so non-standard layouts come out row-major.
        let data: Vec<T> = array.iter().copied().collect();
        Tensor::from_vec(&shape, data)
    }
}

impl<'a, T: Element> Tensor<'a, T> {
    /// Copy into an owned `ndarray` array of the same shape.
    pub fn to_ndarray(&self) -> Result<ArrayD<T>> {
        ArrayD::from_shape_vec(IxDyn(self.shape()), self.to_vec())
            .map_err(|e| shape_err!("ndarray conversion: {}", e))
    }

    /// Run `f` over a zero-copy `ndarray` view of this tensor's elements.
    ///
    /// The read lock is held for the duration of `f`.
    pub fn with_ndarray<R>(&self, f: impl FnOnce(ArrayViewD<'_, T>) -> R) -> Result<R> {
        let guard = self.read();
        let view = ArrayViewD::from_shape(IxDyn(self.shape()), &guard[..])
            .map_err(|e| shape_err!("ndarray view: {}", e))?;
        Ok(f(view))
    }
}
