//! Element-wise arithmetic on `f32` tensors.
//!
//! Out-of-place operations return a fresh owned tensor. The `_inplace`
//! variants write through the receiver's storage, so every view sharing that
//! storage observes the result.

use crate::errors::{Result, shape_err};
use crate::tensor::Tensor;
use std::ops::{Add, Mul};

#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

impl<'a> Tensor<'a, f32> {
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Tensor<'static, f32> {
        if self.is_absent() {
            return Tensor::absent();
        }
        let data: Vec<f32> = self.read().iter().map(|&v| f(v)).collect();
        // Shape was validated when `self` was built.
        Tensor::from_vec(self.shape(), data).unwrap_or_default()
    }

    /// Combine with `other` element-wise. Shapes must be equal; call
    /// [`Tensor::broadcast`] first to combine differently shaped operands.
    pub fn zip_map(
        &self,
        other: &Tensor<'_, f32>,
        f: impl Fn(f32, f32) -> f32,
    ) -> Result<Tensor<'static, f32>> {
        if self.is_absent() {
            return Ok(Tensor::absent());
        }
        let rhs = self.aligned(other)?;
        let lhs = self.read();
        let data: Vec<f32> = lhs.iter().zip(rhs.iter()).map(|(&a, &b)| f(a, b)).collect();
        Tensor::from_vec(self.shape(), data)
    }

    pub fn add_scalar(&self, value: f32) -> Tensor<'static, f32> {
        self.map(|v| v + value)
    }

    pub fn mul_scalar(&self, value: f32) -> Tensor<'static, f32> {
        self.map(|v| v * value)
    }

    /// `x * scale + bias`, the usual normalization step.
    pub fn affine(&self, scale: f32, bias: f32) -> Tensor<'static, f32> {
        self.map(|v| v.mul_add(scale, bias))
    }

    pub fn add(&self, other: &Tensor<'_, f32>) -> Result<Tensor<'static, f32>> {
        self.zip_map(other, |a, b| a + b)
    }

    pub fn mul(&self, other: &Tensor<'_, f32>) -> Result<Tensor<'static, f32>> {
        self.zip_map(other, |a, b| a * b)
    }

    pub fn sigmoid(&self) -> Tensor<'static, f32> {
        self.map(sigmoid)
    }

    pub fn map_inplace(&self, f: impl Fn(f32) -> f32) -> Result<()> {
        for v in self.write()?.iter_mut() {
            *v = f(*v);
        }
        Ok(())
    }

    pub fn zip_map_inplace(
        &self,
        other: &Tensor<'_, f32>,
        f: impl Fn(f32, f32) -> f32,
    ) -> Result<()> {
        if self.is_absent() {
            return Ok(());
        }
        // Copied before locking: `other` may be a view of the same buffer.
        let rhs = self.aligned(other)?;
        let mut lhs = self.write()?;
        for (a, &b) in lhs.iter_mut().zip(rhs.iter()) {
            *a = f(*a, b);
        }
        Ok(())
    }

    pub fn add_scalar_inplace(&self, value: f32) -> Result<()> {
        self.map_inplace(|v| v + value)
    }

    pub fn mul_scalar_inplace(&self, value: f32) -> Result<()> {
        self.map_inplace(|v| v * value)
    }

    pub fn affine_inplace(&self, scale: f32, bias: f32) -> Result<()> {
        self.map_inplace(|v| v.mul_add(scale, bias))
    }

    pub fn add_inplace(&self, other: &Tensor<'_, f32>) -> Result<()> {
        self.zip_map_inplace(other, |a, b| a + b)
    }

    pub fn mul_inplace(&self, other: &Tensor<'_, f32>) -> Result<()> {
        self.zip_map_inplace(other, |a, b| a * b)
    }

    pub fn sigmoid_inplace(&self) -> Result<()> {
        self.map_inplace(sigmoid)
    }

    /// `other`'s elements, provided its shape equals `self`'s.
    fn aligned(&self, other: &Tensor<'_, f32>) -> Result<Vec<f32>> {
        if other.shape() != self.shape() {
            return Err(shape_err!(
                "element-wise operands differ in shape: {:?} vs {:?}",
                self.shape(),
                other.shape()
            ));
        }
        Ok(other.to_vec())
    }
}

impl Add<f32> for &Tensor<'_, f32> {
    type Output = Tensor<'static, f32>;

    fn add(self, rhs: f32) -> Self::Output {
        self.add_scalar(rhs)
    }
}

impl Mul<f32> for &Tensor<'_, f32> {
    type Output = Tensor<'static, f32>;

    fn mul(self, rhs: f32) -> Self::Output {
        self.mul_scalar(rhs)
    }
}
