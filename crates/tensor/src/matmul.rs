use crate::errors::{Result, shape_err};
use crate::tensor::Tensor;
use ndarray::linalg::general_mat_mul;
use ndarray::{ArrayView2, ArrayViewMut2};

/// Single-matrix multiply kernel: `c += a × b`.
///
/// `a` is `m × k`, `b` is `k × n`, `c` is `m × n`, all dense row-major.
pub trait Gemm: Send + Sync {
    fn gemm(&self, m: usize, k: usize, n: usize, a: &[f32], b: &[f32], c: &mut [f32]) -> Result<()>;
}

/// Triple loop reference kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct NaiveGemm;

impl Gemm for NaiveGemm {
    fn gemm(&self, m: usize, k: usize, n: usize, a: &[f32], b: &[f32], c: &mut [f32]) -> Result<()> {
        check_lengths(m, k, n, a, b, c)?;
        for i in 0..m {
            for p in 0..k {
                let aip = a[i * k + p];
                let b_row = &b[p * n..(p + 1) * n];
                let c_row = &mut c[i * n..(i + 1) * n];
                for (cj, &bj) in c_row.iter_mut().zip(b_row) {
                    *cj += aip * bj;
                }
            }
        }
        Ok(())
    }
}

/// Kernel backed by `ndarray`'s blocked `general_mat_mul`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NdarrayGemm;

impl Gemm for NdarrayGemm {
    fn gemm(&self, m: usize, k: usize, n: usize, a: &[f32], b: &[f32], c: &mut [f32]) -> Result<()> {
        check_lengths(m, k, n, a, b, c)?;
        let a = ArrayView2::from_shape((m, k), a).map_err(|e| shape_err!("lhs: {}", e))?;
        let b = ArrayView2::from_shape((k, n), b).map_err(|e| shape_err!("rhs: {}", e))?;
        let mut c = ArrayViewMut2::from_shape((m, n), c).map_err(|e| shape_err!("out: {}", e))?;
        general_mat_mul(1.0, &a, &b, 1.0, &mut c);
        Ok(())
    }
}

fn check_lengths(m: usize, k: usize, n: usize, a: &[f32], b: &[f32], c: &[f32]) -> Result<()> {
    if a.len() < m * k || b.len() < k * n || c.len() < m * n {
        return Err(shape_err!(
            "gemm {}x{}x{} given buffers of {}, {}, {}",
            m,
            k,
            n,
            a.len(),
            b.len(),
            c.len()
        ));
    }
    Ok(())
}

impl<'a> Tensor<'a, f32> {
    /// Batched matrix product over the last two axes, using [`NaiveGemm`].
    pub fn matmul(&self, other: &Tensor<'_, f32>) -> Result<Tensor<'static, f32>> {
        self.matmul_with(other, &NaiveGemm)
    }

    /// Batched matrix product over the last two axes.
    ///
    /// Both operands must have the same rank (at least 2) and identical
    /// leading batch dimensions; `self` is `[.., m, k]` and `other` is
    /// `[.., k, n]`. The result is a new `[.., m, n]` tensor.
    pub fn matmul_with(
        &self,
        other: &Tensor<'_, f32>,
        kernel: &dyn Gemm,
    ) -> Result<Tensor<'static, f32>> {
        if self.is_absent() || other.is_absent() {
            return Ok(Tensor::absent());
        }

        let (lhs, rhs) = (self.shape(), other.shape());
        if lhs.len() < 2 || lhs.len() != rhs.len() {
            return Err(shape_err!("matmul needs equal ranks >= 2, got {:?} and {:?}", lhs, rhs));
        }
        let rank = lhs.len();
        if lhs[..rank - 2] != rhs[..rank - 2] {
            return Err(shape_err!("matmul batch dims differ: {:?} vs {:?}", lhs, rhs));
        }
        let (m, k) = (lhs[rank - 2], lhs[rank - 1]);
        let (k2, n) = (rhs[rank - 2], rhs[rank - 1]);
        if k != k2 {
            return Err(shape_err!("matmul inner dims differ: {:?} x {:?}", lhs, rhs));
        }

        let batch: usize = lhs[..rank - 2].iter().product();
        let mut out_shape = lhs[..rank - 2].to_vec();
        out_shape.extend([m, n]);

        let out = Tensor::zeros(&out_shape)?;
        {
            let a = self.read();
            let b = other.read();
            let mut c = out.write()?;
            for i in 0..batch {
                kernel.gemm(
                    m,
                    k,
                    n,
                    &a[i * m * k..(i + 1) * m * k],
                    &b[i * k * n..(i + 1) * k * n],
                    &mut c[i * m * n..(i + 1) * m * n],
                )?;
            }
        }
        tracing::trace!(?out_shape, batch, "matmul");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor(shape: &[usize], data: &[f32]) -> Tensor<'static, f32> {
        Tensor::from_slice(shape, data).unwrap()
    }

    #[test]
    fn test_matmul_2x3_by_3x2() {
        let a = tensor(&[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = tensor(&[3, 2], &[7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);
        let c = a.matmul(&b).unwrap();
        assert_eq!(c.shape(), &[2, 2]);
        assert_eq!(c.to_vec(), vec![58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_kernels_agree() {
        let a = tensor(&[2, 2, 3], &(0..12).map(|v| v as f32).collect::<Vec<_>>());
        let b = tensor(&[2, 3, 4], &(0..24).map(|v| v as f32 * 0.5).collect::<Vec<_>>());
        let naive = a.matmul_with(&b, &NaiveGemm).unwrap();
        let blas = a.matmul_with(&b, &NdarrayGemm).unwrap();
        assert_eq!(naive.shape(), &[2, 2, 4]);
        for (x, y) in naive.to_vec().iter().zip(blas.to_vec()) {
            assert!((x - y).abs() < 1e-4, "{} vs {}", x, y);
        }
    }

    #[test]
    fn test_batched_uses_matching_batch() {
        let a = tensor(&[2, 1, 1], &[2.0, 3.0]);
        let b = tensor(&[2, 1, 1], &[5.0, 7.0]);
        assert_eq!(a.matmul(&b).unwrap().to_vec(), vec![10.0, 21.0]);
    }

    #[test]
    fn test_inner_dim_mismatch() {
        let a = tensor(&[2, 3], &[0.0; 6]);
        let b = tensor(&[2, 2], &[0.0; 4]);
        assert!(a.matmul(&b).is_err());
    }

    #[test]
    fn test_rank_and_batch_mismatch() {
        let v = tensor(&[3], &[0.0; 3]);
        let m = tensor(&[3, 1], &[0.0; 3]);
        assert!(v.matmul(&m).is_err());

        let a = tensor(&[2, 1, 3], &[0.0; 6]);
        let b = tensor(&[3, 3, 1], &[0.0; 9]);
        assert!(a.matmul(&b).is_err());
    }

    #[test]
    fn test_matmul_on_views() {
        let data = [1.0f32, 0.0, 0.0, 1.0, 9.0, 9.0];
        let identity = Tensor::from_view(&[2, 2], &data).unwrap();
        let x = tensor(&[2, 1], &[3.0, 4.0]);
        assert_eq!(identity.matmul(&x).unwrap().to_vec(), vec![3.0, 4.0]);
    }
}
