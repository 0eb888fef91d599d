//! Batched matrix multiplication.
//!
//! The operands are broadcast down to their trailing matrices with kernel rank 2 and each
//! pair of matrices goes through one of three rank-2 kernels chosen statically by the
//! transpose flags. None of them materializes a transposed copy.

use std::ops::Rem;

use super::broadcast::for_each_block;
use super::shape::{
    Broadcast, BroadcastTo, Dims, Fits, MatKernel, MatMulShape, Matrix, Shape,
};
use super::Tensor;
use crate::backend::Float;

/// Width of the column tiles in the no-transpose and transpose-A kernels.
const TILE: usize = 16;

/// `out[0..k] = Σ_j a[j * stride] · b[j, 0..k]` with `b` a row-major `[j, k]` block.
///
/// The columns are processed in tiles of [`TILE`] so the inner accumulation runs over a
/// short fixed-width slice.
fn vec_mat<T: Float>(out: &mut [T], a: &[T], stride: usize, b: &[T], j: usize, k: usize) {
    let mut k0 = 0;
    while k0 < k {
        let k1 = (k0 + TILE).min(k);
        let tile = &mut out[k0..k1];
        tile.fill(T::zero());
        for jj in 0..j {
            let aj = a[jj * stride];
            let row = &b[jj * k + k0..jj * k + k1];
            for (o, &bv) in tile.iter_mut().zip(row) {
                *o += aj * bv;
            }
        }
        k0 = k1;
    }
}

/// `out[I, K] = a[I, J] · b[J, K]`.
fn kernel_nn<T: Float>(out: &mut [T], a: &[T], b: &[T], i: usize, j: usize, k: usize) {
    for ii in 0..i {
        vec_mat(&mut out[ii * k..(ii + 1) * k], &a[ii * j..], 1, b, j, k);
    }
}

/// `out[I, K] = a[J, I]ᵀ · b[J, K]`, reading column `ii` of `a` with stride `I`.
fn kernel_tn<T: Float>(out: &mut [T], a: &[T], b: &[T], i: usize, j: usize, k: usize) {
    for ii in 0..i {
        vec_mat(&mut out[ii * k..(ii + 1) * k], &a[ii..], i, b, j, k);
    }
}

/// `out[I, K] = a[I, J] · b[K, J]ᵀ`, a dot product of rows.
fn kernel_nt<T: Float>(out: &mut [T], a: &[T], b: &[T], i: usize, j: usize, k: usize) {
    for ii in 0..i {
        let arow = &a[ii * j..(ii + 1) * j];
        for kk in 0..k {
            let brow = &b[kk * j..(kk + 1) * j];
            out[ii * k + kk] = arow.iter().zip(brow).map(|(&x, &y)| x * y).sum();
        }
    }
}

/// Batched matrix product with static transpose flags.
///
/// `TA` reads `a`'s trailing matrix as transposed, `TB` the same for `b`. Batch axes
/// broadcast like elementwise operands and the result takes the batch axes of the
/// higher-rank operand (the left one on a tie).
pub fn mat_mul<const TA: bool, const TB: bool, T, L, R>(
    a: &Tensor<T, L>,
    b: &Tensor<T, R>,
) -> Tensor<T, <L as MatMulShape<R, TA, TB>>::Output>
where
    T: Float,
    L: Matrix + Broadcast<R> + MatMulShape<R, TA, TB>,
    R: Matrix,
    L::Trailing: MatKernel<R::Trailing, TA, TB>,
{
    let () = Fits::<<L as Broadcast<R>>::Output, L>::CHECK_BATCH;
    let () = Fits::<<L as Broadcast<R>>::Output, R>::CHECK_BATCH;
    product_blocks::<TA, TB, T, L, R, <L as MatMulShape<R, TA, TB>>::Output>(a, b)
}

/// Batched matrix product into an explicitly named result shape.
///
/// The batch axes of `O` must be exactly the broadcast of the operands' batch axes. Unlike
/// [`mat_mul`] this accepts equal-rank operands whose batch extents are 1 on the left and
/// larger on the right, e.g. `[1, I, J] · [B, J, K] → [B, I, K]`.
pub fn mat_mul_into<const TA: bool, const TB: bool, T, L, R, O>(
    a: &Tensor<T, L>,
    b: &Tensor<T, R>,
) -> Tensor<T, O>
where
    T: Float,
    L: Matrix,
    R: Matrix,
    L::Trailing: MatKernel<R::Trailing, TA, TB>,
    O: Matrix<Trailing = <L::Trailing as MatKernel<R::Trailing, TA, TB>>::Output>,
{
    let () = BroadcastTo::<O, L, R>::CHECK_BATCH;
    product_blocks::<TA, TB, T, L, R, O>(a, b)
}

/// Runs the kernel selected by the transpose flags over every batch block of `O`.
fn product_blocks<const TA: bool, const TB: bool, T, L, R, O>(
    a: &Tensor<T, L>,
    b: &Tensor<T, R>,
) -> Tensor<T, O>
where
    T: Float,
    L: Matrix,
    R: Matrix,
    L::Trailing: MatKernel<R::Trailing, TA, TB>,
    O: Shape,
{
    let i = <L::Trailing as MatKernel<R::Trailing, TA, TB>>::ROWS;
    let j = <L::Trailing as MatKernel<R::Trailing, TA, TB>>::INNER;
    let k = <L::Trailing as MatKernel<R::Trailing, TA, TB>>::COLS;
    let kernel = match (TA, TB) {
        (false, false) => kernel_nn::<T>,
        (true, false) => kernel_tn::<T>,
        (false, true) => kernel_nt::<T>,
        (true, true) => unreachable!("no kernel transposes both operands"),
    };

    let mut out = Tensor::<T, O>::zeros();
    let (od, ad, bd) = (Dims::of::<O>(), Dims::of::<L>(), Dims::of::<R>());
    let (a_len, b_len, o_len) = (
        <L::Trailing as Shape>::NUMEL,
        <R::Trailing as Shape>::NUMEL,
        i * k,
    );
    let (a_data, b_data) = (a.as_slice(), b.as_slice());
    let out_data = out.as_mut_slice();
    for_each_block(2, od.as_slice(), ad.as_slice(), bd.as_slice(), |o, ia, ib| {
        kernel(
            &mut out_data[o..o + o_len],
            &a_data[ia..ia + a_len],
            &b_data[ib..ib + b_len],
            i,
            j,
            k,
        );
    });
    out
}

/// Gradients of `a · b` with respect to both operands, given the gradient `g` of the
/// product.
///
/// `dA = g · Bᵀ` and `dB = Aᵀ · g` per block. Blocks of an operand that was reused across a
/// broadcast batch axis receive the sum of all their contributions, so the results always
/// have the operands' own shapes.
pub(crate) fn mat_mul_grads<T, L, R, O>(
    g: &Tensor<T, O>,
    a: &Tensor<T, L>,
    b: &Tensor<T, R>,
) -> (Tensor<T, L>, Tensor<T, R>)
where
    T: Float,
    L: Matrix,
    R: Matrix,
    O: Shape,
{
    let (i, j) = (
        <L::Trailing as Shape>::DIMS[0],
        <L::Trailing as Shape>::DIMS[1],
    );
    let k = <R::Trailing as Shape>::DIMS[1];
    let (od, ad, bd) = (Dims::of::<O>(), Dims::of::<L>(), Dims::of::<R>());

    let mut grad_a = Tensor::<T, L>::zeros();
    let mut grad_b = Tensor::<T, R>::zeros();
    let mut block_a = vec![T::zero(); i * j];
    let mut block_b = vec![T::zero(); j * k];
    let (g_data, a_data, b_data) = (g.as_slice(), a.as_slice(), b.as_slice());
    let (ga_data, gb_data) = (grad_a.as_mut_slice(), grad_b.as_mut_slice());
    for_each_block(2, od.as_slice(), ad.as_slice(), bd.as_slice(), |o, ia, ib| {
        let g_blk = &g_data[o..o + i * k];
        kernel_nt(&mut block_a, g_blk, &b_data[ib..ib + j * k], i, k, j);
        kernel_tn(&mut block_b, &a_data[ia..ia + i * j], g_blk, j, i, k);
        for (d, &s) in ga_data[ia..ia + i * j].iter_mut().zip(&block_a) {
            *d += s;
        }
        for (d, &s) in gb_data[ib..ib + j * k].iter_mut().zip(&block_b) {
            *d += s;
        }
    });
    (grad_a, grad_b)
}

impl<T: Float, L: Shape> Tensor<T, L> {
    /// Matrix product `self · rhs` over the trailing two axes.
    pub fn matmul<R>(
        &self,
        rhs: &Tensor<T, R>,
    ) -> Tensor<T, <L as MatMulShape<R, false, false>>::Output>
    where
        L: Matrix + Broadcast<R> + MatMulShape<R, false, false>,
        R: Matrix,
        L::Trailing: MatKernel<R::Trailing, false, false>,
    {
        mat_mul::<false, false, T, L, R>(self, rhs)
    }
}

/// `%` is the matrix product.
impl<'b, T, L, R> Rem<&'b Tensor<T, R>> for &Tensor<T, L>
where
    T: Float,
    L: Matrix + Broadcast<R> + MatMulShape<R, false, false>,
    R: Matrix,
    L::Trailing: MatKernel<R::Trailing, false, false>,
{
    type Output = Tensor<T, <L as MatMulShape<R, false, false>>::Output>;

    fn rem(self, rhs: &'b Tensor<T, R>) -> Self::Output {
        mat_mul::<false, false, T, L, R>(self, rhs)
    }
}

impl<T, L, R> Rem<Tensor<T, R>> for Tensor<T, L>
where
    T: Float,
    L: Matrix + Broadcast<R> + MatMulShape<R, false, false>,
    R: Matrix,
    L::Trailing: MatKernel<R::Trailing, false, false>,
{
    type Output = Tensor<T, <L as MatMulShape<R, false, false>>::Output>;

    fn rem(self, rhs: Tensor<T, R>) -> Self::Output {
        mat_mul::<false, false, T, L, R>(&self, &rhs)
    }
}
