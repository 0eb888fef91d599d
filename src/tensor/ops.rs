//! Elementwise arithmetic, unary math and reductions on [`Tensor`].
//!
//! Binary operators return the shape [`Broadcast`] selects for the operand pair, so a
//! non-broadcastable pair fails to build. Compound assignment keeps the left shape and walks
//! the joint broadcast of both operands: a larger right operand folds into the left one.

use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use super::shape::{Broadcast, ReduceLast, Shape};
use super::{Binary, Tensor, Value};
use crate::backend::{Float, kernel_exp, kernel_ln, kernel_sigmoid, kernel_tanh};

macro_rules! impl_tensor_binary {
    ($trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident, $op:tt) => {
        impl<'b, T: Float, L: Shape + Broadcast<R>, R: Shape> $trait<&'b Tensor<T, R>>
            for &Tensor<T, L>
        {
            type Output = Tensor<T, <L as Broadcast<R>>::Output>;

            fn $method(self, rhs: &'b Tensor<T, R>) -> Self::Output {
                self.zip(rhs, |a, b| a $op b)
            }
        }

        impl<T: Float, L: Shape + Broadcast<R>, R: Shape> $trait<Tensor<T, R>> for Tensor<T, L> {
            type Output = Tensor<T, <L as Broadcast<R>>::Output>;

            fn $method(self, rhs: Tensor<T, R>) -> Self::Output {
                self.zip(&rhs, |a, b| a $op b)
            }
        }

        impl<'b, T: Float, L: Shape + Broadcast<R>, R: Shape> $trait<&'b Tensor<T, R>>
            for Tensor<T, L>
        {
            type Output = Tensor<T, <L as Broadcast<R>>::Output>;

            fn $method(self, rhs: &'b Tensor<T, R>) -> Self::Output {
                self.zip(rhs, |a, b| a $op b)
            }
        }

        impl<T: Float, L: Shape + Broadcast<R>, R: Shape> $trait<Tensor<T, R>> for &Tensor<T, L> {
            type Output = Tensor<T, <L as Broadcast<R>>::Output>;

            fn $method(self, rhs: Tensor<T, R>) -> Self::Output {
                self.zip(&rhs, |a, b| a $op b)
            }
        }

        impl<'b, T: Float, L: Shape, R: Shape> $assign_trait<&'b Tensor<T, R>> for Tensor<T, L> {
            fn $assign_method(&mut self, rhs: &'b Tensor<T, R>) {
                self.zip_assign(rhs, |a, b| a $op b);
            }
        }

        impl<T: Float, L: Shape, R: Shape> $assign_trait<Tensor<T, R>> for Tensor<T, L> {
            fn $assign_method(&mut self, rhs: Tensor<T, R>) {
                self.zip_assign(&rhs, |a, b| a $op b);
            }
        }
    };
}

impl_tensor_binary!(Add, add, AddAssign, add_assign, +);
impl_tensor_binary!(Sub, sub, SubAssign, sub_assign, -);
impl_tensor_binary!(Mul, mul, MulAssign, mul_assign, *);
impl_tensor_binary!(Div, div, DivAssign, div_assign, /);

macro_rules! impl_scalar_binary_ops {
    (
        $t:ty => $((
            $trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident, $op:tt
        )),*
    ) => {
        $(
            impl<S: Shape> $trait<$t> for &Tensor<$t, S> {
                type Output = Tensor<$t, S>;

                fn $method(self, rhs: $t) -> Tensor<$t, S> {
                    self.map(|a| a $op rhs)
                }
            }

            impl<S: Shape> $trait<$t> for Tensor<$t, S> {
                type Output = Tensor<$t, S>;

                fn $method(mut self, rhs: $t) -> Tensor<$t, S> {
                    self.apply(|a| a $op rhs);
                    self
                }
            }

            impl<S: Shape> $trait<&Tensor<$t, S>> for $t {
                type Output = Tensor<$t, S>;

                fn $method(self, rhs: &Tensor<$t, S>) -> Tensor<$t, S> {
                    rhs.map(|b| self $op b)
                }
            }

            impl<S: Shape> $trait<Tensor<$t, S>> for $t {
                type Output = Tensor<$t, S>;

                fn $method(self, mut rhs: Tensor<$t, S>) -> Tensor<$t, S> {
                    rhs.apply(|b| self $op b);
                    rhs
                }
            }

            impl<S: Shape> $assign_trait<$t> for Tensor<$t, S> {
                fn $assign_method(&mut self, rhs: $t) {
                    self.apply(|a| a $op rhs);
                }
            }
        )*
    };
}

macro_rules! impl_scalar_ops {
    ($($t:ty),*) => {
        $(
            impl_scalar_binary_ops!($t =>
                (Add, add, AddAssign, add_assign, +),
                (Sub, sub, SubAssign, sub_assign, -),
                (Mul, mul, MulAssign, mul_assign, *),
                (Div, div, DivAssign, div_assign, /)
            );
        )*
    };
}

impl_scalar_ops!(f32, f64);

impl<T: Float, S: Shape> Neg for &Tensor<T, S> {
    type Output = Tensor<T, S>;

    fn neg(self) -> Tensor<T, S> {
        self.map(|a| -a)
    }
}

impl<T: Float, S: Shape> Neg for Tensor<T, S> {
    type Output = Tensor<T, S>;

    fn neg(mut self) -> Tensor<T, S> {
        self.apply(|a| -a);
        self
    }
}

// Unary math. exp, ln, sigmoid and tanh follow the precision mode selected by the
// `fast-math` feature.
impl<T: Float, S: Shape> Tensor<T, S> {
    pub fn exp(&self) -> Self {
        self.map(kernel_exp)
    }

    pub fn ln(&self) -> Self {
        self.map(kernel_ln)
    }

    pub fn sigmoid(&self) -> Self {
        self.map(kernel_sigmoid)
    }

    pub fn tanh(&self) -> Self {
        self.map(kernel_tanh)
    }

    pub fn sqrt(&self) -> Self {
        self.map(T::sqrt)
    }

    pub fn abs(&self) -> Self {
        self.map(T::abs)
    }

    /// Clamps every element into `[lo, hi]` in place.
    pub fn clamp_inplace(&mut self, lo: T, hi: T) -> &mut Self {
        self.apply(|x| x.clamp_to(lo, hi))
    }

    /// Sum of all elements.
    pub fn sum(&self) -> T {
        Value::sum(self)
    }

    /// Largest element.
    pub fn max(&self) -> T {
        Value::max(self)
    }
}

/// Per-row pieces of a numerically stable log-sum-exp over the last axis.
pub(crate) struct RowLogSumExp<T> {
    /// `exp(x - max)` for every element.
    pub shifted_exp: Vec<T>,
    /// `Σ exp(x - max)` per row.
    pub sums: Vec<T>,
    /// `ln(Σ exp(x - max)) + max` per row.
    pub values: Vec<T>,
}

pub(crate) fn row_logsumexp<T: Float>(data: &[T], row_len: usize) -> RowLogSumExp<T> {
    let rows = data.len() / row_len;
    let mut shifted_exp = Vec::with_capacity(data.len());
    let mut sums = Vec::with_capacity(rows);
    let mut values = Vec::with_capacity(rows);
    for row in data.chunks_exact(row_len) {
        let m = row[1..].iter().fold(row[0], |m, &x| m.max(x));
        let start = shifted_exp.len();
        shifted_exp.extend(row.iter().map(|&x| kernel_exp(x - m)));
        let s: T = shifted_exp[start..].iter().copied().sum();
        sums.push(s);
        values.push(kernel_ln(s) + m);
    }
    RowLogSumExp {
        shifted_exp,
        sums,
        values,
    }
}

impl<T: Float, S: ReduceLast> Tensor<T, S> {
    /// `ln Σ exp(x)` along the last axis, which is kept with extent 1.
    pub fn logsumexp(&self) -> Tensor<T, S::Keep> {
        let rows = row_logsumexp(self.as_slice(), S::LAST);
        let mut out = Tensor::<T, S::Keep>::zeros();
        out.as_mut_slice().copy_from_slice(&rows.values);
        out
    }

    /// Softmax along the last axis.
    pub fn softmax(&self) -> Self {
        self.logsumexp_with_softmax().1
    }

    /// `logsumexp` together with the softmax it is the log-normalizer of, from one pass
    /// of exponentials.
    pub(crate) fn logsumexp_with_softmax(&self) -> (Tensor<T, S::Keep>, Self) {
        let rows = row_logsumexp(self.as_slice(), S::LAST);
        let mut lse = Tensor::<T, S::Keep>::zeros();
        lse.as_mut_slice().copy_from_slice(&rows.values);
        let mut soft = Self::zeros();
        for ((o, e), s) in soft
            .as_mut_slice()
            .chunks_exact_mut(S::LAST)
            .zip(rows.shifted_exp.chunks_exact(S::LAST))
            .zip(&rows.sums)
        {
            for (o, &e) in o.iter_mut().zip(e) {
                *o = e / *s;
            }
        }
        (lse, soft)
    }

    /// `x - logsumexp(x)` along the last axis.
    pub fn log_softmax(&self) -> Self {
        let rows = row_logsumexp(self.as_slice(), S::LAST);
        let mut out = self.clone();
        for (row, &lse) in out.as_mut_slice().chunks_exact_mut(S::LAST).zip(&rows.values) {
            for x in row {
                *x -= lse;
            }
        }
        out
    }
}
