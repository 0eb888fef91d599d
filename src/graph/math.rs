//! Composite operations built only from primitives.

use super::operand::Operand;
use super::ops::{logsumexp, sub_into};
use super::unit::Op;
use crate::backend::Float;
use crate::tensor::Tensor;
use crate::tensor::shape::ReduceLast;

/// `a - logsumexp(a)` along the last axis.
///
/// No backward rule of its own: the subtraction propagates into `a` and into the
/// `logsumexp` unit it owns, which then propagates into `a` again. The operand is read
/// twice, so it must be cheap to duplicate: a variable reference, a
/// [`Shared`](super::Shared) handle or a constant.
pub fn log_softmax<'a, T, S, A>(a: A) -> Op<'a, Tensor<T, S>>
where
    T: Float,
    S: ReduceLast,
    A: Operand<Value = Tensor<T, S>> + Clone + 'a,
{
    sub_into(a.clone(), logsumexp(a))
}
