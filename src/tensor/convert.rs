//! Conversions into and out of [`Tensor`].
//!
//! Nested arrays carry their extents in the type and convert infallibly. Flat vectors and
//! `ndarray` arrays are checked against the target shape at runtime.

use std::marker::PhantomData;

use ndarray::{ArrayD, IxDyn};

use super::shape::{Dim, Shape};
use super::Tensor;
use crate::backend::Float;
use crate::error::TensorError;

impl<T: Float, S: Shape> Tensor<T, S> {
    /// Wraps a row-major buffer. Fails unless it holds exactly `S::NUMEL` elements.
    pub fn from_vec(data: Vec<T>) -> Result<Self, TensorError> {
        if data.len() != S::NUMEL {
            return Err(TensorError::ElementCount {
                shape: Self::dims().as_slice().to_vec(),
                expected: S::NUMEL,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            shape: PhantomData,
        })
    }

    /// Copies an `ndarray` array whose shape must equal `S`.
    pub fn from_ndarray(array: &ArrayD<T>) -> Result<Self, TensorError> {
        let expected = Self::dims();
        if array.shape() != expected.as_slice() {
            return Err(TensorError::ShapeMismatch {
                expected: expected.as_slice().to_vec(),
                actual: array.shape().to_vec(),
            });
        }
        // `iter` walks in logical row-major order regardless of the array's memory layout.
        Ok(Self {
            data: array.iter().copied().collect(),
            shape: PhantomData,
        })
    }

    /// Copies into a dynamically shaped `ndarray` array.
    pub fn to_ndarray(&self) -> ArrayD<T> {
        let dims = Self::dims();
        ArrayD::from_shape_vec(IxDyn(dims.as_slice()), self.data.clone())
            .unwrap_or_else(|_| unreachable!("buffer length always matches the static shape"))
    }
}

impl<T: Float, S: Shape> TryFrom<Vec<T>> for Tensor<T, S> {
    type Error = TensorError;

    fn try_from(data: Vec<T>) -> Result<Self, TensorError> {
        Self::from_vec(data)
    }
}

impl<T: Float, S: Shape> TryFrom<&ArrayD<T>> for Tensor<T, S> {
    type Error = TensorError;

    fn try_from(array: &ArrayD<T>) -> Result<Self, TensorError> {
        Self::from_ndarray(array)
    }
}

impl<T: Float, S: Shape> From<Tensor<T, S>> for ArrayD<T> {
    fn from(tensor: Tensor<T, S>) -> Self {
        tensor.to_ndarray()
    }
}

impl<T: Float, const A: usize> From<[T; A]> for Tensor<T, Dim<A>> {
    fn from(data: [T; A]) -> Self {
        Self {
            data: data.to_vec(),
            shape: PhantomData,
        }
    }
}

impl<T: Float, const A: usize, const B: usize> From<[[T; B]; A]> for Tensor<T, Dim<A, Dim<B>>> {
    fn from(data: [[T; B]; A]) -> Self {
        Self {
            data: data.iter().flatten().copied().collect(),
            shape: PhantomData,
        }
    }
}

impl<T: Float, const A: usize, const B: usize, const C: usize> From<[[[T; C]; B]; A]>
    for Tensor<T, Dim<A, Dim<B, Dim<C>>>>
{
    fn from(data: [[[T; C]; B]; A]) -> Self {
        Self {
            data: data.iter().flatten().flatten().copied().collect(),
            shape: PhantomData,
        }
    }
}
