// src/nn/layers/linear.rs
// Affine layer built from the matmul and add primitives.

use crate::backend::Float;
use crate::graph::{Op, Operand, add, matmul};
use crate::initializers::init_tensor_xavier_uniform;
use crate::nn::optim::Optimizer;
use crate::nn::parameter::Param;
use crate::tensor::{Rank1, Rank2, Tensor};

/// Linear transformation layer: `y = x % w + b`
///
/// The weight is stored as `[in, out]` so a batch of row vectors multiplies it directly;
/// the bias broadcasts over the batch axis and receives the gradient summed over it.
#[derive(Debug)]
pub struct Linear<'o, T: Float, const IN: usize, const OUT: usize, O: Optimizer> {
    /// Weight matrix `[IN, OUT]`
    pub weight: Param<'o, Tensor<T, Rank2<IN, OUT>>, O>,
    /// Bias vector `[OUT]`
    pub bias: Param<'o, Tensor<T, Rank1<OUT>>, O>,
}

impl<'o, T: Float, const IN: usize, const OUT: usize, O: Optimizer> Linear<'o, T, IN, OUT, O> {
    /// Xavier-uniform weights and a zero bias.
    pub fn new(optimizer: &'o O) -> Self {
        Self::from_tensors(init_tensor_xavier_uniform(1.0), Tensor::zeros(), optimizer)
    }

    pub fn from_tensors(
        weight: Tensor<T, Rank2<IN, OUT>>,
        bias: Tensor<T, Rank1<OUT>>,
        optimizer: &'o O,
    ) -> Self {
        Self {
            weight: Param::new(weight, optimizer),
            bias: Param::new(bias, optimizer),
        }
    }

    /// Applies the layer to a batch of `B` inputs.
    pub fn forward<'a, const B: usize, X>(&'a self, x: X) -> Op<'a, Tensor<T, Rank2<B, OUT>>>
    where
        X: Operand<Value = Tensor<T, Rank2<B, IN>>> + 'a,
    {
        add(matmul(x, &self.weight), &self.bias)
    }
}
