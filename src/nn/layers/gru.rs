use crate::backend::Float;
use crate::graph::{Op, Operand, add, matmul, mul, sigmoid, sub};
use crate::initializers::{init_tensor, uniform};
use crate::nn::optim::Optimizer;
use crate::nn::parameter::Param;
use crate::tensor::{Rank1, Rank2, Shape, Tensor};

type Weight<'o, T, const A: usize, const B: usize, O> = Param<'o, Tensor<T, Rank2<A, B>>, O>;
type Bias<'o, T, const N: usize, O> = Param<'o, Tensor<T, Rank1<N>>, O>;

fn drawn<'o, T: Float, S: Shape, O: Optimizer>(
    init: &impl Fn() -> f64,
    optimizer: &'o O,
) -> Param<'o, Tensor<T, S>, O> {
    Param::new(init_tensor(init), optimizer)
}

/// Gated recurrent unit.
///
/// ```text
/// z  = σ(x % w_xz + h % w_hz + b_z)
/// r  = σ(x % w_xr + h % w_hr + b_r)
/// h̃  = σ(x % w_xh + (h * r) % w_hh + b_h)
/// h' = (1 - z) * h + z * h̃
/// ```
///
/// The candidate state goes through a sigmoid rather than a tanh, so `h'` stays in `(0, 1)`
/// whenever `h` does.
#[derive(Debug)]
pub struct Gru<'o, T: Float, const I: usize, const H: usize, O: Optimizer> {
    pub w_xz: Weight<'o, T, I, H, O>,
    pub w_xr: Weight<'o, T, I, H, O>,
    pub w_xh: Weight<'o, T, I, H, O>,
    pub w_hz: Weight<'o, T, H, H, O>,
    pub w_hr: Weight<'o, T, H, H, O>,
    pub w_hh: Weight<'o, T, H, H, O>,
    pub b_z: Bias<'o, T, H, O>,
    pub b_r: Bias<'o, T, H, O>,
    pub b_h: Bias<'o, T, H, O>,
}

impl<'o, T: Float, const I: usize, const H: usize, O: Optimizer> Gru<'o, T, I, H, O> {
    /// Weights uniform in `[0, 1)`, zero biases.
    pub fn new(optimizer: &'o O) -> Self {
        Self::with_init(uniform(0.0, 1.0), optimizer)
    }

    /// Weights drawn from `init`, zero biases.
    pub fn with_init(init: impl Fn() -> f64, optimizer: &'o O) -> Self {
        Self {
            w_xz: drawn(&init, optimizer),
            w_xr: drawn(&init, optimizer),
            w_xh: drawn(&init, optimizer),
            w_hz: drawn(&init, optimizer),
            w_hr: drawn(&init, optimizer),
            w_hh: drawn(&init, optimizer),
            b_z: Param::new(Tensor::zeros(), optimizer),
            b_r: Param::new(Tensor::zeros(), optimizer),
            b_h: Param::new(Tensor::zeros(), optimizer),
        }
    }

    /// One step over a batch of `B` inputs, returning the next hidden state.
    ///
    /// `x` and `h` are each read more than once, so they must be cheap to duplicate:
    /// variable references, shared handles or constants.
    pub fn forward<'a, const B: usize, X, S>(&'a self, x: X, h: S) -> Op<'a, Tensor<T, Rank2<B, H>>>
    where
        X: Operand<Value = Tensor<T, Rank2<B, I>>> + Clone + 'a,
        S: Operand<Value = Tensor<T, Rank2<B, H>>> + Clone + 'a,
    {
        let z = sigmoid(add(
            add(matmul(x.clone(), &self.w_xz), matmul(h.clone(), &self.w_hz)),
            &self.b_z,
        ))
        .shared();
        let r = sigmoid(add(
            add(matmul(x.clone(), &self.w_xr), matmul(h.clone(), &self.w_hr)),
            &self.b_r,
        ));
        let candidate = sigmoid(add(
            add(matmul(x, &self.w_xh), matmul(mul(h.clone(), r), &self.w_hh)),
            &self.b_h,
        ));
        let keep = sub(Tensor::<T, Rank1<H>>::ones(), z.clone());
        add(mul(keep, h), mul(z, candidate))
    }
}
