// Random weight initializers.
// Samplers return plain f64 values; the `init_tensor_*` helpers fill a statically shaped
// tensor, reading fan-in and fan-out from the last two extents of its shape.

use rand::{Rng, rng};
use rand_distr::{StandardNormal, Uniform};

use crate::backend::Float;
use crate::tensor::{Shape, Tensor};

/// Activation following a layer, used to scale Kaiming initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nonlinearity {
    Linear,
    Sigmoid,
    Tanh,
    Relu,
}

impl Nonlinearity {
    /// Recommended gain, as in PyTorch's `calculate_gain`.
    pub fn gain(self) -> f64 {
        match self {
            Nonlinearity::Linear | Nonlinearity::Sigmoid => 1.0,
            Nonlinearity::Tanh => 5.0 / 3.0,
            Nonlinearity::Relu => std::f64::consts::SQRT_2,
        }
    }
}

/// Uniform samples from `[lo, hi)`. An empty or non-finite range always yields `lo`.
pub fn uniform(lo: f64, hi: f64) -> impl Fn() -> f64 {
    let dist = Uniform::<f64>::new(lo, hi).ok();
    move || dist.as_ref().map_or(lo, |d| rng().sample::<f64, _>(d))
}

/// Xavier/Glorot uniform initialization
/// Samples from U(-a, a) where a = gain * sqrt(6 / (fan_in + fan_out))
pub fn xavier_uniform(fan_in: usize, fan_out: usize, gain: f64) -> impl Fn() -> f64 {
    let a = gain * (6.0 / (fan_in + fan_out) as f64).sqrt();
    uniform(-a, a)
}

/// Xavier/Glorot normal initialization
/// Samples from N(0, std) where std = gain * sqrt(2 / (fan_in + fan_out))
pub fn xavier_normal(fan_in: usize, fan_out: usize, gain: f64) -> impl Fn() -> f64 {
    let std = gain * (2.0 / (fan_in + fan_out) as f64).sqrt();
    move || std * rng().sample::<f64, _>(StandardNormal)
}

/// Kaiming/He uniform initialization
/// Samples from U(-bound, bound) where bound = gain * sqrt(3 / fan_in)
pub fn kaiming_uniform(fan_in: usize, nonlinearity: Nonlinearity) -> impl Fn() -> f64 {
    let bound = nonlinearity.gain() * (3.0 / fan_in as f64).sqrt();
    uniform(-bound, bound)
}

/// Kaiming/He normal initialization
/// Samples from N(0, std) where std = gain / sqrt(fan_in)
pub fn kaiming_normal(fan_in: usize, nonlinearity: Nonlinearity) -> impl Fn() -> f64 {
    let std = nonlinearity.gain() / (fan_in as f64).sqrt();
    move || std * rng().sample::<f64, _>(StandardNormal)
}

/// `(fan_in, fan_out)` of a shape: its second-to-last and last extents, 1 where missing.
pub fn fans<S: Shape>() -> (usize, usize) {
    let dims = S::DIMS;
    match &dims[..S::RANK] {
        [] => (1, 1),
        [n] => (1, *n),
        [.., i, o] => (*i, *o),
    }
}

/// Fills a tensor with samples from `init`.
pub fn init_tensor<T: Float, S: Shape>(init: impl Fn() -> f64) -> Tensor<T, S> {
    Tensor::from_fn(|_| T::from_f64(init()))
}

pub fn init_tensor_uniform<T: Float, S: Shape>(lo: f64, hi: f64) -> Tensor<T, S> {
    init_tensor(uniform(lo, hi))
}

pub fn init_tensor_xavier_uniform<T: Float, S: Shape>(gain: f64) -> Tensor<T, S> {
    let (fan_in, fan_out) = fans::<S>();
    init_tensor(xavier_uniform(fan_in, fan_out, gain))
}

pub fn init_tensor_xavier_normal<T: Float, S: Shape>(gain: f64) -> Tensor<T, S> {
    let (fan_in, fan_out) = fans::<S>();
    init_tensor(xavier_normal(fan_in, fan_out, gain))
}

pub fn init_tensor_kaiming_uniform<T: Float, S: Shape>(
    nonlinearity: Nonlinearity,
) -> Tensor<T, S> {
    init_tensor(kaiming_uniform(fans::<S>().0, nonlinearity))
}

pub fn init_tensor_kaiming_normal<T: Float, S: Shape>(
    nonlinearity: Nonlinearity,
) -> Tensor<T, S> {
    init_tensor(kaiming_normal(fans::<S>().0, nonlinearity))
}
