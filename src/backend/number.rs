// src/backend/number.rs

use std::cmp::{PartialEq, PartialOrd};
use std::fmt::{Debug, Display};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use super::fastmath;

/// Element type of every tensor and differentiable value.
///
/// Implemented for `f32` and `f64`. Exact transcendentals delegate to `std`, the `fast_*`
/// family uses the bit-level approximations in [`fastmath`]. Which family the tensor
/// kernels use is decided by the `fast-math` feature (see [`crate::backend::kernel_exp`]).
pub trait Float:
    // Basic arithmetic operations
    Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self> + Div<Output = Self>
    + Sum<Self> + for<'a> Sum<&'a Self> +
    // Assignment operations
    AddAssign + SubAssign + MulAssign + DivAssign +
    Neg<Output = Self> +
    PartialOrd + PartialEq +
    Clone + Copy + Debug + Display + Default +
    Send + Sync + 'static
{
    /// Neutral element for addition (zero)
    fn zero() -> Self;

    /// Neutral element for multiplication (one)
    fn one() -> Self;

    /// Lossy conversion from f64, used for hyperparameters stored as f64
    fn from_f64(value: f64) -> Self;

    fn to_f64(self) -> f64;

    fn abs(self) -> Self;

    fn sqrt(self) -> Self;

    fn exp(self) -> Self;

    /// Natural logarithm
    fn ln(self) -> Self;

    fn tanh(self) -> Self;

    /// Logistic function `1 / (1 + e^-x)`
    fn sigmoid(self) -> Self {
        Self::one() / (Self::one() + (-self).exp())
    }

    fn fast_exp(self) -> Self;

    fn fast_ln(self) -> Self;

    fn fast_sigmoid(self) -> Self;

    fn fast_tanh(self) -> Self;

    fn max(self, other: Self) -> Self {
        if self >= other { self } else { other }
    }

    fn min(self, other: Self) -> Self {
        if self <= other { self } else { other }
    }

    /// Clamps into `[lo, hi]`. NaN passes through unchanged.
    fn clamp_to(self, lo: Self, hi: Self) -> Self {
        if self < lo {
            lo
        } else if self > hi {
            hi
        } else {
            self
        }
    }
}

macro_rules! impl_float {
    ($t:ty, $fast:ident) => {
        impl Float for $t {
            #[inline]
            fn zero() -> Self {
                0.0
            }

            #[inline]
            fn one() -> Self {
                1.0
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $t
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn abs(self) -> Self {
                <$t>::abs(self)
            }

            #[inline]
            fn sqrt(self) -> Self {
                <$t>::sqrt(self)
            }

            #[inline]
            fn exp(self) -> Self {
                <$t>::exp(self)
            }

            #[inline]
            fn ln(self) -> Self {
                <$t>::ln(self)
            }

            #[inline]
            fn tanh(self) -> Self {
                <$t>::tanh(self)
            }

            #[inline]
            fn fast_exp(self) -> Self {
                fastmath::$fast::exp(self)
            }

            #[inline]
            fn fast_ln(self) -> Self {
                fastmath::$fast::ln(self)
            }

            #[inline]
            fn fast_sigmoid(self) -> Self {
                fastmath::$fast::sigmoid(self)
            }

            #[inline]
            fn fast_tanh(self) -> Self {
                fastmath::$fast::tanh(self)
            }
        }
    };
}

impl_float!(f32, single);
impl_float!(f64, double);
