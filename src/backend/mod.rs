pub mod fastmath;
pub mod number;

mod tests;

pub use number::Float;

/// True when tensor kernels use the bit-level approximations.
pub const FAST_MATH: bool = cfg!(feature = "fast-math");

// Precision-mode dispatch for the unary tensor kernels. Both families are always compiled;
// the feature only decides which one the kernels call.

#[inline]
pub fn kernel_exp<T: Float>(x: T) -> T {
    if FAST_MATH { x.fast_exp() } else { x.exp() }
}

#[inline]
pub fn kernel_ln<T: Float>(x: T) -> T {
    if FAST_MATH { x.fast_ln() } else { x.ln() }
}

#[inline]
pub fn kernel_sigmoid<T: Float>(x: T) -> T {
    if FAST_MATH { x.fast_sigmoid() } else { x.sigmoid() }
}

#[inline]
pub fn kernel_tanh<T: Float>(x: T) -> T {
    if FAST_MATH { x.fast_tanh() } else { x.tanh() }
}
