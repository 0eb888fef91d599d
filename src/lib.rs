//! # Ferrodiff
//!
//! Ferrodiff is a small reverse-mode automatic differentiation engine over statically
//! shaped tensors, written in safe Rust.
//!
//! ## Features
//!
//! - Tensor shapes are types: broadcasting and matrix products between incompatible shapes
//!   fail to build
//! - Eager forward pass with a deferred, exactly-once backward pass that runs when an
//!   expression is dropped, so the computation graph is the nesting of the expression itself
//! - Operator overloading (`+ - *` elementwise, `%` matrix product, unary `-`)
//! - Optimizer-aware parameters (SGD, Adam) that apply at most one update per step
//! - Optional bit-level fast math for `exp`, `ln`, `sigmoid` and `tanh` (`fast-math` feature)
//!
//! ```rust
//! use ferrodiff::Var;
//!
//! let a = Var::new(2.0f64);
//! let w = Var::new(1.1f64);
//! let b = Var::new(2.0f64);
//!
//! let out = &a * &w + &b;
//! assert!((*out.value() - 4.2).abs() < 1e-12);
//! out.backward(1.0);
//!
//! assert_eq!(*w.grad(), 2.0);
//! assert_eq!(*b.grad(), 1.0);
//! ```
pub mod backend;
pub mod error;
pub mod graph;
pub mod initializers;
pub mod nn;
pub mod tensor;

// Re-export commonly used types for convenience
pub use backend::Float;
pub use error::{ConfigError, TensorError};
pub use graph::{Op, Operand, Shared, Unit, Var};
pub use tensor::{Rank0, Rank1, Rank2, Rank3, Rank4, Shape, Tensor, Value};

/// Everything needed to build and train a model.
pub mod prelude {
    pub use crate::graph::{
        Op, Operand, Shared, Unit, Var, add, add_into, exp, log_softmax, logsumexp, matmul,
        matmul_into, mul, mul_into, neg, sigmoid, sub, sub_into, tanh,
    };
    pub use crate::nn::{
        Adam, AdamConfig, AnyOptimizer, Gru, Linear, Optimizer, OptimizerConfig, Param, Rnn,
        Sgd, SgdConfig,
    };
    pub use crate::tensor::{Rank0, Rank1, Rank2, Rank3, Rank4, Shape, Tensor, Value};
}
