// Neural network building blocks on top of the autodiff core: trainable parameters,
// the optimizers that update them, and a few recurrent and feed-forward layers.

pub mod layers;
pub mod optim;
pub mod parameter;

pub use layers::{Gru, Linear, Rnn};
pub use optim::{
    Adam, AdamConfig, AdamState, AnyOptimizer, Optimizer, OptimizerConfig, Sgd, SgdConfig,
};
pub use parameter::Param;

/// Weight initialization utilities
pub mod init {
    pub use crate::initializers::*;
}
