//! Optimizers driving [`Param`](crate::nn::Param) updates.
//!
//! An optimizer owns the hyperparameters and a global step counter shared by every
//! parameter it drives. Parameters keep their own per-parameter state (Adam moments) and
//! compare their local step with the global one to decide when to apply the pending update.

use std::cell::Cell;

use tracing::debug;

use crate::tensor::Value;

pub mod adam;
pub mod config;
pub mod sgd;

pub use adam::{Adam, AdamConfig, AdamState};
pub use config::{AnyOptimizer, OptimizerConfig};
pub use sgd::{Sgd, SgdConfig};

/// Update rule shared by a group of parameters.
///
/// The training driver calls [`Optimizer::tick`] once per external step; every parameter
/// then applies at most one update during the following step, at its first gradient touch.
pub trait Optimizer {
    /// Per-parameter state, e.g. moment estimates.
    type State<V: Value>;

    /// Fresh state for a parameter holding values of type `V`.
    fn init_state<V: Value>(&self) -> Self::State<V>;

    /// Current global step.
    fn step(&self) -> u64;

    /// Advances the global step, making every parameter eligible for one more update.
    fn tick(&self);

    /// Bound applied to the pending gradient before the update reads it.
    fn grad_clamp(&self) -> f64;

    /// Bound applied to the parameter value after the update.
    fn param_clamp(&self) -> f64;

    /// Applies one update to `value` from the already clamped `grad`.
    fn update<V: Value>(&self, value: &mut V, grad: &V, state: &mut Self::State<V>);
}

/// Global step counter embedded in every optimizer.
#[derive(Debug, Default)]
pub(crate) struct StepCounter(Cell<u64>);

impl StepCounter {
    pub(crate) fn get(&self) -> u64 {
        self.0.get()
    }

    pub(crate) fn advance(&self, algorithm: &str) {
        let step = self.0.get() + 1;
        self.0.set(step);
        debug!(algorithm, step, "optimizer step");
    }
}
