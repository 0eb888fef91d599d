use serde::{Deserialize, Serialize};

use super::sgd::positive;
use super::{Optimizer, StepCounter};
use crate::backend::Float;
use crate::error::ConfigError;
use crate::tensor::Value;

/// Hyperparameters of Adam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    pub lr: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    pub grad_clamp: f64,
    pub param_clamp: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            lr: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            grad_clamp: 1.0,
            param_clamp: 5.0,
        }
    }
}

impl AdamConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("lr", self.lr)?;
        decay("beta1", self.beta1)?;
        decay("beta2", self.beta2)?;
        positive("eps", self.eps)?;
        positive("grad_clamp", self.grad_clamp)?;
        positive("param_clamp", self.param_clamp)
    }
}

fn decay(field: &'static str, beta: f64) -> Result<(), ConfigError> {
    if (0.0..1.0).contains(&beta) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must lie in [0, 1), got {beta}"),
        })
    }
}

/// Moment estimates of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct AdamState<V> {
    pub m1: V,
    pub m2: V,
    /// Number of updates applied so far.
    pub t: u64,
}

impl<V: Value> Default for AdamState<V> {
    fn default() -> Self {
        Self {
            m1: V::zero(),
            m2: V::zero(),
            t: 0,
        }
    }
}

/// Adam with running-average moments.
///
/// Instead of the exponential bias correction of the paper, each moment is a running mean
/// over the last `min(1 / (1 - β), t)` gradients:
///
/// ```text
/// m1 += (g - m1) / min(1 / (1 - β1), t)
/// m2 += (g² - m2) / min(1 / (1 - β2), t)
/// value -= lr * m1 / (sqrt(m2) + eps)
/// ```
///
/// For small `t` this is the plain mean of the gradients seen so far, which removes the
/// bias towards zero without a separate correction term.
#[derive(Debug, Default)]
pub struct Adam {
    config: AdamConfig,
    step: StepCounter,
}

impl Adam {
    pub fn new(config: AdamConfig) -> Self {
        Self {
            config,
            step: StepCounter::default(),
        }
    }

    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    /// Averaging window of the first moment, `1 / (1 - β1)`.
    pub fn m1_mass(&self) -> f64 {
        1.0 / (1.0 - self.config.beta1)
    }

    /// Averaging window of the second moment, `1 / (1 - β2)`.
    pub fn m2_mass(&self) -> f64 {
        1.0 / (1.0 - self.config.beta2)
    }
}

impl Optimizer for Adam {
    type State<V: Value> = AdamState<V>;

    fn init_state<V: Value>(&self) -> AdamState<V> {
        AdamState::default()
    }

    fn step(&self) -> u64 {
        self.step.get()
    }

    fn tick(&self) {
        self.step.advance("adam");
    }

    fn grad_clamp(&self) -> f64 {
        self.config.grad_clamp
    }

    fn param_clamp(&self) -> f64 {
        self.config.param_clamp
    }

    fn update<V: Value>(&self, value: &mut V, grad: &V, state: &mut AdamState<V>) {
        state.t += 1;
        let t = state.t as f64;
        let n1 = V::Elem::from_f64(self.m1_mass().min(t));
        let n2 = V::Elem::from_f64(self.m2_mass().min(t));
        state.m1 = state.m1.zip_same(grad, |m, g| m + (g - m) / n1);
        state.m2 = state.m2.zip_same(grad, |m, g| m + (g * g - m) / n2);

        let lr = V::Elem::from_f64(self.config.lr);
        let eps = V::Elem::from_f64(self.config.eps);
        let moments = state.m1.as_slice().iter().zip(state.m2.as_slice());
        for (v, (&m1, &m2)) in value.as_mut_slice().iter_mut().zip(moments) {
            *v -= lr * m1 / (m2.sqrt() + eps);
        }
    }
}
