use serde::{Deserialize, Serialize};

use super::{Optimizer, StepCounter};
use crate::backend::Float;
use crate::error::ConfigError;
use crate::tensor::Value;

/// Hyperparameters of plain gradient descent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SgdConfig {
    pub lr: f64,
    pub grad_clamp: f64,
    pub param_clamp: f64,
}

impl Default for SgdConfig {
    fn default() -> Self {
        Self {
            lr: 0.0003,
            grad_clamp: 1.0,
            param_clamp: 5.0,
        }
    }
}

impl SgdConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("lr", self.lr)?;
        positive("grad_clamp", self.grad_clamp)?;
        positive("param_clamp", self.param_clamp)
    }
}

/// Fails unless `value` is finite and strictly positive.
pub(crate) fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must be a positive finite number, got {value}"),
        })
    }
}

/// Stochastic gradient descent: `value -= lr * grad`.
///
/// # Examples
///
/// ```rust
/// use ferrodiff::nn::{Optimizer, Param, Sgd, SgdConfig};
///
/// let sgd = Sgd::new(SgdConfig { lr: 0.1, ..SgdConfig::default() });
/// let w = Param::new(1.0f64, &sgd);
/// w.accumulate(&0.5);
/// sgd.tick();
/// w.apply_pending();
/// assert!((*w.value() - 0.95).abs() < 1e-12);
/// ```
#[derive(Debug, Default)]
pub struct Sgd {
    config: SgdConfig,
    step: StepCounter,
}

impl Sgd {
    pub fn new(config: SgdConfig) -> Self {
        Self {
            config,
            step: StepCounter::default(),
        }
    }

    pub fn config(&self) -> &SgdConfig {
        &self.config
    }
}

impl Optimizer for Sgd {
    type State<V: Value> = ();

    fn init_state<V: Value>(&self) {}

    fn step(&self) -> u64 {
        self.step.get()
    }

    fn tick(&self) {
        self.step.advance("sgd");
    }

    fn grad_clamp(&self) -> f64 {
        self.config.grad_clamp
    }

    fn param_clamp(&self) -> f64 {
        self.config.param_clamp
    }

    fn update<V: Value>(&self, value: &mut V, grad: &V, _state: &mut ()) {
        let lr = V::Elem::from_f64(self.config.lr);
        for (v, &g) in value.as_mut_slice().iter_mut().zip(grad.as_slice()) {
            *v -= lr * g;
        }
    }
}
