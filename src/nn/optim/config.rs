//! Serializable optimizer selection.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Adam, AdamConfig, AdamState, Optimizer, Sgd, SgdConfig};
use crate::error::ConfigError;
use crate::tensor::Value;

/// Optimizer choice and hyperparameters, tagged by `algorithm`.
///
/// Missing fields take their defaults:
///
/// ```toml
/// algorithm = "adam"
/// lr = 0.01
/// beta1 = 0.8
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum OptimizerConfig {
    Sgd(SgdConfig),
    Adam(AdamConfig),
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig::Adam(AdamConfig::default())
    }
}

impl OptimizerConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: OptimizerConfig = toml::from_str(text)?;
        config.validate()?;
        debug!(?config, "loaded optimizer configuration");
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            OptimizerConfig::Sgd(config) => config.validate(),
            OptimizerConfig::Adam(config) => config.validate(),
        }
    }

    /// Validates the configuration and builds the optimizer it names.
    pub fn build(&self) -> Result<AnyOptimizer, ConfigError> {
        self.validate()?;
        Ok(match *self {
            OptimizerConfig::Sgd(config) => AnyOptimizer::Sgd(Sgd::new(config)),
            OptimizerConfig::Adam(config) => AnyOptimizer::Adam(Adam::new(config)),
        })
    }
}

/// An optimizer chosen at runtime.
///
/// Its per-parameter state is always [`AdamState`]; gradient descent leaves it untouched.
#[derive(Debug)]
pub enum AnyOptimizer {
    Sgd(Sgd),
    Adam(Adam),
}

impl Optimizer for AnyOptimizer {
    type State<V: Value> = AdamState<V>;

    fn init_state<V: Value>(&self) -> AdamState<V> {
        AdamState::default()
    }

    fn step(&self) -> u64 {
        match self {
            AnyOptimizer::Sgd(sgd) => sgd.step(),
            AnyOptimizer::Adam(adam) => adam.step(),
        }
    }

    fn tick(&self) {
        match self {
            AnyOptimizer::Sgd(sgd) => sgd.tick(),
            AnyOptimizer::Adam(adam) => adam.tick(),
        }
    }

    fn grad_clamp(&self) -> f64 {
        match self {
            AnyOptimizer::Sgd(sgd) => sgd.grad_clamp(),
            AnyOptimizer::Adam(adam) => adam.grad_clamp(),
        }
    }

    fn param_clamp(&self) -> f64 {
        match self {
            AnyOptimizer::Sgd(sgd) => sgd.param_clamp(),
            AnyOptimizer::Adam(adam) => adam.param_clamp(),
        }
    }

    fn update<V: Value>(&self, value: &mut V, grad: &V, state: &mut AdamState<V>) {
        match self {
            AnyOptimizer::Sgd(sgd) => sgd.update(value, grad, &mut ()),
            AnyOptimizer::Adam(adam) => adam.update(value, grad, state),
        }
    }
}
