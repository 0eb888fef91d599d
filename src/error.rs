//! Error types.
//!
//! Shape mismatches between typed tensors are build errors, so the only runtime failures
//! are conversions from dynamically shaped data and configuration problems.

/// Errors converting dynamically shaped data into a statically shaped tensor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TensorError {
    /// The flat buffer holds the wrong number of elements.
    #[error("expected {expected} elements for shape {shape:?}, got {actual}")]
    ElementCount {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    /// The source array has a different shape.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

/// Errors loading or validating optimizer configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The TOML text could not be parsed into a configuration.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be written as TOML.
    #[error("TOML serialise error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A field holds a value the optimizer cannot use.
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}
