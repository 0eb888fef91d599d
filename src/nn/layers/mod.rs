// src/nn/layers/mod.rs
// Layers assembled from the differentiable primitives. Their weights are parameters that
// share one optimizer.

pub mod gru;
pub mod linear;
pub mod rnn;

pub use gru::Gru;
pub use linear::Linear;
pub use rnn::Rnn;
