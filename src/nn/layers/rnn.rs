use crate::graph::{Op, Operand, Shared, Unit, add, mul, sub};
use crate::nn::optim::Optimizer;
use crate::nn::parameter::Param;
use crate::tensor::{Binary, Value};

/// Leaky recurrent cell.
///
/// ```text
/// s' = s + (x - s) * rate
/// out = x - s'
/// ```
///
/// `rate` is any value that broadcasts against the input: a scalar, one rate per feature,
/// or a full tensor.
#[derive(Debug)]
pub struct Rnn<'o, W: Value, O: Optimizer> {
    pub rate: Param<'o, W, O>,
}

impl<'o, W: Value, O: Optimizer> Rnn<'o, W, O> {
    pub fn new(rate: W, optimizer: &'o O) -> Self {
        Self {
            rate: Param::new(rate, optimizer),
        }
    }

    /// One recurrence step, yielding `(out, s')` as a single two-output unit.
    ///
    /// The next state is shared: `out` reads it, and the caller usually feeds it into the
    /// following step, so its backward runs once both consumers have propagated into it.
    pub fn forward<'a, V, X, S>(&'a self, x: X, state: S) -> Unit<'a, (Op<'a, V>, Shared<'a, V>)>
    where
        V: Value<Elem = W::Elem> + Binary<V, Output = V> + Binary<W, Output = V>,
        X: Operand<Value = V> + Clone + 'a,
        S: Operand<Value = V> + Clone + 'a,
    {
        let next = add(state.clone(), mul(sub(x.clone(), state), &self.rate)).shared();
        let out = sub(x, next.clone());
        Unit::composite((out, next))
    }
}
