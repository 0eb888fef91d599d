use std::cell::{Cell, Ref, RefCell};
use std::fmt;

use tracing::{debug, trace};

use super::optim::Optimizer;
use crate::backend::Float;
use crate::graph::{Operand, ValueRef, Var};
use crate::tensor::Value;

/// A trainable variable updated in place by an optimizer.
///
/// A parameter behaves like a [`Var`] in expressions, but the first time it receives
/// gradient after the optimizer has ticked it applies the update for the previous step:
///
/// 1. clamp the pending gradient into `[-grad_clamp, grad_clamp]`,
/// 2. update the value from it (the gradient is consumed),
/// 3. clamp the value into `[-param_clamp, param_clamp]`,
///
/// and only then adds the incoming gradient. A parameter read many times in one step is
/// therefore updated once, from everything it accumulated during the step before.
///
/// # Examples
///
/// ```rust
/// use ferrodiff::nn::{Optimizer, Param, Sgd, SgdConfig};
///
/// let sgd = Sgd::new(SgdConfig { lr: 0.5, ..SgdConfig::default() });
/// let w = Param::new(2.0f64, &sgd);
///
/// (&w * 3.0).backward(1.0);
/// assert_eq!(*w.grad(), 3.0);
///
/// sgd.tick();
/// (&w * 3.0).backward(1.0);
/// // The gradient of 3 was clamped to 1 before the update.
/// assert_eq!(*w.value(), 1.5);
/// assert_eq!(*w.grad(), 3.0);
/// ```
pub struct Param<'o, V: Value, O: Optimizer> {
    var: Var<V>,
    optimizer: &'o O,
    state: RefCell<O::State<V>>,
    step: Cell<u64>,
}

impl<'o, V: Value, O: Optimizer> Param<'o, V, O> {
    /// Creates a parameter driven by `optimizer`, synchronized with its current step.
    pub fn new(value: V, optimizer: &'o O) -> Self {
        Self {
            var: Var::new(value),
            optimizer,
            state: RefCell::new(optimizer.init_state()),
            step: Cell::new(optimizer.step()),
        }
    }

    pub fn value(&self) -> Ref<'_, V> {
        self.var.value()
    }

    /// Gradient accumulated since the last update.
    pub fn grad(&self) -> Ref<'_, V> {
        self.var.grad()
    }

    pub fn var(&self) -> &Var<V> {
        &self.var
    }

    pub fn optimizer(&self) -> &'o O {
        self.optimizer
    }

    /// Step at which this parameter was last synchronized.
    pub fn step(&self) -> u64 {
        self.step.get()
    }

    pub fn state(&self) -> Ref<'_, O::State<V>> {
        self.state.borrow()
    }

    pub fn set_value(&self, value: V) {
        self.var.set_value(value);
    }

    pub fn zero_grad(&self) {
        self.var.zero_grad();
    }

    /// Adds `delta` into the gradient, first applying the pending update if the optimizer
    /// has moved to a new step.
    pub fn accumulate<D>(&self, delta: &D)
    where
        D: Value<Elem = V::Elem>,
    {
        if self.step.get() != self.optimizer.step() {
            self.apply_pending();
        }
        self.var.accumulate(delta);
    }

    /// Applies the update from the pending gradient now and synchronizes with the
    /// optimizer's step. Used after the last training step, which no later touch follows.
    pub fn apply_pending(&self) {
        let grad_bound = V::Elem::from_f64(self.optimizer.grad_clamp());
        let param_bound = V::Elem::from_f64(self.optimizer.param_clamp());

        let mut grad = self.var.take_grad();
        grad.clamp_inplace(-grad_bound, grad_bound);

        let mut value = self.var.value_mut();
        self.optimizer
            .update(&mut *value, &grad, &mut self.state.borrow_mut());

        let saturated = value.as_slice().iter().filter(|x| x.abs() > param_bound).count();
        if saturated > 0 {
            debug!(saturated, bound = self.optimizer.param_clamp(), "parameter clamped");
            value.clamp_inplace(-param_bound, param_bound);
        }

        let step = self.optimizer.step();
        self.step.set(step);
        trace!(step, grad_norm = grad.norm().to_f64(), "parameter updated");
    }

    pub fn into_value(self) -> V {
        self.var.into_value()
    }
}

impl<V: Value, O: Optimizer> fmt::Debug for Param<'_, V, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("value", &*self.var.value())
            .field("grad", &*self.var.grad())
            .field("step", &self.step.get())
            .finish()
    }
}

impl<'p, 'o, V: Value, O: Optimizer> Operand for &'p Param<'o, V, O> {
    type Value = V;

    fn read(&self) -> ValueRef<'_, V> {
        ValueRef::Cell(self.var.value())
    }

    fn accumulate<D>(&self, delta: &D)
    where
        D: Value<Elem = V::Elem>,
    {
        Param::accumulate(self, delta);
    }
}

crate::graph::ops::impl_graph_ops!(['p, 'o, V: Value, O: Optimizer] &'p Param<'o, V, O> => 'p);
crate::graph::ops::impl_const_lhs_ops!(['p, 'o, V: Value, O: Optimizer] &'p Param<'o, V, O> => 'p);
