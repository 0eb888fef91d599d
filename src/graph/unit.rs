//! Computation units: eager forward, deferred one-shot backward.
//!
//! A primitive operation computes its output immediately and parks the backward half in a
//! boxed closure. The closure runs exactly once, either when asked ([`Unit::propagate`],
//! [`Op::backward`]) or when the unit is dropped. Units own the units they read from, so
//! dropping an expression tree runs the outer backward before the inner units are released
//! and the gradient flows from the output towards the leaves in reverse construction order.

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use super::var::Var;
use crate::tensor::Value;

type Backward<'a, O> = Box<dyn FnOnce(&O) + 'a>;

/// Holder of an operation's output together with its pending backward step.
pub struct Unit<'a, O> {
    out: O,
    backward: Option<Backward<'a, O>>,
}

/// The unit of a single-output differentiable operation.
pub type Op<'a, V> = Unit<'a, Var<V>>;

impl<'a, O> Unit<'a, O> {
    /// Wraps a computed output and the closure that propagates its gradient.
    pub fn new(out: O, backward: impl FnOnce(&O) + 'a) -> Self {
        Self {
            out,
            backward: Some(Box::new(backward)),
        }
    }

    /// Groups already built units into one multi-output unit.
    ///
    /// The composite has no backward step of its own. Its members propagate when it is
    /// dropped, in declaration order, so a tuple `(out, state)` lets `out` feed its gradient
    /// into `state` before `state` propagates.
    pub fn composite(out: O) -> Self {
        Self {
            out,
            backward: None,
        }
    }

    /// Runs the backward step now if it has not run yet.
    pub fn propagate(&mut self) {
        if let Some(backward) = self.backward.take() {
            backward(&self.out);
        }
    }

    /// True until the backward step has run.
    pub fn is_pending(&self) -> bool {
        self.backward.is_some()
    }

    pub fn output(&self) -> &O {
        &self.out
    }
}

impl<'a, V: Value> Unit<'a, Var<V>> {
    /// Adds `grad` into the output gradient without propagating.
    pub fn seed(&self, grad: V) {
        self.out.accumulate(&grad);
    }

    /// Seeds the output gradient and propagates through the whole expression.
    pub fn backward(mut self, grad: V) {
        self.seed(grad);
        self.propagate();
    }

    /// Turns this unit into a shareable handle.
    pub fn shared(self) -> Shared<'a, V> {
        Shared(Rc::new(self))
    }
}

impl<O> Deref for Unit<'_, O> {
    type Target = O;

    fn deref(&self) -> &O {
        &self.out
    }
}

impl<O> Drop for Unit<'_, O> {
    fn drop(&mut self) {
        self.propagate();
    }
}

impl<O: fmt::Debug> fmt::Debug for Unit<'_, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("out", &self.out)
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// A reference-counted [`Op`] for intermediates read by more than one consumer.
///
/// Every consumer owns a clone. The wrapped unit propagates when the last clone is released,
/// which happens only after every consumer has run its own backward step and added into the
/// shared gradient.
pub struct Shared<'a, V: Value>(Rc<Op<'a, V>>);

impl<'a, V: Value> Shared<'a, V> {
    /// Number of live handles.
    pub fn handles(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl<V: Value> Clone for Shared<'_, V> {
    fn clone(&self) -> Self {
        Shared(Rc::clone(&self.0))
    }
}

impl<V: Value> Deref for Shared<'_, V> {
    type Target = Var<V>;

    fn deref(&self) -> &Var<V> {
        &self.0.out
    }
}

impl<'a, V: Value> From<Op<'a, V>> for Shared<'a, V> {
    fn from(op: Op<'a, V>) -> Self {
        op.shared()
    }
}

impl<V: Value> fmt::Debug for Shared<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Shared").field(&*self.0).finish()
    }
}
