use std::cell::{Ref, RefCell, RefMut};
use std::fmt;

use crate::tensor::Value;

/// A differentiable variable: a value paired with the gradient accumulated into it.
///
/// Both halves live behind `RefCell`s so that backward closures, which only ever hold shared
/// references, can add into the gradient and optimizers can rewrite the value. The gradient
/// starts at zero and only grows through [`Var::accumulate`] until the owner resets it.
///
/// # Examples
///
/// ```rust
/// use ferrodiff::Var;
///
/// let w = Var::new(1.5f64);
/// w.accumulate(&2.0);
/// w.accumulate(&0.5);
/// assert_eq!(*w.grad(), 2.5);
/// ```
pub struct Var<V: Value> {
    value: RefCell<V>,
    grad: RefCell<V>,
}

impl<V: Value> Var<V> {
    /// Creates a leaf variable with a zero gradient.
    pub fn new(value: V) -> Self {
        Self {
            value: RefCell::new(value),
            grad: RefCell::new(V::zero()),
        }
    }

    pub fn value(&self) -> Ref<'_, V> {
        self.value.borrow()
    }

    pub fn grad(&self) -> Ref<'_, V> {
        self.grad.borrow()
    }

    /// Adds `delta` into the gradient.
    ///
    /// `delta` may be larger than the variable along broadcast axes (a bias receiving the
    /// gradient of a whole batch); those axes are summed away. Every call adds, so a
    /// variable read by several operations ends up with the sum of their contributions.
    pub fn accumulate<D>(&self, delta: &D)
    where
        D: Value<Elem = V::Elem>,
    {
        self.grad.borrow_mut().add_assign_from(delta);
    }

    /// Overwrites the value, e.g. with the next input of a training loop.
    pub fn set_value(&self, value: V) {
        *self.value.borrow_mut() = value;
    }

    pub fn zero_grad(&self) {
        *self.grad.borrow_mut() = V::zero();
    }

    pub fn into_value(self) -> V {
        self.value.into_inner()
    }

    /// Takes the pending gradient, leaving zero in its place.
    pub(crate) fn take_grad(&self) -> V {
        self.grad.replace(V::zero())
    }

    pub(crate) fn value_mut(&self) -> RefMut<'_, V> {
        self.value.borrow_mut()
    }
}

impl<V: Value + Default> Default for Var<V> {
    fn default() -> Self {
        Self::new(V::default())
    }
}

impl<V: Value> From<V> for Var<V> {
    fn from(value: V) -> Self {
        Self::new(value)
    }
}

impl<V: Value> fmt::Debug for Var<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var")
            .field("value", &*self.value.borrow())
            .field("grad", &*self.grad.borrow())
            .finish()
    }
}
