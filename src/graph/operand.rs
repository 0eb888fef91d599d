use std::cell::Ref;
use std::ops::Deref;

use super::unit::{Op, Shared};
use super::var::Var;
use crate::backend::Float;
use crate::tensor::{Shape, Tensor, Value};

/// Borrowed view of an operand's current value.
pub enum ValueRef<'r, V> {
    Plain(&'r V),
    Cell(Ref<'r, V>),
}

impl<V> Deref for ValueRef<'_, V> {
    type Target = V;

    fn deref(&self) -> &V {
        match self {
            ValueRef::Plain(v) => v,
            ValueRef::Cell(v) => v,
        }
    }
}

/// Anything a differentiable operation can read: it has a value and accepts gradient.
///
/// Variables, units and parameters add the gradient they receive; plain constants
/// ([`f32`], [`f64`], [`Tensor`]) ignore it, which lets every primitive treat its operands
/// the same way.
pub trait Operand {
    type Value: Value;

    fn read(&self) -> ValueRef<'_, Self::Value>;

    /// Receives a gradient contribution shaped like the operation's output.
    fn accumulate<D>(&self, delta: &D)
    where
        D: Value<Elem = <Self::Value as Value>::Elem>;
}

impl<V: Value> Operand for &Var<V> {
    type Value = V;

    fn read(&self) -> ValueRef<'_, V> {
        ValueRef::Cell(self.value())
    }

    fn accumulate<D>(&self, delta: &D)
    where
        D: Value<Elem = V::Elem>,
    {
        Var::accumulate(self, delta);
    }
}

impl<V: Value> Operand for Op<'_, V> {
    type Value = V;

    fn read(&self) -> ValueRef<'_, V> {
        ValueRef::Cell(self.value())
    }

    fn accumulate<D>(&self, delta: &D)
    where
        D: Value<Elem = V::Elem>,
    {
        Var::accumulate(self, delta);
    }
}

impl<V: Value> Operand for &Op<'_, V> {
    type Value = V;

    fn read(&self) -> ValueRef<'_, V> {
        ValueRef::Cell(self.value())
    }

    fn accumulate<D>(&self, delta: &D)
    where
        D: Value<Elem = V::Elem>,
    {
        Var::accumulate(self, delta);
    }
}

impl<V: Value> Operand for Shared<'_, V> {
    type Value = V;

    fn read(&self) -> ValueRef<'_, V> {
        ValueRef::Cell(self.value())
    }

    fn accumulate<D>(&self, delta: &D)
    where
        D: Value<Elem = V::Elem>,
    {
        Var::accumulate(self, delta);
    }
}

impl<V: Value> Operand for &Shared<'_, V> {
    type Value = V;

    fn read(&self) -> ValueRef<'_, V> {
        ValueRef::Cell(self.value())
    }

    fn accumulate<D>(&self, delta: &D)
    where
        D: Value<Elem = V::Elem>,
    {
        Var::accumulate(self, delta);
    }
}

macro_rules! impl_scalar_operand {
    ($($t:ty),*) => {
        $(
            impl Operand for $t {
                type Value = $t;

                fn read(&self) -> ValueRef<'_, $t> {
                    ValueRef::Plain(self)
                }

                fn accumulate<D: Value<Elem = $t>>(&self, _delta: &D) {}
            }
        )*
    };
}

impl_scalar_operand!(f32, f64);

impl<T: Float, S: Shape> Operand for Tensor<T, S> {
    type Value = Tensor<T, S>;

    fn read(&self) -> ValueRef<'_, Self> {
        ValueRef::Plain(self)
    }

    fn accumulate<D: Value<Elem = T>>(&self, _delta: &D) {}
}

impl<T: Float, S: Shape> Operand for &Tensor<T, S> {
    type Value = Tensor<T, S>;

    fn read(&self) -> ValueRef<'_, Tensor<T, S>> {
        ValueRef::Plain(self)
    }

    fn accumulate<D: Value<Elem = T>>(&self, _delta: &D) {}
}
