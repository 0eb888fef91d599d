//! Primitive differentiable operations.
//!
//! Each primitive reads its operands, computes the output value eagerly and returns an
//! [`Op`] whose backward step adds `∂y/∂operand · y.grad` into every operand, first operand
//! first. Operand values that a backward rule needs are captured when the operation is
//! built, so a parameter updated by its optimizer halfway through a backward pass cannot
//! change the gradient that other units compute. Rules that only need the output (`exp`,
//! `tanh`, `sigmoid`) read it at backward time.
//!
//! The operators and [`add`], [`sub`], [`mul`], [`matmul`] return the shape of the dominant
//! operand (higher rank, left on a tie). When that operand has extent 1 on an axis where
//! the other is larger (`[1, 3] + [4, 3]`), name the result with [`add_into`],
//! [`sub_into`], [`mul_into`] or [`matmul_into`]; the gradient of the smaller operand is
//! summed over the axes it was broadcast along.
//!
//! | op | ∂/∂a | ∂/∂b |
//! |---|---|---|
//! | `a + b` | `g` | `g` |
//! | `a - b` | `g` | `-g` |
//! | `a * b` | `b·g` | `a·g` |
//! | `a % b` | `g·bᵀ` | `aᵀ·g` |
//! | `-a` | `-g` | |
//! | `exp(a)` | `y·g` | |
//! | `tanh(a)` | `(1 - y²)·g` | |
//! | `sigmoid(a)` | `y·(1 - y)·g` | |
//! | `logsumexp(a)` | `softmax(a)·g` | |

use super::operand::Operand;
use super::unit::{Op, Shared, Unit};
use super::var::Var;
use crate::backend::{Float, kernel_exp, kernel_sigmoid, kernel_tanh};
use crate::tensor::matmul::{mat_mul, mat_mul_grads, mat_mul_into};
use crate::tensor::shape::{
    Broadcast, BroadcastTo, MatKernel, MatMulShape, Matrix, ReduceLast,
};
use crate::tensor::{Binary, Tensor, Value, zip_into_value};

/// Element type of an operand.
pub type Elem<A> = <<A as Operand>::Value as Value>::Elem;

/// Shape of an operand's value.
pub type ShapeOf<A> = <<A as Operand>::Value as Value>::Shape;

/// Value type of an elementwise operation between operands `A` and `B`.
pub type Joint<A, B> = <<A as Operand>::Value as Binary<<B as Operand>::Value>>::Output;

/// `a + b`, broadcasting.
pub fn add<'a, A, B>(a: A, b: B) -> Op<'a, Joint<A, B>>
where
    A: Operand + 'a,
    B: Operand + 'a,
    B::Value: Value<Elem = Elem<A>>,
    A::Value: Binary<B::Value>,
{
    let y = Binary::zip(&*a.read(), &*b.read(), |x, y| x + y);
    Unit::new(Var::new(y), move |out| {
        let g = out.grad();
        a.accumulate(&*g);
        b.accumulate(&*g);
    })
}

/// `a - b`, broadcasting.
pub fn sub<'a, A, B>(a: A, b: B) -> Op<'a, Joint<A, B>>
where
    A: Operand + 'a,
    B: Operand + 'a,
    B::Value: Value<Elem = Elem<A>>,
    A::Value: Binary<B::Value>,
{
    let y = Binary::zip(&*a.read(), &*b.read(), |x, y| x - y);
    Unit::new(Var::new(y), move |out| {
        let g = out.grad();
        a.accumulate(&*g);
        b.accumulate(&g.map(|x| -x));
    })
}

/// `a + b` into an explicitly named output value, which must be exactly the broadcast of
/// the operand shapes.
pub fn add_into<'a, Out, A, B>(a: A, b: B) -> Op<'a, Out>
where
    A: Operand + 'a,
    B: Operand + 'a,
    B::Value: Value<Elem = Elem<A>>,
    Out: Value<Elem = Elem<A>>,
{
    let () = BroadcastTo::<Out::Shape, ShapeOf<A>, ShapeOf<B>>::CHECK;
    let y: Out = zip_into_value(&*a.read(), &*b.read(), |x, y| x + y);
    Unit::new(Var::new(y), move |out| {
        let g = out.grad();
        a.accumulate(&*g);
        b.accumulate(&*g);
    })
}

/// `a - b` into an explicitly named output value, which must be exactly the broadcast of
/// the operand shapes.
pub fn sub_into<'a, Out, A, B>(a: A, b: B) -> Op<'a, Out>
where
    A: Operand + 'a,
    B: Operand + 'a,
    B::Value: Value<Elem = Elem<A>>,
    Out: Value<Elem = Elem<A>>,
{
    let () = BroadcastTo::<Out::Shape, ShapeOf<A>, ShapeOf<B>>::CHECK;
    let y: Out = zip_into_value(&*a.read(), &*b.read(), |x, y| x - y);
    Unit::new(Var::new(y), move |out| {
        let g = out.grad();
        a.accumulate(&*g);
        b.accumulate(&g.map(|x| -x));
    })
}

/// Elementwise `a * b` into an explicitly named output value, which must be exactly the
/// broadcast of the operand shapes.
pub fn mul_into<'a, Out, A, B>(a: A, b: B) -> Op<'a, Out>
where
    A: Operand + 'a,
    B: Operand + 'a,
    B::Value: Value<Elem = Elem<A>>,
    Out: Value<Elem = Elem<A>>,
{
    let () = BroadcastTo::<Out::Shape, ShapeOf<A>, ShapeOf<B>>::CHECK;
    let (va, vb) = (a.read().clone(), b.read().clone());
    let y: Out = zip_into_value(&va, &vb, |x, y| x * y);
    Unit::new(Var::new(y), move |out| {
        let g = out.grad();
        let ga: Out = zip_into_value(&*g, &vb, |g, b| g * b);
        a.accumulate(&ga);
        let gb: Out = zip_into_value(&*g, &va, |g, a| g * a);
        b.accumulate(&gb);
    })
}

/// Elementwise `a * b`, broadcasting.
pub fn mul<'a, A, B>(a: A, b: B) -> Op<'a, Joint<A, B>>
where
    A: Operand + 'a,
    B: Operand + 'a,
    B::Value: Value<Elem = Elem<A>>,
    A::Value: Binary<B::Value>,
{
    let (va, vb) = (a.read().clone(), b.read().clone());
    let y = Binary::zip(&va, &vb, |x, y| x * y);
    Unit::new(Var::new(y), move |out| {
        let g = out.grad();
        let ga: Joint<A, B> = zip_into_value(&*g, &vb, |g, b| g * b);
        a.accumulate(&ga);
        let gb: Joint<A, B> = zip_into_value(&*g, &va, |g, a| g * a);
        b.accumulate(&gb);
    })
}

/// Batched matrix product `a · b` over the trailing two axes.
pub fn matmul<'a, T, L, R, A, B>(
    a: A,
    b: B,
) -> Op<'a, Tensor<T, <L as MatMulShape<R, false, false>>::Output>>
where
    T: Float,
    A: Operand<Value = Tensor<T, L>> + 'a,
    B: Operand<Value = Tensor<T, R>> + 'a,
    L: Matrix + Broadcast<R> + MatMulShape<R, false, false>,
    R: Matrix,
    L::Trailing: MatKernel<R::Trailing, false, false>,
{
    let (va, vb) = (a.read().clone(), b.read().clone());
    let y = mat_mul::<false, false, T, L, R>(&va, &vb);
    Unit::new(Var::new(y), move |out| {
        let (ga, gb) = mat_mul_grads(&*out.grad(), &va, &vb);
        a.accumulate(&ga);
        b.accumulate(&gb);
    })
}

/// Batched matrix product into an explicitly named output shape.
///
/// The batch axes of `O` must be exactly the broadcast of the operands' batch axes, so an
/// operand with batch extent 1 can meet a larger one on either side
/// (`[1, I, J] % [B, J, K] → [B, I, K]`).
pub fn matmul_into<'a, O, T, L, R, A, B>(a: A, b: B) -> Op<'a, Tensor<T, O>>
where
    T: Float,
    A: Operand<Value = Tensor<T, L>> + 'a,
    B: Operand<Value = Tensor<T, R>> + 'a,
    L: Matrix,
    R: Matrix,
    L::Trailing: MatKernel<R::Trailing, false, false>,
    O: Matrix<Trailing = <L::Trailing as MatKernel<R::Trailing, false, false>>::Output>,
{
    let (va, vb) = (a.read().clone(), b.read().clone());
    let y = mat_mul_into::<false, false, T, L, R, O>(&va, &vb);
    Unit::new(Var::new(y), move |out| {
        let (ga, gb) = mat_mul_grads(&*out.grad(), &va, &vb);
        a.accumulate(&ga);
        b.accumulate(&gb);
    })
}

pub fn neg<'a, A: Operand + 'a>(a: A) -> Op<'a, A::Value> {
    let y = a.read().map(|x| -x);
    Unit::new(Var::new(y), move |out| {
        a.accumulate(&out.grad().map(|g| -g));
    })
}

pub fn exp<'a, A: Operand + 'a>(a: A) -> Op<'a, A::Value> {
    let y = a.read().map(kernel_exp);
    Unit::new(Var::new(y), move |out| {
        let ga = out.grad().zip_same(&out.value(), |g, y| g * y);
        a.accumulate(&ga);
    })
}

pub fn tanh<'a, A: Operand + 'a>(a: A) -> Op<'a, A::Value> {
    let y = a.read().map(kernel_tanh);
    Unit::new(Var::new(y), move |out| {
        let one = <Elem<A> as Float>::one();
        let ga = out.grad().zip_same(&out.value(), |g, y| g * (one - y * y));
        a.accumulate(&ga);
    })
}

pub fn sigmoid<'a, A: Operand + 'a>(a: A) -> Op<'a, A::Value> {
    let y = a.read().map(kernel_sigmoid);
    Unit::new(Var::new(y), move |out| {
        let one = <Elem<A> as Float>::one();
        let ga = out.grad().zip_same(&out.value(), |g, y| g * y * (one - y));
        a.accumulate(&ga);
    })
}

/// `ln Σ exp(a)` along the last axis, keeping it with extent 1.
pub fn logsumexp<'a, T, S, A>(a: A) -> Op<'a, Tensor<T, S::Keep>>
where
    T: Float,
    S: ReduceLast,
    A: Operand<Value = Tensor<T, S>> + 'a,
{
    let (y, soft) = a.read().logsumexp_with_softmax();
    Unit::new(Var::new(y), move |out| {
        let ga: Tensor<T, S> = zip_into_value(&soft, &*out.grad(), |p, g| p * g);
        a.accumulate(&ga);
    })
}

/// Implements `+ - * % -x` for an autodiff type on the left and any operand on the right.
///
/// Invoked as `impl_graph_ops!([generics] Type => 'output)`; the generics must bind the
/// operand's value type as `V`.
macro_rules! impl_graph_ops {
    ([$($gen:tt)*] $lhs:ty => $lt:lifetime) => {
        $crate::graph::ops::impl_graph_ops!(@zip [$($gen)*] $lhs => $lt, Add, add);
        $crate::graph::ops::impl_graph_ops!(@zip [$($gen)*] $lhs => $lt, Sub, sub);
        $crate::graph::ops::impl_graph_ops!(@zip [$($gen)*] $lhs => $lt, Mul, mul);

        impl<$($gen)*, Rhs, T, L, R> ::std::ops::Rem<Rhs> for $lhs
        where
            T: $crate::backend::Float,
            $lhs: $crate::graph::Operand<Value = $crate::tensor::Tensor<T, L>>,
            Rhs: $crate::graph::Operand<Value = $crate::tensor::Tensor<T, R>> + $lt,
            L: $crate::tensor::shape::Matrix
                + $crate::tensor::shape::Broadcast<R>
                + $crate::tensor::shape::MatMulShape<R, false, false>,
            R: $crate::tensor::shape::Matrix,
            L::Trailing: $crate::tensor::shape::MatKernel<R::Trailing, false, false>,
        {
            type Output = $crate::graph::Op<
                $lt,
                $crate::tensor::Tensor<
                    T,
                    <L as $crate::tensor::shape::MatMulShape<R, false, false>>::Output,
                >,
            >;

            fn rem(self, rhs: Rhs) -> Self::Output {
                $crate::graph::ops::matmul(self, rhs)
            }
        }

        impl<$($gen)*> ::std::ops::Neg for $lhs {
            type Output = $crate::graph::Op<$lt, V>;

            fn neg(self) -> Self::Output {
                $crate::graph::ops::neg(self)
            }
        }
    };
    (@zip [$($gen:tt)*] $lhs:ty => $lt:lifetime, $trait:ident, $func:ident) => {
        impl<$($gen)*, Rhs> ::std::ops::$trait<Rhs> for $lhs
        where
            Rhs: $crate::graph::Operand + $lt,
            Rhs::Value: $crate::tensor::Value<Elem = <V as $crate::tensor::Value>::Elem>,
            V: $crate::tensor::Binary<Rhs::Value>,
        {
            type Output =
                $crate::graph::Op<$lt, <V as $crate::tensor::Binary<Rhs::Value>>::Output>;

            fn $func(self, rhs: Rhs) -> Self::Output {
                $crate::graph::ops::$func(self, rhs)
            }
        }
    };
}

/// Implements `+ - *` (and `%` for tensors) with a constant (`f32`, `f64`, `Tensor`,
/// `&Tensor`) on the left and the given autodiff type on the right.
macro_rules! impl_const_lhs_ops {
    ([$($gen:tt)*] $rhs:ty => $lt:lifetime) => {
        $crate::graph::ops::impl_const_lhs_ops!(@zip [$($gen)*] $rhs => $lt, Add, add);
        $crate::graph::ops::impl_const_lhs_ops!(@zip [$($gen)*] $rhs => $lt, Sub, sub);
        $crate::graph::ops::impl_const_lhs_ops!(@zip [$($gen)*] $rhs => $lt, Mul, mul);

        impl<$($gen)*, T, L, R> ::std::ops::Rem<$rhs> for $crate::tensor::Tensor<T, L>
        where
            T: $crate::backend::Float,
            $rhs: $crate::graph::Operand<Value = $crate::tensor::Tensor<T, R>>,
            L: $crate::tensor::shape::Matrix
                + $crate::tensor::shape::Broadcast<R>
                + $crate::tensor::shape::MatMulShape<R, false, false>,
            R: $crate::tensor::shape::Matrix,
            L::Trailing: $crate::tensor::shape::MatKernel<R::Trailing, false, false>,
        {
            type Output = $crate::graph::Op<
                $lt,
                $crate::tensor::Tensor<
                    T,
                    <L as $crate::tensor::shape::MatMulShape<R, false, false>>::Output,
                >,
            >;

            fn rem(self, rhs: $rhs) -> Self::Output {
                $crate::graph::ops::matmul(self, rhs)
            }
        }

        impl<'t, $($gen)*, T, L, R> ::std::ops::Rem<$rhs> for &'t $crate::tensor::Tensor<T, L>
        where
            't: $lt,
            T: $crate::backend::Float,
            $rhs: $crate::graph::Operand<Value = $crate::tensor::Tensor<T, R>>,
            L: $crate::tensor::shape::Matrix
                + $crate::tensor::shape::Broadcast<R>
                + $crate::tensor::shape::MatMulShape<R, false, false>,
            R: $crate::tensor::shape::Matrix,
            L::Trailing: $crate::tensor::shape::MatKernel<R::Trailing, false, false>,
        {
            type Output = $crate::graph::Op<
                $lt,
                $crate::tensor::Tensor<
                    T,
                    <L as $crate::tensor::shape::MatMulShape<R, false, false>>::Output,
                >,
            >;

            fn rem(self, rhs: $rhs) -> Self::Output {
                $crate::graph::ops::matmul(self, rhs)
            }
        }
    };
    (@zip [$($gen:tt)*] $rhs:ty => $lt:lifetime, $trait:ident, $func:ident) => {
        $crate::graph::ops::impl_const_lhs_ops!(@scalar f32, [$($gen)*] $rhs => $lt, $trait, $func);
        $crate::graph::ops::impl_const_lhs_ops!(@scalar f64, [$($gen)*] $rhs => $lt, $trait, $func);

        impl<$($gen)*, T, S> ::std::ops::$trait<$rhs> for $crate::tensor::Tensor<T, S>
        where
            T: $crate::backend::Float,
            S: $crate::tensor::Shape,
            V: $crate::tensor::Value<Elem = T>,
            $crate::tensor::Tensor<T, S>:
                $crate::tensor::Value<Elem = T> + $crate::tensor::Binary<V>,
        {
            type Output = $crate::graph::Op<
                $lt,
                <$crate::tensor::Tensor<T, S> as $crate::tensor::Binary<V>>::Output,
            >;

            fn $func(self, rhs: $rhs) -> Self::Output {
                $crate::graph::ops::$func(self, rhs)
            }
        }

        impl<'t, $($gen)*, T, S> ::std::ops::$trait<$rhs> for &'t $crate::tensor::Tensor<T, S>
        where
            't: $lt,
            T: $crate::backend::Float,
            S: $crate::tensor::Shape,
            V: $crate::tensor::Value<Elem = T>,
            $crate::tensor::Tensor<T, S>:
                $crate::tensor::Value<Elem = T> + $crate::tensor::Binary<V>,
        {
            type Output = $crate::graph::Op<
                $lt,
                <$crate::tensor::Tensor<T, S> as $crate::tensor::Binary<V>>::Output,
            >;

            fn $func(self, rhs: $rhs) -> Self::Output {
                $crate::graph::ops::$func(self, rhs)
            }
        }
    };
    (@scalar $s:ty, [$($gen:tt)*] $rhs:ty => $lt:lifetime, $trait:ident, $func:ident) => {
        impl<$($gen)*> ::std::ops::$trait<$rhs> for $s
        where
            V: $crate::tensor::Value<Elem = $s>,
            $s: $crate::tensor::Binary<V>,
        {
            type Output = $crate::graph::Op<$lt, <$s as $crate::tensor::Binary<V>>::Output>;

            fn $func(self, rhs: $rhs) -> Self::Output {
                $crate::graph::ops::$func(self, rhs)
            }
        }
    };
}

pub(crate) use {impl_const_lhs_ops, impl_graph_ops};

impl_graph_ops!(['v, V: Value] &'v Var<V> => 'v);
impl_graph_ops!(['a, V: Value] Op<'a, V> => 'a);
impl_graph_ops!(['r, 'a, V: Value] &'r Op<'a, V> => 'r);
impl_graph_ops!(['a, V: Value] Shared<'a, V> => 'a);
impl_graph_ops!(['r, 'a, V: Value] &'r Shared<'a, V> => 'r);

impl_const_lhs_ops!(['v, V: Value] &'v Var<V> => 'v);
impl_const_lhs_ops!(['a, V: Value] Op<'a, V> => 'a);
impl_const_lhs_ops!(['r, 'a, V: Value] &'r Op<'a, V> => 'r);
impl_const_lhs_ops!(['a, V: Value] Shared<'a, V> => 'a);
impl_const_lhs_ops!(['r, 'a, V: Value] &'r Shared<'a, V> => 'r);
