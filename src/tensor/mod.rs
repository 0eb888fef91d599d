pub mod broadcast;
pub mod convert;
pub mod matmul;
pub mod ops;
pub mod shape;


use std::fmt::{self, Debug};
use std::marker::PhantomData;

use crate::backend::Float;
use shape::{BroadcastTo, Compatible, Dims, Fits};

pub use matmul::{mat_mul, mat_mul_into};
pub use shape::{Broadcast, Dim, MAX_RANK, Rank0, Rank1, Rank2, Rank3, Rank4, Shape};

/// Dense tensor with a statically known shape.
///
/// Storage is row-major: index `i` of the leading axis selects a contiguous block of
/// `S::NUMEL / N` elements laid out as the inner shape. The buffer length always equals
/// `S::NUMEL`.
#[derive(Clone)]
pub struct Tensor<T, S: Shape> {
    data: Vec<T>,
    shape: PhantomData<S>,
}

impl<T: Float, S: Shape> Tensor<T, S> {
    /// Tensor with every element set to zero.
    pub fn zeros() -> Self {
        Self::full(T::zero())
    }

    pub fn ones() -> Self {
        Self::full(T::one())
    }

    /// Tensor with every element set to `value`.
    pub fn full(value: T) -> Self {
        Self {
            data: vec![value; S::NUMEL],
            shape: PhantomData,
        }
    }

    /// Builds a tensor from its flat row-major index.
    pub fn from_fn(f: impl FnMut(usize) -> T) -> Self {
        Self {
            data: (0..S::NUMEL).map(f).collect(),
            shape: PhantomData,
        }
    }

    /// Extents of `S`, outermost first.
    pub fn dims() -> Dims {
        Dims::of::<S>()
    }

    pub const fn rank() -> usize {
        S::RANK
    }

    pub const fn numel() -> usize {
        S::NUMEL
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Flat offset of a full multi-index. Panics if the index has the wrong rank or is out
    /// of bounds.
    fn offset(index: &[usize]) -> usize {
        let dims = Self::dims();
        let dims = dims.as_slice();
        assert_eq!(
            index.len(),
            dims.len(),
            "index {index:?} does not match shape {dims:?}"
        );
        index.iter().zip(dims).fold(0, |acc, (&i, &n)| {
            assert!(i < n, "index {index:?} out of bounds for shape {dims:?}");
            acc * n + i
        })
    }

    /// Element at a full multi-index.
    pub fn at(&self, index: &[usize]) -> T {
        self.data[Self::offset(index)]
    }

    pub fn at_mut(&mut self, index: &[usize]) -> &mut T {
        &mut self.data[Self::offset(index)]
    }

    /// Replaces every element with `f(element)`.
    pub fn apply(&mut self, f: impl Fn(T) -> T) -> &mut Self {
        for x in &mut self.data {
            *x = f(*x);
        }
        self
    }

    pub fn map(&self, f: impl Fn(T) -> T) -> Self {
        Self {
            data: self.data.iter().map(|&x| f(x)).collect(),
            shape: PhantomData,
        }
    }

    /// Elementwise combination with a tensor of the same shape.
    pub fn zip_with(&self, other: &Self, f: impl Fn(T, T) -> T) -> Self {
        Self {
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
            shape: PhantomData,
        }
    }
}

impl<T: Float, const N: usize, S: Shape> Tensor<T, Dim<N, S>> {
    /// Copy of the sub-tensor at index `i` of the leading axis.
    pub fn slice(&self, i: usize) -> Tensor<T, S> {
        assert!(i < N, "index {i} out of bounds for leading extent {N}");
        Tensor {
            data: self.data[i * S::NUMEL..(i + 1) * S::NUMEL].to_vec(),
            shape: PhantomData,
        }
    }

    /// Overwrites the sub-tensor at index `i` of the leading axis.
    pub fn set_slice(&mut self, i: usize, value: &Tensor<T, S>) {
        assert!(i < N, "index {i} out of bounds for leading extent {N}");
        self.data[i * S::NUMEL..(i + 1) * S::NUMEL].copy_from_slice(&value.data);
    }

    /// Stacks `N` sub-tensors produced by `f(i)` along a new leading axis.
    pub fn stack(mut f: impl FnMut(usize) -> Tensor<T, S>) -> Self {
        let mut data = Vec::with_capacity(N * S::NUMEL);
        for i in 0..N {
            data.extend_from_slice(&f(i).data);
        }
        Self {
            data,
            shape: PhantomData,
        }
    }
}

impl<T: Float> Tensor<T, Rank0> {
    pub fn scalar(value: T) -> Self {
        Self::full(value)
    }

    pub fn item(&self) -> T {
        self.data[0]
    }
}

impl<T: PartialEq, S: Shape> PartialEq for Tensor<T, S> {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl<T: Float, S: Shape> Default for Tensor<T, S> {
    fn default() -> Self {
        Self::zeros()
    }
}

impl<T: Debug, S: Shape> Debug for Tensor<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &Dims::of::<S>())
            .field("data", &self.data)
            .finish()
    }
}

// ----------------------------------------------------------------------------------------
// Values: the common interface of scalars and tensors
// ----------------------------------------------------------------------------------------

/// Anything a differentiable variable can hold: a bare scalar or a tensor.
///
/// Scalars are treated as rank-0 tensors, so every value has a static [`Shape`] and a flat
/// element buffer, which is all the broadcasting engine needs.
pub trait Value: Clone + Debug + 'static {
    type Elem: Float;
    type Shape: Shape;

    /// Value of this shape with every element zero.
    fn zero() -> Self;

    /// Value of this shape with every element set to `v`.
    fn filled(v: Self::Elem) -> Self;

    fn as_slice(&self) -> &[Self::Elem];

    fn as_mut_slice(&mut self) -> &mut [Self::Elem];

    fn map(&self, f: impl Fn(Self::Elem) -> Self::Elem) -> Self {
        let mut out = self.clone();
        for x in out.as_mut_slice() {
            *x = f(*x);
        }
        out
    }

    /// Elementwise combination with a value of the same type.
    fn zip_same(&self, other: &Self, f: impl Fn(Self::Elem, Self::Elem) -> Self::Elem) -> Self {
        let mut out = self.clone();
        for (x, &y) in out.as_mut_slice().iter_mut().zip(other.as_slice()) {
            *x = f(*x, y);
        }
        out
    }

    /// Clamps every element into `[lo, hi]`.
    fn clamp_inplace(&mut self, lo: Self::Elem, hi: Self::Elem) {
        for x in self.as_mut_slice() {
            *x = x.clamp_to(lo, hi);
        }
    }

    /// Sum of all elements.
    fn sum(&self) -> Self::Elem {
        self.as_slice().iter().copied().sum()
    }

    /// Largest element.
    fn max(&self) -> Self::Elem {
        let data = self.as_slice();
        assert!(!data.is_empty(), "max of an empty value");
        data[1..].iter().fold(data[0], |m, &x| m.max(x))
    }

    /// Euclidean norm, used in diagnostics.
    fn norm(&self) -> Self::Elem {
        self.as_slice().iter().map(|&x| x * x).sum::<Self::Elem>().sqrt()
    }

    /// In-place `self[i] = f(self[i], src[j])` over the joint broadcast shape. When `src`
    /// is larger than `self` along an axis, its slices fold into the same element.
    fn zip_assign<D>(&mut self, src: &D, f: impl Fn(Self::Elem, Self::Elem) -> Self::Elem)
    where
        D: Value<Elem = Self::Elem>,
    {
        let () = Compatible::<Self::Shape, D::Shape>::CHECK;
        let dst_dims = Dims::of::<Self::Shape>();
        let src_dims = Dims::of::<D::Shape>();
        broadcast::zip_assign(
            self.as_mut_slice(),
            dst_dims.as_slice(),
            src.as_slice(),
            src_dims.as_slice(),
            f,
        );
    }

    /// Adds `src` into `self`, summing any axes along which `src` is the larger.
    fn add_assign_from<D>(&mut self, src: &D)
    where
        D: Value<Elem = Self::Elem>,
    {
        self.zip_assign(src, |a, b| a + b);
    }
}

macro_rules! impl_scalar_value {
    ($($t:ty),*) => {
        $(
            impl Value for $t {
                type Elem = $t;
                type Shape = Rank0;

                fn zero() -> Self {
                    0.0
                }

                fn filled(v: $t) -> Self {
                    v
                }

                fn as_slice(&self) -> &[$t] {
                    std::slice::from_ref(self)
                }

                fn as_mut_slice(&mut self) -> &mut [$t] {
                    std::slice::from_mut(self)
                }
            }
        )*
    };
}

impl_scalar_value!(f32, f64);

impl<T: Float, S: Shape> Value for Tensor<T, S> {
    type Elem = T;
    type Shape = S;

    fn zero() -> Self {
        Tensor::zeros()
    }

    fn filled(v: T) -> Self {
        Tensor::full(v)
    }

    fn as_slice(&self) -> &[T] {
        &self.data
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

/// Broadcasts `a` and `b` into the explicitly named output value type `Out`.
///
/// Covers every NumPy-compatible combination, including ones where neither operand's
/// shape is the result (`[1, 3] ⊕ [4, 1] → [4, 3]`). `Out` must be exactly the broadcast of
/// the operand shapes.
pub fn zip_broadcast<Out, A, B>(a: &A, b: &B, f: impl Fn(A::Elem, A::Elem) -> A::Elem) -> Out
where
    A: Value,
    B: Value<Elem = A::Elem>,
    Out: Value<Elem = A::Elem>,
{
    let () = BroadcastTo::<Out::Shape, A::Shape, B::Shape>::CHECK;
    zip_into_value(a, b, f)
}

/// Same as [`zip_broadcast`] but only requires that both operands fit into `Out`; used by
/// the operators and the backward rules, whose output is one of the operand shapes.
pub(crate) fn zip_into_value<Out, A, B>(
    a: &A,
    b: &B,
    f: impl Fn(A::Elem, A::Elem) -> A::Elem,
) -> Out
where
    A: Value,
    B: Value<Elem = A::Elem>,
    Out: Value<Elem = A::Elem>,
{
    let () = Fits::<Out::Shape, A::Shape>::CHECK;
    let () = Fits::<Out::Shape, B::Shape>::CHECK;
    let mut out = Out::zero();
    let (od, ad, bd) = (
        Dims::of::<Out::Shape>(),
        Dims::of::<A::Shape>(),
        Dims::of::<B::Shape>(),
    );
    broadcast::zip_into(
        out.as_mut_slice(),
        od.as_slice(),
        a.as_slice(),
        ad.as_slice(),
        b.as_slice(),
        bd.as_slice(),
        f,
    );
    out
}

/// Result type of an elementwise binary operation between two values.
///
/// Scalars combine with scalars into scalars and with tensors into tensors; two tensors
/// produce the tensor whose shape [`Broadcast`] selects.
pub trait Binary<Rhs: Value<Elem = Self::Elem>>: Value {
    type Output: Value<Elem = Self::Elem>;

    fn zip(&self, rhs: &Rhs, f: impl Fn(Self::Elem, Self::Elem) -> Self::Elem) -> Self::Output {
        zip_into_value(self, rhs, f)
    }
}

impl<T: Float, L: Shape + Broadcast<R>, R: Shape> Binary<Tensor<T, R>> for Tensor<T, L> {
    type Output = Tensor<T, <L as Broadcast<R>>::Output>;
}

macro_rules! impl_scalar_binary {
    ($($t:ty),*) => {
        $(
            impl Binary<$t> for $t {
                type Output = $t;
            }

            impl<S: Shape> Binary<Tensor<$t, S>> for $t {
                type Output = Tensor<$t, S>;
            }

            impl<S: Shape> Binary<$t> for Tensor<$t, S> {
                type Output = Tensor<$t, S>;
            }
        )*
    };
}

impl_scalar_binary!(f32, f64);
