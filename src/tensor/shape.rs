//! Static shape descriptors.
//!
//! A shape is a type: [`Rank0`] is the scalar leaf and [`Dim<N, S>`] prepends an axis of
//! extent `N` to the shape `S`, mirroring the recursive layout of the storage (index `i` of
//! the leading axis of a `Dim<N, S>` is a contiguous `S`). Extents, rank and element count
//! are associated constants, so every shape question the operations need is answered while
//! compiling. Broadcast compatibility is checked through associated constants that fail to
//! evaluate for incompatible shapes, which turns a mismatch into a build error at the point
//! where the offending operation is instantiated.

use std::fmt::Debug;
use std::marker::PhantomData;

/// Highest rank a [`Shape`] may have.
pub const MAX_RANK: usize = 6;

/// Peano zero, the rank of [`Rank0`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Z;

/// Peano successor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Succ<R>(PhantomData<R>);

pub trait Shape: 'static + Copy + Default + Debug {
    /// Number of axes.
    const RANK: usize;
    /// Product of the extents (1 for a scalar).
    const NUMEL: usize;
    /// Extents, outermost first. Entries past `RANK` are zero.
    const DIMS: [usize; MAX_RANK];
    /// Rank as a type, used to select broadcast output shapes.
    type Rank;
}

/// The scalar shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rank0;

/// Shape `S` with a new leading axis of extent `N`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dim<const N: usize, S: Shape = Rank0>(PhantomData<S>);

pub type Rank1<const A: usize> = Dim<A>;
pub type Rank2<const A: usize, const B: usize> = Dim<A, Dim<B>>;
pub type Rank3<const A: usize, const B: usize, const C: usize> = Dim<A, Dim<B, Dim<C>>>;
pub type Rank4<const A: usize, const B: usize, const C: usize, const D: usize> =
    Dim<A, Dim<B, Dim<C, Dim<D>>>>;

impl Shape for Rank0 {
    const RANK: usize = 0;
    const NUMEL: usize = 1;
    const DIMS: [usize; MAX_RANK] = [0; MAX_RANK];
    type Rank = Z;
}

impl<const N: usize, S: Shape> Shape for Dim<N, S> {
    const RANK: usize = S::RANK + 1;
    const NUMEL: usize = N * S::NUMEL;
    const DIMS: [usize; MAX_RANK] = prepend(N, S::DIMS, S::RANK);
    type Rank = Succ<S::Rank>;
}

const fn prepend(n: usize, inner: [usize; MAX_RANK], rank: usize) -> [usize; MAX_RANK] {
    assert!(n > 0, "tensor extents must be positive");
    assert!(rank < MAX_RANK, "tensor rank exceeds MAX_RANK");
    let mut out = [0; MAX_RANK];
    out[0] = n;
    let mut i = 0;
    while i < rank {
        out[i + 1] = inner[i];
        i += 1;
    }
    out
}

/// Runtime copy of a shape's extents.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    buf: [usize; MAX_RANK],
    rank: usize,
}

impl Dims {
    pub const fn of<S: Shape>() -> Self {
        Dims {
            buf: S::DIMS,
            rank: S::RANK,
        }
    }

    /// Builds extents from a slice. Panics past [`MAX_RANK`].
    pub fn from_slice(dims: &[usize]) -> Self {
        assert!(dims.len() <= MAX_RANK, "rank {} exceeds MAX_RANK", dims.len());
        let mut buf = [0; MAX_RANK];
        buf[..dims.len()].copy_from_slice(dims);
        Dims {
            buf,
            rank: dims.len(),
        }
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.buf[..self.rank]
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn numel(&self) -> usize {
        self.as_slice().iter().product()
    }
}

impl Debug for Dims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

// ----------------------------------------------------------------------------------------
// Compile-time compatibility checks
// ----------------------------------------------------------------------------------------

/// True if `small` broadcasts into `big`: trailing-aligned, every axis of `small` either
/// equals the matching axis of `big` or is 1, and `small` has no more axes than `big`.
/// The last `skip` axes of both are ignored (matrix axes for matmul).
pub const fn fits_into(
    big: &[usize; MAX_RANK],
    big_rank: usize,
    small: &[usize; MAX_RANK],
    small_rank: usize,
    skip: usize,
) -> bool {
    if small_rank > big_rank {
        return false;
    }
    let offset = big_rank - small_rank;
    let mut i = 0;
    while i + skip < small_rank {
        let s = small[i];
        let b = big[i + offset];
        if s != b && s != 1 {
            return false;
        }
        i += 1;
    }
    true
}

/// True if the two shapes are mutually broadcastable (NumPy rule, trailing-aligned).
pub const fn compatible(
    a: &[usize; MAX_RANK],
    a_rank: usize,
    b: &[usize; MAX_RANK],
    b_rank: usize,
) -> bool {
    let (long, long_rank, short, short_rank) = if a_rank >= b_rank {
        (a, a_rank, b, b_rank)
    } else {
        (b, b_rank, a, a_rank)
    };
    let offset = long_rank - short_rank;
    let mut i = 0;
    while i < short_rank {
        let s = short[i];
        let l = long[i + offset];
        if s != l && s != 1 && l != 1 {
            return false;
        }
        i += 1;
    }
    true
}

/// True if `out` is exactly the broadcast of `a` and `b`.
pub const fn is_broadcast_of(
    out: &[usize; MAX_RANK],
    out_rank: usize,
    a: &[usize; MAX_RANK],
    a_rank: usize,
    b: &[usize; MAX_RANK],
    b_rank: usize,
) -> bool {
    if !compatible(a, a_rank, b, b_rank) {
        return false;
    }
    let rank = if a_rank > b_rank { a_rank } else { b_rank };
    if out_rank != rank {
        return false;
    }
    let mut i = 0;
    while i < rank {
        let ea = if i + a_rank >= rank { a[i + a_rank - rank] } else { 1 };
        let eb = if i + b_rank >= rank { b[i + b_rank - rank] } else { 1 };
        let e = if ea > eb { ea } else { eb };
        if out[i] != e {
            return false;
        }
        i += 1;
    }
    true
}

/// Associated constants that fail to evaluate when `Small` does not broadcast into `Big`.
pub struct Fits<Big, Small>(PhantomData<(Big, Small)>);

impl<Big: Shape, Small: Shape> Fits<Big, Small> {
    pub const CHECK: () = assert!(
        fits_into(&Big::DIMS, Big::RANK, &Small::DIMS, Small::RANK, 0),
        "operand shape does not broadcast into the result shape"
    );

    /// Same as `CHECK` but only over the batch axes (all but the last two).
    pub const CHECK_BATCH: () = assert!(
        fits_into(&Big::DIMS, Big::RANK, &Small::DIMS, Small::RANK, 2),
        "batch axes of the matmul operands are not broadcast-compatible"
    );
}

/// Fails to evaluate when `A` and `B` are not mutually broadcastable.
pub struct Compatible<A, B>(PhantomData<(A, B)>);

impl<A: Shape, B: Shape> Compatible<A, B> {
    pub const CHECK: () = assert!(
        compatible(&A::DIMS, A::RANK, &B::DIMS, B::RANK),
        "shapes are not broadcast-compatible"
    );
}

/// Fails to evaluate unless `Out` is the exact broadcast of `A` and `B`.
pub struct BroadcastTo<Out, A, B>(PhantomData<(Out, A, B)>);

impl<Out: Shape, A: Shape, B: Shape> BroadcastTo<Out, A, B> {
    pub const CHECK: () = assert!(
        is_broadcast_of(&Out::DIMS, Out::RANK, &A::DIMS, A::RANK, &B::DIMS, B::RANK),
        "result shape is not the broadcast of the operand shapes"
    );

    /// Same as `CHECK` but over the batch axes of three matrix shapes.
    pub const CHECK_BATCH: () = assert!(
        is_broadcast_of(
            &Out::DIMS,
            Out::RANK - 2,
            &A::DIMS,
            A::RANK - 2,
            &B::DIMS,
            B::RANK - 2,
        ),
        "batch axes of the result are not the broadcast of the operands' batch axes"
    );
}

// ----------------------------------------------------------------------------------------
// Result shape of binary operators
// ----------------------------------------------------------------------------------------

/// Chooses the operand whose shape a binary operator returns: the higher rank wins and the
/// left operand wins a tie. Implemented on pairs of type-level ranks.
pub trait Dominant<L: Shape, R: Shape> {
    type Output: Shape;
}

impl<L: Shape, R: Shape> Dominant<L, R> for (Z, Z) {
    type Output = L;
}

impl<L: Shape, R: Shape, A> Dominant<L, R> for (Succ<A>, Z) {
    type Output = L;
}

impl<L: Shape, R: Shape, B> Dominant<L, R> for (Z, Succ<B>) {
    type Output = R;
}

impl<L: Shape, R: Shape, A, B> Dominant<L, R> for (Succ<A>, Succ<B>)
where
    (A, B): Dominant<L, R>,
{
    type Output = <(A, B) as Dominant<L, R>>::Output;
}

/// Output shape of `Self ⊕ R` for elementwise operators.
///
/// The other operand must broadcast into the chosen shape; when neither operand covers the
/// other (`[1, 3] ⊕ [4, 1]`) use [`crate::tensor::zip_broadcast`] with an explicit output.
pub trait Broadcast<R: Shape>: Shape {
    type Output: Shape;
}

impl<L: Shape, R: Shape> Broadcast<R> for L
where
    (L::Rank, R::Rank): Dominant<L, R>,
{
    type Output = <(L::Rank, R::Rank) as Dominant<L, R>>::Output;
}

// ----------------------------------------------------------------------------------------
// Matrix shapes
// ----------------------------------------------------------------------------------------

/// Shapes of rank 2 or more, seen as a batch of matrices over the last two axes.
pub trait Matrix: Shape {
    /// The trailing `[rows, cols]` shape.
    type Trailing: Shape;
    /// This shape with the trailing matrix replaced by `M`.
    type Replace<M: Shape>: Shape;
}

macro_rules! impl_matrix {
    ($(($($b:ident),*)),* $(,)?) => {
        $(
            impl<$(const $b: usize,)* const M: usize, const N: usize> Matrix
                for impl_matrix!(@nest [$($b),*] Dim<M, Dim<N>>)
            {
                type Trailing = Dim<M, Dim<N>>;
                type Replace<X: Shape> = impl_matrix!(@nest [$($b),*] X);
            }
        )*
    };
    (@nest [] $inner:ty) => { $inner };
    (@nest [$first:ident $(, $rest:ident)*] $inner:ty) => {
        Dim<$first, impl_matrix!(@nest [$($rest),*] $inner)>
    };
}

impl_matrix!((), (B0), (B0, B1), (B0, B1, B2), (B0, B1, B2, B3));

/// Rank-2 kernel shapes for the three transpose combinations. The shared extent `J` appears
/// in both operands, so a mismatched inner dimension has no impl.
pub trait MatKernel<Rhs: Shape, const TA: bool, const TB: bool>: Shape {
    type Output: Shape;
    /// Rows of the result.
    const ROWS: usize;
    /// Contracted extent.
    const INNER: usize;
    /// Columns of the result.
    const COLS: usize;
}

// out[i,k] = Σ_j a[i,j]·b[j,k]
impl<const I: usize, const J: usize, const K: usize> MatKernel<Dim<J, Dim<K>>, false, false>
    for Dim<I, Dim<J>>
{
    type Output = Dim<I, Dim<K>>;
    const ROWS: usize = I;
    const INNER: usize = J;
    const COLS: usize = K;
}

// a stored as [J, I]
impl<const I: usize, const J: usize, const K: usize> MatKernel<Dim<J, Dim<K>>, true, false>
    for Dim<J, Dim<I>>
{
    type Output = Dim<I, Dim<K>>;
    const ROWS: usize = I;
    const INNER: usize = J;
    const COLS: usize = K;
}

// b stored as [K, J]
impl<const I: usize, const J: usize, const K: usize> MatKernel<Dim<K, Dim<J>>, false, true>
    for Dim<I, Dim<J>>
{
    type Output = Dim<I, Dim<K>>;
    const ROWS: usize = I;
    const INNER: usize = J;
    const COLS: usize = K;
}

/// Output shape of a batched matrix product: the batch axes of the dominant operand (higher
/// rank, left on a tie) followed by the kernel's `[I, K]`.
pub trait MatMulShape<R: Shape, const TA: bool, const TB: bool>: Shape {
    type Output: Shape;
}

impl<L, R, const TA: bool, const TB: bool> MatMulShape<R, TA, TB> for L
where
    L: Matrix + Broadcast<R>,
    R: Matrix,
    L::Trailing: MatKernel<R::Trailing, TA, TB>,
    <L as Broadcast<R>>::Output: Matrix,
{
    type Output = <<L as Broadcast<R>>::Output as Matrix>::Replace<
        <L::Trailing as MatKernel<R::Trailing, TA, TB>>::Output,
    >;
}

// ----------------------------------------------------------------------------------------
// Last-axis reduction
// ----------------------------------------------------------------------------------------

/// Shape with the last axis kept at extent 1, the result of reducing along it.
pub trait ReduceLast: Shape {
    type Keep: Shape;
    /// Extent of the reduced axis.
    const LAST: usize;
}

impl<const N: usize> ReduceLast for Dim<N, Rank0> {
    type Keep = Dim<1>;
    const LAST: usize = N;
}

impl<const N: usize, const M: usize, S: Shape> ReduceLast for Dim<N, Dim<M, S>>
where
    Dim<M, S>: ReduceLast,
{
    type Keep = Dim<N, <Dim<M, S> as ReduceLast>::Keep>;
    const LAST: usize = <Dim<M, S> as ReduceLast>::LAST;
}
