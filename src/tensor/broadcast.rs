//! Recursive broadcasting over flat row-major buffers.
//!
//! The walker only computes offsets; kernels read and write the buffers themselves. It
//! descends the leading axis of the result one level at a time:
//!
//! - an operand of lower rank than the current level is reused whole for every index;
//! - an operand of equal rank steps along the axis, or stays on its single slice when its
//!   extent is 1;
//! - once the level reaches the kernel rank `K` the kernel receives the three block offsets.

use super::shape::Dims;

#[inline]
fn numel(dims: &[usize]) -> usize {
    dims.iter().product()
}

/// NumPy broadcast of two extent lists. Panics when they are incompatible; typed callers
/// have already rejected that at compile time.
pub fn broadcast_dims(a: &[usize], b: &[usize]) -> Dims {
    let rank = a.len().max(b.len());
    let mut out = Vec::with_capacity(rank);
    for i in 0..rank {
        let ea = if i + a.len() >= rank { a[i + a.len() - rank] } else { 1 };
        let eb = if i + b.len() >= rank { b[i + b.len() - rank] } else { 1 };
        assert!(
            ea == eb || ea == 1 || eb == 1,
            "incompatible extents {ea} and {eb} on axis {i}"
        );
        out.push(ea.max(eb));
    }
    Dims::from_slice(&out)
}

/// Calls `kernel(out_offset, a_offset, b_offset)` once per rank-`k` block of `out`.
///
/// `out` must be the broadcast of `a` and `b` on every axis above the last `k`, and both
/// operands must have rank at least `k`.
pub fn for_each_block<F>(k: usize, out: &[usize], a: &[usize], b: &[usize], mut kernel: F)
where
    F: FnMut(usize, usize, usize),
{
    debug_assert!(a.len() >= k && b.len() >= k, "operand rank below kernel rank {k}");
    walk(k, out, a, b, 0, 0, 0, &mut kernel);
}

#[allow(clippy::too_many_arguments)]
fn walk<F>(
    k: usize,
    out: &[usize],
    a: &[usize],
    b: &[usize],
    o: usize,
    ia: usize,
    ib: usize,
    kernel: &mut F,
) where
    F: FnMut(usize, usize, usize),
{
    if out.len() <= k {
        kernel(o, ia, ib);
        return;
    }

    let n = out[0];
    let out_stride = numel(&out[1..]);
    // Operands whose rank matches the current level take part in this axis.
    let (a_next, a_stride) = if a.len() == out.len() {
        (&a[1..], if a[0] == 1 { 0 } else { numel(&a[1..]) })
    } else {
        (a, 0)
    };
    let (b_next, b_stride) = if b.len() == out.len() {
        (&b[1..], if b[0] == 1 { 0 } else { numel(&b[1..]) })
    } else {
        (b, 0)
    };

    for i in 0..n {
        walk(
            k,
            &out[1..],
            a_next,
            b_next,
            o + i * out_stride,
            ia + i * a_stride,
            ib + i * b_stride,
            kernel,
        );
    }
}

/// Elementwise `out[i] = f(a[ia], b[ib])` over the broadcast of the operands.
pub fn zip_into<T: Copy>(
    out: &mut [T],
    out_dims: &[usize],
    a: &[T],
    a_dims: &[usize],
    b: &[T],
    b_dims: &[usize],
    f: impl Fn(T, T) -> T,
) {
    debug_assert_eq!(out.len(), numel(out_dims));
    for_each_block(0, out_dims, a_dims, b_dims, |o, ia, ib| {
        out[o] = f(a[ia], b[ib]);
    });
}

/// In-place `dst[id] = f(dst[id], src[is])` over the joint broadcast shape.
///
/// When `src` is larger along an axis where `dst` has extent 1 (or is missing), every
/// source slice along that axis is folded into the same destination slot in order.
pub fn zip_assign<T: Copy>(
    dst: &mut [T],
    dst_dims: &[usize],
    src: &[T],
    src_dims: &[usize],
    f: impl Fn(T, T) -> T,
) {
    let joint = broadcast_dims(dst_dims, src_dims);
    for_each_block(0, joint.as_slice(), dst_dims, src_dims, |_, id, is| {
        dst[id] = f(dst[id], src[is]);
    });
}
