//! Traversal protocol every elementwise kernel and reduction is written against.
//!
//! This module provides:
//!
//! - [`apply1`], [`apply2`], [`apply3`]: visit the elements of one to three tensors with the
//!   same element count in row-major order, the first operand writable
//! - [`visit1`], [`visit2`]: the read-only counterparts
//! - [`dim_apply1`], [`dim_apply2`], [`dim_apply3`]: call a closure once per [`Lane`], a line
//!   of elements along one dimension, for every position of the other dimensions
//!
//! Each operand is walked with its own cursor. Size-1 dimensions are dropped and adjacent
//! dimensions that are contiguous with each other are merged first, so a contiguous tensor
//! is walked as one flat run with a single index. Operands with different layouts step
//! through runs of `min(remaining run of each operand)` elements.
//!
//! The `contiguous*` helpers are the fast path the arithmetic kernels take when every
//! operand is contiguous: they hand flat pointers to a dispatched vector primitive, splitting
//! the range over the rayon pool when it exceeds [`Config::parallel_threshold`].
//!
//! [`Config::parallel_threshold`]: crate::config::Config::parallel_threshold

use rayon::prelude::*;

use crate::config;
use crate::error::{arg_check, raise, Result, TensorError};
use crate::scalars::Numeric;
use crate::tensor::Tensor;

// region: Cursor

/// Drops size-1 dimensions and merges each dimension into the next when they are contiguous
/// with each other. Always returns at least one dimension.
fn collapse(size: &[usize], stride: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let mut out_size: Vec<usize> = Vec::with_capacity(size.len());
    let mut out_stride: Vec<usize> = Vec::with_capacity(size.len());
    for (&s, &st) in size.iter().zip(stride) {
        if s == 1 {
            continue;
        }
        match (out_size.last_mut(), out_stride.last_mut()) {
            (Some(outer_size), Some(outer_stride)) if *outer_stride == s * st => {
                *outer_size *= s;
                *outer_stride = st;
            }
            _ => {
                out_size.push(s);
                out_stride.push(st);
            }
        }
    }
    if out_size.is_empty() {
        out_size.push(1);
        out_stride.push(1);
    }
    (out_size, out_stride)
}

/// Position inside one operand: the offset of the current element and how many elements
/// remain in the current innermost run.
struct Cursor {
    size: Vec<usize>,
    stride: Vec<usize>,
    counter: Vec<usize>,
    offset: usize,
    remaining: usize,
}

impl Cursor {
    fn new<T: Numeric>(tensor: &Tensor<T>) -> Self {
        let (size, stride) = collapse(tensor.sizes(), tensor.strides());
        let remaining = size[size.len() - 1];
        Self {
            counter: vec![0; size.len()],
            size,
            stride,
            offset: 0,
            remaining,
        }
    }

    #[inline]
    fn inner_stride(&self) -> usize {
        self.stride[self.stride.len() - 1]
    }

    fn advance(&mut self, n: usize) {
        let last = self.size.len() - 1;
        self.remaining -= n;
        self.offset += n * self.stride[last];
        if self.remaining > 0 {
            return;
        }
        self.offset -= self.size[last] * self.stride[last];
        for d in (0..last).rev() {
            self.counter[d] += 1;
            self.offset += self.stride[d];
            if self.counter[d] < self.size[d] {
                break;
            }
            self.offset -= self.counter[d] * self.stride[d];
            self.counter[d] = 0;
        }
        self.remaining = self.size[last];
    }
}

fn same_count<A: Numeric, B: Numeric>(a: &Tensor<A>, b: &Tensor<B>) -> Result<()> {
    if a.n_element() != b.n_element() {
        return Err(raise(TensorError::shape_mismatch(a.sizes(), b.sizes())));
    }
    Ok(())
}

// endregion: Cursor

// region: Apply

/// Calls `f` on every element of `a`.
pub fn apply1<A, F>(a: &mut Tensor<A>, mut f: F) -> Result<()>
where
    A: Numeric,
    F: FnMut(&mut A),
{
    let n = a.n_element();
    if n == 0 {
        return Ok(());
    }
    a.check_extent(1)?;
    let pa = a.data();
    let mut ca = Cursor::new(a);
    let mut done = 0;
    while done < n {
        let run = ca.remaining;
        let sa = ca.inner_stride();
        for i in 0..run {
            unsafe { f(&mut *pa.add(ca.offset + i * sa)) };
        }
        ca.advance(run);
        done += run;
    }
    Ok(())
}

/// Calls `f` on matching elements of `a` and `b`.
///
/// `b`'s element is read before `a`'s is borrowed, so `b` may share `a`'s storage.
pub fn apply2<A, B, F>(a: &mut Tensor<A>, b: &Tensor<B>, mut f: F) -> Result<()>
where
    A: Numeric,
    B: Numeric,
    F: FnMut(&mut A, B),
{
    same_count(a, b)?;
    let n = a.n_element();
    if n == 0 {
        return Ok(());
    }
    a.check_extent(1)?;
    b.check_extent(2)?;
    let (pa, pb) = (a.data(), b.data() as *const B);
    let (mut ca, mut cb) = (Cursor::new(a), Cursor::new(b));
    let mut done = 0;
    while done < n {
        let run = ca.remaining.min(cb.remaining);
        let (sa, sb) = (ca.inner_stride(), cb.inner_stride());
        for i in 0..run {
            unsafe {
                let vb = pb.add(cb.offset + i * sb).read();
                f(&mut *pa.add(ca.offset + i * sa), vb);
            }
        }
        ca.advance(run);
        cb.advance(run);
        done += run;
    }
    Ok(())
}

/// Calls `f` on matching elements of `a`, `b` and `c`.
pub fn apply3<A, B, C, F>(a: &mut Tensor<A>, b: &Tensor<B>, c: &Tensor<C>, mut f: F) -> Result<()>
where
    A: Numeric,
    B: Numeric,
    C: Numeric,
    F: FnMut(&mut A, B, C),
{
    same_count(a, b)?;
    same_count(a, c)?;
    let n = a.n_element();
    if n == 0 {
        return Ok(());
    }
    a.check_extent(1)?;
    b.check_extent(2)?;
    c.check_extent(3)?;
    let (pa, pb, pc) = (a.data(), b.data() as *const B, c.data() as *const C);
    let (mut ca, mut cb, mut cc) = (Cursor::new(a), Cursor::new(b), Cursor::new(c));
    let mut done = 0;
    while done < n {
        let run = ca.remaining.min(cb.remaining).min(cc.remaining);
        let (sa, sb, sc) = (ca.inner_stride(), cb.inner_stride(), cc.inner_stride());
        for i in 0..run {
            unsafe {
                let vb = pb.add(cb.offset + i * sb).read();
                let vc = pc.add(cc.offset + i * sc).read();
                f(&mut *pa.add(ca.offset + i * sa), vb, vc);
            }
        }
        ca.advance(run);
        cb.advance(run);
        cc.advance(run);
        done += run;
    }
    Ok(())
}

/// Reads every element of `a` in row-major order.
pub fn visit1<A, F>(a: &Tensor<A>, mut f: F) -> Result<()>
where
    A: Numeric,
    F: FnMut(A),
{
    let n = a.n_element();
    if n == 0 {
        return Ok(());
    }
    a.check_extent(1)?;
    let pa = a.data() as *const A;
    let mut ca = Cursor::new(a);
    let mut done = 0;
    while done < n {
        let run = ca.remaining;
        let sa = ca.inner_stride();
        for i in 0..run {
            f(unsafe { pa.add(ca.offset + i * sa).read() });
        }
        ca.advance(run);
        done += run;
    }
    Ok(())
}

/// Reads matching elements of `a` and `b`.
pub fn visit2<A, B, F>(a: &Tensor<A>, b: &Tensor<B>, mut f: F) -> Result<()>
where
    A: Numeric,
    B: Numeric,
    F: FnMut(A, B),
{
    same_count(a, b)?;
    let n = a.n_element();
    if n == 0 {
        return Ok(());
    }
    a.check_extent(1)?;
    b.check_extent(2)?;
    let (pa, pb) = (a.data() as *const A, b.data() as *const B);
    let (mut ca, mut cb) = (Cursor::new(a), Cursor::new(b));
    let mut done = 0;
    while done < n {
        let run = ca.remaining.min(cb.remaining);
        let (sa, sb) = (ca.inner_stride(), cb.inner_stride());
        for i in 0..run {
            unsafe { f(pa.add(ca.offset + i * sa).read(), pb.add(cb.offset + i * sb).read()) };
        }
        ca.advance(run);
        cb.advance(run);
        done += run;
    }
    Ok(())
}

// endregion: Apply

// region: Dimension Apply

/// Elements of one tensor along a single dimension.
///
/// Reads and writes go straight to the shared storage, like [`Tensor::set1d`]. Indexing
/// past [`Lane::len`] panics.
pub struct Lane<T> {
    ptr: *mut T,
    stride: usize,
    len: usize,
}

impl<T: Numeric> Lane<T> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn get(&self, i: usize) -> T {
        assert!(i < self.len, "lane index {} out of range for length {}", i, self.len);
        unsafe { self.ptr.add(i * self.stride).read() }
    }

    #[inline]
    pub fn set(&self, i: usize, value: T) {
        assert!(i < self.len, "lane index {} out of range for length {}", i, self.len);
        unsafe { self.ptr.add(i * self.stride).write(value) }
    }

    #[inline]
    pub fn swap(&self, i: usize, j: usize) {
        let (a, b) = (self.get(i), self.get(j));
        self.set(i, b);
        self.set(j, a);
    }

    pub fn to_vec(&self) -> Vec<T> {
        (0..self.len).map(|i| self.get(i)).collect()
    }
}

/// Odometer over every dimension except the one being walked.
struct DimWalk {
    size: Vec<usize>,
    dim: usize,
    counter: Vec<usize>,
}

impl DimWalk {
    fn new(size: &[usize], dim: usize) -> Self {
        Self {
            size: size.to_vec(),
            dim,
            counter: vec![0; size.len()],
        }
    }

    fn offset(&self, stride: &[usize]) -> usize {
        self.counter.iter().zip(stride).map(|(&c, &s)| c * s).sum()
    }

    /// Moves to the next lane; `false` once every lane has been visited.
    fn step(&mut self) -> bool {
        for d in (0..self.size.len()).rev() {
            if d == self.dim {
                continue;
            }
            self.counter[d] += 1;
            if self.counter[d] < self.size[d] {
                return true;
            }
            self.counter[d] = 0;
        }
        false
    }
}

fn lane<T: Numeric>(tensor: &Tensor<T>, dim: usize, walk: &DimWalk) -> Lane<T> {
    Lane {
        ptr: tensor.data().wrapping_add(walk.offset(tensor.strides())),
        stride: tensor.strides()[dim],
        len: tensor.sizes()[dim],
    }
}

/// Same rank and same sizes on every dimension but `dim`.
fn same_lanes<A: Numeric, B: Numeric>(a: &Tensor<A>, b: &Tensor<B>, dim: usize) -> Result<()> {
    let matching = a.n_dimension() == b.n_dimension()
        && a
            .sizes()
            .iter()
            .zip(b.sizes())
            .enumerate()
            .all(|(d, (x, y))| d == dim || x == y);
    if !matching {
        return Err(raise(TensorError::shape_mismatch(a.sizes(), b.sizes())));
    }
    Ok(())
}

/// Calls `f` once per lane of `a` along `dim`.
pub fn dim_apply1<A, F>(a: &Tensor<A>, dim: usize, mut f: F) -> Result<()>
where
    A: Numeric,
    F: FnMut(&Lane<A>),
{
    arg_check!(dim < a.n_dimension(), 2, "dimension {} out of range", dim);
    if a.n_element() == 0 {
        return Ok(());
    }
    a.check_extent(1)?;
    let mut walk = DimWalk::new(a.sizes(), dim);
    loop {
        f(&lane(a, dim, &walk));
        if !walk.step() {
            return Ok(());
        }
    }
}

/// Calls `f` once per pair of matching lanes of `a` and `b` along `dim`.
///
/// The tensors must agree on every dimension except `dim`.
pub fn dim_apply2<A, B, F>(a: &Tensor<A>, b: &Tensor<B>, dim: usize, mut f: F) -> Result<()>
where
    A: Numeric,
    B: Numeric,
    F: FnMut(&Lane<A>, &Lane<B>),
{
    arg_check!(dim < a.n_dimension(), 3, "dimension {} out of range", dim);
    same_lanes(a, b, dim)?;
    if a.n_element() == 0 || b.n_element() == 0 {
        return Ok(());
    }
    a.check_extent(1)?;
    b.check_extent(2)?;
    let mut walk = DimWalk::new(a.sizes(), dim);
    loop {
        f(&lane(a, dim, &walk), &lane(b, dim, &walk));
        if !walk.step() {
            return Ok(());
        }
    }
}

pub fn dim_apply3<A, B, C, F>(a: &Tensor<A>, b: &Tensor<B>, c: &Tensor<C>, dim: usize, mut f: F) -> Result<()>
where
    A: Numeric,
    B: Numeric,
    C: Numeric,
    F: FnMut(&Lane<A>, &Lane<B>, &Lane<C>),
{
    arg_check!(dim < a.n_dimension(), 4, "dimension {} out of range", dim);
    same_lanes(a, b, dim)?;
    same_lanes(a, c, dim)?;
    if a.n_element() == 0 || b.n_element() == 0 || c.n_element() == 0 {
        return Ok(());
    }
    a.check_extent(1)?;
    b.check_extent(2)?;
    c.check_extent(3)?;
    let mut walk = DimWalk::new(a.sizes(), dim);
    loop {
        f(
            &lane(a, dim, &walk),
            &lane(b, dim, &walk),
            &lane(c, dim, &walk),
        );
        if !walk.step() {
            return Ok(());
        }
    }
}

// endregion: Dimension Apply

// region: Contiguous Fast Path

#[derive(Clone, Copy)]
struct SendPtr<T>(*mut T);

unsafe impl<T> Send for SendPtr<T> {}
unsafe impl<T> Sync for SendPtr<T> {}

impl<T> SendPtr<T> {
    #[inline]
    fn at(self, offset: usize) -> *mut T {
        self.0.wrapping_add(offset)
    }
}

/// Whether `n` elements at `a` and `n` elements at `b` share memory without coinciding.
fn partially_overlaps<A, B>(a: *const A, b: *const B, n: usize) -> bool {
    let (a, b) = (a as usize, b as usize);
    let a_bytes = n * core::mem::size_of::<A>();
    let b_bytes = n * core::mem::size_of::<B>();
    let coincide = a == b && a_bytes == b_bytes;
    !coincide && a < b + b_bytes && b < a + a_bytes
}

/// Runs `body(start, len)` over `[0, n)`, fanning out above the parallel threshold.
fn for_ranges<F>(n: usize, parallel: bool, body: F)
where
    F: Fn(usize, usize) + Sync + Send,
{
    let threshold = config::get().parallel_threshold;
    let threads = rayon::current_num_threads();
    if !parallel || n <= threshold || threads < 2 {
        body(0, n);
        return;
    }
    let chunk = n.div_ceil(threads);
    (0..n.div_ceil(chunk)).into_par_iter().for_each(|c| {
        let start = c * chunk;
        body(start, chunk.min(n - start));
    });
}

fn flat<U: Numeric>(t: &Tensor<U>, n: usize) -> bool {
    t.n_element() == n && t.is_contiguous() && t.check_extent(0).is_ok()
}

/// Runs `kernel` over `r`'s flat buffer when it is contiguous. Returns `false` otherwise.
pub(crate) fn contiguous1<T, K>(r: &Tensor<T>, kernel: K) -> bool
where
    T: Numeric,
    K: Fn(*mut T, usize) + Sync + Send,
{
    let n = r.n_element();
    if n == 0 || !flat(r, n) {
        return false;
    }
    let pr = SendPtr(r.data());
    for_ranges(n, true, |start, len| kernel(pr.at(start), len));
    true
}

/// Runs `kernel` over matching flat ranges of `r` and `t` when both are contiguous with the
/// same element count. Returns `false` otherwise.
pub(crate) fn contiguous2<T, U, K>(r: &Tensor<T>, t: &Tensor<U>, kernel: K) -> bool
where
    T: Numeric,
    U: Numeric,
    K: Fn(*mut T, *const U, usize) + Sync + Send,
{
    let n = r.n_element();
    if n == 0 || !flat(r, n) || !flat(t, n) {
        return false;
    }
    let (pr, pt) = (SendPtr(r.data()), SendPtr(t.data()));
    let parallel = !partially_overlaps(pr.0, pt.0, n);
    for_ranges(n, parallel, |start, len| {
        kernel(pr.at(start), pt.at(start), len)
    });
    true
}

pub(crate) fn contiguous3<T, K>(r: &Tensor<T>, a: &Tensor<T>, b: &Tensor<T>, kernel: K) -> bool
where
    T: Numeric,
    K: Fn(*mut T, *const T, *const T, usize) + Sync + Send,
{
    let n = r.n_element();
    if n == 0 || !flat(r, n) || !flat(a, n) || !flat(b, n) {
        return false;
    }
    let (pr, pa, pb) = (SendPtr(r.data()), SendPtr(a.data()), SendPtr(b.data()));
    let parallel = !partially_overlaps(pr.0, pa.0, n) && !partially_overlaps(pr.0, pb.0, n);
    for_ranges(n, parallel, |start, len| {
        kernel(pr.at(start), pa.at(start), pb.at(start), len)
    });
    true
}

// endregion: Contiguous Fast Path

#[cfg(test)]
mod tests {
    use super::*;

    fn iota(sizes: &[usize]) -> Tensor<i32> {
        let n: usize = sizes.iter().product();
        Tensor::from_vec((0..n as i32).collect(), sizes).unwrap()
    }

    #[test]
    fn collapse_merges_contiguous_dims() {
        assert_eq!(collapse(&[2, 3, 4], &[12, 4, 1]), (vec![24], vec![1]));
        assert_eq!(collapse(&[4, 3], &[1, 4]), (vec![4, 3], vec![1, 4]));
        assert_eq!(collapse(&[1, 1], &[5, 5]), (vec![1], vec![1]));
        assert_eq!(collapse(&[2, 1, 3], &[3, 99, 1]), (vec![6], vec![1]));
    }

    #[test]
    fn apply_visits_row_major_order() {
        let t = iota(&[3, 4]);
        let transposed = t.new_transpose(0, 1).unwrap();
        let mut seen = Vec::new();
        visit1(&transposed, |v| seen.push(v)).unwrap();
        assert_eq!(seen, vec![0, 4, 8, 1, 5, 9, 2, 6, 10, 3, 7, 11]);
        assert_eq!(seen, transposed.to_vec().unwrap());
    }

    #[test]
    fn apply_mixes_layouts() {
        let src = iota(&[2, 3]);
        let mut dst = Tensor::<f64>::with_size_2d(3, 2).unwrap().new_transpose(0, 1).unwrap();
        apply2(&mut dst, &src, |d, s| *d = s as f64 * 0.5).unwrap();
        assert_eq!(dst.to_vec().unwrap(), vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5]);
        assert_eq!(dst.get2d(1, 0).unwrap(), 1.5);
    }

    #[test]
    fn apply_in_place_aliasing() {
        let mut t = iota(&[4]);
        let alias = t.clone();
        apply2(&mut t, &alias, |d, s| *d = s * 10).unwrap();
        assert_eq!(t.to_vec().unwrap(), vec![0, 10, 20, 30]);
    }

    #[test]
    fn apply_three_operands() {
        let a = iota(&[2, 2]);
        let b = a.new_transpose(0, 1).unwrap();
        let mut out = Tensor::<i64>::with_size_1d(4).unwrap();
        apply3(&mut out, &a, &b, |o, x, y| *o = (x * 10 + y) as i64).unwrap();
        assert_eq!(out.to_vec().unwrap(), vec![0, 12, 21, 33]);
    }

    #[test]
    fn apply_reads_broadcast_operands() {
        let mut row = iota(&[1, 3]);
        row.expand_nd(&[2, 3]).unwrap();
        let mut column = iota(&[2, 1]);
        column.expand_nd(&[2, 3]).unwrap();
        assert_eq!((row.strides(), column.strides()), (&[0, 1][..], &[1, 0][..]));

        let mut out = Tensor::<i32>::with_size_2d(2, 3).unwrap();
        apply3(&mut out, &row, &column, |o, x, y| *o = x * 10 + y).unwrap();
        assert_eq!(out.to_vec().unwrap(), vec![0, 10, 20, 1, 11, 21]);

        let mut batched = iota(&[3]);
        batched.expand_nd(&[4, 3]).unwrap();
        let mut copies = Tensor::<i64>::with_size_2d(4, 3).unwrap();
        apply2(&mut copies, &batched, |d, s| *d = s as i64).unwrap();
        assert_eq!(copies.to_vec().unwrap(), vec![0i64, 1, 2].repeat(4));
    }

    #[test]
    fn apply_rejects_different_counts() {
        let mut a = iota(&[3]);
        let b = iota(&[4]);
        let err = apply2(&mut a, &b, |_, _| {}).unwrap_err();
        assert!(matches!(err, TensorError::ShapeMismatch { .. }));
    }

    #[test]
    fn dim_apply_walks_each_lane() {
        let t = iota(&[2, 3]);
        let mut sums = Vec::new();
        dim_apply1(&t, 1, |lane| sums.push((0..lane.len()).map(|i| lane.get(i)).sum::<i32>())).unwrap();
        assert_eq!(sums, vec![3, 12]);

        let mut columns = Vec::new();
        dim_apply1(&t, 0, |lane| columns.push(lane.to_vec())).unwrap();
        assert_eq!(columns, vec![vec![0, 3], vec![1, 4], vec![2, 5]]);
        assert_eq!(dim_apply1(&t, 2, |_| {}).unwrap_err().arg(), Some(2));
    }

    #[test]
    fn dim_apply_writes_reduced_lane() {
        let t = iota(&[2, 3]);
        let r = Tensor::<i32>::with_size_2d(2, 1).unwrap();
        dim_apply2(&r, &t, 1, |out, src| {
            out.set(0, src.to_vec().into_iter().max().unwrap_or(0));
        })
        .unwrap();
        assert_eq!(r.to_vec().unwrap(), vec![2, 5]);

        let wrong = Tensor::<i32>::with_size_2d(3, 1).unwrap();
        assert!(dim_apply2(&wrong, &t, 1, |_, _| {}).is_err());
    }

    #[test]
    fn contiguous_fast_path_covers_large_ranges() {
        let n = config::get().parallel_threshold * 2 + 3;
        let r = Tensor::<f32>::with_size_1d(n).unwrap();
        assert!(contiguous1(&r, |p, len| unsafe { (f32::vector().fill)(p, 1.5, len) }));
        let mut total = 0.0f64;
        visit1(&r, |v| total += v as f64).unwrap();
        assert_eq!(total, 1.5 * n as f64);

        let transposed = Tensor::<f32>::with_size_2d(2, 3).unwrap().new_transpose(0, 1).unwrap();
        assert!(!contiguous1(&transposed, |_, _| {}));
    }

    #[test]
    fn overlap_detection() {
        let buffer = [0u32; 8];
        let p = buffer.as_ptr();
        assert!(!partially_overlaps(p, p, 8));
        assert!(partially_overlaps(p, p.wrapping_add(1), 4));
        assert!(!partially_overlaps(p, p.wrapping_add(4), 4));
    }
}
