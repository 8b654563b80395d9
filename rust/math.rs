//! Elementwise kernels, reductions and linear-algebra glue.
//!
//! Every operation is a method on the tensor receiving the result, `r.op(&t, ...)`, which
//! is first resized to the shape the operation produces. Passing a clone of the receiver
//! as the source, `t.op(&t.clone(), ...)`, computes in place since clones share storage.
//!
//! - Scalar and pointwise arithmetic: [`Tensor::add`], [`Tensor::mul`], [`Tensor::div`],
//!   [`Tensor::clamp`], [`Tensor::cadd`], [`Tensor::cmul`], [`Tensor::cdiv`],
//!   [`Tensor::addcmul`], [`Tensor::addcdiv`]. Contiguous operands go through the dispatched
//!   vector primitives, split over the rayon pool for large inputs.
//! - Whole-tensor reductions returning a scalar: [`Tensor::sumall`], [`Tensor::maxall`],
//!   [`Tensor::dot`], [`Tensor::trace`] and, for floats, [`Tensor::normall`] and friends.
//! - Reductions along a dimension, which keep that dimension with length 1:
//!   [`Tensor::sum`], [`Tensor::max`], [`Tensor::mean`], [`Tensor::std`], [`Tensor::norm`].
//! - Masked and indexed access with `u8` masks and 0-based `i64` indices.
//! - Matrix products through the portable [`blas`](crate::blas) routines.
//!
//! Sums and products accumulate in [`Numeric::Accum`]. Integer kinds wrap on overflow.

use crate::apply::{apply1, apply2, apply3, contiguous1, contiguous2, contiguous3, dim_apply2, dim_apply3, visit1, visit2};
use crate::blas::{self, Transpose};
use crate::config;
use crate::error::{arg_check, argument_error, raise, Result, TensorError};
use crate::scalars::{FloatNumeric, Kind, Numeric};
use crate::tensor::Tensor;

/// Fails for the half kind, which has no kernels for `operation`.
pub(crate) fn reject_half<T: Numeric>(operation: &'static str) -> Result<()> {
    if T::KIND == Kind::Half {
        return Err(raise(TensorError::NotSupported {
            operation,
            kind: T::KIND,
        }));
    }
    Ok(())
}

fn dims(sizes: &[usize]) -> Vec<i64> {
    sizes.iter().map(|&s| s as i64).collect()
}

/// Sizes of `t` with `dim` forced to 1.
fn reduced(t: &[usize], dim: usize) -> Vec<i64> {
    let mut shape = dims(t);
    shape[dim] = 1;
    shape
}

/// Validates a 0-based index read from an index tensor.
fn position(index: i64, size: usize, arg: usize) -> Result<usize> {
    match usize::try_from(index) {
        Ok(i) if i < size => Ok(i),
        _ => argument_error(arg, format!("index {} out of range for size {}", index, size)),
    }
}

fn check_mask(mask: &Tensor<u8>) -> Result<usize> {
    let (mut ones, mut invalid) = (0usize, false);
    visit1(mask, |m| match m {
        0 => {}
        1 => ones += 1,
        _ => invalid = true,
    })?;
    if invalid {
        return argument_error(0, "Mask tensor can take 0 and 1 values only");
    }
    Ok(ones)
}

/// Integer kinds cannot divide by zero.
fn check_divisor<T: Numeric>(divisor: &Tensor<T>, arg: usize) -> Result<()> {
    if T::KIND.is_floating() {
        return Ok(());
    }
    let mut zero = false;
    visit1(divisor, |v| zero |= v == T::ZERO)?;
    arg_check!(!zero, arg, "integer division by zero");
    Ok(())
}

impl<T: Numeric> Tensor<T> {
    fn map_from<U, F>(&mut self, t: &Tensor<U>, f: F) -> Result<()>
    where
        U: Numeric,
        F: Fn(U) -> T,
    {
        self.resize_as(t)?;
        apply2(self, t, |d, v| *d = f(v))
    }

    // region: Fill

    pub fn fill(&mut self, value: T) -> Result<()> {
        if contiguous1(self, |p, n| unsafe { (T::vector().fill)(p, value, n) }) {
            return Ok(());
        }
        apply1(self, |x| *x = value)
    }

    pub fn zero(&mut self) -> Result<()> {
        self.fill(T::ZERO)
    }

    /// Resizes to `sizes` and fills with zeros.
    pub fn zeros(&mut self, sizes: &[usize]) -> Result<()> {
        self.resize(&dims(sizes), None)?;
        self.zero()
    }

    pub fn ones(&mut self, sizes: &[usize]) -> Result<()> {
        self.resize(&dims(sizes), None)?;
        self.fill(T::ONE)
    }

    /// Resizes to `sizes` and copies `t` in row-major order.
    pub fn reshape(&mut self, t: &Tensor<T>, sizes: &[usize]) -> Result<()> {
        let src = t.clone();
        self.resize(&dims(sizes), None)?;
        self.copy(&src)
    }

    // endregion: Fill

    // region: Masked And Indexed

    /// Writes `value` wherever `mask` is 1.
    pub fn masked_fill(&mut self, mask: &Tensor<u8>, value: T) -> Result<()> {
        check_mask(mask)?;
        apply2(self, mask, |x, m| {
            if m == 1 {
                *x = value
            }
        })
    }

    /// Writes the elements of `src`, in order, wherever `mask` is 1.
    ///
    /// `src` must have exactly as many elements as `mask` has ones.
    pub fn masked_copy(&mut self, mask: &Tensor<u8>, src: &Tensor<T>) -> Result<()> {
        let ones = check_mask(mask)?;
        arg_check!(ones == src.n_element(), 0, "Number of elements of src != mask");
        let values = src.to_vec()?;
        let mut next = values.into_iter();
        apply2(self, mask, |x, m| {
            if m == 1 {
                if let Some(v) = next.next() {
                    *x = v;
                }
            }
        })
    }

    /// Resizes to a vector of the elements of `src` where `mask` is 1.
    pub fn masked_select(&mut self, src: &Tensor<T>, mask: &Tensor<u8>) -> Result<()> {
        let ones = check_mask(mask)?;
        let mut selected = Vec::with_capacity(ones);
        visit2(src, mask, |v, m| {
            if m == 1 {
                selected.push(v)
            }
        })?;
        self.resize(&[ones as i64], None)?;
        let mut next = selected.into_iter();
        apply1(self, |x| {
            if let Some(v) = next.next() {
                *x = v;
            }
        })
    }

    /// Gathers the slices of `src` along `dim` listed in `index`.
    pub fn index_select(&mut self, src: &Tensor<T>, dim: usize, index: &Tensor<i64>) -> Result<()> {
        arg_check!(index.n_dimension() == 1, 3, "Index is supposed to be a vector");
        arg_check!(dim < src.n_dimension(), 4, "Indexing dim is out of bounds");
        arg_check!(src.n_dimension() > 0, 2, "Source tensor is empty");

        let positions = index.to_vec()?;
        let mut shape = dims(src.sizes());
        shape[dim] = positions.len() as i64;
        self.resize(&shape, None)?;

        for (i, &at) in positions.iter().enumerate() {
            let at = position(at, src.sizes()[dim], 3)?;
            if src.n_dimension() > 1 {
                self.new_select(dim, i)?.copy(&src.new_select(dim, at)?)?;
            } else {
                self.set1d(i, src.get1d(at)?)?;
            }
        }
        Ok(())
    }

    /// Scatters the slices of `src` along `dim` to the positions listed in `index`.
    pub fn index_copy(&mut self, dim: usize, index: &Tensor<i64>, src: &Tensor<T>) -> Result<()> {
        let numel = index.n_element();
        arg_check!(index.n_dimension() == 1, 3, "Index is supposed to be a vector");
        arg_check!(dim < src.n_dimension(), 4, "Indexing dim is out of bounds");
        arg_check!(
            numel == src.sizes()[dim],
            4,
            "Number of indices should be equal to source:size(dim)"
        );
        arg_check!(dim < self.n_dimension(), 2, "Indexing dim is out of bounds");

        for (i, &at) in index.to_vec()?.iter().enumerate() {
            let at = position(at, self.sizes()[dim], 3)?;
            if self.n_dimension() > 1 {
                self.new_select(dim, at)?.copy(&src.new_select(dim, i)?)?;
            } else {
                self.set1d(at, src.get1d(i)?)?;
            }
        }
        Ok(())
    }

    /// Fills the slices along `dim` listed in `index`.
    pub fn index_fill(&mut self, dim: usize, index: &Tensor<i64>, value: T) -> Result<()> {
        arg_check!(index.n_dimension() == 1, 3, "Index is supposed to be a vector");
        arg_check!(dim < self.n_dimension(), 4, "Indexing dim is out of bounds");

        for &at in index.to_vec()?.iter() {
            let at = position(at, self.sizes()[dim], 3)?;
            if self.n_dimension() > 1 {
                self.new_select(dim, at)?.fill(value)?;
            } else {
                self.set1d(at, value)?;
            }
        }
        Ok(())
    }

    // endregion: Masked And Indexed

    // region: Whole Tensor Reductions

    /// Sum of the products of matching elements; the shapes may differ.
    pub fn dot(&self, src: &Tensor<T>) -> Result<T::Accum> {
        reject_half::<T>("dot")?;
        let n = self.n_element();
        if n > 0 && n == src.n_element() && self.is_contiguous() && src.is_contiguous() {
            self.check_extent(1)?;
            src.check_extent(2)?;
            return Ok(unsafe { blas::dot(n, src.data(), 1, self.data(), 1) });
        }
        let mut sum = <T::Accum as Numeric>::ZERO;
        visit2(self, src, |a, b| sum = sum.add(a.to_accum().mul(b.to_accum())))?;
        Ok(sum)
    }

    pub fn minall(&self) -> Result<T> {
        arg_check!(self.n_dimension() > 0, 1, "tensor must have one dimension");
        let mut best: Option<T> = None;
        visit1(self, |v| match best {
            Some(b) if !(v < b) => {}
            _ => best = Some(v),
        })?;
        best.ok_or_else(|| raise(TensorError::argument(1, "tensor must have one dimension")))
    }

    pub fn maxall(&self) -> Result<T> {
        arg_check!(self.n_dimension() > 0, 1, "tensor must have one dimension");
        let mut best: Option<T> = None;
        visit1(self, |v| match best {
            Some(b) if !(v > b) => {}
            _ => best = Some(v),
        })?;
        best.ok_or_else(|| raise(TensorError::argument(1, "tensor must have one dimension")))
    }

    pub fn sumall(&self) -> Result<T::Accum> {
        let mut sum = <T::Accum as Numeric>::ZERO;
        visit1(self, |v| sum = sum.add(v.to_accum()))?;
        Ok(sum)
    }

    pub fn prodall(&self) -> Result<T::Accum> {
        let mut prod = <T::Accum as Numeric>::ONE;
        visit1(self, |v| prod = prod.mul(v.to_accum()))?;
        Ok(prod)
    }

    /// Sum of the main diagonal of a matrix.
    pub fn trace(&self) -> Result<T::Accum> {
        arg_check!(self.n_dimension() == 2, 1, "not a matrix");
        let diagonal = self.sizes()[0].min(self.sizes()[1]);
        let mut sum = <T::Accum as Numeric>::ZERO;
        for i in 0..diagonal {
            sum = sum.add(self.get2d(i, i)?.to_accum());
        }
        Ok(sum)
    }

    // endregion: Whole Tensor Reductions

    // region: Pointwise

    /// `self = t + value`.
    pub fn add(&mut self, t: &Tensor<T>, value: T) -> Result<()> {
        self.resize_as(t)?;
        if contiguous2(self, t, |r, s, n| unsafe { (T::vector().adds)(r, s, value, n) }) {
            return Ok(());
        }
        apply2(self, t, |r, s| *r = s.add(value))
    }

    /// `self = t * value`.
    pub fn mul(&mut self, t: &Tensor<T>, value: T) -> Result<()> {
        self.resize_as(t)?;
        if contiguous2(self, t, |r, s, n| unsafe { (T::vector().mul)(r, s, value, n) }) {
            return Ok(());
        }
        apply2(self, t, |r, s| *r = s.mul(value))
    }

    /// `self = t / value`.
    pub fn div(&mut self, t: &Tensor<T>, value: T) -> Result<()> {
        arg_check!(
            T::KIND.is_floating() || value != T::ZERO,
            3,
            "integer division by zero"
        );
        self.resize_as(t)?;
        if contiguous2(self, t, |r, s, n| unsafe { (T::vector().div)(r, s, value, n) }) {
            return Ok(());
        }
        apply2(self, t, |r, s| *r = s.div(value))
    }

    /// Limits every element of `t` to `[min, max]`.
    pub fn clamp(&mut self, t: &Tensor<T>, min: T, max: T) -> Result<()> {
        let clamp = move |v: T| {
            if v < min {
                min
            } else if v > max {
                max
            } else {
                v
            }
        };
        self.resize_as(t)?;
        let done = contiguous2(self, t, |r, s, n| unsafe {
            for i in 0..n {
                *r.add(i) = clamp(*s.add(i));
            }
        });
        if done {
            return Ok(());
        }
        apply2(self, t, |r, s| *r = clamp(s))
    }

    /// `self = t + value * src`.
    pub fn cadd(&mut self, t: &Tensor<T>, value: T, src: &Tensor<T>) -> Result<()> {
        self.resize_as(t)?;
        let done = if self.is_set_to(t) {
            contiguous2(self, src, |r, s, n| unsafe { (T::vector().add)(r, s, value, n) })
        } else {
            contiguous3(self, t, src, |r, a, b, n| unsafe { (T::vector().cadd)(r, a, b, value, n) })
        };
        if done {
            return Ok(());
        }
        apply3(self, t, src, |r, a, b| *r = a.add(value.mul(b)))
    }

    /// `self = t * src`, elementwise.
    pub fn cmul(&mut self, t: &Tensor<T>, src: &Tensor<T>) -> Result<()> {
        self.resize_as(t)?;
        if contiguous3(self, t, src, |r, a, b, n| unsafe { (T::vector().cmul)(r, a, b, n) }) {
            return Ok(());
        }
        apply3(self, t, src, |r, a, b| *r = a.mul(b))
    }

    /// `self = t / src`, elementwise.
    pub fn cdiv(&mut self, t: &Tensor<T>, src: &Tensor<T>) -> Result<()> {
        check_divisor(src, 3)?;
        self.resize_as(t)?;
        if contiguous3(self, t, src, |r, a, b, n| unsafe { (T::vector().cdiv)(r, a, b, n) }) {
            return Ok(());
        }
        apply3(self, t, src, |r, a, b| *r = a.div(b))
    }

    /// `self = t + value * src1 * src2`.
    pub fn addcmul(&mut self, t: &Tensor<T>, value: T, src1: &Tensor<T>, src2: &Tensor<T>) -> Result<()> {
        if !self.is_set_to(t) {
            self.resize_as(t)?;
            self.copy(t)?;
        }
        apply3(self, src1, src2, |r, a, b| *r = r.add(value.mul(a).mul(b)))
    }

    /// `self = t + value * src1 / src2`.
    pub fn addcdiv(&mut self, t: &Tensor<T>, value: T, src1: &Tensor<T>, src2: &Tensor<T>) -> Result<()> {
        check_divisor(src2, 5)?;
        if !self.is_set_to(t) {
            self.resize_as(t)?;
            self.copy(t)?;
        }
        apply3(self, src1, src2, |r, a, b| *r = r.add(value.mul(a).div(b)))
    }

    /// 1 for positive elements, -1 for negative ones and 0 otherwise.
    pub fn sign(&mut self, t: &Tensor<T>) -> Result<()> {
        self.map_from(t, |v| {
            if v > T::ZERO {
                T::ONE
            } else if v < T::ZERO {
                T::ONE.neg()
            } else {
                T::ZERO
            }
        })
    }

    pub fn abs(&mut self, t: &Tensor<T>) -> Result<()> {
        self.map_from(t, |v| v.abs())
    }

    pub fn neg(&mut self, t: &Tensor<T>) -> Result<()> {
        self.map_from(t, |v| v.neg())
    }

    // endregion: Pointwise

    // region: Dimension Reductions

    /// Largest element of every lane along `dim` and its 0-based position.
    ///
    /// Ties keep the first occurrence.
    pub fn max(&mut self, indices: &mut Tensor<i64>, t: &Tensor<T>, dim: usize) -> Result<()> {
        self.extremum(indices, t, dim, |candidate, best| candidate > best)
    }

    /// Smallest element of every lane along `dim` and its 0-based position.
    pub fn min(&mut self, indices: &mut Tensor<i64>, t: &Tensor<T>, dim: usize) -> Result<()> {
        self.extremum(indices, t, dim, |candidate, best| candidate < best)
    }

    fn extremum<F>(&mut self, indices: &mut Tensor<i64>, t: &Tensor<T>, dim: usize, better: F) -> Result<()>
    where
        F: Fn(T, T) -> bool,
    {
        arg_check!(dim < t.n_dimension(), 2, "dimension out of range");
        let shape = reduced(t.sizes(), dim);
        self.resize(&shape, None)?;
        indices.resize(&shape, None)?;
        dim_apply3(t, self, indices, dim, |src, values, positions| {
            let (mut best, mut at) = (src.get(0), 0);
            for i in 1..src.len() {
                let v = src.get(i);
                if better(v, best) {
                    best = v;
                    at = i;
                }
            }
            values.set(0, best);
            positions.set(0, at as i64);
        })
    }

    pub fn sum(&mut self, t: &Tensor<T>, dim: usize) -> Result<()> {
        arg_check!(dim < t.n_dimension(), 2, "dimension out of range");
        self.resize(&reduced(t.sizes(), dim), None)?;
        dim_apply2(t, self, dim, |src, out| {
            let mut sum = <T::Accum as Numeric>::ZERO;
            for i in 0..src.len() {
                sum = sum.add(src.get(i).to_accum());
            }
            out.set(0, T::from_accum(sum));
        })
    }

    pub fn prod(&mut self, t: &Tensor<T>, dim: usize) -> Result<()> {
        arg_check!(dim < t.n_dimension(), 2, "dimension out of range");
        self.resize(&reduced(t.sizes(), dim), None)?;
        dim_apply2(t, self, dim, |src, out| {
            let mut prod = <T::Accum as Numeric>::ONE;
            for i in 0..src.len() {
                prod = prod.mul(src.get(i).to_accum());
            }
            out.set(0, T::from_accum(prod));
        })
    }

    /// Running sums along `dim`.
    pub fn cumsum(&mut self, t: &Tensor<T>, dim: usize) -> Result<()> {
        arg_check!(dim < t.n_dimension(), 2, "dimension out of range");
        self.resize_as(t)?;
        dim_apply2(t, self, dim, |src, out| {
            let mut sum = <T::Accum as Numeric>::ZERO;
            for i in 0..src.len() {
                sum = sum.add(src.get(i).to_accum());
                out.set(i, T::from_accum(sum));
            }
        })
    }

    pub fn cumprod(&mut self, t: &Tensor<T>, dim: usize) -> Result<()> {
        arg_check!(dim < t.n_dimension(), 2, "dimension out of range");
        self.resize_as(t)?;
        dim_apply2(t, self, dim, |src, out| {
            let mut prod = <T::Accum as Numeric>::ONE;
            for i in 0..src.len() {
                prod = prod.mul(src.get(i).to_accum());
                out.set(i, T::from_accum(prod));
            }
        })
    }

    // endregion: Dimension Reductions

    // region: Structured

    /// Cross product of 3-element lanes along `dim`, or along the first dimension of size 3
    /// when `dim` is `None`.
    pub fn cross(&mut self, a: &Tensor<T>, b: &Tensor<T>, dim: Option<usize>) -> Result<()> {
        arg_check!(a.is_same_size_as(b), 0, "inconsistent tensor sizes");
        let dim = match dim {
            Some(dim) => dim,
            None => match a.sizes().iter().position(|&s| s == 3) {
                Some(dim) => dim,
                None => return argument_error(0, "no dimension of size 3"),
            },
        };
        arg_check!(dim < a.n_dimension(), 3, "dimension out of range");
        arg_check!(a.sizes()[dim] == 3, 3, "dimension size is not 3");

        self.resize_as(a)?;
        dim_apply3(a, b, self, dim, |x, y, out| {
            let c0 = x.get(1).mul(y.get(2)).sub(x.get(2).mul(y.get(1)));
            let c1 = x.get(2).mul(y.get(0)).sub(x.get(0).mul(y.get(2)));
            let c2 = x.get(0).mul(y.get(1)).sub(x.get(1).mul(y.get(0)));
            out.set(0, c0);
            out.set(1, c1);
            out.set(2, c2);
        })
    }

    /// Builds a square matrix with `t` on diagonal `k` from a vector, or extracts diagonal
    /// `k` of a matrix. Positive `k` is above the main diagonal.
    pub fn diag(&mut self, t: &Tensor<T>, k: i64) -> Result<()> {
        arg_check!(
            t.n_dimension() == 1 || t.n_dimension() == 2,
            1,
            "matrix or a vector expected"
        );
        let shift = k.unsigned_abs() as usize;
        let (row0, col0) = if k >= 0 { (0, shift) } else { (shift, 0) };
        if t.n_dimension() == 1 {
            let values = t.to_vec()?;
            let sz = values.len() + shift;
            self.resize_2d(sz, sz)?;
            self.zero()?;
            for (i, v) in values.into_iter().enumerate() {
                self.set2d(row0 + i, col0 + i, v)?;
            }
        } else {
            let (rows, cols) = (t.sizes()[0] as i64, t.sizes()[1] as i64);
            let sz = if k >= 0 { rows.min(cols - k) } else { (rows + k).min(cols) };
            self.resize(&[sz], None)?;
            for i in 0..sz.max(0) as usize {
                let v = t.get2d(row0 + i, col0 + i)?;
                self.set1d(i, v)?;
            }
        }
        Ok(())
    }

    /// `n x m` matrix with ones on the main diagonal; `m == 0` means square.
    pub fn eye(&mut self, n: usize, m: usize) -> Result<()> {
        arg_check!(n > 0, 1, "invalid argument");
        let m = if m == 0 { n } else { m };
        self.resize_2d(n, m)?;
        self.zero()?;
        for i in 0..n.min(m) {
            self.set2d(i, i, T::ONE)?;
        }
        Ok(())
    }

    /// Vector `xmin, xmin + step, ...` up to and including `xmax`.
    pub fn range(&mut self, xmin: T, xmax: T, step: T) -> Result<()> {
        arg_check!(step > T::ZERO || step < T::ZERO, 3, "step must be a non-null number");
        arg_check!(
            (step > T::ZERO && xmax >= xmin) || (step < T::ZERO && xmax <= xmin),
            2,
            "upper bound and larger bound incoherent with step sign"
        );
        let size = xmax.sub(xmin).div(step).to_i64() + 1;
        self.resize(&[size], None)?;
        let mut i = 0i64;
        apply1(self, |x| {
            *x = xmin.add(T::from_i64(i).mul(step));
            i += 1;
        })
    }

    /// Lower triangle of a matrix: keeps column `c` of row `r` when `c <= r + k`.
    pub fn tril(&mut self, t: &Tensor<T>, k: i64) -> Result<()> {
        arg_check!(t.n_dimension() == 2, 1, "not a matrix");
        self.triangle(t, |r, c| c <= r + k)
    }

    /// Upper triangle of a matrix: keeps column `c` of row `r` when `c >= r + k`.
    pub fn triu(&mut self, t: &Tensor<T>, k: i64) -> Result<()> {
        arg_check!(t.n_dimension() == 2, 1, "not a matrix");
        self.triangle(t, |r, c| c >= r + k)
    }

    fn triangle<F: Fn(i64, i64) -> bool>(&mut self, t: &Tensor<T>, keep: F) -> Result<()> {
        let cols = t.sizes()[1] as i64;
        self.resize_as(t)?;
        let mut at = 0i64;
        apply2(self, t, |r, v| {
            *r = if keep(at / cols, at % cols) { v } else { T::ZERO };
            at += 1;
        })
    }

    /// Concatenates `ta` and `tb` along `dim`. Missing trailing dimensions count as size 1.
    pub fn cat(&mut self, ta: &Tensor<T>, tb: &Tensor<T>, dim: usize) -> Result<()> {
        let ndim = ta.n_dimension().max(tb.n_dimension()).max(dim + 1);
        let extent = |t: &Tensor<T>, d: usize| t.sizes().get(d).copied().unwrap_or(1);
        let mut shape = Vec::with_capacity(ndim);
        for d in 0..ndim {
            let (a, b) = (extent(ta, d), extent(tb, d));
            if d == dim {
                shape.push((a + b) as i64);
            } else {
                arg_check!(a == b, 0, "inconsistent tensor sizes");
                shape.push(a as i64);
            }
        }
        let (a, b) = (ta.clone(), tb.clone());
        self.resize(&shape, None)?;
        let split = extent(&a, dim);
        self.new_narrow(dim, 0, split)?.copy(&a)?;
        self.new_narrow(dim, split, extent(&b, dim))?.copy(&b)
    }

    // endregion: Structured

    // region: Linear Algebra

    /// `self = beta * t + alpha * mat * vec`.
    pub fn addmv(&mut self, beta: T, t: &Tensor<T>, alpha: T, mat: &Tensor<T>, vec: &Tensor<T>) -> Result<()> {
        reject_half::<T>("addmv")?;
        arg_check!(
            mat.n_dimension() == 2 && vec.n_dimension() == 1,
            0,
            "matrix and vector expected"
        );
        arg_check!(mat.sizes()[1] == vec.sizes()[0], 0, "size mismatch");
        arg_check!(t.n_dimension() == 1, 0, "size mismatch");
        arg_check!(t.sizes()[0] == mat.sizes()[0], 0, "size mismatch");
        if !self.is_set_to(t) {
            self.resize_as(t)?;
            self.copy(t)?;
        }
        vec.check_extent(6)?;
        self.check_extent(1)?;

        let (rows, cols) = (mat.sizes()[0], mat.sizes()[1]);
        let (trans, m, n, matrix) = if mat.strides()[0] == 1 {
            (Transpose::No, rows, cols, mat.clone())
        } else if mat.strides()[1] == 1 {
            (Transpose::Yes, cols, rows, mat.clone())
        } else {
            (Transpose::Yes, cols, rows, mat.new_contiguous()?)
        };
        matrix.check_extent(5)?;
        let lda = match trans {
            Transpose::No => matrix.strides()[1],
            Transpose::Yes => matrix.strides()[0],
        };
        unsafe {
            blas::gemv(
                trans,
                m,
                n,
                alpha,
                matrix.data(),
                lda,
                vec.data(),
                vec.strides()[0],
                beta,
                self.data(),
                self.strides()[0],
            )
        };
        Ok(())
    }

    /// `self = beta * t + alpha * m1 * m2`.
    pub fn addmm(&mut self, beta: T, t: &Tensor<T>, alpha: T, m1: &Tensor<T>, m2: &Tensor<T>) -> Result<()> {
        reject_half::<T>("addmm")?;
        arg_check!(
            m1.n_dimension() == 2 && m2.n_dimension() == 2,
            0,
            "matrix and matrix expected"
        );
        arg_check!(t.n_dimension() == 2, 0, "size mismatch");
        arg_check!(
            t.sizes()[0] == m1.sizes()[0] && t.sizes()[1] == m2.sizes()[1] && m1.sizes()[1] == m2.sizes()[0],
            0,
            "size mismatch"
        );
        if !self.is_set_to(t) {
            self.resize_as(t)?;
            self.copy(t)?;
        }

        // Column-major routine: a row-major result is computed as its transpose, which swaps
        // the operands. A result with neither unit stride is staged in a column-major copy.
        let (transpose_r, staging, m1, m2) = if self.strides()[0] == 1 {
            (false, None, m1, m2)
        } else if self.strides()[1] == 1 {
            (true, None, m2, m1)
        } else {
            let mut staged = Tensor::with_size_2d(self.sizes()[1], self.sizes()[0])?;
            staged.transpose(0, 1)?;
            staged.copy(self)?;
            (false, Some(staged), m1, m2)
        };
        let (i0, i1) = if transpose_r { (1, 0) } else { (0, 1) };
        let (a, transa, lda) = gemm_operand(m1, transpose_r)?;
        let (b, transb, ldb) = gemm_operand(m2, transpose_r)?;
        {
            let r = staging.as_ref().unwrap_or(&*self);
            r.check_extent(1)?;
            a.check_extent(5)?;
            b.check_extent(6)?;
            unsafe {
                blas::gemm(
                    transa,
                    transb,
                    r.sizes()[i0],
                    r.sizes()[i1],
                    a.sizes()[i1],
                    alpha,
                    a.data(),
                    lda,
                    b.data(),
                    ldb,
                    beta,
                    r.data(),
                    r.strides()[i1],
                )
            };
        }
        if let Some(staged) = staging {
            staged.free_copy_to(self)?;
        }
        Ok(())
    }

    /// `self = beta * t + alpha * vec1 * vec2^T`.
    pub fn addr(&mut self, beta: T, t: &Tensor<T>, alpha: T, vec1: &Tensor<T>, vec2: &Tensor<T>) -> Result<()> {
        reject_half::<T>("addr")?;
        arg_check!(
            vec1.n_dimension() == 1 && vec2.n_dimension() == 1,
            0,
            "vector and vector expected"
        );
        arg_check!(t.n_dimension() == 2, 0, "size mismatch");
        arg_check!(
            t.sizes()[0] == vec1.sizes()[0] && t.sizes()[1] == vec2.sizes()[0],
            0,
            "size mismatch"
        );
        if !self.is_set_to(t) {
            self.resize_as(t)?;
            self.copy(t)?;
        }
        if beta == T::ZERO {
            self.zero()?;
        } else if beta != T::ONE {
            self.mul(&self.clone(), beta)?;
        }
        vec1.check_extent(5)?;
        vec2.check_extent(6)?;
        let (n1, n2) = (vec1.sizes()[0], vec2.sizes()[0]);
        let (s1, s2) = (vec1.strides()[0], vec2.strides()[0]);

        if self.strides()[0] == 1 {
            self.check_extent(1)?;
            unsafe { blas::ger(n1, n2, alpha, vec1.data(), s1, vec2.data(), s2, self.data(), self.strides()[1]) };
        } else if self.strides()[1] == 1 {
            self.check_extent(1)?;
            unsafe { blas::ger(n2, n1, alpha, vec2.data(), s2, vec1.data(), s1, self.data(), self.strides()[0]) };
        } else {
            let staged = self.new_clone()?;
            unsafe {
                blas::ger(n2, n1, alpha, vec2.data(), s2, vec1.data(), s1, staged.data(), staged.strides()[0])
            };
            staged.free_copy_to(self)?;
        }
        Ok(())
    }

    /// Batched matrix product: `self[b] = batch1[b] * batch2[b]`.
    pub fn bmm(&mut self, batch1: &Tensor<T>, batch2: &Tensor<T>) -> Result<()> {
        arg_check!(batch1.n_dimension() == 3, 1, "expected 3D tensor");
        arg_check!(batch2.n_dimension() == 3, 2, "expected 3D tensor");
        arg_check!(
            batch1.sizes()[0] == batch2.sizes()[0],
            2,
            "equal number of batches expected"
        );
        arg_check!(batch1.sizes()[2] == batch2.sizes()[1], 2, "wrong matrix size");

        let batches = batch1.sizes()[0];
        self.resize_3d(batches, batch1.sizes()[1], batch2.sizes()[2])?;
        for b in 0..batches {
            let mut result = self.new_select(0, b)?;
            let current = result.clone();
            result.addmm(T::ZERO, &current, T::ONE, &batch1.new_select(0, b)?, &batch2.new_select(0, b)?)?;
        }
        Ok(())
    }

    /// `self[i][j] = gain * ||m1[i] - m2[j]||^2` over the rows of `m1` and `m2`, each
    /// flattened past its first dimension.
    pub fn match_(&mut self, m1: &Tensor<T>, m2: &Tensor<T>, gain: T) -> Result<()> {
        arg_check!(m1.n_dimension() > 0, 1, "empty tensor");
        arg_check!(m2.n_dimension() > 0, 2, "empty tensor");
        let (n1, n2) = (m1.sizes()[0], m2.sizes()[0]);
        let (w1, w2) = (m1.n_element() / n1, m2.n_element() / n2);
        arg_check!(w1 == w2, 3, "m1 and m2 must have the same inner vector dim");
        let a = m1.to_vec()?;
        let b = m2.to_vec()?;

        self.resize_2d(n1, n2)?;
        for i in 0..n1 {
            let row = &a[i * w1..(i + 1) * w1];
            for j in 0..n2 {
                let sum = row
                    .iter()
                    .zip(&b[j * w2..(j + 1) * w2])
                    .fold(T::ZERO, |acc, (&x, &y)| {
                        let term = x.sub(y);
                        acc.add(term.mul(term))
                    });
                self.set2d(i, j, gain.mul(sum))?;
            }
        }
        Ok(())
    }

    // endregion: Linear Algebra
}

/// Picks how `m` enters a column-major product: the tensor to read, its orientation and its
/// leading dimension.
fn gemm_operand<T: Numeric>(m: &Tensor<T>, transpose_r: bool) -> Result<(Tensor<T>, Transpose, usize)> {
    let (i0, i1) = if transpose_r { (1, 0) } else { (0, 1) };
    let (operand, trans) = if m.strides()[i0] == 1 {
        (m.clone(), Transpose::No)
    } else if m.strides()[i1] == 1 {
        (m.clone(), Transpose::Yes)
    } else {
        let trans = if transpose_r { Transpose::No } else { Transpose::Yes };
        (m.new_contiguous()?, trans)
    };
    let ld = match trans {
        Transpose::No => operand.strides()[i1],
        Transpose::Yes => operand.strides()[i0],
    };
    Ok((operand, trans, ld))
}

// region: Byte

impl Tensor<u8> {
    /// Bitwise AND of every element, as a truth value.
    pub fn logical_all(&self) -> Result<bool> {
        arg_check!(self.n_dimension() > 0, 1, "empty Tensor");
        let mut acc = 1u8;
        visit1(self, |v| acc &= v)?;
        Ok(acc != 0)
    }

    /// Bitwise OR of every element, as a truth value.
    pub fn logical_any(&self) -> Result<bool> {
        arg_check!(self.n_dimension() > 0, 1, "empty Tensor");
        let mut acc = 0u8;
        visit1(self, |v| acc |= v)?;
        Ok(acc != 0)
    }
}

// endregion: Byte

// region: Floating Point

macro_rules! unary_float {
    ($($name:ident => $f:expr;)+) => {
        $(
            pub fn $name(&mut self, t: &Tensor<T>) -> Result<()> {
                self.map_from(t, $f)
            }
        )+
    };
}

impl<T: FloatNumeric> Tensor<T> {
    unary_float! {
        log => |x: T| x.ln();
        log1p => |x: T| x.ln_1p();
        exp => |x: T| x.exp();
        cos => |x: T| x.cos();
        acos => |x: T| x.acos();
        cosh => |x: T| x.cosh();
        sin => |x: T| x.sin();
        asin => |x: T| x.asin();
        sinh => |x: T| x.sinh();
        tan => |x: T| x.tan();
        atan => |x: T| x.atan();
        tanh => |x: T| x.tanh();
        sqrt => |x: T| x.sqrt();
        rsqrt => |x: T| T::ONE.div(x.sqrt());
        sigmoid => |x: T| T::ONE.div(T::ONE.add(x.neg().exp()));
        ceil => |x: T| x.ceil();
        floor => |x: T| x.floor();
        round => |x: T| x.round();
        trunc => |x: T| x.trunc();
        frac => |x: T| x.fract();
    }

    /// Raises every element of `t` to `value`.
    pub fn pow(&mut self, t: &Tensor<T>, value: T) -> Result<()> {
        self.map_from(t, |x| x.powf(value))
    }

    /// Elementwise `atan(tx / ty)` using the signs of both to pick the quadrant.
    pub fn atan2(&mut self, tx: &Tensor<T>, ty: &Tensor<T>) -> Result<()> {
        self.resize_as(tx)?;
        apply3(self, tx, ty, |r, x, y| *r = x.atan2(y))
    }

    /// `self = a + weight * (b - a)`.
    pub fn lerp(&mut self, a: &Tensor<T>, b: &Tensor<T>, weight: T) -> Result<()> {
        self.resize_as(a)?;
        apply3(self, a, b, |r, x, y| *r = x.add(weight.mul(y.sub(x))))
    }

    pub fn mean(&mut self, t: &Tensor<T>, dim: usize) -> Result<()> {
        arg_check!(dim < t.n_dimension(), 2, "invalid dimension");
        self.resize(&reduced(t.sizes(), dim), None)?;
        dim_apply2(t, self, dim, |src, out| {
            let sum: f64 = (0..src.len()).map(|i| src.get(i).to_f64()).sum();
            out.set(0, T::from_f64(sum / src.len() as f64));
        })
    }

    /// Standard deviation along `dim`. `biased` divides by `n` instead of `n - 1`.
    pub fn std(&mut self, t: &Tensor<T>, dim: usize, biased: bool) -> Result<()> {
        arg_check!(dim < t.n_dimension(), 3, "invalid dimension");
        self.moments(t, dim, biased, f64::sqrt)
    }

    /// Variance along `dim`, clamped at zero.
    pub fn var(&mut self, t: &Tensor<T>, dim: usize, biased: bool) -> Result<()> {
        arg_check!(dim < t.n_dimension(), 3, "invalid dimension");
        self.moments(t, dim, biased, |v| v)
    }

    fn moments<F: Fn(f64) -> f64>(&mut self, t: &Tensor<T>, dim: usize, biased: bool, finish: F) -> Result<()> {
        self.resize(&reduced(t.sizes(), dim), None)?;
        dim_apply2(t, self, dim, |src, out| {
            let n = src.len() as f64;
            let (mut sum, mut sum2) = (0.0f64, 0.0f64);
            for i in 0..src.len() {
                let z = src.get(i).to_f64();
                sum += z;
                sum2 += z * z;
            }
            let mean = sum / n;
            let variance = if biased {
                sum2 / n - mean * mean
            } else {
                sum2 / (n - 1.0) - n / (n - 1.0) * mean * mean
            };
            let variance = if variance < 0.0 { 0.0 } else { variance };
            out.set(0, T::from_f64(finish(variance)));
        })
    }

    /// `p`-norm of every lane along `dim`; `p == 0` counts the non-zero elements.
    pub fn norm(&mut self, t: &Tensor<T>, p: T, dim: usize) -> Result<()> {
        arg_check!(dim < t.n_dimension(), 3, "invalid dimension");
        self.resize(&reduced(t.sizes(), dim), None)?;
        let p = p.to_f64();
        dim_apply2(t, self, dim, |src, out| {
            let values = (0..src.len()).map(|i| src.get(i).to_f64());
            let norm = if p == 0.0 {
                values.filter(|&v| v != 0.0).count() as f64
            } else {
                values.map(|v| v.abs().powf(p)).sum::<f64>().powf(1.0 / p)
            };
            out.set(0, T::from_f64(norm));
        })
    }

    /// `p`-norm of the whole tensor; `p == 0` counts the non-zero elements.
    pub fn normall(&self, p: T) -> Result<f64> {
        let p = p.to_f64();
        let mut sum = 0.0f64;
        if p == 0.0 {
            visit1(self, |v| sum += if v != T::ZERO { 1.0 } else { 0.0 })?;
            Ok(sum)
        } else if p == 1.0 {
            visit1(self, |v| sum += v.to_f64().abs())?;
            Ok(sum)
        } else if p == 2.0 {
            visit1(self, |v| sum += v.to_f64() * v.to_f64())?;
            Ok(sum.sqrt())
        } else {
            visit1(self, |v| sum += v.to_f64().abs().powf(p))?;
            Ok(sum.powf(1.0 / p))
        }
    }

    /// Rescales every slice of `src` along `dim` whose `p`-norm exceeds `maxnorm` down to
    /// `maxnorm`, copying the others unchanged.
    pub fn renorm(&mut self, src: &Tensor<T>, p: T, dim: usize, maxnorm: T) -> Result<()> {
        arg_check!(dim < src.n_dimension(), 3, "invalid dimension");
        arg_check!(p > T::ZERO, 2, "non-positive-norm not supported");
        arg_check!(src.n_dimension() > 1, 1, "need at least 2 dimensions");

        let epsilon = T::from_f64(config::get().renorm_epsilon);
        let src = src.clone();
        self.resize_as(&src)?;
        for i in 0..src.sizes()[dim] {
            let row_s = src.new_select(dim, i)?;
            let mut row_r = self.new_select(dim, i)?;
            let mut norm = T::ZERO;
            if p == T::ONE {
                visit1(&row_s, |v| norm = norm.add(v.abs()))?;
            } else {
                visit1(&row_s, |v| norm = norm.add(v.abs().powf(p)))?;
            }
            norm = norm.powf(T::ONE.div(p));

            if norm > maxnorm {
                let scale = maxnorm.div(norm.add(epsilon));
                apply2(&mut row_r, &row_s, |r, s| *r = s.mul(scale))?;
            } else {
                row_r.copy(&row_s)?;
            }
        }
        Ok(())
    }

    /// `p`-distance between `self` and `src`.
    pub fn dist(&self, src: &Tensor<T>, p: T) -> Result<f64> {
        let p = p.to_f64();
        let mut sum = 0.0f64;
        visit2(self, src, |a, b| sum += (a.to_f64() - b.to_f64()).abs().powf(p))?;
        Ok(sum.powf(1.0 / p))
    }

    pub fn meanall(&self) -> Result<f64> {
        arg_check!(self.n_dimension() > 0, 1, "empty Tensor");
        Ok(self.sumall()?.to_f64() / self.n_element() as f64)
    }

    /// Sample variance of every element, dividing by `n - 1`.
    pub fn varall(&self) -> Result<f64> {
        let mean = self.meanall()?;
        let mut sum = 0.0f64;
        visit1(self, |v| {
            let d = v.to_f64() - mean;
            sum += d * d;
        })?;
        Ok(sum / (self.n_element() as f64 - 1.0))
    }

    pub fn stdall(&self) -> Result<f64> {
        Ok(self.varall()?.sqrt())
    }

    /// `n` evenly spaced points from `a` to `b` inclusive.
    pub fn linspace(&mut self, a: T, b: T, n: usize) -> Result<()> {
        arg_check!(n > 1 || (n == 1 && a == b), 3, "invalid number of points");
        arg_check!(a <= b, 2, "end range should be greater than start range");
        self.resize_1d(n)?;
        let step = if n == 1 { T::ZERO } else { b.sub(a).div(T::from_i64(n as i64 - 1)) };
        let mut i = 0i64;
        apply1(self, |x| {
            *x = a.add(T::from_i64(i).mul(step));
            i += 1;
        })
    }

    /// `n` points from `10^a` to `10^b`, evenly spaced in the exponent.
    pub fn logspace(&mut self, a: T, b: T, n: usize) -> Result<()> {
        self.linspace(a, b, n)?;
        let ten = T::from_f64(10.0);
        apply1(self, |x| *x = ten.powf(*x))
    }

    /// Histogram of `t` over `nbins` equal bins spanning `[min, max]`.
    ///
    /// When `min == max` the range is taken from the data, widened by one on each side if
    /// the data is constant. Values outside the range are ignored.
    pub fn histc(&mut self, t: &Tensor<T>, nbins: usize, min: T, max: T) -> Result<()> {
        let (mut lo, mut hi) = (min, max);
        if lo == hi {
            lo = t.minall()?;
            hi = t.maxall()?;
        }
        if lo == hi {
            lo = lo.sub(T::ONE);
            hi = hi.add(T::ONE);
        }
        let bins = T::from_f64(nbins as f64 - config::get().histc_epsilon);
        let last = T::from_i64(nbins as i64);

        let mut counts = vec![0u64; nbins];
        visit1(t, |v| {
            let bin = v.sub(lo).div(hi.sub(lo)).mul(bins).floor().add(T::ONE);
            if bin >= T::ONE && bin <= last {
                counts[bin.to_i64() as usize - 1] += 1;
            }
        })?;

        self.resize_1d(nbins)?;
        let mut next = counts.into_iter();
        apply1(self, |h| *h = T::from_i64(next.next().unwrap_or(0) as i64))
    }
}

// endregion: Floating Point
