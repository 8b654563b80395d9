//! Portable level-1, level-2 and level-3 routines behind the matrix products.
//!
//! This module provides:
//!
//! - [`dot`], [`axpy`], [`scal`]: strided vector routines
//! - [`gemv`], [`ger`]: matrix-vector product and rank-1 update
//! - [`gemm`]: general matrix-matrix product
//!
//! Matrices are column-major with an explicit leading dimension, following the reference
//! BLAS calling convention, so a row-major tensor is passed as its own transpose. Inner
//! products accumulate in [`Numeric::Accum`].
//!
//! Every routine takes raw pointers and trusts the caller for the extents: `lda >= rows`,
//! `inc > 0` and every addressed element inside one allocation.

use crate::scalars::Numeric;

/// Whether an operand is used as stored or transposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transpose {
    No,
    Yes,
}

impl Transpose {
    /// The reference BLAS flag character, `'n'` or `'t'`.
    pub const fn as_char(self) -> char {
        match self {
            Transpose::No => 'n',
            Transpose::Yes => 't',
        }
    }
}

// region: Level 1

/// Inner product of `n` elements of `x` and `y`.
///
/// # Safety
///
/// `x` must address `n` elements with step `incx`, `y` likewise with `incy`.
pub unsafe fn dot<T: Numeric>(n: usize, x: *const T, incx: usize, y: *const T, incy: usize) -> T::Accum {
    let mut sum = <T::Accum as Numeric>::ZERO;
    for i in 0..n {
        let a = (*x.add(i * incx)).to_accum();
        let b = (*y.add(i * incy)).to_accum();
        sum = sum.add(a.mul(b));
    }
    sum
}

/// `y += alpha * x`.
///
/// # Safety
///
/// Same as [`dot`], with `y` writable.
pub unsafe fn axpy<T: Numeric>(n: usize, alpha: T, x: *const T, incx: usize, y: *mut T, incy: usize) {
    for i in 0..n {
        let yi = y.add(i * incy);
        *yi = (*yi).add(alpha.mul(*x.add(i * incx)));
    }
}

/// `x *= alpha`.
///
/// # Safety
///
/// `x` must address `n` writable elements with step `incx`.
pub unsafe fn scal<T: Numeric>(n: usize, alpha: T, x: *mut T, incx: usize) {
    for i in 0..n {
        let xi = x.add(i * incx);
        *xi = if alpha == T::ZERO { T::ZERO } else { alpha.mul(*xi) };
    }
}

// endregion: Level 1

// region: Level 2

/// `y = alpha * op(A) * x + beta * y` for an `m x n` matrix `A`.
///
/// With [`Transpose::No`] `x` has `n` elements and `y` has `m`; with [`Transpose::Yes`] the
/// other way around. When `beta` is zero `y` is not read.
///
/// # Safety
///
/// `a` must address an `m x n` column-major matrix with leading dimension `lda`, and `x`, `y`
/// the vector extents described above.
#[allow(clippy::too_many_arguments)]
pub unsafe fn gemv<T: Numeric>(
    trans: Transpose,
    m: usize,
    n: usize,
    alpha: T,
    a: *const T,
    lda: usize,
    x: *const T,
    incx: usize,
    beta: T,
    y: *mut T,
    incy: usize,
) {
    let at = |i: usize, j: usize| *a.add(i + j * lda);
    let (rows, cols) = match trans {
        Transpose::No => (m, n),
        Transpose::Yes => (n, m),
    };
    for i in 0..rows {
        let mut sum = <T::Accum as Numeric>::ZERO;
        for j in 0..cols {
            let aij = match trans {
                Transpose::No => at(i, j),
                Transpose::Yes => at(j, i),
            };
            sum = sum.add(aij.to_accum().mul((*x.add(j * incx)).to_accum()));
        }
        let yi = y.add(i * incy);
        let scaled = alpha.mul(T::from_accum(sum));
        *yi = if beta == T::ZERO {
            scaled
        } else {
            beta.mul(*yi).add(scaled)
        };
    }
}

/// Rank-1 update `A += alpha * x * y^T` of an `m x n` matrix.
///
/// # Safety
///
/// `x` addresses `m` elements, `y` addresses `n`, `a` an `m x n` writable column-major matrix.
#[allow(clippy::too_many_arguments)]
pub unsafe fn ger<T: Numeric>(
    m: usize,
    n: usize,
    alpha: T,
    x: *const T,
    incx: usize,
    y: *const T,
    incy: usize,
    a: *mut T,
    lda: usize,
) {
    for j in 0..n {
        let scale = alpha.mul(*y.add(j * incy));
        for i in 0..m {
            let aij = a.add(i + j * lda);
            *aij = (*aij).add(scale.mul(*x.add(i * incx)));
        }
    }
}

// endregion: Level 2

// region: Level 3

/// `C = alpha * op(A) * op(B) + beta * C` where `op(A)` is `m x k`, `op(B)` is `k x n`.
///
/// When `beta` is zero `C` is not read.
///
/// # Safety
///
/// Each pointer must address its column-major matrix with the given leading dimension:
/// `A` is `m x k` (`k x m` when transposed), `B` is `k x n` (`n x k` when transposed) and
/// `C` is `m x n` and writable.
#[allow(clippy::too_many_arguments)]
pub unsafe fn gemm<T: Numeric>(
    transa: Transpose,
    transb: Transpose,
    m: usize,
    n: usize,
    k: usize,
    alpha: T,
    a: *const T,
    lda: usize,
    b: *const T,
    ldb: usize,
    beta: T,
    c: *mut T,
    ldc: usize,
) {
    let op_a = |i: usize, l: usize| match transa {
        Transpose::No => *a.add(i + l * lda),
        Transpose::Yes => *a.add(l + i * lda),
    };
    let op_b = |l: usize, j: usize| match transb {
        Transpose::No => *b.add(l + j * ldb),
        Transpose::Yes => *b.add(j + l * ldb),
    };
    for j in 0..n {
        for i in 0..m {
            let mut sum = <T::Accum as Numeric>::ZERO;
            for l in 0..k {
                sum = sum.add(op_a(i, l).to_accum().mul(op_b(l, j).to_accum()));
            }
            let cij = c.add(i + j * ldc);
            let scaled = alpha.mul(T::from_accum(sum));
            *cij = if beta == T::ZERO {
                scaled
            } else {
                beta.mul(*cij).add(scaled)
            };
        }
    }
}

// endregion: Level 3

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_accumulates_wide() {
        let x = [100u8, 100, 100];
        let y = [3u8, 3, 3];
        assert_eq!(unsafe { dot(3, x.as_ptr(), 1, y.as_ptr(), 1) }, 900);

        let strided = [1.0f32, 9.0, 2.0, 9.0, 3.0];
        let ones = [1.0f32; 3];
        assert_eq!(unsafe { dot(3, strided.as_ptr(), 2, ones.as_ptr(), 1) }, 6.0);
    }

    #[test]
    fn axpy_and_scal() {
        let x = [1.0f64, 2.0, 3.0];
        let mut y = [10.0f64, 20.0, 30.0];
        unsafe { axpy(3, 2.0, x.as_ptr(), 1, y.as_mut_ptr(), 1) };
        assert_eq!(y, [12.0, 24.0, 36.0]);
        unsafe { scal(2, 0.5, y.as_mut_ptr(), 2) };
        assert_eq!(y, [6.0, 24.0, 18.0]);
    }

    #[test]
    fn gemv_both_orientations() {
        // 2x3 column-major: [[1, 2, 3], [4, 5, 6]]
        let a = [1.0f32, 4.0, 2.0, 5.0, 3.0, 6.0];
        let x = [1.0f32, 1.0, 1.0];
        let mut y = [100.0f32, 100.0];
        unsafe { gemv(Transpose::No, 2, 3, 1.0, a.as_ptr(), 2, x.as_ptr(), 1, 0.0, y.as_mut_ptr(), 1) };
        assert_eq!(y, [6.0, 15.0]);

        let v = [1.0f32, 2.0];
        let mut z = [1.0f32, 1.0, 1.0];
        unsafe { gemv(Transpose::Yes, 2, 3, 1.0, a.as_ptr(), 2, v.as_ptr(), 1, 2.0, z.as_mut_ptr(), 1) };
        assert_eq!(z, [11.0, 14.0, 17.0]);
    }

    #[test]
    fn ger_rank_one_update() {
        let x = [1i32, 2];
        let y = [3i32, 4, 5];
        let mut a = [0i32; 6];
        unsafe { ger(2, 3, 1, x.as_ptr(), 1, y.as_ptr(), 1, a.as_mut_ptr(), 2) };
        assert_eq!(a, [3, 6, 4, 8, 5, 10]);
    }

    #[test]
    fn gemm_with_transposes() {
        // A = [[1, 2], [3, 4]] column-major, B = identity
        let a = [1.0f64, 3.0, 2.0, 4.0];
        let b = [1.0f64, 0.0, 0.0, 1.0];
        let mut c = [f64::NAN; 4];
        unsafe {
            gemm(Transpose::No, Transpose::No, 2, 2, 2, 1.0, a.as_ptr(), 2, b.as_ptr(), 2, 0.0, c.as_mut_ptr(), 2)
        };
        assert_eq!(c, a);

        unsafe {
            gemm(Transpose::Yes, Transpose::No, 2, 2, 2, 2.0, a.as_ptr(), 2, b.as_ptr(), 2, 1.0, c.as_mut_ptr(), 2)
        };
        assert_eq!(c, [3.0, 7.0, 8.0, 12.0]);
        assert_eq!(Transpose::Yes.as_char(), 't');
    }
}
