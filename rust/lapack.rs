//! Linear-algebra backend seam.
//!
//! The factorizations and solvers are not implemented here: they are reached through the
//! [`LinearAlgebra`] trait, whose routines mirror the reference LAPACK calling convention
//! (column-major matrices, raw pointers, leading dimensions, `info` status). Every method
//! has a default body reporting [`TensorError::BackendUnavailable`] through the backend
//! error handler, so a backend overrides only what it provides and [`Unavailable`] provides
//! nothing.
//!
//! Status codes returned by a real backend are turned into errors with [`check_info`].

use crate::error::{argument_error, raise, Result, TensorError};
use crate::scalars::FloatNumeric;

/// Integer type of sizes, pivots and status codes.
pub type LapackInt = i32;

fn unavailable<R>(routine: &'static str) -> Result<R> {
    Err(raise(TensorError::BackendUnavailable { routine }))
}

/// Maps a negative `info` to the argument error naming the offending parameter.
///
/// Positive values are routine-specific outcomes, such as a singular pivot, and are returned
/// for the caller to interpret.
pub fn check_info(routine: &'static str, info: LapackInt) -> Result<LapackInt> {
    if info < 0 {
        return argument_error(0, format!("Lapack Error in {} : Illegal Argument {}", routine, -info));
    }
    Ok(info)
}

/// Routines a linear-algebra backend may provide for element type `T`.
///
/// Character flags (`uplo`, `trans`, `jobz`, ...) are the ASCII bytes of the reference
/// interface. Each routine returns its `info` status.
///
/// # Safety
///
/// Every pointer must address an array of the extent the reference interface documents for
/// the given dimensions and leading dimensions, and outputs must be writable.
#[allow(clippy::too_many_arguments)]
pub trait LinearAlgebra<T: FloatNumeric> {
    /// Solves `A * X = B` by LU factorization with partial pivoting.
    unsafe fn gesv(
        &self,
        n: LapackInt,
        nrhs: LapackInt,
        a: *mut T,
        lda: LapackInt,
        ipiv: *mut LapackInt,
        b: *mut T,
        ldb: LapackInt,
    ) -> Result<LapackInt> {
        let _ = (n, nrhs, a, lda, ipiv, b, ldb);
        unavailable("gesv")
    }

    /// Solves a triangular system `A * X = B` or `A^T * X = B`.
    unsafe fn trtrs(
        &self,
        uplo: u8,
        trans: u8,
        diag: u8,
        n: LapackInt,
        nrhs: LapackInt,
        a: *mut T,
        lda: LapackInt,
        b: *mut T,
        ldb: LapackInt,
    ) -> Result<LapackInt> {
        let _ = (uplo, trans, diag, n, nrhs, a, lda, b, ldb);
        unavailable("trtrs")
    }

    /// Least squares or minimum norm solution through a QR or LQ factorization.
    unsafe fn gels(
        &self,
        trans: u8,
        m: LapackInt,
        n: LapackInt,
        nrhs: LapackInt,
        a: *mut T,
        lda: LapackInt,
        b: *mut T,
        ldb: LapackInt,
        work: *mut T,
        lwork: LapackInt,
    ) -> Result<LapackInt> {
        let _ = (trans, m, n, nrhs, a, lda, b, ldb, work, lwork);
        unavailable("gels")
    }

    /// Eigenvalues, and optionally eigenvectors, of a symmetric matrix.
    unsafe fn syev(
        &self,
        jobz: u8,
        uplo: u8,
        n: LapackInt,
        a: *mut T,
        lda: LapackInt,
        w: *mut T,
        work: *mut T,
        lwork: LapackInt,
    ) -> Result<LapackInt> {
        let _ = (jobz, uplo, n, a, lda, w, work, lwork);
        unavailable("syev")
    }

    /// Eigenvalues and left/right eigenvectors of a general matrix.
    unsafe fn geev(
        &self,
        jobvl: u8,
        jobvr: u8,
        n: LapackInt,
        a: *mut T,
        lda: LapackInt,
        wr: *mut T,
        wi: *mut T,
        vl: *mut T,
        ldvl: LapackInt,
        vr: *mut T,
        ldvr: LapackInt,
        work: *mut T,
        lwork: LapackInt,
    ) -> Result<LapackInt> {
        let _ = (jobvl, jobvr, n, a, lda, wr, wi, vl, ldvl, vr, ldvr, work, lwork);
        unavailable("geev")
    }

    /// Singular value decomposition.
    unsafe fn gesvd(
        &self,
        jobu: u8,
        jobvt: u8,
        m: LapackInt,
        n: LapackInt,
        a: *mut T,
        lda: LapackInt,
        s: *mut T,
        u: *mut T,
        ldu: LapackInt,
        vt: *mut T,
        ldvt: LapackInt,
        work: *mut T,
        lwork: LapackInt,
    ) -> Result<LapackInt> {
        let _ = (jobu, jobvt, m, n, a, lda, s, u, ldu, vt, ldvt, work, lwork);
        unavailable("gesvd")
    }

    /// LU factorization with partial pivoting.
    unsafe fn getrf(
        &self,
        m: LapackInt,
        n: LapackInt,
        a: *mut T,
        lda: LapackInt,
        ipiv: *mut LapackInt,
    ) -> Result<LapackInt> {
        let _ = (m, n, a, lda, ipiv);
        unavailable("getrf")
    }

    /// Solves with an LU factorization computed by `getrf`.
    unsafe fn getrs(
        &self,
        trans: u8,
        n: LapackInt,
        nrhs: LapackInt,
        a: *mut T,
        lda: LapackInt,
        ipiv: *mut LapackInt,
        b: *mut T,
        ldb: LapackInt,
    ) -> Result<LapackInt> {
        let _ = (trans, n, nrhs, a, lda, ipiv, b, ldb);
        unavailable("getrs")
    }

    /// Inverse from an LU factorization computed by `getrf`.
    unsafe fn getri(
        &self,
        n: LapackInt,
        a: *mut T,
        lda: LapackInt,
        ipiv: *mut LapackInt,
        work: *mut T,
        lwork: LapackInt,
    ) -> Result<LapackInt> {
        let _ = (n, a, lda, ipiv, work, lwork);
        unavailable("getri")
    }

    /// Cholesky factorization of a positive definite matrix.
    unsafe fn potrf(&self, uplo: u8, n: LapackInt, a: *mut T, lda: LapackInt) -> Result<LapackInt> {
        let _ = (uplo, n, a, lda);
        unavailable("potrf")
    }

    /// Inverse from a Cholesky factorization.
    unsafe fn potri(&self, uplo: u8, n: LapackInt, a: *mut T, lda: LapackInt) -> Result<LapackInt> {
        let _ = (uplo, n, a, lda);
        unavailable("potri")
    }

    /// Solves with a Cholesky factorization.
    unsafe fn potrs(
        &self,
        uplo: u8,
        n: LapackInt,
        nrhs: LapackInt,
        a: *mut T,
        lda: LapackInt,
        b: *mut T,
        ldb: LapackInt,
    ) -> Result<LapackInt> {
        let _ = (uplo, n, nrhs, a, lda, b, ldb);
        unavailable("potrs")
    }

    /// Cholesky factorization with complete pivoting of a semidefinite matrix.
    unsafe fn pstrf(
        &self,
        uplo: u8,
        n: LapackInt,
        a: *mut T,
        lda: LapackInt,
        piv: *mut LapackInt,
        rank: *mut LapackInt,
        tol: T,
        work: *mut T,
    ) -> Result<LapackInt> {
        let _ = (uplo, n, a, lda, piv, rank, tol, work);
        unavailable("pstrf")
    }

    /// QR factorization.
    unsafe fn geqrf(
        &self,
        m: LapackInt,
        n: LapackInt,
        a: *mut T,
        lda: LapackInt,
        tau: *mut T,
        work: *mut T,
        lwork: LapackInt,
    ) -> Result<LapackInt> {
        let _ = (m, n, a, lda, tau, work, lwork);
        unavailable("geqrf")
    }

    /// Generates the orthogonal `Q` of a `geqrf` factorization.
    unsafe fn orgqr(
        &self,
        m: LapackInt,
        n: LapackInt,
        k: LapackInt,
        a: *mut T,
        lda: LapackInt,
        tau: *mut T,
        work: *mut T,
        lwork: LapackInt,
    ) -> Result<LapackInt> {
        let _ = (m, n, k, a, lda, tau, work, lwork);
        unavailable("orgqr")
    }

    /// Multiplies a matrix by the `Q` of a `geqrf` factorization.
    unsafe fn ormqr(
        &self,
        side: u8,
        trans: u8,
        m: LapackInt,
        n: LapackInt,
        k: LapackInt,
        a: *mut T,
        lda: LapackInt,
        tau: *mut T,
        c: *mut T,
        ldc: LapackInt,
        work: *mut T,
        lwork: LapackInt,
    ) -> Result<LapackInt> {
        let _ = (side, trans, m, n, k, a, lda, tau, c, ldc, work, lwork);
        unavailable("ormqr")
    }
}

/// Backend with no routines.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl<T: FloatNumeric> LinearAlgebra<T> for Unavailable {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::tests::HANDLER_LOCK;
    use crate::error::{reset_error_handlers, set_backend_error_handler, Disposition, ErrorKind};

    /// Solves diagonal systems only, enough to exercise an override next to the defaults.
    struct Diagonal;

    impl LinearAlgebra<f64> for Diagonal {
        unsafe fn gesv(
            &self,
            n: LapackInt,
            nrhs: LapackInt,
            a: *mut f64,
            lda: LapackInt,
            ipiv: *mut LapackInt,
            b: *mut f64,
            ldb: LapackInt,
        ) -> Result<LapackInt> {
            if n < 0 {
                return Ok(-1);
            }
            for i in 0..n as usize {
                let pivot = *a.add(i + i * lda as usize);
                if pivot == 0.0 {
                    return Ok(i as LapackInt + 1);
                }
                *ipiv.add(i) = i as LapackInt + 1;
                for j in 0..nrhs as usize {
                    *b.add(i + j * ldb as usize) /= pivot;
                }
            }
            Ok(0)
        }
    }

    #[test]
    fn unavailable_routines_report_their_name() {
        let _guard = HANDLER_LOCK.lock();
        set_backend_error_handler(|_| Disposition::Propagate);
        let backend = Unavailable;
        let mut a = [1.0f32];
        let err = unsafe { LinearAlgebra::<f32>::potrf(&backend, b'U', 1, a.as_mut_ptr(), 1) }.unwrap_err();
        reset_error_handlers();

        assert_eq!(err.kind(), ErrorKind::Backend);
        assert_eq!(err.to_string(), "potrf : Lapack library not found in compile time");
    }

    #[test]
    #[should_panic(expected = "getrf : Lapack library not found")]
    fn unavailable_is_fatal_by_default() {
        let _guard = HANDLER_LOCK.lock();
        reset_error_handlers();
        let mut a = [1.0f64];
        let mut ipiv = [0];
        let _ = unsafe { LinearAlgebra::<f64>::getrf(&Unavailable, 1, 1, a.as_mut_ptr(), 1, ipiv.as_mut_ptr()) };
    }

    #[test]
    fn backends_override_selected_routines() {
        let mut a = [2.0f64, 0.0, 0.0, 4.0];
        let mut b = [2.0f64, 2.0];
        let mut ipiv = [0; 2];
        let info = unsafe { Diagonal.gesv(2, 1, a.as_mut_ptr(), 2, ipiv.as_mut_ptr(), b.as_mut_ptr(), 2) };
        assert_eq!(check_info("gesv", info.unwrap()).unwrap(), 0);
        assert_eq!(b, [1.0, 0.5]);
        assert_eq!(ipiv, [1, 2]);

        let mut zero = [0.0f64];
        let singular = unsafe { Diagonal.gesv(1, 1, zero.as_mut_ptr(), 1, ipiv.as_mut_ptr(), b.as_mut_ptr(), 1) };
        assert_eq!(check_info("gesv", singular.unwrap()).unwrap(), 1);
    }

    #[test]
    fn negative_info_names_the_argument() {
        let err = check_info("getrs", -3).unwrap_err();
        assert_eq!(err.arg(), Some(0));
        assert!(err.to_string().contains("Lapack Error in getrs : Illegal Argument 3"));
        assert_eq!(check_info("getrs", 2).unwrap(), 2);
    }
}
