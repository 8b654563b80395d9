//! # thtensor - Reference-Counted Strided Tensors
//!
//! * Shared, atomically reference-counted storages: owned, external, memory-mapped or views.
//! * Tensors as zero-copy views: an offset, sizes and strides over one storage.
//! * One generic body per element kind: `u8`, `i8`, `i16`, `i32`, `i64`, `f32`, `f64`, `f16`.
//! * Vector primitives selected once at runtime among serial, SSE, AVX, AVX2 and NEON variants.
//!
//! ## Views
//!
//! Geometry operations never copy. `narrow`, `select`, `transpose`, `unfold`, `squeeze`
//! and `expand` rewrite the view in place, and each has a `new_*` form returning a new view
//! over the same storage:
//!
//! ```rust
//! use thtensor::Tensor;
//!
//! let a = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
//! let t = a.new_transpose(0, 1).unwrap();
//! assert!(!t.is_contiguous());
//!
//! let row = a.new_select(0, 1).unwrap();
//! row.set1d(0, 40.0).unwrap();
//! assert_eq!(t.get2d(0, 1).unwrap(), 40.0);
//! ```
//!
//! ## Math
//!
//! Kernels are methods on the tensor receiving the result, which is resized to fit:
//!
//! ```rust
//! use thtensor::Tensor;
//!
//! let a = Tensor::from_slice(&[1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
//!
//! let mut sums = Tensor::new();
//! sums.sum(&a, 1).unwrap();
//! assert_eq!(sums.to_vec().unwrap(), vec![6.0, 15.0]);
//!
//! let mut product = Tensor::new();
//! let zeros = Tensor::with_size_2d(2, 2).unwrap();
//! product.addmm(0.0, &zeros, 1.0, &a, &a.new_transpose(0, 1).unwrap()).unwrap();
//! assert_eq!(product.get2d(0, 1).unwrap(), 32.0);
//!
//! let mut sorted = Tensor::new();
//! let mut order = Tensor::new();
//! sorted.sort(&mut order, &a, 1, true).unwrap();
//! assert_eq!(order.to_vec().unwrap(), vec![2, 1, 0, 2, 1, 0]);
//! ```
//!
//! ## Errors
//!
//! Every fallible operation returns [`Result`]. Errors pass through a process-wide handler
//! for their [`ErrorKind`] first: argument errors are returned by default, while allocation,
//! I/O and missing-backend errors panic unless a handler downgrades them.
//!
//! ## Modules
//!
//! - [`storage`]: flat buffers and their flags.
//! - [`tensor`]: view geometry, constructors, predicates and element access.
//! - [`apply`]: the strided traversal every kernel is written against.
//! - [`math`], [`sort`], [`compare`]: kernels.
//! - [`vector`], [`dispatch`]: per-kind vector primitives and their runtime selection.
//! - [`blas`], [`lapack`]: portable matrix routines and the linear-algebra backend seam.
//! - [`file`]: raw element streams.
//! - [`config`]: tunables such as the parallel threshold.

// Module declarations
pub mod apply;
pub mod blas;
pub mod compare;
pub mod config;
pub mod copy;
pub mod dispatch;
pub mod error;
pub mod file;
pub mod lapack;
pub mod math;
pub mod scalars;
pub mod sort;
pub mod storage;
pub mod tensor;
pub mod vector;

#[cfg(test)]
mod property_tests;

// Re-export scalar types at crate root
pub use scalars::{f16, FloatNumeric, Kind, Numeric};

// Re-export the view types
pub use storage::Storage;
pub use tensor::Tensor;

// Re-export error handling
pub use error::{Disposition, ErrorKind, Result, TensorError};

// Re-export dispatch
pub use dispatch::{cap, capabilities};

pub use config::Config;
pub use file::{Encoding, Endianness};
pub use lapack::{LinearAlgebra, Unavailable};

// region: Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_scenario() {
        let base = Tensor::from_slice(&[1i32, 2, 3, 4, 5], &[5]).unwrap();
        let view = base.new_narrow(0, 1, 3).unwrap();
        assert_eq!(view.to_vec().unwrap(), vec![2, 3, 4]);
        view.set1d(0, 20).unwrap();
        assert_eq!(base.storage().unwrap().get(1).unwrap(), 20);
    }

    #[test]
    fn select_and_unfold_scenarios() {
        let m = Tensor::from_vec((0..16).collect::<Vec<i64>>(), &[4, 4]).unwrap();
        let row = m.new_select(0, 2).unwrap();
        assert_eq!(row.sizes(), &[4]);
        assert_eq!(row.to_vec().unwrap(), vec![8, 9, 10, 11]);

        let v = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0], &[5]).unwrap();
        let windows = v.new_unfold(0, 2, 1).unwrap();
        assert_eq!(windows.sizes(), &[4, 2]);
        assert_eq!(windows.to_vec().unwrap(), vec![1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0, 5.0]);
    }

    #[test]
    fn kernels_through_views() {
        // Column sums of a transposed, narrowed window, then persisted and reloaded.
        let m = Tensor::from_vec((1..=12).map(f64::from).collect(), &[3, 4]).unwrap();
        let window = m.new_narrow(1, 1, 2).unwrap().new_transpose(0, 1).unwrap();
        let mut sums = Tensor::new();
        sums.sum(&window, 1).unwrap();
        assert_eq!(sums.to_vec().unwrap(), vec![2.0 + 6.0 + 10.0, 3.0 + 7.0 + 11.0]);

        let mut mask = Tensor::<u8>::new();
        mask.gt_value(&window, 6.0).unwrap();
        assert_eq!(mask.to_vec().unwrap(), vec![0, 0, 1, 0, 1, 1]);
        let mut picked = Tensor::new();
        picked.masked_select(&window, &mask).unwrap();
        assert_eq!(picked.to_vec().unwrap(), vec![10.0, 7.0, 11.0]);

        let mut bytes = Vec::new();
        file::write_storage(&mut bytes, picked.storage().unwrap(), Encoding::Text).unwrap();
        let back: Storage<f64> = file::read_storage(&mut bytes.as_slice(), Encoding::Text).unwrap();
        assert_eq!(back.to_vec(), vec![10.0, 7.0, 11.0]);
    }

    #[test]
    fn installed_tables_match_serial() {
        dispatch::init();
        let serial = dispatch::with_capabilities::<f32>(cap::SERIAL);
        let x: Vec<f32> = (0..37).map(|i| i as f32 * 0.5).collect();
        let mut expected = vec![0.0f32; 37];
        let mut actual = vec![0.0f32; 37];
        serial.mul(&mut expected, &x, 3.0).unwrap();
        f32::vector().mul(&mut actual, &x, 3.0).unwrap();
        assert_eq!(expected, actual);
    }
}

// endregion: Tests
