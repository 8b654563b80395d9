//! Element copies between tensors of any two kinds.
//!
//! Same-kind copies between contiguous tensors go through the dispatched `copy` primitive;
//! everything else walks both geometries and casts each element with `as` semantics, so
//! integer narrowing wraps and float-to-integer conversion truncates toward zero.

use crate::apply::{apply2, contiguous2};
use crate::error::Result;
use crate::scalars::Numeric;
use crate::tensor::Tensor;

impl<T: Numeric> Tensor<T> {
    /// Copies `src` element by element in row-major order.
    ///
    /// The element counts must match; the shapes need not.
    pub fn copy<U: Numeric>(&mut self, src: &Tensor<U>) -> Result<()> {
        let handled = contiguous2(self, src, |dst, from, n| unsafe {
            if T::KIND == U::KIND {
                (T::vector().copy)(dst, from as *const T, n);
            } else {
                for i in 0..n {
                    *dst.add(i) = (*from.add(i)).cast::<T>();
                }
            }
        });
        if handled {
            return Ok(());
        }
        apply2(self, src, |dst, value| *dst = value.cast())
    }
}
