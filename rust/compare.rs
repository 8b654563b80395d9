//! Elementwise comparisons.
//!
//! Each predicate comes in four forms, named after its operator:
//!
//! - `lt_value(&t, v)` on a `Tensor<u8>` writes a 0/1 byte mask of `t < v`
//! - `lt_value_t(&t, v)` writes the same 0/1 values in `t`'s own kind
//! - `lt_tensor(&a, &b)` on a `Tensor<u8>` writes the byte mask of `a < b`
//! - `lt_tensor_t(&a, &b)` writes it in the operands' kind
//!
//! and likewise for `gt`, `le`, `ge`, `eq` and `ne`. The receiver is resized to the shape of
//! the first operand; tensor forms need equal element counts.

use crate::apply::{apply2, apply3, visit2};
use crate::error::Result;
use crate::scalars::Numeric;
use crate::tensor::Tensor;

fn indicator<R: Numeric>(holds: bool) -> R {
    if holds {
        R::ONE
    } else {
        R::ZERO
    }
}

macro_rules! comparisons {
    ($(
        $op:tt => $value:ident, $value_t:ident, $tensor:ident, $tensor_t:ident;
    )+) => {
        impl Tensor<u8> {
            $(
                pub fn $value<T: Numeric>(&mut self, t: &Tensor<T>, value: T) -> Result<()> {
                    self.resize_as(t)?;
                    apply2(self, t, |r, x| *r = indicator(x $op value))
                }

                pub fn $tensor<T: Numeric>(&mut self, ta: &Tensor<T>, tb: &Tensor<T>) -> Result<()> {
                    self.resize_as(ta)?;
                    apply3(self, ta, tb, |r, a, b| *r = indicator(a $op b))
                }
            )+
        }

        impl<T: Numeric> Tensor<T> {
            $(
                pub fn $value_t(&mut self, t: &Tensor<T>, value: T) -> Result<()> {
                    self.resize_as(t)?;
                    apply2(self, t, |r, x| *r = indicator(x $op value))
                }

                pub fn $tensor_t(&mut self, ta: &Tensor<T>, tb: &Tensor<T>) -> Result<()> {
                    self.resize_as(ta)?;
                    apply3(self, ta, tb, |r, a, b| *r = indicator(a $op b))
                }
            )+
        }
    };
}

comparisons! {
    < => lt_value, lt_value_t, lt_tensor, lt_tensor_t;
    > => gt_value, gt_value_t, gt_tensor, gt_tensor_t;
    <= => le_value, le_value_t, le_tensor, le_tensor_t;
    >= => ge_value, ge_value_t, ge_tensor, ge_tensor_t;
    == => eq_value, eq_value_t, eq_tensor, eq_tensor_t;
    != => ne_value, ne_value_t, ne_tensor, ne_tensor_t;
}

impl<T: Numeric> Tensor<T> {
    /// Same sizes and equal elements.
    pub fn equal(&self, other: &Tensor<T>) -> Result<bool> {
        if !self.is_same_size_as(other) {
            return Ok(false);
        }
        let mut equal = true;
        visit2(self, other, |a, b| equal &= a == b)?;
        Ok(equal)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::TensorError;
    use crate::scalars::f16;
    use crate::tensor::Tensor;

    #[test]
    fn value_masks() {
        let t = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        let mut mask = Tensor::<u8>::new();
        mask.lt_value(&t, 3.0).unwrap();
        assert_eq!(mask.sizes(), &[2, 2]);
        assert_eq!(mask.to_vec().unwrap(), vec![1, 1, 0, 0]);
        mask.ge_value(&t, 2.0).unwrap();
        assert_eq!(mask.to_vec().unwrap(), vec![0, 1, 1, 1]);
        mask.ne_value(&t.new_transpose(0, 1).unwrap(), 2.0).unwrap();
        assert_eq!(mask.to_vec().unwrap(), vec![1, 1, 0, 1]);

        let mut same = Tensor::new();
        same.eq_value_t(&t, 4.0).unwrap();
        assert_eq!(same.to_vec().unwrap(), vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn tensor_masks() {
        let a = Tensor::from_slice(&[1i64, 5, 3], &[3]).unwrap();
        let b = Tensor::from_slice(&[2i64, 5, 1], &[3]).unwrap();
        let mut mask = Tensor::<u8>::new();
        mask.gt_tensor(&a, &b).unwrap();
        assert_eq!(mask.to_vec().unwrap(), vec![0, 0, 1]);
        mask.le_tensor(&a, &b).unwrap();
        assert_eq!(mask.to_vec().unwrap(), vec![1, 1, 0]);

        let mut same = Tensor::new();
        same.eq_tensor_t(&a, &b).unwrap();
        assert_eq!(same.to_vec().unwrap(), vec![0, 1, 0]);

        let short = Tensor::from_slice(&[1i64, 2], &[2]).unwrap();
        assert!(matches!(
            mask.lt_tensor(&a, &short).unwrap_err(),
            TensorError::ShapeMismatch { .. }
        ));
    }

    #[test]
    fn half_compares() {
        let h = Tensor::from_slice(&[f16::from_f32(0.5), f16::from_f32(1.5)], &[2]).unwrap();
        let mut mask = Tensor::<u8>::new();
        mask.gt_value(&h, f16::ONE).unwrap();
        assert_eq!(mask.to_vec().unwrap(), vec![0, 1]);
    }

    #[test]
    fn equal_checks_shape_and_values() {
        let a = Tensor::from_slice(&[1u8, 2, 3, 4], &[2, 2]).unwrap();
        let flat = Tensor::from_slice(&[1u8, 2, 3, 4], &[4]).unwrap();
        assert!(a.equal(&a.new_clone().unwrap()).unwrap());
        assert!(!a.equal(&flat).unwrap());
        assert!(!a.equal(&a.new_transpose(0, 1).unwrap()).unwrap());
    }
}
