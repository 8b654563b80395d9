//! Sorting along a dimension with the permutation recorded.
//!
//! Every lane is sorted by an in-place quicksort with an explicit stack: the pivot is the
//! middle element of the block, comparisons against it are strict so constant runs split
//! evenly, and the smaller partition is always processed first to bound the stack depth.
//! The sort is not stable.

use crate::apply::{dim_apply2, Lane};
use crate::config;
use crate::error::{arg_check, Result};
use crate::math::reject_half;
use crate::scalars::Numeric;
use crate::tensor::Tensor;

/// Sorts `values` in place, applying the same permutation to `indices`.
pub(crate) fn quicksort<T: Numeric>(values: &Lane<T>, indices: &Lane<i64>, descending: bool) {
    let before = |a: T, b: T| if descending { a > b } else { a < b };
    let after = |a: T, b: T| if descending { a < b } else { a > b };

    let mut stack: Vec<(isize, isize)> = Vec::with_capacity(config::get().sort_max_levels);
    stack.push((0, values.len() as isize));
    while let Some((begin, end)) = stack.pop() {
        let (mut l, mut r) = (begin, end - 1);
        if l >= r {
            continue;
        }

        let p = (l + r) >> 1;
        let (pivot, pivot_index) = (values.get(p as usize), indices.get(p as usize));
        values.swap(l as usize, p as usize);
        indices.swap(l as usize, p as usize);

        while l < r {
            while after(values.get(r as usize), pivot) && l < r {
                r -= 1;
            }
            if l < r {
                values.set(l as usize, values.get(r as usize));
                indices.set(l as usize, indices.get(r as usize));
                l += 1;
            }
            while before(values.get(l as usize), pivot) && l < r {
                l += 1;
            }
            if l < r {
                values.set(r as usize, values.get(l as usize));
                indices.set(r as usize, indices.get(l as usize));
                r -= 1;
            }
        }
        values.set(l as usize, pivot);
        indices.set(l as usize, pivot_index);

        let left = (begin, l);
        let right = (l + 1, end);
        if right.1 - right.0 > left.1 - left.0 {
            stack.push(right);
            stack.push(left);
        } else {
            stack.push(left);
            stack.push(right);
        }
    }
}

impl<T: Numeric> Tensor<T> {
    /// Sorts every lane of `src` along `dim` into `self`, writing into `indices` the 0-based
    /// position each element had in its lane.
    pub fn sort(&mut self, indices: &mut Tensor<i64>, src: &Tensor<T>, dim: usize, descending: bool) -> Result<()> {
        arg_check!(dim < src.n_dimension(), 2, "invalid dimension");
        reject_half::<T>("sort")?;

        if !self.is_set_to(src) {
            self.resize_as(src)?;
            self.copy(src)?;
        }
        indices.resize_as(src)?;

        dim_apply2(&*self, &*indices, dim, |values, positions| {
            for i in 0..positions.len() {
                positions.set(i, i as i64);
            }
            quicksort(values, positions, descending);
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::error::TensorError;
    use crate::scalars::{f16, Kind};
    use crate::tensor::Tensor;

    fn sorted<T: crate::scalars::Numeric>(values: &[T], descending: bool) -> (Vec<T>, Vec<i64>) {
        let src = Tensor::from_slice(values, &[values.len()]).unwrap();
        let mut out = Tensor::new();
        let mut indices = Tensor::new();
        out.sort(&mut indices, &src, 0, descending).unwrap();
        (out.to_vec().unwrap(), indices.to_vec().unwrap())
    }

    #[test]
    fn sort_scenario_indices() {
        assert_eq!(sorted(&[3i32, 1, 2], false), (vec![1, 2, 3], vec![1, 2, 0]));
        let (values, indices) = sorted(&[3i32, 1, 2], true);
        assert_eq!(values, vec![3, 2, 1]);
        assert_eq!(indices, vec![0, 2, 1]);
    }

    #[test]
    fn sort_constant_and_presorted() {
        let (values, mut indices) = sorted(&[7u8; 9], false);
        assert_eq!(values, vec![7; 9]);
        indices.sort_unstable();
        assert_eq!(indices, (0..9).collect::<Vec<_>>());

        let ascending: Vec<f64> = (0..1000).map(f64::from).collect();
        let (values, indices) = sorted(&ascending, false);
        assert_eq!(values, ascending);
        assert_eq!(indices, (0..1000).collect::<Vec<_>>());
        let (values, indices) = sorted(&ascending, true);
        assert_eq!(values[0], 999.0);
        assert_eq!(indices[999], 0);
    }

    #[test]
    fn sort_along_each_dimension() {
        let m = Tensor::from_slice(&[5i16, 1, 4, 2, 6, 3], &[2, 3]).unwrap();
        let mut out = Tensor::new();
        let mut indices = Tensor::new();
        out.sort(&mut indices, &m, 1, false).unwrap();
        assert_eq!(out.to_vec().unwrap(), vec![1, 4, 5, 2, 3, 6]);
        assert_eq!(indices.to_vec().unwrap(), vec![1, 2, 0, 0, 2, 1]);

        out.sort(&mut indices, &m, 0, true).unwrap();
        assert_eq!(out.to_vec().unwrap(), vec![5, 6, 4, 2, 1, 3]);
        assert_eq!(indices.to_vec().unwrap(), vec![0, 1, 0, 1, 0, 1]);

        let mut in_place = m.new_clone().unwrap();
        in_place.sort(&mut indices, &in_place.clone(), 1, true).unwrap();
        assert_eq!(in_place.to_vec().unwrap(), vec![5, 4, 1, 6, 3, 2]);
        assert_eq!(out.sort(&mut indices, &m, 2, false).unwrap_err().arg(), Some(2));
    }

    #[test]
    fn sort_rejects_half() {
        let h = Tensor::from_slice(&[f16::ONE], &[1]).unwrap();
        let mut out = Tensor::new();
        let mut indices = Tensor::new();
        assert!(matches!(
            out.sort(&mut indices, &h, 0, false).unwrap_err(),
            TensorError::NotSupported { kind: Kind::Half, .. }
        ));
    }
}
