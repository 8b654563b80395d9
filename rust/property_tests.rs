//! Property-based tests for views, kernels and dispatch.
//!
//! Shapes stay small (1-4 dimensions of 1-6 elements) so every case walks both the
//! contiguous and the strided paths quickly.

use proptest::prelude::*;

use crate::dispatch::{self, cap};
use crate::scalars::Numeric;
use crate::storage::Storage;
use crate::tensor::Tensor;

fn shape_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..6, 1..=4)
}

fn filled(shape: &[usize]) -> Tensor<i32> {
    let n = shape.iter().product::<usize>();
    Tensor::from_vec((0..n as i32).collect(), shape).unwrap()
}

fn lengths_and_values() -> impl Strategy<Value = (Vec<f32>, Vec<f32>, f32)> {
    (0usize..200).prop_flat_map(|n| {
        (
            prop::collection::vec(-100.0f32..100.0, n),
            prop::collection::vec(0.5f32..100.0, n),
            0.5f32..4.0,
        )
    })
}

proptest! {
    #[test]
    fn prop_transpose_is_an_involution(shape in shape_strategy(), d1 in 0usize..4, d2 in 0usize..4) {
        let t = filled(&shape);
        let (d1, d2) = (d1 % shape.len(), d2 % shape.len());
        let back = t.new_transpose(d1, d2).unwrap().new_transpose(d1, d2).unwrap();
        prop_assert!(back.is_set_to(&t));
        prop_assert_eq!(back.to_vec().unwrap(), t.to_vec().unwrap());
    }

    #[test]
    fn prop_full_narrow_is_the_source(shape in shape_strategy(), dim in 0usize..4) {
        let t = filled(&shape);
        let dim = dim % shape.len();
        let view = t.new_narrow(dim, 0, shape[dim]).unwrap();
        prop_assert!(view.is_same_size_as(&t));
        prop_assert!(view.is_set_to(&t));
    }

    #[test]
    fn prop_contiguity(shape in shape_strategy()) {
        let t = Tensor::<f32>::with_size(&shape.iter().map(|&s| s as i64).collect::<Vec<_>>(), None).unwrap();
        prop_assert!(t.is_contiguous());

        let mut squeezed = t.clone();
        squeezed.squeeze();
        prop_assert!(squeezed.is_contiguous());
        prop_assert_eq!(squeezed.n_element(), t.n_element());

        let distinct = shape.len() >= 2 && shape[0] > 1 && shape[1] > 1 && shape[0] != shape[1];
        if distinct {
            prop_assert!(!t.new_transpose(0, 1).unwrap().is_contiguous());
        }
    }

    #[test]
    fn prop_resize_is_idempotent(shape in shape_strategy()) {
        let sizes: Vec<i64> = shape.iter().map(|&s| s as i64).collect();
        let mut t = Tensor::<u8>::new();
        t.resize(&sizes, None).unwrap();
        let before = (t.data(), t.strides().to_vec());
        t.resize(&sizes, None).unwrap();
        prop_assert_eq!(before, (t.data(), t.strides().to_vec()));
    }

    #[test]
    fn prop_expand_broadcasts_singletons(shape in shape_strategy(), times in 2usize..5) {
        let mut singleton = shape.clone();
        singleton[0] = 1;
        let t = filled(&singleton);
        let mut target = singleton.clone();
        target[0] = times;

        let expanded = t.new_expand(&target).unwrap();
        prop_assert_eq!(expanded.sizes(), target.as_slice());
        prop_assert_eq!(expanded.strides()[0], 0);
        let first = t.to_vec().unwrap();
        let all = expanded.to_vec().unwrap();
        prop_assert!(all.chunks(first.len()).all(|chunk| chunk == first.as_slice()));
    }

    #[test]
    fn prop_retains_balance_frees(retains in 0usize..16) {
        let storage = Storage::<i16>::try_new(4).unwrap();
        let handles: Vec<_> = (0..retains).map(|_| storage.retain()).collect();
        prop_assert_eq!(storage.refcount(), retains + 1);
        handles.into_iter().for_each(Storage::free);
        prop_assert_eq!(storage.refcount(), 1);
        storage.set(3, 7).unwrap();
        prop_assert_eq!(storage.get(3).unwrap(), 7);
    }

    #[test]
    fn prop_storage_copy_round_trip(values in prop::collection::vec(any::<i32>(), 1..64)) {
        let source = Storage::from_vec(values.clone());
        let wide = Storage::<i64>::try_new(values.len()).unwrap();
        wide.copy_from(&source).unwrap();
        let back = Storage::<i32>::try_new(values.len()).unwrap();
        back.copy_from(&wide).unwrap();
        prop_assert_eq!(back.to_vec(), values);
    }

    #[test]
    fn prop_dispatch_matches_serial((x, y, c) in lengths_and_values()) {
        let serial = dispatch::with_capabilities::<f32>(cap::SERIAL);
        let installed = f32::vector();
        let n = x.len();
        let (mut expected, mut actual) = (vec![0.0f32; n], vec![0.0f32; n]);

        serial.fill(&mut expected, c);
        installed.fill(&mut actual, c);
        prop_assert_eq!(&expected, &actual);

        serial.copy(&mut expected, &x).unwrap();
        installed.copy(&mut actual, &x).unwrap();
        prop_assert_eq!(&expected, &actual);

        serial.mul(&mut expected, &x, c).unwrap();
        installed.mul(&mut actual, &x, c).unwrap();
        prop_assert_eq!(&expected, &actual);

        serial.div(&mut expected, &x, c).unwrap();
        installed.div(&mut actual, &x, c).unwrap();
        prop_assert_eq!(&expected, &actual);

        serial.cdiv(&mut expected, &x, &y).unwrap();
        installed.cdiv(&mut actual, &x, &y).unwrap();
        prop_assert_eq!(&expected, &actual);

        serial.cadd(&mut expected, &x, &y, c).unwrap();
        installed.cadd(&mut actual, &x, &y, c).unwrap();
        for (e, a) in expected.iter().zip(&actual) {
            prop_assert!((e - a).abs() <= 1e-4 * e.abs().max(1.0));
        }
    }

    #[test]
    fn prop_sort_orders_and_permutes(values in prop::collection::vec(-50i32..50, 1..100), descending in any::<bool>()) {
        let src = Tensor::from_slice(&values, &[values.len()]).unwrap();
        let mut sorted = Tensor::new();
        let mut order = Tensor::new();
        sorted.sort(&mut order, &src, 0, descending).unwrap();
        let sorted = sorted.to_vec().unwrap();
        let order = order.to_vec().unwrap();

        let ordered = sorted
            .windows(2)
            .all(|w| if descending { w[0] >= w[1] } else { w[0] <= w[1] });
        prop_assert!(ordered);
        for (value, &from) in sorted.iter().zip(&order) {
            prop_assert_eq!(*value, values[from as usize]);
        }
        let mut seen = order.clone();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..values.len() as i64).collect::<Vec<_>>());
    }

    #[test]
    fn prop_strided_kernels_match_contiguous(shape in shape_strategy(), value in -10i32..10) {
        let t = filled(&shape);
        let last = shape.len() - 1;
        let strided = t.new_transpose(0, last).unwrap();
        let contiguous = strided.new_contiguous().unwrap();

        let (mut a, mut b) = (Tensor::new(), Tensor::new());
        a.add(&strided, value).unwrap();
        b.add(&contiguous, value).unwrap();
        prop_assert_eq!(a.to_vec().unwrap(), b.to_vec().unwrap());

        a.cmul(&strided, &contiguous).unwrap();
        b.cmul(&contiguous, &contiguous).unwrap();
        prop_assert_eq!(a.to_vec().unwrap(), b.to_vec().unwrap());
        prop_assert_eq!(strided.sumall().unwrap(), contiguous.sumall().unwrap());
    }
}
