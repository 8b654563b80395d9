//! Strided views over a shared [`Storage`].
//!
//! This module provides:
//!
//! - [`Tensor`]: storage handle plus offset, sizes and strides
//! - constructors sharing or allocating storage, including pure `new_*` variants of every
//!   geometry operation
//! - in-place geometry mutators: narrow, select, transpose, unfold, squeeze, unsqueeze, expand
//! - predicates and element accessors
//!
//! A tensor never owns raw memory. Geometry operations only rewrite the offset, sizes and
//! strides, so any number of tensors can look at one storage through different windows and
//! a write through one is visible through all the others.
//!
//! Every mutator operates on the receiver. The `*_from` variants first make the receiver
//! alias a source tensor, then apply the same transformation, and leave the receiver
//! untouched when validation fails.
//!
//! # Example
//!
//! ```rust
//! use thtensor::Tensor;
//!
//! let t = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0], &[5]).unwrap();
//! let windows = t.new_unfold(0, 2, 1).unwrap();
//! assert_eq!(windows.sizes(), &[4, 2]);
//! assert_eq!(windows.get2d(3, 1).unwrap(), 5.0);
//! ```

use core::fmt;

use crate::error::{arg_check, argument_error, raise, Result, TensorError};
use crate::scalars::Numeric;
use crate::storage::Storage;

// region: Tensor

/// Strided view into a storage.
///
/// Cloning a tensor shares its storage, like [`Tensor::with_tensor`]. Use
/// [`Tensor::new_clone`] for an independent copy.
pub struct Tensor<T: Numeric> {
    storage: Option<Storage<T>>,
    storage_offset: usize,
    size: Vec<usize>,
    stride: Vec<usize>,
}

impl<T: Numeric> Tensor<T> {
    /// Tensor with no storage and no dimensions.
    pub fn new() -> Self {
        Self {
            storage: None,
            storage_offset: 0,
            size: Vec::new(),
            stride: Vec::new(),
        }
    }

    /// Tensor sharing `src`'s storage and geometry.
    pub fn with_tensor(src: &Tensor<T>) -> Self {
        Self {
            storage: src.storage.clone(),
            storage_offset: src.storage_offset,
            size: src.size.clone(),
            stride: src.stride.clone(),
        }
    }

    /// Tensor over `storage` at `offset`.
    ///
    /// `strides`, when given, must have one entry per size; negative entries select the
    /// row-major default for that dimension.
    pub fn with_storage(
        storage: &Storage<T>,
        offset: usize,
        sizes: &[i64],
        strides: Option<&[i64]>,
    ) -> Result<Self> {
        if let Some(strides) = strides {
            arg_check!(strides.len() == sizes.len(), 4, "inconsistent size");
        }
        Self::with_storage_nd(Some(storage), offset as i64, sizes, strides)
    }

    /// General form of [`Tensor::with_storage`]: no storage allocates one on demand.
    pub fn with_storage_nd(
        storage: Option<&Storage<T>>,
        offset: i64,
        sizes: &[i64],
        strides: Option<&[i64]>,
    ) -> Result<Self> {
        let mut tensor = Self::new();
        tensor.set_storage_nd(storage, offset, sizes, strides)?;
        Ok(tensor)
    }

    pub fn with_storage_1d(storage: &Storage<T>, offset: usize, size0: i64, stride0: i64) -> Result<Self> {
        Self::with_storage(storage, offset, &[size0], Some(&[stride0]))
    }

    pub fn with_storage_2d(
        storage: &Storage<T>,
        offset: usize,
        size0: i64,
        stride0: i64,
        size1: i64,
        stride1: i64,
    ) -> Result<Self> {
        Self::with_storage(storage, offset, &[size0, size1], Some(&[stride0, stride1]))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_storage_3d(
        storage: &Storage<T>,
        offset: usize,
        size0: i64,
        stride0: i64,
        size1: i64,
        stride1: i64,
        size2: i64,
        stride2: i64,
    ) -> Result<Self> {
        Self::with_storage(
            storage,
            offset,
            &[size0, size1, size2],
            Some(&[stride0, stride1, stride2]),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_storage_4d(
        storage: &Storage<T>,
        offset: usize,
        size0: i64,
        stride0: i64,
        size1: i64,
        stride1: i64,
        size2: i64,
        stride2: i64,
        size3: i64,
        stride3: i64,
    ) -> Result<Self> {
        Self::with_storage(
            storage,
            offset,
            &[size0, size1, size2, size3],
            Some(&[stride0, stride1, stride2, stride3]),
        )
    }

    /// Tensor over a fresh zeroed storage just large enough for the geometry.
    pub fn with_size(sizes: &[i64], strides: Option<&[i64]>) -> Result<Self> {
        Self::with_storage_nd(None, 0, sizes, strides)
    }

    pub fn with_size_1d(size0: usize) -> Result<Self> {
        Self::with_size(&[size0 as i64], None)
    }

    pub fn with_size_2d(size0: usize, size1: usize) -> Result<Self> {
        Self::with_size(&[size0 as i64, size1 as i64], None)
    }

    pub fn with_size_3d(size0: usize, size1: usize, size2: usize) -> Result<Self> {
        Self::with_size(&[size0 as i64, size1 as i64, size2 as i64], None)
    }

    pub fn with_size_4d(size0: usize, size1: usize, size2: usize, size3: usize) -> Result<Self> {
        Self::with_size(
            &[size0 as i64, size1 as i64, size2 as i64, size3 as i64],
            None,
        )
    }

    /// Contiguous tensor taking ownership of `data`.
    pub fn from_vec(data: Vec<T>, sizes: &[usize]) -> Result<Self> {
        let elements: usize = sizes.iter().product();
        if elements != data.len() || sizes.contains(&0) {
            return Err(raise(TensorError::shape_mismatch(&[data.len()], sizes)));
        }
        let storage = Storage::from_vec(data);
        let sizes: Vec<i64> = sizes.iter().map(|&s| s as i64).collect();
        Self::with_storage(&storage, 0, &sizes, None)
    }

    pub fn from_slice(data: &[T], sizes: &[usize]) -> Result<Self> {
        Self::from_vec(data.to_vec(), sizes)
    }

    /// Independent contiguous copy.
    pub fn new_clone(&self) -> Result<Self> {
        let mut tensor = Self::new();
        tensor.resize_as(self)?;
        tensor.copy(self)?;
        Ok(tensor)
    }

    /// `self` itself when already contiguous, a contiguous copy otherwise.
    pub fn new_contiguous(&self) -> Result<Self> {
        if self.is_contiguous() {
            Ok(Self::with_tensor(self))
        } else {
            self.new_clone()
        }
    }

    pub fn new_select(&self, dim: usize, index: usize) -> Result<Self> {
        let mut tensor = Self::with_tensor(self);
        tensor.select(dim, index)?;
        Ok(tensor)
    }

    pub fn new_narrow(&self, dim: usize, first: usize, size: usize) -> Result<Self> {
        let mut tensor = Self::with_tensor(self);
        tensor.narrow(dim, first, size)?;
        Ok(tensor)
    }

    pub fn new_transpose(&self, dim1: usize, dim2: usize) -> Result<Self> {
        let mut tensor = Self::with_tensor(self);
        tensor.transpose(dim1, dim2)?;
        Ok(tensor)
    }

    pub fn new_unfold(&self, dim: usize, size: usize, step: usize) -> Result<Self> {
        let mut tensor = Self::with_tensor(self);
        tensor.unfold(dim, size, step)?;
        Ok(tensor)
    }

    /// Reinterprets a contiguous tensor with new sizes. One size may be `-1` and is inferred.
    pub fn new_view(&self, sizes: &[i64]) -> Result<Self> {
        arg_check!(self.is_contiguous(), 1, "input is not contiguous");
        let sizes = infer_size(sizes, self.n_element())?;
        Self::with_storage_nd(self.storage.as_ref(), self.storage_offset as i64, &sizes, None)
    }

    pub fn new_expand(&self, sizes: &[usize]) -> Result<Self> {
        let mut tensor = Self::with_tensor(self);
        tensor.expand(sizes)?;
        Ok(tensor)
    }

    /// Copies `self` into `dst` and releases `self`.
    pub fn free_copy_to(self, dst: &mut Tensor<T>) -> Result<()> {
        dst.copy(&self)
    }
}

impl<T: Numeric> Default for Tensor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Numeric> Clone for Tensor<T> {
    fn clone(&self) -> Self {
        Self::with_tensor(self)
    }
}

/// Resolves a single `-1` entry against the element count.
fn infer_size(sizes: &[i64], elements: usize) -> Result<Vec<i64>> {
    let mut inferred = None;
    let mut known: usize = 1;
    for (d, &s) in sizes.iter().enumerate() {
        if s == -1 {
            arg_check!(inferred.is_none(), 2, "only one dimension can be inferred");
            inferred = Some(d);
        } else {
            arg_check!(s > 0, 2, "invalid size {} at dimension {}", s, d);
            known *= s as usize;
        }
    }
    let mut sizes = sizes.to_vec();
    match inferred {
        Some(d) => {
            arg_check!(
                known > 0 && elements % known == 0,
                2,
                "size mismatch ({} elements cannot be viewed with {:?})",
                elements,
                sizes
            );
            sizes[d] = (elements / known) as i64;
        }
        None => arg_check!(
            known == elements,
            2,
            "size mismatch ({} elements cannot be viewed with {:?})",
            elements,
            sizes
        ),
    }
    Ok(sizes)
}

fn too_large() -> TensorError {
    raise(TensorError::AllocationFailed {
        elements: usize::MAX,
    })
}

/// Storage elements spanned by `size`/`stride`, 0 for a tensor with no dimensions.
fn extent(size: &[usize], stride: &[usize]) -> Option<usize> {
    if size.is_empty() {
        return Some(0);
    }
    size.iter().zip(stride).try_fold(1usize, |acc, (&s, &st)| {
        (s - 1).checked_mul(st).and_then(|span| acc.checked_add(span))
    })
}

// endregion: Tensor

// region: Storage Assignment

impl<T: Numeric> Tensor<T> {
    /// Makes `self` share `src`'s storage and geometry.
    pub fn set(&mut self, src: &Tensor<T>) {
        if !self.is_storage(src.storage.as_ref()) {
            self.storage = src.storage.clone();
        }
        self.storage_offset = src.storage_offset;
        self.size.clone_from(&src.size);
        self.stride.clone_from(&src.stride);
    }

    /// Points `self` at `storage`, with one stride per size.
    pub fn set_storage(
        &mut self,
        storage: Option<&Storage<T>>,
        offset: i64,
        sizes: &[i64],
        strides: Option<&[i64]>,
    ) -> Result<()> {
        if let Some(strides) = strides {
            arg_check!(strides.len() == sizes.len(), 5, "inconsistent size/stride sizes");
        }
        self.set_storage_nd(storage, offset, sizes, strides)
    }

    /// The one place a tensor's storage handle is replaced.
    ///
    /// The storage grows when the new geometry reaches past its end.
    pub fn set_storage_nd(
        &mut self,
        storage: Option<&Storage<T>>,
        offset: i64,
        sizes: &[i64],
        strides: Option<&[i64]>,
    ) -> Result<()> {
        arg_check!(offset >= 0, 3, "Tensor: invalid storage offset");
        if !self.is_storage(storage) {
            self.storage = storage.cloned();
        }
        self.storage_offset = offset as usize;
        self.resize_nd(sizes, strides)?;
        let required = self.required_len()?;
        self.reserve(required)
    }

    pub fn set_storage_1d(&mut self, storage: Option<&Storage<T>>, offset: i64, size0: i64, stride0: i64) -> Result<()> {
        self.set_storage_nd(storage, offset, &[size0], Some(&[stride0]))
    }

    pub fn set_storage_2d(
        &mut self,
        storage: Option<&Storage<T>>,
        offset: i64,
        size0: i64,
        stride0: i64,
        size1: i64,
        stride1: i64,
    ) -> Result<()> {
        self.set_storage_nd(storage, offset, &[size0, size1], Some(&[stride0, stride1]))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_storage_3d(
        &mut self,
        storage: Option<&Storage<T>>,
        offset: i64,
        size0: i64,
        stride0: i64,
        size1: i64,
        stride1: i64,
        size2: i64,
        stride2: i64,
    ) -> Result<()> {
        self.set_storage_nd(
            storage,
            offset,
            &[size0, size1, size2],
            Some(&[stride0, stride1, stride2]),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_storage_4d(
        &mut self,
        storage: Option<&Storage<T>>,
        offset: i64,
        size0: i64,
        stride0: i64,
        size1: i64,
        stride1: i64,
        size2: i64,
        stride2: i64,
        size3: i64,
        stride3: i64,
    ) -> Result<()> {
        self.set_storage_nd(
            storage,
            offset,
            &[size0, size1, size2, size3],
            Some(&[stride0, stride1, stride2, stride3]),
        )
    }

    fn is_storage(&self, storage: Option<&Storage<T>>) -> bool {
        match (&self.storage, storage) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            (None, None) => true,
            _ => false,
        }
    }

    fn required_len(&self) -> Result<usize> {
        if self.size.is_empty() {
            return Ok(0);
        }
        extent(&self.size, &self.stride)
            .and_then(|e| e.checked_add(self.storage_offset))
            .ok_or_else(too_large)
    }

    /// Creates or grows the storage to hold `required` elements. Never shrinks.
    fn reserve(&mut self, required: usize) -> Result<()> {
        if required == 0 {
            return Ok(());
        }
        let storage = self.storage.get_or_insert_with(Storage::new);
        if required > storage.len() {
            storage.resize(required)?;
        }
        Ok(())
    }

    // endregion: Storage Assignment

    // region: Resize

    /// Sets the geometry to `sizes`, truncated at the first non-positive entry.
    ///
    /// Non-negative `strides` entries are kept; the rest default to row-major. Nothing
    /// happens when the geometry already matches, otherwise the storage grows to fit.
    pub fn resize_nd(&mut self, sizes: &[i64], strides: Option<&[i64]>) -> Result<()> {
        if let Some(strides) = strides {
            arg_check!(strides.len() == sizes.len(), 3, "invalid stride");
        }
        let n = sizes.iter().take_while(|&&s| s > 0).count();

        let mut unchanged = n == self.size.len();
        for d in 0..n {
            if !unchanged {
                break;
            }
            if self.size[d] as i64 != sizes[d] {
                unchanged = false;
            }
            if let Some(strides) = strides {
                if strides[d] >= 0 && self.stride[d] as i64 != strides[d] {
                    unchanged = false;
                }
            }
        }
        if unchanged {
            return Ok(());
        }

        let size: Vec<usize> = sizes[..n].iter().map(|&s| s as usize).collect();
        let mut stride = vec![0usize; n];
        for d in (0..n).rev() {
            stride[d] = match strides.map(|s| s[d]) {
                Some(s) if s >= 0 => s as usize,
                _ if d == n - 1 => 1,
                _ => size[d + 1].checked_mul(stride[d + 1]).ok_or_else(too_large)?,
            };
        }

        if n > 0 {
            let required = extent(&size, &stride)
                .and_then(|e| e.checked_add(self.storage_offset))
                .ok_or_else(too_large)?;
            self.reserve(required)?;
        }
        self.size = size;
        self.stride = stride;
        Ok(())
    }

    pub fn resize(&mut self, sizes: &[i64], strides: Option<&[i64]>) -> Result<()> {
        self.resize_nd(sizes, strides)
    }

    /// Resizes to `src`'s sizes unless they already match.
    pub fn resize_as<U: Numeric>(&mut self, src: &Tensor<U>) -> Result<()> {
        if self.is_same_size_as(src) {
            return Ok(());
        }
        let sizes: Vec<i64> = src.size.iter().map(|&s| s as i64).collect();
        self.resize_nd(&sizes, None)
    }

    pub fn resize_1d(&mut self, size0: usize) -> Result<()> {
        self.resize_nd(&[size0 as i64], None)
    }

    pub fn resize_2d(&mut self, size0: usize, size1: usize) -> Result<()> {
        self.resize_nd(&[size0 as i64, size1 as i64], None)
    }

    pub fn resize_3d(&mut self, size0: usize, size1: usize, size2: usize) -> Result<()> {
        self.resize_nd(&[size0 as i64, size1 as i64, size2 as i64], None)
    }

    pub fn resize_4d(&mut self, size0: usize, size1: usize, size2: usize, size3: usize) -> Result<()> {
        self.resize_nd(
            &[size0 as i64, size1 as i64, size2 as i64, size3 as i64],
            None,
        )
    }

    pub fn resize_5d(
        &mut self,
        size0: usize,
        size1: usize,
        size2: usize,
        size3: usize,
        size4: usize,
    ) -> Result<()> {
        self.resize_nd(
            &[
                size0 as i64,
                size1 as i64,
                size2 as i64,
                size3 as i64,
                size4 as i64,
            ],
            None,
        )
    }

    // endregion: Resize

    // region: Geometry

    /// Restricts `dim` to `size` entries starting at `first`.
    pub fn narrow(&mut self, dim: usize, first: usize, size: usize) -> Result<()> {
        arg_check!(dim < self.size.len(), 2, "out of range");
        arg_check!(first < self.size[dim], 3, "out of range");
        arg_check!(size > 0 && size <= self.size[dim] - first, 4, "out of range");
        self.storage_offset += first * self.stride[dim];
        self.size[dim] = size;
        Ok(())
    }

    pub fn narrow_from(&mut self, src: &Tensor<T>, dim: usize, first: usize, size: usize) -> Result<()> {
        let mut view = Self::with_tensor(src);
        view.narrow(dim, first, size)?;
        *self = view;
        Ok(())
    }

    /// Fixes `dim` at `index` and removes it.
    pub fn select(&mut self, dim: usize, index: usize) -> Result<()> {
        arg_check!(self.size.len() > 1, 1, "cannot select on a vector");
        arg_check!(dim < self.size.len(), 2, "out of range");
        arg_check!(index < self.size[dim], 3, "out of range");
        self.storage_offset += index * self.stride[dim];
        self.size.remove(dim);
        self.stride.remove(dim);
        Ok(())
    }

    pub fn select_from(&mut self, src: &Tensor<T>, dim: usize, index: usize) -> Result<()> {
        let mut view = Self::with_tensor(src);
        view.select(dim, index)?;
        *self = view;
        Ok(())
    }

    pub fn transpose(&mut self, dim1: usize, dim2: usize) -> Result<()> {
        arg_check!(dim1 < self.size.len(), 1, "out of range");
        arg_check!(dim2 < self.size.len(), 2, "out of range");
        self.size.swap(dim1, dim2);
        self.stride.swap(dim1, dim2);
        Ok(())
    }

    pub fn transpose_from(&mut self, src: &Tensor<T>, dim1: usize, dim2: usize) -> Result<()> {
        let mut view = Self::with_tensor(src);
        view.transpose(dim1, dim2)?;
        *self = view;
        Ok(())
    }

    /// Slides a window of `size` elements with `step` along `dim`.
    ///
    /// `dim` shrinks to the number of windows and a trailing dimension of length `size`
    /// walks each window.
    pub fn unfold(&mut self, dim: usize, size: usize, step: usize) -> Result<()> {
        arg_check!(!self.size.is_empty(), 1, "cannot unfold an empty tensor");
        arg_check!(dim < self.size.len(), 2, "out of range");
        arg_check!(size > 0 && size <= self.size[dim], 3, "out of range");
        arg_check!(step > 0, 4, "invalid step");
        self.size.push(size);
        self.stride.push(self.stride[dim]);
        self.size[dim] = (self.size[dim] - size) / step + 1;
        self.stride[dim] *= step;
        Ok(())
    }

    pub fn unfold_from(&mut self, src: &Tensor<T>, dim: usize, size: usize, step: usize) -> Result<()> {
        let mut view = Self::with_tensor(src);
        view.unfold(dim, size, step)?;
        *self = view;
        Ok(())
    }

    /// Removes every dimension of size 1. An all-ones tensor keeps a single dimension.
    pub fn squeeze(&mut self) {
        let had_dims = !self.size.is_empty();
        let (size, stride): (Vec<usize>, Vec<usize>) = self
            .size
            .iter()
            .zip(&self.stride)
            .filter(|(&s, _)| s != 1)
            .unzip();
        self.size = size;
        self.stride = stride;
        if self.size.is_empty() && had_dims {
            self.size.push(1);
            self.stride.push(1);
        }
    }

    pub fn squeeze_from(&mut self, src: &Tensor<T>) {
        self.set(src);
        self.squeeze();
    }

    /// Removes `dim` if it has size 1 and is not the only dimension.
    pub fn squeeze1d(&mut self, dim: usize) -> Result<()> {
        arg_check!(dim < self.size.len(), 2, "dimension out of range");
        if self.size[dim] == 1 && self.size.len() > 1 {
            self.size.remove(dim);
            self.stride.remove(dim);
        }
        Ok(())
    }

    pub fn squeeze1d_from(&mut self, src: &Tensor<T>, dim: usize) -> Result<()> {
        let mut view = Self::with_tensor(src);
        view.squeeze1d(dim)?;
        *self = view;
        Ok(())
    }

    /// Inserts a dimension of size 1 before `dim`.
    pub fn unsqueeze1d(&mut self, dim: usize) -> Result<()> {
        arg_check!(dim <= self.size.len(), 2, "dimension out of range");
        arg_check!(!self.size.is_empty(), 2, "cannot unsqueeze empty tensor");
        let stride = if dim < self.size.len() {
            self.size[dim] * self.stride[dim]
        } else {
            1
        };
        self.size.insert(dim, 1);
        self.stride.insert(dim, stride);
        Ok(())
    }

    pub fn unsqueeze1d_from(&mut self, src: &Tensor<T>, dim: usize) -> Result<()> {
        let mut view = Self::with_tensor(src);
        view.unsqueeze1d(dim)?;
        *self = view;
        Ok(())
    }

    /// Broadcasts size-1 dimensions to `sizes` with a zero stride.
    ///
    /// Missing leading dimensions are synthesized as size 1 first. Dimensions already of the
    /// target size are unchanged and any other mismatch is an error.
    pub fn expand_nd(&mut self, sizes: &[usize]) -> Result<()> {
        arg_check!(!self.size.is_empty(), 0, "can't expand an empty tensor");
        let n = self.size.len();
        arg_check!(
            sizes.len() >= n,
            1,
            "the number of sizes provided must be greater or equal to the number of dimensions in the tensor"
        );
        let leading = sizes.len() - n;

        let mut size = vec![1usize; sizes.len()];
        let mut stride = vec![0usize; sizes.len()];
        size[leading..].copy_from_slice(&self.size);
        stride[leading..].copy_from_slice(&self.stride);
        for i in (0..leading).rev() {
            stride[i] = size[i + 1] * stride[i + 1];
        }

        for (i, &target) in sizes.iter().enumerate() {
            if size[i] == 1 {
                if target != 1 {
                    arg_check!(target > 0, 1, "expanded size must be positive at dimension {}", i);
                    size[i] = target;
                    stride[i] = 0;
                }
            } else if size[i] != target {
                return argument_error(
                    1,
                    format!(
                        "The expanded size of the tensor ({}) must match the existing size ({}) at non-singleton dimension {}.",
                        target, size[i], i
                    ),
                );
            }
        }
        self.size = size;
        self.stride = stride;
        Ok(())
    }

    pub fn expand(&mut self, sizes: &[usize]) -> Result<()> {
        arg_check!(
            sizes.len() >= self.size.len(),
            1,
            "the number of sizes provided must be greater or equal to the number of dimensions in the tensor"
        );
        self.expand_nd(sizes)
    }

    pub fn expand_as<U: Numeric>(&mut self, src: &Tensor<U>) -> Result<()> {
        arg_check!(
            src.size.len() >= self.size.len(),
            1,
            "the number of dimensions of the provided tensor must be greater or equal to the number of dimensions in the tensor to be expanded"
        );
        self.expand_nd(&src.size)
    }

    // endregion: Geometry

    // region: Predicates

    /// Row-major with no gaps, ignoring the strides of size-1 dimensions.
    pub fn is_contiguous(&self) -> bool {
        let mut z = 1;
        for d in (0..self.size.len()).rev() {
            if self.size[d] != 1 {
                if self.stride[d] != z {
                    return false;
                }
                z *= self.size[d];
            }
        }
        true
    }

    pub fn is_same_size_as<U: Numeric>(&self, other: &Tensor<U>) -> bool {
        self.size == other.size
    }

    /// Same storage, offset, sizes and strides.
    pub fn is_set_to(&self, other: &Tensor<T>) -> bool {
        match (&self.storage, &other.storage) {
            (Some(a), Some(b)) => {
                a.ptr_eq(b)
                    && self.storage_offset == other.storage_offset
                    && self.size == other.size
                    && self.stride == other.stride
            }
            _ => false,
        }
    }

    pub fn is_size(&self, sizes: &[usize]) -> bool {
        self.size == sizes
    }

    /// Whether the layout looks like a transposed contiguous block: not contiguous, no
    /// broadcast dimensions, and the largest stride times its size covers every element.
    pub fn is_transposed(&self) -> bool {
        if self.is_contiguous() {
            return false;
        }
        let mut max_stride = 1;
        let mut size_max_stride = 1;
        let mut z = 1;
        for (&size, &stride) in self.size.iter().zip(&self.stride) {
            if stride == 0 && size != 1 {
                return false;
            }
            if stride > max_stride {
                max_stride = stride;
                size_max_stride = size;
            }
            z *= size;
        }
        z == max_stride * size_max_stride
    }

    // endregion: Predicates

    // region: Queries

    pub fn n_dimension(&self) -> usize {
        self.size.len()
    }

    pub fn n_element(&self) -> usize {
        if self.size.is_empty() {
            0
        } else {
            self.size.iter().product()
        }
    }

    pub fn size(&self, dim: usize) -> Result<usize> {
        arg_check!(
            dim < self.size.len(),
            2,
            "dimension {} out of range of {}D tensor",
            dim,
            self.size.len()
        );
        Ok(self.size[dim])
    }

    pub fn stride(&self, dim: usize) -> Result<usize> {
        arg_check!(
            dim < self.stride.len(),
            2,
            "dimension {} out of range of {}D tensor",
            dim,
            self.stride.len()
        );
        Ok(self.stride[dim])
    }

    pub fn sizes(&self) -> &[usize] {
        &self.size
    }

    pub fn strides(&self) -> &[usize] {
        &self.stride
    }

    pub fn storage_offset(&self) -> usize {
        self.storage_offset
    }

    pub fn storage(&self) -> Option<&Storage<T>> {
        self.storage.as_ref()
    }

    /// Address of the first element, null without storage.
    pub fn data(&self) -> *mut T {
        match &self.storage {
            Some(storage) => storage.as_ptr().wrapping_add(self.storage_offset),
            None => core::ptr::null_mut(),
        }
    }

    /// Fails unless every element addressed by the geometry lies inside the storage.
    pub(crate) fn check_extent(&self, arg: usize) -> Result<()> {
        let required = self.required_len()?;
        let available = self.storage.as_ref().map_or(0, |s| s.len());
        arg_check!(
            self.n_element() == 0 || required <= available,
            arg,
            "tensor of size {:?} at offset {} exceeds its storage of {} elements",
            self.size,
            self.storage_offset,
            available
        );
        Ok(())
    }

    /// `"FloatTensor of size 2x3"`.
    pub fn desc(&self) -> String {
        self.to_string()
    }

    /// Elements in row-major iteration order.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.check_extent(1)?;
        let total = self.n_element();
        let mut out = Vec::with_capacity(total);
        if total == 0 {
            return Ok(out);
        }
        let base = self.data();
        let ndim = self.size.len();
        let mut index = vec![0usize; ndim];
        let mut offset = 0usize;
        for _ in 0..total {
            out.push(unsafe { *base.add(offset) });
            for d in (0..ndim).rev() {
                index[d] += 1;
                offset += self.stride[d];
                if index[d] < self.size[d] {
                    break;
                }
                offset -= index[d] * self.stride[d];
                index[d] = 0;
            }
        }
        Ok(out)
    }

    // endregion: Queries

    // region: Element Access

    fn element_index(&self, index: &[usize]) -> Result<usize> {
        const RANKS: [&str; 4] = ["one dimension", "two dimensions", "three dimensions", "four dimensions"];
        arg_check!(
            self.size.len() == index.len(),
            1,
            "tensor must have {}",
            RANKS[index.len() - 1]
        );
        arg_check!(
            index.iter().zip(&self.size).all(|(&i, &s)| i < s),
            2,
            "out of range"
        );
        Ok(self.storage_offset
            + index
                .iter()
                .zip(&self.stride)
                .map(|(&i, &s)| i * s)
                .sum::<usize>())
    }

    fn element_storage(&self) -> Result<&Storage<T>> {
        match &self.storage {
            Some(storage) => Ok(storage),
            None => argument_error(1, "tensor has no storage"),
        }
    }

    pub fn get1d(&self, i0: usize) -> Result<T> {
        let at = self.element_index(&[i0])?;
        self.element_storage()?.get(at)
    }

    pub fn get2d(&self, i0: usize, i1: usize) -> Result<T> {
        let at = self.element_index(&[i0, i1])?;
        self.element_storage()?.get(at)
    }

    pub fn get3d(&self, i0: usize, i1: usize, i2: usize) -> Result<T> {
        let at = self.element_index(&[i0, i1, i2])?;
        self.element_storage()?.get(at)
    }

    pub fn get4d(&self, i0: usize, i1: usize, i2: usize, i3: usize) -> Result<T> {
        let at = self.element_index(&[i0, i1, i2, i3])?;
        self.element_storage()?.get(at)
    }

    pub fn set1d(&self, i0: usize, value: T) -> Result<()> {
        let at = self.element_index(&[i0])?;
        self.element_storage()?.set(at, value)
    }

    pub fn set2d(&self, i0: usize, i1: usize, value: T) -> Result<()> {
        let at = self.element_index(&[i0, i1])?;
        self.element_storage()?.set(at, value)
    }

    pub fn set3d(&self, i0: usize, i1: usize, i2: usize, value: T) -> Result<()> {
        let at = self.element_index(&[i0, i1, i2])?;
        self.element_storage()?.set(at, value)
    }

    pub fn set4d(&self, i0: usize, i1: usize, i2: usize, i3: usize, value: T) -> Result<()> {
        let at = self.element_index(&[i0, i1, i2, i3])?;
        self.element_storage()?.set(at, value)
    }

    // endregion: Element Access
}

impl<T: Numeric> fmt::Display for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Tensor of size ", T::KIND)?;
        for (i, size) in self.size.iter().enumerate() {
            if i > 0 {
                f.write_str("x")?;
            }
            write!(f, "{}", size)?;
        }
        Ok(())
    }
}

impl<T: Numeric> fmt::Debug for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("kind", &T::KIND)
            .field("storage_offset", &self.storage_offset)
            .field("size", &self.size)
            .field("stride", &self.stride)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arange(n: usize) -> Tensor<f64> {
        Tensor::from_vec((1..=n).map(|v| v as f64).collect(), &[n]).unwrap()
    }

    #[test]
    fn tensor_creation() {
        let t = Tensor::<f32>::with_size_2d(2, 3).unwrap();
        assert_eq!(t.sizes(), &[2, 3]);
        assert_eq!(t.strides(), &[3, 1]);
        assert_eq!(t.n_element(), 6);
        assert!(t.is_contiguous());
        assert_eq!(t.storage().unwrap().len(), 6);
        assert_eq!(t.desc(), "FloatTensor of size 2x3");

        let empty = Tensor::<i32>::new();
        assert_eq!(empty.n_dimension(), 0);
        assert_eq!(empty.n_element(), 0);
        assert!(empty.storage().is_none());
    }

    #[test]
    fn tensor_narrow_scenario() {
        let t = arange(5);
        let view = t.new_narrow(0, 1, 3).unwrap();
        assert_eq!(view.to_vec().unwrap(), vec![2.0, 3.0, 4.0]);
        assert_eq!(view.storage_offset(), 1);

        view.set1d(0, 20.0).unwrap();
        assert_eq!(t.storage().unwrap().get(1).unwrap(), 20.0);
        assert_eq!(t.get1d(1).unwrap(), 20.0);
    }

    #[test]
    fn tensor_full_narrow_is_set_to_source() {
        let t = Tensor::<i32>::with_size_2d(3, 4).unwrap();
        let view = t.new_narrow(1, 0, 4).unwrap();
        assert!(view.is_same_size_as(&t));
        assert!(view.is_set_to(&t));
        view.set2d(2, 3, 7).unwrap();
        assert_eq!(t.get2d(2, 3).unwrap(), 7);
    }

    #[test]
    fn tensor_narrow_argument_positions() {
        let t = arange(5);
        assert_eq!(t.new_narrow(1, 0, 1).unwrap_err().arg(), Some(2));
        assert_eq!(t.new_narrow(0, 5, 1).unwrap_err().arg(), Some(3));
        assert_eq!(t.new_narrow(0, 3, 3).unwrap_err().arg(), Some(4));
        assert_eq!(t.new_narrow(0, 3, 0).unwrap_err().arg(), Some(4));
    }

    #[test]
    fn tensor_select_scenario() {
        let t = Tensor::from_vec((0..16).map(|v| v as f32).collect(), &[4, 4]).unwrap();
        let row = t.new_select(0, 2).unwrap();
        assert_eq!(row.n_dimension(), 1);
        assert_eq!(row.to_vec().unwrap(), vec![8.0, 9.0, 10.0, 11.0]);

        let column = t.new_select(1, 1).unwrap();
        assert_eq!(column.to_vec().unwrap(), vec![1.0, 5.0, 9.0, 13.0]);
        assert_eq!(column.strides(), &[4]);

        assert_eq!(row.new_select(0, 0).unwrap_err().arg(), Some(1));
        assert_eq!(t.new_select(2, 0).unwrap_err().arg(), Some(2));
        assert_eq!(t.new_select(0, 4).unwrap_err().arg(), Some(3));
    }

    #[test]
    fn tensor_unfold_scenario() {
        let t = arange(5);
        let windows = t.new_unfold(0, 2, 1).unwrap();
        assert_eq!(windows.sizes(), &[4, 2]);
        assert_eq!(windows.strides(), &[1, 1]);
        assert_eq!(
            windows.to_vec().unwrap(),
            vec![1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0, 5.0]
        );

        let strided = t.new_unfold(0, 2, 2).unwrap();
        assert_eq!(strided.sizes(), &[2, 2]);
        assert_eq!(strided.to_vec().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);

        assert_eq!(Tensor::<f64>::new().new_unfold(0, 1, 1).unwrap_err().arg(), Some(1));
        assert_eq!(t.new_unfold(0, 6, 1).unwrap_err().arg(), Some(3));
        assert_eq!(t.new_unfold(0, 2, 0).unwrap_err().arg(), Some(4));
    }

    #[test]
    fn tensor_transpose() {
        let t = Tensor::<f64>::with_size_3d(2, 3, 4).unwrap();
        let tt = t.new_transpose(0, 2).unwrap();
        assert_eq!(tt.sizes(), &[4, 3, 2]);
        assert!(!tt.is_contiguous());
        let back = tt.new_transpose(0, 2).unwrap();
        assert!(back.is_set_to(&t));
        assert_eq!(t.new_transpose(3, 0).unwrap_err().arg(), Some(1));
        assert_eq!(t.new_transpose(0, 3).unwrap_err().arg(), Some(2));
    }

    #[test]
    fn tensor_is_transposed() {
        let t = Tensor::<f32>::with_size_2d(3, 5).unwrap();
        assert!(!t.is_transposed());
        assert!(t.new_transpose(0, 1).unwrap().is_transposed());
        let broadcast = Tensor::<f32>::with_size_2d(1, 5).unwrap().new_expand(&[3, 5]).unwrap();
        assert!(!broadcast.is_transposed());
    }

    #[test]
    fn tensor_squeeze_and_unsqueeze() {
        let mut t = Tensor::<u8>::with_size(&[1, 3, 1, 2], None).unwrap();
        assert!(t.is_contiguous());
        let mut squeezed = t.clone();
        squeezed.squeeze();
        assert_eq!(squeezed.sizes(), &[3, 2]);
        assert!(squeezed.is_contiguous());

        let mut ones = Tensor::<u8>::with_size(&[1, 1], None).unwrap();
        ones.squeeze();
        assert_eq!((ones.sizes(), ones.strides()), (&[1][..], &[1][..]));

        t.squeeze1d(2).unwrap();
        assert_eq!(t.sizes(), &[1, 3, 2]);
        t.squeeze1d(1).unwrap();
        assert_eq!(t.sizes(), &[1, 3, 2]);
        assert_eq!(t.squeeze1d(3).unwrap_err().arg(), Some(2));

        let mut single = Tensor::<u8>::with_size_1d(1).unwrap();
        single.squeeze1d(0).unwrap();
        assert_eq!(single.sizes(), &[1]);

        let mut v = Tensor::<u8>::with_size_2d(3, 2).unwrap();
        v.unsqueeze1d(1).unwrap();
        assert_eq!((v.sizes(), v.strides()), (&[3, 1, 2][..], &[2, 2, 1][..]));
        v.unsqueeze1d(3).unwrap();
        assert_eq!(v.strides(), &[2, 2, 1, 1]);
        assert!(v.is_contiguous());
        assert_eq!(v.unsqueeze1d(5).unwrap_err().arg(), Some(2));
        assert_eq!(Tensor::<u8>::new().unsqueeze1d(0).unwrap_err().arg(), Some(2));
    }

    #[test]
    fn tensor_squeeze_keeps_strided_layout() {
        let t = Tensor::from_vec((0..24).collect::<Vec<i32>>(), &[2, 1, 3, 4]).unwrap();
        let transposed = t.new_transpose(0, 3).unwrap();
        assert_eq!(transposed.strides(), &[1, 12, 4, 12]);

        let mut squeezed = transposed.clone();
        squeezed.squeeze();
        assert_eq!((squeezed.sizes(), squeezed.strides()), (&[4, 3, 2][..], &[1, 4, 12][..]));
        assert!(!squeezed.is_contiguous());
        assert_eq!(squeezed.to_vec().unwrap(), transposed.to_vec().unwrap());

        let mut one_dim = transposed.clone();
        one_dim.squeeze1d(1).unwrap();
        assert_eq!((one_dim.sizes(), one_dim.strides()), (squeezed.sizes(), squeezed.strides()));

        let m = Tensor::from_vec((0..12).collect::<Vec<i32>>(), &[3, 4]).unwrap();
        let mut column = m.new_narrow(1, 1, 1).unwrap();
        assert!(!column.is_contiguous());
        column.squeeze();
        assert_eq!((column.sizes(), column.strides()), (&[3][..], &[4][..]));
        assert_eq!(column.storage_offset(), 1);
        assert!(!column.is_contiguous());
        assert_eq!(column.to_vec().unwrap(), vec![1, 5, 9]);
    }

    #[test]
    fn tensor_expand() {
        let column = Tensor::from_slice(&[1i64, 2, 3], &[3, 1]).unwrap();
        let wide = column.new_expand(&[3, 4]).unwrap();
        assert_eq!((wide.sizes(), wide.strides()), (&[3, 4][..], &[1, 0][..]));
        assert_eq!(wide.get2d(2, 3).unwrap(), 3);

        let batched = column.new_expand(&[2, 3, 4]).unwrap();
        assert_eq!(batched.sizes(), &[2, 3, 4]);
        assert_eq!(batched.strides(), &[0, 1, 0]);

        let err = column.new_expand(&[4, 4]).unwrap_err();
        assert_eq!(err.arg(), Some(1));
        assert!(err.to_string().contains("non-singleton dimension 0"));
        assert_eq!(column.new_expand(&[3]).unwrap_err().arg(), Some(1));
        assert!(Tensor::<i64>::new().new_expand(&[2]).is_err());

        let mut row = Tensor::<i64>::with_size_2d(1, 4).unwrap();
        row.expand_as(&wide).unwrap();
        assert_eq!(row.strides(), &[0, 1]);
    }

    #[test]
    fn tensor_resize_is_idempotent() {
        let mut t = Tensor::<f32>::new();
        t.resize_nd(&[2, 3], None).unwrap();
        let storage = t.storage().unwrap().clone();
        let ptr = storage.as_ptr();
        t.resize_nd(&[2, 3], None).unwrap();
        assert!(t.storage().unwrap().ptr_eq(&storage));
        assert_eq!(t.storage().unwrap().as_ptr(), ptr);
        assert_eq!(t.strides(), &[3, 1]);

        t.resize_nd(&[4, 0, 7], None).unwrap();
        assert_eq!(t.sizes(), &[4]);
        assert_eq!(storage.len(), 6);

        t.resize_2d(3, 3).unwrap();
        assert_eq!(storage.len(), 9);
        t.resize_1d(2).unwrap();
        assert_eq!(storage.len(), 9);
    }

    #[test]
    fn tensor_resize_keeps_explicit_strides() {
        let mut t = Tensor::<i16>::new();
        t.resize_nd(&[2, 3], Some(&[1, 2])).unwrap();
        assert_eq!(t.strides(), &[1, 2]);
        assert_eq!(t.storage().unwrap().len(), 6);
        t.resize_nd(&[2, 3], Some(&[-1, 1])).unwrap();
        assert_eq!(t.strides(), &[3, 1]);
        assert_eq!(t.resize_nd(&[2, 3], Some(&[1])).unwrap_err().arg(), Some(3));
    }

    #[test]
    fn tensor_set_storage() {
        let storage = Storage::from_slice(&[0.5f64; 4]);
        let mut t = Tensor::new();
        t.set_storage_2d(Some(&storage), 1, 2, 1, 2, 1).unwrap();
        assert_eq!(t.to_vec().unwrap(), vec![0.5; 4]);
        assert_eq!(storage.refcount(), 2);
        assert_eq!(t.set_storage_1d(Some(&storage), -1, 2, 1).unwrap_err().arg(), Some(3));

        t.set_storage_1d(Some(&storage), 2, 4, 1).unwrap();
        assert_eq!(storage.len(), 6);

        let other = Tensor::<f64>::with_size_1d(3).unwrap();
        t.set(&other);
        assert!(t.is_set_to(&other));
        assert_eq!(storage.refcount(), 1);
    }

    #[test]
    fn tensor_storage_inconsistent_strides() {
        let storage = Storage::<u8>::try_new(8).unwrap();
        let err = Tensor::with_storage(&storage, 0, &[2, 4], Some(&[4])).unwrap_err();
        assert_eq!(err.arg(), Some(4));
        let t = Tensor::with_storage_2d(&storage, 0, 2, 4, 4, 1).unwrap();
        assert!(t.is_contiguous());
    }

    #[test]
    fn tensor_accessor_checks() {
        let t = Tensor::<i32>::with_size_2d(2, 2).unwrap();
        assert_eq!(t.get1d(0).unwrap_err().arg(), Some(1));
        assert_eq!(t.get2d(2, 0).unwrap_err().arg(), Some(2));
        assert_eq!(t.set3d(0, 0, 0, 1).unwrap_err().arg(), Some(1));
        t.set2d(1, 0, 9).unwrap();
        assert_eq!(t.get2d(1, 0).unwrap(), 9);
        assert_eq!(t.size(2).unwrap_err().arg(), Some(2));
        assert_eq!(t.stride(0).unwrap(), 2);
    }

    #[test]
    fn tensor_view_infers_size() {
        let t = arange(6);
        let m = t.new_view(&[-1, 3]).unwrap();
        assert_eq!(m.sizes(), &[2, 3]);
        assert!(m.is_set_to(&t.new_view(&[2, 3]).unwrap()));
        assert_eq!(t.new_view(&[-1, -1]).unwrap_err().arg(), Some(2));
        assert_eq!(t.new_view(&[4, -1]).unwrap_err().arg(), Some(2));
        let transposed = m.new_transpose(0, 1).unwrap();
        assert_eq!(transposed.new_view(&[6]).unwrap_err().arg(), Some(1));
    }

    #[test]
    fn tensor_from_vec_checks_shape() {
        let err = Tensor::from_vec(vec![1u8, 2, 3], &[2, 2]).unwrap_err();
        assert!(matches!(err, TensorError::ShapeMismatch { .. }));
    }

    #[test]
    fn tensor_extent_guard() {
        let storage = Storage::from_slice(&[1.0f32, 2.0, 3.0, 4.0]);
        let t = Tensor::with_storage_1d(&storage, 0, 4, 1).unwrap();
        assert!(t.check_extent(1).is_ok());
        storage.resize(2).unwrap();
        assert_eq!(t.to_vec().unwrap_err().arg(), Some(1));
        assert!(t.get1d(3).is_err());
    }
}
