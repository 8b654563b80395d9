//! Reference-counted flat buffers of one numeric kind.
//!
//! A [`Storage`] is a cheap handle: cloning it retains the buffer, dropping it releases it,
//! and the buffer goes away with the last handle. The count is atomic, so handles to one
//! storage may be retained and released from any number of threads.
//!
//! Four kinds of backing memory exist:
//!
//! - owned, allocated by the library and resizable
//! - external, borrowed from the caller, never freed or resized by the library
//! - mapped, a file mapped with `memmap2`, optionally shared with other processes
//! - view, a window into another storage that keeps its parent alive
//!
//! Element contents are not synchronized. Tensors sharing a storage see each other's writes
//! immediately and concurrent writes to overlapping regions are the caller's concern.

use core::cell::UnsafeCell;
use core::fmt;
use core::ptr::NonNull;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use memmap2::{MmapMut, MmapOptions};

use crate::error::{arg_check, argument_error, raise, Result, TensorError};
use crate::scalars::Numeric;

/// Storage flag bits.
pub mod flags {
    pub const REFCOUNTED: u8 = 1 << 0;
    pub const RESIZABLE: u8 = 1 << 1;
    pub const FREEMEM: u8 = 1 << 2;
    pub const VIEW: u8 = 1 << 3;
    pub const MAPPED: u8 = 1 << 4;
}

enum Buffer<T: Numeric> {
    Owned(Vec<T>),
    External {
        ptr: NonNull<T>,
        len: usize,
    },
    Mapped {
        map: MmapMut,
        ptr: NonNull<T>,
        len: usize,
    },
    View {
        parent: Storage<T>,
        offset: usize,
        len: usize,
    },
}

struct Inner<T: Numeric> {
    buffer: UnsafeCell<Buffer<T>>,
    flags: AtomicU8,
    /// Live view storages carved out of this one.
    views: AtomicUsize,
}

impl<T: Numeric> Drop for Inner<T> {
    fn drop(&mut self) {
        if let Buffer::View { parent, .. } = self.buffer.get_mut() {
            parent.inner.views.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

// Contents are shared like a C buffer; only the handle count is synchronized.
unsafe impl<T: Numeric> Send for Inner<T> {}
unsafe impl<T: Numeric> Sync for Inner<T> {}

/// Shared handle to a flat element buffer.
pub struct Storage<T: Numeric> {
    inner: Arc<Inner<T>>,
}

impl<T: Numeric> Clone for Storage<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Numeric> Storage<T> {
    fn wrap(buffer: Buffer<T>, flags: u8) -> Self {
        Self {
            inner: Arc::new(Inner {
                buffer: UnsafeCell::new(buffer),
                flags: AtomicU8::new(flags),
                views: AtomicUsize::new(0),
            }),
        }
    }

    /// Empty resizable storage.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Allocates `size` zeroed elements.
    pub fn try_new(size: usize) -> Result<Self> {
        let mut data = Vec::new();
        if data.try_reserve_exact(size).is_err() {
            return Err(raise(TensorError::AllocationFailed { elements: size }));
        }
        data.resize(size, T::ZERO);
        tracing::trace!(kind = %T::KIND, size, "allocated storage");
        Ok(Self::from_vec(data))
    }

    /// Takes ownership of `data`.
    pub fn from_vec(data: Vec<T>) -> Self {
        Self::wrap(
            Buffer::Owned(data),
            flags::REFCOUNTED | flags::RESIZABLE | flags::FREEMEM,
        )
    }

    pub fn from_slice(data: &[T]) -> Self {
        Self::from_vec(data.to_vec())
    }

    /// Wraps caller-owned memory. The storage never frees or resizes it.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `len` elements for as long as any handle
    /// to the returned storage (or a view of it) is alive.
    pub unsafe fn from_raw_parts(ptr: *mut T, len: usize) -> Result<Self> {
        let Some(ptr) = NonNull::new(ptr) else {
            return argument_error(1, "null data pointer");
        };
        Ok(Self::wrap(Buffer::External { ptr, len }, flags::REFCOUNTED))
    }

    /// Maps `path` into memory.
    ///
    /// With `size == 0` the element count is inferred from the file length. A shared mapping
    /// writes through to the file and grows it when `size` exceeds its length; a private
    /// mapping is copy-on-write and requires the file to be large enough already.
    #[tracing::instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
    pub fn with_mapping(path: impl AsRef<Path>, size: usize, shared: bool) -> Result<Self> {
        let path = path.as_ref();
        let element = core::mem::size_of::<T>();
        let file = OpenOptions::new()
            .read(true)
            .write(shared)
            .open(path)
            .map_err(|e| raise(TensorError::io(format!("cannot open file <{}>", path.display()), e)))?;
        let file_bytes = file
            .metadata()
            .map_err(|e| raise(TensorError::io(format!("cannot stat file <{}>", path.display()), e)))?
            .len();
        let file_bytes = usize::try_from(file_bytes).map_err(|_| {
            raise(TensorError::io(
                format!("file <{}> is too large to map", path.display()),
                std::io::Error::from(std::io::ErrorKind::InvalidInput),
            ))
        })?;

        let len = if size == 0 { file_bytes / element } else { size };
        arg_check!(
            len > 0,
            1,
            "cannot map empty file <{}>",
            path.display()
        );
        let Some(bytes) = len.checked_mul(element) else {
            return Err(raise(TensorError::AllocationFailed { elements: len }));
        };
        if bytes > file_bytes {
            arg_check!(
                shared,
                2,
                "file <{}> size ({} bytes) is smaller than the required mapping size ({} bytes)",
                path.display(),
                file_bytes,
                bytes
            );
            file.set_len(bytes as u64).map_err(|e| {
                raise(TensorError::io(format!("cannot grow file <{}>", path.display()), e))
            })?;
        }

        let mut options = MmapOptions::new();
        options.len(bytes);
        let mapped = unsafe {
            if shared {
                options.map_mut(&file)
            } else {
                options.map_copy(&file)
            }
        };
        let mut map = mapped.map_err(|e| {
            raise(TensorError::io(format!("cannot map file <{}>", path.display()), e))
        })?;
        let Some(ptr) = NonNull::new(map.as_mut_ptr() as *mut T) else {
            return argument_error(1, "mapping returned a null address");
        };
        tracing::trace!(kind = %T::KIND, len, shared, "mapped storage");
        Ok(Self::wrap(
            Buffer::Mapped { map, ptr, len },
            flags::REFCOUNTED | flags::MAPPED,
        ))
    }

    /// Window of `size` elements into `parent` starting at `offset`.
    ///
    /// The parent stays alive, and cannot be resized, while the view exists.
    pub fn view(parent: &Storage<T>, offset: usize, size: usize) -> Result<Self> {
        arg_check!(
            offset <= parent.len(),
            2,
            "offset {} out of range for storage of size {}",
            offset,
            parent.len()
        );
        arg_check!(
            size <= parent.len() - offset,
            3,
            "view of size {} at offset {} exceeds storage of size {}",
            size,
            offset,
            parent.len()
        );
        parent.inner.views.fetch_add(1, Ordering::AcqRel);
        Ok(Self::wrap(
            Buffer::View {
                parent: parent.clone(),
                offset,
                len: size,
            },
            flags::REFCOUNTED | flags::VIEW,
        ))
    }

    // region: Handle

    /// Another handle to the same buffer.
    pub fn retain(&self) -> Self {
        self.clone()
    }

    /// Releases this handle.
    pub fn free(self) {}

    /// Number of live handles, counting the ones held by views.
    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Whether both handles refer to the same buffer.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn flags(&self) -> u8 {
        self.inner.flags.load(Ordering::Acquire)
    }

    pub fn set_flag(&self, flag: u8) {
        self.inner.flags.fetch_or(flag, Ordering::AcqRel);
    }

    pub fn clear_flag(&self, flag: u8) {
        self.inner.flags.fetch_and(!flag, Ordering::AcqRel);
    }

    // endregion: Handle

    #[allow(clippy::mut_from_ref)]
    unsafe fn buffer(&self) -> &mut Buffer<T> {
        &mut *self.inner.buffer.get()
    }

    pub fn len(&self) -> usize {
        match unsafe { self.buffer() } {
            Buffer::Owned(v) => v.len(),
            Buffer::External { len, .. } | Buffer::Mapped { len, .. } | Buffer::View { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Address of the first element.
    ///
    /// The pointer is invalidated by [`Storage::resize`] and [`Storage::swap`].
    pub fn as_ptr(&self) -> *mut T {
        match unsafe { self.buffer() } {
            Buffer::Owned(v) => v.as_mut_ptr(),
            Buffer::External { ptr, .. } | Buffer::Mapped { ptr, .. } => ptr.as_ptr(),
            Buffer::View { parent, offset, .. } => unsafe { parent.as_ptr().add(*offset) },
        }
    }

    /// Borrows the elements.
    ///
    /// # Safety
    /// No other handle may write to the storage while the slice is alive.
    pub unsafe fn as_slice(&self) -> &[T] {
        core::slice::from_raw_parts(self.as_ptr(), self.len())
    }

    /// Mutably borrows the elements.
    ///
    /// # Safety
    /// No other handle may read or write the storage while the slice is alive.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn as_mut_slice(&self) -> &mut [T] {
        core::slice::from_raw_parts_mut(self.as_ptr(), self.len())
    }

    pub fn to_vec(&self) -> Vec<T> {
        unsafe { self.as_slice() }.to_vec()
    }

    /// Reallocates to `size` elements, keeping the first `min(old, new)`.
    ///
    /// Grown elements are zero. Only library-owned storages without live views can be
    /// resized.
    pub fn resize(&self, size: usize) -> Result<()> {
        arg_check!(
            self.flags() & flags::RESIZABLE != 0,
            1,
            "trying to resize storage that is not resizable"
        );
        arg_check!(
            self.inner.views.load(Ordering::Acquire) == 0,
            1,
            "trying to resize storage with live views"
        );
        let Buffer::Owned(data) = (unsafe { self.buffer() }) else {
            return argument_error(1, "trying to resize storage that is not resizable");
        };
        if size > data.len() && data.try_reserve_exact(size - data.len()).is_err() {
            return Err(raise(TensorError::AllocationFailed { elements: size }));
        }
        let old = data.len();
        data.resize(size, T::ZERO);
        if size < old {
            data.shrink_to_fit();
        }
        tracing::trace!(kind = %T::KIND, old, new = size, "resized storage");
        Ok(())
    }

    pub fn fill(&self, value: T) {
        unsafe { (T::vector().fill)(self.as_ptr(), value, self.len()) }
    }

    pub fn get(&self, index: usize) -> Result<T> {
        if index >= self.len() {
            return Err(raise(TensorError::IndexOutOfBounds {
                index,
                size: self.len(),
            }));
        }
        Ok(unsafe { *self.as_ptr().add(index) })
    }

    pub fn set(&self, index: usize, value: T) -> Result<()> {
        if index >= self.len() {
            return Err(raise(TensorError::IndexOutOfBounds {
                index,
                size: self.len(),
            }));
        }
        unsafe { *self.as_ptr().add(index) = value };
        Ok(())
    }

    /// Copies `src` element by element. Sizes must match.
    pub fn copy(&self, src: &Storage<T>) -> Result<()> {
        arg_check!(self.len() == src.len(), 2, "size mismatch");
        unsafe { (T::vector().copy)(self.as_ptr(), src.as_ptr(), self.len()) };
        Ok(())
    }

    /// Copies `src` of any kind, casting each element. Sizes must match.
    pub fn copy_from<U: Numeric>(&self, src: &Storage<U>) -> Result<()> {
        arg_check!(self.len() == src.len(), 2, "size mismatch");
        let dst = self.as_ptr();
        let from = src.as_ptr();
        for i in 0..self.len() {
            unsafe { *dst.add(i) = (*from.add(i)).cast::<T>() };
        }
        Ok(())
    }

    /// Exchanges the buffers (and flags) behind two handles.
    pub fn swap(&self, other: &Storage<T>) -> Result<()> {
        if self.ptr_eq(other) {
            return Ok(());
        }
        arg_check!(
            self.inner.views.load(Ordering::Acquire) == 0
                && other.inner.views.load(Ordering::Acquire) == 0,
            1,
            "cannot swap storages with live views"
        );
        unsafe { core::mem::swap(self.buffer(), other.buffer()) };
        let a = self.flags();
        let b = other.inner.flags.swap(a, Ordering::AcqRel);
        self.inner.flags.store(b, Ordering::Release);
        Ok(())
    }
}

impl<T: Numeric> Default for Storage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Numeric> fmt::Debug for Storage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("kind", &T::KIND)
            .field("len", &self.len())
            .field("flags", &self.flags())
            .field("refcount", &self.refcount())
            .finish()
    }
}
