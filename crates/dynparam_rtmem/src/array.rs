//! Pool-Backed Fixed-Length Arrays

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr;

use crate::error::{RtMemError, RtMemResult};
use crate::generic::{RtBlock, RtMemory};
use crate::pool::{Capability, CHUNK_ALIGN};

/// Fixed-length array of `T` stored in an [`RtMemory`] block
///
/// Elements are built in place by a fallible initializer. If any element
/// fails, the ones already built are dropped and their storage returned.
pub struct RtArray<T> {
    block: RtBlock,
    len: usize,
    _owns: PhantomData<T>,
}

// SAFETY: RtArray owns its elements exactly like Vec<T> does
unsafe impl<T: Send> Send for RtArray<T> {}
unsafe impl<T: Sync> Sync for RtArray<T> {}

impl<T> RtArray<T> {
    /// Build `len` elements with `init(index)`
    ///
    /// With [`Capability::Atomic`] the block comes from the fail-fast path;
    /// `init` must itself respect the same capability.
    pub fn try_new_with<F>(
        memory: &RtMemory,
        capability: Capability,
        len: usize,
        mut init: F,
    ) -> RtMemResult<Self>
    where
        F: FnMut(usize) -> RtMemResult<T>,
    {
        if mem::align_of::<T>() > CHUNK_ALIGN {
            return Err(RtMemError::InvalidLayout {
                size: mem::size_of::<T>(),
                align: mem::align_of::<T>(),
            });
        }
        let bytes = mem::size_of::<T>()
            .checked_mul(len)
            .ok_or(RtMemError::TooLarge {
                requested: usize::MAX,
                max: memory.max_size(),
            })?;

        let mut array = Self {
            block: memory.allocate(capability, bytes)?,
            len: 0,
            _owns: PhantomData,
        };
        // Rust pattern: `len` only counts initialized elements, so an early
        // return through `?` drops exactly what was built.
        for index in 0..len {
            let value = init(index)?;
            // SAFETY: index < len and the block holds len * size_of::<T>() bytes
            unsafe { array.elements_mut().add(index).write(value) };
            array.len += 1;
        }
        Ok(array)
    }

    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the first `len` elements are initialized and aligned
        unsafe { std::slice::from_raw_parts(self.block.as_ptr().cast::<T>(), self.len) }
    }

    fn elements_mut(&mut self) -> *mut T {
        self.block.as_mut_ptr().cast::<T>()
    }
}

impl<T> Deref for RtArray<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> Drop for RtArray<T> {
    fn drop(&mut self) {
        let len = self.len;
        // SAFETY: drops the initialized prefix exactly once; the block frees itself afterwards
        unsafe { ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.elements_mut(), len)) };
    }
}

impl<T: fmt::Debug> fmt::Debug for RtArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for RtArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}
