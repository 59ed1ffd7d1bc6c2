//! Typed Pools and Pool-Owned Boxes
//!
//! `TypedPool<T>` sizes its chunks for `T`. Values live in a [`PoolBox`],
//! which hands its chunk back to the owning pool when dropped.

use std::fmt;
use std::marker::PhantomData;
use std::mem::{self, ManuallyDrop};
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};
use std::sync::Arc;

use crate::config::PoolConfig;
use crate::error::{RtMemError, RtMemResult};
use crate::pool::{Capability, Maintenance, Pool, PoolStats, CHUNK_ALIGN};

/// Pool of chunks sized and aligned for `T`
pub struct TypedPool<T> {
    pool: Arc<Pool>,
    // Rust pattern: fn() -> T keeps TypedPool Send + Sync regardless of T;
    // the pool itself never owns a T.
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedPool<T> {
    /// Create a typed pool; blocks while preallocating
    pub fn new(
        name: impl Into<String>,
        min_preallocated: usize,
        max_preallocated: usize,
    ) -> RtMemResult<Self> {
        if mem::align_of::<T>() > CHUNK_ALIGN {
            return Err(RtMemError::InvalidLayout {
                size: mem::size_of::<T>(),
                align: mem::align_of::<T>(),
            });
        }
        let config = PoolConfig {
            name: name.into(),
            chunk_size: mem::size_of::<T>().max(1),
            min_preallocated,
            max_preallocated,
        };
        Ok(Self {
            pool: Arc::new(Pool::new(&config)?),
            _marker: PhantomData,
        })
    }

    /// Move `value` into a pooled chunk without blocking
    ///
    /// # Real-time Safety
    ///
    /// Never calls the system allocator. On failure `value` is dropped.
    pub fn try_alloc(&self, value: T) -> RtMemResult<PoolBox<T>> {
        let chunk = self
            .pool
            .try_allocate()
            .ok_or(RtMemError::PoolExhausted {
                chunk_size: self.pool.chunk_size(),
            })?;
        // SAFETY: chunk is fresh from this pool, sized and aligned for T
        Ok(unsafe { PoolBox::write(chunk, value, Arc::clone(&self.pool)) })
    }

    /// Move `value` into a pooled chunk, growing the pool if needed
    pub fn ensure_alloc(&self, value: T) -> RtMemResult<PoolBox<T>> {
        let chunk = self.pool.ensure_allocate()?;
        // SAFETY: chunk is fresh from this pool, sized and aligned for T
        Ok(unsafe { PoolBox::write(chunk, value, Arc::clone(&self.pool)) })
    }

    pub fn alloc(&self, capability: Capability, value: T) -> RtMemResult<PoolBox<T>> {
        match capability {
            Capability::Atomic => self.try_alloc(value),
            Capability::Sleepy => self.ensure_alloc(value),
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn sleepy(&self) -> Maintenance {
        self.pool.sleepy()
    }

    pub fn name(&self) -> &str {
        self.pool.name()
    }
}

impl<T> Clone for TypedPool<T> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for TypedPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypedPool").field(&self.pool).finish()
    }
}

/// Owned value stored in a pool chunk
///
/// Dropping the box drops the value and returns the chunk to its pool.
/// The box keeps the pool alive, so a box may outlive the `TypedPool` it
/// came from.
pub struct PoolBox<T> {
    ptr: NonNull<T>,
    pool: Arc<Pool>,
    _owns: PhantomData<T>,
}

// SAFETY: a PoolBox owns its T exactly like Box<T> does
unsafe impl<T: Send> Send for PoolBox<T> {}
unsafe impl<T: Sync> Sync for PoolBox<T> {}

impl<T> PoolBox<T> {
    /// # Safety
    ///
    /// `chunk` must come from `pool`, be unused, and fit `T`.
    unsafe fn write(chunk: NonNull<u8>, value: T, pool: Arc<Pool>) -> Self {
        let ptr = chunk.cast::<T>();
        ptr.as_ptr().write(value);
        Self {
            ptr,
            pool,
            _owns: PhantomData,
        }
    }

    /// Move the value out and give the chunk back
    pub fn into_inner(this: Self) -> T {
        let this = ManuallyDrop::new(this);
        // SAFETY: each field is read exactly once and `this` is never dropped
        unsafe {
            let value = ptr::read(this.ptr.as_ptr());
            let pool = ptr::read(&this.pool);
            pool.deallocate(this.ptr.cast());
            value
        }
    }

    /// True when both boxes point at the same chunk
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        a.ptr == b.ptr
    }
}

impl<T> Deref for PoolBox<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: ptr holds an initialized T for the lifetime of the box
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for PoolBox<T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: unique ownership of the chunk
        unsafe { self.ptr.as_mut() }
    }
}

impl<T> Drop for PoolBox<T> {
    fn drop(&mut self) {
        // SAFETY: the value is initialized and dropped once; the chunk goes back to its own pool
        unsafe {
            ptr::drop_in_place(self.ptr.as_ptr());
            self.pool.deallocate(self.ptr.cast());
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PoolBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
