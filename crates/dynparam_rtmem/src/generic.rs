//! Size-Class Router
//!
//! Routes a byte count to the smallest pool whose chunks fit it. Classes start
//! at the configured base size and double until the largest request fits.
//!
//! ```text
//! chunk:  ┌──────────────┬──────────────────────────────┐
//!         │ *const Pool  │ data (16-byte aligned)       │
//!         └──────────────┴──────────────────────────────┘
//!          BLOCK_HEADER    RtBlock points here
//! ```
//!
//! The owning pool's handle sits right before the data, so returning a block
//! needs no lookup table.

use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use tracing::debug;

use crate::config::{MemoryConfig, PoolConfig};
use crate::error::{RtMemError, RtMemResult};
use crate::pool::{Capability, MaintenanceSummary, Pool, PoolStats, CHUNK_ALIGN};

/// Bytes reserved in front of every block for the pool handle
pub const BLOCK_HEADER: usize = CHUNK_ALIGN;

/// Power-of-two size classes backed by one pool each
pub struct RtMemory {
    classes: Vec<Arc<Pool>>,
    max_size: usize,
}

impl RtMemory {
    /// Build every size class and preallocate; blocks
    pub fn new(config: &MemoryConfig) -> RtMemResult<Self> {
        if config.validate().is_err() {
            return Err(RtMemError::InvalidConfig("size classes"));
        }
        if config.base_chunk_size <= BLOCK_HEADER {
            return Err(RtMemError::InvalidConfig("base chunk smaller than block header"));
        }

        let mut classes = Vec::new();
        let mut chunk_size = config.base_chunk_size;
        loop {
            let pool = Pool::new(&PoolConfig {
                name: format!("memory-{}", chunk_size),
                chunk_size,
                min_preallocated: config.min_preallocated,
                max_preallocated: config.max_preallocated,
            })?;
            classes.push(Arc::new(pool));

            if chunk_size >= config.max_size + BLOCK_HEADER {
                break;
            }
            chunk_size = chunk_size
                .checked_mul(2)
                .ok_or(RtMemError::InvalidConfig("max size overflows size classes"))?;
        }

        debug!(
            "Created {} size classes ({}..{} bytes)",
            classes.len(),
            config.base_chunk_size,
            chunk_size
        );
        Ok(Self {
            classes,
            max_size: config.max_size,
        })
    }

    /// Largest request accepted
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Allocate a block of at least `size` bytes without blocking
    ///
    /// # Real-time Safety
    ///
    /// Walks the (short) class table and pops from one pool; never calls the
    /// system allocator.
    pub fn try_allocate(&self, size: usize) -> RtMemResult<RtBlock> {
        let pool = self.class_for(size)?;
        let chunk = pool.try_allocate().ok_or(RtMemError::PoolExhausted {
            chunk_size: pool.chunk_size(),
        })?;
        // SAFETY: fresh chunk from `pool`, larger than BLOCK_HEADER
        Ok(unsafe { RtBlock::install(chunk, pool) })
    }

    /// Allocate a block of at least `size` bytes, growing the class if needed
    pub fn ensure_allocate(&self, size: usize) -> RtMemResult<RtBlock> {
        let pool = self.class_for(size)?;
        let chunk = pool.ensure_allocate()?;
        // SAFETY: fresh chunk from `pool`, larger than BLOCK_HEADER
        Ok(unsafe { RtBlock::install(chunk, pool) })
    }

    pub fn allocate(&self, capability: Capability, size: usize) -> RtMemResult<RtBlock> {
        match capability {
            Capability::Atomic => self.try_allocate(size),
            Capability::Sleepy => self.ensure_allocate(size),
        }
    }

    /// Run watermark maintenance on every size class
    pub fn sleepy(&self) -> MaintenanceSummary {
        let mut summary = MaintenanceSummary::default();
        for pool in &self.classes {
            summary.record(pool.sleepy());
        }
        summary
    }

    /// Per-class bookkeeping, smallest class first
    pub fn stats(&self) -> Vec<PoolStats> {
        self.classes.iter().map(|pool| pool.stats()).collect()
    }

    /// Blocks currently handed out across all classes
    pub fn used_blocks(&self) -> usize {
        self.classes.iter().map(|pool| pool.stats().used).sum()
    }

    fn class_for(&self, size: usize) -> RtMemResult<&Arc<Pool>> {
        let too_large = RtMemError::TooLarge {
            requested: size,
            max: self.max_size,
        };
        if size > self.max_size {
            return Err(too_large);
        }
        let needed = size + BLOCK_HEADER;
        self.classes
            .iter()
            .find(|pool| pool.chunk_size() >= needed)
            .ok_or(too_large)
    }
}

impl fmt::Debug for RtMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtMemory")
            .field("classes", &self.classes.len())
            .field("max_size", &self.max_size)
            .finish()
    }
}

/// Uninitialized bytes carved out of a size class
///
/// Dropping the block returns its chunk to the class it came from.
pub struct RtBlock {
    data: NonNull<u8>,
    capacity: usize,
}

// SAFETY: the block exclusively owns its bytes; the header's pool handle is an Arc
unsafe impl Send for RtBlock {}
unsafe impl Sync for RtBlock {}

impl RtBlock {
    /// # Safety
    ///
    /// `chunk` must be a fresh chunk of `pool` with room for the header.
    unsafe fn install(chunk: NonNull<u8>, pool: &Arc<Pool>) -> Self {
        let handle = Arc::into_raw(Arc::clone(pool));
        chunk.as_ptr().cast::<*const Pool>().write(handle);
        Self {
            data: NonNull::new_unchecked(chunk.as_ptr().add(BLOCK_HEADER)),
            capacity: pool.chunk_size() - BLOCK_HEADER,
        }
    }

    /// Usable bytes (at least the requested size)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Start of the data area, aligned to [`CHUNK_ALIGN`]
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.data.as_ptr()
    }
}

impl Drop for RtBlock {
    fn drop(&mut self) {
        // SAFETY: the header was written by `install` and is read back exactly once
        unsafe {
            let chunk = self.data.as_ptr().sub(BLOCK_HEADER);
            let pool = Arc::from_raw(chunk.cast::<*const Pool>().read());
            pool.deallocate(NonNull::new_unchecked(chunk));
        }
    }
}

impl fmt::Debug for RtBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtBlock")
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_memory() -> RtMemory {
        RtMemory::new(&MemoryConfig {
            base_chunk_size: 64,
            max_size: 500,
            min_preallocated: 2,
            max_preallocated: 4,
        })
        .unwrap()
    }

    #[test]
    fn test_size_classes_double() {
        let memory = small_memory();
        let sizes: Vec<usize> = memory.stats().iter().map(|s| s.chunk_size).collect();
        // 500 + 16 header fits in 1024
        assert_eq!(sizes, vec![64, 128, 256, 512, 1024]);
    }

    #[test]
    fn test_routes_to_smallest_fitting_class() {
        let memory = small_memory();
        let small = memory.try_allocate(10).unwrap();
        assert_eq!(small.capacity(), 64 - BLOCK_HEADER);

        let exact = memory.try_allocate(48).unwrap();
        assert_eq!(exact.capacity(), 48);

        let next = memory.try_allocate(49).unwrap();
        assert_eq!(next.capacity(), 128 - BLOCK_HEADER);

        assert_eq!(memory.used_blocks(), 3);
        drop((small, exact, next));
        assert_eq!(memory.used_blocks(), 0);
    }

    #[test]
    fn test_rejects_oversized_requests() {
        let memory = small_memory();
        let err = memory.try_allocate(501).unwrap_err();
        assert_eq!(
            err,
            RtMemError::TooLarge {
                requested: 501,
                max: 500
            }
        );
    }

    #[test]
    fn test_data_is_aligned() {
        let memory = small_memory();
        let block = memory.try_allocate(100).unwrap();
        assert_eq!(block.as_ptr() as usize % CHUNK_ALIGN, 0);
    }

    #[test]
    fn test_atomic_exhaustion_and_sleepy_recovery() {
        let memory = small_memory();
        let a = memory.allocate(Capability::Atomic, 10).unwrap();
        let b = memory.allocate(Capability::Atomic, 10).unwrap();
        assert!(memory.allocate(Capability::Atomic, 10).is_err());

        let c = memory.allocate(Capability::Sleepy, 10).unwrap();
        assert_eq!(memory.used_blocks(), 3);
        drop((a, b, c));

        let summary = memory.sleepy();
        assert_eq!(summary.failed, 0);
        assert_eq!(memory.used_blocks(), 0);
    }

    #[test]
    fn test_block_survives_router_drop() {
        let memory = small_memory();
        let mut block = memory.try_allocate(8).unwrap();
        drop(memory);
        unsafe { block.as_mut_ptr().write_bytes(0xAB, 8) };
        assert_eq!(unsafe { *block.as_ptr() }, 0xAB);
    }
}
