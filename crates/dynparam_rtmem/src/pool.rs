//! Fixed-Size Chunk Pool
//!
//! A pool keeps a list of pre-allocated chunks of one size. The real-time
//! side pops and pushes chunks; the system allocator is only called from
//! [`Pool::ensure_allocate`] (blocking growth) and [`Pool::sleepy`]
//! (watermark maintenance).
//!
//! # Locking
//!
//! The unused list lives behind a `parking_lot::Mutex`. Every critical section
//! is a bounded list operation; chunk and list storage are allocated and freed
//! outside the lock. The real-time path takes the lock with a bounded number
//! of `try_lock` attempts, the maintenance path with a single `try_lock` that
//! skips the whole run when the list is busy.
//!
//! Returning a chunk never waits. When the list is locked the chunk is pushed
//! onto a lock-free stack, linked through its own first word, and whoever
//! takes the lock next moves the stack into the unused list:
//!
//! ```text
//!   deallocate ──try_lock──▶ unused list
//!        │ busy                  ▲
//!        ▼                       │ next lock holder
//!   returned stack (CAS push) ───┘
//! ```

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::error::{RtMemError, RtMemResult};

/// Alignment of every chunk handed out by a pool
pub const CHUNK_ALIGN: usize = 16;

/// `try_lock` attempts made by the real-time path before reporting failure
const TRY_LOCK_SPINS: usize = 64;

/// Which allocation entry point a call site is allowed to use
///
/// Real-time code holds [`Capability::Atomic`] and only ever reaches the
/// fail-fast `try_*` entry points. Setup and control code holds
/// [`Capability::Sleepy`] and may block while the pool grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Fail fast, never call the system allocator
    Atomic,
    /// May block and grow the pool
    Sleepy,
}

/// Snapshot of a pool's bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub chunk_size: usize,
    /// Chunks currently handed out
    pub used: usize,
    /// Chunks ready to be handed out
    pub unused: usize,
}

/// Outcome of one [`Pool::sleepy`] run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Maintenance {
    /// Unused list already within the watermarks
    Idle,
    /// Chunks added to the unused list
    Grew(usize),
    /// Chunks returned to the system allocator
    Shrank(usize),
    /// List was locked by another thread, nothing done
    Busy,
    /// The system allocator refused memory
    Failed,
}

/// Tally of several [`Maintenance`] outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaintenanceSummary {
    pub grew: usize,
    pub shrank: usize,
    pub busy: usize,
    pub failed: usize,
}

impl MaintenanceSummary {
    pub fn record(&mut self, outcome: Maintenance) {
        match outcome {
            Maintenance::Idle => {}
            Maintenance::Grew(count) => self.grew += count,
            Maintenance::Shrank(count) => self.shrank += count,
            Maintenance::Busy => self.busy += 1,
            Maintenance::Failed => self.failed += 1,
        }
    }

    /// True when any chunk moved to or from the system allocator
    pub fn changed(&self) -> bool {
        self.grew > 0 || self.shrank > 0
    }
}

struct Chunk(NonNull<u8>);

// Rust pattern: raw pointers are !Send. A chunk is owned by exactly one list
// (or one caller) at a time, so moving it between threads is sound.
unsafe impl Send for Chunk {}

struct PoolLists {
    /// Capacity always covers `used + unused.len()` so returning a chunk never reallocates
    unused: Vec<Chunk>,
    used: usize,
}

/// One size class of pre-allocated chunks
pub struct Pool {
    name: String,
    layout: Layout,
    min_preallocated: usize,
    max_preallocated: usize,
    lists: Mutex<PoolLists>,
    /// Head of the chunks returned while `lists` was locked; still counted as used
    returned: AtomicPtr<u8>,
}

impl Pool {
    /// Create a pool and preallocate up to the low watermark
    ///
    /// Blocks and calls the system allocator. Never call from the real-time thread.
    pub fn new(config: &PoolConfig) -> RtMemResult<Self> {
        if config.validate().is_err() {
            return Err(RtMemError::InvalidConfig("pool chunk size or watermarks"));
        }
        // a returned chunk stores the stack link in its first word
        let size = config.chunk_size.max(std::mem::size_of::<*mut u8>());
        let layout = Layout::from_size_align(size, CHUNK_ALIGN).map_err(|_| {
            RtMemError::InvalidLayout {
                size: config.chunk_size,
                align: CHUNK_ALIGN,
            }
        })?;

        let pool = Self {
            name: config.name.clone(),
            layout,
            min_preallocated: config.min_preallocated,
            max_preallocated: config.max_preallocated,
            lists: Mutex::new(PoolLists {
                unused: Vec::with_capacity(config.max_preallocated.max(1)),
                used: 0,
            }),
            returned: AtomicPtr::new(ptr::null_mut()),
        };
        pool.grow(config.min_preallocated, true)?;

        debug!(
            "Created pool '{}' ({} byte chunks, {} preallocated)",
            pool.name, config.chunk_size, config.min_preallocated
        );
        Ok(pool)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chunk_size(&self) -> usize {
        self.layout.size()
    }

    /// Pop a chunk without blocking
    ///
    /// # Real-time Safety
    ///
    /// Bounded number of `try_lock` attempts, no system allocator call.
    /// Returns `None` when the list is empty or stays contended.
    pub fn try_allocate(&self) -> Option<NonNull<u8>> {
        let mut lists = self.try_lock_bounded()?;
        let chunk = lists.unused.pop()?;
        lists.used += 1;
        Some(chunk.0)
    }

    /// Pop a chunk, growing the pool first if it is empty
    ///
    /// May block and call the system allocator.
    pub fn ensure_allocate(&self) -> RtMemResult<NonNull<u8>> {
        loop {
            {
                let mut lists = self.lock_lists();
                if let Some(chunk) = lists.unused.pop() {
                    lists.used += 1;
                    return Ok(chunk.0);
                }
            }
            self.grow(self.min_preallocated.max(1), true)?;
        }
    }

    /// Dispatch to the entry point the capability allows
    pub fn allocate(&self, capability: Capability) -> RtMemResult<NonNull<u8>> {
        match capability {
            Capability::Atomic => self.try_allocate().ok_or(RtMemError::PoolExhausted {
                chunk_size: self.chunk_size(),
            }),
            Capability::Sleepy => self.ensure_allocate(),
        }
    }

    /// Return a chunk to the pool
    ///
    /// # Real-time Safety
    ///
    /// Never waits. With the list free this is an O(1) push, which never
    /// reallocates because growth reserves capacity for every chunk the pool
    /// has ever handed out. With the list locked the chunk goes onto the
    /// returned stack with a CAS loop.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this pool and must not be returned twice.
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>) {
        match self.lists.try_lock() {
            Some(mut lists) => {
                Self::reclaim(&self.returned, &mut lists);
                debug_assert!(lists.used > 0, "pool '{}' over-released", self.name);
                debug_assert!(lists.unused.len() < lists.unused.capacity());
                lists.used = lists.used.saturating_sub(1);
                lists.unused.push(Chunk(ptr));
            }
            // SAFETY: forwarded from the caller
            None => unsafe { self.push_returned(ptr) },
        }
    }

    /// Move the unused list toward the configured watermarks
    ///
    /// This is the only routine besides [`Pool::ensure_allocate`] that calls
    /// the system allocator. It skips the run entirely when the list is busy.
    pub fn sleepy(&self) -> Maintenance {
        let unused = match self.try_lock_lists() {
            Some(lists) => lists.unused.len(),
            None => return Maintenance::Busy,
        };

        if unused < self.min_preallocated {
            match self.grow(self.min_preallocated - unused, false) {
                Ok(0) => Maintenance::Busy,
                Ok(added) => Maintenance::Grew(added),
                Err(e) => {
                    warn!("Pool '{}' top-up failed: {}", self.name, e);
                    Maintenance::Failed
                }
            }
        } else if unused > self.max_preallocated {
            match self.shrink(unused - self.max_preallocated) {
                0 => Maintenance::Busy,
                released => Maintenance::Shrank(released),
            }
        } else {
            Maintenance::Idle
        }
    }

    /// Blocks briefly; control thread only
    pub fn stats(&self) -> PoolStats {
        let lists = self.lock_lists();
        PoolStats {
            chunk_size: self.layout.size(),
            used: lists.used,
            unused: lists.unused.len(),
        }
    }

    fn try_lock_bounded(&self) -> Option<MutexGuard<'_, PoolLists>> {
        for _ in 0..TRY_LOCK_SPINS {
            if let Some(guard) = self.try_lock_lists() {
                return Some(guard);
            }
            std::hint::spin_loop();
        }
        None
    }

    fn try_lock_lists(&self) -> Option<MutexGuard<'_, PoolLists>> {
        let mut lists = self.lists.try_lock()?;
        Self::reclaim(&self.returned, &mut lists);
        Some(lists)
    }

    fn lock_lists(&self) -> MutexGuard<'_, PoolLists> {
        let mut lists = self.lists.lock();
        Self::reclaim(&self.returned, &mut lists);
        lists
    }

    /// Push a chunk onto the returned stack
    ///
    /// # Safety
    ///
    /// `chunk` belongs to this pool and nobody else uses it any more.
    unsafe fn push_returned(&self, chunk: NonNull<u8>) {
        let link = chunk.as_ptr().cast::<*mut u8>();
        let mut head = self.returned.load(Ordering::Relaxed);
        loop {
            // SAFETY: the chunk is ours until the CAS publishes it; chunks are
            // at least pointer sized and CHUNK_ALIGN aligned
            unsafe { link.write(head) };
            match self.returned.compare_exchange_weak(
                head,
                chunk.as_ptr(),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(current) => head = current,
            }
        }
    }

    /// Move every returned chunk into the unused list; caller holds the lock
    fn reclaim(returned: &AtomicPtr<u8>, lists: &mut PoolLists) {
        let mut next = returned.swap(ptr::null_mut(), Ordering::Acquire);
        let mut count = 0;
        while let Some(chunk) = NonNull::new(next) {
            // SAFETY: every chunk on the stack had its link written by push_returned
            next = unsafe { chunk.as_ptr().cast::<*mut u8>().read() };
            // still counted in `used`, so the reserved capacity covers it
            lists.unused.push(Chunk(chunk));
            count += 1;
        }
        lists.used = lists.used.saturating_sub(count);
    }

    /// Allocate `additional` chunks and install them; returns how many were installed
    ///
    /// A bigger list is built outside the lock when the current one lacks room.
    /// In non-blocking mode a contended lock discards the fresh chunks and returns 0.
    fn grow(&self, additional: usize, blocking: bool) -> RtMemResult<usize> {
        if additional == 0 {
            return Ok(0);
        }
        let mut fresh = self.allocate_chunks(additional)?;
        let mut spare: Option<Vec<Chunk>> = None;

        loop {
            let guard = if blocking {
                Some(self.lock_lists())
            } else {
                self.try_lock_lists()
            };
            let Some(mut lists) = guard else {
                self.free_chunks(fresh);
                return Ok(0);
            };

            let needed = lists.used + lists.unused.len() + fresh.len();
            if lists.unused.capacity() >= needed {
                lists.unused.append(&mut fresh);
                return Ok(additional);
            }

            match spare.take() {
                Some(mut bigger) if bigger.capacity() >= needed => {
                    bigger.append(&mut lists.unused);
                    bigger.append(&mut fresh);
                    let old = std::mem::replace(&mut lists.unused, bigger);
                    drop(lists);
                    drop(old);
                    return Ok(additional);
                }
                stale => {
                    drop(lists);
                    drop(stale);
                    spare = Some(Vec::with_capacity(needed * 2));
                }
            }
        }
    }

    fn shrink(&self, excess: usize) -> usize {
        let mut released = Vec::with_capacity(excess);
        {
            let Some(mut lists) = self.try_lock_lists() else {
                return 0;
            };
            while lists.unused.len() > self.max_preallocated && released.len() < excess {
                match lists.unused.pop() {
                    Some(chunk) => released.push(chunk),
                    None => break,
                }
            }
        }
        let count = released.len();
        self.free_chunks(released);
        count
    }

    fn allocate_chunks(&self, count: usize) -> RtMemResult<Vec<Chunk>> {
        let mut fresh = Vec::with_capacity(count);
        for _ in 0..count {
            // SAFETY: layout size is non-zero, checked by PoolConfig::validate
            let raw = unsafe { alloc::alloc(self.layout) };
            match NonNull::new(raw) {
                Some(ptr) => fresh.push(Chunk(ptr)),
                None => {
                    self.free_chunks(fresh);
                    return Err(RtMemError::SystemAllocation {
                        chunk_size: self.layout.size(),
                    });
                }
            }
        }
        Ok(fresh)
    }

    fn free_chunks(&self, chunks: Vec<Chunk>) {
        for chunk in chunks {
            // SAFETY: every Chunk was allocated with self.layout
            unsafe { alloc::dealloc(chunk.0.as_ptr(), self.layout) };
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        let lists = self.lists.get_mut();
        Self::reclaim(&self.returned, lists);
        if lists.used > 0 {
            warn!(
                "Pool '{}' dropped with {} chunks still handed out",
                self.name, lists.used
            );
        }
        let unused = std::mem::take(&mut lists.unused);
        self.free_chunks(unused);
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.name)
            .field("chunk_size", &self.layout.size())
            .field("min_preallocated", &self.min_preallocated)
            .field("max_preallocated", &self.max_preallocated)
            .finish()
    }
}
