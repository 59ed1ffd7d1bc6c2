//! Handoff Lock
//!
//! Mutual exclusion between the producer (real-time) thread and the control
//! thread, where only the control side is ever allowed to wait.
//!
//! ```text
//!                 try_lock_producer (CAS)
//!   ┌──────────┐ ─────────────────────────▶ ┌──────────┐
//!   │ Unlocked │                            │ Producer │
//!   └──────────┘ ◀───────────────────────── └──────────┘
//!     │     ▲        producer guard drop         │ control arrives
//!     │     │                                    ▼
//!     │     │  control guard drop   ┌──────────────────────────┐
//!     ▼     │                       │ Producer, control parked │
//!   ┌──────────┐                    └──────────────────────────┘
//!   │ Control  │                       producer drop: Unlocked + notify
//!   └──────────┘
//! ```
//!
//! The producer never touches the parking mutex. A wakeup that races with a
//! control thread going to sleep is covered by a short timed wait.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

const UNLOCKED: u8 = 0;
const CONTROL: u8 = 1;
const PRODUCER: u8 = 2;
const PRODUCER_CONTROL_WAITING: u8 = 3;

/// Upper bound on a parked control thread's sleep before it re-checks the state
const PARK_TIMEOUT: Duration = Duration::from_millis(1);

/// Data shared between the producer and control threads
pub struct HandoffLock<T> {
    state: AtomicU8,
    parking: Mutex<()>,
    wake: Condvar,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is serialized by `state`; guards hand out &mut T
// to one thread at a time.
unsafe impl<T: Send> Send for HandoffLock<T> {}
unsafe impl<T: Send> Sync for HandoffLock<T> {}

impl<T> HandoffLock<T> {
    pub fn new(data: T) -> Self {
        Self {
            state: AtomicU8::new(UNLOCKED),
            parking: Mutex::new(()),
            wake: Condvar::new(),
            data: UnsafeCell::new(data),
        }
    }

    /// Producer-side acquire
    ///
    /// # Real-time Safety
    ///
    /// A single compare-and-swap. Fails immediately when the control side
    /// holds the lock; a failed attempt changes nothing, so it can simply be
    /// retried on the next cycle.
    pub fn try_lock_producer(&self) -> Option<ProducerGuard<'_, T>> {
        self.state
            .compare_exchange(UNLOCKED, PRODUCER, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| ProducerGuard { lock: self })
    }

    /// Control-side acquire; parks until the lock is free
    pub fn lock_control(&self) -> ControlGuard<'_, T> {
        loop {
            match self
                .state
                .compare_exchange(UNLOCKED, CONTROL, Ordering::Acquire, Ordering::Relaxed)
            {
                Ok(_) => return ControlGuard { lock: self },
                Err(PRODUCER) => {
                    // Ask the producer to wake us on release. Losing this race
                    // just means the next loop iteration sees a new state.
                    let _ = self.state.compare_exchange(
                        PRODUCER,
                        PRODUCER_CONTROL_WAITING,
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    );
                    self.park();
                }
                Err(_) => self.park(),
            }
        }
    }

    /// Control-side acquire without waiting
    pub fn try_lock_control(&self) -> Option<ControlGuard<'_, T>> {
        self.state
            .compare_exchange(UNLOCKED, CONTROL, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| ControlGuard { lock: self })
    }

    /// True while either side holds the lock
    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) != UNLOCKED
    }

    fn park(&self) {
        let mut parked = self.parking.lock();
        if self.state.load(Ordering::Acquire) != UNLOCKED {
            self.wake.wait_for(&mut parked, PARK_TIMEOUT);
        }
    }

    fn unlock_producer(&self) {
        let previous = self.state.swap(UNLOCKED, Ordering::Release);
        if previous == PRODUCER_CONTROL_WAITING {
            // Rust pattern: Condvar::notify_* does not need the mutex held,
            // which keeps the producer off the parking lock entirely.
            self.wake.notify_all();
        }
    }

    fn unlock_control(&self) {
        self.state.store(UNLOCKED, Ordering::Release);
        self.wake.notify_all();
    }
}

/// Exclusive access held by the producer thread
pub struct ProducerGuard<'a, T> {
    lock: &'a HandoffLock<T>,
}

impl<T> Deref for ProducerGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: state is PRODUCER (or PRODUCER_CONTROL_WAITING) while the guard lives
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for ProducerGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above, and the guard is the only handle
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for ProducerGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.unlock_producer();
    }
}

/// Exclusive access held by the control thread
pub struct ControlGuard<'a, T> {
    lock: &'a HandoffLock<T>,
}

impl<T> Deref for ControlGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: state is CONTROL while the guard lives
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for ControlGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above, and the guard is the only handle
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for ControlGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.unlock_control();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_producer_fails_while_control_holds() {
        let lock = HandoffLock::new(0u32);
        let control = lock.lock_control();
        assert!(lock.try_lock_producer().is_none());
        // a failed attempt leaves the state untouched
        assert!(lock.try_lock_producer().is_none());
        drop(control);

        let mut producer = lock.try_lock_producer().unwrap();
        *producer += 1;
        drop(producer);
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_control_try_lock_respects_producer() {
        let lock = HandoffLock::new(());
        let producer = lock.try_lock_producer().unwrap();
        assert!(lock.try_lock_control().is_none());
        drop(producer);
        assert!(lock.try_lock_control().is_some());
    }

    #[test]
    fn test_control_waits_for_producer() {
        let lock = Arc::new(HandoffLock::new(Vec::<&'static str>::new()));
        let released = Arc::new(AtomicBool::new(false));

        let mut producer = lock.try_lock_producer().unwrap();
        producer.push("producer");

        let waiter = {
            let lock = Arc::clone(&lock);
            let released = Arc::clone(&released);
            thread::spawn(move || {
                let mut control = lock.lock_control();
                assert!(released.load(Ordering::SeqCst));
                control.push("control");
            })
        };

        thread::sleep(Duration::from_millis(20));
        released.store(true, Ordering::SeqCst);
        drop(producer);
        waiter.join().unwrap();

        let control = lock.lock_control();
        assert_eq!(*control, vec!["producer", "control"]);
    }

    #[test]
    fn test_producer_attempt_is_bounded() {
        let lock = HandoffLock::new(0u64);
        let _control = lock.lock_control();

        let start = Instant::now();
        for _ in 0..100_000 {
            assert!(lock.try_lock_producer().is_none());
        }
        // generous bound; a blocking acquire would never return at all
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_counter_under_contention() {
        let lock = Arc::new(HandoffLock::new(0u64));
        let producer_hits = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                let mut hits = 0u64;
                for _ in 0..20_000 {
                    if let Some(mut guard) = lock.try_lock_producer() {
                        *guard += 1;
                        hits += 1;
                    }
                }
                hits
            })
        };
        for _ in 0..2_000 {
            *lock.lock_control() += 1;
        }
        let hits = producer_hits.join().unwrap();
        assert_eq!(*lock.lock_control(), hits + 2_000);
    }
}
