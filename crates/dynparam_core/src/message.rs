//! Change Messages and Queues
//!
//! Control -> Producer: value changes and command requests
//! Producer -> Control: value changes made by the producer itself
//!
//! Messages are moved into pool boxes when posted and the chunk goes back to
//! the pool when the receiver consumes the box. Both ends of each queue sit
//! inside the handoff-locked state, so the ring buffer never sees two
//! threads at once.

use dynparam_rtmem::{Capability, PoolBox, RtString, TypedPool};
use rtrb::{Consumer, Producer, RingBuffer};

use crate::error::{EngineError, EngineResult};
use crate::node::{CommandId, ParameterId};
use crate::value::Value;

/// Messages drained by the producer thread
#[derive(Debug)]
pub(crate) enum ToProducer {
    /// Set a parameter the control side holds a handle to
    SetParameter { parameter: ParameterId, value: Value },

    /// Set a parameter by encoded path; parked if the path does not resolve yet
    SetByPath { path: RtString, value: Value },

    /// Run a command on the value owner
    ExecuteCommand { command: CommandId },
}

/// Messages drained by the control thread
#[derive(Debug)]
pub(crate) enum ToControl {
    /// The producer stored a new value
    ValueChanged { parameter: ParameterId, value: Value },
}

/// Fixed-capacity FIFO of pooled messages
pub(crate) struct MessageQueue<T> {
    tx: Producer<PoolBox<T>>,
    rx: Consumer<PoolBox<T>>,
}

impl<T> MessageQueue<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, rx) = RingBuffer::new(capacity);
        Self { tx, rx }
    }

    /// Enqueue an already-boxed message; on a full queue the box is dropped
    pub(crate) fn push(&mut self, message: PoolBox<T>) -> EngineResult<()> {
        self.tx.push(message).map_err(|_| EngineError::QueueFull)
    }

    /// Box `message` from `pool` and enqueue it
    ///
    /// # Real-time Safety
    ///
    /// With [`Capability::Atomic`] this is a pool pop plus a ring-buffer
    /// write. A full queue is detected before any chunk is taken.
    pub(crate) fn post(
        &mut self,
        pool: &TypedPool<T>,
        capability: Capability,
        message: T,
    ) -> EngineResult<()> {
        if self.tx.is_full() {
            return Err(EngineError::QueueFull);
        }
        let boxed = pool
            .alloc(capability, message)
            .map_err(|_| EngineError::OutOfMemory { what: "messages" })?;
        self.push(boxed)
    }

    pub(crate) fn pop(&mut self) -> Option<PoolBox<T>> {
        self.rx.pop().ok()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.rx.slots()
    }

    /// Drop every queued message
    pub(crate) fn clear(&mut self) -> usize {
        let mut dropped = 0;
        while self.rx.pop().is_ok() {
            dropped += 1;
        }
        dropped
    }
}
