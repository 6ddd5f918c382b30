//! Bounded lock-free queues for cross-thread messaging
//!
//! This module wraps the `rtrb` ringbuffer in the push/drain contract
//! used between the UI thread and the poll-loop worker:
//!
//! - `try_push` never blocks; when the queue is full the message is
//!   dropped and `false` is returned. Overflow is an accepted lossy
//!   degradation, not an error — capacities are chosen generously
//!   relative to per-cycle message volume.
//! - `drain` never blocks; it hands every currently-queued message to a
//!   visitor in FIFO order and returns.
//!
//! # Why Lock-Free?
//!
//! A mutex shared with a render or worker loop turns every full queue
//! into a stall. With an SPSC ringbuffer both sides are wait-free:
//! the producer pushes in ~50ns and the consumer pops in ~50ns, no
//! contention possible.
//!
//! Ownership enforces the single-producer/single-consumer discipline:
//! each half is `Send` but not cloneable, so exactly one thread can
//! push and exactly one can drain.

/// Producer half of a bounded SPSC queue
pub struct QueueSender<T> {
    producer: rtrb::Producer<T>,
}

/// Consumer half of a bounded SPSC queue
pub struct QueueReceiver<T> {
    consumer: rtrb::Consumer<T>,
}

/// Create a bounded SPSC queue with the given capacity
///
/// Returns `(QueueSender, QueueReceiver)`; move each half to its
/// designated thread.
pub fn spsc_channel<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let (producer, consumer) = rtrb::RingBuffer::new(capacity);
    (QueueSender { producer }, QueueReceiver { consumer })
}

impl<T> QueueSender<T> {
    /// Push a message without blocking
    ///
    /// Returns `false` and drops the message if the queue is full or
    /// the consumer is gone. Queue contents are unchanged in that case.
    pub fn try_push(&mut self, msg: T) -> bool {
        self.producer.push(msg).is_ok()
    }

    /// Number of free slots remaining
    pub fn slots(&self) -> usize {
        self.producer.slots()
    }
}

impl<T> QueueReceiver<T> {
    /// Remove and visit every currently-queued message in FIFO order
    ///
    /// Messages are moved into the visitor. Returns once the queue is
    /// observed empty; messages pushed concurrently during the drain
    /// may or may not be included.
    pub fn drain<F: FnMut(T)>(&mut self, mut visitor: F) {
        while let Ok(msg) = self.consumer.pop() {
            visitor(msg);
        }
    }

    /// Whether the queue is currently empty
    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}
