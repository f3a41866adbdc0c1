//! Bounded FIFO ring buffer shared between intake and workers
//!
//! Two-index circular buffer with `capacity + 1` slots: `head == tail` means
//! empty, `next(tail) == head` means full, so no separate count is kept.
//! Every index and slot mutation happens under a single mutex, which makes
//! `enqueue`/`dequeue` atomic with respect to each other. A successful
//! enqueue wakes one idle consumer.

use std::fmt;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;

use crate::PipelineError;

/// Returned by [`BoundedQueue::enqueue`] when the queue is at capacity.
///
/// Carries the rejected item back so the caller decides whether to drop it.
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Take back the item that did not fit
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Full(..)")
    }
}

impl<T> fmt::Display for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ring buffer is full")
    }
}

impl<T> std::error::Error for Full<T> {}

/// Returned by [`BoundedQueue::dequeue`] when there is nothing to take.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("ring buffer is empty")]
pub struct Empty;

struct Ring<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
}

impl<T> Ring<T> {
    #[inline]
    fn next(&self, idx: usize) -> usize {
        (idx + 1) % self.slots.len()
    }

    #[inline]
    fn len(&self) -> usize {
        (self.tail + self.slots.len() - self.head) % self.slots.len()
    }
}

/// Thread-safe fixed-capacity FIFO queue
///
/// # Example
/// ```
/// use ring_intake::core::BoundedQueue;
///
/// let queue = BoundedQueue::new(2).unwrap();
/// queue.enqueue("a").unwrap();
/// queue.enqueue("b").unwrap();
/// assert!(queue.enqueue("c").is_err());
/// assert_eq!(queue.dequeue(), Ok("a"));
/// ```
pub struct BoundedQueue<T> {
    ring: Mutex<Ring<T>>,
    capacity: usize,
    item_ready: Notify,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items
    ///
    /// # Errors
    /// Returns [`PipelineError::InvalidCapacity`] for a zero capacity.
    pub fn new(capacity: usize) -> Result<Self, PipelineError> {
        if capacity == 0 {
            return Err(PipelineError::InvalidCapacity(capacity));
        }

        let slots: Box<[Option<T>]> = (0..=capacity).map(|_| None).collect();

        Ok(Self {
            ring: Mutex::new(Ring {
                slots,
                head: 0,
                tail: 0,
            }),
            capacity,
            item_ready: Notify::new(),
        })
    }

    /// Insert at the tail without blocking
    ///
    /// # Errors
    /// Returns [`Full`] with the item when `capacity` items are already
    /// resident. The queue is left unchanged.
    pub fn enqueue(&self, item: T) -> Result<(), Full<T>> {
        {
            let mut ring = self.ring.lock();
            let next = ring.next(ring.tail);
            if next == ring.head {
                return Err(Full(item));
            }
            let tail = ring.tail;
            ring.slots[tail] = Some(item);
            ring.tail = next;
        }

        self.item_ready.notify_one();
        Ok(())
    }

    /// Remove the head item without blocking
    ///
    /// # Errors
    /// Returns [`Empty`] when no item is resident. The queue is left unchanged.
    pub fn dequeue(&self) -> Result<T, Empty> {
        let mut ring = self.ring.lock();
        if ring.head == ring.tail {
            return Err(Empty);
        }

        let head = ring.head;
        match ring.slots[head].take() {
            Some(item) => {
                ring.head = ring.next(head);
                Ok(item)
            }
            // Every slot in [head, tail) is occupied while the lock is held.
            None => Err(Empty),
        }
    }

    /// Wait until an enqueue happens
    ///
    /// Wakeups may be spurious; callers re-check with [`dequeue`](Self::dequeue).
    pub async fn item_ready(&self) {
        self.item_ready.notified().await;
    }

    /// Diagnostic only: may be stale as soon as it returns
    #[inline]
    pub fn is_empty(&self) -> bool {
        let ring = self.ring.lock();
        ring.head == ring.tail
    }

    /// Diagnostic only: may be stale as soon as it returns
    #[inline]
    pub fn is_full(&self) -> bool {
        let ring = self.ring.lock();
        ring.next(ring.tail) == ring.head
    }

    /// Number of resident items (diagnostic)
    #[inline]
    pub fn len(&self) -> usize {
        self.ring.lock().len()
    }

    /// Configured capacity C
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    fn indices(&self) -> (usize, usize) {
        let ring = self.ring.lock();
        (ring.head, ring.tail)
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
