//! Bounded concurrent sending queues.
//!
//! A sending queue decouples many producers, which run on latency-sensitive paths and must never
//! stall, from a single periodic drainer that removes batches for transmission. The main
//! implementation is [`BoundedSendingQueue`], a FIFO buffer with a fixed capacity:
//!
//! - [`offer`](SendingQueue::offer) never blocks. When the queue is full, the configured
//!   [`OverflowPolicy`] decides whether the new item is rejected or the oldest item is evicted.
//! - [`poll`](SendingQueue::poll) removes up to `max` items from the head, oldest first.
//! - [`total_size`](SendingQueue::total_size) never reports a value outside `0..=capacity`.
//!
//! ```
//! use csm_queue::{BoundedSendingQueue, SendingQueue};
//!
//! let queue = BoundedSendingQueue::new(2);
//! assert!(queue.offer("a"));
//! assert!(queue.offer("b"));
//! assert!(!queue.offer("c"));
//!
//! assert_eq!(queue.poll(5), ["a", "b"]);
//! assert_eq!(queue.total_size(), 0);
//! ```

#![warn(missing_docs)]

use std::sync::Arc;

mod bounded;
mod config;
mod statsd;

pub use self::bounded::*;
pub use self::config::*;

/// A thread-safe FIFO buffer between producers and a batch consumer.
///
/// Every method is independently atomic. No operation spans multiple calls.
pub trait SendingQueue<T>: Send + Sync {
    /// Attempts to append `item` at the tail without blocking.
    ///
    /// Returns `false` if the item was not accepted. The item is then discarded. Once offered, the
    /// caller must treat the item as potentially gone.
    fn offer(&self, item: T) -> bool;

    /// Removes and returns up to `max` items from the head, oldest first.
    ///
    /// Returns an empty vector if the queue is empty or `max` is `0`.
    fn poll(&self, max: usize) -> Vec<T>;

    /// Returns the current number of buffered items.
    ///
    /// The value may be stale under concurrent offers, but it is always within the capacity.
    fn total_size(&self) -> usize;
}

impl<T, Q> SendingQueue<T> for Arc<Q>
where
    Q: SendingQueue<T> + ?Sized,
{
    fn offer(&self, item: T) -> bool {
        (**self).offer(item)
    }

    fn poll(&self, max: usize) -> Vec<T> {
        (**self).poll(max)
    }

    fn total_size(&self) -> usize {
        (**self).total_size()
    }
}
