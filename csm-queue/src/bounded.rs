use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use csm_statsd::metric;
use parking_lot::Mutex;

use crate::statsd::QueueCounters;
use crate::{OverflowPolicy, QueueConfig, SendingQueue};

/// Upper bound for the buffer allocated up front, independent of the configured capacity.
const MAX_PREALLOCATION: usize = 1024;

/// A thread-safe FIFO buffer with a capacity ceiling.
///
/// All mutation happens in short critical sections under a single lock, which preserves the
/// capacity invariant and FIFO order under any interleaving of offers and polls, including
/// multiple concurrent drainers. Neither operation waits on anything but the lock itself.
pub struct BoundedSendingQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    overflow: OverflowPolicy,
    dropped: AtomicU64,
}

impl<T> BoundedSendingQueue<T> {
    /// Creates an empty queue that rejects items once `capacity` items are buffered.
    pub fn new(capacity: usize) -> Self {
        Self::with_policy(capacity, OverflowPolicy::Reject)
    }

    /// Creates an empty queue with an explicit overflow policy.
    pub fn with_policy(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.min(MAX_PREALLOCATION))),
            capacity,
            overflow,
            dropped: AtomicU64::new(0),
        }
    }

    /// Creates an empty queue from configuration.
    pub fn from_config(config: &QueueConfig) -> Self {
        Self::with_policy(config.capacity, config.overflow)
    }

    /// Returns the maximum number of buffered items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the configured overflow policy.
    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow
    }

    /// Returns the number of items lost to overflow since creation.
    ///
    /// This includes rejected offers and, with [`OverflowPolicy::DropOldest`], evicted items.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns `true` if no items are buffered.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// See [`SendingQueue::offer`].
    pub fn offer(&self, item: T) -> bool {
        let mut items = self.items.lock();

        if items.len() < self.capacity {
            items.push_back(item);
            return true;
        }

        let (accepted, evicted) = match self.overflow {
            OverflowPolicy::DropOldest if self.capacity > 0 => {
                let evicted = items.pop_front();
                items.push_back(item);
                (true, evicted)
            }
            _ => (false, None),
        };

        // Release the lock before dropping the lost item and reporting.
        drop(items);
        drop(evicted);
        self.record_drop();

        accepted
    }

    /// See [`SendingQueue::poll`].
    pub fn poll(&self, max: usize) -> Vec<T> {
        if max == 0 {
            return Vec::new();
        }

        let mut items = self.items.lock();
        let count = max.min(items.len());
        items.drain(..count).collect()
    }

    /// See [`SendingQueue::total_size`].
    pub fn total_size(&self) -> usize {
        self.items.lock().len()
    }

    fn record_drop(&self) {
        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        csm_log::trace!(
            capacity = self.capacity,
            policy = %self.overflow,
            dropped,
            "sending queue full, dropping item"
        );
        metric!(
            counter(QueueCounters::Dropped) += 1,
            policy = self.overflow.as_str()
        );
    }
}

impl<T> fmt::Debug for BoundedSendingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedSendingQueue")
            .field("size", &self.total_size())
            .field("capacity", &self.capacity)
            .field("overflow", &self.overflow)
            .field("dropped", &self.dropped_count())
            .finish()
    }
}

impl<T: Send> SendingQueue<T> for BoundedSendingQueue<T> {
    fn offer(&self, item: T) -> bool {
        BoundedSendingQueue::offer(self, item)
    }

    fn poll(&self, max: usize) -> Vec<T> {
        BoundedSendingQueue::poll(self, max)
    }

    fn total_size(&self) -> usize {
        BoundedSendingQueue::total_size(self)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;
    use std::thread;

    use super::*;

    #[test]
    fn test_overflow_rejection() {
        let queue = BoundedSendingQueue::new(2);

        let results = [queue.offer(1), queue.offer(2), queue.offer(3)];

        assert_eq!(results, [true, true, false]);
        assert_eq!(queue.total_size(), 2);
        assert_eq!(queue.dropped_count(), 1);
        assert_eq!(queue.poll(3), [1, 2]);
    }

    #[test]
    fn test_fifo_order() {
        let queue = BoundedSendingQueue::new(10);
        queue.offer("a");
        queue.offer("b");

        assert_eq!(queue.poll(2), ["a", "b"]);
    }

    #[test]
    fn test_poll_exhaustion() {
        let queue = BoundedSendingQueue::new(10);
        queue.offer("a");
        queue.offer("b");

        assert_eq!(queue.poll(5), ["a", "b"]);
        assert_eq!(queue.total_size(), 0);
        assert!(queue.poll(5).is_empty());
    }

    #[test]
    fn test_poll_partial_keeps_rest_in_order() {
        let queue = BoundedSendingQueue::new(10);
        for i in 0..5 {
            queue.offer(i);
        }

        assert_eq!(queue.poll(2), [0, 1]);
        assert_eq!(queue.poll(2), [2, 3]);
        assert_eq!(queue.total_size(), 1);
    }

    #[test]
    fn test_poll_zero_is_noop() {
        let queue = BoundedSendingQueue::new(3);
        queue.offer(1);
        queue.offer(2);

        assert!(queue.poll(0).is_empty());
        assert_eq!(queue.total_size(), 2);
        assert_eq!(queue.poll(2), [1, 2]);

        assert!(queue.poll(0).is_empty());
        assert_eq!(queue.total_size(), 0);
    }

    #[test]
    fn test_freed_capacity_accepts_again() {
        let queue = BoundedSendingQueue::new(1);
        assert!(queue.offer(1));
        assert!(!queue.offer(2));

        assert_eq!(queue.poll(1), [1]);
        assert!(queue.offer(3));
        assert_eq!(queue.poll(1), [3]);
    }

    #[test]
    fn test_drop_oldest_evicts_head() {
        let queue = BoundedSendingQueue::with_policy(2, OverflowPolicy::DropOldest);

        let results = [queue.offer(1), queue.offer(2), queue.offer(3)];

        assert_eq!(results, [true, true, true]);
        assert_eq!(queue.total_size(), 2);
        assert_eq!(queue.dropped_count(), 1);
        assert_eq!(queue.poll(5), [2, 3]);
    }

    #[test]
    fn test_zero_capacity_holds_nothing() {
        for policy in [OverflowPolicy::Reject, OverflowPolicy::DropOldest] {
            let queue = BoundedSendingQueue::with_policy(0, policy);
            assert!(!queue.offer(1), "{policy}");
            assert_eq!(queue.total_size(), 0);
            assert_eq!(queue.dropped_count(), 1);
        }
    }

    #[test]
    fn test_from_config() {
        let queue = BoundedSendingQueue::<u8>::from_config(&QueueConfig {
            capacity: 7,
            overflow: OverflowPolicy::DropOldest,
        });

        assert_eq!(queue.capacity(), 7);
        assert_eq!(queue.overflow_policy(), OverflowPolicy::DropOldest);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drop_emits_metric() {
        let queue = BoundedSendingQueue::new(1);
        let captures = csm_statsd::with_capturing_test_client(|| {
            queue.offer(1);
            queue.offer(2);
            queue.offer(3);
        });

        assert_eq!(
            captures,
            ["queue.dropped:1|c|#policy:reject", "queue.dropped:1|c|#policy:reject"]
        );
    }

    #[test]
    fn test_trait_object_delegates() {
        let queue: std::sync::Arc<dyn SendingQueue<u32>> =
            std::sync::Arc::new(BoundedSendingQueue::new(1));

        assert!(queue.offer(1));
        assert!(!queue.offer(2));
        assert_eq!(queue.total_size(), 1);
        assert_eq!(queue.poll(1), [1]);
    }

    #[test]
    fn test_concurrent_offers_respect_capacity() {
        csm_log::init_test!();

        const PRODUCERS: usize = 8;
        const PER_PRODUCER: usize = 2_000;
        const CAPACITY: usize = 64;

        let queue = BoundedSendingQueue::new(CAPACITY);
        let done = AtomicBool::new(false);
        let accepted = AtomicU64::new(0);

        let drained = thread::scope(|s| {
            let monitor = s.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    assert!(queue.total_size() <= CAPACITY);
                    thread::yield_now();
                }
            });

            let drainer = s.spawn(|| {
                let mut drained = Vec::new();
                while !done.load(Ordering::Acquire) {
                    drained.extend(queue.poll(16));
                    thread::yield_now();
                }
                drained
            });

            let producers: Vec<_> = (0..PRODUCERS)
                .map(|producer| {
                    let queue = &queue;
                    let accepted = &accepted;
                    s.spawn(move || {
                        for seq in 0..PER_PRODUCER {
                            if queue.offer((producer, seq)) {
                                accepted.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    })
                })
                .collect();

            for producer in producers {
                producer.join().unwrap();
            }

            done.store(true, Ordering::Release);
            monitor.join().unwrap();

            let mut drained = drainer.join().unwrap();
            drained.extend(queue.poll(CAPACITY));
            drained
        });

        let accepted = accepted.load(Ordering::Relaxed);
        assert_eq!(drained.len() as u64, accepted);
        assert_eq!(
            accepted + queue.dropped_count(),
            (PRODUCERS * PER_PRODUCER) as u64
        );

        // No item is delivered twice.
        let unique: HashSet<_> = drained.iter().copied().collect();
        assert_eq!(unique.len(), drained.len());

        // Items of every producer come out in the order they were offered.
        for producer in 0..PRODUCERS {
            let sequence: Vec<_> = drained
                .iter()
                .filter(|(p, _)| *p == producer)
                .map(|(_, seq)| *seq)
                .collect();
            assert!(sequence.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_concurrent_drainers_never_share_items() {
        const ITEMS: usize = 10_000;

        let queue = BoundedSendingQueue::new(ITEMS);
        for i in 0..ITEMS {
            assert!(queue.offer(i));
        }

        let batches: Vec<Vec<usize>> = thread::scope(|s| {
            let drainers: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        let mut drained = Vec::new();
                        loop {
                            let batch = queue.poll(7);
                            if batch.is_empty() {
                                break drained;
                            }
                            // Every batch is a contiguous run of the original sequence.
                            assert!(batch.windows(2).all(|w| w[1] == w[0] + 1));
                            drained.extend(batch);
                        }
                    })
                })
                .collect();

            drainers.into_iter().map(|d| d.join().unwrap()).collect()
        });

        let mut all: Vec<_> = batches.into_iter().flatten().collect();
        all.sort_unstable();
        assert_eq!(all, (0..ITEMS).collect::<Vec<_>>());
        assert_eq!(queue.total_size(), 0);
    }
}
