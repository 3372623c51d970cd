use std::sync::Arc;

use csm_queue::{BoundedSendingQueue, QueueConfig, SendingQueue};

use crate::Metric;

/// A sending queue specialized to [`Metric`] records.
///
/// This is the type the rest of the SDK names when it buffers metrics. It has the same contract as
/// [`SendingQueue`]. Implementations must be shareable between producer threads and the dispatcher.
pub trait MetricSendingQueue: Send + Sync {
    /// Attempts to enqueue a metric without blocking.
    fn offer(&self, metric: Metric) -> bool;

    /// Removes up to `max` metrics from the head, oldest first.
    fn poll(&self, max: usize) -> Vec<Metric>;

    /// Returns the number of buffered metrics.
    fn total_size(&self) -> usize;
}

impl<T> MetricSendingQueue for Arc<T>
where
    T: MetricSendingQueue + ?Sized,
{
    fn offer(&self, metric: Metric) -> bool {
        (**self).offer(metric)
    }

    fn poll(&self, max: usize) -> Vec<Metric> {
        (**self).poll(max)
    }

    fn total_size(&self) -> usize {
        (**self).total_size()
    }
}

/// Exposes any generic [`SendingQueue`] of metrics as a [`MetricSendingQueue`].
///
/// Every call is forwarded verbatim to the wrapped queue.
#[derive(Debug)]
pub struct AdapterMetricSendingQueue<Q = BoundedSendingQueue<Metric>> {
    delegate: Q,
}

impl<Q> AdapterMetricSendingQueue<Q> {
    /// Wraps the given queue.
    pub fn new(delegate: Q) -> Self {
        Self { delegate }
    }

    /// Returns a reference to the wrapped queue.
    pub fn inner(&self) -> &Q {
        &self.delegate
    }
}

impl AdapterMetricSendingQueue {
    /// Creates a metric queue backed by a [`BoundedSendingQueue`] built from `config`.
    pub fn bounded(config: &QueueConfig) -> Self {
        Self::new(BoundedSendingQueue::from_config(config))
    }
}

impl<Q> MetricSendingQueue for AdapterMetricSendingQueue<Q>
where
    Q: SendingQueue<Metric>,
{
    fn offer(&self, metric: Metric) -> bool {
        self.delegate.offer(metric)
    }

    fn poll(&self, max: usize) -> Vec<Metric> {
        self.delegate.poll(max)
    }

    fn total_size(&self) -> usize {
        self.delegate.total_size()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use csm_queue::OverflowPolicy;

    use super::*;

    /// Records every call and answers with fixed values.
    #[derive(Default)]
    struct RecordingQueue {
        offered: parking_lot::Mutex<Vec<Metric>>,
        polled_with: AtomicUsize,
    }

    impl SendingQueue<Metric> for RecordingQueue {
        fn offer(&self, item: Metric) -> bool {
            self.offered.lock().push(item);
            false
        }

        fn poll(&self, max: usize) -> Vec<Metric> {
            self.polled_with.store(max, Ordering::Relaxed);
            vec![Metric::builder("polled").build()]
        }

        fn total_size(&self) -> usize {
            42
        }
    }

    #[test]
    fn test_adapter_forwards_results() {
        let adapter = AdapterMetricSendingQueue::new(RecordingQueue::default());
        let metric = Metric::builder("id").build();

        assert!(!adapter.offer(metric.clone()));
        assert_eq!(*adapter.inner().offered.lock(), [metric]);

        let polled = adapter.poll(1337);
        assert_eq!(adapter.inner().polled_with.load(Ordering::Relaxed), 1337);
        assert_eq!(polled, [Metric::builder("polled").build()]);

        assert_eq!(adapter.total_size(), 42);
    }

    #[test]
    fn test_bounded_adapter() {
        let queue = AdapterMetricSendingQueue::bounded(&QueueConfig {
            capacity: 1,
            overflow: OverflowPolicy::Reject,
        });

        assert!(queue.offer(Metric::builder("a").build()));
        assert!(!queue.offer(Metric::builder("b").build()));
        assert_eq!(queue.inner().dropped_count(), 1);

        let polled = queue.poll(10);
        assert_eq!(polled.len(), 1);
        assert_eq!(polled[0].impression_id(), "a");
    }

    #[test]
    fn test_shared_across_threads() {
        let queue: Arc<dyn MetricSendingQueue> =
            Arc::new(AdapterMetricSendingQueue::bounded(&QueueConfig::default()));

        std::thread::scope(|s| {
            for t in 0..4 {
                let queue = &queue;
                s.spawn(move || {
                    for i in 0..10 {
                        queue.offer(Metric::builder(format!("{t}-{i}")).build());
                    }
                });
            }
        });

        assert_eq!(queue.total_size(), 40);
    }
}
