use std::future::Future;
use std::time::{Duration, Instant};

use csm_metrics::{MetricBatch, MetricSendingQueue, SdkConfig};
use csm_privacy::CsmGuard;
use csm_statsd::metric;
use tokio::time::MissedTickBehavior;

use crate::statsd::{DispatchCounters, DispatchGauges, DispatchTimers};
use crate::{DispatchConfig, Transport, TransportError};

/// Lower bound for the tick interval, `tokio` rejects a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// The result of a single [`MetricDispatcher::send_metric_batch`] tick.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DispatchOutcome {
    /// Metric collection is disallowed. The queue was not touched.
    ConsentBlocked,
    /// The queue had nothing to send.
    Empty,
    /// A batch with the given number of metrics was delivered.
    Sent(usize),
    /// The transport failed.
    Failed {
        /// Number of metrics in the failed batch.
        polled: usize,
        /// Number of metrics accepted back into the queue.
        requeued: usize,
    },
}

/// Drains a [`MetricSendingQueue`] in batches and hands them to a [`Transport`].
///
/// Every tick first consults the [`CsmGuard`]. While collection is disallowed, metrics stay in the
/// queue and accumulate up to its capacity.
pub struct MetricDispatcher<Q, G, T> {
    queue: Q,
    guard: G,
    transport: T,
    config: DispatchConfig,
    sdk: SdkConfig,
}

impl<Q, G, T> MetricDispatcher<Q, G, T>
where
    Q: MetricSendingQueue,
    G: CsmGuard,
    T: Transport,
{
    /// Creates a new dispatcher.
    pub fn new(queue: Q, guard: G, transport: T, config: DispatchConfig, sdk: SdkConfig) -> Self {
        Self {
            queue,
            guard,
            transport,
            config,
            sdk,
        }
    }

    /// Returns the drained queue.
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Performs a single dispatch tick.
    ///
    /// Polls up to [`batch_size`](DispatchConfig::batch_size) metrics and sends them as one batch.
    /// If the transport fails and [`retry_failed`](DispatchConfig::retry_failed) is set, the
    /// metrics are offered to the queue again. Re-offers rejected by a full queue are lost.
    pub async fn send_metric_batch(&self) -> DispatchOutcome {
        self.tick(std::future::pending()).await
    }

    /// Performs a dispatch tick whose transmission is abandoned once `deadline` resolves.
    ///
    /// An abandoned transmission is handled like a failed one, so the polled metrics are either
    /// offered to the queue again or counted as dropped.
    async fn tick<D>(&self, deadline: D) -> DispatchOutcome
    where
        D: Future<Output = ()>,
    {
        if self.guard.is_csm_disallowed() {
            csm_log::debug!("metric collection disallowed, skipping dispatch");
            metric!(counter(DispatchCounters::ConsentBlocked) += 1);
            return DispatchOutcome::ConsentBlocked;
        }

        let metrics = self.queue.poll(self.config.batch_size);
        metric!(gauge(DispatchGauges::QueueSize) = self.queue.total_size() as u64);

        if metrics.is_empty() {
            return DispatchOutcome::Empty;
        }

        let batch = MetricBatch::new(&metrics, &self.sdk);

        let start = Instant::now();
        let result = tokio::select! {
            biased;

            result = self.transport.send(&batch) => result,
            _ = deadline => Err(TransportError::TimedOut),
        };
        metric!(
            timer(DispatchTimers::SendDuration) = start.elapsed(),
            result = match result {
                Ok(()) => "success",
                Err(TransportError::TimedOut) => "timeout",
                Err(_) => "failure",
            }
        );

        let error = match result {
            Ok(()) => {
                csm_log::debug!(count = batch.len(), "sent metric batch");
                metric!(counter(DispatchCounters::BatchSent) += 1);
                return DispatchOutcome::Sent(batch.len());
            }
            Err(error) => error,
        };

        metric!(counter(DispatchCounters::BatchFailed) += 1);

        let polled = metrics.len();
        let requeued = if self.config.retry_failed {
            metrics
                .into_iter()
                .map(|metric| self.queue.offer(metric))
                .filter(|accepted| *accepted)
                .count()
        } else {
            0
        };

        let lost = polled - requeued;
        if lost > 0 {
            metric!(
                counter(DispatchCounters::RequeueDropped) += lost as i64,
                retry = if self.config.retry_failed { "true" } else { "false" }
            );
        }

        csm_log::warn!(
            error = &error as &dyn std::error::Error,
            polled,
            requeued,
            "failed to send metric batch"
        );

        DispatchOutcome::Failed { polled, requeued }
    }

    /// Runs the dispatch loop until `shutdown` resolves.
    ///
    /// The first tick happens one [`interval`](DispatchConfig::interval) after the start. If
    /// `shutdown` resolves while a batch is in flight, its transmission gets the
    /// [`shutdown_timeout`](DispatchConfig::shutdown_timeout) to complete. Afterwards a final tick
    /// flushes pending metrics, again bounded by the shutdown timeout. Batches abandoned on a
    /// timeout are treated as failed.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let period = self.config.interval().max(MIN_INTERVAL);
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let timeout = self.config.shutdown_timeout();
        tokio::pin!(shutdown);

        csm_log::info!(
            interval = ?period,
            batch_size = self.config.batch_size,
            "metric dispatcher started"
        );

        loop {
            let stop = tokio::select! {
                biased;

                _ = &mut shutdown => true,
                _ = ticker.tick() => false,
            };
            if stop {
                break;
            }

            // `shutdown` must not be polled again once it has resolved.
            let mut stopped = false;
            let deadline = async {
                (&mut shutdown).await;
                stopped = true;
                tokio::time::sleep(timeout).await;
            };
            self.tick(deadline).await;
            if stopped {
                break;
            }
        }

        csm_log::info!("metric dispatcher shutting down");
        let outcome = self.tick(tokio::time::sleep(timeout)).await;
        csm_log::debug!(
            ?outcome,
            remaining = self.queue.total_size(),
            "final metric dispatch done"
        );
    }
}
