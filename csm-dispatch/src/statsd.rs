use csm_statsd::{CounterMetric, GaugeMetric, TimerMetric};

/// Gauge metrics emitted by the dispatcher.
pub enum DispatchGauges {
    /// Number of metrics left in the queue after a poll.
    QueueSize,
}

impl GaugeMetric for DispatchGauges {
    fn name(&self) -> &'static str {
        match self {
            Self::QueueSize => "queue.size",
        }
    }
}

/// Counter metrics emitted by the dispatcher.
pub enum DispatchCounters {
    /// Number of ticks skipped because metric collection is disallowed.
    ConsentBlocked,
    /// Number of batches accepted by the transport.
    BatchSent,
    /// Number of batches the transport failed to deliver.
    BatchFailed,
    /// Number of metrics of failed batches that were not put back into the queue.
    ///
    /// This metric is tagged with:
    /// - `retry`: `"true"` if a re-offer was rejected by a full queue, `"false"` if re-offering
    ///   is disabled and the whole batch was discarded.
    RequeueDropped,
}

impl CounterMetric for DispatchCounters {
    fn name(&self) -> &'static str {
        match self {
            Self::ConsentBlocked => "dispatch.consent_blocked",
            Self::BatchSent => "dispatch.batch.sent",
            Self::BatchFailed => "dispatch.batch.failed",
            Self::RequeueDropped => "dispatch.requeue_dropped",
        }
    }
}

/// Timer metrics emitted by the dispatcher.
pub enum DispatchTimers {
    /// Time spent in the transport for a single batch.
    ///
    /// This metric is tagged with:
    /// - `result`: `"success"`, `"failure"`, or `"timeout"` if the transmission was abandoned on
    ///   shutdown.
    SendDuration,
}

impl TimerMetric for DispatchTimers {
    fn name(&self) -> &'static str {
        match self {
            Self::SendDuration => "dispatch.send_duration",
        }
    }
}
