use csm_statsd::CounterMetric;

/// Counter metrics emitted by sending queues.
pub enum QueueCounters {
    /// Number of items lost because the queue was full.
    ///
    /// This counts both rejected offers and evicted items.
    ///
    /// This metric is tagged with:
    /// - `policy`: the configured overflow policy.
    Dropped,
}

impl CounterMetric for QueueCounters {
    fn name(&self) -> &'static str {
        match self {
            Self::Dropped => "queue.dropped",
        }
    }
}
