use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Parameters of the dispatch loop.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// The maximum number of metrics polled and sent per tick.
    ///
    /// Defaults to `10`. Should not exceed the queue capacity.
    pub batch_size: usize,

    /// Time between two ticks in milliseconds.
    ///
    /// Defaults to `60000`, one minute. Must be positive.
    pub interval: u64,

    /// Maximum time in seconds for the final drain on shutdown.
    ///
    /// Defaults to `10` seconds.
    pub shutdown_timeout: u64,

    /// Re-offers the metrics of a failed batch to the queue.
    ///
    /// Re-offered metrics are subject to the capacity of the queue like any other offer. Defaults
    /// to `true`.
    pub retry_failed: bool,
}

impl DispatchConfig {
    /// Returns the time between two ticks.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval)
    }

    /// Returns the maximum duration of the final drain.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            interval: 60_000,
            shutdown_timeout: 10,
            retry_failed: true,
        }
    }
}
