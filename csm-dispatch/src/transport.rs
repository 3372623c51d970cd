use std::future::Future;

use csm_metrics::MetricBatch;

/// An error returned by a [`Transport`] when a batch could not be delivered.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The batch could not be encoded.
    #[error("failed to serialize metric batch")]
    Serialize(#[from] serde_json::Error),

    /// The collector answered with an unsuccessful status code.
    #[error("collector responded with status {0}")]
    Status(u16),

    /// The collector could not be reached.
    #[error("collector unreachable: {0}")]
    Unreachable(String),

    /// The transmission was abandoned because the dispatcher is shutting down.
    #[error("transmission timed out during shutdown")]
    TimedOut,
}

/// Delivers metric batches to the collection backend.
pub trait Transport: Send + Sync {
    /// Sends one batch.
    ///
    /// An error means the batch was not accepted by the collector. The dispatcher may then offer
    /// its metrics to the queue again.
    fn send(&self, batch: &MetricBatch) -> impl Future<Output = Result<(), TransportError>> + Send;
}

impl<T> Transport for std::sync::Arc<T>
where
    T: Transport + ?Sized,
{
    fn send(&self, batch: &MetricBatch) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).send(batch)
    }
}
