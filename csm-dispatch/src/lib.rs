//! Periodic batch dispatch of client-side metrics.
//!
//! The [`MetricDispatcher`] is the single drainer of a
//! [`MetricSendingQueue`](csm_metrics::MetricSendingQueue). On every tick it asks the
//! [`CsmGuard`](csm_privacy::CsmGuard) whether collection is allowed, polls up to one batch and
//! hands it to a [`Transport`]. Failed batches are offered to the queue again on a best-effort
//! basis.

#![warn(missing_docs)]

mod config;
mod dispatcher;
mod statsd;
mod transport;

pub use self::config::*;
pub use self::dispatcher::*;
pub use self::transport::*;
