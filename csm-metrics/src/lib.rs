//! Client-side metric records and their sending queue.
//!
//! A [`Metric`] captures the lifecycle of one ad impression: when the bid request started and
//! ended, whether it timed out, and when the impression was shown or clicked. Records are
//! immutable and are buffered in a [`MetricSendingQueue`] until the dispatcher polls them in
//! batches and turns them into a [`MetricBatch`] request body.

#![warn(missing_docs)]

mod batch;
mod metric;
mod queue;

pub use self::batch::*;
pub use self::metric::*;
pub use self::queue::*;
