use std::fmt;

use serde::{Deserialize, Serialize};

/// What happens to an offered item when the queue is at capacity.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Rejects the new item and keeps the buffered ones.
    ///
    /// [`offer`](crate::SendingQueue::offer) returns `false`.
    #[default]
    Reject,

    /// Evicts the oldest buffered item to make room for the new one.
    ///
    /// [`offer`](crate::SendingQueue::offer) returns `true` unless the capacity is zero.
    DropOldest,
}

impl OverflowPolicy {
    /// Returns the name used in configuration files and metric tags.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::DropOldest => "drop_oldest",
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of the sending queue.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// The maximum number of items buffered at any time.
    ///
    /// Defaults to `250`. Must be positive.
    pub capacity: usize,

    /// The behavior when an item is offered to a full queue.
    ///
    /// Defaults to [`OverflowPolicy::Reject`].
    pub overflow: OverflowPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 250,
            overflow: OverflowPolicy::default(),
        }
    }
}
