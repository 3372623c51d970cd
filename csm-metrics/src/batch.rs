use serde::{Deserialize, Serialize};

use crate::{Metric, Timestamp};

/// Profile identifier reported when no other profile is configured.
pub const DEFAULT_PROFILE_ID: u32 = 235;

/// Static SDK properties attached to every batch.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SdkConfig {
    /// The integration profile of the SDK.
    ///
    /// Defaults to `235`.
    pub profile_id: u32,

    /// The version string of the SDK reported to the collector.
    ///
    /// Defaults to the version of this crate.
    pub wrapper_version: String,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            profile_id: DEFAULT_PROFILE_ID,
            wrapper_version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}

/// Request body for one transmission of metrics.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct MetricBatch {
    /// One entry per metric, in the order the metrics were polled.
    pub feedbacks: Vec<Feedback>,
    /// See [`SdkConfig::wrapper_version`].
    pub wrapper_version: String,
    /// See [`SdkConfig::profile_id`].
    pub profile_id: u32,
}

impl MetricBatch {
    /// Builds the request body for the given metrics.
    pub fn new(metrics: &[Metric], sdk: &SdkConfig) -> Self {
        Self {
            feedbacks: metrics.iter().map(Feedback::from_metric).collect(),
            wrapper_version: sdk.wrapper_version.clone(),
            profile_id: sdk.profile_id,
        }
    }

    /// Returns the number of feedbacks in this batch.
    pub fn len(&self) -> usize {
        self.feedbacks.len()
    }

    /// Returns `true` if the batch carries no feedback.
    pub fn is_empty(&self) -> bool {
        self.feedbacks.is_empty()
    }

    /// Serializes the batch into its JSON wire format.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// The wire representation of a single [`Metric`].
///
/// Elapsed values are milliseconds relative to the start of the bid request. They are omitted when
/// either end of the interval is unknown.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    /// The ad slots covered by this feedback.
    pub slots: Vec<SlotFeedback>,
    /// Time until the impression was shown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<u64>,
    /// Whether the bid request timed out.
    pub is_timeout: bool,
    /// Always `0` since all values are relative to the request start.
    pub cdb_call_start_elapsed: u64,
    /// Time until the bid response was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdb_call_end_elapsed: Option<u64>,
    /// Time until the impression was clicked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_elapsed: Option<u64>,
    /// See [`Metric::request_group_id`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_group_id: Option<String>,
    /// See [`Metric::error_code`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u32>,
}

impl Feedback {
    /// Converts a metric into its wire representation.
    pub fn from_metric(metric: &Metric) -> Self {
        let start = metric.cdb_call_start_timestamp();
        if start.is_none() {
            csm_log::debug!(
                impression_id = metric.impression_id(),
                "metric without bid request start, elapsed values omitted"
            );
        }

        Self {
            slots: vec![SlotFeedback {
                impression_id: metric.impression_id().to_owned(),
                cached_bid_used: metric.is_cached_bid_used(),
                zone_id: metric.zone_id(),
            }],
            elapsed: elapsed_since(start, metric.elapsed_timestamp()),
            is_timeout: metric.cdb_call_timeout_timestamp().is_some(),
            cdb_call_start_elapsed: 0,
            cdb_call_end_elapsed: elapsed_since(start, metric.cdb_call_end_timestamp()),
            click_elapsed: elapsed_since(start, metric.click_timestamp()),
            request_group_id: metric.request_group_id().map(str::to_owned),
            error_code: metric.error_code(),
        }
    }
}

/// A single ad slot within a [`Feedback`].
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotFeedback {
    /// See [`Metric::impression_id`].
    pub impression_id: String,
    /// See [`Metric::is_cached_bid_used`].
    pub cached_bid_used: bool,
    /// See [`Metric::zone_id`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<u32>,
}

/// Clock skew can produce events before the start, those saturate to zero.
fn elapsed_since(start: Option<Timestamp>, end: Option<Timestamp>) -> Option<u64> {
    Some(end?.saturating_sub(start?))
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    fn sdk() -> SdkConfig {
        SdkConfig {
            profile_id: 235,
            wrapper_version: "1.2.3".to_owned(),
        }
    }

    #[test]
    fn test_batch_wire_format() {
        let metrics = [
            Metric::builder("imp-1")
                .request_group_id("group")
                .cdb_call_start_timestamp(1_000)
                .cdb_call_end_timestamp(1_042)
                .elapsed_timestamp(1_300)
                .cached_bid_used()
                .zone_id(7)
                .ready_to_send()
                .build(),
            Metric::builder("imp-2")
                .cdb_call_start_timestamp(2_000)
                .cdb_call_timeout_timestamp(2_100)
                .build(),
        ];

        insta::assert_json_snapshot!(MetricBatch::new(&metrics, &sdk()), @r###"
        {
          "feedbacks": [
            {
              "slots": [
                {
                  "impressionId": "imp-1",
                  "cachedBidUsed": true,
                  "zoneId": 7
                }
              ],
              "elapsed": 300,
              "isTimeout": false,
              "cdbCallStartElapsed": 0,
              "cdbCallEndElapsed": 42,
              "requestGroupId": "group"
            },
            {
              "slots": [
                {
                  "impressionId": "imp-2",
                  "cachedBidUsed": false
                }
              ],
              "isTimeout": true,
              "cdbCallStartElapsed": 0
            }
          ],
          "wrapper_version": "1.2.3",
          "profile_id": 235
        }
        "###);
    }

    #[test]
    fn test_elapsed_without_start_is_omitted() {
        let metric = Metric::builder("imp")
            .cdb_call_end_timestamp(10)
            .click_timestamp(20)
            .build();

        let feedback = Feedback::from_metric(&metric);
        assert_eq!(feedback.cdb_call_end_elapsed, None);
        assert_eq!(feedback.click_elapsed, None);
    }

    #[test]
    fn test_elapsed_saturates() {
        let metric = Metric::builder("imp")
            .cdb_call_start_timestamp(100)
            .cdb_call_end_timestamp(90)
            .build();

        assert_eq!(Feedback::from_metric(&metric).cdb_call_end_elapsed, Some(0));
    }

    #[test]
    fn test_batch_preserves_order() {
        let metrics: Vec<_> = (0..3)
            .map(|i| Metric::builder(format!("imp-{i}")).build())
            .collect();
        let batch = MetricBatch::new(&metrics, &SdkConfig::default());

        let ids: Vec<_> = batch
            .feedbacks
            .iter()
            .map(|f| f.slots[0].impression_id.as_str())
            .collect();
        assert_eq!(ids, ["imp-0", "imp-1", "imp-2"]);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.profile_id, DEFAULT_PROFILE_ID);
    }

    #[test]
    fn test_to_json_roundtrips() {
        let batch = MetricBatch::new(&[Metric::builder("imp").build()], &sdk());
        let parsed: MetricBatch = serde_json::from_str(&batch.to_json().unwrap()).unwrap();
        assert_eq!(parsed, batch);
    }
}
