use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Returns the current wall clock time as [`Timestamp`].
pub fn current_timestamp() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or_default()
}

/// One ad-lifecycle record: a bid request and what happened to the resulting impression.
///
/// The record is immutable. Lifecycle events produce a new value under the same identifier, see
/// [`Metric::update`]. Fields are filled in monotonically: the builder only offers setters taking
/// plain values and flags can only be raised, so a field that was set never becomes unset again.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    impression_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cdb_call_start_timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cdb_call_end_timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cdb_call_timeout_timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    elapsed_timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    click_timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_code: Option<u32>,
    #[serde(default)]
    cached_bid_used: bool,
    #[serde(default)]
    ready_to_send: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    profile_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    zone_id: Option<u32>,
}

impl Metric {
    /// Starts a new record for the given impression identifier.
    pub fn builder(impression_id: impl Into<String>) -> MetricBuilder {
        MetricBuilder {
            inner: Self {
                impression_id: impression_id.into(),
                request_group_id: None,
                cdb_call_start_timestamp: None,
                cdb_call_end_timestamp: None,
                cdb_call_timeout_timestamp: None,
                elapsed_timestamp: None,
                click_timestamp: None,
                error_code: None,
                cached_bid_used: false,
                ready_to_send: false,
                profile_id: None,
                zone_id: None,
            },
        }
    }

    /// Returns a builder seeded with all values of this record.
    pub fn to_builder(&self) -> MetricBuilder {
        MetricBuilder {
            inner: self.clone(),
        }
    }

    /// Applies a lifecycle event and returns the new value of this record.
    ///
    /// ```
    /// use csm_metrics::Metric;
    ///
    /// let sent = Metric::builder("imp-1").cdb_call_start_timestamp(42).build();
    /// let received = sent.update(|b| b.cdb_call_end_timestamp(1337));
    ///
    /// assert_eq!(received.impression_id(), "imp-1");
    /// assert_eq!(received.cdb_call_start_timestamp(), Some(42));
    /// assert_eq!(received.cdb_call_end_timestamp(), Some(1337));
    /// ```
    pub fn update<F>(&self, f: F) -> Self
    where
        F: FnOnce(MetricBuilder) -> MetricBuilder,
    {
        f(self.to_builder()).build()
    }

    /// The stable identifier of this record, typically the impression id.
    pub fn impression_id(&self) -> &str {
        &self.impression_id
    }

    /// Identifier shared by all slots requested together.
    pub fn request_group_id(&self) -> Option<&str> {
        self.request_group_id.as_deref()
    }

    /// When the bid request was sent.
    pub fn cdb_call_start_timestamp(&self) -> Option<Timestamp> {
        self.cdb_call_start_timestamp
    }

    /// When the bid response was received.
    pub fn cdb_call_end_timestamp(&self) -> Option<Timestamp> {
        self.cdb_call_end_timestamp
    }

    /// When the bid request was considered timed out.
    pub fn cdb_call_timeout_timestamp(&self) -> Option<Timestamp> {
        self.cdb_call_timeout_timestamp
    }

    /// When the impression was shown.
    pub fn elapsed_timestamp(&self) -> Option<Timestamp> {
        self.elapsed_timestamp
    }

    /// When the impression was clicked.
    pub fn click_timestamp(&self) -> Option<Timestamp> {
        self.click_timestamp
    }

    /// The error code observed during the lifecycle, if any.
    pub fn error_code(&self) -> Option<u32> {
        self.error_code
    }

    /// Whether the bid was served from the cache instead of a live request.
    pub fn is_cached_bid_used(&self) -> bool {
        self.cached_bid_used
    }

    /// Whether the lifecycle was explicitly marked as complete.
    pub fn is_ready_to_send(&self) -> bool {
        self.ready_to_send
    }

    /// The SDK profile that issued the request.
    pub fn profile_id(&self) -> Option<u32> {
        self.profile_id
    }

    /// The zone the bid was returned for.
    pub fn zone_id(&self) -> Option<u32> {
        self.zone_id
    }

    /// Returns `true` if no further lifecycle events are expected for this record.
    ///
    /// A record is terminal once it was marked ready to send, or once its bid request timed out.
    pub fn is_terminal(&self) -> bool {
        self.ready_to_send || self.cdb_call_timeout_timestamp.is_some()
    }
}

/// Builder for [`Metric`], obtained from [`Metric::builder`] or [`Metric::to_builder`].
#[derive(Clone, Debug)]
#[must_use]
pub struct MetricBuilder {
    inner: Metric,
}

impl MetricBuilder {
    /// Sets the identifier shared by all slots requested together.
    pub fn request_group_id(mut self, id: impl Into<String>) -> Self {
        self.inner.request_group_id = Some(id.into());
        self
    }

    /// Sets when the bid request was sent.
    pub fn cdb_call_start_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.inner.cdb_call_start_timestamp = Some(timestamp);
        self
    }

    /// Sets when the bid response was received.
    pub fn cdb_call_end_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.inner.cdb_call_end_timestamp = Some(timestamp);
        self
    }

    /// Sets when the bid request timed out.
    pub fn cdb_call_timeout_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.inner.cdb_call_timeout_timestamp = Some(timestamp);
        self
    }

    /// Sets when the impression was shown.
    pub fn elapsed_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.inner.elapsed_timestamp = Some(timestamp);
        self
    }

    /// Sets when the impression was clicked.
    pub fn click_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.inner.click_timestamp = Some(timestamp);
        self
    }

    /// Sets the observed error code.
    pub fn error_code(mut self, code: u32) -> Self {
        self.inner.error_code = Some(code);
        self
    }

    /// Marks the bid as served from the cache.
    pub fn cached_bid_used(mut self) -> Self {
        self.inner.cached_bid_used = true;
        self
    }

    /// Marks the lifecycle as complete.
    pub fn ready_to_send(mut self) -> Self {
        self.inner.ready_to_send = true;
        self
    }

    /// Sets the SDK profile that issued the request.
    pub fn profile_id(mut self, profile_id: u32) -> Self {
        self.inner.profile_id = Some(profile_id);
        self
    }

    /// Sets the zone the bid was returned for.
    pub fn zone_id(mut self, zone_id: u32) -> Self {
        self.inner.zone_id = Some(zone_id);
        self
    }

    /// Finishes the record.
    pub fn build(self) -> Metric {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn test_builder_without_updates() {
        let metric = Metric::builder("id").build();

        assert_eq!(metric.impression_id(), "id");
        assert_eq!(metric.cdb_call_start_timestamp(), None);
        assert!(!metric.is_cached_bid_used());
        assert!(!metric.is_terminal());
    }

    #[test]
    fn test_many_updates_accumulate() {
        let metric = Metric::builder("id")
            .build()
            .update(|b| b.cdb_call_start_timestamp(42))
            .update(|b| b.cdb_call_end_timestamp(1337))
            .update(|b| b.request_group_id("group"));

        let expected = Metric::builder("id")
            .cdb_call_start_timestamp(42)
            .cdb_call_end_timestamp(1337)
            .request_group_id("group")
            .build();

        assert_eq!(metric, expected);
    }

    #[test]
    fn test_update_leaves_original_untouched() {
        let original = Metric::builder("id").cdb_call_start_timestamp(0).build();
        let updated = original.update(|b| b.cdb_call_start_timestamp(1337).cached_bid_used());

        assert_eq!(original.cdb_call_start_timestamp(), Some(0));
        assert!(!original.is_cached_bid_used());
        assert_eq!(updated.cdb_call_start_timestamp(), Some(1337));
        assert!(updated.is_cached_bid_used());
        assert_eq!(updated.impression_id(), original.impression_id());
    }

    #[test]
    fn test_terminal_policy() {
        let metric = Metric::builder("id").cdb_call_start_timestamp(1).build();
        assert!(!metric.is_terminal());

        assert!(metric.update(|b| b.ready_to_send()).is_terminal());
        assert!(
            metric
                .update(|b| b.cdb_call_timeout_timestamp(2))
                .is_terminal()
        );
        assert!(!metric.update(|b| b.elapsed_timestamp(3)).is_terminal());
    }

    #[test]
    fn test_serialization_skips_unset_fields() {
        let metric = Metric::builder("imp")
            .cdb_call_start_timestamp(10)
            .ready_to_send()
            .build();

        insta::assert_json_snapshot!(metric, @r###"
        {
          "impressionId": "imp",
          "cdbCallStartTimestamp": 10,
          "cachedBidUsed": false,
          "readyToSend": true
        }
        "###);
    }

    #[test]
    fn test_deserialize_restores_record() {
        let json = r#"{"impressionId":"imp","cdbCallEndTimestamp":5,"zoneId":7}"#;
        let metric: Metric = serde_json::from_str(json).unwrap();

        assert_eq!(
            metric,
            Metric::builder("imp")
                .cdb_call_end_timestamp(5)
                .zone_id(7)
                .build()
        );
    }

    #[test]
    fn test_current_timestamp_is_after_2020() {
        assert!(current_timestamp() > 1_577_836_800_000);
    }
}
