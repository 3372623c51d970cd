use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use csm_config::Config;
use csm_dispatch::{DispatchOutcome, MetricDispatcher, Transport, TransportError};
use csm_metrics::{AdapterMetricSendingQueue, Metric, MetricBatch, MetricSendingQueue};
use csm_privacy::{ConsentGate, CsmGuard, MemoryConsentStore, VENDOR_CONSENTS_KEY};

/// How often the dispatcher checks whether all producers are done.
const PRODUCER_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Parameters of a simulation run.
#[derive(Clone, Debug)]
pub struct SimulateOptions {
    /// Number of concurrent producer threads.
    pub producers: usize,
    /// Number of metrics created by every producer.
    pub metrics: usize,
    /// Vendor consent string stored before the run.
    pub consent: Option<String>,
}

/// Totals of a simulation run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Report {
    /// Metrics created by all producers.
    pub created: usize,
    /// Metrics not offered because collection was disallowed.
    pub skipped: usize,
    /// Metrics accepted by the queue.
    pub accepted: usize,
    /// Metrics lost to a full queue.
    pub dropped: u64,
    /// Metrics delivered by the transport.
    pub sent: usize,
    /// Metrics left in the queue after the final drain.
    pub remaining: usize,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "created:   {}", self.created)?;
        writeln!(f, "skipped:   {}", self.skipped)?;
        writeln!(f, "accepted:  {}", self.accepted)?;
        writeln!(f, "dropped:   {}", self.dropped)?;
        writeln!(f, "sent:      {}", self.sent)?;
        write!(f, "remaining: {}", self.remaining)
    }
}

/// A transport that logs batches instead of delivering them.
#[derive(Debug, Default)]
struct LogTransport {
    sent: AtomicUsize,
}

impl Transport for LogTransport {
    async fn send(&self, batch: &MetricBatch) -> Result<(), TransportError> {
        let json = batch.to_json()?;
        csm_log::debug!(
            feedbacks = batch.len(),
            bytes = json.len(),
            "delivering metric batch"
        );
        csm_log::trace!("{json}");

        self.sent.fetch_add(batch.len(), Ordering::Relaxed);
        Ok(())
    }
}

/// Creates the metric of one simulated ad request.
fn simulated_metric(config: &Config, producer: usize, seq: usize) -> Metric {
    let start = csm_metrics::current_timestamp();
    let sent = Metric::builder(format!("{producer}-{seq}"))
        .request_group_id(format!("group-{producer}"))
        .profile_id(config.sdk().profile_id)
        .cdb_call_start_timestamp(start)
        .build();

    // Every seventh request runs into the timeout, all others receive a bid.
    if seq % 7 == 6 {
        sent.update(|b| b.cdb_call_timeout_timestamp(start + 1_000))
    } else {
        let received = sent.update(|b| b.cdb_call_end_timestamp(start + (seq % 40) as u64));
        received.update(|b| b.elapsed_timestamp(start + 100).ready_to_send())
    }
}

/// Runs producers against the configured queue while the dispatcher drains it.
pub fn run(config: &Config, options: &SimulateOptions) -> Result<Report> {
    let store = MemoryConsentStore::new();
    if let Some(ref consent) = options.consent {
        store.set(VENDOR_CONSENTS_KEY, consent.as_str());
    }

    let gate = Arc::new(ConsentGate::from_config(store, config.privacy()));
    let queue = Arc::new(AdapterMetricSendingQueue::bounded(config.queue()));
    let dispatcher = MetricDispatcher::new(
        queue.clone(),
        gate.clone(),
        LogTransport::default(),
        config.dispatch().clone(),
        config.sdk().clone(),
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("failed to create the dispatch runtime")?;

    let active = AtomicUsize::new(options.producers);
    let skipped = AtomicUsize::new(0);
    let accepted = AtomicUsize::new(0);

    csm_log::info!(
        producers = options.producers,
        metrics = options.metrics,
        "starting simulation"
    );

    thread::scope(|s| {
        for producer in 0..options.producers {
            let (gate, queue) = (&gate, &queue);
            let (active, skipped, accepted) = (&active, &skipped, &accepted);

            s.spawn(move || {
                for seq in 0..options.metrics {
                    let metric = simulated_metric(config, producer, seq);
                    if !metric.is_terminal() {
                        continue;
                    }

                    if gate.is_csm_disallowed() {
                        skipped.fetch_add(1, Ordering::Relaxed);
                    } else if queue.offer(metric) {
                        accepted.fetch_add(1, Ordering::Relaxed);
                    }
                }
                active.fetch_sub(1, Ordering::Release);
            });
        }

        runtime.block_on(async {
            let producers_done = async {
                while active.load(Ordering::Acquire) > 0 {
                    tokio::time::sleep(PRODUCER_POLL_INTERVAL).await;
                }
            };
            dispatcher.run(producers_done).await;

            while let DispatchOutcome::Sent(_) = dispatcher.send_metric_batch().await {}
        });
    });

    let report = Report {
        created: options.producers * options.metrics,
        skipped: skipped.into_inner(),
        accepted: accepted.into_inner(),
        dropped: queue.inner().dropped_count(),
        sent: dispatcher.transport().sent.load(Ordering::Relaxed),
        remaining: queue.total_size(),
    };

    csm_log::info!(sent = report.sent, dropped = report.dropped, "simulation finished");
    Ok(report)
}
