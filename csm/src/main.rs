//! Command line interface for the client-side metrics pipeline.
//!
//! The pipeline buffers ad-lifecycle metrics in a bounded sending queue, gates their collection on
//! the TCF v2 vendor consent and dispatches them in periodic batches. The binary exposes:
//!
//!  - `csm config init|show`: Create or print the configuration in the config folder.
//!  - `csm consent <value>`: Evaluate a vendor consent string against the configured vendor.
//!  - `csm simulate`: Run concurrent producers against the queue while the dispatcher drains it.
//!
//! # Workspace Crates
//!
//!  - `csm`: Main entry point and command line interface.
//!  - [`csm-config`]: Static configuration for the CLI.
//!  - [`csm-dispatch`]: The periodic batch dispatcher and its transport interface.
//!  - [`csm-log`]: Logging.
//!  - [`csm-metrics`]: Metric records, batches and the metric sending queue.
//!  - [`csm-privacy`]: Consent gating.
//!  - [`csm-queue`]: Bounded concurrent sending queues.
//!  - [`csm-statsd`]: StatsD client for internal measurements.
//!
//! [`csm-config`]: ../csm_config/index.html
//! [`csm-dispatch`]: ../csm_dispatch/index.html
//! [`csm-log`]: ../csm_log/index.html
//! [`csm-metrics`]: ../csm_metrics/index.html
//! [`csm-privacy`]: ../csm_privacy/index.html
//! [`csm-queue`]: ../csm_queue/index.html
//! [`csm-statsd`]: ../csm_statsd/index.html

mod cli;
mod setup;
mod simulate;

use std::process;

pub fn main() {
    let exit_code = match cli::execute() {
        Ok(()) => 0,
        Err(err) => {
            csm_log::ensure_error(&err);
            1
        }
    };

    process::exit(exit_code);
}
