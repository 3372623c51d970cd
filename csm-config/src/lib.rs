//! Configuration for the client-side metrics pipeline.
//!
//! The configuration is read from `config.yml` in a config folder and combines the settings of
//! all pipeline components:
//!
//! ```yaml
//! queue:
//!   capacity: 250
//!   overflow: reject
//! dispatch:
//!   batch_size: 10
//!   interval: 60000
//! privacy:
//!   vendor_id: 91
//! logging:
//!   level: info
//! metrics:
//!   host: 127.0.0.1:8125
//! ```
//!
//! Values can be overridden with [`OverrideConfig`], for instance from command line arguments.
//! [`Config::validate`] checks that the resulting values are consistent.

#![warn(missing_docs)]

mod config;

pub use self::config::*;
