use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// All crates of the workspace, which log at the configured level.
///
/// Third-party crates are capped at `INFO` unless `RUST_LOG` overrides the filter.
const CRATE_NAMES: &[&str] = &[
    "csm",
    "csm_config",
    "csm_dispatch",
    "csm_log",
    "csm_metrics",
    "csm_privacy",
    "csm_queue",
    "csm_statsd",
];

/// Controls the log format.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    ///
    /// ```text
    ///   2025-10-19T12:10:32.251Z  INFO csm_dispatch::dispatcher: sent metric batch
    /// ```
    Pretty,

    /// Simplified plain text output.
    ///
    /// ```text
    /// 2025-10-19T12:10:32.251Z  INFO csm_dispatch::dispatcher: sent metric batch metrics=10
    /// ```
    Simplified,

    /// Dump out JSON lines.
    ///
    /// ```text
    /// {"timestamp":"2025-10-19T12:11:08.729716Z","level":"INFO","fields":{"message":"sent metric batch","metrics":10},"target":"csm_dispatch::dispatcher"}
    /// ```
    Json,
}

/// The maximum level at which the workspace crates log.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Disables logging entirely.
    Off,
    /// Only errors.
    Error,
    /// Errors and warnings.
    Warn,
    /// Informational messages and above.
    Info,
    /// Debug messages and above.
    Debug,
    /// Everything, including individual queue operations.
    Trace,
}

impl Level {
    /// Returns the `tracing` level filter corresponding to this level.
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::OFF,
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`Level`].
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("invalid log level {0:?}, expected one of off, error, warn, info, debug, trace")]
pub struct ParseLevelError(String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "off" => Self::Off,
            "error" => Self::Error,
            "warn" | "warning" => Self::Warn,
            "info" => Self::Info,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => return Err(ParseLevelError(s.to_owned())),
        })
    }
}

/// Controls the logging system.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// The log level for all crates of the pipeline.
    pub level: Level,

    /// Controls the log output format.
    ///
    /// Defaults to [`LogFormat::Auto`], which detects the best format based on the TTY.
    pub format: LogFormat,

    /// When set to `true`, backtraces are forced on.
    ///
    /// Otherwise, backtraces can be enabled by setting the `RUST_BACKTRACE` variable to `full`.
    pub enable_backtraces: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            format: LogFormat::Auto,
            enable_backtraces: false,
        }
    }
}

/// Builds the default filter directives for the given level.
///
/// Third-party crates log at `INFO` at most, the workspace crates at the configured level.
fn default_directives(level: Level) -> String {
    let third_party = level.min(Level::Info);
    let mut directives = third_party.as_str().to_owned();

    for name in CRATE_NAMES {
        directives.push(',');
        directives.push_str(name);
        directives.push('=');
        directives.push_str(level.as_str());
    }

    directives
}

/// Initialize the logging system.
///
/// If `RUST_LOG` is set, it takes precedence over the configured level. Calling this more than
/// once has no effect.
///
/// # Example
///
/// ```
/// let log_config = csm_log::LogConfig {
///     enable_backtraces: true,
///     ..Default::default()
/// };
///
/// csm_log::init(&log_config);
/// ```
pub fn init(config: &LogConfig) {
    if config.enable_backtraces {
        // SAFETY: logging is initialized at startup, before any other threads are spawned.
        unsafe { env::set_var("RUST_BACKTRACE", "full") };
    }

    let filter = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) => EnvFilter::new(directives),
        Err(_) => EnvFilter::new(default_directives(config.level)),
    };

    let subscriber = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let format: Box<dyn Layer<Registry> + Send + Sync> =
        match (config.format, console::user_attended_stderr()) {
            (LogFormat::Auto, true) | (LogFormat::Pretty, _) => subscriber.pretty().boxed(),
            (LogFormat::Auto, false) | (LogFormat::Simplified, _) => {
                subscriber.with_ansi(false).compact().boxed()
            }
            (LogFormat::Json, _) => subscriber.with_ansi(false).json().boxed(),
        };

    tracing_subscriber::registry()
        .with(format.with_filter(filter))
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(
            default_directives(Level::Debug),
            "info,csm=debug,csm_config=debug,csm_dispatch=debug,csm_log=debug,\
             csm_metrics=debug,csm_privacy=debug,csm_queue=debug,csm_statsd=debug"
        );
    }

    #[test]
    fn test_default_directives_caps_third_party() {
        let directives = default_directives(Level::Warn);
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("csm_queue=warn"));
    }

    #[test]
    fn test_parse_level() {
        assert_eq!("TRACE".parse::<Level>(), Ok(Level::Trace));
        assert_eq!("warning".parse::<Level>(), Ok(Level::Warn));
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn test_config_from_yaml() {
        let config: LogConfig = serde_yaml::from_str("level: trace\nformat: json").unwrap();
        assert_eq!(config.level, Level::Trace);
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.enable_backtraces);
    }
}
