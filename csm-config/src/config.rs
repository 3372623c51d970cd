use std::collections::BTreeMap;
use std::env;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use csm_dispatch::DispatchConfig;
use csm_log::{Level, LogConfig};
use csm_metrics::SdkConfig;
use csm_privacy::PrivacyConfig;
use csm_queue::QueueConfig;
use csm_statsd::MetricsConfig;
use serde::{Deserialize, Serialize};

/// The basename of the configuration file inside the config folder.
pub const CONFIG_FILE_NAME: &str = "config.yml";

type BoxedError = Box<dyn Error + Send + Sync + 'static>;

/// Defines the source of a config error
#[derive(Debug)]
enum ConfigErrorSource {
    /// An error occurring independently.
    None,
    /// An error originating from a configuration file.
    File(PathBuf),
    /// An error originating in a field override or a validated field.
    Field(&'static str),
}

/// Indicates config related errors.
#[derive(Debug)]
pub struct ConfigError {
    source: ConfigErrorSource,
    kind: ConfigErrorKind,
    inner: Option<BoxedError>,
}

impl ConfigError {
    #[inline]
    fn wrap<E>(inner: E, kind: ConfigErrorKind) -> Self
    where
        E: Into<BoxedError>,
    {
        Self {
            source: ConfigErrorSource::None,
            kind,
            inner: Some(inner.into()),
        }
    }

    #[inline]
    fn for_field<E>(inner: E, field: &'static str) -> Self
    where
        E: Into<BoxedError>,
    {
        Self::wrap(inner, ConfigErrorKind::InvalidValue).field(field)
    }

    #[inline]
    fn file<P: AsRef<Path>>(mut self, p: P) -> Self {
        self.source = ConfigErrorSource::File(p.as_ref().to_path_buf());
        self
    }

    #[inline]
    fn field(mut self, name: &'static str) -> Self {
        self.source = ConfigErrorSource::Field(name);
        self
    }

    /// Returns the error kind of the error.
    pub fn kind(&self) -> ConfigErrorKind {
        self.kind
    }

    /// Returns the name of the offending field, if the error concerns a single field.
    pub fn field_name(&self) -> Option<&str> {
        match self.source {
            ConfigErrorSource::Field(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            ConfigErrorSource::None => fmt::Display::fmt(&self.kind, f),
            ConfigErrorSource::File(file_name) => {
                write!(f, "{} (file {})", self.kind, file_name.display())
            }
            ConfigErrorSource::Field(name) => write!(f, "{} (field {})", self.kind, name),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

/// Indicates config related errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, thiserror::Error)]
pub enum ConfigErrorKind {
    /// Failed to open the file.
    #[error("could not open config file")]
    CouldNotOpenFile,
    /// Failed to save a file.
    #[error("could not write config file")]
    CouldNotWriteFile,
    /// Parsing YAML failed.
    #[error("could not parse yaml config file")]
    BadYaml,
    /// Invalid config value
    #[error("invalid config value")]
    InvalidValue,
}

/// Configuration of the internal statsd metrics.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Metrics {
    /// Hostname and port of the statsd server.
    ///
    /// Internal metrics are disabled when no host is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Common prefix that should be added to all metrics.
    ///
    /// Defaults to `"csm"`.
    pub prefix: String,
    /// Default tags to apply to all metrics.
    pub default_tags: BTreeMap<String, String>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            host: None,
            prefix: "csm".to_owned(),
            default_tags: BTreeMap::new(),
        }
    }
}

/// The raw, serializable configuration values.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigValues {
    /// The sending queue.
    pub queue: QueueConfig,
    /// The dispatch loop.
    pub dispatch: DispatchConfig,
    /// Consent gating.
    pub privacy: PrivacyConfig,
    /// Static SDK properties attached to every batch.
    pub sdk: SdkConfig,
    /// Logging.
    pub logging: LogConfig,
    /// Internal statsd metrics.
    pub metrics: Metrics,
}

/// Values that override the configuration file, for instance from command line arguments.
///
/// All values are strings and parsed when applied, so that errors can be attributed to a field.
#[derive(Debug, Default)]
pub struct OverrideConfig {
    /// The capacity of the sending queue.
    pub capacity: Option<String>,
    /// The number of metrics sent per batch.
    pub batch_size: Option<String>,
    /// The dispatch interval in milliseconds.
    pub interval: Option<String>,
    /// The log level.
    pub log_level: Option<String>,
}

/// Configuration of the client-side metrics pipeline.
#[derive(Clone, Debug, Default)]
pub struct Config {
    values: ConfigValues,
    path: PathBuf,
}

impl Config {
    /// Loads the config from the folder at the given path.
    ///
    /// The configuration is read from `config.yml` inside the folder. If that file does not exist,
    /// all defaults apply.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = env::current_dir()
            .map(|x| x.join(path.as_ref()))
            .unwrap_or_else(|_| path.as_ref().to_path_buf());

        let file = path.join(CONFIG_FILE_NAME);
        let values = match fs::read_to_string(&file) {
            Ok(contents) => serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadYaml).file(&file))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                csm_log::debug!(path = %file.display(), "config file not found, using defaults");
                ConfigValues::default()
            }
            Err(e) => {
                return Err(ConfigError::wrap(e, ConfigErrorKind::CouldNotOpenFile).file(&file));
            }
        };

        Ok(Config { values, path })
    }

    /// Creates a config from a YAML string.
    ///
    /// This is mostly useful for tests.
    pub fn from_yaml_str(yaml: &str) -> Result<Config, ConfigError> {
        Ok(Config {
            values: serde_yaml::from_str(yaml)
                .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadYaml))?,
            path: PathBuf::new(),
        })
    }

    /// Writes the configuration into `config.yml` in the given folder.
    ///
    /// The folder is created if it does not exist.
    pub fn save_in_folder<P: AsRef<Path>>(&self, p: P) -> Result<(), ConfigError> {
        let path = p.as_ref();
        if fs::metadata(path).is_err() {
            fs::create_dir_all(path)
                .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotOpenFile).file(path))?;
        }

        let file = path.join(CONFIG_FILE_NAME);
        let mut f = fs::File::create(&file)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotWriteFile).file(&file))?;

        serde_yaml::to_writer(&mut f, &self.values)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotWriteFile).file(&file))?;
        f.write_all(b"\n").ok();

        Ok(())
    }

    /// Override configuration with values coming from other sources (e.g. env variables or
    /// command line parameters)
    pub fn apply_override(&mut self, overrides: OverrideConfig) -> Result<&mut Self, ConfigError> {
        if let Some(capacity) = overrides.capacity {
            self.values.queue.capacity = capacity
                .parse()
                .map_err(|err| ConfigError::for_field(err, "queue.capacity"))?;
        }

        if let Some(batch_size) = overrides.batch_size {
            self.values.dispatch.batch_size = batch_size
                .parse()
                .map_err(|err| ConfigError::for_field(err, "dispatch.batch_size"))?;
        }

        if let Some(interval) = overrides.interval {
            self.values.dispatch.interval = interval
                .parse()
                .map_err(|err| ConfigError::for_field(err, "dispatch.interval"))?;
        }

        if let Some(log_level) = overrides.log_level {
            self.values.logging.level = log_level
                .parse::<Level>()
                .map_err(|err| ConfigError::for_field(err, "logging.level"))?;
        }

        Ok(self)
    }

    /// Checks the values for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let values = &self.values;

        if values.queue.capacity == 0 {
            return Err(ConfigError::for_field(
                "the queue capacity must be positive",
                "queue.capacity",
            ));
        }

        if values.dispatch.batch_size > values.queue.capacity {
            return Err(ConfigError::for_field(
                format!(
                    "the batch size {} exceeds the queue capacity {}",
                    values.dispatch.batch_size, values.queue.capacity
                ),
                "dispatch.batch_size",
            ));
        }

        if values.dispatch.interval == 0 {
            return Err(ConfigError::for_field(
                "the dispatch interval must be positive",
                "dispatch.interval",
            ));
        }

        if values.privacy.vendor_id == 0 {
            return Err(ConfigError::for_field("vendor ids start at 1", "privacy.vendor_id"));
        }

        Ok(())
    }

    /// Returns the folder this config was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the raw configuration values.
    pub fn values(&self) -> &ConfigValues {
        &self.values
    }

    /// Dumps out a YAML string of the values.
    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(&self.values)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotWriteFile))
    }

    /// Returns the sending queue configuration.
    pub fn queue(&self) -> &QueueConfig {
        &self.values.queue
    }

    /// Returns the dispatch loop configuration.
    pub fn dispatch(&self) -> &DispatchConfig {
        &self.values.dispatch
    }

    /// Returns the consent gating configuration.
    pub fn privacy(&self) -> &PrivacyConfig {
        &self.values.privacy
    }

    /// Returns the SDK properties.
    pub fn sdk(&self) -> &SdkConfig {
        &self.values.sdk
    }

    /// Returns the logging configuration.
    pub fn logging(&self) -> &LogConfig {
        &self.values.logging
    }

    /// Returns the statsd client configuration, if internal metrics are enabled.
    pub fn metrics_config(&self) -> Option<MetricsConfig> {
        let metrics = &self.values.metrics;
        Some(MetricsConfig {
            prefix: metrics.prefix.clone(),
            host: metrics.host.clone()?,
            buffer_size: None,
            default_tags: metrics.default_tags.clone(),
        })
    }
}
