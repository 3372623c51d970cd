use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use csm_config::{CONFIG_FILE_NAME, Config, OverrideConfig};
use csm_privacy::{ConsentGate, MemoryConsentStore, VENDOR_CONSENTS_KEY};

use crate::setup;
use crate::simulate::{self, SimulateOptions};

/// Buffers, gates and dispatches client-side ad metrics.
#[derive(Debug, Parser)]
#[command(name = "csm", version, propagate_version = true)]
pub struct Cli {
    /// The path to the config folder.
    #[arg(short, long, global = true, env = "CSM_CONFIG_PATH", default_value = ".csm")]
    config: PathBuf,

    /// Overrides the log level.
    #[arg(long, global = true, env = "CSM_LOG_LEVEL", value_name = "LEVEL")]
    log_level: Option<String>,

    /// Overrides the capacity of the sending queue.
    #[arg(long, global = true, env = "CSM_QUEUE_CAPACITY", value_name = "ITEMS")]
    capacity: Option<String>,

    /// Overrides the number of metrics sent per batch.
    #[arg(long, global = true, env = "CSM_BATCH_SIZE", value_name = "ITEMS")]
    batch_size: Option<String>,

    /// Overrides the dispatch interval in milliseconds.
    #[arg(long, global = true, env = "CSM_DISPATCH_INTERVAL", value_name = "MS")]
    interval: Option<String>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn overrides(&self) -> OverrideConfig {
        OverrideConfig {
            capacity: self.capacity.clone(),
            batch_size: self.batch_size.clone(),
            interval: self.interval.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage the configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Evaluate a TCF v2 vendor consent string.
    Consent {
        /// The vendor consent bit string, as stored by the consent management platform.
        value: String,
    },

    /// Run producers against the sending queue and drain it with a logging transport.
    Simulate(SimulateArgs),
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Write a default config file into the config folder.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration.
    Show,
}

#[derive(Debug, Args)]
struct SimulateArgs {
    /// Number of concurrent producer threads.
    #[arg(long, default_value_t = 4)]
    producers: usize,

    /// Number of metrics created by each producer.
    #[arg(long, default_value_t = 100)]
    metrics: usize,

    /// Vendor consent string in effect during the run.
    #[arg(long)]
    consent: Option<String>,
}

/// Runs the command line interface.
pub fn execute() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Config {
            command: ConfigCommand::Init { force },
        } => init_config(&cli.config, cli.overrides(), force),
        Command::Config {
            command: ConfigCommand::Show,
        } => show_config(&load_config(&cli)?),
        Command::Consent { ref value } => evaluate_consent(&load_config(&cli)?, value),
        Command::Simulate(ref args) => run_simulation(&load_config(&cli)?, args),
    }
}

/// Loads and validates the config, then initializes logging and internal metrics.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_path(&cli.config)?;
    config.apply_override(cli.overrides())?;
    config.validate()?;

    csm_log::init(config.logging());
    setup::init_metrics(&config)?;
    setup::dump_spawn_infos(&config);

    Ok(config)
}

#[allow(clippy::print_stdout)]
fn init_config(path: &Path, overrides: OverrideConfig, force: bool) -> Result<()> {
    let file = path.join(CONFIG_FILE_NAME);
    if file.exists() && !force {
        anyhow::bail!(
            "config file {} already exists, use --force to overwrite it",
            file.display()
        );
    }

    let mut config = Config::default();
    config.apply_override(overrides)?;
    config.validate()?;
    config
        .save_in_folder(path)
        .with_context(|| format!("failed to initialize config in {}", path.display()))?;

    println!("wrote {}", file.display());
    Ok(())
}

#[allow(clippy::print_stdout)]
fn show_config(config: &Config) -> Result<()> {
    print!("{}", config.to_yaml_string()?);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn evaluate_consent(config: &Config, value: &str) -> Result<()> {
    let store = MemoryConsentStore::new();
    store.set(VENDOR_CONSENTS_KEY, value);
    let gate = ConsentGate::from_config(store, config.privacy());

    println!("vendor {}: {}", gate.vendor_id(), gate.is_vendor_consent_given());
    println!("csm disallowed: {}", gate.is_csm_disallowed());
    Ok(())
}

#[allow(clippy::print_stdout)]
fn run_simulation(config: &Config, args: &SimulateArgs) -> Result<()> {
    let options = SimulateOptions {
        producers: args.producers,
        metrics: args.metrics,
        consent: args.consent.clone(),
    };

    let report = simulate::run(config, &options)?;
    println!("{report}");
    Ok(())
}
