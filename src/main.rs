//! stun - user-space network tunnel
//!
//! Main entry point for the stun CLI.

mod cli;
mod relay;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use stun_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig};
use stun_event::EventLoop;

use cli::{Cli, Commands};
use relay::Relay;

/// Default configuration file: `<config dir>/stun/stun.toml`.
fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("stun"))
        .unwrap_or_else(|| PathBuf::from(".stun"))
        .join("stun.toml")
}

/// Initialize tracing with console and optional file output.
///
/// `RUST_LOG` overrides the configured level. Log files rotate daily.
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let file_layer = match &logging.log_dir {
        Some(dir) => {
            let log_dir = PathBuf::from(ConfigLoader::expand_path(dir));
            std::fs::create_dir_all(&log_dir)
                .with_context(|| format!("creating log directory {}", log_dir.display()))?;

            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("stun")
                .filename_suffix("log")
                .max_log_files(30)
                .build(&log_dir)?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Flushes pending lines on exit.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false).boxed())
        }
        None => None,
    };

    // stdout belongs to the relayed data.
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()?;

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConfigLoader::load_or_default(Some(&default_config_path()))?,
    };
    Ok(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = load_config(&cli);
    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    if let Err(e) = init_tracing(&logging) {
        eprintln!("stun: failed to initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    let result = loaded.and_then(|config| match cli.command {
        None => run_relay(config, None, None),
        Some(Commands::Relay {
            chunk_size,
            queue_capacity,
        }) => run_relay(config, chunk_size, queue_capacity),
        Some(Commands::CheckConfig) => check_config(&config),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Validate, reporting warnings and failing on the first error.
fn validated(config: &Config) -> anyhow::Result<()> {
    let warnings = ConfigValidator::validate(config)?.into_result()?;
    for warning in warnings {
        warn!(path = %warning.path, "{}", warning.message);
    }
    Ok(())
}

fn check_config(config: &Config) -> anyhow::Result<()> {
    validated(config)?;
    print!("{}", ConfigLoader::to_toml(config)?);
    info!("Configuration is valid");
    Ok(())
}

/// Relay stdin to stdout until EOF or a termination signal.
fn run_relay(
    mut config: Config,
    chunk_size: Option<usize>,
    queue_capacity: Option<usize>,
) -> anyhow::Result<()> {
    if let Some(chunk_size) = chunk_size {
        config.relay.chunk_size = chunk_size;
    }
    if let Some(queue_capacity) = queue_capacity {
        config.relay.queue_capacity = queue_capacity;
    }
    validated(&config)?;

    info!("Starting stun v{}", env!("CARGO_PKG_VERSION"));

    let event_loop = EventLoop::new(config.event.clone()).context("creating event loop")?;
    let relay = Relay::start(
        &event_loop,
        libc::STDIN_FILENO,
        libc::STDOUT_FILENO,
        &config.relay,
    )
    .context("starting relay")?;

    event_loop.run().context("event loop failed")?;

    let stats = relay.finish();
    let metrics = event_loop.metrics();
    info!(
        bytes_in = stats.bytes_in,
        bytes_out = stats.bytes_out,
        ticks = metrics.ticks,
        invocations = metrics.invocations,
        uptime_secs = metrics.uptime_secs,
        "Relay finished"
    );
    Ok(())
}
