mod config;
mod constants;
mod error;
mod fetcher;
mod formatters;
mod influx;
mod keys;
mod models;
mod records;
mod registry;
mod service;
mod transport;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use argh::FromArgs;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::Config;
use crate::constants::DEFAULT_CONFIG_FILE;
use crate::error::ConfigError;
use crate::service::Poller;

type LogHandle = reload::Handle<EnvFilter, Registry>;

#[derive(FromArgs)]
/// Polls IQAir for air quality and weather readings and writes them to InfluxDB
struct Args {
    /// path to the YAML configuration file (default: config.yaml)
    #[argh(option, short = 'c', default = "PathBuf::from(DEFAULT_CONFIG_FILE)")]
    config: PathBuf,

    /// run a single polling cycle regardless of main.loop_seconds
    #[argh(switch)]
    once: bool,
}

/// Installs the stderr subscriber. Returns a handle for adjusting the level
/// after the config is read, or `None` when `RUST_LOG` decides it.
fn init_tracing() -> Option<LogHandle> {
    let from_env = EnvFilter::try_from_default_env().ok();
    let configurable = from_env.is_none();
    let (filter, handle) =
        reload::Layer::new(from_env.unwrap_or_else(|| EnvFilter::new(LevelFilter::INFO.to_string())));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    configurable.then_some(handle)
}

/// Maps `main.logverbosity` names onto tracing levels
fn level_filter(verbosity: &str) -> Option<LevelFilter> {
    match verbosity.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Some(LevelFilter::TRACE),
        "DEBUG" => Some(LevelFilter::DEBUG),
        "INFO" => Some(LevelFilter::INFO),
        "WARN" | "WARNING" => Some(LevelFilter::WARN),
        "ERROR" | "CRITICAL" | "FATAL" => Some(LevelFilter::ERROR),
        "OFF" => Some(LevelFilter::OFF),
        _ => None,
    }
}

fn apply_verbosity(handle: &LogHandle, verbosity: &str) {
    match level_filter(verbosity) {
        Some(level) => {
            if let Err(e) = handle.reload(EnvFilter::new(level.to_string())) {
                tracing::warn!("Could not change log level: {}", e);
            }
        }
        None => tracing::warn!("Unknown main.logverbosity '{}', keeping INFO", verbosity),
    }
}

/// Exit status for an error that ended the process: 2 when the config file
/// is missing, 1 for anything else, fatal upstream errors included.
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<ConfigError>() {
        Some(ConfigError::Missing(_)) => 2,
        _ => 1,
    }
}

fn load_config(path: &Path) -> Result<Config> {
    Config::from_file(path).with_context(|| format!("failed to load {}", path.display()))
}

async fn run(args: Args, log_handle: Option<LogHandle>) -> Result<()> {
    let config = load_config(&args.config)?;
    if let Some(handle) = &log_handle {
        apply_verbosity(handle, &config.main.logverbosity);
    }

    let mut poller = Poller::from_config(&config)?;
    let loop_seconds = if args.once { 0 } else { config.main.loop_seconds };
    tracing::info!(
        "Polling {} location(s) {}",
        config.iqair.locations.len(),
        if loop_seconds == 0 {
            "once".to_string()
        } else {
            format!("every {loop_seconds}s")
        }
    );

    tokio::select! {
        result = poller.run(loop_seconds) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl+C, shutting down"),
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let log_handle = init_tracing();
    let args: Args = argh::from_env();

    match run(args, log_handle).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FatalError;

    #[test]
    fn verbosity_names() {
        assert_eq!(level_filter("DEBUG"), Some(LevelFilter::DEBUG));
        assert_eq!(level_filter("info"), Some(LevelFilter::INFO));
        assert_eq!(level_filter("WARNING"), Some(LevelFilter::WARN));
        assert_eq!(level_filter("Critical"), Some(LevelFilter::ERROR));
        assert_eq!(level_filter("loud"), None);
    }

    #[test]
    fn args_default_to_config_yaml() {
        let args = Args::from_args(&["iqair-influx"], &[]).unwrap();
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert!(!args.once);

        let args = Args::from_args(&["iqair-influx"], &["-c", "/etc/iqair.yaml", "--once"]).unwrap();
        assert_eq!(args.config, PathBuf::from("/etc/iqair.yaml"));
        assert!(args.once);
    }

    #[test]
    fn missing_config_exits_with_2() {
        let err = load_config(Path::new("/nonexistent/iqair-influx/config.yaml")).unwrap_err();
        assert_eq!(exit_status(&err), 2);
    }

    #[test]
    fn invalid_config_exits_with_1() {
        let err = anyhow::Error::new(ConfigError::Invalid("no keys".to_string()))
            .context("failed to load config.yaml");
        assert_eq!(exit_status(&err), 1);
    }

    #[test]
    fn fatal_upstream_error_exits_with_1() {
        let err = anyhow::Error::from(FatalError::InvalidLocation {
            location: "home".to_string(),
        });
        assert_eq!(exit_status(&err), 1);
        assert_eq!(exit_status(&anyhow::Error::from(FatalError::ApiChanged)), 1);
    }
}
