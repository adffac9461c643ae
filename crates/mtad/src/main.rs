// # mtad - MTA Aggregator Daemon
//
// Thin integration layer hosting the telephony state aggregator. All MTA
// state logic lives in mta-core; this binary only:
// 1. Reads configuration from a JSON file and environment variables
// 2. Initializes logging and the runtime
// 3. Registers producers and builds the device
// 4. Runs the dispatch loop and battery poller until SIGTERM/SIGINT
//
// ## Configuration
//
// - `MTA_CONFIG_PATH`: JSON file holding an `MtaConfig` document (optional)
// - `MTA_LINE_COUNT`: Number of telephony lines (overrides the file)
// - `MTA_BATTERY_SYSFS_PATH`: power_supply directory of the battery
// - `MTA_BATTERY_POLL_SECS`: Battery poll interval in seconds
// - `MTA_LOG_LEVEL`: trace, debug, info, warn or error
//
// ## Example
//
// ```bash
// export MTA_LINE_COUNT=2
// export MTA_BATTERY_SYSFS_PATH=/sys/class/power_supply/BAT0
//
// mtad
// ```

use anyhow::{Context, Result};
use mta_core::config::BatterySourceConfig;
use mta_core::records::LineStatusUpdate;
use mta_core::traits::LineStatusSubscriber;
use mta_core::{MtaConfig, MtaDevice, ProducerRegistry};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Grace period for background tasks after shutdown is signalled
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum MtadExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<MtadExitCode> for ExitCode {
    fn from(code: MtadExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon configuration
#[derive(Debug)]
struct Config {
    mta: MtaConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from the process environment
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut mta = match lookup("MTA_CONFIG_PATH") {
            Some(path) => {
                let json = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read MTA_CONFIG_PATH {}", path))?;
                serde_json::from_str(&json)
                    .with_context(|| format!("Invalid configuration file {}", path))?
            }
            None => MtaConfig::new(),
        };

        if let Some(count) = lookup("MTA_LINE_COUNT") {
            mta.line_count = count
                .parse()
                .with_context(|| format!("MTA_LINE_COUNT is not a number: {}", count))?;
        }
        if let Some(path) = lookup("MTA_BATTERY_SYSFS_PATH") {
            mta.battery.source = BatterySourceConfig::Sysfs { path };
        }
        if let Some(secs) = lookup("MTA_BATTERY_POLL_SECS") {
            mta.battery.poll_interval_secs = secs
                .parse()
                .with_context(|| format!("MTA_BATTERY_POLL_SECS is not a number: {}", secs))?;
        }

        Ok(Self {
            mta,
            log_level: lookup("MTA_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.mta.validate()?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "MTA_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return MtadExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return MtadExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return MtadExitCode::ConfigError.into();
    }

    info!("Starting mtad daemon");
    info!("Configuration loaded: {} line(s)", config.mta.line_count);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return MtadExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            MtadExitCode::RuntimeError
        } else {
            MtadExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Logs every line-status delivery
struct LoggingSubscriber;

impl LineStatusSubscriber for LoggingSubscriber {
    fn on_line_status(&self, update: &LineStatusUpdate) {
        match update.changed_line {
            Some(line) => info!(
                "Line {} status changed: registration {:?}",
                line,
                update.registration_statuses()
            ),
            None => info!(
                "Line status resync: registration {:?}",
                update.registration_statuses()
            ),
        }
    }
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let registry = ProducerRegistry::new();

    #[cfg(feature = "sysfs")]
    {
        info!("Registering sysfs battery source");
        mta_battery_sysfs::register(&registry);
    }

    let battery_source = registry
        .create_battery_source(&config.mta.battery.source)
        .context("Failed to create battery source")?;
    if battery_source.is_none() {
        warn!("No battery source configured; battery reads will be unavailable");
    }

    let poll_interval = Duration::from_secs(config.mta.battery.poll_interval_secs);
    let mut builder = MtaDevice::builder(config.mta);
    if let Some(source) = battery_source {
        builder = builder.battery_source(source);
    }
    let (device, dispatch) = builder.build().context("Failed to build MTA device")?;
    let device = Arc::new(device);

    let subscriber: Arc<dyn LineStatusSubscriber> = Arc::new(LoggingSubscriber);
    let _subscription = device.dispatcher().register(&subscriber);

    let (dispatch_stop, dispatch_rx) = oneshot::channel();
    let dispatch_task = tokio::spawn(dispatch.run_with_shutdown(Some(dispatch_rx)));

    let (poller_stop, poller_rx) = oneshot::channel();
    let poller_task = tokio::spawn(
        device
            .battery_poller(poll_interval)
            .run_with_shutdown(Some(poller_rx)),
    );

    info!("Daemon initialized successfully");

    let signal = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal);
    info!("Shutting down daemon");

    // A task that already finished has dropped its receiver
    let _ = dispatch_stop.send(());
    let _ = poller_stop.send(());

    for (name, task) in [("dispatch loop", dispatch_task), ("battery poller", poller_task)] {
        match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!("{} ended with error: {}", name, e),
            Ok(Err(e)) => warn!("{} task failed: {}", name, e),
            Err(_) => warn!("{} did not stop within {:?}", name, SHUTDOWN_GRACE),
        }
    }

    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = load(&[]).unwrap();
        assert_eq!(config.mta.line_count, MtaConfig::new().line_count);
        assert_eq!(config.mta.battery.source, BatterySourceConfig::None);
        assert_eq!(config.level(), Level::INFO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_environment_overrides() {
        let config = load(&[
            ("MTA_LINE_COUNT", "4"),
            ("MTA_BATTERY_SYSFS_PATH", "/sys/class/power_supply/BAT0"),
            ("MTA_BATTERY_POLL_SECS", "15"),
            ("MTA_LOG_LEVEL", "DEBUG"),
        ])
        .unwrap();

        assert_eq!(config.mta.line_count, 4);
        assert_eq!(config.mta.battery.poll_interval_secs, 15);
        assert_eq!(
            config.mta.battery.source,
            BatterySourceConfig::Sysfs {
                path: "/sys/class/power_supply/BAT0".to_string()
            }
        );
        assert_eq!(config.level(), Level::DEBUG);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(load(&[("MTA_LINE_COUNT", "two")]).is_err());

        let config = load(&[("MTA_LINE_COUNT", "0")]).unwrap();
        assert!(config.validate().is_err());

        let config = load(&[("MTA_LOG_LEVEL", "verbose")]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_is_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mta.json");
        std::fs::write(&path, r#"{"line_count": 3, "dsx_log_capacity": 8}"#).unwrap();

        let config = load(&[
            ("MTA_CONFIG_PATH", path.to_str().unwrap()),
            ("MTA_LINE_COUNT", "2"),
        ])
        .unwrap();
        assert_eq!(config.mta.line_count, 2);
        assert_eq!(config.mta.dsx_log_capacity, 8);
    }

    #[test]
    fn test_unreadable_config_file_rejected() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(load(&[("MTA_CONFIG_PATH", missing.to_str().unwrap())]).is_err());

        let garbled = dir.path().join("garbled.json");
        std::fs::write(&garbled, "{ line_count: ").unwrap();
        assert!(load(&[("MTA_CONFIG_PATH", garbled.to_str().unwrap())]).is_err());
    }
}
