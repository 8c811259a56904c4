//! Rover Link endpoint: entry point.
//!
//! Connects to the controller, serves one session, and exits.  The exit code
//! is 0 when the controller sent `Stop` or closed the connection, and
//! non-zero on a handshake mismatch, protocol error, or I/O failure.  Ctrl+C
//! ends the session through its normal teardown and also exits with 0.
//!
//! # Usage
//!
//! ```text
//! rover-endpoint [OPTIONS]
//!
//! Options:
//!   --config <PATH>          TOML config file
//!   --controller <HOST:PORT> Controller address, overrides [network]
//!   --log-level <FILTER>     tracing filter, overrides [endpoint] log_level
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable           | Flag           |
//! |--------------------|----------------|
//! | `ROVER_CONFIG`     | `--config`     |
//! | `ROVER_CONTROLLER` | `--controller` |
//! | `ROVER_LOG`        | `--log-level`  |
//!
//! `RUST_LOG`, when set, takes precedence over every other log setting.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpStream;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rover_endpoint::application::dispatch::{EndpointContext, MessageRegistry};
use rover_endpoint::application::drive_chassis::{ChassisController, PinDriver};
use rover_endpoint::application::manage_devices::DeviceRegistry;
use rover_endpoint::infrastructure::frame_source::mock::MockFrameSource;
use rover_endpoint::infrastructure::network::Session;
use rover_endpoint::infrastructure::pin_driver::mock::RecordingPinDriver;
use rover_endpoint::infrastructure::storage::config::{load_or_default, EndpointConfig, PinDriverKind};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Rover Link robot endpoint.
#[derive(Debug, Parser)]
#[command(
    name = "rover-endpoint",
    about = "Robot endpoint: camera streaming and stepper chassis control",
    version
)]
struct Cli {
    /// Path to the TOML config file.  A missing file means "use defaults".
    #[arg(long, env = "ROVER_CONFIG")]
    config: Option<PathBuf>,

    /// Controller address as HOST:PORT.
    #[arg(long, env = "ROVER_CONTROLLER")]
    controller: Option<String>,

    /// Log filter, e.g. `debug` or `rover_endpoint=trace`.
    #[arg(long, env = "ROVER_LOG")]
    log_level: Option<String>,
}

impl Cli {
    /// Applies command-line overrides on top of the file config.
    fn apply_to(&self, config: &mut EndpointConfig) -> anyhow::Result<()> {
        if let Some(controller) = &self.controller {
            let (host, port) = controller
                .rsplit_once(':')
                .with_context(|| format!("controller address '{controller}' is not HOST:PORT"))?;
            config.network.controller_port = port
                .parse()
                .with_context(|| format!("invalid controller port '{port}'"))?;
            config.network.controller_host = host.to_string();
        }
        if let Some(level) = &self.log_level {
            config.endpoint.log_level = level.clone();
        }
        Ok(())
    }
}

fn pin_driver(config: &EndpointConfig) -> anyhow::Result<Box<dyn PinDriver>> {
    match config.chassis.pin_driver {
        PinDriverKind::Mock => Ok(Box::new(RecordingPinDriver::new())),
        PinDriverKind::Sysfs => sysfs_pin_driver(config.line_map()),
    }
}

#[cfg(target_os = "linux")]
fn sysfs_pin_driver(lines: BTreeMap<u8, u32>) -> anyhow::Result<Box<dyn PinDriver>> {
    use rover_endpoint::infrastructure::pin_driver::linux::SysfsPinDriver;
    Ok(Box::new(SysfsPinDriver::new(lines)))
}

#[cfg(not(target_os = "linux"))]
fn sysfs_pin_driver(_lines: BTreeMap<u8, u32>) -> anyhow::Result<Box<dyn PinDriver>> {
    anyhow::bail!("the sysfs pin driver is only available on Linux")
}

/// Resolves on Ctrl+C.  If the handler cannot be installed it never resolves.
async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down"),
        Err(e) => {
            warn!("cannot listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_or_default(cli.config.as_deref()).context("failed to load config")?;
    cli.apply_to(&mut config)?;
    config.validate().context("invalid configuration")?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    //
    // `RUST_LOG` wins; otherwise the configured level (file or --log-level).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.endpoint.log_level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Wiring ────────────────────────────────────────────────────────────────
    let ctx = EndpointContext {
        devices: Arc::new(DeviceRegistry::new(
            Arc::new(MockFrameSource::synthetic()),
            config.registry_settings(),
        )),
        chassis: Arc::new(ChassisController::new(
            pin_driver(&config)?,
            config.chassis_settings()?,
        )),
    };
    let session = Session::new(
        ctx,
        Arc::new(MessageRegistry::with_default_handlers()),
        config.session_settings(),
    );

    // ── Connect ───────────────────────────────────────────────────────────────
    let addr = config.controller_addr();
    info!("connecting to controller at {addr}");
    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to controller at {addr}"))?;
    stream.set_nodelay(true).context("failed to set TCP_NODELAY")?;
    info!("connected to {addr}, session {}", session.id());

    // ── Serve ─────────────────────────────────────────────────────────────────
    match session.run_until(stream, ctrl_c()).await {
        Ok(outcome) => {
            info!("endpoint finished: {outcome:?}");
            Ok(())
        }
        Err(e) => {
            error!("session failed: {e}");
            Err(e).context("session failed")
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
