//! k3driver - UDP control server for the Khepera III mobile robot
//!
//! ## Protocol Architecture
//!
//! - **UDP control (port 4555)**: `$K3DRV,REQ,INIT` and `$K3DRV,REQ,CTRL,<R>,<L>`;
//!   wheels are stopped if no control datagram arrives within the timeout
//! - **UDP data (port 4556)**: `$K3DRV,REQ,DATA` returns IR and encoder values
//!
//! Giving both ports the same number serves all three requests on one socket.

use clap::Parser;
use k3driver::config::{Config, Verbosity};
use k3driver::error::{Error, Result};
use k3driver::gateway::{RobotGateway, SimulatedRobot};
use k3driver::supervisor::Supervisor;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// UDP server that controls the Khepera III robot over the network
#[derive(Parser, Debug)]
#[command(name = "k3driver", version, about, long_about = None)]
struct Args {
    /// TOML configuration file (flags below override its values)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// UDP port to listen on for control (default: 4555)
    #[arg(short = 'p', long)]
    control_port: Option<u16>,

    /// UDP port to listen on for data (default: 4556)
    #[arg(short = 'P', long)]
    data_port: Option<u16>,

    /// Seconds without a control request before the wheels are stopped, 0 disables (default: 2)
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Verbosity level (0=quiet, 1=default, 2=verbose, 3=very verbose)
    #[arg(short, long)]
    verbosity: Option<u8>,

    /// Interface address to bind (default: 0.0.0.0)
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// Seed for simulated sensor noise, 0 = random
    #[arg(long)]
    seed: Option<u64>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(port) = self.control_port {
            config.network.control_port = port;
        }
        if let Some(port) = self.data_port {
            config.network.data_port = port;
        }
        if let Some(timeout) = self.timeout {
            config.network.control_timeout_secs = timeout;
        }
        if let Some(level) = self.verbosity {
            config.logging.verbosity = Verbosity(level);
        }
        if let Some(ip) = self.bind {
            config.network.bind_address = ip;
        }
        if let Some(seed) = self.seed {
            config.simulation.random_seed = seed;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    args.apply(&mut config);

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.verbosity.filter()),
    )
    .init();

    log::info!("k3driver v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &args.config {
        log::info!("Using config: {}", path.display());
    }

    let gateway: Arc<dyn RobotGateway> = Arc::new(SimulatedRobot::new(
        &config.simulation,
        config.robot.speed_limits(),
    ));
    log::info!(
        "Gateway: simulated robot (wheel speed limit ±{}, {:?})",
        config.robot.max_wheel_speed,
        config.robot.speed_policy
    );

    let supervisor = Supervisor::new(&config, gateway)?;

    // Handler must exist before any session thread runs
    let trigger = supervisor.shutdown_trigger();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        trigger.fire();
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let service = supervisor.start()?;

    log::info!("k3driver running. Press Ctrl-C to stop.");

    if let Err(e) = service.wait() {
        log::error!("Fatal: {}", e);
        return Err(e);
    }

    log::info!("k3driver stopped");
    Ok(())
}
