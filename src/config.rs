//! Configuration for the K3 driver daemon
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! file (or no file) yields the stock two-port layout. Command-line flags are
//! applied on top by `main`, then [`Config::validate`] runs once before the
//! supervisor starts.

use crate::error::{Error, Result};
use crate::gateway::{SpeedLimits, SpeedPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

/// Top-level daemon configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub robot: RobotConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// UDP listener configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Interface both listeners bind to
    pub bind_address: IpAddr,
    /// Port for INIT/CTRL requests
    pub control_port: u16,
    /// Port for DATA requests (equal to `control_port` for shared-port mode)
    pub data_port: u16,
    /// Control-channel silence before the failsafe stop, in seconds (0 = never)
    pub control_timeout_secs: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            control_port: 4555,
            data_port: 4556,
            control_timeout_secs: 2.0,
        }
    }
}

impl NetworkConfig {
    /// Failsafe deadline, `None` when disabled
    pub fn control_timeout(&self) -> Option<Duration> {
        if self.control_timeout_secs > 0.0 {
            Some(Duration::from_secs_f64(self.control_timeout_secs))
        } else {
            None
        }
    }

    /// Control and data share one socket
    pub fn shared_port(&self) -> bool {
        self.control_port == self.data_port
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbosity: Verbosity,
}

/// Console verbosity (0=quiet, 1=default, 2=verbose, 3=very verbose)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Verbosity(pub u8);

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity(1)
    }
}

impl Verbosity {
    /// Default `env_logger` filter for this level
    pub fn filter(self) -> &'static str {
        match self.0 {
            0 => "error",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Per-datagram traffic is logged at info instead of debug
    pub fn logs_traffic(self) -> bool {
        self.0 >= 2
    }
}

/// Actuation bounds enforced by the gateway
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Largest accepted absolute wheel speed (robot-native units)
    pub max_wheel_speed: i32,
    /// Out-of-range handling
    pub speed_policy: SpeedPolicy,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            max_wheel_speed: 20000,
            speed_policy: SpeedPolicy::Clamp,
        }
    }
}

impl RobotConfig {
    pub fn speed_limits(&self) -> SpeedLimits {
        SpeedLimits::new(self.max_wheel_speed, self.speed_policy)
    }
}

/// Simulated robot parameters
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Noise seed, 0 = random each run
    pub random_seed: u64,
    /// Mean IR reading with nothing in range
    pub ir_baseline: i32,
    /// IR noise standard deviation
    pub ir_noise_stddev: f32,
    /// Position ticks per speed unit per second
    pub ticks_per_speed_unit: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            random_seed: 0,
            ir_baseline: 60,
            ir_noise_stddev: 4.0,
            ticks_per_speed_unit: 1.0,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use k3driver::config::Config;
    ///
    /// let config = Config::load("k3driver.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Pretty TOML rendering
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check values the daemon cannot start with
    pub fn validate(&self) -> Result<()> {
        let net = &self.network;
        if net.control_port == 0 {
            return Err(Error::Config("control_port must be > 0".to_string()));
        }
        if net.data_port == 0 {
            return Err(Error::Config("data_port must be > 0".to_string()));
        }
        if !net.control_timeout_secs.is_finite() || net.control_timeout_secs < 0.0 {
            return Err(Error::Config(format!(
                "control_timeout_secs must be >= 0, got {}",
                net.control_timeout_secs
            )));
        }
        if self.robot.max_wheel_speed <= 0 {
            return Err(Error::Config(format!(
                "max_wheel_speed must be > 0, got {}",
                self.robot.max_wheel_speed
            )));
        }
        let sim = &self.simulation;
        let non_negative = |v: f64| v.is_finite() && v >= 0.0;
        if !non_negative(f64::from(sim.ir_noise_stddev)) || !non_negative(sim.ticks_per_speed_unit)
        {
            return Err(Error::Config(
                "simulation noise and tick scale must be >= 0".to_string(),
            ));
        }
        Ok(())
    }
}
