//! k3driver - UDP control and telemetry service for the Khepera III robot
//!
//! Two independent UDP endpoints speak the `$K3DRV` line protocol:
//!
//! - **Control (port 4555)**: INIT and CTRL, with a failsafe stop when the
//!   controlling client goes silent
//! - **Data (port 4556)**: DATA, answered with IR and odometry snapshots
//!
//! The robot itself sits behind the [`gateway::RobotGateway`] trait; the
//! daemon ships with a [`gateway::SimulatedRobot`] backend.

pub mod config;
pub mod error;
pub mod gateway;
pub mod protocol;
pub mod session;
pub mod supervisor;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use supervisor::{RunningService, ShutdownTrigger, Supervisor};
