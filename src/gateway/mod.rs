//! Robot gateway: the boundary between the protocol core and the robot
//!
//! - [`RobotGateway`]: trait the session loops call into
//! - [`SpeedLimits`]: wheel-speed bounds enforced before actuation
//! - [`simulated::SimulatedRobot`]: hardware-free backend used by the daemon
//!
//! Both session loops hold the same gateway, so every implementation must make
//! each call atomic with respect to the others (one internal lock is enough).

pub mod noise;
pub mod simulated;

use crate::error::{Error, Result};
use crate::protocol::IR_CHANNELS;
use serde::{Deserialize, Serialize};

pub use simulated::SimulatedRobot;

/// Actuator and sensor access shared by the control and data sessions
pub trait RobotGateway: Send + Sync {
    /// Latch new wheel speeds (robot-native velocity units)
    fn set_wheel_speeds(&self, right: i32, left: i32) -> Result<()>;

    /// Reset both wheel position counters to zero
    fn zero_position_counters(&self) -> Result<()>;

    /// Read the infrared proximity array
    fn read_infrared(&self) -> Result<[i32; IR_CHANNELS]>;

    /// Position change (right, left) since the previous call
    fn read_odometry_delta(&self) -> Result<(i32, i32)>;

    /// Zero both wheels
    fn stop(&self) -> Result<()> {
        self.set_wheel_speeds(0, 0)
    }
}

/// What to do with a wheel speed outside the configured bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedPolicy {
    /// Saturate to the bound and actuate
    #[default]
    Clamp,
    /// Refuse the whole command
    Reject,
}

/// Symmetric wheel-speed bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedLimits {
    /// Largest accepted absolute speed
    pub max_abs: i32,
    pub policy: SpeedPolicy,
}

impl SpeedLimits {
    pub fn new(max_abs: i32, policy: SpeedPolicy) -> Self {
        Self {
            max_abs: max_abs.saturating_abs(),
            policy,
        }
    }

    /// Apply the bound to a (right, left) pair
    pub fn apply(&self, right: i32, left: i32) -> Result<(i32, i32)> {
        let within = |v: i32| v.saturating_abs() <= self.max_abs;
        if within(right) && within(left) {
            return Ok((right, left));
        }

        match self.policy {
            SpeedPolicy::Clamp => {
                let clamped = (
                    right.clamp(-self.max_abs, self.max_abs),
                    left.clamp(-self.max_abs, self.max_abs),
                );
                log::warn!(
                    "Wheel speeds ({}, {}) exceed ±{}, clamped to ({}, {})",
                    right,
                    left,
                    self.max_abs,
                    clamped.0,
                    clamped.1
                );
                Ok(clamped)
            }
            SpeedPolicy::Reject => Err(Error::Gateway(format!(
                "refused wheel speeds ({}, {}) exceed ±{}",
                right, left, self.max_abs
            ))),
        }
    }
}
