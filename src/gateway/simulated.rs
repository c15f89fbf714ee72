//! Hardware-free Khepera III stand-in
//!
//! Simulates what the protocol core can observe of the robot:
//!
//! | Component | Simulation Method |
//! |-----------|-------------------|
//! | Wheel motors | Latched speeds, bounded by [`SpeedLimits`] |
//! | Position counters | `speed × elapsed × ticks_per_speed_unit`, fractional carry |
//! | IR proximity (11) | Baseline + Gaussian noise, clamped to 12 bits |
//!
//! Time advances lazily: counters are integrated up to "now" at the start of
//! every call, so no simulation thread is needed. All state sits behind one
//! mutex, which makes each gateway call atomic across session threads.

use super::noise::SensorNoise;
use super::{RobotGateway, SpeedLimits};
use crate::config::SimulationConfig;
use crate::error::Result;
use crate::protocol::IR_CHANNELS;
use parking_lot::Mutex;
use std::time::Instant;

/// Largest value the 12-bit IR ADC reports
const IR_MAX: i32 = 4095;

/// Simulated robot gateway
pub struct SimulatedRobot {
    limits: SpeedLimits,
    ir_baseline: i32,
    ir_noise_stddev: f32,
    ticks_per_speed_unit: f64,
    state: Mutex<RobotState>,
}

struct RobotState {
    right_speed: i32,
    left_speed: i32,
    /// Accumulated position including fractional ticks
    right_position: f64,
    left_position: f64,
    /// Whole-tick positions at the previous odometry read
    right_read: i64,
    left_read: i64,
    last_step: Instant,
    noise: SensorNoise,
}

impl RobotState {
    fn integrate(&mut self, seconds: f64, ticks_per_speed_unit: f64) {
        self.right_position += f64::from(self.right_speed) * seconds * ticks_per_speed_unit;
        self.left_position += f64::from(self.left_speed) * seconds * ticks_per_speed_unit;
    }

    fn sync(&mut self, now: Instant, ticks_per_speed_unit: f64) {
        let elapsed = now.saturating_duration_since(self.last_step).as_secs_f64();
        self.integrate(elapsed, ticks_per_speed_unit);
        self.last_step = now;
    }

    fn take_delta(&mut self) -> (i32, i32) {
        let right = self.right_position.trunc() as i64;
        let left = self.left_position.trunc() as i64;
        let delta = (
            saturate(right - self.right_read),
            saturate(left - self.left_read),
        );
        self.right_read = right;
        self.left_read = left;
        delta
    }
}

fn saturate(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

impl SimulatedRobot {
    /// Create a stationary robot with zeroed counters
    pub fn new(config: &SimulationConfig, limits: SpeedLimits) -> Self {
        log::debug!(
            "SimulatedRobot: seed={}, ir_baseline={}, ticks_per_speed_unit={}",
            config.random_seed,
            config.ir_baseline,
            config.ticks_per_speed_unit
        );
        Self {
            limits,
            ir_baseline: config.ir_baseline,
            ir_noise_stddev: config.ir_noise_stddev,
            ticks_per_speed_unit: config.ticks_per_speed_unit,
            state: Mutex::new(RobotState {
                right_speed: 0,
                left_speed: 0,
                right_position: 0.0,
                left_position: 0.0,
                right_read: 0,
                left_read: 0,
                last_step: Instant::now(),
                noise: SensorNoise::new(config.random_seed),
            }),
        }
    }

    /// Currently latched (right, left) speeds
    pub fn wheel_speeds(&self) -> (i32, i32) {
        let state = self.state.lock();
        (state.right_speed, state.left_speed)
    }
}

impl RobotGateway for SimulatedRobot {
    fn set_wheel_speeds(&self, right: i32, left: i32) -> Result<()> {
        let (right, left) = self.limits.apply(right, left)?;
        let mut state = self.state.lock();
        state.sync(Instant::now(), self.ticks_per_speed_unit);
        state.right_speed = right;
        state.left_speed = left;
        log::trace!("SimulatedRobot: speeds set to ({}, {})", right, left);
        Ok(())
    }

    fn zero_position_counters(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.sync(Instant::now(), self.ticks_per_speed_unit);
        state.right_position = 0.0;
        state.left_position = 0.0;
        state.right_read = 0;
        state.left_read = 0;
        Ok(())
    }

    fn read_infrared(&self) -> Result<[i32; IR_CHANNELS]> {
        let mut state = self.state.lock();
        let mut ir = [0i32; IR_CHANNELS];
        for value in ir.iter_mut() {
            *value = state
                .noise
                .reading(self.ir_baseline, self.ir_noise_stddev, IR_MAX);
        }
        Ok(ir)
    }

    fn read_odometry_delta(&self) -> Result<(i32, i32)> {
        let mut state = self.state.lock();
        state.sync(Instant::now(), self.ticks_per_speed_unit);
        Ok(state.take_delta())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::gateway::SpeedPolicy;

    fn quiet_config() -> SimulationConfig {
        SimulationConfig {
            random_seed: 42,
            ir_baseline: 100,
            ir_noise_stddev: 0.0,
            ticks_per_speed_unit: 1.0,
        }
    }

    fn robot(policy: SpeedPolicy) -> SimulatedRobot {
        SimulatedRobot::new(&quiet_config(), SpeedLimits::new(1000, policy))
    }

    #[test]
    fn test_speeds_clamped_at_gateway() {
        let robot = robot(SpeedPolicy::Clamp);
        robot.set_wheel_speeds(5000, -5000).unwrap();
        assert_eq!(robot.wheel_speeds(), (1000, -1000));
    }

    #[test]
    fn test_speeds_rejected_keep_previous() {
        let robot = robot(SpeedPolicy::Reject);
        robot.set_wheel_speeds(10, 20).unwrap();
        let result = robot.set_wheel_speeds(5000, 0);
        assert!(matches!(result, Err(Error::Gateway(_))));
        assert_eq!(robot.wheel_speeds(), (10, 20));
    }

    #[test]
    fn test_stop_zeroes_speeds() {
        let robot = robot(SpeedPolicy::Clamp);
        robot.set_wheel_speeds(300, 300).unwrap();
        robot.stop().unwrap();
        assert_eq!(robot.wheel_speeds(), (0, 0));
    }

    #[test]
    fn test_odometry_integrates_and_carries_fraction() {
        let robot = robot(SpeedPolicy::Clamp);
        let mut state = robot.state.lock();
        state.right_speed = 10;
        state.left_speed = -5;

        state.integrate(0.75, 1.0);
        // 7.5 right, -3.75 left
        assert_eq!(state.take_delta(), (7, -3));

        state.integrate(0.75, 1.0);
        // 15 right, -7.5 left
        assert_eq!(state.take_delta(), (8, -4));
        assert_eq!(state.take_delta(), (0, 0));
    }

    #[test]
    fn test_zero_resets_counters_and_baseline() {
        let robot = robot(SpeedPolicy::Clamp);
        {
            let mut state = robot.state.lock();
            state.right_speed = 10;
            state.left_speed = 10;
            state.integrate(10.0, 1.0);
            state.right_speed = 0;
            state.left_speed = 0;
        }
        robot.zero_position_counters().unwrap();
        assert_eq!(robot.read_odometry_delta().unwrap(), (0, 0));
    }

    #[test]
    fn test_stationary_robot_has_no_odometry() {
        let robot = robot(SpeedPolicy::Clamp);
        assert_eq!(robot.read_odometry_delta().unwrap(), (0, 0));
    }

    #[test]
    fn test_infrared_baseline_without_noise() {
        let robot = robot(SpeedPolicy::Clamp);
        assert_eq!(robot.read_infrared().unwrap(), [100; IR_CHANNELS]);
    }

    #[test]
    fn test_infrared_clamped_to_adc_range() {
        let mut config = quiet_config();
        config.ir_baseline = 5000;
        let high = SimulatedRobot::new(&config, SpeedLimits::new(1, SpeedPolicy::Clamp));
        assert_eq!(high.read_infrared().unwrap(), [IR_MAX; IR_CHANNELS]);

        config.ir_baseline = 0;
        config.ir_noise_stddev = 50.0;
        let noisy = SimulatedRobot::new(&config, SpeedLimits::new(1, SpeedPolicy::Clamp));
        for _ in 0..20 {
            assert!(noisy.read_infrared().unwrap().iter().all(|v| *v >= 0));
        }
    }
}
