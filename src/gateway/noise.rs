//! Seeded sensor noise for the simulated robot

use rand::prelude::*;
use rand::rngs::SmallRng;
use rand_distr::StandardNormal;

/// Gaussian perturbation of integer sensor readings
///
/// Seed 0 draws from OS entropy; any other seed replays the same sequence.
#[derive(Clone)]
pub struct SensorNoise {
    rng: SmallRng,
}

impl SensorNoise {
    pub fn new(seed: u64) -> Self {
        let rng = if seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(seed)
        };
        Self { rng }
    }

    /// Zero-mean sample with the given standard deviation
    #[inline]
    fn sample(&mut self, stddev: f32) -> f32 {
        if stddev == 0.0 {
            return 0.0;
        }
        let n: f32 = self.rng.sample(StandardNormal);
        n * stddev
    }

    /// `base` plus rounded noise, kept inside `0..=max`
    pub fn reading(&mut self, base: i32, stddev: f32, max: i32) -> i32 {
        let noisy = base as f32 + self.sample(stddev);
        (noisy.round() as i32).clamp(0, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_readings() {
        let mut a = SensorNoise::new(7);
        let mut b = SensorNoise::new(7);
        for _ in 0..50 {
            assert_eq!(a.reading(500, 30.0, 4095), b.reading(500, 30.0, 4095));
        }
    }

    #[test]
    fn test_quiet_reading_is_exact() {
        let mut noise = SensorNoise::new(7);
        assert_eq!(noise.reading(123, 0.0, 4095), 123);
        assert_eq!(noise.reading(-5, 0.0, 4095), 0);
        assert_eq!(noise.reading(9000, 0.0, 4095), 4095);
    }

    #[test]
    fn test_noisy_readings_stay_in_range() {
        let mut noise = SensorNoise::new(11);
        for _ in 0..500 {
            let v = noise.reading(10, 100.0, 4095);
            assert!((0..=4095).contains(&v));
        }
    }
}
