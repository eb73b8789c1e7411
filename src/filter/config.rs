//! Filter configuration: construction data, runtime knobs, and constants.

use super::errors::ConfigError;

/// Number of state dimensions per robot (`x, y, theta`).
pub const STATES_PER_ROBOT: usize = 3;

/// Number of state dimensions per target (`x, y, z`).
pub const STATES_PER_TARGET: usize = 3;

/// Capacity of the target velocity regression ring.
pub const MAX_ESTIMATOR_STACK_SIZE: usize = 15;

/// Standard deviation of the random target acceleration, m/s^2.
pub const TARGET_RAND_STDDEV: f64 = 20.0;

/// Default fraction of top-weighted particles copied verbatim on resample.
pub const RESAMPLE_START_AT: f64 = 0.5;

/// Below this weight sum the resampling step is skipped.
pub const MIN_WEIGHTSUM: f64 = 1e-10;

/// Fallback target iteration interval, seconds (~30 Hz).
pub const TARGET_ITERATION_TIME_DEFAULT: f64 = 0.0333;

/// Measured target iteration intervals above this are considered bogus.
pub const TARGET_ITERATION_TIME_MAX: f64 = 1.0;

/// Per-robot odometry noise coefficients repeated when `alpha` is omitted.
pub const DEFAULT_ALPHA: [f64; 4] = [0.015, 0.1, 0.5, 0.001];

/// Default field bounds used by [`crate::ParticleFilter::init`]: x range.
pub const DEFAULT_FIELD_X: (f64, f64) = (0.0, 6.0);

/// Default field bounds used by [`crate::ParticleFilter::init`]: y range.
pub const DEFAULT_FIELD_Y: (f64, f64) = (-4.5, 4.5);

/// A fixed, known landmark on the field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    /// Serial id as reported by the landmark sensor.
    pub id: u32,
    /// World-frame x, meters.
    pub x: f64,
    /// World-frame y, meters.
    pub y: f64,
}

impl Landmark {
    /// Create a landmark.
    pub fn new(id: u32, x: f64, y: f64) -> Self {
        Self { id, x, y }
    }
}

/// Everything needed to construct a [`crate::ParticleFilter`].
///
/// `main_robot_id` is 1-based, matching the robot naming used on the wire;
/// all other robot references in the crate are 0-based indices.
#[derive(Debug, Clone)]
pub struct PfInitData {
    /// 1-based id of the robot whose target callback drives iterations.
    pub main_robot_id: usize,
    /// Number of particles `P`.
    pub num_particles: usize,
    /// Number of tracked targets (must be 1).
    pub num_targets: usize,
    /// State dimensions per robot (must be 3).
    pub states_per_robot: usize,
    /// Number of robots `R`.
    pub num_robots: usize,
    /// Number of landmarks `L`.
    pub num_landmarks: usize,
    /// Which robots participate; disabled robots are never mutated.
    pub robots_used: Vec<bool>,
    /// The known landmark map, read-only after construction.
    pub landmarks_map: Vec<Landmark>,
    /// Odometry noise coefficients, `4 * R` values; defaults applied if `None`.
    pub alpha: Option<Vec<f64>>,
    /// RNG seed; entropy-seeded when `None`.
    pub seed: Option<u64>,
}

impl PfInitData {
    /// Convenience constructor filling in the fixed dimensions.
    pub fn new(
        main_robot_id: usize,
        num_particles: usize,
        num_robots: usize,
        robots_used: Vec<bool>,
        landmarks_map: Vec<Landmark>,
    ) -> Self {
        let num_landmarks = landmarks_map.len();
        Self {
            main_robot_id,
            num_particles,
            num_targets: 1,
            states_per_robot: STATES_PER_ROBOT,
            num_robots,
            num_landmarks,
            robots_used,
            landmarks_map,
            alpha: None,
            seed: None,
        }
    }

    /// Set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the odometry noise coefficients.
    pub fn with_alpha(mut self, alpha: Vec<f64>) -> Self {
        self.alpha = Some(alpha);
        self
    }

    /// Validate shapes and resolve defaults; returns the effective alpha.
    pub(crate) fn validate(&self) -> Result<Vec<f64>, ConfigError> {
        if self.num_particles == 0 {
            return Err(ConfigError::NoParticles);
        }
        if self.num_targets != 1 {
            return Err(ConfigError::TargetCount { given: self.num_targets });
        }
        if self.states_per_robot != STATES_PER_ROBOT {
            return Err(ConfigError::StatesPerRobot { given: self.states_per_robot });
        }
        if self.robots_used.len() != self.num_robots {
            return Err(ConfigError::RobotsUsedLength {
                expected: self.num_robots,
                actual: self.robots_used.len(),
            });
        }
        if self.landmarks_map.len() != self.num_landmarks {
            return Err(ConfigError::LandmarksLength {
                expected: self.num_landmarks,
                actual: self.landmarks_map.len(),
            });
        }

        let in_range = self.main_robot_id >= 1 && self.main_robot_id <= self.num_robots;
        if !in_range || !self.robots_used[self.main_robot_id - 1] {
            return Err(ConfigError::MainRobotId {
                given: self.main_robot_id,
                num_robots: self.num_robots,
            });
        }

        let alpha = match &self.alpha {
            Some(a) => {
                if a.len() != 4 * self.num_robots {
                    return Err(ConfigError::AlphaLength {
                        expected: 4 * self.num_robots,
                        actual: a.len(),
                    });
                }
                a.clone()
            }
            None => DEFAULT_ALPHA
                .iter()
                .cycle()
                .take(4 * self.num_robots)
                .copied()
                .collect(),
        };

        Ok(alpha)
    }
}

/// Runtime-mutable knobs, applied atomically at the next iteration boundary.
///
/// `None` fields leave the current value untouched, so a reconfiguration can
/// update a single knob without restating the rest.
#[derive(Debug, Clone, Default)]
pub struct RuntimeKnobs {
    /// Replacement odometry noise coefficients (`4 * R` values).
    pub alpha: Option<Vec<f64>>,
    /// Replacement elitism fraction in `[0, 1]`.
    pub resample_start_at: Option<f64>,
    /// Replacement fallback iteration interval, seconds.
    pub target_iteration_time_default: Option<f64>,
    /// Enable or disable the publication hook.
    pub publish: Option<bool>,
}

impl RuntimeKnobs {
    /// True when no knob is set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.alpha.is_none()
            && self.resample_start_at.is_none()
            && self.target_iteration_time_default.is_none()
            && self.publish.is_none()
    }
}
