//! Error types for filter construction and initialization.
//!
//! Only shape/validity problems surface as errors; runtime conditions such
//! as degenerate weights or out-of-range deltas are handled in place by the
//! engine (skip, substitute, warn) and never unwind through the iteration.

use std::fmt;

/// Errors raised when constructing or initializing a [`crate::ParticleFilter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `alpha` must carry four coefficients per robot.
    AlphaLength {
        /// Required length (`4 * num_robots`)
        expected: usize,
        /// Provided length
        actual: usize,
    },

    /// The custom init box must carry a `[lo, hi]` pair per state dimension.
    RandBoxLength {
        /// Required length (`2 * (3R + 3T)`)
        expected: usize,
        /// Provided length
        actual: usize,
    },

    /// The initial pose list must carry one `[x, y, theta]` triple per robot.
    PosInitLength {
        /// Required length (`3 * num_robots`)
        expected: usize,
        /// Provided length
        actual: usize,
    },

    /// The used-robots bitmap must name every robot.
    RobotsUsedLength {
        /// Required length (`num_robots`)
        expected: usize,
        /// Provided length
        actual: usize,
    },

    /// The landmark map must match the declared landmark count.
    LandmarksLength {
        /// Declared count
        expected: usize,
        /// Map entries provided
        actual: usize,
    },

    /// The filter needs at least one particle.
    NoParticles,

    /// The main robot id must be 1-based, in range, and marked used.
    MainRobotId {
        /// Provided id (1-based)
        given: usize,
        /// Number of robots
        num_robots: usize,
    },

    /// Exactly one target is supported.
    TargetCount {
        /// Provided count
        given: usize,
    },

    /// Robot state blocks are three-dimensional (`x, y, theta`).
    StatesPerRobot {
        /// Provided dimension
        given: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::AlphaLength { expected, actual } => {
                write!(f, "alpha must have {} elements (4 per robot), got {}", expected, actual)
            }
            ConfigError::RandBoxLength { expected, actual } => {
                write!(f, "init box must have {} bounds (2 per dimension), got {}", expected, actual)
            }
            ConfigError::PosInitLength { expected, actual } => {
                write!(f, "initial poses must have {} values (3 per robot), got {}", expected, actual)
            }
            ConfigError::RobotsUsedLength { expected, actual } => {
                write!(f, "robots_used must have {} entries, got {}", expected, actual)
            }
            ConfigError::LandmarksLength { expected, actual } => {
                write!(f, "landmark map declares {} landmarks but provides {}", expected, actual)
            }
            ConfigError::NoParticles => write!(f, "particle count must be positive"),
            ConfigError::MainRobotId { given, num_robots } => {
                write!(
                    f,
                    "main robot id {} must be in 1..={} and marked used",
                    given, num_robots
                )
            }
            ConfigError::TargetCount { given } => {
                write!(f, "exactly one target is supported, got {}", given)
            }
            ConfigError::StatesPerRobot { given } => {
                write!(f, "robot state blocks must be 3-dimensional, got {}", given)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
