//! Posterior state: per-robot pose beliefs and the target belief.

use nalgebra::Vector3;

use crate::common::geometry::Pose2;

use super::config::MAX_ESTIMATOR_STACK_SIZE;
use super::observations::TargetObservation;
use super::velocity::TargetVelocityEstimator;

/// The filter's belief about one robot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RobotEstimate {
    /// Weighted-mean pose.
    pub pose: Pose2,
    /// Mean landmark-likelihood factor from the robot's latest fusion; 1
    /// when the robot saw no landmarks, near 0 when its observations
    /// contradict the particle cloud.
    pub conf: f64,
}

/// The filter's belief about the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetEstimate {
    /// Weighted-mean world-frame position, meters.
    pub pos: Vector3<f64>,
    /// Regressed world-frame velocity, m/s; zero until the velocity ring
    /// has filled.
    pub vel: Vector3<f64>,
}

impl Default for TargetEstimate {
    fn default() -> Self {
        Self { pos: Vector3::zeros(), vel: Vector3::zeros() }
    }
}

/// Aggregate posterior carried by the engine and exposed to sinks.
#[derive(Debug, Clone)]
pub struct FilterState {
    /// Per-robot beliefs, indexed by robot.
    pub robots: Vec<RobotEstimate>,
    /// Target belief.
    pub target: TargetEstimate,
    /// Velocity regression ring.
    pub velocity_estimator: TargetVelocityEstimator,
}

impl FilterState {
    /// Create a zeroed state for `num_robots` robots.
    pub fn new(num_robots: usize) -> Self {
        Self {
            robots: vec![RobotEstimate::default(); num_robots],
            target: TargetEstimate::default(),
            velocity_estimator: TargetVelocityEstimator::new(MAX_ESTIMATOR_STACK_SIZE),
        }
    }

    /// Feed the velocity ring from the current target observations and, once
    /// it is full, refresh the target velocity estimate.
    pub fn update_target_velocity(&mut self, stamp: f64, observations: &[TargetObservation]) {
        self.velocity_estimator.insert(stamp, observations, &self.robots);

        if self.velocity_estimator.is_ready() {
            self.target.vel = Vector3::new(
                self.velocity_estimator.estimate(0),
                self.velocity_estimator.estimate(1),
                self.velocity_estimator.estimate(2),
            );
        }
    }
}
