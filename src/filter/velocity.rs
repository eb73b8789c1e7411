//! Regression-based target velocity estimation.
//!
//! The estimator keeps a bounded ring of world-frame target position samples
//! `(t, x, y, z)` and, once the ring is full, reports per-axis velocity as
//! the slope of position over time. The slope function is pluggable; the
//! default is the least-squares slope from [`crate::common::stats`].

use crate::common::geometry::Pose2;
use crate::common::stats::linear_regression_slope;

use super::observations::TargetObservation;
use super::state::RobotEstimate;

/// Body-frame components beyond this are considered spurious sightings and
/// never enter the ring.
const SANITY_RANGE: f64 = 4.0;

/// Slope estimator signature: `(times, values) -> slope`.
pub type SlopeEstimator = fn(&[f64], &[f64]) -> f64;

/// Bounded ring of target position samples with a pluggable slope estimator.
#[derive(Debug, Clone)]
pub struct TargetVelocityEstimator {
    times: Vec<f64>,
    axes: [Vec<f64>; 3],
    capacity: usize,
    origin: Option<f64>,
    slope: SlopeEstimator,
}

impl TargetVelocityEstimator {
    /// Create an empty estimator holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self::with_slope(capacity, linear_regression_slope)
    }

    /// Create an estimator with a custom slope function.
    pub fn with_slope(capacity: usize, slope: SlopeEstimator) -> Self {
        Self {
            times: Vec::with_capacity(capacity),
            axes: [
                Vec::with_capacity(capacity),
                Vec::with_capacity(capacity),
                Vec::with_capacity(capacity),
            ],
            capacity,
            origin: None,
            slope,
        }
    }

    /// Number of buffered samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// True when no sample has been inserted yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// True once the ring is full and slopes are meaningful.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.times.len() == self.capacity
    }

    /// Insert one world-frame sample derived from the current observations.
    ///
    /// Among robots whose latest target observation is `found` and whose
    /// body-frame components pass the sanity range, the sighting from the
    /// highest-confidence robot is transformed through that robot's
    /// posterior pose. When no robot qualifies the sample is skipped.
    /// Returns whether a sample was inserted.
    pub fn insert(
        &mut self,
        stamp: f64,
        observations: &[TargetObservation],
        robots: &[RobotEstimate],
    ) -> bool {
        let mut chosen: Option<usize> = None;
        let mut max_conf = 0.0;

        for (r, obs) in observations.iter().enumerate() {
            if !obs.found {
                continue;
            }
            if obs.x < SANITY_RANGE && obs.y < SANITY_RANGE && robots[r].conf > max_conf {
                chosen = Some(r);
                max_conf = robots[r].conf;
            }
        }

        let Some(r) = chosen else {
            return false;
        };

        let obs = &observations[r];
        let pose: Pose2 = robots[r].pose;
        let world = pose.transform_to_world(nalgebra::Vector2::new(obs.x, obs.y));

        let origin = *self.origin.get_or_insert(stamp);
        self.push(stamp - origin, world.x, world.y, obs.z);
        true
    }

    fn push(&mut self, t: f64, x: f64, y: f64, z: f64) {
        self.times.push(t);
        self.axes[0].push(x);
        self.axes[1].push(y);
        self.axes[2].push(z);

        if self.times.len() > self.capacity {
            self.times.remove(0);
            for axis in &mut self.axes {
                axis.remove(0);
            }
        }
    }

    /// Velocity along `axis` (0 = x, 1 = y, 2 = z); 0 until the ring fills.
    pub fn estimate(&self, axis: usize) -> f64 {
        if !self.is_ready() {
            return 0.0;
        }
        (self.slope)(&self.times, &self.axes[axis])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found_at(x: f64, y: f64, z: f64) -> TargetObservation {
        TargetObservation { found: true, x, y, z, ..Default::default() }
    }

    fn robot_at(x: f64, y: f64, theta: f64, conf: f64) -> RobotEstimate {
        RobotEstimate { pose: Pose2::new(x, y, theta), conf }
    }

    #[test]
    fn test_skips_when_nothing_found() {
        let mut est = TargetVelocityEstimator::new(3);
        let inserted = est.insert(
            0.0,
            &[TargetObservation::default()],
            &[robot_at(0.0, 0.0, 0.0, 1.0)],
        );
        assert!(!inserted);
        assert!(est.is_empty());
    }

    #[test]
    fn test_skips_out_of_range_sightings() {
        let mut est = TargetVelocityEstimator::new(3);
        let inserted = est.insert(
            0.0,
            &[found_at(5.0, 0.0, 0.0)],
            &[robot_at(0.0, 0.0, 0.0, 1.0)],
        );
        assert!(!inserted);
    }

    #[test]
    fn test_picks_highest_confidence_robot() {
        let mut est = TargetVelocityEstimator::new(3);
        // Robot 1 is more confident; its pose places the target at x = 3
        est.insert(
            0.0,
            &[found_at(1.0, 0.0, 0.0), found_at(1.0, 0.0, 0.0)],
            &[robot_at(0.0, 0.0, 0.0, 0.2), robot_at(2.0, 0.0, 0.0, 0.8)],
        );
        assert_eq!(est.len(), 1);
        assert!((est.axes[0][0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_conf_robots_never_qualify() {
        let mut est = TargetVelocityEstimator::new(3);
        est.insert(0.0, &[found_at(1.0, 0.0, 0.0)], &[robot_at(0.0, 0.0, 0.0, 0.0)]);
        assert!(est.is_empty());
    }

    #[test]
    fn test_ring_is_bounded_and_time_rebased() {
        let mut est = TargetVelocityEstimator::new(2);
        let robots = [robot_at(0.0, 0.0, 0.0, 1.0)];
        est.insert(10.0, &[found_at(0.0, 0.0, 0.0)], &robots);
        est.insert(11.0, &[found_at(1.0, 0.0, 0.0)], &robots);
        est.insert(12.0, &[found_at(2.0, 0.0, 0.0)], &robots);
        assert_eq!(est.len(), 2);
        // Oldest sample dropped; times measured from the first insertion
        assert_eq!(est.times, vec![1.0, 2.0]);
    }

    #[test]
    fn test_velocity_recovered_from_linear_motion() {
        let mut est = TargetVelocityEstimator::new(5);
        let robots = [robot_at(0.0, 0.0, 0.0, 1.0)];
        for k in 0..5 {
            let t = k as f64 * 0.1;
            est.insert(t, &[found_at(1.0 + 2.0 * t, 0.5, 0.3)], &robots);
            if k < 4 {
                assert_eq!(est.estimate(0), 0.0);
            }
        }
        assert!(est.is_ready());
        assert!((est.estimate(0) - 2.0).abs() < 1e-9);
        assert!(est.estimate(1).abs() < 1e-9);
        assert!(est.estimate(2).abs() < 1e-9);
    }
}
