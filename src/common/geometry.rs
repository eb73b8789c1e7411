//! Planar rigid-body poses and frame transforms.
//!
//! Robot poses live in SE(2): a translation plus a heading. Odometry
//! increments are expressed in the robot's own body frame, so propagating a
//! pose is right-composition with the increment. All heading math goes
//! through rotation matrices / `atan2`, which keeps it wrap-safe near the
//! `±pi` seam.

use nalgebra::{Isometry2, Vector2};

/// A 2-D pose: position plus heading, in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose2 {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Pose2 {
    /// Create a pose from its components.
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    /// Convert to an [`Isometry2`].
    #[inline]
    pub fn to_isometry(&self) -> Isometry2<f64> {
        Isometry2::new(Vector2::new(self.x, self.y), self.theta)
    }

    /// Build a pose from an [`Isometry2`]. The heading is recovered through
    /// the rotation matrix, so it lands in `(-pi, pi]`.
    #[inline]
    pub fn from_isometry(iso: &Isometry2<f64>) -> Self {
        Self {
            x: iso.translation.vector.x,
            y: iso.translation.vector.y,
            theta: iso.rotation.angle(),
        }
    }

    /// Right-compose with a body-frame increment: `self * delta`.
    ///
    /// This is the odometry propagation step: `delta` is the motion measured
    /// in the frame of the pose being advanced.
    pub fn compose(&self, delta: &Pose2) -> Pose2 {
        Pose2::from_isometry(&(self.to_isometry() * delta.to_isometry()))
    }

    /// The inverse transform, such that `p.compose(&p.inverse())` is the
    /// identity up to floating-point error.
    pub fn inverse(&self) -> Pose2 {
        Pose2::from_isometry(&self.to_isometry().inverse())
    }

    /// Map a point expressed in this pose's body frame into the world frame.
    pub fn transform_to_world(&self, p: Vector2<f64>) -> Vector2<f64> {
        let (sin, cos) = self.theta.sin_cos();
        Vector2::new(
            self.x + p.x * cos - p.y * sin,
            self.y + p.x * sin + p.y * cos,
        )
    }

    /// Map a world-frame point into this pose's body frame.
    pub fn transform_to_body(&self, p: Vector2<f64>) -> Vector2<f64> {
        let (sin, cos) = self.theta.sin_cos();
        let dx = p.x - self.x;
        let dy = p.y - self.y;
        Vector2::new(dx * cos + dy * sin, -dx * sin + dy * cos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_compose_identity() {
        let p = Pose2::new(1.0, -2.0, 0.7);
        let q = p.compose(&Pose2::new(0.0, 0.0, 0.0));
        assert!(approx_eq(q.x, p.x, 1e-12));
        assert!(approx_eq(q.y, p.y, 1e-12));
        assert!(approx_eq(q.theta, p.theta, 1e-12));
    }

    #[test]
    fn test_compose_forward_motion() {
        // Facing +y, moving 1 m forward in the body frame
        let p = Pose2::new(0.0, 0.0, FRAC_PI_2);
        let q = p.compose(&Pose2::new(1.0, 0.0, 0.0));
        assert!(approx_eq(q.x, 0.0, 1e-12));
        assert!(approx_eq(q.y, 1.0, 1e-12));
        assert!(approx_eq(q.theta, FRAC_PI_2, 1e-12));
    }

    #[test]
    fn test_compose_inverse_roundtrip() {
        let p = Pose2::new(2.5, -1.5, 2.9);
        let delta = Pose2::new(0.3, -0.1, 0.4);
        let q = p.compose(&delta).compose(&delta.inverse());
        assert!(approx_eq(q.x, p.x, 1e-9));
        assert!(approx_eq(q.y, p.y, 1e-9));
        assert!(approx_eq(q.theta, p.theta, 1e-9));
    }

    #[test]
    fn test_heading_wraps() {
        let p = Pose2::new(0.0, 0.0, PI - 0.1);
        let q = p.compose(&Pose2::new(0.0, 0.0, 0.2));
        // Wraps past +pi to the negative side
        assert!(approx_eq(q.theta, -PI + 0.1, 1e-12));
    }

    #[test]
    fn test_world_body_roundtrip() {
        let p = Pose2::new(1.0, 2.0, 0.6);
        let world = Vector2::new(-0.5, 3.0);
        let back = p.transform_to_world(p.transform_to_body(world));
        assert!(approx_eq(back.x, world.x, 1e-12));
        assert!(approx_eq(back.y, world.y, 1e-12));
    }

    #[test]
    fn test_body_frame_observation() {
        // Robot at (1, 0) facing +x; a point at (2, 0) sits 1 m straight ahead
        let p = Pose2::new(1.0, 0.0, 0.0);
        let body = p.transform_to_body(Vector2::new(2.0, 0.0));
        assert!(approx_eq(body.x, 1.0, 1e-12));
        assert!(approx_eq(body.y, 0.0, 1e-12));
    }
}
