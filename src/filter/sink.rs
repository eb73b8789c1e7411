//! Per-iteration publication hook.
//!
//! Downstream publication (telemetry, visualization, transport) attaches to
//! the engine through [`IterationSink`]: after each completed iteration the
//! engine hands the sink a read-only [`IterationView`] of the posterior.
//! The default [`NoOpSink`] keeps the engine free of any transport
//! dependency; [`LogSink`] emits a structured line through the `log` facade.

use crate::common::stats::std_dev;

use super::matrix::ParticleMatrix;
use super::state::{RobotEstimate, TargetEstimate};

/// Read-only snapshot of one completed iteration.
#[derive(Debug)]
pub struct IterationView<'a> {
    /// The full particle matrix, post-resample.
    pub particles: &'a ParticleMatrix,
    /// Per-robot estimates with confidence.
    pub robots: &'a [RobotEstimate],
    /// Target estimate.
    pub target: &'a TargetEstimate,
    /// Sum of the master weights before the post-resample reset.
    pub weight_sum: f64,
    /// Index of the just-completed iteration, starting at 1.
    pub iteration: u64,
}

/// Receiver for per-iteration snapshots.
///
/// The default implementation ignores the callback, so implementors only
/// override what they need.
pub trait IterationSink: Send {
    /// Called once per completed iteration, while the engine lock is held;
    /// implementations should copy what they need and return quickly.
    fn on_iteration(&mut self, _view: IterationView<'_>) {}
}

/// The default sink: does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSink;

impl IterationSink for NoOpSink {}

/// A sink that reports estimates and particle spread through `log`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl IterationSink for LogSink {
    fn on_iteration(&mut self, view: IterationView<'_>) {
        for (r, robot) in view.robots.iter().enumerate() {
            let o = view.particles.robot_offset(r);
            log::debug!(
                "iter {} robot {}: pose=({:.3}, {:.3}, {:.3}) conf={:.4} spread=({:.3}, {:.3})",
                view.iteration,
                r,
                robot.pose.x,
                robot.pose.y,
                robot.pose.theta,
                robot.conf,
                std_dev(view.particles.column(o)),
                std_dev(view.particles.column(o + 1)),
            );
        }
        log::debug!(
            "iter {} target: pos=({:.3}, {:.3}, {:.3}) vel=({:.3}, {:.3}, {:.3}) weight_sum={:.3e}",
            view.iteration,
            view.target.pos.x,
            view.target.pos.y,
            view.target.pos.z,
            view.target.vel.x,
            view.target.vel.y,
            view.target.vel.z,
            view.weight_sum,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::state::FilterState;

    struct CountingSink {
        calls: usize,
        last_iteration: u64,
    }

    impl IterationSink for CountingSink {
        fn on_iteration(&mut self, view: IterationView<'_>) {
            self.calls += 1;
            self.last_iteration = view.iteration;
        }
    }

    #[test]
    fn test_custom_sink_receives_views() {
        let particles = ParticleMatrix::new(1, 1, 10);
        let state = FilterState::new(1);
        let mut sink = CountingSink { calls: 0, last_iteration: 0 };

        for iteration in 1..=3 {
            sink.on_iteration(IterationView {
                particles: &particles,
                robots: &state.robots,
                target: &state.target,
                weight_sum: 1.0,
                iteration,
            });
        }

        assert_eq!(sink.calls, 3);
        assert_eq!(sink.last_iteration, 3);
    }

    #[test]
    fn test_noop_sink_is_callable() {
        let particles = ParticleMatrix::new(1, 1, 1);
        let state = FilterState::new(1);
        NoOpSink.on_iteration(IterationView {
            particles: &particles,
            robots: &state.robots,
            target: &state.target,
            weight_sum: 0.0,
            iteration: 1,
        });
    }
}
