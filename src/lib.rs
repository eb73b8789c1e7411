/*!
# Cooptrack - cooperative multi-robot localization and target tracking

A joint Monte-Carlo estimator for a team of mobile robots and one moving
target. A single particle filter carries every robot's planar pose and the
target's 3-D position in one column-major matrix; robots feed odometry,
landmark sightings, and target sightings asynchronously, and the designated
main robot's target callback drives each fuse / resample / estimate
iteration.

## Features

- Joint state: per-robot pose blocks, a target block, one weight column
- Asynchronous per-robot prediction with exact body-frame composition
- Landmark fusion with per-robot likelihood factors and confidence
- Target fusion plus regression-based velocity estimation
- Elitism-preserving multinomial resampler
- Runtime-reconfigurable knobs and a pluggable publication sink

## Modules

- [`filter`] - the engine and its supporting types
- [`common`] - low-level utilities (statistics, planar geometry)

## Example

```rust
use cooptrack::{Landmark, Odometry, ParticleFilter, PfInitData, TargetObservation};

let data = PfInitData::new(
    1,                                    // main robot id (1-based)
    1000,                                 // particles
    2,                                    // robots
    vec![true, true],
    vec![Landmark::new(0, 2.0, 0.0)],
)
.with_seed(42);

let mut pf = ParticleFilter::new(data).unwrap();
pf.init();

// Producers feed data; the main robot's target-done call runs an iteration.
pf.predict(0, Odometry::new(0.1, 0.0, 0.01), 0.033);
pf.save_target_observation(0, TargetObservation {
    found: true,
    x: 1.0,
    y: 0.0,
    cov_xx: 0.05,
    cov_yy: 0.05,
    ..Default::default()
});
pf.measurements_done_target(0);

assert_eq!(pf.num_iterations(), 1);
let state = pf.state();
println!("robot 0 at {:?}", state.robots[0].pose);
```
*/

// ============================================================================
// Core modules
// ============================================================================

/// Low-level utilities (statistics kernels, planar geometry)
pub mod common;

/// The particle filter engine and its supporting types
pub mod filter;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// Engine and lifecycle
pub use filter::core::ParticleFilter;
pub use filter::handle::PfHandle;

// Configuration
pub use filter::config::{Landmark, PfInitData, RuntimeKnobs};
pub use filter::config::{
    MAX_ESTIMATOR_STACK_SIZE, MIN_WEIGHTSUM, RESAMPLE_START_AT, TARGET_ITERATION_TIME_DEFAULT,
    TARGET_ITERATION_TIME_MAX, TARGET_RAND_STDDEV,
};

// Inputs
pub use filter::observations::{LandmarkObservation, Odometry, TargetObservation};

// Outputs
pub use filter::matrix::ParticleMatrix;
pub use filter::sink::{IterationSink, IterationView, LogSink, NoOpSink};
pub use filter::state::{FilterState, RobotEstimate, TargetEstimate};

// Errors
pub use filter::errors::ConfigError;

// Geometry
pub use common::geometry::Pose2;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
