//! The particle filter engine.
//!
//! A single joint filter estimates every robot's planar pose and the 3-D
//! position of one moving target. The state is a column-major particle
//! matrix ([`ParticleMatrix`]); producers feed odometry and observations
//! asynchronously, and the main robot's target-done notification is the
//! barrier that drives one iteration:
//!
//! ```text
//! predict_target -> fuse_robots -> fuse_target -> resample -> estimate
//! ```
//!
//! Landmark and target likelihoods are axis-aligned Gaussians in the
//! observing robot's body frame; resampling keeps the top-weighted fraction
//! of particles verbatim and fills the rest by inverse-CDF draws; estimates
//! are weighted means over the pre-reset weights, with target velocity
//! regressed from a bounded ring of world-frame sightings.
//!
//! Every public entry point is a complete, non-blocking operation. Callers
//! that share the engine across threads wrap it in
//! [`PfHandle`](super::handle::PfHandle), which serializes all calls behind
//! one coarse lock.

use std::f64::consts::PI;
use std::time::Instant;

use nalgebra::{Vector2, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::common::geometry::Pose2;
use crate::common::stats::{argsort_desc, sample_gaussian, sample_uniform, weighted_mean};

use super::config::{
    Landmark, PfInitData, RuntimeKnobs, DEFAULT_FIELD_X, DEFAULT_FIELD_Y, MIN_WEIGHTSUM,
    RESAMPLE_START_AT, STATES_PER_ROBOT, STATES_PER_TARGET, TARGET_ITERATION_TIME_DEFAULT,
    TARGET_ITERATION_TIME_MAX, TARGET_RAND_STDDEV,
};
use super::errors::ConfigError;
use super::matrix::ParticleMatrix;
use super::observations::{LandmarkObservation, ObservationBuffers, Odometry, TargetObservation};
use super::sink::{IterationSink, IterationView, NoOpSink};
use super::state::FilterState;

/// Joint Monte-Carlo estimator for a robot team and one tracked target.
///
/// Constructed once from [`PfInitData`]; dimensions are fixed for the life
/// of the instance. See the module docs for the iteration structure.
pub struct ParticleFilter {
    // Fixed configuration
    main_robot: usize,
    num_particles: usize,
    num_robots: usize,
    num_landmarks: usize,
    robots_used: Vec<bool>,
    landmarks: Vec<Landmark>,

    // Particle storage and per-robot likelihood factors
    particles: ParticleMatrix,
    weight_components: Vec<Vec<f64>>,
    estimator_weights: Vec<f64>,

    // Inputs
    buffers: ObservationBuffers,
    started: Vec<bool>,

    // Posterior
    state: FilterState,

    // Randomness
    rng: StdRng,

    // Runtime knobs (current values plus a pending set applied at the
    // iteration boundary)
    alpha: Vec<f64>,
    resample_start_at: f64,
    target_dt_default: f64,
    publish: bool,
    pending_knobs: Option<RuntimeKnobs>,

    // Iteration clock
    target_dt: f64,
    last_target_stamp: Option<f64>,
    clock: f64,
    iteration: u64,
    last_weight_sum: f64,

    initialized: bool,
    sink: Box<dyn IterationSink>,
}

impl ParticleFilter {
    /// Build an engine from validated init data.
    pub fn new(data: PfInitData) -> Result<Self, ConfigError> {
        let alpha = data.validate()?;

        let rng = match data.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let particles = ParticleMatrix::new(data.num_robots, data.num_targets, data.num_particles);
        log::info!(
            "particle filter: {} robots ({} used), {} landmarks, {} particles, {} subsets",
            data.num_robots,
            data.robots_used.iter().filter(|&&u| u).count(),
            data.num_landmarks,
            data.num_particles,
            particles.num_subsets(),
        );

        Ok(Self {
            main_robot: data.main_robot_id - 1,
            num_particles: data.num_particles,
            num_robots: data.num_robots,
            num_landmarks: data.num_landmarks,
            robots_used: data.robots_used,
            landmarks: data.landmarks_map,
            weight_components: vec![vec![1.0; data.num_particles]; data.num_robots],
            estimator_weights: vec![0.0; data.num_particles],
            buffers: ObservationBuffers::new(data.num_robots, data.num_landmarks),
            started: vec![false; data.num_robots],
            state: FilterState::new(data.num_robots),
            rng,
            alpha,
            resample_start_at: RESAMPLE_START_AT,
            target_dt_default: TARGET_ITERATION_TIME_DEFAULT,
            publish: true,
            pending_knobs: None,
            target_dt: TARGET_ITERATION_TIME_DEFAULT,
            last_target_stamp: None,
            clock: 0.0,
            iteration: 0,
            last_weight_sum: 0.0,
            initialized: false,
            sink: Box::new(NoOpSink),
            particles,
        })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Initialize with the default per-robot boxes: the field bounds for
    /// position and `(-pi, pi]` for heading, targets likewise. Weights are
    /// set uniform. The first successful init is final.
    pub fn init(&mut self) {
        if self.initialized {
            log::debug!("init: already initialized, ignoring");
            return;
        }

        let state_dims = self.particles.weight_index();
        for subset in 0..state_dims {
            let (lo, hi) = match subset % STATES_PER_ROBOT {
                0 => DEFAULT_FIELD_X,
                1 => DEFAULT_FIELD_Y,
                _ => (-PI, PI),
            };
            for p in 0..self.num_particles {
                let v = sample_uniform(&mut self.rng, lo, hi);
                self.particles.column_mut(subset)[p] = v;
            }
        }

        self.particles.reset_weights(1.0 / self.num_particles as f64);
        self.initialized = true;
        log::info!("initialized over default field bounds");
    }

    /// Initialize over caller-supplied bounds.
    ///
    /// `rand_box` holds a `[lo, hi]` pair per state dimension (robot blocks
    /// first, then the target block); `pos_init` holds one `[x, y, theta]`
    /// triple per robot and seeds the initial pose estimates. The first
    /// successful init is final.
    pub fn init_custom(&mut self, rand_box: &[f64], pos_init: &[f64]) -> Result<(), ConfigError> {
        if self.initialized {
            log::debug!("init_custom: already initialized, ignoring");
            return Ok(());
        }

        let state_dims = self.particles.weight_index();
        if rand_box.len() != 2 * state_dims {
            return Err(ConfigError::RandBoxLength {
                expected: 2 * state_dims,
                actual: rand_box.len(),
            });
        }
        if pos_init.len() != STATES_PER_ROBOT * self.num_robots {
            return Err(ConfigError::PosInitLength {
                expected: STATES_PER_ROBOT * self.num_robots,
                actual: pos_init.len(),
            });
        }

        for subset in 0..state_dims {
            let lo = rand_box[2 * subset];
            let hi = rand_box[2 * subset + 1];
            for p in 0..self.num_particles {
                let v = sample_uniform(&mut self.rng, lo, hi);
                self.particles.column_mut(subset)[p] = v;
            }
        }

        self.particles.reset_weights(1.0 / self.num_particles as f64);

        for r in 0..self.num_robots {
            self.state.robots[r].pose = Pose2::new(
                pos_init[STATES_PER_ROBOT * r],
                pos_init[STATES_PER_ROBOT * r + 1],
                pos_init[STATES_PER_ROBOT * r + 2],
            );
        }

        self.initialized = true;
        log::info!("initialized over custom bounds");
        Ok(())
    }

    /// Whether an init has completed.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The number of subparticle sets, `D = 3R + 3T + 1`.
    #[inline]
    pub fn size(&self) -> usize {
        self.particles.num_subsets()
    }

    /// The number of particles, `P`.
    #[inline]
    pub fn num_particles(&self) -> usize {
        self.num_particles
    }

    /// Completed iterations since construction.
    #[inline]
    pub fn num_iterations(&self) -> u64 {
        self.iteration
    }

    /// The current posterior.
    #[inline]
    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// The particle matrix.
    #[inline]
    pub fn particles(&self) -> &ParticleMatrix {
        &self.particles
    }

    /// Mutable access to the particle matrix, for direct subset assignment.
    #[inline]
    pub fn particles_mut(&mut self) -> &mut ParticleMatrix {
        &mut self.particles
    }

    /// Robot `r`'s landmark-likelihood factor from the latest iteration.
    pub fn weight_components(&self, robot: usize) -> Option<&[f64]> {
        self.weight_components.get(robot).map(Vec::as_slice)
    }

    /// Sum of the master weights observed by the latest resample.
    #[inline]
    pub fn last_weight_sum(&self) -> f64 {
        self.last_weight_sum
    }

    /// The effective odometry-noise coefficients.
    #[inline]
    pub fn alpha(&self) -> &[f64] {
        &self.alpha
    }

    /// Replace the publication sink.
    pub fn set_sink(&mut self, sink: Box<dyn IterationSink>) {
        self.sink = sink;
    }

    /// Queue a knob update; it takes effect at the next iteration boundary.
    pub fn reconfigure(&mut self, knobs: RuntimeKnobs) {
        if knobs.is_empty() {
            return;
        }
        let pending = self.pending_knobs.get_or_insert_with(RuntimeKnobs::default);
        if knobs.alpha.is_some() {
            pending.alpha = knobs.alpha;
        }
        if knobs.resample_start_at.is_some() {
            pending.resample_start_at = knobs.resample_start_at;
        }
        if knobs.target_iteration_time_default.is_some() {
            pending.target_iteration_time_default = knobs.target_iteration_time_default;
        }
        if knobs.publish.is_some() {
            pending.publish = knobs.publish;
        }
    }

    // ========================================================================
    // Producer surface
    // ========================================================================

    /// Propagate robot `robot`'s pose block by a body-frame odometry
    /// increment.
    ///
    /// Before initialization the update is suppressed; the call still marks
    /// the robot as started and opens the init gate once every used robot
    /// has produced odometry.
    pub fn predict(&mut self, robot: usize, odom: Odometry, stamp: f64) {
        if !self.robot_active(robot) {
            return;
        }

        self.started[robot] = true;
        if !self.initialized {
            self.try_initialize();
            return;
        }

        if odom.is_zero() {
            return;
        }

        log::trace!(
            "robot {robot} odometry ({:.4}, {:.4}, {:.4}) at {stamp:.3}",
            odom.x,
            odom.y,
            odom.theta,
        );

        let delta = Pose2::new(odom.x, odom.y, odom.theta);
        for p in 0..self.num_particles {
            let pose = self.particles.pose_at(robot, p);
            self.particles.set_pose_at(robot, p, pose.compose(&delta));
        }
    }

    /// Overwrite robot `robot`'s slot for `landmark`.
    pub fn save_landmark_observation(
        &mut self,
        robot: usize,
        landmark: usize,
        obs: LandmarkObservation,
    ) {
        if !self.robot_active(robot) || landmark >= self.num_landmarks {
            return;
        }
        self.buffers.save_landmark(robot, landmark, obs);
    }

    /// Mark robot `robot`'s slot for `landmark` as not-found.
    pub fn clear_landmark_observation(&mut self, robot: usize, landmark: usize) {
        if !self.robot_active(robot) || landmark >= self.num_landmarks {
            return;
        }
        self.buffers.clear_landmark(robot, landmark);
    }

    /// Note that robot `robot` finished its landmark batch.
    pub fn measurements_done_landmarks(&mut self, robot: usize) {
        if !self.robot_active(robot) {
            return;
        }
        self.buffers.set_landmarks_done(robot);
    }

    /// Overwrite robot `robot`'s target slot.
    pub fn save_target_observation(&mut self, robot: usize, obs: TargetObservation) {
        if !self.robot_active(robot) {
            return;
        }
        self.buffers.save_target(robot, obs);
    }

    /// Mark robot `robot`'s target slot as not-found.
    pub fn clear_target_observation(&mut self, robot: usize) {
        if !self.robot_active(robot) {
            return;
        }
        self.buffers.clear_target(robot);
    }

    /// Note that robot `robot` finished its target batch. When `robot` is
    /// the main robot this is the iteration barrier: the full fuse /
    /// resample / estimate sequence runs before the call returns.
    pub fn measurements_done_target(&mut self, robot: usize) {
        if !self.robot_active(robot) {
            return;
        }
        self.buffers.set_target_done(robot);
        if robot == self.main_robot {
            self.run_iteration();
        }
    }

    /// Refresh the target iteration interval from a target-message stamp
    /// (seconds). Main robot only. Intervals outside `(0, 1]` s or
    /// non-finite fall back to the configured default.
    pub fn update_target_iteration_time(&mut self, stamp: f64) {
        let diff = match self.last_target_stamp {
            Some(last) => stamp - last,
            None => self.target_dt_default,
        };

        if !diff.is_finite() || diff <= 0.0 || diff > TARGET_ITERATION_TIME_MAX {
            log::debug!(
                "target interval {diff:.4}s unusable, substituting {:.4}s",
                self.target_dt_default,
            );
            self.target_dt = self.target_dt_default;
        } else {
            self.target_dt = diff;
        }

        self.last_target_stamp = Some(stamp);
    }

    // ========================================================================
    // Iteration steps
    // ========================================================================

    /// Advance every particle's target block by the regressed velocity over
    /// the current interval, plus an integrated random acceleration.
    pub fn predict_target(&mut self) {
        if !self.initialized {
            return;
        }

        let dt = self.target_dt;
        let vel = self.state.target.vel;
        let offset = self.particles.target_offset();

        for s in 0..STATES_PER_TARGET {
            let drift = vel[s] * dt;
            let column = self.particles.column_mut(offset + s);
            for value in column.iter_mut() {
                let accel = sample_gaussian(&mut self.rng, 0.0, TARGET_RAND_STDDEV);
                *value += drift + 0.5 * accel * dt * dt;
            }
        }
    }

    /// Fold every used robot's landmark observations into the master
    /// weights.
    ///
    /// Each robot contributes one likelihood factor per particle, evaluated
    /// against its own pose block only; the factors multiply into the weight
    /// column and are retained per robot for inspection. A robot's `conf`
    /// is the mean of its factor (1 when it saw nothing).
    pub fn fuse_robots(&mut self) {
        if !self.initialized {
            return;
        }

        for r in 0..self.num_robots {
            if !self.robots_used[r] {
                continue;
            }

            let mut factor = vec![1.0; self.num_particles];
            let mut seen = 0usize;

            for l in 0..self.num_landmarks {
                let obs = *self.buffers.landmark(r, l);
                if !obs.found {
                    continue;
                }
                if obs.cov_xx <= 0.0 || obs.cov_yy <= 0.0 {
                    log::warn!("robot {r} landmark {l}: non-positive covariance, skipping");
                    continue;
                }
                seen += 1;

                let lm = self.landmarks[l];
                let lm_world = Vector2::new(lm.x, lm.y);
                let norm = 1.0 / (2.0 * PI * obs.cov_xx * obs.cov_yy).sqrt();

                for (p, f) in factor.iter_mut().enumerate() {
                    let pose = self.particles.pose_at(r, p);
                    let z_hat = pose.transform_to_body(lm_world);
                    let ex = obs.x - z_hat.x;
                    let ey = obs.y - z_hat.y;
                    let exp_arg = -0.5 * (ex * ex / obs.cov_xx + ey * ey / obs.cov_yy);
                    *f *= norm * exp_arg.exp();
                }
            }

            let conf = factor.iter().sum::<f64>() / self.num_particles as f64;
            self.state.robots[r].conf = conf;
            self.particles.scale_weights(&factor);
            log::trace!("robot {r}: fused {seen} landmarks, conf {conf:.4}");
            self.weight_components[r] = factor;
        }
    }

    /// Fold every used robot's current target sighting into the master
    /// weights.
    ///
    /// The particle's target hypothesis is projected into the observing
    /// robot's body frame (using that particle's pose hypothesis) and scored
    /// against the sighting under its axis-aligned covariance. Height is
    /// carried by the motion model only and takes no part in the likelihood.
    pub fn fuse_target(&mut self) {
        if !self.initialized {
            return;
        }

        for r in 0..self.num_robots {
            if !self.robots_used[r] {
                continue;
            }

            let obs = *self.buffers.target(r);
            if !obs.found {
                continue;
            }
            if obs.cov_xx <= 0.0 || obs.cov_yy <= 0.0 {
                log::warn!("robot {r} target sighting: non-positive covariance, skipping");
                continue;
            }

            let norm = 1.0 / (2.0 * PI * obs.cov_xx * obs.cov_yy).sqrt();
            let mut factor = vec![1.0; self.num_particles];

            for (p, f) in factor.iter_mut().enumerate() {
                let pose = self.particles.pose_at(r, p);
                let target = self.particles.target_at(p);
                let body = pose.transform_to_body(Vector2::new(target[0], target[1]));
                let ex = obs.x - body.x;
                let ey = obs.y - body.y;
                let exp_arg = -0.5 * (ex * ex / obs.cov_xx + ey * ey / obs.cov_yy);
                *f = norm * exp_arg.exp();
            }

            self.particles.scale_weights(&factor);
        }
    }

    /// Resample the particle set, preserving the top-weighted fraction.
    ///
    /// When the weight sum is below [`MIN_WEIGHTSUM`] the step is skipped
    /// and the current particles are kept. Otherwise the highest-weighted
    /// `floor(resample_start_at * P)` particles are copied verbatim (stable
    /// on ties) and the remaining slots are drawn by inverse-CDF sampling
    /// over the normalized weights; all active columns are gathered through
    /// the same permutation and the weights reset to `1/P`. The pre-reset
    /// weights are kept aside for the estimator.
    pub fn resample(&mut self) {
        if !self.initialized {
            return;
        }

        let weights = self.particles.weights();
        let sum: f64 = weights.iter().sum();
        self.last_weight_sum = sum;

        if sum < MIN_WEIGHTSUM {
            log::warn!("weight sum {sum:.3e} below {MIN_WEIGHTSUM:.1e}, keeping particle set");
            self.estimator_weights.copy_from_slice(weights);
            return;
        }

        let order = argsort_desc(weights);
        let top = ((self.resample_start_at * self.num_particles as f64).floor() as usize)
            .min(self.num_particles);

        let mut cdf = Vec::with_capacity(self.num_particles);
        let mut acc = 0.0;
        for &w in weights {
            acc += w / sum;
            cdf.push(acc);
        }

        let mut perm = Vec::with_capacity(self.num_particles);
        perm.extend_from_slice(&order[..top]);
        for _ in top..self.num_particles {
            let u: f64 = self.rng.gen();
            let idx = cdf.partition_point(|&c| c < u).min(self.num_particles - 1);
            perm.push(idx);
        }

        let source = self.particles.clone();
        let subsets = self.active_subsets();
        self.particles.gather_from(&source, &perm, &subsets);

        self.estimator_weights.copy_from_slice(self.particles.weights());
        self.particles.reset_weights(1.0 / self.num_particles as f64);
    }

    /// Refresh the posterior from the particle set.
    ///
    /// Pose and target-position estimates are weighted means under the
    /// pre-reset weights of the latest resample (falling back to the plain
    /// mean when the weights summed to zero); the target velocity comes from
    /// the regression ring.
    pub fn estimate(&mut self) {
        if !self.initialized {
            return;
        }

        for r in 0..self.num_robots {
            if !self.robots_used[r] {
                continue;
            }
            let o = self.particles.robot_offset(r);
            self.state.robots[r].pose = Pose2::new(
                weighted_mean(self.particles.column(o), &self.estimator_weights),
                weighted_mean(self.particles.column(o + 1), &self.estimator_weights),
                weighted_mean(self.particles.column(o + 2), &self.estimator_weights),
            );
        }

        let o = self.particles.target_offset();
        self.state.target.pos = Vector3::new(
            weighted_mean(self.particles.column(o), &self.estimator_weights),
            weighted_mean(self.particles.column(o + 1), &self.estimator_weights),
            weighted_mean(self.particles.column(o + 2), &self.estimator_weights),
        );

        let now = self.last_target_stamp.unwrap_or(self.clock);
        self.state.update_target_velocity(now, self.buffers.targets());
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// One full iteration, entered from the main robot's target barrier.
    fn run_iteration(&mut self) {
        if !self.initialized {
            log::debug!("target barrier before initialization, skipping iteration");
            return;
        }

        self.apply_pending_knobs();
        self.clock += self.target_dt;

        let t0 = Instant::now();
        self.predict_target();
        self.fuse_robots();
        self.fuse_target();
        self.resample();
        self.estimate();
        self.iteration += 1;

        log::debug!(
            "iteration {} done in {:.1?} ({} landmark batches, weight sum {:.3e})",
            self.iteration,
            t0.elapsed(),
            self.buffers.landmarks_done_count(),
            self.last_weight_sum,
        );

        if self.publish {
            self.sink.on_iteration(IterationView {
                particles: &self.particles,
                robots: &self.state.robots,
                target: &self.state.target,
                weight_sum: self.last_weight_sum,
                iteration: self.iteration,
            });
        }

        self.buffers.clear_done_flags();
    }

    /// Auto-init gate: once every used robot has produced odometry, run the
    /// default init. Called from `predict` while uninitialized.
    fn try_initialize(&mut self) {
        if self.initialized {
            return;
        }

        let all_started = self
            .robots_used
            .iter()
            .zip(self.started.iter())
            .all(|(&used, &started)| !used || started);

        if all_started {
            log::info!("all used robots have started, running default init");
            self.init();
        }
    }

    fn apply_pending_knobs(&mut self) {
        let Some(knobs) = self.pending_knobs.take() else {
            return;
        };

        if let Some(alpha) = knobs.alpha {
            if alpha.len() == 4 * self.num_robots {
                self.alpha = alpha;
            } else {
                log::warn!(
                    "ignoring alpha of length {}, expected {}",
                    alpha.len(),
                    4 * self.num_robots,
                );
            }
        }
        if let Some(fraction) = knobs.resample_start_at {
            if (0.0..=1.0).contains(&fraction) {
                self.resample_start_at = fraction;
            } else {
                log::warn!("ignoring resample fraction {fraction}, must be within [0, 1]");
            }
        }
        if let Some(dt) = knobs.target_iteration_time_default {
            if dt.is_finite() && dt > 0.0 {
                self.target_dt_default = dt;
            } else {
                log::warn!("ignoring default target interval {dt}");
            }
        }
        if let Some(publish) = knobs.publish {
            self.publish = publish;
        }

        log::debug!("runtime knobs applied");
    }

    /// Subset columns touched by a resample gather: used robots' pose
    /// blocks, the target block, and the weight column. Disabled robots'
    /// columns stay at their init values for the life of the run.
    fn active_subsets(&self) -> Vec<usize> {
        let mut subsets = Vec::with_capacity(self.particles.num_subsets());
        for r in 0..self.num_robots {
            if self.robots_used[r] {
                let o = self.particles.robot_offset(r);
                subsets.extend([o, o + 1, o + 2]);
            }
        }
        let o = self.particles.target_offset();
        subsets.extend([o, o + 1, o + 2]);
        subsets.push(self.particles.weight_index());
        subsets
    }

    fn robot_active(&self, robot: usize) -> bool {
        if robot >= self.num_robots {
            log::warn!("robot index {robot} out of range ({} robots)", self.num_robots);
            return false;
        }
        if !self.robots_used[robot] {
            log::debug!("ignoring operation for disabled robot {robot}");
            return false;
        }
        true
    }
}
