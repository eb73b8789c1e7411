//! Shared-engine handle for concurrent sensor producers.
//!
//! Each robot's sensor adapter runs on its own worker thread and feeds one
//! engine. [`PfHandle`] is the cloneable, non-owning face it holds: every
//! call locks the engine's single coarse mutex for its full duration, which
//! is the entire concurrency model — per-iteration work dominates lock
//! overhead, so nothing finer-grained is warranted.

use std::sync::{Arc, Mutex, MutexGuard};

use super::config::RuntimeKnobs;
use super::core::ParticleFilter;
use super::observations::{LandmarkObservation, Odometry, TargetObservation};
use super::state::FilterState;

/// Cloneable handle to a shared [`ParticleFilter`].
#[derive(Clone)]
pub struct PfHandle {
    inner: Arc<Mutex<ParticleFilter>>,
}

impl PfHandle {
    /// Wrap an engine for shared use.
    pub fn new(filter: ParticleFilter) -> Self {
        Self { inner: Arc::new(Mutex::new(filter)) }
    }

    fn lock(&self) -> MutexGuard<'_, ParticleFilter> {
        // A panicked producer leaves plain numeric state behind; keep serving
        // the survivors.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// See [`ParticleFilter::predict`].
    pub fn predict(&self, robot: usize, odom: Odometry, stamp: f64) {
        self.lock().predict(robot, odom, stamp);
    }

    /// See [`ParticleFilter::save_landmark_observation`].
    pub fn save_landmark_observation(&self, robot: usize, landmark: usize, obs: LandmarkObservation) {
        self.lock().save_landmark_observation(robot, landmark, obs);
    }

    /// See [`ParticleFilter::clear_landmark_observation`].
    pub fn clear_landmark_observation(&self, robot: usize, landmark: usize) {
        self.lock().clear_landmark_observation(robot, landmark);
    }

    /// See [`ParticleFilter::measurements_done_landmarks`].
    pub fn measurements_done_landmarks(&self, robot: usize) {
        self.lock().measurements_done_landmarks(robot);
    }

    /// See [`ParticleFilter::save_target_observation`].
    pub fn save_target_observation(&self, robot: usize, obs: TargetObservation) {
        self.lock().save_target_observation(robot, obs);
    }

    /// See [`ParticleFilter::clear_target_observation`].
    pub fn clear_target_observation(&self, robot: usize) {
        self.lock().clear_target_observation(robot);
    }

    /// See [`ParticleFilter::measurements_done_target`]. For the main robot
    /// this runs a full iteration before returning.
    pub fn measurements_done_target(&self, robot: usize) {
        self.lock().measurements_done_target(robot);
    }

    /// See [`ParticleFilter::update_target_iteration_time`].
    pub fn update_target_iteration_time(&self, stamp: f64) {
        self.lock().update_target_iteration_time(stamp);
    }

    /// See [`ParticleFilter::reconfigure`].
    pub fn reconfigure(&self, knobs: RuntimeKnobs) {
        self.lock().reconfigure(knobs);
    }

    /// See [`ParticleFilter::init`].
    pub fn init(&self) {
        self.lock().init();
    }

    /// See [`ParticleFilter::init_custom`].
    pub fn init_custom(
        &self,
        rand_box: &[f64],
        pos_init: &[f64],
    ) -> Result<(), super::errors::ConfigError> {
        self.lock().init_custom(rand_box, pos_init)
    }

    /// Whether the engine has initialized.
    pub fn is_initialized(&self) -> bool {
        self.lock().is_initialized()
    }

    /// Completed iterations so far.
    pub fn num_iterations(&self) -> u64 {
        self.lock().num_iterations()
    }

    /// A snapshot of the current posterior.
    pub fn state_snapshot(&self) -> FilterState {
        self.lock().state().clone()
    }

    /// Run `f` against the locked engine; for inspection that needs more
    /// than the forwarding surface.
    pub fn with_filter<T>(&self, f: impl FnOnce(&mut ParticleFilter) -> T) -> T {
        f(&mut self.lock())
    }
}
