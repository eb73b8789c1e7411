//! The joint particle matrix.
//!
//! Storage is subset-major (column-major): one contiguous `Vec<f64>` of
//! length `P` per state dimension, in the fixed order
//!
//! ```text
//! [r0.x, r0.y, r0.theta, r1.x, ..., t.x, t.y, t.z, w]
//! ```
//!
//! so a resample is a gather-by-index over columns with a shared
//! permutation, and per-subset updates touch contiguous memory. Dimensions
//! are fixed at construction; resizing is not supported.

use crate::common::geometry::Pose2;

use super::config::{STATES_PER_ROBOT, STATES_PER_TARGET};

/// Column-major particle storage for `R` robots, `T` targets, and a weight
/// column.
#[derive(Debug, Clone)]
pub struct ParticleMatrix {
    columns: Vec<Vec<f64>>,
    num_particles: usize,
    num_robots: usize,
    num_targets: usize,
}

impl ParticleMatrix {
    /// Allocate a zeroed matrix of `3R + 3T + 1` columns by `P` rows.
    pub fn new(num_robots: usize, num_targets: usize, num_particles: usize) -> Self {
        let num_subsets = STATES_PER_ROBOT * num_robots + STATES_PER_TARGET * num_targets + 1;
        Self {
            columns: vec![vec![0.0; num_particles]; num_subsets],
            num_particles,
            num_robots,
            num_targets,
        }
    }

    /// Number of subset columns, `D`.
    #[inline]
    pub fn num_subsets(&self) -> usize {
        self.columns.len()
    }

    /// Number of particles, `P`.
    #[inline]
    pub fn num_particles(&self) -> usize {
        self.num_particles
    }

    /// Number of robots, `R`.
    #[inline]
    pub fn num_robots(&self) -> usize {
        self.num_robots
    }

    /// First column of robot `r`'s pose block.
    #[inline]
    pub fn robot_offset(&self, robot: usize) -> usize {
        STATES_PER_ROBOT * robot
    }

    /// First column of the target block.
    #[inline]
    pub fn target_offset(&self) -> usize {
        STATES_PER_ROBOT * self.num_robots
    }

    /// Index of the weight column.
    #[inline]
    pub fn weight_index(&self) -> usize {
        self.columns.len() - 1
    }

    /// A subset column.
    #[inline]
    pub fn column(&self, subset: usize) -> &[f64] {
        &self.columns[subset]
    }

    /// Mutable access to a subset column.
    #[inline]
    pub fn column_mut(&mut self, subset: usize) -> &mut [f64] {
        &mut self.columns[subset]
    }

    /// The weight column.
    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.columns[self.weight_index()]
    }

    /// Assign `value` to every entry of every column.
    pub fn assign(&mut self, value: f64) {
        for column in &mut self.columns {
            column.fill(value);
        }
    }

    /// Assign `value` to every entry of one column.
    pub fn assign_subset(&mut self, value: f64, subset: usize) {
        self.columns[subset].fill(value);
    }

    /// Assign `value` to every weight.
    pub fn reset_weights(&mut self, value: f64) {
        let w = self.weight_index();
        self.columns[w].fill(value);
    }

    /// Pointwise-multiply the weight column by `factors`.
    pub fn scale_weights(&mut self, factors: &[f64]) {
        debug_assert_eq!(factors.len(), self.num_particles);
        let w = self.weight_index();
        for (weight, factor) in self.columns[w].iter_mut().zip(factors.iter()) {
            *weight *= factor;
        }
    }

    /// Robot `r`'s pose hypothesis in particle `p`.
    #[inline]
    pub fn pose_at(&self, robot: usize, particle: usize) -> Pose2 {
        let o = self.robot_offset(robot);
        Pose2::new(
            self.columns[o][particle],
            self.columns[o + 1][particle],
            self.columns[o + 2][particle],
        )
    }

    /// Overwrite robot `r`'s pose hypothesis in particle `p`.
    #[inline]
    pub fn set_pose_at(&mut self, robot: usize, particle: usize, pose: Pose2) {
        let o = self.robot_offset(robot);
        self.columns[o][particle] = pose.x;
        self.columns[o + 1][particle] = pose.y;
        self.columns[o + 2][particle] = pose.theta;
    }

    /// The target hypothesis `[x, y, z]` in particle `p`.
    #[inline]
    pub fn target_at(&self, particle: usize) -> [f64; 3] {
        let o = self.target_offset();
        [
            self.columns[o][particle],
            self.columns[o + 1][particle],
            self.columns[o + 2][particle],
        ]
    }

    /// Gather the named subset columns from `source` through `perm`:
    /// `self[subset][p] = source[subset][perm[p]]`.
    ///
    /// Columns not named in `subsets` are left untouched, which is how
    /// disabled robots ride through a resample unchanged.
    pub fn gather_from(&mut self, source: &ParticleMatrix, perm: &[usize], subsets: &[usize]) {
        debug_assert_eq!(perm.len(), self.num_particles);
        for &subset in subsets {
            let src = &source.columns[subset];
            let dst = &mut self.columns[subset];
            for (p, &from) in perm.iter().enumerate() {
                dst[p] = src[from];
            }
        }
    }
}
