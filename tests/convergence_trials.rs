//! End-to-end estimation trials for the joint particle filter.
//!
//! Each trial drives the full producer surface (odometry, observations,
//! barrier) with a deterministic seed and checks the posterior against the
//! scenario's ground truth.

use cooptrack::{
    Landmark, LandmarkObservation, Odometry, ParticleFilter, PfInitData, TargetObservation,
};

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() < tol
}

fn landmark_reading(x: f64, y: f64, cov: f64) -> LandmarkObservation {
    LandmarkObservation {
        found: true,
        x,
        y,
        d: (x * x + y * y).sqrt(),
        phi: y.atan2(x),
        cov_xx: cov,
        cov_yy: cov,
        ..Default::default()
    }
}

fn target_reading(x: f64, y: f64, z: f64, cov: f64) -> TargetObservation {
    TargetObservation {
        found: true,
        x,
        y,
        z,
        d: (x * x + y * y).sqrt(),
        phi: y.atan2(x),
        cov_xx: cov,
        cov_yy: cov,
        ..Default::default()
    }
}

/// A stationary robot near (1, 0, 0) watching one landmark at (2, 0)
/// converges onto its true pose.
///
/// The robot reads the landmark 1 m straight ahead with 0.01 variance. The
/// particle cloud is seeded around the deployment pose (the usual operating
/// mode: positions are roughly known at startup), and fifty fuse/resample
/// rounds must tighten the weighted-mean estimate to within 0.1 on every
/// component.
#[test]
fn test_single_robot_landmark_convergence() {
    let data = PfInitData::new(1, 1000, 1, vec![true], vec![Landmark::new(0, 2.0, 0.0)])
        .with_seed(42);
    let mut pf = ParticleFilter::new(data).unwrap();

    let rand_box = [
        0.5, 1.5, // robot x
        -0.5, 0.5, // robot y
        -0.05, 0.05, // robot theta
        0.0, 4.0, // target x
        -2.0, 2.0, // target y
        0.0, 1.0, // target z
    ];
    pf.init_custom(&rand_box, &[1.0, 0.0, 0.0]).unwrap();

    for k in 0..50 {
        let stamp = k as f64 * 0.033;
        pf.predict(0, Odometry::default(), stamp);
        pf.save_landmark_observation(0, 0, landmark_reading(1.0, 0.0, 0.01));
        pf.measurements_done_landmarks(0);
        pf.measurements_done_target(0);
    }

    assert_eq!(pf.num_iterations(), 50);

    let robot = &pf.state().robots[0];
    assert!(approx_eq(robot.pose.x, 1.0, 0.1), "x = {}", robot.pose.x);
    assert!(approx_eq(robot.pose.y, 0.0, 0.1), "y = {}", robot.pose.y);
    assert!(approx_eq(robot.pose.theta, 0.0, 0.1), "theta = {}", robot.pose.theta);
    assert!(robot.conf > 0.0);
    assert!(pf.last_weight_sum() > 0.0);
}

/// A disabled teammate's pose columns and estimate survive any amount of
/// activity from the rest of the team, bit for bit.
#[test]
fn test_disabled_robot_columns_are_invariant() {
    let data = PfInitData::new(
        1,
        500,
        2,
        vec![true, false],
        vec![Landmark::new(0, 2.0, 0.0)],
    )
    .with_seed(42);
    let mut pf = ParticleFilter::new(data).unwrap();

    let rand_box = [
        0.5, 1.5, -0.5, 0.5, -0.05, 0.05, // robot 0
        0.0, 6.0, -4.5, 4.5, -3.0, 3.0, // robot 1 (disabled)
        0.0, 4.0, -2.0, 2.0, 0.0, 1.0, // target
    ];
    pf.init_custom(&rand_box, &[1.0, 0.0, 0.0, 5.0, 2.0, 1.5]).unwrap();

    let frozen: Vec<Vec<f64>> = (3..6).map(|s| pf.particles().column(s).to_vec()).collect();

    for k in 0..10 {
        let stamp = k as f64 * 0.033;
        pf.predict(0, Odometry::default(), stamp);
        // Writes aimed at the disabled robot must be dropped too
        pf.predict(1, Odometry::new(0.5, 0.0, 0.2), stamp);
        pf.save_landmark_observation(0, 0, landmark_reading(1.0, 0.0, 0.01));
        pf.save_landmark_observation(1, 0, landmark_reading(0.3, 0.3, 0.01));
        pf.measurements_done_landmarks(0);
        pf.measurements_done_target(0);
    }

    assert_eq!(pf.num_iterations(), 10);
    for (i, s) in (3..6).enumerate() {
        assert_eq!(pf.particles().column(s), frozen[i].as_slice(), "column {s} changed");
    }
    // The disabled robot's estimate still reports its configured pose
    let teammate = &pf.state().robots[1];
    assert_eq!(teammate.pose.x, 5.0);
    assert_eq!(teammate.pose.y, 2.0);
    assert_eq!(teammate.pose.theta, 1.5);
    assert_eq!(teammate.conf, 0.0);
}

/// Target velocity is recovered by regression once the sighting ring fills.
///
/// The observing robot sits at the origin; the target crosses the field at
/// 1 m/s along x, reported every 33 ms with tight covariance.
#[test]
fn test_target_velocity_recovery() {
    let data = PfInitData::new(1, 500, 1, vec![true], vec![]).with_seed(42);
    let mut pf = ParticleFilter::new(data).unwrap();

    let rand_box = [
        -0.01, 0.01, -0.01, 0.01, -0.01, 0.01, // robot pinned at the origin
        0.0, 4.0, -2.0, 2.0, 0.0, 1.0, // target
    ];
    pf.init_custom(&rand_box, &[0.0, 0.0, 0.0]).unwrap();

    for k in 0..20 {
        let stamp = k as f64 * 0.033;
        let true_x = 0.5 + 1.0 * stamp;
        pf.predict(0, Odometry::default(), stamp);
        pf.save_target_observation(0, target_reading(true_x, 0.3, 0.2, 0.01));
        pf.update_target_iteration_time(stamp);
        pf.measurements_done_target(0);
    }

    assert_eq!(pf.num_iterations(), 20);

    let target = &pf.state().target;
    assert!(
        target.vel.x > 0.8 && target.vel.x < 1.2,
        "vel.x = {}",
        target.vel.x
    );
    assert!(target.vel.y.abs() < 0.2, "vel.y = {}", target.vel.y);
    assert!(target.vel.z.abs() < 0.2, "vel.z = {}", target.vel.z);

    // Position tracking is looser but must be in the neighborhood
    let true_x = 0.5 + 1.0 * 19.0 * 0.033;
    assert!(approx_eq(target.pos.x, true_x, 0.5), "pos.x = {}", target.pos.x);
    assert!(approx_eq(target.pos.y, 0.3, 0.5), "pos.y = {}", target.pos.y);
}

/// Crushed weights (observations wildly inconsistent with every particle)
/// skip the resample and fall back to unweighted estimates, without panics
/// and without corrupting the particle set.
#[test]
fn test_degenerate_weights_are_safe() {
    let data = PfInitData::new(1, 300, 1, vec![true], vec![Landmark::new(0, 2.0, 0.0)])
        .with_seed(42);
    let mut pf = ParticleFilter::new(data).unwrap();
    pf.init();

    let snapshot: Vec<Vec<f64>> = (0..pf.size() - 1)
        .map(|s| pf.particles().column(s).to_vec())
        .collect();

    // The landmark is reported 100 m away with micrometre covariance: the
    // likelihood underflows to zero for every particle.
    pf.save_landmark_observation(0, 0, landmark_reading(100.0, 100.0, 1e-6));
    pf.measurements_done_landmarks(0);
    pf.measurements_done_target(0);

    assert_eq!(pf.num_iterations(), 1);
    assert_eq!(pf.last_weight_sum(), 0.0);
    assert_eq!(pf.state().robots[0].conf, 0.0);

    // Pose columns kept verbatim (the target block moved through its own
    // motion model, so only robot columns are compared)
    for s in 0..3 {
        assert_eq!(pf.particles().column(s), snapshot[s].as_slice());
    }

    // Estimates degrade to the plain column means
    let mean_x: f64 = snapshot[0].iter().sum::<f64>() / 300.0;
    assert!(approx_eq(pf.state().robots[0].pose.x, mean_x, 1e-9));
}

/// Landmark fusion plus elitism resampling never produces a negative weight
/// and always leaves the weight column uniform after the barrier.
#[test]
fn test_weight_column_invariants_across_iterations() {
    let data = PfInitData::new(1, 200, 1, vec![true], vec![Landmark::new(0, 2.0, 0.0)])
        .with_seed(7);
    let mut pf = ParticleFilter::new(data).unwrap();
    pf.init();

    for k in 0..5 {
        pf.predict(0, Odometry::new(0.01, 0.0, 0.0), k as f64 * 0.033);
        pf.save_landmark_observation(0, 0, landmark_reading(1.0, 0.0, 0.5));
        pf.measurements_done_target(0);

        let weights = pf.particles().weights();
        assert_eq!(weights.len(), 200);
        if pf.last_weight_sum() >= cooptrack::MIN_WEIGHTSUM {
            for &w in weights {
                assert!(approx_eq(w, 1.0 / 200.0, 1e-12));
            }
        }
    }
}
