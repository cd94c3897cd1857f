use approx::assert_relative_eq;
use itertools::Itertools;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use resect_core::nalgebra::{IsometryMatrix3, Point3, Rotation3, Translation, Vector3};
use resect_core::sample_consensus::{Estimator, Model};
use resect_core::{FeatureWorldMatch, Pose, ProjectionMatrix, WorldToCamera};
use resect_pinhole::NormalizedKeyPoint;
use resect_solvers::{LambdaTwist, ResectionSolver, SixPoint};

const EPSILON_APPROX: f64 = 1e-6;

fn samples(
    pose: IsometryMatrix3<f64>,
    camera_points: &[Point3<f64>],
) -> Vec<FeatureWorldMatch<NormalizedKeyPoint>> {
    camera_points
        .iter()
        .map(|&p| {
            let world = pose.inverse() * p;
            FeatureWorldMatch(
                NormalizedKeyPoint((p / p.z).xy()),
                world.to_homogeneous().into(),
            )
        })
        .collect()
}

/// Picks the hypothesis which best explains every sample.
fn best(
    models: impl IntoIterator<Item = WorldToCamera>,
    data: &[FeatureWorldMatch<NormalizedKeyPoint>],
) -> WorldToCamera {
    models
        .into_iter()
        .min_by(|a, b| {
            let a: f64 = data.iter().map(|d| a.residual(d)).sum();
            let b: f64 = data.iter().map(|d| b.residual(d)).sum();
            a.partial_cmp(&b).unwrap()
        })
        .unwrap()
}

#[test]
fn lambda_twist_manual() {
    // Points in camera coordinates (with z > 0).
    let camera_depth_points = [
        [-0.228_125, -0.061_458_334, 1.0],
        [0.418_75, -0.581_25, 2.0],
        [1.128_125, 0.878_125, 3.0],
        [-0.528_125, 0.178_125, 2.5],
        [-0.923_424, -0.235_125, 2.8],
    ]
    .map(Point3::from);

    let rot = Rotation3::from_euler_angles(0.1, 0.2, 0.3);
    let trans = Translation::from(Vector3::new(0.1, 0.2, 0.3));
    let pose = IsometryMatrix3::from_parts(trans, rot);
    let data = samples(pose, &camera_depth_points);

    let models = LambdaTwist::new().estimate(data.iter().copied());
    assert!(!models.is_empty());
    let estimate = best(models, &data);

    assert_relative_eq!(rot, estimate.0.rotation, epsilon = EPSILON_APPROX);
    assert_relative_eq!(trans, estimate.0.translation, epsilon = EPSILON_APPROX);
}

#[test]
fn lambda_twist_random_poses() {
    let mut rng = Pcg64::seed_from_u64(0);
    for _ in 0..25 {
        let rot = Rotation3::from_euler_angles(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let trans = Translation::from(Vector3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        ));
        let pose = IsometryMatrix3::from_parts(trans, rot);
        let points = (0..3)
            .map(|_| {
                Point3::new(
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(2.0..6.0),
                )
            })
            .collect_vec();
        let data = samples(pose, &points);

        let models = LambdaTwist::new().estimate(data.iter().copied());
        let found = models.iter().any(|model| {
            (model.0.rotation.matrix() - rot.matrix()).norm() < 1e-5
                && (model.0.translation.vector - trans.vector).norm() < 1e-5
        });
        assert!(found, "pose not among {} hypotheses", models.len());
    }
}

#[test]
fn resection_solver_outputs_projection_matrices() {
    let rot = Rotation3::from_euler_angles(-0.3, 0.1, 0.2);
    let pose = IsometryMatrix3::from_parts(Translation::from(Vector3::new(0.0, 0.1, 0.5)), rot);
    let points = [
        Point3::new(-0.5, -0.4, 3.0),
        Point3::new(0.6, -0.3, 4.0),
        Point3::new(0.2, 0.7, 2.5),
        Point3::new(-0.3, 0.2, 3.5),
        Point3::new(0.4, 0.4, 5.0),
        Point3::new(-0.7, 0.6, 4.2),
        Point3::new(0.1, -0.6, 2.2),
    ];
    let data = samples(pose, &points);
    let truth = ProjectionMatrix::from(WorldToCamera::from(pose));

    let mut models = Vec::new();
    LambdaTwist::new().solve(&data[..3], &mut models);
    assert!(!models.is_empty() && models.len() <= LambdaTwist::MAX_MODELS);
    assert!(models.iter().any(|p| (p.0 - truth.0).norm() < 1e-6));

    models.clear();
    SixPoint::new().solve(&data, &mut models);
    assert_eq!(models.len(), SixPoint::MAX_MODELS);
    let (k, estimate) = models[0].calibration_and_pose().unwrap();
    assert_relative_eq!(
        k,
        resect_core::nalgebra::Matrix3::identity(),
        epsilon = 1e-6
    );
    assert_relative_eq!(
        estimate.center(),
        WorldToCamera::from(pose).center(),
        epsilon = 1e-6
    );
    assert!(data.iter().all(|d| models[0].residual(d) < 1e-12));
    assert_eq!(
        estimate.isometry().rotation.matrix().determinant().signum(),
        1.0
    );
}
