use approx::assert_relative_eq;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use resect::nalgebra::{Point2, Point3, Rotation3, Vector2, Vector3};
use resect::pinhole::{
    CameraIntrinsics, Intrinsics, Pinhole, PinholeCamera, PinholeRadialK1, Radial,
};
use resect::{
    DescriberType, ImageSize, KeyPoint, Localizer, MatchData, Pose, Projective, RobustEstimator,
    WorldPoint, WorldToCamera,
};

const IMAGE: ImageSize = ImageSize {
    width: 1280,
    height: 960,
};

fn truth() -> WorldToCamera {
    let rotation = Rotation3::from_euler_angles(0.05, -0.1, 0.08);
    WorldToCamera::from_rotation_center(rotation, Point3::new(0.5, -0.3, -6.0))
}

fn intrinsics() -> CameraIntrinsics {
    CameraIntrinsics::identity()
        .focal(1000.0)
        .principal_point(Point2::new(640.0, 480.0))
}

struct Scene {
    points: Vec<KeyPoint>,
    world_points: Vec<WorldPoint>,
}

/// `inliers` exact observations of random points around the origin followed by
/// `outliers` random pixels matched with random world points.
fn scene(
    camera: &dyn Intrinsics,
    inliers: usize,
    outliers: usize,
    noise: f64,
    seed: u64,
) -> Scene {
    let mut rng = Pcg64::seed_from_u64(seed);
    let mut points = Vec::new();
    let mut world_points = Vec::new();
    while points.len() < inliers {
        let world = WorldPoint::new(
            rng.gen_range(-2.0..2.0),
            rng.gen_range(-2.0..2.0),
            rng.gen_range(-1.0..1.0),
        );
        let camera_point = truth().transform(world).point().unwrap();
        let pixel = match camera.project(&camera_point) {
            Some(pixel) => pixel,
            None => continue,
        };
        let jitter = if noise > 0.0 {
            Vector2::new(rng.gen_range(-noise..noise), rng.gen_range(-noise..noise))
        } else {
            Vector2::zeros()
        };
        points.push(KeyPoint(pixel + jitter));
        world_points.push(world);
    }
    for _ in 0..outliers {
        points.push(KeyPoint::new(
            rng.gen_range(0.0..f64::from(IMAGE.width)),
            rng.gen_range(0.0..f64::from(IMAGE.height)),
        ));
        world_points.push(WorldPoint::new(
            rng.gen_range(-2.0..2.0),
            rng.gen_range(-2.0..2.0),
            rng.gen_range(-1.0..1.0),
        ));
    }
    Scene {
        points,
        world_points,
    }
}

fn match_data(scene: &Scene, describer_type: DescriberType) -> MatchData {
    MatchData::new(
        scene.points.clone(),
        scene.world_points.clone(),
        vec![describer_type; scene.points.len()],
    )
    .unwrap()
}

fn localize(
    camera: Option<&dyn Intrinsics>,
    data: &mut MatchData,
    pose: &mut WorldToCamera,
    estimator: RobustEstimator,
) -> bool {
    Localizer::default().localize(IMAGE, camera, data, pose, estimator)
}

fn assert_pose_near(pose: &WorldToCamera, epsilon: f64) {
    assert_relative_eq!(pose.center(), truth().center(), epsilon = epsilon);
    assert_relative_eq!(
        pose.rotation().matrix(),
        truth().rotation().matrix(),
        epsilon = epsilon
    );
}

fn perturbed(pose: WorldToCamera) -> WorldToCamera {
    WorldToCamera::from_parts(
        pose.translation() + Vector3::new(0.03, -0.02, 0.05),
        Rotation3::from_euler_angles(-0.01, 0.02, 0.01) * pose.rotation(),
    )
}

#[test]
fn six_markers_calibrated() {
    pretty_env_logger::try_init().ok();
    let mut camera = PinholeCamera::undistorted(intrinsics());
    let scene = scene(&camera, 6, 0, 0.0, 1);
    let mut data = match_data(&scene, DescriberType::Cctag3);
    let mut pose = WorldToCamera::identity();

    let localizer = Localizer::default();
    let estimator = RobustEstimator::AcRansac;
    assert!(localizer.localize(IMAGE, Some(&camera), &mut data, &mut pose, estimator));
    assert_eq!(data.inliers.len(), 6);
    assert!(data.error_max.is_finite() && data.error_max < 1e-3);
    assert_pose_near(&pose, 1e-6);
    let (k, _) = data.projection_matrix.calibration_and_pose().unwrap();
    assert_relative_eq!(k, intrinsics().matrix(), epsilon = 1e-4);

    assert!(localizer.refine_pose(&mut camera, &mut pose, &data, true, true));
    assert_pose_near(&pose, 1e-6);
    assert_relative_eq!(
        camera.intrinsics.focals,
        Vector2::new(1000.0, 1000.0),
        epsilon = 1e-3
    );
}

#[test]
fn outliers_are_rejected_by_both_estimators() {
    pretty_env_logger::try_init().ok();
    let camera = PinholeCamera::undistorted(intrinsics());
    let scene = scene(&camera, 60, 70, 0.5, 2);

    for estimator in [RobustEstimator::AcRansac, RobustEstimator::LoRansac] {
        let mut data = match_data(&scene, DescriberType::Sift);
        let mut pose = WorldToCamera::identity();
        assert!(
            localize(Some(&camera), &mut data, &mut pose, estimator),
            "{} failed",
            estimator
        );
        assert!(
            data.inliers.iter().all(|&i| i < 60),
            "{} kept an outlier",
            estimator
        );
        assert!(
            data.inliers.len() >= 50,
            "{} found {} inliers",
            estimator,
            data.inliers.len()
        );
        assert!(data.error_max < 5.0);
        assert_pose_near(&pose, 0.1);
    }
}

#[test]
fn lo_ransac_threshold_defaults_to_four_pixels() {
    let camera = PinholeCamera::undistorted(intrinsics());
    let scene = scene(&camera, 40, 10, 0.0, 3);

    let estimator = RobustEstimator::LoRansac;
    let mut data = match_data(&scene, DescriberType::Akaze);
    let mut pose = WorldToCamera::identity();
    assert!(localize(Some(&camera), &mut data, &mut pose, estimator));
    assert_eq!(data.error_max, 4.0);
    assert_eq!(data.inliers.len(), 40);

    let mut data = match_data(&scene, DescriberType::Akaze).error_max(2.0);
    assert!(localize(Some(&camera), &mut data, &mut pose, estimator));
    assert_eq!(data.error_max, 2.0);
    assert_pose_near(&pose, 1e-6);
}

#[test]
fn distorted_observations_are_undistorted_first() {
    pretty_env_logger::try_init().ok();
    let camera: PinholeRadialK1 = Pinhole::new(intrinsics(), Radial::new([-0.15]));
    let scene = scene(&camera, 50, 20, 0.0, 4);
    let original = scene.points.clone();

    for estimator in [RobustEstimator::AcRansac, RobustEstimator::LoRansac] {
        let mut data = match_data(&scene, DescriberType::Sift);
        let mut pose = WorldToCamera::identity();
        assert!(localize(Some(&camera), &mut data, &mut pose, estimator));
        assert_eq!(data.points(), original.as_slice());
        assert_eq!(data.inliers.len(), 50);
        assert_pose_near(&pose, 1e-6);
    }
}

#[test]
fn uncalibrated_resection_recovers_the_calibration() {
    pretty_env_logger::try_init().ok();
    let camera = PinholeCamera::undistorted(intrinsics());
    let scene = scene(&camera, 100, 30, 0.0, 5);
    let mut data = match_data(&scene, DescriberType::Sift);
    let mut pose = WorldToCamera::identity();

    // The estimator only matters with a calibration.
    assert!(localize(None, &mut data, &mut pose, RobustEstimator::LoRansac));
    assert!(data.error_max.is_finite() && data.error_max < 1e-3);
    let mut inliers = data.inliers.clone();
    inliers.sort_unstable();
    assert_eq!(inliers, (0..100).collect::<Vec<_>>());
    assert_pose_near(&pose, 1e-5);
    let (k, _) = data.projection_matrix.calibration_and_pose().unwrap();
    assert_relative_eq!(k, intrinsics().matrix(), epsilon = 1e-3);
}

#[test]
fn invalid_intrinsics_fall_back_to_uncalibrated_resection() {
    let camera = PinholeCamera::undistorted(intrinsics());
    let scene = scene(&camera, 60, 0, 0.0, 6);
    let broken = PinholeCamera::undistorted(intrinsics().focal(0.0));
    assert!(!broken.is_valid());

    let mut data = match_data(&scene, DescriberType::Orb);
    let mut pose = WorldToCamera::identity();
    assert!(localize(
        Some(&broken),
        &mut data,
        &mut pose,
        RobustEstimator::LoRansac
    ));
    // LO-RANSAC would have substituted its default threshold.
    assert!(data.error_max < 1e-3);
    assert_pose_near(&pose, 1e-5);
}

#[test]
fn weak_support_leaves_the_pose_alone() {
    let camera = PinholeCamera::undistorted(intrinsics());
    let scene = scene(&camera, 10, 0, 0.0, 7);
    let mut data = match_data(&scene, DescriberType::Sift);
    let start = WorldToCamera::identity();
    let mut pose = start;

    assert!(!localize(
        Some(&camera),
        &mut data,
        &mut pose,
        RobustEstimator::AcRansac
    ));
    assert_eq!(pose, start);
    assert_eq!(data.inliers.len(), 10);
    assert_eq!(data.projection_matrix, Default::default());
}

#[test]
fn refinement_recovers_a_perturbed_pose() {
    let mut camera = PinholeCamera::undistorted(intrinsics());
    let scene = scene(&camera, 40, 20, 0.0, 8);
    let mut data = match_data(&scene, DescriberType::Sift);
    let mut pose = WorldToCamera::identity();
    let localizer = Localizer::default();
    let estimator = RobustEstimator::AcRansac;
    assert!(localizer.localize(IMAGE, Some(&camera), &mut data, &mut pose, estimator));

    let mut refined = perturbed(pose);
    assert!(localizer.refine_pose(&mut camera, &mut refined, &data, true, false));
    assert_pose_near(&refined, 1e-6);
    assert_eq!(camera, PinholeCamera::undistorted(intrinsics()));
}

#[test]
fn refinement_updates_the_intrinsics_in_place() {
    let camera = PinholeCamera::undistorted(intrinsics());
    let scene = scene(&camera, 60, 0, 0.0, 9);
    let mut data = match_data(&scene, DescriberType::Sift);
    let mut pose = WorldToCamera::identity();
    let localizer = Localizer::default();
    let estimator = RobustEstimator::AcRansac;
    assert!(localizer.localize(IMAGE, Some(&camera), &mut data, &mut pose, estimator));

    let mut estimate = PinholeCamera::undistorted(intrinsics().focal(980.0));
    let intrinsics_only: &mut dyn Intrinsics = &mut estimate;
    assert!(localizer.refine_pose(intrinsics_only, &mut pose, &data, true, true));
    assert_eq!(estimate.model_name(), "pinhole");
    assert_relative_eq!(
        estimate.intrinsics.focals,
        Vector2::new(1000.0, 1000.0),
        epsilon = 1e-3
    );
    assert_pose_near(&pose, 1e-5);
}

#[test]
fn empty_refinement_is_a_no_op() {
    let mut camera = PinholeCamera::undistorted(intrinsics());
    let scene = scene(&camera, 30, 0, 0.0, 10);
    let data = match_data(&scene, DescriberType::Sift);
    let start = perturbed(truth());
    let mut pose = start;
    let localizer = Localizer::default();
    assert!(localizer.refine_pose(&mut camera, &mut pose, &data, false, false));
    assert_eq!(pose, start);
}

#[test]
fn refinement_without_inliers_fails() {
    let mut camera = PinholeCamera::undistorted(intrinsics());
    let scene = scene(&camera, 30, 0, 0.0, 11);
    let data = match_data(&scene, DescriberType::Sift);
    let start = perturbed(truth());
    let mut pose = start;
    let localizer = Localizer::default();
    assert!(!localizer.refine_pose(&mut camera, &mut pose, &data, true, false));
    assert_eq!(pose, start);
}

#[test]
fn mismatched_correspondences_are_refused() {
    let error = MatchData::new(
        vec![KeyPoint::new(0.0, 0.0); 4],
        vec![WorldPoint::new(0.0, 0.0, 1.0); 5],
        vec![DescriberType::Sift; 4],
    );
    assert!(error.is_err());
}
