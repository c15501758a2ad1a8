use std::f64::consts::PI;

use approx::assert_relative_eq;
use laserloc_3d::{pointcloud::PointCloud, transforms::RigidTransform};
use laserloc_icp::align;
use laserloc_localizer::{
    gate::{GateDecision, PoseWithCovariance, RejectReason},
    CloudKind, Event, Localizer, LocalizerConfig, LocalizerError,
};
use laserloc_scan::{
    conversion::scan_to_pointcloud,
    laser_scan::LaserScan,
    occupancy_grid::{OccupancyGrid, FREE_CELL, OCCUPIED_CELL, UNKNOWN_CELL},
};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// 10m x 10m room with 5cm cells, centered on the map origin, with a box
/// off-center so that the scene has no symmetry.
fn make_room() -> Result<OccupancyGrid, Box<dyn std::error::Error>> {
    let origin = RigidTransform::from_planar(-5.0, -5.0, 0.0);
    let mut grid = OccupancyGrid::filled(200, 200, 0.05, origin, FREE_CELL)?;
    for i in 0..200 {
        grid.set_cell(i, 0, OCCUPIED_CELL);
        grid.set_cell(i, 199, OCCUPIED_CELL);
        grid.set_cell(0, i, OCCUPIED_CELL);
        grid.set_cell(199, i, OCCUPIED_CELL);
    }
    grid.fill_rect([2.0, 1.5], [2.6, 2.0], OCCUPIED_CELL);
    Ok(grid)
}

/// Full turn with a quarter degree between beams.
fn make_template(stamp: f64) -> LaserScan {
    let increment = PI / 720.0;
    LaserScan {
        stamp,
        angle_min: -PI,
        angle_max: -PI + 1439.0 * increment,
        angle_increment: increment,
        range_min: 0.1,
        range_max: 30.0,
        ranges: vec![f64::INFINITY; 1440],
    }
}

fn make_config() -> LocalizerConfig {
    let mut config = LocalizerConfig::default();
    config.icp.max_iterations = 200;
    config.icp.transformation_epsilon = 1e-10;
    config.icp.euclidean_distance_epsilon = 1e-10;
    config
}

/// Scan a laser mounted at `mount` on a robot at `robot_pose` would see.
fn observe(
    localizer: &Localizer<RigidTransform>,
    robot_pose: &RigidTransform,
    mount: &RigidTransform,
    stamp: f64,
) -> Result<LaserScan, LocalizerError> {
    localizer.simulate_scan(&robot_pose.compose(mount), &make_template(stamp))
}

#[test]
fn test_simulated_scan_layout() -> Result<(), Box<dyn std::error::Error>> {
    let mut localizer = Localizer::new(make_config(), RigidTransform::IDENTITY)?;
    localizer.handle_map(make_room()?);

    let max_distance = localizer.config().simulated_cloud.max_distance;
    for pose in [
        RigidTransform::IDENTITY,
        RigidTransform::from_planar(3.0, -4.0, 1.0),
        RigidTransform::from_planar(-4.5, 4.5, -2.5),
    ] {
        let scan = localizer.simulate_scan(&pose, &make_template(0.0))?;
        assert_eq!(scan.ranges.len(), 1440);
        assert_eq!(
            scan.ranges.len(),
            LaserScan::beam_count(scan.angle_min, scan.angle_max, scan.angle_increment)?
        );
        for range in scan.ranges.iter().filter(|r| r.is_finite()) {
            assert!(*range >= scan.range_min && *range <= max_distance);
        }
    }
    Ok(())
}

#[test]
fn test_identity() -> Result<(), Box<dyn std::error::Error>> {
    let mut localizer = Localizer::new(make_config(), RigidTransform::IDENTITY)?;
    localizer.handle_map(make_room()?);
    let pose = RigidTransform::from_planar(-1.0, 0.5, 0.3);
    localizer.seed_pose(pose, 0.0);

    let scan = observe(&localizer, &pose, &RigidTransform::IDENTITY, 0.5)?;
    let mut sink: Vec<PoseWithCovariance> = Vec::new();
    let report = localizer.handle_scan(&scan, &mut sink)?;

    let transform = report.registration.transform;
    assert_relative_eq!(transform.translation_norm(), 0.0, epsilon = 1e-6);
    assert_relative_eq!(transform.yaw(), 0.0, epsilon = 1e-6);
    assert_relative_eq!(report.registration.fitness, 0.0, epsilon = 1e-9);

    // same pose, so the update is either a no-op or suppressed
    assert!(matches!(
        report.decision,
        GateDecision::Accept(_)
            | GateDecision::Reject(RejectReason::InsignificantAndTooSoon { .. })
    ));
    assert_relative_eq!(localizer.pose().translation[0], -1.0, epsilon = 1e-6);
    assert_relative_eq!(localizer.pose().translation[1], 0.5, epsilon = 1e-6);
    assert_relative_eq!(localizer.pose().yaw(), 0.3, epsilon = 1e-6);
    Ok(())
}

#[test]
fn test_recoverable_offset() -> Result<(), Box<dyn std::error::Error>> {
    let mut localizer = Localizer::new(make_config(), RigidTransform::IDENTITY)?;
    localizer.handle_map(make_room()?);

    let true_pose = RigidTransform::from_planar(0.5, 0.0, 0.0);
    let scan = observe(&localizer, &true_pose, &RigidTransform::IDENTITY, 2.0)?;

    let mut sink: Vec<PoseWithCovariance> = Vec::new();
    let report = localizer.handle_scan(&scan, &mut sink)?;

    let transform = report.registration.transform;
    assert_relative_eq!(transform.translation[0], 0.5, epsilon = 0.01);
    assert_relative_eq!(transform.translation[1], 0.0, epsilon = 0.01);
    assert_relative_eq!(transform.yaw(), 0.0, epsilon = 0.005);
    assert!(report.registration.fitness <= localizer.config().gate.fitness_threshold);

    assert!(report.decision.is_accepted());
    assert_eq!(sink.len(), 1);
    assert_relative_eq!(sink[0].pose.translation[0], 0.5, epsilon = 0.01);
    assert_relative_eq!(sink[0].pose.translation[1], 0.0, epsilon = 0.01);
    assert_eq!(sink[0].stamp, 2.0);
    assert_eq!(sink[0].covariance, localizer.config().covariance);
    assert_eq!(*localizer.pose(), sink[0].pose);
    Ok(())
}

#[test]
fn test_recoverable_offset_with_noise() -> Result<(), Box<dyn std::error::Error>> {
    let mut localizer = Localizer::new(make_config(), RigidTransform::IDENTITY)?;
    localizer.handle_map(make_room()?);

    let true_pose = RigidTransform::from_planar(0.3, -0.2, 0.0);
    let mut scan = observe(&localizer, &true_pose, &RigidTransform::IDENTITY, 1.0)?;
    let mut rng = StdRng::seed_from_u64(7);
    for range in scan.ranges.iter_mut().filter(|r| r.is_finite()) {
        *range += rng.random_range(-0.005..=0.005);
    }

    let mut sink: Vec<PoseWithCovariance> = Vec::new();
    let report = localizer.handle_scan(&scan, &mut sink)?;
    assert!(report.decision.is_accepted());
    assert!(report.registration.fitness > 0.0);
    assert_relative_eq!(localizer.pose().translation[0], 0.3, epsilon = 0.02);
    assert_relative_eq!(localizer.pose().translation[1], -0.2, epsilon = 0.02);
    assert_relative_eq!(localizer.pose().yaw(), 0.0, epsilon = 0.01);
    Ok(())
}

/// Mean distance from every source point to its nearest target point.
fn mean_nearest_distance(source: &PointCloud, target: &PointCloud) -> f64 {
    let total = source
        .points()
        .iter()
        .map(|p| {
            target
                .points()
                .iter()
                .map(|q| ((p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2)).sqrt())
                .fold(f64::INFINITY, f64::min)
        })
        .sum::<f64>();
    total / source.len() as f64
}

#[test]
fn test_registration_reduces_nearest_distance() -> Result<(), Box<dyn std::error::Error>> {
    let mut localizer = Localizer::new(make_config(), RigidTransform::IDENTITY)?;
    localizer.handle_map(make_room()?);
    let config = localizer.config().clone();

    let reference = RigidTransform::from_planar(-1.0, 0.5, 0.2);
    let target_scan = localizer.simulate_scan(&reference, &make_template(0.0))?;
    let target = scan_to_pointcloud(&target_scan, &RigidTransform::IDENTITY, &config.laser_cloud)?;

    for step in [
        RigidTransform::from_planar(0.1, 0.0, 0.0),
        RigidTransform::from_planar(-0.05, 0.12, 0.03),
        RigidTransform::from_planar(0.2, -0.1, -0.05),
    ] {
        let nearby = reference.compose(&step);
        let source_scan = localizer.simulate_scan(&nearby, &make_template(0.0))?;
        let source =
            scan_to_pointcloud(&source_scan, &RigidTransform::IDENTITY, &config.laser_cloud)?;

        let before = mean_nearest_distance(&source, &target);
        let result = align(&source, &target, &config.icp)?;
        let after = mean_nearest_distance(&source.transformed(&result.transform), &target);
        assert!(after <= before, "mean distance {after} > {before}");
    }
    Ok(())
}

#[test]
fn test_recoverable_offset_with_mount() -> Result<(), Box<dyn std::error::Error>> {
    let mount = RigidTransform::from_planar(0.25, 0.1, 0.2);
    let mut localizer = Localizer::new(make_config(), mount)?;
    localizer.handle_map(make_room()?);

    let hypothesis = RigidTransform::from_planar(-2.0, 1.0, 0.4);
    localizer.seed_pose(hypothesis, 0.0);

    // the robot is 0.3m ahead and slightly turned relative to its estimate
    let true_pose = hypothesis.compose(&RigidTransform::from_planar(0.3, -0.1, 0.05));
    let scan = observe(&localizer, &true_pose, &mount, 5.0)?;

    let mut sink: Vec<PoseWithCovariance> = Vec::new();
    let report = localizer.handle_scan(&scan, &mut sink)?;
    assert!(report.decision.is_accepted());

    let pose = localizer.pose();
    assert_relative_eq!(pose.translation[0], true_pose.translation[0], epsilon = 0.05);
    assert_relative_eq!(pose.translation[1], true_pose.translation[1], epsilon = 0.05);
    assert_relative_eq!(pose.yaw(), true_pose.yaw(), epsilon = 0.01);

    let sensor = localizer.current_sensor_pose(&scan)?;
    let expected = true_pose.compose(&mount);
    assert_relative_eq!(sensor.translation[0], expected.translation[0], epsilon = 0.05);
    assert_relative_eq!(sensor.translation[1], expected.translation[1], epsilon = 0.05);
    Ok(())
}

#[test]
fn test_degenerate_scan() -> Result<(), Box<dyn std::error::Error>> {
    let mut localizer = Localizer::new(make_config(), RigidTransform::IDENTITY)?;
    localizer.handle_map(make_room()?);
    let pose = RigidTransform::from_planar(1.0, 1.0, 0.0);
    localizer.seed_pose(pose, 0.0);
    let before = *localizer.estimate();

    let scan = make_template(1.0);
    let mut sink: Vec<PoseWithCovariance> = Vec::new();
    let res = localizer.handle_scan(&scan, &mut sink);

    assert!(matches!(
        res,
        Err(LocalizerError::InsufficientPoints {
            cloud: CloudKind::Laser,
            found: 0,
            ..
        })
    ));
    assert_eq!(*localizer.estimate(), before);
    assert!(sink.is_empty());
    Ok(())
}

#[test]
fn test_unknown_map_gives_no_simulated_points() -> Result<(), Box<dyn std::error::Error>> {
    let mut localizer = Localizer::new(make_config(), RigidTransform::IDENTITY)?;
    let pose = RigidTransform::IDENTITY;

    localizer.handle_map(make_room()?);
    let scan = observe(&localizer, &pose, &RigidTransform::IDENTITY, 1.0)?;

    // a map without obstacles yields an empty simulated scan
    let empty = OccupancyGrid::filled(
        200,
        200,
        0.05,
        RigidTransform::from_planar(-5.0, -5.0, 0.0),
        UNKNOWN_CELL,
    )?;
    localizer.handle_map(empty);

    let mut sink: Vec<PoseWithCovariance> = Vec::new();
    let res = localizer.handle_scan(&scan, &mut sink);
    assert!(matches!(
        res,
        Err(LocalizerError::InsufficientPoints {
            cloud: CloudKind::Simulated,
            ..
        })
    ));
    assert!(sink.is_empty());
    Ok(())
}

#[test]
fn test_small_corrections_are_suppressed() -> Result<(), Box<dyn std::error::Error>> {
    let mut localizer = Localizer::new(make_config(), RigidTransform::IDENTITY)?;
    localizer.handle_map(make_room()?);

    let true_pose = RigidTransform::from_planar(0.5, -0.5, 0.1);
    let hypothesis = RigidTransform::from_planar(0.505, -0.5, 0.1);
    localizer.seed_pose(hypothesis, 10.0);
    let before = *localizer.estimate();

    let mut sink: Vec<PoseWithCovariance> = Vec::new();
    for stamp in [10.2, 10.6] {
        let scan = observe(&localizer, &true_pose, &RigidTransform::IDENTITY, stamp)?;
        let report = localizer.handle_scan(&scan, &mut sink)?;
        assert!(matches!(
            report.decision,
            GateDecision::Reject(RejectReason::InsignificantAndTooSoon { .. })
        ));
    }
    assert_eq!(*localizer.estimate(), before);
    assert!(sink.is_empty());

    // once the interval elapsed the small correction goes through
    let scan = observe(&localizer, &true_pose, &RigidTransform::IDENTITY, 11.5)?;
    let report = localizer.handle_scan(&scan, &mut sink)?;
    assert!(report.decision.is_accepted());
    let x = localizer.pose().translation[0];
    assert!(x < 0.505 && x > 0.495, "pose x {x}");
    Ok(())
}

#[test]
fn test_implausible_jump_keeps_pose() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = make_config();
    config.gate.max_jump_distance = 0.2;
    let mut localizer = Localizer::new(config, RigidTransform::IDENTITY)?;
    localizer.handle_map(make_room()?);

    let true_pose = RigidTransform::from_planar(0.5, 0.0, 0.0);
    let scan = observe(&localizer, &true_pose, &RigidTransform::IDENTITY, 1.0)?;

    let mut sink: Vec<PoseWithCovariance> = Vec::new();
    let report = localizer.handle_scan(&scan, &mut sink)?;
    assert!(matches!(
        report.decision,
        GateDecision::Reject(RejectReason::ImplausibleJump { .. })
    ));
    assert_eq!(*localizer.pose(), RigidTransform::IDENTITY);
    assert!(sink.is_empty());
    Ok(())
}

#[test]
fn test_event_loop() -> Result<(), Box<dyn std::error::Error>> {
    let mut localizer = Localizer::new(make_config(), RigidTransform::IDENTITY)?;
    let room = make_room()?;

    // scans are generated up front with a helper localizer owning the same map
    let mut observer = Localizer::new(make_config(), RigidTransform::IDENTITY)?;
    observer.handle_map(room.clone());
    let true_pose = RigidTransform::from_planar(-0.3, 0.2, 0.0);
    let good_scan = observe(&observer, &true_pose, &RigidTransform::IDENTITY, 1.0)?;
    let early_scan = observe(&observer, &true_pose, &RigidTransform::IDENTITY, 0.5)?;
    let bad_scan = make_template(2.0);

    let (tx, rx) = std::sync::mpsc::channel();
    let producer = std::thread::spawn(move || -> Result<(), std::sync::mpsc::SendError<Event>> {
        tx.send(Event::Scan(early_scan))?;
        tx.send(Event::Map(room))?;
        tx.send(Event::SeedPose(RigidTransform::IDENTITY, 0.0))?;
        tx.send(Event::Scan(good_scan))?;
        tx.send(Event::Scan(bad_scan))?;
        Ok(())
    });

    let mut sink: Vec<PoseWithCovariance> = Vec::new();
    let stats = localizer.run(rx, &mut sink);
    producer.join().map_err(|_| "producer panicked")??;

    assert_eq!(stats.maps, 1);
    assert_eq!(stats.scans, 3);
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.rejected, 0);
    // one scan before the map, one without valid returns
    assert_eq!(stats.failed, 2);
    assert_eq!(sink.len(), 1);
    assert_relative_eq!(localizer.pose().translation[0], -0.3, epsilon = 0.05);
    assert_relative_eq!(localizer.pose().translation[1], 0.2, epsilon = 0.05);
    Ok(())
}
