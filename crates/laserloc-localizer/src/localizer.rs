use std::sync::mpsc::Receiver;

use laserloc_3d::{pointcloud::PointCloud, transforms::RigidTransform};
use laserloc_icp::{icp_vanilla, ICPResult};
use laserloc_scan::{
    conversion::scan_to_pointcloud, laser_scan::LaserScan, occupancy_grid::OccupancyGrid,
    simulator::ScanSimulator,
};

use crate::{
    config::LocalizerConfig,
    error::{CloudKind, LocalizerError},
    gate::{GateDecision, PoseEstimate, PoseGatekeeper, PoseWithCovariance},
    map_store::MapStore,
};

/// Looks up where the laser is mounted on the robot.
pub trait FrameSource {
    /// Pose of the sensor that produced `scan` in the robot base frame.
    ///
    /// Implementations return [`LocalizerError::TransformUnavailable`] when
    /// the pose is not known for the scan.
    fn sensor_pose(&self, scan: &LaserScan) -> Result<RigidTransform, LocalizerError>;
}

/// A sensor rigidly mounted at a fixed pose.
impl FrameSource for RigidTransform {
    fn sensor_pose(&self, _scan: &LaserScan) -> Result<RigidTransform, LocalizerError> {
        Ok(*self)
    }
}

/// Receives the poses and debug values produced while processing scans.
pub trait PoseSink {
    /// Called for every accepted pose.
    fn publish_pose(&mut self, pose: &PoseWithCovariance);

    /// Called with the simulated scan when enabled.
    fn publish_simulated_scan(&mut self, _scan: &LaserScan) {}

    /// Called with the cloud of the simulated scan when enabled.
    fn publish_simulated_cloud(&mut self, _cloud: &PointCloud) {}

    /// Called with the cloud of the real scan when enabled.
    fn publish_laser_cloud(&mut self, _cloud: &PointCloud) {}

    /// Called with the real cloud moved by the registration result when enabled.
    fn publish_transformed_laser_cloud(&mut self, _cloud: &PointCloud) {}
}

/// Collects accepted poses, ignoring debug values.
impl PoseSink for Vec<PoseWithCovariance> {
    fn publish_pose(&mut self, pose: &PoseWithCovariance) {
        self.push(*pose);
    }
}

/// Input of the localizer.
#[derive(Debug, Clone)]
pub enum Event {
    /// A new map replacing the previous one.
    Map(OccupancyGrid),
    /// A scan from the laser.
    Scan(LaserScan),
    /// An externally provided robot pose and its time in seconds.
    SeedPose(RigidTransform, f64),
}

/// What happened to a processed scan.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Registration of the real cloud onto the simulated one.
    pub registration: ICPResult,
    /// Whether the registration updated the pose.
    pub decision: GateDecision,
    /// Version of the map the scan was matched against.
    pub map_version: u64,
}

/// Counters of a [`Localizer::run`] loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Maps received.
    pub maps: usize,
    /// Scans received.
    pub scans: usize,
    /// Scans whose correction was accepted.
    pub accepted: usize,
    /// Scans whose correction was rejected by the gate.
    pub rejected: usize,
    /// Scans skipped because of an error.
    pub failed: usize,
}

/// Corrects the robot pose by matching laser scans against a known map.
///
/// The localizer owns the map and the pose estimate. Events are processed one
/// at a time and a scan runs to completion before the next event is looked at,
/// so the pose changes at most once per scan.
pub struct Localizer<F: FrameSource> {
    config: LocalizerConfig,
    maps: MapStore,
    gatekeeper: PoseGatekeeper,
    simulator: ScanSimulator,
    frames: F,
}

impl<F: FrameSource> Localizer<F> {
    /// Create a localizer at the identity pose, without a map.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration, validated before use.
    /// * `frames` - Source of the laser mounting pose.
    pub fn new(config: LocalizerConfig, frames: F) -> Result<Self, LocalizerError> {
        config.validate()?;
        Ok(Self {
            maps: MapStore::new(),
            gatekeeper: PoseGatekeeper::new(config.gate.clone(), config.covariance),
            simulator: ScanSimulator::new(config.simulated_cloud.max_distance, config.simulator),
            frames,
            config,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &LocalizerConfig {
        &self.config
    }

    /// Replace the configuration, keeping the map and the pose.
    pub fn set_config(&mut self, config: LocalizerConfig) -> Result<(), LocalizerError> {
        config.validate()?;
        self.gatekeeper
            .set_params(config.gate.clone(), config.covariance);
        self.simulator = ScanSimulator::new(config.simulated_cloud.max_distance, config.simulator);
        self.config = config;
        Ok(())
    }

    /// The current pose estimate.
    pub fn estimate(&self) -> &PoseEstimate {
        self.gatekeeper.estimate()
    }

    /// The current pose of the robot in the map frame.
    pub fn pose(&self) -> &RigidTransform {
        self.gatekeeper.pose()
    }

    /// Version of the stored map, `0` before the first map.
    pub fn map_version(&self) -> u64 {
        self.maps.version()
    }

    /// Store a new map, replacing the previous one.
    pub fn handle_map(&mut self, grid: OccupancyGrid) -> u64 {
        let (width, height, resolution) = (grid.width(), grid.height(), grid.resolution());
        let version = self.maps.replace(grid);
        log::info!(
            "Received map {}x{} at {} m/cell (version {})",
            width,
            height,
            resolution,
            version
        );
        version
    }

    /// Set the robot pose from an external source.
    pub fn seed_pose(&mut self, pose: RigidTransform, stamp: f64) {
        log::info!(
            "Pose seeded at ({:.3}, {:.3}, {:.3})",
            pose.translation[0],
            pose.translation[1],
            pose.yaw()
        );
        self.gatekeeper.seed(pose, stamp);
    }

    /// Pose of the laser that produced `scan` in the map frame.
    pub fn current_sensor_pose(&self, scan: &LaserScan) -> Result<RigidTransform, LocalizerError> {
        let mount = self.frames.sensor_pose(scan)?;
        Ok(self.gatekeeper.pose().compose(&mount))
    }

    /// Simulate the scan a laser at `sensor_pose` would see in the current map.
    ///
    /// # Arguments
    ///
    /// * `sensor_pose` - Pose of the laser in the map frame.
    /// * `template` - Scan providing the angular layout and minimum range.
    pub fn simulate_scan(
        &self,
        sensor_pose: &RigidTransform,
        template: &LaserScan,
    ) -> Result<LaserScan, LocalizerError> {
        let map = self.maps.snapshot().ok_or(LocalizerError::MapUnavailable)?;
        self.simulator
            .simulate(&map.grid, sensor_pose, template)
            .map_err(LocalizerError::InvalidScan)
    }

    /// Match a scan against the map and gate the resulting correction.
    ///
    /// The scan is simulated from the current pose, both scans are turned into
    /// clouds in the robot frame and the real cloud is registered onto the
    /// simulated one. The registration transform is then handed to the gate.
    ///
    /// # Arguments
    ///
    /// * `scan` - The real laser scan. Its stamp is the update time.
    /// * `sink` - Receives the accepted pose and the enabled debug values.
    ///
    /// # Returns
    ///
    /// The registration and gate decision, or the error that stopped the
    /// scan. The pose is unchanged on error.
    pub fn handle_scan(
        &mut self,
        scan: &LaserScan,
        sink: &mut impl PoseSink,
    ) -> Result<ScanReport, LocalizerError> {
        // the whole run uses the map present at its start
        let map = self.maps.snapshot().ok_or(LocalizerError::MapUnavailable)?;
        let mount = self.frames.sensor_pose(scan)?;
        let sensor_pose = self.gatekeeper.pose().compose(&mount);
        let debug = self.config.debug;

        let simulated = self
            .simulator
            .simulate(&map.grid, &sensor_pose, scan)
            .map_err(LocalizerError::InvalidScan)?;
        if debug.simulated_scan {
            sink.publish_simulated_scan(&simulated);
        }

        let simulated_cloud =
            scan_to_pointcloud(&simulated, &mount, &self.config.simulated_cloud)
                .map_err(|e| LocalizerError::from_scan(CloudKind::Simulated, e))?;
        if debug.simulated_cloud {
            sink.publish_simulated_cloud(&simulated_cloud);
        }

        let laser_cloud = scan_to_pointcloud(scan, &mount, &self.config.laser_cloud)
            .map_err(|e| LocalizerError::from_scan(CloudKind::Laser, e))?;
        if debug.laser_cloud {
            sink.publish_laser_cloud(&laser_cloud);
        }

        let registration = icp_vanilla(
            &laser_cloud,
            &simulated_cloud,
            RigidTransform::IDENTITY,
            &self.config.icp,
        )?;
        if debug.transformed_laser_cloud {
            sink.publish_transformed_laser_cloud(&laser_cloud.transformed(&registration.transform));
        }

        let decision =
            self.gatekeeper
                .consider(&registration.transform, registration.fitness, scan.stamp);

        match &decision {
            GateDecision::Accept(pose) => {
                log::info!(
                    "Pose updated to ({:.3}, {:.3}, {:.3}), fitness {:.6}",
                    pose.pose.translation[0],
                    pose.pose.translation[1],
                    pose.pose.yaw(),
                    registration.fitness
                );
                sink.publish_pose(pose);
            }
            GateDecision::Reject(reason) => {
                log::debug!("Correction at {:.3} rejected: {}", scan.stamp, reason);
            }
        }

        Ok(ScanReport {
            registration,
            decision,
            map_version: map.version,
        })
    }

    /// Process a single event.
    ///
    /// Returns the report of a processed scan, `None` for other events.
    pub fn handle_event(
        &mut self,
        event: Event,
        sink: &mut impl PoseSink,
    ) -> Result<Option<ScanReport>, LocalizerError> {
        match event {
            Event::Map(grid) => {
                self.handle_map(grid);
                Ok(None)
            }
            Event::Scan(scan) => self.handle_scan(&scan, sink).map(Some),
            Event::SeedPose(pose, stamp) => {
                self.seed_pose(pose, stamp);
                Ok(None)
            }
        }
    }

    /// Process events until every sender is dropped.
    ///
    /// Scan failures are logged and the loop moves on to the next event.
    pub fn run(&mut self, events: Receiver<Event>, sink: &mut impl PoseSink) -> RunStats {
        let mut stats = RunStats::default();

        for event in events.iter() {
            let is_scan = matches!(event, Event::Scan(_));
            if matches!(event, Event::Map(_)) {
                stats.maps += 1;
            }
            if is_scan {
                stats.scans += 1;
            }

            match self.handle_event(event, sink) {
                Ok(Some(report)) if report.decision.is_accepted() => stats.accepted += 1,
                Ok(Some(_)) => stats.rejected += 1,
                Ok(None) => {}
                Err(err) => {
                    log::warn!("Skipping scan: {}", err);
                    stats.failed += 1;
                }
            }
        }

        log::debug!("Event loop finished: {:?}", stats);
        stats
    }
}
