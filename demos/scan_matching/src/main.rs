use argh::FromArgs;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;

use laserloc::l3d::{pointcloud::PointCloud, transforms::RigidTransform};
use laserloc::localizer::{gate::PoseWithCovariance, Event, Localizer, LocalizerConfig, PoseSink};
use laserloc::scan::{
    laser_scan::LaserScan,
    occupancy_grid::{OccupancyGrid, FREE_CELL, OCCUPIED_CELL},
    simulator::{ScanSimulator, SimulatorParams},
};

#[derive(FromArgs)]
/// Correct a perturbed robot pose by matching synthetic scans against a map
struct Args {
    /// path to a JSON configuration file
    #[argh(option)]
    config: Option<PathBuf>,

    /// initial error of the pose estimate along x, in meters
    #[argh(option, default = "0.3")]
    offset_x: f64,

    /// initial error of the pose estimate along y, in meters
    #[argh(option, default = "-0.2")]
    offset_y: f64,

    /// initial heading error of the pose estimate, in radians
    #[argh(option, default = "0.05")]
    offset_yaw: f64,

    /// number of scans to process
    #[argh(option, default = "20")]
    num_scans: usize,

    /// amplitude of the range noise, in meters
    #[argh(option, default = "0.01")]
    noise: f64,

    /// distance the robot drives between two scans, in meters
    #[argh(option, default = "0.02")]
    step: f64,
}

/// Logs accepted poses and the extent of the debug clouds.
struct LoggingSink {
    accepted: Vec<PoseWithCovariance>,
}

impl PoseSink for LoggingSink {
    fn publish_pose(&mut self, pose: &PoseWithCovariance) {
        println!(
            "[{:6.2}s] pose ({:.3}, {:.3}, {:.3})",
            pose.stamp,
            pose.pose.translation[0],
            pose.pose.translation[1],
            pose.pose.yaw()
        );
        self.accepted.push(*pose);
    }

    fn publish_simulated_cloud(&mut self, cloud: &PointCloud) {
        log_cloud("simulated", cloud);
    }

    fn publish_laser_cloud(&mut self, cloud: &PointCloud) {
        log_cloud("laser", cloud);
    }

    fn publish_transformed_laser_cloud(&mut self, cloud: &PointCloud) {
        log_cloud("transformed laser", cloud);
    }
}

fn log_cloud(name: &str, cloud: &PointCloud) {
    if let Some((lo, hi)) = cloud.bounds() {
        log::debug!(
            "{} cloud: #{} points within [{:.2}, {:.2}] x [{:.2}, {:.2}]",
            name,
            cloud.len(),
            lo[0],
            hi[0],
            lo[1],
            hi[1]
        );
    }
}

// 12m x 8m hall with 5cm cells and a few pillars
fn create_map() -> Result<OccupancyGrid, Box<dyn std::error::Error>> {
    let origin = RigidTransform::from_planar(-6.0, -4.0, 0.0);
    let mut grid = OccupancyGrid::filled(240, 160, 0.05, origin, FREE_CELL)?;
    grid.fill_rect([-6.0, -4.0], [6.0, -3.95], OCCUPIED_CELL);
    grid.fill_rect([-6.0, 3.95], [6.0, 4.0], OCCUPIED_CELL);
    grid.fill_rect([-6.0, -4.0], [-5.95, 4.0], OCCUPIED_CELL);
    grid.fill_rect([5.95, -4.0], [6.0, 4.0], OCCUPIED_CELL);
    grid.fill_rect([-3.0, 1.0], [-2.5, 1.5], OCCUPIED_CELL);
    grid.fill_rect([1.5, -2.5], [2.5, -2.2], OCCUPIED_CELL);
    grid.fill_rect([3.5, 2.0], [3.8, 3.95], OCCUPIED_CELL);
    Ok(grid)
}

fn create_template(stamp: f64) -> LaserScan {
    let increment = std::f64::consts::PI / 720.0;
    LaserScan {
        stamp,
        angle_min: -2.35,
        angle_max: -2.35 + 1079.0 * increment,
        angle_increment: increment,
        range_min: 0.05,
        range_max: 12.0,
        ranges: Vec::new(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config = match &args.config {
        Some(path) => LocalizerConfig::from_json_file(path)?,
        None => LocalizerConfig::default(),
    };

    let sensor_map = create_map()?;
    let mount = RigidTransform::from_planar(0.15, 0.0, 0.0);
    let start = RigidTransform::from_planar(-2.0, -0.5, 0.1);
    let offset = RigidTransform::from_planar(args.offset_x, args.offset_y, args.offset_yaw);

    let mut localizer = Localizer::new(config, mount)?;
    let mut sink = LoggingSink {
        accepted: Vec::new(),
    };

    // the sensor side produces scans from the ground truth on its own thread
    let (tx, rx) = std::sync::mpsc::channel();
    let num_scans = args.num_scans;
    let (step, noise) = (args.step, args.noise.abs());
    let sensor = std::thread::spawn(move || -> Result<RigidTransform, String> {
        let simulator = ScanSimulator::new(12.0, SimulatorParams::default());
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let mut truth = start;

        tx.send(Event::Map(sensor_map.clone()))
            .map_err(|e| e.to_string())?;
        tx.send(Event::SeedPose(start.compose(&offset), 0.0))
            .map_err(|e| e.to_string())?;

        for i in 0..num_scans {
            let stamp = 0.1 * (i + 1) as f64;
            truth = truth.compose(&RigidTransform::from_planar(step, 0.0, 0.0));

            let mut scan = simulator
                .simulate(&sensor_map, &truth.compose(&mount), &create_template(stamp))
                .map_err(|e| e.to_string())?;
            for range in scan.ranges.iter_mut().filter(|r| r.is_finite()) {
                *range += rng.random_range(-noise..=noise);
            }

            tx.send(Event::Scan(scan)).map_err(|e| e.to_string())?;
        }
        Ok(truth)
    });

    let stats = localizer.run(rx, &mut sink);
    let truth = sensor.join().map_err(|_| "sensor thread panicked")??;

    println!("Processed {} scans: {:?}", stats.scans, stats);

    let error = localizer.pose().inverse().compose(&truth);
    println!(
        "Final error: {:.3} m, {:.4} rad ({} updates)",
        error.translation_norm(),
        error.yaw().abs(),
        sink.accepted.len()
    );

    Ok(())
}
