use laserloc_icp::IcpError;
use laserloc_scan::ScanError;

/// The point cloud a conversion failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudKind {
    /// Cloud built from the scan simulated in the map.
    Simulated,
    /// Cloud built from the real laser scan.
    Laser,
}

impl std::fmt::Display for CloudKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloudKind::Simulated => write!(f, "simulated"),
            CloudKind::Laser => write!(f, "laser"),
        }
    }
}

/// Errors that abort the processing of a single scan or the loading of a configuration.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LocalizerError {
    /// No map has been received yet.
    #[error("No map available")]
    MapUnavailable,

    /// The pose of the sensor on the robot could not be looked up.
    #[error("Sensor transform unavailable: {0}")]
    TransformUnavailable(String),

    /// A cloud kept too few points after filtering.
    #[error("The {cloud} cloud has {found} points, at least {required} are required")]
    InsufficientPoints {
        /// Which cloud failed.
        cloud: CloudKind,
        /// Number of points left after filtering.
        found: usize,
        /// Configured minimum point count.
        required: usize,
    },

    /// Registration could not produce a usable transform.
    #[error("Registration failed. {0}")]
    RegistrationFailed(#[from] IcpError),

    /// The scan geometry is unusable.
    #[error("Invalid scan. {0}")]
    InvalidScan(ScanError),

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The configuration file could not be read.
    #[error("Failed to read configuration file")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON.
    #[error("Failed to parse configuration")]
    Json(#[from] serde_json::Error),
}

impl LocalizerError {
    /// Attribute a conversion failure to `cloud`.
    pub(crate) fn from_scan(cloud: CloudKind, err: ScanError) -> Self {
        match err {
            ScanError::InsufficientPoints { found, required } => {
                LocalizerError::InsufficientPoints {
                    cloud,
                    found,
                    required,
                }
            }
            other => LocalizerError::InvalidScan(other),
        }
    }
}
