use std::sync::Arc;

use laserloc_scan::occupancy_grid::OccupancyGrid;

/// A map together with the version it was stored under.
#[derive(Debug, Clone)]
pub struct MapSnapshot {
    /// The occupancy grid.
    pub grid: Arc<OccupancyGrid>,
    /// Version of the store when the grid was inserted, starting at 1.
    pub version: u64,
}

/// Holds the latest occupancy grid.
///
/// Each update replaces the whole grid. Readers take a [`MapSnapshot`] and
/// keep using it even if the store is updated afterwards.
#[derive(Debug, Default)]
pub struct MapStore {
    current: Option<MapSnapshot>,
}

impl MapStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored grid and return the new version.
    pub fn replace(&mut self, grid: OccupancyGrid) -> u64 {
        let version = self.version() + 1;
        self.current = Some(MapSnapshot {
            grid: Arc::new(grid),
            version,
        });
        version
    }

    /// The current grid, if a map has been received.
    pub fn snapshot(&self) -> Option<MapSnapshot> {
        self.current.clone()
    }

    /// Version of the current grid, `0` before the first map.
    pub fn version(&self) -> u64 {
        self.current.as_ref().map_or(0, |snapshot| snapshot.version)
    }

    /// Whether a map has been received.
    pub fn has_map(&self) -> bool {
        self.current.is_some()
    }
}
