//! Geometry replayed from explicit snapshots

use crate::{GeometryProvider, OrbitalError, PositionSnapshot, Result};
use std::collections::BTreeMap;

/// Serves the latest snapshot at or before the requested time.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGeometry {
    snapshots: BTreeMap<i64, PositionSnapshot>,
    satellites: usize,
    relays: usize,
    ground_stations: usize,
}

impl ScriptedGeometry {
    /// Geometry that never changes
    pub fn fixed(snapshot: PositionSnapshot) -> Self {
        let mut snapshot = snapshot;
        snapshot.t_ns = 0;
        Self {
            satellites: snapshot.satellites.len(),
            relays: snapshot.relays.len(),
            ground_stations: snapshot.ground_stations.len(),
            snapshots: BTreeMap::from([(0, snapshot)]),
        }
    }

    pub fn from_snapshots(snapshots: impl IntoIterator<Item = PositionSnapshot>) -> Result<Self> {
        let mut geometry = Self::default();
        for snapshot in snapshots {
            geometry.insert(snapshot)?;
        }
        Ok(geometry)
    }

    /// Add a snapshot; all snapshots must describe the same node counts
    pub fn insert(&mut self, snapshot: PositionSnapshot) -> Result<()> {
        if self.snapshots.is_empty() {
            self.satellites = snapshot.satellites.len();
            self.relays = snapshot.relays.len();
            self.ground_stations = snapshot.ground_stations.len();
        } else if snapshot.satellites.len() != self.satellites
            || snapshot.relays.len() != self.relays
            || snapshot.ground_stations.len() != self.ground_stations
        {
            return Err(OrbitalError::InconsistentSnapshot {
                t_ns: snapshot.t_ns,
                message: format!(
                    "expected {}/{}/{} satellites/relays/ground stations, got {}/{}/{}",
                    self.satellites,
                    self.relays,
                    self.ground_stations,
                    snapshot.satellites.len(),
                    snapshot.relays.len(),
                    snapshot.ground_stations.len()
                ),
            });
        }
        self.snapshots.insert(snapshot.t_ns, snapshot);
        Ok(())
    }
}

impl GeometryProvider for ScriptedGeometry {
    fn satellite_count(&self) -> usize {
        self.satellites
    }

    fn relay_count(&self) -> usize {
        self.relays
    }

    fn ground_station_count(&self) -> usize {
        self.ground_stations
    }

    fn snapshot(&self, t_ns: i64) -> Result<PositionSnapshot> {
        let (_, snapshot) = self
            .snapshots
            .range(..=t_ns)
            .next_back()
            .ok_or(OrbitalError::NoSnapshot(t_ns))?;
        let mut snapshot = snapshot.clone();
        snapshot.t_ns = t_ns;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn snapshot(t_ns: i64, x: f64) -> PositionSnapshot {
        PositionSnapshot::new(t_ns, vec![Vector3::new(x, 0.0, 0.0)], Vec::new(), Vec::new())
    }

    #[test]
    fn test_latest_snapshot_wins() {
        let geometry =
            ScriptedGeometry::from_snapshots([snapshot(0, 1.0), snapshot(100, 2.0)]).unwrap();

        assert_eq!(geometry.snapshot(0).unwrap().satellites[0].x, 1.0);
        assert_eq!(geometry.snapshot(99).unwrap().satellites[0].x, 1.0);
        assert_eq!(geometry.snapshot(100).unwrap().satellites[0].x, 2.0);
        assert_eq!(geometry.snapshot(5_000).unwrap().t_ns, 5_000);
    }

    #[test]
    fn test_missing_snapshot() {
        let geometry = ScriptedGeometry::from_snapshots([snapshot(10, 1.0)]).unwrap();
        assert!(matches!(geometry.snapshot(5), Err(OrbitalError::NoSnapshot(5))));
    }

    #[test]
    fn test_inconsistent_counts_rejected() {
        let mut geometry = ScriptedGeometry::fixed(snapshot(0, 1.0));
        let bad = PositionSnapshot::new(10, Vec::new(), Vec::new(), Vec::new());
        assert!(geometry.insert(bad).is_err());
    }
}
