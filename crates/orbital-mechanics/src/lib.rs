//! Orbital Mechanics Library
//!
//! Geometry provider for the two-layer constellation: SGP4 propagation of the
//! low-orbit and relay TLE sets, Earth-fixed/inertial transforms, and the
//! per-epoch [`PositionSnapshot`] consumed by the dynamic state pipeline.
//!
//! All positions are Earth-centred cartesian coordinates in metres, expressed
//! in a single frame per snapshot so that every pairwise distance is
//! frame-consistent.

use nalgebra::Vector3;
use std::path::PathBuf;
use thiserror::Error;

pub mod propagation;
pub mod scripted;
pub mod tle;
pub mod transforms;

pub use propagation::TlePropagator;
pub use scripted::ScriptedGeometry;
pub use tle::{read_tles, Tle, TleSet};

#[derive(Error, Debug)]
pub enum OrbitalError {
    #[error("Invalid TLE format: {0}")]
    InvalidTle(String),
    #[error("Propagation failed: {0}")]
    PropagationFailed(String),
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("TLE epochs differ within one set: {0} vs {1}")]
    EpochMismatch(String, String),
    #[error("No position snapshot available at or before t={0}ns")]
    NoSnapshot(i64),
    #[error("Inconsistent snapshot at t={t_ns}ns: {message}")]
    InconsistentSnapshot { t_ns: i64, message: String },
}

pub type Result<T> = std::result::Result<T, OrbitalError>;

/// Cartesian position in metres
pub type Position = Vector3<f64>;

/// Positions of every node of the network at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSnapshot {
    /// Time since the run epoch
    pub t_ns: i64,
    /// Low-orbit satellites, indexed by satellite id
    pub satellites: Vec<Position>,
    /// Relay (geostationary layer) satellites, indexed by relay id
    pub relays: Vec<Position>,
    /// Ground stations, indexed by gid
    pub ground_stations: Vec<Position>,
}

impl PositionSnapshot {
    pub fn new(
        t_ns: i64,
        satellites: Vec<Position>,
        relays: Vec<Position>,
        ground_stations: Vec<Position>,
    ) -> Self {
        Self {
            t_ns,
            satellites,
            relays,
            ground_stations,
        }
    }

    /// Distance between two low-orbit satellites (m)
    #[inline]
    pub fn sat_to_sat(&self, a: usize, b: usize) -> f64 {
        (self.satellites[a] - self.satellites[b]).norm()
    }

    /// Distance between a low-orbit satellite and a relay satellite (m)
    #[inline]
    pub fn sat_to_relay(&self, sat: usize, relay: usize) -> f64 {
        (self.satellites[sat] - self.relays[relay]).norm()
    }

    /// Distance between a ground station and a low-orbit satellite (m)
    #[inline]
    pub fn ground_to_sat(&self, gid: usize, sat: usize) -> f64 {
        (self.ground_stations[gid] - self.satellites[sat]).norm()
    }
}

/// Source of node positions over time.
///
/// Each shard of a run owns its own clone, so implementations hold only
/// read-only data.
pub trait GeometryProvider: Clone + Send {
    fn satellite_count(&self) -> usize;

    fn relay_count(&self) -> usize;

    fn ground_station_count(&self) -> usize;

    /// Positions at `t_ns` nanoseconds after the run epoch
    fn snapshot(&self, t_ns: i64) -> Result<PositionSnapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_distances() {
        let snapshot = PositionSnapshot::new(
            0,
            vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(3.0, 4.0, 0.0)],
            vec![Vector3::new(0.0, 0.0, 10.0)],
            vec![Vector3::new(0.0, 0.0, -2.0)],
        );

        assert_eq!(snapshot.sat_to_sat(0, 1), 5.0);
        assert_eq!(snapshot.sat_to_sat(1, 0), 5.0);
        assert_eq!(snapshot.sat_to_relay(0, 0), 10.0);
        assert_eq!(snapshot.ground_to_sat(0, 0), 2.0);
    }
}
