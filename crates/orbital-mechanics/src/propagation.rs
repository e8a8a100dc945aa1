//! SGP4-backed geometry provider

use crate::tle::{read_tles, Tle, TleSet};
use crate::transforms::ecef_to_inertial;
use crate::{GeometryProvider, OrbitalError, Position, PositionSnapshot, Result};
use chrono::{DateTime, Duration, Utc};
use nalgebra::Vector3;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const METRES_PER_KM: f64 = 1000.0;

#[derive(Debug, Clone, Copy)]
pub struct StateVector {
    /// Inertial (TEME) position in metres
    pub position: Position,
    /// Inertial (TEME) velocity in metres per second
    pub velocity: Vector3<f64>,
    pub epoch: DateTime<Utc>,
}

/// SGP4 constants of one satellite, initialized once from its TLE
pub struct Sgp4Model {
    name: String,
    constants: sgp4::Constants,
    epoch: DateTime<Utc>,
}

impl Sgp4Model {
    pub fn from_tle(tle: &Tle) -> Result<Self> {
        let elements = tle.elements()?;
        let constants = sgp4::Constants::from_elements(&elements)
            .map_err(|e| OrbitalError::PropagationFailed(format!("{}: {:?}", tle.name, e)))?;
        Ok(Self {
            name: tle.name.clone(),
            constants,
            epoch: DateTime::<Utc>::from_naive_utc_and_offset(elements.datetime, Utc),
        })
    }

    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    pub fn propagate(&self, time: DateTime<Utc>) -> Result<StateVector> {
        let duration = time.signed_duration_since(self.epoch);
        let minutes_since_epoch = duration.num_milliseconds() as f64 / 60_000.0;

        let prediction = self
            .constants
            .propagate(minutes_since_epoch)
            .map_err(|e| OrbitalError::PropagationFailed(format!("{}: {:?}", self.name, e)))?;

        Ok(StateVector {
            position: Vector3::new(
                prediction.position[0],
                prediction.position[1],
                prediction.position[2],
            ) * METRES_PER_KM,
            velocity: Vector3::new(
                prediction.velocity[0],
                prediction.velocity[1],
                prediction.velocity[2],
            ) * METRES_PER_KM,
            epoch: time,
        })
    }
}

impl fmt::Debug for Sgp4Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sgp4Model")
            .field("name", &self.name)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

fn build_models(set: &TleSet) -> Result<Arc<[Sgp4Model]>> {
    set.tles.iter().map(Sgp4Model::from_tle).collect()
}

/// Propagates both satellite layers from their TLE sets.
///
/// Models are built once and shared read-only between clones, so every
/// shard propagates without re-initializing SGP4. Ground stations are given
/// in the Earth-fixed frame and rotated into the propagator frame at every
/// snapshot.
#[derive(Debug, Clone)]
pub struct TlePropagator {
    epoch: DateTime<Utc>,
    satellites: Arc<[Sgp4Model]>,
    relays: Arc<[Sgp4Model]>,
    ground_stations_ecef: Vec<Position>,
}

impl TlePropagator {
    /// The run epoch is the epoch of the low-orbit set.
    pub fn new(satellites: &TleSet, relays: &TleSet, ground_stations_ecef: Vec<Position>) -> Result<Self> {
        Ok(Self {
            epoch: satellites.epoch,
            satellites: build_models(satellites)?,
            relays: build_models(relays)?,
            ground_stations_ecef,
        })
    }

    pub fn from_files(
        satellites_path: impl AsRef<Path>,
        relays_path: impl AsRef<Path>,
        ground_stations_ecef: Vec<Position>,
    ) -> Result<Self> {
        let satellites = read_tles(satellites_path)?;
        let relays = read_tles(relays_path)?;
        debug!(
            "Loaded {} satellites and {} relay satellites",
            satellites.len(),
            relays.len()
        );
        Self::new(&satellites, &relays, ground_stations_ecef)
    }

    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    fn absolute_time(&self, t_ns: i64) -> DateTime<Utc> {
        self.epoch + Duration::nanoseconds(t_ns)
    }
}

fn positions(models: &[Sgp4Model], time: DateTime<Utc>) -> Result<Vec<Position>> {
    models
        .iter()
        .map(|m| m.propagate(time).map(|s| s.position))
        .collect()
}

impl GeometryProvider for TlePropagator {
    fn satellite_count(&self) -> usize {
        self.satellites.len()
    }

    fn relay_count(&self) -> usize {
        self.relays.len()
    }

    fn ground_station_count(&self) -> usize {
        self.ground_stations_ecef.len()
    }

    fn snapshot(&self, t_ns: i64) -> Result<PositionSnapshot> {
        let time = self.absolute_time(t_ns);

        let satellites = positions(&self.satellites, time)?;
        let relays = positions(&self.relays, time)?;
        let ground_stations = self
            .ground_stations_ecef
            .iter()
            .map(|p| ecef_to_inertial(p, time))
            .collect();

        Ok(PositionSnapshot::new(t_ns, satellites, relays, ground_stations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::EARTH_RADIUS_M;

    fn iss() -> Tle {
        Tle {
            name: "ISS".to_string(),
            line1: "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927"
                .to_string(),
            line2: "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537"
                .to_string(),
        }
    }

    fn single_set(tle: Tle) -> TleSet {
        let elements = tle.elements().unwrap();
        let epoch = DateTime::<Utc>::from_naive_utc_and_offset(elements.datetime, Utc);
        TleSet {
            num_orbits: 1,
            sats_per_orbit: 1,
            tles: vec![tle],
            epoch,
        }
    }

    fn shard_owned<P: GeometryProvider + 'static>(provider: &P) -> P {
        let clone = provider.clone();
        std::thread::spawn(move || clone).join().unwrap()
    }

    #[test]
    fn test_propagated_altitude_is_leo() {
        let model = Sgp4Model::from_tle(&iss()).unwrap();
        let state = model.propagate(model.epoch()).unwrap();
        let altitude_m = state.position.norm() - EARTH_RADIUS_M;
        assert!(altitude_m > 300_000.0 && altitude_m < 450_000.0);
    }

    #[test]
    fn test_invalid_tle_rejected() {
        let mut tle = iss();
        tle.line2 = "2 garbage".to_string();
        assert!(Sgp4Model::from_tle(&tle).is_err());
    }

    #[test]
    fn test_snapshot_shapes() {
        let ground = vec![Vector3::new(EARTH_RADIUS_M, 0.0, 0.0)];
        let propagator = TlePropagator::new(&single_set(iss()), &single_set(iss()), ground).unwrap();

        assert_eq!(propagator.satellite_count(), 1);
        assert_eq!(propagator.relay_count(), 1);
        assert_eq!(propagator.ground_station_count(), 1);

        let snapshot = propagator.snapshot(60_000_000_000).unwrap();
        assert_eq!(snapshot.t_ns, 60_000_000_000);
        assert_eq!(snapshot.satellites.len(), 1);
        // Same elements in both layers
        assert!(snapshot.sat_to_relay(0, 0) < 1e-6);
        assert!((snapshot.ground_stations[0].norm() - EARTH_RADIUS_M).abs() < 1e-3);
    }

    #[test]
    fn test_clone_moved_to_worker_matches_original() {
        let set = single_set(iss());
        let propagator = TlePropagator::new(&set, &set.clone(), Vec::new()).unwrap();
        let worker = shard_owned(&propagator);

        assert_eq!(
            worker.snapshot(5_000_000_000).unwrap(),
            propagator.snapshot(5_000_000_000).unwrap()
        );
        assert!(format!("{:?}", worker).contains("ISS"));
    }

    #[test]
    fn test_satellite_moves_between_epochs() {
        let propagator = TlePropagator::new(&single_set(iss()), &single_set(iss()), Vec::new()).unwrap();
        let a = propagator.snapshot(0).unwrap();
        let b = propagator.snapshot(1_000_000_000).unwrap();
        let moved = (a.satellites[0] - b.satellites[0]).norm();
        // Roughly 7.7 km/s in low orbit
        assert!(moved > 7_000.0 && moved < 8_500.0);
    }
}
