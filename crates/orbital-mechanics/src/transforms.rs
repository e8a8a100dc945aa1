//! Coordinate transforms between geodetic, Earth-fixed and the propagator's
//! inertial frame.

use crate::{OrbitalError, Position, Result};
use chrono::{DateTime, Utc};
use nalgebra::{Rotation3, Vector3};
use std::f64::consts::TAU;

/// WGS72 equatorial radius (m), the ellipsoid SGP4 is defined against
pub const EARTH_RADIUS_M: f64 = 6_378_135.0;
/// WGS72 flattening
pub const EARTH_FLATTENING: f64 = 1.0 / 298.26;

const SECONDS_PER_DAY: f64 = 86_400.0;
const JULIAN_DATE_UNIX_EPOCH: f64 = 2_440_587.5;
const JULIAN_DATE_J2000: f64 = 2_451_545.0;

/// Geodetic latitude/longitude (degrees) and elevation (m) to Earth-fixed
/// cartesian coordinates (m)
pub fn geodetic_to_ecef(latitude_deg: f64, longitude_deg: f64, elevation_m: f64) -> Result<Position> {
    if !(-90.0..=90.0).contains(&latitude_deg) || !latitude_deg.is_finite() {
        return Err(OrbitalError::InvalidCoordinates(format!(
            "latitude {} out of range",
            latitude_deg
        )));
    }
    if !(-180.0..=180.0).contains(&longitude_deg) || !longitude_deg.is_finite() {
        return Err(OrbitalError::InvalidCoordinates(format!(
            "longitude {} out of range",
            longitude_deg
        )));
    }

    let lat_rad = latitude_deg.to_radians();
    let lon_rad = longitude_deg.to_radians();
    let e2 = 2.0 * EARTH_FLATTENING - EARTH_FLATTENING * EARTH_FLATTENING;

    // Radius of curvature in the prime vertical
    let n = EARTH_RADIUS_M / (1.0 - e2 * lat_rad.sin().powi(2)).sqrt();

    Ok(Vector3::new(
        (n + elevation_m) * lat_rad.cos() * lon_rad.cos(),
        (n + elevation_m) * lat_rad.cos() * lon_rad.sin(),
        (n * (1.0 - e2) + elevation_m) * lat_rad.sin(),
    ))
}

/// Greenwich mean sidereal time (radians, in [0, 2π))
pub fn gmst_rad(time: DateTime<Utc>) -> f64 {
    let unix_seconds = time.timestamp() as f64 + time.timestamp_subsec_nanos() as f64 * 1e-9;
    let jd = unix_seconds / SECONDS_PER_DAY + JULIAN_DATE_UNIX_EPOCH;
    let t = (jd - JULIAN_DATE_J2000) / 36_525.0;

    // IAU 1982 model, in seconds of time
    let gmst_s = 67_310.548_41
        + (876_600.0 * 3_600.0 + 8_640_184.812_866) * t
        + 0.093_104 * t * t
        - 6.2e-6 * t * t * t;

    (gmst_s.rem_euclid(SECONDS_PER_DAY) / SECONDS_PER_DAY * TAU).rem_euclid(TAU)
}

/// Rotate an Earth-fixed position into the inertial frame at `time`
pub fn ecef_to_inertial(position: &Position, time: DateTime<Utc>) -> Position {
    Rotation3::from_axis_angle(&Vector3::z_axis(), gmst_rad(time)) * position
}
