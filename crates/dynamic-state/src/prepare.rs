//! Run preparation
//!
//! Writes the static inputs a run needs next to the TLE and ground station
//! files: the ISL list, the interfaces info files and `description.txt`.

use crate::config::{LinkLimits, DESCRIPTION_FILE};
use crate::delta::write_atomic;
use crate::inputs::Isl;
use crate::Result;
use orbital_mechanics::transforms::EARTH_RADIUS_M;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

/// Lowest altitude an ISL may dip to (m)
pub const MIN_ISL_ALTITUDE_M: f64 = 80_000.0;

/// Slant range to the edge of a satellite's ground coverage cone
pub fn max_gsl_length_m(satellite_cone_radius_m: f64, altitude_m: f64) -> f64 {
    satellite_cone_radius_m.hypot(altitude_m)
}

/// Longest chord between two satellites that stays above [`MIN_ISL_ALTITUDE_M`]
pub fn max_isl_length_m(altitude_m: f64) -> f64 {
    2.0 * ((EARTH_RADIUS_M + altitude_m).powi(2) - (EARTH_RADIUS_M + MIN_ISL_ALTITUDE_M).powi(2)).sqrt()
}

/// Distance from a satellite to a relay at the edge of its visible horizon
pub fn max_ill_length_m(altitude_m: f64, relay_altitude_m: f64) -> f64 {
    ((EARTH_RADIUS_M + relay_altitude_m).powi(2) - (EARTH_RADIUS_M + altitude_m).powi(2)).sqrt()
}

/// "+ grid": every satellite links to its successor in the same orbit and to
/// the satellite `shift` slots further in the next orbit.
pub fn plus_grid_isls(num_orbits: usize, sats_per_orbit: usize, shift: usize) -> Vec<Isl> {
    let mut isls = Vec::with_capacity(2 * num_orbits * sats_per_orbit);
    let mut seen = HashSet::new();

    for orbit in 0..num_orbits {
        for slot in 0..sats_per_orbit {
            let sat = orbit * sats_per_orbit + slot;
            let same_orbit = orbit * sats_per_orbit + (slot + 1) % sats_per_orbit;
            let next_orbit = ((orbit + 1) % num_orbits) * sats_per_orbit + (slot + shift) % sats_per_orbit;

            for other in [same_orbit, next_orbit] {
                if other != sat && seen.insert((sat.min(other), sat.max(other))) {
                    isls.push(Isl::new(sat, other));
                }
            }
        }
    }

    isls
}

pub fn write_isls(path: impl AsRef<Path>, isls: &[Isl]) -> Result<()> {
    let mut out = String::new();
    for isl in isls {
        let _ = writeln!(out, "{} {}", isl.a, isl.b);
    }
    write_atomic(path.as_ref(), &out)?;
    info!("Wrote {} ISLs to {:?}", isls.len(), path.as_ref());
    Ok(())
}

/// Interfaces info for satellites then ground stations; relay rows follow
/// when `relay` is given as (count, interfaces, bandwidth)
pub fn write_simple_interfaces_info(
    path: impl AsRef<Path>,
    num_satellites: usize,
    num_ground_stations: usize,
    satellite: (usize, f64),
    ground_station: (usize, f64),
    relay: Option<(usize, usize, f64)>,
) -> Result<()> {
    let mut out = String::new();
    for node_id in 0..num_satellites {
        let _ = writeln!(out, "{},{},{:.6}", node_id, satellite.0, satellite.1);
    }
    for gid in 0..num_ground_stations {
        let _ = writeln!(
            out,
            "{},{},{:.6}",
            num_satellites + gid,
            ground_station.0,
            ground_station.1
        );
    }
    if let Some((num_relays, interfaces, bandwidth)) = relay {
        for rid in 0..num_relays {
            let _ = writeln!(
                out,
                "{},{},{:.6}",
                num_satellites + num_ground_stations + rid,
                interfaces,
                bandwidth
            );
        }
    }
    write_atomic(path.as_ref(), &out)
}

/// ILL interfaces: satellites then relays, relay ids after the ground stations
pub fn write_simple_ill_interfaces_info(
    path: impl AsRef<Path>,
    num_satellites: usize,
    num_ground_stations: usize,
    num_relays: usize,
    satellite: (usize, f64),
    relay: (usize, f64),
) -> Result<()> {
    let mut out = String::new();
    for node_id in 0..num_satellites {
        let _ = writeln!(out, "{},{},{:.6}", node_id, satellite.0, satellite.1);
    }
    for rid in 0..num_relays {
        let _ = writeln!(
            out,
            "{},{},{:.6}",
            num_satellites + num_ground_stations + rid,
            relay.0,
            relay.1
        );
    }
    write_atomic(path.as_ref(), &out)
}

pub fn write_description(dir: impl AsRef<Path>, limits: &LinkLimits) -> Result<()> {
    let contents = format!(
        "max_gsl_length_m={:.10}\nmax_isl_length_m={:.10}\nmax_ill_length_m={:.10}\n",
        limits.max_gsl_length_m, limits.max_isl_length_m, limits.max_ill_length_m
    );
    write_atomic(&dir.as_ref().join(DESCRIPTION_FILE), &contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::{read_interfaces_info, read_isls};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_plus_grid() {
        let isls = plus_grid_isls(3, 4, 0);
        assert_eq!(isls.len(), 24);
        assert_eq!(isls[0], Isl::new(0, 1));
        assert_eq!(isls[1], Isl::new(0, 4));
        // Last orbit wraps to the first
        assert!(isls.contains(&Isl::new(8, 0)));
        assert!(isls.contains(&Isl::new(3, 0)));
    }

    #[test]
    fn test_plus_grid_shift() {
        let isls = plus_grid_isls(2, 4, 1);
        assert!(isls.contains(&Isl::new(0, 5)));
        assert!(isls.contains(&Isl::new(7, 4)));
    }

    #[test]
    fn test_plus_grid_small_constellations_have_no_duplicates() {
        // Two orbits: orbit 1's "next orbit" links duplicate orbit 0's
        let isls = plus_grid_isls(2, 2, 0);
        assert_eq!(isls, vec![Isl::new(0, 1), Isl::new(0, 2), Isl::new(1, 3), Isl::new(2, 3)]);
        assert!(plus_grid_isls(1, 1, 0).is_empty());
    }

    #[test]
    fn test_starlink_bounds() {
        let gsl = max_gsl_length_m(940_700.0, 550_000.0);
        assert!((gsl - 1_089_686.418_2).abs() < 1e-3);

        let isl = max_isl_length_m(550_000.0);
        assert!((isl - 5_016_591.233).abs() < 1e-2);

        let ill = max_ill_length_m(550_000.0, 35_768_000.0);
        assert!((ill - 41_572_799.290_6).abs() < 1e-2);
    }

    #[test]
    fn test_written_files_read_back() {
        let dir = TempDir::new().unwrap();

        let isls = plus_grid_isls(3, 3, 0);
        write_isls(dir.path().join("isls.txt"), &isls).unwrap();
        assert_eq!(read_isls(dir.path().join("isls.txt"), 9).unwrap(), isls);

        let path = dir.path().join("gsl_interfaces_info.txt");
        write_simple_interfaces_info(&path, 9, 2, (1, 1.0), (1, 1.0), Some((3, 1, 10.0))).unwrap();
        let rows = read_interfaces_info(&path, 9, 2, 3).unwrap();
        assert_eq!(rows.len(), 14);
        assert_eq!(rows[13].aggregate_max_bandwidth, 10.0);

        let limits = LinkLimits::new(1.5, 2.25, 3.125);
        write_description(dir.path(), &limits).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join(DESCRIPTION_FILE)).unwrap(),
            "max_gsl_length_m=1.5000000000\nmax_isl_length_m=2.2500000000\nmax_ill_length_m=3.1250000000\n"
        );
        assert_eq!(
            LinkLimits::read_description(dir.path().join(DESCRIPTION_FILE)).unwrap(),
            limits
        );
    }

    #[test]
    fn test_ill_interfaces_info() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ill_interfaces_info.txt");
        write_simple_ill_interfaces_info(&path, 2, 1, 2, (1, 1.0), (4, 2.0)).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "0,1,1.000000\n1,1,1.000000\n3,4,2.000000\n4,4,2.000000\n"
        );
    }
}
