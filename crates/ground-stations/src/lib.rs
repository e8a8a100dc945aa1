//! Ground Stations Library
//!
//! Ground station records for the dynamic state pipeline. A station has a
//! gid (its index), a geodetic location and the derived Earth-fixed
//! cartesian position used for ground-to-satellite link distances.
//!
//! Two line formats are supported:
//!
//! ```text
//! basic:    gid,name,latitude_deg,longitude_deg,elevation_m
//! extended: gid,name,latitude_deg,longitude_deg,elevation_m,x_m,y_m,z_m
//! ```

use nalgebra::Vector3;
use orbital_mechanics::transforms::geodetic_to_ecef;
use orbital_mechanics::{OrbitalError, Position};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum StationError {
    #[error("Failed to access {path}: {source}")]
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
    #[error("Invalid location for station {gid}: {source}")]
    InvalidLocation {
        gid: usize,
        #[source]
        source: OrbitalError,
    },
}

pub type Result<T> = std::result::Result<T, StationError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroundStation {
    pub gid: usize,
    pub name: String,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub elevation_m: f64,
    pub ecef_x_m: f64,
    pub ecef_y_m: f64,
    pub ecef_z_m: f64,
}

impl GroundStation {
    /// Build a station from its geodetic location, deriving the cartesian
    /// position on the WGS72 ellipsoid
    pub fn from_geodetic(
        gid: usize,
        name: impl Into<String>,
        latitude_deg: f64,
        longitude_deg: f64,
        elevation_m: f64,
    ) -> Result<Self> {
        let ecef = geodetic_to_ecef(latitude_deg, longitude_deg, elevation_m)
            .map_err(|source| StationError::InvalidLocation { gid, source })?;
        Ok(Self {
            gid,
            name: name.into(),
            latitude_deg,
            longitude_deg,
            elevation_m,
            ecef_x_m: ecef.x,
            ecef_y_m: ecef.y,
            ecef_z_m: ecef.z,
        })
    }

    /// Earth-fixed position (m)
    pub fn ecef(&self) -> Position {
        Vector3::new(self.ecef_x_m, self.ecef_y_m, self.ecef_z_m)
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| StationError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Split a line into exactly `expected` comma-separated fields
fn fields<'a>(path: &Path, line_no: usize, line: &'a str, expected: usize) -> Result<Vec<&'a str>> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() != expected {
        return Err(StationError::Parse {
            path: path.to_path_buf(),
            line: line_no,
            message: format!("expected {} fields, got {}", expected, parts.len()),
        });
    }
    Ok(parts)
}

fn parse_field<T: std::str::FromStr>(path: &Path, line_no: usize, name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| StationError::Parse {
        path: path.to_path_buf(),
        line: line_no,
        message: format!("invalid {} '{}': {}", name, value, e),
    })
}

fn check_gid(path: &Path, line_no: usize, gid: usize, expected: usize) -> Result<()> {
    if gid != expected {
        return Err(StationError::Parse {
            path: path.to_path_buf(),
            line: line_no,
            message: format!("ground station ids must be sequential: expected {}, got {}", expected, gid),
        });
    }
    Ok(())
}

fn non_empty_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty())
}

/// Read a basic ground station file, deriving cartesian positions
pub fn read_basic(path: impl AsRef<Path>) -> Result<Vec<GroundStation>> {
    let path = path.as_ref();
    let content = read_file(path)?;

    let mut stations = Vec::new();
    for (line_no, line) in non_empty_lines(&content) {
        let f = fields(path, line_no, line, 5)?;
        let gid: usize = parse_field(path, line_no, "gid", f[0])?;
        check_gid(path, line_no, gid, stations.len())?;
        stations.push(GroundStation::from_geodetic(
            gid,
            f[1],
            parse_field(path, line_no, "latitude", f[2])?,
            parse_field(path, line_no, "longitude", f[3])?,
            parse_field(path, line_no, "elevation", f[4])?,
        )?);
    }

    info!("Loaded {} basic ground stations from {:?}", stations.len(), path);
    Ok(stations)
}

/// Read an extended ground station file
pub fn read_extended(path: impl AsRef<Path>) -> Result<Vec<GroundStation>> {
    let path = path.as_ref();
    let content = read_file(path)?;

    let mut stations = Vec::new();
    for (line_no, line) in non_empty_lines(&content) {
        let f = fields(path, line_no, line, 8)?;
        let gid: usize = parse_field(path, line_no, "gid", f[0])?;
        check_gid(path, line_no, gid, stations.len())?;
        stations.push(GroundStation {
            gid,
            name: f[1].to_string(),
            latitude_deg: parse_field(path, line_no, "latitude", f[2])?,
            longitude_deg: parse_field(path, line_no, "longitude", f[3])?,
            elevation_m: parse_field(path, line_no, "elevation", f[4])?,
            ecef_x_m: parse_field(path, line_no, "x", f[5])?,
            ecef_y_m: parse_field(path, line_no, "y", f[6])?,
            ecef_z_m: parse_field(path, line_no, "z", f[7])?,
        });
    }

    info!("Loaded {} ground stations from {:?}", stations.len(), path);
    Ok(stations)
}

/// Write stations in the extended format
pub fn write_extended(path: impl AsRef<Path>, stations: &[GroundStation]) -> Result<()> {
    let path = path.as_ref();
    let mut out = String::new();
    for s in stations {
        // Writing to a String cannot fail
        let _ = writeln!(
            out,
            "{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            s.gid, s.name, s.latitude_deg, s.longitude_deg, s.elevation_m, s.ecef_x_m, s.ecef_y_m, s.ecef_z_m
        );
    }
    let io_err = |source: std::io::Error| StationError::Io {
        path: path.to_path_buf(),
        source,
    };

    // Temp file in the target directory, renamed into place
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(out.as_bytes()).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

/// Convert a basic file into an extended one
pub fn extend_ground_stations(basic: impl AsRef<Path>, extended: impl AsRef<Path>) -> Result<Vec<GroundStation>> {
    let stations = read_basic(basic)?;
    write_extended(extended, &stations)?;
    Ok(stations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_basic_derives_position() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "0,Null Island,0.0,0.0,0.0").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "1,North,90.0,0.0,0.0").unwrap();

        let stations = read_basic(file.path()).unwrap();
        assert_eq!(stations.len(), 2);
        assert!((stations[0].ecef_x_m - 6_378_135.0).abs() < 1e-3);
        assert!(stations[1].ecef_x_m.abs() < 1e-3);
    }

    #[test]
    fn test_extended_round_trip_preserves_stations() {
        let stations = vec![
            GroundStation::from_geodetic(0, "Paris", 48.8566, 2.3522, 35.0).unwrap(),
            GroundStation::from_geodetic(1, "Moscow", 55.7558, 37.6173, 156.0).unwrap(),
        ];
        let file = NamedTempFile::new().unwrap();
        write_extended(file.path(), &stations).unwrap();

        let loaded = read_extended(file.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].name, "Moscow");
        assert!((loaded[0].ecef() - stations[0].ecef()).norm() < 1e-3);
    }

    #[test]
    fn test_write_extended_replaces_existing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ground_stations.txt");
        fs::write(&path, "stale contents\n").unwrap();

        let stations = vec![GroundStation::from_geodetic(0, "Paris", 48.8566, 2.3522, 35.0).unwrap()];
        write_extended(&path, &stations).unwrap();

        assert_eq!(read_extended(&path).unwrap().len(), 1);
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_non_sequential_gid_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1,Paris,48.8,2.3,35.0,1.0,2.0,3.0").unwrap();

        let err = read_extended(file.path()).unwrap_err();
        assert!(matches!(err, StationError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_invalid_location_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "0,Nowhere,123.0,0.0,0.0").unwrap();

        assert!(matches!(
            read_basic(file.path()),
            Err(StationError::InvalidLocation { gid: 0, .. })
        ));
    }
}
