//! TLE set files
//!
//! Line format: a header `<num_orbits> <sats_per_orbit>`, followed by one
//! name/line1/line2 triple per satellite in id order. Every TLE of a set must
//! share one epoch.

use crate::{OrbitalError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// A single two-line element set with its name line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tle {
    pub name: String,
    pub line1: String,
    pub line2: String,
}

impl Tle {
    pub fn elements(&self) -> Result<sgp4::Elements> {
        sgp4::Elements::from_tle(
            Some(self.name.clone()),
            self.line1.as_bytes(),
            self.line2.as_bytes(),
        )
        .map_err(|e| OrbitalError::InvalidTle(format!("{}: {:?}", self.name, e)))
    }
}

/// A parsed TLE file. Every TLE has been checked to parse as SGP4 elements.
#[derive(Debug, Clone)]
pub struct TleSet {
    pub num_orbits: usize,
    pub sats_per_orbit: usize,
    pub tles: Vec<Tle>,
    /// Shared epoch of every TLE in the set
    pub epoch: DateTime<Utc>,
}

impl TleSet {
    pub fn len(&self) -> usize {
        self.tles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tles.is_empty()
    }
}

/// Read and validate a TLE set file
pub fn read_tles(path: impl AsRef<Path>) -> Result<TleSet> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| OrbitalError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_tles(path, &content)
}

fn parse_tles(path: &Path, content: &str) -> Result<TleSet> {
    let parse_err = |line: usize, message: String| OrbitalError::Parse {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut lines = content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim_end()))
        .filter(|(_, l)| !l.trim().is_empty());

    let (header_no, header) = lines
        .next()
        .ok_or_else(|| parse_err(1, "missing header line".to_string()))?;
    let dims: Vec<usize> = header
        .split_whitespace()
        .map(|v| v.parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| parse_err(header_no, format!("invalid header '{}': {}", header, e)))?;
    let (num_orbits, sats_per_orbit) = match dims.as_slice() {
        [orbits, per_orbit] => (*orbits, *per_orbit),
        _ => {
            return Err(parse_err(
                header_no,
                format!("header must be '<num_orbits> <sats_per_orbit>', got '{}'", header),
            ))
        }
    };

    let body: Vec<(usize, &str)> = lines.collect();
    if body.len() % 3 != 0 {
        let last = body.last().map(|(n, _)| *n).unwrap_or(header_no);
        return Err(parse_err(
            last,
            "TLE body must consist of name/line1/line2 triples".to_string(),
        ));
    }

    let mut tles = Vec::with_capacity(body.len() / 3);
    let mut epochs = Vec::with_capacity(body.len() / 3);
    for chunk in body.chunks(3) {
        let tle = Tle {
            name: chunk[0].1.trim().to_string(),
            line1: chunk[1].1.to_string(),
            line2: chunk[2].1.to_string(),
        };
        let parsed = tle
            .elements()
            .map_err(|e| parse_err(chunk[1].0, e.to_string()))?;
        epochs.push(parsed.datetime);
        tles.push(tle);
    }

    if tles.len() != num_orbits * sats_per_orbit {
        return Err(parse_err(
            header_no,
            format!(
                "header declares {} x {} satellites but {} TLEs follow",
                num_orbits,
                sats_per_orbit,
                tles.len()
            ),
        ));
    }

    let epoch = match epochs.first() {
        Some(first) => {
            if let Some(other) = epochs.iter().find(|e| *e != first) {
                return Err(OrbitalError::EpochMismatch(first.to_string(), other.to_string()));
            }
            DateTime::<Utc>::from_naive_utc_and_offset(*first, Utc)
        }
        None => DateTime::<Utc>::default(),
    };

    debug!("Parsed {} TLEs from {:?} (epoch {})", tles.len(), path, epoch);

    Ok(TleSet {
        num_orbits,
        sats_per_orbit,
        tles,
        epoch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ISS_LINE1: &str =
        "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927";
    const ISS_LINE2: &str =
        "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537";

    #[test]
    fn test_read_tles() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1 2").unwrap();
        for i in 0..2 {
            writeln!(file, "ISS {}", i).unwrap();
            writeln!(file, "{}", ISS_LINE1).unwrap();
            writeln!(file, "{}", ISS_LINE2).unwrap();
        }

        let set = read_tles(file.path()).unwrap();
        assert_eq!(set.num_orbits, 1);
        assert_eq!(set.sats_per_orbit, 2);
        assert_eq!(set.len(), 2);
        assert_eq!(set.tles[1].name, "ISS 1");
    }

    #[test]
    fn test_header_count_mismatch() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "2 2").unwrap();
        writeln!(file, "ISS").unwrap();
        writeln!(file, "{}", ISS_LINE1).unwrap();
        writeln!(file, "{}", ISS_LINE2).unwrap();

        let err = read_tles(file.path()).unwrap_err();
        assert!(matches!(err, OrbitalError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_truncated_body() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1 1").unwrap();
        writeln!(file, "ISS").unwrap();
        writeln!(file, "{}", ISS_LINE1).unwrap();

        assert!(read_tles(file.path()).is_err());
    }
}
