//! Static run inputs: ISL list, interfaces info and ground stations
//!
//! These are loaded once per shard and never change during a run.

use crate::{DynamicStateError, NodePair, Result};
use ground_stations::GroundStation;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::info;

/// A static inter-satellite link, in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Isl {
    pub a: usize,
    pub b: usize,
}

impl Isl {
    pub fn new(a: usize, b: usize) -> Self {
        Self { a, b }
    }

    /// Endpoint pair with the lower id first; `0-1` and `1-0` share a key
    pub fn unordered(&self) -> NodePair {
        NodePair::new(self.a.min(self.b), self.a.max(self.b))
    }
}

/// One row of the interfaces-info file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterfaceInfo {
    pub node_id: usize,
    pub num_interfaces: usize,
    pub aggregate_max_bandwidth: f64,
}

fn parse_err(path: &Path, line: usize, message: impl Into<String>) -> DynamicStateError {
    DynamicStateError::Parse {
        path: path.to_path_buf(),
        line,
        message: message.into(),
    }
}

fn read_lines(path: &Path) -> Result<Vec<(usize, String)>> {
    let content = fs::read_to_string(path).map_err(|e| DynamicStateError::io(path, e))?;
    Ok(content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim().to_string()))
        .filter(|(_, l)| !l.is_empty())
        .collect())
}

/// Read the ISL file (`a,b` or `a b` per line)
pub fn read_isls(path: impl AsRef<Path>, num_satellites: usize) -> Result<Vec<Isl>> {
    let path = path.as_ref();
    let mut isls = Vec::new();
    let mut seen = HashSet::new();

    for (line_no, line) in read_lines(path)? {
        let ids: Vec<usize> = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<usize>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| parse_err(path, line_no, format!("invalid satellite id: {}", e)))?;
        let (a, b) = match ids.as_slice() {
            [a, b] => (*a, *b),
            _ => return Err(parse_err(path, line_no, "expected exactly two satellite ids")),
        };

        if a >= num_satellites || b >= num_satellites {
            return Err(parse_err(
                path,
                line_no,
                format!("ISL {}-{} references a satellite outside 0..{}", a, b, num_satellites),
            ));
        }
        if a == b {
            return Err(parse_err(path, line_no, format!("ISL {}-{} is a self-loop", a, b)));
        }
        if !seen.insert(Isl::new(a, b).unordered()) {
            return Err(parse_err(path, line_no, format!("duplicate ISL {}-{}", a, b)));
        }

        isls.push(Isl::new(a, b));
    }

    info!("Loaded {} ISLs from {:?}", isls.len(), path);
    Ok(isls)
}

/// Read the interfaces-info file.
///
/// Rows for all satellites and ground stations are required; relay rows are
/// optional but, when present, must cover every relay satellite.
pub fn read_interfaces_info(
    path: impl AsRef<Path>,
    num_satellites: usize,
    num_ground_stations: usize,
    num_relays: usize,
) -> Result<Vec<InterfaceInfo>> {
    let path = path.as_ref();
    let mut rows = Vec::new();

    for (line_no, line) in read_lines(path)? {
        let f: Vec<&str> = line.split(',').map(str::trim).collect();
        if f.len() != 3 {
            return Err(parse_err(path, line_no, format!("expected 3 fields, got {}", f.len())));
        }
        let node_id: usize = f[0]
            .parse()
            .map_err(|e| parse_err(path, line_no, format!("invalid node id '{}': {}", f[0], e)))?;
        let num_interfaces: usize = f[1].parse().map_err(|e| {
            parse_err(path, line_no, format!("invalid interface count '{}': {}", f[1], e))
        })?;
        let aggregate_max_bandwidth: f64 = f[2]
            .parse()
            .map_err(|e| parse_err(path, line_no, format!("invalid bandwidth '{}': {}", f[2], e)))?;

        if node_id != rows.len() {
            return Err(parse_err(
                path,
                line_no,
                format!("node ids must be sequential: expected {}, got {}", rows.len(), node_id),
            ));
        }
        if !aggregate_max_bandwidth.is_finite() || aggregate_max_bandwidth < 0.0 {
            return Err(parse_err(path, line_no, "bandwidth must be finite and non-negative"));
        }

        rows.push(InterfaceInfo {
            node_id,
            num_interfaces,
            aggregate_max_bandwidth,
        });
    }

    let required = num_satellites + num_ground_stations;
    if rows.len() != required && rows.len() != required + num_relays {
        return Err(DynamicStateError::InvalidInput(format!(
            "{:?} has {} rows, expected {} (satellites + ground stations) or {} (with relays)",
            path,
            rows.len(),
            required,
            required + num_relays
        )));
    }

    Ok(rows)
}

/// Everything a shard needs besides geometry
#[derive(Debug, Clone)]
pub struct StaticInputs {
    pub num_satellites: usize,
    pub num_relays: usize,
    pub ground_stations: Vec<GroundStation>,
    pub isls: Vec<Isl>,
    pub interfaces: Vec<InterfaceInfo>,
}

impl StaticInputs {
    pub fn new(
        num_satellites: usize,
        num_relays: usize,
        ground_stations: Vec<GroundStation>,
        isls: Vec<Isl>,
        interfaces: Vec<InterfaceInfo>,
    ) -> Result<Self> {
        let inputs = Self {
            num_satellites,
            num_relays,
            ground_stations,
            isls,
            interfaces,
        };
        inputs.validate()?;
        Ok(inputs)
    }

    pub fn num_ground_stations(&self) -> usize {
        self.ground_stations.len()
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.isls.len());
        for isl in &self.isls {
            if isl.a >= self.num_satellites || isl.b >= self.num_satellites || isl.a == isl.b {
                return Err(DynamicStateError::InvalidInput(format!(
                    "ISL {}-{} is invalid for {} satellites",
                    isl.a, isl.b, self.num_satellites
                )));
            }
            // Unordered pairs must be unique
            if !seen.insert(isl.unordered()) {
                return Err(DynamicStateError::InvalidInput(format!(
                    "duplicate ISL {}-{}",
                    isl.a, isl.b
                )));
            }
        }

        let required = self.num_satellites + self.num_ground_stations();
        if self.interfaces.len() < required {
            return Err(DynamicStateError::InvalidInput(format!(
                "interfaces info covers {} nodes, need at least {}",
                self.interfaces.len(),
                required
            )));
        }

        // Exactly one GSL interface per satellite and ground station
        for info in &self.interfaces[..required] {
            if info.num_interfaces != 1 {
                return Err(DynamicStateError::InvalidInput(format!(
                    "node {} has {} GSL interfaces, exactly 1 is supported",
                    info.node_id, info.num_interfaces
                )));
            }
        }

        Ok(())
    }
}
