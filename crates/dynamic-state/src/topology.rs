//! Topology Builder
//!
//! Per epoch: the distance-weighted ISL graph over satellites, the stable
//! per-satellite ISL interface numbering, and each ground station's
//! satellites in range.

use crate::inputs::Isl;
use crate::{DynamicStateError, NodePair, Result};
use orbital_mechanics::PositionSnapshot;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use tracing::debug;

/// Local ISL interface numbering.
///
/// Interfaces are assigned in ISL declaration order, counting independently
/// per endpoint. The GSL interface follows the last ISL interface, so a
/// satellite's GSL interface index equals its ISL count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IslInterfaces {
    per_satellite: Vec<usize>,
    by_pair: HashMap<NodePair, usize>,
}

impl IslInterfaces {
    pub fn from_isls(num_satellites: usize, isls: &[Isl]) -> Self {
        let mut per_satellite = vec![0; num_satellites];
        let mut by_pair = HashMap::with_capacity(isls.len() * 2);
        for isl in isls {
            by_pair.insert(NodePair::new(isl.a, isl.b), per_satellite[isl.a]);
            by_pair.insert(NodePair::new(isl.b, isl.a), per_satellite[isl.b]);
            per_satellite[isl.a] += 1;
            per_satellite[isl.b] += 1;
        }
        Self {
            per_satellite,
            by_pair,
        }
    }

    /// Number of ISL interfaces of a satellite
    #[inline]
    pub fn count(&self, sat: usize) -> usize {
        self.per_satellite[sat]
    }

    pub fn counts(&self) -> &[usize] {
        &self.per_satellite
    }

    /// Interface on `from` whose link leads to `to`
    #[inline]
    pub fn interface(&self, from: usize, to: usize) -> Option<usize> {
        self.by_pair.get(&NodePair::new(from, to)).copied()
    }
}

/// A satellite in range of a ground station
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GslCandidate {
    pub distance_m: f64,
    pub sat: usize,
}

/// Validated topology for one epoch
#[derive(Debug, Clone)]
pub struct Topology {
    pub t_ns: i64,
    /// Satellites only; node index == satellite id, edge weight == distance (m)
    pub graph: UnGraph<usize, f64>,
    pub interfaces: IslInterfaces,
    /// Per ground station, satellites within max GSL length in id order
    pub visibility: Vec<Vec<GslCandidate>>,
}

impl Topology {
    pub fn num_satellites(&self) -> usize {
        self.graph.node_count()
    }

    pub fn num_ground_stations(&self) -> usize {
        self.visibility.len()
    }

    /// Node id of a ground station: ground stations follow all satellites
    #[inline]
    pub fn ground_node_id(&self, gid: usize) -> usize {
        self.num_satellites() + gid
    }

    /// ISL neighbours of a satellite with the link length (m)
    pub fn neighbors(&self, sat: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let idx = NodeIndex::new(sat);
        self.graph.edges(idx).map(move |e| {
            let other = if e.source() == idx { e.target() } else { e.source() };
            (other.index(), *e.weight())
        })
    }
}

/// Build the epoch's topology.
///
/// Fails with [`DynamicStateError::TopologyInvariantViolation`] if any
/// declared ISL is longer than `max_isl_length_m`.
pub fn build_topology(
    snapshot: &PositionSnapshot,
    isls: &[Isl],
    max_isl_length_m: f64,
    max_gsl_length_m: f64,
) -> Result<Topology> {
    let num_satellites = snapshot.satellites.len();

    let mut graph = UnGraph::with_capacity(num_satellites, isls.len());
    for sid in 0..num_satellites {
        graph.add_node(sid);
    }

    for isl in isls {
        let distance_m = snapshot.sat_to_sat(isl.a, isl.b);
        if distance_m > max_isl_length_m {
            return Err(DynamicStateError::TopologyInvariantViolation {
                sat_a: isl.a,
                sat_b: isl.b,
                distance_m,
                max_isl_length_m,
                t_ns: snapshot.t_ns,
            });
        }
        graph.add_edge(NodeIndex::new(isl.a), NodeIndex::new(isl.b), distance_m);
    }

    let interfaces = IslInterfaces::from_isls(num_satellites, isls);

    let visibility: Vec<Vec<GslCandidate>> = (0..snapshot.ground_stations.len())
        .map(|gid| {
            (0..num_satellites)
                .filter_map(|sat| {
                    let distance_m = snapshot.ground_to_sat(gid, sat);
                    (distance_m <= max_gsl_length_m).then_some(GslCandidate { distance_m, sat })
                })
                .collect()
        })
        .collect();

    if let (Some(min), Some(max)) = (
        interfaces.counts().iter().min(),
        interfaces.counts().iter().max(),
    ) {
        debug!(
            "t={}ns: {} ISLs, {}..{} ISLs/satellite",
            snapshot.t_ns,
            isls.len(),
            min,
            max
        );
    }
    if let (Some(min), Some(max)) = (
        visibility.iter().map(Vec::len).min(),
        visibility.iter().map(Vec::len).max(),
    ) {
        debug!(
            "t={}ns: {}..{} satellites in range per ground station",
            snapshot.t_ns, min, max
        );
    }

    Ok(Topology {
        t_ns: snapshot.t_ns,
        graph,
        interfaces,
        visibility,
    })
}
