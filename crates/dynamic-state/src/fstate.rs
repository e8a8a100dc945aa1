//! Forwarding Calculator
//!
//! Shortest paths only over the inter-satellite network; ground stations
//! never relay. Every path looks like
//! `(src gs) - (sat) - (sat) - ... - (sat) - (dst gs)`.
//!
//! Each (current node, destination ground station) entry carries up to
//! [`MAX_CANDIDATES`] next hops ranked by total path distance, so the
//! simulator can detour around congested links.

use crate::topology::Topology;
use crate::NodePair;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Ranked next hops kept per entry
pub const MAX_CANDIDATES: usize = 3;

/// One ranked next hop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NextHop {
    pub node: usize,
    /// Interface on the current node
    pub local_if: usize,
    /// Interface on the next hop
    pub remote_if: usize,
}

impl NextHop {
    pub fn new(node: usize, local_if: usize, remote_if: usize) -> Self {
        Self {
            node,
            local_if,
            remote_if,
        }
    }
}

/// Next hops of one entry; `None` slots are written as `-1,-1,-1`
pub type Candidates = [Option<NextHop>; MAX_CANDIDATES];

/// Next-hop node ids only, the part compared between epochs
pub type CandidateNodes = [Option<usize>; MAX_CANDIDATES];

pub fn candidate_nodes(candidates: &Candidates) -> CandidateNodes {
    candidates.map(|c| c.map(|hop| hop.node))
}

/// Dense all-pairs shortest path distances over the ISL graph.
///
/// `get(i, i) == 0`, unreachable pairs are `f64::INFINITY`.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    dist: Vec<f64>,
}

impl DistanceMatrix {
    /// Floyd-Warshall. Relaxation is symmetric in float arithmetic, so the
    /// result is exactly symmetric for an undirected graph.
    pub fn floyd_warshall(topology: &Topology) -> Self {
        let n = topology.num_satellites();
        let mut dist = vec![f64::INFINITY; n * n];
        for i in 0..n {
            dist[i * n + i] = 0.0;
        }
        for sat in 0..n {
            for (nb, weight) in topology.neighbors(sat) {
                if weight < dist[sat * n + nb] {
                    dist[sat * n + nb] = weight;
                }
            }
        }

        for k in 0..n {
            let row_k: Vec<f64> = dist[k * n..(k + 1) * n].to_vec();
            for i in 0..n {
                let d_ik = dist[i * n + k];
                if d_ik.is_infinite() {
                    continue;
                }
                let row_i = &mut dist[i * n..(i + 1) * n];
                for (d_ij, d_kj) in row_i.iter_mut().zip(&row_k) {
                    let via_k = d_ik + d_kj;
                    if via_k < *d_ij {
                        *d_ij = via_k;
                    }
                }
            }
        }

        Self { n, dist }
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.dist[i * self.n + j]
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }
}

/// Forwarding entries for one epoch in computation order: every satellite to
/// every ground station, then every ordered pair of distinct ground stations
#[derive(Debug, Clone, Default)]
pub struct ForwardingState {
    num_satellites: usize,
    num_ground_stations: usize,
    entries: Vec<(NodePair, Candidates)>,
}

impl ForwardingState {
    pub(crate) fn from_entries(
        num_satellites: usize,
        num_ground_stations: usize,
        entries: Vec<(NodePair, Candidates)>,
    ) -> Self {
        Self {
            num_satellites,
            num_ground_stations,
            entries,
        }
    }

    pub fn entries(&self) -> &[(NodePair, Candidates)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of `(current, destination)` in the fixed entry layout
    fn index_of(&self, current: usize, destination: usize) -> Option<usize> {
        let (ns, ng) = (self.num_satellites, self.num_ground_stations);
        let dst_gid = destination.checked_sub(ns).filter(|&g| g < ng)?;
        if current < ns {
            return Some(current * ng + dst_gid);
        }
        let src_gid = current.checked_sub(ns).filter(|&g| g < ng && g != dst_gid)?;
        let column = if dst_gid < src_gid { dst_gid } else { dst_gid - 1 };
        Some(ns * ng + src_gid * (ng - 1) + column)
    }

    pub fn get(&self, current: usize, destination: usize) -> Option<&Candidates> {
        let key = NodePair::new(current, destination);
        self.index_of(current, destination)
            .and_then(|i| self.entries.get(i))
            .filter(|(k, _)| *k == key)
            .map(|(_, c)| c)
    }

    /// Next-hop node ids keyed by entry, retained for the next epoch's diff
    pub fn node_map(&self) -> HashMap<NodePair, CandidateNodes> {
        self.entries
            .iter()
            .map(|(key, candidates)| (*key, candidate_nodes(candidates)))
            .collect()
    }

    /// Entries whose next-hop node ids differ from `previous`; every entry
    /// when there is no previous epoch. Interface indices are not compared.
    pub fn changed_since<'a>(
        &'a self,
        previous: Option<&'a HashMap<NodePair, CandidateNodes>>,
    ) -> impl Iterator<Item = &'a (NodePair, Candidates)> + 'a {
        self.entries.iter().filter(move |(key, candidates)| match previous {
            Some(prev) => prev.get(key) != Some(&candidate_nodes(candidates)),
            None => true,
        })
    }
}

/// `src,dst,n1,l1,r1,n2,l2,r2,n3,l3,r3`
pub fn format_entry(key: &NodePair, candidates: &Candidates) -> String {
    let mut line = format!("{},{}", key.from, key.to);
    for slot in candidates {
        match slot {
            Some(hop) => {
                let _ = write!(line, ",{},{},{}", hop.node, hop.local_if, hop.remote_if);
            }
            None => line.push_str(",-1,-1,-1"),
        }
    }
    line
}

fn by_distance_then_id(a: &(f64, usize), b: &(f64, usize)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

/// Compute the forwarding state for one epoch.
///
/// `gsl_if_of_ground_station[gid]` is the index, among a satellite's GSL
/// interfaces, used to reach ground station `gid` (0 with one GSL interface).
pub fn compute_forwarding(
    topology: &Topology,
    distances: &DistanceMatrix,
    gsl_if_of_ground_station: &[usize],
) -> ForwardingState {
    let num_satellites = topology.num_satellites();
    let num_ground_stations = topology.num_ground_stations();
    let interfaces = &topology.interfaces;

    let mut entries =
        Vec::with_capacity(num_satellites * num_ground_stations + num_ground_stations * num_ground_stations);

    // Best distance from each satellite to each ground station, reused for
    // ground station to ground station entries
    let mut to_ground = vec![f64::INFINITY; num_satellites * num_ground_stations];

    for curr in 0..num_satellites {
        for dst_gid in 0..num_ground_stations {
            let dst_node = topology.ground_node_id(dst_gid);
            let mut candidates: Candidates = [None; MAX_CANDIDATES];

            // Satellite in range of the destination with the shortest total distance
            let best = topology.visibility[dst_gid]
                .iter()
                .filter_map(|c| {
                    let d = distances.get(curr, c.sat);
                    d.is_finite().then_some((d + c.distance_m, c.sat))
                })
                .min_by(by_distance_then_id);

            if let Some((distance_m, target)) = best {
                to_ground[curr * num_ground_stations + dst_gid] = distance_m;

                if curr == target {
                    candidates[0] = Some(NextHop::new(
                        dst_node,
                        interfaces.count(target) + gsl_if_of_ground_station[dst_gid],
                        0,
                    ));
                } else {
                    let mut ranked: Vec<(f64, usize)> = topology
                        .neighbors(curr)
                        .filter_map(|(nb, weight)| {
                            let d = weight + distances.get(nb, target);
                            d.is_finite().then_some((d, nb))
                        })
                        .collect();
                    ranked.sort_by(by_distance_then_id);

                    for (slot, (_, nb)) in candidates.iter_mut().zip(ranked) {
                        if let (Some(local_if), Some(remote_if)) =
                            (interfaces.interface(curr, nb), interfaces.interface(nb, curr))
                        {
                            *slot = Some(NextHop::new(nb, local_if, remote_if));
                        }
                    }
                }
            }

            entries.push((NodePair::new(curr, dst_node), candidates));
        }
    }

    for src_gid in 0..num_ground_stations {
        for dst_gid in 0..num_ground_stations {
            if src_gid == dst_gid {
                continue;
            }
            let mut candidates: Candidates = [None; MAX_CANDIDATES];

            // Satellite in range of the source offering the shortest total distance
            let mut ranked: Vec<(f64, usize)> = topology.visibility[src_gid]
                .iter()
                .filter_map(|c| {
                    let offered = to_ground[c.sat * num_ground_stations + dst_gid];
                    offered.is_finite().then_some((c.distance_m + offered, c.sat))
                })
                .collect();
            ranked.sort_by(by_distance_then_id);

            for (slot, (_, sat)) in candidates.iter_mut().zip(ranked) {
                *slot = Some(NextHop::new(
                    sat,
                    0,
                    interfaces.count(sat) + gsl_if_of_ground_station[src_gid],
                ));
            }

            entries.push((
                NodePair::new(topology.ground_node_id(src_gid), topology.ground_node_id(dst_gid)),
                candidates,
            ));
        }
    }

    ForwardingState::from_entries(num_satellites, num_ground_stations, entries)
}
