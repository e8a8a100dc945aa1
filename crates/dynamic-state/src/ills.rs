//! Inter-Layer Link Assigner
//!
//! Each low-orbit satellite has exactly one ILL, to the nearest relay
//! satellite within the maximum ILL length.

use crate::{DynamicStateError, Result};
use orbital_mechanics::PositionSnapshot;
use tracing::debug;

/// Satellite -> relay assignment for one epoch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllAssignment {
    relay_of: Vec<usize>,
}

impl IllAssignment {
    pub fn from_relays(relay_of: Vec<usize>) -> Self {
        Self { relay_of }
    }

    #[inline]
    pub fn relay(&self, sat: usize) -> usize {
        self.relay_of[sat]
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.relay_of
    }

    pub fn len(&self) -> usize {
        self.relay_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relay_of.is_empty()
    }

    /// (sat, relay) pairs differing from `previous`; all pairs without one
    pub fn changed_since(&self, previous: Option<&IllAssignment>) -> Vec<(usize, usize)> {
        self.relay_of
            .iter()
            .copied()
            .enumerate()
            .filter(|(sat, relay)| match previous {
                Some(prev) => prev.relay_of.get(*sat) != Some(relay),
                None => true,
            })
            .collect()
    }

    /// Satellites assigned to each relay
    pub fn load_per_relay(&self, num_relays: usize) -> Vec<usize> {
        let mut load = vec![0; num_relays];
        for &relay in &self.relay_of {
            load[relay] += 1;
        }
        load
    }
}

/// Assign every satellite to its nearest relay.
///
/// The scan keeps the first relay strictly closer than the running bound,
/// which starts at `max_ill_length_m`; ties go to the lowest relay id.
/// A satellite with no relay in range is fatal.
pub fn assign_ills(snapshot: &PositionSnapshot, max_ill_length_m: f64) -> Result<IllAssignment> {
    let num_relays = snapshot.relays.len();
    let mut relay_of = Vec::with_capacity(snapshot.satellites.len());

    for sat in 0..snapshot.satellites.len() {
        let mut bound = max_ill_length_m;
        let mut target = None;
        let mut nearest_m = f64::INFINITY;

        for relay in 0..num_relays {
            let distance_m = snapshot.sat_to_relay(sat, relay);
            nearest_m = nearest_m.min(distance_m);
            if distance_m < bound {
                bound = distance_m;
                target = Some(relay);
            }
        }

        match target {
            Some(relay) => relay_of.push(relay),
            None => {
                return Err(DynamicStateError::UnreachableLayerAssignment {
                    sat,
                    nearest_m,
                    max_ill_length_m,
                    t_ns: snapshot.t_ns,
                })
            }
        }
    }

    let assignment = IllAssignment { relay_of };
    let load = assignment.load_per_relay(num_relays);
    if let (Some(min), Some(max)) = (load.iter().min(), load.iter().max()) {
        debug!(
            "t={}ns: {} ILLs, {}..{} ILLs per relay satellite",
            snapshot.t_ns,
            assignment.len(),
            min,
            max
        );
    }

    Ok(assignment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn snapshot(satellites: Vec<f64>, relays: Vec<f64>) -> PositionSnapshot {
        PositionSnapshot::new(
            7,
            satellites.into_iter().map(|x| Vector3::new(x, 0.0, 0.0)).collect(),
            relays.into_iter().map(|x| Vector3::new(x, 0.0, 0.0)).collect(),
            Vec::new(),
        )
    }

    #[test]
    fn test_nearest_relay_selected() {
        let s = snapshot(vec![0.0, 90.0], vec![-50.0, 100.0]);
        let ills = assign_ills(&s, 1_000.0).unwrap();
        assert_eq!(ills.as_slice(), &[0, 1]);
        assert_eq!(ills.load_per_relay(2), vec![1, 1]);
    }

    #[test]
    fn test_tie_goes_to_lowest_relay() {
        let s = snapshot(vec![0.0], vec![10.0, -10.0]);
        assert_eq!(assign_ills(&s, 100.0).unwrap().relay(0), 0);
    }

    #[test]
    fn test_relay_at_exact_limit_is_out_of_range() {
        let s = snapshot(vec![0.0], vec![100.0]);
        assert!(assign_ills(&s, 100.0).is_err());
    }

    #[test]
    fn test_unreachable_is_fatal() {
        let s = snapshot(vec![0.0, 500.0], vec![10.0]);
        match assign_ills(&s, 100.0).unwrap_err() {
            DynamicStateError::UnreachableLayerAssignment { sat, nearest_m, t_ns, .. } => {
                assert_eq!(sat, 1);
                assert_eq!(nearest_m, 490.0);
                assert_eq!(t_ns, 7);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_changed_since() {
        let prev = IllAssignment::from_relays(vec![0, 1, 2]);
        let next = IllAssignment::from_relays(vec![0, 2, 2]);

        assert_eq!(next.changed_since(Some(&prev)), vec![(1, 2)]);
        assert_eq!(next.changed_since(None).len(), 3);
        assert!(next.changed_since(Some(&next)).is_empty());
    }
}
