//! Delta State Writer
//!
//! Persists per-epoch output streams. Forwarding and ILL files only carry
//! entries that changed since the previous epoch of the same shard. Every
//! file is written to a temporary file in its target directory and renamed
//! into place.

use crate::fstate::{format_entry, CandidateNodes, ForwardingState};
use crate::ills::IllAssignment;
use crate::inputs::InterfaceInfo;
use crate::topology::IslInterfaces;
use crate::{DynamicStateError, NodePair, Result};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const FSTATE_DIR: &str = "fstate";
pub const ILLS_DIR: &str = "ills";
pub const FINISHED_FILE: &str = "finished.txt";

/// What a shard keeps from one epoch to diff the next against
#[derive(Debug, Clone, PartialEq)]
pub struct EpochState {
    pub t_ns: i64,
    pub fstate: HashMap<NodePair, CandidateNodes>,
    pub ills: IllAssignment,
}

/// Output file locations under one run directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fstate_file(&self, t_ns: i64) -> PathBuf {
        self.root.join(FSTATE_DIR).join(format!("fstate_{}.txt", t_ns))
    }

    pub fn ills_file(&self, t_ns: i64) -> PathBuf {
        self.root.join(ILLS_DIR).join(format!("ills_{}.txt", t_ns))
    }

    pub fn bandwidth_file(&self, t_ns: i64) -> PathBuf {
        self.root.join(format!("gsl_if_bandwidth_{}.txt", t_ns))
    }

    pub fn finished_file(&self) -> PathBuf {
        self.root.join(FINISHED_FILE)
    }

    /// Create the run directory and its per-stream subdirectories
    pub fn create_dirs(&self) -> Result<()> {
        for dir in [self.root.clone(), self.root.join(FSTATE_DIR), self.root.join(ILLS_DIR)] {
            fs::create_dir_all(&dir).map_err(|e| DynamicStateError::io(&dir, e))?;
        }
        Ok(())
    }
}

/// Write `contents` to `path` all-or-nothing
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| DynamicStateError::io(dir, e))?;
    if let Err(e) = tmp.write_all(contents.as_bytes()) {
        return Err(DynamicStateError::io(tmp.path(), e));
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| DynamicStateError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| DynamicStateError::io(path, e.error))?;
    Ok(())
}

/// Changed forwarding lines; all entries without a previous epoch
pub fn forwarding_delta(fstate: &ForwardingState, previous: Option<&EpochState>) -> String {
    let mut out = String::new();
    for (key, candidates) in fstate.changed_since(previous.map(|p| &p.fstate)) {
        out.push_str(&format_entry(key, candidates));
        out.push('\n');
    }
    out
}

/// Changed `sat relay` lines; all satellites without a previous epoch
pub fn ills_delta(ills: &IllAssignment, previous: Option<&EpochState>) -> String {
    let mut out = String::new();
    for (sat, relay) in ills.changed_since(previous.map(|p| &p.ills)) {
        let _ = writeln!(out, "{} {}", sat, relay);
    }
    out
}

/// Static GSL interface bandwidth: satellites list their ISL interface count,
/// ground stations list 0
pub fn bandwidth_snapshot(
    interfaces: &[InterfaceInfo],
    isl_interfaces: &IslInterfaces,
    num_satellites: usize,
    num_ground_stations: usize,
) -> String {
    let mut out = String::new();
    for info in interfaces.iter().take(num_satellites + num_ground_stations) {
        let num_isls = if info.node_id < num_satellites {
            isl_interfaces.count(info.node_id)
        } else {
            0
        };
        let _ = writeln!(
            out,
            "{},{},{:.6}",
            info.node_id, num_isls, info.aggregate_max_bandwidth
        );
    }
    out
}

pub fn write_finished(layout: &OutputLayout) -> Result<()> {
    write_atomic(&layout.finished_file(), "Yes\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fstate::{Candidates, NextHop};
    use crate::inputs::Isl;
    use tempfile::TempDir;

    fn state(entries: Vec<(NodePair, Candidates)>) -> ForwardingState {
        ForwardingState::from_entries(2, 1, entries)
    }

    fn hop(node: usize) -> Option<NextHop> {
        Some(NextHop::new(node, 0, 0))
    }

    fn previous(fstate: &ForwardingState, ills: &IllAssignment) -> EpochState {
        EpochState {
            t_ns: 0,
            fstate: fstate.node_map(),
            ills: ills.clone(),
        }
    }

    #[test]
    fn test_identical_epoch_writes_nothing() {
        let fstate = state(vec![
            (NodePair::new(0, 2), [hop(2), None, None]),
            (NodePair::new(1, 2), [hop(0), None, None]),
        ]);
        let ills = IllAssignment::from_relays(vec![0, 0]);
        let prev = previous(&fstate, &ills);

        assert_eq!(forwarding_delta(&fstate, Some(&prev)), "");
        assert_eq!(ills_delta(&ills, Some(&prev)), "");
    }

    #[test]
    fn test_single_change_writes_one_line() {
        let before = state(vec![
            (NodePair::new(0, 2), [hop(2), None, None]),
            (NodePair::new(1, 2), [hop(0), None, None]),
        ]);
        let prev = previous(&before, &IllAssignment::from_relays(vec![0, 0]));

        let after = state(vec![
            (NodePair::new(0, 2), [hop(2), None, None]),
            (NodePair::new(1, 2), [hop(0), hop(3), None]),
        ]);
        assert_eq!(
            forwarding_delta(&after, Some(&prev)),
            "1,2,0,0,0,3,0,0,-1,-1,-1\n"
        );

        let ills = IllAssignment::from_relays(vec![0, 1]);
        assert_eq!(ills_delta(&ills, Some(&prev)), "1 1\n");
    }

    #[test]
    fn test_interface_change_alone_is_not_a_delta() {
        let before = state(vec![(NodePair::new(0, 2), [hop(1), None, None])]);
        let prev = previous(&before, &IllAssignment::from_relays(vec![]));
        let after = state(vec![(NodePair::new(0, 2), [Some(NextHop::new(1, 4, 4)), None, None])]);
        assert_eq!(forwarding_delta(&after, Some(&prev)), "");
    }

    #[test]
    fn test_full_dump_without_previous() {
        let fstate = state(vec![
            (NodePair::new(0, 2), [hop(2), None, None]),
            (NodePair::new(1, 2), [hop(0), None, None]),
        ]);
        assert_eq!(forwarding_delta(&fstate, None).lines().count(), 2);
        assert_eq!(
            ills_delta(&IllAssignment::from_relays(vec![1, 0]), None),
            "0 1\n1 0\n"
        );
    }

    #[test]
    fn test_bandwidth_snapshot() {
        let interfaces: Vec<InterfaceInfo> = (0..4)
            .map(|node_id| InterfaceInfo {
                node_id,
                num_interfaces: 1,
                aggregate_max_bandwidth: if node_id == 3 { 20.0 } else { 1.0 },
            })
            .collect();
        let isls = IslInterfaces::from_isls(3, &[Isl::new(0, 1), Isl::new(1, 2)]);

        assert_eq!(
            bandwidth_snapshot(&interfaces, &isls, 3, 1),
            "0,1,1.000000\n1,2,1.000000\n2,1,1.000000\n3,0,20.000000\n"
        );
    }

    #[test]
    fn test_write_atomic_replaces_file() {
        let dir = TempDir::new().unwrap();
        let layout = OutputLayout::new(dir.path().join("run"));
        layout.create_dirs().unwrap();

        let path = layout.fstate_file(1_000);
        write_atomic(&path, "old\n").unwrap();
        write_atomic(&path, "new\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);

        write_finished(&layout).unwrap();
        assert_eq!(fs::read_to_string(layout.finished_file()).unwrap(), "Yes\n");
    }

    #[test]
    fn test_layout_paths() {
        let layout = OutputLayout::new("/tmp/run");
        assert_eq!(layout.fstate_file(5), PathBuf::from("/tmp/run/fstate/fstate_5.txt"));
        assert_eq!(layout.ills_file(5), PathBuf::from("/tmp/run/ills/ills_5.txt"));
        assert_eq!(
            layout.bandwidth_file(0),
            PathBuf::from("/tmp/run/gsl_if_bandwidth_0.txt")
        );
    }
}
