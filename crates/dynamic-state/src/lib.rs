//! Dynamic State - per-epoch routing state for two-layer constellations
//!
//! Computes, at fixed time steps, the forwarding state a packet-level
//! simulator consumes for a low-orbit mesh layer with a small relay layer:
//!
//! - Topology: validated, distance-weighted ISL graph plus ground station
//!   visibility candidates
//! - Inter-layer links: nearest in-range relay satellite per satellite
//! - Forwarding: all-pairs shortest paths with up to three ranked next hops
//!   per (node, destination) for detour routing
//! - Delta output: only entries that changed since the previous epoch of the
//!   same shard are written
//! - Sharding: contiguous epoch ranges processed in parallel, one worker each

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub mod algorithm;
pub mod config;
pub mod delta;
pub mod fstate;
pub mod ills;
pub mod inputs;
pub mod pipeline;
pub mod prepare;
pub mod shard;
pub mod topology;

pub use algorithm::DynamicStateAlgorithm;
pub use config::{InputFiles, LinkLimits, RunConfig};
pub use delta::{EpochState, OutputLayout};
pub use fstate::{DistanceMatrix, ForwardingState, NextHop};
pub use ills::IllAssignment;
pub use inputs::{InterfaceInfo, Isl, StaticInputs};
pub use pipeline::EpochPipeline;
pub use shard::{epoch_count, generate_dynamic_state, plan_shards, run_shards, RunSummary, ShardPlan};
pub use topology::{GslCandidate, IslInterfaces, Topology};

/// Dynamic state errors
#[derive(Error, Debug)]
pub enum DynamicStateError {
    #[error(
        "ISL between satellites {sat_a} and {sat_b} exceeds the maximum ISL length \
         ({distance_m:.2}m > {max_isl_length_m:.2}m at t={t_ns}ns)"
    )]
    TopologyInvariantViolation {
        sat_a: usize,
        sat_b: usize,
        distance_m: f64,
        max_isl_length_m: f64,
        t_ns: i64,
    },
    #[error(
        "Satellite {sat} has no relay satellite within {max_ill_length_m:.2}m \
         (nearest {nearest_m:.2}m at t={t_ns}ns)"
    )]
    UnreachableLayerAssignment {
        sat: usize,
        nearest_m: f64,
        max_ill_length_m: f64,
        t_ns: i64,
    },
    #[error("Dynamic state algorithm not supported: {0}")]
    UnsupportedAlgorithm(String),
    #[error("Unknown dynamic state algorithm: {0}")]
    UnknownAlgorithm(String),
    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Geometry error: {0}")]
    Geometry(#[from] orbital_mechanics::OrbitalError),
    #[error("Ground station error: {0}")]
    Stations(#[from] ground_stations::StationError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Shard {shard} cancelled after a failure in another shard")]
    ShardCancelled { shard: usize },
    #[error("Shard {shard} worker panicked")]
    WorkerPanicked { shard: usize },
}

impl DynamicStateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DynamicStateError>;

/// Directed node pair key: (current node, destination node) for forwarding
/// entries, (from satellite, to satellite) for ISL interfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodePair {
    pub from: usize,
    pub to: usize,
}

impl NodePair {
    #[inline]
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    #[inline]
    pub fn reversed(self) -> Self {
        Self {
            from: self.to,
            to: self.from,
        }
    }
}
