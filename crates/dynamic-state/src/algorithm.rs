//! Dynamic state algorithm selection

use crate::{DynamicStateError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Routing algorithm variants known to the pipeline.
///
/// Only [`DynamicStateAlgorithm::FreeOneOnlyOverIslsIlls`] is implemented:
/// one GSL interface per node, one ILL per satellite, and paths that only
/// traverse the inter-satellite network (no ground station relaying).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DynamicStateAlgorithm {
    #[default]
    FreeOneOnlyOverIslsIlls,
    FreeOneOnlyOverIsls,
    FreeGsOneSatManyOnlyOverIsls,
    FreeOneOnlyGsRelays,
    PairedManyOnlyOverIsls,
}

impl DynamicStateAlgorithm {
    pub const ALL: [DynamicStateAlgorithm; 5] = [
        Self::FreeOneOnlyOverIslsIlls,
        Self::FreeOneOnlyOverIsls,
        Self::FreeGsOneSatManyOnlyOverIsls,
        Self::FreeOneOnlyGsRelays,
        Self::PairedManyOnlyOverIsls,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::FreeOneOnlyOverIslsIlls => "algorithm_free_one_only_over_isls_ills",
            Self::FreeOneOnlyOverIsls => "algorithm_free_one_only_over_isls",
            Self::FreeGsOneSatManyOnlyOverIsls => "algorithm_free_gs_one_sat_many_only_over_isls",
            Self::FreeOneOnlyGsRelays => "algorithm_free_one_only_gs_relays",
            Self::PairedManyOnlyOverIsls => "algorithm_paired_many_only_over_isls",
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, Self::FreeOneOnlyOverIslsIlls)
    }

    /// Parse a name and reject anything the pipeline cannot run
    pub fn select(name: &str) -> Result<Self> {
        let algorithm: Self = name.parse()?;
        if !algorithm.is_supported() {
            return Err(DynamicStateError::UnsupportedAlgorithm(name.to_string()));
        }
        Ok(algorithm)
    }
}

impl fmt::Display for DynamicStateAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DynamicStateAlgorithm {
    type Err = DynamicStateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.name() == s.trim())
            .ok_or_else(|| DynamicStateError::UnknownAlgorithm(s.to_string()))
    }
}
