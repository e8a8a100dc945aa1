//! Per-epoch pipeline
//!
//! snapshot -> topology -> {ILLs, forwarding} -> delta files. Every
//! computation of an epoch completes before the first of its files is
//! written, so a fatal error leaves no output for that epoch.

use crate::config::{LinkLimits, RunConfig};
use crate::delta::{self, EpochState, OutputLayout};
use crate::fstate::{compute_forwarding, DistanceMatrix};
use crate::ills::assign_ills;
use crate::inputs::{read_interfaces_info, read_isls, StaticInputs};
use crate::topology::build_topology;
use crate::{DynamicStateError, Result};
use ground_stations::GroundStation;
use orbital_mechanics::{GeometryProvider, TlePropagator};
use tracing::{debug, info};

/// Everything one shard needs to process its epochs. Cloned per shard.
#[derive(Debug, Clone)]
pub struct EpochPipeline<P: GeometryProvider> {
    geometry: P,
    inputs: StaticInputs,
    limits: LinkLimits,
    layout: OutputLayout,
    /// GSL interface index used towards each ground station
    gsl_if_of_ground_station: Vec<usize>,
}

impl<P: GeometryProvider> EpochPipeline<P> {
    pub fn new(geometry: P, inputs: StaticInputs, limits: LinkLimits, layout: OutputLayout) -> Result<Self> {
        limits.validate()?;

        let counts = (
            geometry.satellite_count(),
            geometry.relay_count(),
            geometry.ground_station_count(),
        );
        let expected = (inputs.num_satellites, inputs.num_relays, inputs.num_ground_stations());
        if counts != expected {
            return Err(DynamicStateError::InvalidInput(format!(
                "geometry has {}/{}/{} satellites/relays/ground stations, inputs describe {}/{}/{}",
                counts.0, counts.1, counts.2, expected.0, expected.1, expected.2
            )));
        }
        if inputs.num_satellites > 0 && inputs.num_relays == 0 {
            return Err(DynamicStateError::InvalidInput(
                "at least one relay satellite is required for inter-layer links".to_string(),
            ));
        }

        // One GSL interface per satellite, so every ground station uses index 0
        let gsl_if_of_ground_station = vec![0; inputs.num_ground_stations()];

        Ok(Self {
            geometry,
            inputs,
            limits,
            layout,
            gsl_if_of_ground_station,
        })
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn inputs(&self) -> &StaticInputs {
        &self.inputs
    }

    pub fn limits(&self) -> &LinkLimits {
        &self.limits
    }

    /// Build from a run configuration around any provider, e.g. replayed
    /// geometry
    pub fn from_config_with(geometry: P, config: &RunConfig, inputs: StaticInputs) -> Result<Self> {
        config.validate()?;
        let limits = config.resolve_limits()?;
        Self::new(geometry, inputs, limits, OutputLayout::new(config.run_dir()))
    }

    /// Compute epoch `t_ns` and write its files, diffing against `previous`
    /// (full dump when `None`)
    pub fn run_epoch(&self, t_ns: i64, previous: Option<&EpochState>) -> Result<EpochState> {
        let snapshot = self.geometry.snapshot(t_ns)?;

        let topology = build_topology(
            &snapshot,
            &self.inputs.isls,
            self.limits.max_isl_length_m,
            self.limits.max_gsl_length_m,
        )?;
        let ills = assign_ills(&snapshot, self.limits.max_ill_length_m)?;

        let distances = DistanceMatrix::floyd_warshall(&topology);
        let fstate = compute_forwarding(&topology, &distances, &self.gsl_if_of_ground_station);

        let fstate_out = delta::forwarding_delta(&fstate, previous);
        let ills_out = delta::ills_delta(&ills, previous);
        let bandwidth_out = (t_ns == 0).then(|| {
            delta::bandwidth_snapshot(
                &self.inputs.interfaces,
                &topology.interfaces,
                self.inputs.num_satellites,
                self.inputs.num_ground_stations(),
            )
        });

        if let Some(out) = &bandwidth_out {
            delta::write_atomic(&self.layout.bandwidth_file(t_ns), out)?;
        }
        delta::write_atomic(&self.layout.ills_file(t_ns), &ills_out)?;
        delta::write_atomic(&self.layout.fstate_file(t_ns), &fstate_out)?;

        let changed_fstate = fstate_out.lines().count();
        let changed_ills = ills_out.lines().count();
        debug!(
            "t={}ns: {} of {} forwarding entries changed, {} of {} ILLs changed",
            t_ns,
            changed_fstate,
            fstate.len(),
            changed_ills,
            ills.len()
        );
        if previous.is_none() {
            info!(
                "t={}ns: full state written ({} forwarding entries, {} ILLs)",
                t_ns,
                fstate.len(),
                ills.len()
            );
        }

        Ok(EpochState {
            t_ns,
            fstate: fstate.node_map(),
            ills,
        })
    }
}

impl EpochPipeline<TlePropagator> {
    /// Load every input file named by `config` from its data directory
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        config.validate()?;

        let stations = ground_stations::read_extended(config.input_path(&config.files.ground_stations))?;
        let geometry = TlePropagator::from_files(
            config.input_path(&config.files.tles),
            config.input_path(&config.files.relay_tles),
            stations.iter().map(GroundStation::ecef).collect(),
        )?;
        info!(
            "Geometry epoch {} with {} satellites, {} relay satellites, {} ground stations",
            geometry.epoch(),
            geometry.satellite_count(),
            geometry.relay_count(),
            stations.len()
        );

        let num_satellites = geometry.satellite_count();
        let num_relays = geometry.relay_count();
        let isls = read_isls(config.input_path(&config.files.isls), num_satellites)?;
        let interfaces = read_interfaces_info(
            config.input_path(&config.files.interfaces_info),
            num_satellites,
            stations.len(),
            num_relays,
        )?;
        let inputs = StaticInputs::new(num_satellites, num_relays, stations, isls, interfaces)?;

        Self::from_config_with(geometry, config, inputs)
    }
}
