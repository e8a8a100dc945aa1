//! Dynamic State Generator CLI
//!
//! Usage:
//!   generate-dynamic-state prepare --data-dir gen_data/starlink_geo \
//!                                  --num-orbits 72 --sats-per-orbit 22 --num-relays 3
//!   generate-dynamic-state run --data-dir gen_data/starlink_geo \
//!                              --duration-s 200 --time-step-ms 100 --threads 8
//!
//! `prepare` writes the ISL list, interfaces info and description next to
//! the TLE and ground station files; `run` generates
//! `dynamic_state_<step>ms_for_<duration>s/` from them.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dynamic_state::prepare::{self, max_gsl_length_m, max_ill_length_m, max_isl_length_m};
use dynamic_state::{generate_dynamic_state, EpochPipeline, LinkLimits, RunConfig};
use orbital_mechanics::TlePropagator;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "generate-dynamic-state",
    about = "Generate per-epoch forwarding and inter-layer link state for a two-layer constellation"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write ISLs, interfaces info and description.txt
    Prepare(PrepareArgs),
    /// Generate the dynamic state time series
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct PrepareArgs {
    /// Directory holding tles.txt, tles_GEO.txt and ground_stations.txt
    #[arg(short, long)]
    data_dir: PathBuf,

    /// Basic ground station file to convert into the extended one first
    #[arg(long)]
    basic_ground_stations: Option<PathBuf>,

    #[arg(long)]
    num_orbits: usize,

    #[arg(long)]
    sats_per_orbit: usize,

    /// Slot shift of the "+ grid" link to the next orbit
    #[arg(long, default_value_t = 0)]
    isl_shift: usize,

    /// Skip ISL generation (writes an empty ISL file)
    #[arg(long)]
    no_isls: bool,

    #[arg(long)]
    num_relays: usize,

    /// Low-orbit shell altitude in metres
    #[arg(long, default_value_t = 550_000.0)]
    altitude_m: f64,

    /// Ground coverage cone radius in metres
    #[arg(long, default_value_t = 940_700.0)]
    cone_radius_m: f64,

    /// Relay layer altitude in metres
    #[arg(long, default_value_t = 35_768_000.0)]
    relay_altitude_m: f64,

    /// Aggregate bandwidth of satellites and ground stations
    #[arg(long, default_value_t = 1.0)]
    bandwidth: f64,

    /// Aggregate bandwidth of relay satellites
    #[arg(long, default_value_t = 1.0)]
    relay_bandwidth: f64,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON run configuration; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Parent of the dynamic_state_* directory (defaults to the data directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    #[arg(long)]
    duration_s: Option<u64>,

    #[arg(long)]
    time_step_ms: Option<u64>,

    #[arg(short, long)]
    threads: Option<usize>,

    #[arg(short, long)]
    algorithm: Option<String>,

    /// Range limits; all three replace description.txt when given
    #[arg(long, requires_all = ["max_isl_length_m", "max_ill_length_m"])]
    max_gsl_length_m: Option<f64>,

    #[arg(long, requires_all = ["max_gsl_length_m", "max_ill_length_m"])]
    max_isl_length_m: Option<f64>,

    #[arg(long, requires_all = ["max_gsl_length_m", "max_isl_length_m"])]
    max_ill_length_m: Option<f64>,
}

impl RunArgs {
    fn into_config(self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_json_file(path)
                .with_context(|| format!("loading run configuration {:?}", path))?,
            None => RunConfig::default(),
        };

        if let Some(dir) = self.data_dir {
            if self.output_dir.is_none() && self.config.is_none() {
                config = config.with_output_dir(dir.clone());
            }
            config = config.with_data_dir(dir);
        }
        if let Some(dir) = self.output_dir {
            config = config.with_output_dir(dir);
        }
        if let Some(duration_s) = self.duration_s {
            config = config.with_duration_s(duration_s);
        }
        if let Some(time_step_ms) = self.time_step_ms {
            config = config.with_time_step_ms(time_step_ms);
        }
        if let Some(threads) = self.threads {
            config = config.with_threads(threads);
        }
        if let Some(algorithm) = self.algorithm {
            config = config.with_algorithm(algorithm);
        }
        if let (Some(gsl), Some(isl), Some(ill)) =
            (self.max_gsl_length_m, self.max_isl_length_m, self.max_ill_length_m)
        {
            config = config.with_limits(LinkLimits::new(gsl, isl, ill));
        }

        Ok(config)
    }
}

fn prepare_constellation(args: PrepareArgs) -> Result<()> {
    let stations_path = args.data_dir.join("ground_stations.txt");
    let stations = match &args.basic_ground_stations {
        Some(basic) => ground_stations::extend_ground_stations(basic, &stations_path)?,
        None => ground_stations::read_extended(&stations_path)?,
    };

    let num_satellites = args.num_orbits * args.sats_per_orbit;
    let isls = if args.no_isls {
        Vec::new()
    } else {
        prepare::plus_grid_isls(args.num_orbits, args.sats_per_orbit, args.isl_shift)
    };
    prepare::write_isls(args.data_dir.join("isls.txt"), &isls)?;

    prepare::write_simple_interfaces_info(
        args.data_dir.join("gsl_interfaces_info.txt"),
        num_satellites,
        stations.len(),
        (1, args.bandwidth),
        (1, args.bandwidth),
        None,
    )?;
    prepare::write_simple_ill_interfaces_info(
        args.data_dir.join("ill_interfaces_info.txt"),
        num_satellites,
        stations.len(),
        args.num_relays,
        (1, args.bandwidth),
        (1, args.relay_bandwidth),
    )?;

    let limits = LinkLimits::new(
        max_gsl_length_m(args.cone_radius_m, args.altitude_m),
        max_isl_length_m(args.altitude_m),
        max_ill_length_m(args.altitude_m, args.relay_altitude_m),
    );
    limits.validate()?;
    prepare::write_description(&args.data_dir, &limits)?;

    info!(
        "Prepared {:?}: {} satellites, {} relay satellites, {} ground stations, {} ISLs",
        args.data_dir,
        num_satellites,
        args.num_relays,
        stations.len(),
        isls.len()
    );
    info!(
        "Limits: GSL {:.2}m, ISL {:.2}m, ILL {:.2}m",
        limits.max_gsl_length_m, limits.max_isl_length_m, limits.max_ill_length_m
    );
    Ok(())
}

fn run_dynamic_state(args: RunArgs) -> Result<()> {
    let config = args.into_config()?;
    let algorithm = config.validate()?;
    info!("Algorithm: {}", algorithm);

    let pipeline = EpochPipeline::<TlePropagator>::from_config(&config)
        .with_context(|| format!("loading inputs from {:?}", config.data_dir))?;
    let limits = pipeline.limits();
    info!(
        "Limits: GSL {:.2}m, ISL {:.2}m, ILL {:.2}m",
        limits.max_gsl_length_m, limits.max_isl_length_m, limits.max_ill_length_m
    );

    let summary = generate_dynamic_state(
        &pipeline,
        config.duration_ns()?,
        config.time_step_ns()?,
        config.threads,
    )?;

    info!("{}", "=".repeat(60));
    info!("Output: {:?}", config.run_dir());
    info!("Epochs: {} on {} shard(s)", summary.epochs, summary.shards);
    info!("{}", "=".repeat(60));
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Command::Prepare(args) => prepare_constellation(args),
        Command::Run(args) => run_dynamic_state(args),
    }
}
