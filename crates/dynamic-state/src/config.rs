//! Run configuration
//!
//! [`RunConfig`] is what the `run` subcommand resolves its flags and optional
//! JSON file into. [`LinkLimits`] are the three range bounds, usually read
//! from the constellation's `description.txt`.

use crate::algorithm::DynamicStateAlgorithm;
use crate::{DynamicStateError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DESCRIPTION_FILE: &str = "description.txt";

/// Maximum link lengths in metres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkLimits {
    pub max_gsl_length_m: f64,
    pub max_isl_length_m: f64,
    pub max_ill_length_m: f64,
}

impl LinkLimits {
    pub fn new(max_gsl_length_m: f64, max_isl_length_m: f64, max_ill_length_m: f64) -> Self {
        Self {
            max_gsl_length_m,
            max_isl_length_m,
            max_ill_length_m,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("max_gsl_length_m", self.max_gsl_length_m),
            ("max_isl_length_m", self.max_isl_length_m),
            ("max_ill_length_m", self.max_ill_length_m),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(DynamicStateError::InvalidConfig(format!(
                    "{} must be finite and positive, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Parse `key=value` lines; all three keys are required
    pub fn read_description(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| DynamicStateError::io(path, e))?;

        let (mut gsl, mut isl, mut ill) = (None, None, None);
        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let parse_err = |message: String| DynamicStateError::Parse {
                path: path.to_path_buf(),
                line: i + 1,
                message,
            };
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| parse_err(format!("expected key=value, got '{}'", line)))?;
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|e| parse_err(format!("invalid value for {}: {}", key, e)))?;
            match key.trim() {
                "max_gsl_length_m" => gsl = Some(value),
                "max_isl_length_m" => isl = Some(value),
                "max_ill_length_m" => ill = Some(value),
                other => return Err(parse_err(format!("unknown key '{}'", other))),
            }
        }

        match (gsl, isl, ill) {
            (Some(gsl), Some(isl), Some(ill)) => {
                let limits = Self::new(gsl, isl, ill);
                limits.validate()?;
                Ok(limits)
            }
            _ => Err(DynamicStateError::InvalidInput(format!(
                "{:?} must define max_gsl_length_m, max_isl_length_m and max_ill_length_m",
                path
            ))),
        }
    }
}

fn to_ns(name: &str, value: u64, ns_per_unit: i64) -> Result<i64> {
    i64::try_from(value)
        .ok()
        .and_then(|v| v.checked_mul(ns_per_unit))
        .ok_or_else(|| {
            DynamicStateError::InvalidConfig(format!("{} = {} overflows a nanosecond timestamp", name, value))
        })
}

/// Input file names inside the data directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputFiles {
    pub isls: String,
    pub ground_stations: String,
    pub tles: String,
    pub relay_tles: String,
    pub interfaces_info: String,
}

impl Default for InputFiles {
    fn default() -> Self {
        Self {
            isls: "isls.txt".to_string(),
            ground_stations: "ground_stations.txt".to_string(),
            tles: "tles.txt".to_string(),
            relay_tles: "tles_GEO.txt".to_string(),
            interfaces_info: "gsl_interfaces_info.txt".to_string(),
        }
    }
}

/// Dynamic state run parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub duration_s: u64,
    pub time_step_ms: u64,
    pub threads: usize,
    pub algorithm: String,
    /// Overrides `description.txt` when set
    pub limits: Option<LinkLimits>,
    pub files: InputFiles,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("gen_data"),
            output_dir: PathBuf::from("gen_data"),
            duration_s: 200,
            time_step_ms: 100,
            threads: 1,
            algorithm: DynamicStateAlgorithm::default().name().to_string(),
            limits: None,
            files: InputFiles::default(),
        }
    }
}

impl RunConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| DynamicStateError::io(path, e))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_duration_s(mut self, duration_s: u64) -> Self {
        self.duration_s = duration_s;
        self
    }

    pub fn with_time_step_ms(mut self, time_step_ms: u64) -> Self {
        self.time_step_ms = time_step_ms;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    pub fn with_limits(mut self, limits: LinkLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn duration_ns(&self) -> Result<i64> {
        to_ns("duration_s", self.duration_s, 1_000_000_000)
    }

    pub fn time_step_ns(&self) -> Result<i64> {
        to_ns("time_step_ms", self.time_step_ms, 1_000_000)
    }

    /// Check parameters and resolve the algorithm; runs before any epoch
    pub fn validate(&self) -> Result<DynamicStateAlgorithm> {
        if self.time_step_ms == 0 {
            return Err(DynamicStateError::InvalidConfig(
                "time step must be positive".to_string(),
            ));
        }
        if self.threads == 0 {
            return Err(DynamicStateError::InvalidConfig(
                "thread count must be positive".to_string(),
            ));
        }
        if self.duration_ns()? < self.time_step_ns()? {
            return Err(DynamicStateError::InvalidConfig(format!(
                "duration {}s is shorter than one {}ms time step",
                self.duration_s, self.time_step_ms
            )));
        }
        if let Some(limits) = &self.limits {
            limits.validate()?;
        }
        DynamicStateAlgorithm::select(&self.algorithm)
    }

    /// `dynamic_state_<step>ms_for_<duration>s`
    pub fn output_dir_name(&self) -> String {
        format!(
            "dynamic_state_{}ms_for_{}s",
            self.time_step_ms, self.duration_s
        )
    }

    pub fn run_dir(&self) -> PathBuf {
        self.output_dir.join(self.output_dir_name())
    }

    /// Explicit limits, else `description.txt` in the data directory
    pub fn resolve_limits(&self) -> Result<LinkLimits> {
        match self.limits {
            Some(limits) => Ok(limits),
            None => LinkLimits::read_description(self.data_dir.join(DESCRIPTION_FILE)),
        }
    }

    pub fn input_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_validate() {
        let config = RunConfig::default();
        assert_eq!(
            config.validate().unwrap(),
            DynamicStateAlgorithm::FreeOneOnlyOverIslsIlls
        );
        assert_eq!(config.output_dir_name(), "dynamic_state_100ms_for_200s");
        assert_eq!(config.time_step_ns().unwrap(), 100_000_000);
        assert_eq!(config.duration_ns().unwrap(), 200_000_000_000);
    }

    #[test]
    fn test_oversized_times_rejected() {
        let config = RunConfig::default().with_duration_s(u64::MAX);
        assert!(matches!(config.duration_ns(), Err(DynamicStateError::InvalidConfig(_))));
        assert!(config.validate().is_err());

        // Fits in i64 seconds but not in i64 nanoseconds
        let config = RunConfig::default().with_duration_s(10_000_000_000);
        assert!(config.validate().is_err());

        let config = RunConfig::default().with_time_step_ms(u64::MAX / 2);
        assert!(matches!(config.validate(), Err(DynamicStateError::InvalidConfig(_))));
    }

    #[test]
    fn test_validation_failures() {
        assert!(RunConfig::default().with_time_step_ms(0).validate().is_err());
        assert!(RunConfig::default().with_threads(0).validate().is_err());
        assert!(RunConfig::default()
            .with_duration_s(0)
            .with_time_step_ms(100)
            .validate()
            .is_err());
        assert!(RunConfig::default()
            .with_limits(LinkLimits::new(1.0, f64::NAN, 1.0))
            .validate()
            .is_err());
        assert!(matches!(
            RunConfig::default()
                .with_algorithm("algorithm_paired_many_only_over_isls")
                .validate(),
            Err(DynamicStateError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_json_partial_override() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.json");
        fs::write(&path, r#"{"duration_s": 10, "threads": 4, "files": {"isls": "grid.txt"}}"#).unwrap();

        let config = RunConfig::from_json_file(&path).unwrap();
        assert_eq!(config.duration_s, 10);
        assert_eq!(config.threads, 4);
        assert_eq!(config.time_step_ms, 100);
        assert_eq!(config.files.isls, "grid.txt");
        assert_eq!(config.files.relay_tles, "tles_GEO.txt");
    }

    #[test]
    fn test_read_description() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DESCRIPTION_FILE);
        fs::write(
            &path,
            "max_gsl_length_m=1089686.4181956202\nmax_isl_length_m=5016591.2330984278\nmax_ill_length_m=41572799.2906419500\n",
        )
        .unwrap();

        let limits = LinkLimits::read_description(&path).unwrap();
        assert!((limits.max_gsl_length_m - 1_089_686.418_195_620_2).abs() < 1e-6);
        assert!((limits.max_ill_length_m - 41_572_799.290_641_95).abs() < 1e-6);

        let config = RunConfig::default().with_data_dir(dir.path());
        assert_eq!(config.resolve_limits().unwrap(), limits);
    }

    #[test]
    fn test_read_description_missing_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DESCRIPTION_FILE);
        fs::write(&path, "max_gsl_length_m=1.0\nmax_isl_length_m=2.0\n").unwrap();
        assert!(LinkLimits::read_description(&path).is_err());
    }
}
