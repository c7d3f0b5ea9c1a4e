//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::input::profile::ProfileSpec;
use crate::input::{input_err_msg, read_toml};
use crate::optimisation::{DEFAULT_SOLVER, SolverBackend, SolverOptions};
use crate::snapshot::SnapshotSet;
use crate::units::{Hours, MoneyPerEnergy};
use anyhow::{Context, Result, bail, ensure};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use indexmap::IndexMap;
use log::warn;
use serde::Deserialize;
use std::path::Path;

/// The name of the model parameters file
pub const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

macro_rules! define_unit_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            <$type>::new($value)
        }
    };
}

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_unit_param_default!(default_unserved_energy_cost, MoneyPerEnergy, 1e5);
define_param_default!(default_solver, String, DEFAULT_SOLVER.to_string());
define_param_default!(default_report_window, usize, 168);
define_param_default!(default_frequency_minutes, u32, 60);
define_param_default!(default_true, bool, true);

/// Represents the contents of the entire model file.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelParameters {
    /// The planning horizon
    pub snapshots: SnapshotsConfig,
    /// Name of the solver backend
    #[serde(default = "default_solver")]
    pub solver: String,
    /// Time limit for the solver in seconds
    pub time_limit: Option<f64>,
    /// Maximum number of solver iterations
    pub iteration_limit: Option<u32>,
    /// Whether the solver may simplify the problem before solving it
    #[serde(default = "default_true")]
    pub presolve: bool,
    /// The maximum number of snapshots shown in the chart window
    #[serde(default = "default_report_window")]
    pub report_window: usize,
    /// Whether and at what cost demand may go unserved
    #[serde(default)]
    pub unserved_energy: UnservedEnergyConfig,
    /// Availability profiles
    #[serde(default)]
    pub profiles: IndexMap<String, ProfileSpec>,
}

/// The `[snapshots]` section of the model file.
///
/// Exactly one of `end` and `count` must be given.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SnapshotsConfig {
    /// The first snapshot
    pub start: String,
    /// The end of the horizon (exclusive)
    pub end: Option<String>,
    /// The number of snapshots
    pub count: Option<usize>,
    /// The interval between snapshots
    #[serde(default = "default_frequency_minutes")]
    pub frequency_minutes: u32,
    /// Whether to omit snapshots falling on 29 February
    #[serde(default)]
    pub drop_leap_days: bool,
    /// The number of hours each snapshot represents.
    ///
    /// Defaults to the frequency in hours, or one hour for a single snapshot.
    pub weighting: Option<f64>,
}

/// The `[unserved_energy]` section of the model file
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct UnservedEnergyConfig {
    /// Whether to add an unserved energy generator to every bus
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// The cost of each MWh of demand which is not met
    #[serde(default = "default_unserved_energy_cost")]
    pub marginal_cost: MoneyPerEnergy,
}

impl Default for UnservedEnergyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            marginal_cost: default_unserved_energy_cost(),
        }
    }
}

/// Parse a date and time, accepting a few common formats.
///
/// A date on its own is taken to mean midnight.
fn parse_datetime(value: &str) -> Result<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];

    for format in FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(datetime);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }

    bail!("Invalid date/time: {value}")
}

impl SnapshotsConfig {
    /// Generate the snapshots described by this section
    pub fn to_snapshot_set(&self) -> Result<SnapshotSet> {
        ensure!(
            self.frequency_minutes > 0,
            "frequency_minutes must be greater than zero"
        );
        let start = parse_datetime(&self.start).context("Invalid value for start")?;
        let frequency = TimeDelta::minutes(self.frequency_minutes.into());

        let snapshots = match (&self.end, self.count) {
            (Some(end), None) => {
                let end = parse_datetime(end).context("Invalid value for end")?;
                SnapshotSet::from_range(start, end, frequency, self.drop_leap_days)?
            }
            (None, Some(count)) => {
                ensure!(count > 0, "count must be greater than zero");
                SnapshotSet::from_count(start, count, frequency, self.drop_leap_days)?
            }
            _ => bail!("Exactly one of end and count must be given"),
        };

        match self.weighting {
            Some(weighting) => snapshots.with_weighting(Hours(weighting)),
            None if snapshots.len() == 1 => snapshots.with_weighting(Hours(1.0)),
            None => Ok(snapshots),
        }
    }
}

/// Check that the `time_limit` parameter is valid
fn check_time_limit(value: Option<f64>) -> Result<()> {
    if let Some(value) = value {
        ensure!(
            value.is_finite() && value > 0.0,
            "time_limit must be a finite number greater than zero"
        );
    }

    Ok(())
}

/// Check that the `report_window` parameter is valid
fn check_report_window(value: usize) -> Result<()> {
    ensure!(value > 0, "report_window cannot be zero");

    Ok(())
}

/// Check that the unserved energy cost is valid
fn check_unserved_energy_cost(value: MoneyPerEnergy) -> Result<()> {
    ensure!(
        value.is_finite() && value > MoneyPerEnergy(0.0),
        "unserved_energy.marginal_cost must be a finite number greater than zero"
    );

    Ok(())
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        // solver: an unknown backend is reported when solving, not treated as invalid input
        if self.solver.parse::<SolverBackend>().is_err() {
            warn!(
                "Unknown solver backend '{}'. The model will not be solved.",
                self.solver
            );
        }

        check_time_limit(self.time_limit)?;
        check_report_window(self.report_window)?;
        check_unserved_energy_cost(self.unserved_energy.marginal_cost)?;

        Ok(())
    }

    /// Options for the solver, with an optional override for the backend
    pub fn solver_options(&self, solver_override: Option<&str>) -> SolverOptions {
        SolverOptions {
            solver_name: solver_override.unwrap_or(&self.solver).to_string(),
            time_limit: self.time_limit,
            iteration_limit: self.iteration_limit,
            presolve: self.presolve,
        }
    }
}
