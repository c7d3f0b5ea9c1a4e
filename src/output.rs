//! The module responsible for writing output data to disk.
use crate::network::{BusID, ComponentID};
use crate::optimisation::Solution;
use crate::report::ChartWindow;
use anyhow::{Context, Result, ensure};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "gencap_results";

/// The output file name for optimal capacities
const CAPACITIES_FILE_NAME: &str = "capacities.csv";

/// The output file name for dispatch
const DISPATCH_FILE_NAME: &str = "dispatch.csv";

/// The output file name for storage state of charge
const STATE_OF_CHARGE_FILE_NAME: &str = "state_of_charge.csv";

/// The output file name for marginal prices
const MARGINAL_PRICES_FILE_NAME: &str = "marginal_prices.csv";

/// The output file name for the chart window
const CHART_WINDOW_FILE_NAME: &str = "chart_window.csv";

/// The output file name for all problem variables
const VARIABLES_FILE_NAME: &str = "debug_variables.csv";

/// Get the default output directory for the model specified at `model_dir`
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Get the model name from the dir path. This ends up being convoluted because we need to check
    // for all possible errors. Ugh.
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory for the model, optionally overwriting existing data
///
/// # Arguments
///
/// * `output_dir` - The output directory to create/overwrite
/// * `allow_overwrite` - Whether to delete and recreate the folder if it is non-empty
///
/// # Returns
///
/// `true` if the output dir contained existing data that was deleted, `false` if not, or an error.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    // If the folder already exists, then delete it
    let overwrite = if let Ok(mut it) = fs::read_dir(output_dir) {
        if it.next().is_none() {
            // Folder exists and is empty: nothing to do
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. \
            Please delete the folder or pass the --overwrite command-line option."
        );

        fs::remove_dir_all(output_dir).context("Could not delete folder")?;
        true
    } else {
        false
    };

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// Represents a row in the capacities CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CapacityRow {
    component_id: ComponentID,
    component_type: String,
    bus_id: BusID,
    carrier: String,
    extendable: bool,
    capacity: f64,
}

/// Represents a row in the dispatch CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct DispatchRow {
    snapshot: NaiveDateTime,
    component_id: ComponentID,
    dispatch: f64,
}

/// Represents a row in the state of charge CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct StateOfChargeRow {
    snapshot: NaiveDateTime,
    storage_unit_id: ComponentID,
    state_of_charge: f64,
}

/// Represents a row in the marginal prices CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct MarginalPriceRow {
    snapshot: NaiveDateTime,
    bus_id: BusID,
    price: f64,
}

/// Represents a row in the debug variables CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct VariableRow {
    name: String,
    cost: f64,
    lower_bound: f64,
    upper_bound: f64,
    value: f64,
}

/// For writing extra debug information about the model
struct DebugDataWriter {
    variables_writer: csv::Writer<File>,
}

impl DebugDataWriter {
    /// Open CSV files to write debug info to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    fn create(output_path: &Path) -> Result<Self> {
        Ok(Self {
            variables_writer: csv::Writer::from_path(output_path.join(VARIABLES_FILE_NAME))?,
        })
    }

    /// Write every column of the problem along with its value
    fn write_variables(&mut self, solution: &Solution) -> Result<()> {
        for (info, value) in solution.iter_columns() {
            let row = VariableRow {
                name: info.name.clone(),
                cost: info.cost,
                lower_bound: info.lower,
                upper_bound: info.upper,
                value,
            };
            self.variables_writer.serialize(row)?;
        }

        Ok(())
    }

    /// Flush the underlying streams
    fn flush(&mut self) -> Result<()> {
        self.variables_writer.flush()?;

        Ok(())
    }
}

/// An object for writing results to file
pub struct DataWriter {
    output_path: PathBuf,
    capacities_writer: csv::Writer<File>,
    dispatch_writer: csv::Writer<File>,
    state_of_charge_writer: csv::Writer<File>,
    prices_writer: csv::Writer<File>,
    debug_writer: Option<DebugDataWriter>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `save_debug_info` - Whether to include extra CSV files for debugging model
    pub fn create(output_path: &Path, save_debug_info: bool) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(file_path)
        };

        let debug_writer = if save_debug_info {
            // Create debug CSV files
            Some(DebugDataWriter::create(output_path)?)
        } else {
            None
        };

        Ok(Self {
            output_path: output_path.to_path_buf(),
            capacities_writer: new_writer(CAPACITIES_FILE_NAME)?,
            dispatch_writer: new_writer(DISPATCH_FILE_NAME)?,
            state_of_charge_writer: new_writer(STATE_OF_CHARGE_FILE_NAME)?,
            prices_writer: new_writer(MARGINAL_PRICES_FILE_NAME)?,
            debug_writer,
        })
    }

    /// Write the results of a successful optimisation
    pub fn write_solution(&mut self, solution: &Solution) -> Result<()> {
        self.write_capacities(solution)?;
        self.write_dispatch(solution)?;
        self.write_state_of_charge(solution)?;
        self.write_marginal_prices(solution)?;
        if let Some(wtr) = &mut self.debug_writer {
            wtr.write_variables(solution)?;
        }

        Ok(())
    }

    fn write_capacities(&mut self, solution: &Solution) -> Result<()> {
        let network = solution.network();
        for (id, capacity) in solution.iter_capacities() {
            let (component_type, bus_id, carrier, mode) =
                if let Some(generator) = network.generators.get(id) {
                    (
                        "generator",
                        &generator.bus_id,
                        &generator.carrier,
                        generator.capacity,
                    )
                } else {
                    let unit = &network.storage_units[id];
                    ("storage_unit", &unit.bus_id, &unit.carrier, unit.capacity)
                };

            let row = CapacityRow {
                component_id: id.clone(),
                component_type: component_type.to_string(),
                bus_id: bus_id.clone(),
                carrier: carrier.clone(),
                extendable: mode.is_extendable(),
                capacity: capacity.value(),
            };
            self.capacities_writer.serialize(row)?;
        }

        Ok(())
    }

    fn write_dispatch(&mut self, solution: &Solution) -> Result<()> {
        let snapshots = &solution.network().snapshots;
        for (id, dispatch) in solution
            .iter_generator_dispatch()
            .chain(solution.iter_storage_dispatch())
        {
            for (snapshot, power) in snapshots.iter().zip(dispatch) {
                let row = DispatchRow {
                    snapshot: *snapshot,
                    component_id: id.clone(),
                    dispatch: power.value(),
                };
                self.dispatch_writer.serialize(row)?;
            }
        }

        Ok(())
    }

    fn write_state_of_charge(&mut self, solution: &Solution) -> Result<()> {
        let snapshots = &solution.network().snapshots;
        for (id, state_of_charge) in solution.iter_state_of_charge() {
            for (snapshot, energy) in snapshots.iter().zip(state_of_charge) {
                let row = StateOfChargeRow {
                    snapshot: *snapshot,
                    storage_unit_id: id.clone(),
                    state_of_charge: energy.value(),
                };
                self.state_of_charge_writer.serialize(row)?;
            }
        }

        Ok(())
    }

    fn write_marginal_prices(&mut self, solution: &Solution) -> Result<()> {
        let snapshots = &solution.network().snapshots;
        for (bus_id, prices) in solution.iter_marginal_prices() {
            for (snapshot, price) in snapshots.iter().zip(prices) {
                let row = MarginalPriceRow {
                    snapshot: *snapshot,
                    bus_id: bus_id.clone(),
                    price: price.value(),
                };
                self.prices_writer.serialize(row)?;
            }
        }

        Ok(())
    }

    /// Write the chart window in wide format, with one column per component
    pub fn write_chart_window(&self, chart: &ChartWindow) -> Result<()> {
        let mut writer = csv::Writer::from_path(self.output_path.join(CHART_WINDOW_FILE_NAME))?;

        let mut header = vec!["snapshot".to_string(), "load".to_string()];
        header.extend(chart.series.keys().map(ToString::to_string));
        writer.write_record(&header)?;

        for (t, timestamp) in chart.timestamps.iter().enumerate() {
            let mut record = vec![
                timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
                chart.load[t].value().to_string(),
            ];
            record.extend(
                chart
                    .series
                    .values()
                    .map(|dispatch| dispatch[t].value().to_string()),
            );
            writer.write_record(&record)?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.capacities_writer.flush()?;
        self.dispatch_writer.flush()?;
        self.state_of_charge_writer.flush()?;
        self.prices_writer.flush()?;
        if let Some(wtr) = &mut self.debug_writer {
            wtr.flush()?;
        }

        Ok(())
    }
}
