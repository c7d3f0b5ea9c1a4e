//! Common routines for handling input data.
use crate::id::IDCollection;
use crate::model::{MODEL_PARAMETERS_FILE_NAME, Model, ModelParameters};
use crate::network::{Availability, BusID, CapacitySpec, NetworkBuilder};
use crate::profile::{Profile, ProfileID};
use crate::units::{MoneyPerPower, Power};
use anyhow::{Context, Result, ensure};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use log::debug;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

mod bus;
use bus::read_buses;
mod generator;
use generator::read_generators;
mod load;
use load::read_loads;
pub mod profile;
use profile::read_profiles;
mod storage;
use storage::read_storage_units;

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = read_csv_internal(file_path)?;
    ensure!(
        !vec.is_empty(),
        "CSV file {} cannot be empty",
        file_path.display()
    );

    Ok(vec)
}

/// Read a series of type `T`s from a CSV file which may not exist.
///
/// If the file is missing, an empty vector is returned.
pub fn read_csv_optional<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    if !file_path.exists() {
        debug!("Optional file {} not found", file_path.display());
        return Ok(Vec::new());
    }

    read_csv_internal(file_path)
}

fn read_csv_internal<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?
        .into_deserialize()
        .process_results(|iter| iter.collect_vec())
        .with_context(|| input_err_msg(file_path))?;

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Capacity columns shared by the generator and storage unit files.
///
/// Missing values take the same defaults as [`CapacitySpec::default`].
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct CapacityColumns {
    capital_cost: Option<f64>,
    p_nom: Option<f64>,
    p_nom_min: Option<f64>,
    p_nom_max: Option<f64>,
    p_nom_extendable: Option<bool>,
}

impl CapacityColumns {
    fn to_spec(self) -> CapacitySpec {
        let default = CapacitySpec::default();
        CapacitySpec {
            capital_cost: self
                .capital_cost
                .map_or(default.capital_cost, MoneyPerPower),
            p_nom: self.p_nom.map_or(default.p_nom, Power),
            p_nom_min: self.p_nom_min.map_or(default.p_nom_min, Power),
            p_nom_max: self.p_nom_max.map_or(default.p_nom_max, Power),
            p_nom_extendable: self.p_nom_extendable.unwrap_or(default.p_nom_extendable),
        }
    }
}

/// Parse an availability, which is either a number or the ID of a profile
fn parse_availability(
    value: Option<&str>,
    profiles: &IndexMap<ProfileID, Profile>,
) -> Result<Availability> {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(Availability::default());
    };

    if let Ok(value) = value.parse() {
        return Ok(Availability::Constant(value));
    }

    let id = profiles
        .get_id_by_str(value)
        .with_context(|| format!("{value} is neither a number nor a known profile"))?;
    Ok(Availability::from(&profiles[&id]))
}

/// Read a model from the specified directory.
///
/// Profiles are loaded first, as generators and loads may refer to them, followed by the
/// network's components. The network is validated as a whole once all components are read.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// The static model data ([`Model`]) or an error.
pub fn load_model<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
    let model_dir = model_dir.as_ref();
    let parameters = ModelParameters::from_path(model_dir)?;
    let snapshots = parameters
        .snapshots
        .to_snapshot_set()
        .context("Invalid snapshots")
        .with_context(|| input_err_msg(model_dir.join(MODEL_PARAMETERS_FILE_NAME)))?;

    let profiles = read_profiles(model_dir, &parameters.profiles, &snapshots);

    let buses = read_buses(model_dir)?;
    let bus_ids: IndexSet<BusID> = buses.iter().map(|bus| bus.id.clone()).collect();
    let loads = read_loads(model_dir, &bus_ids, &snapshots, &profiles)?;
    let generators = read_generators(model_dir, &bus_ids, &profiles)?;
    let storage_units = read_storage_units(model_dir, &bus_ids)?;

    let mut builder = NetworkBuilder::new(snapshots);
    for bus in buses {
        builder = builder.add_bus(bus);
    }
    for load in loads {
        builder = builder.add_load(load);
    }
    for generator in generators {
        builder = builder.add_generator(generator);
    }
    for storage_unit in storage_units {
        builder = builder.add_storage_unit(storage_unit);
    }
    if parameters.unserved_energy.enabled {
        builder = builder.with_unserved_energy(parameters.unserved_energy.marginal_cost);
    }
    let network = builder.build().context("Invalid network")?;

    Ok(Model {
        model_path: model_dir.to_path_buf(),
        parameters,
        network,
        profiles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use crate::profile::ProfileSource;
    use serde::Deserialize;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Record {
        id: String,
        value: Option<f64>,
    }

    /// Create an example CSV file in dir_path
    fn create_csv_file(dir_path: &Path, contents: &str) -> PathBuf {
        let file_path = dir_path.join("test.csv");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{contents}").unwrap();
        file_path
    }

    #[test]
    fn test_read_csv() {
        let dir = tempdir().unwrap();
        let file_path = create_csv_file(dir.path(), "id,value\nhello, 1\nworld,");
        let records: Vec<Record> = read_csv(&file_path).unwrap();
        assert_eq!(
            records,
            [
                Record {
                    id: "hello".into(),
                    value: Some(1.0)
                },
                Record {
                    id: "world".into(),
                    value: None
                }
            ]
        );

        // File with no data rows
        let file_path = create_csv_file(dir.path(), "id,value\n");
        assert!(read_csv::<Record>(&file_path).is_err());
        assert!(
            read_csv_optional::<Record>(&file_path)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_read_csv_optional_missing() {
        let dir = tempdir().unwrap();
        let records: Vec<Record> = read_csv_optional(&dir.path().join("missing.csv")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_read_toml() {
        #[derive(Debug, PartialEq, Deserialize)]
        struct Value {
            value: u32,
        }

        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.toml");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "value = 1").unwrap();
        }
        assert_eq!(read_toml::<Value>(&file_path).unwrap(), Value { value: 1 });

        // Not valid TOML for this type
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "bad toml syntax").unwrap();
        }
        assert_error!(
            read_toml::<Value>(&file_path),
            format!("Error reading {}", file_path.display())
        );
    }

    #[test]
    fn test_capacity_columns() {
        assert_eq!(CapacityColumns::default().to_spec(), CapacitySpec::default());

        let columns = CapacityColumns {
            capital_cost: Some(10.0),
            p_nom_min: Some(100.0),
            ..Default::default()
        };
        assert_eq!(
            columns.to_spec(),
            CapacitySpec::must_build(MoneyPerPower(10.0), Power(100.0))
        );
    }

    #[test]
    fn test_parse_availability() {
        let mut profiles = IndexMap::new();
        profiles.insert(
            ProfileID::new("solar"),
            Profile::new(vec![0.0, 0.5], ProfileSource::Synthetic),
        );

        assert_eq!(
            parse_availability(None, &profiles).unwrap(),
            Availability::Constant(1.0)
        );
        assert_eq!(
            parse_availability(Some("0.25"), &profiles).unwrap(),
            Availability::Constant(0.25)
        );
        assert_eq!(
            parse_availability(Some("solar"), &profiles).unwrap(),
            Availability::Series(vec![0.0, 0.5])
        );
        assert_error!(
            parse_availability(Some("wind"), &profiles),
            "wind is neither a number nor a known profile"
        );
    }
}
