//! Code for reading the buses CSV file.
use super::*;
use crate::network::{Bus, DEFAULT_BUS_CARRIER};
use serde::Deserialize;

const BUSES_FILE_NAME: &str = "buses.csv";

/// Represents a row of the buses CSV file
#[derive(Deserialize)]
struct BusRaw {
    id: String,
    carrier: Option<String>,
}

/// Read buses from the buses CSV file.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// The buses in the order they appear in the file, or an error.
pub fn read_buses(model_dir: &Path) -> Result<Vec<Bus>> {
    let file_path = model_dir.join(BUSES_FILE_NAME);
    let buses_csv = read_csv(&file_path)?;
    read_buses_from_iter(buses_csv.into_iter()).with_context(|| input_err_msg(&file_path))
}

fn read_buses_from_iter<I>(iter: I) -> Result<Vec<Bus>>
where
    I: Iterator<Item = BusRaw>,
{
    iter.map(|raw| {
        ensure!(!raw.id.is_empty(), "Bus ID cannot be empty");
        Ok(Bus {
            id: raw.id.into(),
            carrier: raw
                .carrier
                .unwrap_or_else(|| DEFAULT_BUS_CARRIER.to_string()),
        })
    })
    .collect()
}
