//! Code for reading the storage units CSV file.
use super::*;
use crate::network::{StorageUnit, StorageUnitSpec};
use crate::units::{Energy, Hours, MoneyPerEnergy};
use serde::Deserialize;

const STORAGE_UNITS_FILE_NAME: &str = "storage_units.csv";

/// Represents a row of the storage units CSV file
#[derive(Deserialize)]
struct StorageUnitRaw {
    id: String,
    bus: String,
    carrier: Option<String>,
    capital_cost: Option<f64>,
    marginal_cost: Option<f64>,
    p_nom: Option<f64>,
    p_nom_min: Option<f64>,
    p_nom_max: Option<f64>,
    p_nom_extendable: Option<bool>,
    max_hours: Option<f64>,
    efficiency_store: Option<f64>,
    efficiency_dispatch: Option<f64>,
    standing_loss: Option<f64>,
    cyclic_state_of_charge: Option<bool>,
    state_of_charge_initial: Option<f64>,
}

impl StorageUnitRaw {
    fn to_spec(&self) -> StorageUnitSpec {
        let default = StorageUnitSpec::default();
        let capacity = CapacityColumns {
            capital_cost: self.capital_cost,
            p_nom: self.p_nom,
            p_nom_min: self.p_nom_min,
            p_nom_max: self.p_nom_max,
            p_nom_extendable: self.p_nom_extendable,
        };

        StorageUnitSpec {
            carrier: self.carrier.clone().unwrap_or_default(),
            capacity: capacity.to_spec(),
            marginal_cost: self
                .marginal_cost
                .map_or(default.marginal_cost, MoneyPerEnergy),
            max_hours: self.max_hours.map_or(default.max_hours, Hours),
            efficiency_store: self.efficiency_store.unwrap_or(default.efficiency_store),
            efficiency_dispatch: self
                .efficiency_dispatch
                .unwrap_or(default.efficiency_dispatch),
            standing_loss: self.standing_loss.unwrap_or(default.standing_loss),
            cyclic_state_of_charge: self
                .cyclic_state_of_charge
                .unwrap_or(default.cyclic_state_of_charge),
            state_of_charge_initial: self
                .state_of_charge_initial
                .map_or(default.state_of_charge_initial, Energy),
        }
    }
}

/// Read storage units from the storage units CSV file.
///
/// This file is optional. If it is missing, the model has no storage.
pub fn read_storage_units(model_dir: &Path, bus_ids: &IndexSet<BusID>) -> Result<Vec<StorageUnit>> {
    let file_path = model_dir.join(STORAGE_UNITS_FILE_NAME);
    let storage_csv = read_csv_optional(&file_path)?;
    read_storage_units_from_iter(storage_csv.into_iter(), bus_ids)
        .with_context(|| input_err_msg(&file_path))
}

fn read_storage_units_from_iter<I>(iter: I, bus_ids: &IndexSet<BusID>) -> Result<Vec<StorageUnit>>
where
    I: Iterator<Item = StorageUnitRaw>,
{
    iter.map(|raw| {
        let bus_id = bus_ids.get_id_by_str(&raw.bus)?;
        StorageUnit::new(raw.id.clone().into(), bus_id, raw.to_spec())
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_read_storage_units() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(STORAGE_UNITS_FILE_NAME)).unwrap();
            writeln!(
                file,
                "id,bus,carrier,capital_cost,p_nom_extendable,max_hours,efficiency_store,efficiency_dispatch,cyclic_state_of_charge
battery,south,battery,100,true,4,0.95,0.95,true"
            )
            .unwrap();
        }
        let bus_ids = ["south".into()].into_iter().collect();

        let units = read_storage_units(dir.path(), &bus_ids).unwrap();
        assert_eq!(units.len(), 1);
        let battery = &units[0];
        assert!(battery.capacity.is_extendable());
        assert_eq!(battery.max_hours, Hours(4.0));
        assert_eq!(battery.efficiency_store, 0.95);
        assert_eq!(battery.standing_loss, 0.0);
        assert!(battery.cyclic_state_of_charge);
    }

    #[test]
    fn test_read_storage_units_missing_file() {
        let dir = tempdir().unwrap();
        let bus_ids = ["south".into()].into_iter().collect();
        assert!(read_storage_units(dir.path(), &bus_ids).unwrap().is_empty());
    }

    #[test]
    fn test_read_storage_units_invalid() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(STORAGE_UNITS_FILE_NAME)).unwrap();
            writeln!(file, "id,bus,efficiency_store\nbattery,south,1.5").unwrap();
        }
        let bus_ids = ["south".into()].into_iter().collect();
        assert!(read_storage_units(dir.path(), &bus_ids).is_err());
    }
}
