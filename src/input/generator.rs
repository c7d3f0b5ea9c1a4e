//! Code for reading the generators CSV file.
use super::*;
use crate::network::{Generator, GeneratorSpec};
use crate::units::MoneyPerEnergy;
use serde::Deserialize;

const GENERATORS_FILE_NAME: &str = "generators.csv";

/// Represents a row of the generators CSV file
#[derive(Deserialize)]
struct GeneratorRaw {
    id: String,
    bus: String,
    carrier: Option<String>,
    capital_cost: Option<f64>,
    marginal_cost: Option<f64>,
    p_nom: Option<f64>,
    p_nom_min: Option<f64>,
    p_nom_max: Option<f64>,
    p_nom_extendable: Option<bool>,
    p_min_pu: Option<f64>,
    p_max_pu: Option<String>,
}

impl GeneratorRaw {
    fn to_spec(&self, profiles: &IndexMap<ProfileID, Profile>) -> Result<GeneratorSpec> {
        let capacity = CapacityColumns {
            capital_cost: self.capital_cost,
            p_nom: self.p_nom,
            p_nom_min: self.p_nom_min,
            p_nom_max: self.p_nom_max,
            p_nom_extendable: self.p_nom_extendable,
        };
        let p_max_pu = parse_availability(self.p_max_pu.as_deref(), profiles)
            .with_context(|| format!("Invalid p_max_pu for generator {}", self.id))?;

        Ok(GeneratorSpec {
            carrier: self.carrier.clone().unwrap_or_default(),
            capacity: capacity.to_spec(),
            marginal_cost: MoneyPerEnergy(self.marginal_cost.unwrap_or(0.0)),
            p_min_pu: self.p_min_pu.unwrap_or(0.0),
            p_max_pu,
        })
    }
}

/// Read generators from the generators CSV file.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `bus_ids` - All known bus IDs
/// * `profiles` - Profiles which may be used for `p_max_pu`
pub fn read_generators(
    model_dir: &Path,
    bus_ids: &IndexSet<BusID>,
    profiles: &IndexMap<ProfileID, Profile>,
) -> Result<Vec<Generator>> {
    let file_path = model_dir.join(GENERATORS_FILE_NAME);
    let generators_csv = read_csv(&file_path)?;
    read_generators_from_iter(generators_csv.into_iter(), bus_ids, profiles)
        .with_context(|| input_err_msg(&file_path))
}

fn read_generators_from_iter<I>(
    iter: I,
    bus_ids: &IndexSet<BusID>,
    profiles: &IndexMap<ProfileID, Profile>,
) -> Result<Vec<Generator>>
where
    I: Iterator<Item = GeneratorRaw>,
{
    iter.map(|raw| {
        let bus_id = bus_ids.get_id_by_str(&raw.bus)?;
        let spec = raw.to_spec(profiles)?;
        Generator::new(raw.id.into(), bus_id, spec)
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Availability, CapacityMode};
    use crate::profile::ProfileSource;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_read_generators() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(GENERATORS_FILE_NAME)).unwrap();
            writeln!(
                file,
                "id,bus,carrier,capital_cost,marginal_cost,p_nom,p_nom_min,p_nom_max,p_nom_extendable,p_min_pu,p_max_pu
gas,south,gas,,50,200,,,,,
solar,south,solar,60,,,,500,true,,solar_cf
coal,south,coal,10,0,,100,,,0.2,0.9"
            )
            .unwrap();
        }
        let bus_ids = ["south".into()].into_iter().collect();
        let mut profiles = IndexMap::new();
        profiles.insert(
            ProfileID::new("solar_cf"),
            Profile::new(vec![0.3], ProfileSource::Zero),
        );

        let generators = read_generators(dir.path(), &bus_ids, &profiles).unwrap();
        assert_eq!(generators.len(), 3);

        let gas = &generators[0];
        assert_eq!(gas.capacity, CapacityMode::Fixed(Power(200.0)));
        assert_eq!(gas.marginal_cost, MoneyPerEnergy(50.0));
        assert_eq!(gas.p_max_pu, Availability::Constant(1.0));

        let solar = &generators[1];
        assert_eq!(
            solar.capacity,
            CapacityMode::Extendable {
                min: Power(0.0),
                max: Power(500.0)
            }
        );
        assert_eq!(solar.p_max_pu, Availability::Series(vec![0.3]));

        // A floor on capacity makes it a decision variable
        let coal = &generators[2];
        assert!(coal.capacity.is_extendable());
        assert_eq!(coal.p_min_pu, 0.2);
        assert_eq!(coal.p_max_pu, Availability::Constant(0.9));
    }

    #[test]
    fn test_read_generators_bad_profile() {
        let iter = [GeneratorRaw {
            id: "wind".into(),
            bus: "south".into(),
            carrier: None,
            capital_cost: None,
            marginal_cost: None,
            p_nom: None,
            p_nom_min: None,
            p_nom_max: None,
            p_nom_extendable: None,
            p_min_pu: None,
            p_max_pu: Some("wind_cf".into()),
        }]
        .into_iter();
        let bus_ids = ["south".into()].into_iter().collect();
        assert!(read_generators_from_iter(iter, &bus_ids, &IndexMap::new()).is_err());
    }
}
