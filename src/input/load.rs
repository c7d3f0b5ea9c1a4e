//! Code for reading the loads CSV file.
use super::*;
use crate::network::Load;
use crate::snapshot::SnapshotSet;
use serde::Deserialize;

const LOADS_FILE_NAME: &str = "loads.csv";

/// Represents a row of the loads CSV file
#[derive(Deserialize)]
struct LoadRaw {
    id: String,
    bus: String,
    p_set: f64,
    profile: Option<String>,
}

/// Read loads from the loads CSV file.
///
/// A load's demand is `p_set` in every snapshot, or `p_set` scaled by the given profile.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `bus_ids` - All known bus IDs
/// * `snapshots` - The snapshots of the model
/// * `profiles` - Profiles which loads may be scaled by
pub fn read_loads(
    model_dir: &Path,
    bus_ids: &IndexSet<BusID>,
    snapshots: &SnapshotSet,
    profiles: &IndexMap<ProfileID, Profile>,
) -> Result<Vec<Load>> {
    let file_path = model_dir.join(LOADS_FILE_NAME);
    let loads_csv = read_csv(&file_path)?;
    read_loads_from_iter(loads_csv.into_iter(), bus_ids, snapshots, profiles)
        .with_context(|| input_err_msg(&file_path))
}

fn read_loads_from_iter<I>(
    iter: I,
    bus_ids: &IndexSet<BusID>,
    snapshots: &SnapshotSet,
    profiles: &IndexMap<ProfileID, Profile>,
) -> Result<Vec<Load>>
where
    I: Iterator<Item = LoadRaw>,
{
    let mut loads = Vec::new();
    for raw in iter {
        let bus_id = bus_ids.get_id_by_str(&raw.bus)?;
        let p_set = Power(raw.p_set);
        let load = match raw.profile.as_deref() {
            None => Load::constant(raw.id.into(), bus_id, p_set, snapshots.len())?,
            Some(profile) => {
                let profile_id = profiles.get_id_by_str(profile).with_context(|| {
                    format!("Unknown profile {profile} for load {}", raw.id)
                })?;
                let demand = profiles[&profile_id]
                    .values()
                    .iter()
                    .map(|value| p_set * *value)
                    .collect();
                Load::new(raw.id.into(), bus_id, demand)?
            }
        };
        loads.push(load);
    }

    Ok(loads)
}
