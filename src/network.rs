//! The electricity network: buses and the components attached to them.
//!
//! Networks are assembled with a [`NetworkBuilder`], which checks that the network is well formed
//! when [`NetworkBuilder::build`] is called. Once built, a [`Network`] is never modified.
use crate::id::define_id_type;
use crate::snapshot::SnapshotSet;
use crate::units::{MoneyPerEnergy, Power};
use anyhow::{Context, Result, bail, ensure};
use indexmap::{IndexMap, IndexSet};
use log::debug;

pub mod capacity;
pub use capacity::{CapacityMode, CapacitySpec};
pub mod generator;
pub use generator::{Availability, Generator, GeneratorSpec};
pub mod storage;
pub use storage::{StorageUnit, StorageUnitSpec};

define_id_type! {BusID}
define_id_type! {ComponentID}

/// The default carrier for buses
pub const DEFAULT_BUS_CARRIER: &str = "AC";

/// A node of the network to which components are attached
#[derive(Debug, Clone, PartialEq)]
pub struct Bus {
    /// Unique identifier
    pub id: BusID,
    /// Energy carrier
    pub carrier: String,
}

impl Bus {
    /// Create a new [`Bus`] with the default carrier
    pub fn new(id: BusID) -> Self {
        Self {
            id,
            carrier: DEFAULT_BUS_CARRIER.into(),
        }
    }
}

/// A fixed demand attached to a bus
#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    /// Unique identifier
    pub id: ComponentID,
    /// The bus the demand is drawn from
    pub bus_id: BusID,
    /// Demand in each snapshot
    pub p_set: Vec<Power>,
}

impl Load {
    /// Create a new [`Load`] with a demand for every snapshot.
    pub fn new(id: ComponentID, bus_id: BusID, p_set: Vec<Power>) -> Result<Self> {
        ensure!(
            p_set.iter().all(|p| p.is_finite() && *p >= Power(0.0)),
            "Demand for load {id} must be finite and non-negative"
        );

        Ok(Self { id, bus_id, p_set })
    }

    /// Create a new [`Load`] with the same demand in `num_snapshots` snapshots
    pub fn constant(
        id: ComponentID,
        bus_id: BusID,
        p_set: Power,
        num_snapshots: usize,
    ) -> Result<Self> {
        Self::new(id, bus_id, vec![p_set; num_snapshots])
    }
}

/// An assembled network, ready to be optimised
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    /// The snapshots making up the planning horizon
    pub snapshots: SnapshotSet,
    /// Buses
    pub buses: IndexMap<BusID, Bus>,
    /// Loads
    pub loads: IndexMap<ComponentID, Load>,
    /// Generators, including any unserved energy generators
    pub generators: IndexMap<ComponentID, Generator>,
    /// Storage units
    pub storage_units: IndexMap<ComponentID, StorageUnit>,
}

impl Network {
    /// Total demand at the given bus in the given snapshot
    pub fn demand(&self, bus_id: &BusID, snapshot: usize) -> Power {
        self.loads
            .values()
            .filter(|load| load.bus_id == *bus_id)
            .map(|load| load.p_set[snapshot])
            .sum()
    }

    /// Total demand across all buses in the given snapshot
    pub fn total_demand(&self, snapshot: usize) -> Power {
        self.loads.values().map(|load| load.p_set[snapshot]).sum()
    }

    /// Iterate over the generators attached to the given bus
    pub fn iter_generators_for_bus<'a>(
        &'a self,
        bus_id: &'a BusID,
    ) -> impl Iterator<Item = &'a Generator> {
        self.generators.values().filter(move |g| g.bus_id == *bus_id)
    }

    /// Iterate over the storage units attached to the given bus
    pub fn iter_storage_units_for_bus<'a>(
        &'a self,
        bus_id: &'a BusID,
    ) -> impl Iterator<Item = &'a StorageUnit> {
        self.storage_units
            .values()
            .filter(move |s| s.bus_id == *bus_id)
    }
}

/// Assembles a [`Network`] one component at a time
pub struct NetworkBuilder {
    snapshots: SnapshotSet,
    buses: Vec<Bus>,
    loads: Vec<Load>,
    generators: Vec<Generator>,
    storage_units: Vec<StorageUnit>,
    unserved_energy_cost: Option<MoneyPerEnergy>,
}

impl NetworkBuilder {
    /// Start a new network for the given snapshots
    pub fn new(snapshots: SnapshotSet) -> Self {
        Self {
            snapshots,
            buses: Vec::new(),
            loads: Vec::new(),
            generators: Vec::new(),
            storage_units: Vec::new(),
            unserved_energy_cost: None,
        }
    }

    /// The snapshots of the network being built
    pub fn snapshots(&self) -> &SnapshotSet {
        &self.snapshots
    }

    /// Add a bus
    pub fn add_bus(mut self, bus: Bus) -> Self {
        self.buses.push(bus);
        self
    }

    /// Add a load
    pub fn add_load(mut self, load: Load) -> Self {
        self.loads.push(load);
        self
    }

    /// Add a generator
    pub fn add_generator(mut self, generator: Generator) -> Self {
        self.generators.push(generator);
        self
    }

    /// Add a storage unit
    pub fn add_storage_unit(mut self, storage_unit: StorageUnit) -> Self {
        self.storage_units.push(storage_unit);
        self
    }

    /// Add an unserved energy generator with the given marginal cost to every bus.
    ///
    /// This guarantees the energy balance can always be satisfied.
    pub fn with_unserved_energy(mut self, marginal_cost: MoneyPerEnergy) -> Self {
        self.unserved_energy_cost = Some(marginal_cost);
        self
    }

    /// Check the network is well formed and return it.
    ///
    /// Checks that IDs are unique, that every component is attached to a known bus and that every
    /// time series covers exactly the snapshots of the network.
    pub fn build(self) -> Result<Network> {
        ensure!(!self.buses.is_empty(), "Network must have at least one bus");

        let mut buses = IndexMap::new();
        for bus in self.buses {
            let id = bus.id.clone();
            ensure!(
                buses.insert(id.clone(), bus).is_none(),
                "Duplicate bus ID {id}"
            );
        }

        let num_snapshots = self.snapshots.len();
        let mut component_ids = IndexSet::new();
        let mut check_component = |id: &ComponentID, bus_id: &BusID| -> Result<()> {
            ensure!(
                component_ids.insert(id.clone()),
                "Duplicate component ID {id}"
            );
            ensure!(
                buses.contains_key(bus_id),
                "Component {id} is attached to unknown bus {bus_id}"
            );
            Ok(())
        };

        let mut loads = IndexMap::new();
        for load in self.loads {
            check_component(&load.id, &load.bus_id)?;
            check_series_len(&load.id, load.p_set.len(), num_snapshots)?;
            loads.insert(load.id.clone(), load);
        }

        let mut generators = IndexMap::new();
        for generator in self.generators {
            check_component(&generator.id, &generator.bus_id)?;
            if let Some(len) = generator.p_max_pu.series_len() {
                check_series_len(&generator.id, len, num_snapshots)?;
            }
            generators.insert(generator.id.clone(), generator);
        }

        let mut storage_units = IndexMap::new();
        for storage_unit in self.storage_units {
            check_component(&storage_unit.id, &storage_unit.bus_id)?;
            storage_units.insert(storage_unit.id.clone(), storage_unit);
        }

        if let Some(cost) = self.unserved_energy_cost {
            ensure!(
                cost.is_finite() && cost > MoneyPerEnergy(0.0),
                "Unserved energy cost must be a finite number greater than zero"
            );
            for bus_id in buses.keys() {
                let generator = Generator::unserved_energy(bus_id, cost);
                check_component(&generator.id, bus_id)
                    .context("Could not add unserved energy generator")?;
                debug!("Adding unserved energy generator for bus {bus_id}");
                generators.insert(generator.id.clone(), generator);
            }
        }

        Ok(Network {
            snapshots: self.snapshots,
            buses,
            loads,
            generators,
            storage_units,
        })
    }
}

/// Check that a time series covers every snapshot
fn check_series_len(id: &ComponentID, len: usize, num_snapshots: usize) -> Result<()> {
    if len != num_snapshots {
        bail!("Time series for {id} has {len} values but there are {num_snapshots} snapshots");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, bus_id, single_snapshot};
    use crate::units::MoneyPerPower;
    use rstest::rstest;

    fn generator(id: &str, bus_id: &BusID) -> Generator {
        Generator::new(id.into(), bus_id.clone(), GeneratorSpec::default()).unwrap()
    }

    #[rstest]
    fn test_build(single_snapshot: SnapshotSet, bus_id: BusID) {
        let network = NetworkBuilder::new(single_snapshot)
            .add_bus(Bus::new(bus_id.clone()))
            .add_load(Load::constant("load".into(), bus_id.clone(), Power(100.0), 1).unwrap())
            .add_generator(generator("gen", &bus_id))
            .with_unserved_energy(MoneyPerEnergy(1e5))
            .build()
            .unwrap();

        assert_eq!(network.generators.len(), 2);
        assert!(network.generators[1].is_unserved_energy);
        assert_eq!(network.demand(&bus_id, 0), Power(100.0));
        assert_eq!(network.total_demand(0), Power(100.0));
        assert_eq!(network.iter_generators_for_bus(&bus_id).count(), 2);
    }

    #[rstest]
    fn test_build_no_buses(single_snapshot: SnapshotSet) {
        assert_error!(
            NetworkBuilder::new(single_snapshot).build(),
            "Network must have at least one bus"
        );
    }

    #[rstest]
    fn test_build_unknown_bus(single_snapshot: SnapshotSet, bus_id: BusID) {
        assert_error!(
            NetworkBuilder::new(single_snapshot)
                .add_bus(Bus::new(bus_id))
                .add_generator(generator("gen", &"elsewhere".into()))
                .build(),
            "Component gen is attached to unknown bus elsewhere"
        );
    }

    #[rstest]
    fn test_build_duplicate_component(single_snapshot: SnapshotSet, bus_id: BusID) {
        assert_error!(
            NetworkBuilder::new(single_snapshot)
                .add_bus(Bus::new(bus_id.clone()))
                .add_load(Load::constant("x".into(), bus_id.clone(), Power(1.0), 1).unwrap())
                .add_generator(generator("x", &bus_id))
                .build(),
            "Duplicate component ID x"
        );
    }

    #[rstest]
    fn test_build_duplicate_bus(single_snapshot: SnapshotSet, bus_id: BusID) {
        assert_error!(
            NetworkBuilder::new(single_snapshot)
                .add_bus(Bus::new(bus_id.clone()))
                .add_bus(Bus::new(bus_id))
                .build(),
            "Duplicate bus ID south"
        );
    }

    #[rstest]
    fn test_build_series_len_mismatch(single_snapshot: SnapshotSet, bus_id: BusID) {
        let spec = GeneratorSpec {
            capacity: CapacitySpec::extendable(MoneyPerPower(1.0)),
            p_max_pu: Availability::Series(vec![1.0, 1.0]),
            ..Default::default()
        };
        assert_error!(
            NetworkBuilder::new(single_snapshot)
                .add_bus(Bus::new(bus_id.clone()))
                .add_generator(Generator::new("solar".into(), bus_id, spec).unwrap())
                .build(),
            "Time series for solar has 2 values but there are 1 snapshots"
        );
    }

    #[rstest]
    fn test_build_unserved_energy_name_clash(single_snapshot: SnapshotSet, bus_id: BusID) {
        assert_error!(
            NetworkBuilder::new(single_snapshot)
                .add_bus(Bus::new(bus_id.clone()))
                .add_generator(generator("south unserved energy", &bus_id))
                .with_unserved_energy(MoneyPerEnergy(1e5))
                .build(),
            "Could not add unserved energy generator"
        );
    }

    #[test]
    fn test_load_negative_demand() {
        assert!(Load::new("load".into(), "bus".into(), vec![Power(-1.0)]).is_err());
    }
}
