//! Fixtures for tests
use crate::network::{
    Bus, BusID, CapacitySpec, Generator, GeneratorSpec, Load, Network, NetworkBuilder,
};
use crate::snapshot::SnapshotSet;
use crate::units::{Hours, MoneyPerEnergy, MoneyPerPower, Power};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Midnight on 1 January 2024
pub fn start_of_2024() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

#[fixture]
pub fn bus_id() -> BusID {
    "south".into()
}

#[fixture]
pub fn single_snapshot() -> SnapshotSet {
    SnapshotSet::new(vec![start_of_2024()], Hours(1.0)).unwrap()
}

#[fixture]
pub fn hourly_day() -> SnapshotSet {
    SnapshotSet::from_count(start_of_2024(), 24, TimeDelta::hours(1), false).unwrap()
}

/// A single-snapshot network with 100 MW of demand, a generator which must be built to at least
/// `floor` MW and an unserved energy generator
pub fn must_build_network(floor: f64) -> Network {
    let bus_id: BusID = "south".into();
    let spec = GeneratorSpec {
        carrier: "test".into(),
        capacity: CapacitySpec::must_build(MoneyPerPower(10.0), Power(floor)),
        marginal_cost: MoneyPerEnergy(0.0),
        ..Default::default()
    };

    let snapshots = SnapshotSet::new(vec![start_of_2024()], Hours(1.0)).unwrap();
    NetworkBuilder::new(snapshots)
        .add_bus(Bus::new(bus_id.clone()))
        .add_load(Load::constant("national load".into(), bus_id.clone(), Power(100.0), 1).unwrap())
        .add_generator(Generator::new("test generator".into(), bus_id, spec).unwrap())
        .with_unserved_energy(MoneyPerEnergy(1e5))
        .build()
        .unwrap()
}

#[fixture]
pub fn network() -> Network {
    must_build_network(100.0)
}
