//! Storage units: components which can shift energy between snapshots.
use super::{BusID, CapacityMode, CapacitySpec, ComponentID};
use crate::units::{Energy, Hours, MoneyPerEnergy, MoneyPerPower};
use anyhow::{Context, Result, ensure};

/// The parameters of a storage unit, with the same defaults as used for input files
#[derive(Debug, Clone, PartialEq)]
pub struct StorageUnitSpec {
    /// Energy carrier (e.g. "battery")
    pub carrier: String,
    /// Capacity economics. Capacity is the maximum charge/discharge power.
    pub capacity: CapacitySpec,
    /// Cost per MWh discharged
    pub marginal_cost: MoneyPerEnergy,
    /// Ratio of energy capacity to power capacity
    pub max_hours: Hours,
    /// Fraction of power drawn which is stored
    pub efficiency_store: f64,
    /// Fraction of stored energy withdrawn which is delivered
    pub efficiency_dispatch: f64,
    /// Fraction of the state of charge lost per hour
    pub standing_loss: f64,
    /// Whether the state of charge at the end of the horizon feeds into the first snapshot
    pub cyclic_state_of_charge: bool,
    /// State of charge before the first snapshot, when not cyclic
    pub state_of_charge_initial: Energy,
}

impl Default for StorageUnitSpec {
    fn default() -> Self {
        Self {
            carrier: String::new(),
            capacity: CapacitySpec::default(),
            marginal_cost: MoneyPerEnergy(0.0),
            max_hours: Hours(1.0),
            efficiency_store: 1.0,
            efficiency_dispatch: 1.0,
            standing_loss: 0.0,
            cyclic_state_of_charge: false,
            state_of_charge_initial: Energy(0.0),
        }
    }
}

impl StorageUnitSpec {
    fn validate(&self) -> Result<()> {
        self.capacity.validate()?;
        ensure!(
            self.marginal_cost.is_finite(),
            "marginal_cost must be a finite number"
        );
        ensure!(
            self.max_hours.is_finite() && self.max_hours > Hours(0.0),
            "max_hours must be a finite number greater than zero"
        );
        for (name, value) in [
            ("efficiency_store", self.efficiency_store),
            ("efficiency_dispatch", self.efficiency_dispatch),
        ] {
            ensure!(
                value > 0.0 && value <= 1.0,
                "{name} must be greater than zero and no more than one"
            );
        }
        ensure!(
            (0.0..1.0).contains(&self.standing_loss),
            "standing_loss must be at least zero and less than one"
        );
        ensure!(
            self.state_of_charge_initial.is_finite()
                && self.state_of_charge_initial >= Energy(0.0),
            "state_of_charge_initial must be a finite number greater than or equal to zero"
        );

        Ok(())
    }
}

/// A storage unit attached to a bus
#[derive(Debug, Clone, PartialEq)]
pub struct StorageUnit {
    /// Unique identifier
    pub id: ComponentID,
    /// The bus the unit is connected to
    pub bus_id: BusID,
    /// Energy carrier
    pub carrier: String,
    /// Cost per MW of power capacity built
    pub capital_cost: MoneyPerPower,
    /// Cost per MWh discharged
    pub marginal_cost: MoneyPerEnergy,
    /// Whether power capacity is fixed or optimised
    pub capacity: CapacityMode,
    /// Ratio of energy capacity to power capacity
    pub max_hours: Hours,
    /// Fraction of power drawn which is stored
    pub efficiency_store: f64,
    /// Fraction of stored energy withdrawn which is delivered
    pub efficiency_dispatch: f64,
    /// Fraction of the state of charge lost per hour
    pub standing_loss: f64,
    /// Whether the state of charge wraps around the horizon
    pub cyclic_state_of_charge: bool,
    /// State of charge before the first snapshot, when not cyclic
    pub state_of_charge_initial: Energy,
}

impl StorageUnit {
    /// Create a new [`StorageUnit`], validating its parameters
    pub fn new(id: ComponentID, bus_id: BusID, spec: StorageUnitSpec) -> Result<Self> {
        spec.validate()
            .with_context(|| format!("Invalid parameters for storage unit {id}"))?;

        Ok(Self {
            id,
            bus_id,
            carrier: spec.carrier,
            capital_cost: spec.capacity.capital_cost,
            marginal_cost: spec.marginal_cost,
            capacity: spec.capacity.mode(),
            max_hours: spec.max_hours,
            efficiency_store: spec.efficiency_store,
            efficiency_dispatch: spec.efficiency_dispatch,
            standing_loss: spec.standing_loss,
            cyclic_state_of_charge: spec.cyclic_state_of_charge,
            state_of_charge_initial: spec.state_of_charge_initial,
        })
    }

    /// The fraction of the state of charge retained over a snapshot of the given length
    pub fn retention(&self, weighting: Hours) -> f64 {
        (1.0 - self.standing_loss).powf(weighting.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Power;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[test]
    fn test_storage_unit_new() {
        let spec = StorageUnitSpec {
            capacity: CapacitySpec::extendable(MoneyPerPower(50.0)),
            max_hours: Hours(4.0),
            efficiency_store: 0.9,
            efficiency_dispatch: 0.9,
            ..Default::default()
        };
        let unit = StorageUnit::new("battery".into(), "bus".into(), spec).unwrap();
        assert!(unit.capacity.is_extendable());
        assert_eq!(unit.max_hours, Hours(4.0));
    }

    #[rstest]
    #[case(StorageUnitSpec { max_hours: Hours(0.0), ..Default::default() })]
    #[case(StorageUnitSpec { efficiency_store: 0.0, ..Default::default() })]
    #[case(StorageUnitSpec { efficiency_dispatch: 1.1, ..Default::default() })]
    #[case(StorageUnitSpec { standing_loss: 1.0, ..Default::default() })]
    #[case(StorageUnitSpec { state_of_charge_initial: Energy(-1.0), ..Default::default() })]
    #[case(StorageUnitSpec {
        capacity: CapacitySpec { p_nom: Power(-5.0), ..Default::default() },
        ..Default::default()
    })]
    fn test_storage_unit_new_invalid(#[case] spec: StorageUnitSpec) {
        assert!(StorageUnit::new("battery".into(), "bus".into(), spec).is_err());
    }

    #[test]
    fn test_retention() {
        let spec = StorageUnitSpec {
            standing_loss: 0.01,
            ..Default::default()
        };
        let unit = StorageUnit::new("battery".into(), "bus".into(), spec).unwrap();
        assert_approx_eq!(f64, unit.retention(Hours(1.0)), 0.99);
        assert_approx_eq!(f64, unit.retention(Hours(2.0)), 0.9801);
    }
}
