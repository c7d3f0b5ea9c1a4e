//! Generators: components which inject power into a bus.
use super::{BusID, CapacityMode, CapacitySpec, ComponentID};
use crate::profile::Profile;
use crate::units::{MoneyPerEnergy, MoneyPerPower, Power};
use anyhow::{Context, Result, ensure};

/// The availability of a generator in each snapshot, as a fraction of its capacity
#[derive(Debug, Clone, PartialEq)]
pub enum Availability {
    /// The same value in every snapshot
    Constant(f64),
    /// One value per snapshot
    Series(Vec<f64>),
}

impl Availability {
    /// The availability in the snapshot with the given index
    pub fn get(&self, snapshot: usize) -> f64 {
        match self {
            Self::Constant(value) => *value,
            Self::Series(values) => values[snapshot],
        }
    }

    /// The number of values in the series, if it is one
    pub fn series_len(&self) -> Option<usize> {
        match self {
            Self::Constant(_) => None,
            Self::Series(values) => Some(values.len()),
        }
    }

    fn validate(&self) -> Result<()> {
        let in_range = |value: &f64| (0.0..=1.0).contains(value);
        let valid = match self {
            Self::Constant(value) => in_range(value),
            Self::Series(values) => values.iter().all(in_range),
        };
        ensure!(valid, "p_max_pu values must be between 0 and 1");

        Ok(())
    }
}

impl Default for Availability {
    fn default() -> Self {
        Self::Constant(1.0)
    }
}

impl From<&Profile> for Availability {
    fn from(profile: &Profile) -> Self {
        Self::Series(profile.values().to_vec())
    }
}

/// The parameters of a generator, with the same defaults as used for input files
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSpec {
    /// Energy carrier (e.g. "solar", "gas")
    pub carrier: String,
    /// Capacity economics
    pub capacity: CapacitySpec,
    /// Cost per MWh produced
    pub marginal_cost: MoneyPerEnergy,
    /// Minimum dispatch in every snapshot as a fraction of capacity
    pub p_min_pu: f64,
    /// Maximum dispatch as a fraction of capacity
    pub p_max_pu: Availability,
}

impl Default for GeneratorSpec {
    fn default() -> Self {
        Self {
            carrier: String::new(),
            capacity: CapacitySpec::default(),
            marginal_cost: MoneyPerEnergy(0.0),
            p_min_pu: 0.0,
            p_max_pu: Availability::default(),
        }
    }
}

/// A generator attached to a bus
#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    /// Unique identifier
    pub id: ComponentID,
    /// The bus the generator feeds into
    pub bus_id: BusID,
    /// Energy carrier
    pub carrier: String,
    /// Cost per MW of capacity built
    pub capital_cost: MoneyPerPower,
    /// Cost per MWh produced
    pub marginal_cost: MoneyPerEnergy,
    /// Whether capacity is fixed or optimised
    pub capacity: CapacityMode,
    /// Minimum dispatch as a fraction of capacity
    pub p_min_pu: f64,
    /// Maximum dispatch as a fraction of capacity
    pub p_max_pu: Availability,
    /// Whether this is the slack generator representing unserved energy
    pub is_unserved_energy: bool,
}

impl Generator {
    /// Create a new [`Generator`], validating its parameters
    pub fn new(id: ComponentID, bus_id: BusID, spec: GeneratorSpec) -> Result<Self> {
        spec.capacity
            .validate()
            .and_then(|()| spec.p_max_pu.validate())
            .and_then(|()| {
                ensure!(
                    spec.marginal_cost.is_finite(),
                    "marginal_cost must be a finite number"
                );
                ensure!(
                    (0.0..=1.0).contains(&spec.p_min_pu),
                    "p_min_pu must be between 0 and 1"
                );
                Ok(())
            })
            .with_context(|| format!("Invalid parameters for generator {id}"))?;

        Ok(Self {
            id,
            bus_id,
            carrier: spec.carrier,
            capital_cost: spec.capacity.capital_cost,
            marginal_cost: spec.marginal_cost,
            capacity: spec.capacity.mode(),
            p_min_pu: spec.p_min_pu,
            p_max_pu: spec.p_max_pu,
            is_unserved_energy: false,
        })
    }

    /// Create the slack generator for the given bus.
    ///
    /// It has unlimited, free capacity but the given (high) marginal cost, so that it is only
    /// dispatched when demand cannot otherwise be met.
    pub fn unserved_energy(bus_id: &BusID, marginal_cost: MoneyPerEnergy) -> Self {
        Self {
            id: format!("{bus_id} unserved energy").into(),
            bus_id: bus_id.clone(),
            carrier: "unserved energy".into(),
            capital_cost: MoneyPerPower(0.0),
            marginal_cost,
            capacity: CapacityMode::Extendable {
                min: Power(0.0),
                max: Power(f64::INFINITY),
            },
            p_min_pu: 0.0,
            p_max_pu: Availability::Constant(1.0),
            is_unserved_energy: true,
        }
    }
}
