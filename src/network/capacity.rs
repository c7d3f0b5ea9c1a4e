//! Capacity parameters shared by generators and storage units.
use crate::units::{MoneyPerPower, Power};
use anyhow::{Result, ensure};

/// How the capacity of a component is treated in the optimisation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CapacityMode {
    /// Capacity is an input and is not optimised
    Fixed(Power),
    /// Capacity is a decision variable with the given bounds.
    ///
    /// The upper bound may be infinite.
    Extendable {
        /// Minimum capacity which must be built
        min: Power,
        /// Maximum capacity which may be built
        max: Power,
    },
}

impl CapacityMode {
    /// Whether capacity is a decision variable
    pub fn is_extendable(&self) -> bool {
        matches!(self, Self::Extendable { .. })
    }
}

/// The capacity economics of a component, with the same defaults as used for input files
#[derive(Debug, Clone, PartialEq)]
pub struct CapacitySpec {
    /// Cost per MW of capacity built
    pub capital_cost: MoneyPerPower,
    /// Installed capacity, used when capacity is not optimised
    pub p_nom: Power,
    /// Lower bound on capacity built
    pub p_nom_min: Power,
    /// Upper bound on capacity built
    pub p_nom_max: Power,
    /// Whether capacity is a decision variable
    pub p_nom_extendable: bool,
}

impl Default for CapacitySpec {
    fn default() -> Self {
        Self {
            capital_cost: MoneyPerPower(0.0),
            p_nom: Power(0.0),
            p_nom_min: Power(0.0),
            p_nom_max: Power(f64::INFINITY),
            p_nom_extendable: false,
        }
    }
}

impl CapacitySpec {
    /// Capacity which can be expanded without limit at the given cost
    pub fn extendable(capital_cost: MoneyPerPower) -> Self {
        Self {
            capital_cost,
            p_nom_extendable: true,
            ..Default::default()
        }
    }

    /// Capacity which must be built up to at least `p_nom_min`
    pub fn must_build(capital_cost: MoneyPerPower, p_nom_min: Power) -> Self {
        Self {
            capital_cost,
            p_nom_min,
            ..Default::default()
        }
    }

    /// Check the parameters are consistent
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.capital_cost.is_finite() && self.capital_cost >= MoneyPerPower(0.0),
            "capital_cost must be a finite number greater than or equal to zero"
        );
        ensure!(
            self.p_nom.is_finite() && self.p_nom >= Power(0.0),
            "p_nom must be a finite number greater than or equal to zero"
        );
        ensure!(
            self.p_nom_min.is_finite() && self.p_nom_min >= Power(0.0),
            "p_nom_min must be a finite number greater than or equal to zero"
        );
        ensure!(
            !self.p_nom_max.value().is_nan() && self.p_nom_max >= self.p_nom_min,
            "p_nom_max must be greater than or equal to p_nom_min"
        );

        Ok(())
    }

    /// Determine how capacity is treated in the optimisation.
    ///
    /// A positive `p_nom_min` makes capacity a decision variable even if `p_nom_extendable` is
    /// not set, as the floor can only be enforced on a variable.
    pub fn mode(&self) -> CapacityMode {
        if self.p_nom_extendable || self.p_nom_min > Power(0.0) {
            CapacityMode::Extendable {
                min: self.p_nom_min,
                max: self.p_nom_max,
            }
        } else {
            CapacityMode::Fixed(self.p_nom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_mode() {
        assert_eq!(CapacitySpec::default().mode(), CapacityMode::Fixed(Power(0.0)));
        assert_eq!(
            CapacitySpec::extendable(MoneyPerPower(1.0)).mode(),
            CapacityMode::Extendable {
                min: Power(0.0),
                max: Power(f64::INFINITY)
            }
        );
        assert_eq!(
            CapacitySpec::must_build(MoneyPerPower(10.0), Power(100.0)).mode(),
            CapacityMode::Extendable {
                min: Power(100.0),
                max: Power(f64::INFINITY)
            }
        );
    }

    #[rstest]
    #[case(CapacitySpec::default(), true)]
    #[case(CapacitySpec::must_build(MoneyPerPower(1.0), Power(5.0)), true)]
    #[case(CapacitySpec { capital_cost: MoneyPerPower(-1.0), ..Default::default() }, false)]
    #[case(CapacitySpec { capital_cost: MoneyPerPower(f64::NAN), ..Default::default() }, false)]
    #[case(CapacitySpec { p_nom: Power(-1.0), ..Default::default() }, false)]
    #[case(CapacitySpec { p_nom_min: Power(f64::INFINITY), ..Default::default() }, false)]
    #[case(
        CapacitySpec { p_nom_min: Power(10.0), p_nom_max: Power(5.0), ..Default::default() },
        false
    )]
    fn test_validate(#[case] spec: CapacitySpec, #[case] valid: bool) {
        assert_eq!(spec.validate().is_ok(), valid);
    }
}
