//! Code for adding constraints to the optimisation problem.
use super::{Problem, Variable, VariableMap};
use crate::network::{BusID, Network};
use itertools::chain;

/// Corresponding variables for a constraint along with the row offset in the solution
pub struct KeysWithOffset<T> {
    offset: usize,
    keys: Vec<T>,
}

impl<T> KeysWithOffset<T> {
    /// Zip the keys with the corresponding dual values in the solution, accounting for the offset
    pub fn zip_duals<'a>(&'a self, duals: &'a [f64]) -> impl Iterator<Item = (&'a T, f64)> {
        assert!(
            self.offset + self.keys.len() <= duals.len(),
            "Bad constraint keys: dual rows out of range"
        );

        self.keys.iter().zip(duals[self.offset..].iter().copied())
    }
}

/// Indicates the bus and snapshot index covered by each energy balance constraint
pub type BalanceKeys = KeysWithOffset<(BusID, usize)>;

/// Add an energy balance constraint for every bus and snapshot.
///
/// Generation plus storage discharge minus storage charging must equal demand.
///
/// Note: the dual values of these constraints are later used as marginal prices, so the returned
/// keys must be in the same order as the rows.
pub fn add_balance_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    network: &Network,
) -> BalanceKeys {
    let offset = problem.num_rows;
    let mut keys = Vec::new();

    for bus_id in network.buses.keys() {
        for t in 0..network.snapshots.len() {
            let generation = network
                .iter_generators_for_bus(bus_id)
                .map(|generator| (variables.generators[&generator.id].dispatch[t], 1.0));
            let storage = network
                .iter_storage_units_for_bus(bus_id)
                .flat_map(|storage| {
                    let vars = &variables.storage_units[&storage.id];
                    [(vars.dispatch[t], 1.0), (vars.store[t], -1.0)]
                });

            let demand = network.demand(bus_id, t).value();
            problem.add_row(demand, demand, chain(generation, storage));
            keys.push((bus_id.clone(), t));
        }
    }

    BalanceKeys { offset, keys }
}

/// Add constraints linking the dispatch of extendable generators to their capacity.
///
/// For generators with fixed capacity, these limits are already bounds on the dispatch variables.
pub fn add_generator_constraints(
    problem: &mut Problem,
    variables: &VariableMap,
    network: &Network,
) {
    for (id, vars) in &variables.generators {
        let Some(capacity) = vars.capacity else {
            continue;
        };

        let generator = &network.generators[id];
        for (t, dispatch) in vars.dispatch.iter().enumerate() {
            // dispatch <= p_max_pu * capacity
            add_upper_limit(problem, *dispatch, capacity, generator.p_max_pu.get(t));

            // dispatch >= p_min_pu * capacity
            if generator.p_min_pu > 0.0 {
                problem.add_row(
                    0.0,
                    f64::INFINITY,
                    [(*dispatch, 1.0), (capacity, -generator.p_min_pu)],
                );
            }
        }
    }
}

/// Add storage constraints: power and energy limits for extendable units and state-of-charge
/// continuity for all units.
///
/// The state of charge at the end of snapshot `t` is:
///
/// ```text
/// soc_t = retention_t * soc_{t-1} + w_t * (efficiency_store * store_t - dispatch_t / efficiency_dispatch)
/// ```
///
/// where `soc_{-1}` is either the final state of charge (cyclic) or the initial state of charge.
pub fn add_storage_constraints(problem: &mut Problem, variables: &VariableMap, network: &Network) {
    let num_snapshots = network.snapshots.len();

    for (id, vars) in &variables.storage_units {
        let storage = &network.storage_units[id];

        if let Some(capacity) = vars.capacity {
            for t in 0..num_snapshots {
                add_upper_limit(problem, vars.dispatch[t], capacity, 1.0);
                add_upper_limit(problem, vars.store[t], capacity, 1.0);
                add_upper_limit(
                    problem,
                    vars.state_of_charge[t],
                    capacity,
                    storage.max_hours.value(),
                );
            }
        }

        for (t, (_, weighting)) in network.snapshots.iter_with_weightings().enumerate() {
            let retention = storage.retention(weighting);
            let hours = weighting.value();
            let flows = [
                (vars.store[t], -storage.efficiency_store * hours),
                (vars.dispatch[t], hours / storage.efficiency_dispatch),
            ];

            if t > 0 {
                problem.add_row(
                    0.0,
                    0.0,
                    chain(
                        [
                            (vars.state_of_charge[t], 1.0),
                            (vars.state_of_charge[t - 1], -retention),
                        ],
                        flows,
                    ),
                );
            } else if storage.cyclic_state_of_charge {
                let last = num_snapshots - 1;
                let soc_terms = if last == 0 {
                    // The first and last snapshot are the same, so without losses the state of
                    // charge drops out
                    if retention < 1.0 {
                        vec![(vars.state_of_charge[0], 1.0 - retention)]
                    } else {
                        Vec::new()
                    }
                } else {
                    vec![
                        (vars.state_of_charge[0], 1.0),
                        (vars.state_of_charge[last], -retention),
                    ]
                };
                problem.add_row(0.0, 0.0, chain(soc_terms, flows));
            } else {
                let initial = retention * storage.state_of_charge_initial.value();
                problem.add_row(
                    initial,
                    initial,
                    chain([(vars.state_of_charge[0], 1.0)], flows),
                );
            }
        }
    }
}

/// Add the constraint `var <= factor * capacity`
fn add_upper_limit(problem: &mut Problem, var: Variable, capacity: Variable, factor: f64) {
    problem.add_row(
        f64::NEG_INFINITY,
        0.0,
        [(var, 1.0), (capacity, -factor)],
    );
}
