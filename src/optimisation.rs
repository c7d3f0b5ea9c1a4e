//! Code for performing the capacity expansion and dispatch optimisation.
//!
//! The network is converted into a linear program which minimises the cost of building capacity
//! plus the cost of dispatching it:
//!
//! ```text
//! min  Σ_i capital_cost_i * capacity_i + Σ_i Σ_t w_t * marginal_cost_i * dispatch_{i,t}
//! ```
//!
//! subject to an energy balance for every bus and snapshot, capacity and availability limits on
//! dispatch, and state-of-charge continuity for storage units. The problem is solved with HiGHS.
use crate::log::LOG_LEVEL_ENV_VAR;
use crate::network::{BusID, CapacityMode, ComponentID, Network};
use crate::units::{Energy, Money, MoneyPerEnergy, Power};
use highs::{HighsModelStatus, RowProblem, Sense};
use indexmap::IndexMap;
use log::{debug, info};
use std::fmt;
use strum::{Display, EnumString};

mod constraints;
use constraints::{
    BalanceKeys, add_balance_constraints, add_generator_constraints, add_storage_constraints,
};

/// The default solver backend
pub const DEFAULT_SOLVER: &str = "highs";

/// A decision variable in the optimisation.
///
/// Note that this type does **not** include the value of the variable; it refers to a particular
/// column of the problem and records its position so the value can be read from the solution.
#[derive(Clone, Copy, Debug)]
pub struct Variable {
    col: highs::Col,
    index: usize,
}

/// Information about a column of the problem, kept for reporting
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    /// Descriptive name, e.g. `dispatch[solar,3]`
    pub name: String,
    /// Coefficient in the objective
    pub cost: f64,
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
}

/// A [`RowProblem`] which keeps track of the columns and rows added to it
#[derive(Default)]
pub struct Problem {
    problem: RowProblem,
    columns: Vec<ColumnInfo>,
    num_rows: usize,
}

impl Problem {
    /// Add a column with the given objective coefficient and bounds
    fn add_column(&mut self, name: String, cost: f64, lower: f64, upper: f64) -> Variable {
        let col = self.problem.add_column(cost, lower..=upper);
        let index = self.columns.len();
        self.columns.push(ColumnInfo {
            name,
            cost,
            lower,
            upper,
        });

        Variable { col, index }
    }

    /// Add a row, returning its index
    fn add_row<I>(&mut self, lower: f64, upper: f64, terms: I) -> usize
    where
        I: IntoIterator<Item = (Variable, f64)>,
    {
        self.problem.add_row(
            lower..=upper,
            terms.into_iter().map(|(var, coeff)| (var.col, coeff)),
        );
        self.num_rows += 1;
        self.num_rows - 1
    }
}

/// The variables for a generator
struct GeneratorVariables {
    capacity: Option<Variable>,
    dispatch: Vec<Variable>,
}

/// The variables for a storage unit
struct StorageVariables {
    capacity: Option<Variable>,
    dispatch: Vec<Variable>,
    store: Vec<Variable>,
    state_of_charge: Vec<Variable>,
}

/// A map for easy lookup of variables in the problem.
///
/// The entries are in the same order as the components of the network.
#[derive(Default)]
struct VariableMap {
    generators: IndexMap<ComponentID, GeneratorVariables>,
    storage_units: IndexMap<ComponentID, StorageVariables>,
}

/// The solver backends which can be requested by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum SolverBackend {
    /// HiGHS, letting it choose the algorithm
    #[strum(serialize = "highs")]
    Highs,
    /// HiGHS dual simplex
    #[strum(serialize = "highs-simplex")]
    HighsSimplex,
    /// HiGHS interior point
    #[strum(serialize = "highs-ipm")]
    HighsIpm,
}

impl SolverBackend {
    /// The value of the HiGHS `solver` option for this backend
    fn algorithm(self) -> &'static str {
        match self {
            Self::Highs => "choose",
            Self::HighsSimplex => "simplex",
            Self::HighsIpm => "ipm",
        }
    }
}

/// Options for running the solver
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    /// The name of the backend to use (see [`SolverBackend`])
    pub solver_name: String,
    /// Time limit for the solver in seconds
    pub time_limit: Option<f64>,
    /// Maximum number of simplex or interior point iterations
    pub iteration_limit: Option<u32>,
    /// Whether HiGHS may simplify the problem before solving it
    pub presolve: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            solver_name: DEFAULT_SOLVER.into(),
            time_limit: None,
            iteration_limit: None,
            presolve: true,
        }
    }
}

/// The reason the optimisation did not produce a solution
#[derive(Debug, Clone, PartialEq)]
pub enum SolveFailure {
    /// No backend with this name is available
    UnknownBackend(String),
    /// The solver reported an error while running
    SolverError(String),
    /// The solver finished without finding a usable solution (e.g. the problem is infeasible)
    NotOptimal(String),
}

impl fmt::Display for SolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownBackend(name) => write!(f, "Unknown solver backend: {name}"),
            Self::SolverError(status) => write!(f, "Solver error: {status}"),
            Self::NotOptimal(status) => write!(f, "Could not solve: {status}"),
        }
    }
}

impl std::error::Error for SolveFailure {}

/// The overall status of an optimisation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SolveStatus {
    /// An optimal solution was found
    Ok,
    /// A solution was found, but it may not be optimal
    Warning,
    /// No solution was found
    Failure,
}

/// The result of an optimisation
#[derive(Debug)]
pub enum SolveOutcome<'a> {
    /// An optimal solution was found
    Ok(Solution<'a>),
    /// The solver stopped early (e.g. at its time limit) but a solution is available
    Warning {
        /// The best solution found
        solution: Solution<'a>,
        /// Why the solution may not be optimal
        reason: String,
    },
    /// No solution is available
    Failure(SolveFailure),
}

impl<'a> SolveOutcome<'a> {
    /// The overall status
    pub fn status(&self) -> SolveStatus {
        match self {
            Self::Ok(_) => SolveStatus::Ok,
            Self::Warning { .. } => SolveStatus::Warning,
            Self::Failure(_) => SolveStatus::Failure,
        }
    }

    /// The solution, if the status is ok or warning
    pub fn solution(&self) -> Option<&Solution<'a>> {
        match self {
            Self::Ok(solution) | Self::Warning { solution, .. } => Some(solution),
            Self::Failure(_) => None,
        }
    }
}

/// The solution to the optimisation problem
#[derive(Debug)]
pub struct Solution<'a> {
    network: &'a Network,
    objective: Money,
    capacities: IndexMap<ComponentID, Power>,
    generator_dispatch: IndexMap<ComponentID, Vec<Power>>,
    storage_dispatch: IndexMap<ComponentID, Vec<Power>>,
    storage_state_of_charge: IndexMap<ComponentID, Vec<Energy>>,
    marginal_prices: IndexMap<BusID, Vec<MoneyPerEnergy>>,
    columns: Vec<(ColumnInfo, f64)>,
}

impl<'a> Solution<'a> {
    /// The network which was optimised
    pub fn network(&self) -> &'a Network {
        self.network
    }

    /// The value of the objective function
    pub fn objective(&self) -> Money {
        self.objective
    }

    /// The optimal capacity of the given generator or storage unit
    pub fn capacity(&self, id: &str) -> Option<Power> {
        self.capacities.get(id).copied()
    }

    /// Iterate over the optimal capacities of all generators and storage units.
    ///
    /// For components whose capacity is fixed, this is their fixed capacity.
    pub fn iter_capacities(&self) -> impl Iterator<Item = (&ComponentID, Power)> {
        self.capacities.iter().map(|(id, p)| (id, *p))
    }

    /// The dispatch of the given generator in each snapshot
    pub fn generator_dispatch(&self, id: &str) -> Option<&[Power]> {
        self.generator_dispatch.get(id).map(Vec::as_slice)
    }

    /// Iterate over the dispatch of every generator
    pub fn iter_generator_dispatch(&self) -> impl Iterator<Item = (&ComponentID, &[Power])> {
        self.generator_dispatch
            .iter()
            .map(|(id, p)| (id, p.as_slice()))
    }

    /// Iterate over the net dispatch (discharge minus charge) of every storage unit
    pub fn iter_storage_dispatch(&self) -> impl Iterator<Item = (&ComponentID, &[Power])> {
        self.storage_dispatch.iter().map(|(id, p)| (id, p.as_slice()))
    }

    /// Iterate over the state of charge of every storage unit at the end of each snapshot
    pub fn iter_state_of_charge(&self) -> impl Iterator<Item = (&ComponentID, &[Energy])> {
        self.storage_state_of_charge
            .iter()
            .map(|(id, soc)| (id, soc.as_slice()))
    }

    /// Iterate over the marginal price of energy at every bus in each snapshot.
    ///
    /// These are the dual values of the energy balance constraints.
    pub fn iter_marginal_prices(&self) -> impl Iterator<Item = (&BusID, &[MoneyPerEnergy])> {
        self.marginal_prices.iter().map(|(id, p)| (id, p.as_slice()))
    }

    /// The total energy supplied by unserved energy generators over the horizon
    pub fn unserved_energy(&self) -> Energy {
        let snapshots = &self.network.snapshots;
        self.network
            .generators
            .values()
            .filter(|generator| generator.is_unserved_energy)
            .flat_map(|generator| {
                self.generator_dispatch[&generator.id]
                    .iter()
                    .enumerate()
                    .map(|(t, p)| *p * snapshots.weighting(t))
            })
            .sum()
    }

    /// Iterate over every column of the problem with its value
    pub fn iter_columns(&self) -> impl Iterator<Item = (&ColumnInfo, f64)> {
        self.columns.iter().map(|(info, value)| (info, *value))
    }
}

/// Perform the optimisation.
///
/// Any problem with the solver is reported as a [`SolveOutcome::Failure`] rather than an error,
/// so that callers can report it and carry on.
///
/// # Arguments
///
/// * `network` - The network to optimise
/// * `options` - Which backend to use and how to run it
pub fn perform_optimisation<'a>(network: &'a Network, options: &SolverOptions) -> SolveOutcome<'a> {
    let backend: SolverBackend = match options.solver_name.parse() {
        Ok(backend) => backend,
        Err(_) => {
            return SolveOutcome::Failure(SolveFailure::UnknownBackend(
                options.solver_name.clone(),
            ));
        }
    };

    // Set up problem
    let mut problem = Problem::default();
    let variables = add_variables(&mut problem, network);

    // Add constraints
    let balance_keys = add_balance_constraints(&mut problem, &variables, network);
    add_generator_constraints(&mut problem, &variables, network);
    add_storage_constraints(&mut problem, &variables, network);
    debug!(
        "Optimisation problem has {} columns and {} rows",
        problem.columns.len(),
        problem.num_rows
    );

    let Problem {
        problem, columns, ..
    } = problem;
    let mut model = problem.optimise(Sense::Minimise);
    configure_highs(&mut model, backend, options);

    info!("Solving with {backend}");
    let solved = match model.try_solve() {
        Ok(solved) => solved,
        Err(status) => {
            return SolveOutcome::Failure(SolveFailure::SolverError(format!("{status:?}")));
        }
    };

    let status = solved.status();
    let reason = match status {
        HighsModelStatus::Optimal => None,
        HighsModelStatus::ReachedTimeLimit | HighsModelStatus::ReachedIterationLimit => {
            Some(format!("{status:?}"))
        }
        status => {
            return SolveOutcome::Failure(SolveFailure::NotOptimal(format!("{status:?}")));
        }
    };

    let highs_solution = solved.get_solution();
    let solution = extract_solution(
        network,
        &variables,
        &balance_keys,
        columns,
        highs_solution.columns(),
        highs_solution.dual_rows(),
    );
    match reason {
        None => SolveOutcome::Ok(solution),
        Some(reason) => SolveOutcome::Warning { solution, reason },
    }
}

/// Set HiGHS options for the chosen backend
fn configure_highs(model: &mut highs::Model, backend: SolverBackend, options: &SolverOptions) {
    model.set_option("solver", backend.algorithm());
    if !options.presolve {
        model.set_option("presolve", "off");
    }
    if let Some(time_limit) = options.time_limit {
        model.set_option("time_limit", time_limit);
    }
    if let Some(limit) = options.iteration_limit {
        let limit = i32::try_from(limit).unwrap_or(i32::MAX);
        model.set_option("simplex_iteration_limit", limit);
        model.set_option("ipm_iteration_limit", limit);
    }

    enable_highs_logging(model);
}

/// Enable logging for the HiGHS solver.
///
/// HiGHS writes to stdout directly, so its output does not appear in the log files.
fn enable_highs_logging(model: &mut highs::Model) {
    // Skip this step if logging is disabled (e.g. when running tests)
    if let Ok(log_level) = std::env::var(LOG_LEVEL_ENV_VAR) {
        if log_level.eq_ignore_ascii_case("off") {
            model.set_option("output_flag", false);
            return;
        }
    }

    model.set_option("log_to_console", true);
    model.set_option("output_flag", true);
}

/// Add variables to the optimisation problem.
///
/// # Returns
///
/// A [`VariableMap`] with the problem's variables as values.
fn add_variables(problem: &mut Problem, network: &Network) -> VariableMap {
    let mut variables = VariableMap::default();
    let snapshots = &network.snapshots;

    for generator in network.generators.values() {
        let (capacity, dispatch_max) = add_capacity_variable(
            problem,
            &generator.id,
            generator.capital_cost.value(),
            generator.capacity,
        );

        let dispatch = snapshots
            .iter_with_weightings()
            .enumerate()
            .map(|(t, (_, weighting))| {
                let cost = generator.marginal_cost.value() * weighting.value();
                // With fixed capacity, availability limits are simply bounds on dispatch
                let (lower, upper) = match dispatch_max {
                    Some(p_nom) => (
                        generator.p_min_pu * p_nom,
                        generator.p_max_pu.get(t) * p_nom,
                    ),
                    None => (0.0, f64::INFINITY),
                };
                problem.add_column(format!("dispatch[{},{t}]", generator.id), cost, lower, upper)
            })
            .collect();

        variables.generators.insert(
            generator.id.clone(),
            GeneratorVariables { capacity, dispatch },
        );
    }

    for storage in network.storage_units.values() {
        let (capacity, p_nom) = add_capacity_variable(
            problem,
            &storage.id,
            storage.capital_cost.value(),
            storage.capacity,
        );
        let power_max = p_nom.unwrap_or(f64::INFINITY);
        let energy_max = p_nom.map_or(f64::INFINITY, |p_nom| p_nom * storage.max_hours.value());

        let mut dispatch = Vec::with_capacity(snapshots.len());
        let mut store = Vec::with_capacity(snapshots.len());
        let mut state_of_charge = Vec::with_capacity(snapshots.len());
        for (t, (_, weighting)) in snapshots.iter_with_weightings().enumerate() {
            let cost = storage.marginal_cost.value() * weighting.value();
            dispatch.push(problem.add_column(
                format!("dispatch[{},{t}]", storage.id),
                cost,
                0.0,
                power_max,
            ));
            store.push(problem.add_column(
                format!("store[{},{t}]", storage.id),
                0.0,
                0.0,
                power_max,
            ));
            state_of_charge.push(problem.add_column(
                format!("state_of_charge[{},{t}]", storage.id),
                0.0,
                0.0,
                energy_max,
            ));
        }

        variables.storage_units.insert(
            storage.id.clone(),
            StorageVariables {
                capacity,
                dispatch,
                store,
                state_of_charge,
            },
        );
    }

    variables
}

/// Add a capacity variable if capacity is extendable.
///
/// # Returns
///
/// The capacity variable for extendable components, or the fixed capacity in MW otherwise.
fn add_capacity_variable(
    problem: &mut Problem,
    id: &ComponentID,
    capital_cost: f64,
    mode: CapacityMode,
) -> (Option<Variable>, Option<f64>) {
    match mode {
        CapacityMode::Fixed(p_nom) => (None, Some(p_nom.value())),
        CapacityMode::Extendable { min, max } => {
            let var = problem.add_column(
                format!("capacity[{id}]"),
                capital_cost,
                min.value(),
                max.value(),
            );
            (Some(var), None)
        }
    }
}

/// Read the values of variables out of the solver's solution
fn extract_solution<'a>(
    network: &'a Network,
    variables: &VariableMap,
    balance_keys: &BalanceKeys,
    columns: Vec<ColumnInfo>,
    values: &[f64],
    row_duals: &[f64],
) -> Solution<'a> {
    let value = |var: &Variable| values[var.index];
    let capacity_value = |var: Option<&Variable>, mode: CapacityMode| match (var, mode) {
        (Some(var), _) => Power(value(var)),
        (None, CapacityMode::Fixed(p_nom)) => p_nom,
        (None, CapacityMode::Extendable { .. }) => unreachable!("Missing capacity variable"),
    };

    let mut capacities = IndexMap::new();
    let mut generator_dispatch = IndexMap::new();
    for (id, vars) in &variables.generators {
        let generator = &network.generators[id];
        let dispatch: Vec<_> = vars.dispatch.iter().map(|var| Power(value(var))).collect();

        // Unserved energy capacity is free, so only its peak dispatch is meaningful
        let capacity = if generator.is_unserved_energy {
            Power(dispatch.iter().map(|p| p.value()).fold(0.0, f64::max))
        } else {
            capacity_value(vars.capacity.as_ref(), generator.capacity)
        };
        capacities.insert(id.clone(), capacity);
        generator_dispatch.insert(id.clone(), dispatch);
    }

    let mut storage_dispatch = IndexMap::new();
    let mut storage_state_of_charge = IndexMap::new();
    for (id, vars) in &variables.storage_units {
        let storage = &network.storage_units[id];
        capacities.insert(
            id.clone(),
            capacity_value(vars.capacity.as_ref(), storage.capacity),
        );
        storage_dispatch.insert(
            id.clone(),
            vars.dispatch
                .iter()
                .zip(&vars.store)
                .map(|(dispatch, store)| Power(value(dispatch) - value(store)))
                .collect(),
        );
        storage_state_of_charge.insert(
            id.clone(),
            vars.state_of_charge
                .iter()
                .map(|var| Energy(value(var)))
                .collect(),
        );
    }

    let mut marginal_prices: IndexMap<BusID, Vec<MoneyPerEnergy>> = IndexMap::new();
    for ((bus_id, t), dual) in balance_keys.zip_duals(row_duals) {
        let prices = marginal_prices
            .entry(bus_id.clone())
            .or_insert_with(|| vec![MoneyPerEnergy(0.0); network.snapshots.len()]);

        // The dual is the cost of one more MW for the snapshot, so divide by its length in hours
        // to get a price per MWh
        prices[*t] = MoneyPerEnergy(dual / network.snapshots.weighting(*t).value());
    }

    let objective = Money(
        columns
            .iter()
            .zip(values)
            .map(|(info, value)| info.cost * value)
            .sum(),
    );
    let columns = columns.into_iter().zip(values.iter().copied()).collect();

    Solution {
        network,
        objective,
        capacities,
        generator_dispatch,
        storage_dispatch,
        storage_state_of_charge,
        marginal_prices,
        columns,
    }
}
