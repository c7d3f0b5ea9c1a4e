//! Reporting the results of an optimisation on the terminal.
//!
//! A [`Dashboard`] collects status messages, scalar metrics and a short window of the dispatch
//! time series. Messages are emitted through the logger and metrics are rendered as tables.
use crate::network::ComponentID;
use crate::optimisation::{SolveOutcome, Solution};
use crate::profile::{Profile, ProfileID};
use crate::units::Power;
use chrono::NaiveDateTime;
use comfy_table::{Cell, CellAlignment, Color, Table, modifiers, presets};
use indexmap::IndexMap;
use log::{error, info, warn};
use std::fmt::{self, Display, Formatter};

/// Unserved energy below this amount (in MWh) is treated as solver noise
const UNSERVED_ENERGY_TOLERANCE: f64 = 1e-6;

/// The severity of a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum StatusLevel {
    /// General information
    Info,
    /// Something completed successfully
    Success,
    /// Results may be unreliable
    Warning,
    /// Something failed
    Error,
}

/// A message for the user about the run
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    /// Severity
    pub level: StatusLevel,
    /// The message itself
    pub text: String,
}

/// A named scalar result
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// What is measured
    pub name: String,
    /// The value
    pub value: f64,
    /// Unit of the value
    pub unit: &'static str,
}

/// The first few snapshots of the dispatch time series
#[derive(Debug, Clone, PartialEq)]
pub struct ChartWindow {
    /// Timestamps of the snapshots shown
    pub timestamps: Vec<NaiveDateTime>,
    /// Total demand in each snapshot
    pub load: Vec<Power>,
    /// Dispatch of each generator and net dispatch of each storage unit
    pub series: IndexMap<ComponentID, Vec<Power>>,
}

impl ChartWindow {
    /// Take the first `window` snapshots of the solution
    pub fn from_solution(solution: &Solution, window: usize) -> Self {
        let network = solution.network();
        let len = window.min(network.snapshots.len());
        let timestamps = network.snapshots.timestamps()[..len].to_vec();
        let load = (0..len).map(|t| network.total_demand(t)).collect();
        let series = solution
            .iter_generator_dispatch()
            .chain(solution.iter_storage_dispatch())
            .map(|(id, dispatch)| (id.clone(), dispatch[..len].to_vec()))
            .collect();

        Self {
            timestamps,
            load,
            series,
        }
    }

    /// Number of snapshots in the window
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the window is empty
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Everything shown to the user about a run
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    /// Title for the run
    pub title: String,
    /// Status messages in the order they were raised
    pub messages: Vec<StatusMessage>,
    /// Scalar results. Empty if the optimisation failed.
    pub metrics: Vec<Metric>,
    /// A window onto the dispatch. `None` if the optimisation failed.
    pub chart: Option<ChartWindow>,
}

impl Dashboard {
    /// Create an empty dashboard
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            messages: Vec::new(),
            metrics: Vec::new(),
            chart: None,
        }
    }

    /// Add a status message
    pub fn add_message(&mut self, level: StatusLevel, text: impl Into<String>) {
        self.messages.push(StatusMessage {
            level,
            text: text.into(),
        });
    }

    /// Add a warning for every profile which had to fall back on substitute data
    pub fn add_profile_warnings<'a, I>(&mut self, profiles: I)
    where
        I: IntoIterator<Item = (&'a ProfileID, &'a Profile)>,
    {
        for (id, profile) in profiles {
            if profile.source.is_fallback() {
                self.add_message(
                    StatusLevel::Warning,
                    format!("Profile {id} uses {}", profile.source),
                );
            }
        }
    }

    /// Add the results of an optimisation.
    ///
    /// If the optimisation failed, only an error message is added.
    ///
    /// # Arguments
    ///
    /// * `outcome` - The result of the optimisation
    /// * `report_window` - The maximum number of snapshots to include in the chart window
    pub fn add_outcome(&mut self, outcome: &SolveOutcome, report_window: usize) {
        let solution = match outcome {
            SolveOutcome::Ok(solution) => {
                self.add_message(StatusLevel::Success, "Optimisation completed successfully");
                solution
            }
            SolveOutcome::Warning { solution, reason } => {
                self.add_message(
                    StatusLevel::Warning,
                    format!("Solver stopped early ({reason}); results may not be optimal"),
                );
                solution
            }
            SolveOutcome::Failure(failure) => {
                self.add_message(StatusLevel::Error, format!("Optimisation failed: {failure}"));
                return;
            }
        };

        let unserved_energy = solution.unserved_energy();
        if unserved_energy.value() > UNSERVED_ENERGY_TOLERANCE {
            self.add_message(
                StatusLevel::Warning,
                format!("{:.3} MWh of demand could not be met", unserved_energy.value()),
            );
        }

        let network = solution.network();
        for (id, capacity) in solution.iter_capacities() {
            let extendable = network
                .generators
                .get(id)
                .map(|generator| generator.capacity)
                .or_else(|| network.storage_units.get(id).map(|unit| unit.capacity))
                .is_some_and(|mode| mode.is_extendable());
            if extendable {
                self.metrics.push(Metric {
                    name: format!("Capacity: {id}"),
                    value: capacity.value(),
                    unit: "MW",
                });
            }
        }
        self.metrics.push(Metric {
            name: "Total system cost".into(),
            value: solution.objective().value(),
            unit: "currency",
        });
        self.metrics.push(Metric {
            name: "Unserved energy".into(),
            value: unserved_energy.value(),
            unit: "MWh",
        });

        self.chart = Some(ChartWindow::from_solution(solution, report_window));
    }

    /// Whether an error has been reported
    pub fn has_errors(&self) -> bool {
        self.messages
            .iter()
            .any(|message| message.level == StatusLevel::Error)
    }

    /// Write the status messages to the log
    pub fn emit_messages(&self) {
        for message in &self.messages {
            match message.level {
                StatusLevel::Info | StatusLevel::Success => info!("{}", message.text),
                StatusLevel::Warning => warn!("{}", message.text),
                StatusLevel::Error => error!("{}", message.text),
            }
        }
    }

    /// A table of the metrics, if there are any
    pub fn metrics_table(&self) -> Option<Table> {
        if self.metrics.is_empty() {
            return None;
        }

        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
            .set_header(vec!["Metric", "Value", "Unit"]);
        for metric in &self.metrics {
            table.add_row(vec![
                Cell::new(&metric.name),
                Cell::new(format!("{:.3}", metric.value)).set_alignment(CellAlignment::Right),
                Cell::new(metric.unit),
            ]);
        }

        Some(table)
    }

    /// A table of the chart window, if there is one
    pub fn chart_table(&self) -> Option<Table> {
        let chart = self.chart.as_ref()?;

        let mut header = vec![Cell::new("Snapshot"), Cell::new("Load").fg(Color::Red)];
        header.extend(chart.series.keys().map(Cell::new));

        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
            .set_header(header);
        for (t, timestamp) in chart.timestamps.iter().enumerate() {
            let mut row = vec![
                Cell::new(timestamp.format("%Y-%m-%d %H:%M")),
                Cell::new(format!("{:.2}", chart.load[t].value()))
                    .set_alignment(CellAlignment::Right),
            ];
            row.extend(chart.series.values().map(|dispatch| {
                Cell::new(format!("{:.2}", dispatch[t].value())).set_alignment(CellAlignment::Right)
            }));
            table.add_row(row);
        }

        Some(table)
    }
}

impl Display for Dashboard {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        if let Some(table) = self.metrics_table() {
            writeln!(f, "{table}")?;
        }
        if let Some(table) = self.chart_table() {
            writeln!(f, "{table}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{hourly_day, network};
    use crate::log::LOG_LEVEL_ENV_VAR;
    use crate::network::{
        Bus, CapacitySpec, Generator, GeneratorSpec, Load, Network, NetworkBuilder,
    };
    use crate::optimisation::{SolverOptions, perform_optimisation};
    use crate::profile::ProfileSource;
    use crate::snapshot::SnapshotSet;
    use crate::units::MoneyPerPower;
    use rstest::rstest;

    fn options(solver_name: &str) -> SolverOptions {
        unsafe { std::env::set_var(LOG_LEVEL_ENV_VAR, "off") };
        SolverOptions {
            solver_name: solver_name.into(),
            ..Default::default()
        }
    }

    #[rstest]
    fn test_dashboard_success(network: Network) {
        let outcome = perform_optimisation(&network, &options("highs"));
        let mut dashboard = Dashboard::new("Test");
        dashboard.add_outcome(&outcome, 168);

        assert_eq!(dashboard.messages[0].level, StatusLevel::Success);
        assert!(!dashboard.has_errors());

        let names: Vec<_> = dashboard.metrics.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "Capacity: test generator",
                "Capacity: south unserved energy",
                "Total system cost",
                "Unserved energy"
            ]
        );

        // The window is truncated to the length of the horizon
        let chart = dashboard.chart.as_ref().unwrap();
        assert_eq!(chart.len(), 1);
        assert_eq!(chart.load, [Power(100.0)]);
        assert_eq!(chart.series.len(), 2);

        let rendered = dashboard.to_string();
        assert!(rendered.contains("Capacity: test generator"));
        assert!(rendered.contains("100.000"));
    }

    #[rstest]
    fn test_dashboard_failure(network: Network) {
        let outcome = perform_optimisation(&network, &options("not-a-solver"));
        let mut dashboard = Dashboard::new("Test");
        dashboard.add_outcome(&outcome, 168);

        assert!(dashboard.has_errors());
        assert_eq!(
            dashboard.messages,
            [StatusMessage {
                level: StatusLevel::Error,
                text: "Optimisation failed: Unknown solver backend: not-a-solver".into()
            }]
        );
        assert!(dashboard.metrics.is_empty());
        assert!(dashboard.chart.is_none());
        assert!(dashboard.metrics_table().is_none());
        assert!(!dashboard.to_string().contains("Capacity"));
    }

    #[test]
    fn test_add_profile_warnings() {
        let profiles: IndexMap<ProfileID, Profile> = [
            (
                "file".into(),
                Profile::new(vec![0.5], ProfileSource::File("solar.csv".into())),
            ),
            ("zero".into(), Profile::zero(1)),
        ]
        .into_iter()
        .collect();

        let mut dashboard = Dashboard::new("Test");
        dashboard.add_profile_warnings(&profiles);
        assert_eq!(
            dashboard.messages,
            [StatusMessage {
                level: StatusLevel::Warning,
                text: "Profile zero uses all-zero fallback".into()
            }]
        );
    }

    /// One extendable generator meeting 5 MW of demand every hour for a day
    fn day_network(hourly_day: SnapshotSet) -> Network {
        let spec = GeneratorSpec {
            capacity: CapacitySpec::extendable(MoneyPerPower(1.0)),
            ..Default::default()
        };
        NetworkBuilder::new(hourly_day)
            .add_bus(Bus::new("bus".into()))
            .add_load(Load::constant("load".into(), "bus".into(), Power(5.0), 24).unwrap())
            .add_generator(Generator::new("gen".into(), "bus".into(), spec).unwrap())
            .build()
            .unwrap()
    }

    #[rstest]
    fn test_dashboard_stopped_early(hourly_day: SnapshotSet) {
        let network = day_network(hourly_day);
        let options = SolverOptions {
            iteration_limit: Some(0),
            presolve: false,
            ..options("highs-simplex")
        };
        let outcome = perform_optimisation(&network, &options);
        let mut dashboard = Dashboard::new("Test");
        dashboard.add_outcome(&outcome, 6);

        assert!(!dashboard.has_errors());
        assert_eq!(
            dashboard.messages[0],
            StatusMessage {
                level: StatusLevel::Warning,
                text: "Solver stopped early (ReachedIterationLimit); results may not be optimal"
                    .into()
            }
        );

        // A solution is still available, so it is reported
        assert!(
            dashboard
                .metrics
                .iter()
                .any(|metric| metric.name == "Capacity: gen")
        );
        assert_eq!(dashboard.chart.as_ref().unwrap().len(), 6);
    }

    #[rstest]
    fn test_chart_window_truncated(hourly_day: SnapshotSet) {
        let network = day_network(hourly_day);
        let outcome = perform_optimisation(&network, &options("highs"));
        let chart = ChartWindow::from_solution(outcome.solution().unwrap(), 6);
        assert_eq!(chart.len(), 6);
        assert_eq!(chart.series["gen"].len(), 6);
    }
}
