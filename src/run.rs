//! Functionality for running a model: solve, report and write results.
use crate::model::Model;
use crate::optimisation::perform_optimisation;
use crate::output::DataWriter;
use crate::output::metadata::write_metadata;
use crate::report::Dashboard;
use anyhow::{Context, Result};
use log::info;
use std::path::Path;

/// Run the optimisation for a model and write the results to `output_path`.
///
/// A failed optimisation is not an error: it is recorded in the returned [`Dashboard`] and in the
/// metadata file, and no other output files are written.
///
/// # Arguments
///
/// * `model` - The model to run
/// * `solver_override` - Solver backend to use instead of the one in the model file
/// * `output_path` - Folder where results will be saved
/// * `debug_model` - Whether to write every variable of the optimisation to file
pub fn run(
    model: &Model,
    solver_override: Option<&str>,
    output_path: &Path,
    debug_model: bool,
) -> Result<Dashboard> {
    let options = model.parameters.solver_options(solver_override);
    info!(
        "Optimising {} snapshots with solver backend {}",
        model.network.snapshots.len(),
        options.solver_name
    );
    let outcome = perform_optimisation(&model.network, &options);

    let mut dashboard = Dashboard::new(&format!("Results for {}", model.model_path.display()));
    dashboard.add_profile_warnings(model.iter_fallback_profiles());
    dashboard.add_outcome(&outcome, model.parameters.report_window);

    if let Some(solution) = outcome.solution() {
        let mut writer = DataWriter::create(output_path, debug_model)
            .context("Failed to create output files")?;
        writer.write_solution(solution)?;
        if let Some(chart) = &dashboard.chart {
            writer.write_chart_window(chart)?;
        }
        writer.flush()?;
    }

    write_metadata(
        output_path,
        &model.model_path,
        &options.solver_name,
        &outcome,
    )
    .context("Failed to save metadata")?;

    Ok(dashboard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::network;
    use crate::log::LOG_LEVEL_ENV_VAR;
    use crate::model::ModelParameters;
    use crate::network::Network;
    use crate::report::StatusLevel;
    use indexmap::IndexMap;
    use rstest::rstest;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn model_from_network(network: Network, solver_params: &str) -> Model {
        let parameters: ModelParameters = toml::from_str(&format!(
            r#"
            {solver_params}
            [snapshots]
            start = "2024-01-01"
            count = 1
            "#
        ))
        .unwrap();

        Model {
            model_path: PathBuf::from("model"),
            parameters,
            network,
            profiles: IndexMap::new(),
        }
    }

    #[rstest]
    fn test_run_writes_results(network: Network) {
        unsafe { std::env::set_var(LOG_LEVEL_ENV_VAR, "off") };
        let model = model_from_network(network, "");
        let dir = tempdir().unwrap();

        let dashboard = run(&model, None, dir.path(), true).unwrap();
        assert!(!dashboard.has_errors());
        for file_name in [
            "capacities.csv",
            "dispatch.csv",
            "state_of_charge.csv",
            "marginal_prices.csv",
            "chart_window.csv",
            "debug_variables.csv",
            "metadata.toml",
        ] {
            assert!(dir.path().join(file_name).is_file(), "{file_name} missing");
        }
    }

    #[rstest]
    fn test_run_unknown_solver(network: Network) {
        unsafe { std::env::set_var(LOG_LEVEL_ENV_VAR, "off") };
        let model = model_from_network(network, "");
        let dir = tempdir().unwrap();

        let dashboard = run(&model, Some("cbc"), dir.path(), false).unwrap();
        assert!(dashboard.has_errors());
        assert!(dashboard.metrics.is_empty());
        assert!(dir.path().join("metadata.toml").is_file());
        assert!(!dir.path().join("capacities.csv").exists());
    }

    #[rstest]
    fn test_run_stopped_early(network: Network) {
        unsafe { std::env::set_var(LOG_LEVEL_ENV_VAR, "off") };
        let model = model_from_network(
            network,
            "solver = \"highs-simplex\"\niteration_limit = 0\npresolve = false",
        );
        let dir = tempdir().unwrap();

        let dashboard = run(&model, None, dir.path(), false).unwrap();
        assert!(!dashboard.has_errors());
        assert_eq!(dashboard.messages[0].level, StatusLevel::Warning);

        // Results are written even though they may not be optimal
        assert!(dir.path().join("capacities.csv").is_file());
        let metadata = std::fs::read_to_string(dir.path().join("metadata.toml")).unwrap();
        assert!(metadata.contains("status = \"warning\""));
        assert!(metadata.contains("message = \"ReachedIterationLimit\""));
    }
}
