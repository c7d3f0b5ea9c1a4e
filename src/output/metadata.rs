//! Code for writing metadata to file
use crate::optimisation::{SolveOutcome, SolveStatus};
use anyhow::{Result, anyhow};
use chrono::prelude::*;
use platform_info::{PlatformInfo, PlatformInfoAPI, UNameAPI};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// The output file name for metadata
const METADATA_FILE_NAME: &str = "metadata.toml";

/// Information about the program build via `built` crate
mod built_info {
    // The file has been placed there by the build script.
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Get information about program version from git
fn get_git_hash() -> String {
    let Some(hash) = built_info::GIT_COMMIT_HASH_SHORT else {
        return "unknown".into();
    };

    if built_info::GIT_DIRTY == Some(true) {
        format!("{hash}-dirty")
    } else {
        hash.into()
    }
}

#[derive(Serialize)]
struct Metadata<'a> {
    run: RunMetadata<'a>,
    result: ResultMetadata,
    program: ProgramMetadata<'a>,
    platform: PlatformMetadata,
}

/// Information about the model run
#[derive(Serialize)]
struct RunMetadata<'a> {
    /// Path to the model which was run
    model_path: &'a Path,
    /// The date and time on which the run started
    datetime: String,
    /// The solver backend requested
    solver: &'a str,
}

impl<'a> RunMetadata<'a> {
    fn new(model_path: &'a Path, solver: &'a str) -> Self {
        let dt = Local::now();
        Self {
            model_path,
            datetime: dt.to_rfc2822(),
            solver,
        }
    }
}

/// The outcome of the optimisation
#[derive(Serialize)]
struct ResultMetadata {
    /// One of "ok", "warning" or "failure"
    status: String,
    /// Why the solution is missing or may not be optimal
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    /// The value of the objective function, if there is a solution
    #[serde(skip_serializing_if = "Option::is_none")]
    objective: Option<f64>,
}

impl ResultMetadata {
    fn new(outcome: &SolveOutcome) -> Self {
        let message = match outcome {
            SolveOutcome::Ok(_) => None,
            SolveOutcome::Warning { reason, .. } => Some(reason.clone()),
            SolveOutcome::Failure(failure) => Some(failure.to_string()),
        };
        let status: SolveStatus = outcome.status();

        Self {
            status: status.to_string(),
            message,
            objective: outcome
                .solution()
                .map(|solution| solution.objective().value()),
        }
    }
}

#[derive(Serialize)]
struct ProgramMetadata<'a> {
    /// The program name
    name: &'a str,
    /// The program version as specified in Cargo.toml
    version: &'a str,
    /// The target architecture for the build (e.g. x86_64-unknown-linux-gnu)
    target: &'a str,
    /// Whether it is a debug build
    is_debug: bool,
    /// The version of rustc used to compile the program
    rustc_version: &'a str,
    /// When the program was built
    build_time_utc: &'a str,
    /// The git commit hash for the version of the program (if known)
    git_commit_hash: String,
}

impl Default for ProgramMetadata<'_> {
    fn default() -> Self {
        Self {
            name: built_info::PKG_NAME,
            version: built_info::PKG_VERSION,
            target: built_info::TARGET,
            is_debug: built_info::DEBUG,
            rustc_version: built_info::RUSTC_VERSION,
            build_time_utc: built_info::BUILT_TIME_UTC,
            git_commit_hash: get_git_hash(),
        }
    }
}

/// Information about the platform on which the program is running.
///
/// The fields correspond to different data available from the [`PlatformInfo`] struct.
#[derive(Serialize)]
struct PlatformMetadata {
    sysname: String,
    nodename: String,
    release: String,
    version: String,
    machine: String,
    osname: String,
}

impl PlatformMetadata {
    fn new() -> Result<Self> {
        let info =
            PlatformInfo::new().map_err(|err| anyhow!("Unable to determine platform info: {err}"))?;
        Ok(Self {
            sysname: info.sysname().to_string_lossy().into(),
            nodename: info.nodename().to_string_lossy().into(),
            release: info.release().to_string_lossy().into(),
            version: info.version().to_string_lossy().into(),
            machine: info.machine().to_string_lossy().into(),
            osname: info.osname().to_string_lossy().into(),
        })
    }
}

/// Write metadata to the specified output path in TOML format
///
/// # Arguments
///
/// * `output_path` - Folder where the file will be saved
/// * `model_path` - Path to the model which was run
/// * `solver` - Name of the solver backend requested
/// * `outcome` - The result of the optimisation
pub fn write_metadata(
    output_path: &Path,
    model_path: &Path,
    solver: &str,
    outcome: &SolveOutcome,
) -> Result<()> {
    let metadata = Metadata {
        run: RunMetadata::new(model_path, solver),
        result: ResultMetadata::new(outcome),
        program: ProgramMetadata::default(),
        platform: PlatformMetadata::new()?,
    };
    let file_path = output_path.join(METADATA_FILE_NAME);
    fs::write(&file_path, toml::to_string(&metadata)?)?;

    Ok(())
}
