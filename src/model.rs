//! The model: everything read from a model directory.
use crate::network::Network;
use crate::profile::{Profile, ProfileID};
use indexmap::IndexMap;
use std::path::PathBuf;

pub mod parameters;
pub use parameters::{MODEL_PARAMETERS_FILE_NAME, ModelParameters};

/// Model definition
#[derive(Debug)]
pub struct Model {
    /// Path to model folder
    pub model_path: PathBuf,
    /// Parameters from the model TOML file
    pub parameters: ModelParameters,
    /// The network to optimise
    pub network: Network,
    /// Availability profiles, including any substituted by fallbacks
    pub profiles: IndexMap<ProfileID, Profile>,
}

impl Model {
    /// Iterate over the profiles which could not be read from file
    pub fn iter_fallback_profiles(&self) -> impl Iterator<Item = (&ProfileID, &Profile)> {
        self.profiles
            .iter()
            .filter(|(_, profile)| profile.source.is_fallback())
    }
}
