//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, SelectorProfiles};
use contracts::SelectorConfig;
use tracing::info;

use crate::error::CliError;

/// Load profiles from `config`, or the built-in set when no file is given
fn load_profiles(config: Option<&Path>) -> Result<SelectorProfiles> {
    let Some(path) = config else {
        info!("No profile file given, using built-in profiles");
        return Ok(SelectorProfiles::builtin());
    };

    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()).into());
    }

    info!(config = %path.display(), "Loading selector profiles");
    ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load profiles from {}", path.display()))
}

/// Pick one profile by name
fn find_profile(profiles: &SelectorProfiles, name: &str) -> Result<SelectorConfig> {
    profiles.get(name).cloned().ok_or_else(|| {
        CliError::profile_not_found(name, profiles.selectors.iter().map(|s| s.name.as_str()))
            .into()
    })
}
