//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON selector profile files
//! - Validate configuration legality
//! - Generate `SelectorProfiles`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let profiles = ConfigLoader::load_from_path(Path::new("selectors.toml")).unwrap();
//! for selector in &profiles.selectors {
//!     println!("{}: {}ms window", selector.name, selector.calib_time_ms);
//! }
//! ```

mod parser;
mod validator;

pub use contracts::SelectorProfiles;
pub use parser::ConfigFormat;

use contracts::{ContractError, SelectorConfig};
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<SelectorProfiles, ContractError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<SelectorProfiles, ContractError> {
        let profiles = parser::parse(content, format)?;
        validator::validate(&profiles)?;
        Ok(profiles)
    }

    /// Load a file and pick one selector by name
    pub fn load_selector(path: &Path, name: &str) -> Result<SelectorConfig, ContractError> {
        let profiles = Self::load_from_path(path)?;
        profiles.get(name).cloned().ok_or_else(|| {
            ContractError::config_validation(
                "selectors",
                format!("no selector named '{name}' in {}", path.display()),
            )
        })
    }

    /// Serialize SelectorProfiles to TOML string
    pub fn to_toml(profiles: &SelectorProfiles) -> Result<String, ContractError> {
        toml::to_string_pretty(profiles)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize SelectorProfiles to JSON string
    pub fn to_json(profiles: &SelectorProfiles) -> Result<String, ContractError> {
        serde_json::to_string_pretty(profiles)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }

    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }
}
