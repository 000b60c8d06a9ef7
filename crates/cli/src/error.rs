//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Requested profile is not in the loaded profile set
    #[error("Selector profile '{name}' not found (available: {available})")]
    ProfileNotFound { name: String, available: String },

    /// Camera registration failed before the run started
    #[error("Failed to set up camera {camera}: {message}")]
    CameraSetup { camera: String, message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn profile_not_found<'a>(
        name: impl Into<String>,
        available: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self::ProfileNotFound {
            name: name.into(),
            available: available.into_iter().collect::<Vec<_>>().join(", "),
        }
    }

    pub fn camera_setup(camera: impl ToString, message: impl Into<String>) -> Self {
        Self::CameraSetup {
            camera: camera.to_string(),
            message: message.into(),
        }
    }
}
