//! Layered error definitions
//!
//! Categorized by source: config / selector / buffer

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Selector Errors =====
    /// Caller violated a precondition; nothing was mutated
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },

    /// A queue was empty or the requested entry is absent
    #[error("not enough data: {message}")]
    NotEnoughData { message: String },

    /// Matched queues lost parity or a pair could not be reassembled
    #[error("[{selector}] consistency violation: {message}")]
    ConsistencyViolation {
        selector: String,
        message: String,
        /// Queue dump taken at the moment of detection
        dump: String,
    },

    // ===== Buffer Errors =====
    /// The frame has no buffer at the requested pipe/node
    #[error("no buffer at pipe {pipe_id} node {node:?}: {message}")]
    BufferUnavailable {
        pipe_id: u32,
        node: Option<usize>,
        message: String,
    },

    /// Buffer manager refused a release
    #[error("buffer manager '{manager}' failed to release buffer {index}: {message}")]
    BufferRelease {
        manager: String,
        index: u32,
        message: String,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    pub fn not_enough_data(message: impl Into<String>) -> Self {
        Self::NotEnoughData {
            message: message.into(),
        }
    }

    /// Create consistency violation carrying a queue dump
    pub fn consistency(
        selector: impl Into<String>,
        message: impl Into<String>,
        dump: impl Into<String>,
    ) -> Self {
        Self::ConsistencyViolation {
            selector: selector.into(),
            message: message.into(),
            dump: dump.into(),
        }
    }

    pub fn buffer_release(
        manager: impl Into<String>,
        index: u32,
        message: impl Into<String>,
    ) -> Self {
        Self::BufferRelease {
            manager: manager.into(),
            index,
            message: message.into(),
        }
    }

    /// True for errors that leave the selector state untouched.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::ConsistencyViolation { .. })
    }
}
