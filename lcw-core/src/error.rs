//! Error types for LCW operations
//!
//! Every failure in the loader is non-fatal to the surrounding page. The
//! error values exist so callers can log them, branch on them in tests, and
//! hand a stable code to the browser console, never so they can be thrown.
//!
//! # Error Codes
//!
//! Each variant has a stable error code (e.g., `CONFIGURATION_MISS`) that can
//! be used for:
//! - Filtering the diagnostic log
//! - Client handling - switch on error codes in JS glue
//! - Aggregating console output
//!
//! # Example
//!
//! ```rust
//! use lcw_core::error::{ErrorCategory, WidgetError};
//!
//! fn handle_error(err: WidgetError) {
//!     match err.category() {
//!         ErrorCategory::Configuration => println!("Pair not configured"),
//!         ErrorCategory::ScriptLoad => println!("Chat did not load"),
//!         ErrorCategory::Sdk => println!("Widget loaded without visitor data"),
//!         _ => println!("Other error"),
//!     }
//!
//!     if err.is_recoverable() {
//!         println!("Another attempt may succeed");
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for LCW operations
pub type Result<T> = std::result::Result<T, WidgetError>;

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Environment/agent pair missing or unavailable
    Configuration,
    /// Widget script could not be loaded
    ScriptLoad,
    /// External widget SDK is missing an entry point
    Sdk,
    /// Visitor data producer failed
    Collaborator,
    /// Manifest or input validation failed
    Validation,
    /// Port, serialization or I/O failure
    Internal,
}

/// Errors that can occur in LCW operations
#[derive(Error, Debug)]
pub enum WidgetError {
    // ═══════════════════════════════════════════════════════════════════════
    // Configuration errors (registry lookups and availability)
    // ═══════════════════════════════════════════════════════════════════════

    /// No registry entry exists for the environment/agent pair
    #[error("No widget configured for agent '{agent}' in environment '{environment}'")]
    ConfigurationMiss { environment: String, agent: String },

    /// The pair is registered but disabled in the availability matrix
    #[error("Agent '{agent}' is not available in environment '{environment}'")]
    AgentUnavailable { environment: String, agent: String },

    /// Environment name is not one of the known environments
    #[error("Unknown environment: '{value}'. Expected one of dev, uat, prd.")]
    UnknownEnvironment { value: String },

    /// Selection attempted before the access gate was unlocked
    #[error("Content is locked. Unlock the access gate before selecting an agent.")]
    GateLocked,

    // ═══════════════════════════════════════════════════════════════════════
    // Runtime errors (script loading and SDK contract)
    // ═══════════════════════════════════════════════════════════════════════

    /// A widget script failed to load
    #[error("Widget script for agent '{agent}' failed to load from '{source_url}' (terminal: {terminal})")]
    ScriptLoadFailure {
        agent: String,
        source_url: String,
        terminal: bool,
    },

    /// Readiness fired but the context registration entry point is absent
    #[error("Widget SDK not ready: '{entry_point}' is missing. Widget continues without visitor context.")]
    SdkNotReady { entry_point: String },

    /// A visitor data producer could not supply its field
    #[error("Visitor data '{field}' unavailable: {reason}")]
    CollaboratorDataUnavailable { field: String, reason: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Infrastructure errors (manifest, ports, serialization, I/O)
    // ═══════════════════════════════════════════════════════════════════════

    /// Loader manifest is malformed or inconsistent
    #[error("Invalid loader manifest: {reason}")]
    InvalidManifest { reason: String },

    /// A port implementation failed to perform a host operation
    #[error("Port error: {reason}")]
    Port { reason: String },

    /// JSON serialization or deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WidgetError {
    /// Returns true if the same operation might succeed later
    ///
    /// A locked gate unlocks, a missing SDK entry point can appear after the
    /// next widget reload, and collaborator lookups can be retried by the host.
    /// A terminal script failure or a configuration miss never changes.
    pub fn is_recoverable(&self) -> bool {
        match self {
            WidgetError::GateLocked
            | WidgetError::SdkNotReady { .. }
            | WidgetError::CollaboratorDataUnavailable { .. }
            | WidgetError::Port { .. } => true,
            WidgetError::ScriptLoadFailure { terminal, .. } => !terminal,
            _ => false,
        }
    }

    /// Returns the error category for grouping
    pub fn category(&self) -> ErrorCategory {
        match self {
            WidgetError::ConfigurationMiss { .. }
            | WidgetError::AgentUnavailable { .. }
            | WidgetError::GateLocked => ErrorCategory::Configuration,

            WidgetError::ScriptLoadFailure { .. } => ErrorCategory::ScriptLoad,

            WidgetError::SdkNotReady { .. } => ErrorCategory::Sdk,

            WidgetError::CollaboratorDataUnavailable { .. } => ErrorCategory::Collaborator,

            WidgetError::InvalidManifest { .. }
            | WidgetError::UnknownEnvironment { .. } => ErrorCategory::Validation,

            WidgetError::Port { .. }
            | WidgetError::Serialization(_)
            | WidgetError::Io(_) => ErrorCategory::Internal,
        }
    }

    /// Returns the stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            WidgetError::ConfigurationMiss { .. } => "CONFIGURATION_MISS",
            WidgetError::AgentUnavailable { .. } => "AGENT_UNAVAILABLE",
            WidgetError::UnknownEnvironment { .. } => "UNKNOWN_ENVIRONMENT",
            WidgetError::GateLocked => "GATE_LOCKED",
            WidgetError::ScriptLoadFailure { .. } => "SCRIPT_LOAD_FAILURE",
            WidgetError::SdkNotReady { .. } => "SDK_NOT_READY",
            WidgetError::CollaboratorDataUnavailable { .. } => "COLLABORATOR_DATA_UNAVAILABLE",
            WidgetError::InvalidManifest { .. } => "INVALID_MANIFEST",
            WidgetError::Port { .. } => "PORT_ERROR",
            WidgetError::Serialization(_) => "JSON_ERROR",
            WidgetError::Io(_) => "IO_ERROR",
        }
    }

    /// Converts this error to a JSON-serializable report
    ///
    /// The browser build hands this to the console so failures stay visible
    /// without surfacing to the visitor.
    pub fn to_error_report(&self) -> ErrorReport {
        ErrorReport {
            code: self.error_code().to_string(),
            message: self.to_string(),
            category: self.category(),
            recoverable: self.is_recoverable(),
        }
    }
}

/// JSON-serializable error report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Stable error code (e.g., "CONFIGURATION_MISS")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Error category
    pub category: ErrorCategory,
    /// Whether a later attempt might succeed
    pub recoverable: bool,
}
