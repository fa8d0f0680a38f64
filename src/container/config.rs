//! Container configuration.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How much the container reports about failing operations.
///
/// Errors are returned and recorded as the last error regardless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagnostics {
    /// No events at all while a container operation runs, including those
    /// raised by records, attributes and the backend.
    Silent,
    /// Failed operations are reported as warnings.
    #[default]
    Warnings,
    /// Warnings plus a debug event for every operation.
    Verbose,
}

impl Diagnostics {
    pub fn warnings(self) -> bool {
        self != Diagnostics::Silent
    }

    pub fn verbose(self) -> bool {
        self == Diagnostics::Verbose
    }
}

/// Per-container settings.
///
/// ```rust
/// use qcstore::{ContainerConfig, Diagnostics};
///
/// let cfg = ContainerConfig::from_json(r#"{"diagnostics": "verbose"}"#).unwrap();
/// assert_eq!(cfg, ContainerConfig::new().with_diagnostics(Diagnostics::Verbose));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub diagnostics: Diagnostics,
}

impl ContainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Load from a JSON document. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::SyntaxError {
            position: e.column(),
            message: format!("container config: {e}"),
        })
    }
}
