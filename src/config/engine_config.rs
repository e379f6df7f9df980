// Static engine configuration
//
// Loaded once at attach time from TOML. Unlike the snapshot (profiles and
// assignments, replaced at runtime), nothing here changes while attached.

use crate::concealment::ConcealmentPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Package of the companion configuration app
pub const DEFAULT_SELF_PACKAGE: &str = "com.idveil.app";

/// Engine-wide settings
///
/// # Example
/// ```
/// use idveil::config::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert_eq!(config.self_package, "com.idveil.app");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// The engine never attaches to its own companion app
    pub self_package: String,

    /// Processes refused in addition to the built-in system set
    pub protected_processes: Vec<String>,

    /// Capacity of the in-memory diagnostics buffer
    ///
    /// Records beyond capacity evict the oldest ones.
    pub diagnostics_capacity: usize,

    pub concealment: ConcealmentPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            self_package: DEFAULT_SELF_PACKAGE.to_string(),
            protected_processes: Vec::new(),
            diagnostics_capacity: 1024,
            concealment: ConcealmentPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Parse from TOML text; absent keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(content).context("Failed to parse engine config TOML")?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid engine config: {}", e))?;
        Ok(config)
    }

    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read engine config: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.self_package.trim().is_empty() {
            return Err("self_package must not be empty".to_string());
        }

        if self.diagnostics_capacity == 0 {
            return Err("diagnostics_capacity must be > 0".to_string());
        }

        if let Some(p) = self.protected_processes.iter().find(|p| p.trim().is_empty()) {
            return Err(format!("protected_processes contains a blank entry {:?}", p));
        }

        self.concealment.validate()
    }
}
