// Engine configuration
//
// Ambient settings that decide how calls behave: whether they build nodes or
// run them, how dispatch misses are handled, and how refiners are invoked.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use opgraph_ops::DispatchPolicy;
use serde::{Deserialize, Serialize};

/// Whether calls are recorded or run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Calls return graph nodes
    #[default]
    Lazy,
    /// Calls build the node and hand it to the evaluator
    Eager,
}

/// Dispatch settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub policy: DispatchPolicy,
}

/// Output type refinement settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Whether refiners are invoked at all
    pub enabled: bool,

    /// How long a refiner may run before the call fails
    pub timeout_ms: u64,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 30_000,
        }
    }
}

/// Configuration for building and running expression graphs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub execution_mode: ExecutionMode,
    pub dispatch: DispatchConfig,
    pub refine: RefineConfig,
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save the configuration to a TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    pub fn with_dispatch_policy(mut self, policy: DispatchPolicy) -> Self {
        self.dispatch.policy = policy;
        self
    }

    pub fn with_refine_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.refine.timeout_ms = timeout_ms;
        self
    }

    pub fn refine_timeout(&self) -> Duration {
        Duration::from_millis(self.refine.timeout_ms)
    }
}
