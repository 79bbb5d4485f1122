//! Unified configuration for the studio.
//!
//! This module provides the configuration foundation that reads from
//! `.synapse/synapse.toml`. It supports:
//! - Project-level settings with sensible defaults
//! - Layered configuration (file → environment → CLI)
//!
//! # Configuration File Format
//!
//! ```toml
//! [project]
//! name = "my-app"
//!
//! [workflow]
//! max_parallel = 1
//! time_scale = 1.0
//! stages_file = "stages.json"
//!
//! [generation]
//! claude_cmd = "claude"
//! offline = false
//!
//! [server]
//! host = "127.0.0.1"
//! port = 9002
//!
//! [storage]
//! store_dir = ".synapse/store"
//! debounce_ms = 1000
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Project name (optional, defaults to the directory name)
    #[serde(default)]
    pub name: Option<String>,
}

/// Workflow engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSection {
    /// Maximum number of stages working at once
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    /// Multiplier applied to simulated stage durations
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,
    /// Custom stage template file, relative to the project directory
    #[serde(default)]
    pub stages_file: Option<PathBuf>,
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            time_scale: default_time_scale(),
            stages_file: None,
        }
    }
}

/// Code generation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationSection {
    /// Claude CLI command (default: "claude")
    #[serde(default)]
    pub claude_cmd: Option<String>,
    /// Serve the built-in scaffold instead of calling the CLI
    #[serde(default)]
    pub offline: bool,
}

/// HTTP service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    /// Store directory, relative to the project directory
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
    /// Debounce window for editor saves, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            store_dir: None,
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_max_parallel() -> usize {
    1
}

fn default_time_scale() -> f64 {
    1.0
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9002
}

fn default_debounce_ms() -> u64 {
    1000
}

/// The complete synapse.toml configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynapseToml {
    /// Project-level settings
    #[serde(default)]
    pub project: ProjectSection,
    /// Workflow engine settings
    #[serde(default)]
    pub workflow: WorkflowSection,
    /// Code generation settings
    #[serde(default)]
    pub generation: GenerationSection,
    /// HTTP service settings
    #[serde(default)]
    pub server: ServerSection,
    /// Persistence settings
    #[serde(default)]
    pub storage: StorageSection,
}

impl SynapseToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse synapse.toml")
    }

    /// Load configuration from the default location (.synapse/synapse.toml).
    /// Returns default configuration if the file doesn't exist.
    pub fn load_or_default(synapse_dir: &Path) -> Result<Self> {
        let config_path = synapse_dir.join("synapse.toml");
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize synapse.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Get the Claude command, with fallback to environment variable.
    pub fn claude_cmd(&self) -> String {
        self.generation
            .claude_cmd
            .clone()
            .or_else(|| std::env::var("CLAUDE_CMD").ok())
            .unwrap_or_else(|| "claude".to_string())
    }

    /// Get offline mode, with environment variable override.
    pub fn offline(&self) -> bool {
        if let Ok(env_val) = std::env::var("SYNAPSE_OFFLINE") {
            return env_val != "false" && env_val != "0";
        }
        self.generation.offline
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.workflow.max_parallel == 0 {
            warnings.push(
                "workflow.max_parallel is 0; the orchestrator will run with a cap of 1"
                    .to_string(),
            );
        }

        if !self.workflow.time_scale.is_finite() || self.workflow.time_scale < 0.0 {
            warnings.push(format!(
                "workflow.time_scale {} is not usable; falling back to 1.0",
                self.workflow.time_scale
            ));
        }

        if self.server.port == 0 {
            warnings.push("server.port is 0; the OS will choose an ephemeral port".to_string());
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_input_yields_defaults() {
        let config = SynapseToml::parse("").unwrap();
        assert_eq!(config.workflow.max_parallel, 1);
        assert_eq!(config.workflow.time_scale, 1.0);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9002);
        assert_eq!(config.storage.debounce_ms, 1000);
        assert!(!config.generation.offline);
    }

    #[test]
    fn test_parse_full_document() {
        let config = SynapseToml::parse(
            r#"
            [project]
            name = "demo"

            [workflow]
            max_parallel = 2
            time_scale = 0.5
            stages_file = "team.json"

            [generation]
            claude_cmd = "claude-dev"
            offline = true

            [server]
            host = "0.0.0.0"
            port = 8080

            [storage]
            debounce_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.project.name.as_deref(), Some("demo"));
        assert_eq!(config.workflow.max_parallel, 2);
        assert_eq!(config.workflow.time_scale, 0.5);
        assert_eq!(
            config.workflow.stages_file,
            Some(PathBuf::from("team.json"))
        );
        assert_eq!(config.generation.claude_cmd.as_deref(), Some("claude-dev"));
        assert_eq!(config.claude_cmd(), "claude-dev");
        assert!(config.generation.offline);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.debounce_ms, 250);
    }

    #[test]
    fn test_unknown_section_is_an_error_free_parse() {
        // Unknown keys are ignored so older files keep loading
        let config = SynapseToml::parse("[future]\nflag = true\n").unwrap();
        assert_eq!(config.workflow.max_parallel, 1);
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempdir().unwrap();
        let config = SynapseToml::load_or_default(dir.path()).unwrap();
        assert_eq!(config.server.port, 9002);
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("synapse.toml");

        let mut config = SynapseToml::default();
        config.project.name = Some("demo".to_string());
        config.workflow.max_parallel = 3;
        config.save(&path).unwrap();

        let loaded = SynapseToml::load(&path).unwrap();
        assert_eq!(loaded.project.name.as_deref(), Some("demo"));
        assert_eq!(loaded.workflow.max_parallel, 3);
    }

    #[test]
    fn test_validate_flags_bad_values() {
        let mut config = SynapseToml::default();
        config.workflow.max_parallel = 0;
        config.workflow.time_scale = -1.0;
        config.server.port = 0;

        let warnings = config.validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("max_parallel"));
        assert!(warnings[1].contains("time_scale"));
        assert!(warnings[2].contains("port"));
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(SynapseToml::default().validate().is_empty());
    }
}
