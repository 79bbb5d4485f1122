use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::stage::{StageSpec, StagesFile, default_stages};
use crate::store::LocalStore;
use crate::studio_config::SynapseToml;

/// Runtime configuration for the studio.
///
/// This struct bridges the unified SynapseToml with the runtime needs of
/// the orchestrator and the HTTP service. It resolves all project paths and
/// provides convenient access to effective configuration values.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub synapse_dir: PathBuf,
    pub stages_file: PathBuf,
    pub store_dir: PathBuf,
    pub log_dir: PathBuf,
    pub claude_cmd: String,
    pub offline: bool,
    pub verbose: bool,
    pub yes: bool,
    pub max_parallel: usize,
    pub time_scale: f64,
    pub host: String,
    pub port: u16,
    /// The underlying unified configuration
    toml: SynapseToml,
}

impl Config {
    /// Create a new Config for a project directory, layering file settings
    /// with the given CLI overrides.
    pub fn new(
        project_dir: PathBuf,
        verbose: bool,
        yes: bool,
        max_parallel: Option<usize>,
    ) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let synapse_dir = project_dir.join(".synapse");
        let toml = SynapseToml::load_or_default(&synapse_dir)?;

        let stages_file = match &toml.workflow.stages_file {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => project_dir.join(path),
            None => synapse_dir.join("stages.json"),
        };
        let store_dir = match &toml.storage.store_dir {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => project_dir.join(path),
            None => synapse_dir.join("store"),
        };
        let log_dir = synapse_dir.join("logs");

        let max_parallel = max_parallel.unwrap_or(toml.workflow.max_parallel).max(1);
        let time_scale = if toml.workflow.time_scale.is_finite() && toml.workflow.time_scale >= 0.0
        {
            toml.workflow.time_scale
        } else {
            1.0
        };

        Ok(Self {
            claude_cmd: toml.claude_cmd(),
            offline: toml.offline(),
            host: toml.server.host.clone(),
            port: toml.server.port,
            project_dir,
            synapse_dir,
            stages_file,
            store_dir,
            log_dir,
            verbose,
            yes,
            max_parallel,
            time_scale,
            toml,
        })
    }

    /// Get the underlying unified configuration.
    pub fn toml(&self) -> &SynapseToml {
        &self.toml
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.store_dir).context("Failed to create store directory")?;
        std::fs::create_dir_all(&self.log_dir).context("Failed to create log directory")?;
        Ok(())
    }

    /// Open the project's key-value store.
    pub fn store(&self) -> LocalStore {
        LocalStore::new(self.store_dir.clone())
    }

    /// Load the stage template, falling back to the built-in team when no
    /// custom template file exists.
    pub fn load_stages(&self) -> Result<Vec<StageSpec>> {
        if self.stages_file.exists() {
            Ok(StagesFile::load(&self.stages_file)?.stages)
        } else {
            Ok(default_stages())
        }
    }
}
