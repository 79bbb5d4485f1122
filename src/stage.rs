//! Stage definitions and the static agent template.
//!
//! This module provides:
//! - `StageSpec` struct describing one named stage of the agent workflow
//! - `StageKind` marking which stages do real work vs. simulated work
//! - `StagesFile` for loading/saving custom stage templates as JSON
//! - The default five-agent template (Planner → Architect → Coder →
//!   Reviewer → Deployer)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// The kind of work a stage performs.
///
/// Only `Coding` stages invoke the code generation client; every other kind
/// simulates variable-duration work driven by the template duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    #[default]
    Planning,
    Design,
    Coding,
    Review,
    Deployment,
}

/// Describes a single stage of the agent workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageSpec {
    /// Stable stage id, unique within a template
    pub id: u32,
    /// Human-readable agent name (e.g., "Coder Agent")
    pub name: String,
    /// What kind of work this stage performs
    #[serde(default)]
    pub kind: StageKind,
    /// Ids of stages that must be Done before this stage may run
    #[serde(default)]
    pub dependencies: Vec<u32>,
    /// Simulated work duration in milliseconds (ignored for Coding stages)
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
    /// Chat message appended to the transcript when this stage completes
    #[serde(default)]
    pub handoff: String,
}

fn default_duration_ms() -> u64 {
    1500
}

impl StageSpec {
    /// Create a new StageSpec with all fields.
    pub fn new(
        id: u32,
        name: &str,
        kind: StageKind,
        dependencies: Vec<u32>,
        duration_ms: u64,
        handoff: &str,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind,
            dependencies,
            duration_ms,
            handoff: handoff.to_string(),
        }
    }

    /// Simulated work duration for this stage.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Whether this stage calls the code generation client.
    pub fn is_generator(&self) -> bool {
        self.kind == StageKind::Coding
    }
}

/// Represents a stage template file on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagesFile {
    /// Template format version
    #[serde(default = "default_version")]
    pub version: u32,
    /// List of stage specs in dispatch-tiebreak order
    pub stages: Vec<StageSpec>,
}

fn default_version() -> u32 {
    1
}

impl StagesFile {
    /// Load a stage template from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read stages file: {}", path.display()))?;
        let file: StagesFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse stages file: {}", path.display()))?;
        Ok(file)
    }

    /// Save the stage template to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize stages")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write stages file: {}", path.display()))?;
        Ok(())
    }
}

/// The default agent team: a linear five-stage pipeline.
///
/// Ids, names, and durations follow the shipped product template. The Coder
/// stage keeps its template duration for completeness, but its dispatch time
/// is governed by the real generation call instead.
pub fn default_stages() -> Vec<StageSpec> {
    vec![
        StageSpec::new(
            1,
            "Planner Agent",
            StageKind::Planning,
            vec![],
            1500,
            "The **Planner Agent** has defined the features, user personas, and \
             workflows in a structured requirements document. Handing off to the Architect.",
        ),
        StageSpec::new(
            2,
            "Architect Agent",
            StageKind::Design,
            vec![1],
            2000,
            "The **Architect Agent** has designed the system architecture and component \
             layout for the application. Passing the blueprint to the Coder.",
        ),
        StageSpec::new(
            3,
            "Coder Agent",
            StageKind::Coding,
            vec![2],
            4000,
            "The **Coder Agent** has implemented the application from the blueprint. \
             Submitting for review.",
        ),
        StageSpec::new(
            4,
            "Reviewer Agent",
            StageKind::Review,
            vec![3],
            2500,
            "The **Reviewer Agent** has audited the generated code. Code approved. \
             Handing off for deployment.",
        ),
        StageSpec::new(
            5,
            "Deployer Agent",
            StageKind::Deployment,
            vec![4],
            1500,
            "The **Deployer Agent** has prepared the application for deployment. \
             The application is ready.",
        ),
    ]
}
