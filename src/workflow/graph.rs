//! Dependency graph construction for workflow stages.
//!
//! The graph validates the stage template (unique ids, known dependencies,
//! no cycles) and answers the edge queries the scheduler needs.

use crate::errors::StudioError;
use crate::stage::StageSpec;
use std::collections::{HashMap, HashSet};

/// Index into the stage list.
pub type StageIndex = usize;

/// A validated directed acyclic graph of stages.
#[derive(Debug, Clone)]
pub struct StageGraph {
    /// Stages in template order
    stages: Vec<StageSpec>,
    /// Map from stage id to index
    index_map: HashMap<u32, StageIndex>,
    /// index -> stages that depend on it
    forward_edges: Vec<Vec<StageIndex>>,
    /// index -> stages it depends on
    reverse_edges: Vec<Vec<StageIndex>>,
}

impl StageGraph {
    /// Build and validate a graph from a stage template.
    pub fn build(stages: Vec<StageSpec>) -> Result<Self, StudioError> {
        let mut index_map = HashMap::new();
        for (i, stage) in stages.iter().enumerate() {
            if index_map.insert(stage.id, i).is_some() {
                return Err(StudioError::InvalidTemplate(format!(
                    "duplicate stage id: {}",
                    stage.id
                )));
            }
        }

        let mut forward_edges: Vec<Vec<StageIndex>> = vec![Vec::new(); stages.len()];
        let mut reverse_edges: Vec<Vec<StageIndex>> = vec![Vec::new(); stages.len()];

        for (to, stage) in stages.iter().enumerate() {
            for dep in &stage.dependencies {
                let from = *index_map.get(dep).ok_or_else(|| {
                    StudioError::InvalidTemplate(format!(
                        "stage {} depends on unknown stage {}",
                        stage.id, dep
                    ))
                })?;
                forward_edges[from].push(to);
                reverse_edges[to].push(from);
            }
        }

        let graph = Self {
            stages,
            index_map,
            forward_edges,
            reverse_edges,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    /// Validate that the graph has no cycles using Kahn's algorithm.
    fn check_acyclic(&self) -> Result<(), StudioError> {
        let mut in_degree: Vec<usize> = self.reverse_edges.iter().map(Vec::len).collect();

        let mut queue: Vec<StageIndex> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, deg)| *deg == 0)
            .map(|(i, _)| i)
            .collect();

        let mut processed = 0;

        while let Some(node) = queue.pop() {
            processed += 1;
            for &dependent in self.dependents(node) {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push(dependent);
                }
            }
        }

        if processed != self.len() {
            let cycle_ids: Vec<String> = in_degree
                .iter()
                .enumerate()
                .filter(|&(_, deg)| *deg > 0)
                .map(|(i, _)| self.stages[i].id.to_string())
                .collect();

            return Err(StudioError::InvalidTemplate(format!(
                "dependency cycle involving stages {}",
                cycle_ids.join(", ")
            )));
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn get(&self, index: StageIndex) -> Option<&StageSpec> {
        self.stages.get(index)
    }

    pub fn index_of(&self, id: u32) -> Option<StageIndex> {
        self.index_map.get(&id).copied()
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Stages that depend on the given stage (forward edges).
    pub fn dependents(&self, index: StageIndex) -> &[StageIndex] {
        self.forward_edges.get(index).map_or(&[], |v| v.as_slice())
    }

    /// Stages the given stage depends on (reverse edges).
    pub fn dependencies(&self, index: StageIndex) -> &[StageIndex] {
        self.reverse_edges.get(index).map_or(&[], |v| v.as_slice())
    }

    /// Check whether every dependency of a stage is in the done set.
    pub fn dependencies_satisfied(&self, index: StageIndex, done: &HashSet<StageIndex>) -> bool {
        self.dependencies(index).iter().all(|dep| done.contains(dep))
    }

    /// Ids of the dependencies of a stage that are not yet done.
    pub fn unmet_dependencies(&self, index: StageIndex, done: &HashSet<StageIndex>) -> Vec<u32> {
        self.dependencies(index)
            .iter()
            .filter(|dep| !done.contains(dep))
            .map(|&dep| self.stages[dep].id)
            .collect()
    }
}
