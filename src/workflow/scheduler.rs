//! Stage status tracking and dispatch readiness.
//!
//! The scheduler owns the live status of every stage and enforces the
//! dependency contract: a stage may only start once every dependency is
//! Done, a failure blocks everything downstream, and a retried-to-Done
//! stage releases its direct dependents back to Idle.

use crate::errors::StudioError;
use crate::stage::StageSpec;
use crate::workflow::graph::{StageGraph, StageIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Status of a stage in the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Waiting to be dispatched
    #[default]
    Idle,
    /// Currently running
    Working,
    /// Completed successfully
    Done,
    /// Failed; may be retried
    Failed { error: String },
    /// An upstream dependency failed
    Blocked { waiting_on: Vec<u32> },
}

impl StageStatus {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_working(&self) -> bool {
        matches!(self, Self::Working)
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

/// A stage with its live status and progress.
#[derive(Debug, Clone)]
pub struct StageNode {
    /// The stage definition
    pub spec: StageSpec,
    /// Current status
    pub status: StageStatus,
    /// 0..=100; reaches 100 only on Done
    pub progress: u8,
    /// Index in the graph
    pub index: StageIndex,
}

impl StageNode {
    fn new(spec: StageSpec, index: StageIndex) -> Self {
        Self {
            spec,
            status: StageStatus::Idle,
            progress: 0,
            index,
        }
    }
}

/// Tracks stage statuses and computes which stages may run next.
#[derive(Debug)]
pub struct WorkflowScheduler {
    graph: StageGraph,
    nodes: Vec<StageNode>,
    done: HashSet<StageIndex>,
    failed: HashSet<StageIndex>,
}

impl WorkflowScheduler {
    /// Create a scheduler from a stage template.
    pub fn from_stages(stages: Vec<StageSpec>) -> Result<Self, StudioError> {
        let graph = StageGraph::build(stages)?;

        let nodes: Vec<StageNode> = graph
            .stages()
            .iter()
            .enumerate()
            .map(|(i, s)| StageNode::new(s.clone(), i))
            .collect();

        Ok(Self {
            graph,
            nodes,
            done: HashSet::new(),
            failed: HashSet::new(),
        })
    }

    /// Reset every stage to Idle with zero progress.
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.status = StageStatus::Idle;
            node.progress = 0;
        }
        self.done.clear();
        self.failed.clear();
    }

    /// Return a single stage to Idle so it can be dispatched again.
    pub fn reset_stage(&mut self, id: u32) {
        let Some(index) = self.graph.index_of(id) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(index) {
            node.status = StageStatus::Idle;
            node.progress = 0;
        }
        self.done.remove(&index);
        self.failed.remove(&index);
    }

    pub fn nodes(&self) -> &[StageNode] {
        &self.nodes
    }

    pub fn node(&self, id: u32) -> Option<&StageNode> {
        self.graph.index_of(id).and_then(|i| self.nodes.get(i))
    }

    fn node_mut(&mut self, id: u32) -> Option<&mut StageNode> {
        let index = self.graph.index_of(id)?;
        self.nodes.get_mut(index)
    }

    /// Stages that may be dispatched now: Idle with every dependency Done.
    /// Order follows the template, which is also the dispatch tie-break.
    pub fn ready_stages(&self) -> Vec<u32> {
        self.nodes
            .iter()
            .filter(|node| {
                node.status.is_idle() && self.graph.dependencies_satisfied(node.index, &self.done)
            })
            .map(|node| node.spec.id)
            .collect()
    }

    /// Mark a stage as running with zeroed progress.
    pub fn mark_working(&mut self, id: u32) {
        if let Some(node) = self.node_mut(id) {
            node.status = StageStatus::Working;
            node.progress = 0;
        }
    }

    /// Record progress for a running stage. Values are capped below 100;
    /// only `mark_done` sets 100.
    pub fn set_progress(&mut self, id: u32, progress: u8) {
        if let Some(node) = self.node_mut(id)
            && node.status.is_working()
        {
            node.progress = progress.min(99);
        }
    }

    /// Mark a stage Done and re-evaluate its direct dependents: a Blocked
    /// dependent whose dependencies are now all Done returns to Idle.
    /// Returns the ids that were unblocked.
    pub fn mark_done(&mut self, id: u32) -> Vec<u32> {
        let Some(index) = self.graph.index_of(id) else {
            return Vec::new();
        };
        if let Some(node) = self.nodes.get_mut(index) {
            node.status = StageStatus::Done;
            node.progress = 100;
        }
        self.done.insert(index);
        self.failed.remove(&index);

        let mut unblocked = Vec::new();
        let dependents: Vec<StageIndex> = self.graph.dependents(index).to_vec();
        for dep_index in dependents {
            let satisfied = self.graph.dependencies_satisfied(dep_index, &self.done);
            if let Some(node) = self.nodes.get_mut(dep_index)
                && node.status.is_blocked()
                && satisfied
            {
                node.status = StageStatus::Idle;
                node.progress = 0;
                unblocked.push(node.spec.id);
            }
        }
        unblocked
    }

    /// Mark a stage Failed and transitively block everything that depends on
    /// it. Progress stays where the stage left it. Returns the ids newly
    /// Blocked, in traversal order.
    pub fn mark_failed(&mut self, id: u32, error: &str) -> Vec<u32> {
        let Some(index) = self.graph.index_of(id) else {
            return Vec::new();
        };
        if let Some(node) = self.nodes.get_mut(index) {
            node.status = StageStatus::Failed {
                error: error.to_string(),
            };
        }
        self.failed.insert(index);
        self.done.remove(&index);

        let mut blocked = Vec::new();
        self.block_dependents(index, &mut blocked);
        blocked
    }

    fn block_dependents(&mut self, index: StageIndex, blocked: &mut Vec<u32>) {
        let dependents: Vec<StageIndex> = self.graph.dependents(index).to_vec();
        for dep_index in dependents {
            let waiting_on = self.graph.unmet_dependencies(dep_index, &self.done);
            let Some(node) = self.nodes.get_mut(dep_index) else {
                continue;
            };
            if node.status.is_done() || node.status.is_failed() {
                continue;
            }
            let newly_blocked = !node.status.is_blocked();
            node.status = StageStatus::Blocked { waiting_on };
            if newly_blocked {
                blocked.push(node.spec.id);
                self.block_dependents(dep_index, blocked);
            }
        }
    }

    /// Restore a node's status from a persisted snapshot, keeping the done
    /// and failed sets consistent.
    pub(crate) fn restore_status(&mut self, id: u32, status: StageStatus, progress: u8) {
        let Some(index) = self.graph.index_of(id) else {
            return;
        };
        match &status {
            StageStatus::Done => {
                self.done.insert(index);
                self.failed.remove(&index);
            }
            StageStatus::Failed { .. } => {
                self.failed.insert(index);
                self.done.remove(&index);
            }
            _ => {
                self.done.remove(&index);
                self.failed.remove(&index);
            }
        }
        if let Some(node) = self.nodes.get_mut(index) {
            node.status = status;
            node.progress = progress;
        }
    }

    /// True when nothing is running and nothing further can be dispatched.
    pub fn all_settled(&self) -> bool {
        !self.nodes.iter().any(|n| n.status.is_working()) && self.ready_stages().is_empty()
    }

    /// True when every stage finished successfully.
    pub fn all_done(&self) -> bool {
        self.nodes.iter().all(|n| n.status.is_done())
    }

    pub fn done_count(&self) -> usize {
        self.done.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn blocked_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.status.is_blocked()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{StageKind, default_stages};

    fn stage(id: u32, deps: Vec<u32>) -> StageSpec {
        StageSpec::new(id, &format!("Stage {id}"), StageKind::Planning, deps, 100, "")
    }

    fn scheduler(stages: Vec<StageSpec>) -> WorkflowScheduler {
        WorkflowScheduler::from_stages(stages).unwrap()
    }

    #[test]
    fn test_ready_stages_initial() {
        let s = scheduler(vec![stage(1, vec![]), stage(2, vec![1]), stage(3, vec![1])]);
        assert_eq!(s.ready_stages(), vec![1]);
    }

    #[test]
    fn test_ready_follows_template_order() {
        let s = scheduler(vec![stage(7, vec![]), stage(3, vec![]), stage(5, vec![])]);
        assert_eq!(s.ready_stages(), vec![7, 3, 5]);
    }

    #[test]
    fn test_done_releases_dependents() {
        let mut s = scheduler(vec![stage(1, vec![]), stage(2, vec![1]), stage(3, vec![1])]);

        s.mark_working(1);
        assert!(s.ready_stages().is_empty());

        s.mark_done(1);
        assert_eq!(s.ready_stages(), vec![2, 3]);
    }

    #[test]
    fn test_failure_blocks_transitively() {
        // 1 -> 2 -> 3, and 4 depends on 2 as well
        let mut s = scheduler(vec![
            stage(1, vec![]),
            stage(2, vec![1]),
            stage(3, vec![2]),
            stage(4, vec![2]),
        ]);

        s.mark_done(1);
        s.mark_working(2);
        let blocked = s.mark_failed(2, "boom");

        assert_eq!(blocked, vec![3, 4]);
        assert_eq!(
            s.node(3).unwrap().status,
            StageStatus::Blocked { waiting_on: vec![2] }
        );
        assert_eq!(
            s.node(4).unwrap().status,
            StageStatus::Blocked { waiting_on: vec![2] }
        );
        assert!(s.ready_stages().is_empty());
        assert!(s.all_settled());
        assert!(!s.all_done());
    }

    #[test]
    fn test_failure_leaves_progress() {
        let mut s = scheduler(vec![stage(1, vec![])]);
        s.mark_working(1);
        s.set_progress(1, 40);
        s.mark_failed(1, "boom");
        assert_eq!(s.node(1).unwrap().progress, 40);
    }

    #[test]
    fn test_independent_branch_unaffected_by_failure() {
        // Diamond: 1 -> (2, 3) -> 4
        let mut s = scheduler(vec![
            stage(1, vec![]),
            stage(2, vec![1]),
            stage(3, vec![1]),
            stage(4, vec![2, 3]),
        ]);

        s.mark_done(1);
        s.mark_failed(2, "boom");

        // 3 is not downstream of 2, so it stays dispatchable
        assert_eq!(s.ready_stages(), vec![3]);
        assert_eq!(
            s.node(4).unwrap().status,
            StageStatus::Blocked { waiting_on: vec![2] }
        );
    }

    #[test]
    fn test_retry_success_unblocks_to_idle_not_done() {
        let mut s = scheduler(vec![stage(1, vec![]), stage(2, vec![1]), stage(3, vec![2])]);

        s.mark_failed(1, "boom");
        assert!(s.node(2).unwrap().status.is_blocked());
        assert!(s.node(3).unwrap().status.is_blocked());

        // Manual retry: back to Idle, run again, succeed
        s.reset_stage(1);
        assert_eq!(s.ready_stages(), vec![1]);
        s.mark_working(1);
        let unblocked = s.mark_done(1);

        // Direct dependent returns to Idle; the transitive one stays Blocked
        // until its own dependency is Done
        assert_eq!(unblocked, vec![2]);
        assert_eq!(s.node(2).unwrap().status, StageStatus::Idle);
        assert!(s.node(3).unwrap().status.is_blocked());

        s.mark_working(2);
        assert_eq!(s.mark_done(2), vec![3]);
        assert_eq!(s.node(3).unwrap().status, StageStatus::Idle);
    }

    #[test]
    fn test_unblock_requires_all_dependencies_done() {
        // 3 depends on both 1 and 2
        let mut s = scheduler(vec![stage(1, vec![]), stage(2, vec![]), stage(3, vec![1, 2])]);

        s.mark_failed(1, "boom");
        assert_eq!(
            s.node(3).unwrap().status,
            StageStatus::Blocked { waiting_on: vec![1, 2] }
        );

        s.reset_stage(1);
        s.mark_done(1);
        // 2 is still not done, so 3 stays blocked
        assert!(s.node(3).unwrap().status.is_blocked());

        s.mark_done(2);
        assert_eq!(s.node(3).unwrap().status, StageStatus::Idle);
    }

    #[test]
    fn test_progress_capped_below_completion() {
        let mut s = scheduler(vec![stage(1, vec![])]);
        s.mark_working(1);
        s.set_progress(1, 150);
        assert_eq!(s.node(1).unwrap().progress, 99);

        s.mark_done(1);
        assert_eq!(s.node(1).unwrap().progress, 100);
    }

    #[test]
    fn test_progress_ignored_when_not_working() {
        let mut s = scheduler(vec![stage(1, vec![])]);
        s.set_progress(1, 50);
        assert_eq!(s.node(1).unwrap().progress, 0);
    }

    #[test]
    fn test_reset() {
        let mut s = scheduler(vec![stage(1, vec![]), stage(2, vec![1])]);
        s.mark_done(1);
        s.mark_failed(2, "boom");

        s.reset();
        assert_eq!(s.ready_stages(), vec![1]);
        assert_eq!(s.done_count(), 0);
        assert_eq!(s.failed_count(), 0);
        assert!(s.nodes().iter().all(|n| n.status.is_idle() && n.progress == 0));
    }

    #[test]
    fn test_completion_tracking() {
        let mut s = scheduler(vec![stage(1, vec![]), stage(2, vec![1])]);
        assert_eq!(s.done_count(), 0);
        assert!(!s.all_done());

        s.mark_done(1);
        assert_eq!(s.done_count(), 1);
        assert!(!s.all_done());

        s.mark_done(2);
        assert!(s.all_done());
        assert!(s.all_settled());
    }

    #[test]
    fn test_default_template_runs_linearly() {
        let mut s = scheduler(default_stages());

        let mut order = Vec::new();
        loop {
            let ready = s.ready_stages();
            let Some(&id) = ready.first() else { break };
            s.mark_working(id);
            s.mark_done(id);
            order.push(id);
        }

        assert_eq!(order, vec![1, 2, 3, 4, 5]);
        assert!(s.all_done());
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&StageStatus::Idle).unwrap();
        assert_eq!(json, "\"idle\"");

        let json = serde_json::to_string(&StageStatus::Blocked { waiting_on: vec![2] }).unwrap();
        assert_eq!(json, r#"{"blocked":{"waiting_on":[2]}}"#);

        let parsed: StageStatus =
            serde_json::from_str(r#"{"failed":{"error":"boom"}}"#).unwrap();
        assert_eq!(
            parsed,
            StageStatus::Failed { error: "boom".to_string() }
        );
    }
}
