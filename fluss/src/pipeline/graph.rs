//! The pipeline graph: targets, stages and their dependency queries.

use super::Stage;
use crate::archive::{Archive, EntryRef, PlannedEntry};
use crate::core::{StageId, Target, TargetId, TargetKind};
use crate::errors::{
    CycleDetectedError, DuplicateProducerError, GraphError, IncompletePipelineError,
};
use crate::operations::Operation;
use crate::registry::{Applicable, OperationRegistry};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How [`PipelineGraph::sort`] treats stages that wait on targets nothing
/// produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortPolicy {
    /// Leave such stages out of the order and log a warning.
    #[default]
    OmitIncomplete,
    /// Fail with [`GraphError::IncompletePipeline`].
    FailFast,
}

/// A graph shared between threads behind a single-writer lock.
pub type SharedPipelineGraph = Arc<RwLock<PipelineGraph>>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnPath,
    Done,
}

/// Targets and the stages connecting them.
///
/// Targets live in an arena addressed by [`TargetId`]; stages are keyed by
/// [`StageId`]. Both ids are allocated monotonically and never reused, so
/// iteration order is insertion order.
#[derive(Debug, Clone, Default)]
pub struct PipelineGraph {
    targets: BTreeMap<TargetId, Target>,
    stages: BTreeMap<StageId, Stage>,
    next_target: usize,
    next_stage: usize,
    sort_policy: SortPolicy,
}

impl PipelineGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sort policy.
    #[must_use]
    pub fn with_sort_policy(mut self, policy: SortPolicy) -> Self {
        self.sort_policy = policy;
        self
    }

    /// Returns the sort policy.
    #[must_use]
    pub const fn sort_policy(&self) -> SortPolicy {
        self.sort_policy
    }

    /// Wraps the graph for sharing between threads.
    #[must_use]
    pub fn into_shared(self) -> SharedPipelineGraph {
        Arc::new(RwLock::new(self))
    }

    // ---- targets ----

    fn allocate_target(&mut self) -> TargetId {
        let id = TargetId::new(self.next_target);
        self.next_target += 1;
        id
    }

    /// Registers a source entry as an input target.
    pub fn add_input(&mut self, entry: EntryRef) -> TargetId {
        let id = self.allocate_target();
        debug!(target_id = %id, key = entry.key(), "Added input target");
        self.targets.insert(id, Target::input(id, entry));
        id
    }

    /// Registers every file entry of `archive` in key order.
    pub fn add_inputs(&mut self, archive: &dyn Archive) -> io::Result<Vec<TargetId>> {
        let ids: Vec<TargetId> = archive
            .entries()?
            .into_iter()
            .filter(|entry| !entry.is_directory())
            .map(|entry| self.add_input(entry))
            .collect();
        info!(count = ids.len(), "Registered archive entries");
        Ok(ids)
    }

    /// Adds a derived target. `Input` is treated as `Temporary`.
    pub fn add_target(&mut self, kind: TargetKind, path: impl Into<String>) -> TargetId {
        let id = self.allocate_target();
        let target = Target::derived(id, kind, path);
        debug!(target_id = %id, kind = ?target.kind(), path = target.path(), "Added target");
        self.targets.insert(id, target);
        id
    }

    fn derived_mut(&mut self, id: TargetId) -> Result<&mut Target, GraphError> {
        match self.targets.get_mut(&id) {
            None => Err(GraphError::UnknownTarget(id)),
            Some(target) if target.is_input() => Err(GraphError::ImmutableTarget(id)),
            Some(target) => Ok(target),
        }
    }

    /// Changes the path of a derived target.
    pub fn rename_target(&mut self, id: TargetId, path: impl Into<String>) -> Result<(), GraphError> {
        self.derived_mut(id)?.set_path(path.into());
        Ok(())
    }

    /// Marks a derived target as a final output.
    pub fn promote(&mut self, id: TargetId) -> Result<(), GraphError> {
        self.derived_mut(id)?.set_kind(TargetKind::Output);
        Ok(())
    }

    /// Marks a derived target as temporary.
    pub fn demote(&mut self, id: TargetId) -> Result<(), GraphError> {
        self.derived_mut(id)?.set_kind(TargetKind::Temporary);
        Ok(())
    }

    /// Returns a target.
    #[must_use]
    pub fn target(&self, id: TargetId) -> Option<&Target> {
        self.targets.get(&id)
    }

    /// Iterates over targets in id order.
    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    /// Returns the number of targets.
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Returns the source entries of all input targets.
    #[must_use]
    pub fn input_entries(&self) -> Vec<EntryRef> {
        self.targets
            .values()
            .filter_map(|target| target.source().cloned())
            .collect()
    }

    /// Returns entries for `ids`: the source entry for inputs, a key-only
    /// placeholder for derived targets.
    pub fn entries(&self, ids: &[TargetId]) -> Result<Vec<EntryRef>, GraphError> {
        ids.iter()
            .map(|&id| {
                let target = self.targets.get(&id).ok_or(GraphError::UnknownTarget(id))?;
                Ok(match target.source() {
                    Some(entry) => Arc::clone(entry),
                    None => Arc::new(PlannedEntry::new(target.path())) as EntryRef,
                })
            })
            .collect()
    }

    /// Lists the operations applicable to the given targets.
    pub fn propose(&self, inputs: &[TargetId]) -> Result<Vec<Applicable>, GraphError> {
        Ok(OperationRegistry::global().applicable(&self.entries(inputs)?))
    }

    // ---- stages ----

    /// Adds a stage.
    ///
    /// Fails without changing the graph if a target is unknown, an output is
    /// an input target, the stage consumes its own output, or an output
    /// already has a producer.
    pub fn add_stage(&mut self, stage: Stage) -> Result<StageId, GraphError> {
        let id = StageId::new(self.next_stage);

        for &target in stage.inputs().iter().chain(stage.outputs()) {
            if !self.targets.contains_key(&target) {
                return Err(GraphError::UnknownTarget(target));
            }
        }

        let mut seen = BTreeSet::new();
        for &output in stage.outputs() {
            if self.targets.get(&output).is_some_and(Target::is_input) {
                return Err(GraphError::InvalidOutput {
                    target: output,
                    reason: "input targets cannot be produced by a stage".to_string(),
                });
            }
            if !seen.insert(output) {
                return Err(DuplicateProducerError::new(output, None).into());
            }
            if stage.consumes(output) {
                return Err(CycleDetectedError::new(vec![id, id]).into());
            }
            if let Some(existing) = self.producer_of(output) {
                return Err(DuplicateProducerError::new(output, Some(existing)).into());
            }
        }

        debug!(
            stage = %id,
            kind = %stage.kind(),
            inputs = stage.inputs().len(),
            outputs = stage.outputs().len(),
            "Added stage"
        );
        self.stages.insert(id, stage);
        self.next_stage += 1;
        Ok(id)
    }

    /// Creates temporary targets for `output_paths` and adds the stage.
    ///
    /// The new targets are removed again if the stage is rejected.
    pub fn add_proposed_stage(
        &mut self,
        inputs: Vec<TargetId>,
        operation: Operation,
        output_paths: &[String],
    ) -> Result<StageId, GraphError> {
        let outputs: Vec<TargetId> = output_paths
            .iter()
            .map(|path| self.add_target(TargetKind::Temporary, path.clone()))
            .collect();

        self.add_stage(Stage::new(operation, inputs, outputs.clone()))
            .inspect_err(|_| {
                for id in &outputs {
                    self.targets.remove(id);
                }
            })
    }

    /// Returns a stage.
    #[must_use]
    pub fn stage(&self, id: StageId) -> Option<&Stage> {
        self.stages.get(&id)
    }

    /// Returns a stage for editing its operation configuration.
    pub fn stage_mut(&mut self, id: StageId) -> Option<&mut Stage> {
        self.stages.get_mut(&id)
    }

    /// Iterates over stages in id order.
    pub fn stages(&self) -> impl Iterator<Item = (StageId, &Stage)> {
        self.stages.iter().map(|(&id, stage)| (id, stage))
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Returns the stage producing `target`.
    #[must_use]
    pub fn producer_of(&self, target: TargetId) -> Option<StageId> {
        self.stages
            .iter()
            .find(|(_, stage)| stage.produces(target))
            .map(|(&id, _)| id)
    }

    /// Returns the stages consuming `target`, in id order.
    #[must_use]
    pub fn consumers_of(&self, target: TargetId) -> Vec<StageId> {
        self.stages
            .iter()
            .filter(|(_, stage)| stage.consumes(target))
            .map(|(&id, _)| id)
            .collect()
    }

    /// Removes a stage and every stage that transitively consumes its
    /// outputs.
    ///
    /// Returns the removed output targets in id order; they are dropped from
    /// the graph as well. Unknown stages remove nothing.
    pub fn remove_stage(&mut self, id: StageId) -> Vec<Target> {
        let mut removed_targets = BTreeSet::new();
        let mut removed_stages = Vec::new();
        let mut pending = vec![id];

        while let Some(current) = pending.pop() {
            let Some(stage) = self.stages.remove(&current) else {
                continue;
            };
            removed_stages.push(current);
            for &output in stage.outputs() {
                if removed_targets.insert(output) {
                    // Reversed so consumers are visited in id order.
                    pending.extend(self.consumers_of(output).into_iter().rev());
                }
            }
        }

        if !removed_stages.is_empty() {
            info!(
                stage = %id,
                stages = ?removed_stages,
                targets = removed_targets.len(),
                "Removed stage and dependents"
            );
        }
        removed_targets
            .into_iter()
            .filter_map(|target| self.targets.remove(&target))
            .collect()
    }

    /// Removes the producer of `target` and its dependents.
    ///
    /// Targets nothing produces are left alone and yield an empty list.
    pub fn remove_target(&mut self, target: TargetId) -> Vec<Target> {
        self.producer_of(target)
            .map(|stage| self.remove_stage(stage))
            .unwrap_or_default()
    }

    // ---- ordering ----

    /// Orders stages so every stage follows the producers of its inputs,
    /// using the graph's [`SortPolicy`].
    pub fn sort(&self) -> Result<Vec<StageId>, GraphError> {
        self.sort_with(self.sort_policy)
    }

    /// Orders stages with an explicit policy.
    ///
    /// Stages are walked depth-first from the root stages (those reading only
    /// input targets) along consumer edges; the reversed post-order is the
    /// result. Stages the walk cannot reach are walked afterwards only to
    /// detect cycles. A stage is kept if each input is an input target or
    /// comes from a kept stage earlier in the order.
    pub fn sort_with(&self, policy: SortPolicy) -> Result<Vec<StageId>, GraphError> {
        let mut consumers: HashMap<TargetId, Vec<StageId>> = HashMap::new();
        let mut producers: HashMap<TargetId, StageId> = HashMap::new();
        for (&id, stage) in &self.stages {
            for &input in stage.inputs() {
                consumers.entry(input).or_default().push(id);
            }
            for &output in stage.outputs() {
                producers.insert(output, id);
            }
        }
        let successors = |id: StageId| -> Vec<StageId> {
            let mut next: Vec<StageId> = self.stages[&id]
                .outputs()
                .iter()
                .filter_map(|output| consumers.get(output))
                .flatten()
                .copied()
                .collect();
            // Visited last-first so the reversed post-order lists siblings
            // in id order.
            next.sort_unstable_by(|a, b| b.cmp(a));
            next.dedup();
            next
        };

        let is_root = |stage: &Stage| {
            stage
                .inputs()
                .iter()
                .all(|input| self.targets.get(input).is_some_and(Target::is_input))
        };

        let mut marks: HashMap<StageId, Mark> = HashMap::with_capacity(self.stages.len());
        let mut post_order = Vec::with_capacity(self.stages.len());

        let roots: Vec<StageId> = self
            .stages
            .iter()
            .rev()
            .filter(|(_, stage)| is_root(stage))
            .map(|(&id, _)| id)
            .collect();
        for root in roots {
            visit(root, &successors, &mut marks, &mut post_order)?;
        }
        post_order.reverse();
        let order = post_order;

        let unreached: Vec<StageId> = self
            .stages
            .keys()
            .filter(|id| !marks.contains_key(id))
            .copied()
            .collect();
        let mut ignored = Vec::new();
        for id in unreached {
            if !marks.contains_key(&id) {
                visit(id, &successors, &mut marks, &mut ignored)?;
            }
        }

        let mut complete = BTreeSet::new();
        let mut sorted = Vec::with_capacity(order.len());
        for id in order {
            let ready = self.stages[&id].inputs().iter().all(|input| {
                self.targets.get(input).is_some_and(Target::is_input)
                    || producers.get(input).is_some_and(|p| complete.contains(p))
            });
            if ready {
                complete.insert(id);
                sorted.push(id);
            }
        }

        if sorted.len() < self.stages.len() {
            let incomplete: Vec<StageId> = self
                .stages
                .keys()
                .filter(|id| !complete.contains(id))
                .copied()
                .collect();
            let missing: Vec<TargetId> = incomplete
                .iter()
                .flat_map(|id| self.stages[id].inputs())
                .filter(|input| {
                    !self.targets.get(input).is_some_and(Target::is_input)
                        && !producers.contains_key(input)
                })
                .copied()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            match policy {
                SortPolicy::FailFast => {
                    return Err(IncompletePipelineError::new(incomplete, missing).into());
                }
                SortPolicy::OmitIncomplete => {
                    warn!(
                        stages = ?incomplete,
                        missing = ?missing,
                        "Omitting stages whose inputs are never produced"
                    );
                }
            }
        }

        Ok(sorted)
    }

    /// Maps each temporary target consumed in `order` to the position of its
    /// last consumer.
    #[must_use]
    pub fn last_consumers(&self, order: &[StageId]) -> BTreeMap<TargetId, usize> {
        let mut last = BTreeMap::new();
        for (position, id) in order.iter().enumerate() {
            let Some(stage) = self.stages.get(id) else {
                continue;
            };
            for input in stage.inputs() {
                if self
                    .targets
                    .get(input)
                    .is_some_and(|t| t.kind() == TargetKind::Temporary)
                {
                    last.insert(*input, position);
                }
            }
        }
        last
    }
}

/// Iterative depth-first walk pushing finished stages to `post_order`.
fn visit(
    start: StageId,
    successors: &impl Fn(StageId) -> Vec<StageId>,
    marks: &mut HashMap<StageId, Mark>,
    post_order: &mut Vec<StageId>,
) -> Result<(), GraphError> {
    if marks.contains_key(&start) {
        return Ok(());
    }
    marks.insert(start, Mark::OnPath);
    let mut path: Vec<(StageId, Vec<StageId>, usize)> = vec![(start, successors(start), 0)];

    loop {
        let next = match path.last_mut() {
            None => return Ok(()),
            Some((_, next, cursor)) if *cursor < next.len() => {
                *cursor += 1;
                Some(next[*cursor - 1])
            }
            Some(_) => None,
        };

        match next {
            Some(stage) => match marks.get(&stage) {
                Some(Mark::OnPath) => {
                    let start = path.iter().position(|(id, _, _)| *id == stage).unwrap_or(0);
                    let mut cycle: Vec<StageId> = path[start..].iter().map(|(id, _, _)| *id).collect();
                    cycle.push(stage);
                    return Err(CycleDetectedError::new(cycle).into());
                }
                Some(Mark::Done) => {}
                None => {
                    marks.insert(stage, Mark::OnPath);
                    path.push((stage, successors(stage), 0));
                }
            },
            None => {
                if let Some((finished, _, _)) = path.pop() {
                    marks.insert(finished, Mark::Done);
                    post_order.push(finished);
                }
            }
        }
    }
}
