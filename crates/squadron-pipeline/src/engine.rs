// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Pipeline Engine: drives `PipelineRun`s stage by stage against their
//! immutable definition snapshot. Generic over the concrete
//! platform adapter, clock and id generator rather than trait objects —
//! `PlatformApi` and `IdGen` both require `Clone`, which rules out `dyn`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use squadron_adapters::PlatformApi;
use squadron_core::{
    AgentId, Clock, Condition, Event, EventType, IdGen, OnEventAction, PipelineDef, PipelineRun,
    PipelineRunId, PipelineRunStatus, StageConfig, StageDef, StageRun, StageRunId, StageRunStatus,
    TransitionTarget,
};
use squadron_registry::Registry;

use crate::action_registry::{ActionContext, ActionRegistry};
use crate::error::PipelineError;
use crate::gate_registry::{GateCheckRegistry, GateContext};
use crate::spawn::{AgentOutcomeSink, SpawnAgent, SpawnAgentRequest};
use crate::trigger;

/// Whether driving a run should keep looping in-process (a gate or action
/// resolved synchronously) or stop and wait for an external callback (an
/// agent turn, a human response, a delay, or a sub-pipeline).
enum StageOutcome {
    Continue,
    Suspend,
}

pub struct PipelineEngine<P: PlatformApi, C: Clock, I: IdGen> {
    registry: Arc<Registry>,
    platform: P,
    clock: C,
    id_gen: I,
    gate_checks: GateCheckRegistry<P>,
    actions: ActionRegistry<P>,
    pipelines: HashMap<String, PipelineDef>,
    spawner: Arc<dyn SpawnAgent>,
}

impl<P: PlatformApi, C: Clock, I: IdGen> PipelineEngine<P, C, I> {
    pub fn new(
        registry: Arc<Registry>,
        platform: P,
        clock: C,
        id_gen: I,
        pipelines: HashMap<String, PipelineDef>,
        spawner: Arc<dyn SpawnAgent>,
    ) -> Self {
        Self {
            registry,
            platform,
            clock,
            id_gen,
            gate_checks: GateCheckRegistry::with_builtins(),
            actions: ActionRegistry::with_builtins(),
            pipelines,
            spawner,
        }
    }

    pub fn gate_checks_mut(&mut self) -> &mut GateCheckRegistry<P> {
        &mut self.gate_checks
    }

    pub fn actions_mut(&mut self) -> &mut ActionRegistry<P> {
        &mut self.actions
    }

    fn new_run_id(&self) -> PipelineRunId {
        PipelineRunId::new(self.id_gen.next())
    }

    fn new_stage_run_id(&self) -> StageRunId {
        StageRunId::new(self.id_gen.next())
    }

    /// Start any pipeline whose trigger matches `event`, enforcing the
    /// `SinglePr` scope's at-most-one-active-run dedup.
    pub async fn trigger_from_event(&self, event: &Event) -> Result<Vec<PipelineRunId>, PipelineError> {
        let mut started = Vec::new();
        for def in self.pipelines.values() {
            if !trigger::matches(&def.trigger, event) {
                continue;
            }
            if def.scope == squadron_core::PipelineScope::SinglePr {
                if let Some(pr_id) = event.pr_id {
                    if !self.registry.list_active_pipeline_runs_for_pr(pr_id)?.is_empty() {
                        tracing::info!(pipeline = %def.name, pr_id, "skipping trigger: a run is already active for this PR");
                        continue;
                    }
                }
            }

            let Some(first_stage) = def.first_stage_id() else {
                tracing::warn!(pipeline = %def.name, "pipeline has no stages, skipping trigger");
                continue;
            };

            let mut run = PipelineRun::new(
                self.new_run_id(),
                def.name.clone(),
                def.snapshot(),
                event.event_type,
                event.delivery_id.clone(),
                first_stage,
                def.scope,
                self.clock.epoch_ms(),
            );
            run.issue_id = event.issue_id;
            run.pr_id = event.pr_id;
            run.context.insert("labels".to_string(), serde_json::json!(event.payload.labels));
            if let Some(base_branch) = &event.payload.base_branch {
                run.context.insert("base_branch".to_string(), serde_json::json!(base_branch));
            }

            self.registry.create_pipeline_run(&run)?;
            started.push(run.id.clone());
            self.advance_run(&run.id).await?;
        }
        Ok(started)
    }

    /// Drive `run_id` forward until it suspends on an external event or
    /// reaches a terminal status, then resume any parent sub-pipeline whose
    /// child just finished.
    pub async fn advance_run(&self, run_id: &PipelineRunId) -> Result<(), PipelineError> {
        let mut queue = VecDeque::new();
        queue.push_back(run_id.clone());
        while let Some(id) = queue.pop_front() {
            self.drive_run(&id, &mut queue).await?;
        }
        Ok(())
    }

    async fn drive_run(&self, run_id: &PipelineRunId, queue: &mut VecDeque<PipelineRunId>) -> Result<(), PipelineError> {
        loop {
            let mut run = self
                .registry
                .get_pipeline_run(run_id)?
                .ok_or_else(|| PipelineError::UnknownPipeline(run_id.to_string()))?;

            if run.status.is_terminal() {
                self.resume_parent_if_any(&run, queue)?;
                return Ok(());
            }

            let def: PipelineDef = serde_json::from_value(run.definition_snapshot.clone())?;
            if run.started_at.is_none() {
                run.start(self.clock.epoch_ms());
                self.registry.update_pipeline_run(&run)?;
            }

            let Some(stage) = def.get_stage(&run.current_stage_id).cloned() else {
                return Err(PipelineError::UnknownStage { run: run.id.clone(), stage: run.current_stage_id.clone() });
            };

            if let Some(condition) = &stage.condition {
                if !self.condition_holds(&run, condition) {
                    let target = stage.skip_to.clone().unwrap_or_else(|| self.implicit_next(&def, &stage.id));
                    self.apply_transition(&mut run, &target);
                    self.registry.update_pipeline_run(&run)?;
                    continue;
                }
            }

            if let Some(limit) = &stage.transitions.iteration_limit {
                if self.bump_iteration_count_exceeds(&mut run, &stage.id, limit.max_iterations) {
                    tracing::warn!(run = %run.id, stage = %stage.id, max = limit.max_iterations, "iteration bound reached, taking escape transition");
                    self.apply_transition(&mut run, &limit.then);
                    self.registry.update_pipeline_run(&run)?;
                    continue;
                }
                self.registry.update_pipeline_run(&run)?;
            }

            match self.dispatch_stage(&mut run, &def, &stage, queue).await? {
                StageOutcome::Continue => continue,
                StageOutcome::Suspend => return Ok(()),
            }
        }
    }

    /// Increments `run`'s per-stage iteration counter (persisted in its
    /// context map, keyed `iterations:{stage_id}`) and reports whether the
    /// new count exceeds `max`. The caller takes the escape transition
    /// instead of dispatching the stage when this returns `true`.
    fn bump_iteration_count_exceeds(&self, run: &mut PipelineRun, stage_id: &str, max: u32) -> bool {
        let key = format!("iterations:{stage_id}");
        let count = run.context.get(&key).and_then(Value::as_u64).unwrap_or(0) as u32 + 1;
        run.context.insert(key, serde_json::json!(count));
        count > max
    }

    fn condition_holds(&self, run: &PipelineRun, condition: &Condition) -> bool {
        let labels: Vec<String> = run
            .context
            .get("labels")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        condition.matches(&labels)
    }

    fn implicit_next(&self, def: &PipelineDef, current: &str) -> TransitionTarget {
        match def.next_stage_id(current) {
            Some(id) => TransitionTarget::Stage(id.to_string()),
            None => TransitionTarget::Complete,
        }
    }

    fn apply_transition(&self, run: &mut PipelineRun, target: &TransitionTarget) {
        match target {
            TransitionTarget::Stage(id) => run.advance_to(id.clone()),
            TransitionTarget::Complete => run.complete(self.clock.epoch_ms()),
            TransitionTarget::Escalate => {
                let stage = run.current_stage_id.clone();
                run.escalate(stage, "pipeline escalated by stage transition", self.clock.epoch_ms());
            }
        }
    }

    /// Dispatch one stage by its type. Gate and action stages
    /// resolve synchronously and return `Continue`; every other stage type
    /// suspends the run until an external callback resumes it.
    async fn dispatch_stage(
        &self,
        run: &mut PipelineRun,
        def: &PipelineDef,
        stage: &StageDef,
        queue: &mut VecDeque<PipelineRunId>,
    ) -> Result<StageOutcome, PipelineError> {
        match &stage.config {
            StageConfig::Agent(cfg) => {
                let stage_run_id = self.new_stage_run_id();
                let mut stage_run = StageRun::new(stage_run_id, run.id.clone(), stage.id.clone(), 1, self.clock.epoch_ms());
                stage_run.mark_running();

                let req = SpawnAgentRequest {
                    role: cfg.role.clone(),
                    issue_id: run.issue_id,
                    pr_id: run.pr_id,
                    run_id: run.id.clone(),
                    stage_id: stage.id.clone(),
                    action: cfg.action.clone(),
                    continue_session: cfg.continue_session,
                };
                match self.spawner.spawn_workflow_agent(req).await {
                    Ok(agent_id) => {
                        stage_run.agent_id = Some(agent_id);
                        stage_run.mark_waiting();
                        self.registry.create_stage_run(&stage_run)?;
                        Ok(StageOutcome::Suspend)
                    }
                    Err(e) => {
                        stage_run.fail(e.to_string(), self.clock.epoch_ms());
                        self.registry.create_stage_run(&stage_run)?;
                        self.handle_stage_error(run, def, stage, e.to_string())?;
                        Ok(StageOutcome::Continue)
                    }
                }
            }

            StageConfig::Gate(cfg) => {
                let stage_run_id = self.new_stage_run_id();
                let mut stage_run = StageRun::new(stage_run_id, run.id.clone(), stage.id.clone(), 1, self.clock.epoch_ms());
                stage_run.mark_running();

                let ctx = GateContext {
                    platform: &self.platform,
                    registry: &self.registry,
                    pr_id: run.pr_id,
                    issue_id: run.issue_id,
                    working_dir: None,
                    sha: None,
                };

                let mut any_passed = false;
                let mut all_passed = true;
                for check in &cfg.checks {
                    let outcome = self.gate_checks.evaluate(&check.check_type, &check.config, &ctx).await?;
                    self.registry.record_gate_check(&squadron_core::GateCheckRecord {
                        stage_run_id: stage_run.id.clone(),
                        check_type: check.check_type.clone(),
                        check_config: check.config.clone(),
                        passed: outcome.passed,
                        message: outcome.message.clone(),
                        data: outcome.data.clone(),
                        checked_at: self.clock.epoch_ms(),
                    })?;
                    any_passed |= outcome.passed;
                    all_passed &= outcome.passed;
                }
                let passed = if cfg.any_of { any_passed } else { all_passed };

                if passed {
                    stage_run.complete(self.clock.epoch_ms());
                    self.registry.create_stage_run(&stage_run)?;
                    let target = stage.transitions.on_pass.clone().unwrap_or_else(|| self.implicit_next(def, &stage.id));
                    self.apply_transition(run, &target);
                    self.registry.update_pipeline_run(run)?;
                    Ok(StageOutcome::Continue)
                } else {
                    // On fail the stage remains the current stage, `WAITING`,
                    // so a reactive event (`reevaluate_gates`) can re-trigger
                    // it; the engine does not loop automatically (spec §4.7).
                    stage_run.mark_waiting();
                    self.registry.create_stage_run(&stage_run)?;
                    Ok(StageOutcome::Suspend)
                }
            }

            StageConfig::Action(cfg) => {
                let stage_run_id = self.new_stage_run_id();
                let mut stage_run = StageRun::new(stage_run_id, run.id.clone(), stage.id.clone(), 1, self.clock.epoch_ms());
                stage_run.mark_running();

                let ctx = ActionContext {
                    platform: &self.platform,
                    registry: &self.registry,
                    pr_id: run.pr_id,
                    issue_id: run.issue_id,
                };

                match self.actions.execute(&cfg.action, &cfg.config, &ctx).await {
                    Ok(output) => {
                        if let Some(obj) = output.as_object() {
                            for (k, v) in obj {
                                stage_run.outputs.insert(k.clone(), v.clone());
                            }
                        }
                        stage_run.complete(self.clock.epoch_ms());
                        self.registry.create_stage_run(&stage_run)?;
                        let target = stage.transitions.on_complete.clone().unwrap_or_else(|| self.implicit_next(def, &stage.id));
                        self.apply_transition(run, &target);
                        self.registry.update_pipeline_run(run)?;
                    }
                    Err(e) => {
                        stage_run.fail(e.to_string(), self.clock.epoch_ms());
                        self.registry.create_stage_run(&stage_run)?;
                        if let Some(conflict_target) = &cfg.on_conflict {
                            self.apply_transition(run, conflict_target);
                            self.registry.update_pipeline_run(run)?;
                        } else {
                            self.handle_stage_error(run, def, stage, e.to_string())?;
                        }
                    }
                }
                Ok(StageOutcome::Continue)
            }

            StageConfig::Delay(cfg) => {
                let duration = squadron_core::parse_duration(&cfg.duration).map_err(PipelineError::InvalidDuration)?;
                let due_at = self.clock.epoch_ms() + duration.as_millis() as u64;
                run.context.insert(format!("delay:{}:due_at", stage.id), serde_json::json!(due_at));

                let stage_run_id = self.new_stage_run_id();
                let mut stage_run = StageRun::new(stage_run_id, run.id.clone(), stage.id.clone(), 1, self.clock.epoch_ms());
                stage_run.mark_waiting();
                self.registry.create_stage_run(&stage_run)?;
                self.registry.update_pipeline_run(run)?;
                Ok(StageOutcome::Suspend)
            }

            StageConfig::Human(cfg) => {
                let stage_run_id = self.new_stage_run_id();
                let mut stage_run = StageRun::new(stage_run_id, run.id.clone(), stage.id.clone(), 1, self.clock.epoch_ms());
                stage_run.mark_waiting();
                self.registry.create_stage_run(&stage_run)?;
                self.registry.upsert_human_stage_state(&squadron_core::HumanStageState::new(
                    stage_run.id.clone(),
                    cfg.assigned_users.clone(),
                    self.clock.epoch_ms(),
                ))?;
                self.registry.update_pipeline_run(run)?;
                Ok(StageOutcome::Suspend)
            }

            StageConfig::Parallel(cfg) => {
                for branch in &cfg.branches {
                    let Some(first) = branch.stages.first() else { continue };
                    self.dispatch_branch_stage(run, &stage.id, branch.id.clone(), first).await?;
                }
                self.registry.update_pipeline_run(run)?;
                Ok(StageOutcome::Suspend)
            }

            StageConfig::Pipeline(cfg) => {
                if run.would_exceed_nesting_cap() {
                    return Err(PipelineError::NestingDepthExceeded { run: run.id.clone(), stage: stage.id.clone() });
                }
                let child_def = self
                    .pipelines
                    .get(&cfg.pipeline)
                    .ok_or_else(|| PipelineError::UnknownPipeline(cfg.pipeline.clone()))?;
                let Some(child_first) = child_def.first_stage_id() else {
                    return Err(PipelineError::UnknownStage { run: run.id.clone(), stage: stage.id.clone() });
                };

                let child_run = PipelineRun::new(
                    self.new_run_id(),
                    child_def.name.clone(),
                    child_def.snapshot(),
                    run.trigger_event,
                    run.trigger_delivery_id.clone(),
                    child_first,
                    child_def.scope,
                    self.clock.epoch_ms(),
                )
                .as_sub_pipeline(run.id.clone(), stage.id.clone(), run.nesting_depth);
                let mut child_run = child_run;
                child_run.issue_id = run.issue_id;
                child_run.pr_id = run.pr_id;
                self.registry.create_pipeline_run(&child_run)?;

                let stage_run_id = self.new_stage_run_id();
                let mut stage_run = StageRun::new(stage_run_id, run.id.clone(), stage.id.clone(), 1, self.clock.epoch_ms());
                stage_run.mark_waiting();
                stage_run.child_pipeline_run_id = Some(child_run.id.clone());
                self.registry.create_stage_run(&stage_run)?;
                self.registry.update_pipeline_run(run)?;

                // The child is driven from the same work-queue `advance_run`
                // pops from, rather than via recursive `.await`, so nesting
                // depth never grows the call stack.
                queue.push_back(child_run.id);
                Ok(StageOutcome::Suspend)
            }
        }
    }

    async fn dispatch_branch_stage(
        &self,
        run: &mut PipelineRun,
        parallel_stage_id: &str,
        branch_id: String,
        stage: &StageDef,
    ) -> Result<(), PipelineError> {
        let stage_run_id = self.new_stage_run_id();
        let mut stage_run = StageRun::new(stage_run_id, run.id.clone(), stage.id.clone(), 1, self.clock.epoch_ms());
        stage_run.parent_stage_id = Some(parallel_stage_id.to_string());
        stage_run.branch_id = Some(branch_id);

        match &stage.config {
            StageConfig::Agent(cfg) => {
                stage_run.mark_running();
                let req = SpawnAgentRequest {
                    role: cfg.role.clone(),
                    issue_id: run.issue_id,
                    pr_id: run.pr_id,
                    run_id: run.id.clone(),
                    stage_id: stage.id.clone(),
                    action: cfg.action.clone(),
                    continue_session: cfg.continue_session,
                };
                match self.spawner.spawn_workflow_agent(req).await {
                    Ok(agent_id) => {
                        stage_run.agent_id = Some(agent_id);
                        stage_run.mark_waiting();
                    }
                    Err(e) => stage_run.fail(e.to_string(), self.clock.epoch_ms()),
                }
            }
            StageConfig::Gate(cfg) => {
                let ctx = GateContext {
                    platform: &self.platform,
                    registry: &self.registry,
                    pr_id: run.pr_id,
                    issue_id: run.issue_id,
                    working_dir: None,
                    sha: None,
                };
                let mut all_passed = true;
                for check in &cfg.checks {
                    let outcome = self.gate_checks.evaluate(&check.check_type, &check.config, &ctx).await?;
                    all_passed &= outcome.passed;
                }
                if all_passed {
                    stage_run.complete(self.clock.epoch_ms());
                } else {
                    stage_run.fail("gate checks did not pass", self.clock.epoch_ms());
                }
            }
            StageConfig::Action(cfg) => {
                let ctx =
                    ActionContext { platform: &self.platform, registry: &self.registry, pr_id: run.pr_id, issue_id: run.issue_id };
                match self.actions.execute(&cfg.action, &cfg.config, &ctx).await {
                    Ok(_) => stage_run.complete(self.clock.epoch_ms()),
                    Err(e) => stage_run.fail(e.to_string(), self.clock.epoch_ms()),
                }
            }
            other => {
                stage_run.fail(format!("stage type {} is not supported inside a parallel branch", other.type_name()), self.clock.epoch_ms());
            }
        }

        self.registry.create_stage_run(&stage_run)?;
        Ok(())
    }

    fn handle_stage_error(
        &self,
        run: &mut PipelineRun,
        def: &PipelineDef,
        stage: &StageDef,
        message: String,
    ) -> Result<(), PipelineError> {
        let iter_key = format!("{}.retries", stage.id);
        let attempt = run.context.get(&iter_key).and_then(Value::as_u64).unwrap_or(0) as u32;

        if let Some(error_transition) = &stage.transitions.on_error {
            if attempt < error_transition.retry {
                run.context.insert(iter_key, serde_json::json!(attempt + 1));
                self.registry.update_pipeline_run(run)?;
                return Ok(());
            }
            self.apply_transition(run, &error_transition.then);
        } else {
            run.fail(stage.id.clone(), message, self.clock.epoch_ms());
        }
        let _ = def;
        self.registry.update_pipeline_run(run)?;
        Ok(())
    }

    /// Called by the reconciliation loop: resume any run whose current
    /// stage is a `delay` past its due time.
    pub async fn sweep_due_delays(&self) -> Result<Vec<PipelineRunId>, PipelineError> {
        let mut resumed = Vec::new();
        for run in self.registry.list_running_pipeline_runs()? {
            let key = format!("delay:{}:due_at", run.current_stage_id);
            let Some(due_at) = run.context.get(&key).and_then(Value::as_u64) else { continue };
            if self.clock.epoch_ms() < due_at {
                continue;
            }
            self.resume_delay(&run.id, &run.current_stage_id).await?;
            resumed.push(run.id.clone());
        }
        Ok(resumed)
    }

    async fn resume_delay(&self, run_id: &PipelineRunId, stage_id: &str) -> Result<(), PipelineError> {
        let mut run = self
            .registry
            .get_pipeline_run(run_id)?
            .ok_or_else(|| PipelineError::UnknownPipeline(run_id.to_string()))?;
        let def: PipelineDef = serde_json::from_value(run.definition_snapshot.clone())?;
        let stage = def
            .get_stage(stage_id)
            .ok_or_else(|| PipelineError::UnknownStage { run: run.id.clone(), stage: stage_id.to_string() })?;
        let target = stage.transitions.on_complete.clone().unwrap_or_else(|| self.implicit_next(&def, stage_id));
        self.apply_transition(&mut run, &target);
        self.registry.update_pipeline_run(&run)?;
        self.advance_run(run_id).await
    }

    /// Called by the out-of-scope human interface's callback path once a
    /// `human` stage's assigned user responds.
    pub async fn complete_human_stage(
        &self,
        run_id: &PipelineRunId,
        stage_run_id: &StageRunId,
        completed_by: impl Into<String> + Send,
        action: impl Into<String> + Send,
    ) -> Result<(), PipelineError> {
        let mut state = self
            .registry
            .get_human_stage_state(stage_run_id)?
            .ok_or_else(|| PipelineError::UnknownStage { run: run_id.clone(), stage: stage_run_id.to_string() })?;
        state.complete(completed_by, action);
        self.registry.upsert_human_stage_state(&state)?;

        let mut stage_run = self
            .registry
            .get_stage_run(stage_run_id)?
            .ok_or_else(|| PipelineError::UnknownStage { run: run_id.clone(), stage: stage_run_id.to_string() })?;
        stage_run.complete(self.clock.epoch_ms());
        self.registry.update_stage_run(&stage_run)?;

        let mut run = self
            .registry
            .get_pipeline_run(run_id)?
            .ok_or_else(|| PipelineError::UnknownPipeline(run_id.to_string()))?;
        let def: PipelineDef = serde_json::from_value(run.definition_snapshot.clone())?;
        let stage = def
            .get_stage(&stage_run.stage_id)
            .ok_or_else(|| PipelineError::UnknownStage { run: run_id.clone(), stage: stage_run.stage_id.clone() })?;
        let target = stage.transitions.on_complete.clone().unwrap_or_else(|| self.implicit_next(&def, &stage_run.stage_id));
        self.apply_transition(&mut run, &target);
        self.registry.update_pipeline_run(&run)?;
        self.advance_run(run_id).await
    }

    fn resume_parent_if_any(&self, run: &PipelineRun, queue: &mut VecDeque<PipelineRunId>) -> Result<(), PipelineError> {
        let Some(parent_id) = &run.parent_run_id else { return Ok(()) };
        let Some(parent_stage_id) = &run.parent_stage_id else { return Ok(()) };
        let Some(mut parent) = self.registry.get_pipeline_run(parent_id)? else { return Ok(()) };
        if parent.status.is_terminal() {
            return Ok(());
        }

        let def: PipelineDef = serde_json::from_value(parent.definition_snapshot.clone())?;
        let Some(stage) = def.get_stage(parent_stage_id) else { return Ok(()) };

        let target = if run.status == PipelineRunStatus::Completed {
            stage.transitions.on_complete.clone().unwrap_or_else(|| self.implicit_next(&def, parent_stage_id))
        } else {
            stage.transitions.on_error.as_ref().map(|t| t.then.clone()).unwrap_or(TransitionTarget::Escalate)
        };
        self.apply_transition(&mut parent, &target);
        self.registry.update_pipeline_run(&parent)?;
        queue.push_back(parent.id);
        Ok(())
    }

    /// Apply a reactive `on_events` action declared on the running pipeline:
    /// cancel, reevaluate gates, or invalidate-and-restart.
    pub async fn handle_reactive_event(&self, run_id: &PipelineRunId, event_type: EventType) -> Result<(), PipelineError> {
        let Some(mut run) = self.registry.get_pipeline_run(run_id)? else { return Ok(()) };
        if run.status.is_terminal() {
            return Ok(());
        }
        let def: PipelineDef = serde_json::from_value(run.definition_snapshot.clone())?;
        let Some(action) = def.on_events.get(&event_type) else { return Ok(()) };

        match action {
            OnEventAction::Cancel => {
                run.cancel(self.clock.epoch_ms());
                self.registry.update_pipeline_run(&run)?;
            }
            OnEventAction::ReevaluateGates => {
                self.advance_run(run_id).await?;
            }
            OnEventAction::InvalidateAndRestart { cancel_stages: _, restart_from } => {
                if let Some(pr_id) = run.pr_id {
                    self.registry.invalidate_pr_approvals(pr_id)?;
                }
                if let Some(restart_from) = restart_from {
                    run.advance_to(restart_from.clone());
                    self.registry.update_pipeline_run(&run)?;
                    self.advance_run(run_id).await?;
                }
            }
            OnEventAction::Notify => {}
        }
        Ok(())
    }
}

#[async_trait]
impl<P: PlatformApi, C: Clock, I: IdGen + 'static> AgentOutcomeSink for PipelineEngine<P, C, I> {
    async fn on_agent_complete(&self, run_id: &PipelineRunId, stage_id: &str, agent_id: &AgentId, outputs: Value) {
        if let Err(e) = self.handle_agent_outcome(run_id, stage_id, agent_id, Ok(outputs)).await {
            tracing::error!(%run_id, stage_id, %agent_id, error = %e, "failed to process agent completion");
        }
    }

    async fn on_agent_error(&self, run_id: &PipelineRunId, stage_id: &str, agent_id: &AgentId, message: String) {
        if let Err(e) = self.handle_agent_outcome(run_id, stage_id, agent_id, Err(message)).await {
            tracing::error!(%run_id, stage_id, %agent_id, error = %e, "failed to process agent error");
        }
    }
}

impl<P: PlatformApi, C: Clock, I: IdGen> PipelineEngine<P, C, I> {
    async fn handle_agent_outcome(
        &self,
        run_id: &PipelineRunId,
        _stage_id: &str,
        agent_id: &AgentId,
        outcome: Result<Value, String>,
    ) -> Result<(), PipelineError> {
        let Some(mut stage_run) = self.registry.get_stage_run_by_agent_id(agent_id)? else {
            return Err(PipelineError::UnknownStage { run: run_id.clone(), stage: agent_id.to_string() });
        };

        match &outcome {
            Ok(outputs) => {
                if let Some(obj) = outputs.as_object() {
                    for (k, v) in obj {
                        stage_run.outputs.insert(k.clone(), v.clone());
                    }
                }
                stage_run.complete(self.clock.epoch_ms());
            }
            Err(message) => stage_run.fail(message.clone(), self.clock.epoch_ms()),
        }
        self.registry.update_stage_run(&stage_run)?;

        let mut run = self
            .registry
            .get_pipeline_run(run_id)?
            .ok_or_else(|| PipelineError::UnknownPipeline(run_id.to_string()))?;
        let def: PipelineDef = serde_json::from_value(run.definition_snapshot.clone())?;

        if let Some(parent_stage_id) = &stage_run.parent_stage_id {
            let advanced = self.maybe_advance_parallel(&mut run, &def, parent_stage_id)?;
            self.registry.update_pipeline_run(&run)?;
            // Only redrive once every sibling branch has reported in — the
            // parallel stage is still legitimately suspended otherwise, and
            // redriving now would re-dispatch (and re-spawn) it.
            if advanced {
                self.advance_run(run_id).await
            } else {
                Ok(())
            }
        } else {
            let stage = def
                .get_stage(&stage_run.stage_id)
                .ok_or_else(|| PipelineError::UnknownStage { run: run_id.clone(), stage: stage_run.stage_id.clone() })?;
            match outcome {
                Ok(_) => {
                    let target = stage.transitions.on_complete.clone().unwrap_or_else(|| self.implicit_next(&def, &stage.id));
                    self.apply_transition(&mut run, &target);
                    self.registry.update_pipeline_run(&run)?;
                }
                Err(message) => self.handle_stage_error(&mut run, &def, stage, message)?,
            }
            self.advance_run(run_id).await
        }
    }

    /// Applies the parallel stage's transition once every branch has
    /// reported a terminal outcome. Returns whether it did so, so the caller
    /// knows whether the run actually moved off the parallel stage.
    fn maybe_advance_parallel(&self, run: &mut PipelineRun, def: &PipelineDef, parallel_stage_id: &str) -> Result<bool, PipelineError> {
        let branches = self.registry.list_stage_runs_for_run(&run.id)?;
        let relevant: Vec<_> = branches.iter().filter(|s| s.parent_stage_id.as_deref() == Some(parallel_stage_id)).collect();
        if relevant.is_empty() || relevant.iter().any(|s| s.status.is_active() || s.status == StageRunStatus::Pending) {
            return Ok(false);
        }

        let any_rejected = relevant.iter().any(|s| s.status == StageRunStatus::Failed);
        let stage = def
            .get_stage(parallel_stage_id)
            .ok_or_else(|| PipelineError::UnknownStage { run: run.id.clone(), stage: parallel_stage_id.to_string() })?;
        let StageConfig::Parallel(cfg) = &stage.config else {
            return Err(PipelineError::UnknownStage { run: run.id.clone(), stage: parallel_stage_id.to_string() });
        };

        let target = if any_rejected {
            cfg.on_any_reject.clone().unwrap_or(TransitionTarget::Escalate)
        } else {
            stage.transitions.on_complete.clone().unwrap_or_else(|| self.implicit_next(def, parallel_stage_id))
        };
        self.apply_transition(run, &target);
        Ok(true)
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
