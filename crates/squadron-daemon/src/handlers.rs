// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concrete [`EventHandler`] implementations wiring the Event Router to the
//! Lifecycle Manager and Pipeline Engine. Each handler owns only the
//! collaborators its job needs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use squadron_adapters::{ActivityLogger, GitWorktree, LlmSessionFactory, PlatformApi, Sandbox};
use squadron_core::{
    AgentRoleConfig, AgentStatus, Clock, Config, Event, EventType, IdGen, ReviewPolicyConfig,
    TriggerAction,
};
use squadron_lifecycle::AgentLifecycleManager;
use squadron_pipeline::PipelineEngine;
use squadron_registry::Registry;

use crate::normalizer;
use crate::router::EventHandler;
use crate::trigger_eval;

/// Routes `@bot <role>: <message>` / `@bot help` comments to the Lifecycle
/// Manager's command sub-handler for command routing. The self-loop
/// guard's `sender_role` is derived here, from the comment body, since the
/// Normalizer only computes it for review payloads (normalizer.rs).
pub struct CommandHandler<P, L, G, X, A, C, I>
where
    P: PlatformApi,
    L: LlmSessionFactory,
    G: GitWorktree,
    X: Sandbox,
    A: ActivityLogger,
    C: Clock,
    I: IdGen,
{
    manager: Arc<AgentLifecycleManager<P, L, G, X, A, C, I>>,
    bot_username: String,
    agent_roles: HashMap<String, AgentRoleConfig>,
}

impl<P, L, G, X, A, C, I> CommandHandler<P, L, G, X, A, C, I>
where
    P: PlatformApi,
    L: LlmSessionFactory,
    G: GitWorktree,
    X: Sandbox,
    A: ActivityLogger,
    C: Clock,
    I: IdGen,
{
    pub fn new(manager: Arc<AgentLifecycleManager<P, L, G, X, A, C, I>>, config: &Config) -> Self {
        Self { manager, bot_username: config.project.bot_username.clone(), agent_roles: config.agent_roles.clone() }
    }
}

#[async_trait]
impl<P, L, G, X, A, C, I> EventHandler for CommandHandler<P, L, G, X, A, C, I>
where
    P: PlatformApi,
    L: LlmSessionFactory,
    G: GitWorktree,
    X: Sandbox,
    A: ActivityLogger,
    C: Clock,
    I: IdGen,
{
    async fn handle(&self, event: &Event) -> Result<(), String> {
        if event.command.is_none() {
            return Ok(());
        }
        let sender_role = event
            .payload
            .comment
            .as_ref()
            .and_then(|c| normalizer::detect_sender_role(&self.bot_username, &self.agent_roles, &event.sender, &c.body));
        self.manager.route_command(event, sender_role.as_deref()).await.map_err(|e| e.to_string())
    }
}

/// Evaluates `agent_roles.*.triggers` against every incoming event and
/// dispatches the spawn/wake/complete/sleep action of whichever triggers
/// match against the configured role triggers.
pub struct RoleTriggerHandler<P, L, G, X, A, C, I>
where
    P: PlatformApi,
    L: LlmSessionFactory,
    G: GitWorktree,
    X: Sandbox,
    A: ActivityLogger,
    C: Clock,
    I: IdGen,
{
    manager: Arc<AgentLifecycleManager<P, L, G, X, A, C, I>>,
    registry: Arc<Registry>,
    agent_roles: HashMap<String, AgentRoleConfig>,
    review_policy: ReviewPolicyConfig,
}

impl<P, L, G, X, A, C, I> RoleTriggerHandler<P, L, G, X, A, C, I>
where
    P: PlatformApi,
    L: LlmSessionFactory,
    G: GitWorktree,
    X: Sandbox,
    A: ActivityLogger,
    C: Clock,
    I: IdGen,
{
    pub fn new(manager: Arc<AgentLifecycleManager<P, L, G, X, A, C, I>>, registry: Arc<Registry>, config: &Config) -> Self {
        Self { manager, registry, agent_roles: config.agent_roles.clone(), review_policy: config.review_policy.clone() }
    }
}

#[async_trait]
impl<P, L, G, X, A, C, I> EventHandler for RoleTriggerHandler<P, L, G, X, A, C, I>
where
    P: PlatformApi,
    L: LlmSessionFactory,
    G: GitWorktree,
    X: Sandbox,
    A: ActivityLogger,
    C: Clock,
    I: IdGen,
{
    async fn handle(&self, event: &Event) -> Result<(), String> {
        let Some(issue_id) = event.issue_id.or(event.pr_id) else { return Ok(()) };

        for (role_name, role_cfg) in &self.agent_roles {
            for trigger in &role_cfg.triggers {
                if !trigger_eval::trigger_matches(
                    trigger.event,
                    trigger.label.as_deref(),
                    trigger.condition.as_deref(),
                    event,
                    role_name,
                    &self.review_policy,
                ) {
                    continue;
                }

                match trigger.action {
                    TriggerAction::Spawn => {
                        self.manager.create_agent(role_name, issue_id, event, None).await.map_err(|e| e.to_string())?;
                    }
                    TriggerAction::Wake => {
                        if let Some(agent) = self.registry.get_agent_by_issue(issue_id).map_err(|e| e.to_string())? {
                            if agent.role == *role_name && agent.status == AgentStatus::Sleeping {
                                self.manager.wake_agent(&agent.id, event).await.map_err(|e| e.to_string())?;
                            }
                        }
                    }
                    TriggerAction::Complete => {
                        if let Some(agent) = self.registry.get_agent_by_issue(issue_id).map_err(|e| e.to_string())? {
                            if agent.role == *role_name && agent.status.is_non_terminal() {
                                self.manager.complete_agent(&agent.id).await.map_err(|e| e.to_string())?;
                            }
                        }
                    }
                    TriggerAction::Sleep => {
                        if let Some(agent) = self.registry.get_agent_by_issue(issue_id).map_err(|e| e.to_string())? {
                            if agent.role == *role_name && agent.status == AgentStatus::Active {
                                self.manager.sleep_agent(&agent.id).await.map_err(|e| e.to_string())?;
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Starts new pipeline runs on trigger match and fans reactive events out to
/// every currently running run.
pub struct PipelineTriggerHandler<P, C, I>
where
    P: PlatformApi,
    C: Clock,
    I: IdGen,
{
    engine: Arc<PipelineEngine<P, C, I>>,
    registry: Arc<Registry>,
}

impl<P, C, I> PipelineTriggerHandler<P, C, I>
where
    P: PlatformApi,
    C: Clock,
    I: IdGen,
{
    pub fn new(engine: Arc<PipelineEngine<P, C, I>>, registry: Arc<Registry>) -> Self {
        Self { engine, registry }
    }
}

#[async_trait]
impl<P, C, I> EventHandler for PipelineTriggerHandler<P, C, I>
where
    P: PlatformApi,
    C: Clock,
    I: IdGen + 'static,
{
    async fn handle(&self, event: &Event) -> Result<(), String> {
        self.engine.trigger_from_event(event).await.map_err(|e| e.to_string())?;

        for run in self.registry.list_running_pipeline_runs().map_err(|e| e.to_string())? {
            self.engine.handle_reactive_event(&run.id, event.event_type).await.map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

/// Records PR review submissions and checks merge readiness, auto-merging
/// when the review policy's requirements are satisfied
/// `pr_approval` gate check; review policy `auto_merge`). Also invalidates
/// stale approvals on `pr.synchronize` per `on_synchronize.invalidate_approvals`.
pub struct PrReviewHandler<P: PlatformApi, C: Clock> {
    platform: P,
    registry: Arc<Registry>,
    clock: C,
    review_policy: ReviewPolicyConfig,
}

impl<P: PlatformApi, C: Clock> PrReviewHandler<P, C> {
    pub fn new(platform: P, registry: Arc<Registry>, clock: C, config: &Config) -> Self {
        Self { platform, registry, clock, review_policy: config.review_policy.clone() }
    }

    async fn maybe_auto_merge(&self, pr_id: u64, labels: &[String]) -> Result<(), String> {
        if !self.review_policy.auto_merge.enabled {
            return Ok(());
        }
        let requirements: Vec<(String, u32)> =
            self.review_policy.requirements_for(labels).iter().map(|r| (r.role.clone(), r.count)).collect();
        let readiness = self.registry.check_pr_merge_ready(pr_id, &requirements).map_err(|e| e.to_string())?;
        if readiness.ready {
            self.platform.merge_pr(pr_id, "merge").await.map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

#[async_trait]
impl<P: PlatformApi, C: Clock> EventHandler for PrReviewHandler<P, C> {
    async fn handle(&self, event: &Event) -> Result<(), String> {
        match event.event_type {
            EventType::PrReviewSubmitted => {
                let Some(pr_id) = event.pr_id else { return Ok(()) };
                let Some(review) = &event.payload.review else { return Ok(()) };
                let (Some(state), Some(role), Some(review_id)) = (review.state, &review.role, &review.review_id) else {
                    return Ok(());
                };
                self.registry
                    .record_pr_approval(pr_id, role, &event.sender, review_id, state, self.clock.epoch_ms())
                    .map_err(|e| e.to_string())?;
                self.maybe_auto_merge(pr_id, &event.payload.labels).await?;
            }
            EventType::PrSynchronize => {
                if self.review_policy.on_synchronize.invalidate_approvals {
                    if let Some(pr_id) = event.pr_id {
                        self.registry.invalidate_pr_approvals(pr_id).map_err(|e| e.to_string())?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Wakes every agent blocked on an issue once that issue closes or an
/// explicit blocker-resolved event arrives (`resolve_blocker`,
/// §4.9 "Resumes unblocking").
pub struct BlockerResolutionHandler<P, L, G, X, A, C, I>
where
    P: PlatformApi,
    L: LlmSessionFactory,
    G: GitWorktree,
    X: Sandbox,
    A: ActivityLogger,
    C: Clock,
    I: IdGen,
{
    manager: Arc<AgentLifecycleManager<P, L, G, X, A, C, I>>,
}

impl<P, L, G, X, A, C, I> BlockerResolutionHandler<P, L, G, X, A, C, I>
where
    P: PlatformApi,
    L: LlmSessionFactory,
    G: GitWorktree,
    X: Sandbox,
    A: ActivityLogger,
    C: Clock,
    I: IdGen,
{
    pub fn new(manager: Arc<AgentLifecycleManager<P, L, G, X, A, C, I>>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl<P, L, G, X, A, C, I> EventHandler for BlockerResolutionHandler<P, L, G, X, A, C, I>
where
    P: PlatformApi,
    L: LlmSessionFactory,
    G: GitWorktree,
    X: Sandbox,
    A: ActivityLogger,
    C: Clock,
    I: IdGen,
{
    async fn handle(&self, event: &Event) -> Result<(), String> {
        if !matches!(event.event_type, EventType::IssueClosed | EventType::BlockerResolved) {
            return Ok(());
        }
        let Some(issue_id) = event.issue_id else { return Ok(()) };
        self.manager.resolve_blocker(issue_id, event).await.map_err(|e| e.to_string())?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
