// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciliation Loop: a periodic sweep that catches up state the Event
//! Router's push model can miss — a missed webhook, a daemon restart
//! between an agent going active and its watchdog re-arming, a blocker
//! whose resolving event never arrived.

use std::sync::Arc;

use squadron_adapters::{ActivityLogger, GitWorktree, LlmSessionFactory, PlatformApi, Sandbox};
use squadron_core::{Agent, AgentStatus, Clock, Config, DeliveryId, Event, EventType, IdGen};
use squadron_lifecycle::{AgentEscalation, AgentLifecycleManager, EnforcementLayer};
use squadron_pipeline::PipelineEngine;
use squadron_registry::Registry;

/// What one sweep did, surfaced for logging/metrics by the caller.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub completed: Vec<String>,
    pub unblocked: Vec<String>,
    pub escalated_for_missed_watchdog: Vec<String>,
    pub delay_stages_resumed: usize,
}

/// Synthesizes an [`EventType::IssueClosed`]/[`EventType::BlockerResolved`]
/// event to drive [`AgentLifecycleManager::resolve_blocker`] from a sweep
/// rather than a webhook.
fn synthetic_resolution_event(issue_id: u64) -> Event {
    Event::new(EventType::BlockerResolved, DeliveryId::new(format!("reconcile-{issue_id}")), "reconciliation-loop").with_issue(issue_id)
}

pub struct ReconciliationLoop<P, L, G, X, A, C, I>
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
    engine: Arc<PipelineEngine<P, C, I>>,
    registry: Arc<Registry>,
    platform: P,
    clock: C,
    config: Arc<Config>,
}

impl<P, L, G, X, A, C, I> ReconciliationLoop<P, L, G, X, A, C, I>
where
    P: PlatformApi,
    L: LlmSessionFactory,
    G: GitWorktree,
    X: Sandbox,
    A: ActivityLogger,
    C: Clock,
    I: IdGen,
{
    pub fn new(
        manager: Arc<AgentLifecycleManager<P, L, G, X, A, C, I>>,
        engine: Arc<PipelineEngine<P, C, I>>,
        registry: Arc<Registry>,
        platform: P,
        clock: C,
        config: Arc<Config>,
    ) -> Self {
        Self { manager, engine, registry, platform, clock, config }
    }

    /// Run one sweep. Errors from individual checks are logged and do not
    /// abort the rest of the sweep — one stuck agent should never starve
    /// reconciliation of every other agent.
    pub async fn run_once(&self) -> ReconciliationReport {
        let mut report = ReconciliationReport::default();
        let now_ms = self.clock.epoch_ms();

        let agents = match self.registry.list_non_terminal_agents() {
            Ok(agents) => agents,
            Err(e) => {
                tracing::error!(error = %e, "reconciliation: failed to list agents");
                return report;
            }
        };

        for agent in &agents {
            if self.closed_out_from_under_agent(agent).await {
                if let Err(e) = self.manager.complete_agent(&agent.id).await {
                    tracing::warn!(agent_id = %agent.id, error = %e, "reconciliation: complete_agent failed");
                } else {
                    report.completed.push(agent.id.as_str().to_string());
                }
                continue;
            }

            if agent.status == AgentStatus::Active {
                let limits = self.config.circuit_breakers.resolve(&agent.role);
                let overdue = agent
                    .active_since
                    .is_some_and(|since| now_ms.saturating_sub(since) > limits.max_active_duration_secs.saturating_mul(1000));
                if overdue {
                    tracing::error!(agent_id = %agent.id, "reconciliation: watchdog failed to fire, forcing escalation");
                    self.manager
                        .force_escalate(&agent.id, EnforcementLayer::Watchdog, "reconciliation swept an overdue active agent".to_string())
                        .await;
                    report.escalated_for_missed_watchdog.push(agent.id.as_str().to_string());
                    continue;
                }
            }

            for blocking_issue_id in agent.blocked_by.iter().copied().collect::<Vec<_>>() {
                if self.issue_closed(blocking_issue_id).await {
                    let event = synthetic_resolution_event(blocking_issue_id);
                    match self.manager.resolve_blocker(blocking_issue_id, &event).await {
                        Ok(woken) => report.unblocked.extend(woken.into_iter().map(|id| id.as_str().to_string())),
                        Err(e) => tracing::warn!(issue_id = blocking_issue_id, error = %e, "reconciliation: resolve_blocker failed"),
                    }
                }
            }
        }

        match self.engine.sweep_due_delays().await {
            Ok(resumed) => report.delay_stages_resumed = resumed.len(),
            Err(e) => tracing::error!(error = %e, "reconciliation: sweep_due_delays failed"),
        }

        report
    }

    async fn closed_out_from_under_agent(&self, agent: &Agent) -> bool {
        if let Some(pr_id) = agent.pr_id {
            if self.pr_terminal(pr_id).await {
                return true;
            }
        }
        if let Some(issue_id) = agent.issue_id {
            return self.issue_closed(issue_id).await;
        }
        false
    }

    async fn issue_closed(&self, issue_id: u64) -> bool {
        match self.platform.get_issue(issue_id).await {
            Ok(issue) => issue.state != "open",
            Err(e) => {
                tracing::warn!(issue_id, error = %e, "reconciliation: get_issue failed, assuming still open");
                false
            }
        }
    }

    async fn pr_terminal(&self, pr_id: u64) -> bool {
        match self.platform.get_pr(pr_id).await {
            Ok(pr) => pr.state != "open",
            Err(e) => {
                tracing::warn!(pr_id, error = %e, "reconciliation: get_pr failed, assuming still open");
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "reconciliation_tests.rs"]
mod tests;
