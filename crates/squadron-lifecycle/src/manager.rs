// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Agent Lifecycle Manager: single authority over agent
//! records, sessions, worktrees, sandboxes, and the concurrency limiter.
//! Generic over every collaborator type rather than trait objects —
//! `PlatformApi`, `LlmSessionFactory`, `GitWorktree`, `Sandbox` and
//! `ActivityLogger` all require `Clone`, following the same reasoning as
//! `PipelineEngine<P, C, I>`.
//!
//! Turns are driven on demand: each of `create_agent`/`wake_agent`/
//! `spawn_workflow_agent` spawns exactly one task that runs a single
//! `send_prompt_and_await_turn` and then the post-turn state machine,
//! rather than pinning a long-lived per-agent loop task (an equivalent
//! design the post-turn section explicitly allows).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use squadron_adapters::{
    ActivityEvent, ActivityLogger, GitWorktree, IssueRef, LlmSession, LlmSessionFactory, PrRef,
    Sandbox, SandboxSession, SessionConfig,
};
use squadron_core::{
    Agent, AgentId, AgentLifecycle, AgentStatus, Clock, Config, Event, IdGen, PipelineRunId,
};
use squadron_pipeline::{AgentOutcomeSink, SpawnAgent, SpawnAgentError, SpawnAgentRequest};
use squadron_registry::Registry;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::circuit_breaker::CircuitBreaker;
use crate::command::{resolve_command_target, CommandContext, CommandTarget};
use crate::error::LifecycleError;
use crate::escalation::{AgentEscalation, EnforcementLayer};
use crate::mail::{Inboxes, MailQueues};
use crate::prompt::{build_ephemeral_prompt, build_fresh_prompt, build_wake_prompt, prepend_mail, Assignment};
use crate::watchdog::{Heartbeat, Watchdogs};

/// Per-agent resources the manager tracks outside the Registry row.
struct AgentHandles {
    session: Arc<dyn LlmSession>,
    worktree_path: Option<PathBuf>,
    sandbox_session: Option<SandboxSession>,
    permit: Option<OwnedSemaphorePermit>,
    heartbeat: Option<Heartbeat>,
}

pub struct AgentLifecycleManager<P, L, G, X, A, C, I>
where
    P: squadron_adapters::PlatformApi,
    L: LlmSessionFactory,
    G: GitWorktree,
    X: Sandbox,
    A: ActivityLogger,
    C: Clock,
    I: IdGen,
{
    registry: Arc<Registry>,
    platform: P,
    llm: L,
    git: G,
    sandbox: X,
    activity: A,
    clock: C,
    id_gen: I,
    config: Arc<Config>,
    worktree_base: PathBuf,
    inboxes: Arc<Inboxes>,
    mail: Arc<MailQueues>,
    watchdogs: Arc<Watchdogs>,
    circuit_breaker: Arc<CircuitBreaker<C>>,
    semaphore: Option<Arc<Semaphore>>,
    handles: Mutex<HashMap<AgentId, AgentHandles>>,
    outcome_sink: RwLock<Option<Arc<dyn AgentOutcomeSink>>>,
    /// Set once, right after construction, so trait methods that only
    /// receive `&self` (the `SpawnAgent` seam) can still obtain an
    /// `Arc<Self>` to pass into [`Self::spawn_turn`].
    self_ref: std::sync::OnceLock<std::sync::Weak<Self>>,
}

impl<P, L, G, X, A, C, I> AgentLifecycleManager<P, L, G, X, A, C, I>
where
    P: squadron_adapters::PlatformApi,
    L: LlmSessionFactory,
    G: GitWorktree,
    X: Sandbox,
    A: ActivityLogger,
    C: Clock,
    I: IdGen,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<Registry>,
        platform: P,
        llm: L,
        git: G,
        sandbox: X,
        activity: A,
        clock: C,
        id_gen: I,
        config: Arc<Config>,
        worktree_base: PathBuf,
    ) -> Arc<Self> {
        // Value `0` means unlimited; `Semaphore` has no such mode,
        // so `None` stands in for it and every acquire is skipped.
        let max_concurrent = config.runtime.as_ref().map(|r| r.max_concurrent_agents).unwrap_or(0);
        let semaphore = (max_concurrent > 0).then(|| Arc::new(Semaphore::new(max_concurrent as usize)));

        let manager = Arc::new(Self {
            registry: registry.clone(),
            platform,
            llm,
            git,
            sandbox,
            activity,
            clock: clock.clone(),
            id_gen,
            config: config.clone(),
            worktree_base,
            inboxes: Arc::new(Inboxes::new()),
            mail: Arc::new(MailQueues::new()),
            watchdogs: Arc::new(Watchdogs::new()),
            circuit_breaker: Arc::new(CircuitBreaker::new(config.circuit_breakers.clone(), registry, Arc::new(NullEscalation), clock)),
            semaphore,
            handles: Mutex::new(HashMap::new()),
            outcome_sink: RwLock::new(None),
            self_ref: std::sync::OnceLock::new(),
        });
        // The circuit breaker's escalation target is this manager itself;
        // it can only be wired in once the `Arc<Self>` exists.
        manager.circuit_breaker.set_escalation(manager.clone() as Arc<dyn AgentEscalation>);
        let _ = manager.self_ref.set(Arc::downgrade(&manager));
        manager
    }

    fn self_arc(&self) -> Option<Arc<Self>> {
        self.self_ref.get().and_then(std::sync::Weak::upgrade)
    }

    /// Wire the Pipeline Engine in as the sink for workflow-agent outcomes.
    /// Called once, after the engine (which needs `Arc<dyn SpawnAgent>` =
    /// this manager) has itself been constructed — breaking the
    /// construction-order cycle between the two components.
    pub fn set_outcome_sink(&self, sink: Arc<dyn AgentOutcomeSink>) {
        *self.outcome_sink.write() = Some(sink);
    }

    pub fn inboxes(&self) -> &Arc<Inboxes> {
        &self.inboxes
    }

    pub fn mail_queues(&self) -> &Arc<MailQueues> {
        &self.mail
    }

    /// Expose the circuit breaker as the [`squadron_adapters::ToolHook`]
    /// every `LlmSessionFactory` wiring is constructed with — the hook
    /// injection point `SessionConfig` itself doesn't carry.
    pub fn tool_hook(&self) -> Arc<CircuitBreaker<C>> {
        self.circuit_breaker.clone()
    }

    fn role_config(&self, role: &str) -> Result<squadron_core::AgentRoleConfig, LifecycleError> {
        self.config.agent_roles.get(role).cloned().ok_or_else(|| LifecycleError::UnknownRole(role.to_string()))
    }

    fn is_ephemeral(role_cfg: &squadron_core::AgentRoleConfig) -> bool {
        matches!(role_cfg.lifecycle, AgentLifecycle::Ephemeral)
    }

    async fn acquire_slot(&self) -> Option<OwnedSemaphorePermit> {
        match &self.semaphore {
            None => None,
            Some(sem) => sem.clone().acquire_owned().await.ok(),
        }
    }

    fn persistent_id(role: &str, issue_id: u64) -> AgentId {
        AgentId::new(format!("{role}-{issue_id}"))
    }

    fn ephemeral_id(&self, role: &str, issue_id: u64) -> AgentId {
        AgentId::new(format!("{role}-{issue_id}-{}", self.clock.epoch_ms()))
    }

    fn resolve_branch(&self, role_cfg: &squadron_core::AgentRoleConfig, issue_id: u64, override_branch: Option<&str>, existing_pr: Option<&PrRef>) -> String {
        if let Some(branch) = override_branch {
            return branch.to_string();
        }
        if let Some(pr) = existing_pr {
            return pr.head_branch.clone();
        }
        squadron_core::BranchNamingConfig::render(&role_cfg.branch_template, issue_id)
    }

    /// `createAgent`: resolves ephemeral vs. persistent,
    /// applies singleton/duplicate guards, provisions every collaborator
    /// resource and spawns the agent's first turn.
    pub async fn create_agent(self: &Arc<Self>, role: &str, issue_id: u64, trigger_event: &Event, override_branch: Option<&str>) -> Result<AgentId, LifecycleError> {
        let role_cfg = self.role_config(role)?;
        let ephemeral = Self::is_ephemeral(&role_cfg);

        if !ephemeral {
            let candidate = Self::persistent_id(role, issue_id);
            if let Some(existing) = self.registry.get_agent(&candidate)? {
                if existing.status.is_non_terminal() {
                    return Ok(existing.id);
                }
                self.registry.delete_agent(&candidate)?;
            }
        } else if role_cfg.singleton {
            if let Some(active) = self.active_singleton(role)? {
                return Ok(active);
            }
        }

        let agent_id = if ephemeral { self.ephemeral_id(role, issue_id) } else { Self::persistent_id(role, issue_id) };

        let existing_pr = match trigger_event.pr_id {
            Some(pr_id) => Some(self.platform.get_pr(pr_id).await?),
            None => None,
        };
        let branch = self.resolve_branch(&role_cfg, issue_id, override_branch, existing_pr.as_ref());

        let permit = self.acquire_slot().await;

        self.inboxes.ensure(&agent_id);
        self.mail.ensure(&agent_id);

        let mut agent = Agent::new(agent_id.clone(), role, branch.clone(), self.clock.epoch_ms());
        agent.issue_id = Some(issue_id);
        agent.pr_id = existing_pr.as_ref().map(|pr| pr.number);

        let worktree_path = if ephemeral {
            None
        } else {
            Some(self.git.create_worktree(&branch, None, &self.worktree_base).await?)
        };
        agent.worktree_path = worktree_path.clone();

        let working_dir = worktree_path.clone().unwrap_or_else(|| self.worktree_base.clone());
        let sandbox_session = self.sandbox.create_session(&agent_id, &working_dir).await?;
        let session_working_dir = self.sandbox.get_working_directory(&sandbox_session).await?;

        let issue = self.platform.get_issue(issue_id).await?;
        let assignment = Assignment { role, branch: &branch, issue: Some(&issue), pr: existing_pr.as_ref() };
        let (system_prompt, user_prompt) = if ephemeral {
            (String::new(), build_ephemeral_prompt(trigger_event, &assignment))
        } else {
            build_fresh_prompt("You are the {role} agent for {project_name}, working on branch {branch}.", &self.config.project.name, &assignment)
        };

        let session_config = SessionConfig {
            role: role.to_string(),
            model: self.config.runtime.as_ref().and_then(|r| r.models.get(role)).and_then(|m| m.model.clone()),
            system_prompt: (!system_prompt.is_empty()).then_some(system_prompt),
            tool_allowlist: Vec::new(),
            working_dir: session_working_dir,
            env: Vec::new(),
        };
        let session = self.llm.create_session(session_config).await?;
        agent.set_session(session.id().clone());
        agent.mark_active(self.clock.epoch_ms())?;

        self.registry.create_agent(&agent)?;
        self.circuit_breaker.register(agent_id.clone(), role);

        self.handles.lock().insert(
            agent_id.clone(),
            AgentHandles { session: session.clone(), worktree_path, sandbox_session: Some(sandbox_session), permit, heartbeat: None },
        );

        self.activity.log(ActivityEvent { kind: "agent_created".to_string(), data: json!({"agent_id": agent_id.as_str(), "role": role, "issue_id": issue_id}) }).await;

        self.spawn_turn(agent_id.clone(), user_prompt, role_cfg.clone());
        Ok(agent_id)
    }

    /// `wakeAgent`: requires `SLEEPING`; resumes the persistent
    /// session and drives one more turn from a wake prompt.
    pub async fn wake_agent(self: &Arc<Self>, agent_id: &AgentId, trigger_event: &Event) -> Result<(), LifecycleError> {
        let mut agent = self.registry.get_agent(agent_id)?.ok_or_else(|| LifecycleError::NotSleeping(agent_id.clone()))?;
        if agent.status != AgentStatus::Sleeping {
            return Err(LifecycleError::NotSleeping(agent_id.clone()));
        }
        let role_cfg = self.role_config(&agent.role)?;
        let permit = self.acquire_slot().await;

        let session_id = agent.session_id.clone().ok_or_else(|| LifecycleError::NotSleeping(agent_id.clone()))?;
        let working_dir = agent.worktree_path.clone().unwrap_or_else(|| self.worktree_base.clone());
        let session_config = SessionConfig {
            role: agent.role.clone(),
            model: self.config.runtime.as_ref().and_then(|r| r.models.get(&agent.role)).and_then(|m| m.model.clone()),
            system_prompt: None,
            tool_allowlist: Vec::new(),
            working_dir,
            env: Vec::new(),
        };
        let session = self.llm.resume_session(&session_id, session_config).await?;

        agent.increment_iteration_count();
        agent.mark_active(self.clock.epoch_ms())?;
        self.registry.update_agent(&agent)?;
        self.circuit_breaker.register(agent_id.clone(), &agent.role);

        self.handles.lock().insert(
            agent_id.clone(),
            AgentHandles { session: session.clone(), worktree_path: agent.worktree_path.clone(), sandbox_session: None, permit, heartbeat: None },
        );

        let inbox_len = self.inboxes.len(agent_id);
        let prompt = build_wake_prompt(trigger_event, inbox_len);
        self.spawn_turn(agent_id.clone(), prompt, role_cfg);
        Ok(())
    }

    /// `completeAgent`: called by the reconciliation loop when
    /// the issue/PR changed state out from under the agent.
    pub async fn complete_agent(&self, agent_id: &AgentId) -> Result<(), LifecycleError> {
        let mut agent = self.registry.get_agent(agent_id)?.ok_or_else(|| LifecycleError::Terminal(agent_id.clone()))?;
        if agent.status.is_terminal() {
            return Err(LifecycleError::Terminal(agent_id.clone()));
        }
        agent.mark_completed(self.clock.epoch_ms())?;
        self.registry.update_agent(&agent)?;
        self.cleanup_terminal(agent_id, &agent).await;
        Ok(())
    }

    /// `sleep` trigger action: transition an active agent to
    /// `SLEEPING` from outside its own turn — unlike `report_blocked`, this
    /// records no blocker, it is driven purely by a role trigger (e.g. "go
    /// quiet until the next review round").
    pub async fn sleep_agent(&self, agent_id: &AgentId) -> Result<(), LifecycleError> {
        let mut agent = self.registry.get_agent(agent_id)?.ok_or_else(|| LifecycleError::Terminal(agent_id.clone()))?;
        if agent.status.is_terminal() {
            return Err(LifecycleError::Terminal(agent_id.clone()));
        }
        agent.mark_sleeping(self.clock.epoch_ms())?;
        self.registry.update_agent(&agent)?;

        self.watchdogs.cancel(agent_id);
        self.circuit_breaker.unregister(agent_id);
        let mut handles = self.handles.lock();
        if let Some(h) = handles.remove(agent_id) {
            drop(h.permit);
            if let Some(hb) = h.heartbeat {
                hb.stop();
            }
        }
        Ok(())
    }

    /// `report_blocked` tool callback — one of the narrow exceptions for
    /// control flow: the agent's own turn reports it cannot proceed until
    /// `blocking_issue_id` closes. Records the blocker, transitions to
    /// `SLEEPING`, and posts a comment naming it; the post-turn state
    /// machine (which runs once the turn this was called from finishes)
    /// does the watchdog/session cleanup a `SLEEPING` status calls for.
    pub async fn report_blocked(&self, agent_id: &AgentId, blocking_issue_id: u64, reason: &str) -> Result<(), LifecycleError> {
        let mut agent = self.registry.get_agent(agent_id)?.ok_or_else(|| LifecycleError::Terminal(agent_id.clone()))?;
        if agent.status.is_terminal() {
            return Err(LifecycleError::Terminal(agent_id.clone()));
        }
        self.registry.add_blocker(agent_id, blocking_issue_id)?;
        agent.blocked_by.insert(blocking_issue_id);
        agent.mark_sleeping(self.clock.epoch_ms())?;
        self.registry.update_agent(&agent)?;

        if let Some(target) = agent.issue_id {
            let body = format!("Blocked on #{blocking_issue_id}: {reason}");
            if let Err(e) = self.platform.create_comment(target, &body).await {
                tracing::warn!(%agent_id, error = %e, "failed to post blocker comment");
            }
        }
        Ok(())
    }

    /// `report_complete` tool callback: the agent's own
    /// turn reports its assignment is done. Leaves cleanup to the post-turn
    /// state machine's `COMPLETED` branch, same as `report_blocked`.
    pub async fn report_complete(&self, agent_id: &AgentId) -> Result<(), LifecycleError> {
        let mut agent = self.registry.get_agent(agent_id)?.ok_or_else(|| LifecycleError::Terminal(agent_id.clone()))?;
        if agent.status.is_terminal() {
            return Err(LifecycleError::Terminal(agent_id.clone()));
        }
        agent.mark_completed(self.clock.epoch_ms())?;
        self.registry.update_agent(&agent)?;
        Ok(())
    }

    /// `check_for_events` introspection tool: drains the
    /// agent's inbox and renders it as the human-readable summary the
    /// agent sees as the tool's return value.
    pub fn check_for_events(&self, agent_id: &AgentId) -> String {
        let events = self.inboxes.drain(agent_id);
        Inboxes::summarize(&events)
    }

    /// Unblock path driven by the reconciliation loop: wake
    /// every agent whose blocker on `resolved_issue_id` has cleared.
    pub async fn resolve_blocker(self: &Arc<Self>, resolved_issue_id: u64, trigger_event: &Event) -> Result<Vec<AgentId>, LifecycleError> {
        let blocked = self.registry.get_agents_blocked_by(resolved_issue_id)?;
        let mut woken = Vec::new();
        for agent_id in blocked {
            self.registry.remove_blocker(&agent_id, resolved_issue_id)?;
            let Some(agent) = self.registry.get_agent(&agent_id)? else { continue };
            if agent.status != AgentStatus::Sleeping {
                continue;
            }
            if !agent.blocked_by.is_empty() {
                // Still blocked on other issues after removing this one.
                continue;
            }
            self.wake_agent(&agent_id, trigger_event).await?;
            woken.push(agent_id);
        }
        Ok(woken)
    }

    /// An already-active agent of a singleton ephemeral role, if any.
    fn active_singleton(&self, role: &str) -> Result<Option<AgentId>, LifecycleError> {
        let agents = self.registry.list_non_terminal_agents()?;
        Ok(agents.into_iter().find(|a| a.role == role && a.status == AgentStatus::Active).map(|a| a.id))
    }

    /// Resolve and execute an `@bot` command against the current agent
    /// state for its issue, via command routing.
    pub async fn route_command(self: &Arc<Self>, event: &Event, sender_role: Option<&str>) -> Result<(), LifecycleError> {
        let Some(command) = &event.command else { return Ok(()) };
        let Some(issue_id) = event.issue_id else { return Ok(()) };

        // A registered named command (§D.4, e.g. `@bot retry`) resolves
        // through `config.commands` to the role it targets before anything
        // else below ever sees it; from here on it behaves exactly like an
        // `@bot <role>: <message>` routed command. A name with no `role`
        // configured (a purely informational command) and a name the
        // Normalizer somehow let through despite not being registered are
        // both terminal here — nothing to route.
        let routed;
        let command = match command {
            squadron_core::Command::Named { name, message } => match self.config.commands.get(name) {
                Some(def) => match &def.role {
                    Some(role) => {
                        routed = squadron_core::Command::Route { role: role.clone(), message: message.clone() };
                        &routed
                    }
                    None => return Ok(()),
                },
                None => {
                    self.post_unknown_command(issue_id, name).await?;
                    return Ok(());
                }
            },
            other => other,
        };

        let role = match command {
            squadron_core::Command::Help => {
                self.post_help(issue_id).await?;
                return Ok(());
            }
            squadron_core::Command::Route { role, .. } => role.clone(),
            squadron_core::Command::Named { .. } => unreachable!("Named is resolved to Route/return above"),
        };

        let role_exists = self.config.agent_roles.contains_key(&role);
        let role_cfg = self.config.agent_roles.get(&role).cloned();
        let is_ephemeral = role_cfg.as_ref().is_some_and(Self::is_ephemeral);
        let singleton = role_cfg.as_ref().is_some_and(|c| c.singleton);
        let active_singleton = if is_ephemeral && singleton { self.active_singleton(&role)? } else { None };
        let existing_for_issue = if !is_ephemeral {
            self.registry.get_agent(&Self::persistent_id(&role, issue_id))?.map(|a| (a.id, a.status))
        } else {
            None
        };

        let ctx = CommandContext { sender_role, role_exists, is_ephemeral, singleton, active_singleton, existing_for_issue };
        match resolve_command_target(command, &ctx) {
            CommandTarget::Help => self.post_help(issue_id).await?,
            CommandTarget::UnknownRole { role } => self.post_unknown_role(issue_id, &role).await?,
            CommandTarget::SelfLoop => {}
            CommandTarget::SpawnEphemeral { role } | CommandTarget::SpawnPersistent { role } => {
                self.create_agent(&role, issue_id, event, None).await?;
            }
            CommandTarget::WakeSleeping { agent_id } => self.wake_agent(&agent_id, event).await?,
            CommandTarget::DeliverToActive { agent_id } => {
                if let Some(mail) = Self::event_to_mail(event) {
                    self.mail.push(&agent_id, mail);
                } else {
                    self.inboxes.push(&agent_id, event.clone());
                }
            }
        }
        Ok(())
    }

    fn event_to_mail(event: &Event) -> Option<squadron_core::Mail> {
        let comment = event.payload.comment.as_ref()?;
        let provenance = match event.pr_id {
            Some(pr_id) => squadron_core::MailProvenance::PrComment { pr_id, comment_id: comment.comment_id.clone() },
            None => squadron_core::MailProvenance::IssueComment { issue_id: event.issue_id.unwrap_or_default() },
        };
        Some(squadron_core::Mail::new(event.sender.clone(), comment.body.clone(), provenance, 0))
    }

    async fn post_help(&self, issue_id: u64) -> Result<(), LifecycleError> {
        let mut roles: Vec<&String> = self.config.agent_roles.keys().collect();
        roles.sort();
        let list = roles.iter().map(|r| format!("`{r}`")).collect::<Vec<_>>().join(", ");
        let body = format!("Available agents: {list}\n\nUsage: `@{} <role>: <message>`", self.config.project.bot_username);
        self.platform.create_comment(issue_id, &body).await?;
        Ok(())
    }

    async fn post_unknown_role(&self, issue_id: u64, role: &str) -> Result<(), LifecycleError> {
        let mut roles: Vec<&String> = self.config.agent_roles.keys().collect();
        roles.sort();
        let available = roles.iter().map(|r| format!("`{r}`")).collect::<Vec<_>>().join(", ");
        let body = format!("Unknown agent: `{role}`. Available: {available}");
        self.platform.create_comment(issue_id, &body).await?;
        Ok(())
    }

    async fn post_unknown_command(&self, issue_id: u64, name: &str) -> Result<(), LifecycleError> {
        let mut names: Vec<&String> = self.config.commands.keys().collect();
        names.sort();
        let available = names.iter().map(|n| format!("`{n}`")).collect::<Vec<_>>().join(", ");
        let body = format!("Unknown command: `{name}`. Available: {available}");
        self.platform.create_comment(issue_id, &body).await?;
        Ok(())
    }

    /// Spawn the single task that drains mail, sends the given prompt, and
    /// runs the post-turn state machine once the turn finishes.
    fn spawn_turn(self: &Arc<Self>, agent_id: AgentId, prompt: String, role_cfg: squadron_core::AgentRoleConfig) {
        let limits = self.config.circuit_breakers.resolve(&role_cfg.agent_definition);
        let manager = self.clone();
        let handle = tokio::spawn(async move {
            let mail = manager.mail.drain(&agent_id);
            let prompt = prepend_mail(&prompt, &mail);

            let session = manager.handles.lock().get(&agent_id).map(|h| h.session.clone());
            let Some(session) = session else {
                tracing::error!(%agent_id, "turn task started with no session handle");
                return;
            };

            let timeout = Duration::from_secs(limits.max_active_duration_secs.max(60));
            let outcome = session.send_prompt_and_await_turn(&prompt, timeout).await;
            manager.post_turn(&agent_id, outcome).await;
        });

        let escalation = self.clone() as Arc<dyn AgentEscalation>;
        self.watchdogs.start(agent_id.clone(), Duration::from_secs(limits.max_active_duration_secs), Some(handle.abort_handle()), escalation);
        let heartbeat_interval = Duration::from_secs((limits.max_active_duration_secs / 10).max(30));
        let heartbeat = Heartbeat::spawn(agent_id.clone(), self.registry.clone(), heartbeat_interval, self.clock.clone());
        if let Some(h) = self.handles.lock().get_mut(&agent_id) {
            h.heartbeat = Some(heartbeat);
        }
    }

    /// The post-turn state machine: re-reads the agent record,
    /// increments `turn_count`, and cleans up according to where the turn
    /// left the agent.
    async fn post_turn(self: &Arc<Self>, agent_id: &AgentId, outcome: Result<squadron_adapters::TurnResult, squadron_adapters::LlmError>) {
        let Ok(Some(mut agent)) = self.registry.get_agent(agent_id) else {
            tracing::warn!(%agent_id, "post-turn state machine ran for an agent no longer in the registry");
            return;
        };
        agent.increment_turn_count();

        let turn_error = match &outcome {
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };

        if let Some(reason) = turn_error {
            if agent.status.is_non_terminal() {
                let _ = agent.mark_escalated(self.clock.epoch_ms());
            }
            if let Err(e) = self.registry.update_agent(&agent) {
                tracing::error!(%agent_id, error = %e, "failed to persist escalated agent after turn error");
            }
            self.cleanup_terminal(agent_id, &agent).await;
            self.post_escalation_comment(&agent, &reason).await;
            self.report_workflow_outcome(&agent, Err(reason)).await;
            return;
        }

        match agent.status {
            AgentStatus::Sleeping => {
                self.watchdogs.cancel(agent_id);
                self.circuit_breaker.unregister(agent_id);
                if let Err(e) = self.registry.update_agent(&agent) {
                    tracing::error!(%agent_id, error = %e, "failed to persist sleeping agent after turn");
                }
                // Stop the subprocess session but keep the LLM session id so
                // `wakeAgent` can resume it later; drop our handle.
                let mut handles = self.handles.lock();
                if let Some(h) = handles.remove(agent_id) {
                    drop(h.permit);
                    if let Some(hb) = h.heartbeat {
                        hb.stop();
                    }
                }
            }
            AgentStatus::Completed => {
                if let Err(e) = self.registry.update_agent(&agent) {
                    tracing::error!(%agent_id, error = %e, "failed to persist completed agent after turn");
                }
                self.cleanup_terminal(agent_id, &agent).await;
                let outputs = outcome.map(|t| json!({"output": t.output, "tool_calls": t.tool_calls})).unwrap_or_default();
                self.report_workflow_outcome(&agent, Ok(outputs)).await;
            }
            AgentStatus::Escalated | AgentStatus::Failed => {
                if let Err(e) = self.registry.update_agent(&agent) {
                    tracing::error!(%agent_id, error = %e, "failed to persist escalated/failed agent after turn");
                }
                self.cleanup_terminal(agent_id, &agent).await;
                self.post_escalation_comment(&agent, "agent reached a terminal error state").await;
                self.report_workflow_outcome(&agent, Err("agent escalated".to_string())).await;
            }
            AgentStatus::Active | AgentStatus::Created => {
                // Unchanged: leave ACTIVE, awaiting the next wake/mail. The
                // turn task (and its watchdog/heartbeat) keep running only
                // until this point — there's nothing further to drive until
                // the next external trigger, per the on-demand turn model.
                if let Err(e) = self.registry.update_agent(&agent) {
                    tracing::error!(%agent_id, error = %e, "failed to persist active agent after turn");
                }
                self.watchdogs.cancel(agent_id);
                if let Some(h) = self.handles.lock().get_mut(agent_id) {
                    if let Some(hb) = h.heartbeat.take() {
                        hb.stop();
                    }
                }
            }
        }
    }

    async fn report_workflow_outcome(&self, agent: &Agent, outcome: Result<serde_json::Value, String>) {
        let Some(stage_run) = self.registry.get_stage_run_by_agent_id(&agent.id).ok().flatten() else {
            return;
        };
        let Some(sink) = self.outcome_sink.read().clone() else {
            tracing::warn!(agent_id = %agent.id, "workflow agent completed with no outcome sink wired");
            return;
        };
        let run_id = stage_run.run_id.clone();
        match outcome {
            Ok(outputs) => sink.on_agent_complete(&run_id, &stage_run.stage_id, &agent.id, outputs).await,
            Err(message) => sink.on_agent_error(&run_id, &stage_run.stage_id, &agent.id, message).await,
        }
    }

    async fn cleanup_terminal(&self, agent_id: &AgentId, agent: &Agent) {
        self.watchdogs.cancel(agent_id);
        self.circuit_breaker.unregister(agent_id);

        let handle = self.handles.lock().remove(agent_id);
        if let Some(h) = handle {
            drop(h.permit);
            if let Some(hb) = h.heartbeat {
                hb.stop();
            }
            if let Some(sandbox_session) = &h.sandbox_session {
                if let Err(e) = self.sandbox.teardown_session(sandbox_session).await {
                    tracing::warn!(%agent_id, error = %e, "sandbox teardown failed");
                }
            }
        }
        if let Some(session_id) = &agent.session_id {
            if let Err(e) = self.llm.delete_session(session_id).await {
                tracing::warn!(%agent_id, error = %e, "failed to delete llm session");
            }
        }
        // Worktrees are preserved on escalate/fail so a human can inspect
        // the branch; only a clean COMPLETED removes it. The branch itself
        // is never deleted on any terminal path — only the worktree
        // checkout is.
        if agent.status == AgentStatus::Completed {
            if let Some(path) = &agent.worktree_path {
                if let Err(e) = self.git.remove_worktree(path).await {
                    tracing::warn!(%agent_id, error = %e, "failed to remove worktree");
                }
            }
        }
    }

    async fn post_escalation_comment(&self, agent: &Agent, reason: &str) {
        let Some(target) = agent.pr_id.or(agent.issue_id) else { return };
        let notify = self.config.escalation.default_notify.iter().map(|n| format!("@{n}")).collect::<Vec<_>>().join(" ");
        let body = format!("**Agent escalated:** `{}` ({})\n\n{notify}", agent.id, reason);
        if let Err(e) = self.platform.create_comment(target, &body).await {
            tracing::warn!(agent_id = %agent.id, error = %e, "failed to post escalation comment");
        }
        let labels = self.config.escalation.labels_to_add.clone();
        if !labels.is_empty() {
            if let Err(e) = self.platform.update_issue(target, json!({"labels": labels})).await {
                tracing::warn!(agent_id = %agent.id, error = %e, "failed to apply escalation labels");
            }
        }
    }
}

#[async_trait]
impl<P, L, G, X, A, C, I> SpawnAgent for AgentLifecycleManager<P, L, G, X, A, C, I>
where
    P: squadron_adapters::PlatformApi,
    L: LlmSessionFactory,
    G: GitWorktree,
    X: Sandbox,
    A: ActivityLogger,
    C: Clock,
    I: IdGen + 'static,
{
    /// `spawnWorkflowAgent`: a variant used by the Pipeline
    /// Engine. The id includes the run and stage so retries never collide;
    /// worktree creation is skipped since reviewers run from the repo root.
    async fn spawn_workflow_agent(&self, req: SpawnAgentRequest) -> Result<AgentId, SpawnAgentError> {
        let role_cfg = self
            .config
            .agent_roles
            .get(&req.role)
            .ok_or_else(|| SpawnAgentError::Rejected(format!("unknown role {}", req.role)))?
            .clone();

        let agent_id = AgentId::new(format!("wf-{}-{}-{}", req.role, req.run_id.as_str(), req.stage_id));
        let permit = self.acquire_slot().await;

        self.inboxes.ensure(&agent_id);
        self.mail.ensure(&agent_id);

        let mut agent = Agent::new(agent_id.clone(), &req.role, self.worktree_base.display().to_string(), self.clock.epoch_ms());
        agent.issue_id = req.issue_id;
        agent.pr_id = req.pr_id;

        let sandbox_session = self
            .sandbox
            .create_session(&agent_id, &self.worktree_base)
            .await
            .map_err(|e| SpawnAgentError::Rejected(e.to_string()))?;
        let working_dir = self.sandbox.get_working_directory(&sandbox_session).await.map_err(|e| SpawnAgentError::Rejected(e.to_string()))?;

        let pr = match req.pr_id {
            Some(pr_id) => self.platform.get_pr(pr_id).await.ok(),
            None => None,
        };
        let issue = match req.issue_id {
            Some(issue_id) => self.platform.get_issue(issue_id).await.ok(),
            None => None,
        };
        let assignment = Assignment { role: &req.role, branch: "", issue: issue.as_ref(), pr: pr.as_ref() };
        let prompt = format!("{}\n\n## Stage: {}\n", build_ephemeral_prompt(&workflow_trigger_event(&req), &assignment), req.stage_id);

        let session_config = SessionConfig {
            role: req.role.clone(),
            model: self.config.runtime.as_ref().and_then(|r| r.models.get(&req.role)).and_then(|m| m.model.clone()),
            system_prompt: req.action.clone(),
            tool_allowlist: Vec::new(),
            working_dir,
            env: Vec::new(),
        };
        let session = self.llm.create_session(session_config).await.map_err(|e| SpawnAgentError::Rejected(e.to_string()))?;
        agent.set_session(session.id().clone());
        agent.mark_active(self.clock.epoch_ms()).map_err(|e| SpawnAgentError::Rejected(e.to_string()))?;

        self.registry.create_agent(&agent).map_err(|e| SpawnAgentError::Rejected(e.to_string()))?;
        self.circuit_breaker.register(agent_id.clone(), &req.role);
        self.handles.lock().insert(
            agent_id.clone(),
            AgentHandles { session: session.clone(), worktree_path: None, sandbox_session: Some(sandbox_session), permit, heartbeat: None },
        );

        // `spawn_turn` needs `Arc<Self>`, which `&self` can't produce here;
        // the manager is always held behind an `Arc` by callers (see
        // `AgentLifecycleManager::new`), so this upgrade always succeeds.
        if let Some(this) = self.self_arc() {
            this.spawn_turn(agent_id.clone(), prompt, role_cfg);
        }
        Ok(agent_id)
    }
}

#[async_trait]
impl<P, L, G, X, A, C, I> AgentEscalation for AgentLifecycleManager<P, L, G, X, A, C, I>
where
    P: squadron_adapters::PlatformApi,
    L: LlmSessionFactory,
    G: GitWorktree,
    X: Sandbox,
    A: ActivityLogger,
    C: Clock,
    I: IdGen,
{
    async fn force_escalate(&self, agent_id: &AgentId, layer: EnforcementLayer, reason: String) {
        let Ok(Some(mut agent)) = self.registry.get_agent(agent_id) else { return };
        if agent.status.is_terminal() {
            return;
        }
        if agent.mark_escalated(self.clock.epoch_ms()).is_err() {
            return;
        }
        if let Err(e) = self.registry.update_agent(&agent) {
            tracing::error!(%agent_id, error = %e, "failed to persist forced escalation");
        }
        self.activity
            .log(ActivityEvent { kind: "agent_force_escalated".to_string(), data: json!({"agent_id": agent_id.as_str(), "layer": layer.label(), "reason": reason}) })
            .await;
        self.cleanup_terminal(agent_id, &agent).await;
        self.post_escalation_comment(&agent, &reason).await;
        self.report_workflow_outcome(&agent, Err(reason)).await;
    }
}

/// A synthetic event used only to reuse the ephemeral prompt builder for
/// workflow agents, which aren't triggered by a single webhook event.
fn workflow_trigger_event(req: &SpawnAgentRequest) -> Event {
    let mut event = Event::new(squadron_core::EventType::WorkflowInternal, squadron_core::DeliveryId::new(format!("workflow-{}-{}", req.run_id.as_str(), req.stage_id)), "pipeline-engine");
    event.issue_id = req.issue_id;
    event.pr_id = req.pr_id;
    event
}

/// Placeholder escalation target used only until [`AgentLifecycleManager::new`]
/// has an `Arc<Self>` to wire the circuit breaker's real target in.
struct NullEscalation;

#[async_trait]
impl AgentEscalation for NullEscalation {
    async fn force_escalate(&self, agent_id: &AgentId, layer: EnforcementLayer, reason: String) {
        tracing::error!(%agent_id, layer = layer.label(), %reason, "escalation raised before the lifecycle manager finished wiring itself in");
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
