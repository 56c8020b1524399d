// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identifier, status and the record the Lifecycle Manager owns.
//!
//! An agent is a bounded LLM session coupled to a branch/worktree, driven by
//! a role definition, bound to a specific issue (and optionally a PR).

use crate::id::{AgentId, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Lifecycle status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Created,
    Active,
    Sleeping,
    Completed,
    Escalated,
    Failed,
}

impl AgentStatus {
    /// Terminal set: `{COMPLETED, ESCALATED, FAILED}`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentStatus::Completed | AgentStatus::Escalated | AgentStatus::Failed
        )
    }

    pub fn is_non_terminal(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentStatus::Created => "created",
            AgentStatus::Active => "active",
            AgentStatus::Sleeping => "sleeping",
            AgentStatus::Completed => "completed",
            AgentStatus::Escalated => "escalated",
            AgentStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Error raised by an invariant-checked mutation on [`Agent`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    #[error("agent {0} is terminal and cannot transition without deleteAgent first")]
    Terminal(AgentId),
    #[error("adding blocker {issue_id} to agent {agent_id} would create a cycle")]
    BlockerCycle { agent_id: AgentId, issue_id: u64 },
}

/// The row the Registry persists for an agent.
///
/// Mutated only through the methods below; the Lifecycle Manager is the
/// single writer. Terminal rows are never overwritten in place — callers
/// must `deleteAgent` before inserting a fresh row with the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub role: String,
    pub status: AgentStatus,
    pub issue_id: Option<u64>,
    pub pr_id: Option<u64>,
    pub branch: String,
    pub worktree_path: Option<PathBuf>,
    pub session_id: Option<SessionId>,
    pub turn_count: u32,
    pub tool_call_count: u32,
    pub iteration_count: u32,
    pub active_since: Option<u64>,
    pub sleeping_since: Option<u64>,
    pub blocked_by: BTreeSet<u64>,
    pub last_updated: u64,
}

impl Agent {
    pub fn new(id: AgentId, role: impl Into<String>, branch: impl Into<String>, now_ms: u64) -> Self {
        Self {
            id,
            role: role.into(),
            status: AgentStatus::Created,
            issue_id: None,
            pr_id: None,
            branch: branch.into(),
            worktree_path: None,
            session_id: None,
            turn_count: 0,
            tool_call_count: 0,
            iteration_count: 0,
            active_since: None,
            sleeping_since: None,
            blocked_by: BTreeSet::new(),
            last_updated: now_ms,
        }
    }

    /// Transition to `ACTIVE`. Clears `sleeping_since`, sets `active_since`.
    /// `blocked_by` must be empty per the class invariant — callers clear
    /// blockers before calling this.
    pub fn mark_active(&mut self, now_ms: u64) -> Result<(), AgentError> {
        if self.status.is_terminal() {
            return Err(AgentError::Terminal(self.id.clone()));
        }
        self.status = AgentStatus::Active;
        self.active_since = Some(now_ms);
        self.sleeping_since = None;
        self.last_updated = now_ms;
        Ok(())
    }

    /// Transition to `SLEEPING`. `session_id` must already be set — the
    /// invariant that it is non-null once ACTIVE has been reached holds by
    /// construction since only `mark_active` callers assign a session first.
    pub fn mark_sleeping(&mut self, now_ms: u64) -> Result<(), AgentError> {
        if self.status.is_terminal() {
            return Err(AgentError::Terminal(self.id.clone()));
        }
        self.status = AgentStatus::Sleeping;
        self.sleeping_since = Some(now_ms);
        self.active_since = None;
        self.last_updated = now_ms;
        Ok(())
    }

    pub fn mark_completed(&mut self, now_ms: u64) -> Result<(), AgentError> {
        self.transition_terminal(AgentStatus::Completed, now_ms)
    }

    pub fn mark_escalated(&mut self, now_ms: u64) -> Result<(), AgentError> {
        self.transition_terminal(AgentStatus::Escalated, now_ms)
    }

    pub fn mark_failed(&mut self, now_ms: u64) -> Result<(), AgentError> {
        self.transition_terminal(AgentStatus::Failed, now_ms)
    }

    fn transition_terminal(&mut self, status: AgentStatus, now_ms: u64) -> Result<(), AgentError> {
        if self.status.is_terminal() {
            return Err(AgentError::Terminal(self.id.clone()));
        }
        self.status = status;
        self.active_since = None;
        self.sleeping_since = None;
        self.last_updated = now_ms;
        Ok(())
    }

    pub fn set_session(&mut self, session_id: SessionId) {
        self.session_id = Some(session_id);
    }

    /// Monotonically increments the tool-call counter. The Watchdog's
    /// pre-tool hook is the only caller.
    pub fn increment_tool_call_count(&mut self) -> u32 {
        self.tool_call_count += 1;
        self.tool_call_count
    }

    pub fn increment_turn_count(&mut self) -> u32 {
        self.turn_count += 1;
        self.turn_count
    }

    pub fn increment_iteration_count(&mut self) -> u32 {
        self.iteration_count += 1;
        self.iteration_count
    }

    pub fn is_blocked(&self) -> bool {
        !self.blocked_by.is_empty()
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
